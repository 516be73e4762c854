//! Kernel Loader Build Script
//!
//! Resolves the build-time boot configuration. Each knob can be overridden
//! through an environment variable when invoking cargo; the validated value
//! is forwarded to the crate as a `rustc-env` variable so that
//! `config::BootConfiguration::BUILD` can be evaluated at compile time.

use std::env;

const PAGE_SIZE: u64 = 4096;

/// Longest file name accepted, in UCS-2 code units, excluding the terminator.
const MAX_FILE_NAME_LEN: usize = 255;

/// (input variable, forwarded variable, default)
const NUMERIC_KNOBS: &[(&str, &str, &str)] = &[
    ("KERNEL_PHYS_ADDRESS", "KERNEL_LOADER_PHYS_ADDRESS", "0x100000"),
    ("KERNEL_VIRT_ADDRESS", "KERNEL_LOADER_VIRT_ADDRESS", "0xf00000000"),
    ("KERNEL_MEMTYPE", "KERNEL_LOADER_MEMTYPE", "0x80000000"),
];

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    for (input, forwarded, default) in NUMERIC_KNOBS {
        let raw = knob(input, default);
        let value = parse_number(&raw)
            .unwrap_or_else(|| panic!("{}: `{}` is not a valid number", input, raw));
        validate_numeric(input, value);
        println!("cargo:rustc-env={}={}", forwarded, value);
    }

    let file_name = knob("KERNEL_FILENAME", "kernel.bin");
    validate_file_name(&file_name);
    println!("cargo:rustc-env=KERNEL_LOADER_FILENAME={}", file_name);

    let placement = knob("KERNEL_PLACEMENT", "best-effort");
    match placement.as_str() {
        "best-effort" | "exact" => {}
        other => panic!(
            "KERNEL_PLACEMENT: `{}` is not one of `best-effort`, `exact`",
            other
        ),
    }
    println!("cargo:rustc-env=KERNEL_LOADER_PLACEMENT={}", placement);
}

/// Read a knob, registering it for rebuilds, falling back to its default.
fn knob(name: &str, default: &str) -> String {
    println!("cargo:rerun-if-env-changed={}", name);
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value.trim().to_string(),
        _ => default.to_string(),
    }
}

/// Accepts decimal or `0x`-prefixed hexadecimal, with optional `_` separators.
fn parse_number(raw: &str) -> Option<u64> {
    let cleaned: String = raw.chars().filter(|c| *c != '_').collect();
    match cleaned
        .strip_prefix("0x")
        .or_else(|| cleaned.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => cleaned.parse().ok(),
    }
}

fn validate_numeric(name: &str, value: u64) {
    match name {
        "KERNEL_PHYS_ADDRESS" => {
            if value % PAGE_SIZE != 0 {
                panic!("KERNEL_PHYS_ADDRESS {:#x} is not page aligned", value);
            }
        }
        "KERNEL_MEMTYPE" => {
            if value > u32::MAX as u64 {
                panic!("KERNEL_MEMTYPE {:#x} does not fit in 32 bits", value);
            }
            // OEM range or OS loader range. Loader code/data are reclaimed
            // as free memory after boot services exit.
            if value < 0x7000_0000 {
                panic!(
                    "KERNEL_MEMTYPE {:#x} would leave the kernel in reclaimable memory",
                    value
                );
            }
        }
        _ => {}
    }
}

fn validate_file_name(name: &str) {
    if name.is_empty() {
        panic!("KERNEL_FILENAME must not be empty");
    }
    if !name.is_ascii() || name.chars().any(|c| c.is_ascii_control()) {
        panic!("KERNEL_FILENAME `{}` must be printable ASCII", name);
    }
    if name.len() > MAX_FILE_NAME_LEN {
        panic!(
            "KERNEL_FILENAME is {} characters long, limit is {}",
            name.len(),
            MAX_FILE_NAME_LEN
        );
    }
}
