//! Simulated firmware for loader tests
//!
//! Files live in a flat root directory; pages come from a fixed budget and are
//! backed by heap buffers. The simulator counts open volume/file handles and
//! live allocations so tests can check that failed loads leave nothing behind.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::ptr::NonNull;
use std::rc::Rc;

use kernel_loader::config::MemoryTypeTag;
use kernel_loader::firmware::{
    Firmware, FirmwareError, KernelFile, PAGE_SIZE, PageRequest, Placement, Volume,
};

/// Behavior of one file on the simulated volume
#[derive(Clone, Debug)]
pub struct SimFileSpec {
    pub data: Vec<u8>,
    /// Size reported by the file system; defaults to `data.len()`
    pub reported_size: u64,
    /// Largest transfer per read call
    pub read_chunk: usize,
    /// Reads fail once this many bytes have been delivered
    pub read_failure_at: Option<usize>,
    pub size_failure: Option<FirmwareError>,
}

impl SimFileSpec {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            reported_size: data.len() as u64,
            data,
            read_chunk: usize::MAX,
            read_failure_at: None,
            size_failure: None,
        }
    }
}

/// A live page allocation
#[derive(Debug)]
pub struct SimAllocation {
    buffer: Box<[u8]>,
    pub pages: usize,
    pub memory_type: MemoryTypeTag,
    pub placement: Placement,
}

#[derive(Default)]
struct SimState {
    files: BTreeMap<String, SimFileSpec>,
    directories: BTreeSet<String>,
    volume_failure: Option<FirmwareError>,
    open_failure: Option<FirmwareError>,
    free_pages: usize,
    honor_exact: bool,
    allocations: BTreeMap<usize, SimAllocation>,
    requests: Vec<PageRequest>,
    open_volumes: usize,
    open_files: usize,
    read_calls: usize,
    bad_frees: usize,
}

#[derive(Clone)]
pub struct SimFirmware {
    state: Rc<RefCell<SimState>>,
}

impl SimFirmware {
    /// Empty volume with 1 MiB of free pages; placement at fixed addresses
    /// is refused.
    pub fn new() -> Self {
        let state = SimState {
            free_pages: 256,
            ..SimState::default()
        };
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    pub fn with_file(self, name: &str, data: impl Into<Vec<u8>>) -> Self {
        self.with_file_spec(name, SimFileSpec::new(data.into()))
    }

    pub fn with_file_spec(self, name: &str, spec: SimFileSpec) -> Self {
        self.state.borrow_mut().files.insert(name.to_string(), spec);
        self
    }

    pub fn with_directory(self, name: &str) -> Self {
        self.state.borrow_mut().directories.insert(name.to_string());
        self
    }

    pub fn with_free_pages(self, pages: usize) -> Self {
        self.state.borrow_mut().free_pages = pages;
        self
    }

    pub fn with_exact_placement(self) -> Self {
        self.state.borrow_mut().honor_exact = true;
        self
    }

    pub fn with_volume_failure(self, error: FirmwareError) -> Self {
        self.state.borrow_mut().volume_failure = Some(error);
        self
    }

    pub fn with_open_failure(self, error: FirmwareError) -> Self {
        self.state.borrow_mut().open_failure = Some(error);
        self
    }

    pub fn open_volumes(&self) -> usize {
        self.state.borrow().open_volumes
    }

    pub fn open_files(&self) -> usize {
        self.state.borrow().open_files
    }

    pub fn read_calls(&self) -> usize {
        self.state.borrow().read_calls
    }

    pub fn bad_frees(&self) -> usize {
        self.state.borrow().bad_frees
    }

    pub fn free_pages(&self) -> usize {
        self.state.borrow().free_pages
    }

    pub fn allocation_requests(&self) -> Vec<PageRequest> {
        self.state.borrow().requests.clone()
    }

    /// Live allocations as (address, pages, memory type)
    pub fn memory_map(&self) -> Vec<(usize, usize, MemoryTypeTag)> {
        self.state
            .borrow()
            .allocations
            .iter()
            .map(|(addr, a)| (*addr, a.pages, a.memory_type))
            .collect()
    }

    pub fn placement_of(&self, address: usize) -> Option<Placement> {
        self.state
            .borrow()
            .allocations
            .get(&address)
            .map(|a| a.placement)
    }

    /// No handles open and no pages allocated
    pub fn is_quiescent(&self) -> bool {
        let state = self.state.borrow();
        state.open_volumes == 0 && state.open_files == 0 && state.allocations.is_empty()
    }
}

impl Firmware for SimFirmware {
    type Volume = SimVolume;

    fn open_boot_volume(&self) -> Result<SimVolume, FirmwareError> {
        let mut state = self.state.borrow_mut();
        if let Some(error) = state.volume_failure {
            return Err(error);
        }
        state.open_volumes += 1;
        Ok(SimVolume {
            state: Rc::clone(&self.state),
        })
    }

    fn allocate_pages(&self, request: PageRequest) -> Result<NonNull<u8>, FirmwareError> {
        let mut state = self.state.borrow_mut();
        state.requests.push(request);

        if let Placement::At(_) = request.placement {
            if !state.honor_exact {
                return Err(FirmwareError::NotFound);
            }
        }
        if request.pages == 0 || request.pages > state.free_pages {
            return Err(FirmwareError::OutOfResources);
        }

        let mut buffer = vec![0xA5u8; request.pages * PAGE_SIZE].into_boxed_slice();
        let base = NonNull::new(buffer.as_mut_ptr()).ok_or(FirmwareError::OutOfResources)?;
        state.free_pages -= request.pages;
        state.allocations.insert(
            base.as_ptr() as usize,
            SimAllocation {
                buffer,
                pages: request.pages,
                memory_type: request.memory_type,
                placement: request.placement,
            },
        );
        Ok(base)
    }

    unsafe fn free_pages(&self, base: NonNull<u8>, pages: usize) -> Result<(), FirmwareError> {
        let mut state = self.state.borrow_mut();
        let address = base.as_ptr() as usize;
        match state.allocations.get(&address) {
            Some(allocation) if allocation.pages == pages => {
                state.allocations.remove(&address);
                state.free_pages += pages;
                Ok(())
            }
            _ => {
                state.bad_frees += 1;
                Err(FirmwareError::NotFound)
            }
        }
    }
}

pub struct SimVolume {
    state: Rc<RefCell<SimState>>,
}

impl Volume for SimVolume {
    type File = SimFile;

    fn open_read_only(&mut self, name: &str) -> Result<SimFile, FirmwareError> {
        let mut state = self.state.borrow_mut();
        if let Some(error) = state.open_failure {
            return Err(error);
        }
        if state.directories.contains(name) {
            return Err(FirmwareError::NotFound);
        }
        let spec = state.files.get(name).cloned().ok_or(FirmwareError::NotFound)?;
        state.open_files += 1;
        Ok(SimFile {
            state: Rc::clone(&self.state),
            spec,
            position: 0,
        })
    }
}

impl Drop for SimVolume {
    fn drop(&mut self) {
        self.state.borrow_mut().open_volumes -= 1;
    }
}

pub struct SimFile {
    state: Rc<RefCell<SimState>>,
    spec: SimFileSpec,
    position: usize,
}

impl KernelFile for SimFile {
    fn size(&mut self) -> Result<u64, FirmwareError> {
        match self.spec.size_failure {
            Some(error) => Err(error),
            None => Ok(self.spec.reported_size),
        }
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, FirmwareError> {
        self.state.borrow_mut().read_calls += 1;
        if self
            .spec
            .read_failure_at
            .is_some_and(|at| self.position >= at)
        {
            return Err(FirmwareError::DeviceError);
        }
        let remaining = self.spec.data.len() - self.position;
        let n = buffer.len().min(self.spec.read_chunk).min(remaining);
        buffer[..n].copy_from_slice(&self.spec.data[self.position..self.position + n]);
        self.position += n;
        Ok(n)
    }
}

impl Drop for SimFile {
    fn drop(&mut self) {
        self.state.borrow_mut().open_files -= 1;
    }
}

/// Deterministic, non-repeating-looking test payload
pub fn kernel_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i.wrapping_mul(31) ^ (i >> 8)) as u8).collect()
}
