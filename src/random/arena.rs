//! All sensitive generator state lives in one locked mapping, split into
//! fixed named regions. The mapping is wiped, unlocked and unmapped on drop,
//! so a single `Drop` covers every region.

use std::ops::Range;
use std::ptr::NonNull;

use zeroize::Zeroize;

use crate::error::{PwgError, Result};

pub const POOL_SIZE: usize = 64;
pub const ADD_BUFFER_SIZE: usize = 64;
pub const KEY_SIZE: usize = 32;
pub const COUNTER_SIZE: usize = 16;
pub const GET_BUFFER_SIZE: usize = 64;

/// Named sub-regions of the arena, in layout order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Pool,
    AddBuffer,
    Key,
    Counter,
    GetBuffer,
}

impl Region {
    pub const ALL: [Region; 5] = [
        Region::Pool,
        Region::AddBuffer,
        Region::Key,
        Region::Counter,
        Region::GetBuffer,
    ];

    pub const fn len(self) -> usize {
        match self {
            Region::Pool => POOL_SIZE,
            Region::AddBuffer => ADD_BUFFER_SIZE,
            Region::Key => KEY_SIZE,
            Region::Counter => COUNTER_SIZE,
            Region::GetBuffer => GET_BUFFER_SIZE,
        }
    }

    const fn offset(self) -> usize {
        match self {
            Region::Pool => 0,
            Region::AddBuffer => POOL_SIZE,
            Region::Key => POOL_SIZE + ADD_BUFFER_SIZE,
            Region::Counter => POOL_SIZE + ADD_BUFFER_SIZE + KEY_SIZE,
            Region::GetBuffer => POOL_SIZE + ADD_BUFFER_SIZE + KEY_SIZE + COUNTER_SIZE,
        }
    }

    pub const fn range(self) -> Range<usize> {
        self.offset()..self.offset() + self.len()
    }
}

pub const ARENA_SIZE: usize = POOL_SIZE + ADD_BUFFER_SIZE + KEY_SIZE + COUNTER_SIZE + GET_BUFFER_SIZE;

/// Page-aligned, locked, zero-on-drop backing store for the generator.
///
/// The arena is an anonymous private mapping rounded up to whole pages and
/// pinned with `mlock`, so the generator state never reaches swap. On Linux
/// the mapping is also excluded from core dumps.
pub struct SecureArena {
    ptr: NonNull<u8>,
    capacity: usize,
}

// The mapping is owned exclusively; shared access only hands out `&[u8]`.
unsafe impl Send for SecureArena {}
unsafe impl Sync for SecureArena {}

pub(crate) fn page_size() -> usize {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size <= 0 {
        4096
    } else {
        size as usize
    }
}

#[cfg(target_os = "linux")]
fn exclude_from_core_dumps(ptr: *mut libc::c_void, len: usize) {
    if unsafe { libc::madvise(ptr, len, libc::MADV_DONTDUMP) } != 0 {
        log::debug!("arena madvise(DONTDUMP) failed: {}", std::io::Error::last_os_error());
    }
}

#[cfg(not(target_os = "linux"))]
fn exclude_from_core_dumps(_ptr: *mut libc::c_void, _len: usize) {}

impl SecureArena {
    pub fn new() -> Result<Self> {
        let page = page_size();
        let capacity = ARENA_SIZE.div_ceil(page) * page;

        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                capacity,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            log::error!("arena mmap failed: {}", std::io::Error::last_os_error());
            return Err(PwgError::AllocationFailed);
        }

        if unsafe { libc::mlock(ptr as *const libc::c_void, capacity) } != 0 {
            log::error!("arena mlock failed: {}", std::io::Error::last_os_error());
            unsafe { libc::munmap(ptr, capacity) };
            return Err(PwgError::AllocationFailed);
        }

        exclude_from_core_dumps(ptr, capacity);

        let ptr = NonNull::new(ptr as *mut u8).ok_or(PwgError::AllocationFailed)?;
        Ok(Self { ptr, capacity })
    }

    /// Bytes actually mapped and locked (whole pages)
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), ARENA_SIZE) }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), ARENA_SIZE) }
    }

    pub fn region(&self, region: Region) -> &[u8] {
        &self.bytes()[region.range()]
    }

    pub fn region_mut(&mut self, region: Region) -> &mut [u8] {
        &mut self.bytes_mut()[region.range()]
    }

    /// Borrow two regions mutably at once; `first` must precede `second`
    pub fn pair_mut(&mut self, first: Region, second: Region) -> (&mut [u8], &mut [u8]) {
        let a = first.range();
        let b = second.range();
        assert!(a.end <= b.start, "regions must be passed in layout order");
        let (head, tail) = self.bytes_mut().split_at_mut(b.start);
        (&mut head[a], &mut tail[..second.len()])
    }

    pub fn zeroize_region(&mut self, region: Region) {
        self.region_mut(region).zeroize();
    }

    pub fn wipe(&mut self) {
        self.bytes_mut().zeroize();
    }
}

impl Drop for SecureArena {
    fn drop(&mut self) {
        let ptr = self.ptr.as_ptr();
        unsafe {
            std::slice::from_raw_parts_mut(ptr, self.capacity).zeroize();
            libc::munlock(ptr as *const libc::c_void, self.capacity);
            libc::munmap(ptr as *mut libc::c_void, self.capacity);
        }
    }
}

impl std::fmt::Debug for SecureArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureArena")
            .field("size", &ARENA_SIZE)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

/// Locked memory of this process in kB, from `/proc/self/status`
#[cfg(all(test, target_os = "linux"))]
pub(crate) fn locked_kb() -> u64 {
    std::fs::read_to_string("/proc/self/status")
        .unwrap()
        .lines()
        .find_map(|line| line.strip_prefix("VmLck:"))
        .and_then(|rest| rest.trim().trim_end_matches("kB").trim().parse().ok())
        .unwrap()
}
