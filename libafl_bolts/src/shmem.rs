//! Untyped, fixed-size memory shared between a fuzzer process and its
//! forked targets: the substrate the coverage map and the queue's
//! exported entry table are both built on.

use std::{
    ffi::CString,
    fmt,
    ops::{Deref, DerefMut},
    os::raw::c_void,
    ptr, slice,
};

use crate::ShMemId;

/// Something that can be read and written by more than one process.
pub trait ShMem: fmt::Debug + Deref<Target = [u8]> + DerefMut {
    /// The id other processes use to attach to this region.
    fn id(&self) -> ShMemId;

    /// Size of the region in bytes.
    fn len(&self) -> usize;

    /// `true` if the region is empty, i.e. zero-sized.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the region as a byte slice.
    fn as_slice(&self) -> &[u8] {
        self
    }

    /// Borrow the region as a mutable byte slice.
    fn as_slice_mut(&mut self) -> &mut [u8] {
        self
    }
}

/// Builds and attaches to [`ShMem`] regions. The only expected failure
/// mode is resource exhaustion or a permission error acquiring the
/// region — both are surfaced as `Error::shmem` and must be treated as
/// fatal by the caller's constructor.
pub trait ShMemProvider: Clone + fmt::Debug {
    /// The concrete region type this provider hands out.
    type ShMem: ShMem;

    /// Allocates a new region of exactly `map_size` bytes.
    fn new_map(&mut self, map_size: usize) -> Result<Self::ShMem, crate::Error>;
}

/// A POSIX shared memory region, backed by `shm_open`/`mmap`.
pub struct UnixShMem {
    id: ShMemId,
    map: *mut u8,
    map_size: usize,
}

// SAFETY: the mapping is fixed for the lifetime of this handle; callers
// are responsible for not reading the map while a forked child is still
// writing into it (see the map channel's single-writer/single-reader
// contract).
unsafe impl Send for UnixShMem {}

impl fmt::Debug for UnixShMem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnixShMem")
            .field("id", &self.id)
            .field("map_size", &self.map_size)
            .finish()
    }
}

impl UnixShMem {
    fn open(map_size: usize) -> Result<Self, crate::Error> {
        let name = format!("/libafl_{}_{}", std::process::id(), unique_suffix());
        let cname = CString::new(name.clone())
            .map_err(|e| crate::Error::shmem(format!("bad shm name: {e}")))?;

        // SAFETY: `cname` is a valid, NUL-terminated C string for the
        // duration of the call; the returned fd is checked below.
        let fd = unsafe {
            libc::shm_open(
                cname.as_ptr(),
                libc::O_CREAT | libc::O_EXCL | libc::O_RDWR,
                0o600,
            )
        };
        if fd < 0 {
            return Err(crate::Error::shmem(format!(
                "shm_open({name}) failed: {}",
                std::io::Error::last_os_error()
            )));
        }

        // SAFETY: `fd` was just returned by a successful `shm_open`.
        let truncated = unsafe { libc::ftruncate(fd, map_size as libc::off_t) };
        if truncated < 0 {
            // SAFETY: `fd` is still open and owned by us.
            unsafe {
                libc::close(fd);
                libc::shm_unlink(cname.as_ptr());
            }
            return Err(crate::Error::shmem(format!(
                "ftruncate failed: {}",
                std::io::Error::last_os_error()
            )));
        }

        // SAFETY: `fd` refers to a region of at least `map_size` bytes
        // after the successful `ftruncate` above.
        let map = unsafe {
            libc::mmap(
                ptr::null_mut(),
                map_size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };

        // SAFETY: `fd` is ours to close; the mapping (if it succeeded)
        // keeps the region alive independently of the descriptor.
        unsafe {
            libc::close(fd);
        }

        if map == libc::MAP_FAILED {
            // SAFETY: `cname` still names the region we created above.
            unsafe {
                libc::shm_unlink(cname.as_ptr());
            }
            return Err(crate::Error::shmem(format!(
                "mmap failed: {}",
                std::io::Error::last_os_error()
            )));
        }

        Ok(Self {
            id: ShMemId::from_string(name),
            map: map.cast::<u8>(),
            map_size,
        })
    }
}

fn unique_suffix() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

impl Drop for UnixShMem {
    fn drop(&mut self) {
        if self.map.is_null() {
            return;
        }
        // SAFETY: `self.map` was obtained from a matching successful
        // `mmap` of exactly `self.map_size` bytes in `Self::open`.
        unsafe {
            libc::munmap(self.map.cast::<c_void>(), self.map_size);
        }
        if let Ok(cname) = CString::new(self.id.0.clone()) {
            // SAFETY: `cname` is the same name passed to `shm_open`.
            unsafe {
                libc::shm_unlink(cname.as_ptr());
            }
        }
        self.map = ptr::null_mut();
    }
}

impl Deref for UnixShMem {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        // SAFETY: `self.map` is valid for `self.map_size` bytes for the
        // lifetime of this handle.
        unsafe { slice::from_raw_parts(self.map, self.map_size) }
    }
}

impl DerefMut for UnixShMem {
    fn deref_mut(&mut self) -> &mut [u8] {
        // SAFETY: see `Deref`; we hold `&mut self`.
        unsafe { slice::from_raw_parts_mut(self.map, self.map_size) }
    }
}

impl ShMem for UnixShMem {
    fn id(&self) -> ShMemId {
        self.id.clone()
    }

    fn len(&self) -> usize {
        self.map_size
    }
}

/// Hands out [`UnixShMem`] regions.
#[derive(Debug, Default, Clone)]
pub struct UnixShMemProvider;

impl ShMemProvider for UnixShMemProvider {
    type ShMem = UnixShMem;

    fn new_map(&mut self, map_size: usize) -> Result<Self::ShMem, crate::Error> {
        UnixShMem::open(map_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_map_is_zeroed_and_sized() {
        let mut provider = UnixShMemProvider;
        let shmem = provider.new_map(4096).unwrap();
        assert_eq!(shmem.len(), 4096);
        assert!(shmem.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn writes_are_visible_through_the_slice() {
        let mut provider = UnixShMemProvider;
        let mut shmem = provider.new_map(16).unwrap();
        shmem.as_slice_mut().fill(0xAA);
        assert!(shmem.as_slice().iter().all(|&b| b == 0xAA));
    }
}
