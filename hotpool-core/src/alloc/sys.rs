//! ## hotpool-core::alloc::sys
//! **OS memory facilities consumed by the arena**
//!
//! Every function here is a single syscall wrapper returning `io::Result`.
//! Platforms without locality-domain control report `ErrorKind::Unsupported`.

use std::io;
use std::ptr::{self, NonNull};

use libc::c_void;

const FALLBACK_PAGE_SIZE: usize = 4096;

pub(crate) fn page_size() -> usize {
    // SAFETY: sysconf has no preconditions.
    let ps = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if ps <= 0 {
        FALLBACK_PAGE_SIZE
    } else {
        ps as usize
    }
}

/// Reserves `len` bytes of private anonymous read/write memory.
pub(crate) fn map_anonymous(len: usize) -> io::Result<NonNull<u8>> {
    // SAFETY: anonymous mapping with no fixed address; the kernel picks the range.
    let addr = unsafe {
        libc::mmap(
            ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
            -1,
            0,
        )
    };
    if addr == libc::MAP_FAILED {
        return Err(io::Error::last_os_error());
    }
    NonNull::new(addr.cast::<u8>())
        .ok_or_else(|| io::Error::new(io::ErrorKind::OutOfMemory, "mmap returned null"))
}

/// # Safety
///
/// `base..base + len` must be a live mapping returned by [`map_anonymous`],
/// with no outstanding references into it.
pub(crate) unsafe fn unmap(base: NonNull<u8>, len: usize) -> io::Result<()> {
    if libc::munmap(base.as_ptr().cast::<c_void>(), len) != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Locks all current and future process memory against swapping.
pub(crate) fn lock_all() -> io::Result<()> {
    // SAFETY: mlockall only changes paging policy for this process.
    if unsafe { libc::mlockall(libc::MCL_CURRENT | libc::MCL_FUTURE) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// # Safety
///
/// `base..base + len` must be a live mapping.
pub(crate) unsafe fn lock_region(base: NonNull<u8>, len: usize) -> io::Result<()> {
    if libc::mlock(base.as_ptr().cast::<c_void>(), len) != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// # Safety
///
/// `base..base + len` must be a live mapping.
#[cfg(target_os = "linux")]
pub(crate) unsafe fn advise_huge_pages(base: NonNull<u8>, len: usize) -> io::Result<()> {
    if libc::madvise(base.as_ptr().cast::<c_void>(), len, libc::MADV_HUGEPAGE) != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub(crate) unsafe fn advise_huge_pages(_base: NonNull<u8>, _len: usize) -> io::Result<()> {
    Err(io::Error::from(io::ErrorKind::Unsupported))
}

#[cfg(target_os = "linux")]
mod numa {
    use std::io;
    use std::ptr::{self, NonNull};

    use libc::{c_int, c_uint, c_ulong, c_void};

    /// `MPOL_BIND` from `<linux/mempolicy.h>`.
    const MPOL_BIND: c_int = 2;

    /// Fail if a page cannot be placed, and migrate pages that already exist.
    const MPOL_MF_STRICT: c_uint = 1 << 0;
    const MPOL_MF_MOVE: c_uint = 1 << 1;

    /// Ask `get_mempolicy` for the node backing one address.
    const MPOL_F_NODE: c_ulong = 1 << 0;
    const MPOL_F_ADDR: c_ulong = 1 << 1;

    /// Matches the kernel's largest `MAX_NUMNODES` (1024 nodes).
    const MASK_WORDS: usize = 1024 / c_ulong::BITS as usize;

    /// Probes the memory-policy syscalls the same way libnuma's availability check does.
    pub(crate) fn locality_available() -> io::Result<()> {
        // SAFETY: null outputs with zero maxnode only query whether the call is supported.
        let rc = unsafe {
            libc::syscall(
                libc::SYS_get_mempolicy,
                ptr::null_mut::<c_int>(),
                ptr::null_mut::<c_ulong>(),
                0 as c_ulong,
                ptr::null_mut::<c_void>(),
                0 as c_ulong,
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Node currently backing the page at `addr`, faulting it in if needed.
    pub(crate) fn node_of(addr: NonNull<u8>) -> io::Result<u32> {
        let mut node: c_int = -1;
        // SAFETY: one c_int out-parameter; the kernel only inspects `addr`'s mapping.
        let rc = unsafe {
            libc::syscall(
                libc::SYS_get_mempolicy,
                &mut node as *mut c_int,
                ptr::null_mut::<c_ulong>(),
                0 as c_ulong,
                addr.as_ptr().cast::<c_void>(),
                MPOL_F_NODE | MPOL_F_ADDR,
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        u32::try_from(node).map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "negative node id"))
    }

    /// Applies `MPOL_BIND` to the range and migrates any page already faulted
    /// in elsewhere (`mlockall(MCL_FUTURE)` populates new mappings eagerly).
    ///
    /// # Safety
    ///
    /// `base..base + len` must be a live, page-aligned private mapping.
    pub(crate) unsafe fn bind_to_domain(base: NonNull<u8>, len: usize, domain: u32) -> io::Result<()> {
        let domain = domain as usize;
        if domain >= MASK_WORDS * c_ulong::BITS as usize {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "locality domain out of range",
            ));
        }
        let mut mask = [0 as c_ulong; MASK_WORDS];
        let bits = c_ulong::BITS as usize;
        mask[domain / bits] |= (1 as c_ulong) << (domain % bits);

        let rc = libc::syscall(
            libc::SYS_mbind,
            base.as_ptr().cast::<c_void>(),
            len as c_ulong,
            MPOL_BIND,
            mask.as_ptr(),
            (MASK_WORDS * bits + 1) as c_ulong,
            MPOL_MF_STRICT | MPOL_MF_MOVE,
        );
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

#[cfg(not(target_os = "linux"))]
mod numa {
    use std::io;
    use std::ptr::NonNull;

    pub(crate) fn locality_available() -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "no locality-domain control on this platform",
        ))
    }

    pub(crate) unsafe fn bind_to_domain(_base: NonNull<u8>, _len: usize, _domain: u32) -> io::Result<()> {
        locality_available()
    }

    pub(crate) fn node_of(_addr: NonNull<u8>) -> io::Result<u32> {
        locality_available().map(|()| 0)
    }
}

pub(crate) use numa::{bind_to_domain, locality_available, node_of};
