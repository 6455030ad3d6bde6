//! ## hotpool-core::alloc::arena
//! **NUMA-local, locked, prefaulted memory region**
//!
//! The arena reserves one contiguous region at startup and owns it until drop.
//! Pools never own memory; they borrow disjoint [`ArenaRegion`]s carved from the
//! arena, so the borrow checker keeps the arena alive for as long as any pool is.

use std::io;
use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, info, warn};

use super::{sys, CACHE_LINE};
use crate::error::ArenaError;

/// What to do when the locality-domain subsystem cannot be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocalityPolicy {
    /// Fail construction with [`ArenaError::LocalityUnavailable`].
    #[default]
    Required,
    /// Degrade to a plain reserved-and-locked region.
    Preferred,
}

/// Which memory to lock against swapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockPolicy {
    /// All current and future process memory.
    #[default]
    All,
    /// Only the arena's own region.
    Region,
    /// Leave paging untouched.
    None,
}

/// Construction parameters for a [`MemoryArena`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArenaOptions {
    pub size_bytes: usize,
    pub domain: u32,
    pub huge_pages: bool,
    pub locality: LocalityPolicy,
    pub lock: LockPolicy,
}

impl ArenaOptions {
    pub fn new(size_bytes: usize, domain: u32) -> Self {
        Self {
            size_bytes,
            domain,
            huge_pages: true,
            locality: LocalityPolicy::default(),
            lock: LockPolicy::default(),
        }
    }

    pub fn huge_pages(mut self, enabled: bool) -> Self {
        self.huge_pages = enabled;
        self
    }

    pub fn locality(mut self, policy: LocalityPolicy) -> Self {
        self.locality = policy;
        self
    }

    pub fn lock(mut self, policy: LockPolicy) -> Self {
        self.lock = policy;
        self
    }
}

/// A contiguous, page-resident memory region pinned to one locality domain.
///
/// Size is always a multiple of the page size. Read-only after construction
/// except for the reservation cursor used to carve pool regions.
pub struct MemoryArena {
    base: NonNull<u8>,
    size: usize,
    domain: u32,
    huge_pages: bool,
    bound: bool,
    cursor: AtomicUsize,
}

impl MemoryArena {
    /// Reserves `size_bytes` (rounded up to the page size) on `domain`, locking all
    /// process memory and requiring locality support.
    pub fn new(size_bytes: usize, domain: u32, huge_pages: bool) -> Result<Self, ArenaError> {
        Self::with_options(ArenaOptions::new(size_bytes, domain).huge_pages(huge_pages))
    }

    pub fn with_options(options: ArenaOptions) -> Result<Self, ArenaError> {
        if options.size_bytes == 0 {
            return Err(ArenaError::ZeroSize);
        }

        let page = sys::page_size();
        let size = options
            .size_bytes
            .checked_next_multiple_of(page)
            .ok_or_else(|| ArenaError::OutOfMemory {
                bytes: options.size_bytes,
                source: io::Error::from(io::ErrorKind::OutOfMemory),
            })?;

        let locality_ready = match (sys::locality_available(), options.locality) {
            (Ok(()), _) => true,
            (Err(source), LocalityPolicy::Required) => {
                return Err(ArenaError::LocalityUnavailable {
                    domain: options.domain,
                    source,
                })
            }
            (Err(e), LocalityPolicy::Preferred) => {
                warn!(error = %e, domain = options.domain, "Locality unavailable, using a plain region");
                false
            }
        };

        let base = sys::map_anonymous(size).map_err(|source| ArenaError::OutOfMemory {
            bytes: size,
            source,
        })?;

        // Owned from here on: any early return unmaps through Drop.
        let mut arena = MemoryArena {
            base,
            size,
            domain: options.domain,
            huge_pages: options.huge_pages,
            bound: false,
            cursor: AtomicUsize::new(0),
        };

        if locality_ready {
            // SAFETY: fresh mapping of `size` bytes, no page touched yet.
            match unsafe { sys::bind_to_domain(base, size, options.domain) } {
                Ok(()) => {
                    debug!(domain = options.domain, "Bound arena to domain");
                    arena.bound = true;
                }
                Err(source) if options.locality == LocalityPolicy::Required => {
                    return Err(ArenaError::LocalityUnavailable {
                        domain: options.domain,
                        source,
                    });
                }
                Err(e) => warn!(error = %e, domain = options.domain, "Failed to bind arena to domain"),
            }
        }

        if options.huge_pages {
            // SAFETY: live mapping owned by `arena`.
            if let Err(e) = unsafe { sys::advise_huge_pages(base, size) } {
                debug!(error = %e, "Huge page advice ignored");
            }
        }

        arena.prefault(page);

        // Locking populates pages, so it must come after the policy is in place.
        match options.lock {
            LockPolicy::All => match sys::lock_all() {
                Ok(()) => debug!("Locked all current and future process memory"),
                Err(e) => warn!(error = %e, "mlockall failed, memory may be swapped"),
            },
            // SAFETY: live mapping owned by `arena`.
            LockPolicy::Region => match unsafe { sys::lock_region(base, size) } {
                Ok(()) => debug!("Locked arena region"),
                Err(e) => warn!(error = %e, "mlock failed, arena may be swapped"),
            },
            LockPolicy::None => {}
        }

        info!(
            requested = options.size_bytes,
            size = arena.size,
            domain = arena.domain,
            bound = arena.bound,
            resident_domain = ?arena.resident_domain(),
            huge_pages = arena.huge_pages,
            "Memory arena ready"
        );
        Ok(arena)
    }

    /// Writes one zero byte per page so every page is physically backed.
    fn prefault(&mut self, stride: usize) {
        let base = self.base.as_ptr();
        for offset in (0..self.size).step_by(stride) {
            // SAFETY: offset < size, the mapping is writable and exclusively ours.
            unsafe { base.add(offset).write_volatile(0) };
        }
        debug!(pages = self.size / stride, "Prefaulted arena");
    }

    /// Domain actually backing the page at `offset`, as reported by the kernel.
    pub fn domain_of(&self, offset: usize) -> Option<u32> {
        if offset >= self.size {
            return None;
        }
        // SAFETY: offset < size keeps the address inside the mapping.
        let addr = unsafe { NonNull::new_unchecked(self.base.as_ptr().add(offset)) };
        sys::node_of(addr).ok()
    }

    /// Domain backing the first page, `None` where the platform cannot tell.
    pub fn resident_domain(&self) -> Option<u32> {
        self.domain_of(0)
    }

    #[inline]
    pub fn base(&self) -> NonNull<u8> {
        self.base
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn domain(&self) -> u32 {
        self.domain
    }

    /// Whether the region is actually bound to [`MemoryArena::domain`].
    #[inline]
    pub fn is_domain_bound(&self) -> bool {
        self.bound
    }

    #[inline]
    pub fn huge_pages(&self) -> bool {
        self.huge_pages
    }

    /// Bytes already handed out to regions.
    pub fn reserved(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }

    /// Bytes still available for [`MemoryArena::reserve`].
    pub fn remaining(&self) -> usize {
        self.size - self.reserved()
    }

    /// Carves the next `bytes` (rounded up to a cache line) off the arena.
    ///
    /// Returns `None` without consuming anything when the request does not fit.
    /// Regions never overlap and start on a cache-line boundary.
    pub fn reserve(&self, bytes: usize) -> Option<ArenaRegion<'_>> {
        if bytes == 0 {
            return None;
        }
        let len = bytes.checked_next_multiple_of(CACHE_LINE)?;
        let mut offset = self.cursor.load(Ordering::Relaxed);
        loop {
            let end = offset.checked_add(len).filter(|&end| end <= self.size)?;
            match self
                .cursor
                .compare_exchange_weak(offset, end, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(actual) => offset = actual,
            }
        }
        debug!(offset, len, "Reserved arena region");
        Some(ArenaRegion {
            // SAFETY: offset + len <= size, so the pointer stays inside the mapping.
            base: unsafe { NonNull::new_unchecked(self.base.as_ptr().add(offset)) },
            len,
            offset,
            _arena: PhantomData,
        })
    }
}

impl Drop for MemoryArena {
    fn drop(&mut self) {
        // SAFETY: every region borrows the arena, so none outlives this call.
        if let Err(e) = unsafe { sys::unmap(self.base, self.size) } {
            warn!(error = %e, "Failed to release memory arena");
        }
    }
}

impl std::fmt::Debug for MemoryArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryArena")
            .field("base", &self.base)
            .field("size", &self.size)
            .field("domain", &self.domain)
            .field("bound", &self.bound)
            .field("huge_pages", &self.huge_pages)
            .field("reserved", &self.reserved())
            .finish()
    }
}

// SAFETY: the arena only hands out disjoint regions; the cursor is atomic.
unsafe impl Send for MemoryArena {}
unsafe impl Sync for MemoryArena {}

/// An exclusive, cache-line aligned view into part of a [`MemoryArena`].
#[derive(Debug)]
pub struct ArenaRegion<'a> {
    base: NonNull<u8>,
    len: usize,
    offset: usize,
    _arena: PhantomData<&'a MemoryArena>,
}

impl<'a> ArenaRegion<'a> {
    #[inline]
    pub fn as_ptr(&self) -> NonNull<u8> {
        self.base
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Offset of this region from the arena base.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Splits the region in two at `mid`, rounded up to a cache line.
    ///
    /// Returns the region unchanged as `Err` when `mid` falls outside it.
    pub fn split_at(self, mid: usize) -> Result<(Self, Self), Self> {
        let mid = match mid.checked_next_multiple_of(CACHE_LINE) {
            Some(mid) if mid <= self.len => mid,
            _ => return Err(self),
        };
        let head = ArenaRegion {
            base: self.base,
            len: mid,
            offset: self.offset,
            _arena: PhantomData,
        };
        let tail = ArenaRegion {
            // SAFETY: mid <= len keeps the pointer within (or one past) the region.
            base: unsafe { NonNull::new_unchecked(self.base.as_ptr().add(mid)) },
            len: self.len - mid,
            offset: self.offset + mid,
            _arena: PhantomData,
        };
        Ok((head, tail))
    }
}

// SAFETY: a region is an exclusive view; moving it to another thread moves the exclusivity.
unsafe impl Send for ArenaRegion<'_> {}
