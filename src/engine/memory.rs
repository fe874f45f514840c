use crate::errors::VmError;
use std::alloc::{Layout, alloc_zeroed, dealloc, handle_alloc_error};
use std::collections::BTreeMap;

/// Size in bytes of every LOAD/STORE transfer.
pub(super) const WORD_SIZE: usize = 8;

/// First base address handed out in the checked model; address 0 and its
/// neighborhood never resolve, so null stays invalid.
pub(super) const CHECKED_BASE: u64 = 0x1000;

/// Backing storage for one allocated region.
enum Backing {
    /// Checked model: an owned byte buffer addressed through a virtual base.
    Buffer(Vec<u8>),
    /// Raw model: host memory; the base address is the real pointer.
    Host { ptr: *mut u8, layout: Layout },
}

/// One ALLOCA'd region: its size plus backing storage.
struct Region {
    size: usize,
    backing: Backing,
}

impl Drop for Region {
    fn drop(&mut self) {
        if let Backing::Host { ptr, layout } = self.backing {
            // SAFETY: `ptr` came from `alloc_zeroed` with this exact layout
            // and regions are removed from the map before being dropped, so
            // it is deallocated exactly once.
            unsafe { dealloc(ptr, layout) };
        }
    }
}

/// Address space for all live allocations of one engine.
///
/// In the default **checked** model, ALLOCA hands out virtual base addresses
/// (monotonically increasing, never reused) and every LOAD/STORE is
/// bounds-checked against the live region containing the address. A freed
/// or out-of-range address is [`VmError::InvalidMemoryAccess`].
///
/// The **raw** model, entered through [`AddressSpace::raw`], reproduces the
/// original unsafe-VM semantics: ALLOCA hands out real host pointers and
/// LOAD/STORE reinterpret register values as addresses with no bounds or
/// liveness checking at all.
pub(super) struct AddressSpace {
    regions: BTreeMap<u64, Region>,
    next_base: u64,
    raw: bool,
}

impl AddressSpace {
    /// Creates a checked address space.
    pub(super) fn new() -> Self {
        Self {
            regions: BTreeMap::new(),
            next_base: CHECKED_BASE,
            raw: false,
        }
    }

    /// Creates a raw address space.
    ///
    /// # Safety
    ///
    /// The caller opts the engine out of all memory checking: any program it
    /// runs can read and write arbitrary host addresses through LOAD/STORE.
    /// Only run programs trusted to confine themselves to addresses obtained
    /// from ALLOCA within their own lifetime.
    pub(super) unsafe fn raw() -> Self {
        Self {
            regions: BTreeMap::new(),
            next_base: 0,
            raw: true,
        }
    }

    /// Allocates `size` bytes and returns the region's base address.
    pub(super) fn allocate(&mut self, size: i64) -> Result<u64, VmError> {
        let len = match usize::try_from(size) {
            Ok(len) if len > 0 => len,
            _ => return Err(VmError::InvalidAllocationSize { size }),
        };

        if self.raw {
            let layout = Layout::from_size_align(len, WORD_SIZE)
                .map_err(|_| VmError::InvalidAllocationSize { size })?;
            // SAFETY: `layout` has non-zero size.
            let ptr = unsafe { alloc_zeroed(layout) };
            if ptr.is_null() {
                handle_alloc_error(layout);
            }
            let base = ptr as u64;
            self.regions.insert(
                base,
                Region {
                    size: len,
                    backing: Backing::Host { ptr, layout },
                },
            );
            return Ok(base);
        }

        let base = self.next_base;
        // Bases advance by the region size rounded up a word, plus a guard
        // word, so one-past-the-end addresses never land in a neighbor.
        self.next_base = base
            .saturating_add(len.next_multiple_of(WORD_SIZE) as u64)
            .saturating_add(WORD_SIZE as u64);
        self.regions.insert(
            base,
            Region {
                size: len,
                backing: Backing::Buffer(vec![0; len]),
            },
        );
        Ok(base)
    }

    /// Releases the region based at `base`.
    ///
    /// Called when the owning context is popped. Unknown bases are ignored;
    /// ownership is tracked by the contexts, not here.
    pub(super) fn release(&mut self, base: u64) {
        self.regions.remove(&base);
    }

    /// Reads one word from `addr`.
    pub(super) fn load(&self, addr: i64) -> Result<i64, VmError> {
        if self.raw {
            // SAFETY: none. The raw model was entered through an `unsafe`
            // constructor whose contract covers this dereference.
            return Ok(unsafe { (addr as *const i64).read_unaligned() });
        }

        let (buf, offset) = self.checked_region(addr)?;
        let mut word = [0u8; WORD_SIZE];
        word.copy_from_slice(&buf[offset..offset + WORD_SIZE]);
        Ok(i64::from_le_bytes(word))
    }

    /// Writes one word to `addr`.
    pub(super) fn store(&mut self, addr: i64, value: i64) -> Result<(), VmError> {
        if self.raw {
            // SAFETY: see `load`.
            unsafe { (addr as *mut i64).write_unaligned(value) };
            return Ok(());
        }

        let (buf, offset) = self.checked_region_mut(addr)?;
        buf[offset..offset + WORD_SIZE].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Resolves `addr` to the live region containing a full word at it.
    fn checked_region(&self, addr: i64) -> Result<(&[u8], usize), VmError> {
        let err = VmError::InvalidMemoryAccess {
            address: addr as u64,
            len: WORD_SIZE,
        };
        let addr = u64::try_from(addr).map_err(|_| err.clone())?;
        let (base, region) = self
            .regions
            .range(..=addr)
            .next_back()
            .ok_or_else(|| err.clone())?;
        if addr + WORD_SIZE as u64 > base + region.size as u64 {
            return Err(err);
        }
        match &region.backing {
            Backing::Buffer(buf) => Ok((buf.as_slice(), (addr - base) as usize)),
            // Host-backed regions only exist in the raw model.
            Backing::Host { .. } => Err(err),
        }
    }

    /// Mutable variant of [`AddressSpace::checked_region`].
    fn checked_region_mut(&mut self, addr: i64) -> Result<(&mut [u8], usize), VmError> {
        let err = VmError::InvalidMemoryAccess {
            address: addr as u64,
            len: WORD_SIZE,
        };
        let addr = u64::try_from(addr).map_err(|_| err.clone())?;
        let (base, region) = self
            .regions
            .range_mut(..=addr)
            .next_back()
            .ok_or_else(|| err.clone())?;
        if addr + WORD_SIZE as u64 > *base + region.size as u64 {
            return Err(err);
        }
        let offset = (addr - *base) as usize;
        match &mut region.backing {
            Backing::Buffer(buf) => Ok((buf.as_mut_slice(), offset)),
            Backing::Host { .. } => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_load_round_trip() {
        let mut space = AddressSpace::new();
        let base = space.allocate(8).unwrap() as i64;
        space.store(base, -123456789).unwrap();
        assert_eq!(space.load(base), Ok(-123456789));
    }

    #[test]
    fn interior_offsets_are_addressable() {
        let mut space = AddressSpace::new();
        let base = space.allocate(24).unwrap() as i64;
        space.store(base + 16, 7).unwrap();
        assert_eq!(space.load(base + 16), Ok(7));
        // Unaligned but in-bounds is fine.
        space.store(base + 3, 9).unwrap();
        assert_eq!(space.load(base + 3), Ok(9));
    }

    #[test]
    fn out_of_bounds_word_rejected() {
        let mut space = AddressSpace::new();
        let base = space.allocate(8).unwrap() as i64;
        // A word starting at base+1 would span past the region's end.
        assert!(matches!(
            space.load(base + 1),
            Err(VmError::InvalidMemoryAccess { .. })
        ));
        assert!(matches!(
            space.store(base + 8, 1),
            Err(VmError::InvalidMemoryAccess { .. })
        ));
    }

    #[test]
    fn released_region_is_dead() {
        let mut space = AddressSpace::new();
        let base = space.allocate(8).unwrap();
        space.store(base as i64, 1).unwrap();
        space.release(base);
        assert!(matches!(
            space.load(base as i64),
            Err(VmError::InvalidMemoryAccess { .. })
        ));
    }

    #[test]
    fn null_and_negative_addresses_rejected() {
        let mut space = AddressSpace::new();
        space.allocate(8).unwrap();
        assert!(matches!(
            space.load(0),
            Err(VmError::InvalidMemoryAccess { .. })
        ));
        assert!(matches!(
            space.load(-8),
            Err(VmError::InvalidMemoryAccess { .. })
        ));
    }

    #[test]
    fn non_positive_sizes_rejected() {
        let mut space = AddressSpace::new();
        assert_eq!(
            space.allocate(0),
            Err(VmError::InvalidAllocationSize { size: 0 })
        );
        assert_eq!(
            space.allocate(-1),
            Err(VmError::InvalidAllocationSize { size: -1 })
        );
    }

    #[test]
    fn raw_model_round_trips_through_host_memory() {
        // SAFETY: the test only touches addresses it allocated.
        let mut space = unsafe { AddressSpace::raw() };
        let base = space.allocate(16).unwrap() as i64;
        space.store(base, 0x0123_4567_89ab_cdef).unwrap();
        space.store(base + 8, -1).unwrap();
        assert_eq!(space.load(base), Ok(0x0123_4567_89ab_cdef));
        assert_eq!(space.load(base + 8), Ok(-1));
        space.release(base as u64);
    }
}
