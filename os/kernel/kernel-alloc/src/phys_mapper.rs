//! # HHDM-based `PhysMapper`
//!
//! The bootloader maps all of physical memory at a fixed offset in the
//! higher half and reports that offset in a boot tag. Adding it to a
//! physical address yields a pointer the kernel can dereference.
//!
//! ```rust
//! use kernel_alloc::phys_mapper::HhdmPhysMapper;
//! let mapper = HhdmPhysMapper::new(0xffff_8000_0000_0000);
//! assert_eq!(mapper.base(), 0xffff_8000_0000_0000);
//! ```

use kernel_vmem::{PhysMapper, PhysicalAddress};

/// [`PhysMapper`] for a higher-half direct map at `base`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct HhdmPhysMapper {
    base: u64,
}

impl HhdmPhysMapper {
    #[must_use]
    pub const fn new(base: u64) -> Self {
        Self { base }
    }

    #[must_use]
    pub const fn base(&self) -> u64 {
        self.base
    }
}

impl PhysMapper for HhdmPhysMapper {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        let va = (self.base + pa.as_u64()) as *mut T;
        // SAFETY: the caller guarantees `pa` is covered by the HHDM and holds a `T`.
        unsafe { &mut *va }
    }
}
