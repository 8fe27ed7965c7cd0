use crate::page::{PAGE_SIZE, align_down};
use core::fmt;
use core::ops::{Add, AddAssign};

/// Physical memory address.
///
/// Names a byte of RAM (or MMIO) without granting access to it. There is
/// intentionally no `Deref`, no `as_ptr` and no conversion to a reference:
/// physical memory is only reachable through a mapper that knows the current
/// direct-map layout.
///
/// The zero address doubles as the "no frame" sentinel of the frame
/// allocator and is never handed out as a valid frame.
///
/// ```rust
/// # use kernel_memory_addresses::PhysicalAddress;
/// let pa = PhysicalAddress::new(0x0000_0010_2000_0042);
/// assert!(!pa.is_page_aligned());
/// assert_eq!(pa.frame_base().as_u64(), 0x0000_0010_2000_0000);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalAddress(u64);

impl PhysicalAddress {
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    #[inline]
    #[must_use]
    pub const fn new(v: u64) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    #[inline]
    #[must_use]
    pub const fn is_page_aligned(self) -> bool {
        self.0 & (PAGE_SIZE - 1) == 0
    }

    /// Base address of the 4 KiB frame containing this address.
    #[inline]
    #[must_use]
    pub const fn frame_base(self) -> Self {
        Self(align_down(self.0, PAGE_SIZE))
    }

    /// Byte offset of this address within its 4 KiB frame.
    #[inline]
    #[must_use]
    pub const fn frame_offset(self) -> u64 {
        self.0 & (PAGE_SIZE - 1)
    }
}

impl fmt::Debug for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PA(0x{:016X})", self.0)
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.0)
    }
}

impl From<u64> for PhysicalAddress {
    #[inline]
    fn from(v: u64) -> Self {
        Self::new(v)
    }
}

impl Add<u64> for PhysicalAddress {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl AddAssign<u64> for PhysicalAddress {
    #[inline]
    fn add_assign(&mut self, rhs: u64) {
        self.0 += rhs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_is_aligned_but_null() {
        let pa = PhysicalAddress::zero();
        assert!(pa.is_null());
        assert!(pa.is_page_aligned());
    }

    #[test]
    fn frame_split() {
        let pa = PhysicalAddress::new(0x12_3456);
        assert_eq!(pa.frame_base(), PhysicalAddress::new(0x12_3000));
        assert_eq!(pa.frame_offset(), 0x456);
        assert_eq!(pa.frame_base() + pa.frame_offset(), pa);
    }

    #[test]
    fn formatting() {
        let pa = PhysicalAddress::new(0x1000);
        assert_eq!(format!("{pa}"), "0x0000000000001000");
        assert_eq!(format!("{pa:?}"), "PA(0x0000000000001000)");
    }
}
