#![allow(clippy::cast_possible_truncation)]

use crate::page::{PAGE_SIZE, align_down, align_up};
use core::fmt;
use core::ops::{Add, AddAssign};

const INDEX_MASK: u64 = 0x1ff;

/// Virtual memory address.
///
/// Carries the *kind* of address at the type level. Canonicality is not
/// validated; the index accessors only look at bits 12..48, which is all a
/// 4-level walk ever consumes.
///
/// ```rust
/// # use kernel_memory_addresses::VirtualAddress;
/// let va = VirtualAddress::new(0x0000_7fff_ffff_f000);
/// assert_eq!(va.pml4_index(), 255);
/// assert_eq!(va.pdpt_index(), 511);
/// assert_eq!(va.pd_index(), 511);
/// assert_eq!(va.pt_index(), 511);
/// assert!(va.is_lower_half());
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualAddress(u64);

impl VirtualAddress {
    #[inline]
    #[must_use]
    pub const fn new(v: u64) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
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

    /// Index into the PML4 (bits 39..48).
    #[inline]
    #[must_use]
    pub const fn pml4_index(self) -> usize {
        ((self.0 >> 39) & INDEX_MASK) as usize
    }

    /// Index into the PDPT (bits 30..39).
    #[inline]
    #[must_use]
    pub const fn pdpt_index(self) -> usize {
        ((self.0 >> 30) & INDEX_MASK) as usize
    }

    /// Index into the PD (bits 21..30).
    #[inline]
    #[must_use]
    pub const fn pd_index(self) -> usize {
        ((self.0 >> 21) & INDEX_MASK) as usize
    }

    /// Index into the PT (bits 12..21).
    #[inline]
    #[must_use]
    pub const fn pt_index(self) -> usize {
        ((self.0 >> 12) & INDEX_MASK) as usize
    }

    /// The four table indices, root level first.
    #[inline]
    #[must_use]
    pub const fn table_indices(self) -> [usize; 4] {
        [
            self.pml4_index(),
            self.pdpt_index(),
            self.pd_index(),
            self.pt_index(),
        ]
    }

    #[inline]
    #[must_use]
    pub const fn page_offset(self) -> u64 {
        self.0 & (PAGE_SIZE - 1)
    }

    #[inline]
    #[must_use]
    pub const fn is_page_aligned(self) -> bool {
        self.page_offset() == 0
    }

    #[inline]
    #[must_use]
    pub const fn align_down(self) -> Self {
        Self(align_down(self.0, PAGE_SIZE))
    }

    #[inline]
    #[must_use]
    pub const fn align_up(self) -> Self {
        Self(align_up(self.0, PAGE_SIZE))
    }

    /// Whether the address falls in the user half (PML4 slots 0..256).
    #[inline]
    #[must_use]
    pub const fn is_lower_half(self) -> bool {
        self.0 < 0x0000_8000_0000_0000
    }

    /// Rebuild an address from table indices; bits 48+ stay zero.
    #[inline]
    #[must_use]
    pub const fn from_indices(pml4: usize, pdpt: usize, pd: usize, pt: usize) -> Self {
        Self(
            ((pml4 as u64 & INDEX_MASK) << 39)
                | ((pdpt as u64 & INDEX_MASK) << 30)
                | ((pd as u64 & INDEX_MASK) << 21)
                | ((pt as u64 & INDEX_MASK) << 12),
        )
    }
}

impl fmt::Debug for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VA(0x{:016X})", self.0)
    }
}

impl fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.0)
    }
}

impl From<u64> for VirtualAddress {
    #[inline]
    fn from(v: u64) -> Self {
        Self::new(v)
    }
}

impl Add<u64> for VirtualAddress {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl AddAssign<u64> for VirtualAddress {
    #[inline]
    fn add_assign(&mut self, rhs: u64) {
        self.0 += rhs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_matches_9_9_9_9_12() {
        let va = VirtualAddress::new(0x0000_0000_0040_1000);
        assert_eq!(va.table_indices(), [0, 0, 2, 1]);
        assert_eq!(va.page_offset(), 0);
    }

    #[test]
    fn user_stack_base_indices() {
        let va = VirtualAddress::new(0x0700_0000_0000);
        assert_eq!(va.pml4_index(), 14);
        assert_eq!(va.pdpt_index(), 0);
        assert!(va.is_lower_half());
    }

    #[test]
    fn indices_roundtrip() {
        let va = VirtualAddress::new(0x0000_5a5a_5a5a_5000);
        let [a, b, c, d] = va.table_indices();
        assert_eq!(VirtualAddress::from_indices(a, b, c, d), va);
    }

    #[test]
    fn higher_half_is_not_lower() {
        assert!(!VirtualAddress::new(0xffff_8000_0000_0000).is_lower_half());
        assert!(!VirtualAddress::new(0x0000_8000_0000_0000).is_lower_half());
    }

    #[test]
    fn alignment() {
        let va = VirtualAddress::new(0x40_1234);
        assert_eq!(va.align_down().as_u64(), 0x40_1000);
        assert_eq!(va.align_up().as_u64(), 0x40_2000);
        assert!(!va.is_page_aligned());
    }
}
