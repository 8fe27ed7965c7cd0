//! # Virtual Memory Support
//!
//! 4-level x86-64 page-table management for a single address space.
//!
//! ## What you get
//! - An [`AddressSpace`] that maps, unmaps, protects, translates, and tears
//!   down the user half of a PML4-rooted tree.
//! - [`PageEntry`], the decoded view of one entry, and [`PageEntryBits`], its
//!   raw hardware layout. Conversion happens only in
//!   [`PageEntry::decode`] / [`PageEntry::encode`].
//! - A 4 KiB-aligned [`PageTable`].
//! - The seams the tree needs from the rest of the kernel: a frame source
//!   ([`FrameAlloc`]), a way to reach physical memory ([`PhysMapper`]), and
//!   translation-cache maintenance ([`Tlb`]).
//!
//! ## x86-64 Virtual Address → Physical Address Walk
//!
//! ```text
//! | 47‒39 | 38‒30 | 29‒21 | 20‒12 | 11‒0   |
//! |  PML4 |  PDPT |   PD  |   PT  | Offset |
//! ```
//!
//! ```text
//!  PML4  →  PDPT  →  PD  →  PT  →  Physical Page
//!   │        │        │        │
//!   │        │        │        └───► PTE   maps one 4 KiB page (the leaf)
//!   │        │        └────────────► PDE   points at a PT
//!   │        └─────────────────────► PDPTE points at a PD
//!   └──────────────────────────────► PML4E points at a PDPT
//! ```
//!
//! The kernel itself only creates 4 KiB leaves. Large pages installed by the
//! bootloader in the higher half are recognised when walking and reported by
//! [`AddressSpace::translate`], but never modified.
//!
//! ## Ownership
//!
//! Table frames are owned by the address space: they come from the
//! [`FrameAlloc`] when a level is first needed and go back to it in
//! [`AddressSpace::reclaim_lower_half`]. Data frames are owned by the leaf
//! that maps them and go back in [`AddressSpace::unmap`].

#![cfg_attr(not(test), no_std)]
#![allow(unsafe_code)]

#[cfg(any(test, feature = "test-support"))]
extern crate alloc;

mod address_space;
mod page_entry;
mod page_entry_bits;
mod page_table;
mod tlb;
mod translation;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use crate::address_space::AddressSpace;
pub use crate::page_entry::{PageAccess, PageEntry};
pub use crate::page_entry_bits::PageEntryBits;
pub use crate::page_table::{ENTRIES, PageTable};
#[cfg(feature = "asm")]
pub use crate::tlb::CpuTlb;
pub use crate::tlb::Tlb;
pub use crate::translation::Translation;

pub use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, VirtualAddress};

/// Re-export constants as info module.
pub use kernel_info::memory as info;

/// Source of **physical** 4 KiB frames for tables and anonymous memory.
///
/// Returned frames must be page aligned and never the zero address.
pub trait FrameAlloc {
    /// Take one frame, or `None` when the pool is empty.
    fn alloc_4k(&mut self) -> Option<PhysicalAddress>;

    /// Give a frame back to the pool.
    fn free_4k(&mut self, frame: PhysicalAddress);
}

/// Converts physical addresses to *temporarily* usable references in the
/// current virtual address space (identity map, HHDM, or simulated RAM).
pub trait PhysMapper {
    /// # Safety
    /// - `pa` must be covered by the mapping this mapper models, writable,
    ///   and hold a valid `T`.
    /// - The caller picks `'a`; the mapping must stay valid that long and
    ///   no other live reference may alias the same bytes.
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T;
}

impl<M: PhysMapper + ?Sized> PhysMapper for &M {
    #[inline]
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        unsafe { (**self).phys_to_mut(pa) }
    }
}

/// Failures of page-table operations.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VmemError {
    #[error("out of physical frames")]
    AllocationExhausted,
    #[error("{0} is already mapped")]
    AlreadyMapped(VirtualAddress),
    #[error("{0} is not mapped")]
    NotMapped(VirtualAddress),
    #[error("{0} is not page aligned")]
    Unaligned(VirtualAddress),
    #[error("{0} lies inside a large page")]
    HugePage(VirtualAddress),
}
