//! # Virtual and Physical Memory Address Types
//!
//! Strongly typed wrappers for the two address kinds the kernel juggles while
//! editing page tables: addresses the CPU can dereference ([`VirtualAddress`])
//! and addresses that only name a location in RAM ([`PhysicalAddress`]).
//!
//! ## Overview
//!
//! Both types are zero-cost `u64` wrappers. A [`PhysicalAddress`] deliberately
//! offers no way to turn itself into a pointer; the only route from a physical
//! address to memory goes through a mapper (see `kernel-vmem::PhysMapper`).
//!
//! Only 4 KiB pages are modelled. The 48-bit virtual address is split as
//!
//! ```text
//! | 47‒39 | 38‒30 | 29‒21 | 20‒12 | 11‒0   |
//! |  PML4 |  PDPT |   PD  |   PT  | Offset |
//! ```
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let va = VirtualAddress::new(0x0000_0000_0040_1234);
//! assert_eq!(va.pml4_index(), 0);
//! assert_eq!(va.pt_index(), 1);
//! assert_eq!(va.page_offset(), 0x234);
//! assert_eq!(va.align_down().as_u64(), 0x40_1000);
//!
//! let pa = PhysicalAddress::new(0x20_0000);
//! assert!(pa.is_page_aligned());
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![forbid(unsafe_code)]

mod page;
mod physical_address;
mod virtual_address;

pub use page::{PAGE_SHIFT, PAGE_SIZE, align_down, align_up, pages_spanning};
pub use physical_address::PhysicalAddress;
pub use virtual_address::VirtualAddress;
