//! # Program Loader
//!
//! Turns a boot module holding a static ELF64 executable into a runnable
//! user image inside the current address space.
//!
//! ```text
//!   boot modules ──► find by name ──► ElfView::parse ──► ET_EXEC?
//!                                                           │
//!                    reclaim_lower_half ◄───────────────────┘
//!                           │
//!        for each PT_LOAD:  map (kernel RW) → copy p_filesz → protect (p_flags)
//!                           │
//!                    map user stack ──► LoadedImage { entry, stack_top }
//! ```
//!
//! The loader stops at [`LoadedImage`]. Dropping to ring 3 is the caller's
//! job, so that no lock guarding the address space is held across a jump
//! that never returns.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

#[cfg(any(test, feature = "test-support"))]
extern crate alloc;

pub mod elf;
mod loader;

#[cfg(any(test, feature = "test-support"))]
#[allow(clippy::must_use_candidate, clippy::cast_possible_truncation)]
pub mod test_image;

pub use crate::elf::{ElfError, ElfView, PFlags, ProgramHeader};
pub use crate::loader::{LoadError, LoadedImage, find_module, load};
