//! # Physical Frame Allocation
//!
//! The kernel's pool of free 4 KiB physical frames and the mapper that lets
//! it (and the page-table code) touch physical memory.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │          kernel-vmem: AddressSpace                  │
//! │    • takes table and data frames via FrameAlloc     │
//! │    • returns them on unmap / reclaim                │
//! └─────────────────┬───────────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────────┐
//! │       Physical Frame Allocator ([`frame_alloc`])    │
//! │    • LIFO free list threaded through free frames    │
//! │    • primed from the boot memory map                │
//! └─────────────────┬───────────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────────┐
//! │           Physical Mapper ([`phys_mapper`])         │
//! │    • physical → virtual via the HHDM offset         │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Free list
//!
//! A free frame stores the physical address of the next free frame in its
//! first machine word; zero terminates the list. The word is read and written
//! through the frame's direct-map alias, never through its physical address.
//! Allocation pops the head and freeing pushes a new head, so the most
//! recently freed frame is always the next one handed out.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod frame_alloc;
pub mod phys_mapper;

pub use frame_alloc::{FrameError, FreeListFrameAlloc};
pub use phys_mapper::HhdmPhysMapper;
