//! # Kernel Configuration and Boot Interface
//!
//! Shared constants and the bootloader handoff contract.
//!
//! ## Overview
//!
//! The kernel is started by a stivale2-compliant bootloader. Everything it
//! learns about the machine (where RAM is, how physical memory is aliased in
//! the higher half, which program images were loaded, how to print) arrives
//! as a linked list of tags. The [`boot`] module models those tags and the
//! header the kernel embeds to request them; [`memory`] holds the fixed
//! virtual memory layout every other crate agrees on.
//!
//! ## Virtual Memory Layout
//!
//! ```text
//! 0x0000_0000_0000_0000 ┌─────────────────────────────────┐
//!                       │  ELF segments (e.g. 0x40_0000)  │
//! MMAP_BASE             ├─────────────────────────────────┤ 0x0000_0500_0000_0000
//!                       │  anonymous mmap (bump upwards)  │
//! USER_STACK_BASE       ├─────────────────────────────────┤ 0x0000_0700_0000_0000
//!                       │  user stack (8 pages)           │
//!                       ├─────────────────────────────────┤ 0x0000_7fff_ffff_ffff
//!                       │  non-canonical hole             │
//!                       ├─────────────────────────────────┤ 0xffff_8000_0000_0000
//!                       │  HHDM (base reported at boot)   │
//! KERNEL_BASE           ├─────────────────────────────────┤ 0xffff_ffff_8000_0000
//!                       │  kernel text & data             │
//! 0xFFFF_FFFF_FFFF_FFFF └─────────────────────────────────┘
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod boot;
pub mod memory;
