//! # Typed `X84_64` Registers
//!
//! The handful of control registers the memory manager and trap paths touch:
//! [`Cr3`] (address-space root), [`Cr2`] (faulting address), [`Rflags`]
//! (the flags image pushed when entering ring 3), plus the [`tlb`]
//! invalidation instructions.
//!
//! Bit layouts compile everywhere; the instructions that actually read or
//! write hardware sit behind the `asm` feature so host tests can use the
//! layouts alone.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod cr2;
pub mod cr3;
pub mod rflags;
#[cfg(feature = "asm")]
pub mod tlb;

pub use cr2::Cr2;
pub use cr3::Cr3;
pub use rflags::Rflags;

pub trait LoadRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// Most control registers can only be read in ring 0.
    unsafe fn load_unsafe() -> Self;
}

pub trait StoreRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// Writing a control register can change the meaning of every pointer.
    unsafe fn store_unsafe(self);
}
