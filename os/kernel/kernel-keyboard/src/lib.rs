//! # PS/2 Keyboard Input
//!
//! The hardware-free half of the keyboard path:
//!
//! - [`ScancodeDecoder`] turns scan code set 1 bytes into ASCII, tracking
//!   shift and caps lock.
//! - [`KeyBuffer`] carries decoded bytes from the keyboard interrupt to the
//!   blocking `read` system call without a lock.
//!
//! Port I/O and interrupt acknowledgement live in the kernel binary.

#![cfg_attr(not(test), no_std)]
#![allow(unsafe_code)]

mod decoder;
mod ring;

pub use crate::decoder::ScancodeDecoder;
pub use crate::ring::KeyBuffer;

/// I/O port the controller delivers scan codes on.
pub const PS2_DATA_PORT: u16 = 0x60;
