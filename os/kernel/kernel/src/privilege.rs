//! # Privilege Levels
//!
//! The kernel runs in ring 0 and user programs in ring 3; rings 1 and 2 are
//! never used.
//!
//! | Concept | Stored in | Purpose |
//! |---------|-----------|---------|
//! | [`Rpl`] | low 2 bits of a selector | privilege the requester asks for |
//! | [`Dpl`] | bits 45–46 of a descriptor | privilege needed to use the target |
//!
//! For gates, DPL decides whether `int n` from ring 3 is allowed at all.

/// Requested privilege level.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[repr(u8)]
pub enum Rpl {
    Ring0 = 0,
    Ring3 = 3,
}

impl Rpl {
    #[inline]
    pub const fn into_bits(self) -> u8 {
        self as u8
    }
}

/// Descriptor privilege level.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[repr(u8)]
pub enum Dpl {
    Ring0 = 0,
    Ring3 = 3,
}

impl Dpl {
    #[inline]
    pub const fn into_bits(self) -> u8 {
        self as u8
    }
}
