//! # Segment selectors
//!
//! ```text
//!  15            3 2  1  0
//! +----------------+--+----+
//! |   Index[12:0]  |TI| RPL|
//! +----------------+--+----+  (TI=0 → GDT)
//! ```

use crate::privilege::Rpl;
use bitfield_struct::bitfield;

/// A 16-bit selector as loaded into CS/DS/SS or TR.
#[bitfield(u16)]
#[derive(PartialEq, Eq)]
pub struct SegmentSelector {
    #[bits(2)]
    pub rpl: u8,
    /// Table indicator; always 0 (GDT) here.
    pub ti: bool,
    #[bits(13)]
    pub index: u16,
}

impl SegmentSelector {
    /// Selector for GDT entry `index`.
    #[inline]
    pub const fn gdt(index: u16, rpl: Rpl) -> Self {
        Self::new().with_index(index).with_rpl(rpl.into_bits())
    }

    /// Raw value for segment loads and `iretq` frames.
    #[inline]
    pub const fn encode(self) -> u16 {
        self.into_bits()
    }
}
