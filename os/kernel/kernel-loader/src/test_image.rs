//! Hand-assembled ELF64 images for tests.
//!
//! Enabled for this crate's own tests and, through the `test-support`
//! feature, for the tests of crates that drive the loader.

use crate::elf::{EM_X86_64, ET_EXEC, PT_LOAD};
use alloc::vec;
use alloc::vec::Vec;

pub const PF_X: u32 = 1;
pub const PF_W: u32 = 2;
pub const PF_R: u32 = 4;

const PT_NOTE: u32 = 4;

struct Segment {
    p_type: u32,
    vaddr: u64,
    data: Vec<u8>,
    memsz: u64,
    flags: u32,
}

pub struct ImageBuilder {
    e_type: u16,
    entry: u64,
    segments: Vec<Segment>,
}

impl ImageBuilder {
    pub fn new(entry: u64) -> Self {
        Self {
            e_type: ET_EXEC,
            entry,
            segments: Vec::new(),
        }
    }

    pub fn e_type(mut self, e_type: u16) -> Self {
        self.e_type = e_type;
        self
    }

    pub fn segment(mut self, vaddr: u64, data: &[u8], memsz: u64, flags: u32) -> Self {
        self.segments.push(Segment {
            p_type: PT_LOAD,
            vaddr,
            data: data.to_vec(),
            memsz,
            flags,
        });
        self
    }

    pub fn note(mut self) -> Self {
        self.segments.push(Segment {
            p_type: PT_NOTE,
            vaddr: 0,
            data: vec![0; 8],
            memsz: 8,
            flags: PF_R,
        });
        self
    }

    pub fn build(self) -> Vec<u8> {
        let phnum = self.segments.len();
        let mut out = vec![0u8; 64 + phnum * 56];

        out[0..4].copy_from_slice(b"\x7FELF");
        out[4] = 2;
        out[5] = 1;
        out[6] = 1;
        out[16..18].copy_from_slice(&self.e_type.to_le_bytes());
        out[18..20].copy_from_slice(&EM_X86_64.to_le_bytes());
        out[20..24].copy_from_slice(&1u32.to_le_bytes());
        out[24..32].copy_from_slice(&self.entry.to_le_bytes());
        out[32..40].copy_from_slice(&64u64.to_le_bytes());
        out[52..54].copy_from_slice(&64u16.to_le_bytes());
        out[54..56].copy_from_slice(&56u16.to_le_bytes());
        out[56..58].copy_from_slice(&(phnum as u16).to_le_bytes());

        for (i, seg) in self.segments.iter().enumerate() {
            let offset = out.len() as u64;
            let ph = 64 + i * 56;
            out[ph..ph + 4].copy_from_slice(&seg.p_type.to_le_bytes());
            out[ph + 4..ph + 8].copy_from_slice(&seg.flags.to_le_bytes());
            out[ph + 8..ph + 16].copy_from_slice(&offset.to_le_bytes());
            out[ph + 16..ph + 24].copy_from_slice(&seg.vaddr.to_le_bytes());
            out[ph + 24..ph + 32].copy_from_slice(&seg.vaddr.to_le_bytes());
            out[ph + 32..ph + 40].copy_from_slice(&(seg.data.len() as u64).to_le_bytes());
            out[ph + 40..ph + 48].copy_from_slice(&seg.memsz.to_le_bytes());
            out[ph + 48..ph + 56].copy_from_slice(&0x1000u64.to_le_bytes());
            out.extend_from_slice(&seg.data);
        }
        out
    }
}
