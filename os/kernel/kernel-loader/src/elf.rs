//! Minimal, allocation-free ELF64 reader.
//!
//! Only what loading a static x86-64 executable needs: the file header and
//! the program header table. Fields are decoded from little-endian bytes, so
//! the image may sit at any alignment.

use bitfield_struct::bitfield;
use kernel_memory_addresses::VirtualAddress;

pub const ET_EXEC: u16 = 2;
pub const EM_X86_64: u16 = 62;
pub const PT_LOAD: u32 = 1;

const EHDR_SIZE: usize = 64;
const PHDR_SIZE: usize = 56;

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ElfError {
    #[error("image is shorter than an ELF header")]
    TooShort,
    #[error("missing ELF magic")]
    BadMagic,
    #[error("not a 64-bit ELF image")]
    BadClass,
    #[error("not a little-endian ELF image")]
    BadEncoding,
    #[error("machine {0} is not x86-64")]
    BadMachine(u16),
    #[error("unexpected program header size {0}")]
    BadPhentsize(u16),
    #[error("program header table lies outside the image")]
    PhdrOutOfBounds,
    #[error("segment at {0} reads past the end of the image")]
    SegmentOutOfBounds(VirtualAddress),
    #[error("segment at {0} has p_filesz > p_memsz")]
    SegmentSizes(VirtualAddress),
    #[error("segment at {0} reaches into the kernel half")]
    SegmentNotUser(VirtualAddress),
}

/// `Elf64_Phdr.p_flags`: bit 0 execute, bit 1 write, bit 2 read.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct PFlags {
    pub execute: bool,
    pub write: bool,
    pub read: bool,
    #[bits(29)]
    _reserved: u32,
}

/// One decoded program header.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ProgramHeader {
    pub p_type: u32,
    pub flags: PFlags,
    pub offset: u64,
    pub vaddr: VirtualAddress,
    pub filesz: u64,
    pub memsz: u64,
}

impl ProgramHeader {
    #[must_use]
    pub const fn is_load(&self) -> bool {
        self.p_type == PT_LOAD
    }
}

#[inline]
fn le16(x: &[u8]) -> u16 {
    u16::from_le_bytes([x[0], x[1]])
}

#[inline]
fn le32(x: &[u8]) -> u32 {
    u32::from_le_bytes([x[0], x[1], x[2], x[3]])
}

#[inline]
fn le64(x: &[u8]) -> u64 {
    u64::from_le_bytes([x[0], x[1], x[2], x[3], x[4], x[5], x[6], x[7]])
}

/// Validated view over an ELF64 image.
#[derive(Copy, Clone, Debug)]
pub struct ElfView<'a> {
    bytes: &'a [u8],
    e_type: u16,
    entry: VirtualAddress,
    phoff: usize,
    phnum: usize,
}

impl<'a> ElfView<'a> {
    /// Check the identification bytes and bounds of the program header table.
    ///
    /// # Errors
    /// Any [`ElfError`] describing the first structural problem found.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, ElfError> {
        if bytes.len() < EHDR_SIZE {
            return Err(ElfError::TooShort);
        }
        if &bytes[0..4] != b"\x7FELF" {
            return Err(ElfError::BadMagic);
        }
        if bytes[4] != 2 {
            return Err(ElfError::BadClass);
        }
        if bytes[5] != 1 {
            return Err(ElfError::BadEncoding);
        }

        let machine = le16(&bytes[18..20]);
        if machine != EM_X86_64 {
            return Err(ElfError::BadMachine(machine));
        }

        let phentsize = le16(&bytes[54..56]);
        let phnum = usize::from(le16(&bytes[56..58]));
        if phnum > 0 && usize::from(phentsize) != PHDR_SIZE {
            return Err(ElfError::BadPhentsize(phentsize));
        }

        let phoff = usize::try_from(le64(&bytes[32..40])).map_err(|_| ElfError::PhdrOutOfBounds)?;
        let end = phnum
            .checked_mul(PHDR_SIZE)
            .and_then(|size| size.checked_add(phoff))
            .ok_or(ElfError::PhdrOutOfBounds)?;
        if end > bytes.len() {
            return Err(ElfError::PhdrOutOfBounds);
        }

        Ok(Self {
            bytes,
            e_type: le16(&bytes[16..18]),
            entry: VirtualAddress::new(le64(&bytes[24..32])),
            phoff,
            phnum,
        })
    }

    #[must_use]
    pub const fn e_type(&self) -> u16 {
        self.e_type
    }

    /// `true` for a fixed-address executable (`ET_EXEC`).
    #[must_use]
    pub const fn is_executable(&self) -> bool {
        self.e_type == ET_EXEC
    }

    #[must_use]
    pub const fn entry(&self) -> VirtualAddress {
        self.entry
    }

    /// All program headers, in table order.
    pub fn program_headers(&self) -> impl Iterator<Item = ProgramHeader> + '_ {
        (0..self.phnum).map(move |i| {
            let p = self.phoff + i * PHDR_SIZE;
            let s = &self.bytes[p..p + PHDR_SIZE];
            ProgramHeader {
                p_type: le32(&s[0..4]),
                flags: PFlags::from_bits(le32(&s[4..8])),
                offset: le64(&s[8..16]),
                vaddr: VirtualAddress::new(le64(&s[16..24])),
                filesz: le64(&s[32..40]),
                memsz: le64(&s[40..48]),
            }
        })
    }

    /// `PT_LOAD` headers with a nonzero virtual address.
    pub fn load_segments(&self) -> impl Iterator<Item = ProgramHeader> + '_ {
        self.program_headers()
            .filter(|ph| ph.is_load() && !ph.vaddr.is_null())
    }

    /// Bytes of the image that back `ph`, after checking the segment is
    /// loadable into user space.
    ///
    /// # Errors
    /// [`ElfError::SegmentOutOfBounds`], [`ElfError::SegmentSizes`] or
    /// [`ElfError::SegmentNotUser`].
    pub fn segment_bytes(&self, ph: &ProgramHeader) -> Result<&'a [u8], ElfError> {
        if ph.filesz > ph.memsz {
            return Err(ElfError::SegmentSizes(ph.vaddr));
        }
        let last = ph
            .vaddr
            .as_u64()
            .checked_add(ph.memsz.max(1) - 1)
            .ok_or(ElfError::SegmentNotUser(ph.vaddr))?;
        if !ph.vaddr.is_lower_half() || !VirtualAddress::new(last).is_lower_half() {
            return Err(ElfError::SegmentNotUser(ph.vaddr));
        }

        let out_of_bounds = ElfError::SegmentOutOfBounds(ph.vaddr);
        let start = usize::try_from(ph.offset).map_err(|_| out_of_bounds)?;
        let len = usize::try_from(ph.filesz).map_err(|_| out_of_bounds)?;
        let end = start.checked_add(len).ok_or(out_of_bounds)?;
        self.bytes.get(start..end).ok_or(out_of_bounds)
    }
}
