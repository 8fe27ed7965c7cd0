//! # stivale2 Boot Interface
//!
//! The bootloader hands the kernel a [`Stivale2Struct`] whose `tags` field
//! heads a singly linked list of tagged records. Every record starts with a
//! [`TagHeader`] (`identifier`, `next`) followed by tag-specific payload.
//!
//! Only the tags the kernel consumes are modelled:
//!
//! | Tag | Identifier | Payload |
//! |-----|------------|---------|
//! | HHDM | [`STRUCT_TAG_HHDM_ID`] | direct-map base |
//! | Memory map | [`STRUCT_TAG_MEMMAP_ID`] | `{base, length, type}` entries |
//! | Modules | [`STRUCT_TAG_MODULES_ID`] | `{begin, end, name}` entries |
//! | Terminal | [`STRUCT_TAG_TERMINAL_ID`] | `term_write` callback |
//!
//! With the "higher half pointers" header flag set, every pointer inside the
//! tags is already a dereferenceable kernel virtual address.

use core::fmt;
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, align_down, align_up};

pub const HEADER_TAG_TERMINAL_ID: u64 = 0xa85d_499b_1823_be72;
pub const HEADER_TAG_UNMAP_NULL_ID: u64 = 0x9291_9432_b16f_e7e7;

pub const STRUCT_TAG_HHDM_ID: u64 = 0xb0ed_257d_b18c_b58f;
pub const STRUCT_TAG_MEMMAP_ID: u64 = 0x2187_f79e_8612_de07;
pub const STRUCT_TAG_MODULES_ID: u64 = 0x4b6f_e466_aade_04ce;
pub const STRUCT_TAG_TERMINAL_ID: u64 = 0xc2b3_f4c3_233b_0974;

/// Memory map entry type of RAM the kernel may hand out.
pub const MEMMAP_USABLE: u32 = 1;

/// Header flags: higher-half pointers, protected memory ranges, virtual
/// kernel mappings, and the always-required bit 4.
pub const HEADER_FLAGS: u64 = 0x1e;

/// Callback the bootloader's terminal exposes: `(buffer, length)`.
pub type TermWriteFn = extern "C" fn(*const u8, u64);

/// Common prefix of every header and struct tag.
#[repr(C)]
#[derive(Debug)]
pub struct TagHeader {
    pub identifier: u64,
    pub next: *const TagHeader,
}

/// The kernel's request, placed in the `.stivale2hdr` section.
#[repr(C)]
pub struct Stivale2Header {
    /// Zero selects the ELF entry point.
    pub entry_point: u64,
    pub stack: *const u8,
    pub flags: u64,
    pub tags: *const TagHeader,
}

/// Asks for the bootloader's terminal.
#[repr(C)]
pub struct HeaderTagTerminal {
    pub tag: TagHeader,
    pub flags: u64,
    pub callback: u64,
}

/// Asks the bootloader to leave virtual address zero unmapped.
#[repr(C)]
pub struct HeaderTagUnmapNull {
    pub tag: TagHeader,
}

// The header and its tags are read by the bootloader only.
#[allow(unsafe_code)]
unsafe impl Sync for Stivale2Header {}
#[allow(unsafe_code)]
unsafe impl Sync for HeaderTagTerminal {}
#[allow(unsafe_code)]
unsafe impl Sync for HeaderTagUnmapNull {}

/// What the bootloader passes to `_start`.
#[repr(C)]
pub struct Stivale2Struct {
    pub bootloader_brand: [u8; 64],
    pub bootloader_version: [u8; 64],
    pub tags: *const TagHeader,
}

#[repr(C)]
pub struct HhdmTag {
    pub tag: TagHeader,
    pub addr: u64,
}

#[repr(C)]
pub struct MemmapTag {
    pub tag: TagHeader,
    pub entries: u64,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MemmapEntry {
    pub base: u64,
    pub length: u64,
    pub kind: u32,
    pub unused: u32,
}

#[repr(C)]
pub struct ModulesTag {
    pub tag: TagHeader,
    pub module_count: u64,
}

#[repr(C)]
pub struct Stivale2Module {
    pub begin: u64,
    pub end: u64,
    pub string: [u8; 128],
}

#[repr(C)]
pub struct TerminalTag {
    pub tag: TagHeader,
    pub flags: u32,
    pub cols: u16,
    pub rows: u16,
    pub term_write: u64,
    pub max_length: u64,
}

impl Stivale2Module {
    /// Module name up to the first NUL.
    #[must_use]
    pub fn name(&self) -> &str {
        let len = self
            .string
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.string.len());
        core::str::from_utf8(&self.string[..len]).unwrap_or("")
    }
}

/// A program image supplied by the bootloader.
#[derive(Copy, Clone)]
pub struct BootModule<'a> {
    pub name: &'a str,
    pub image: &'a [u8],
}

impl fmt::Debug for BootModule<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootModule")
            .field("name", &self.name)
            .field("len", &self.image.len())
            .finish()
    }
}

/// Half-open physical range `[base, end)`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct UsableRange {
    pub base: PhysicalAddress,
    pub end: PhysicalAddress,
}

impl UsableRange {
    /// Shrinks the range to whole 4 KiB frames.
    #[must_use]
    pub const fn page_aligned(self) -> Self {
        let base = align_up(self.base.as_u64(), PAGE_SIZE);
        let end = align_down(self.end.as_u64(), PAGE_SIZE);
        let end = if end < base { base } else { end };
        Self {
            base: PhysicalAddress::new(base),
            end: PhysicalAddress::new(end),
        }
    }
}

/// Read-only view over the bootloader's tag list.
#[derive(Copy, Clone)]
pub struct BootInfo {
    head: *const TagHeader,
}

// Boot tags are never written after handoff.
#[allow(unsafe_code)]
unsafe impl Send for BootInfo {}
#[allow(unsafe_code)]
unsafe impl Sync for BootInfo {}

#[allow(unsafe_code)]
impl BootInfo {
    /// # Safety
    /// `info` must point at a valid [`Stivale2Struct`] whose tag list (and
    /// everything the tags point at) stays mapped and unmodified for the
    /// remaining lifetime of the kernel.
    #[must_use]
    pub unsafe fn from_raw(info: *const Stivale2Struct) -> Self {
        let head = if info.is_null() {
            core::ptr::null()
        } else {
            unsafe { (*info).tags }
        };
        Self { head }
    }

    fn find_raw(&self, id: u64) -> *const TagHeader {
        let mut current = self.head;
        while !current.is_null() {
            // SAFETY: guaranteed by `from_raw`.
            let tag = unsafe { &*current };
            if tag.identifier == id {
                return current;
            }
            current = tag.next;
        }
        core::ptr::null()
    }

    /// Walks the tag list for `id`.
    #[must_use]
    pub fn find_tag(&self, id: u64) -> Option<&'static TagHeader> {
        // SAFETY: guaranteed by `from_raw`.
        unsafe { self.find_raw(id).as_ref() }
    }

    fn find<T>(&self, id: u64) -> Option<*const T> {
        let raw = self.find_raw(id);
        (!raw.is_null()).then(|| raw.cast::<T>())
    }

    /// Base of the higher-half direct map.
    #[must_use]
    pub fn hhdm_base(&self) -> Option<u64> {
        self.find::<HhdmTag>(STRUCT_TAG_HHDM_ID)
            .map(|t| unsafe { (*t).addr })
    }

    /// All memory map entries, usable or not.
    #[must_use]
    pub fn memory_map(&self) -> &'static [MemmapEntry] {
        let Some(tag) = self.find::<MemmapTag>(STRUCT_TAG_MEMMAP_ID) else {
            return &[];
        };
        // SAFETY: the entry array directly follows the tag header.
        unsafe {
            #[allow(clippy::cast_possible_truncation)]
            let count = (*tag).entries as usize;
            core::slice::from_raw_parts(tag.add(1).cast::<MemmapEntry>(), count)
        }
    }

    /// Usable RAM ranges in the order the bootloader reported them.
    pub fn usable_ranges(&self) -> impl Iterator<Item = UsableRange> {
        self.memory_map()
            .iter()
            .filter(|e| e.kind == MEMMAP_USABLE)
            .map(|e| UsableRange {
                base: PhysicalAddress::new(e.base),
                end: PhysicalAddress::new(e.base + e.length),
            })
    }

    #[must_use]
    pub fn raw_modules(&self) -> &'static [Stivale2Module] {
        let Some(tag) = self.find::<ModulesTag>(STRUCT_TAG_MODULES_ID) else {
            return &[];
        };
        // SAFETY: the module array directly follows the tag header.
        unsafe {
            #[allow(clippy::cast_possible_truncation)]
            let count = (*tag).module_count as usize;
            core::slice::from_raw_parts(tag.add(1).cast::<Stivale2Module>(), count)
        }
    }

    /// Boot modules as name/image pairs.
    pub fn modules(&self) -> impl Iterator<Item = BootModule<'static>> + Clone {
        self.raw_modules().iter().map(|m| {
            #[allow(clippy::cast_possible_truncation)]
            let len = m.end.saturating_sub(m.begin) as usize;
            // SAFETY: module images stay loaded for the whole boot session.
            let image = unsafe { core::slice::from_raw_parts(m.begin as *const u8, len) };
            BootModule {
                name: m.name(),
                image,
            }
        })
    }

    /// The terminal's write callback.
    #[must_use]
    pub fn terminal_write(&self) -> Option<TermWriteFn> {
        let tag = self.find::<TerminalTag>(STRUCT_TAG_TERMINAL_ID)?;
        // SAFETY: guaranteed by `from_raw`.
        let addr = unsafe { (*tag).term_write };
        if addr == 0 {
            return None;
        }
        // SAFETY: the bootloader reports a valid function address.
        Some(unsafe { core::mem::transmute::<u64, TermWriteFn>(addr) })
    }
}
