//! # Address Space (x86-64, PML4-rooted)
//!
//! [`AddressSpace`] edits the 4-level tree hanging off one PML4 frame.
//!
//! ## Operations
//!
//! - [`map`](AddressSpace::map) backs one page with a fresh, zero-filled frame.
//! - [`unmap`](AddressSpace::unmap) removes a leaf and returns its frame to the allocator.
//! - [`protect`](AddressSpace::protect) rewrites the policy bits of an existing leaf.
//! - [`translate`](AddressSpace::translate) explains a walk without touching anything.
//! - [`reclaim_lower_half`](AddressSpace::reclaim_lower_half) drops every user-half subtree.
//!
//! ## Design
//!
//! - Missing intermediate tables are allocated on demand, zeroed, and linked
//!   as present + writable + user + executable. The leaf alone carries the
//!   caller's [`PageAccess`].
//! - `map` never overwrites a present leaf.
//! - If `map` runs out of frames after creating some intermediate tables,
//!   those tables stay linked. They are empty but valid and will be reused by
//!   the next mapping in the same region.
//! - `reclaim_lower_half` frees PDPT, PD and PT frames but **not** the data
//!   frames the PTs point at.
//! - Every physical frame is reached through the [`PhysMapper`]; the tree is
//!   never dereferenced by physical address.

use crate::page_table::PageTable;
use crate::translation::Translation;
use crate::{FrameAlloc, PageAccess, PageEntry, PhysMapper, Tlb, VmemError};
use kernel_info::memory::LOWER_HALF_PML4_SLOTS;
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, VirtualAddress};
use log::{debug, trace};

/// Bytes covered by a huge leaf at PDPT (1 GiB) and PD (2 MiB) level.
const HUGE_SPAN: [u64; 3] = [0, 1 << 30, 1 << 21];

/// Handle to a single, concrete address space.
pub struct AddressSpace<'m, M: PhysMapper, T: Tlb> {
    root: PhysicalAddress,
    mapper: &'m M,
    tlb: T,
}

impl<'m, M: PhysMapper, T: Tlb> AddressSpace<'m, M, T> {
    /// Wrap an existing PML4 frame.
    #[inline]
    pub const fn new(mapper: &'m M, root: PhysicalAddress, tlb: T) -> Self {
        Self { root, mapper, tlb }
    }

    /// View the **currently active** address space by reading CR3.
    ///
    /// # Safety
    /// Must run at CPL0 with paging enabled.
    #[cfg(feature = "asm")]
    #[inline]
    pub unsafe fn from_current(mapper: &'m M, tlb: T) -> Self {
        use kernel_registers::{Cr3, LoadRegisterUnsafe};
        let root = unsafe { Cr3::load_unsafe() }.pml4_phys();
        Self::new(mapper, root, tlb)
    }

    /// Physical address of the PML4.
    #[inline]
    pub const fn root(&self) -> PhysicalAddress {
        self.root
    }

    #[inline]
    #[allow(clippy::mut_from_ref)]
    fn table(&self, frame: PhysicalAddress) -> &mut PageTable {
        // SAFETY: every frame reached here is either the root or was linked
        // by this module, so it holds a paging structure.
        unsafe { self.mapper.phys_to_mut::<PageTable>(frame) }
    }

    fn alloc_zeroed<A: FrameAlloc>(&self, alloc: &mut A) -> Result<PhysicalAddress, VmemError> {
        let frame = alloc.alloc_4k().ok_or(VmemError::AllocationExhausted)?;
        self.table(frame).zero();
        Ok(frame)
    }

    /// Walk the existing chain down to the PT covering `va`.
    #[allow(clippy::mut_from_ref)]
    fn leaf_table(&self, va: VirtualAddress) -> Result<&mut PageTable, VmemError> {
        let mut table = self.table(self.root);
        for &index in &va.table_indices()[..3] {
            let entry = table.entry(index);
            if !entry.present {
                return Err(VmemError::NotMapped(va));
            }
            if entry.huge {
                return Err(VmemError::HugePage(va));
            }
            table = self.table(entry.frame);
        }
        Ok(table)
    }

    /// Like [`leaf_table`](Self::leaf_table), creating missing levels.
    #[allow(clippy::mut_from_ref)]
    fn ensure_leaf_table<A: FrameAlloc>(
        &self,
        alloc: &mut A,
        va: VirtualAddress,
    ) -> Result<&mut PageTable, VmemError> {
        let mut table = self.table(self.root);
        for &index in &va.table_indices()[..3] {
            let entry = table.entry(index);
            let next = if entry.present {
                if entry.huge {
                    return Err(VmemError::HugePage(va));
                }
                entry.frame
            } else {
                let frame = self.alloc_zeroed(alloc)?;
                table.set(index, PageEntry::table(frame));
                trace!("linked table {frame} at slot {index} for {va}");
                frame
            };
            table = self.table(next);
        }
        Ok(table)
    }

    /// Map one 4 KiB page at `va` to a fresh zero-filled frame.
    ///
    /// Returns the frame now backing `va`.
    ///
    /// # Errors
    /// - [`VmemError::Unaligned`] if `va` is not page aligned.
    /// - [`VmemError::AlreadyMapped`] if a present leaf exists; it is left untouched.
    /// - [`VmemError::AllocationExhausted`] if a table or data frame could not be allocated.
    pub fn map<A: FrameAlloc>(
        &self,
        alloc: &mut A,
        va: VirtualAddress,
        access: PageAccess,
    ) -> Result<PhysicalAddress, VmemError> {
        if !va.is_page_aligned() {
            return Err(VmemError::Unaligned(va));
        }

        let pt = self.ensure_leaf_table(alloc, va)?;
        let index = va.pt_index();
        if pt.entry(index).present {
            return Err(VmemError::AlreadyMapped(va));
        }

        let frame = self.alloc_zeroed(alloc)?;
        pt.set(index, PageEntry::leaf(frame, access));
        trace!("mapped {va} -> {frame} {access:?}");
        Ok(frame)
    }

    /// Remove the leaf for `va` and free its data frame.
    ///
    /// Intermediate tables stay in place. Returns the freed frame.
    ///
    /// # Errors
    /// [`VmemError::NotMapped`] if any level of the walk is absent.
    pub fn unmap<A: FrameAlloc>(
        &self,
        alloc: &mut A,
        va: VirtualAddress,
    ) -> Result<PhysicalAddress, VmemError> {
        if !va.is_page_aligned() {
            return Err(VmemError::Unaligned(va));
        }

        let pt = self.leaf_table(va)?;
        let index = va.pt_index();
        let entry = pt.entry(index);
        if !entry.present {
            return Err(VmemError::NotMapped(va));
        }

        pt.clear(index);
        alloc.free_4k(entry.frame);
        self.tlb.invalidate_page(va);
        trace!("unmapped {va} (frame {})", entry.frame);
        Ok(entry.frame)
    }

    /// Replace the access policy of the existing leaf for `va`.
    ///
    /// # Errors
    /// [`VmemError::NotMapped`] if any level of the walk is absent; nothing is created.
    pub fn protect(&self, va: VirtualAddress, access: PageAccess) -> Result<(), VmemError> {
        if !va.is_page_aligned() {
            return Err(VmemError::Unaligned(va));
        }

        let pt = self.leaf_table(va)?;
        let index = va.pt_index();
        let entry = pt.entry(index);
        if !entry.present {
            return Err(VmemError::NotMapped(va));
        }

        pt.set(index, entry.with_access(access));
        self.tlb.invalidate_page(va);
        trace!("protected {va} {access:?}");
        Ok(())
    }

    /// Walk the tree for `va` and record what was found at each level.
    #[must_use]
    pub fn translate(&self, va: VirtualAddress) -> Translation {
        let mut levels = [None; 4];
        let mut table = self.table(self.root);
        let indices = va.table_indices();

        for (level, &index) in indices.iter().enumerate() {
            let entry = table.entry(index);
            levels[level] = Some(entry);
            if !entry.present {
                break;
            }

            let leaf_span = if level == 3 {
                Some(PAGE_SIZE)
            } else if entry.huge && level > 0 {
                Some(HUGE_SPAN[level])
            } else {
                None
            };

            if let Some(span) = leaf_span {
                let base = entry.frame.as_u64() & !(span - 1);
                let phys = PhysicalAddress::new(base + (va.as_u64() & (span - 1)));
                return Translation {
                    va,
                    levels,
                    phys: Some(phys),
                };
            }

            table = self.table(entry.frame);
        }

        Translation {
            va,
            levels,
            phys: None,
        }
    }

    /// Physical address `va` currently resolves to.
    #[inline]
    #[must_use]
    pub fn query(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        self.translate(va).phys
    }

    /// Tear down every user-half subtree and flush the whole TLB.
    ///
    /// PDPT, PD and PT frames go back to the allocator. Data frames
    /// referenced by the PTs are **not** freed. Returns the number of table
    /// frames released.
    pub fn reclaim_lower_half<A: FrameAlloc>(&self, alloc: &mut A) -> usize {
        let pml4 = self.table(self.root);
        let mut freed = 0;

        for index in 0..LOWER_HALF_PML4_SLOTS {
            let entry = pml4.entry(index);
            if !entry.present {
                continue;
            }
            freed += self.free_tables(alloc, entry.frame, 3);
            pml4.clear(index);
        }

        self.tlb.flush_all();
        debug!("reclaimed lower half: {freed} table frames freed");
        freed
    }

    /// Free the table at `frame` and all tables below it.
    ///
    /// `depth` is 3 for a PDPT, 2 for a PD and 1 for a PT.
    fn free_tables<A: FrameAlloc>(&self, alloc: &mut A, frame: PhysicalAddress, depth: u8) -> usize {
        let mut freed = 0;
        if depth > 1 {
            for (_, child) in self.table(frame).present() {
                if !child.huge {
                    freed += self.free_tables(alloc, child.frame, depth - 1);
                }
            }
        }
        alloc.free_4k(frame);
        freed + 1
    }

    /// Copy `bytes` into the mapped range starting at `va`.
    ///
    /// Goes through the page tables and the mapper, so it works whether or
    /// not this address space is the active one.
    ///
    /// # Errors
    /// [`VmemError::NotMapped`] for the first page of the range that is absent.
    /// Bytes before that page have already been written.
    pub fn write_bytes(&self, va: VirtualAddress, bytes: &[u8]) -> Result<(), VmemError> {
        self.for_each_chunk(va, bytes.len(), |page, done| {
            let len = page.len();
            page.copy_from_slice(&bytes[done..done + len]);
        })
    }

    /// Copy from the mapped range starting at `va` into `buf`.
    ///
    /// # Errors
    /// [`VmemError::NotMapped`] for the first page of the range that is absent.
    pub fn read_bytes(&self, va: VirtualAddress, buf: &mut [u8]) -> Result<(), VmemError> {
        let len = buf.len();
        self.for_each_chunk(va, len, |page, done| {
            let n = page.len();
            buf[done..done + n].copy_from_slice(page);
        })
    }

    fn for_each_chunk<F>(&self, va: VirtualAddress, len: usize, mut f: F) -> Result<(), VmemError>
    where
        F: FnMut(&mut [u8], usize),
    {
        let mut done = 0usize;
        while done < len {
            let cur = va + done as u64;
            let pa = self
                .query(cur)
                .ok_or_else(|| VmemError::NotMapped(cur.align_down()))?;

            #[allow(clippy::cast_possible_truncation)]
            let offset = cur.page_offset() as usize;
            #[allow(clippy::cast_possible_truncation)]
            let chunk = (len - done).min(PAGE_SIZE as usize - offset);

            // SAFETY: `pa` is the frame backing a present leaf.
            let page = unsafe { self.mapper.phys_to_mut::<[u8; 4096]>(pa.frame_base()) };
            f(&mut page[offset..offset + chunk], done);
            done += chunk;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingTlb, SimRam, VecFrameAlloc};

    fn setup(frames: usize) -> (SimRam, VecFrameAlloc, PhysicalAddress) {
        let ram = SimRam::with_frames(frames);
        let mut alloc = VecFrameAlloc::covering(&ram);
        let root = alloc.alloc_4k().expect("root frame");
        unsafe { ram.phys_to_mut::<PageTable>(root) }.zero();
        (ram, alloc, root)
    }

    #[test]
    fn map_creates_tables_and_leaf() {
        let (ram, mut alloc, root) = setup(16);
        let tlb = RecordingTlb::default();
        let aspace = AddressSpace::new(&ram, root, &tlb);
        let before = alloc.free_count();

        let va = VirtualAddress::new(0x40_1000);
        let frame = aspace
            .map(&mut alloc, va, PageAccess::USER_RW)
            .expect("map");

        // PDPT + PD + PT + data frame.
        assert_eq!(before - alloc.free_count(), 4);

        let t = aspace.translate(va);
        for level in &t.levels[..3] {
            let e = level.expect("intermediate level");
            assert!(e.present && e.writable && e.user && !e.no_execute);
        }
        let leaf = t.leaf().expect("leaf");
        assert_eq!(leaf.frame, frame);
        assert!(leaf.user && leaf.writable && leaf.no_execute);
        assert_eq!(t.phys, Some(frame));
        assert_eq!(aspace.query(va + 0x123), Some(frame + 0x123));
    }

    #[test]
    fn map_zero_fills_data_frame() {
        let ram = SimRam::with_frames(16);
        ram.fill(0xAA);
        let mut alloc = VecFrameAlloc::covering(&ram);
        let root = alloc.alloc_4k().expect("root frame");
        unsafe { ram.phys_to_mut::<PageTable>(root) }.zero();
        let aspace = AddressSpace::new(&ram, root, RecordingTlb::default());

        let va = VirtualAddress::new(0x1000_0000);
        aspace
            .map(&mut alloc, va, PageAccess::USER_RW)
            .expect("map");
        let mut buf = [0xFFu8; 4096];
        aspace.read_bytes(va, &mut buf).expect("read");
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn map_twice_fails_without_side_effects() {
        let (ram, mut alloc, root) = setup(16);
        let aspace = AddressSpace::new(&ram, root, RecordingTlb::default());
        let va = VirtualAddress::new(0x40_0000);

        let frame = aspace.map(&mut alloc, va, PageAccess::USER_RW).expect("map");
        let free = alloc.free_count();
        assert_eq!(
            aspace.map(&mut alloc, va, PageAccess::KERNEL_RW),
            Err(VmemError::AlreadyMapped(va))
        );
        assert_eq!(alloc.free_count(), free);
        assert_eq!(aspace.translate(va).leaf().map(|e| e.frame), Some(frame));
        assert!(aspace.translate(va).leaf().is_some_and(|e| e.user));
    }

    #[test]
    fn map_rejects_unaligned() {
        let (ram, mut alloc, root) = setup(8);
        let aspace = AddressSpace::new(&ram, root, RecordingTlb::default());
        let va = VirtualAddress::new(0x40_0010);
        assert_eq!(
            aspace.map(&mut alloc, va, PageAccess::USER_RW),
            Err(VmemError::Unaligned(va))
        );
    }

    #[test]
    fn map_reports_exhaustion_and_keeps_partial_tables() {
        // Frame 0 is never handed out; root, PDPT and PD fit, PT does not.
        let (ram, mut alloc, root) = setup(4);
        let aspace = AddressSpace::new(&ram, root, RecordingTlb::default());
        let va = VirtualAddress::new(0x40_0000);

        assert_eq!(
            aspace.map(&mut alloc, va, PageAccess::USER_RW),
            Err(VmemError::AllocationExhausted)
        );
        let t = aspace.translate(va);
        assert!(t.levels[0].is_some_and(|e| e.present));
        assert!(t.levels[1].is_some_and(|e| e.present));
        assert!(!t.is_mapped());
    }

    #[test]
    fn unmap_frees_leaf_and_invalidates() {
        let (ram, mut alloc, root) = setup(16);
        let tlb = RecordingTlb::default();
        let aspace = AddressSpace::new(&ram, root, &tlb);
        let va = VirtualAddress::new(0x40_0000);

        let frame = aspace.map(&mut alloc, va, PageAccess::USER_RW).expect("map");
        let free = alloc.free_count();
        assert_eq!(aspace.unmap(&mut alloc, va), Ok(frame));
        assert_eq!(alloc.free_count(), free + 1);
        assert!(!aspace.translate(va).is_mapped());
        assert_eq!(tlb.invalidated(), vec![va]);
    }

    #[test]
    fn unmap_missing_fails() {
        let (ram, mut alloc, root) = setup(16);
        let aspace = AddressSpace::new(&ram, root, RecordingTlb::default());
        let va = VirtualAddress::new(0x40_0000);
        assert_eq!(aspace.unmap(&mut alloc, va), Err(VmemError::NotMapped(va)));

        aspace.map(&mut alloc, va, PageAccess::USER_RW).expect("map");
        let sibling = va + PAGE_SIZE;
        assert_eq!(
            aspace.unmap(&mut alloc, sibling),
            Err(VmemError::NotMapped(sibling))
        );
    }

    #[test]
    fn protect_rewrites_policy_only() {
        let (ram, mut alloc, root) = setup(16);
        let tlb = RecordingTlb::default();
        let aspace = AddressSpace::new(&ram, root, &tlb);
        let va = VirtualAddress::new(0x40_1000);

        let frame = aspace.map(&mut alloc, va, PageAccess::KERNEL_RW).expect("map");
        aspace
            .protect(va, PageAccess::new(true, false, true))
            .expect("protect");

        let leaf = aspace.translate(va).leaf().expect("leaf");
        assert_eq!(leaf.frame, frame);
        assert!(leaf.user && !leaf.writable && !leaf.no_execute);
        assert_eq!(tlb.invalidated(), vec![va]);
    }

    #[test]
    fn protect_unmapped_creates_nothing() {
        let (ram, mut alloc, root) = setup(16);
        let aspace = AddressSpace::new(&ram, root, RecordingTlb::default());
        let va = VirtualAddress::new(0x40_0000);
        let free = alloc.free_count();

        assert_eq!(
            aspace.protect(va, PageAccess::USER_RW),
            Err(VmemError::NotMapped(va))
        );
        assert_eq!(alloc.free_count(), free);
        assert_eq!(aspace.translate(va).levels[0].map(|e| e.present), Some(false));
    }

    #[test]
    fn translate_renders_each_level() {
        let (ram, mut alloc, root) = setup(16);
        let aspace = AddressSpace::new(&ram, root, RecordingTlb::default());
        let va = VirtualAddress::new(0x40_1000);
        aspace.map(&mut alloc, va, PageAccess::USER_RW).expect("map");

        let text = format!("{}", aspace.translate(va));
        assert!(text.starts_with("translate 0x0000000000401000:"));
        assert!(text.contains("PML4[  0] P=1 RW=1 US=1 NX=0"));
        assert!(text.contains("PD  [  2]"));
        assert!(text.contains("PT  [  1] P=1 RW=1 US=1 NX=1"));

        let missing = format!("{}", aspace.translate(VirtualAddress::new(0x7000_0000_0000)));
        assert!(missing.ends_with("=> not mapped"));
    }

    #[test]
    fn reclaim_frees_tables_but_not_leaves() {
        let (ram, mut alloc, root) = setup(32);
        let tlb = RecordingTlb::default();
        let aspace = AddressSpace::new(&ram, root, &tlb);

        let a = VirtualAddress::new(0x40_0000);
        let b = VirtualAddress::new(0x0700_0000_0000);
        aspace.map(&mut alloc, a, PageAccess::USER_RW).expect("map a");
        aspace.map(&mut alloc, a + PAGE_SIZE, PageAccess::USER_RW).expect("map a+1");
        aspace.map(&mut alloc, b, PageAccess::USER_RW).expect("map b");
        let free = alloc.free_count();

        // Two PDPT/PD/PT chains.
        assert_eq!(aspace.reclaim_lower_half(&mut alloc), 6);
        assert_eq!(alloc.free_count(), free + 6);
        assert_eq!(tlb.flushes(), 1);
        assert!(!aspace.translate(a).is_mapped());
        assert!(!aspace.translate(b).is_mapped());

        // The same addresses can be mapped again.
        aspace.map(&mut alloc, a, PageAccess::USER_RW).expect("remap a");
    }

    #[test]
    fn reclaim_leaves_upper_half_alone() {
        let (ram, mut alloc, root) = setup(16);
        let aspace = AddressSpace::new(&ram, root, RecordingTlb::default());
        let high = VirtualAddress::new(0xffff_8000_0000_0000);
        aspace.map(&mut alloc, high, PageAccess::KERNEL_RW).expect("map");

        assert_eq!(aspace.reclaim_lower_half(&mut alloc), 0);
        assert!(aspace.translate(high).is_mapped());
    }

    #[test]
    fn write_and_read_across_pages() {
        let (ram, mut alloc, root) = setup(16);
        let aspace = AddressSpace::new(&ram, root, RecordingTlb::default());
        let va = VirtualAddress::new(0x40_0000);
        aspace.map(&mut alloc, va, PageAccess::USER_RW).expect("map 0");
        aspace.map(&mut alloc, va + PAGE_SIZE, PageAccess::USER_RW).expect("map 1");

        let data: Vec<u8> = (0..64).collect();
        let start = va + (PAGE_SIZE - 32);
        aspace.write_bytes(start, &data).expect("write");

        let mut back = [0u8; 64];
        aspace.read_bytes(start, &mut back).expect("read");
        assert_eq!(&back[..], &data[..]);

        let past = va + 2 * PAGE_SIZE;
        assert_eq!(
            aspace.write_bytes(VirtualAddress::new(past.as_u64() - 1), &[1, 2]),
            Err(VmemError::NotMapped(past))
        );
    }
}
