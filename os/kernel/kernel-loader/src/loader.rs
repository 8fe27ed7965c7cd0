use crate::elf::{ElfError, ElfView, ProgramHeader};
use kernel_info::boot::BootModule;
use kernel_info::memory::{USER_STACK_BASE, USER_STACK_PAGES, USER_STACK_RESERVED, USER_STACK_SIZE};
use kernel_memory_addresses::{PAGE_SIZE, VirtualAddress, pages_spanning};
use kernel_vmem::{AddressSpace, FrameAlloc, PageAccess, PhysMapper, Tlb, VmemError};
use log::{debug, info};

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("no boot module with that name")]
    ModuleNotFound,
    #[error("image is not an ET_EXEC executable")]
    NotExecutable,
    #[error("malformed image: {0}")]
    Malformed(#[from] ElfError),
    #[error("failed to map program memory: {0}")]
    AllocationFailed(#[from] VmemError),
}

/// Where a freshly loaded program starts running.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LoadedImage {
    pub entry: VirtualAddress,
    pub stack_top: VirtualAddress,
}

/// First module whose name is exactly `name`.
pub fn find_module<'a, I>(modules: I, name: &str) -> Option<BootModule<'a>>
where
    I: IntoIterator<Item = BootModule<'a>>,
{
    modules.into_iter().find(|m| m.name == name)
}

/// Replace the user half of `aspace` with the program in module `name`.
///
/// The module is located and fully validated before anything is torn down,
/// so [`LoadError::ModuleNotFound`], [`LoadError::NotExecutable`] and
/// [`LoadError::Malformed`] leave the current program intact. An
/// [`LoadError::AllocationFailed`] happens after the old user half is gone.
///
/// Every `PT_LOAD` page is first mapped supervisor-writable, filled with the
/// segment's file bytes (the rest stays zero), then protected as
/// `(user, p_flags.W, p_flags.X)`. A page shared by two segments keeps the
/// union of both policies.
///
/// # Errors
/// See [`LoadError`].
pub fn load<'a, M, T, A, I>(
    aspace: &AddressSpace<'_, M, T>,
    alloc: &mut A,
    modules: I,
    name: &str,
) -> Result<LoadedImage, LoadError>
where
    M: PhysMapper,
    T: Tlb,
    A: FrameAlloc,
    I: IntoIterator<Item = BootModule<'a>>,
{
    let module = find_module(modules, name).ok_or(LoadError::ModuleNotFound)?;
    let elf = ElfView::parse(module.image)?;
    if !elf.is_executable() {
        return Err(LoadError::NotExecutable);
    }
    for ph in elf.load_segments() {
        elf.segment_bytes(&ph)?;
    }

    aspace.reclaim_lower_half(alloc);

    for ph in elf.load_segments() {
        load_segment(aspace, alloc, &elf, &ph)?;
    }

    let stack_top = map_user_stack(aspace, alloc)?;
    info!("loaded {name}: entry {}, stack top {stack_top}", elf.entry());

    Ok(LoadedImage {
        entry: elf.entry(),
        stack_top,
    })
}

fn load_segment<M, T, A>(
    aspace: &AddressSpace<'_, M, T>,
    alloc: &mut A,
    elf: &ElfView<'_>,
    ph: &ProgramHeader,
) -> Result<(), LoadError>
where
    M: PhysMapper,
    T: Tlb,
    A: FrameAlloc,
{
    let first = ph.vaddr.align_down();
    let pages = pages_spanning(ph.vaddr.as_u64(), ph.memsz).max(1);
    debug!(
        "segment {} filesz={:#x} memsz={:#x} flags={:?} ({pages} pages)",
        ph.vaddr, ph.filesz, ph.memsz, ph.flags
    );

    for page in (0..pages).map(|i| first + i * PAGE_SIZE) {
        match aspace.map(alloc, page, PageAccess::KERNEL_RW) {
            Ok(_) | Err(VmemError::AlreadyMapped(_)) => {}
            Err(e) => return Err(e.into()),
        }
    }

    aspace.write_bytes(ph.vaddr, elf.segment_bytes(ph)?)?;

    let wanted = PageAccess::new(true, ph.flags.write(), ph.flags.execute());
    for page in (0..pages).map(|i| first + i * PAGE_SIZE) {
        let access = match aspace.translate(page).leaf() {
            // Already handed to an earlier segment.
            Some(leaf) if leaf.user => {
                let held = leaf.access();
                PageAccess::new(
                    true,
                    held.writable || wanted.writable,
                    held.executable || wanted.executable,
                )
            }
            _ => wanted,
        };
        aspace.protect(page, access)?;
    }
    Ok(())
}

fn map_user_stack<M, T, A>(
    aspace: &AddressSpace<'_, M, T>,
    alloc: &mut A,
) -> Result<VirtualAddress, LoadError>
where
    M: PhysMapper,
    T: Tlb,
    A: FrameAlloc,
{
    let base = VirtualAddress::new(USER_STACK_BASE);
    for i in 0..USER_STACK_PAGES {
        aspace.map(alloc, base + i * PAGE_SIZE, PageAccess::USER_RW)?;
    }
    Ok(base + (USER_STACK_SIZE - USER_STACK_RESERVED))
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;
    use crate::test_image::{ImageBuilder, PF_R, PF_W, PF_X};
    use kernel_memory_addresses::PhysicalAddress;
    use kernel_vmem::PageTable;
    use kernel_vmem::testing::{RecordingTlb, SimRam, VecFrameAlloc};

    struct Machine {
        ram: SimRam,
        alloc: VecFrameAlloc,
        root: PhysicalAddress,
        tlb: RecordingTlb,
    }

    impl Machine {
        fn new(frames: usize) -> Self {
            let ram = SimRam::with_frames(frames);
            let mut alloc = VecFrameAlloc::covering(&ram);
            let root = alloc.alloc_4k().expect("root");
            unsafe { ram.phys_to_mut::<PageTable>(root) }.zero();
            Self {
                ram,
                alloc,
                root,
                tlb: RecordingTlb::default(),
            }
        }

        fn aspace(&self) -> AddressSpace<'_, SimRam, &RecordingTlb> {
            AddressSpace::new(&self.ram, self.root, &self.tlb)
        }

        fn load(&mut self, modules: &[BootModule<'_>], name: &str) -> Result<LoadedImage, LoadError> {
            let aspace = AddressSpace::new(&self.ram, self.root, &self.tlb);
            load(&aspace, &mut self.alloc, modules.iter().copied(), name)
        }
    }

    fn module<'a>(name: &'a str, image: &'a [u8]) -> BootModule<'a> {
        BootModule { name, image }
    }

    #[test]
    fn text_segment_is_copied_zero_padded_and_protected() {
        let code: Vec<u8> = (1..=10).collect();
        let image = ImageBuilder::new(0x40_1000)
            .segment(0x40_1000, &code, 4096, PF_R | PF_X)
            .build();
        let mut m = Machine::new(64);

        let loaded = m.load(&[module("init", &image)], "init").expect("load");
        assert_eq!(loaded.entry, VirtualAddress::new(0x40_1000));

        let aspace = m.aspace();
        let mut page = [0xFFu8; 4096];
        aspace
            .read_bytes(VirtualAddress::new(0x40_1000), &mut page)
            .expect("read");
        assert_eq!(&page[..10], &code[..]);
        assert!(page[10..].iter().all(|&b| b == 0));

        let leaf = aspace
            .translate(VirtualAddress::new(0x40_1000))
            .leaf()
            .expect("leaf");
        assert!(leaf.user && !leaf.writable && !leaf.no_execute);
    }

    #[test]
    fn unaligned_segment_maps_every_touched_page() {
        let image = ImageBuilder::new(0x40_1000)
            .segment(0x40_0ff0, &[7; 0x20], 0x20, PF_R | PF_W)
            .build();
        let mut m = Machine::new(64);
        m.load(&[module("init", &image)], "init").expect("load");

        let aspace = m.aspace();
        for va in [0x40_0000, 0x40_1000] {
            let leaf = aspace
                .translate(VirtualAddress::new(va))
                .leaf()
                .expect("page mapped");
            assert!(leaf.user && leaf.writable && leaf.no_execute);
        }
        assert!(!aspace.translate(VirtualAddress::new(0x40_2000)).is_mapped());

        let mut back = [0u8; 0x20];
        aspace
            .read_bytes(VirtualAddress::new(0x40_0ff0), &mut back)
            .expect("read");
        assert_eq!(back, [7; 0x20]);
    }

    #[test]
    fn shared_page_keeps_both_policies() {
        let image = ImageBuilder::new(0x40_1000)
            .segment(0x40_1000, &[0xC3; 0x10], 0x10, PF_R | PF_X)
            .segment(0x40_1800, &[0xAB; 0x10], 0x10, PF_R | PF_W)
            .build();
        let mut m = Machine::new(64);
        m.load(&[module("init", &image)], "init").expect("load");

        let leaf = m
            .aspace()
            .translate(VirtualAddress::new(0x40_1000))
            .leaf()
            .expect("leaf");
        assert!(leaf.user && leaf.writable && !leaf.no_execute);
    }

    #[test]
    fn stack_is_mapped_user_rw_nx() {
        let image = ImageBuilder::new(0x40_1000)
            .segment(0x40_1000, &[0xC3], 1, PF_R | PF_X)
            .build();
        let mut m = Machine::new(64);
        let loaded = m.load(&[module("init", &image)], "init").expect("load");

        assert_eq!(
            loaded.stack_top,
            VirtualAddress::new(USER_STACK_BASE + USER_STACK_SIZE - USER_STACK_RESERVED)
        );
        let aspace = m.aspace();
        for i in 0..USER_STACK_PAGES {
            let va = VirtualAddress::new(USER_STACK_BASE + i * PAGE_SIZE);
            let leaf = aspace.translate(va).leaf().expect("stack page");
            assert!(leaf.user && leaf.writable && leaf.no_execute);
        }
        assert!(!aspace.translate(VirtualAddress::new(USER_STACK_BASE - PAGE_SIZE)).is_mapped());
        assert!(!aspace.translate(VirtualAddress::new(USER_STACK_BASE + USER_STACK_SIZE)).is_mapped());
    }

    #[test]
    fn missing_module_leaves_address_space_intact() {
        let image = ImageBuilder::new(0x40_1000)
            .segment(0x40_1000, &[0xC3], 1, PF_R | PF_X)
            .build();
        let mut m = Machine::new(64);
        m.load(&[module("init", &image)], "init").expect("load");
        let free = m.alloc.free_count();

        assert_eq!(
            m.load(&[module("init", &image)], "nosuch"),
            Err(LoadError::ModuleNotFound)
        );
        assert_eq!(m.alloc.free_count(), free);
        assert_eq!(m.tlb.flushes(), 1);
        assert!(m.aspace().translate(VirtualAddress::new(0x40_1000)).is_mapped());
    }

    #[test]
    fn non_executable_image_is_rejected_before_reclaim() {
        let good = ImageBuilder::new(0x40_1000)
            .segment(0x40_1000, &[0xC3], 1, PF_R | PF_X)
            .build();
        let shared_object = ImageBuilder::new(0x1000)
            .e_type(3)
            .segment(0x1000, &[0xC3], 1, PF_R | PF_X)
            .build();
        let modules = [module("init", &good), module("lib", &shared_object)];
        let mut m = Machine::new(64);
        m.load(&modules, "init").expect("load");

        assert_eq!(m.load(&modules, "lib"), Err(LoadError::NotExecutable));
        assert!(m.aspace().translate(VirtualAddress::new(0x40_1000)).is_mapped());
    }

    #[test]
    fn malformed_segment_is_rejected_before_reclaim() {
        let good = ImageBuilder::new(0x40_1000)
            .segment(0x40_1000, &[0xC3], 1, PF_R | PF_X)
            .build();
        let bad = ImageBuilder::new(0x40_1000)
            .segment(0x40_1000, &[0xC3; 32], 16, PF_R | PF_X)
            .build();
        let modules = [module("init", &good), module("bad", &bad)];
        let mut m = Machine::new(64);
        m.load(&modules, "init").expect("load");

        assert_eq!(
            m.load(&modules, "bad"),
            Err(LoadError::Malformed(ElfError::SegmentSizes(VirtualAddress::new(0x40_1000))))
        );
        assert!(m.aspace().translate(VirtualAddress::new(0x40_1000)).is_mapped());
    }

    #[test]
    fn reload_replaces_previous_program() {
        let first = ImageBuilder::new(0x40_1000)
            .segment(0x40_1000, &[1; 4], 4, PF_R | PF_X)
            .segment(0x60_0000, &[2; 4], 0x3000, PF_R | PF_W)
            .build();
        let second = ImageBuilder::new(0x80_0000)
            .segment(0x80_0000, &[3; 4], 4, PF_R | PF_X)
            .build();
        let modules = [module("init", &first), module("program", &second)];
        let mut m = Machine::new(128);

        m.load(&modules, "init").expect("init");
        let loaded = m.load(&modules, "program").expect("program");
        assert_eq!(loaded.entry, VirtualAddress::new(0x80_0000));

        let aspace = m.aspace();
        assert!(!aspace.translate(VirtualAddress::new(0x40_1000)).is_mapped());
        assert!(!aspace.translate(VirtualAddress::new(0x60_0000)).is_mapped());
        let mut back = [0u8; 4];
        aspace
            .read_bytes(VirtualAddress::new(0x80_0000), &mut back)
            .expect("read");
        assert_eq!(back, [3; 4]);
    }

    #[test]
    fn allocation_failure_aborts_the_load() {
        let image = ImageBuilder::new(0x40_0000)
            .segment(0x40_0000, &[0xC3], 0x10_0000, PF_R | PF_W)
            .build();
        let mut m = Machine::new(32);
        assert_eq!(
            m.load(&[module("init", &image)], "init"),
            Err(LoadError::AllocationFailed(VmemError::AllocationExhausted))
        );
    }

    #[test]
    fn first_matching_module_wins() {
        let a = [1u8];
        let b = [2u8];
        let modules = [module("x", &a), module("init", &b), module("init", &a)];
        let found = find_module(modules.iter().copied(), "init").expect("found");
        assert_eq!(found.image, &b);
        assert!(find_module(modules.iter().copied(), "ini").is_none());
    }
}
