//! Checked access to user memory through the page tables.
//!
//! A user pointer is only trusted once every page it touches is mapped with
//! the user bit set (and, for writes, the writable bit). Bytes are then
//! moved through the direct map, so a bad pointer fails the call instead of
//! faulting the kernel.

use crate::SyscallError;
use kernel_memory_addresses::{PAGE_SIZE, VirtualAddress};
use kernel_vmem::{AddressSpace, PhysMapper, Tlb};

/// How the kernel is about to touch a user range.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UserAccess {
    Read,
    Write,
}

/// Check that `[va, va + len)` lies in the lower half and is mapped for `access`.
///
/// # Errors
/// [`SyscallError::BadAddress`].
pub fn check_range<M: PhysMapper, T: Tlb>(
    aspace: &AddressSpace<'_, M, T>,
    va: VirtualAddress,
    len: usize,
    access: UserAccess,
) -> Result<(), SyscallError> {
    if len == 0 {
        return Ok(());
    }
    let last = va
        .as_u64()
        .checked_add(len as u64 - 1)
        .map(VirtualAddress::new)
        .ok_or(SyscallError::BadAddress)?;
    if !va.is_lower_half() || !last.is_lower_half() {
        return Err(SyscallError::BadAddress);
    }

    let mut page = va.align_down();
    while page <= last {
        let leaf = aspace
            .translate(page)
            .leaf()
            .ok_or(SyscallError::BadAddress)?;
        if !leaf.user || (access == UserAccess::Write && !leaf.writable) {
            return Err(SyscallError::BadAddress);
        }
        page += PAGE_SIZE;
    }
    Ok(())
}

/// Copy `buf.len()` bytes from user address `va`.
///
/// # Errors
/// [`SyscallError::BadAddress`].
pub fn copy_from_user<M: PhysMapper, T: Tlb>(
    aspace: &AddressSpace<'_, M, T>,
    va: VirtualAddress,
    buf: &mut [u8],
) -> Result<(), SyscallError> {
    check_range(aspace, va, buf.len(), UserAccess::Read)?;
    aspace
        .read_bytes(va, buf)
        .map_err(|_| SyscallError::BadAddress)
}

/// Copy `bytes` to user address `va`.
///
/// # Errors
/// [`SyscallError::BadAddress`].
pub fn copy_to_user<M: PhysMapper, T: Tlb>(
    aspace: &AddressSpace<'_, M, T>,
    va: VirtualAddress,
    bytes: &[u8],
) -> Result<(), SyscallError> {
    check_range(aspace, va, bytes.len(), UserAccess::Write)?;
    aspace
        .write_bytes(va, bytes)
        .map_err(|_| SyscallError::BadAddress)
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;
    use kernel_vmem::testing::{RecordingTlb, SimRam, VecFrameAlloc};
    use kernel_vmem::{FrameAlloc, PageAccess, PageTable};

    fn setup() -> (SimRam, VecFrameAlloc, kernel_vmem::PhysicalAddress) {
        let ram = SimRam::with_frames(32);
        let mut alloc = VecFrameAlloc::covering(&ram);
        let root = alloc.alloc_4k().expect("root");
        unsafe { ram.phys_to_mut::<PageTable>(root) }.zero();
        (ram, alloc, root)
    }

    #[test]
    fn user_rw_pages_round_trip() {
        let (ram, mut alloc, root) = setup();
        let aspace = AddressSpace::new(&ram, root, RecordingTlb::default());
        let va = VirtualAddress::new(0x50_0000);
        aspace.map(&mut alloc, va, PageAccess::USER_RW).expect("map");
        aspace.map(&mut alloc, va + PAGE_SIZE, PageAccess::USER_RW).expect("map");

        let at = va + (PAGE_SIZE - 3);
        copy_to_user(&aspace, at, b"hello").expect("write");
        let mut back = [0u8; 5];
        copy_from_user(&aspace, at, &mut back).expect("read");
        assert_eq!(&back, b"hello");
    }

    #[test]
    fn unmapped_and_kernel_addresses_are_rejected() {
        let (ram, mut alloc, root) = setup();
        let aspace = AddressSpace::new(&ram, root, RecordingTlb::default());
        let va = VirtualAddress::new(0x50_0000);
        aspace.map(&mut alloc, va, PageAccess::USER_RW).expect("map");

        // Runs off the end of the mapping.
        assert_eq!(
            check_range(&aspace, va + (PAGE_SIZE - 1), 2, UserAccess::Read),
            Err(SyscallError::BadAddress)
        );
        assert_eq!(
            check_range(&aspace, VirtualAddress::new(0xffff_8000_0000_0000), 1, UserAccess::Read),
            Err(SyscallError::BadAddress)
        );
        assert_eq!(
            check_range(&aspace, VirtualAddress::new(u64::MAX), 2, UserAccess::Read),
            Err(SyscallError::BadAddress)
        );
        assert_eq!(check_range(&aspace, VirtualAddress::new(0), 0, UserAccess::Write), Ok(()));
    }

    #[test]
    fn supervisor_and_read_only_pages_are_enforced() {
        let (ram, mut alloc, root) = setup();
        let aspace = AddressSpace::new(&ram, root, RecordingTlb::default());
        let kernel_page = VirtualAddress::new(0x50_0000);
        let text_page = VirtualAddress::new(0x50_1000);
        aspace.map(&mut alloc, kernel_page, PageAccess::KERNEL_RW).expect("map");
        aspace
            .map(&mut alloc, text_page, PageAccess::new(true, false, true))
            .expect("map");

        assert_eq!(
            check_range(&aspace, kernel_page, 1, UserAccess::Read),
            Err(SyscallError::BadAddress)
        );
        assert_eq!(check_range(&aspace, text_page, 16, UserAccess::Read), Ok(()));
        assert_eq!(
            copy_to_user(&aspace, text_page, b"x"),
            Err(SyscallError::BadAddress)
        );
    }
}
