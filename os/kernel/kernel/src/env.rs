//! The live machine behind [`SyscallEnv`].

use crate::console;
use crate::interrupts::keyboard::KEYS;
use kernel_alloc::{FreeListFrameAlloc, HhdmPhysMapper};
use kernel_info::boot::BootInfo;
use kernel_memory_addresses::VirtualAddress;
use kernel_syscall::user::{self, UserAccess};
use kernel_syscall::{LoadError, LoadedImage, SyscallEnv, SyscallError};
use kernel_vmem::{AddressSpace, CpuTlb, PageAccess, VmemError};

pub type KernelAddressSpace<'a> = AddressSpace<'a, HhdmPhysMapper, CpuTlb>;
pub type KernelFrames = FreeListFrameAlloc<HhdmPhysMapper>;

/// Borrowed view of the kernel state one trap needs.
pub struct KernelEnv<'a> {
    pub aspace: KernelAddressSpace<'a>,
    pub frames: &'a mut KernelFrames,
    pub boot: BootInfo,
}

impl SyscallEnv for KernelEnv<'_> {
    fn console_write(&mut self, bytes: &[u8]) {
        console::write_bytes(bytes);
    }

    fn getc(&mut self) -> u8 {
        KEYS.pop_blocking()
    }

    fn check_user(&self, va: VirtualAddress, len: usize, access: UserAccess) -> Result<(), SyscallError> {
        user::check_range(&self.aspace, va, len, access)
    }

    fn copy_from_user(&self, va: VirtualAddress, buf: &mut [u8]) -> Result<(), SyscallError> {
        user::copy_from_user(&self.aspace, va, buf)
    }

    fn copy_to_user(&mut self, va: VirtualAddress, bytes: &[u8]) -> Result<(), SyscallError> {
        user::copy_to_user(&self.aspace, va, bytes)
    }

    fn map_user_page(&mut self, va: VirtualAddress, access: PageAccess) -> Result<(), VmemError> {
        self.aspace.map(self.frames, va, access).map(|_| ())
    }

    fn exec(&mut self, name: &str) -> Result<LoadedImage, LoadError> {
        kernel_loader::load(&self.aspace, self.frames, self.boot.modules(), name)
    }
}
