//! Kernel-wide mutable state.
//!
//! Everything a trap may change (the frame pool, the user half of the
//! address space, the `mmap` watermark) sits behind one lock. Traps take it
//! through [`with`] and release it before leaving the kernel, so entering a
//! new program never happens with the lock held.

use crate::cpu;
use crate::env::{KernelEnv, KernelFrames};
use kernel_alloc::HhdmPhysMapper;
use kernel_info::boot::BootInfo;
use kernel_memory_addresses::PhysicalAddress;
use kernel_syscall::{LoadError, LoadedImage, SyscallArgs, SyscallDispatcher, SyscallEnv, TrapOutcome};
use kernel_vmem::{AddressSpace, CpuTlb};
use log::error;
use spin::{Mutex, Once};

static CONTEXT: Once<Mutex<KernelContext>> = Once::new();

pub struct KernelContext {
    boot: BootInfo,
    mapper: HhdmPhysMapper,
    frames: KernelFrames,
    /// PML4 of the one address space, as found in CR3 at boot.
    root: PhysicalAddress,
    dispatcher: SyscallDispatcher,
}

impl KernelContext {
    pub const fn new(boot: BootInfo, mapper: HhdmPhysMapper, frames: KernelFrames, root: PhysicalAddress) -> Self {
        Self {
            boot,
            mapper,
            frames,
            root,
            dispatcher: SyscallDispatcher::new(),
        }
    }

    /// Make this the context [`with`] hands out. Only the first call counts.
    pub fn install(self) {
        CONTEXT.call_once(|| Mutex::new(self));
    }

    fn env(&mut self) -> KernelEnv<'_> {
        KernelEnv {
            aspace: AddressSpace::new(&self.mapper, self.root, CpuTlb),
            frames: &mut self.frames,
            boot: self.boot,
        }
    }

    pub fn dispatch(&mut self, call: SyscallArgs) -> TrapOutcome {
        let mut env = KernelEnv {
            aspace: AddressSpace::new(&self.mapper, self.root, CpuTlb),
            frames: &mut self.frames,
            boot: self.boot,
        };
        self.dispatcher.dispatch(&mut env, call)
    }

    /// Load boot module `name` in place of whatever occupies the user half.
    ///
    /// # Errors
    /// See [`LoadError`].
    pub fn exec(&mut self, name: &str) -> Result<LoadedImage, LoadError> {
        self.env().exec(name)
    }
}

/// Run `f` on the installed context with its lock held.
///
/// A trap that arrives before [`KernelContext::install`] halts the machine.
pub fn with<R>(f: impl FnOnce(&mut KernelContext) -> R) -> R {
    let Some(context) = CONTEXT.get() else {
        error!("trap before the kernel context was installed");
        cpu::halt_forever()
    };
    f(&mut context.lock())
}
