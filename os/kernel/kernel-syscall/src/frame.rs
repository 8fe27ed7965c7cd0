/// Register image saved by the `int 0x80` trampoline.
///
/// The trampoline pushes `r15` first and `rax` last, so `rax` sits at the
/// lowest address; the CPU-pushed interrupt frame follows the GPRs.
#[derive(Debug, Default, Clone)]
#[repr(C)]
pub struct TrapFrame {
    pub rax: u64,
    pub rbx: u64,
    pub rcx: u64,
    pub rdx: u64,
    pub rsi: u64,
    pub rdi: u64,
    pub rbp: u64,
    pub r8: u64,
    pub r9: u64,
    pub r10: u64,
    pub r11: u64,
    pub r12: u64,
    pub r13: u64,
    pub r14: u64,
    pub r15: u64,
    // Pushed by the CPU.
    pub rip: u64,
    pub cs: u64,
    pub rflags: u64,
    pub rsp: u64,
    pub ss: u64,
}

const _: () = assert!(size_of::<TrapFrame>() == 20 * 8);

impl TrapFrame {
    /// Call number and arguments in ABI order.
    #[must_use]
    pub const fn syscall_args(&self) -> SyscallArgs {
        SyscallArgs {
            nr: self.rax,
            args: [self.rdi, self.rsi, self.rdx, self.r10, self.r8, self.r9],
        }
    }

    /// Store a result for the `iretq` back to user mode.
    #[allow(clippy::cast_sign_loss)]
    pub const fn set_return(&mut self, value: i64) {
        self.rax = value as u64;
    }
}

/// One system call request.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SyscallArgs {
    pub nr: u64,
    pub args: [u64; 6],
}

impl SyscallArgs {
    #[must_use]
    pub const fn new(nr: u64, args: [u64; 6]) -> Self {
        Self { nr, args }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arguments_follow_abi_order() {
        let frame = TrapFrame {
            rax: 2,
            rdi: 10,
            rsi: 11,
            rdx: 12,
            r10: 13,
            r8: 14,
            r9: 15,
            rcx: 99,
            ..TrapFrame::default()
        };
        assert_eq!(frame.syscall_args(), SyscallArgs::new(2, [10, 11, 12, 13, 14, 15]));
    }

    #[test]
    fn return_value_replaces_rax() {
        let mut frame = TrapFrame {
            rax: 1,
            ..TrapFrame::default()
        };
        frame.set_return(-1);
        assert_eq!(frame.rax, u64::MAX);
        frame.set_return(42);
        assert_eq!(frame.rax, 42);
    }
}
