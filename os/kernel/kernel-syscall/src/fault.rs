use core::fmt;
use kernel_loader::LoadError;
use kernel_memory_addresses::VirtualAddress;

const NAMES: [&str; 22] = [
    "Divide error",
    "Debug",
    "Non-maskable interrupt",
    "Breakpoint",
    "Overflow",
    "Bound range exceeded",
    "Invalid opcode",
    "Device not available",
    "Double fault",
    "Coprocessor segment overrun",
    "Invalid TSS",
    "Segment not present",
    "Stack-segment fault",
    "General protection fault",
    "Page fault",
    "Reserved",
    "x87 floating-point exception",
    "Alignment check",
    "Machine check",
    "SIMD floating-point exception",
    "Virtualization exception",
    "Control protection exception",
];

/// Human-readable name of CPU exception `vector`.
#[must_use]
pub fn fault_name(vector: u8) -> &'static str {
    NAMES.get(usize::from(vector)).copied().unwrap_or("Unknown exception")
}

/// Whether the CPU pushes an error code for `vector`.
#[must_use]
pub const fn fault_has_error_code(vector: u8) -> bool {
    matches!(vector, 8 | 10..=14 | 17 | 21)
}

/// A CPU exception as captured by its entry stub.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Fault {
    pub vector: u8,
    pub error_code: Option<u64>,
    pub rip: u64,
    /// Faulting address, for page faults.
    pub cr2: Option<VirtualAddress>,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fault: {}", fault_name(self.vector))?;
        if let Some(ec) = self.error_code {
            write!(f, " (ec={ec:#x})")?;
        }
        write!(f, " at rip={:#018x}", self.rip)?;
        if let Some(cr2) = self.cr2 {
            write!(f, " cr2={cr2}")?;
        }
        Ok(())
    }
}

/// Reasons the machine stops for good.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Fatal {
    Fault(Fault),
    /// `exec` failed after the old program's memory was already gone.
    ExecAborted(LoadError),
}

impl fmt::Display for Fatal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fault(fault) => fault.fmt(f),
            Self::ExecAborted(e) => write!(f, "Load error: {e}; nothing left to return to"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_cover_all_fatal_vectors() {
        assert_eq!(fault_name(0), "Divide error");
        assert_eq!(fault_name(13), "General protection fault");
        assert_eq!(fault_name(14), "Page fault");
        assert_eq!(fault_name(21), "Control protection exception");
        assert_eq!(fault_name(22), "Unknown exception");
    }

    #[test]
    fn error_code_vectors() {
        let with: Vec<u8> = (0..22).filter(|&v| fault_has_error_code(v)).collect();
        assert_eq!(with, [8, 10, 11, 12, 13, 14, 17, 21]);
    }

    #[test]
    fn page_fault_message_has_everything() {
        let fault = Fault {
            vector: 14,
            error_code: Some(0x6),
            rip: 0x40_1000,
            cr2: Some(VirtualAddress::new(0xdead_b000)),
        };
        assert_eq!(
            fault.to_string(),
            "Fault: Page fault (ec=0x6) at rip=0x0000000000401000 cr2=0x00000000DEADB000"
        );
    }

    #[test]
    fn divide_error_has_no_code() {
        let fault = Fault {
            vector: 0,
            error_code: None,
            rip: 0x40_2000,
            cr2: None,
        };
        assert_eq!(fault.to_string(), "Fault: Divide error at rip=0x0000000000402000");
    }
}
