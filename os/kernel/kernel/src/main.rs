//! # Kernel Entry Point
//!
//! A stivale2 bootloader loads this image in the higher half, switches to
//! [`BOOT_STACK`], and calls [`_start`] with the boot information. From
//! there:
//!
//! 1. install the logger, then route the console (and logged warnings) to
//!    the boot terminal;
//! 2. seed the frame pool from the usable memory ranges;
//! 3. load the GDT with its TSS, the IDT, and remap the PIC;
//! 4. publish the [`context::KernelContext`] and enable interrupts;
//! 5. load the `init` module and drop to ring 3.
//!
//! Everything after that happens in trap handlers.

#![no_std]
#![no_main]
#![allow(unsafe_code)]

mod console;
mod context;
mod cpu;
mod env;
mod gdt;
mod idt;
mod interrupts;
mod pic;
mod ports;
mod privilege;
mod stack;
mod tss;
mod userland;

use crate::context::KernelContext;
use crate::stack::Stack;
use kernel_alloc::{FreeListFrameAlloc, HhdmPhysMapper};
use kernel_info::boot::{
    BootInfo, HEADER_FLAGS, HEADER_TAG_TERMINAL_ID, HEADER_TAG_UNMAP_NULL_ID, HeaderTagTerminal,
    HeaderTagUnmapNull, Stivale2Header, Stivale2Struct, TagHeader,
};
use kernel_info::memory::{INIT_MODULE, KERNEL_BOOT_STACK_SIZE};
use kernel_qemu::QemuLogger;
use kernel_vmem::{AddressSpace, CpuTlb};
use log::{LevelFilter, debug, error, info};

const KERNEL_LOG_LEVEL: LevelFilter = LevelFilter::Info;

static LOGGER: QemuLogger = QemuLogger::new(KERNEL_LOG_LEVEL);

static mut BOOT_STACK: Stack<KERNEL_BOOT_STACK_SIZE> = Stack::new();

static UNMAP_NULL_TAG: HeaderTagUnmapNull = HeaderTagUnmapNull {
    tag: TagHeader {
        identifier: HEADER_TAG_UNMAP_NULL_ID,
        next: core::ptr::null(),
    },
};

static TERMINAL_TAG: HeaderTagTerminal = HeaderTagTerminal {
    tag: TagHeader {
        identifier: HEADER_TAG_TERMINAL_ID,
        next: (&raw const UNMAP_NULL_TAG).cast(),
    },
    flags: 0,
    callback: 0,
};

#[used]
#[unsafe(link_section = ".stivale2hdr")]
static STIVALE2_HEADER: Stivale2Header = Stivale2Header {
    entry_point: 0,
    stack: Stack::top(&raw const BOOT_STACK),
    flags: HEADER_FLAGS,
    tags: (&raw const TERMINAL_TAG).cast(),
};

#[unsafe(no_mangle)]
extern "C" fn _start(info: *const Stivale2Struct) -> ! {
    // SAFETY: the bootloader passes a valid structure whose tags stay mapped.
    let boot = unsafe { BootInfo::from_raw(info) };
    kernel_main(boot)
}

fn kernel_main(boot: BootInfo) -> ! {
    if LOGGER.install().is_err() {
        cpu::halt_forever();
    }

    let Some(term_write) = boot.terminal_write() else {
        error!("boot: no terminal tag");
        cpu::halt_forever()
    };
    console::init(term_write);
    LOGGER.mirror_to(console::write_fmt);

    let Some(hhdm) = boot.hhdm_base() else {
        error!("boot: no HHDM tag");
        cpu::halt_forever()
    };
    if boot.memory_map().is_empty() {
        error!("boot: no memory map tag");
        cpu::halt_forever();
    }

    for range in boot.usable_ranges() {
        info!(
            "usable: {}-{} mapped at {:#x}-{:#x}",
            range.base,
            range.end,
            hhdm + range.base.as_u64(),
            hhdm + range.end.as_u64()
        );
    }

    let mapper = HhdmPhysMapper::new(hhdm);
    let mut frames = FreeListFrameAlloc::new(mapper);
    let free = frames.init(boot.usable_ranges());
    info!("frame pool: {free} free frames");

    // SAFETY: single CPU, interrupts still disabled, CPL0.
    unsafe {
        gdt::init();
        idt::init();
        pic::init();
    }

    // SAFETY: paging is on and we run at CPL0.
    let root = unsafe { AddressSpace::from_current(&mapper, CpuTlb) }.root();
    debug!("address space root {root}");

    KernelContext::new(boot, mapper, frames, root).install();

    // SAFETY: descriptor tables and the PIC are set up.
    unsafe { cpu::enable_interrupts() };

    match context::with(|ctx| ctx.exec(INIT_MODULE)) {
        // SAFETY: the loader just mapped the entry point and the user stack.
        Ok(image) => unsafe { userland::enter_user_mode(image) },
        Err(e) => {
            error!("failed to start {INIT_MODULE}: {e}");
            cpu::halt_forever()
        }
    }
}

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    error!("kernel panic: {info}");
    cpu::halt_forever()
}
