//! # Memory Layout

use kernel_memory_addresses::PAGE_SIZE;

/// Where the kernel executes (VMA); matches `kernel.ld`.
///
/// # Kernel Build
/// Sourced in the kernel's `build.rs` to configure the linker.
pub const KERNEL_BASE: u64 = 0xffff_ffff_8000_0000;

/// First PML4 slot that belongs to the kernel half.
///
/// Slots `0..LOWER_HALF_PML4_SLOTS` map user space and are torn down by
/// `reclaim_lower_half` whenever a new program is loaded.
pub const LOWER_HALF_PML4_SLOTS: usize = 256;

/// Lowest address of the fixed user stack.
pub const USER_STACK_BASE: u64 = 0x0700_0000_0000;

/// Number of 4 KiB pages in the user stack.
pub const USER_STACK_PAGES: u64 = 8;

/// Size of the user stack in bytes.
pub const USER_STACK_SIZE: u64 = USER_STACK_PAGES * PAGE_SIZE;

/// Bytes kept free at the very top of the user stack; the initial `rsp`
/// is `USER_STACK_BASE + USER_STACK_SIZE - USER_STACK_RESERVED`.
pub const USER_STACK_RESERVED: u64 = 8;

/// First address handed out by anonymous `mmap(NULL, ...)`.
///
/// The watermark only ever grows from here.
pub const MMAP_BASE: u64 = 0x0500_0000_0000;

/// Size of the stack the kernel runs on when entered from ring 3.
pub const KERNEL_TRAP_STACK_SIZE: usize = 32 * 1024;

/// Size of the stack the bootloader switches to before `_start`.
pub const KERNEL_BOOT_STACK_SIZE: usize = 16 * 1024;

/// Name of the module started at boot and by `exit`.
pub const INIT_MODULE: &str = "init";

const _: () = {
    assert!(KERNEL_TRAP_STACK_SIZE.is_multiple_of(4096));
    assert!(KERNEL_BOOT_STACK_SIZE.is_multiple_of(4096));
    assert!(USER_STACK_BASE.is_multiple_of(PAGE_SIZE));
    assert!(MMAP_BASE.is_multiple_of(PAGE_SIZE));
    assert!(MMAP_BASE < USER_STACK_BASE);
    assert!(USER_STACK_BASE + USER_STACK_SIZE < 0x0000_8000_0000_0000);
};
