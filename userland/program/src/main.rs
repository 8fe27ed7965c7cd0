//! Demo program: grabs anonymous memory, fills it, reads a few keys into
//! it and echoes them back before exiting to `init`.

#![no_std]
#![no_main]

use stdlib::syscall_abi::{MAP_ANONYMOUS, MAP_PRIVATE, PROT_READ, PROT_WRITE, STDIN, STDOUT};
use stdlib::{eprintln, print, println, syscall};

/// Seven pages and one byte: the kernel rounds up to eight.
const REGION_LEN: usize = 0x1000 * 7 + 1;

const INPUT_LEN: usize = 5;

#[unsafe(no_mangle)]
pub extern "C" fn _start() -> ! {
    println!("in program");
    syscall::write(STDOUT, b"Hello world!\n");

    let Some(region) = syscall::mmap(
        0,
        REGION_LEN as u64,
        PROT_READ | PROT_WRITE,
        MAP_ANONYMOUS | MAP_PRIVATE,
    ) else {
        eprintln!("mmap failed");
        syscall::exit(1);
    };
    println!("mmap: {region:p}");

    // SAFETY: the kernel mapped `REGION_LEN` writable bytes at `region`
    // and nothing else refers to them.
    let memory = unsafe { core::slice::from_raw_parts_mut(region.as_ptr(), REGION_LEN) };
    for (i, byte) in memory.iter_mut().enumerate() {
        #[allow(clippy::cast_possible_truncation)]
        let pattern = (i % 251) as u8;
        *byte = pattern;
    }

    print!("Input to program: ");
    let input = &mut memory[..INPUT_LEN];
    syscall::read(STDIN, input);
    println!();

    print!("program read: ");
    syscall::write(STDOUT, input);
    println!();

    syscall::exit(0)
}
