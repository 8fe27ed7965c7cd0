//! # User-Mode Runtime
//!
//! What a user program links against to talk to the kernel.
//!
//! | Feature | Provides |
//! |---------|----------|
//! | `syscall-abi` | [`syscall_abi`]: call numbers and flag constants, shared with the kernel |
//! | `syscall` | [`syscall`]: `int 0x80` wrappers |
//! | `stdlib` | `print!`/`println!`, [`io::read_line`], a panic handler |
//! | `userland` (default) | all of the above |
//! | `kernel` | the ABI only |

#![cfg_attr(not(test), no_std)]
#![cfg_attr(not(feature = "syscall"), forbid(unsafe_code))]
#![cfg_attr(feature = "syscall", allow(unsafe_code))]

#[cfg(feature = "stdlib")]
#[macro_use]
pub mod stdlib;

#[cfg(feature = "syscall")]
pub mod syscall;

#[cfg(feature = "syscall-abi")]
pub mod syscall_abi;

#[cfg(feature = "stdlib")]
pub use stdlib::*;

#[cfg(all(feature = "stdlib", target_os = "none"))]
mod panic {
    #[panic_handler]
    fn panic(info: &core::panic::PanicInfo) -> ! {
        crate::eprintln!("{info}");
        crate::syscall::exit(1)
    }
}
