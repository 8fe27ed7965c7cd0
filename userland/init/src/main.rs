//! First user program: a one-line-at-a-time launcher for the other boot
//! modules. The kernel restarts it whenever a program exits.

#![no_std]
#![no_main]

use stdlib::syscall_abi::EXEC_NAME_MAX;
use stdlib::{io, print, println, syscall};

#[unsafe(no_mangle)]
pub extern "C" fn _start() -> ! {
    println!("init: type the name of a boot module to run it");

    let mut line = [0u8; EXEC_NAME_MAX];
    loop {
        print!("$ ");
        let n = io::read_line(&mut line);
        let Ok(name) = core::str::from_utf8(line[..n].trim_ascii()) else {
            println!("exec failed: name is not UTF-8");
            continue;
        };
        if name.is_empty() {
            continue;
        }

        syscall::exec(name);
        println!("exec failed: {name}");
    }
}
