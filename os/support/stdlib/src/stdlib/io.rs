use crate::syscall;
use crate::syscall_abi::STDIN;

/// Read keystrokes one at a time until Enter or until `buf` is full.
///
/// Returns the number of bytes stored; the line terminator is not stored.
/// The kernel echoes every keystroke.
pub fn read_line(buf: &mut [u8]) -> usize {
    read_line_from(buf, || {
        let mut c = [0u8];
        (syscall::read(STDIN, &mut c) == 1).then_some(c[0])
    })
}

fn read_line_from(buf: &mut [u8], mut next: impl FnMut() -> Option<u8>) -> usize {
    let mut n = 0;
    while n < buf.len() {
        match next() {
            Some(b'\n' | b'\r') | None => break,
            Some(c) => {
                buf[n] = c;
                n += 1;
            }
        }
    }
    n
}
