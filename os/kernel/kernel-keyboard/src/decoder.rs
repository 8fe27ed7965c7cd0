use log::trace;

const EXTENDED_PREFIX: u8 = 0xE0;
const RELEASE_BIT: u8 = 0x80;

const LEFT_SHIFT: u8 = 0x2A;
const RIGHT_SHIFT: u8 = 0x36;
const CAPS_LOCK: u8 = 0x3A;

/// Scan code set 1 to ASCII, US layout.
///
/// Presses of printable keys, Enter, Tab and Backspace produce a byte.
/// Releases only update modifier state. `0xE0`-prefixed keys (arrows,
/// right-hand Ctrl/Alt, keypad Enter) are swallowed.
#[derive(Debug, Default)]
pub struct ScancodeDecoder {
    left_shift: bool,
    right_shift: bool,
    caps_lock: bool,
    extended: bool,
}

impl ScancodeDecoder {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            left_shift: false,
            right_shift: false,
            caps_lock: false,
            extended: false,
        }
    }

    const fn shift(&self) -> bool {
        self.left_shift || self.right_shift
    }

    /// Feed one byte from the controller.
    pub fn feed(&mut self, scancode: u8) -> Option<u8> {
        if scancode == EXTENDED_PREFIX {
            self.extended = true;
            return None;
        }
        if core::mem::take(&mut self.extended) {
            trace!("ignoring extended key {scancode:#04x}");
            return None;
        }

        let released = scancode & RELEASE_BIT != 0;
        let code = scancode & !RELEASE_BIT;
        match code {
            LEFT_SHIFT => self.left_shift = !released,
            RIGHT_SHIFT => self.right_shift = !released,
            CAPS_LOCK if !released => self.caps_lock = !self.caps_lock,
            _ if !released => return translate(code, self.shift(), self.caps_lock),
            _ => {}
        }
        None
    }
}

fn letter(base: u8, shift: bool, caps_lock: bool) -> u8 {
    if shift ^ caps_lock {
        base.to_ascii_uppercase()
    } else {
        base
    }
}

#[rustfmt::skip]
const UNSHIFTED: [u8; 0x3A] = [
    0,    0x1B, b'1', b'2', b'3', b'4', b'5', b'6', b'7', b'8', b'9', b'0', b'-', b'=', 0x08, b'\t',
    b'q', b'w', b'e', b'r', b't', b'y', b'u', b'i', b'o', b'p', b'[', b']', b'\n', 0,   b'a', b's',
    b'd', b'f', b'g', b'h', b'j', b'k', b'l', b';', b'\'', b'`', 0,   b'\\', b'z', b'x', b'c', b'v',
    b'b', b'n', b'm', b',', b'.', b'/', 0,    b'*', 0,    b' ',
];

#[rustfmt::skip]
const SHIFTED: [u8; 0x3A] = [
    0,    0x1B, b'!', b'@', b'#', b'$', b'%', b'^', b'&', b'*', b'(', b')', b'_', b'+', 0x08, b'\t',
    b'Q', b'W', b'E', b'R', b'T', b'Y', b'U', b'I', b'O', b'P', b'{', b'}', b'\n', 0,   b'A', b'S',
    b'D', b'F', b'G', b'H', b'J', b'K', b'L', b':', b'"', b'~', 0,    b'|', b'Z', b'X', b'C', b'V',
    b'B', b'N', b'M', b'<', b'>', b'?', 0,    b'*', 0,    b' ',
];

fn translate(code: u8, shift: bool, caps_lock: bool) -> Option<u8> {
    let index = usize::from(code);
    let plain = *UNSHIFTED.get(index)?;
    let byte = if plain.is_ascii_lowercase() {
        letter(plain, shift, caps_lock)
    } else if shift {
        SHIFTED[index]
    } else {
        plain
    };
    (byte != 0).then_some(byte)
}
