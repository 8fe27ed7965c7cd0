/// Statically reserved, 16-byte aligned stack.
///
/// Stacks grow down, so the CPU is handed [`Stack::top`] rather than the base.
#[repr(C, align(16))]
pub struct Stack<const N: usize>([u8; N]);

impl<const N: usize> Stack<N> {
    pub const fn new() -> Self {
        Self([0; N])
    }

    /// One past the highest byte of the stack at `this`.
    pub const fn top(this: *const Self) -> *const u8 {
        this.cast::<u8>().wrapping_add(N)
    }
}
