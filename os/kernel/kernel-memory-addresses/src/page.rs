/// Size of the only page granule the kernel maps: 4 KiB.
pub const PAGE_SIZE: u64 = 4096;

/// `log2(PAGE_SIZE)`.
pub const PAGE_SHIFT: u32 = 12;

/// Align `x` down to the nearest multiple of `a`.
///
/// `a` must be a non-zero power of two.
///
/// ```rust
/// # use kernel_memory_addresses::align_down;
/// assert_eq!(align_down(0,    4096), 0);
/// assert_eq!(align_down(4095, 4096), 0);
/// assert_eq!(align_down(8191, 4096), 4096);
/// ```
#[inline]
#[must_use]
pub const fn align_down(x: u64, a: u64) -> u64 {
    x & !(a - 1)
}

/// Align `x` up to the nearest multiple of `a`.
///
/// `a` must be a non-zero power of two and `x + a - 1` must not overflow.
///
/// ```rust
/// # use kernel_memory_addresses::align_up;
/// assert_eq!(align_up(0,    4096), 0);
/// assert_eq!(align_up(1,    4096), 4096);
/// assert_eq!(align_up(4097, 4096), 8192);
/// ```
#[inline]
#[must_use]
pub const fn align_up(x: u64, a: u64) -> u64 {
    (x + a - 1) & !(a - 1)
}

/// Number of 4 KiB pages touched by the byte range `[start, start + len)`.
///
/// An empty range touches no page.
///
/// ```rust
/// # use kernel_memory_addresses::pages_spanning;
/// assert_eq!(pages_spanning(0x1000, 0), 0);
/// assert_eq!(pages_spanning(0x1000, 1), 1);
/// assert_eq!(pages_spanning(0x1ff0, 0x20), 2);
/// assert_eq!(pages_spanning(0x40_1000, 0x1000), 1);
/// ```
#[inline]
#[must_use]
pub const fn pages_spanning(start: u64, len: u64) -> u64 {
    if len == 0 {
        return 0;
    }
    let first = align_down(start, PAGE_SIZE);
    let end = align_up(start + len, PAGE_SIZE);
    (end - first) >> PAGE_SHIFT
}
