//! # Decoded Page Table Entries
//!
//! [`PageEntry`] is the kernel's view of one paging-structure entry: a few
//! named booleans plus the frame it points at. [`PageEntry::decode`] and
//! [`PageEntry::encode`] are the only places where that view meets the
//! hardware word ([`PageEntryBits`]).
//!
//! [`PageAccess`] is the caller-facing access policy for a leaf mapping.

use crate::page_entry_bits::PageEntryBits;
use core::fmt;
use kernel_memory_addresses::{PAGE_SHIFT, PhysicalAddress};

/// One decoded paging-structure entry.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PageEntry {
    pub present: bool,
    pub writable: bool,
    pub user: bool,
    pub no_execute: bool,
    /// `PS`: a PDPT/PD entry that maps memory instead of a table.
    pub huge: bool,
    /// Next-level table, or the data frame for a leaf.
    pub frame: PhysicalAddress,
}

impl PageEntry {
    /// An all-zero, not-present entry.
    pub const EMPTY: Self = Self {
        present: false,
        writable: false,
        user: false,
        no_execute: false,
        huge: false,
        frame: PhysicalAddress::zero(),
    };

    /// Entry linking to a lower-level table.
    ///
    /// Intermediate links are always present, writable, user-accessible and
    /// executable; the leaf alone decides the effective policy.
    #[must_use]
    pub const fn table(frame: PhysicalAddress) -> Self {
        Self {
            present: true,
            writable: true,
            user: true,
            no_execute: false,
            huge: false,
            frame,
        }
    }

    /// Leaf entry mapping `frame` with `access`.
    #[must_use]
    pub const fn leaf(frame: PhysicalAddress, access: PageAccess) -> Self {
        Self {
            present: true,
            writable: access.writable,
            user: access.user,
            no_execute: !access.executable,
            huge: false,
            frame,
        }
    }

    #[must_use]
    pub const fn decode(raw: u64) -> Self {
        let bits = PageEntryBits::from_bits(raw);
        Self {
            present: bits.present(),
            writable: bits.writable(),
            user: bits.user_access(),
            no_execute: bits.no_execute(),
            huge: bits.large_page(),
            frame: PhysicalAddress::new(bits.frame_number() << PAGE_SHIFT),
        }
    }

    #[must_use]
    pub const fn encode(self) -> u64 {
        PageEntryBits::new()
            .with_present(self.present)
            .with_writable(self.writable)
            .with_user_access(self.user)
            .with_no_execute(self.no_execute)
            .with_large_page(self.huge)
            .with_frame_number(self.frame.as_u64() >> PAGE_SHIFT)
            .into_bits()
    }

    /// Overwrites the three policy bits, keeping the frame.
    #[must_use]
    pub const fn with_access(mut self, access: PageAccess) -> Self {
        self.user = access.user;
        self.writable = access.writable;
        self.no_execute = !access.executable;
        self
    }

    #[must_use]
    pub const fn access(self) -> PageAccess {
        PageAccess::new(self.user, self.writable, !self.no_execute)
    }
}

impl fmt::Display for PageEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "P={} RW={} US={} NX={}",
            u8::from(self.present),
            u8::from(self.writable),
            u8::from(self.user),
            u8::from(self.no_execute)
        )?;
        if self.huge {
            f.write_str(" PS=1")?;
        }
        write!(f, " -> {}", self.frame)
    }
}

/// Access policy of a leaf mapping, always given as `(user, writable, executable)`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PageAccess {
    pub user: bool,
    pub writable: bool,
    pub executable: bool,
}

impl PageAccess {
    /// Supervisor-only scratch mapping used while filling a page.
    pub const KERNEL_RW: Self = Self::new(false, true, true);

    /// User data: readable, writable, never executable.
    pub const USER_RW: Self = Self::new(true, true, false);

    #[must_use]
    pub const fn new(user: bool, writable: bool, executable: bool) -> Self {
        Self {
            user,
            writable,
            executable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_encode_preserves_fields() {
        let raw = 0x8000_0000_0012_3007;
        let e = PageEntry::decode(raw);
        assert!(e.present && e.writable && e.user && e.no_execute);
        assert!(!e.huge);
        assert_eq!(e.frame.as_u64(), 0x12_3000);
        assert_eq!(e.encode(), raw);
    }

    #[test]
    fn table_links_are_permissive() {
        let e = PageEntry::table(PhysicalAddress::new(0x5000));
        assert_eq!(e.encode(), 0x5007);
    }

    #[test]
    fn leaf_maps_executable_to_nx() {
        let frame = PhysicalAddress::new(0x9000);
        let rx = PageEntry::leaf(frame, PageAccess::new(true, false, true));
        assert!(!rx.no_execute && !rx.writable && rx.user);

        let rw = PageEntry::leaf(frame, PageAccess::USER_RW);
        assert!(rw.no_execute && rw.writable);
        assert_eq!(rw.encode(), 0x8000_0000_0000_9007);
    }

    #[test]
    fn with_access_keeps_frame() {
        let frame = PhysicalAddress::new(0x7000);
        let e = PageEntry::leaf(frame, PageAccess::KERNEL_RW)
            .with_access(PageAccess::new(true, false, true));
        assert_eq!(e.frame, frame);
        assert_eq!(e.access(), PageAccess::new(true, false, true));
    }

    #[test]
    fn display() {
        let e = PageEntry::leaf(PhysicalAddress::new(0x1000), PageAccess::USER_RW);
        assert_eq!(
            format!("{e}"),
            "P=1 RW=1 US=1 NX=1 -> 0x0000000000001000"
        );
    }
}
