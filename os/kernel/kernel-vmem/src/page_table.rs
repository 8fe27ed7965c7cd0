use crate::PageEntry;

/// Number of entries in every paging structure.
pub const ENTRIES: usize = 512;

/// One 4 KiB paging structure (PML4, PDPT, PD or PT).
///
/// Entries are stored as raw hardware words and decoded on access.
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [u64; ENTRIES],
}

impl PageTable {
    #[inline]
    #[must_use]
    pub fn entry(&self, index: usize) -> PageEntry {
        PageEntry::decode(self.entries[index])
    }

    #[inline]
    pub fn set(&mut self, index: usize, entry: PageEntry) {
        self.entries[index] = entry.encode();
    }

    #[inline]
    pub fn clear(&mut self, index: usize) {
        self.entries[index] = 0;
    }

    /// Zero all 512 entries.
    #[inline]
    pub fn zero(&mut self) {
        self.entries.fill(0);
    }

    /// Iterate `(index, entry)` over present entries only.
    pub fn present(&self) -> impl Iterator<Item = (usize, PageEntry)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, &raw)| (i, PageEntry::decode(raw)))
            .filter(|(_, e)| e.present)
    }
}

const _: () = {
    assert!(size_of::<PageTable>() == 4096);
    assert!(align_of::<PageTable>() == 4096);
};
