use crate::PageEntry;
use core::fmt;
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};

const LEVEL_NAMES: [&str; 4] = ["PML4", "PDPT", "PD", "PT"];

/// Result of a diagnostic page walk.
///
/// Records every entry visited on the way down. Rendering it with `{}`
/// yields one line per level plus the final physical address, which is
/// what the kernel logs when asked to explain a mapping.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Translation {
    pub va: VirtualAddress,
    /// Entries visited, root level first; `None` once the walk stopped.
    pub levels: [Option<PageEntry>; 4],
    /// Final physical address including the page offset.
    pub phys: Option<PhysicalAddress>,
}

impl Translation {
    #[must_use]
    pub const fn is_mapped(&self) -> bool {
        self.phys.is_some()
    }

    /// The leaf entry, if the walk reached a present PT entry.
    #[must_use]
    pub const fn leaf(&self) -> Option<PageEntry> {
        match self.levels[3] {
            Some(e) if e.present => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Translation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "translate {}:", self.va)?;
        let indices = self.va.table_indices();
        for (level, entry) in self.levels.iter().enumerate() {
            let Some(entry) = entry else { break };
            writeln!(
                f,
                "  {:<4}[{:>3}] {}",
                LEVEL_NAMES[level], indices[level], entry
            )?;
        }
        match self.phys {
            Some(pa) => write!(f, "  => {pa}"),
            None => write!(f, "  => not mapped"),
        }
    }
}
