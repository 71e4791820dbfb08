//! # Page Table
//!
//! One 4 KiB table of 512 raw entries. The same layout is used at all four
//! levels; what an entry means depends on the level it is read at (see
//! [`Entry::decode`](crate::Entry::decode)).

use crate::PageEntryBits;
use kernel_memory_addresses::ENTRIES_PER_TABLE;

#[doc(alias = "PML4")]
#[doc(alias = "PDPT")]
#[doc(alias = "PD")]
#[doc(alias = "PT")]
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [PageEntryBits; ENTRIES_PER_TABLE],
}

const _: () = {
    assert!(size_of::<PageTable>() == 4096);
    assert!(align_of::<PageTable>() == 4096);
};

impl PageTable {
    /// A table with every entry not present.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: [PageEntryBits::new(); ENTRIES_PER_TABLE],
        }
    }

    /// Clear all 512 entries.
    #[inline]
    pub fn zero(&mut self) {
        self.entries.fill(PageEntryBits::new());
    }

    #[inline]
    #[must_use]
    pub const fn get(&self, index: usize) -> PageEntryBits {
        self.entries[index]
    }

    #[inline]
    pub const fn set(&mut self, index: usize, entry: PageEntryBits) {
        self.entries[index] = entry;
    }

    #[inline]
    pub const fn clear(&mut self, index: usize) {
        self.entries[index] = PageEntryBits::new();
    }

    /// Indices of present entries.
    pub fn present_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.present())
            .map(|(i, _)| i)
    }
}

impl Default for PageTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_table_is_empty() {
        let t = PageTable::new();
        assert_eq!(t.present_indices().count(), 0);
    }

    #[test]
    fn clear_only_touches_one_slot() {
        let mut t = PageTable::new();
        t.set(3, PageEntryBits::kernel_rw());
        t.set(4, PageEntryBits::kernel_rw());
        t.clear(3);
        assert_eq!(t.present_indices().collect::<Vec<_>>(), [4]);
    }
}
