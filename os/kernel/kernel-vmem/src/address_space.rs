//! # Address Space (PML4-rooted)
//!
//! Walks and edits one four-level tree through a [`PhysMapper`]. Only 4 KiB
//! leaves are installed. Huge pages left by the boot loader are understood
//! when translating but never split.
//!
//! TLB maintenance is the caller's job: after [`AddressSpace::map_4k`] or
//! [`AddressSpace::unmap_4k`] on the active tree, invalidate the page.

use crate::{Entry, FrameAlloc, PageEntryBits, PageTable, PhysMapper};
use core::fmt;
use kernel_memory_addresses::{
    PhysicalAddress, PhysicalFrame, TableLevel, VirtualAddress, VirtualPage,
};

/// Handle to a single address space.
pub struct AddressSpace<'m, M: PhysMapper> {
    root: PhysicalFrame,
    mapper: &'m M,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum MapError {
    /// The frame allocator ran dry while a table below `level` was missing.
    /// Nothing was linked into the `level` table.
    #[error("out of physical frames for a table below the {level}")]
    OutOfMemory { level: TableLevel },

    /// A huge page occupies the `level` entry on the path.
    #[error("{level} entry maps a huge page; cannot install a 4 KiB leaf")]
    HugePageInPath { level: TableLevel },
}

/// One level visited by [`AddressSpace::walk`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct WalkStep {
    pub level: TableLevel,
    pub index: usize,
    pub raw: PageEntryBits,
    pub entry: Entry,
}

/// Entries seen while resolving one virtual address, root first.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Walk {
    steps: [Option<WalkStep>; 4],
}

impl Walk {
    pub fn steps(&self) -> impl Iterator<Item = &WalkStep> {
        self.steps.iter().flatten()
    }

    /// The last entry read. Either absent, a leaf, or a huge page.
    #[must_use]
    pub fn last(&self) -> Option<&WalkStep> {
        self.steps().last()
    }

    /// Raw L1 entry, if the walk got that far.
    #[must_use]
    pub fn leaf(&self) -> Option<PageEntryBits> {
        self.steps()
            .find(|s| s.level.is_leaf())
            .map(|s| s.raw)
    }
}

impl fmt::Display for Walk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{}[{}]={}", step.level, step.index, step.entry)?;
        }
        Ok(())
    }
}

impl<'m, M: PhysMapper> AddressSpace<'m, M> {
    /// # Safety
    /// `root` must be a PML4 frame, and every table reachable from it must be
    /// writable through `mapper` for `'m`. No other code may edit those
    /// tables while this handle is used.
    #[inline]
    pub const unsafe fn from_root(mapper: &'m M, root: PhysicalFrame) -> Self {
        Self { root, mapper }
    }

    #[inline]
    #[must_use]
    pub const fn root(&self) -> PhysicalFrame {
        self.root
    }

    /// Where `frame` is visible through the mapper. Dereference only for as
    /// long as no other reference to the same table is live.
    #[inline]
    fn table(&self, frame: PhysicalFrame) -> *mut PageTable {
        self.mapper.phys_to_virt(frame.start_address()).as_mut_ptr()
    }

    /// Install `page -> frame` with `flags` (present is forced on).
    ///
    /// Missing intermediate tables are taken from `alloc`, zeroed, and
    /// linked present + writable. An existing leaf is overwritten.
    ///
    /// # Errors
    /// [`MapError::OutOfMemory`] if `alloc` is exhausted. Tables linked by
    /// earlier levels of this call stay linked and empty.
    pub fn map_4k<A: FrameAlloc>(
        &mut self,
        alloc: &mut A,
        page: VirtualPage,
        frame: PhysicalFrame,
        flags: PageEntryBits,
    ) -> Result<(), MapError> {
        let va = page.start_address();
        let mut table = self.table(self.root);
        let mut level = TableLevel::L4;

        while let Some(lower) = level.next_lower() {
            let index = va.table_index(level);
            // SAFETY: `from_root` contract, and `&mut self` keeps this the only
            // handle editing the tree.
            let current = unsafe { &mut *table };
            let next = match Entry::decode(current.get(index), level) {
                Entry::Table(next) => next,
                Entry::Absent => {
                    let fresh = alloc
                        .alloc_4k()
                        .ok_or(MapError::OutOfMemory { level })?;
                    // SAFETY: a freshly allocated frame is not yet part of the
                    // tree, so it cannot alias `current`.
                    unsafe { (*self.table(fresh)).zero() };
                    current.set(index, Entry::Table(fresh).encode());
                    log::trace!("new {lower} table at {fresh} for {va}");
                    fresh
                }
                Entry::HugePage { .. } | Entry::Page { .. } => {
                    return Err(MapError::HugePageInPath { level });
                }
            };
            table = self.table(next);
            level = lower;
        }

        // SAFETY: as above.
        let leaf = unsafe { &mut *table };
        leaf.set(
            va.table_index(TableLevel::L1),
            Entry::Page { frame, flags }.encode(),
        );
        Ok(())
    }

    /// Clear the L1 entry for `page`.
    ///
    /// Returns the previous raw entry when the walk reached the leaf table,
    /// `None` when an intermediate level was absent (nothing to do).
    /// Intermediate tables are never freed.
    pub fn unmap_4k(&mut self, page: VirtualPage) -> Option<PageEntryBits> {
        let va = page.start_address();
        let mut table = self.table(self.root);
        let mut level = TableLevel::L4;

        while let Some(lower) = level.next_lower() {
            // SAFETY: `from_root` contract; the entry is copied out.
            let raw = unsafe { (*table).get(va.table_index(level)) };
            let Entry::Table(next) = Entry::decode(raw, level) else {
                return None;
            };
            table = self.table(next);
            level = lower;
        }

        // SAFETY: `&mut self` keeps this the only live reference to the table.
        let leaf = unsafe { &mut *table };
        let index = va.table_index(TableLevel::L1);
        let previous = leaf.get(index);
        leaf.clear(index);
        Some(previous)
    }

    /// Record every entry read while resolving `va`.
    #[must_use]
    pub fn walk(&self, va: VirtualAddress) -> Walk {
        let mut walk = Walk::default();
        let mut frame = self.root;

        for (slot, level) in TableLevel::WALK_ORDER.into_iter().enumerate() {
            let index = va.table_index(level);
            // SAFETY: `from_root` contract; the entry is copied out.
            let raw = unsafe { (*self.table(frame)).get(index) };
            let entry = Entry::decode(raw, level);
            walk.steps[slot] = Some(WalkStep {
                level,
                index,
                raw,
                entry,
            });
            match entry {
                Entry::Table(next) => frame = next,
                _ => break,
            }
        }
        walk
    }

    /// Physical address `va` resolves to, including the in-page offset.
    #[must_use]
    pub fn translate(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        match self.walk(va).last()?.entry {
            Entry::Page { frame, .. } => Some(frame.start_address() + va.page_offset()),
            Entry::HugePage { base, level } => {
                let span = 1u64 << level.shift();
                Some(base + (va.as_u64() & (span - 1)))
            }
            Entry::Absent | Entry::Table(_) => None,
        }
    }
}
