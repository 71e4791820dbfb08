use core::fmt;

/// One of the four levels of the x86-64 paging hierarchy.
///
/// | Level | Table | Index bits |
/// |-------|-------|------------|
/// | `L4` | PML4 | 47‒39 |
/// | `L3` | PDPT | 38‒30 |
/// | `L2` | PD   | 29‒21 |
/// | `L1` | PT   | 20‒12 |
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum TableLevel {
    L4,
    L3,
    L2,
    L1,
}

impl TableLevel {
    /// All levels, root first.
    pub const WALK_ORDER: [Self; 4] = [Self::L4, Self::L3, Self::L2, Self::L1];

    /// Bit position of this level's index inside a virtual address.
    #[inline]
    #[must_use]
    pub const fn shift(self) -> u32 {
        match self {
            Self::L4 => 39,
            Self::L3 => 30,
            Self::L2 => 21,
            Self::L1 => 12,
        }
    }

    /// The level below this one, or `None` for the leaf table.
    #[inline]
    #[must_use]
    pub const fn next_lower(self) -> Option<Self> {
        match self {
            Self::L4 => Some(Self::L3),
            Self::L3 => Some(Self::L2),
            Self::L2 => Some(Self::L1),
            Self::L1 => None,
        }
    }

    /// `true` for the leaf table (PT), whose entries map frames.
    #[inline]
    #[must_use]
    pub const fn is_leaf(self) -> bool {
        matches!(self, Self::L1)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::L4 => "PML4",
            Self::L3 => "PDPT",
            Self::L2 => "PD",
            Self::L1 => "PT",
        }
    }
}

impl fmt::Display for TableLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
