use crate::PageEntryBits;
use core::fmt;
use kernel_memory_addresses::{PhysicalAddress, PhysicalFrame, TableLevel};

/// Decoded meaning of one page-table entry.
///
/// Page-table code matches on this instead of testing raw bits. The hardware
/// form is produced only by [`Entry::encode`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Entry {
    /// Not present. The walk stops here.
    Absent,

    /// Points to the next-level table (L4, L3 and L2 only).
    Table(PhysicalFrame),

    /// 4 KiB leaf at L1. `flags` has the address field cleared.
    Page {
        frame: PhysicalFrame,
        flags: PageEntryBits,
    },

    /// 1 GiB (L3) or 2 MiB (L2) leaf. Never created here; the boot loader's
    /// direct map may use them.
    HugePage {
        base: PhysicalAddress,
        level: TableLevel,
    },
}

impl Entry {
    /// Interpret `bits` as read from a table at `level`.
    #[must_use]
    pub const fn decode(bits: PageEntryBits, level: TableLevel) -> Self {
        if !bits.present() {
            return Self::Absent;
        }
        match level {
            TableLevel::L1 => Self::Page {
                frame: bits.frame(),
                flags: bits.flags_only(),
            },
            TableLevel::L3 | TableLevel::L2 if bits.large_page() => Self::HugePage {
                base: bits.physical_address(),
                level,
            },
            _ => Self::Table(bits.frame()),
        }
    }

    /// Hardware form of this entry.
    ///
    /// Table pointers are present and writable. Leaves get the caller's
    /// flags with the present bit forced on.
    #[must_use]
    pub const fn encode(self) -> PageEntryBits {
        match self {
            Self::Absent => PageEntryBits::new(),
            Self::Table(frame) => PageEntryBits::kernel_rw().with_frame(frame),
            Self::Page { frame, flags } => flags.with_present(true).with_frame(frame),
            Self::HugePage { base, .. } => {
                let mut bits = PageEntryBits::new().with_present(true).with_large_page(true);
                bits.set_physical_address(base);
                bits
            }
        }
    }

    #[must_use]
    pub const fn is_present(&self) -> bool {
        !matches!(self, Self::Absent)
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => f.write_str("absent"),
            Self::Table(frame) => write!(f, "table@{frame}"),
            Self::Page { frame, flags } => write!(
                f,
                "page@{frame} {}{}{}",
                if flags.writable() { "W" } else { "R" },
                if flags.user_access() { "U" } else { "S" },
                if flags.no_execute() { "" } else { "X" },
            ),
            Self::HugePage { base, level } => write!(f, "huge({level})@{base}"),
        }
    }
}
