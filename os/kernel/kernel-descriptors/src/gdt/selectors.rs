//! Segment selectors.
//!
//! ```text
//!  15            3 2  1  0
//! +----------------+--+----+
//! |   Index[12:0]  |TI| RPL|
//! +----------------+--+----+
//! ```
//!
//! [`CodeSelector`] and [`DataSelector`] keep the two kinds apart, so a data
//! selector cannot end up in CS.

use crate::privilege::PrivilegeLevel;
use bitfield_struct::bitfield;

/// Which descriptor table a selector indexes.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[repr(u8)]
pub enum Table {
    Gdt = 0,
    Ldt = 1,
}

impl Table {
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        if bits & 1 == 0 { Self::Gdt } else { Self::Ldt }
    }

    #[inline]
    #[must_use]
    pub const fn into_bits(self) -> u8 {
        self as u8
    }
}

/// Raw 16-bit selector.
#[bitfield(u16)]
#[derive(PartialEq, Eq)]
pub struct SegmentSelector {
    /// Requested privilege level.
    #[bits(2)]
    pub rpl: PrivilegeLevel,
    /// Table indicator.
    #[bits(1)]
    pub table: Table,
    /// Descriptor index.
    #[bits(13)]
    pub index: u16,
}

impl SegmentSelector {
    /// A GDT selector for `index` at `rpl`.
    #[inline]
    #[must_use]
    pub const fn gdt(index: u16, rpl: PrivilegeLevel) -> Self {
        Self::new()
            .with_index(index)
            .with_table(Table::Gdt)
            .with_rpl(rpl)
    }

    #[inline]
    #[must_use]
    pub const fn encode(self) -> u16 {
        self.into_bits()
    }
}

/// Selector destined for CS.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct CodeSelector(SegmentSelector);

/// Selector destined for DS/ES/FS/GS/SS.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct DataSelector(SegmentSelector);

impl CodeSelector {
    #[inline]
    #[must_use]
    pub const fn new(index: u16, rpl: PrivilegeLevel) -> Self {
        Self(SegmentSelector::gdt(index, rpl))
    }

    #[inline]
    #[must_use]
    pub const fn raw(self) -> SegmentSelector {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0.index() as usize
    }

    #[inline]
    #[must_use]
    pub const fn encode(self) -> u16 {
        self.0.encode()
    }
}

impl DataSelector {
    #[inline]
    #[must_use]
    pub const fn new(index: u16, rpl: PrivilegeLevel) -> Self {
        Self(SegmentSelector::gdt(index, rpl))
    }

    #[inline]
    #[must_use]
    pub const fn raw(self) -> SegmentSelector {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0.index() as usize
    }

    #[inline]
    #[must_use]
    pub const fn encode(self) -> u16 {
        self.0.encode()
    }
}

/// GDT slot 1, RPL 0.
pub const KERNEL_CODE_SELECTOR: CodeSelector = CodeSelector::new(1, PrivilegeLevel::Ring0);

/// GDT slot 2, RPL 0.
pub const KERNEL_DATA_SELECTOR: DataSelector = DataSelector::new(2, PrivilegeLevel::Ring0);

const _: () = {
    assert!(KERNEL_CODE_SELECTOR.encode() == 0x08);
    assert!(KERNEL_DATA_SELECTOR.encode() == 0x10);
};
