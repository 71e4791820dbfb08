//! The 8-byte code/data segment descriptor.
//!
//! ```text
//!  63      56 55  52 51    48 47      40 39      16 15       0
//! +----------+------+--------+----------+----------+----------+
//! | base_hi  | G DB | limit  |  access  |   base   |  limit   |
//! |          | L AVL| 19:16  |          |   23:0   |   15:0   |
//! +----------+------+--------+----------+----------+----------+
//! ```
//!
//! In long mode the CPU ignores base and limit for code and data segments,
//! but a flat 4 GiB limit with G=1 is still what loaders and debuggers expect
//! to see.

use crate::privilege::PrivilegeLevel;
use bitfield_struct::bitfield;

#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct SegmentDescriptor {
    /// Limit bits 15:0.
    #[bits(16)]
    pub limit_low: u16,
    /// Base bits 23:0.
    #[bits(24)]
    pub base_low: u32,

    /// Set by the CPU on first use.
    pub accessed: bool,
    /// Readable for code, writable for data.
    pub readable_writable: bool,
    /// Conforming for code, expand-down for data.
    pub conforming_expand_down: bool,
    pub executable: bool,
    /// 1 for code/data, 0 for system descriptors.
    pub code_or_data: bool,
    #[bits(2)]
    pub dpl: PrivilegeLevel,
    pub present: bool,

    /// Limit bits 19:16.
    #[bits(4)]
    pub limit_high: u8,
    pub available: bool,
    /// 64-bit code segment.
    pub long_mode: bool,
    /// Default operand size; must be 0 when `long_mode` is set.
    pub default_size: bool,
    /// Limit is counted in 4 KiB units.
    pub granularity: bool,
    /// Base bits 31:24.
    #[bits(8)]
    pub base_high: u8,
}

const _: () = {
    assert!(size_of::<SegmentDescriptor>() == 8);
};

impl SegmentDescriptor {
    /// The mandatory all-zero slot 0.
    pub const NULL: Self = Self::new();

    const FLAT_LIMIT: u32 = 0xF_FFFF;

    /// Present, accessed-clear, S=1 descriptor with base 0 and a 4 KiB
    /// granular limit of `0xFFFFF`.
    #[allow(clippy::cast_possible_truncation)]
    const fn flat(dpl: PrivilegeLevel) -> Self {
        Self::new()
            .with_limit_low((Self::FLAT_LIMIT & 0xFFFF) as u16)
            .with_limit_high((Self::FLAT_LIMIT >> 16) as u8)
            .with_code_or_data(true)
            .with_dpl(dpl)
            .with_present(true)
            .with_granularity(true)
    }

    /// Ring-0 64-bit code: access `0x9A`, flags `0xA`.
    #[must_use]
    pub const fn kernel_code() -> Self {
        Self::flat(PrivilegeLevel::Ring0)
            .with_executable(true)
            .with_readable_writable(true)
            .with_long_mode(true)
    }

    /// Ring-0 data: access `0x92`, flags `0x8`.
    #[must_use]
    pub const fn kernel_data() -> Self {
        Self::flat(PrivilegeLevel::Ring0).with_readable_writable(true)
    }

    /// Bits 47:40.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn access_byte(self) -> u8 {
        (self.into_bits() >> 40) as u8
    }

    /// Bits 55:52 (G, DB, L, AVL).
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn flags(self) -> u8 {
        ((self.into_bits() >> 52) & 0xF) as u8
    }

    #[must_use]
    #[allow(clippy::cast_lossless)]
    pub const fn limit(self) -> u32 {
        (self.limit_low() as u32) | ((self.limit_high() as u32) << 16)
    }

    #[must_use]
    #[allow(clippy::cast_lossless)]
    pub const fn base(self) -> u32 {
        self.base_low() | ((self.base_high() as u32) << 24)
    }

    /// Present, S=1 and executable.
    #[must_use]
    pub const fn is_code(self) -> bool {
        self.present() && self.code_or_data() && self.executable()
    }

    /// Present, S=1 and not executable.
    #[must_use]
    pub const fn is_data(self) -> bool {
        self.present() && self.code_or_data() && !self.executable()
    }
}
