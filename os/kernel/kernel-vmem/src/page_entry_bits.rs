use bitfield_struct::bitfield;
use kernel_memory_addresses::{PhysicalAddress, PhysicalFrame};

/// Raw 64-bit page-table entry, valid at every level of the hierarchy.
///
/// | Bits  | Field | Meaning |
/// |-------|-------|---------|
/// | 0     | P     | present |
/// | 1     | RW    | writable |
/// | 2     | US    | user accessible |
/// | 3     | PWT   | write-through |
/// | 4     | PCD   | cache disable |
/// | 5     | A     | accessed (set by CPU) |
/// | 6     | D     | dirty (leaf, set by CPU) |
/// | 7     | PS    | large page at L3/L2, PAT at L1 |
/// | 8     | G     | global (leaf) |
/// | 9‒11  |       | free for OS use |
/// | 12‒51 | addr  | physical frame `>> 12` |
/// | 52‒58 |       | free for OS use |
/// | 59‒62 | PK    | protection key |
/// | 63    | XD    | no-execute |
///
/// Only 4 KiB leaves are created by this crate. `large_page` is read when
/// walking tables set up by the boot loader.
///
/// ### Example
/// ```rust
/// # use kernel_memory_addresses::PhysicalFrame;
/// # use kernel_vmem::PageEntryBits;
/// let e = PageEntryBits::kernel_rw().with_frame(PhysicalFrame::from_number(0x200));
/// assert!(e.present());
/// assert_eq!(e.into_bits(), 0x20_0003);
/// ```
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct PageEntryBits {
    pub present: bool,
    pub writable: bool,
    pub user_access: bool,
    pub write_through: bool,
    pub cache_disabled: bool,
    pub accessed: bool,
    pub dirty: bool,
    /// PS. Terminates the walk at L3 (1 GiB) or L2 (2 MiB).
    pub large_page: bool,
    pub global_translation: bool,

    #[bits(3)]
    pub os_available_low: u8,

    #[bits(40)]
    phys_addr_bits_51_12: u64,

    #[bits(7)]
    pub os_available_high: u8,

    #[bits(4)]
    pub protection_key: u8,

    /// Instruction fetches through this entry fault when `EFER.NXE` is set.
    pub no_execute: bool,
}

impl PageEntryBits {
    /// Mask of the physical address field (bits 12‒51).
    pub const ADDRESS_MASK: u64 = 0x000F_FFFF_FFFF_F000;

    /// Largest frame number the address field can hold.
    const FRAME_MASK: u64 = Self::ADDRESS_MASK >> 12;

    /// Bits of `phys` outside [`ADDRESS_MASK`](Self::ADDRESS_MASK) are dropped.
    #[inline]
    pub const fn set_physical_address(&mut self, phys: PhysicalAddress) {
        self.set_phys_addr_bits_51_12((phys.as_u64() & Self::ADDRESS_MASK) >> 12);
    }

    #[inline]
    #[must_use]
    pub const fn physical_address(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.phys_addr_bits_51_12() << 12)
    }

    #[inline]
    #[must_use]
    pub const fn frame(&self) -> PhysicalFrame {
        PhysicalFrame::from_number(self.phys_addr_bits_51_12())
    }

    #[inline]
    #[must_use]
    pub const fn with_frame(self, frame: PhysicalFrame) -> Self {
        self.with_phys_addr_bits_51_12(frame.number() & Self::FRAME_MASK)
    }

    /// The same entry with the address field cleared, leaving only flags.
    #[inline]
    #[must_use]
    pub const fn flags_only(self) -> Self {
        self.with_phys_addr_bits_51_12(0)
    }

    /// Present, writable, supervisor-only, write-back, executable.
    ///
    /// Used for intermediate tables and ordinary kernel data.
    #[inline]
    #[must_use]
    pub const fn kernel_rw() -> Self {
        Self::new().with_present(true).with_writable(true)
    }

    /// Present, read-only, supervisor-only.
    #[inline]
    #[must_use]
    pub const fn kernel_ro() -> Self {
        Self::new().with_present(true)
    }

    /// Present, writable, uncached. For device memory.
    #[inline]
    #[must_use]
    pub const fn kernel_mmio() -> Self {
        Self::kernel_rw()
            .with_cache_disabled(true)
            .with_write_through(true)
            .with_no_execute(true)
    }
}
