//! # Kernel Boot Information

/// Everything the kernel needs from the loader.
///
/// Keep this `#[repr(C)]` with fixed-size integers only.
#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct KernelBootInfo {
    /// Physical memory map.
    pub memory_map: MemoryMapInfo,

    /// Virtual address at which physical address 0 is mapped.
    pub hhdm_offset: u64,

    /// RSDP (ACPI 2.0+) physical address, or 0 if not provided.
    pub rsdp_addr: u64,
}

#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct MemoryMapInfo {
    /// Address of the first [`MemoryRegion`], readable by the kernel at entry.
    pub regions_ptr: u64,

    /// Number of [`MemoryRegion`] records.
    pub region_count: u64,
}

/// One physical memory range as reported by firmware.
#[repr(C)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MemoryRegion {
    pub base: u64,
    pub length: u64,
    /// Raw [`MemoryRegionKind`] tag. Stored as an integer so an unexpected
    /// value from the loader cannot form an invalid enum.
    pub kind: u32,
}

impl MemoryRegion {
    #[must_use]
    pub const fn new(base: u64, length: u64, kind: MemoryRegionKind) -> Self {
        Self {
            base,
            length,
            kind: kind as u32,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> MemoryRegionKind {
        MemoryRegionKind::from_raw(self.kind)
    }

    #[must_use]
    pub const fn is_usable(&self) -> bool {
        matches!(self.kind(), MemoryRegionKind::Usable)
    }

    /// One past the last byte, saturating at `u64::MAX`.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.base.saturating_add(self.length)
    }
}

#[repr(u32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MemoryRegionKind {
    /// Free RAM, available to the frame allocator.
    Usable = 0,
    Reserved = 1,
    AcpiReclaimable = 2,
    AcpiNvs = 3,
    BadMemory = 4,
    /// Loader code and data; holds the boot info itself.
    BootloaderReclaimable = 5,
    /// Kernel image and boot stack.
    KernelAndModules = 6,
    Framebuffer = 7,
}

impl MemoryRegionKind {
    /// Decode a raw tag. Unknown values are treated as reserved.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::Usable,
            2 => Self::AcpiReclaimable,
            3 => Self::AcpiNvs,
            4 => Self::BadMemory,
            5 => Self::BootloaderReclaimable,
            6 => Self::KernelAndModules,
            7 => Self::Framebuffer,
            _ => Self::Reserved,
        }
    }
}
