use bitfield_struct::bitfield;
use kernel_memory_addresses::{PhysicalAddress, PhysicalFrame};

/// CR3: Page-Map Level-4 Base Register (PCID disabled).
///
/// Bits 12‒51 hold the physical frame of the active PML4. The low twelve bits
/// carry cache-control flags for the root walk and must be masked off to get
/// the table address.
#[bitfield(u64)]
pub struct Cr3 {
    #[bits(3)]
    pub reserved0: u8,

    /// Bit 3: page-level write-through for the PML4 access.
    pub pwt: bool,

    /// Bit 4: page-level cache disable for the PML4 access.
    pub pcd: bool,

    #[bits(7)]
    pub reserved1: u8,

    /// Bits 12‒51: PML4 physical base `>> 12`.
    #[bits(40)]
    pml4_base_4k: u64,

    #[bits(12)]
    pub reserved2: u16,
}

impl Cr3 {
    /// CR3 value pointing at `pml4` with write-back caching.
    #[must_use]
    pub const fn from_pml4(pml4: PhysicalFrame) -> Self {
        Self::new().with_pml4_base_4k(pml4.number())
    }

    /// The PML4 frame with every flag bit removed.
    #[must_use]
    pub const fn pml4(&self) -> PhysicalFrame {
        PhysicalFrame::from_number(self.pml4_base_4k())
    }

    /// Physical address of the PML4 (`CR3 & !0xFFF`, bits above 51 dropped).
    #[must_use]
    pub const fn pml4_phys(&self) -> PhysicalAddress {
        self.pml4().start_address()
    }
}

#[cfg(all(feature = "asm", target_arch = "x86_64"))]
impl crate::LoadRegisterUnsafe for Cr3 {
    unsafe fn load_unsafe() -> Self {
        let cr3: u64;
        unsafe {
            core::arch::asm!("mov {}, cr3", out(reg) cr3, options(nomem, nostack, preserves_flags));
        }
        Self::from_bits(cr3)
    }
}
