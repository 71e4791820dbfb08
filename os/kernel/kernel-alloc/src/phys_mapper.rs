//! # HHDM-based `PhysMapper`
//!
//! With a higher-half direct map every physical address `pa` is readable at
//! `pa + offset`. The offset is chosen by the boot loader, so it is carried
//! as a value rather than a constant.
//!
//! ## Example
//! ```rust
//! use kernel_alloc::HhdmPhysMapper;
//! use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
//! use kernel_vmem::PhysMapper;
//!
//! let hhdm = HhdmPhysMapper::new(0xffff_8000_0000_0000);
//! let va = hhdm.phys_to_virt(PhysicalAddress::new(0x20_0000));
//! assert_eq!(va, VirtualAddress::new(0xffff_8000_0020_0000));
//! assert_eq!(hhdm.virt_to_phys(va), PhysicalAddress::new(0x20_0000));
//! ```

use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
use kernel_vmem::PhysMapper;

/// [`PhysMapper`] for a kernel with a higher-half direct map.
///
/// Both directions are plain wrapping arithmetic. They are only meaningful
/// for memory inside the direct-mapped range, which covers all RAM.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct HhdmPhysMapper {
    offset: u64,
}

impl HhdmPhysMapper {
    #[must_use]
    pub const fn new(offset: u64) -> Self {
        Self { offset }
    }

    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    #[inline]
    #[must_use]
    pub const fn virt_to_phys(&self, va: VirtualAddress) -> PhysicalAddress {
        PhysicalAddress::new(va.as_u64().wrapping_sub(self.offset))
    }
}

impl PhysMapper for HhdmPhysMapper {
    #[inline]
    fn phys_to_virt(&self, pa: PhysicalAddress) -> VirtualAddress {
        VirtualAddress::new(pa.as_u64().wrapping_add(self.offset))
    }
}
