use crate::{PAGE_SIZE, VirtualAddress};
use core::fmt;

/// A 4 KiB-aligned virtual page.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualPage(VirtualAddress);

impl VirtualPage {
    /// The page containing `addr` (low 12 bits cleared).
    #[inline]
    #[must_use]
    pub const fn containing_address(addr: VirtualAddress) -> Self {
        Self(addr.align_down(PAGE_SIZE))
    }

    /// The page starting at `addr`, or `None` if `addr` is not 4 KiB-aligned.
    #[inline]
    #[must_use]
    pub const fn from_start_address(addr: VirtualAddress) -> Option<Self> {
        if addr.is_aligned(PAGE_SIZE) {
            Some(Self(addr))
        } else {
            None
        }
    }

    #[inline]
    #[must_use]
    pub const fn start_address(self) -> VirtualAddress {
        self.0
    }
}

impl fmt::Debug for VirtualPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtualPage(0x{:016X})", self.0.as_u64())
    }
}

impl From<VirtualPage> for VirtualAddress {
    #[inline]
    fn from(page: VirtualPage) -> Self {
        page.0
    }
}
