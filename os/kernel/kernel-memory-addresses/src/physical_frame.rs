use crate::{PAGE_SHIFT, PAGE_SIZE, PhysicalAddress};
use core::fmt;

/// A 4 KiB-aligned physical frame.
///
/// This is the unit the frame allocator hands out and the unit a leaf page
/// table entry points to.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalFrame(PhysicalAddress);

impl PhysicalFrame {
    /// The frame containing `addr` (low 12 bits cleared).
    #[inline]
    #[must_use]
    pub const fn containing_address(addr: PhysicalAddress) -> Self {
        Self(addr.align_down(PAGE_SIZE))
    }

    /// The frame starting at `addr`, or `None` if `addr` is not 4 KiB-aligned.
    #[inline]
    #[must_use]
    pub const fn from_start_address(addr: PhysicalAddress) -> Option<Self> {
        if addr.is_aligned(PAGE_SIZE) {
            Some(Self(addr))
        } else {
            None
        }
    }

    /// The frame with the given frame number (`address >> 12`).
    #[inline]
    #[must_use]
    pub const fn from_number(number: u64) -> Self {
        Self(PhysicalAddress::new(number << PAGE_SHIFT))
    }

    #[inline]
    #[must_use]
    pub const fn start_address(self) -> PhysicalAddress {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn number(self) -> u64 {
        self.0.as_u64() >> PAGE_SHIFT
    }
}

impl fmt::Debug for PhysicalFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysicalFrame(0x{:016X})", self.0.as_u64())
    }
}

impl fmt::Display for PhysicalFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<PhysicalFrame> for PhysicalAddress {
    #[inline]
    fn from(frame: PhysicalFrame) -> Self {
        frame.0
    }
}
