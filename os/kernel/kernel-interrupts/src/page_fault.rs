//! `#PF` (vector 14).
//!
//! Page faults are never resumed. The handler gathers CR2, CR3 and the error
//! code, logs them next to the register dump and hands back a
//! [`FatalInterrupt::PageFault`].

use crate::{FatalInterrupt, InterruptFrame};
use bitfield_struct::bitfield;
use core::fmt;
use kernel_registers::Cpu;

/// Error code pushed by the CPU for a page fault (SDM Vol. 3A, 4.7).
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct PageFaultError {
    /// Clear: the page was not present. Set: a protection check failed.
    pub protection_violation: bool,
    /// The access was a write.
    pub write: bool,
    /// The access came from CPL 3.
    pub user: bool,
    /// A reserved bit was set in some paging-structure entry.
    pub reserved_bit: bool,
    pub instruction_fetch: bool,
    pub protection_key: bool,
    pub shadow_stack: bool,
    #[bits(57)]
    _reserved: u64,
}

impl PageFaultError {
    /// Read or write, from the W/R flag (bit 1). Bit 0 only tells a missing
    /// page from a protection violation; see [`explain`](Self::explain).
    #[must_use]
    pub const fn access(self) -> FaultAccess {
        if self.write() {
            FaultAccess::Write
        } else {
            FaultAccess::Read
        }
    }

    /// One-line reading of the error code.
    #[must_use]
    pub const fn explain(self) -> &'static str {
        if self.reserved_bit() {
            "Reserved bit set in a paging-structure entry"
        } else if !self.protection_violation() {
            if self.instruction_fetch() {
                "Instruction fetch from a non-present page"
            } else {
                "Access to a non-present page"
            }
        } else if self.instruction_fetch() {
            "Instruction fetch from a non-executable page"
        } else if self.protection_key() {
            "Protection key violation"
        } else if self.write() {
            "Write to a read-only page"
        } else {
            "Read from a protected page"
        }
    }
}

/// Whether the faulting access read or wrote.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FaultAccess {
    Read,
    Write,
}

impl fmt::Display for FaultAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Read => "read",
            Self::Write => "write",
        })
    }
}

/// Registered for [`PAGE_FAULT_VECTOR`](crate::PAGE_FAULT_VECTOR) at boot.
///
/// # Errors
/// Always returns [`FatalInterrupt::PageFault`].
pub fn page_fault_handler(frame: &mut InterruptFrame, cpu: &dyn Cpu) -> Result<(), FatalInterrupt> {
    let address = cpu.fault_address();
    let root = cpu.page_table_root().pml4_phys();
    let error = PageFaultError::from_bits(frame.error_code);
    let access = error.access();

    log::error!("Page fault: {access} access to {address}");
    log::error!("  CR2={address} CR3={root}");
    log::error!("  {}", error.explain());
    log::error!("\n{frame}");

    Err(FatalInterrupt::PageFault {
        address,
        root,
        access,
        error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_memory_addresses::{PhysicalAddress, PhysicalFrame, VirtualAddress};
    use kernel_registers::RecordingCpu;

    #[test]
    fn write_to_unmapped_page() {
        let cpu = RecordingCpu::with_page_table_root(PhysicalFrame::from_number(0x42));
        cpu.set_fault_address(VirtualAddress::new(0xDEAD_B000));
        let mut frame = InterruptFrame::for_vector(14, 0b10);

        let err = page_fault_handler(&mut frame, &cpu).unwrap_err();

        assert_eq!(
            err,
            FatalInterrupt::PageFault {
                address: VirtualAddress::new(0xDEAD_B000),
                root: PhysicalAddress::new(0x42_000),
                access: FaultAccess::Write,
                error: PageFaultError::from_bits(0b10),
            }
        );
    }

    #[test]
    fn classification() {
        let read_absent = PageFaultError::new();
        assert_eq!(read_absent.access(), FaultAccess::Read);
        assert_eq!(read_absent.explain(), "Access to a non-present page");

        let write_ro = PageFaultError::new().with_protection_violation(true).with_write(true);
        assert_eq!(write_ro.access(), FaultAccess::Write);
        assert_eq!(write_ro.explain(), "Write to a read-only page");

        let read_protected = PageFaultError::from_bits(0b01);
        assert_eq!(read_protected.access(), FaultAccess::Read);
        assert_eq!(read_protected.explain(), "Read from a protected page");

        let nx = PageFaultError::from_bits(0b1_0001);
        assert_eq!(nx.explain(), "Instruction fetch from a non-executable page");
    }
}
