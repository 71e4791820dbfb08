use crate::page_fault::{FaultAccess, PageFaultError};
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
use thiserror::Error;

/// A trap the kernel cannot continue from.
#[derive(Debug, Error, Copy, Clone, PartialEq, Eq)]
pub enum FatalInterrupt {
    #[error("unhandled exception {vector}: {name} (error code {error_code:#x})")]
    Exception {
        vector: u8,
        name: &'static str,
        error_code: u64,
    },

    #[error("page fault: {access} at {address} under root {root}: {}", .error.explain())]
    PageFault {
        address: VirtualAddress,
        root: PhysicalAddress,
        access: FaultAccess,
        error: PageFaultError,
    },

    /// The saved vector number does not fit a vector.
    #[error("corrupt interrupt frame (vector {interrupt:#x})")]
    CorruptFrame { interrupt: u64 },
}
