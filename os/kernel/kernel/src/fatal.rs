//! The one place the kernel stops.

use kernel_alloc::{FreeError, Vmm, VmmError};
use kernel_descriptors::DescriptorError;
use kernel_interrupts::FatalInterrupt;
use kernel_registers::Cpu;
use thiserror::Error;

/// Anything that ends in [`halt_with`].
#[derive(Debug, Error, Copy, Clone, PartialEq, Eq)]
pub enum Fatal {
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
    #[error(transparent)]
    Interrupt(#[from] FatalInterrupt),
    #[error(transparent)]
    Vmm(#[from] VmmError),
    #[error(transparent)]
    Free(#[from] FreeError),
    #[error("boot memory map has no usable range large enough for the frame allocator")]
    NoUsableMemory,
}

/// Log `fatal` at `error`. A page fault also gets the table walk for the
/// faulting address if `vmm` is available.
pub fn report<C: Cpu>(fatal: &Fatal, vmm: Option<&Vmm<C>>) {
    log::error!("{fatal}");
    if let (Fatal::Interrupt(FatalInterrupt::PageFault { address, .. }), Some(vmm)) = (fatal, vmm) {
        log::error!("Walk: {}", vmm.walk(*address));
    }
    log::error!("KERNEL PANIC!");
}

/// Report `fatal`, mask interrupts and stop this CPU for good.
#[cfg(target_os = "none")]
pub fn halt_with(fatal: &Fatal) -> ! {
    use crate::state;
    use kernel_sync::LocalInterrupts;

    // A fault inside a VMM call leaves the lock held; skip the walk then.
    let vmm = unsafe { state::VMM.try_lock(&LocalInterrupts) };
    report(fatal, vmm.as_deref().and_then(Option::as_ref));
    drop(vmm);

    halt()
}

/// `cli; hlt` forever.
#[cfg(target_os = "none")]
pub fn halt() -> ! {
    loop {
        // SAFETY: ring 0.
        unsafe { core::arch::asm!("cli", "hlt", options(nomem, nostack)) };
    }
}
