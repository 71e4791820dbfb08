//! Kernel-wide singletons.
//!
//! The descriptor tables are written once and then only read by the CPU.
//! Everything that changes after boot sits behind an [`IrqSpinLock`], because
//! interrupt handlers reach for the same state.

use crate::init::Kernel;
use kernel_alloc::{FreeListFrameAlloc, Vmm};
use kernel_descriptors::{Gdt, Idt};
use kernel_interrupts::Interrupts;
use kernel_registers::X86Cpu;
use kernel_sync::{IrqSpinLock, LocalInterrupts, SyncOnceCell};

pub static GDT: SyncOnceCell<Gdt> = SyncOnceCell::new();
pub static IDT: SyncOnceCell<Idt> = SyncOnceCell::new();

pub static INTERRUPTS: IrqSpinLock<Option<Interrupts<'static>>> = IrqSpinLock::new(None);
pub static FRAMES: IrqSpinLock<Option<FreeListFrameAlloc<'static>>> = IrqSpinLock::new(None);
pub static VMM: IrqSpinLock<Option<Vmm<X86Cpu>>> = IrqSpinLock::new(None);

/// Move the subsystems into their singletons.
pub fn publish(kernel: Kernel<'static, X86Cpu>) {
    let Kernel {
        interrupts,
        frames,
        vmm,
    } = kernel;

    // SAFETY: ring 0.
    unsafe {
        *INTERRUPTS.lock(&LocalInterrupts) = Some(interrupts);
        *FRAMES.lock(&LocalInterrupts) = Some(frames);
        *VMM.lock(&LocalInterrupts) = Some(vmm);
    }
}
