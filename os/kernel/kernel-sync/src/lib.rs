//! # Kernel synchronization primitives
//!
//! * [`SpinLock`]: test-and-test-and-set lock.
//! * [`IrqSpinLock`]: a [`SpinLock`] taken with local interrupts masked, for
//!   state shared with interrupt handlers.
//! * [`SyncOnceCell`]: write-once storage for tables that must live forever
//!   once the CPU has been pointed at them.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod irq;
mod spin_lock;
mod sync_once_cell;

pub use irq::{InterruptState, IrqGuard, IrqSpinLock, IrqSpinLockGuard};
#[cfg(all(feature = "asm", target_arch = "x86_64"))]
pub use irq::LocalInterrupts;
pub use spin_lock::{SpinLock, SpinLockGuard};
pub use sync_once_cell::SyncOnceCell;
