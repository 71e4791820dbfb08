//! Masking local interrupts around critical sections.
//!
//! A handler that takes a lock the interrupted code already holds spins
//! forever on a single core. [`IrqSpinLock`] avoids that by clearing IF
//! before it spins and restoring it after the lock is released.

use crate::{SpinLock, SpinLockGuard};
use core::fmt;
use core::ops::{Deref, DerefMut};

/// Access to the local interrupt flag.
pub trait InterruptState {
    /// RFLAGS.IF.
    fn enabled(&self) -> bool;

    /// `cli`.
    ///
    /// # Safety
    /// Ring 0.
    unsafe fn disable(&self);

    /// `sti`.
    ///
    /// # Safety
    /// Ring 0, and the IDT must be loaded.
    unsafe fn enable(&self);
}

#[cfg(all(feature = "asm", target_arch = "x86_64"))]
pub use x86::LocalInterrupts;

#[cfg(all(feature = "asm", target_arch = "x86_64"))]
mod x86 {
    use super::InterruptState;
    use kernel_registers::LoadRegister;
    use kernel_registers::rflags::Rflags;

    /// The executing CPU's interrupt flag.
    #[derive(Debug, Default, Copy, Clone)]
    pub struct LocalInterrupts;

    impl InterruptState for LocalInterrupts {
        #[inline]
        fn enabled(&self) -> bool {
            Rflags::load().if_interrupt_enable()
        }

        #[inline]
        unsafe fn disable(&self) {
            unsafe { core::arch::asm!("cli", options(nomem, nostack)) }
        }

        #[inline]
        unsafe fn enable(&self) {
            unsafe { core::arch::asm!("sti", options(nomem, nostack)) }
        }
    }
}

/// Clears IF for its lifetime; restores it on drop if it was set.
pub struct IrqGuard<'i, I: InterruptState + ?Sized> {
    irq: &'i I,
    were_enabled: bool,
}

impl<'i, I: InterruptState + ?Sized> IrqGuard<'i, I> {
    /// # Safety
    /// Ring 0.
    #[must_use]
    pub unsafe fn new(irq: &'i I) -> Self {
        let were_enabled = irq.enabled();
        if were_enabled {
            unsafe { irq.disable() };
        }
        Self { irq, were_enabled }
    }

    #[must_use]
    pub const fn were_enabled(&self) -> bool {
        self.were_enabled
    }
}

impl<I: InterruptState + ?Sized> Drop for IrqGuard<'_, I> {
    fn drop(&mut self) {
        if self.were_enabled {
            // SAFETY: IF was set when the guard was created.
            unsafe { self.irq.enable() };
        }
    }
}

/// A [`SpinLock`] that is only ever held with interrupts masked.
pub struct IrqSpinLock<T> {
    inner: SpinLock<T>,
}

impl<T> IrqSpinLock<T> {
    pub const fn new(value: T) -> Self {
        Self {
            inner: SpinLock::new(value),
        }
    }

    /// Mask interrupts through `irq`, then spin for the lock.
    ///
    /// # Safety
    /// Ring 0.
    pub unsafe fn lock<'a, I: InterruptState + ?Sized>(&'a self, irq: &'a I) -> IrqSpinLockGuard<'a, T, I> {
        let irq = unsafe { IrqGuard::new(irq) };
        IrqSpinLockGuard {
            guard: self.inner.lock(),
            _irq: irq,
        }
    }

    /// Like [`lock`](Self::lock) but gives up if the lock is held.
    ///
    /// # Safety
    /// Ring 0.
    pub unsafe fn try_lock<'a, I: InterruptState + ?Sized>(
        &'a self,
        irq: &'a I,
    ) -> Option<IrqSpinLockGuard<'a, T, I>> {
        let irq = unsafe { IrqGuard::new(irq) };
        self.inner.try_lock().map(|guard| IrqSpinLockGuard { guard, _irq: irq })
    }

    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }

    pub const fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }
}

impl<T> fmt::Debug for IrqSpinLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IrqSpinLock")
            .field("locked", &self.is_locked())
            .finish_non_exhaustive()
    }
}

/// Drops the lock first, then restores IF.
pub struct IrqSpinLockGuard<'a, T, I: InterruptState + ?Sized> {
    guard: SpinLockGuard<'a, T>,
    _irq: IrqGuard<'a, I>,
}

impl<T, I: InterruptState + ?Sized> Deref for IrqSpinLockGuard<'_, T, I> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T, I: InterruptState + ?Sized> DerefMut for IrqSpinLockGuard<'_, T, I> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}
