//! # Interrupt Dispatch
//!
//! Every trampoline funnels into one place: [`Interrupts::dispatch`]. It
//! receives the saved [`InterruptFrame`] and decides what happens next:
//!
//! | Situation | Vector | Outcome |
//! |-----------|--------|---------|
//! | handler registered | any | handler runs, its result is returned |
//! | no handler | `>= 32` | diagnostic at `warn`, [`Dispatched::Unhandled`] |
//! | no handler | `< 32` | diagnostic at `error`, [`FatalInterrupt::Exception`] |
//!
//! A page fault is handled by [`page_fault::page_fault_handler`], which always
//! reports a [`FatalInterrupt::PageFault`]. Nothing in this crate halts the
//! machine; that is left to whoever receives the error.

#![cfg_attr(not(any(test, doctest)), no_std)]

mod dispatch;
mod exceptions;
mod fatal;
mod frame;
pub mod page_fault;

pub use dispatch::{Dispatched, InterruptHandler, Interrupts};
pub use exceptions::{
    EXCEPTION_NAMES, FIRST_IRQ_VECTOR, PAGE_FAULT_VECTOR, exception_name, pushes_error_code,
};
pub use fatal::FatalInterrupt;
pub use frame::InterruptFrame;
pub use page_fault::{FaultAccess, PageFaultError};
