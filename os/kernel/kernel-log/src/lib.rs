//! # Kernel Log Output
//!
//! Two byte sinks and everything that writes to them:
//!
//! * [`DebugCon`]: QEMU's debug console on port `0x402` (feature `debugcon`).
//!   Run QEMU with `-debugcon stdio` to see it.
//! * [`SerialPort`]: the COM1 UART at `0x3F8`, 115200 8N1 (feature `serial`).
//!
//! [`KernelLogger`] plugs both into the `log` facade. [`kernel_trace!`]
//! writes to them directly and works before the logger exists or after it
//! can no longer be trusted.
//!
//! ```text
//! log::info!  ──> KernelLogger ──┐
//!                                 ├──> trace::write ──> DebugCon   (0x402)
//! kernel_trace! ──────────────────┘                 └─> SerialPort (0x3F8)
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod debugcon;
mod logger;
pub mod port;
mod serial;
#[doc(hidden)]
pub mod trace;

pub use debugcon::{DEBUGCON_PORT, DebugCon};
pub use logger::{KernelLogger, format_record};
pub use port::PortIo;
pub use serial::{COM1, SerialPort};

/// Write formatted text straight to the enabled sinks.
///
/// No allocation and no locking. Output is dropped when neither sink feature
/// is enabled or the target has no I/O ports.
#[macro_export]
macro_rules! kernel_trace {
    ($($arg:tt)*) => {{
        $crate::trace::write(core::format_args!($($arg)*));
    }};
}
