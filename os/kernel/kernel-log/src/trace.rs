//! Backend of [`kernel_trace!`](crate::kernel_trace).

use core::fmt;

/// `fmt::Write` over every enabled sink.
#[derive(Debug, Default, Copy, Clone)]
pub struct Trace;

impl fmt::Write for Trace {
    #[cfg(all(target_arch = "x86_64", any(feature = "debugcon", feature = "serial")))]
    fn write_str(&mut self, s: &str) -> fmt::Result {
        // SAFETY: the kernel runs in ring 0.
        let io = unsafe { crate::port::X86Ports::new() };

        #[cfg(feature = "debugcon")]
        crate::DebugCon::new(io).write_bytes(s.as_bytes());
        #[cfg(feature = "serial")]
        crate::SerialPort::new(io, crate::COM1).write_bytes(s.as_bytes());

        Ok(())
    }

    #[cfg(not(all(target_arch = "x86_64", any(feature = "debugcon", feature = "serial"))))]
    fn write_str(&mut self, _s: &str) -> fmt::Result {
        Ok(())
    }
}

/// Best effort; output errors are ignored.
pub fn write(args: fmt::Arguments<'_>) {
    let _ = fmt::write(&mut Trace, args);
}

/// Bring up the sinks that need it.
///
/// # Safety
/// Ring 0, and at most once before the first [`write`].
pub unsafe fn init() {
    #[cfg(all(target_arch = "x86_64", feature = "serial"))]
    unsafe {
        crate::SerialPort::new(crate::port::X86Ports::new(), crate::COM1).init();
    }
}
