//! x86 I/O port access.

/// `in`/`out` on 8-bit ports.
pub trait PortIo {
    /// # Safety
    /// Writing to an arbitrary port can reprogram hardware.
    unsafe fn write_u8(&self, port: u16, value: u8);

    /// # Safety
    /// Reading some ports has side effects.
    unsafe fn read_u8(&self, port: u16) -> u8;
}

impl<P: PortIo + ?Sized> PortIo for &P {
    unsafe fn write_u8(&self, port: u16, value: u8) {
        unsafe { (**self).write_u8(port, value) }
    }

    unsafe fn read_u8(&self, port: u16) -> u8 {
        unsafe { (**self).read_u8(port) }
    }
}

#[cfg(target_arch = "x86_64")]
pub use x86::X86Ports;

#[cfg(target_arch = "x86_64")]
mod x86 {
    use super::PortIo;
    use core::arch::asm;

    /// The executing CPU's I/O port space.
    #[derive(Debug, Copy, Clone)]
    pub struct X86Ports {
        _private: (),
    }

    impl X86Ports {
        /// # Safety
        /// Port instructions fault outside ring 0 (or without IOPL).
        #[must_use]
        pub const unsafe fn new() -> Self {
            Self { _private: () }
        }
    }

    impl PortIo for X86Ports {
        #[inline]
        unsafe fn write_u8(&self, port: u16, value: u8) {
            unsafe {
                asm!("out dx, al", in("dx") port, in("al") value, options(nomem, nostack, preserves_flags));
            }
        }

        #[inline]
        unsafe fn read_u8(&self, port: u16) -> u8 {
            let value: u8;
            unsafe {
                asm!("in al, dx", out("al") value, in("dx") port, options(nomem, nostack, preserves_flags));
            }
            value
        }
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::PortIo;
    use std::cell::RefCell;

    /// Records writes; every read answers `read_value`.
    #[derive(Default)]
    pub struct FakePorts {
        pub writes: RefCell<Vec<(u16, u8)>>,
        pub reads: RefCell<Vec<u16>>,
        pub read_value: u8,
    }

    impl FakePorts {
        pub fn bytes_to(&self, port: u16) -> Vec<u8> {
            self.writes
                .borrow()
                .iter()
                .filter(|(p, _)| *p == port)
                .map(|&(_, b)| b)
                .collect()
        }
    }

    impl PortIo for FakePorts {
        unsafe fn write_u8(&self, port: u16, value: u8) {
            self.writes.borrow_mut().push((port, value));
        }

        unsafe fn read_u8(&self, port: u16) -> u8 {
            self.reads.borrow_mut().push(port);
            self.read_value
        }
    }
}
