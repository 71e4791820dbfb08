use crate::port::PortIo;
use core::fmt;

/// QEMU `-debugcon` port.
pub const DEBUGCON_PORT: u16 = 0x402;

/// Byte sink on QEMU's debug console. Never blocks.
#[derive(Debug, Clone)]
pub struct DebugCon<P> {
    io: P,
}

impl<P: PortIo> DebugCon<P> {
    pub const fn new(io: P) -> Self {
        Self { io }
    }

    pub fn write_bytes(&self, bytes: &[u8]) {
        for &b in bytes {
            // SAFETY: 0x402 is either QEMU's console or unclaimed.
            unsafe { self.io.write_u8(DEBUGCON_PORT, b) };
        }
    }
}

impl<P: PortIo> fmt::Write for DebugCon<P> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write_bytes(s.as_bytes());
        Ok(())
    }
}
