use crate::port::PortIo;
use core::fmt;

/// I/O base of the first UART.
pub const COM1: u16 = 0x3F8;

const DATA: u16 = 0;
const INTERRUPT_ENABLE: u16 = 1;
const FIFO_CONTROL: u16 = 2;
const LINE_CONTROL: u16 = 3;
const MODEM_CONTROL: u16 = 4;
const LINE_STATUS: u16 = 5;

/// LSR: transmit holding register empty.
const THR_EMPTY: u8 = 1 << 5;

/// Polls of LSR before a byte is dropped.
const TX_SPIN_LIMIT: u32 = 100_000;

/// 16550 UART driven by polling.
#[derive(Debug, Clone)]
pub struct SerialPort<P> {
    io: P,
    base: u16,
}

impl<P: PortIo> SerialPort<P> {
    pub const fn new(io: P, base: u16) -> Self {
        Self { io, base }
    }

    /// 115200 baud, 8N1, FIFO on, no UART interrupts.
    ///
    /// # Safety
    /// `base` must be the I/O base of a 16550-compatible UART.
    pub unsafe fn init(&self) {
        unsafe {
            self.out(INTERRUPT_ENABLE, 0x00);
            self.out(LINE_CONTROL, 0x80); // DLAB
            self.out(DATA, 0x01); // divisor low
            self.out(INTERRUPT_ENABLE, 0x00); // divisor high
            self.out(LINE_CONTROL, 0x03);
            self.out(FIFO_CONTROL, 0xC7);
            self.out(MODEM_CONTROL, 0x0B);
        }
    }

    /// Send `bytes`, turning every `\n` into `\r\n`.
    pub fn write_bytes(&self, bytes: &[u8]) {
        for &b in bytes {
            if b == b'\n' {
                self.put(b'\r');
            }
            self.put(b);
        }
    }

    fn put(&self, byte: u8) {
        for _ in 0..TX_SPIN_LIMIT {
            // SAFETY: reading LSR has no side effects.
            if unsafe { self.io.read_u8(self.base + LINE_STATUS) } & THR_EMPTY != 0 {
                // SAFETY: THR is empty.
                unsafe { self.out(DATA, byte) };
                return;
            }
            core::hint::spin_loop();
        }
    }

    unsafe fn out(&self, register: u16, value: u8) {
        unsafe { self.io.write_u8(self.base + register, value) };
    }
}

impl<P: PortIo> fmt::Write for SerialPort<P> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write_bytes(s.as_bytes());
        Ok(())
    }
}
