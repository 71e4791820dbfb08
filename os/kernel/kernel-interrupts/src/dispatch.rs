use crate::exceptions::{FIRST_IRQ_VECTOR, exception_name};
use crate::{FatalInterrupt, InterruptFrame};
use kernel_descriptors::{IDT_VECTORS, Idt};
use kernel_registers::Cpu;

/// A registered interrupt service routine.
///
/// The frame is mutable: whatever the handler leaves in it is what the
/// trampoline restores before `iretq`.
pub type InterruptHandler = fn(&mut InterruptFrame, &dyn Cpu) -> Result<(), FatalInterrupt>;

/// What [`Interrupts::dispatch`] did with a non-fatal interrupt.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Dispatched {
    /// A registered handler ran and returned `Ok`.
    Handled,
    /// No handler for an IRQ vector; the diagnostic was logged.
    Unhandled,
}

/// Handler table plus the gates it controls.
pub struct Interrupts<'t> {
    idt: &'t Idt,
    handlers: [Option<InterruptHandler>; IDT_VECTORS],
}

impl<'t> Interrupts<'t> {
    /// Empty handler table over `idt`. Gate state is left as it is.
    #[must_use]
    pub const fn new(idt: &'t Idt) -> Self {
        Self {
            idt,
            handlers: [None; IDT_VECTORS],
        }
    }

    #[must_use]
    pub const fn idt(&self) -> &'t Idt {
        self.idt
    }

    /// Install `handler` for `vector` and enable its gate. Returns the handler
    /// it replaced.
    pub fn register_handler(&mut self, vector: u8, handler: InterruptHandler) -> Option<InterruptHandler> {
        let previous = self.handlers[usize::from(vector)].replace(handler);
        self.idt.enable_gate(vector);
        log::debug!("Registered handler for vector {vector:#04x}");
        previous
    }

    /// Remove the handler for `vector` and disable its gate.
    pub fn unregister_handler(&mut self, vector: u8) -> Option<InterruptHandler> {
        self.idt.disable_gate(vector);
        self.handlers[usize::from(vector)].take()
    }

    #[must_use]
    pub fn handler(&self, vector: u8) -> Option<InterruptHandler> {
        self.handlers[usize::from(vector)]
    }

    /// Route one interrupt.
    ///
    /// # Errors
    /// * Whatever a registered handler returns.
    /// * [`FatalInterrupt::Exception`] for an unhandled CPU exception.
    /// * [`FatalInterrupt::CorruptFrame`] if `frame.interrupt` is not a vector.
    pub fn dispatch(&self, frame: &mut InterruptFrame, cpu: &dyn Cpu) -> Result<Dispatched, FatalInterrupt> {
        let Ok(vector) = u8::try_from(frame.interrupt) else {
            return Err(FatalInterrupt::CorruptFrame {
                interrupt: frame.interrupt,
            });
        };

        if let Some(handler) = self.handler(vector) {
            handler(frame, cpu)?;
            return Ok(Dispatched::Handled);
        }

        match exception_name(vector) {
            None => {
                debug_assert!(vector >= FIRST_IRQ_VECTOR);
                log::warn!("Unhandled interrupt {vector}!\n{frame}");
                Ok(Dispatched::Unhandled)
            }
            Some(name) => {
                log::error!("Unhandled exception {vector}: {name}\n{frame}");
                Err(FatalInterrupt::Exception {
                    vector,
                    name,
                    error_code: frame.error_code,
                })
            }
        }
    }
}
