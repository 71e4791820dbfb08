//! # Interrupt Descriptor Table
//!
//! 256 sixteen-byte gates. Every gate is a present, DPL 0, 64-bit interrupt
//! gate (type/attr `0x8E`) in the kernel code segment, without IST.
//!
//! ```text
//!  127           96 95            64 63      48 47  40 39 32 31      16 15       0
//! +----------------+----------------+----------+------+-----+----------+----------+
//! |    reserved    | offset[63:32]  | off 31:16| attr | IST | selector | off 15:0 |
//! +----------------+----------------+----------+------+-----+----------+----------+
//! ```
//!
//! The table stays live once loaded, so the attribute word of each gate is an
//! atomic: [`Idt::enable_gate`] and [`Idt::disable_gate`] flip the present bit
//! through a shared reference without reloading IDTR.

use crate::DescriptorError;
use crate::gdt::selectors::CodeSelector;
use crate::privilege::PrivilegeLevel;
use bitfield_struct::bitfield;
use core::fmt;
use core::sync::atomic::{AtomicU16, Ordering};
use kernel_registers::{Cpu, DescriptorTablePointer};

/// Number of vectors.
pub const IDT_VECTORS: usize = 256;

const INTERRUPT_GATE: u8 = 0xE;

/// IST and type/attribute bytes of a gate.
#[bitfield(u16)]
#[derive(PartialEq, Eq)]
pub struct GateAttributes {
    /// Interrupt stack table slot; 0 keeps the current stack.
    #[bits(3)]
    pub ist: u8,
    #[bits(5)]
    _reserved: u8,

    /// 0xE interrupt gate, 0xF trap gate.
    #[bits(4)]
    pub gate_type: u8,
    /// Zero for system descriptors.
    _storage_segment: bool,
    #[bits(2)]
    pub dpl: PrivilegeLevel,
    pub present: bool,
}

impl GateAttributes {
    /// Present ring-0 interrupt gate, IST 0.
    #[must_use]
    pub const fn kernel_interrupt_gate() -> Self {
        Self::new()
            .with_gate_type(INTERRUPT_GATE)
            .with_dpl(PrivilegeLevel::Ring0)
            .with_present(true)
    }

    /// The high byte, as the SDM tables print it.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn type_attr(self) -> u8 {
        (self.into_bits() >> 8) as u8
    }
}

#[repr(C)]
pub struct IdtEntry {
    offset_low: u16,
    selector: u16,
    attributes: AtomicU16,
    offset_mid: u16,
    offset_high: u32,
    reserved: u32,
}

const _: () = {
    assert!(size_of::<IdtEntry>() == 16);
    assert!(size_of::<Idt>() == IDT_VECTORS * 16);
    assert!(align_of::<Idt>() == 16);
};

impl IdtEntry {
    #[allow(clippy::cast_possible_truncation)]
    const fn new(handler: u64, selector: CodeSelector, attributes: GateAttributes) -> Self {
        Self {
            offset_low: handler as u16,
            selector: selector.encode(),
            attributes: AtomicU16::new(attributes.into_bits()),
            offset_mid: (handler >> 16) as u16,
            offset_high: (handler >> 32) as u32,
            reserved: 0,
        }
    }

    /// Address of the trampoline this gate enters.
    #[must_use]
    #[allow(clippy::cast_lossless)]
    pub const fn handler_address(&self) -> u64 {
        (self.offset_low as u64) | ((self.offset_mid as u64) << 16) | ((self.offset_high as u64) << 32)
    }

    #[must_use]
    pub const fn selector(&self) -> u16 {
        self.selector
    }

    #[must_use]
    pub fn attributes(&self) -> GateAttributes {
        GateAttributes::from_bits(self.attributes.load(Ordering::Acquire))
    }

    fn set_present(&self, present: bool) {
        let attributes = self.attributes().with_present(present);
        self.attributes.store(attributes.into_bits(), Ordering::Release);
    }
}

impl fmt::Debug for IdtEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdtEntry")
            .field("handler", &format_args!("0x{:016X}", self.handler_address()))
            .field("selector", &format_args!("0x{:04X}", self.selector))
            .field("type_attr", &format_args!("0x{:02X}", self.attributes().type_attr()))
            .finish()
    }
}

#[repr(C, align(16))]
pub struct Idt {
    entries: [IdtEntry; IDT_VECTORS],
}

impl Idt {
    #[must_use]
    pub fn entry(&self, vector: u8) -> &IdtEntry {
        &self.entries[usize::from(vector)]
    }

    #[must_use]
    pub fn entries(&self) -> &[IdtEntry; IDT_VECTORS] {
        &self.entries
    }

    /// Set the present bit of `vector`.
    pub fn enable_gate(&self, vector: u8) {
        self.entry(vector).set_present(true);
    }

    /// Clear the present bit of `vector`. A trap on a disabled gate raises #NP.
    pub fn disable_gate(&self, vector: u8) {
        self.entry(vector).set_present(false);
    }

    #[must_use]
    pub fn is_gate_enabled(&self, vector: u8) -> bool {
        self.entry(vector).attributes().present()
    }

    /// `lidt` operand for this table.
    #[must_use]
    pub fn pointer(&self) -> DescriptorTablePointer {
        DescriptorTablePointer::for_table(self)
    }
}

impl fmt::Debug for Idt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let enabled = (0..=u8::MAX).filter(|&v| self.is_gate_enabled(v)).count();
        f.debug_struct("Idt")
            .field("pointer", &self.pointer())
            .field("enabled_gates", &enabled)
            .finish_non_exhaustive()
    }
}

/// One gate per vector, each entering `trampolines[vector]` through
/// `selector`. All gates start enabled.
#[must_use]
pub fn build_interrupt_table(trampolines: &[u64; IDT_VECTORS], selector: CodeSelector) -> Idt {
    let attributes = GateAttributes::kernel_interrupt_gate();
    Idt {
        entries: core::array::from_fn(|v| IdtEntry::new(trampolines[v], selector, attributes)),
    }
}

/// `lidt` the table and confirm it with `sidt`.
///
/// # Errors
/// [`DescriptorError::InterruptTableMismatch`] if the CPU reports a different
/// base or limit.
pub fn load_interrupt_table<C: Cpu + ?Sized>(cpu: &C, idt: &'static Idt) -> Result<(), DescriptorError> {
    let expected = idt.pointer();
    log::debug!("Loading IDT {expected:?}");

    // SAFETY: the table is 'static and every gate points at a trampoline.
    unsafe { cpu.load_interrupt_table(&expected) };

    let actual = cpu.read_interrupt_table();
    if actual != expected {
        return Err(DescriptorError::InterruptTableMismatch { expected, actual });
    }
    Ok(())
}
