/// First vector not reserved for CPU exceptions.
pub const FIRST_IRQ_VECTOR: u8 = 32;

/// `#PF`.
pub const PAGE_FAULT_VECTOR: u8 = 14;

/// Symbolic names of vectors 0..32.
pub const EXCEPTION_NAMES: [&str; FIRST_IRQ_VECTOR as usize] = [
    "Divide Error",
    "Debug",
    "Non-Maskable Interrupt",
    "Breakpoint",
    "Overflow",
    "Bound Range Exceeded",
    "Invalid Opcode",
    "Device Not Available",
    "Double Fault",
    "Coprocessor Segment Overrun",
    "Invalid TSS",
    "Segment Not Present",
    "Stack-Segment Fault",
    "General Protection Fault",
    "Page Fault",
    "Reserved",
    "x87 Floating-Point Exception",
    "Alignment Check",
    "Machine Check",
    "SIMD Floating-Point Exception",
    "Virtualization Exception",
    "Control Protection Exception",
    "Reserved",
    "Reserved",
    "Reserved",
    "Reserved",
    "Reserved",
    "Reserved",
    "Hypervisor Injection Exception",
    "VMM Communication Exception",
    "Security Exception",
    "Reserved",
];

/// Name of a CPU exception, `None` for IRQ vectors.
#[must_use]
pub fn exception_name(vector: u8) -> Option<&'static str> {
    EXCEPTION_NAMES.get(usize::from(vector)).copied()
}

/// Whether the CPU pushes an error code before entering the gate.
///
/// The trampolines push a zero for every other vector.
#[must_use]
pub const fn pushes_error_code(vector: u8) -> bool {
    matches!(vector, 8 | 10..=14 | 17 | 21 | 29 | 30)
}
