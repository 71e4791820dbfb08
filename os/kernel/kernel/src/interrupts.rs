//! The 256 low-level trampolines and the common entry they jump to.
//!
//! Each trampoline pushes a zero where the CPU pushes no error code, then its
//! vector number, and jumps to `isr_common`. That routine completes an
//! [`InterruptFrame`] on the stack, calls `isr_dispatch` and unwinds the
//! frame with `iretq`, so edits a handler makes to the frame take effect.
//!
//! The stack layout is fixed here and checked against [`InterruptFrame`] at
//! compile time. The assembly itself only exists for `target_os = "none"`.

use kernel_descriptors::IDT_VECTORS;
use kernel_interrupts::{InterruptFrame, pushes_error_code};

/// Entry address of every trampoline, indexed by vector.
pub type TrampolineTable = [u64; IDT_VECTORS];

/// DS and the fifteen general-purpose registers, pushed by `isr_common`.
pub const SAVED_REGISTERS: usize = 16;

/// Error code (real or dummy) and vector, pushed by each trampoline.
pub const TRAMPOLINE_WORDS: usize = 2;

/// RIP, CS, RFLAGS, RSP and SS, pushed by the CPU.
pub const CPU_WORDS: usize = 5;

/// Bit `v` set: the CPU pushes an error code for exception `v`, so the
/// trampoline must not push a dummy one.
pub const ERROR_CODE_MASK: u32 = error_code_mask();

const fn error_code_mask() -> u32 {
    let mut mask = 0;
    let mut vector = 0;
    while vector < 32 {
        if pushes_error_code(vector) {
            mask |= 1 << vector;
        }
        vector += 1;
    }
    mask
}

const _: () = {
    assert!((SAVED_REGISTERS + TRAMPOLINE_WORDS + CPU_WORDS) * 8 == size_of::<InterruptFrame>());
    assert!(core::mem::offset_of!(InterruptFrame, ds) == 0);
    assert!(core::mem::offset_of!(InterruptFrame, rax) == (SAVED_REGISTERS - 1) * 8);
    assert!(core::mem::offset_of!(InterruptFrame, interrupt) == SAVED_REGISTERS * 8);
    assert!(core::mem::offset_of!(InterruptFrame, error_code) == (SAVED_REGISTERS + 1) * 8);
    assert!(core::mem::offset_of!(InterruptFrame, rip) == (SAVED_REGISTERS + TRAMPOLINE_WORDS) * 8);
};

#[cfg(target_os = "none")]
pub use entry::trampolines;

#[cfg(target_os = "none")]
mod entry {
    use super::{ERROR_CODE_MASK, TRAMPOLINE_WORDS, TrampolineTable};
    use crate::fatal::{Fatal, halt, halt_with};
    use crate::state;
    use core::arch::{global_asm, naked_asm};
    use kernel_descriptors::KERNEL_DATA_SELECTOR;
    use kernel_interrupts::InterruptFrame;
    use kernel_log::kernel_trace;
    use kernel_registers::X86Cpu;
    use kernel_sync::LocalInterrupts;

    global_asm!(
        ".pushsection .text.isr_stubs, \"ax\"",
        ".irp vector, 0,1,2,3,4,5,6,7,8,9,10,11,12,13,14,15,16,17,18,19,20,21,22,23,24,25,26,27,28,29,30,31,32,33,34,35,36,37,38,39,40,41,42,43,44,45,46,47,48,49,50,51,52,53,54,55,56,57,58,59,60,61,62,63,64,65,66,67,68,69,70,71,72,73,74,75,76,77,78,79,80,81,82,83,84,85,86,87,88,89,90,91,92,93,94,95,96,97,98,99,100,101,102,103,104,105,106,107,108,109,110,111,112,113,114,115,116,117,118,119,120,121,122,123,124,125,126,127,128,129,130,131,132,133,134,135,136,137,138,139,140,141,142,143,144,145,146,147,148,149,150,151,152,153,154,155,156,157,158,159,160,161,162,163,164,165,166,167,168,169,170,171,172,173,174,175,176,177,178,179,180,181,182,183,184,185,186,187,188,189,190,191,192,193,194,195,196,197,198,199,200,201,202,203,204,205,206,207,208,209,210,211,212,213,214,215,216,217,218,219,220,221,222,223,224,225,226,227,228,229,230,231,232,233,234,235,236,237,238,239,240,241,242,243,244,245,246,247,248,249,250,251,252,253,254,255",
        ".p2align 4",
        "isr_stub_\\vector:",
        ".if \\vector < 32",
        ".if ({error_codes} >> \\vector) & 1",
        ".else",
        "push 0",
        ".endif",
        ".else",
        "push 0",
        ".endif",
        "push \\vector",
        "jmp {common}",
        ".endr",
        ".popsection",
        ".pushsection .rodata.isr_stub_table, \"a\"",
        ".p2align 3",
        ".global isr_stub_table",
        "isr_stub_table:",
        ".irp vector, 0,1,2,3,4,5,6,7,8,9,10,11,12,13,14,15,16,17,18,19,20,21,22,23,24,25,26,27,28,29,30,31,32,33,34,35,36,37,38,39,40,41,42,43,44,45,46,47,48,49,50,51,52,53,54,55,56,57,58,59,60,61,62,63,64,65,66,67,68,69,70,71,72,73,74,75,76,77,78,79,80,81,82,83,84,85,86,87,88,89,90,91,92,93,94,95,96,97,98,99,100,101,102,103,104,105,106,107,108,109,110,111,112,113,114,115,116,117,118,119,120,121,122,123,124,125,126,127,128,129,130,131,132,133,134,135,136,137,138,139,140,141,142,143,144,145,146,147,148,149,150,151,152,153,154,155,156,157,158,159,160,161,162,163,164,165,166,167,168,169,170,171,172,173,174,175,176,177,178,179,180,181,182,183,184,185,186,187,188,189,190,191,192,193,194,195,196,197,198,199,200,201,202,203,204,205,206,207,208,209,210,211,212,213,214,215,216,217,218,219,220,221,222,223,224,225,226,227,228,229,230,231,232,233,234,235,236,237,238,239,240,241,242,243,244,245,246,247,248,249,250,251,252,253,254,255",
        ".quad isr_stub_\\vector",
        ".endr",
        ".popsection",
        error_codes = const ERROR_CODE_MASK,
        common = sym isr_common,
    );

    unsafe extern "C" {
        static isr_stub_table: TrampolineTable;
    }

    /// Entry address of every trampoline, indexed by vector.
    pub fn trampolines() -> &'static TrampolineTable {
        // SAFETY: the table is immutable data emitted above.
        unsafe { &*core::ptr::addr_of!(isr_stub_table) }
    }

    /// Save state in [`InterruptFrame`] order, dispatch, restore, `iretq`.
    #[unsafe(naked)]
    unsafe extern "C" fn isr_common() {
        naked_asm!(
            "push rax",
            "push rbx",
            "push rcx",
            "push rdx",
            "push rsi",
            "push rdi",
            "push rbp",
            "push r8",
            "push r9",
            "push r10",
            "push r11",
            "push r12",
            "push r13",
            "push r14",
            "push r15",
            "xor eax, eax",
            "mov ax, ds",
            "push rax",
            "mov ax, {kernel_data}",
            "mov ds, ax",
            "mov es, ax",
            "cld",
            // rdi: &mut InterruptFrame. rbx keeps the unaligned rsp across the call.
            "mov rdi, rsp",
            "mov rbx, rsp",
            "and rsp, -16",
            "call {dispatch}",
            "mov rsp, rbx",
            "pop rax",
            "mov ds, ax",
            "mov es, ax",
            "pop r15",
            "pop r14",
            "pop r13",
            "pop r12",
            "pop r11",
            "pop r10",
            "pop r9",
            "pop r8",
            "pop rbp",
            "pop rdi",
            "pop rsi",
            "pop rdx",
            "pop rcx",
            "pop rbx",
            "pop rax",
            "add rsp, {trampoline_bytes}",
            "iretq",
            kernel_data = const KERNEL_DATA_SELECTOR.encode(),
            trampoline_bytes = const TRAMPOLINE_WORDS * 8,
            dispatch = sym isr_dispatch,
        );
    }

    extern "C" fn isr_dispatch(frame: &mut InterruptFrame) {
        // SAFETY: ring 0; the gate already cleared IF.
        let Some(interrupts) = (unsafe { state::INTERRUPTS.try_lock(&LocalInterrupts) }) else {
            kernel_trace!("interrupt {:#x} while the handler table is locked\n", frame.interrupt);
            halt();
        };
        let Some(interrupts) = interrupts.as_ref() else {
            kernel_trace!("interrupt {:#x} before the handler table exists\n", frame.interrupt);
            halt();
        };

        // SAFETY: ring 0.
        let cpu = unsafe { X86Cpu::new() };
        if let Err(fatal) = interrupts.dispatch(frame, &cpu) {
            halt_with(&Fatal::from(fatal));
        }
    }
}
