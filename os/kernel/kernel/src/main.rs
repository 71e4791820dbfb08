//! # Kernel Entry Point
//!
//! The loader jumps to [`_start_kernel`] with interrupts masked, the boot
//! information pointer in `RDI`, and the kernel mapped at `KERNEL_BASE`.
//! From there:
//!
//! 1. switch to the kernel's own boot stack,
//! 2. install the logger,
//! 3. run the boot sequence in [`init`],
//! 4. publish the subsystems, enable interrupts and idle.
//!
//! Any failure on the way ends in [`fatal::halt_with`].
//!
//! Only a `target_os = "none"` build produces a kernel image. On the host
//! this is an empty binary so the boot sequence can be unit tested.

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]
#![cfg_attr(not(target_os = "none"), allow(dead_code))]
#![allow(unsafe_code)]

mod fatal;
mod init;
mod interrupts;
#[cfg(target_os = "none")]
mod state;

#[cfg(not(target_os = "none"))]
fn main() {}

#[cfg(target_os = "none")]
mod entry {
    use crate::fatal::{Fatal, halt, halt_with};
    use crate::init::{boot_regions, bring_up};
    use crate::{interrupts, state};
    use kernel_alloc::HhdmPhysMapper;
    use kernel_descriptors::{KERNEL_CODE_SELECTOR, build_interrupt_table, build_segment_table};
    use kernel_info::boot::KernelBootInfo;
    use kernel_info::memory::KERNEL_STACK_SIZE;
    use kernel_log::{KernelLogger, kernel_trace};
    use kernel_registers::X86Cpu;
    use kernel_sync::{InterruptState, LocalInterrupts};
    use log::LevelFilter;

    static LOGGER: KernelLogger = KernelLogger::new(if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });

    /// 16-byte aligned stack
    #[repr(align(16))]
    struct Aligned<const N: usize>([u8; N]);

    #[unsafe(link_section = ".bss.boot")]
    #[unsafe(no_mangle)]
    static mut BOOT_STACK: Aligned<KERNEL_STACK_SIZE> = Aligned([0; KERNEL_STACK_SIZE]);

    /// The kernel entry point.
    ///
    /// # ABI
    /// `sysv64`, so `boot_info` arrives in `RDI` and stays there until
    /// [`kernel_entry`] picks it up.
    ///
    /// # Naked function & Stack
    /// The loader's stack is not ours to keep. This function swaps it for
    /// [`BOOT_STACK`] before any Rust code runs, which is why it cannot have a
    /// compiler-generated prologue.
    #[unsafe(no_mangle)]
    #[unsafe(naked)]
    pub extern "sysv64" fn _start_kernel(_boot_info: *const KernelBootInfo) {
        core::arch::naked_asm!(
            "cli",
            "lea rax, [rip + {stack_sym}]",
            "add rax, {stack_size}",
            "and rax, -16",
            "mov rsp, rax",
            // Fake return address, so RSP % 16 == 8 at entry.
            "push 0",
            "xor rbp, rbp",
            "jmp {rust_entry}",
            stack_sym = sym BOOT_STACK,
            stack_size = const KERNEL_STACK_SIZE,
            rust_entry = sym kernel_entry,
        );
    }

    extern "C" fn kernel_entry(boot_info: *const KernelBootInfo) -> ! {
        // SAFETY: ring 0, once, interrupts still masked. COM1 is programmed
        // before the logger is installed, so the trace below reaches it too.
        if let Err(e) = unsafe { LOGGER.init() } {
            kernel_trace!("Logger setup failed: {e}\n");
        }
        kernel_trace!("Kernel reporting for duty\n");

        // SAFETY: the loader hands over a valid, identity-readable pointer.
        let boot = unsafe { &*boot_info };
        match start(boot) {
            Ok(()) => idle(),
            Err(fatal) => halt_with(&fatal),
        }
    }

    fn start(boot: &KernelBootInfo) -> Result<(), Fatal> {
        log::info!("Kernel starting, direct map at {:#x}", boot.hhdm_offset);

        // SAFETY: ring 0.
        let cpu = unsafe { X86Cpu::new() };
        let gdt = state::GDT.get_or_init(build_segment_table);
        let idt = state::IDT
            .get_or_init(|| build_interrupt_table(interrupts::trampolines(), KERNEL_CODE_SELECTOR));

        // SAFETY: the loader's CR3 and direct map are live, and the memory
        // map records stay readable until the frame allocator has consumed them.
        let kernel = unsafe {
            bring_up(
                cpu,
                boot_regions(boot),
                HhdmPhysMapper::new(boot.hhdm_offset),
                gdt,
                idt,
            )?
        };
        state::publish(kernel);

        // SAFETY: GDT, IDT and handler table are in place.
        unsafe { LocalInterrupts.enable() };
        log::info!("Interrupts enabled");
        Ok(())
    }

    fn idle() -> ! {
        loop {
            // SAFETY: ring 0.
            unsafe { core::arch::asm!("hlt", options(nomem, nostack, preserves_flags)) };
        }
    }

    #[panic_handler]
    fn panic(info: &core::panic::PanicInfo) -> ! {
        log::error!("{info}");
        log::error!("KERNEL PANIC!");
        halt()
    }
}
