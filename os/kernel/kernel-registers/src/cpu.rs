use crate::cr3::Cr3;
use crate::{ActiveSegments, DescriptorTablePointer};
use kernel_memory_addresses::VirtualAddress;

/// The privileged instructions the kernel core depends on.
///
/// Descriptor-table setup and the page-table walker talk to the processor
/// only through this trait. The boot path passes an [`X86Cpu`]; tests pass a
/// [`RecordingCpu`](crate::RecordingCpu).
pub trait Cpu {
    /// `lgdt [ptr]`, reload DS/ES/FS/GS/SS with `data`, then far-return into
    /// `code` to reload CS.
    ///
    /// # Safety
    /// `ptr` must describe a valid GDT that outlives its use by the CPU, and
    /// both selectors must index present descriptors in it.
    unsafe fn load_segment_table(&self, ptr: &DescriptorTablePointer, code: u16, data: u16);

    /// Current CS and DS.
    fn read_active_segment(&self) -> ActiveSegments;

    /// `lidt [ptr]`.
    ///
    /// # Safety
    /// `ptr` must describe a valid IDT that outlives its use by the CPU.
    unsafe fn load_interrupt_table(&self, ptr: &DescriptorTablePointer);

    /// `sidt` readback.
    fn read_interrupt_table(&self) -> DescriptorTablePointer;

    /// `invlpg [va]`.
    fn invalidate_page(&self, va: VirtualAddress);

    /// `clflush [va]`.
    fn flush_cache_line(&self, va: VirtualAddress);

    /// `mfence`.
    fn memory_fence(&self);

    /// CR2.
    fn fault_address(&self) -> VirtualAddress;

    /// CR3.
    fn page_table_root(&self) -> Cr3;
}

#[cfg(all(feature = "asm", target_arch = "x86_64"))]
pub use x86::X86Cpu;

#[cfg(all(feature = "asm", target_arch = "x86_64"))]
mod x86 {
    use super::Cpu;
    use crate::cr2::Cr2;
    use crate::cr3::Cr3;
    use crate::{ActiveSegments, DescriptorTablePointer, LoadRegisterUnsafe};
    use core::arch::asm;
    use kernel_memory_addresses::VirtualAddress;

    /// [`Cpu`] backed by inline assembly on the executing processor.
    #[derive(Debug)]
    pub struct X86Cpu {
        _private: (),
    }

    impl X86Cpu {
        /// # Safety
        /// The caller must be running in Ring 0. Every method issues
        /// privileged instructions without further checks.
        #[must_use]
        pub const unsafe fn new() -> Self {
            Self { _private: () }
        }
    }

    impl Cpu for X86Cpu {
        unsafe fn load_segment_table(&self, ptr: &DescriptorTablePointer, code: u16, data: u16) {
            unsafe {
                asm!(
                    "lgdt [{ptr}]",
                    "mov ds, {data:x}",
                    "mov es, {data:x}",
                    "mov fs, {data:x}",
                    "mov gs, {data:x}",
                    "mov ss, {data:x}",
                    // CS can only change through a far transfer.
                    "push {code}",
                    "lea {tmp}, [rip + 2f]",
                    "push {tmp}",
                    "retfq",
                    "2:",
                    ptr = in(reg) core::ptr::from_ref(ptr),
                    data = in(reg) u64::from(data),
                    code = in(reg) u64::from(code),
                    tmp = lateout(reg) _,
                    options(preserves_flags),
                );
            }
        }

        fn read_active_segment(&self) -> ActiveSegments {
            let code: u16;
            let data: u16;
            unsafe {
                asm!("mov {:x}, cs", out(reg) code, options(nomem, nostack, preserves_flags));
                asm!("mov {:x}, ds", out(reg) data, options(nomem, nostack, preserves_flags));
            }
            ActiveSegments { code, data }
        }

        unsafe fn load_interrupt_table(&self, ptr: &DescriptorTablePointer) {
            unsafe {
                asm!(
                    "lidt [{}]",
                    in(reg) core::ptr::from_ref(ptr),
                    options(readonly, nostack, preserves_flags)
                );
            }
        }

        fn read_interrupt_table(&self) -> DescriptorTablePointer {
            let mut ptr = DescriptorTablePointer::default();
            unsafe {
                asm!(
                    "sidt [{}]",
                    in(reg) &raw mut ptr,
                    options(nostack, preserves_flags)
                );
            }
            ptr
        }

        fn invalidate_page(&self, va: VirtualAddress) {
            unsafe {
                asm!("invlpg [{}]", in(reg) va.as_u64(), options(nostack, preserves_flags));
            }
        }

        fn flush_cache_line(&self, va: VirtualAddress) {
            unsafe {
                asm!("clflush [{}]", in(reg) va.as_u64(), options(nostack, preserves_flags));
            }
        }

        fn memory_fence(&self) {
            unsafe {
                asm!("mfence", options(nostack, preserves_flags));
            }
        }

        fn fault_address(&self) -> VirtualAddress {
            unsafe { Cr2::load_unsafe() }.fault_address()
        }

        fn page_table_root(&self) -> Cr3 {
            unsafe { Cr3::load_unsafe() }
        }
    }
}
