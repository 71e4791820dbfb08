//! # Typed `x86_64` Registers and the CPU Port
//!
//! Bitfield models of the control registers the kernel core reads, the
//! packed descriptor-table pointer shared by `lgdt`/`lidt`, and the [`Cpu`]
//! trait that isolates every privileged instruction the core issues.
//!
//! * [`X86Cpu`] (feature `asm`) executes the real instructions.
//! * [`RecordingCpu`] (feature `recording`) records each call and answers
//!   readbacks from what was loaded, so descriptor and paging code can be
//!   tested on the host.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

#[cfg(any(test, feature = "recording"))]
extern crate alloc;

mod cpu;
pub mod cr2;
pub mod cr3;
#[cfg(any(test, feature = "recording"))]
mod recording;
pub mod rflags;
mod segments;

pub use cpu::Cpu;
#[cfg(all(feature = "asm", target_arch = "x86_64"))]
pub use cpu::X86Cpu;
#[cfg(any(test, feature = "recording"))]
pub use recording::{CpuCall, RecordingCpu};
pub use segments::{ActiveSegments, DescriptorTablePointer};

/// Read a register whose access is privileged.
pub trait LoadRegisterUnsafe {
    /// # Safety
    /// The register access might be privileged and require Ring 0.
    unsafe fn load_unsafe() -> Self;
}

/// Read a register that is accessible from any privilege level.
pub trait LoadRegister {
    fn load() -> Self;
}

impl<T> LoadRegisterUnsafe for T
where
    T: LoadRegister,
{
    #[inline]
    unsafe fn load_unsafe() -> Self {
        <Self as LoadRegister>::load()
    }
}
