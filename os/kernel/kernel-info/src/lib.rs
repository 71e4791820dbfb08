//! # Kernel Configuration and Boot Interface
//!
//! Layout constants and the boot loader hand-off ABI shared by the loader,
//! the kernel binary and the memory subsystems.
//!
//! ## Boot Protocol
//!
//! The loader jumps to `_start_kernel` (System V ABI) with interrupts masked
//! and a `*const KernelBootInfo` in `RDI`.
//!
//! [`KernelBootInfo`](boot::KernelBootInfo) carries
//! * the physical memory map as an array of [`MemoryRegion`](boot::MemoryRegion),
//! * the higher-half direct map (HHDM) offset, and
//! * the ACPI RSDP address.
//!
//! Only regions of kind [`Usable`](boot::MemoryRegionKind::Usable) are handed
//! to the frame allocator.
//!
//! ## Virtual Memory Layout
//!
//! ```text
//! 0x0000_0000_0000_0000 ┌─────────────────────────────────┐
//!                       │   Lower half (identity / unused)│
//!                       ├─────────────────────────────────┤
//! hhdm_offset           │   Higher Half Direct Mapping    │
//!                       │   (all physical RAM)            │
//! KERNEL_BASE           ├─────────────────────────────────┤ 0xffff_ffff_8000_0000
//!                       │       Kernel Text & Data        │
//! 0xFFFF_FFFF_FFFF_FFFF └─────────────────────────────────┘
//! ```
//!
//! The direct-map offset is chosen by the loader and only known at runtime.
//! Everything else here is a compile-time constant consumed by the kernel and
//! its `build.rs`.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod boot;
pub mod memory;
