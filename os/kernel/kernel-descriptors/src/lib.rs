//! # Kernel Descriptor Tables
//!
//! The two tables the CPU consults on every segment load and every trap:
//!
//! * [`Gdt`]: a null descriptor, one ring-0 64-bit code segment and one
//!   matching data segment ([`build_segment_table`]).
//! * [`Idt`]: 256 interrupt gates, each pointing at its low-level trampoline
//!   ([`build_interrupt_table`]).
//!
//! Loading goes through the [`Cpu`](kernel_registers::Cpu) port and is
//! verified by reading the active state back. A mismatch is returned as a
//! [`DescriptorError`]; deciding to halt is the caller's business.
//!
//! ```
//! use kernel_descriptors::{build_segment_table, KERNEL_CODE_SELECTOR, KERNEL_DATA_SELECTOR};
//!
//! let gdt = build_segment_table();
//! assert!(gdt.descriptor(KERNEL_CODE_SELECTOR.index()).is_code());
//! assert_eq!(KERNEL_DATA_SELECTOR.encode(), 0x10);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

mod error;
pub mod gdt;
pub mod idt;
pub mod privilege;

pub use error::DescriptorError;
pub use gdt::selectors::{
    CodeSelector, DataSelector, KERNEL_CODE_SELECTOR, KERNEL_DATA_SELECTOR, SegmentSelector, Table,
};
pub use gdt::{Gdt, SegmentDescriptor, build_segment_table, load_segment_table};
pub use idt::{
    GateAttributes, IDT_VECTORS, Idt, IdtEntry, build_interrupt_table, load_interrupt_table,
};
pub use privilege::PrivilegeLevel;
