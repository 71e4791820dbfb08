//! # Physical and Virtual Memory Address Types
//!
//! Strongly typed wrappers for the raw 64-bit addresses handled by the
//! physical frame allocator and the page-table walker.
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`PhysicalAddress`] | A byte address in physical memory (RAM or MMIO). |
//! | [`VirtualAddress`] | A byte address translated by the page tables. |
//! | [`PhysicalFrame`] | A 4 KiB-aligned physical frame base. |
//! | [`VirtualPage`] | A 4 KiB-aligned virtual page base. |
//!
//! Only 4 KiB granularity is modeled: every frame handed out by the allocator
//! and every mapping installed by the page-table walker is exactly one
//! [`PAGE_SIZE`] unit.
//!
//! ## Virtual address layout
//!
//! ```text
//! | 63‒48  | 47‒39 | 38‒30 | 29‒21 | 20‒12 | 11‒0   |
//! | sign   |  L4   |  L3   |  L2   |  L1   | offset |
//! ```
//!
//! [`VirtualAddress::table_index`] extracts the 9-bit index for one level.
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let va = VirtualAddress::new(0x0000_0010_0000_0000);
//! assert_eq!(va.table_index(TableLevel::L4), 0);
//! assert_eq!(va.table_index(TableLevel::L3), 64);
//! assert_eq!(va.page_offset(), 0);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(clippy::inline_always)]

mod physical_address;
mod physical_frame;
mod table_level;
mod virtual_address;
mod virtual_page;

pub use physical_address::PhysicalAddress;
pub use physical_frame::PhysicalFrame;
pub use table_level::TableLevel;
pub use virtual_address::VirtualAddress;
pub use virtual_page::VirtualPage;

/// Size of a frame / page in bytes.
pub const PAGE_SIZE: u64 = 4096;

/// `log2(PAGE_SIZE)`.
pub const PAGE_SHIFT: u32 = 12;

/// Number of entries in one page table at any level.
pub const ENTRIES_PER_TABLE: usize = 512;

const _: () = {
    assert!(PAGE_SIZE == 1 << PAGE_SHIFT);
    assert!(ENTRIES_PER_TABLE as u64 * 8 == PAGE_SIZE);
};

/// Align `x` down to the nearest multiple of `a`.
///
/// `a` must be a non-zero power of two.
///
/// ```rust
/// # use kernel_memory_addresses::align_down;
/// assert_eq!(align_down(4095, 4096), 0);
/// assert_eq!(align_down(8191, 4096), 4096);
/// assert_eq!(align_down(0x12345, 64), 0x12340);
/// ```
#[inline(always)]
#[must_use]
pub const fn align_down(x: u64, a: u64) -> u64 {
    debug_assert!(a.is_power_of_two());
    x & !(a - 1)
}

/// Align `x` up to the nearest multiple of `a`, saturating at the highest
/// aligned value instead of wrapping.
///
/// `a` must be a non-zero power of two.
///
/// ```rust
/// # use kernel_memory_addresses::align_up;
/// assert_eq!(align_up(0, 4096), 0);
/// assert_eq!(align_up(1, 4096), 4096);
/// assert_eq!(align_up(4097, 4096), 8192);
/// assert_eq!(align_up(u64::MAX, 4096), u64::MAX & !4095);
/// ```
#[inline(always)]
#[must_use]
pub const fn align_up(x: u64, a: u64) -> u64 {
    debug_assert!(a.is_power_of_two());
    match x.checked_add(a - 1) {
        Some(v) => v & !(a - 1),
        None => u64::MAX & !(a - 1),
    }
}
