//! # Memory Layout

pub use kernel_memory_addresses::PAGE_SIZE;

/// Where the kernel executes (VMA). Sourced by the kernel's `build.rs`.
pub const KERNEL_BASE: u64 = 0xffff_ffff_8000_0000;

/// Where the kernel image sits in physical memory (LMA). Sourced by the
/// kernel's `build.rs`.
pub const PHYS_LOAD: u64 = 0x0010_0000; // 1 MiB

/// Granularity of `clflush`.
pub const CACHE_LINE_SIZE: u64 = 64;

/// Size of the boot stack the entry stub switches to.
#[cfg(debug_assertions)]
pub const KERNEL_STACK_SIZE: usize = 64 * 1024;

/// Size of the boot stack the entry stub switches to.
#[cfg(not(debug_assertions))]
pub const KERNEL_STACK_SIZE: usize = 32 * 1024;

/// Upper bound on usable ranges the frame allocator tracks.
///
/// Usable entries beyond this are ignored with a warning.
pub const MAX_MEMORY_REGIONS: usize = 64;

const _: () = {
    assert!(PAGE_SIZE == 4096);
    assert!(CACHE_LINE_SIZE.is_power_of_two());
    assert!(PAGE_SIZE.is_multiple_of(CACHE_LINE_SIZE));
    assert!(KERNEL_STACK_SIZE.is_multiple_of(4096));
    assert!(KERNEL_BASE.is_multiple_of(PAGE_SIZE));
    assert!(PHYS_LOAD.is_multiple_of(PAGE_SIZE));
    assert!(MAX_MEMORY_REGIONS > 0);
};
