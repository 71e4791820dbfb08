//! # Kernel Memory Allocation and Virtual Memory Management
//!
//! Physical frame allocation, the higher-half direct map, and the virtual
//! memory manager built on top of them.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │           Virtual Memory Manager ([`vmm`])          │
//! │    • map / unmap 4 KiB pages in the active tree     │
//! │    • TLB invalidation, cache-line maintenance       │
//! └─────────────────┬───────────────────────────────────┘
//!                   │ table frames        │ table bytes
//! ┌─────────────────▼─────────┐ ┌─────────▼─────────────┐
//! │ Frame Allocator           │ │ Physical Mapper       │
//! │ ([`frame_alloc`])         │ │ ([`phys_mapper`])     │
//! │ • LIFO free list over     │ │ • pa + hhdm_offset    │
//! │   usable RAM              │ │                       │
//! └───────────────────────────┘ └───────────────────────┘
//! ```
//!
//! None of the types here are global. The kernel binary owns one instance of
//! each and wraps them in locks; tests build as many as they like over a host
//! buffer posing as physical memory.
//!
//! ## Ordering
//!
//! 1. The frame allocator is initialized from the boot memory map.
//! 2. The VMM is initialized from CR3 and the direct-map offset.
//! 3. Only then may pages be mapped, since table frames come from step 1.

#![cfg_attr(not(any(test, doctest)), no_std)]

pub mod frame_alloc;
pub mod phys_mapper;
pub mod vmm;

pub use frame_alloc::{FrameSlot, FrameStats, FreeError, FreeListFrameAlloc, MemoryRange};
pub use phys_mapper::HhdmPhysMapper;
pub use vmm::{Vmm, VmmError};
