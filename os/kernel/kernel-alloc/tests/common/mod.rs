#![allow(dead_code)]

use kernel_alloc::{FrameSlot, FreeListFrameAlloc, HhdmPhysMapper, MemoryRange};
use kernel_memory_addresses::PhysicalFrame;
use kernel_registers::RecordingCpu;

#[repr(C, align(4096))]
pub struct Frame(pub [u8; 4096]);

/// Host memory posing as physical RAM starting at physical address 0.
pub struct Arena {
    frames: Vec<Frame>,
    base: *mut Frame,
}

impl Arena {
    pub fn new(frames: usize) -> Self {
        let mut frames: Vec<Frame> = (0..frames).map(|_| Frame([0; 4096])).collect();
        let base = frames.as_mut_ptr();
        Self { frames, base }
    }

    /// Direct map whose `phys_to_virt` lands inside this arena.
    pub fn direct_map(&self) -> HhdmPhysMapper {
        HhdmPhysMapper::new(self.base as u64)
    }
}

/// Slot storage plus an allocator over `ranges`.
pub fn allocator<'s>(storage: &'s mut Vec<FrameSlot>, ranges: &[MemoryRange]) -> FreeListFrameAlloc<'s> {
    let frames: u64 = ranges.iter().map(|r| r.frames().1).sum();
    storage.resize(frames as usize, FrameSlot::EMPTY);
    FreeListFrameAlloc::init(storage, ranges.iter().copied())
}

/// A recording CPU whose CR3 points at `root`.
pub fn cpu_with_root(root: PhysicalFrame) -> RecordingCpu {
    RecordingCpu::with_page_table_root(root)
}
