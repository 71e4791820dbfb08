//! # Physical Frame Allocator
//!
//! Every 4 KiB frame of usable RAM owns one [`FrameSlot`] in an array. Free
//! slots are chained by index into a singly linked LIFO stack, so the most
//! recently freed frame is the next one handed out.
//!
//! ```text
//!  ranges:  [ 0x10_0000 .. 0x14_0000 )   [ 0x80_0000 .. 0x80_3000 )
//!  slots:     0   1   2  ...  63           64  65  66
//!  head ──► 66 ──► 65 ──► 64 ──► 63 ──► ... ──► 0 ──► nil
//! ```
//!
//! The slot array lives outside the frames it describes, so freed memory is
//! never reinterpreted. The kernel carves it from usable RAM with
//! [`bootstrap_storage`] before the allocator exists.

use core::fmt;
use kernel_info::boot::MemoryRegion;
use kernel_info::memory::MAX_MEMORY_REGIONS;
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, PhysicalFrame};
use kernel_vmem::FrameAlloc;

const NIL: u32 = u32::MAX;

/// Bookkeeping for one physical frame.
///
/// All-zero bytes are a valid (allocated, unlinked) slot.
#[repr(C)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FrameSlot {
    next: u32,
    state: SlotState,
}

#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum SlotState {
    Allocated = 0,
    Free = 1,
}

impl FrameSlot {
    pub const EMPTY: Self = Self {
        next: NIL,
        state: SlotState::Allocated,
    };
}

/// A physical byte range, as reported by the boot loader.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MemoryRange {
    pub base: PhysicalAddress,
    pub length: u64,
}

impl MemoryRange {
    #[must_use]
    pub const fn new(base: u64, length: u64) -> Self {
        Self {
            base: PhysicalAddress::new(base),
            length,
        }
    }

    /// Whole frames inside this range: base rounded up, end rounded down.
    #[must_use]
    pub const fn frames(&self) -> (PhysicalFrame, u64) {
        let start = self.base.align_up(PAGE_SIZE);
        let end = self.base.as_u64().saturating_add(self.length) & !(PAGE_SIZE - 1);
        let count = end.saturating_sub(start.as_u64()) / PAGE_SIZE;
        (PhysicalFrame::containing_address(start), count)
    }
}

/// The usable entries of a boot memory map.
pub fn usable_ranges(regions: &[MemoryRegion]) -> impl Iterator<Item = MemoryRange> + '_ {
    regions
        .iter()
        .filter(|r| r.is_usable())
        .map(|r| MemoryRange::new(r.base, r.length))
}

/// Allocator counters. `used` is derived, never stored.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct FrameStats {
    pub total: usize,
    pub free: usize,
    pub used: usize,
}

impl fmt::Display for FrameStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} frames total, {} free, {} used ({} KiB free)",
            self.total,
            self.free,
            self.used,
            self.free * 4
        )
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum FreeError {
    #[error("{0} is not 4 KiB aligned")]
    Misaligned(PhysicalAddress),
    #[error("{0} is not managed by this allocator")]
    Foreign(PhysicalAddress),
    #[error("{0} is already free")]
    DoubleFree(PhysicalAddress),
}

/// Where the slot array for [`FreeListFrameAlloc`] should live.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BootstrapStorage {
    /// First byte of the array (page aligned).
    pub base: PhysicalAddress,
    /// Number of [`FrameSlot`]s that fit.
    pub slots: usize,
}

/// Reserve room for one [`FrameSlot`] per usable frame.
///
/// The first range with enough whole frames gives up its lowest frames.
/// `ranges` is shrunk in place so the storage is never handed out.
/// Returns `None` if no single range is large enough.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn bootstrap_storage(ranges: &mut [MemoryRange]) -> Option<BootstrapStorage> {
    let frames: u64 = ranges.iter().map(|r| r.frames().1).sum();
    let bytes = frames * size_of::<FrameSlot>() as u64;
    let pages = bytes.div_ceil(PAGE_SIZE);
    if pages == 0 {
        return None;
    }

    let range = ranges.iter_mut().find(|r| r.frames().1 > pages)?;
    let (first, _) = range.frames();
    let taken_end = first.start_address().as_u64() + pages * PAGE_SIZE;
    let old_end = range.base.as_u64().saturating_add(range.length);
    *range = MemoryRange::new(taken_end, old_end - taken_end);

    Some(BootstrapStorage {
        base: first.start_address(),
        slots: (pages * PAGE_SIZE / size_of::<FrameSlot>() as u64) as usize,
    })
}

/// A usable range after alignment, and the slot index of its first frame.
#[derive(Copy, Clone, Debug, Default)]
struct ManagedRange {
    first_frame: u64,
    frames: u64,
    first_slot: usize,
}

impl ManagedRange {
    const fn slot_of(&self, frame_number: u64) -> Option<usize> {
        if frame_number >= self.first_frame && frame_number - self.first_frame < self.frames {
            #[allow(clippy::cast_possible_truncation)]
            Some(self.first_slot + (frame_number - self.first_frame) as usize)
        } else {
            None
        }
    }

    const fn frame_of(&self, slot: usize) -> Option<PhysicalFrame> {
        if slot >= self.first_slot && ((slot - self.first_slot) as u64) < self.frames {
            Some(PhysicalFrame::from_number(
                self.first_frame + (slot - self.first_slot) as u64,
            ))
        } else {
            None
        }
    }
}

/// LIFO free-list frame allocator over a borrowed slot array.
pub struct FreeListFrameAlloc<'s> {
    slots: &'s mut [FrameSlot],
    ranges: [ManagedRange; MAX_MEMORY_REGIONS],
    range_count: usize,
    head: u32,
    total: usize,
    free: usize,
}

impl<'s> FreeListFrameAlloc<'s> {
    /// Push every whole frame of every range onto the free list.
    ///
    /// Frames are pushed in ascending address order, so the first
    /// allocation returns the highest frame. Ranges past
    /// `MAX_MEMORY_REGIONS`, and frames past the capacity of `storage`, are
    /// skipped with a warning. The previous contents of `storage` are
    /// overwritten.
    pub fn init(storage: &'s mut [FrameSlot], ranges: impl IntoIterator<Item = MemoryRange>) -> Self {
        let capacity = storage.len().min(NIL as usize);
        let mut this = Self {
            slots: storage,
            ranges: [ManagedRange::default(); MAX_MEMORY_REGIONS],
            range_count: 0,
            head: NIL,
            total: 0,
            free: 0,
        };

        for range in ranges {
            let (first, count) = range.frames();
            if count == 0 {
                continue;
            }
            if this.range_count == MAX_MEMORY_REGIONS {
                log::warn!("ignoring usable range at {} beyond the region table", range.base);
                continue;
            }

            let room = (capacity - this.total) as u64;
            let frames = count.min(room);
            if frames < count {
                log::warn!("slot storage full; dropping {} frames at {}", count - frames, range.base);
            }
            if frames == 0 {
                continue;
            }

            let managed = ManagedRange {
                first_frame: first.number(),
                frames,
                first_slot: this.total,
            };
            this.ranges[this.range_count] = managed;
            this.range_count += 1;

            #[allow(clippy::cast_possible_truncation)]
            for slot in managed.first_slot..managed.first_slot + frames as usize {
                this.push(slot);
            }
            this.total += frames as usize;
        }

        log::debug!("frame allocator: {} in {} ranges", this.stats(), this.range_count);
        this
    }

    /// Pop the most recently freed frame, or `None` when exhausted.
    pub fn allocate(&mut self) -> Option<PhysicalFrame> {
        if self.head == NIL {
            return None;
        }
        let slot = self.head as usize;
        self.head = self.slots[slot].next;
        self.slots[slot] = FrameSlot::EMPTY;
        self.free -= 1;
        self.frame_of(slot)
    }

    /// Return `addr` to the head of the free list.
    ///
    /// # Errors
    /// The address is rejected, and no counter changes, when it is not
    /// 4 KiB aligned, lies outside every managed range, or is already free.
    pub fn free(&mut self, addr: PhysicalAddress) -> Result<(), FreeError> {
        let frame = PhysicalFrame::from_start_address(addr).ok_or(FreeError::Misaligned(addr))?;
        let slot = self.slot_of(frame).ok_or(FreeError::Foreign(addr))?;
        if self.slots[slot].state == SlotState::Free {
            return Err(FreeError::DoubleFree(addr));
        }
        self.push(slot);
        Ok(())
    }

    #[must_use]
    pub const fn stats(&self) -> FrameStats {
        FrameStats {
            total: self.total,
            free: self.free,
            used: self.total - self.free,
        }
    }

    /// `true` if `frame` lies in a managed range.
    #[must_use]
    pub fn manages(&self, frame: PhysicalFrame) -> bool {
        self.slot_of(frame).is_some()
    }

    #[allow(clippy::cast_possible_truncation)]
    fn push(&mut self, slot: usize) {
        self.slots[slot] = FrameSlot {
            next: self.head,
            state: SlotState::Free,
        };
        self.head = slot as u32;
        self.free += 1;
    }

    fn slot_of(&self, frame: PhysicalFrame) -> Option<usize> {
        self.ranges[..self.range_count]
            .iter()
            .find_map(|r| r.slot_of(frame.number()))
    }

    fn frame_of(&self, slot: usize) -> Option<PhysicalFrame> {
        self.ranges[..self.range_count]
            .iter()
            .find_map(|r| r.frame_of(slot))
    }
}

impl FrameAlloc for FreeListFrameAlloc<'_> {
    fn alloc_4k(&mut self) -> Option<PhysicalFrame> {
        self.allocate()
    }
}

impl fmt::Debug for FreeListFrameAlloc<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FreeListFrameAlloc")
            .field("ranges", &self.range_count)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_info::boot::MemoryRegionKind;

    fn storage(n: usize) -> Vec<FrameSlot> {
        vec![FrameSlot::EMPTY; n]
    }

    fn pa(v: u64) -> PhysicalAddress {
        PhysicalAddress::new(v)
    }

    #[test]
    fn ranges_are_trimmed_to_whole_frames() {
        assert_eq!(MemoryRange::new(0x1001, 0x3000).frames().1, 2);
        assert_eq!(MemoryRange::new(0x1001, 0x1000).frames().1, 0);
        assert_eq!(MemoryRange::new(0x1000, 0xFFF).frames().1, 0);
        assert_eq!(
            MemoryRange::new(0x1800, 0x3000).frames().0.start_address(),
            pa(0x2000)
        );
    }

    #[test]
    fn init_counts_every_usable_frame() {
        let mut slots = storage(16);
        let alloc = FreeListFrameAlloc::init(
            &mut slots,
            [MemoryRange::new(0x10_0000, 0x4000), MemoryRange::new(0x20_0800, 0x2000)],
        );
        assert_eq!(
            alloc.stats(),
            FrameStats {
                total: 5,
                free: 5,
                used: 0
            }
        );
    }

    #[test]
    fn first_allocation_is_highest_frame() {
        let mut slots = storage(4);
        let mut alloc = FreeListFrameAlloc::init(&mut slots, [MemoryRange::new(0x1000, 0x3000)]);
        assert_eq!(alloc.allocate().map(PhysicalFrame::start_address), Some(pa(0x3000)));
        assert_eq!(alloc.allocate().map(PhysicalFrame::start_address), Some(pa(0x2000)));
        assert_eq!(alloc.allocate().map(PhysicalFrame::start_address), Some(pa(0x1000)));
        assert_eq!(alloc.allocate(), None);
        assert_eq!(alloc.stats().used, 3);
    }

    #[test]
    fn frame_zero_is_a_real_frame() {
        let mut slots = storage(1);
        let mut alloc = FreeListFrameAlloc::init(&mut slots, [MemoryRange::new(0, 0x1000)]);
        assert_eq!(alloc.allocate(), Some(PhysicalFrame::from_number(0)));
        assert_eq!(alloc.allocate(), None);
    }

    #[test]
    fn free_rejects_bad_addresses_without_touching_counters() {
        let mut slots = storage(4);
        let mut alloc = FreeListFrameAlloc::init(&mut slots, [MemoryRange::new(0x1000, 0x2000)]);
        let a = alloc.allocate().unwrap().start_address();
        let before = alloc.stats();

        assert_eq!(alloc.free(a + 8), Err(FreeError::Misaligned(a + 8)));
        assert_eq!(alloc.free(pa(0x9000)), Err(FreeError::Foreign(pa(0x9000))));
        assert_eq!(alloc.free(pa(0x1000)), Err(FreeError::DoubleFree(pa(0x1000))));
        assert_eq!(alloc.stats(), before);

        alloc.free(a).unwrap();
        assert_eq!(alloc.free(a), Err(FreeError::DoubleFree(a)));
        assert_eq!(alloc.stats().free, 2);
    }

    #[test]
    fn storage_capacity_caps_total() {
        let mut slots = storage(2);
        let alloc = FreeListFrameAlloc::init(&mut slots, [MemoryRange::new(0, 0x10_0000)]);
        assert_eq!(alloc.stats().total, 2);
        assert!(alloc.manages(PhysicalFrame::from_number(1)));
        assert!(!alloc.manages(PhysicalFrame::from_number(2)));
    }

    #[test]
    fn bootstrap_carves_from_first_large_range() {
        let mut ranges = [
            MemoryRange::new(0x1000, 0x1000),
            MemoryRange::new(0x10_0000, 0x100_0000),
        ];
        let store = bootstrap_storage(&mut ranges).unwrap();

        // 1 + 4096 frames, 8 bytes per slot -> 9 pages
        assert_eq!(store.base, pa(0x10_0000));
        assert_eq!(store.slots, 9 * 4096 / 8);
        assert_eq!(ranges[0], MemoryRange::new(0x1000, 0x1000));
        assert_eq!(ranges[1], MemoryRange::new(0x10_9000, 0x100_0000 - 0x9000));
    }

    #[test]
    fn bootstrap_fails_without_room() {
        let mut ranges = [MemoryRange::new(0x1000, 0x1000)];
        assert_eq!(bootstrap_storage(&mut ranges), None);
        assert_eq!(bootstrap_storage(&mut []), None);
    }

    #[test]
    fn usable_ranges_skip_reserved_memory() {
        let map = [
            MemoryRegion::new(0, 0x9_F000, MemoryRegionKind::Usable),
            MemoryRegion::new(0x9_F000, 0x6_1000, MemoryRegionKind::Reserved),
            MemoryRegion::new(0x10_0000, 0x10_0000, MemoryRegionKind::KernelAndModules),
            MemoryRegion::new(0x20_0000, 0x100_0000, MemoryRegionKind::Usable),
        ];
        let ranges: Vec<_> = usable_ranges(&map).collect();
        assert_eq!(
            ranges,
            [MemoryRange::new(0, 0x9_F000), MemoryRange::new(0x20_0000, 0x100_0000)]
        );
    }
}
