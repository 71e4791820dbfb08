//! # Virtual Memory Support
//!
//! x86-64 four-level paging structures and a walker that edits them.
//!
//! ## What you get
//! - [`PageEntryBits`]: the raw 64-bit entry as a bitfield.
//! - [`Entry`]: the decoded meaning of an entry (absent, table, page).
//! - [`PageTable`]: a 4 KiB-aligned array of 512 entries.
//! - [`AddressSpace`]: map / unmap / translate / walk over one PML4 tree.
//! - The two seams the walker needs from its environment: [`FrameAlloc`]
//!   for new table frames and [`PhysMapper`] to reach a frame's bytes.
//!
//! ## Virtual Address → Physical Address Walk
//!
//! ```text
//! | 47‒39 | 38‒30 | 29‒21 | 20‒12 | 11‒0   |
//! |  PML4 |  PDPT |   PD  |   PT  | Offset |
//! ```
//!
//! ```text
//!  CR3 → PML4 → PDPT → PD → PT → 4 KiB frame
//!                 │      │
//!                 │      └─ PS=1: 2 MiB leaf
//!                 └──────── PS=1: 1 GiB leaf
//! ```
//!
//! Each table holds 512 entries of 8 bytes. Intermediate entries created
//! here are always present + writable; the leaf carries the caller's flags.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code, clippy::inline_always)]

mod address_space;
mod entry;
mod page_entry_bits;
mod page_table;

pub use crate::address_space::{AddressSpace, MapError, Walk, WalkStep};
pub use crate::entry::Entry;
pub use crate::page_entry_bits::PageEntryBits;
pub use crate::page_table::PageTable;
use kernel_memory_addresses::{PhysicalAddress, PhysicalFrame, VirtualAddress};

/// Source of zero-or-garbage 4 KiB physical frames for page tables.
///
/// Returns `None` on out-of-memory.
pub trait FrameAlloc {
    fn alloc_4k(&mut self) -> Option<PhysicalFrame>;
}

/// Makes physical memory reachable from the current address space.
///
/// The kernel uses the higher-half direct map: a fixed offset added to the
/// physical address. Tests point it at a host buffer.
pub trait PhysMapper {
    /// Virtual alias of `pa`.
    fn phys_to_virt(&self, pa: PhysicalAddress) -> VirtualAddress;

    /// Borrow the bytes at `pa` as a `T`.
    ///
    /// # Safety
    /// - `pa` must be mapped writable through [`phys_to_virt`](Self::phys_to_virt)
    ///   for the whole of `'a`.
    /// - The bytes must be a valid `T`, suitably aligned.
    /// - No other reference to the same bytes may be live.
    #[inline]
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        unsafe { &mut *self.phys_to_virt(pa).as_mut_ptr::<T>() }
    }
}

impl<M: PhysMapper + ?Sized> PhysMapper for &M {
    #[inline]
    fn phys_to_virt(&self, pa: PhysicalAddress) -> VirtualAddress {
        (**self).phys_to_virt(pa)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_memory_addresses::{TableLevel, VirtualPage};

    /// Hands out the next 4 KiB frame, never reuses.
    struct BumpAlloc {
        next: u64,
        end: u64,
    }

    impl BumpAlloc {
        const fn new(start: u64, end: u64) -> Self {
            Self { next: start, end }
        }
    }

    impl FrameAlloc for BumpAlloc {
        fn alloc_4k(&mut self) -> Option<PhysicalFrame> {
            if self.next + 4096 > self.end {
                return None;
            }
            let frame = PhysicalFrame::from_start_address(PhysicalAddress::new(self.next));
            self.next += 4096;
            frame
        }
    }

    #[repr(align(4096))]
    struct Aligned4K(#[allow(dead_code)] [u8; 4096]);

    /// Simulated RAM: physical address `n` is byte `n` of the buffer.
    struct TestPhys {
        frames: Vec<Aligned4K>,
    }

    impl TestPhys {
        fn with_frames(n: usize) -> Self {
            Self {
                frames: (0..n).map(|_| Aligned4K([0; 4096])).collect(),
            }
        }

        fn base(&self) -> u64 {
            self.frames.as_ptr() as u64
        }
    }

    impl PhysMapper for TestPhys {
        fn phys_to_virt(&self, pa: PhysicalAddress) -> VirtualAddress {
            assert!(pa.as_u64() < (self.frames.len() as u64) << 12, "{pa:?} outside test RAM");
            VirtualAddress::new(self.base() + pa.as_u64())
        }
    }

    fn fresh_space<'p>(phys: &'p TestPhys, alloc: &mut BumpAlloc) -> AddressSpace<'p, TestPhys> {
        let root = alloc.alloc_4k().unwrap();
        unsafe { AddressSpace::from_root(phys, root) }
    }

    fn page(va: u64) -> VirtualPage {
        VirtualPage::from_start_address(VirtualAddress::new(va)).unwrap()
    }

    fn frame(pa: u64) -> PhysicalFrame {
        PhysicalFrame::from_start_address(PhysicalAddress::new(pa)).unwrap()
    }

    #[test]
    fn map_one_4k_creates_tables_and_leaf() {
        let phys = TestPhys::with_frames(64);
        let mut alloc = BumpAlloc::new(0, 64 << 12);
        let mut aspace = fresh_space(&phys, &mut alloc);

        let va = 0xffff_8000_0000_0000;
        aspace
            .map_4k(
                &mut alloc,
                page(va),
                frame(0x3_0000),
                PageEntryBits::kernel_rw().with_no_execute(true),
            )
            .unwrap();

        // root + PDPT + PD + PT
        assert_eq!(alloc.next, 4 << 12);

        let walk = aspace.walk(VirtualAddress::new(va));
        let levels: Vec<_> = walk.steps().map(|s| s.level).collect();
        assert_eq!(levels, TableLevel::WALK_ORDER);
        for step in walk.steps().take(3) {
            assert!(step.raw.present() && step.raw.writable());
            assert!(matches!(step.entry, Entry::Table(_)));
        }
        let leaf = walk.leaf().unwrap();
        assert!(leaf.present() && leaf.no_execute());
        assert_eq!(leaf.physical_address().as_u64(), 0x3_0000);
    }

    #[test]
    fn second_mapping_in_same_region_reuses_tables() {
        let phys = TestPhys::with_frames(64);
        let mut alloc = BumpAlloc::new(0, 64 << 12);
        let mut aspace = fresh_space(&phys, &mut alloc);

        let flags = PageEntryBits::kernel_rw();
        aspace.map_4k(&mut alloc, page(0x40_0000), frame(0x1_0000), flags).unwrap();
        let used = alloc.next;
        aspace.map_4k(&mut alloc, page(0x40_1000), frame(0x1_1000), flags).unwrap();
        assert_eq!(alloc.next, used);
    }

    #[test]
    fn translate_adds_page_offset() {
        let phys = TestPhys::with_frames(64);
        let mut alloc = BumpAlloc::new(0, 64 << 12);
        let mut aspace = fresh_space(&phys, &mut alloc);

        aspace
            .map_4k(&mut alloc, page(0x7000_0000), frame(0x2_0000), PageEntryBits::kernel_ro())
            .unwrap();
        assert_eq!(
            aspace.translate(VirtualAddress::new(0x7000_0123)),
            Some(PhysicalAddress::new(0x2_0123))
        );
        assert_eq!(aspace.translate(VirtualAddress::new(0x7000_1000)), None);
    }

    #[test]
    fn remapping_overwrites_leaf() {
        let phys = TestPhys::with_frames(64);
        let mut alloc = BumpAlloc::new(0, 64 << 12);
        let mut aspace = fresh_space(&phys, &mut alloc);

        let va = VirtualAddress::new(0x1000_0000);
        let flags = PageEntryBits::kernel_rw();
        aspace.map_4k(&mut alloc, va.page(), frame(0x1_0000), flags).unwrap();
        aspace.map_4k(&mut alloc, va.page(), frame(0x2_0000), flags).unwrap();
        assert_eq!(aspace.translate(va), Some(PhysicalAddress::new(0x2_0000)));
    }

    #[test]
    fn unmap_clears_only_the_leaf() {
        let phys = TestPhys::with_frames(64);
        let mut alloc = BumpAlloc::new(0, 64 << 12);
        let mut aspace = fresh_space(&phys, &mut alloc);

        let flags = PageEntryBits::kernel_rw();
        aspace.map_4k(&mut alloc, page(0x20_0000), frame(0x1_0000), flags).unwrap();
        aspace.map_4k(&mut alloc, page(0x20_1000), frame(0x1_1000), flags).unwrap();

        let previous = aspace.unmap_4k(page(0x20_0000)).unwrap();
        assert!(previous.present());

        let walk = aspace.walk(VirtualAddress::new(0x20_0000));
        assert!(!walk.leaf().unwrap().present());
        assert_eq!(
            aspace.translate(VirtualAddress::new(0x20_1000)),
            Some(PhysicalAddress::new(0x1_1000))
        );
    }

    #[test]
    fn unmap_without_tables_is_a_no_op() {
        let phys = TestPhys::with_frames(8);
        let mut alloc = BumpAlloc::new(0, 8 << 12);
        let mut aspace = fresh_space(&phys, &mut alloc);

        assert_eq!(aspace.unmap_4k(page(0x1234_5000)), None);
        assert_eq!(alloc.next, 1 << 12);
        assert_eq!(aspace.walk(VirtualAddress::new(0x1234_5000)).steps().count(), 1);
    }

    #[test]
    fn out_of_memory_leaves_parent_untouched() {
        let phys = TestPhys::with_frames(2);
        // Room for the root and one more table only.
        let mut alloc = BumpAlloc::new(0, 2 << 12);
        let mut aspace = fresh_space(&phys, &mut alloc);

        let err = aspace
            .map_4k(&mut alloc, page(0x1_0000_0000), frame(0), PageEntryBits::kernel_rw())
            .unwrap_err();
        assert_eq!(err, MapError::OutOfMemory { level: TableLevel::L3 });

        // The PDPT got linked, the PD did not.
        let walk = aspace.walk(VirtualAddress::new(0x1_0000_0000));
        let entries: Vec<_> = walk.steps().map(|s| s.entry).collect();
        assert!(matches!(entries[..], [Entry::Table(_), Entry::Absent]));
    }

    #[test]
    fn translate_understands_huge_pages() {
        let phys = TestPhys::with_frames(8);
        let mut alloc = BumpAlloc::new(0, 8 << 12);
        let mut aspace = fresh_space(&phys, &mut alloc);

        // Hand-build PML4[0] -> PDPT, PDPT[1] = 1 GiB page at 0x4000_0000.
        let pdpt = alloc.alloc_4k().unwrap();
        let root: &mut PageTable = unsafe { phys.phys_to_mut(aspace.root().start_address()) };
        root.set(0, Entry::Table(pdpt).encode());
        let huge = Entry::HugePage {
            base: PhysicalAddress::new(0x4000_0000),
            level: TableLevel::L3,
        };
        let table: &mut PageTable = unsafe { phys.phys_to_mut(pdpt.start_address()) };
        table.set(1, huge.encode());

        assert_eq!(
            aspace.translate(VirtualAddress::new(0x4012_3456)),
            Some(PhysicalAddress::new(0x4012_3456))
        );
        assert_eq!(
            aspace.map_4k(&mut alloc, page(0x4000_0000), frame(0), PageEntryBits::kernel_rw()),
            Err(MapError::HugePageInPath { level: TableLevel::L3 })
        );
    }

    #[test]
    fn new_tables_are_cleared_before_linking() {
        let phys = TestPhys::with_frames(8);
        let mut alloc = BumpAlloc::new(0, 8 << 12);
        let mut aspace = fresh_space(&phys, &mut alloc);

        // Leave garbage in the frames the walker will take next.
        for n in 1..4u64 {
            let bytes: &mut [u64; 512] = unsafe { phys.phys_to_mut(frame(n << 12).start_address()) };
            bytes.fill(u64::MAX);
        }

        let flags = PageEntryBits::kernel_rw();
        aspace.map_4k(&mut alloc, page(0x60_0000), frame(0x5000), flags).unwrap();
        let before = aspace.walk(VirtualAddress::new(0x60_0000));
        aspace.map_4k(&mut alloc, page(0x60_1000), frame(0x6000), flags).unwrap();

        assert_eq!(alloc.next, 4 << 12);
        assert_eq!(aspace.walk(VirtualAddress::new(0x60_0000)), before);
        assert_eq!(aspace.translate(VirtualAddress::new(0x60_2000)), None);
        assert_eq!(
            aspace.translate(VirtualAddress::new(0x60_1000)),
            Some(PhysicalAddress::new(0x6000))
        );
        assert_eq!(aspace.unmap_4k(page(0x60_0000)), before.leaf());
        assert_eq!(aspace.translate(VirtualAddress::new(0x60_0000)), None);
    }

    #[test]
    fn walk_display_names_levels() {
        let phys = TestPhys::with_frames(8);
        let mut alloc = BumpAlloc::new(0, 8 << 12);
        let aspace = fresh_space(&phys, &mut alloc);
        let text = aspace.walk(VirtualAddress::new(0)).to_string();
        assert_eq!(text, "PML4[0]=absent");
    }
}
