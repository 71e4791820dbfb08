mod common;

use common::{Arena, allocator, cpu_with_root};
use kernel_alloc::{FreeListFrameAlloc, MemoryRange, Vmm, VmmError};
use kernel_memory_addresses::{PhysicalAddress, PhysicalFrame, VirtualAddress};
use kernel_registers::cr3::Cr3;
use kernel_registers::{CpuCall, RecordingCpu};
use kernel_vmem::{PageEntryBits, PageTable, PhysMapper};

const TABLE_POOL: MemoryRange = MemoryRange::new(0x1000, 0xF_F000);

/// 4 MiB of simulated RAM. Frames below 1 MiB feed page tables; the rest is
/// free for mapping targets.
fn setup(pmm: &mut FreeListFrameAlloc<'_>, arena: &Arena) -> Vmm<RecordingCpu> {
    let root = pmm.allocate().unwrap();
    let hhdm = arena.direct_map();
    let table: &mut PageTable = unsafe { hhdm.phys_to_mut(root.start_address()) };
    table.zero();
    unsafe { Vmm::init(cpu_with_root(root), hhdm) }
}

#[test]
fn mapped_page_aliases_its_frame() {
    let arena = Arena::new(1024);
    let mut storage = Vec::new();
    let mut pmm = allocator(&mut storage, &[TABLE_POOL]);
    let mut vmm = setup(&mut pmm, &arena);

    let va = VirtualAddress::new(0x10_0000_0000);
    let pa = PhysicalAddress::new(0x20_0000);
    vmm.map_page(&mut pmm, va, pa, PageEntryBits::kernel_rw()).unwrap();

    // Resolve the way the MMU would, then write through that alias.
    let resolved = vmm.translate(va).unwrap();
    assert_eq!(resolved, pa);
    let sentinel = 0xC0FF_EE00_DEAD_BEEF_u64;
    unsafe { vmm.phys_to_virt(resolved).as_mut_ptr::<u64>().write_volatile(sentinel) };

    let direct = unsafe { vmm.phys_to_virt(pa).as_ptr::<u64>().read_volatile() };
    assert_eq!(direct, sentinel);

    vmm.unmap_page(va);
    let leaf = vmm.walk(va).leaf().unwrap();
    assert!(!leaf.present());
    assert_eq!(vmm.translate(va), None);

    assert_eq!(
        vmm.cpu().calls(),
        [CpuCall::InvalidatePage(va), CpuCall::InvalidatePage(va)]
    );
}

#[test]
fn map_takes_three_table_frames_from_the_allocator() {
    let arena = Arena::new(1024);
    let mut storage = Vec::new();
    let mut pmm = allocator(&mut storage, &[TABLE_POOL]);
    let mut vmm = setup(&mut pmm, &arena);
    let before = pmm.stats();

    vmm.map_page(
        &mut pmm,
        VirtualAddress::new(0x10_0000_0000),
        PhysicalAddress::new(0x20_0000),
        PageEntryBits::kernel_rw(),
    )
    .unwrap();
    assert_eq!(pmm.stats().used, before.used + 3);

    // A neighbour in the same 2 MiB block needs no new tables.
    vmm.map_page(
        &mut pmm,
        VirtualAddress::new(0x10_0000_1000),
        PhysicalAddress::new(0x20_1000),
        PageEntryBits::kernel_rw(),
    )
    .unwrap();
    assert_eq!(pmm.stats().used, before.used + 3);
}

#[test]
fn unmapping_an_unmapped_address_changes_nothing() {
    let arena = Arena::new(1024);
    let mut storage = Vec::new();
    let mut pmm = allocator(&mut storage, &[TABLE_POOL]);
    let mut vmm = setup(&mut pmm, &arena);

    let neighbour = VirtualAddress::new(0x40_0000);
    vmm.map_page(&mut pmm, neighbour, PhysicalAddress::new(0x30_0000), PageEntryBits::kernel_rw())
        .unwrap();
    vmm.cpu().take_calls();
    let stats = pmm.stats();

    // Different PML4 slot: walk stops at the root.
    vmm.unmap_page(VirtualAddress::new(0x7F00_0000_0000));
    assert!(vmm.cpu().calls().is_empty());

    // Same PT, empty slot: the leaf is cleared again and invalidated.
    vmm.unmap_page(VirtualAddress::new(0x40_1000));
    vmm.unmap_page(VirtualAddress::new(0x40_1000));

    assert_eq!(pmm.stats(), stats);
    assert_eq!(vmm.translate(neighbour), Some(PhysicalAddress::new(0x30_0000)));
}

#[test]
fn out_of_memory_is_reported_and_leaves_no_mapping() {
    let arena = Arena::new(16);
    let mut storage = Vec::new();
    // Root plus a single spare frame.
    let mut pmm = allocator(&mut storage, &[MemoryRange::new(0x1000, 0x2000)]);
    let mut vmm = setup(&mut pmm, &arena);

    let va = VirtualAddress::new(0x10_0000_0000);
    let err = vmm
        .map_page(&mut pmm, va, PhysicalAddress::new(0x8000), PageEntryBits::kernel_rw())
        .unwrap_err();
    assert_eq!(err, VmmError::OutOfMemory);
    assert_eq!(vmm.translate(va), None);
    assert!(vmm.cpu().calls().is_empty());
    assert_eq!(pmm.stats().free, 0);
}

#[test]
fn misaligned_addresses_are_rejected_up_front() {
    let arena = Arena::new(64);
    let mut storage = Vec::new();
    let mut pmm = allocator(&mut storage, &[MemoryRange::new(0x1000, 0x1_0000)]);
    let mut vmm = setup(&mut pmm, &arena);
    let before = pmm.stats();

    let flags = PageEntryBits::kernel_rw();
    assert_eq!(
        vmm.map_page(&mut pmm, VirtualAddress::new(0x1234), PhysicalAddress::new(0x2000), flags),
        Err(VmmError::MisalignedVirtual(VirtualAddress::new(0x1234)))
    );
    assert_eq!(
        vmm.map_page(&mut pmm, VirtualAddress::new(0x1000), PhysicalAddress::new(0x2001), flags),
        Err(VmmError::MisalignedPhysical(PhysicalAddress::new(0x2001)))
    );
    assert_eq!(pmm.stats(), before);
}

#[test]
fn init_masks_cr3_flag_bits() {
    let arena = Arena::new(8);
    let root = PhysicalFrame::from_number(3);
    let cpu = RecordingCpu::new();
    cpu.set_page_table_root(Cr3::from_pml4(root).with_pwt(true).with_pcd(true));
    let vmm = unsafe { Vmm::init(cpu, arena.direct_map()) };

    assert_eq!(vmm.root(), root);
    assert_eq!(vmm.virt_to_phys(vmm.root_table()), root.start_address());
}

#[test]
fn direct_map_round_trips() {
    let arena = Arena::new(8);
    let mut storage = Vec::new();
    let mut pmm = allocator(&mut storage, &[MemoryRange::new(0x1000, 0x1000)]);
    let vmm = setup(&mut pmm, &arena);

    let pa = PhysicalAddress::new(0x5008);
    assert_eq!(vmm.virt_to_phys(vmm.phys_to_virt(pa)), pa);
}

#[test]
fn cache_maintenance_covers_every_touched_line() {
    let arena = Arena::new(8);
    let mut storage = Vec::new();
    let mut pmm = allocator(&mut storage, &[MemoryRange::new(0x1000, 0x1000)]);
    let vmm = setup(&mut pmm, &arena);

    vmm.flush_cache_range(VirtualAddress::new(0x1030), 0x50);
    assert_eq!(
        vmm.cpu().take_calls(),
        [
            CpuCall::FlushCacheLine(VirtualAddress::new(0x1000)),
            CpuCall::FlushCacheLine(VirtualAddress::new(0x1040)),
            CpuCall::MemoryFence,
        ]
    );

    vmm.invalidate_cache_range(VirtualAddress::new(0x2000), 0x40);
    assert_eq!(
        vmm.cpu().take_calls(),
        [
            CpuCall::FlushCacheLine(VirtualAddress::new(0x2000)),
            CpuCall::MemoryFence,
        ]
    );

    vmm.flush_cache_range(VirtualAddress::new(0x3000), 0);
    assert_eq!(vmm.cpu().take_calls(), [CpuCall::MemoryFence]);
}
