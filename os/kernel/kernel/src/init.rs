//! # Boot sequence
//!
//! The order is fixed:
//!
//! 1. GDT, verified through CS/DS.
//! 2. IDT with every gate enabled, verified through `sidt`.
//! 3. Handler table with the page-fault handler pre-registered.
//! 4. Frame allocator over the usable ranges of the memory map.
//! 5. VMM over the loader's page tables and direct map.
//!
//! The logger comes before all of this and enabling interrupts after it;
//! both live in `main.rs` because they touch real hardware. Every step here
//! only talks to the machine through [`Cpu`], so the whole sequence also
//! runs against a recording CPU on the host.

use crate::fatal::Fatal;
use kernel_alloc::frame_alloc::{bootstrap_storage, usable_ranges};
use kernel_alloc::{FrameSlot, FreeListFrameAlloc, HhdmPhysMapper, MemoryRange, Vmm};
use kernel_descriptors::{
    Gdt, Idt, KERNEL_CODE_SELECTOR, KERNEL_DATA_SELECTOR, load_interrupt_table, load_segment_table,
};
use kernel_info::boot::{KernelBootInfo, MemoryRegion};
use kernel_info::memory::MAX_MEMORY_REGIONS;
use kernel_interrupts::page_fault::page_fault_handler;
use kernel_interrupts::{Interrupts, PAGE_FAULT_VECTOR};
use kernel_registers::Cpu;
use kernel_vmem::PhysMapper;

/// The subsystems the boot sequence hands over to the singletons.
pub struct Kernel<'s, C: Cpu> {
    pub interrupts: Interrupts<'static>,
    pub frames: FreeListFrameAlloc<'s>,
    pub vmm: Vmm<C>,
}

/// Load and verify both descriptor tables.
///
/// # Errors
/// A [`Fatal::Descriptor`] if either readback disagrees.
pub fn load_descriptor_tables<C: Cpu + ?Sized>(
    cpu: &C,
    gdt: &'static Gdt,
    idt: &'static Idt,
) -> Result<(), Fatal> {
    load_segment_table(cpu, gdt, KERNEL_CODE_SELECTOR, KERNEL_DATA_SELECTOR)?;
    log::info!("GDT initialized");

    for vector in 0..=u8::MAX {
        idt.enable_gate(vector);
    }
    load_interrupt_table(cpu, idt)?;
    log::info!("IDT initialized");
    Ok(())
}

/// Fresh handler table with the page-fault handler in place.
#[must_use]
pub fn init_interrupts(idt: &'static Idt) -> Interrupts<'static> {
    let mut interrupts = Interrupts::new(idt);
    interrupts.register_handler(PAGE_FAULT_VECTOR, page_fault_handler);
    log::info!("ISR handlers initialized");
    interrupts
}

/// Build the frame allocator from the usable ranges of `regions`.
///
/// The slot array is carved from the first large enough range and reached
/// through `hhdm`.
///
/// # Errors
/// [`Fatal::NoUsableMemory`] if no range can hold the slot array or nothing
/// is left to manage afterwards.
///
/// # Safety
/// `hhdm` must map every usable range writable, and those ranges must not be
/// in use by anything else for `'s`.
pub unsafe fn init_frame_allocator<'s>(
    regions: &[MemoryRegion],
    hhdm: HhdmPhysMapper,
) -> Result<FreeListFrameAlloc<'s>, Fatal> {
    let mut ranges = [MemoryRange::new(0, 0); MAX_MEMORY_REGIONS];
    let mut count = 0;
    for range in usable_ranges(regions) {
        if count == MAX_MEMORY_REGIONS {
            log::warn!(
                "Ignoring usable range at {} ({} bytes): more than {MAX_MEMORY_REGIONS} ranges",
                range.base,
                range.length
            );
            continue;
        }
        ranges[count] = range;
        count += 1;
    }
    let ranges = &mut ranges[..count];

    let storage = bootstrap_storage(ranges).ok_or(Fatal::NoUsableMemory)?;
    log::debug!(
        "Frame slots: {} at {} ({} bytes each)",
        storage.slots,
        storage.base,
        size_of::<FrameSlot>()
    );

    let slots: *mut FrameSlot = hhdm.phys_to_virt(storage.base).as_mut_ptr();
    // SAFETY: `bootstrap_storage` removed these frames from `ranges`, and the
    // caller guarantees they are mapped and otherwise unused.
    let slots = unsafe {
        slots.write_bytes(0, storage.slots);
        core::slice::from_raw_parts_mut(slots, storage.slots)
    };

    let frames = FreeListFrameAlloc::init(slots, ranges.iter().copied());
    if frames.stats().total == 0 {
        return Err(Fatal::NoUsableMemory);
    }
    log::info!("PMM initialized: {}", frames.stats());
    Ok(frames)
}

/// Read the memory map the loader left behind.
///
/// # Safety
/// `boot.memory_map` must describe `region_count` valid records that stay
/// readable for `'b`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub unsafe fn boot_regions<'b>(boot: &KernelBootInfo) -> &'b [MemoryRegion] {
    let map = boot.memory_map;
    if map.regions_ptr == 0 || map.region_count == 0 {
        return &[];
    }
    // SAFETY: forwarded to the caller.
    unsafe { core::slice::from_raw_parts(map.regions_ptr as *const MemoryRegion, map.region_count as usize) }
}

/// Steps 1 to 5.
///
/// # Errors
/// The first [`Fatal`] any step produces. Later steps do not run.
///
/// # Safety
/// * CR3 (as read through `cpu`) must hold the loader's page tables.
/// * `hhdm` must map all of physical memory and the conditions of
///   [`init_frame_allocator`] must hold.
pub unsafe fn bring_up<'s, C: Cpu>(
    cpu: C,
    regions: &[MemoryRegion],
    hhdm: HhdmPhysMapper,
    gdt: &'static Gdt,
    idt: &'static Idt,
) -> Result<Kernel<'s, C>, Fatal> {
    load_descriptor_tables(&cpu, gdt, idt)?;
    let interrupts = init_interrupts(idt);
    let frames = unsafe { init_frame_allocator(regions, hhdm)? };
    let vmm = unsafe { Vmm::init(cpu, hhdm) };

    Ok(Kernel {
        interrupts,
        frames,
        vmm,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_descriptors::{IDT_VECTORS, build_interrupt_table, build_segment_table};
    use kernel_info::boot::MemoryRegionKind;
    use kernel_info::memory::PAGE_SIZE;
    use kernel_memory_addresses::{PhysicalAddress, PhysicalFrame, VirtualAddress};
    use kernel_registers::{ActiveSegments, CpuCall, RecordingCpu};
    use kernel_vmem::PageEntryBits;

    #[repr(C, align(4096))]
    struct Frame([u8; 4096]);

    /// 64 usable frames, then the loader's PML4 in a kernel region.
    const USABLE_FRAMES: u64 = 64;
    const ROOT: u64 = USABLE_FRAMES * PAGE_SIZE;

    struct Machine {
        _ram: Vec<Frame>,
        hhdm: HhdmPhysMapper,
        regions: Vec<MemoryRegion>,
    }

    impl Machine {
        fn new() -> Self {
            let mut ram: Vec<Frame> = (0..=USABLE_FRAMES).map(|_| Frame([0; 4096])).collect();
            let hhdm = HhdmPhysMapper::new(ram.as_mut_ptr() as u64);
            let regions = vec![
                MemoryRegion::new(0, ROOT, MemoryRegionKind::Usable),
                MemoryRegion::new(ROOT, PAGE_SIZE, MemoryRegionKind::KernelAndModules),
            ];
            Self {
                _ram: ram,
                hhdm,
                regions,
            }
        }
    }

    fn tables() -> (&'static Gdt, &'static Idt) {
        let trampolines: [u64; IDT_VECTORS] = core::array::from_fn(|v| 0xFFFF_FFFF_8000_2000 + 16 * v as u64);
        let idt = build_interrupt_table(&trampolines, KERNEL_CODE_SELECTOR);
        (Box::leak(Box::new(build_segment_table())), Box::leak(Box::new(idt)))
    }

    fn cpu() -> RecordingCpu {
        RecordingCpu::with_page_table_root(PhysicalFrame::containing_address(PhysicalAddress::new(ROOT)))
    }

    #[test]
    fn full_sequence() {
        let machine = Machine::new();
        let (gdt, idt) = tables();
        idt.disable_gate(0x80);

        let mut kernel =
            unsafe { bring_up(cpu(), &machine.regions, machine.hhdm, gdt, idt) }.expect("boot succeeds");

        let calls = kernel.vmm.cpu().calls();
        assert!(matches!(
            calls.as_slice(),
            [
                CpuCall::LoadSegmentTable { code: 0x08, data: 0x10, .. },
                CpuCall::LoadInterruptTable(_)
            ]
        ));
        assert!((0..=u8::MAX).all(|v| idt.is_gate_enabled(v)));
        assert!(kernel.interrupts.handler(PAGE_FAULT_VECTOR).is_some());
        assert_eq!(kernel.vmm.root().start_address().as_u64(), ROOT);

        let slot_pages = (USABLE_FRAMES * size_of::<FrameSlot>() as u64).div_ceil(PAGE_SIZE);
        let stats = kernel.frames.stats();
        assert_eq!(stats.total as u64, USABLE_FRAMES - slot_pages);
        assert_eq!(stats.free, stats.total);

        let va = VirtualAddress::new(0xFFFF_9000_0000_0000);
        let pa = PhysicalAddress::new(0x3_0000);
        kernel
            .vmm
            .map_page(&mut kernel.frames, va, pa, PageEntryBits::kernel_rw())
            .expect("room for three tables");
        assert_eq!(kernel.vmm.translate(va + 0x10), Some(pa + 0x10));
        assert_eq!(kernel.frames.stats().used, 3);
    }

    #[test]
    fn segment_mismatch_stops_the_sequence() {
        let machine = Machine::new();
        let (gdt, idt) = tables();
        let cpu = cpu();
        cpu.force_segment_readback(ActiveSegments { code: 0x08, data: 0x00 });

        let err = unsafe { bring_up(cpu, &machine.regions, machine.hhdm, gdt, idt) }
            .err()
            .expect("boot fails");

        assert!(matches!(err, Fatal::Descriptor(_)));
    }

    #[test]
    fn memory_map_without_usable_ranges() {
        let machine = Machine::new();
        let reserved = [MemoryRegion::new(0, ROOT, MemoryRegionKind::Reserved)];

        let err = unsafe { init_frame_allocator(&reserved, machine.hhdm) }.err();

        assert!(matches!(err, Some(Fatal::NoUsableMemory)));
    }

    #[test]
    fn usable_ranges_past_the_limit_are_left_out() {
        let machine = Machine::new();
        let page = |n: u64| n * PAGE_SIZE;
        let usable = |base: u64, length: u64| MemoryRegion::new(base, length, MemoryRegionKind::Usable);

        // Frames 0-1, then 2..=62 one range each, two ranges without a whole
        // frame, and frame 63 as range number 65.
        let mut regions = vec![usable(0, page(2))];
        regions.extend((2..63).map(|n| usable(page(n), PAGE_SIZE)));
        regions.push(usable(ROOT + PAGE_SIZE, 0x800));
        regions.push(usable(ROOT + PAGE_SIZE + 0x800, 0x800));
        regions.push(usable(page(63), PAGE_SIZE));
        assert_eq!(regions.len(), MAX_MEMORY_REGIONS + 1);

        let frames = unsafe { init_frame_allocator(&regions, machine.hhdm) }.expect("enough memory");

        // One frame goes to the slot array.
        assert_eq!(frames.stats().total, 62);
        assert!(frames.manages(PhysicalFrame::from_number(62)));
        assert!(!frames.manages(PhysicalFrame::from_number(63)));
    }

    #[test]
    fn boot_regions_reads_the_loader_array() {
        let machine = Machine::new();
        let boot = KernelBootInfo {
            memory_map: kernel_info::boot::MemoryMapInfo {
                regions_ptr: machine.regions.as_ptr() as u64,
                region_count: machine.regions.len() as u64,
            },
            hhdm_offset: machine.hhdm.offset(),
            rsdp_addr: 0,
        };

        let regions = unsafe { boot_regions(&boot) };

        assert_eq!(regions, machine.regions.as_slice());
    }
}
