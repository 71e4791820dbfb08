//! Virtual memory manager for the active address space.
//!
//! [`Vmm`] owns the CPU port and the direct map, and edits the tree rooted at
//! the CR3 value it read during [`Vmm::init`]. Frames for new intermediate
//! tables are borrowed from a [`FrameAlloc`] per call, so the allocator keeps
//! its own lock and lifetime.
//!
//! # Example
//! ```ignore
//! let mut vmm = unsafe { Vmm::init(X86Cpu::new(), HhdmPhysMapper::new(boot.hhdm_offset)) };
//! vmm.map_page(&mut pmm, va, pa, PageEntryBits::kernel_rw())?;
//! ```

use kernel_info::memory::CACHE_LINE_SIZE;
use kernel_memory_addresses::{PhysicalAddress, PhysicalFrame, VirtualAddress, VirtualPage};
use kernel_registers::Cpu;
use kernel_vmem::{AddressSpace, FrameAlloc, MapError, PageEntryBits, PhysMapper, Walk};

use crate::HhdmPhysMapper;

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum VmmError {
    #[error("out of physical memory for a page table")]
    OutOfMemory,
    #[error("virtual address {0} is not 4 KiB aligned")]
    MisalignedVirtual(VirtualAddress),
    #[error("physical address {0} is not 4 KiB aligned")]
    MisalignedPhysical(PhysicalAddress),
    #[error("{0} is covered by a huge page")]
    HugePage(VirtualAddress),
}

/// Kernel virtual memory manager.
pub struct Vmm<C: Cpu> {
    cpu: C,
    hhdm: HhdmPhysMapper,
    root: PhysicalFrame,
}

impl<C: Cpu> Vmm<C> {
    /// Adopt the page tables CR3 currently points to.
    ///
    /// # Safety
    /// - Paging must be on and CR3 must hold a valid PML4.
    /// - Every table reachable from it must be writable through `hhdm`.
    /// - No other code may edit those tables while the `Vmm` lives.
    pub unsafe fn init(cpu: C, hhdm: HhdmPhysMapper) -> Self {
        let root = cpu.page_table_root().pml4();
        log::info!(
            "VMM initialized (PML4 at {root}, direct map offset 0x{:016X})",
            hhdm.offset()
        );
        Self { cpu, hhdm, root }
    }

    #[must_use]
    pub const fn root(&self) -> PhysicalFrame {
        self.root
    }

    /// Direct-map alias of the PML4.
    #[must_use]
    pub fn root_table(&self) -> VirtualAddress {
        self.hhdm.phys_to_virt(self.root.start_address())
    }

    #[must_use]
    pub const fn cpu(&self) -> &C {
        &self.cpu
    }

    #[must_use]
    pub const fn direct_map(&self) -> HhdmPhysMapper {
        self.hhdm
    }

    #[inline]
    #[must_use]
    pub fn phys_to_virt(&self, pa: PhysicalAddress) -> VirtualAddress {
        self.hhdm.phys_to_virt(pa)
    }

    #[inline]
    #[must_use]
    pub const fn virt_to_phys(&self, va: VirtualAddress) -> PhysicalAddress {
        self.hhdm.virt_to_phys(va)
    }

    fn address_space(&self) -> AddressSpace<'_, HhdmPhysMapper> {
        // SAFETY: the tables are ours per the `init` contract.
        unsafe { AddressSpace::from_root(&self.hhdm, self.root) }
    }

    /// Map one 4 KiB page and invalidate its TLB entry.
    ///
    /// Intermediate tables come from `frames`. An existing leaf is replaced.
    ///
    /// # Errors
    /// Misaligned input is rejected before anything is touched. On
    /// [`VmmError::OutOfMemory`] no entry for `va` exists afterwards.
    pub fn map_page(
        &mut self,
        frames: &mut impl FrameAlloc,
        va: VirtualAddress,
        pa: PhysicalAddress,
        flags: PageEntryBits,
    ) -> Result<(), VmmError> {
        let page = VirtualPage::from_start_address(va).ok_or(VmmError::MisalignedVirtual(va))?;
        let frame = PhysicalFrame::from_start_address(pa).ok_or(VmmError::MisalignedPhysical(pa))?;

        self.address_space()
            .map_4k(frames, page, frame, flags)
            .map_err(|e| match e {
                MapError::OutOfMemory { level } => {
                    log::warn!("map {va} -> {pa}: no frame for a table below the {level}");
                    VmmError::OutOfMemory
                }
                MapError::HugePageInPath { .. } => VmmError::HugePage(va),
            })?;

        self.cpu.invalidate_page(va);
        Ok(())
    }

    /// Remove the mapping of the page containing `va`.
    ///
    /// Returns early, without touching the TLB, when an intermediate table is
    /// missing. Emptied tables are kept.
    pub fn unmap_page(&mut self, va: VirtualAddress) {
        if self.address_space().unmap_4k(va.page()).is_some() {
            self.cpu.invalidate_page(va);
        }
    }

    #[must_use]
    pub fn translate(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        self.address_space().translate(va)
    }

    #[must_use]
    pub fn walk(&self, va: VirtualAddress) -> Walk {
        self.address_space().walk(va)
    }

    /// Write back and evict every cache line overlapping `[addr, addr + size)`,
    /// then fence.
    pub fn flush_cache_range(&self, addr: VirtualAddress, size: u64) {
        for_each_cache_line(addr, size, |line| self.cpu.flush_cache_line(line));
        self.cpu.memory_fence();
    }

    /// Drop every cache line overlapping `[addr, addr + size)` so the next
    /// read observes memory (e.g. after device DMA), then fence.
    ///
    /// Uses `clflush`, so dirty lines are written back as well.
    pub fn invalidate_cache_range(&self, addr: VirtualAddress, size: u64) {
        for_each_cache_line(addr, size, |line| self.cpu.flush_cache_line(line));
        self.cpu.memory_fence();
    }
}

/// Call `f` with the base of every 64-byte line overlapping `[addr, addr + size)`.
fn for_each_cache_line(addr: VirtualAddress, size: u64, mut f: impl FnMut(VirtualAddress)) {
    let end = addr.as_u64().saturating_add(size);
    let mut line = addr.align_down(CACHE_LINE_SIZE);
    while line.as_u64() < end {
        f(line);
        line = line.wrapping_add(CACHE_LINE_SIZE);
        if line.as_u64() == 0 {
            break;
        }
    }
}
