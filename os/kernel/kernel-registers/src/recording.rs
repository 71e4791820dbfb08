use crate::cr3::Cr3;
use crate::{ActiveSegments, Cpu, DescriptorTablePointer};
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use kernel_memory_addresses::{PhysicalFrame, VirtualAddress};

/// One recorded [`Cpu`] side effect.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CpuCall {
    LoadSegmentTable {
        ptr: DescriptorTablePointer,
        code: u16,
        data: u16,
    },
    LoadInterruptTable(DescriptorTablePointer),
    InvalidatePage(VirtualAddress),
    FlushCacheLine(VirtualAddress),
    MemoryFence,
}

/// [`Cpu`] that executes nothing and remembers everything.
///
/// Readbacks return what was last loaded. A test can force a different
/// readback to simulate hardware that did not take the new state.
#[derive(Debug, Default)]
pub struct RecordingCpu {
    calls: RefCell<Vec<CpuCall>>,
    segments: Cell<ActiveSegments>,
    forced_segments: Cell<Option<ActiveSegments>>,
    interrupt_table: Cell<DescriptorTablePointer>,
    forced_interrupt_table: Cell<Option<DescriptorTablePointer>>,
    cr2: Cell<VirtualAddress>,
    cr3: Cell<Cr3>,
}

impl RecordingCpu {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A fake whose CR3 points at `pml4`.
    #[must_use]
    pub fn with_page_table_root(pml4: PhysicalFrame) -> Self {
        let cpu = Self::default();
        cpu.cr3.set(Cr3::from_pml4(pml4));
        cpu
    }

    pub fn set_page_table_root(&self, cr3: Cr3) {
        self.cr3.set(cr3);
    }

    pub fn set_fault_address(&self, va: VirtualAddress) {
        self.cr2.set(va);
    }

    /// Make `read_active_segment` return `segments` regardless of loads.
    pub fn force_segment_readback(&self, segments: ActiveSegments) {
        self.forced_segments.set(Some(segments));
    }

    /// Make `read_interrupt_table` return `ptr` regardless of loads.
    pub fn force_interrupt_table_readback(&self, ptr: DescriptorTablePointer) {
        self.forced_interrupt_table.set(Some(ptr));
    }

    /// Snapshot of every call so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<CpuCall> {
        self.calls.borrow().clone()
    }

    /// Drain the recorded calls.
    pub fn take_calls(&self) -> Vec<CpuCall> {
        self.calls.take()
    }

    /// Number of recorded calls matching `pred`.
    #[must_use]
    pub fn count(&self, pred: impl Fn(&CpuCall) -> bool) -> usize {
        self.calls.borrow().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: CpuCall) {
        self.calls.borrow_mut().push(call);
    }
}

impl Cpu for RecordingCpu {
    unsafe fn load_segment_table(&self, ptr: &DescriptorTablePointer, code: u16, data: u16) {
        self.record(CpuCall::LoadSegmentTable {
            ptr: *ptr,
            code,
            data,
        });
        self.segments.set(ActiveSegments { code, data });
    }

    fn read_active_segment(&self) -> ActiveSegments {
        self.forced_segments.get().unwrap_or_else(|| self.segments.get())
    }

    unsafe fn load_interrupt_table(&self, ptr: &DescriptorTablePointer) {
        self.record(CpuCall::LoadInterruptTable(*ptr));
        self.interrupt_table.set(*ptr);
    }

    fn read_interrupt_table(&self) -> DescriptorTablePointer {
        self.forced_interrupt_table
            .get()
            .unwrap_or_else(|| self.interrupt_table.get())
    }

    fn invalidate_page(&self, va: VirtualAddress) {
        self.record(CpuCall::InvalidatePage(va));
    }

    fn flush_cache_line(&self, va: VirtualAddress) {
        self.record(CpuCall::FlushCacheLine(va));
    }

    fn memory_fence(&self) {
        self.record(CpuCall::MemoryFence);
    }

    fn fault_address(&self) -> VirtualAddress {
        self.cr2.get()
    }

    fn page_table_root(&self) -> Cr3 {
        self.cr3.get()
    }
}
