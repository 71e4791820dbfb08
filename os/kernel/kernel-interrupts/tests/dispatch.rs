use kernel_descriptors::{IDT_VECTORS, Idt, KERNEL_CODE_SELECTOR, build_interrupt_table};
use kernel_interrupts::page_fault::page_fault_handler;
use kernel_interrupts::{
    Dispatched, FatalInterrupt, FaultAccess, InterruptFrame, Interrupts, PAGE_FAULT_VECTOR,
};
use kernel_memory_addresses::{PhysicalFrame, VirtualAddress};
use kernel_registers::{Cpu, RecordingCpu};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

fn idt() -> Idt {
    let trampolines: [u64; IDT_VECTORS] = core::array::from_fn(|v| 0x20_0000 + 32 * v as u64);
    build_interrupt_table(&trampolines, KERNEL_CODE_SELECTOR)
}

static KEYBOARD_CALLS: AtomicUsize = AtomicUsize::new(0);
static KEYBOARD_VECTOR: AtomicU64 = AtomicU64::new(0);

fn keyboard(frame: &mut InterruptFrame, _cpu: &dyn Cpu) -> Result<(), FatalInterrupt> {
    KEYBOARD_CALLS.fetch_add(1, Ordering::SeqCst);
    KEYBOARD_VECTOR.store(frame.interrupt, Ordering::SeqCst);
    Ok(())
}

#[test]
fn registered_handler_runs_once_with_its_vector() {
    let idt = idt();
    let cpu = RecordingCpu::new();
    let mut interrupts = Interrupts::new(&idt);
    idt.disable_gate(0x21);

    assert!(interrupts.register_handler(0x21, keyboard).is_none());
    assert!(idt.is_gate_enabled(0x21));

    let mut frame = InterruptFrame::for_vector(0x21, 0);
    assert_eq!(interrupts.dispatch(&mut frame, &cpu), Ok(Dispatched::Handled));

    assert_eq!(KEYBOARD_CALLS.load(Ordering::SeqCst), 1);
    assert_eq!(KEYBOARD_VECTOR.load(Ordering::SeqCst), 0x21);
}

#[test]
fn every_unregistered_vector_reaches_the_fallback() {
    let idt = idt();
    let cpu = RecordingCpu::new();
    let interrupts = Interrupts::new(&idt);

    for vector in 0..=u8::MAX {
        let mut frame = InterruptFrame::for_vector(vector, 0x18);
        let outcome = interrupts.dispatch(&mut frame, &cpu);

        if vector < 32 {
            assert!(
                matches!(outcome, Err(FatalInterrupt::Exception { vector: v, error_code: 0x18, .. }) if v == vector),
                "vector {vector}: {outcome:?}"
            );
        } else {
            assert_eq!(outcome, Ok(Dispatched::Unhandled), "vector {vector}");
        }
    }
}

#[test]
fn general_protection_fault_is_named() {
    let idt = idt();
    let interrupts = Interrupts::new(&idt);
    let mut frame = InterruptFrame::for_vector(13, 0);

    let err = interrupts.dispatch(&mut frame, &RecordingCpu::new()).unwrap_err();

    assert_eq!(
        err.to_string(),
        "unhandled exception 13: General Protection Fault (error code 0x0)"
    );
}

fn bump_rax(frame: &mut InterruptFrame, _cpu: &dyn Cpu) -> Result<(), FatalInterrupt> {
    frame.rax += 1;
    Ok(())
}

#[test]
fn handler_edits_are_visible_to_the_trampoline() {
    let idt = idt();
    let mut interrupts = Interrupts::new(&idt);
    interrupts.register_handler(0x30, bump_rax);

    let mut frame = InterruptFrame::for_vector(0x30, 0);
    frame.rax = 41;
    interrupts.dispatch(&mut frame, &RecordingCpu::new()).unwrap();

    assert_eq!(frame.rax, 42);
}

fn swallow(_frame: &mut InterruptFrame, _cpu: &dyn Cpu) -> Result<(), FatalInterrupt> {
    Ok(())
}

#[test]
fn handlers_can_silence_exceptions() {
    let idt = idt();
    let mut interrupts = Interrupts::new(&idt);
    interrupts.register_handler(3, swallow);

    let mut frame = InterruptFrame::for_vector(3, 0);
    assert_eq!(
        interrupts.dispatch(&mut frame, &RecordingCpu::new()),
        Ok(Dispatched::Handled)
    );
}

#[test]
fn unregister_restores_the_fallback_and_masks_the_gate() {
    let idt = idt();
    let cpu = RecordingCpu::new();
    let mut interrupts = Interrupts::new(&idt);
    interrupts.register_handler(0x40, swallow);

    let previous = interrupts.register_handler(0x40, bump_rax);
    assert!(previous.is_some());

    assert!(interrupts.unregister_handler(0x40).is_some());
    assert!(!idt.is_gate_enabled(0x40));
    assert!(interrupts.handler(0x40).is_none());

    let mut frame = InterruptFrame::for_vector(0x40, 0);
    assert_eq!(interrupts.dispatch(&mut frame, &cpu), Ok(Dispatched::Unhandled));
    assert_eq!(frame.rax, 0);
}

#[test]
fn page_fault_handler_reports_cr2_and_cr3() {
    let idt = idt();
    let cpu = RecordingCpu::with_page_table_root(PhysicalFrame::from_number(0x1234));
    cpu.set_fault_address(VirtualAddress::new(0xFFFF_8000_0040_0010));
    let mut interrupts = Interrupts::new(&idt);
    interrupts.register_handler(PAGE_FAULT_VECTOR, page_fault_handler);

    let mut frame = InterruptFrame::for_vector(PAGE_FAULT_VECTOR, 0);
    let err = interrupts.dispatch(&mut frame, &cpu).unwrap_err();

    let FatalInterrupt::PageFault {
        address,
        root,
        access,
        ..
    } = err
    else {
        panic!("expected a page fault, got {err:?}");
    };
    assert_eq!(address.as_u64(), 0xFFFF_8000_0040_0010);
    assert_eq!(root.as_u64(), 0x123_4000);
    assert_eq!(access, FaultAccess::Read);
}

#[test]
fn out_of_range_vector_is_corrupt() {
    let idt = idt();
    let interrupts = Interrupts::new(&idt);
    let mut frame = InterruptFrame {
        interrupt: 0x1_00,
        ..InterruptFrame::default()
    };

    assert_eq!(
        interrupts.dispatch(&mut frame, &RecordingCpu::new()),
        Err(FatalInterrupt::CorruptFrame { interrupt: 0x100 })
    );
}
