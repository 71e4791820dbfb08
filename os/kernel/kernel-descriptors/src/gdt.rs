//! # Global Descriptor Table
//!
//! Long mode still needs a GDT for CS/SS, even though segmentation is
//! otherwise flat. This one holds exactly three slots:
//!
//! | Slot | Selector | Descriptor |
//! |------|----------|------------|
//! | 0    | `0x00`   | null |
//! | 1    | `0x08`   | ring-0 64-bit code (`0x9A`, flags `0xA`) |
//! | 2    | `0x10`   | ring-0 data (`0x92`, flags `0x8`) |

pub mod descriptors;
pub mod selectors;

use crate::DescriptorError;
pub use descriptors::SegmentDescriptor;
use kernel_registers::{ActiveSegments, Cpu, DescriptorTablePointer};
use selectors::{CodeSelector, DataSelector};

/// Number of descriptors in [`Gdt`].
pub const GDT_ENTRIES: usize = 3;

#[repr(C, align(16))]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Gdt {
    entries: [SegmentDescriptor; GDT_ENTRIES],
}

const _: () = {
    assert!(size_of::<Gdt>() == GDT_ENTRIES * 8 + 8);
    assert!(align_of::<Gdt>() == 16);
};

impl Gdt {
    /// Descriptor at `index`, or the null descriptor when out of range.
    #[must_use]
    pub const fn descriptor(&self, index: usize) -> SegmentDescriptor {
        if index < GDT_ENTRIES {
            self.entries[index]
        } else {
            SegmentDescriptor::NULL
        }
    }

    #[must_use]
    pub const fn entries(&self) -> &[SegmentDescriptor; GDT_ENTRIES] {
        &self.entries
    }

    /// `lgdt` operand. The limit covers the descriptors only, not the
    /// alignment padding.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn pointer(&self) -> DescriptorTablePointer {
        DescriptorTablePointer {
            limit: (GDT_ENTRIES * size_of::<SegmentDescriptor>() - 1) as u16,
            base: core::ptr::from_ref(&self.entries).addr() as u64,
        }
    }
}

/// Null, kernel code, kernel data.
#[must_use]
pub const fn build_segment_table() -> Gdt {
    Gdt {
        entries: [
            SegmentDescriptor::NULL,
            SegmentDescriptor::kernel_code(),
            SegmentDescriptor::kernel_data(),
        ],
    }
}

/// Activate `gdt`, reload every segment register and check that CS and DS
/// now hold `code` and `data`.
///
/// # Errors
/// * [`DescriptorError::InvalidSelector`] if a selector does not index a
///   present descriptor of its kind. Nothing is loaded in that case.
/// * [`DescriptorError::SegmentMismatch`] if the readback differs.
pub fn load_segment_table<C: Cpu + ?Sized>(
    cpu: &C,
    gdt: &'static Gdt,
    code: CodeSelector,
    data: DataSelector,
) -> Result<(), DescriptorError> {
    if !gdt.descriptor(code.index()).is_code() {
        return Err(DescriptorError::InvalidSelector {
            selector: code.encode(),
            kind: "code",
        });
    }
    if !gdt.descriptor(data.index()).is_data() {
        return Err(DescriptorError::InvalidSelector {
            selector: data.encode(),
            kind: "data",
        });
    }

    let ptr = gdt.pointer();
    log::debug!("Loading GDT {ptr:?}, CS={:#06x} DS={:#06x}", code.encode(), data.encode());

    // SAFETY: the table is 'static and both selectors were checked above.
    unsafe { cpu.load_segment_table(&ptr, code.encode(), data.encode()) };

    let ActiveSegments {
        code: active_code,
        data: active_data,
    } = cpu.read_active_segment();
    if active_code != code.encode() || active_data != data.encode() {
        return Err(DescriptorError::SegmentMismatch {
            expected_code: code.encode(),
            expected_data: data.encode(),
            code: active_code,
            data: active_data,
        });
    }

    Ok(())
}
