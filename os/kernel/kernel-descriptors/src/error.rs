use kernel_registers::DescriptorTablePointer;
use thiserror::Error;

/// A descriptor table did not become active as requested.
#[derive(Debug, Error, Copy, Clone, Eq, PartialEq)]
pub enum DescriptorError {
    /// CS/DS read back differently from the selectors passed to `lgdt`.
    #[error(
        "segment registers did not reload: expected CS={expected_code:#06x} DS={expected_data:#06x}, found CS={code:#06x} DS={data:#06x}"
    )]
    SegmentMismatch {
        expected_code: u16,
        expected_data: u16,
        code: u16,
        data: u16,
    },

    /// A selector does not index a present descriptor of the right kind.
    #[error("selector {selector:#06x} does not name a present {kind} descriptor")]
    InvalidSelector { selector: u16, kind: &'static str },

    /// `sidt` reported a different table than the one just loaded.
    #[error("interrupt table did not load: expected {expected:?}, found {actual:?}")]
    InterruptTableMismatch {
        expected: DescriptorTablePointer,
        actual: DescriptorTablePointer,
    },
}
