use core::fmt;

/// Operand of `lgdt`/`lidt` and result of `sgdt`/`sidt`.
///
/// Ten bytes: a 16-bit limit (table size minus one) immediately followed by
/// the 64-bit linear base, with no padding.
#[repr(C, packed)]
#[derive(Copy, Clone, Default, Eq, PartialEq)]
pub struct DescriptorTablePointer {
    pub limit: u16,
    pub base: u64,
}

const _: () = {
    assert!(size_of::<DescriptorTablePointer>() == 10);
};

impl DescriptorTablePointer {
    /// Pointer covering `table`, with `limit = size_of::<T>() - 1`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn for_table<T>(table: &T) -> Self {
        Self {
            limit: (size_of::<T>() - 1) as u16,
            base: core::ptr::from_ref(table).addr() as u64,
        }
    }
}

impl fmt::Debug for DescriptorTablePointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (limit, base) = (self.limit, self.base);
        write!(f, "DescriptorTablePointer {{ limit: 0x{limit:04X}, base: 0x{base:016X} }}")
    }
}

/// Code and data selectors currently held by CS and DS.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ActiveSegments {
    pub code: u16,
    pub data: u16,
}
