//! Privilege rings as they appear in descriptors (DPL) and selectors (RPL).
//!
//! Only ring 0 is used by this kernel, but both fields are two bits wide and
//! every value must decode.

/// A 2-bit privilege level.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
#[repr(u8)]
pub enum PrivilegeLevel {
    /// Kernel.
    #[default]
    Ring0 = 0,
    Ring1 = 1,
    Ring2 = 2,
    /// User mode.
    Ring3 = 3,
}

impl PrivilegeLevel {
    #[inline]
    #[must_use]
    pub const fn into_bits(self) -> u8 {
        self as u8
    }

    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Self::Ring0,
            1 => Self::Ring1,
            2 => Self::Ring2,
            _ => Self::Ring3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_ignores_upper_bits() {
        assert_eq!(PrivilegeLevel::from_bits(0b111), PrivilegeLevel::Ring3);
        assert_eq!(PrivilegeLevel::from_bits(0b100), PrivilegeLevel::Ring0);
        assert_eq!(PrivilegeLevel::Ring2.into_bits(), 2);
    }
}
