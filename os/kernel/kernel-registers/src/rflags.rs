use bitfield_struct::bitfield;

/// RFLAGS as seen in 64-bit mode.
///
/// Bit 1 always reads as one. VM (bit 17) is always zero in long mode.
#[bitfield(u64)]
pub struct Rflags {
    pub cf_carry: bool,

    #[bits(default = true)]
    _always1: bool,

    pub pf_parity: bool,

    #[bits(default = false)]
    _rsvd3: bool,

    pub af_adjust: bool,

    #[bits(default = false)]
    _rsvd5: bool,

    pub zf_zero: bool,
    pub sf_sign: bool,
    pub tf_trap: bool,

    /// Bit 9: maskable hardware interrupts are delivered when set.
    pub if_interrupt_enable: bool,

    pub df_direction: bool,
    pub of_overflow: bool,

    #[bits(2)]
    pub iopl: u8,

    pub nt_nested: bool,

    #[bits(default = false)]
    _rsvd15: bool,

    pub rf_resume: bool,

    #[bits(default = false)]
    _vm: bool,

    pub ac_alignment_check: bool,
    pub vif_virtual_interrupt: bool,
    pub vip_virtual_interrupt_pending: bool,
    pub id_cpuid: bool,

    #[bits(42, default = 0)]
    _reserved_rest: u64,
}

#[cfg(all(feature = "asm", target_arch = "x86_64"))]
impl crate::LoadRegister for Rflags {
    fn load() -> Self {
        let bits: u64;
        unsafe {
            core::arch::asm!("pushfq", "pop {}", out(reg) bits, options(preserves_flags));
        }
        Self::from_bits(bits)
    }
}
