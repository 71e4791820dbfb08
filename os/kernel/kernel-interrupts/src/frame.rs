use core::fmt;

/// Register state saved by a trampoline, lowest address first.
///
/// The trampoline pushes the general-purpose registers and DS on top of the
/// vector number and error code; everything from `rip` upward is the frame
/// the CPU pushed itself, and `iretq` pops it on the way out.
///
/// ```text
///  rsp -> ds
///         r15 .. r8
///         rbp rdi rsi rdx rcx rbx rax
///         interrupt error_code       (trampoline)
///         rip cs rflags rsp ss       (CPU)
/// ```
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct InterruptFrame {
    pub ds: u64,
    pub r15: u64,
    pub r14: u64,
    pub r13: u64,
    pub r12: u64,
    pub r11: u64,
    pub r10: u64,
    pub r9: u64,
    pub r8: u64,
    pub rbp: u64,
    pub rdi: u64,
    pub rsi: u64,
    pub rdx: u64,
    pub rcx: u64,
    pub rbx: u64,
    pub rax: u64,
    pub interrupt: u64,
    pub error_code: u64,
    pub rip: u64,
    pub cs: u64,
    pub rflags: u64,
    pub rsp: u64,
    pub ss: u64,
}

const _: () = {
    assert!(size_of::<InterruptFrame>() == 23 * 8);
    assert!(core::mem::offset_of!(InterruptFrame, interrupt) == 16 * 8);
    assert!(core::mem::offset_of!(InterruptFrame, rip) == 18 * 8);
};

impl InterruptFrame {
    /// A frame as it would arrive for `vector` with `error_code`.
    #[must_use]
    pub fn for_vector(vector: u8, error_code: u64) -> Self {
        Self {
            interrupt: u64::from(vector),
            error_code,
            ..Self::default()
        }
    }
}

/// Multi-line register dump.
impl fmt::Display for InterruptFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "  rax={:016x}  rbx={:016x}  rcx={:016x}  rdx={:016x}",
            self.rax, self.rbx, self.rcx, self.rdx
        )?;
        writeln!(
            f,
            "  rsi={:016x}  rdi={:016x}  rbp={:016x}  rsp={:016x}",
            self.rsi, self.rdi, self.rbp, self.rsp
        )?;
        writeln!(
            f,
            "  r8 ={:016x}  r9 ={:016x}  r10={:016x}  r11={:016x}",
            self.r8, self.r9, self.r10, self.r11
        )?;
        writeln!(
            f,
            "  r12={:016x}  r13={:016x}  r14={:016x}  r15={:016x}",
            self.r12, self.r13, self.r14, self.r15
        )?;
        writeln!(
            f,
            "  rip={:016x}  rflags={:016x}  cs={:x}  ds={:x}  ss={:x}",
            self.rip, self.rflags, self.cs, self.ds, self.ss
        )?;
        write!(
            f,
            "  interrupt={:x}  error_code={:x}",
            self.interrupt, self.error_code
        )
    }
}
