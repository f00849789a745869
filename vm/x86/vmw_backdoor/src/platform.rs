// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The instructions that reach the hypervisor, as a trait.

use x86defs::vmware::BACKDOOR_MAGIC;
use x86defs::vmware::BACKDOOR_PORT_HB;
use x86defs::vmware::BackdoorCommand;

/// Register file of a low bandwidth backdoor call.
///
/// Every register is both an input and an output; the hypervisor may change
/// any of them.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BackdoorRegisters {
    /// Magic on input, primary result on output.
    pub rax: u64,
    /// `in1` / `out1`.
    pub rbx: u64,
    /// Command on input, `out2` on output.
    pub rcx: u64,
    /// `in3` / `out3`. The low word is the port or the DX flags.
    pub rdx: u64,
    /// `in4` / `out4`.
    pub rsi: u64,
    /// `in5` / `out5`.
    pub rdi: u64,
}

impl BackdoorRegisters {
    pub(crate) fn load(cmd: BackdoorCommand, in1: u64, in3: u64, in4: u64, in5: u64) -> Self {
        Self {
            rax: BACKDOOR_MAGIC.into(),
            rbx: in1,
            rcx: cmd.0.into(),
            rdx: in3,
            rsi: in4,
            rdi: in5,
        }
    }
}

/// Register file of a high bandwidth transfer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BulkRegisters {
    /// Magic on input, primary result on output.
    pub rax: u64,
    /// Command on input, `out1` on output.
    pub rbx: u64,
    /// Byte count.
    pub rcx: u64,
    /// [`BACKDOOR_PORT_HB`] in the low word, `in3` above it.
    pub rdx: u64,
    /// Source address for `rep outsb`.
    pub rsi: u64,
    /// Destination address for `rep insb`.
    pub rdi: u64,
    /// `in6`. Loaded into RBP for the duration of the string instruction
    /// only; the caller's RBP is restored before returning.
    pub rbp: u64,
}

impl BulkRegisters {
    pub(crate) fn load(
        cmd: BackdoorCommand,
        in2: u64,
        in3: u64,
        in4: u64,
        in5: u64,
        in6: u64,
    ) -> Self {
        Self {
            rax: BACKDOOR_MAGIC.into(),
            rbx: cmd.0.into(),
            rcx: in2,
            rdx: in3 | u64::from(BACKDOOR_PORT_HB),
            rsi: in4,
            rdi: in5,
            rbp: in6,
        }
    }
}

/// The trapping instructions of the backdoor interface.
///
/// Implementations execute exactly one instruction (or one repeated string
/// instruction) with the given register file and write the resulting
/// registers back. They must act as a full compiler barrier, since the
/// hypervisor may access guest memory while handling the call, and they must
/// not disturb any register outside the register file.
pub trait BackdoorIo {
    /// `in eax, dx`. The low word of `rdx` already holds the port.
    fn port_in(&mut self, regs: &mut BackdoorRegisters);

    /// `vmcall`.
    fn vmcall(&mut self, regs: &mut BackdoorRegisters);

    /// `vmmcall`.
    fn vmmcall(&mut self, regs: &mut BackdoorRegisters);

    /// `rep outsb`, with RBP holding `regs.rbp` for the duration.
    ///
    /// # Safety
    /// `regs.rsi` must point to `regs.rcx` bytes that are readable for the
    /// duration of the call.
    unsafe fn rep_outsb(&mut self, regs: &mut BulkRegisters);

    /// `rep insb`, with RBP holding `regs.rbp` for the duration.
    ///
    /// # Safety
    /// `regs.rdi` must point to `regs.rcx` bytes that are writable and not
    /// otherwise borrowed for the duration of the call.
    unsafe fn rep_insb(&mut self, regs: &mut BulkRegisters);
}

impl<T: BackdoorIo + ?Sized> BackdoorIo for &mut T {
    fn port_in(&mut self, regs: &mut BackdoorRegisters) {
        (**self).port_in(regs)
    }

    fn vmcall(&mut self, regs: &mut BackdoorRegisters) {
        (**self).vmcall(regs)
    }

    fn vmmcall(&mut self, regs: &mut BackdoorRegisters) {
        (**self).vmmcall(regs)
    }

    unsafe fn rep_outsb(&mut self, regs: &mut BulkRegisters) {
        // SAFETY: forwarded from the caller.
        unsafe { (**self).rep_outsb(regs) }
    }

    unsafe fn rep_insb(&mut self, regs: &mut BulkRegisters) {
        // SAFETY: forwarded from the caller.
        unsafe { (**self).rep_insb(regs) }
    }
}
