// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Backdoor calls from inside a TDX trust domain.
//!
//! TDG.VP.VMCALL takes its leaf in RAX and the exposed register mask in RCX,
//! and the TDX specification discourages RBP. Those three are remapped to
//! r12, r13 and r14:
//!
//! | direct | TDX | use |
//! |---|---|---|
//! | | r10 | [`TDX_VENDOR_LEAF`] |
//! | | r11 | [`TDX_HCALL_FUNC`] |
//! | rax | r12 | magic in, result out |
//! | rcx | r13 | command in, `out2` out |
//! | rbx | rbx | `in1` / `out1` |
//! | rdx | rdx | `in3` / `out3` |
//! | rsi | rsi | `in4` / `out4` |
//! | rdi | rdi | `in5` / `out5` |
//! | rbp | r14 | `in6` / `out6` |

use crate::low_bandwidth::store;
use crate::platform::BackdoorRegisters;
use tdcall::TdVmcall;
use tdcall::TdxModuleArgs;
use x86defs::vmware::BACKDOOR_MAGIC;
use x86defs::vmware::BackdoorCommand;
use x86defs::vmware::TDX_HCALL_FUNC;
use x86defs::vmware::TDX_VENDOR_LEAF;

/// The inputs of a backdoor call, named by argument position. `in2` only
/// exists for bulk transfers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BackdoorInputs {
    /// First input.
    pub in1: u64,
    /// Third input.
    pub in3: u64,
    /// Fourth input.
    pub in4: u64,
    /// Fifth input.
    pub in5: u64,
    /// Sixth input. Only the TDX path can carry it on a low bandwidth call.
    pub in6: u64,
}

/// Caller-owned output slots. `None` slots are never written.
#[derive(Debug, Default)]
pub struct BackdoorOutputs<'a> {
    /// First output.
    pub out1: Option<&'a mut u32>,
    /// Second output.
    pub out2: Option<&'a mut u32>,
    /// Third output.
    pub out3: Option<&'a mut u32>,
    /// Fourth output.
    pub out4: Option<&'a mut u32>,
    /// Fifth output.
    pub out5: Option<&'a mut u32>,
    /// Sixth output. Only produced by the TDX path.
    pub out6: Option<&'a mut u32>,
}

impl BackdoorOutputs<'_> {
    /// Copies the outputs of a direct call. There is no sixth output register.
    pub(crate) fn store_direct(self, regs: &BackdoorRegisters) {
        store(self.out1, regs.rbx);
        store(self.out2, regs.rcx);
        store(self.out3, regs.rdx);
        store(self.out4, regs.rsi);
        store(self.out5, regs.rdi);
    }

    fn store_tdx(self, args: &TdxModuleArgs) {
        store(self.out1, args.rbx);
        store(self.out2, args.r13);
        store(self.out3, args.rdx);
        store(self.out4, args.rsi);
        store(self.out5, args.rdi);
        store(self.out6, args.r14);
    }
}

/// Issues a backdoor call through TDG.VP.VMCALL and returns the primary
/// result.
///
/// The low bandwidth calls of [`Backdoor`](crate::Backdoor) delegate here
/// when the transport is [`Transport::Tdx`](crate::Transport::Tdx). Calling
/// it outside a trust domain faults.
pub fn tdx_hypercall(
    call: &mut impl TdVmcall,
    cmd: BackdoorCommand,
    inputs: BackdoorInputs,
    outputs: BackdoorOutputs<'_>,
) -> u64 {
    let mut args = TdxModuleArgs {
        r10: TDX_VENDOR_LEAF,
        r11: TDX_HCALL_FUNC,
        r12: BACKDOOR_MAGIC.into(),
        r13: cmd.0.into(),
        rbx: inputs.in1,
        rdx: inputs.in3,
        rsi: inputs.in4,
        rdi: inputs.in5,
        r14: inputs.in6,
        ..Default::default()
    };

    tracing::trace!(?cmd, "backdoor call through tdvmcall");
    tdcall::tdvmcall(call, &mut args);

    outputs.store_tdx(&args);
    args.r12
}
