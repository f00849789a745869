// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Choosing how low bandwidth calls reach the hypervisor.

use crate::platform::BackdoorIo;
use crate::platform::BackdoorRegisters;
use x86defs::vmware::BACKDOOR_PORT;
use x86defs::vmware::HypercallMode;

/// The instruction a low bandwidth call traps with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackdoorInstruction {
    /// `in eax, dx` from the backdoor port.
    PortIn,
    /// `vmmcall`.
    Vmmcall,
    /// `vmcall`.
    Vmcall,
}

impl BackdoorInstruction {
    /// Picks the instruction for `mode`.
    ///
    /// The mode byte is compared as a signed value: zero and every byte with
    /// the top bit set use the port, [`HypercallMode::VMMCALL`] uses
    /// `vmmcall`, and everything else uses `vmcall`. A mode with both feature
    /// bits set therefore prefers `vmcall`.
    pub const fn select(mode: HypercallMode) -> Self {
        let mode = mode.0 as i8;
        let vmmcall = HypercallMode::VMMCALL.0 as i8;
        if mode < vmmcall {
            Self::PortIn
        } else if mode == vmmcall {
            Self::Vmmcall
        } else {
            Self::Vmcall
        }
    }

    /// Traps to the hypervisor with `regs`.
    pub(crate) fn issue(self, io: &mut impl BackdoorIo, regs: &mut BackdoorRegisters) {
        match self {
            Self::PortIn => {
                // The port replaces the DX flags; the high word is caller data.
                regs.rdx = (regs.rdx & !0xffff) | u64::from(BACKDOOR_PORT);
                io.port_in(regs)
            }
            Self::Vmmcall => io.vmmcall(regs),
            Self::Vmcall => io.vmcall(regs),
        }
    }
}

/// How a [`Backdoor`](crate::Backdoor) reaches the hypervisor, resolved once
/// from the [`HypercallMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// Trap directly with an instruction.
    Instruction(BackdoorInstruction),
    /// Forward through the TDX module. The instruction selector is never
    /// consulted.
    Tdx,
}

impl Transport {
    /// Resolves the transport for `mode`.
    pub const fn resolve(mode: HypercallMode) -> Self {
        if mode.0 == HypercallMode::TDX.0 {
            Self::Tdx
        } else {
            Self::Instruction(BackdoorInstruction::select(mode))
        }
    }
}
