// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The low bandwidth call shapes.
//!
//! Each shape mirrors a fixed register assignment: `rax` magic and result,
//! `rbx` `in1`/`out1`, `rcx` command and `out2`, `rdx` `in3`/`out3`, `rsi`
//! `in4`/`out4`, `rdi` `in5`/`out5`. Inputs a shape does not take are zero.
//! Output registers are truncated to 32 bits when copied to their slot.

use crate::Backdoor;
use crate::platform::BackdoorIo;
use crate::platform::BackdoorRegisters;
use crate::select::Transport;
use crate::tdx::BackdoorInputs;
use crate::tdx::BackdoorOutputs;
use crate::tdx::tdx_hypercall;
use tdcall::TdVmcall;
use x86defs::vmware::BackdoorCommand;

/// Writes the low 32 bits of `value` to `slot`, if there is one.
pub(crate) fn store(slot: Option<&mut u32>, value: u64) {
    if let Some(slot) = slot {
        *slot = value as u32;
    }
}

impl<T: BackdoorIo + TdVmcall> Backdoor<T> {
    fn call(
        &mut self,
        cmd: BackdoorCommand,
        inputs: BackdoorInputs,
        outputs: BackdoorOutputs<'_>,
    ) -> u64 {
        let instruction = match self.transport {
            Transport::Instruction(instruction) => instruction,
            Transport::Tdx => return tdx_hypercall(&mut self.io, cmd, inputs, outputs),
        };

        let mut regs =
            BackdoorRegisters::load(cmd, inputs.in1, inputs.in3, inputs.in4, inputs.in5);
        instruction.issue(&mut self.io, &mut regs);
        outputs.store_direct(&regs);
        regs.rax
    }

    /// Issues `cmd` with one input and no outputs besides the result.
    pub fn hypercall1(&mut self, cmd: BackdoorCommand, in1: u64) -> u64 {
        self.call(
            cmd,
            BackdoorInputs {
                in1,
                ..Default::default()
            },
            BackdoorOutputs::default(),
        )
    }

    /// Issues `cmd` with one input, returning `rbx` and `rcx` through the
    /// slots.
    pub fn hypercall3(
        &mut self,
        cmd: BackdoorCommand,
        in1: u64,
        out1: Option<&mut u32>,
        out2: Option<&mut u32>,
    ) -> u64 {
        self.call(
            cmd,
            BackdoorInputs {
                in1,
                ..Default::default()
            },
            BackdoorOutputs {
                out1,
                out2,
                ..Default::default()
            },
        )
    }

    /// Issues `cmd` with one input, returning `rbx`, `rcx` and `rdx` through
    /// the slots.
    pub fn hypercall4(
        &mut self,
        cmd: BackdoorCommand,
        in1: u64,
        out1: Option<&mut u32>,
        out2: Option<&mut u32>,
        out3: Option<&mut u32>,
    ) -> u64 {
        self.call(
            cmd,
            BackdoorInputs {
                in1,
                ..Default::default()
            },
            BackdoorOutputs {
                out1,
                out2,
                out3,
                ..Default::default()
            },
        )
    }

    /// Issues `cmd` with four inputs, returning `rcx` through the slot.
    pub fn hypercall5(
        &mut self,
        cmd: BackdoorCommand,
        in1: u64,
        in3: u64,
        in4: u64,
        in5: u64,
        out2: Option<&mut u32>,
    ) -> u64 {
        self.call(
            cmd,
            BackdoorInputs {
                in1,
                in3,
                in4,
                in5,
                in6: 0,
            },
            BackdoorOutputs {
                out2,
                ..Default::default()
            },
        )
    }

    /// Issues `cmd` with two inputs, returning `rcx`, `rdx`, `rsi` and `rdi`
    /// through the slots.
    #[allow(clippy::too_many_arguments)]
    pub fn hypercall6(
        &mut self,
        cmd: BackdoorCommand,
        in1: u64,
        in3: u64,
        out2: Option<&mut u32>,
        out3: Option<&mut u32>,
        out4: Option<&mut u32>,
        out5: Option<&mut u32>,
    ) -> u64 {
        self.call(
            cmd,
            BackdoorInputs {
                in1,
                in3,
                ..Default::default()
            },
            BackdoorOutputs {
                out2,
                out3,
                out4,
                out5,
                ..Default::default()
            },
        )
    }

    /// Issues `cmd` with four inputs, returning `rbx`, `rcx` and `rdx`
    /// through the slots.
    #[allow(clippy::too_many_arguments)]
    pub fn hypercall7(
        &mut self,
        cmd: BackdoorCommand,
        in1: u64,
        in3: u64,
        in4: u64,
        in5: u64,
        out1: Option<&mut u32>,
        out2: Option<&mut u32>,
        out3: Option<&mut u32>,
    ) -> u64 {
        self.call(
            cmd,
            BackdoorInputs {
                in1,
                in3,
                in4,
                in5,
                in6: 0,
            },
            BackdoorOutputs {
                out1,
                out2,
                out3,
                ..Default::default()
            },
        )
    }
}
