// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Intel TDX specific definitions.

use bitfield_struct::bitfield;
use open_enum::open_enum;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;

open_enum! {
    /// TDCALL instruction leafs that are passed into the tdcall instruction
    /// in eax.
    pub enum TdCallLeaf: u64 {
        VP_VMCALL = 0,
    }
}

open_enum! {
    /// Result code for `tdcall` to the TDX module, returned in RAX.
    #[derive(IntoBytes, Immutable, KnownLayout, FromBytes)]
    pub enum TdCallResultCode: u32 {
        SUCCESS = 0x00000000,
        NON_RECOVERABLE_VCPU = 0x40000001,
        NON_RECOVERABLE_TD = 0x60000002,
        INTERRUPTED_RESUMABLE = 0x80000003,
        INTERRUPTED_RESTARTABLE = 0x80000004,
        OPERAND_INVALID = 0xC0000100,
        OPERAND_BUSY = 0x80000200,
    }
}

impl TdCallResultCode {
    const fn from_bits(value: u64) -> Self {
        Self(value as u32)
    }

    const fn into_bits(self) -> u64 {
        self.0 as u64
    }
}

/// The result returned by a tdcall instruction in rax.
#[bitfield(u64)]
pub struct TdCallResult {
    pub details: u32,
    #[bits(32)]
    pub code: TdCallResultCode,
}

/// RCX input to TDG.VP.VMCALL: the general purpose registers whose values are
/// passed through to the VMM. Bit positions follow the x86 register encoding.
///
/// RAX, RCX and RSP are consumed by the TDX module and must stay clear; RBP
/// may be exposed but guests avoid it.
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct TdVmcallExposedRegisters {
    pub rax: bool,
    pub rcx: bool,
    pub rdx: bool,
    pub rbx: bool,
    pub rsp: bool,
    pub rbp: bool,
    pub rsi: bool,
    pub rdi: bool,
    pub r8: bool,
    pub r9: bool,
    pub r10: bool,
    pub r11: bool,
    pub r12: bool,
    pub r13: bool,
    pub r14: bool,
    pub r15: bool,
    #[bits(48)]
    _reserved: u64,
}

impl TdVmcallExposedRegisters {
    /// Every register a guest may hand to the VMM: RBX, RDX, RSI, RDI and
    /// R8-R15.
    pub const GUEST_VISIBLE: Self = Self::new()
        .with_rdx(true)
        .with_rbx(true)
        .with_rsi(true)
        .with_rdi(true)
        .with_r8(true)
        .with_r9(true)
        .with_r10(true)
        .with_r11(true)
        .with_r12(true)
        .with_r13(true)
        .with_r14(true)
        .with_r15(true);
}
