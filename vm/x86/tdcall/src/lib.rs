// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! TDG.VP.VMCALL plumbing for guests running inside a TDX trust domain.
//!
//! Inside a trust domain the guest cannot execute `vmcall` or trap on port
//! I/O directly. It asks the TDX module to forward a register file to the VMM
//! instead. This crate defines that register file ([`TdxModuleArgs`]) and the
//! [`TdVmcall`] trait through which it is handed to the TDX module. The
//! instruction itself lives with the platform code that implements the trait.

#![no_std]
#![forbid(unsafe_code)]

use static_assertions::const_assert_eq;
use x86defs::tdx::TdCallResult;
use x86defs::tdx::TdCallResultCode;
use x86defs::tdx::TdVmcallExposedRegisters;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;

/// Registers exchanged with the VMM through TDG.VP.VMCALL.
///
/// RAX holds the TDCALL leaf and RBP is not used, so neither appears here.
/// RCX is reserved for the exposed-register mask and is written by the
/// [`TdVmcall`] implementation; callers leave it zero.
///
/// Every field is both an input and an output.
#[repr(C)]
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, IntoBytes, FromBytes, Immutable, KnownLayout,
)]
pub struct TdxModuleArgs {
    /// rcx
    pub rcx: u64,
    /// rdx
    pub rdx: u64,
    /// r8
    pub r8: u64,
    /// r9
    pub r9: u64,
    /// r10
    pub r10: u64,
    /// r11
    pub r11: u64,
    /// r12
    pub r12: u64,
    /// r13
    pub r13: u64,
    /// r14
    pub r14: u64,
    /// r15
    pub r15: u64,
    /// rbx
    pub rbx: u64,
    /// rdi
    pub rdi: u64,
    /// rsi
    pub rsi: u64,
}

const_assert_eq!(size_of::<TdxModuleArgs>(), 13 * 8);

/// Trait to issue TDG.VP.VMCALL, implemented by the platform.
pub trait TdVmcall {
    /// Execute `tdcall` with leaf [`TdCallLeaf::VP_VMCALL`] in RAX,
    /// `exposed` in RCX and the remaining registers loaded from `args`. On
    /// return, `args` holds the registers as the VMM left them and the RAX
    /// status of the TDX module is returned.
    ///
    /// [`TdCallLeaf::VP_VMCALL`]: x86defs::tdx::TdCallLeaf::VP_VMCALL
    fn tdvmcall(
        &mut self,
        exposed: TdVmcallExposedRegisters,
        args: &mut TdxModuleArgs,
    ) -> TdCallResult;
}

impl<T: TdVmcall + ?Sized> TdVmcall for &mut T {
    fn tdvmcall(
        &mut self,
        exposed: TdVmcallExposedRegisters,
        args: &mut TdxModuleArgs,
    ) -> TdCallResult {
        (**self).tdvmcall(exposed, args)
    }
}

/// Hand `args` to the VMM with every guest-visible register exposed.
///
/// The TDX module only fails TDG.VP.VMCALL itself for malformed requests;
/// VMM-level results come back in the argument registers. A failure here
/// therefore means the TDX module is broken, and panics.
pub fn tdvmcall(call: &mut impl TdVmcall, args: &mut TdxModuleArgs) {
    debug_assert_eq!(args.rcx, 0, "rcx is reserved for the exposed register mask");

    #[cfg(feature = "tracing")]
    tracing::trace!(r10 = args.r10, r11 = args.r11, "tdvmcall");

    let result = call.tdvmcall(TdVmcallExposedRegisters::GUEST_VISIBLE, args);

    assert_eq!(
        result.code(),
        TdCallResultCode::SUCCESS,
        "unexpected nonzero rax {:x} returned by tdcall vmcall",
        u64::from(result)
    );
}
