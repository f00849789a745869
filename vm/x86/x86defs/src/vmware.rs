// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! VMware backdoor (hypervisor port) protocol definitions.
//!
//! A backdoor call places [`BACKDOOR_MAGIC`] in EAX and a
//! [`BackdoorCommand`] in ECX, then traps to the hypervisor either through an
//! `in` from [`BACKDOOR_PORT`] or through `vmcall`/`vmmcall`. The low word of
//! EDX selects bandwidth and direction: the port interface encodes them in
//! the port number and the IN/OUT instruction, while the instruction interface
//! reads the [`BackdoorDxFlags`] directly. The high word of EDX carries
//! caller data in both cases.

use bitfield_struct::bitfield;
use open_enum::open_enum;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;

/// "VMXh". Present in EAX on every call, and echoed back in EBX by
/// [`BackdoorCommand::GET_VERSION`].
pub const BACKDOOR_MAGIC: u32 = 0x564D5868;

/// The low bandwidth I/O port.
pub const BACKDOOR_PORT: u16 = 0x5658;

/// The high bandwidth I/O port.
pub const BACKDOOR_PORT_HB: u16 =
    BACKDOOR_PORT | BackdoorDxFlags::new().with_high_bandwidth(true).into_bits();

/// Low word of EDX for the instruction based interface.
#[bitfield(u16)]
#[derive(PartialEq, Eq)]
pub struct BackdoorDxFlags {
    /// Bulk transfer through a string instruction.
    pub high_bandwidth: bool,
    /// Guest to host transfer.
    pub out: bool,
    #[bits(14)]
    _reserved: u16,
}

open_enum! {
    /// Backdoor command codes, passed in ECX.
    #[derive(IntoBytes, FromBytes, Immutable, KnownLayout)]
    pub enum BackdoorCommand: u32 {
        GET_VERSION = 10,
        GET_HZ = 45,
        GET_VCPU_INFO = 68,
        STEAL_CLOCK = 91,
    }
}

open_enum! {
    /// How a guest reaches the backdoor. Fixed for the lifetime of the guest
    /// once chosen at boot.
    ///
    /// The instruction values match [`VmwareFeaturesEcx`] bit for bit, so
    /// the raw feature bits can be stored directly. A value with both bits set
    /// is treated as [`Self::VMCALL`].
    ///
    /// [`VmwareFeaturesEcx`]: crate::cpuid::VmwareFeaturesEcx
    #[derive(IntoBytes, FromBytes, Immutable, KnownLayout)]
    pub enum HypercallMode: u8 {
        /// `in eax, dx` from [`BACKDOOR_PORT`].
        IO_PORT = 0,
        /// AMD `vmmcall`.
        VMMCALL = 1,
        /// Intel `vmcall`.
        VMCALL = 2,
        /// TDG.VP.VMCALL through the TDX module.
        TDX = 0x80,
    }
}

/// TDG.VP.VMCALL R10 value identifying the VMware vendor-specific call.
pub const TDX_VENDOR_LEAF: u64 = 0x1AF7E4909;

/// TDG.VP.VMCALL R11 value selecting the backdoor hypercall function.
pub const TDX_HCALL_FUNC: u64 = 1;
