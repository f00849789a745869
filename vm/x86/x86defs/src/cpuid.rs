// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! CPUID leaves and register layouts used to discover the hypervisor.

use bitfield_struct::bitfield;
use open_enum::open_enum;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;

open_enum! {
    #[derive(IntoBytes, FromBytes, Immutable, KnownLayout)]
    pub enum CpuidFunction: u32 {
        VENDOR_AND_MAX_FUNCTION = 0x00000000,
        VERSION_AND_FEATURES = 0x00000001,
        /// Intel TDX guest identification.
        TDX_IDENTITY = 0x00000021,
        /// Hypervisor vendor signature and maximum hypervisor leaf.
        HYPERVISOR_VENDOR = 0x40000000,
        /// VMware-specific feature flags.
        VMWARE_FEATURES = 0x40000010,
    }
}

/// A 12 byte vendor signature spread across three CPUID output registers.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct Signature(pub [u8; 12]);

impl Signature {
    /// Reported by [`CpuidFunction::HYPERVISOR_VENDOR`] under VMware.
    pub const VMWARE: Self = Self(*b"VMwareVMware");
    /// Reported by [`CpuidFunction::TDX_IDENTITY`] inside a trust domain.
    pub const INTEL_TDX: Self = Self(*b"IntelTDX    ");

    /// The register order used by the hypervisor vendor leaf.
    pub fn from_ebx_ecx_edx(ebx: u32, ecx: u32, edx: u32) -> Self {
        Self::from_words([ebx, ecx, edx])
    }

    /// The register order used by the basic vendor leaf and the TDX identity
    /// leaf.
    pub fn from_ebx_edx_ecx(ebx: u32, edx: u32, ecx: u32) -> Self {
        Self::from_words([ebx, edx, ecx])
    }

    fn from_words(words: [u32; 3]) -> Self {
        let mut signature = [0; 12];
        for (chunk, word) in signature.chunks_exact_mut(4).zip(words) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        Self(signature)
    }
}

#[bitfield(u32)]
pub struct VersionAndFeaturesEcx {
    pub sse3: bool,
    pub pclmulqdq: bool,
    pub dtes64: bool,
    pub monitor: bool,
    pub cpl_ds: bool,
    pub vmx: bool,
    pub smx: bool,
    pub est: bool,
    pub tm2: bool,
    pub ssse3: bool,
    pub cnxt_id: bool,
    pub seg_limit64_bit: bool,
    pub fma: bool,
    pub cx16: bool,
    pub xtpr: bool,
    pub pdcm: bool,
    _reserved1: bool,
    pub pcid: bool,
    pub dca: bool,
    pub sse4_1: bool,
    pub sse4_2: bool,
    pub x2_apic: bool,
    pub movbe: bool,
    pub pop_cnt: bool,
    pub tsc_deadline_tmr: bool,
    pub aes: bool,
    pub xsave: bool,
    pub os_xsave: bool,
    pub avx: bool,
    pub f16c: bool,
    pub rd_rand: bool,
    pub hypervisor_present: bool,
}

#[bitfield(u32)]
pub struct HypervisorVendorEax {
    /// The highest hypervisor leaf implemented.
    pub max_function: u32,
}

/// ECX of [`CpuidFunction::VMWARE_FEATURES`].
///
/// The two instruction bits double as the values of
/// [`HypercallMode`](crate::vmware::HypercallMode).
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct VmwareFeaturesEcx {
    /// AMD `vmmcall` reaches the backdoor.
    pub vmmcall: bool,
    /// Intel `vmcall` reaches the backdoor.
    pub vmcall: bool,
    #[bits(30)]
    _reserved: u32,
}

impl VmwareFeaturesEcx {
    /// Only the bits that select a hypercall instruction.
    pub const INSTRUCTION_MASK: u32 = Self::new().with_vmmcall(true).with_vmcall(true).into_bits();
}
