// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Boot-time discovery of the hypercall mode.

use crate::mode::ModeError;
use crate::mode::ModeRegistry;
use x86defs::cpuid::CpuidFunction;
use x86defs::cpuid::HypervisorVendorEax;
use x86defs::cpuid::Signature;
use x86defs::cpuid::VersionAndFeaturesEcx;
use x86defs::cpuid::VmwareFeaturesEcx;
use x86defs::vmware::HypercallMode;

/// Source of CPUID results.
pub trait CpuidQuery {
    /// Returns `[eax, ebx, ecx, edx]` for `leaf` and `subleaf`.
    fn cpuid(&self, leaf: u32, subleaf: u32) -> [u32; 4];
}

impl<T: CpuidQuery + ?Sized> CpuidQuery for &T {
    fn cpuid(&self, leaf: u32, subleaf: u32) -> [u32; 4] {
        (**self).cpuid(leaf, subleaf)
    }
}

/// What CPUID says about the hypervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformCapabilities {
    /// CPUID.1:ECX.hypervisor.
    pub hypervisor_present: bool,
    /// The hypervisor vendor leaf reports VMware.
    pub vmware: bool,
    /// Highest hypervisor leaf, or zero without a hypervisor.
    pub max_hypervisor_leaf: u32,
    /// The VMware feature leaf, when the hypervisor implements it.
    pub vmware_features: Option<VmwareFeaturesEcx>,
    /// Running inside an Intel TDX trust domain.
    pub tdx_guest: bool,
}

impl PlatformCapabilities {
    /// Reads the capabilities from `cpuid`.
    pub fn probe(cpuid: &impl CpuidQuery) -> Self {
        let [max_basic_leaf, ..] = cpuid.cpuid(CpuidFunction::VENDOR_AND_MAX_FUNCTION.0, 0);
        let [_, _, ecx, _] = cpuid.cpuid(CpuidFunction::VERSION_AND_FEATURES.0, 0);
        let hypervisor_present = VersionAndFeaturesEcx::from(ecx).hypervisor_present();

        let tdx_guest = max_basic_leaf >= CpuidFunction::TDX_IDENTITY.0 && {
            let [_, ebx, ecx, edx] = cpuid.cpuid(CpuidFunction::TDX_IDENTITY.0, 0);
            Signature::from_ebx_edx_ecx(ebx, edx, ecx) == Signature::INTEL_TDX
        };

        let (vmware, max_hypervisor_leaf) = if hypervisor_present {
            let [eax, ebx, ecx, edx] = cpuid.cpuid(CpuidFunction::HYPERVISOR_VENDOR.0, 0);
            (
                Signature::from_ebx_ecx_edx(ebx, ecx, edx) == Signature::VMWARE,
                HypervisorVendorEax::from(eax).max_function(),
            )
        } else {
            (false, 0)
        };

        let vmware_features = (vmware
            && max_hypervisor_leaf >= CpuidFunction::VMWARE_FEATURES.0)
            .then(|| {
                let [_, _, ecx, _] = cpuid.cpuid(CpuidFunction::VMWARE_FEATURES.0, 0);
                VmwareFeaturesEcx::from(ecx)
            });

        let caps = Self {
            hypervisor_present,
            vmware,
            max_hypervisor_leaf,
            vmware_features,
            tdx_guest,
        };
        tracing::debug!(?caps, "platform capabilities");
        caps
    }

    /// The mode backdoor calls should use on this platform.
    ///
    /// A trust domain always goes through the TDX module. Otherwise the
    /// VMware instruction bits are used as is, and without them the I/O port.
    pub fn hypercall_mode(&self) -> HypercallMode {
        if self.tdx_guest {
            return HypercallMode::TDX;
        }
        match self.vmware_features {
            Some(features) => {
                HypercallMode((features.into_bits() & VmwareFeaturesEcx::INSTRUCTION_MASK) as u8)
            }
            None => HypercallMode::IO_PORT,
        }
    }
}

/// Records the mode for `caps` in `registry`, once per boot.
pub fn init_hypercall_mode(
    registry: &ModeRegistry,
    caps: &PlatformCapabilities,
) -> Result<HypercallMode, ModeError> {
    let mode = caps.hypercall_mode();
    registry.set(mode)?;
    tracing::info!(?mode, "vmware backdoor hypercall mode");
    Ok(mode)
}
