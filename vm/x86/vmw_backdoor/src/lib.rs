// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Guest side of the VMware backdoor hypercall interface.
//!
//! A backdoor call loads [`BACKDOOR_MAGIC`], a [`BackdoorCommand`] and up to
//! five inputs into fixed registers, traps to the hypervisor, and reads the
//! results back out of the same registers. Three ways of trapping exist, and
//! which one works is a property of the platform, fixed at boot:
//!
//! * the legacy I/O port, `in eax, dx` from [`BACKDOOR_PORT`];
//! * `vmcall` or `vmmcall`, when the hypervisor advertises them;
//! * TDG.VP.VMCALL through the TDX module, inside a trust domain, where the
//!   registers are remapped onto [`TdxModuleArgs`].
//!
//! Boot code detects the platform with [`PlatformCapabilities::probe`] and
//! records the resulting [`HypercallMode`] once with [`init_hypercall_mode`].
//! A [`Backdoor`] handle built after that resolves the transport a single
//! time and reuses it for every call, so the per-call cost is one match on a
//! cached value.
//!
//! The crate only moves registers. Command semantics and interpretation of
//! results belong to the callers.
//!
//! [`BACKDOOR_MAGIC`]: x86defs::vmware::BACKDOOR_MAGIC
//! [`BACKDOOR_PORT`]: x86defs::vmware::BACKDOOR_PORT
//! [`TdxModuleArgs`]: tdcall::TdxModuleArgs

#![no_std]
// UNSAFETY: Issuing the backdoor instructions and the raw bulk transfer calls
// that take guest addresses.
#![expect(unsafe_code)]
#![warn(missing_docs)]

pub mod arch;
mod backdoor;
mod bulk;
mod detect;
mod low_bandwidth;
mod mode;
mod platform;
mod select;
mod tdx;

#[cfg(test)]
mod tests;

pub use backdoor::Backdoor;
pub use backdoor::BackdoorVersion;
pub use detect::CpuidQuery;
pub use detect::PlatformCapabilities;
pub use detect::init_hypercall_mode;
pub use mode::HYPERCALL_MODE;
pub use mode::ModeError;
pub use mode::ModeRegistry;
pub use platform::BackdoorIo;
pub use platform::BackdoorRegisters;
pub use platform::BulkRegisters;
pub use select::BackdoorInstruction;
pub use select::Transport;
pub use tdx::BackdoorInputs;
pub use tdx::BackdoorOutputs;
pub use tdx::tdx_hypercall;
pub use x86defs::vmware::BackdoorCommand;
pub use x86defs::vmware::HypercallMode;
