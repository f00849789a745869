// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::mode::HYPERCALL_MODE;
use crate::mode::ModeError;
use crate::mode::ModeRegistry;
use crate::platform::BackdoorIo;
use crate::select::Transport;
use tdcall::TdVmcall;
use x86defs::vmware::BACKDOOR_MAGIC;
use x86defs::vmware::BackdoorCommand;
use x86defs::vmware::HypercallMode;

/// A handle for issuing backdoor calls through `io`.
///
/// The transport is resolved from the hypercall mode when the handle is
/// built and never re-evaluated. Handles are cheap; each CPU can own one.
#[derive(Debug)]
pub struct Backdoor<T> {
    pub(crate) io: T,
    pub(crate) mode: HypercallMode,
    pub(crate) transport: Transport,
}

impl<T> Backdoor<T> {
    /// Builds a handle using the mode recorded in [`HYPERCALL_MODE`].
    pub fn new(io: T) -> Result<Self, ModeError> {
        Self::from_registry(&HYPERCALL_MODE, io)
    }

    /// Builds a handle using the mode recorded in `registry`.
    ///
    /// Fails with [`ModeError::Uninitialized`] if boot has not recorded a
    /// mode yet, since no transport can be chosen.
    pub fn from_registry(registry: &ModeRegistry, io: T) -> Result<Self, ModeError> {
        let mode = registry.get().ok_or(ModeError::Uninitialized)?;
        Ok(Self::with_mode(mode, io))
    }

    /// Builds a handle for an explicitly chosen mode.
    pub fn with_mode(mode: HypercallMode, io: T) -> Self {
        let transport = Transport::resolve(mode);
        tracing::debug!(?mode, ?transport, "backdoor transport");
        Self {
            io,
            mode,
            transport,
        }
    }

    /// The mode this handle was built for.
    pub fn mode(&self) -> HypercallMode {
        self.mode
    }

    /// The resolved transport.
    pub fn transport(&self) -> Transport {
        self.transport
    }

    /// Returns the underlying instruction provider.
    pub fn io_mut(&mut self) -> &mut T {
        &mut self.io
    }

    /// Consumes the handle, returning the instruction provider.
    pub fn into_inner(self) -> T {
        self.io
    }
}

/// The answer to [`BackdoorCommand::GET_VERSION`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackdoorVersion {
    /// Backdoor protocol version, from `eax`.
    pub version: u32,
    /// Product type, from `ecx`.
    pub product: u32,
}

impl<T: BackdoorIo + TdVmcall> Backdoor<T> {
    /// Checks that a VMware backdoor answers, for platforms that do not
    /// identify the hypervisor through CPUID.
    ///
    /// A backdoor is present when the version is not all ones and the magic
    /// is echoed back in `ebx`. Without a hypervisor listening, the trapping
    /// instruction faults instead of returning.
    pub fn probe_version(&mut self) -> Option<BackdoorVersion> {
        let mut magic = 0;
        let mut product = 0;
        let version = self.hypercall3(
            BackdoorCommand::GET_VERSION,
            0,
            Some(&mut magic),
            Some(&mut product),
        ) as u32;

        let present = version != u32::MAX && magic == BACKDOOR_MAGIC;
        tracing::debug!(version, magic, product, present, "backdoor version probe");
        present.then_some(BackdoorVersion { version, product })
    }
}
