// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The once-per-boot hypercall mode.

use core::sync::atomic::AtomicU8;
use core::sync::atomic::Ordering;
use thiserror::Error;
use x86defs::vmware::HypercallMode;

/// Raw value of a registry that has not been initialized.
const UNSET: u8 = 0xff;

/// Errors from recording or reading the hypercall mode.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModeError {
    /// The mode was already recorded; it never changes afterwards.
    #[error("hypercall mode already initialized to {0:?}")]
    AlreadyInitialized(HypercallMode),
    /// A backdoor handle was requested before boot recorded the mode.
    #[error("backdoor used before the hypercall mode was initialized")]
    Uninitialized,
    /// The value collides with the registry's uninitialized marker.
    #[error("hypercall mode {0:?} is reserved")]
    Reserved(HypercallMode),
}

/// The hypercall mode of this guest, recorded by [`init_hypercall_mode`].
///
/// [`init_hypercall_mode`]: crate::init_hypercall_mode
pub static HYPERCALL_MODE: ModeRegistry = ModeRegistry::new();

/// A write-once cell holding a [`HypercallMode`].
///
/// Boot code calls [`ModeRegistry::set`] before any CPU issues a backdoor
/// call; after that the value is read-only and can be read from any CPU
/// without further synchronization.
#[derive(Debug)]
pub struct ModeRegistry(AtomicU8);

impl ModeRegistry {
    /// Returns an uninitialized registry.
    pub const fn new() -> Self {
        Self(AtomicU8::new(UNSET))
    }

    /// Records `mode`. Fails if a mode was already recorded, leaving the
    /// original value in place.
    pub fn set(&self, mode: HypercallMode) -> Result<(), ModeError> {
        if mode.0 == UNSET {
            return Err(ModeError::Reserved(mode));
        }
        self.0
            .compare_exchange(UNSET, mode.0, Ordering::Release, Ordering::Acquire)
            .map(drop)
            .map_err(|current| ModeError::AlreadyInitialized(HypercallMode(current)))
    }

    /// Returns the recorded mode, or `None` before initialization.
    pub fn get(&self) -> Option<HypercallMode> {
        match self.0.load(Ordering::Acquire) {
            UNSET => None,
            mode => Some(HypercallMode(mode)),
        }
    }
}

impl Default for ModeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
