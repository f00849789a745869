// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Implementations of the backdoor traits on real hardware.

#[cfg(target_arch = "x86_64")]
pub mod x86_64;
