// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Definitions relating to the x86 architecture as seen by a guest talking to
//! its hypervisor: CPUID leaves used for platform detection, the TDX module
//! call interface, and the VMware backdoor protocol.

#![no_std]
#![forbid(unsafe_code)]

pub mod cpuid;
pub mod tdx;
pub mod vmware;
