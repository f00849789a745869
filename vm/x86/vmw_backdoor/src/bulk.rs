// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! High bandwidth transfers.
//!
//! Bulk data moves with `rep outsb`/`rep insb` on [`BACKDOOR_PORT_HB`],
//! whatever the hypercall mode: no instruction based equivalent exists. The
//! hypervisor walks the guest buffer through RSI or RDI, which does not work
//! when guest memory is encrypted, so callers must fall back to low bandwidth
//! calls on such platforms. Nothing here checks for it.
//!
//! | register | input | output |
//! |---|---|---|
//! | rax | magic | result |
//! | rbx | command | `out1` |
//! | rcx | `in2`, byte count | |
//! | rdx | `in3` with the port in the low word | |
//! | rsi | `in4` | |
//! | rdi | `in5` | |
//! | rbp | `in6` | |
//!
//! [`BACKDOOR_PORT_HB`]: x86defs::vmware::BACKDOOR_PORT_HB

use crate::Backdoor;
use crate::low_bandwidth::store;
use crate::platform::BackdoorIo;
use crate::platform::BulkRegisters;
use x86defs::vmware::BackdoorCommand;

impl<T: BackdoorIo> Backdoor<T> {
    /// Sends `in2` bytes starting at guest address `in4` to the hypervisor.
    ///
    /// # Safety
    /// `in4` must point to `in2` readable bytes. Guest memory must not be
    /// encrypted.
    #[allow(clippy::too_many_arguments)]
    pub unsafe fn hypercall_hb_out(
        &mut self,
        cmd: BackdoorCommand,
        in2: u64,
        in3: u64,
        in4: u64,
        in5: u64,
        in6: u64,
        out1: Option<&mut u32>,
    ) -> u64 {
        let mut regs = BulkRegisters::load(cmd, in2, in3, in4, in5, in6);
        // SAFETY: the caller guarantees the source buffer.
        unsafe { self.io.rep_outsb(&mut regs) };
        store(out1, regs.rbx);
        regs.rax
    }

    /// Receives `in2` bytes from the hypervisor into guest address `in5`.
    ///
    /// # Safety
    /// `in5` must point to `in2` writable bytes that nothing else references
    /// during the call. Guest memory must not be encrypted.
    #[allow(clippy::too_many_arguments)]
    pub unsafe fn hypercall_hb_in(
        &mut self,
        cmd: BackdoorCommand,
        in2: u64,
        in3: u64,
        in4: u64,
        in5: u64,
        in6: u64,
        out1: Option<&mut u32>,
    ) -> u64 {
        let mut regs = BulkRegisters::load(cmd, in2, in3, in4, in5, in6);
        // SAFETY: the caller guarantees the destination buffer.
        unsafe { self.io.rep_insb(&mut regs) };
        store(out1, regs.rbx);
        regs.rax
    }

    /// Sends `data` to the hypervisor with [`Self::hypercall_hb_out`].
    ///
    /// Guest memory must not be encrypted; the transfer faults otherwise.
    pub fn hb_send(
        &mut self,
        cmd: BackdoorCommand,
        in3: u64,
        data: &[u8],
        in5: u64,
        in6: u64,
        out1: Option<&mut u32>,
    ) -> u64 {
        // SAFETY: rsi and rcx describe `data`, which stays borrowed for the
        // duration of the call.
        unsafe {
            self.hypercall_hb_out(
                cmd,
                data.len() as u64,
                in3,
                data.as_ptr() as u64,
                in5,
                in6,
                out1,
            )
        }
    }

    /// Fills `data` from the hypervisor with [`Self::hypercall_hb_in`].
    ///
    /// Guest memory must not be encrypted; the transfer faults otherwise.
    pub fn hb_receive(
        &mut self,
        cmd: BackdoorCommand,
        in3: u64,
        in4: u64,
        data: &mut [u8],
        in6: u64,
        out1: Option<&mut u32>,
    ) -> u64 {
        // SAFETY: rdi and rcx describe `data`, which is exclusively borrowed
        // for the duration of the call.
        unsafe {
            self.hypercall_hb_in(
                cmd,
                data.len() as u64,
                in3,
                in4,
                data.as_mut_ptr() as u64,
                in6,
                out1,
            )
        }
    }
}
