// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Tests for the backdoor call paths, against a recording hypervisor.

extern crate std;

use super::*;
use std::vec;
use std::vec::Vec;
use tdcall::TdVmcall;
use tdcall::TdxModuleArgs;
use test_with_tracing::test;
use x86defs::tdx::TdCallResult;
use x86defs::tdx::TdVmcallExposedRegisters;
use x86defs::vmware::BACKDOOR_MAGIC;
use x86defs::vmware::BACKDOOR_PORT;
use x86defs::vmware::BACKDOOR_PORT_HB;
use x86defs::vmware::TDX_HCALL_FUNC;
use x86defs::vmware::TDX_VENDOR_LEAF;

// Written into output slots that must not be touched.
const SENTINEL: u32 = 0xdead_beef;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trap {
    PortIn,
    Vmcall,
    Vmmcall,
    RepOutsb,
    RepInsb,
    TdVmcall,
}

/// Records every trap and answers with canned registers.
#[derive(Debug, Default)]
struct MockHypervisor {
    traps: Vec<Trap>,
    seen: Option<BackdoorRegisters>,
    seen_bulk: Option<BulkRegisters>,
    seen_tdx: Option<(TdVmcallExposedRegisters, TdxModuleArgs)>,
    reply: BackdoorRegisters,
    tdx_reply: TdxModuleArgs,
    sent: Vec<u8>,
    fill: u8,
}

impl MockHypervisor {
    fn answer(&mut self, trap: Trap, regs: &mut BackdoorRegisters) {
        self.traps.push(trap);
        self.seen = Some(*regs);
        *regs = self.reply;
    }

    fn answer_bulk(&mut self, trap: Trap, regs: &mut BulkRegisters) {
        self.traps.push(trap);
        self.seen_bulk = Some(*regs);
        regs.rax = self.reply.rax;
        regs.rbx = self.reply.rbx;
        regs.rcx = 0;
    }
}

impl BackdoorIo for MockHypervisor {
    fn port_in(&mut self, regs: &mut BackdoorRegisters) {
        self.answer(Trap::PortIn, regs)
    }

    fn vmcall(&mut self, regs: &mut BackdoorRegisters) {
        self.answer(Trap::Vmcall, regs)
    }

    fn vmmcall(&mut self, regs: &mut BackdoorRegisters) {
        self.answer(Trap::Vmmcall, regs)
    }

    unsafe fn rep_outsb(&mut self, regs: &mut BulkRegisters) {
        // SAFETY: the caller guarantees rsi points to rcx readable bytes.
        let data =
            unsafe { core::slice::from_raw_parts(regs.rsi as *const u8, regs.rcx as usize) };
        self.sent.extend_from_slice(data);
        self.answer_bulk(Trap::RepOutsb, regs)
    }

    unsafe fn rep_insb(&mut self, regs: &mut BulkRegisters) {
        // SAFETY: the caller guarantees rdi points to rcx writable bytes.
        let data =
            unsafe { core::slice::from_raw_parts_mut(regs.rdi as *mut u8, regs.rcx as usize) };
        data.fill(self.fill);
        self.answer_bulk(Trap::RepInsb, regs)
    }
}

impl TdVmcall for MockHypervisor {
    fn tdvmcall(
        &mut self,
        exposed: TdVmcallExposedRegisters,
        args: &mut TdxModuleArgs,
    ) -> TdCallResult {
        assert_eq!(args.rcx, 0);
        self.traps.push(Trap::TdVmcall);
        self.seen_tdx = Some((exposed, *args));
        *args = self.tdx_reply;
        TdCallResult::new()
    }
}

fn version_reply() -> BackdoorRegisters {
    BackdoorRegisters {
        rax: 6,
        rbx: BACKDOOR_MAGIC.into(),
        rcx: 2,
        ..Default::default()
    }
}

#[test]
fn port_get_version() {
    let mut hv = MockHypervisor {
        reply: version_reply(),
        ..Default::default()
    };
    let mut backdoor = Backdoor::with_mode(HypercallMode::IO_PORT, &mut hv);
    assert_eq!(
        backdoor.probe_version(),
        Some(BackdoorVersion {
            version: 6,
            product: 2
        })
    );

    assert_eq!(hv.traps, [Trap::PortIn]);
    let seen = hv.seen.unwrap();
    assert_eq!(seen.rax, u64::from(BACKDOOR_MAGIC));
    assert_eq!(seen.rcx, 10);
    assert_eq!(seen.rbx, 0);
    assert_eq!(seen.rdx, u64::from(BACKDOOR_PORT));
}

#[test]
fn probe_rejects_missing_magic() {
    let mut hv = MockHypervisor {
        reply: BackdoorRegisters {
            rax: 6,
            rbx: 0x1234,
            ..Default::default()
        },
        ..Default::default()
    };
    assert_eq!(
        Backdoor::with_mode(HypercallMode::VMCALL, &mut hv).probe_version(),
        None
    );

    let mut hv = MockHypervisor {
        reply: BackdoorRegisters {
            rax: u32::MAX.into(),
            rbx: BACKDOOR_MAGIC.into(),
            ..Default::default()
        },
        ..Default::default()
    };
    assert_eq!(
        Backdoor::with_mode(HypercallMode::VMCALL, &mut hv).probe_version(),
        None
    );
}

#[test]
fn vmcall_get_hz() {
    let mut hv = MockHypervisor {
        reply: BackdoorRegisters {
            rax: 0x9502_f900,
            rbx: 0x1_0000_0002,
            ..Default::default()
        },
        ..Default::default()
    };
    let mut hz_hi = SENTINEL;
    let result = Backdoor::with_mode(HypercallMode::VMCALL, &mut hv).hypercall3(
        BackdoorCommand::GET_HZ,
        u32::MAX.into(),
        Some(&mut hz_hi),
        None,
    );

    assert_eq!(result, 0x9502_f900);
    // Output registers are truncated to their low 32 bits.
    assert_eq!(hz_hi, 2);
    assert_eq!(hv.traps, [Trap::Vmcall]);
    let seen = hv.seen.unwrap();
    assert_eq!(seen.rcx, 45);
    assert_eq!(seen.rbx, 0xffff_ffff);
}

#[test]
fn both_feature_bits_use_vmcall() {
    let mut hv = MockHypervisor::default();
    Backdoor::with_mode(HypercallMode(3), &mut hv).hypercall1(BackdoorCommand::STEAL_CLOCK, 1);
    assert_eq!(hv.traps, [Trap::Vmcall]);
}

#[test]
fn vmmcall_passes_dx_flags() {
    let mut hv = MockHypervisor::default();
    let mut out2 = 0;
    Backdoor::with_mode(HypercallMode::VMMCALL, &mut hv).hypercall5(
        BackdoorCommand(0x55),
        1,
        0xabcd_0002,
        3,
        4,
        Some(&mut out2),
    );

    assert_eq!(hv.traps, [Trap::Vmmcall]);
    let seen = hv.seen.unwrap();
    assert_eq!(seen.rdx, 0xabcd_0002);
    assert_eq!((seen.rbx, seen.rsi, seen.rdi), (1, 3, 4));
}

#[test]
fn port_keeps_dx_high_word() {
    let mut hv = MockHypervisor::default();
    Backdoor::with_mode(HypercallMode::IO_PORT, &mut hv).hypercall5(
        BackdoorCommand(0x55),
        0,
        0xabcd_0002,
        0,
        0,
        None,
    );
    assert_eq!(hv.seen.unwrap().rdx, 0xabcd_5658);
}

#[test]
fn shape_register_mapping() {
    let mut hv = MockHypervisor {
        reply: BackdoorRegisters {
            rax: 7,
            rbx: 11,
            rcx: 22,
            rdx: 33,
            rsi: 44,
            rdi: 55,
        },
        ..Default::default()
    };
    let mut backdoor = Backdoor::with_mode(HypercallMode::VMCALL, &mut hv);

    let mut out = [SENTINEL; 5];
    let [o1, o2, o3, ..] = &mut out;
    assert_eq!(
        backdoor.hypercall4(BackdoorCommand(1), 9, Some(o1), Some(o2), Some(o3)),
        7
    );
    assert_eq!(out, [11, 22, 33, SENTINEL, SENTINEL]);

    let mut out = [SENTINEL; 5];
    let [_, o2, o3, o4, o5] = &mut out;
    backdoor.hypercall6(
        BackdoorCommand(2),
        9,
        8,
        Some(o2),
        Some(o3),
        Some(o4),
        Some(o5),
    );
    assert_eq!(out, [SENTINEL, 22, 33, 44, 55]);

    let mut out = [SENTINEL; 3];
    let [o1, o2, o3] = &mut out;
    backdoor.hypercall7(BackdoorCommand(3), 1, 2, 3, 4, Some(o1), Some(o2), Some(o3));
    assert_eq!(out, [11, 22, 33]);

    let seen = hv.seen.unwrap();
    assert_eq!(
        seen,
        BackdoorRegisters {
            rax: BACKDOOR_MAGIC.into(),
            rbx: 1,
            rcx: 3,
            rdx: 2,
            rsi: 3,
            rdi: 4,
        }
    );
    assert_eq!(hv.traps, [Trap::Vmcall; 3]);
}

#[test]
fn absent_slots_are_untouched() {
    for (mode, trap) in [
        (HypercallMode::IO_PORT, Trap::PortIn),
        (HypercallMode::TDX, Trap::TdVmcall),
    ] {
        let mut hv = MockHypervisor {
            reply: BackdoorRegisters {
                rbx: 1,
                rcx: 2,
                rdx: 3,
                ..Default::default()
            },
            tdx_reply: TdxModuleArgs {
                rbx: 1,
                r13: 2,
                rdx: 3,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut out = [SENTINEL; 3];
        let [_, o2, _] = &mut out;
        Backdoor::with_mode(mode, &mut hv).hypercall7(
            BackdoorCommand(4),
            0,
            0,
            0,
            0,
            None,
            Some(o2),
            None,
        );
        assert_eq!(out, [SENTINEL, 2, SENTINEL], "{mode:?}");
        assert_eq!(hv.traps, [trap]);
    }
}

#[test]
fn bulk_out_uses_hb_port() {
    let data: Vec<u8> = (0..16).collect();
    let mut hv = MockHypervisor {
        reply: BackdoorRegisters {
            rax: 1,
            rbx: 0x42,
            ..Default::default()
        },
        ..Default::default()
    };
    let mut out1 = SENTINEL;
    let result = Backdoor::with_mode(HypercallMode::VMMCALL, &mut hv).hb_send(
        BackdoorCommand(0x1e),
        0x0007_0000,
        &data,
        0x55,
        0x66,
        Some(&mut out1),
    );

    assert_eq!(result, 1);
    assert_eq!(out1, 0x42);
    assert_eq!(hv.traps, [Trap::RepOutsb]);
    assert_eq!(hv.sent, data);
    let seen = hv.seen_bulk.unwrap();
    assert_eq!(seen.rax, u64::from(BACKDOOR_MAGIC));
    assert_eq!(seen.rbx, 0x1e);
    assert_eq!(seen.rcx, 16);
    assert_eq!(seen.rdx & 0xffff, u64::from(BACKDOOR_PORT_HB));
    assert_eq!(seen.rdx >> 16, 7);
    assert_eq!(seen.rdi, 0x55);
    assert_eq!(seen.rbp, 0x66);
}

#[test]
fn bulk_in_fills_buffer() {
    let mut hv = MockHypervisor {
        fill: 0xa5,
        reply: BackdoorRegisters {
            rax: 3,
            rbx: 0x1_0000_0077,
            ..Default::default()
        },
        ..Default::default()
    };
    let mut data = vec![0; 32];
    let mut out1 = SENTINEL;
    let result = Backdoor::with_mode(HypercallMode::IO_PORT, &mut hv).hb_receive(
        BackdoorCommand(0x1f),
        0,
        0x44,
        &mut data,
        0x66,
        Some(&mut out1),
    );

    assert_eq!(result, 3);
    assert_eq!(out1, 0x77);
    assert_eq!(data, [0xa5; 32]);
    assert_eq!(hv.traps, [Trap::RepInsb]);
    let seen = hv.seen_bulk.unwrap();
    assert_eq!(seen.rcx, 32);
    assert_eq!(seen.rsi, 0x44);
    assert_eq!(seen.rdx, u64::from(BACKDOOR_PORT_HB));
    assert_eq!(seen.rbp, 0x66);
}

#[test]
fn bulk_ignores_mode() {
    for mode in [
        HypercallMode::IO_PORT,
        HypercallMode::VMMCALL,
        HypercallMode::VMCALL,
        HypercallMode::TDX,
    ] {
        let mut hv = MockHypervisor::default();
        let data = [1, 2, 3];
        Backdoor::with_mode(mode, &mut hv).hb_send(BackdoorCommand(0), 0, &data, 0, 0, None);
        assert_eq!(hv.traps, [Trap::RepOutsb], "{mode:?}");
    }
}

#[test]
fn raw_bulk_out() {
    let data = [0x5a_u8; 8];
    let mut hv = MockHypervisor::default();
    let mut backdoor = Backdoor::with_mode(HypercallMode::VMCALL, &mut hv);
    // SAFETY: `data` is 8 readable bytes and outlives the call.
    unsafe {
        backdoor.hypercall_hb_out(
            BackdoorCommand(0x1e),
            data.len() as u64,
            0,
            data.as_ptr() as u64,
            0,
            0,
            None,
        );
    }
    assert_eq!(hv.sent, data);
}

#[test]
fn tdx_get_vcpu_info() {
    let mut hv = MockHypervisor {
        tdx_reply: TdxModuleArgs {
            r12: 0x1_0000_0003,
            rbx: 0x11,
            r13: 0x22,
            rdx: 0x33,
            rsi: 0x44,
            ..Default::default()
        },
        ..Default::default()
    };
    let mut out = [SENTINEL; 3];
    let [o1, o2, o3] = &mut out;
    let result = Backdoor::with_mode(HypercallMode::TDX, &mut hv).hypercall7(
        BackdoorCommand::GET_VCPU_INFO,
        1,
        2,
        3,
        4,
        Some(o1),
        Some(o2),
        Some(o3),
    );

    // The primary result keeps all 64 bits of r12.
    assert_eq!(result, 0x1_0000_0003);
    assert_eq!(out, [0x11, 0x22, 0x33]);
    assert_eq!(hv.traps, [Trap::TdVmcall]);

    let (exposed, args) = hv.seen_tdx.unwrap();
    assert_eq!(exposed, TdVmcallExposedRegisters::GUEST_VISIBLE);
    assert_eq!(
        args,
        TdxModuleArgs {
            r10: TDX_VENDOR_LEAF,
            r11: TDX_HCALL_FUNC,
            r12: BACKDOOR_MAGIC.into(),
            r13: 68,
            rbx: 1,
            rdx: 2,
            rsi: 3,
            rdi: 4,
            ..Default::default()
        }
    );
}

#[test]
fn tdx_middle_outputs_come_from_record() {
    let mut hv = MockHypervisor {
        tdx_reply: TdxModuleArgs {
            r12: 9,
            rbx: 0x11,
            r13: 0x22,
            rdx: 0x33,
            rsi: 0x44,
            rdi: 0x55,
            r14: 0x66,
            ..Default::default()
        },
        ..Default::default()
    };
    let mut out = [SENTINEL; 5];
    let [_, o2, o3, o4, o5] = &mut out;
    let result = Backdoor::with_mode(HypercallMode::TDX, &mut hv).hypercall6(
        BackdoorCommand(0x40),
        1,
        2,
        Some(o2),
        Some(o3),
        Some(o4),
        Some(o5),
    );

    assert_eq!(result, 9);
    assert_eq!(out, [SENTINEL, 0x22, 0x33, 0x44, 0x55]);
    assert_eq!(hv.traps, [Trap::TdVmcall]);
    let (_, args) = hv.seen_tdx.unwrap();
    assert_eq!((args.rbx, args.rdx, args.r13), (1, 2, 0x40));
}

#[test]
fn tdx_carries_sixth_argument() {
    let mut hv = MockHypervisor {
        tdx_reply: TdxModuleArgs {
            rdi: 0x55,
            r14: 0x66,
            ..Default::default()
        },
        ..Default::default()
    };
    let mut out5 = 0;
    let mut out6 = 0;
    tdx_hypercall(
        &mut hv,
        BackdoorCommand(0x30),
        BackdoorInputs {
            in6: 0x99,
            ..Default::default()
        },
        BackdoorOutputs {
            out5: Some(&mut out5),
            out6: Some(&mut out6),
            ..Default::default()
        },
    );

    assert_eq!((out5, out6), (0x55, 0x66));
    assert_eq!(hv.seen_tdx.unwrap().1.r14, 0x99);
}

#[test]
fn uninitialized_mode_is_an_error() {
    let registry = ModeRegistry::new();
    let mut hv = MockHypervisor::default();
    assert_eq!(
        Backdoor::from_registry(&registry, &mut hv).unwrap_err(),
        ModeError::Uninitialized
    );
    assert!(hv.traps.is_empty());
}

#[test]
fn negative_mode_byte_uses_port() {
    let registry = ModeRegistry::new();
    registry.set(HypercallMode(0x81)).unwrap();
    let mut hv = MockHypervisor::default();
    let mut backdoor = Backdoor::from_registry(&registry, &mut hv).unwrap();
    backdoor.hypercall1(BackdoorCommand::GET_HZ, 0);
    assert_eq!(hv.traps, [Trap::PortIn]);
}

#[test]
fn handle_uses_registered_mode() {
    let registry = ModeRegistry::new();
    registry.set(HypercallMode::VMMCALL).unwrap();
    let mut hv = MockHypervisor::default();
    let mut backdoor = Backdoor::from_registry(&registry, &mut hv).unwrap();
    assert_eq!(backdoor.mode(), HypercallMode::VMMCALL);
    assert_eq!(
        backdoor.transport(),
        Transport::Instruction(BackdoorInstruction::Vmmcall)
    );
    backdoor.hypercall1(BackdoorCommand(1), 0);
    backdoor.hypercall1(BackdoorCommand(2), 0);
    assert_eq!(hv.traps, [Trap::Vmmcall; 2]);
}
