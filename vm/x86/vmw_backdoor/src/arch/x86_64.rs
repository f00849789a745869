// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The backdoor instructions on x86_64.
//!
//! These only make sense inside a VMware guest. On other platforms the port
//! read returns all ones or faults, and the hypercall instructions fault.

use crate::detect::CpuidQuery;
use crate::detect::PlatformCapabilities;
use crate::detect::init_hypercall_mode;
use crate::mode::HYPERCALL_MODE;
use crate::mode::ModeError;
use crate::platform::BackdoorIo;
use crate::platform::BackdoorRegisters;
use crate::platform::BulkRegisters;
use core::arch::asm;
use core::mem::offset_of;
use tdcall::TdVmcall;
use tdcall::TdxModuleArgs;
use x86defs::tdx::TdCallLeaf;
use x86defs::tdx::TdCallResult;
use x86defs::tdx::TdVmcallExposedRegisters;
use x86defs::vmware::HypercallMode;

/// Issues one low bandwidth trap. RBX is reserved by the compiler, so it is
/// swapped in and out around the instruction.
macro_rules! trap {
    ($insn:literal, $regs:expr) => {{
        let regs: &mut BackdoorRegisters = $regs;
        // SAFETY: the instruction only touches the registers listed here. No
        // `nomem`, since the hypervisor may read or write guest memory.
        unsafe {
            asm!(
                "xchg {scratch}, rbx",
                $insn,
                "xchg {scratch}, rbx",
                scratch = inout(reg) regs.rbx,
                inout("rax") regs.rax,
                inout("rcx") regs.rcx,
                inout("rdx") regs.rdx,
                inout("rsi") regs.rsi,
                inout("rdi") regs.rdi,
                options(nostack),
            );
        }
    }};
}

/// Issues a string transfer with RBP temporarily holding `regs.rbp`.
macro_rules! rep_string {
    ($insn:literal, $regs:expr) => {{
        let regs: &mut BulkRegisters = $regs;
        // SAFETY: the caller guarantees the buffer. RBP is saved on the stack
        // and restored before anything else can observe it.
        unsafe {
            asm!(
                "xchg {scratch}, rbx",
                "push rbp",
                "mov rbp, {bp}",
                $insn,
                "pop rbp",
                "xchg {scratch}, rbx",
                scratch = inout(reg) regs.rbx,
                bp = in(reg) regs.rbp,
                inout("rax") regs.rax,
                inout("rcx") regs.rcx,
                inout("rdx") regs.rdx,
                inout("rsi") regs.rsi,
                inout("rdi") regs.rdi,
            );
        }
    }};
}

/// The backdoor instructions of the running CPU.
#[derive(Debug, Default, Clone, Copy)]
pub struct HardwareBackdoor;

impl BackdoorIo for HardwareBackdoor {
    fn port_in(&mut self, regs: &mut BackdoorRegisters) {
        trap!("in eax, dx", regs)
    }

    fn vmcall(&mut self, regs: &mut BackdoorRegisters) {
        trap!("vmcall", regs)
    }

    fn vmmcall(&mut self, regs: &mut BackdoorRegisters) {
        trap!("vmmcall", regs)
    }

    unsafe fn rep_outsb(&mut self, regs: &mut BulkRegisters) {
        rep_string!("rep outsb", regs)
    }

    unsafe fn rep_insb(&mut self, regs: &mut BulkRegisters) {
        rep_string!("rep insb", regs)
    }
}

impl TdVmcall for HardwareBackdoor {
    fn tdvmcall(
        &mut self,
        exposed: TdVmcallExposedRegisters,
        args: &mut TdxModuleArgs,
    ) -> TdCallResult {
        let rax: u64;
        let args: *mut TdxModuleArgs = args;

        // Every general purpose register except RAX and RCX carries an
        // argument, RBX included, so nothing is left to hold `args` across
        // the call. It is parked on the stack instead, with the VMM's R9
        // swapped in for it afterwards. RCX is not written back.
        //
        // SAFETY: `args` is a valid, exclusively borrowed TdxModuleArgs. The
        // TDX module only touches the exposed registers, all of which are
        // declared clobbered here or saved on the stack.
        unsafe {
            asm!(
                "push rbx",
                "push r9",
                "mov rdx, [r9 + {off_rdx}]",
                "mov r8, [r9 + {off_r8}]",
                "mov r10, [r9 + {off_r10}]",
                "mov r11, [r9 + {off_r11}]",
                "mov r12, [r9 + {off_r12}]",
                "mov r13, [r9 + {off_r13}]",
                "mov r14, [r9 + {off_r14}]",
                "mov r15, [r9 + {off_r15}]",
                "mov rbx, [r9 + {off_rbx}]",
                "mov rdi, [r9 + {off_rdi}]",
                "mov rsi, [r9 + {off_rsi}]",
                "mov r9, [r9 + {off_r9}]",
                "tdcall",
                "xchg r9, [rsp]",
                "mov [r9 + {off_rdx}], rdx",
                "mov [r9 + {off_r8}], r8",
                "mov [r9 + {off_r10}], r10",
                "mov [r9 + {off_r11}], r11",
                "mov [r9 + {off_r12}], r12",
                "mov [r9 + {off_r13}], r13",
                "mov [r9 + {off_r14}], r14",
                "mov [r9 + {off_r15}], r15",
                "mov [r9 + {off_rbx}], rbx",
                "mov [r9 + {off_rdi}], rdi",
                "mov [r9 + {off_rsi}], rsi",
                "pop qword ptr [r9 + {off_r9}]",
                "pop rbx",
                off_rdx = const offset_of!(TdxModuleArgs, rdx),
                off_r8 = const offset_of!(TdxModuleArgs, r8),
                off_r9 = const offset_of!(TdxModuleArgs, r9),
                off_r10 = const offset_of!(TdxModuleArgs, r10),
                off_r11 = const offset_of!(TdxModuleArgs, r11),
                off_r12 = const offset_of!(TdxModuleArgs, r12),
                off_r13 = const offset_of!(TdxModuleArgs, r13),
                off_r14 = const offset_of!(TdxModuleArgs, r14),
                off_r15 = const offset_of!(TdxModuleArgs, r15),
                off_rbx = const offset_of!(TdxModuleArgs, rbx),
                off_rdi = const offset_of!(TdxModuleArgs, rdi),
                off_rsi = const offset_of!(TdxModuleArgs, rsi),
                inout("rax") TdCallLeaf::VP_VMCALL.0 => rax,
                inout("rcx") u64::from(exposed) => _,
                inout("r9") args => _,
                lateout("rdx") _,
                lateout("rsi") _,
                lateout("rdi") _,
                lateout("r8") _,
                lateout("r10") _,
                lateout("r11") _,
                lateout("r12") _,
                lateout("r13") _,
                lateout("r14") _,
                lateout("r15") _,
            );
        }

        rax.into()
    }
}

/// CPUID of the running CPU.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostCpuid;

impl CpuidQuery for HostCpuid {
    fn cpuid(&self, leaf: u32, subleaf: u32) -> [u32; 4] {
        let result = core::arch::x86_64::__cpuid_count(leaf, subleaf);
        [result.eax, result.ebx, result.ecx, result.edx]
    }
}

/// Detects the platform from the running CPU and records the mode in
/// [`HYPERCALL_MODE`]. Call once, on the boot CPU, before any backdoor call.
pub fn init_from_host() -> Result<HypercallMode, ModeError> {
    let caps = PlatformCapabilities::probe(&HostCpuid);
    init_hypercall_mode(&HYPERCALL_MODE, &caps)
}
