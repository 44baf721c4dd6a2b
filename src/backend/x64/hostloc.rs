use crate::backend::x64::assembler::{Reg, RAX, RBP, RBX, RCX, RDI, RDX, RSI, RSP};
use crate::backend::x64::assembler::{R10, R11, R12, R13, R14, R15, R8, R9};

/// Host location: abstracts GPRs, XMM registers, and spill slots
/// for the register allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostLoc {
    Gpr(u8),
    Xmm(u8),
    Spill(u8),
}

impl HostLoc {
    pub fn is_gpr(self) -> bool {
        matches!(self, HostLoc::Gpr(_))
    }
    pub fn is_xmm(self) -> bool {
        matches!(self, HostLoc::Xmm(_))
    }
    pub fn is_register(self) -> bool {
        self.is_gpr() || self.is_xmm()
    }
    pub fn is_spill(self) -> bool {
        matches!(self, HostLoc::Spill(_))
    }

    /// Bit width of the location (64 for GPR, 128 for XMM/spill).
    pub fn bit_width(self) -> usize {
        match self {
            HostLoc::Gpr(_) => 64,
            HostLoc::Xmm(_) => 128,
            HostLoc::Spill(_) => 128,
        }
    }

    pub fn gpr_index(self) -> u8 {
        match self {
            HostLoc::Gpr(i) => i,
            _ => panic!("gpr_index called on non-GPR HostLoc"),
        }
    }

    pub fn xmm_index(self) -> u8 {
        match self {
            HostLoc::Xmm(i) => i,
            _ => panic!("xmm_index called on non-XMM HostLoc"),
        }
    }

    pub fn to_reg64(self) -> Reg {
        match self {
            HostLoc::Gpr(i) => gpr_to_reg64(i),
            _ => panic!("to_reg64 called on non-GPR HostLoc"),
        }
    }

    pub fn to_xmm(self) -> Reg {
        match self {
            HostLoc::Xmm(i) => Reg::xmm(i),
            _ => panic!("to_xmm called on non-XMM HostLoc"),
        }
    }
}

fn gpr_to_reg64(idx: u8) -> Reg {
    match idx {
        0 => RAX,
        1 => RCX,
        2 => RDX,
        3 => RBX,
        4 => RSP,
        5 => RBP,
        6 => RSI,
        7 => RDI,
        8 => R8,
        9 => R9,
        10 => R10,
        11 => R11,
        12 => R12,
        13 => R13,
        14 => R14,
        15 => R15,
        _ => panic!("Invalid GPR index: {}", idx),
    }
}

pub const HOST_RAX: HostLoc = HostLoc::Gpr(0);
pub const HOST_RCX: HostLoc = HostLoc::Gpr(1);
pub const HOST_RDX: HostLoc = HostLoc::Gpr(2);
pub const HOST_RBX: HostLoc = HostLoc::Gpr(3);
pub const HOST_RSP: HostLoc = HostLoc::Gpr(4);
pub const HOST_RBP: HostLoc = HostLoc::Gpr(5);
pub const HOST_RSI: HostLoc = HostLoc::Gpr(6);
pub const HOST_RDI: HostLoc = HostLoc::Gpr(7);
pub const HOST_R8: HostLoc = HostLoc::Gpr(8);
pub const HOST_R9: HostLoc = HostLoc::Gpr(9);
pub const HOST_R10: HostLoc = HostLoc::Gpr(10);
pub const HOST_R11: HostLoc = HostLoc::Gpr(11);
pub const HOST_R12: HostLoc = HostLoc::Gpr(12);
pub const HOST_R13: HostLoc = HostLoc::Gpr(13);
pub const HOST_R14: HostLoc = HostLoc::Gpr(14);
pub const HOST_R15: HostLoc = HostLoc::Gpr(15);

/// GPRs available to the allocator.
/// Excludes RSP (stack pointer) and R15 (reserved for the JitState pointer).
pub const ANY_GPR: &[HostLoc] = &[
    HOST_RAX, HOST_RBX, HOST_RCX, HOST_RDX, HOST_RSI, HOST_RDI, HOST_RBP, HOST_R8, HOST_R9,
    HOST_R10, HOST_R11, HOST_R12, HOST_R13, HOST_R14,
];

/// XMM registers available to the allocator.
/// Excludes XMM0, which pblendvb-based lowerings use as an implicit operand.
pub const ANY_XMM: &[HostLoc] = &[
    HostLoc::Xmm(1),
    HostLoc::Xmm(2),
    HostLoc::Xmm(3),
    HostLoc::Xmm(4),
    HostLoc::Xmm(5),
    HostLoc::Xmm(6),
    HostLoc::Xmm(7),
    HostLoc::Xmm(8),
    HostLoc::Xmm(9),
    HostLoc::Xmm(10),
    HostLoc::Xmm(11),
    HostLoc::Xmm(12),
    HostLoc::Xmm(13),
    HostLoc::Xmm(14),
    HostLoc::Xmm(15),
];
