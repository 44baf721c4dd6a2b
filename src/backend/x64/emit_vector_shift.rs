#![allow(clippy::missing_transmute_annotations)]

use crate::backend::x64::emit_context::EmitContext;
use crate::backend::x64::emit_vector_helpers::*;
use crate::backend::x64::host_feature::HostFeature;
use crate::backend::x64::reg_alloc::RegAlloc;
use crate::ir::inst::Inst;
use crate::ir::value::InstRef;

fn replicate_byte(b: u8) -> u64 {
    b as u64 * 0x0101_0101_0101_0101
}

// ---------------------------------------------------------------------------
// VectorLogicalShiftLeft by immediate
//
// There is no 8-bit lane shift in SSE; shift words and mask off the bits
// dragged across lane boundaries.
// ---------------------------------------------------------------------------

pub fn emit_vector_logical_shift_left8(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let result = ra.use_scratch_xmm(&mut args[0]);
    let shift_amount = args[1].get_immediate_u8();

    if shift_amount == 1 {
        ra.asm.paddb(result, result).unwrap();
    } else if shift_amount > 0 {
        let mask = replicate_byte(((0xFFu64 << shift_amount) & 0xFF) as u8);
        ra.asm.psllw(result, shift_amount).unwrap();
        let m = ra.asm.m_const(mask, mask).unwrap();
        ra.asm.pand_mem(result, m).unwrap();
    }

    ra.define_value(inst_ref, result);
}

pub fn emit_vector_logical_shift_left16(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_op_imm(ra, inst_ref, inst, crate::backend::x64::assembler::CodeAssembler::psllw);
}
pub fn emit_vector_logical_shift_left32(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_op_imm(ra, inst_ref, inst, crate::backend::x64::assembler::CodeAssembler::pslld);
}
pub fn emit_vector_logical_shift_left64(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_op_imm(ra, inst_ref, inst, crate::backend::x64::assembler::CodeAssembler::psllq);
}

// ---------------------------------------------------------------------------
// VectorLogicalShiftRight by immediate
// ---------------------------------------------------------------------------

pub fn emit_vector_logical_shift_right8(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let result = ra.use_scratch_xmm(&mut args[0]);
    let shift_amount = args[1].get_immediate_u8();

    if shift_amount > 0 {
        let mask = replicate_byte((0xFEu64 >> shift_amount) as u8);
        ra.asm.psrlw(result, shift_amount).unwrap();
        let m = ra.asm.m_const(mask, mask).unwrap();
        ra.asm.pand_mem(result, m).unwrap();
    }

    ra.define_value(inst_ref, result);
}

pub fn emit_vector_logical_shift_right16(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_op_imm(ra, inst_ref, inst, crate::backend::x64::assembler::CodeAssembler::psrlw);
}
pub fn emit_vector_logical_shift_right32(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_op_imm(ra, inst_ref, inst, crate::backend::x64::assembler::CodeAssembler::psrld);
}
pub fn emit_vector_logical_shift_right64(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_op_imm(ra, inst_ref, inst, crate::backend::x64::assembler::CodeAssembler::psrlq);
}

// ---------------------------------------------------------------------------
// VectorArithmeticShiftRight by immediate
// ---------------------------------------------------------------------------

/// Widen bytes into sign-extended words, shift by 8+n, repack.
/// Shared with the signed halving-add emitters.
pub(crate) fn arithmetic_shift_right_byte(
    ra: &mut RegAlloc,
    result: crate::backend::x64::assembler::Reg,
    shift_amount: u8,
) {
    let tmp = ra.scratch_xmm();
    ra.asm.punpckhbw(tmp, result).unwrap();
    ra.asm.punpcklbw(result, result).unwrap();
    ra.asm.psraw(tmp, 8 + shift_amount).unwrap();
    ra.asm.psraw(result, 8 + shift_amount).unwrap();
    ra.asm.packsswb(result, tmp).unwrap();
    ra.release(tmp);
}

pub fn emit_vector_arithmetic_shift_right8(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let result = ra.use_scratch_xmm(&mut args[0]);
    let shift_amount = args[1].get_immediate_u8();
    arithmetic_shift_right_byte(ra, result, shift_amount);
    ra.define_value(inst_ref, result);
}

pub fn emit_vector_arithmetic_shift_right16(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_op_imm(ra, inst_ref, inst, crate::backend::x64::assembler::CodeAssembler::psraw);
}
pub fn emit_vector_arithmetic_shift_right32(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_op_imm(ra, inst_ref, inst, crate::backend::x64::assembler::CodeAssembler::psrad);
}

pub fn emit_vector_arithmetic_shift_right64(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let result = ra.use_scratch_xmm(&mut args[0]);
    let shift_amount = args[1].get_immediate_u8().min(63);

    if ctx.has(HostFeature::AVX512VL) {
        ra.asm.vpsraq(result, result, shift_amount).unwrap();
    } else {
        // Shift logical, then subtract the masked sign bits to smear them.
        let tmp1 = ra.scratch_xmm();
        let tmp2 = ra.scratch_xmm();
        let sign_bit = 0x8000_0000_0000_0000u64 >> shift_amount;

        ra.asm.pxor(tmp2, tmp2).unwrap();
        ra.asm.psrlq(result, shift_amount).unwrap();
        let m = ra.asm.m_const(sign_bit, sign_bit).unwrap();
        ra.asm.movdqa_load(tmp1, m).unwrap();
        ra.asm.pand(tmp1, result).unwrap();
        ra.asm.psubq(tmp2, tmp1).unwrap();
        ra.asm.por(result, tmp2).unwrap();
        ra.release(tmp1);
        ra.release(tmp2);
    }

    ra.define_value(inst_ref, result);
}

// ---------------------------------------------------------------------------
// VectorLogicalVShift — per-lane dynamic shift by a signed byte amount
//
// Contract per lane: positive shifts go left (wrapping modulo 2^width),
// negative go right. Shifts at or past the lane width produce 0, except
// signed lanes shifted right that far, which propagate the sign.
// ---------------------------------------------------------------------------

macro_rules! define_vshift_signed {
    ($name:ident, $sty:ty, $uty:ty, $count:expr) => {
        extern "C" fn $name(result: *mut [u8; 16], a: *const [u8; 16], b: *const [u8; 16]) {
            unsafe {
                let va: [$sty; $count] = std::mem::transmute(*a);
                let vb: [$sty; $count] = std::mem::transmute(*b);
                let mut out = [0 as $sty; $count];
                let bits = <$sty>::BITS as i64;
                for i in 0..$count {
                    let shift = (vb[i] as u8 as i8) as i64;
                    out[i] = if shift >= bits {
                        0
                    } else if shift <= -bits {
                        va[i] >> (bits - 1)
                    } else if shift < 0 {
                        va[i] >> (-shift)
                    } else {
                        ((va[i] as $uty) << shift) as $sty
                    };
                }
                *result = std::mem::transmute(out);
            }
        }
    };
}

macro_rules! define_vshift_unsigned {
    ($name:ident, $ty:ty, $count:expr) => {
        extern "C" fn $name(result: *mut [u8; 16], a: *const [u8; 16], b: *const [u8; 16]) {
            unsafe {
                let va: [$ty; $count] = std::mem::transmute(*a);
                let vb: [$ty; $count] = std::mem::transmute(*b);
                let mut out = [0 as $ty; $count];
                let bits = <$ty>::BITS as i64;
                for i in 0..$count {
                    let shift = (vb[i] as u8 as i8) as i64;
                    out[i] = if shift <= -bits || shift >= bits {
                        0
                    } else if shift < 0 {
                        va[i] >> (-shift)
                    } else {
                        va[i] << shift
                    };
                }
                *result = std::mem::transmute(out);
            }
        }
    };
}

define_vshift_signed!(fallback_vshift_s8, i8, u8, 16);
define_vshift_signed!(fallback_vshift_s16, i16, u16, 8);
define_vshift_signed!(fallback_vshift_s32, i32, u32, 4);
define_vshift_signed!(fallback_vshift_s64, i64, u64, 2);
define_vshift_unsigned!(fallback_vshift_u8, u8, 16);
define_vshift_unsigned!(fallback_vshift_u16, u16, 8);
define_vshift_unsigned!(fallback_vshift_u32, u32, 4);
define_vshift_unsigned!(fallback_vshift_u64, u64, 2);

pub fn emit_vector_logical_vshift_s8(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_two_arg_fallback(ra, inst_ref, inst, fallback_vshift_s8 as usize);
}
pub fn emit_vector_logical_vshift_s16(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_two_arg_fallback(ra, inst_ref, inst, fallback_vshift_s16 as usize);
}
pub fn emit_vector_logical_vshift_s32(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_two_arg_fallback(ra, inst_ref, inst, fallback_vshift_s32 as usize);
}
pub fn emit_vector_logical_vshift_s64(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_two_arg_fallback(ra, inst_ref, inst, fallback_vshift_s64 as usize);
}
pub fn emit_vector_logical_vshift_u8(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_two_arg_fallback(ra, inst_ref, inst, fallback_vshift_u8 as usize);
}
pub fn emit_vector_logical_vshift_u16(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_two_arg_fallback(ra, inst_ref, inst, fallback_vshift_u16 as usize);
}
pub fn emit_vector_logical_vshift_u32(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_two_arg_fallback(ra, inst_ref, inst, fallback_vshift_u32 as usize);
}
pub fn emit_vector_logical_vshift_u64(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_two_arg_fallback(ra, inst_ref, inst, fallback_vshift_u64 as usize);
}

// ---------------------------------------------------------------------------
// VectorRoundingShiftLeft — dynamic shift rounding the last discarded bit
// toward +∞.
// ---------------------------------------------------------------------------

macro_rules! define_rounding_shift_left {
    ($name:ident, $ty:ty, $uty:ty, $count:expr, $signed:expr) => {
        extern "C" fn $name(result: *mut [u8; 16], a: *const [u8; 16], b: *const [u8; 16]) {
            unsafe {
                let va: [$ty; $count] = std::mem::transmute(*a);
                let vb: [$ty; $count] = std::mem::transmute(*b);
                let mut out = [0 as $ty; $count];
                let bits = <$ty>::BITS as i64;
                for i in 0..$count {
                    let shift = (vb[i] as u8 as i8) as i64;
                    if shift >= 0 {
                        out[i] = if shift >= bits {
                            0
                        } else {
                            ((va[i] as $uty) << shift) as $ty
                        };
                    } else if (!$signed && shift < -bits) || ($signed && shift <= -bits) {
                        out[i] = 0;
                    } else {
                        let shift_value = (-shift - 1) as u32;
                        let rounding = ((va[i] as $uty >> shift_value) & 1) as $ty;
                        if shift == -bits {
                            out[i] = rounding;
                        } else {
                            out[i] = (va[i] >> ((-shift) as u32)).wrapping_add(rounding);
                        }
                    }
                }
                *result = std::mem::transmute(out);
            }
        }
    };
}

define_rounding_shift_left!(fallback_rshift_s8, i8, u8, 16, true);
define_rounding_shift_left!(fallback_rshift_s16, i16, u16, 8, true);
define_rounding_shift_left!(fallback_rshift_s32, i32, u32, 4, true);
define_rounding_shift_left!(fallback_rshift_s64, i64, u64, 2, true);
define_rounding_shift_left!(fallback_rshift_u8, u8, u8, 16, false);
define_rounding_shift_left!(fallback_rshift_u16, u16, u16, 8, false);
define_rounding_shift_left!(fallback_rshift_u32, u32, u32, 4, false);
define_rounding_shift_left!(fallback_rshift_u64, u64, u64, 2, false);

pub fn emit_vector_rounding_shift_left_s8(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_two_arg_fallback(ra, inst_ref, inst, fallback_rshift_s8 as usize);
}
pub fn emit_vector_rounding_shift_left_s16(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_two_arg_fallback(ra, inst_ref, inst, fallback_rshift_s16 as usize);
}
pub fn emit_vector_rounding_shift_left_s32(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_two_arg_fallback(ra, inst_ref, inst, fallback_rshift_s32 as usize);
}
pub fn emit_vector_rounding_shift_left_s64(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_two_arg_fallback(ra, inst_ref, inst, fallback_rshift_s64 as usize);
}
pub fn emit_vector_rounding_shift_left_u8(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_two_arg_fallback(ra, inst_ref, inst, fallback_rshift_u8 as usize);
}
pub fn emit_vector_rounding_shift_left_u16(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_two_arg_fallback(ra, inst_ref, inst, fallback_rshift_u16 as usize);
}
pub fn emit_vector_rounding_shift_left_u32(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_two_arg_fallback(ra, inst_ref, inst, fallback_rshift_u32 as usize);
}
pub fn emit_vector_rounding_shift_left_u64(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_two_arg_fallback(ra, inst_ref, inst, fallback_rshift_u64 as usize);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lanes8(bytes: [u8; 16]) -> [u8; 16] {
        bytes
    }

    #[test]
    fn test_vshift_signed_sign_propagation() {
        // shift = -8 on i8 propagates the sign bit.
        let a = lanes8([0x80; 16]);
        let b = lanes8([0xF8; 16]); // -8
        let mut out = [0u8; 16];
        fallback_vshift_s8(&mut out, &a, &b);
        assert_eq!(out, [0xFF; 16]);
    }

    #[test]
    fn test_vshift_unsigned_saturates_to_zero() {
        let a = lanes8([0xFF; 16]);
        let b = lanes8([8; 16]);
        let mut out = [1u8; 16];
        fallback_vshift_u8(&mut out, &a, &b);
        assert_eq!(out, [0; 16]);
    }

    #[test]
    fn test_vshift_negative_is_logical_for_unsigned() {
        let a = lanes8([0x80; 16]);
        let b = lanes8([0xFF; 16]); // -1
        let mut out = [0u8; 16];
        fallback_vshift_u8(&mut out, &a, &b);
        assert_eq!(out, [0x40; 16]);
    }

    #[test]
    fn test_rounding_shift_right_adds_rounding_bit() {
        // 3 >> 1 with rounding = 2.
        let a = lanes8([3; 16]);
        let b = lanes8([0xFF; 16]); // -1
        let mut out = [0u8; 16];
        fallback_rshift_u8(&mut out, &a, &b);
        assert_eq!(out, [2; 16]);
    }

    #[test]
    fn test_rounding_shift_exact_width_unsigned() {
        // shift = -8 on u8: result is the top bit of the input.
        let a = lanes8([0x80; 16]);
        let b = lanes8([0xF8; 16]);
        let mut out = [9u8; 16];
        fallback_rshift_u8(&mut out, &a, &b);
        assert_eq!(out, [1; 16]);
    }

    #[test]
    fn test_rounding_shift_exact_width_signed_is_zero() {
        let a = lanes8([0x80; 16]);
        let b = lanes8([0xF8; 16]);
        let mut out = [9u8; 16];
        fallback_rshift_s8(&mut out, &a, &b);
        assert_eq!(out, [0; 16]);
    }
}
