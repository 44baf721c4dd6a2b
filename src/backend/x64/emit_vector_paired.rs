#![allow(clippy::missing_transmute_annotations)]

use crate::backend::x64::emit_context::EmitContext;
use crate::backend::x64::emit_vector_helpers::*;
use crate::backend::x64::host_feature::HostFeature;
use crate::backend::x64::reg_alloc::RegAlloc;
use crate::ir::inst::Inst;
use crate::ir::value::InstRef;

// ---------------------------------------------------------------------------
// VectorPairedAdd — adjacent-pair sums at the same width, result packing
// lhs pairs into the low half and rhs pairs into the high half.
// ---------------------------------------------------------------------------

pub fn emit_vector_paired_add8(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let a = ra.use_scratch_xmm(&mut args[0]);
    let b = ra.use_scratch_xmm(&mut args[1]);
    let c = ra.scratch_xmm();
    let d = ra.scratch_xmm();

    ra.asm.movdqa(c, a).unwrap();
    ra.asm.movdqa(d, b).unwrap();
    ra.asm.psllw(a, 8).unwrap();
    ra.asm.psllw(b, 8).unwrap();
    ra.asm.paddw(a, c).unwrap();
    ra.asm.paddw(b, d).unwrap();
    ra.asm.psrlw(a, 8).unwrap();
    ra.asm.psrlw(b, 8).unwrap();
    ra.asm.packuswb(a, b).unwrap();

    ra.release(b);
    ra.release(c);
    ra.release(d);
    ra.define_value(inst_ref, a);
}

pub fn emit_vector_paired_add16(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    if ctx.has(HostFeature::SSSE3) {
        let mut args = ra.get_argument_info(&inst.args, inst.num_args());
        let a = ra.use_scratch_xmm(&mut args[0]);
        let b = ra.use_xmm(&mut args[1]);
        ra.asm.phaddw(a, b).unwrap();
        ra.release(b);
        ra.define_value(inst_ref, a);
        return;
    }

    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let a = ra.use_scratch_xmm(&mut args[0]);
    let b = ra.use_scratch_xmm(&mut args[1]);
    let c = ra.scratch_xmm();
    let d = ra.scratch_xmm();

    ra.asm.movdqa(c, a).unwrap();
    ra.asm.movdqa(d, b).unwrap();
    ra.asm.pslld(a, 16).unwrap();
    ra.asm.pslld(b, 16).unwrap();
    ra.asm.paddd(a, c).unwrap();
    ra.asm.paddd(b, d).unwrap();
    ra.asm.psrad(a, 16).unwrap();
    ra.asm.psrad(b, 16).unwrap();
    ra.asm.packssdw(a, b).unwrap();

    ra.release(b);
    ra.release(c);
    ra.release(d);
    ra.define_value(inst_ref, a);
}

pub fn emit_vector_paired_add32(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    if ctx.has(HostFeature::SSSE3) {
        let mut args = ra.get_argument_info(&inst.args, inst.num_args());
        let a = ra.use_scratch_xmm(&mut args[0]);
        let b = ra.use_xmm(&mut args[1]);
        ra.asm.phaddd(a, b).unwrap();
        ra.release(b);
        ra.define_value(inst_ref, a);
        return;
    }

    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let a = ra.use_scratch_xmm(&mut args[0]);
    let b = ra.use_scratch_xmm(&mut args[1]);
    let c = ra.scratch_xmm();
    let d = ra.scratch_xmm();

    ra.asm.movdqa(c, a).unwrap();
    ra.asm.movdqa(d, b).unwrap();
    ra.asm.psllq(a, 32).unwrap();
    ra.asm.psllq(b, 32).unwrap();
    ra.asm.paddq(a, c).unwrap();
    ra.asm.paddq(b, d).unwrap();
    ra.asm.shufps(a, b, 0b11011101).unwrap();

    ra.release(b);
    ra.release(c);
    ra.release(d);
    ra.define_value(inst_ref, a);
}

pub fn emit_vector_paired_add64(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let a = ra.use_scratch_xmm(&mut args[0]);
    let b = ra.use_xmm(&mut args[1]);
    let c = ra.scratch_xmm();

    ra.asm.movdqa(c, a).unwrap();
    ra.asm.punpcklqdq(a, b).unwrap();
    ra.asm.punpckhqdq(c, b).unwrap();
    ra.asm.paddq(a, c).unwrap();

    ra.release(b);
    ra.release(c);
    ra.define_value(inst_ref, a);
}

// ---------------------------------------------------------------------------
// VectorPairedAddLower — as above but over the low 64 bits of each operand,
// upper half of the result zeroed.
// ---------------------------------------------------------------------------

pub fn emit_vector_paired_add_lower8(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let xmm_a = ra.use_scratch_xmm(&mut args[0]);
    let xmm_b = ra.use_xmm(&mut args[1]);
    let tmp = ra.scratch_xmm();

    ra.asm.punpcklqdq(xmm_a, xmm_b).unwrap();
    ra.asm.movdqa(tmp, xmm_a).unwrap();
    ra.asm.psllw(xmm_a, 8).unwrap();
    ra.asm.paddw(xmm_a, tmp).unwrap();
    ra.asm.pxor(tmp, tmp).unwrap();
    ra.asm.psrlw(xmm_a, 8).unwrap();
    ra.asm.packuswb(xmm_a, tmp).unwrap();

    ra.release(xmm_b);
    ra.release(tmp);
    ra.define_value(inst_ref, xmm_a);
}

pub fn emit_vector_paired_add_lower16(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let xmm_a = ra.use_scratch_xmm(&mut args[0]);
    let xmm_b = ra.use_xmm(&mut args[1]);
    let tmp = ra.scratch_xmm();

    ra.asm.punpcklqdq(xmm_a, xmm_b).unwrap();
    if ctx.has(HostFeature::SSSE3) {
        ra.asm.pxor(tmp, tmp).unwrap();
        ra.asm.phaddw(xmm_a, tmp).unwrap();
    } else {
        ra.asm.movdqa(tmp, xmm_a).unwrap();
        ra.asm.pslld(xmm_a, 16).unwrap();
        ra.asm.paddd(xmm_a, tmp).unwrap();
        ra.asm.pxor(tmp, tmp).unwrap();
        ra.asm.psrad(xmm_a, 16).unwrap();
        // packusdw is SSE4.1, hence the arithmetic shift above.
        ra.asm.packssdw(xmm_a, tmp).unwrap();
    }

    ra.release(xmm_b);
    ra.release(tmp);
    ra.define_value(inst_ref, xmm_a);
}

pub fn emit_vector_paired_add_lower32(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let xmm_a = ra.use_scratch_xmm(&mut args[0]);
    let xmm_b = ra.use_xmm(&mut args[1]);
    let tmp = ra.scratch_xmm();

    ra.asm.punpcklqdq(xmm_a, xmm_b).unwrap();
    if ctx.has(HostFeature::SSSE3) {
        ra.asm.pxor(tmp, tmp).unwrap();
        ra.asm.phaddd(xmm_a, tmp).unwrap();
    } else {
        ra.asm.movdqa(tmp, xmm_a).unwrap();
        ra.asm.psllq(xmm_a, 32).unwrap();
        ra.asm.paddq(xmm_a, tmp).unwrap();
        ra.asm.psrlq(xmm_a, 32).unwrap();
        ra.asm.pshufd(xmm_a, xmm_a, 0b11011000).unwrap();
    }

    ra.release(xmm_b);
    ra.release(tmp);
    ra.define_value(inst_ref, xmm_a);
}

// ---------------------------------------------------------------------------
// VectorPairedAddWiden — pair-sum into the next wider lane
// ---------------------------------------------------------------------------

pub fn emit_vector_paired_add_signed_widen8(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let a = ra.use_scratch_xmm(&mut args[0]);
    let c = ra.scratch_xmm();

    ra.asm.movdqa(c, a).unwrap();
    ra.asm.psllw(a, 8).unwrap();
    ra.asm.psraw(c, 8).unwrap();
    ra.asm.psraw(a, 8).unwrap();
    ra.asm.paddw(a, c).unwrap();

    ra.release(c);
    ra.define_value(inst_ref, a);
}

pub fn emit_vector_paired_add_signed_widen16(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let a = ra.use_scratch_xmm(&mut args[0]);
    let c = ra.scratch_xmm();

    ra.asm.movdqa(c, a).unwrap();
    ra.asm.pslld(a, 16).unwrap();
    ra.asm.psrad(c, 16).unwrap();
    ra.asm.psrad(a, 16).unwrap();
    ra.asm.paddd(a, c).unwrap();

    ra.release(c);
    ra.define_value(inst_ref, a);
}

pub fn emit_vector_paired_add_signed_widen32(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let a = ra.use_scratch_xmm(&mut args[0]);
    let c = ra.scratch_xmm();

    if ctx.has(HostFeature::AVX512VL) {
        ra.asm.vpsraq(c, a, 32).unwrap();
        ra.asm.psllq(a, 32).unwrap();
        ra.asm.vpsraq(a, a, 32).unwrap();
        ra.asm.paddq(a, c).unwrap();
    } else {
        // Sign-extend both halves by ORing smeared sign bits over the
        // logically-shifted lanes.
        let tmp1 = ra.scratch_xmm();
        let tmp2 = ra.scratch_xmm();

        ra.asm.movdqa(c, a).unwrap();
        ra.asm.psllq(a, 32).unwrap();
        let m = ra.asm.m_const(0x8000000000000000, 0x8000000000000000).unwrap();
        ra.asm.movdqa_load(tmp1, m).unwrap();
        ra.asm.movdqa(tmp2, tmp1).unwrap();
        ra.asm.pand(tmp1, a).unwrap();
        ra.asm.pand(tmp2, c).unwrap();
        ra.asm.psrlq(a, 32).unwrap();
        ra.asm.psrlq(c, 32).unwrap();
        ra.asm.psrad(tmp1, 31).unwrap();
        ra.asm.psrad(tmp2, 31).unwrap();
        ra.asm.por(a, tmp1).unwrap();
        ra.asm.por(c, tmp2).unwrap();
        ra.asm.paddq(a, c).unwrap();

        ra.release(tmp1);
        ra.release(tmp2);
    }

    ra.release(c);
    ra.define_value(inst_ref, a);
}

pub fn emit_vector_paired_add_unsigned_widen8(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let a = ra.use_scratch_xmm(&mut args[0]);
    let c = ra.scratch_xmm();

    ra.asm.movdqa(c, a).unwrap();
    ra.asm.psllw(a, 8).unwrap();
    ra.asm.psrlw(c, 8).unwrap();
    ra.asm.psrlw(a, 8).unwrap();
    ra.asm.paddw(a, c).unwrap();

    ra.release(c);
    ra.define_value(inst_ref, a);
}

pub fn emit_vector_paired_add_unsigned_widen16(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let a = ra.use_scratch_xmm(&mut args[0]);
    let c = ra.scratch_xmm();

    ra.asm.movdqa(c, a).unwrap();
    ra.asm.pslld(a, 16).unwrap();
    ra.asm.psrld(c, 16).unwrap();
    ra.asm.psrld(a, 16).unwrap();
    ra.asm.paddd(a, c).unwrap();

    ra.release(c);
    ra.define_value(inst_ref, a);
}

pub fn emit_vector_paired_add_unsigned_widen32(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let a = ra.use_scratch_xmm(&mut args[0]);
    let c = ra.scratch_xmm();

    ra.asm.movdqa(c, a).unwrap();
    ra.asm.psllq(a, 32).unwrap();
    ra.asm.psrlq(c, 32).unwrap();
    ra.asm.psrlq(a, 32).unwrap();
    ra.asm.paddq(a, c).unwrap();

    ra.release(c);
    ra.define_value(inst_ref, a);
}

// ---------------------------------------------------------------------------
// VectorPairedMin/Max — sequential pair-wise min/max
// ---------------------------------------------------------------------------

macro_rules! define_paired_minmax {
    ($name:ident, $ty:ty, $count:expr, $sel:ident) => {
        extern "C" fn $name(result: *mut [u8; 16], a: *const [u8; 16], b: *const [u8; 16]) {
            unsafe {
                let va: [$ty; $count] = std::mem::transmute(*a);
                let vb: [$ty; $count] = std::mem::transmute(*b);
                let mut out = [0 as $ty; $count];
                let range = $count / 2;
                for i in 0..range {
                    out[i] = va[2 * i].$sel(va[2 * i + 1]);
                    out[range + i] = vb[2 * i].$sel(vb[2 * i + 1]);
                }
                *result = std::mem::transmute(out);
            }
        }
    };
}

define_paired_minmax!(fallback_paired_max_s8, i8, 16, max);
define_paired_minmax!(fallback_paired_max_s16, i16, 8, max);
define_paired_minmax!(fallback_paired_max_u8, u8, 16, max);
define_paired_minmax!(fallback_paired_max_u16, u16, 8, max);
define_paired_minmax!(fallback_paired_min_s8, i8, 16, min);
define_paired_minmax!(fallback_paired_min_s16, i16, 8, min);
define_paired_minmax!(fallback_paired_min_u8, u8, 16, min);
define_paired_minmax!(fallback_paired_min_u16, u16, 8, min);

pub fn emit_vector_paired_max_s8(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_two_arg_fallback(ra, inst_ref, inst, fallback_paired_max_s8 as usize);
}
pub fn emit_vector_paired_max_s16(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_two_arg_fallback(ra, inst_ref, inst, fallback_paired_max_s16 as usize);
}
pub fn emit_vector_paired_max_u8(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_two_arg_fallback(ra, inst_ref, inst, fallback_paired_max_u8 as usize);
}
pub fn emit_vector_paired_max_u16(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_two_arg_fallback(ra, inst_ref, inst, fallback_paired_max_u16 as usize);
}
pub fn emit_vector_paired_min_s8(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_two_arg_fallback(ra, inst_ref, inst, fallback_paired_min_s8 as usize);
}
pub fn emit_vector_paired_min_s16(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_two_arg_fallback(ra, inst_ref, inst, fallback_paired_min_s16 as usize);
}
pub fn emit_vector_paired_min_u8(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_two_arg_fallback(ra, inst_ref, inst, fallback_paired_min_u8 as usize);
}
pub fn emit_vector_paired_min_u16(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_two_arg_fallback(ra, inst_ref, inst, fallback_paired_min_u16 as usize);
}

/// Interleave the even/odd lanes of both operands with shufps, then a
/// 4-lane min/max folds each adjacent pair.
fn emit_vector_paired_minmax32(
    ctx: &EmitContext,
    ra: &mut RegAlloc,
    inst_ref: InstRef,
    inst: &Inst,
    signed: bool,
    is_max: bool,
) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let x = ra.use_scratch_xmm(&mut args[0]);
    let y = ra.use_xmm(&mut args[1]);
    let tmp = ra.scratch_xmm();

    ra.asm.movdqa(tmp, x).unwrap();
    ra.asm.shufps(tmp, y, 0b10001000).unwrap();
    ra.asm.shufps(x, y, 0b11011101).unwrap();

    if ctx.has(HostFeature::SSE41) {
        match (signed, is_max) {
            (true, true) => ra.asm.pmaxsd(x, tmp).unwrap(),
            (true, false) => ra.asm.pminsd(x, tmp).unwrap(),
            (false, true) => ra.asm.pmaxud(x, tmp).unwrap(),
            (false, false) => ra.asm.pminud(x, tmp).unwrap(),
        }

        ra.release(y);
        ra.release(tmp);
        ra.define_value(inst_ref, x);
        return;
    }

    if signed {
        let tmp2 = ra.scratch_xmm();
        if is_max {
            ra.asm.movdqa(tmp2, tmp).unwrap();
            ra.asm.pcmpgtd(tmp2, x).unwrap();
            ra.asm.pand(tmp, tmp2).unwrap();
            ra.asm.pandn(tmp2, x).unwrap();
            ra.asm.por(tmp2, tmp).unwrap();
        } else {
            ra.asm.movdqa(tmp2, x).unwrap();
            ra.asm.pcmpgtd(tmp2, tmp).unwrap();
            ra.asm.pand(tmp, tmp2).unwrap();
            ra.asm.pandn(tmp2, x).unwrap();
            ra.asm.por(tmp2, tmp).unwrap();
        }
        ra.release(y);
        ra.release(x);
        ra.release(tmp);
        ra.define_value(inst_ref, tmp2);
        return;
    }

    // Unsigned compare-blend: bias into signed range first.
    let tmp2 = ra.scratch_xmm();
    let tmp3 = ra.scratch_xmm();
    let m = ra.asm.m_const(0x8000000080000000, 0x8000000080000000).unwrap();
    ra.asm.movdqa_load(tmp3, m).unwrap();

    if is_max {
        ra.asm.movdqa(tmp2, x).unwrap();
        ra.asm.pxor(tmp2, tmp3).unwrap();
        ra.asm.pxor(tmp3, tmp).unwrap();
        ra.asm.pcmpgtd(tmp3, tmp2).unwrap();
    } else {
        ra.asm.movdqa(tmp2, tmp).unwrap();
        ra.asm.pxor(tmp2, tmp3).unwrap();
        ra.asm.pxor(tmp3, x).unwrap();
        ra.asm.pcmpgtd(tmp3, tmp2).unwrap();
    }
    ra.asm.pand(tmp, tmp3).unwrap();
    ra.asm.pandn(tmp3, x).unwrap();
    ra.asm.por(tmp, tmp3).unwrap();

    ra.release(y);
    ra.release(x);
    ra.release(tmp2);
    ra.release(tmp3);
    ra.define_value(inst_ref, tmp);
}

pub fn emit_vector_paired_max_s32(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_paired_minmax32(ctx, ra, inst_ref, inst, true, true);
}
pub fn emit_vector_paired_max_u32(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_paired_minmax32(ctx, ra, inst_ref, inst, false, true);
}
pub fn emit_vector_paired_min_s32(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_paired_minmax32(ctx, ra, inst_ref, inst, true, false);
}
pub fn emit_vector_paired_min_u32(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_paired_minmax32(ctx, ra, inst_ref, inst, false, false);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_paired_max_u8() {
        let a: [u8; 16] = [1, 9, 4, 2, 5, 5, 0, 7, 3, 3, 8, 1, 6, 2, 0, 255];
        let b: [u8; 16] = [0; 16];
        let mut out = [0u8; 16];
        fallback_paired_max_u8(&mut out, &a, &b);
        assert_eq!(&out[..8], &[9, 4, 5, 7, 3, 8, 6, 255]);
        assert_eq!(&out[8..], &[0; 8]);
    }

    #[test]
    fn test_fallback_paired_min_s16() {
        let a: [i16; 8] = [-5, 3, 100, -100, 0, 0, i16::MIN, i16::MAX];
        let b: [i16; 8] = [1, 2, 3, 4, 5, 6, 7, 8];
        let ab: [u8; 16] = unsafe { std::mem::transmute(a) };
        let bb: [u8; 16] = unsafe { std::mem::transmute(b) };
        let mut out = [0u8; 16];
        fallback_paired_min_s16(&mut out, &ab, &bb);
        let lanes: [i16; 8] = unsafe { std::mem::transmute(out) };
        assert_eq!(lanes, [-5, -100, 0, i16::MIN, 1, 3, 5, 7]);
    }
}
