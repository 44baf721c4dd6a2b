#![allow(clippy::missing_transmute_annotations)]

use crate::backend::x64::assembler::CodeAssembler;
use crate::backend::x64::emit_context::EmitContext;
use crate::backend::x64::emit_vector_helpers::*;
use crate::backend::x64::host_feature::HostFeature;
use crate::backend::x64::reg_alloc::RegAlloc;
use crate::ir::inst::Inst;
use crate::ir::value::InstRef;

// ---------------------------------------------------------------------------
// VectorMultiply
// ---------------------------------------------------------------------------

/// No byte multiply in SSE: multiply even and odd bytes as words and
/// recombine.
pub fn emit_vector_multiply8(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let a = ra.use_scratch_xmm(&mut args[0]);
    let b = ra.use_scratch_xmm(&mut args[1]);
    let tmp_a = ra.scratch_xmm();
    let tmp_b = ra.scratch_xmm();

    ra.asm.movdqa(tmp_a, a).unwrap();
    ra.asm.movdqa(tmp_b, b).unwrap();
    ra.asm.pmullw(a, b).unwrap();
    ra.asm.psrlw(tmp_a, 8).unwrap();
    ra.asm.psrlw(tmp_b, 8).unwrap();
    ra.asm.pmullw(tmp_a, tmp_b).unwrap();
    let m = ra.asm.m_const(0x00FF00FF00FF00FF, 0x00FF00FF00FF00FF).unwrap();
    ra.asm.pand_mem(a, m).unwrap();
    ra.asm.psllw(tmp_a, 8).unwrap();
    ra.asm.por(a, tmp_a).unwrap();

    ra.release(b);
    ra.release(tmp_a);
    ra.release(tmp_b);
    ra.define_value(inst_ref, a);
}

pub fn emit_vector_multiply16(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_op(ra, inst_ref, inst, CodeAssembler::pmullw);
}

pub fn emit_vector_multiply32(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    if ctx.has(HostFeature::SSE41) {
        emit_vector_op(ra, inst_ref, inst, CodeAssembler::pmulld);
        return;
    }

    // pmuludq on the even dwords and on the odd dwords, then reassemble.
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let a = ra.use_scratch_xmm(&mut args[0]);
    let b = ra.use_scratch_xmm(&mut args[1]);
    let tmp = ra.scratch_xmm();

    ra.asm.movdqa(tmp, a).unwrap();
    ra.asm.psrlq(a, 32).unwrap();
    ra.asm.pmuludq(tmp, b).unwrap();
    ra.asm.psrlq(b, 32).unwrap();
    ra.asm.pmuludq(a, b).unwrap();
    ra.asm.pshufd(tmp, tmp, 0b00001000).unwrap();
    ra.asm.pshufd(b, a, 0b00001000).unwrap();
    ra.asm.punpckldq(tmp, b).unwrap();

    ra.release(a);
    ra.release(b);
    ra.define_value(inst_ref, tmp);
}

pub fn emit_vector_multiply64(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    if ctx.has(HostFeature::AVX512DQ | HostFeature::AVX512VL) {
        emit_avx_vector_op(ra, inst_ref, inst, CodeAssembler::vpmullq);
        return;
    }

    if ctx.has(HostFeature::SSE41) {
        // Unrolled through the scalar multiplier.
        let mut args = ra.get_argument_info(&inst.args, inst.num_args());
        let a = ra.use_scratch_xmm(&mut args[0]);
        let b = ra.use_xmm(&mut args[1]);
        let tmp1 = ra.scratch_gpr();
        let tmp2 = ra.scratch_gpr();

        ra.asm.movq(tmp1, a).unwrap();
        ra.asm.movq(tmp2, b).unwrap();
        ra.asm.imul(tmp2, tmp1).unwrap();
        ra.asm.pextrq(tmp1, a, 1).unwrap();
        ra.asm.movq(a, tmp2).unwrap();
        ra.asm.pextrq(tmp2, b, 1).unwrap();
        ra.asm.imul(tmp1, tmp2).unwrap();
        ra.asm.pinsrq(a, tmp1, 1).unwrap();

        ra.release(b);
        ra.release(tmp1);
        ra.release(tmp2);
        ra.define_value(inst_ref, a);
        return;
    }

    // Schoolbook 64×64: lo·lo + ((lo·hi + hi·lo) << 32).
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let a = ra.use_xmm(&mut args[0]);
    let b = ra.use_scratch_xmm(&mut args[1]);
    let tmp1 = ra.scratch_xmm();
    let tmp2 = ra.scratch_xmm();
    let tmp3 = ra.scratch_xmm();

    ra.asm.movdqa(tmp1, a).unwrap();
    ra.asm.movdqa(tmp2, a).unwrap();
    ra.asm.movdqa(tmp3, b).unwrap();

    ra.asm.psrlq(tmp1, 32).unwrap();
    ra.asm.psrlq(tmp3, 32).unwrap();

    ra.asm.pmuludq(tmp2, b).unwrap();
    ra.asm.pmuludq(tmp3, a).unwrap();
    ra.asm.pmuludq(b, tmp1).unwrap();

    ra.asm.paddq(b, tmp3).unwrap();
    ra.asm.psllq(b, 32).unwrap();
    ra.asm.paddq(tmp2, b).unwrap();

    ra.release(a);
    ra.release(b);
    ra.release(tmp1);
    ra.release(tmp3);
    ra.define_value(inst_ref, tmp2);
}

// ---------------------------------------------------------------------------
// VectorPolynomialMultiply — carry-less products over GF(2)[x]
// ---------------------------------------------------------------------------

fn polynomial_multiply_u8(lhs: u8, rhs: u8) -> u8 {
    let mut res = 0u8;
    for i in 0..8 {
        if (lhs >> i) & 1 != 0 {
            res ^= rhs.wrapping_shl(i);
        }
    }
    res
}

extern "C" fn fallback_polynomial_multiply8(result: *mut [u8; 16], a: *const [u8; 16], b: *const [u8; 16]) {
    unsafe {
        let va = &*a;
        let vb = &*b;
        let dst = &mut *result;
        for i in 0..16 {
            dst[i] = polynomial_multiply_u8(va[i], vb[i]);
        }
    }
}

/// Widening carry-less product of the low eight byte lanes.
extern "C" fn fallback_polynomial_multiply_long8(result: *mut [u8; 16], a: *const [u8; 16], b: *const [u8; 16]) {
    unsafe {
        let va = &*a;
        let vb = &*b;
        let mut out = [0u16; 8];
        for i in 0..8 {
            let lhs = va[i] as u16;
            let rhs = vb[i] as u16;
            for bit in 0..8 {
                if (lhs >> bit) & 1 != 0 {
                    out[i] ^= rhs << bit;
                }
            }
        }
        *result = std::mem::transmute(out);
    }
}

/// 64×64 → 128 carry-less product of the low lanes.
extern "C" fn fallback_polynomial_multiply_long64(result: *mut [u8; 16], a: *const [u8; 16], b: *const [u8; 16]) {
    unsafe {
        let va: [u64; 2] = std::mem::transmute(*a);
        let vb: [u64; 2] = std::mem::transmute(*b);
        let lhs = va[0];
        let rhs = vb[0];

        let mut lo = 0u64;
        for i in 0..64 {
            if (lhs >> i) & 1 != 0 {
                lo ^= rhs.wrapping_shl(i);
            }
        }
        let mut hi = 0u64;
        for i in 1..64 {
            if (lhs >> i) & 1 != 0 {
                hi ^= rhs >> (64 - i);
            }
        }
        *result = std::mem::transmute([lo, hi]);
    }
}

pub fn emit_vector_polynomial_multiply8(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_two_arg_fallback(ra, inst_ref, inst, fallback_polynomial_multiply8 as usize);
}

pub fn emit_vector_polynomial_multiply_long8(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_two_arg_fallback(ra, inst_ref, inst, fallback_polynomial_multiply_long8 as usize);
}

pub fn emit_vector_polynomial_multiply_long64(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_two_arg_fallback(ra, inst_ref, inst, fallback_polynomial_multiply_long64 as usize);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polynomial_multiply_u8() {
        // x·x = x², no carries: 2 ⊗ 2 = 4.
        assert_eq!(polynomial_multiply_u8(2, 2), 4);
        // (x+1)·(x+1) = x²+1 (the cross terms cancel in GF(2)).
        assert_eq!(polynomial_multiply_u8(3, 3), 5);
        assert_eq!(polynomial_multiply_u8(0xFF, 0), 0);
    }

    #[test]
    fn test_polynomial_multiply_long64_degree() {
        // (x^63)·(x) = x^64 — lands entirely in the high half.
        let a: [u8; 16] = unsafe { std::mem::transmute([1u64 << 63, 0u64]) };
        let b: [u8; 16] = unsafe { std::mem::transmute([2u64, 0u64]) };
        let mut out = [0u8; 16];
        fallback_polynomial_multiply_long64(&mut out, &a, &b);
        let lanes: [u64; 2] = unsafe { std::mem::transmute(out) };
        assert_eq!(lanes, [0, 1]);
    }

    #[test]
    fn test_polynomial_multiply_long8_is_widening() {
        let mut a = [0u8; 16];
        let mut b = [0u8; 16];
        a[0] = 0x80;
        b[0] = 0x80;
        let mut out = [0u8; 16];
        fallback_polynomial_multiply_long8(&mut out, &a, &b);
        let lanes: [u16; 8] = unsafe { std::mem::transmute(out) };
        assert_eq!(lanes[0], 0x4000);
    }
}
