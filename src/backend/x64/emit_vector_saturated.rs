#![allow(clippy::missing_transmute_annotations)]

use crate::backend::x64::assembler::{dword_ptr, Address, Reg, RegExp, R15};
use crate::backend::x64::emit_context::EmitContext;
use crate::backend::x64::emit_vector_basic::{vector_abs16, vector_abs32, vector_abs64, vector_abs8};
use crate::backend::x64::emit_vector_helpers::*;
use crate::backend::x64::host_feature::HostFeature;
use crate::backend::x64::reg_alloc::RegAlloc;
use crate::ir::inst::Inst;
use crate::ir::value::InstRef;

fn int_min_mask(ra: &mut RegAlloc, esize: usize) -> Address {
    match esize {
        8 => ra.asm.m_const(0x8080808080808080, 0x8080808080808080),
        16 => ra.asm.m_const(0x8000800080008000, 0x8000800080008000),
        32 => ra.asm.m_const(0x8000000080000000, 0x8000000080000000),
        64 => ra.asm.m_const(0x8000000000000000, 0x8000000000000000),
        _ => unreachable!("bad saturation lane width"),
    }
    .unwrap()
}

/// pmovmskb mask selecting one bit per lane of the given width.
fn lane_test_mask(esize: usize) -> u32 {
    match esize {
        8 => 0b1111_1111_1111_1111,
        16 => 0b1010_1010_1010_1010,
        32 => 0b1000_1000_1000_1000,
        64 => 0b10000000_10000000,
        _ => unreachable!("bad saturation lane width"),
    }
}

fn vector_equality(ra: &mut RegAlloc, esize: usize, x: Reg, y: Reg) {
    match esize {
        8 => ra.asm.pcmpeqb(x, y).unwrap(),
        16 => ra.asm.pcmpeqw(x, y).unwrap(),
        32 => ra.asm.pcmpeqd(x, y).unwrap(),
        64 => ra.asm.pcmpeqq(x, y).unwrap(),
        _ => unreachable!("bad saturation lane width"),
    }
}

fn vector_equality_mem(ra: &mut RegAlloc, esize: usize, x: Reg, addr: Address) {
    match esize {
        8 => ra.asm.pcmpeqb_mem(x, addr).unwrap(),
        16 => ra.asm.pcmpeqw_mem(x, addr).unwrap(),
        32 => ra.asm.pcmpeqd_mem(x, addr).unwrap(),
        64 => ra.asm.pcmpeqq_mem(x, addr).unwrap(),
        _ => unreachable!("bad saturation lane width"),
    }
}

/// `fpsr_qc |= (pmovmskb(mask_vec) & lane_mask) != 0`.
fn or_qc_from_mask(ctx: &EmitContext, ra: &mut RegAlloc, mask_vec: Reg, esize: usize) {
    let bit = ra.scratch_gpr();
    let bit32 = Reg::gpr32(bit.get_idx());
    let bit8 = Reg::gpr8(bit.get_idx());
    ra.asm.pmovmskb(bit32, mask_vec).unwrap();
    ra.asm.test_imm(bit32, lane_test_mask(esize)).unwrap();
    ra.asm.setnz(bit8).unwrap();
    ra.asm
        .or_store(dword_ptr(RegExp::from(R15) + ctx.fpsr_qc_offset), bit8)
        .unwrap();
    ra.release(bit);
}

// ---------------------------------------------------------------------------
// VectorSignedSaturatedAbs — |x| clamping INT_MIN to INT_MAX
// ---------------------------------------------------------------------------

fn emit_vector_signed_saturated_abs(
    esize: usize,
    ctx: &EmitContext,
    ra: &mut RegAlloc,
    inst_ref: InstRef,
    inst: &Inst,
) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let data = ra.use_scratch_xmm(&mut args[0]);
    let data_test = ra.scratch_xmm();
    let sign = ra.scratch_xmm();
    let mask = int_min_mask(ra, esize);

    // Keep the input around to decide whether the Q flag must be set.
    ra.asm.movdqa(data_test, data).unwrap();

    match esize {
        8 => vector_abs8(ctx, ra, data),
        16 => vector_abs16(ctx, ra, data),
        32 => vector_abs32(ctx, ra, data),
        64 => vector_abs64(ctx, ra, data),
        _ => unreachable!("bad saturation lane width"),
    }

    // Lanes still at INT_MIN after abs overflowed: flip them to INT_MAX.
    ra.asm.movdqa_load(sign, mask).unwrap();
    vector_equality(ra, esize, sign, data);
    ra.asm.pxor(data, sign).unwrap();

    // Any input lane equal to INT_MIN sets QC.
    vector_equality_mem(ra, esize, data_test, mask);
    or_qc_from_mask(ctx, ra, data_test, esize);

    ra.release(data_test);
    ra.release(sign);
    ra.define_value(inst_ref, data);
}

macro_rules! define_sat_abs_fallback {
    ($name:ident, $sty:ty, $count:expr) => {
        extern "C" fn $name(result: *mut [u8; 16], a: *const [u8; 16]) -> u32 {
            unsafe {
                let va: [$sty; $count] = std::mem::transmute(*a);
                let mut out = [0 as $sty; $count];
                let mut qc = 0u32;
                for i in 0..$count {
                    if va[i] == <$sty>::MIN {
                        out[i] = <$sty>::MAX;
                        qc = 1;
                    } else {
                        out[i] = va[i].abs();
                    }
                }
                *result = std::mem::transmute(out);
                qc
            }
        }
    };
}

define_sat_abs_fallback!(fallback_sat_abs64, i64, 2);

pub fn emit_vector_signed_saturated_abs8(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_signed_saturated_abs(8, ctx, ra, inst_ref, inst);
}
pub fn emit_vector_signed_saturated_abs16(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_signed_saturated_abs(16, ctx, ra, inst_ref, inst);
}
pub fn emit_vector_signed_saturated_abs32(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_signed_saturated_abs(32, ctx, ra, inst_ref, inst);
}
pub fn emit_vector_signed_saturated_abs64(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    // The 64-bit equality check needs pcmpeqq.
    if ctx.has(HostFeature::SSE41) {
        emit_vector_signed_saturated_abs(64, ctx, ra, inst_ref, inst);
        return;
    }
    emit_one_arg_fallback_saturated(ctx, ra, inst_ref, inst, fallback_sat_abs64 as usize);
}

// ---------------------------------------------------------------------------
// VectorSignedSaturatedNeg — 0 - x clamping INT_MIN to INT_MAX
// ---------------------------------------------------------------------------

fn emit_vector_signed_saturated_neg(
    esize: usize,
    ctx: &EmitContext,
    ra: &mut RegAlloc,
    inst_ref: InstRef,
    inst: &Inst,
) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let data = ra.use_xmm(&mut args[0]);
    let zero = ra.scratch_xmm();
    let tmp = ra.scratch_xmm();
    let mask = int_min_mask(ra, esize);

    ra.asm.movdqa(tmp, data).unwrap();
    vector_equality_mem(ra, esize, tmp, mask);

    ra.asm.pxor(zero, zero).unwrap();
    match esize {
        8 => ra.asm.psubsb(zero, data).unwrap(),
        16 => ra.asm.psubsw(zero, data).unwrap(),
        32 => {
            ra.asm.psubd(zero, data).unwrap();
            ra.asm.pxor(zero, tmp).unwrap();
        }
        64 => {
            ra.asm.psubq(zero, data).unwrap();
            ra.asm.pxor(zero, tmp).unwrap();
        }
        _ => unreachable!("bad saturation lane width"),
    }

    // Lanes that matched INT_MIN before negation set the Q bit.
    or_qc_from_mask(ctx, ra, tmp, esize);

    ra.release(data);
    ra.release(tmp);
    ra.define_value(inst_ref, zero);
}

macro_rules! define_sat_neg_fallback {
    ($name:ident, $sty:ty, $count:expr) => {
        extern "C" fn $name(result: *mut [u8; 16], a: *const [u8; 16]) -> u32 {
            unsafe {
                let va: [$sty; $count] = std::mem::transmute(*a);
                let mut out = [0 as $sty; $count];
                let mut qc = 0u32;
                for i in 0..$count {
                    if va[i] == <$sty>::MIN {
                        out[i] = <$sty>::MAX;
                        qc = 1;
                    } else {
                        out[i] = -va[i];
                    }
                }
                *result = std::mem::transmute(out);
                qc
            }
        }
    };
}

define_sat_neg_fallback!(fallback_sat_neg64, i64, 2);

pub fn emit_vector_signed_saturated_neg8(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_signed_saturated_neg(8, ctx, ra, inst_ref, inst);
}
pub fn emit_vector_signed_saturated_neg16(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_signed_saturated_neg(16, ctx, ra, inst_ref, inst);
}
pub fn emit_vector_signed_saturated_neg32(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_signed_saturated_neg(32, ctx, ra, inst_ref, inst);
}
pub fn emit_vector_signed_saturated_neg64(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    if ctx.has(HostFeature::SSE41) {
        emit_vector_signed_saturated_neg(64, ctx, ra, inst_ref, inst);
        return;
    }
    emit_one_arg_fallback_saturated(ctx, ra, inst_ref, inst, fallback_sat_neg64 as usize);
}

// ---------------------------------------------------------------------------
// VectorSignedSaturatedDoublingMultiplyReturnHigh — Q15/Q31 fixed point
// ---------------------------------------------------------------------------

pub fn emit_vector_signed_saturated_doubling_multiply_return_high16(
    ctx: &EmitContext,
    ra: &mut RegAlloc,
    inst_ref: InstRef,
    inst: &Inst,
) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let x = ra.use_scratch_xmm(&mut args[0]);
    let y = ra.use_scratch_xmm(&mut args[1]);
    let tmp = ra.scratch_xmm();

    // high(2ab) = (high(ab) << 1) | (low(ab) >> 15)
    ra.asm.movdqa(tmp, x).unwrap();
    ra.asm.pmulhw(tmp, y).unwrap();
    ra.asm.paddw(tmp, tmp).unwrap();
    ra.asm.pmullw(y, x).unwrap();
    ra.asm.psrlw(y, 15).unwrap();
    ra.asm.por(y, tmp).unwrap();

    // Only 0x8000 × 0x8000 produces 0x8000; saturate it to 0x7FFF.
    let m = ra.asm.m_const(0x8000800080008000, 0x8000800080008000).unwrap();
    ra.asm.movdqa_load(x, m).unwrap();
    ra.asm.pcmpeqw(x, y).unwrap();
    ra.asm.movdqa(tmp, x).unwrap();
    ra.asm.pxor(x, y).unwrap();

    or_qc_from_mask(ctx, ra, tmp, 16);

    ra.release(y);
    ra.release(tmp);
    ra.define_value(inst_ref, x);
}

extern "C" fn fallback_sat_doubling_multiply_high32(
    result: *mut [u8; 16],
    a: *const [u8; 16],
    b: *const [u8; 16],
) -> u32 {
    unsafe {
        let va: [i32; 4] = std::mem::transmute(*a);
        let vb: [i32; 4] = std::mem::transmute(*b);
        let mut out = [0i32; 4];
        let mut qc = 0u32;
        for i in 0..4 {
            let wide = (va[i] as i64).wrapping_mul(vb[i] as i64).wrapping_mul(2);
            let high = (wide >> 32) as i32;
            if va[i] == i32::MIN && vb[i] == i32::MIN {
                out[i] = i32::MAX;
                qc = 1;
            } else {
                out[i] = high;
            }
        }
        *result = std::mem::transmute(out);
        qc
    }
}

pub fn emit_vector_signed_saturated_doubling_multiply_return_high32(
    ctx: &EmitContext,
    ra: &mut RegAlloc,
    inst_ref: InstRef,
    inst: &Inst,
) {
    if !ctx.has(HostFeature::SSE41) {
        // pmuldq is SSE4.1.
        emit_two_arg_fallback_saturated(ctx, ra, inst_ref, inst, fallback_sat_doubling_multiply_high32 as usize);
        return;
    }

    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let x = ra.use_scratch_xmm(&mut args[0]);
    let y = ra.use_scratch_xmm(&mut args[1]);
    let tmp1 = ra.scratch_xmm();
    let tmp2 = ra.scratch_xmm();

    // Even lanes.
    ra.asm.movdqa(tmp1, x).unwrap();
    ra.asm.punpckldq(tmp1, y).unwrap();
    ra.asm.movdqa(tmp2, y).unwrap();
    ra.asm.punpckldq(tmp2, x).unwrap();
    ra.asm.pmuldq(tmp2, tmp1).unwrap();
    ra.asm.paddq(tmp2, tmp2).unwrap();

    // Odd lanes.
    ra.asm.movdqa(tmp1, x).unwrap();
    ra.asm.punpckhdq(tmp1, y).unwrap();
    ra.asm.punpckhdq(y, x).unwrap();
    ra.asm.pmuldq(y, tmp1).unwrap();
    ra.asm.paddq(y, y).unwrap();

    // Collect the high dwords.
    ra.asm.pshufd(tmp1, tmp2, 0b11101101).unwrap();
    ra.asm.pshufd(x, y, 0b11101101).unwrap();
    ra.asm.punpcklqdq(tmp1, x).unwrap();

    let m = ra.asm.m_const(0x8000000080000000, 0x8000000080000000).unwrap();
    ra.asm.movdqa_load(x, m).unwrap();
    ra.asm.pcmpeqd(x, tmp1).unwrap();
    ra.asm.movdqa(tmp2, x).unwrap();
    ra.asm.pxor(x, tmp1).unwrap();

    or_qc_from_mask(ctx, ra, tmp2, 32);

    ra.release(y);
    ra.release(tmp1);
    ra.release(tmp2);
    ra.define_value(inst_ref, x);
}

// ---------------------------------------------------------------------------
// Saturated narrows
//
// Pack with saturation, rebuild a widened reconstruction, and set QC when
// the reconstruction no longer matches the input.
// ---------------------------------------------------------------------------

fn emit_qc_from_reconstruction(ctx: &EmitContext, ra: &mut RegAlloc, reconstructed: Reg, src: Reg) {
    let bit = ra.scratch_gpr();
    let bit32 = Reg::gpr32(bit.get_idx());
    let bit8 = Reg::gpr8(bit.get_idx());

    if ctx.has(HostFeature::SSE41) {
        ra.asm.pxor(reconstructed, src).unwrap();
        ra.asm.ptest(reconstructed, reconstructed).unwrap();
    } else {
        ra.asm.pcmpeqd(reconstructed, src).unwrap();
        ra.asm.movmskps(bit32, reconstructed).unwrap();
        ra.asm.cmp_imm(bit32, 0xF).unwrap();
    }

    ra.asm.setnz(bit8).unwrap();
    ra.asm
        .or_store(dword_ptr(RegExp::from(R15) + ctx.fpsr_qc_offset), bit8)
        .unwrap();
    ra.release(bit);
}

fn emit_vector_signed_saturated_narrow_to_signed(
    original_esize: usize,
    ctx: &EmitContext,
    ra: &mut RegAlloc,
    inst_ref: InstRef,
    inst: &Inst,
) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let src = ra.use_xmm(&mut args[0]);
    let dest = ra.scratch_xmm();
    let reconstructed = ra.scratch_xmm();
    let sign = ra.scratch_xmm();

    ra.asm.movdqa(dest, src).unwrap();

    match original_esize {
        16 => {
            ra.asm.packsswb(dest, dest).unwrap();
            ra.asm.movdqa(sign, src).unwrap();
            ra.asm.psraw(sign, 15).unwrap();
            ra.asm.packsswb(sign, sign).unwrap();
            ra.asm.movdqa(reconstructed, dest).unwrap();
            ra.asm.punpcklbw(reconstructed, sign).unwrap();
        }
        32 => {
            ra.asm.packssdw(dest, dest).unwrap();
            ra.asm.movdqa(reconstructed, dest).unwrap();
            ra.asm.movdqa(sign, dest).unwrap();
            ra.asm.psraw(sign, 15).unwrap();
            ra.asm.punpcklwd(reconstructed, sign).unwrap();
        }
        _ => unreachable!("bad narrow lane width"),
    }

    emit_qc_from_reconstruction(ctx, ra, reconstructed, src);

    ra.release(src);
    ra.release(reconstructed);
    ra.release(sign);
    ra.define_value(inst_ref, dest);
}

pub fn emit_vector_signed_saturated_narrow_to_signed16(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_signed_saturated_narrow_to_signed(16, ctx, ra, inst_ref, inst);
}
pub fn emit_vector_signed_saturated_narrow_to_signed32(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_signed_saturated_narrow_to_signed(32, ctx, ra, inst_ref, inst);
}

extern "C" fn fallback_sat_narrow_ss64(result: *mut [u8; 16], a: *const [u8; 16]) -> u32 {
    unsafe {
        let va: [i64; 2] = std::mem::transmute(*a);
        let mut out = [0i32; 4];
        let mut qc = 0u32;
        for i in 0..2 {
            let saturated = va[i].clamp(i32::MIN as i64, i32::MAX as i64);
            out[i] = saturated as i32;
            qc |= (saturated != va[i]) as u32;
        }
        *result = std::mem::transmute(out);
        qc
    }
}

pub fn emit_vector_signed_saturated_narrow_to_signed64(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_one_arg_fallback_saturated(ctx, ra, inst_ref, inst, fallback_sat_narrow_ss64 as usize);
}

fn emit_vector_signed_saturated_narrow_to_unsigned(
    original_esize: usize,
    ctx: &EmitContext,
    ra: &mut RegAlloc,
    inst_ref: InstRef,
    inst: &Inst,
) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let src = ra.use_xmm(&mut args[0]);
    let dest = ra.scratch_xmm();
    let reconstructed = ra.scratch_xmm();
    let zero = ra.scratch_xmm();

    ra.asm.movdqa(dest, src).unwrap();
    ra.asm.pxor(zero, zero).unwrap();

    match original_esize {
        16 => {
            ra.asm.packuswb(dest, dest).unwrap();
            ra.asm.movdqa(reconstructed, dest).unwrap();
            ra.asm.punpcklbw(reconstructed, zero).unwrap();
        }
        32 => {
            assert!(ctx.has(HostFeature::SSE41), "packusdw requires SSE4.1");
            ra.asm.packusdw(dest, dest).unwrap();
            ra.asm.movdqa(reconstructed, dest).unwrap();
            ra.asm.punpcklwd(reconstructed, zero).unwrap();
        }
        _ => unreachable!("bad narrow lane width"),
    }

    emit_qc_from_reconstruction(ctx, ra, reconstructed, src);

    ra.release(src);
    ra.release(reconstructed);
    ra.release(zero);
    ra.define_value(inst_ref, dest);
}

pub fn emit_vector_signed_saturated_narrow_to_unsigned16(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_signed_saturated_narrow_to_unsigned(16, ctx, ra, inst_ref, inst);
}

extern "C" fn fallback_sat_narrow_su32(result: *mut [u8; 16], a: *const [u8; 16]) -> u32 {
    unsafe {
        let va: [i32; 4] = std::mem::transmute(*a);
        let mut out = [0u16; 8];
        let mut qc = 0u32;
        for i in 0..4 {
            let saturated = va[i].clamp(0, 0xFFFF);
            out[i] = saturated as u16;
            qc |= (saturated != va[i]) as u32;
        }
        *result = std::mem::transmute(out);
        qc
    }
}

pub fn emit_vector_signed_saturated_narrow_to_unsigned32(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    if ctx.has(HostFeature::SSE41) {
        emit_vector_signed_saturated_narrow_to_unsigned(32, ctx, ra, inst_ref, inst);
        return;
    }
    emit_one_arg_fallback_saturated(ctx, ra, inst_ref, inst, fallback_sat_narrow_su32 as usize);
}

extern "C" fn fallback_sat_narrow_su64(result: *mut [u8; 16], a: *const [u8; 16]) -> u32 {
    unsafe {
        let va: [i64; 2] = std::mem::transmute(*a);
        let mut out = [0u32; 4];
        let mut qc = 0u32;
        for i in 0..2 {
            let saturated = va[i].clamp(0, 0xFFFF_FFFF);
            out[i] = saturated as u32;
            qc |= (saturated != va[i]) as u32;
        }
        *result = std::mem::transmute(out);
        qc
    }
}

pub fn emit_vector_signed_saturated_narrow_to_unsigned64(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_one_arg_fallback_saturated(ctx, ra, inst_ref, inst, fallback_sat_narrow_su64 as usize);
}

macro_rules! define_unsigned_sat_narrow {
    ($name:ident, $wide:ty, $narrow:ty, $count:expr) => {
        extern "C" fn $name(result: *mut [u8; 16], a: *const [u8; 16]) -> u32 {
            unsafe {
                let va: [$wide; $count] = std::mem::transmute(*a);
                let mut out = [0 as $narrow; 2 * $count];
                let mut qc = 0u32;
                for i in 0..$count {
                    let saturated = va[i].min(<$narrow>::MAX as $wide);
                    out[i] = saturated as $narrow;
                    qc |= (saturated != va[i]) as u32;
                }
                *result = std::mem::transmute(out);
                qc
            }
        }
    };
}

define_unsigned_sat_narrow!(fallback_unsigned_sat_narrow16, u16, u8, 8);
define_unsigned_sat_narrow!(fallback_unsigned_sat_narrow32, u32, u16, 4);
define_unsigned_sat_narrow!(fallback_unsigned_sat_narrow64, u64, u32, 2);

pub fn emit_vector_unsigned_saturated_narrow16(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_one_arg_fallback_saturated(ctx, ra, inst_ref, inst, fallback_unsigned_sat_narrow16 as usize);
}
pub fn emit_vector_unsigned_saturated_narrow32(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_one_arg_fallback_saturated(ctx, ra, inst_ref, inst, fallback_unsigned_sat_narrow32 as usize);
}
pub fn emit_vector_unsigned_saturated_narrow64(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_one_arg_fallback_saturated(ctx, ra, inst_ref, inst, fallback_unsigned_sat_narrow64 as usize);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lane_test_masks() {
        assert_eq!(lane_test_mask(8), 0xFFFF);
        assert_eq!(lane_test_mask(16), 0xAAAA);
        assert_eq!(lane_test_mask(32), 0x8888);
        assert_eq!(lane_test_mask(64), 0x8080);
    }

    #[test]
    fn test_fallback_sat_neg64() {
        let a: [u8; 16] = unsafe { std::mem::transmute([i64::MIN, 7i64]) };
        let mut out = [0u8; 16];
        let qc = fallback_sat_neg64(&mut out, &a);
        let lanes: [i64; 2] = unsafe { std::mem::transmute(out) };
        assert_eq!(lanes, [i64::MAX, -7]);
        assert_eq!(qc, 1);
    }

    #[test]
    fn test_fallback_sat_doubling_multiply_high32() {
        let a: [u8; 16] = unsafe { std::mem::transmute([i32::MIN; 4]) };
        let mut out = [0u8; 16];
        let qc = fallback_sat_doubling_multiply_high32(&mut out, &a, &a);
        let lanes: [i32; 4] = unsafe { std::mem::transmute(out) };
        assert_eq!(lanes, [i32::MAX; 4]);
        assert_eq!(qc, 1);

        let a: [u8; 16] = unsafe { std::mem::transmute([0x4000_0000i32; 4]) };
        let qc = fallback_sat_doubling_multiply_high32(&mut out, &a, &a);
        let lanes: [i32; 4] = unsafe { std::mem::transmute(out) };
        // 2·(2^30)² = 2^61; high word = 2^29.
        assert_eq!(lanes, [0x2000_0000; 4]);
        assert_eq!(qc, 0);
    }

    #[test]
    fn test_fallback_unsigned_sat_narrow32() {
        let a: [u8; 16] = unsafe { std::mem::transmute([0x0001_0000u32, 0xFFFF, 3, 0xFFFF_FFFF]) };
        let mut out = [0u8; 16];
        let qc = fallback_unsigned_sat_narrow32(&mut out, &a);
        let lanes: [u16; 8] = unsafe { std::mem::transmute(out) };
        assert_eq!(&lanes[..4], &[0xFFFF, 0xFFFF, 3, 0xFFFF]);
        assert_eq!(&lanes[4..], &[0; 4]);
        assert_eq!(qc, 1);
    }
}
