use crate::backend::x64::assembler::{CodeAssembler, Reg};
use crate::backend::x64::emit_context::EmitContext;
use crate::backend::x64::emit_vector_helpers::*;
use crate::backend::x64::host_feature::HostFeature;
use crate::backend::x64::reg_alloc::RegAlloc;
use crate::ir::inst::Inst;
use crate::ir::value::InstRef;

// ---------------------------------------------------------------------------
// VectorAdd / VectorSub — native SSE2
// ---------------------------------------------------------------------------

pub fn emit_vector_add8(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_op(ra, inst_ref, inst, CodeAssembler::paddb);
}
pub fn emit_vector_add16(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_op(ra, inst_ref, inst, CodeAssembler::paddw);
}
pub fn emit_vector_add32(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_op(ra, inst_ref, inst, CodeAssembler::paddd);
}
pub fn emit_vector_add64(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_op(ra, inst_ref, inst, CodeAssembler::paddq);
}
pub fn emit_vector_sub8(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_op(ra, inst_ref, inst, CodeAssembler::psubb);
}
pub fn emit_vector_sub16(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_op(ra, inst_ref, inst, CodeAssembler::psubw);
}
pub fn emit_vector_sub32(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_op(ra, inst_ref, inst, CodeAssembler::psubd);
}
pub fn emit_vector_sub64(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_op(ra, inst_ref, inst, CodeAssembler::psubq);
}

// ---------------------------------------------------------------------------
// Bitwise
// ---------------------------------------------------------------------------

pub fn emit_vector_and(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_op(ra, inst_ref, inst, CodeAssembler::pand);
}

/// `result = ~arg0 & arg1` (x86 pandn operand order).
pub fn emit_vector_and_not(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_op(ra, inst_ref, inst, CodeAssembler::pandn);
}

pub fn emit_vector_or(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_op(ra, inst_ref, inst, CodeAssembler::por);
}

pub fn emit_vector_eor(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_op(ra, inst_ref, inst, CodeAssembler::pxor);
}

/// All-ones via pcmpeqw(tmp, tmp), then pxor.
pub fn emit_vector_not(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let result = ra.use_scratch_xmm(&mut args[0]);
    let ones = ra.scratch_xmm();
    ra.asm.pcmpeqw(ones, ones).unwrap();
    ra.asm.pxor(result, ones).unwrap();
    ra.release(ones);
    ra.define_value(inst_ref, result);
}

// ---------------------------------------------------------------------------
// VectorAbs — in-place over a writable register; shared with the saturated
// absolute-value emitters.
// ---------------------------------------------------------------------------

pub(crate) fn vector_abs8(ctx: &EmitContext, ra: &mut RegAlloc, data: Reg) {
    if ctx.has(HostFeature::SSSE3) {
        ra.asm.pabsb(data, data).unwrap();
    } else {
        let temp = ra.scratch_xmm();
        ra.asm.pxor(temp, temp).unwrap();
        ra.asm.psubb(temp, data).unwrap();
        ra.asm.pminub(data, temp).unwrap();
        ra.release(temp);
    }
}

pub(crate) fn vector_abs16(ctx: &EmitContext, ra: &mut RegAlloc, data: Reg) {
    if ctx.has(HostFeature::SSSE3) {
        ra.asm.pabsw(data, data).unwrap();
    } else {
        let temp = ra.scratch_xmm();
        ra.asm.pxor(temp, temp).unwrap();
        ra.asm.psubw(temp, data).unwrap();
        ra.asm.pmaxsw(data, temp).unwrap();
        ra.release(temp);
    }
}

pub(crate) fn vector_abs32(ctx: &EmitContext, ra: &mut RegAlloc, data: Reg) {
    if ctx.has(HostFeature::SSSE3) {
        ra.asm.pabsd(data, data).unwrap();
    } else {
        let temp = ra.scratch_xmm();
        ra.asm.movdqa(temp, data).unwrap();
        ra.asm.psrad(temp, 31).unwrap();
        ra.asm.pxor(data, temp).unwrap();
        ra.asm.psubd(data, temp).unwrap();
        ra.release(temp);
    }
}

pub(crate) fn vector_abs64(ctx: &EmitContext, ra: &mut RegAlloc, data: Reg) {
    if ctx.has(HostFeature::AVX512VL) {
        ra.asm.vpabsq(data, data).unwrap();
    } else {
        // Replicate each lane's sign dword, then two's-complement negate
        // under the resulting mask.
        let temp = ra.scratch_xmm();
        ra.asm.pshufd(temp, data, 0b11110101).unwrap();
        ra.asm.psrad(temp, 31).unwrap();
        ra.asm.pxor(data, temp).unwrap();
        ra.asm.psubq(data, temp).unwrap();
        ra.release(temp);
    }
}

fn emit_vector_abs(esize: usize, ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let data = ra.use_scratch_xmm(&mut args[0]);

    match esize {
        8 => vector_abs8(ctx, ra, data),
        16 => vector_abs16(ctx, ra, data),
        32 => vector_abs32(ctx, ra, data),
        64 => vector_abs64(ctx, ra, data),
        _ => unreachable!("bad abs lane width"),
    }

    ra.define_value(inst_ref, data);
}

pub fn emit_vector_abs8(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_abs(8, ctx, ra, inst_ref, inst);
}
pub fn emit_vector_abs16(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_abs(16, ctx, ra, inst_ref, inst);
}
pub fn emit_vector_abs32(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_abs(32, ctx, ra, inst_ref, inst);
}
pub fn emit_vector_abs64(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_abs(64, ctx, ra, inst_ref, inst);
}

// ---------------------------------------------------------------------------
// ZeroVector / VectorZeroUpper
// ---------------------------------------------------------------------------

pub fn emit_zero_vector(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, _inst: &Inst) {
    let result = ra.scratch_xmm();
    ra.asm.pxor(result, result).unwrap();
    ra.define_value(inst_ref, result);
}

/// movq reg, reg zeroes the upper 64 bits.
pub fn emit_vector_zero_upper(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let a = ra.use_scratch_xmm(&mut args[0]);
    ra.asm.movq(a, a).unwrap();
    ra.define_value(inst_ref, a);
}

// ---------------------------------------------------------------------------
// VectorPopulationCount
// ---------------------------------------------------------------------------

extern "C" fn fallback_popcount(result: *mut [u8; 16], a: *const [u8; 16]) {
    unsafe {
        let src = &*a;
        let dst = &mut *result;
        for i in 0..16 {
            dst[i] = src[i].count_ones() as u8;
        }
    }
}

pub fn emit_vector_population_count(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    if ctx.has(HostFeature::AVX512VL | HostFeature::AVX512BITALG) {
        let mut args = ra.get_argument_info(&inst.args, inst.num_args());
        let data = ra.use_scratch_xmm(&mut args[0]);
        ra.asm.vpopcntb(data, data).unwrap();
        ra.define_value(inst_ref, data);
        return;
    }

    if ctx.has(HostFeature::SSSE3) {
        let mut args = ra.get_argument_info(&inst.args, inst.num_args());
        let low_a = ra.use_scratch_xmm(&mut args[0]);
        let high_a = ra.scratch_xmm();
        let tmp1 = ra.scratch_xmm();
        let tmp2 = ra.scratch_xmm();

        ra.asm.movdqa(high_a, low_a).unwrap();
        ra.asm.psrlw(high_a, 4).unwrap();
        let nibble_mask = ra.asm.m_const(0x0F0F0F0F0F0F0F0F, 0x0F0F0F0F0F0F0F0F).unwrap();
        ra.asm.movdqa_load(tmp1, nibble_mask).unwrap();
        ra.asm.pand(high_a, tmp1).unwrap();
        ra.asm.pand(low_a, tmp1).unwrap();

        // Per-nibble popcount table.
        let lut = ra.asm.m_const(0x0302020102010100, 0x0403030203020201).unwrap();
        ra.asm.movdqa_load(tmp1, lut).unwrap();
        ra.asm.movdqa(tmp2, tmp1).unwrap();
        ra.asm.pshufb(tmp1, low_a).unwrap();
        ra.asm.pshufb(tmp2, high_a).unwrap();
        ra.asm.paddb(tmp1, tmp2).unwrap();

        ra.release(low_a);
        ra.release(high_a);
        ra.release(tmp2);
        ra.define_value(inst_ref, tmp1);
        return;
    }

    emit_one_arg_fallback(ra, inst_ref, inst, fallback_popcount as usize);
}

// ---------------------------------------------------------------------------
// VectorReverseBits
// ---------------------------------------------------------------------------

pub fn emit_vector_reverse_bits(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let data = ra.use_scratch_xmm(&mut args[0]);
    let high_nibble_reg = ra.scratch_xmm();

    let high_mask = ra.asm.m_const(0xF0F0F0F0F0F0F0F0, 0xF0F0F0F0F0F0F0F0).unwrap();
    ra.asm.movdqa_load(high_nibble_reg, high_mask).unwrap();
    ra.asm.pand(high_nibble_reg, data).unwrap();
    ra.asm.pxor(data, high_nibble_reg).unwrap();
    ra.asm.psrld(high_nibble_reg, 4).unwrap();

    if ctx.has(HostFeature::SSSE3) {
        // Bit-reversed nibble tables, indexed by the low/high nibbles.
        let high_reversed_reg = ra.scratch_xmm();
        let high_lut = ra.asm.m_const(0xE060A020C0408000, 0xF070B030D0509010).unwrap();
        ra.asm.movdqa_load(high_reversed_reg, high_lut).unwrap();
        ra.asm.pshufb(high_reversed_reg, data).unwrap();

        let low_lut = ra.asm.m_const(0x0E060A020C040800, 0x0F070B030D050901).unwrap();
        ra.asm.movdqa_load(data, low_lut).unwrap();
        ra.asm.pshufb(data, high_nibble_reg).unwrap();
        ra.asm.por(data, high_reversed_reg).unwrap();
        ra.release(high_reversed_reg);
    } else {
        // Knuth bit swaps: nibbles, then pairs, then single bits.
        ra.asm.pslld(data, 4).unwrap();
        ra.asm.por(data, high_nibble_reg).unwrap();

        let pair_mask = ra.asm.m_const(0xCCCCCCCCCCCCCCCC, 0xCCCCCCCCCCCCCCCC).unwrap();
        ra.asm.movdqa_load(high_nibble_reg, pair_mask).unwrap();
        ra.asm.pand(high_nibble_reg, data).unwrap();
        ra.asm.pxor(data, high_nibble_reg).unwrap();
        ra.asm.psrld(high_nibble_reg, 2).unwrap();
        ra.asm.pslld(data, 2).unwrap();
        ra.asm.por(data, high_nibble_reg).unwrap();

        let bit_mask = ra.asm.m_const(0xAAAAAAAAAAAAAAAA, 0xAAAAAAAAAAAAAAAA).unwrap();
        ra.asm.movdqa_load(high_nibble_reg, bit_mask).unwrap();
        ra.asm.pand(high_nibble_reg, data).unwrap();
        ra.asm.pxor(data, high_nibble_reg).unwrap();
        ra.asm.psrld(high_nibble_reg, 1).unwrap();
        ra.asm.paddd(data, data).unwrap();
        ra.asm.por(data, high_nibble_reg).unwrap();
    }

    ra.release(high_nibble_reg);
    ra.define_value(inst_ref, data);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_popcount() {
        let input: [u8; 16] = [0, 1, 3, 7, 15, 31, 63, 127, 255, 0x80, 0xAA, 0x55, 0xFF, 0, 0, 0];
        let mut output = [0u8; 16];
        fallback_popcount(&mut output, &input);
        assert_eq!(output[0], 0);
        assert_eq!(output[1], 1);
        assert_eq!(output[3], 3);
        assert_eq!(output[8], 8);
        assert_eq!(output[10], 4);
    }

    #[test]
    fn test_fn_signatures() {
        let _: fn(&EmitContext, &mut RegAlloc, InstRef, &Inst) = emit_vector_add8;
        let _: fn(&EmitContext, &mut RegAlloc, InstRef, &Inst) = emit_vector_not;
        let _: fn(&EmitContext, &mut RegAlloc, InstRef, &Inst) = emit_vector_abs64;
        let _: fn(&EmitContext, &mut RegAlloc, InstRef, &Inst) = emit_vector_population_count;
        let _: fn(&EmitContext, &mut RegAlloc, InstRef, &Inst) = emit_vector_reverse_bits;
    }
}
