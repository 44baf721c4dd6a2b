#![allow(clippy::missing_transmute_annotations)]

use crate::backend::x64::assembler::CodeAssembler;
use crate::backend::x64::emit_context::EmitContext;
use crate::backend::x64::emit_vector_helpers::*;
use crate::backend::x64::host_feature::HostFeature;
use crate::backend::x64::hostloc::HostLoc;
use crate::backend::x64::reg_alloc::RegAlloc;
use crate::ir::inst::Inst;
use crate::ir::value::InstRef;

// ---------------------------------------------------------------------------
// VectorMax, signed
// ---------------------------------------------------------------------------

pub fn emit_vector_max_s8(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    if ctx.has(HostFeature::SSE41) {
        emit_vector_op(ra, inst_ref, inst, CodeAssembler::pmaxsb);
        return;
    }

    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let a = ra.use_scratch_xmm(&mut args[0]);
    let b = ra.use_scratch_xmm(&mut args[1]);
    let tmp_b = ra.scratch_xmm();

    ra.asm.movdqa(tmp_b, b).unwrap();
    ra.asm.pcmpgtb(tmp_b, a).unwrap();
    ra.asm.pand(b, tmp_b).unwrap();
    ra.asm.pandn(tmp_b, a).unwrap();
    ra.asm.por(tmp_b, b).unwrap();

    ra.release(a);
    ra.release(b);
    ra.define_value(inst_ref, tmp_b);
}

pub fn emit_vector_max_s16(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_op(ra, inst_ref, inst, CodeAssembler::pmaxsw);
}

pub fn emit_vector_max_s32(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    if ctx.has(HostFeature::SSE41) {
        emit_vector_op(ra, inst_ref, inst, CodeAssembler::pmaxsd);
        return;
    }

    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let a = ra.use_scratch_xmm(&mut args[0]);
    let b = ra.use_scratch_xmm(&mut args[1]);
    let tmp_b = ra.scratch_xmm();

    ra.asm.movdqa(tmp_b, b).unwrap();
    ra.asm.pcmpgtd(tmp_b, a).unwrap();
    ra.asm.pand(b, tmp_b).unwrap();
    ra.asm.pandn(tmp_b, a).unwrap();
    ra.asm.por(tmp_b, b).unwrap();

    ra.release(a);
    ra.release(b);
    ra.define_value(inst_ref, tmp_b);
}

extern "C" fn fallback_max_s64(result: *mut [u8; 16], a: *const [u8; 16], b: *const [u8; 16]) {
    unsafe {
        let va: [i64; 2] = std::mem::transmute(*a);
        let vb: [i64; 2] = std::mem::transmute(*b);
        let out = [va[0].max(vb[0]), va[1].max(vb[1])];
        *result = std::mem::transmute(out);
    }
}

pub fn emit_vector_max_s64(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    if ctx.has(HostFeature::AVX512VL) {
        emit_avx_vector_op(ra, inst_ref, inst, CodeAssembler::vpmaxsq);
        return;
    }

    if ctx.has(HostFeature::AVX) {
        let mut args = ra.get_argument_info(&inst.args, inst.num_args());
        let x = ra.use_scratch_xmm(&mut args[0]);
        let y = ra.use_xmm(&mut args[1]);
        let xmm0 = ra.scratch_xmm_at(HostLoc::Xmm(0));

        ra.asm.vpcmpgtq(xmm0, y, x).unwrap();
        ra.asm.pblendvb(x, y).unwrap();

        ra.release(y);
        ra.release(xmm0);
        ra.define_value(inst_ref, x);
        return;
    }

    emit_two_arg_fallback(ra, inst_ref, inst, fallback_max_s64 as usize);
}

// ---------------------------------------------------------------------------
// VectorMax, unsigned
// ---------------------------------------------------------------------------

pub fn emit_vector_max_u8(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_op(ra, inst_ref, inst, CodeAssembler::pmaxub);
}

pub fn emit_vector_max_u16(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    if ctx.has(HostFeature::SSE41) {
        emit_vector_op(ra, inst_ref, inst, CodeAssembler::pmaxuw);
        return;
    }

    // max(a, b) = a -sat b + b
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let a = ra.use_scratch_xmm(&mut args[0]);
    let b = ra.use_xmm(&mut args[1]);

    ra.asm.psubusw(a, b).unwrap();
    ra.asm.paddw(a, b).unwrap();

    ra.release(b);
    ra.define_value(inst_ref, a);
}

pub fn emit_vector_max_u32(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    if ctx.has(HostFeature::SSE41) {
        emit_vector_op(ra, inst_ref, inst, CodeAssembler::pmaxud);
        return;
    }

    // Bias both operands into signed range, then compare-blend.
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let a = ra.use_scratch_xmm(&mut args[0]);
    let b = ra.use_xmm(&mut args[1]);
    let tmp = ra.scratch_xmm();
    let tmp_b = ra.scratch_xmm();

    let m = ra.asm.m_const(0x8000000080000000, 0x8000000080000000).unwrap();
    ra.asm.movdqa_load(tmp, m).unwrap();
    ra.asm.movdqa(tmp_b, b).unwrap();

    ra.asm.pxor(tmp_b, tmp).unwrap();
    ra.asm.pxor(tmp, a).unwrap();

    ra.asm.pcmpgtd(tmp, tmp_b).unwrap();
    ra.asm.pand(a, tmp).unwrap();
    ra.asm.pandn(tmp, b).unwrap();
    ra.asm.por(a, tmp).unwrap();

    ra.release(b);
    ra.release(tmp);
    ra.release(tmp_b);
    ra.define_value(inst_ref, a);
}

extern "C" fn fallback_max_u64(result: *mut [u8; 16], a: *const [u8; 16], b: *const [u8; 16]) {
    unsafe {
        let va: [u64; 2] = std::mem::transmute(*a);
        let vb: [u64; 2] = std::mem::transmute(*b);
        let out = [va[0].max(vb[0]), va[1].max(vb[1])];
        *result = std::mem::transmute(out);
    }
}

pub fn emit_vector_max_u64(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    if ctx.has(HostFeature::AVX512VL) {
        emit_avx_vector_op(ra, inst_ref, inst, CodeAssembler::vpmaxuq);
        return;
    }

    if ctx.has(HostFeature::AVX) {
        let mut args = ra.get_argument_info(&inst.args, inst.num_args());
        let x = ra.use_scratch_xmm(&mut args[0]);
        let y = ra.use_xmm(&mut args[1]);
        let tmp = ra.scratch_xmm();
        let xmm0 = ra.scratch_xmm_at(HostLoc::Xmm(0));

        let m = ra.asm.m_const(0x8000000000000000, 0x8000000000000000).unwrap();
        ra.asm.movdqa_load(xmm0, m).unwrap();
        ra.asm.vpsubq(tmp, y, xmm0).unwrap();
        ra.asm.vpsubq(xmm0, x, xmm0).unwrap();
        ra.asm.vpcmpgtq(xmm0, tmp, xmm0).unwrap();
        ra.asm.pblendvb(x, y).unwrap();

        ra.release(y);
        ra.release(tmp);
        ra.release(xmm0);
        ra.define_value(inst_ref, x);
        return;
    }

    emit_two_arg_fallback(ra, inst_ref, inst, fallback_max_u64 as usize);
}

// ---------------------------------------------------------------------------
// VectorMin, signed
// ---------------------------------------------------------------------------

pub fn emit_vector_min_s8(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    if ctx.has(HostFeature::SSE41) {
        emit_vector_op(ra, inst_ref, inst, CodeAssembler::pminsb);
        return;
    }

    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let a = ra.use_scratch_xmm(&mut args[0]);
    let b = ra.use_xmm(&mut args[1]);
    let tmp_b = ra.scratch_xmm();

    ra.asm.movdqa(tmp_b, b).unwrap();
    ra.asm.pcmpgtb(tmp_b, a).unwrap();
    ra.asm.pand(a, tmp_b).unwrap();
    ra.asm.pandn(tmp_b, b).unwrap();
    ra.asm.por(a, tmp_b).unwrap();

    ra.release(b);
    ra.release(tmp_b);
    ra.define_value(inst_ref, a);
}

pub fn emit_vector_min_s16(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_op(ra, inst_ref, inst, CodeAssembler::pminsw);
}

pub fn emit_vector_min_s32(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    if ctx.has(HostFeature::SSE41) {
        emit_vector_op(ra, inst_ref, inst, CodeAssembler::pminsd);
        return;
    }

    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let a = ra.use_scratch_xmm(&mut args[0]);
    let b = ra.use_xmm(&mut args[1]);
    let tmp_b = ra.scratch_xmm();

    ra.asm.movdqa(tmp_b, b).unwrap();
    ra.asm.pcmpgtd(tmp_b, a).unwrap();
    ra.asm.pand(a, tmp_b).unwrap();
    ra.asm.pandn(tmp_b, b).unwrap();
    ra.asm.por(a, tmp_b).unwrap();

    ra.release(b);
    ra.release(tmp_b);
    ra.define_value(inst_ref, a);
}

extern "C" fn fallback_min_s64(result: *mut [u8; 16], a: *const [u8; 16], b: *const [u8; 16]) {
    unsafe {
        let va: [i64; 2] = std::mem::transmute(*a);
        let vb: [i64; 2] = std::mem::transmute(*b);
        let out = [va[0].min(vb[0]), va[1].min(vb[1])];
        *result = std::mem::transmute(out);
    }
}

pub fn emit_vector_min_s64(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    if ctx.has(HostFeature::AVX512VL) {
        emit_avx_vector_op(ra, inst_ref, inst, CodeAssembler::vpminsq);
        return;
    }

    if ctx.has(HostFeature::AVX) {
        let mut args = ra.get_argument_info(&inst.args, inst.num_args());
        let x = ra.use_xmm(&mut args[0]);
        let y = ra.use_scratch_xmm(&mut args[1]);
        let xmm0 = ra.scratch_xmm_at(HostLoc::Xmm(0));

        ra.asm.vpcmpgtq(xmm0, y, x).unwrap();
        ra.asm.pblendvb(y, x).unwrap();

        ra.release(x);
        ra.release(xmm0);
        ra.define_value(inst_ref, y);
        return;
    }

    emit_two_arg_fallback(ra, inst_ref, inst, fallback_min_s64 as usize);
}

// ---------------------------------------------------------------------------
// VectorMin, unsigned
// ---------------------------------------------------------------------------

pub fn emit_vector_min_u8(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_op(ra, inst_ref, inst, CodeAssembler::pminub);
}

pub fn emit_vector_min_u16(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    if ctx.has(HostFeature::SSE41) {
        emit_vector_op(ra, inst_ref, inst, CodeAssembler::pminuw);
        return;
    }

    // min(a, b) = b - (b -sat a)
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let a = ra.use_xmm(&mut args[0]);
    let b = ra.use_scratch_xmm(&mut args[1]);
    let tmp_b = ra.scratch_xmm();

    ra.asm.movdqa(tmp_b, b).unwrap();
    ra.asm.psubusw(tmp_b, a).unwrap();
    ra.asm.psubw(b, tmp_b).unwrap();

    ra.release(a);
    ra.release(tmp_b);
    ra.define_value(inst_ref, b);
}

pub fn emit_vector_min_u32(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    if ctx.has(HostFeature::SSE41) {
        emit_vector_op(ra, inst_ref, inst, CodeAssembler::pminud);
        return;
    }

    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let a = ra.use_scratch_xmm(&mut args[0]);
    let b = ra.use_xmm(&mut args[1]);

    let sint_max_plus_one = ra.scratch_xmm();
    let m = ra.asm.m_const(0x8000000080000000, 0x8000000080000000).unwrap();
    ra.asm.movdqa_load(sint_max_plus_one, m).unwrap();

    let tmp_a = ra.scratch_xmm();
    ra.asm.movdqa(tmp_a, a).unwrap();
    ra.asm.psubd(tmp_a, sint_max_plus_one).unwrap();

    let tmp_b = ra.scratch_xmm();
    ra.asm.movdqa(tmp_b, b).unwrap();
    ra.asm.psubd(tmp_b, sint_max_plus_one).unwrap();

    ra.asm.pcmpgtd(tmp_b, tmp_a).unwrap();
    ra.asm.pand(a, tmp_b).unwrap();
    ra.asm.pandn(tmp_b, b).unwrap();
    ra.asm.por(a, tmp_b).unwrap();

    ra.release(b);
    ra.release(sint_max_plus_one);
    ra.release(tmp_a);
    ra.release(tmp_b);
    ra.define_value(inst_ref, a);
}

extern "C" fn fallback_min_u64(result: *mut [u8; 16], a: *const [u8; 16], b: *const [u8; 16]) {
    unsafe {
        let va: [u64; 2] = std::mem::transmute(*a);
        let vb: [u64; 2] = std::mem::transmute(*b);
        let out = [va[0].min(vb[0]), va[1].min(vb[1])];
        *result = std::mem::transmute(out);
    }
}

pub fn emit_vector_min_u64(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    if ctx.has(HostFeature::AVX512VL) {
        emit_avx_vector_op(ra, inst_ref, inst, CodeAssembler::vpminuq);
        return;
    }

    if ctx.has(HostFeature::AVX) {
        let mut args = ra.get_argument_info(&inst.args, inst.num_args());
        let x = ra.use_xmm(&mut args[0]);
        let y = ra.use_scratch_xmm(&mut args[1]);
        let tmp = ra.scratch_xmm();
        let xmm0 = ra.scratch_xmm_at(HostLoc::Xmm(0));

        let m = ra.asm.m_const(0x8000000000000000, 0x8000000000000000).unwrap();
        ra.asm.movdqa_load(xmm0, m).unwrap();
        ra.asm.vpsubq(tmp, y, xmm0).unwrap();
        ra.asm.vpsubq(xmm0, x, xmm0).unwrap();
        ra.asm.vpcmpgtq(xmm0, tmp, xmm0).unwrap();
        ra.asm.pblendvb(y, x).unwrap();

        ra.release(x);
        ra.release(tmp);
        ra.release(xmm0);
        ra.define_value(inst_ref, y);
        return;
    }

    emit_two_arg_fallback(ra, inst_ref, inst, fallback_min_u64 as usize);
}
