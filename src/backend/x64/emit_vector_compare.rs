use crate::backend::x64::assembler::CodeAssembler;
use crate::backend::x64::emit_context::EmitContext;
use crate::backend::x64::emit_vector_helpers::*;
use crate::backend::x64::host_feature::HostFeature;
use crate::backend::x64::reg_alloc::RegAlloc;
use crate::ir::inst::Inst;
use crate::ir::value::InstRef;

// ---------------------------------------------------------------------------
// VectorEqual — per-lane all-ones/all-zeros masks
// ---------------------------------------------------------------------------

pub fn emit_vector_equal8(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_op(ra, inst_ref, inst, CodeAssembler::pcmpeqb);
}
pub fn emit_vector_equal16(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_op(ra, inst_ref, inst, CodeAssembler::pcmpeqw);
}
pub fn emit_vector_equal32(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_op(ra, inst_ref, inst, CodeAssembler::pcmpeqd);
}

pub fn emit_vector_equal64(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    if ctx.has(HostFeature::SSE41) {
        emit_vector_op(ra, inst_ref, inst, CodeAssembler::pcmpeqq);
        return;
    }

    // Both dword halves of a lane must compare equal.
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let xmm_a = ra.use_scratch_xmm(&mut args[0]);
    let xmm_b = ra.use_xmm(&mut args[1]);
    let tmp = ra.scratch_xmm();

    ra.asm.pcmpeqd(xmm_a, xmm_b).unwrap();
    ra.asm.pshufd(tmp, xmm_a, 0b10110001).unwrap();
    ra.asm.pand(xmm_a, tmp).unwrap();

    ra.release(xmm_b);
    ra.release(tmp);
    ra.define_value(inst_ref, xmm_a);
}

pub fn emit_vector_equal128(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let xmm_a = ra.use_scratch_xmm(&mut args[0]);
    let xmm_b = ra.use_xmm(&mut args[1]);
    let tmp = ra.scratch_xmm();

    if ctx.has(HostFeature::SSE41) {
        ra.asm.pcmpeqq(xmm_a, xmm_b).unwrap();
        ra.asm.pshufd(tmp, xmm_a, 0b01001110).unwrap();
        ra.asm.pand(xmm_a, tmp).unwrap();
    } else {
        ra.asm.pcmpeqd(xmm_a, xmm_b).unwrap();
        ra.asm.pshufd(tmp, xmm_a, 0b10110001).unwrap();
        ra.asm.pand(xmm_a, tmp).unwrap();
        ra.asm.pshufd(tmp, xmm_a, 0b01001110).unwrap();
        ra.asm.pand(xmm_a, tmp).unwrap();
    }

    ra.release(xmm_b);
    ra.release(tmp);
    ra.define_value(inst_ref, xmm_a);
}

// ---------------------------------------------------------------------------
// VectorGreaterS — signed greater-than masks
// ---------------------------------------------------------------------------

pub fn emit_vector_greater_s8(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_op(ra, inst_ref, inst, CodeAssembler::pcmpgtb);
}
pub fn emit_vector_greater_s16(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_op(ra, inst_ref, inst, CodeAssembler::pcmpgtw);
}
pub fn emit_vector_greater_s32(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_op(ra, inst_ref, inst, CodeAssembler::pcmpgtd);
}

extern "C" fn fallback_greater_s64(result: *mut [u8; 16], a: *const [u8; 16], b: *const [u8; 16]) {
    unsafe {
        let va: [i64; 2] = std::mem::transmute(*a);
        let vb: [i64; 2] = std::mem::transmute(*b);
        let out: [u64; 2] = [
            if va[0] > vb[0] { !0 } else { 0 },
            if va[1] > vb[1] { !0 } else { 0 },
        ];
        *result = std::mem::transmute(out);
    }
}

pub fn emit_vector_greater_s64(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    if ctx.has(HostFeature::SSE42) {
        emit_vector_op(ra, inst_ref, inst, CodeAssembler::pcmpgtq);
        return;
    }

    emit_two_arg_fallback(ra, inst_ref, inst, fallback_greater_s64 as usize);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_greater_s64() {
        let a: [u8; 16] = unsafe { std::mem::transmute([-1i64, 1i64]) };
        let b: [u8; 16] = unsafe { std::mem::transmute([0i64, 0i64]) };
        let mut out = [0u8; 16];
        fallback_greater_s64(&mut out, &a, &b);
        let lanes: [u64; 2] = unsafe { std::mem::transmute(out) };
        assert_eq!(lanes, [0, !0]);
    }
}
