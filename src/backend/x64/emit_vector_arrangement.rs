use crate::backend::x64::assembler::{CodeAssembler, Reg};
use crate::backend::x64::emit_context::EmitContext;
use crate::backend::x64::emit_vector_helpers::*;
use crate::backend::x64::host_feature::HostFeature;
use crate::backend::x64::reg_alloc::RegAlloc;
use crate::ir::inst::Inst;
use crate::ir::value::InstRef;

// ---------------------------------------------------------------------------
// VectorGetElement — read one lane into a GPR, zero-extended.
// Lane 0 reuses the binding without emitting anything.
// ---------------------------------------------------------------------------

pub fn emit_vector_get_element8(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    assert!(args[1].is_immediate());
    let index = args[1].get_immediate_u8();

    if index == 0 {
        ra.define_value_from_arg(inst_ref, &args[0]);
        return;
    }

    if ctx.has(HostFeature::SSE41) {
        let source = ra.use_xmm(&mut args[0]);
        let dest = ra.scratch_gpr();
        ra.asm.pextrb(Reg::gpr32(dest.get_idx()), source, index).unwrap();
        ra.release(source);
        ra.define_value(inst_ref, dest);
    } else {
        let source = ra.use_xmm(&mut args[0]);
        let dest = ra.scratch_gpr();
        let dest32 = Reg::gpr32(dest.get_idx());
        ra.asm.pextrw(dest32, source, index / 2).unwrap();
        if index % 2 == 1 {
            ra.asm.shr(dest32, 8).unwrap();
        } else {
            ra.asm.and_imm(dest32, 0xFF).unwrap();
        }
        ra.release(source);
        ra.define_value(inst_ref, dest);
    }
}

pub fn emit_vector_get_element16(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    assert!(args[1].is_immediate());
    let index = args[1].get_immediate_u8();

    if index == 0 {
        ra.define_value_from_arg(inst_ref, &args[0]);
        return;
    }

    let source = ra.use_xmm(&mut args[0]);
    let dest = ra.scratch_gpr();
    ra.asm.pextrw(Reg::gpr32(dest.get_idx()), source, index).unwrap();
    ra.release(source);
    ra.define_value(inst_ref, dest);
}

pub fn emit_vector_get_element32(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    assert!(args[1].is_immediate());
    let index = args[1].get_immediate_u8();

    if index == 0 {
        ra.define_value_from_arg(inst_ref, &args[0]);
        return;
    }

    let dest = ra.scratch_gpr();

    if ctx.has(HostFeature::SSE41) {
        let source = ra.use_xmm(&mut args[0]);
        ra.asm.pextrd(Reg::gpr32(dest.get_idx()), source, index).unwrap();
        ra.release(source);
    } else {
        let source = ra.use_scratch_xmm(&mut args[0]);
        ra.asm.pshufd(source, source, index).unwrap();
        ra.asm.movd(Reg::gpr32(dest.get_idx()), source).unwrap();
        ra.release(source);
    }

    ra.define_value(inst_ref, dest);
}

pub fn emit_vector_get_element64(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    assert!(args[1].is_immediate());
    let index = args[1].get_immediate_u8();

    if index == 0 {
        ra.define_value_from_arg(inst_ref, &args[0]);
        return;
    }

    let dest = ra.scratch_gpr();

    if ctx.has(HostFeature::SSE41) {
        let source = ra.use_xmm(&mut args[0]);
        ra.asm.pextrq(dest, source, index).unwrap();
        ra.release(source);
    } else {
        let source = ra.use_scratch_xmm(&mut args[0]);
        ra.asm.punpckhqdq(source, source).unwrap();
        ra.asm.movq(dest, source).unwrap();
        ra.release(source);
    }

    ra.define_value(inst_ref, dest);
}

// ---------------------------------------------------------------------------
// VectorSetElement — replace one lane with a scalar
// ---------------------------------------------------------------------------

pub fn emit_vector_set_element8(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    assert!(args[1].is_immediate());
    let index = args[1].get_immediate_u8();
    let source_vector = ra.use_scratch_xmm(&mut args[0]);

    if ctx.has(HostFeature::SSE41) {
        let source_elem = ra.use_gpr(&mut args[2]);
        ra.asm
            .pinsrb(source_vector, Reg::gpr32(source_elem.get_idx()), index)
            .unwrap();
        ra.release(source_elem);
    } else {
        // Splice the new byte into the containing word.
        let source_elem = ra.use_scratch_gpr(&mut args[2]);
        let tmp = ra.scratch_gpr();
        let tmp32 = Reg::gpr32(tmp.get_idx());
        let elem32 = Reg::gpr32(source_elem.get_idx());

        ra.asm.pextrw(tmp32, source_vector, index / 2).unwrap();
        if index % 2 == 0 {
            ra.asm.and_imm(tmp32, 0xFF00).unwrap();
            ra.asm.and_imm(elem32, 0x00FF).unwrap();
            ra.asm.or_(tmp32, elem32).unwrap();
        } else {
            ra.asm.and_imm(tmp32, 0x00FF).unwrap();
            ra.asm.shl(elem32, 8).unwrap();
            ra.asm.or_(tmp32, elem32).unwrap();
        }
        ra.asm.pinsrw(source_vector, tmp32, index / 2).unwrap();
        ra.release(source_elem);
        ra.release(tmp);
    }

    ra.define_value(inst_ref, source_vector);
}

pub fn emit_vector_set_element16(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    assert!(args[1].is_immediate());
    let index = args[1].get_immediate_u8();

    let source_vector = ra.use_scratch_xmm(&mut args[0]);
    let source_elem = ra.use_gpr(&mut args[2]);

    ra.asm
        .pinsrw(source_vector, Reg::gpr32(source_elem.get_idx()), index)
        .unwrap();

    ra.release(source_elem);
    ra.define_value(inst_ref, source_vector);
}

pub fn emit_vector_set_element32(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    assert!(args[1].is_immediate());
    let index = args[1].get_immediate_u8();
    let source_vector = ra.use_scratch_xmm(&mut args[0]);

    if ctx.has(HostFeature::SSE41) {
        let source_elem = ra.use_gpr(&mut args[2]);
        ra.asm
            .pinsrd(source_vector, Reg::gpr32(source_elem.get_idx()), index)
            .unwrap();
        ra.release(source_elem);
    } else {
        // Write the dword as two halfwords.
        let source_elem = ra.use_scratch_gpr(&mut args[2]);
        let elem32 = Reg::gpr32(source_elem.get_idx());

        ra.asm.pinsrw(source_vector, elem32, index * 2).unwrap();
        ra.asm.shr(elem32, 16).unwrap();
        ra.asm.pinsrw(source_vector, elem32, index * 2 + 1).unwrap();
        ra.release(source_elem);
    }

    ra.define_value(inst_ref, source_vector);
}

pub fn emit_vector_set_element64(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    assert!(args[1].is_immediate());
    let index = args[1].get_immediate_u8();
    let source_vector = ra.use_scratch_xmm(&mut args[0]);

    if ctx.has(HostFeature::SSE41) {
        let source_elem = ra.use_gpr(&mut args[2]);
        ra.asm.pinsrq(source_vector, source_elem, index).unwrap();
        ra.release(source_elem);
    } else {
        let source_elem = ra.use_gpr(&mut args[2]);
        let tmp = ra.scratch_xmm();

        ra.asm.movq(tmp, source_elem).unwrap();
        if index == 0 {
            ra.asm.movsd(source_vector, tmp).unwrap();
        } else {
            ra.asm.punpcklqdq(source_vector, tmp).unwrap();
        }
        ra.release(source_elem);
        ra.release(tmp);
    }

    ra.define_value(inst_ref, source_vector);
}

// ---------------------------------------------------------------------------
// VectorBroadcast — replicate lane 0 into every lane
// ---------------------------------------------------------------------------

pub fn emit_vector_broadcast8(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let a = ra.use_scratch_xmm(&mut args[0]);

    if ctx.has(HostFeature::AVX2) {
        ra.asm.vpbroadcastb(a, a).unwrap();
    } else if ctx.has(HostFeature::SSSE3) {
        let tmp = ra.scratch_xmm();
        ra.asm.pxor(tmp, tmp).unwrap();
        ra.asm.pshufb(a, tmp).unwrap();
        ra.release(tmp);
    } else {
        ra.asm.punpcklbw(a, a).unwrap();
        ra.asm.pshuflw(a, a, 0).unwrap();
        ra.asm.punpcklqdq(a, a).unwrap();
    }

    ra.define_value(inst_ref, a);
}

pub fn emit_vector_broadcast16(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let a = ra.use_scratch_xmm(&mut args[0]);

    if ctx.has(HostFeature::AVX2) {
        ra.asm.vpbroadcastw(a, a).unwrap();
    } else {
        ra.asm.pshuflw(a, a, 0).unwrap();
        ra.asm.punpcklqdq(a, a).unwrap();
    }

    ra.define_value(inst_ref, a);
}

pub fn emit_vector_broadcast32(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let a = ra.use_scratch_xmm(&mut args[0]);

    if ctx.has(HostFeature::AVX2) {
        ra.asm.vpbroadcastd(a, a).unwrap();
    } else {
        ra.asm.pshufd(a, a, 0).unwrap();
    }

    ra.define_value(inst_ref, a);
}

pub fn emit_vector_broadcast64(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let a = ra.use_scratch_xmm(&mut args[0]);

    if ctx.has(HostFeature::AVX2) {
        ra.asm.vpbroadcastq(a, a).unwrap();
    } else {
        ra.asm.punpcklqdq(a, a).unwrap();
    }

    ra.define_value(inst_ref, a);
}

// ---------------------------------------------------------------------------
// VectorBroadcastLower — replicate lane 0 across the low 64 bits only
// ---------------------------------------------------------------------------

pub fn emit_vector_broadcast_lower8(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let a = ra.use_scratch_xmm(&mut args[0]);

    if ctx.has(HostFeature::AVX2) {
        ra.asm.vpbroadcastb(a, a).unwrap();
        ra.asm.movq(a, a).unwrap();
    } else if ctx.has(HostFeature::SSSE3) {
        let tmp = ra.scratch_xmm();
        ra.asm.pxor(tmp, tmp).unwrap();
        ra.asm.pshufb(a, tmp).unwrap();
        ra.asm.movq(a, a).unwrap();
        ra.release(tmp);
    } else {
        ra.asm.punpcklbw(a, a).unwrap();
        ra.asm.pshuflw(a, a, 0).unwrap();
        ra.asm.movq(a, a).unwrap();
    }

    ra.define_value(inst_ref, a);
}

pub fn emit_vector_broadcast_lower16(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let a = ra.use_scratch_xmm(&mut args[0]);
    ra.asm.pshuflw(a, a, 0).unwrap();
    ra.asm.movq(a, a).unwrap();
    ra.define_value(inst_ref, a);
}

pub fn emit_vector_broadcast_lower32(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let a = ra.use_scratch_xmm(&mut args[0]);
    ra.asm.pshuflw(a, a, 0b01000100).unwrap();
    ra.asm.movq(a, a).unwrap();
    ra.define_value(inst_ref, a);
}

// ---------------------------------------------------------------------------
// VectorDeinterleave — every other lane from (lhs, rhs)
// ---------------------------------------------------------------------------

pub fn emit_vector_deinterleave_even8(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let lhs = ra.use_scratch_xmm(&mut args[0]);
    let rhs = ra.use_scratch_xmm(&mut args[1]);
    let tmp = ra.scratch_xmm();

    let m = ra.asm.m_const(0x00FF00FF00FF00FF, 0x00FF00FF00FF00FF).unwrap();
    ra.asm.movdqa_load(tmp, m).unwrap();
    ra.asm.pand(lhs, tmp).unwrap();
    ra.asm.pand(rhs, tmp).unwrap();
    ra.asm.packuswb(lhs, rhs).unwrap();

    ra.release(rhs);
    ra.release(tmp);
    ra.define_value(inst_ref, lhs);
}

pub fn emit_vector_deinterleave_even16(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let lhs = ra.use_scratch_xmm(&mut args[0]);
    let rhs = ra.use_scratch_xmm(&mut args[1]);

    ra.asm.pslld(lhs, 16).unwrap();
    ra.asm.psrad(lhs, 16).unwrap();
    ra.asm.pslld(rhs, 16).unwrap();
    ra.asm.psrad(rhs, 16).unwrap();
    ra.asm.packssdw(lhs, rhs).unwrap();

    ra.release(rhs);
    ra.define_value(inst_ref, lhs);
}

pub fn emit_vector_deinterleave_even32(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let lhs = ra.use_scratch_xmm(&mut args[0]);
    let rhs = ra.use_scratch_xmm(&mut args[1]);

    ra.asm.pshufd(lhs, lhs, 0b10001000).unwrap();
    ra.asm.pshufd(rhs, rhs, 0b10001000).unwrap();

    if ctx.has(HostFeature::SSE41) {
        ra.asm.pblendw(lhs, rhs, 0b11110000).unwrap();
    } else {
        ra.asm.punpcklqdq(lhs, rhs).unwrap();
    }

    ra.release(rhs);
    ra.define_value(inst_ref, lhs);
}

pub fn emit_vector_deinterleave_even64(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let lhs = ra.use_scratch_xmm(&mut args[0]);
    let rhs = ra.use_scratch_xmm(&mut args[1]);

    ra.asm.movq(lhs, lhs).unwrap();
    ra.asm.pslldq(rhs, 8).unwrap();
    ra.asm.por(lhs, rhs).unwrap();

    ra.release(rhs);
    ra.define_value(inst_ref, lhs);
}

pub fn emit_vector_deinterleave_odd8(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let lhs = ra.use_scratch_xmm(&mut args[0]);
    let rhs = ra.use_scratch_xmm(&mut args[1]);

    ra.asm.psraw(lhs, 8).unwrap();
    ra.asm.psraw(rhs, 8).unwrap();
    ra.asm.packsswb(lhs, rhs).unwrap();

    ra.release(rhs);
    ra.define_value(inst_ref, lhs);
}

pub fn emit_vector_deinterleave_odd16(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let lhs = ra.use_scratch_xmm(&mut args[0]);
    let rhs = ra.use_scratch_xmm(&mut args[1]);

    ra.asm.psrad(lhs, 16).unwrap();
    ra.asm.psrad(rhs, 16).unwrap();
    ra.asm.packssdw(lhs, rhs).unwrap();

    ra.release(rhs);
    ra.define_value(inst_ref, lhs);
}

pub fn emit_vector_deinterleave_odd32(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let lhs = ra.use_scratch_xmm(&mut args[0]);
    let rhs = ra.use_scratch_xmm(&mut args[1]);

    ra.asm.pshufd(lhs, lhs, 0b11011101).unwrap();
    ra.asm.pshufd(rhs, rhs, 0b11011101).unwrap();

    if ctx.has(HostFeature::SSE41) {
        ra.asm.pblendw(lhs, rhs, 0b11110000).unwrap();
    } else {
        ra.asm.punpcklqdq(lhs, rhs).unwrap();
    }

    ra.release(rhs);
    ra.define_value(inst_ref, lhs);
}

pub fn emit_vector_deinterleave_odd64(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let lhs = ra.use_scratch_xmm(&mut args[0]);
    let rhs = ra.use_xmm(&mut args[1]);

    ra.asm.punpckhqdq(lhs, rhs).unwrap();

    ra.release(rhs);
    ra.define_value(inst_ref, lhs);
}

// ---------------------------------------------------------------------------
// VectorInterleave
// ---------------------------------------------------------------------------

pub fn emit_vector_interleave_lower8(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_op(ra, inst_ref, inst, CodeAssembler::punpcklbw);
}
pub fn emit_vector_interleave_lower16(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_op(ra, inst_ref, inst, CodeAssembler::punpcklwd);
}
pub fn emit_vector_interleave_lower32(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_op(ra, inst_ref, inst, CodeAssembler::punpckldq);
}
pub fn emit_vector_interleave_lower64(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_op(ra, inst_ref, inst, CodeAssembler::punpcklqdq);
}
pub fn emit_vector_interleave_upper8(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_op(ra, inst_ref, inst, CodeAssembler::punpckhbw);
}
pub fn emit_vector_interleave_upper16(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_op(ra, inst_ref, inst, CodeAssembler::punpckhwd);
}
pub fn emit_vector_interleave_upper32(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_op(ra, inst_ref, inst, CodeAssembler::punpckhdq);
}
pub fn emit_vector_interleave_upper64(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_op(ra, inst_ref, inst, CodeAssembler::punpckhqdq);
}

// ---------------------------------------------------------------------------
// VectorShuffle
// ---------------------------------------------------------------------------

pub fn emit_vector_shuffle_high_halfwords(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_shuffle_op(ra, inst_ref, inst, CodeAssembler::pshufhw);
}
pub fn emit_vector_shuffle_low_halfwords(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_shuffle_op(ra, inst_ref, inst, CodeAssembler::pshuflw);
}
pub fn emit_vector_shuffle_words(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_shuffle_op(ra, inst_ref, inst, CodeAssembler::pshufd);
}

// ---------------------------------------------------------------------------
// VectorExtract — 128-bit window starting at bit `position` of v2:v1
// ---------------------------------------------------------------------------

pub fn emit_vector_extract(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let xmm_a = ra.use_scratch_xmm(&mut args[0]);

    let position = args[2].get_immediate_u8();
    assert!(position % 8 == 0, "extract position must be byte-aligned");

    if position != 0 {
        let xmm_b = ra.use_scratch_xmm(&mut args[1]);
        ra.asm.psrldq(xmm_a, position / 8).unwrap();
        ra.asm.pslldq(xmm_b, (128 - position as u32) as u8 / 8).unwrap();
        ra.asm.por(xmm_a, xmm_b).unwrap();
        ra.release(xmm_b);
    }

    ra.define_value(inst_ref, xmm_a);
}

pub fn emit_vector_extract_lower(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let xmm_a = ra.use_scratch_xmm(&mut args[0]);

    let position = args[2].get_immediate_u8();
    assert!(position % 8 == 0, "extract position must be byte-aligned");

    if position != 0 {
        let xmm_b = ra.use_xmm(&mut args[1]);
        ra.asm.punpcklqdq(xmm_a, xmm_b).unwrap();
        ra.asm.psrldq(xmm_a, position / 8).unwrap();
        ra.release(xmm_b);
    }
    ra.asm.movq(xmm_a, xmm_a).unwrap();

    ra.define_value(inst_ref, xmm_a);
}

// ---------------------------------------------------------------------------
// VectorNarrow — truncate each lane to the next narrower width
// ---------------------------------------------------------------------------

pub fn emit_vector_narrow16(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());

    if ctx.has(HostFeature::AVX512VL | HostFeature::AVX512BW) {
        let a = ra.use_xmm(&mut args[0]);
        let result = ra.scratch_xmm();
        ra.asm.vpmovwb(result, a).unwrap();
        ra.release(a);
        ra.define_value(inst_ref, result);
        return;
    }

    let a = ra.use_scratch_xmm(&mut args[0]);
    let zeros = ra.scratch_xmm();

    ra.asm.pxor(zeros, zeros).unwrap();
    let m = ra.asm.m_const(0x00FF00FF00FF00FF, 0x00FF00FF00FF00FF).unwrap();
    ra.asm.pand_mem(a, m).unwrap();
    ra.asm.packuswb(a, zeros).unwrap();

    ra.release(zeros);
    ra.define_value(inst_ref, a);
}

pub fn emit_vector_narrow32(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let a = ra.use_scratch_xmm(&mut args[0]);
    let zeros = ra.scratch_xmm();

    ra.asm.pxor(zeros, zeros).unwrap();
    if ctx.has(HostFeature::SSE41) {
        ra.asm.pblendw(a, zeros, 0b10101010).unwrap();
        ra.asm.packusdw(a, zeros).unwrap();
    } else {
        ra.asm.pslld(a, 16).unwrap();
        ra.asm.psrad(a, 16).unwrap();
        ra.asm.packssdw(a, zeros).unwrap();
    }

    ra.release(zeros);
    ra.define_value(inst_ref, a);
}

pub fn emit_vector_narrow64(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let a = ra.use_scratch_xmm(&mut args[0]);
    let zeros = ra.scratch_xmm();

    ra.asm.pxor(zeros, zeros).unwrap();
    ra.asm.shufps(a, zeros, 0b00001000).unwrap();

    ra.release(zeros);
    ra.define_value(inst_ref, a);
}

// ---------------------------------------------------------------------------
// VectorSignExtend / VectorZeroExtend — widen the low half
// ---------------------------------------------------------------------------

pub fn emit_vector_sign_extend8(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    if ctx.has(HostFeature::SSE41) {
        let a = ra.use_scratch_xmm(&mut args[0]);
        ra.asm.pmovsxbw(a, a).unwrap();
        ra.define_value(inst_ref, a);
    } else {
        let a = ra.use_xmm(&mut args[0]);
        let result = ra.scratch_xmm();
        ra.asm.pxor(result, result).unwrap();
        ra.asm.punpcklbw(result, a).unwrap();
        ra.asm.psraw(result, 8).unwrap();
        ra.release(a);
        ra.define_value(inst_ref, result);
    }
}

pub fn emit_vector_sign_extend16(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    if ctx.has(HostFeature::SSE41) {
        let a = ra.use_scratch_xmm(&mut args[0]);
        ra.asm.pmovsxwd(a, a).unwrap();
        ra.define_value(inst_ref, a);
    } else {
        let a = ra.use_xmm(&mut args[0]);
        let result = ra.scratch_xmm();
        ra.asm.pxor(result, result).unwrap();
        ra.asm.punpcklwd(result, a).unwrap();
        ra.asm.psrad(result, 16).unwrap();
        ra.release(a);
        ra.define_value(inst_ref, result);
    }
}

pub fn emit_vector_sign_extend32(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let a = ra.use_scratch_xmm(&mut args[0]);

    if ctx.has(HostFeature::SSE41) {
        ra.asm.pmovsxdq(a, a).unwrap();
    } else {
        let tmp = ra.scratch_xmm();
        ra.asm.movaps(tmp, a).unwrap();
        ra.asm.psrad(tmp, 31).unwrap();
        ra.asm.punpckldq(a, tmp).unwrap();
        ra.release(tmp);
    }

    ra.define_value(inst_ref, a);
}

pub fn emit_vector_sign_extend64(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let data = ra.use_scratch_xmm(&mut args[0]);
    let gpr_tmp = ra.scratch_gpr();

    ra.asm.movq(gpr_tmp, data).unwrap();
    ra.asm.sar(gpr_tmp, 63).unwrap();

    if ctx.has(HostFeature::SSE41) {
        ra.asm.pinsrq(data, gpr_tmp, 1).unwrap();
    } else {
        let xmm_tmp = ra.scratch_xmm();
        ra.asm.movq(xmm_tmp, gpr_tmp).unwrap();
        ra.asm.punpcklqdq(data, xmm_tmp).unwrap();
        ra.release(xmm_tmp);
    }

    ra.release(gpr_tmp);
    ra.define_value(inst_ref, data);
}

pub fn emit_vector_zero_extend8(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let a = ra.use_scratch_xmm(&mut args[0]);
    if ctx.has(HostFeature::SSE41) {
        ra.asm.pmovzxbw(a, a).unwrap();
    } else {
        let zeros = ra.scratch_xmm();
        ra.asm.pxor(zeros, zeros).unwrap();
        ra.asm.punpcklbw(a, zeros).unwrap();
        ra.release(zeros);
    }
    ra.define_value(inst_ref, a);
}

pub fn emit_vector_zero_extend16(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let a = ra.use_scratch_xmm(&mut args[0]);
    if ctx.has(HostFeature::SSE41) {
        ra.asm.pmovzxwd(a, a).unwrap();
    } else {
        let zeros = ra.scratch_xmm();
        ra.asm.pxor(zeros, zeros).unwrap();
        ra.asm.punpcklwd(a, zeros).unwrap();
        ra.release(zeros);
    }
    ra.define_value(inst_ref, a);
}

pub fn emit_vector_zero_extend32(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let a = ra.use_scratch_xmm(&mut args[0]);
    if ctx.has(HostFeature::SSE41) {
        ra.asm.pmovzxdq(a, a).unwrap();
    } else {
        let zeros = ra.scratch_xmm();
        ra.asm.pxor(zeros, zeros).unwrap();
        ra.asm.punpckldq(a, zeros).unwrap();
        ra.release(zeros);
    }
    ra.define_value(inst_ref, a);
}

pub fn emit_vector_zero_extend64(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let a = ra.use_scratch_xmm(&mut args[0]);
    let zeros = ra.scratch_xmm();
    ra.asm.pxor(zeros, zeros).unwrap();
    ra.asm.punpcklqdq(a, zeros).unwrap();
    ra.release(zeros);
    ra.define_value(inst_ref, a);
}
