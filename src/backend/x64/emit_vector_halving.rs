use crate::backend::x64::assembler::CodeAssembler;
use crate::backend::x64::emit_context::EmitContext;
use crate::backend::x64::emit_vector_helpers::*;
use crate::backend::x64::emit_vector_shift::arithmetic_shift_right_byte;
use crate::backend::x64::reg_alloc::RegAlloc;
use crate::ir::inst::Inst;
use crate::ir::value::InstRef;

// ---------------------------------------------------------------------------
// VectorHalvingAddS — (a + b) >> 1 without overflow, signed
//
// a + b == (a ^ b) + 2·(a & b); halve the xor term arithmetically and add
// the carry term back un-halved.
// ---------------------------------------------------------------------------

fn emit_vector_halving_add_signed(
    esize: usize,
    _ctx: &EmitContext,
    ra: &mut RegAlloc,
    inst_ref: InstRef,
    inst: &Inst,
) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let a = ra.use_scratch_xmm(&mut args[0]);
    let b = ra.use_scratch_xmm(&mut args[1]);
    let tmp = ra.scratch_xmm();

    ra.asm.movdqa(tmp, b).unwrap();
    ra.asm.pand(tmp, a).unwrap();
    ra.asm.pxor(a, b).unwrap();

    match esize {
        8 => {
            arithmetic_shift_right_byte(ra, a, 1);
            ra.asm.paddb(a, tmp).unwrap();
        }
        16 => {
            ra.asm.psraw(a, 1).unwrap();
            ra.asm.paddw(a, tmp).unwrap();
        }
        32 => {
            ra.asm.psrad(a, 1).unwrap();
            ra.asm.paddd(a, tmp).unwrap();
        }
        _ => unreachable!("bad halving-add lane width"),
    }

    ra.release(b);
    ra.release(tmp);
    ra.define_value(inst_ref, a);
}

pub fn emit_vector_halving_add_s8(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_halving_add_signed(8, ctx, ra, inst_ref, inst);
}
pub fn emit_vector_halving_add_s16(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_halving_add_signed(16, ctx, ra, inst_ref, inst);
}
pub fn emit_vector_halving_add_s32(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_halving_add_signed(32, ctx, ra, inst_ref, inst);
}

// ---------------------------------------------------------------------------
// VectorHalvingAddU
//
// pavg rounds up; subtract the lost carry (a ^ b) & 1 to round down.
// ---------------------------------------------------------------------------

fn emit_vector_halving_add_unsigned(
    esize: usize,
    _ctx: &EmitContext,
    ra: &mut RegAlloc,
    inst_ref: InstRef,
    inst: &Inst,
) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let a = ra.use_scratch_xmm(&mut args[0]);
    let b = ra.use_scratch_xmm(&mut args[1]);
    let tmp = ra.scratch_xmm();

    ra.asm.movdqa(tmp, b).unwrap();

    match esize {
        8 => {
            ra.asm.pavgb(tmp, a).unwrap();
            ra.asm.pxor(a, b).unwrap();
            let m = ra.asm.m_const(0x0101010101010101, 0x0101010101010101).unwrap();
            ra.asm.pand_mem(a, m).unwrap();
            ra.asm.psubb(tmp, a).unwrap();
        }
        16 => {
            ra.asm.pavgw(tmp, a).unwrap();
            ra.asm.pxor(a, b).unwrap();
            let m = ra.asm.m_const(0x0001000100010001, 0x0001000100010001).unwrap();
            ra.asm.pand_mem(a, m).unwrap();
            ra.asm.psubw(tmp, a).unwrap();
        }
        32 => {
            ra.asm.pand(tmp, a).unwrap();
            ra.asm.pxor(a, b).unwrap();
            ra.asm.psrld(a, 1).unwrap();
            ra.asm.paddd(tmp, a).unwrap();
        }
        _ => unreachable!("bad halving-add lane width"),
    }

    ra.release(a);
    ra.release(b);
    ra.define_value(inst_ref, tmp);
}

pub fn emit_vector_halving_add_u8(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_halving_add_unsigned(8, ctx, ra, inst_ref, inst);
}
pub fn emit_vector_halving_add_u16(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_halving_add_unsigned(16, ctx, ra, inst_ref, inst);
}
pub fn emit_vector_halving_add_u32(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_halving_add_unsigned(32, ctx, ra, inst_ref, inst);
}

// ---------------------------------------------------------------------------
// VectorHalvingSubS — (a - b) >> 1, signed
//
// 8/16: bias into unsigned range, then a - avg(a, b) computes the halved
// difference. 32: xor/and decomposition mirroring the add.
// ---------------------------------------------------------------------------

fn emit_vector_halving_sub_signed(
    esize: usize,
    _ctx: &EmitContext,
    ra: &mut RegAlloc,
    inst_ref: InstRef,
    inst: &Inst,
) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let a = ra.use_scratch_xmm(&mut args[0]);
    let b = ra.use_scratch_xmm(&mut args[1]);

    match esize {
        8 => {
            let tmp = ra.scratch_xmm();
            let m = ra.asm.m_const(0x8080808080808080, 0x8080808080808080).unwrap();
            ra.asm.movdqa_load(tmp, m).unwrap();
            ra.asm.pxor(a, tmp).unwrap();
            ra.asm.pxor(b, tmp).unwrap();
            ra.asm.pavgb(b, a).unwrap();
            ra.asm.psubb(a, b).unwrap();
            ra.release(tmp);
        }
        16 => {
            let tmp = ra.scratch_xmm();
            let m = ra.asm.m_const(0x8000800080008000, 0x8000800080008000).unwrap();
            ra.asm.movdqa_load(tmp, m).unwrap();
            ra.asm.pxor(a, tmp).unwrap();
            ra.asm.pxor(b, tmp).unwrap();
            ra.asm.pavgw(b, a).unwrap();
            ra.asm.psubw(a, b).unwrap();
            ra.release(tmp);
        }
        32 => {
            ra.asm.pxor(a, b).unwrap();
            ra.asm.pand(b, a).unwrap();
            ra.asm.psrad(a, 1).unwrap();
            ra.asm.psubd(a, b).unwrap();
        }
        _ => unreachable!("bad halving-sub lane width"),
    }

    ra.release(b);
    ra.define_value(inst_ref, a);
}

pub fn emit_vector_halving_sub_s8(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_halving_sub_signed(8, ctx, ra, inst_ref, inst);
}
pub fn emit_vector_halving_sub_s16(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_halving_sub_signed(16, ctx, ra, inst_ref, inst);
}
pub fn emit_vector_halving_sub_s32(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_halving_sub_signed(32, ctx, ra, inst_ref, inst);
}

// ---------------------------------------------------------------------------
// VectorHalvingSubU
// ---------------------------------------------------------------------------

fn emit_vector_halving_sub_unsigned(
    esize: usize,
    _ctx: &EmitContext,
    ra: &mut RegAlloc,
    inst_ref: InstRef,
    inst: &Inst,
) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let a = ra.use_scratch_xmm(&mut args[0]);
    let b = ra.use_scratch_xmm(&mut args[1]);

    match esize {
        8 => {
            ra.asm.pavgb(b, a).unwrap();
            ra.asm.psubb(a, b).unwrap();
        }
        16 => {
            ra.asm.pavgw(b, a).unwrap();
            ra.asm.psubw(a, b).unwrap();
        }
        32 => {
            ra.asm.pxor(a, b).unwrap();
            ra.asm.pand(b, a).unwrap();
            ra.asm.psrld(a, 1).unwrap();
            ra.asm.psubd(a, b).unwrap();
        }
        _ => unreachable!("bad halving-sub lane width"),
    }

    ra.release(b);
    ra.define_value(inst_ref, a);
}

pub fn emit_vector_halving_sub_u8(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_halving_sub_unsigned(8, ctx, ra, inst_ref, inst);
}
pub fn emit_vector_halving_sub_u16(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_halving_sub_unsigned(16, ctx, ra, inst_ref, inst);
}
pub fn emit_vector_halving_sub_u32(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_halving_sub_unsigned(32, ctx, ra, inst_ref, inst);
}

// ---------------------------------------------------------------------------
// VectorRoundingHalvingAddS — (a + b + 1) >> 1, signed
//
// pavg already rounds up; bias through the unsigned range for 8/16. The
// 32-bit lane has no pavg, so the rounding carry is reconstructed from the
// OR of the discarded bits.
// ---------------------------------------------------------------------------

fn emit_vector_rounding_halving_add_signed(
    esize: usize,
    _ctx: &EmitContext,
    ra: &mut RegAlloc,
    inst_ref: InstRef,
    inst: &Inst,
) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let a = ra.use_scratch_xmm(&mut args[0]);
    let b = ra.use_scratch_xmm(&mut args[1]);

    match esize {
        8 => {
            let bias = ra.scratch_xmm();
            let m = ra.asm.m_const(0x8080808080808080, 0x8080808080808080).unwrap();
            ra.asm.movdqa_load(bias, m).unwrap();
            ra.asm.paddb(a, bias).unwrap();
            ra.asm.paddb(b, bias).unwrap();
            ra.asm.pavgb(a, b).unwrap();
            ra.asm.paddb(a, bias).unwrap();
            ra.release(bias);
        }
        16 => {
            let bias = ra.scratch_xmm();
            let m = ra.asm.m_const(0x8000800080008000, 0x8000800080008000).unwrap();
            ra.asm.movdqa_load(bias, m).unwrap();
            ra.asm.paddw(a, bias).unwrap();
            ra.asm.paddw(b, bias).unwrap();
            ra.asm.pavgw(a, b).unwrap();
            ra.asm.paddw(a, bias).unwrap();
            ra.release(bias);
        }
        32 => {
            let tmp1 = ra.scratch_xmm();
            ra.asm.movdqa(tmp1, a).unwrap();
            ra.asm.por(a, b).unwrap();
            ra.asm.psrad(tmp1, 1).unwrap();
            ra.asm.psrad(b, 1).unwrap();
            ra.asm.pslld(a, 31).unwrap();
            ra.asm.paddd(b, tmp1).unwrap();
            ra.asm.psrld(a, 31).unwrap();
            ra.asm.paddd(a, b).unwrap();
            ra.release(tmp1);
        }
        _ => unreachable!("bad rounding-halving-add lane width"),
    }

    ra.release(b);
    ra.define_value(inst_ref, a);
}

pub fn emit_vector_rounding_halving_add_s8(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_rounding_halving_add_signed(8, ctx, ra, inst_ref, inst);
}
pub fn emit_vector_rounding_halving_add_s16(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_rounding_halving_add_signed(16, ctx, ra, inst_ref, inst);
}
pub fn emit_vector_rounding_halving_add_s32(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_rounding_halving_add_signed(32, ctx, ra, inst_ref, inst);
}

// ---------------------------------------------------------------------------
// VectorRoundingHalvingAddU
// ---------------------------------------------------------------------------

pub fn emit_vector_rounding_halving_add_u8(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_op(ra, inst_ref, inst, CodeAssembler::pavgb);
}

pub fn emit_vector_rounding_halving_add_u16(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_op(ra, inst_ref, inst, CodeAssembler::pavgw);
}

pub fn emit_vector_rounding_halving_add_u32(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let a = ra.use_scratch_xmm(&mut args[0]);
    let b = ra.use_scratch_xmm(&mut args[1]);
    let tmp1 = ra.scratch_xmm();

    ra.asm.movdqa(tmp1, a).unwrap();
    ra.asm.por(a, b).unwrap();
    ra.asm.psrld(tmp1, 1).unwrap();
    ra.asm.psrld(b, 1).unwrap();
    ra.asm.pslld(a, 31).unwrap();
    ra.asm.paddd(b, tmp1).unwrap();
    ra.asm.psrld(a, 31).unwrap();
    ra.asm.paddd(a, b).unwrap();

    ra.release(b);
    ra.release(tmp1);
    ra.define_value(inst_ref, a);
}
