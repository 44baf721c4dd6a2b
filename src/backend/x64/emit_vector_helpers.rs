use crate::backend::x64::abi::ABI_SHADOW_SPACE;
use crate::backend::x64::assembler::{self, xmmword_ptr, CodeAssembler, Reg, RegExp, RDI, RDX, RSI, RSP};
use crate::backend::x64::emit_context::EmitContext;
use crate::backend::x64::reg_alloc::RegAlloc;
use crate::ir::inst::Inst;
use crate::ir::value::InstRef;

/// One-argument scalar fallback: `fn(result, a)` over 16-byte lane arrays.
pub type FallbackFn1 = extern "C" fn(*mut [u8; 16], *const [u8; 16]);
/// Two-argument scalar fallback: `fn(result, a, b)`.
pub type FallbackFn2 = extern "C" fn(*mut [u8; 16], *const [u8; 16], *const [u8; 16]);
/// Saturating variants return a QC bit that is OR-ed into `fpsr_qc`.
pub type FallbackFn1Sat = extern "C" fn(*mut [u8; 16], *const [u8; 16]) -> u32;
pub type FallbackFn2Sat = extern "C" fn(*mut [u8; 16], *const [u8; 16], *const [u8; 16]) -> u32;

// ---------------------------------------------------------------------------
// Native SSE shapes
// ---------------------------------------------------------------------------

/// Binary op: result = op(arg0, arg1), destructive on arg0's register.
pub fn emit_vector_op(
    ra: &mut RegAlloc,
    inst_ref: InstRef,
    inst: &Inst,
    op: fn(&mut CodeAssembler, Reg, Reg) -> assembler::Result<()>,
) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let result = ra.use_scratch_xmm(&mut args[0]);
    let op2 = ra.use_xmm(&mut args[1]);
    op(&mut *ra.asm, result, op2).unwrap();
    ra.define_value(inst_ref, result);
}

/// Binary op with immediate: result = op(arg0, imm8).
pub fn emit_vector_op_imm(
    ra: &mut RegAlloc,
    inst_ref: InstRef,
    inst: &Inst,
    op: fn(&mut CodeAssembler, Reg, u8) -> assembler::Result<()>,
) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let result = ra.use_scratch_xmm(&mut args[0]);
    let imm = args[1].get_immediate_u8();
    op(&mut *ra.asm, result, imm).unwrap();
    ra.define_value(inst_ref, result);
}

/// Non-destructive unary op into a fresh register (pabs*, pmovsx* shapes).
pub fn emit_vector_unary_op(
    ra: &mut RegAlloc,
    inst_ref: InstRef,
    inst: &Inst,
    op: fn(&mut CodeAssembler, Reg, Reg) -> assembler::Result<()>,
) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let src = ra.use_xmm(&mut args[0]);
    let result = ra.scratch_xmm();
    op(&mut *ra.asm, result, src).unwrap();
    ra.release(src);
    ra.define_value(inst_ref, result);
}

/// pshufd-style op: result = op(arg0, imm8) into a fresh register.
pub fn emit_vector_shuffle_op(
    ra: &mut RegAlloc,
    inst_ref: InstRef,
    inst: &Inst,
    op: fn(&mut CodeAssembler, Reg, Reg, u8) -> assembler::Result<()>,
) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let src = ra.use_xmm(&mut args[0]);
    let imm = args[1].get_immediate_u8();
    let result = ra.scratch_xmm();
    op(&mut *ra.asm, result, src, imm).unwrap();
    ra.release(src);
    ra.define_value(inst_ref, result);
}

/// AVX three-operand op: result = op(arg0, arg1), emitted with the
/// destination aliased to arg0's register.
pub fn emit_avx_vector_op(
    ra: &mut RegAlloc,
    inst_ref: InstRef,
    inst: &Inst,
    op: fn(&mut CodeAssembler, Reg, Reg, Reg) -> assembler::Result<()>,
) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let result = ra.use_scratch_xmm(&mut args[0]);
    let op2 = ra.use_xmm(&mut args[1]);
    op(&mut *ra.asm, result, result, op2).unwrap();
    ra.define_value(inst_ref, result);
}

// ---------------------------------------------------------------------------
// Scalar fallbacks
//
// Operands are spilled to a 16-aligned window freshly reserved below the
// StackLayout; the callback receives pointers to (result, arg...) lane
// arrays in the System V parameter registers. Argument stores happen after
// host_call: the values still sit in their (now officially clobbered)
// registers because spilling only copies.
// ---------------------------------------------------------------------------

/// Stack window: [result:16][arg1:16].
pub fn emit_one_arg_fallback(ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst, func: usize) {
    let stack_space = 2 * 16;
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let arg1 = ra.use_xmm(&mut args[0]);
    let result = ra.scratch_xmm();
    ra.end_of_alloc_scope();

    ra.host_call(None, &mut [None, None, None, None]);
    ra.alloc_stack_space(stack_space + ABI_SHADOW_SPACE);

    let shadow = ABI_SHADOW_SPACE as i32;
    ra.asm.lea(RDI, xmmword_ptr(RegExp::from(RSP) + shadow)).unwrap();
    ra.asm.lea(RSI, xmmword_ptr(RegExp::from(RSP) + shadow + 16)).unwrap();
    ra.asm
        .movaps_store(xmmword_ptr(RegExp::from(RSP) + shadow + 16), arg1)
        .unwrap();
    ra.asm.call_function(func).unwrap();
    ra.asm
        .movaps_load(result, xmmword_ptr(RegExp::from(RSP) + shadow))
        .unwrap();

    ra.release_stack_space(stack_space + ABI_SHADOW_SPACE);
    ra.define_value(inst_ref, result);
}

/// Stack window: [result:16][arg1:16][arg2:16].
pub fn emit_two_arg_fallback(ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst, func: usize) {
    let stack_space = 3 * 16;
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let arg1 = ra.use_xmm(&mut args[0]);
    let arg2 = ra.use_xmm(&mut args[1]);
    let result = ra.scratch_xmm();
    ra.end_of_alloc_scope();

    ra.host_call(None, &mut [None, None, None, None]);
    ra.alloc_stack_space(stack_space + ABI_SHADOW_SPACE);

    let shadow = ABI_SHADOW_SPACE as i32;
    ra.asm.lea(RDI, xmmword_ptr(RegExp::from(RSP) + shadow)).unwrap();
    ra.asm.lea(RSI, xmmword_ptr(RegExp::from(RSP) + shadow + 16)).unwrap();
    ra.asm.lea(RDX, xmmword_ptr(RegExp::from(RSP) + shadow + 32)).unwrap();
    ra.asm
        .movaps_store(xmmword_ptr(RegExp::from(RSP) + shadow + 16), arg1)
        .unwrap();
    ra.asm
        .movaps_store(xmmword_ptr(RegExp::from(RSP) + shadow + 32), arg2)
        .unwrap();
    ra.asm.call_function(func).unwrap();
    ra.asm
        .movaps_load(result, xmmword_ptr(RegExp::from(RSP) + shadow))
        .unwrap();

    ra.release_stack_space(stack_space + ABI_SHADOW_SPACE);
    ra.define_value(inst_ref, result);
}

/// One-argument fallback whose callback returns a QC bit.
pub fn emit_one_arg_fallback_saturated(
    ctx: &EmitContext,
    ra: &mut RegAlloc,
    inst_ref: InstRef,
    inst: &Inst,
    func: usize,
) {
    let stack_space = 2 * 16;
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let arg1 = ra.use_xmm(&mut args[0]);
    let result = ra.scratch_xmm();
    ra.end_of_alloc_scope();

    ra.host_call(None, &mut [None, None, None, None]);
    ra.alloc_stack_space(stack_space + ABI_SHADOW_SPACE);

    let shadow = ABI_SHADOW_SPACE as i32;
    ra.asm.lea(RDI, xmmword_ptr(RegExp::from(RSP) + shadow)).unwrap();
    ra.asm.lea(RSI, xmmword_ptr(RegExp::from(RSP) + shadow + 16)).unwrap();
    ra.asm
        .movaps_store(xmmword_ptr(RegExp::from(RSP) + shadow + 16), arg1)
        .unwrap();
    ra.asm.call_function(func).unwrap();
    ra.asm
        .movaps_load(result, xmmword_ptr(RegExp::from(RSP) + shadow))
        .unwrap();

    ra.release_stack_space(stack_space + ABI_SHADOW_SPACE);

    or_qc_flag(ctx, ra);
    ra.define_value(inst_ref, result);
}

/// Two-argument fallback whose callback returns a QC bit.
pub fn emit_two_arg_fallback_saturated(
    ctx: &EmitContext,
    ra: &mut RegAlloc,
    inst_ref: InstRef,
    inst: &Inst,
    func: usize,
) {
    let stack_space = 3 * 16;
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let arg1 = ra.use_xmm(&mut args[0]);
    let arg2 = ra.use_xmm(&mut args[1]);
    let result = ra.scratch_xmm();
    ra.end_of_alloc_scope();

    ra.host_call(None, &mut [None, None, None, None]);
    ra.alloc_stack_space(stack_space + ABI_SHADOW_SPACE);

    let shadow = ABI_SHADOW_SPACE as i32;
    ra.asm.lea(RDI, xmmword_ptr(RegExp::from(RSP) + shadow)).unwrap();
    ra.asm.lea(RSI, xmmword_ptr(RegExp::from(RSP) + shadow + 16)).unwrap();
    ra.asm.lea(RDX, xmmword_ptr(RegExp::from(RSP) + shadow + 32)).unwrap();
    ra.asm
        .movaps_store(xmmword_ptr(RegExp::from(RSP) + shadow + 16), arg1)
        .unwrap();
    ra.asm
        .movaps_store(xmmword_ptr(RegExp::from(RSP) + shadow + 32), arg2)
        .unwrap();
    ra.asm.call_function(func).unwrap();
    ra.asm
        .movaps_load(result, xmmword_ptr(RegExp::from(RSP) + shadow))
        .unwrap();

    ra.release_stack_space(stack_space + ABI_SHADOW_SPACE);

    or_qc_flag(ctx, ra);
    ra.define_value(inst_ref, result);
}

/// `fpsr_qc |= eax` — the saturating-fallback return value is in EAX.
fn or_qc_flag(ctx: &EmitContext, ra: &mut RegAlloc) {
    ra.asm
        .or_store(
            assembler::dword_ptr(RegExp::from(assembler::R15) + ctx.fpsr_qc_offset),
            assembler::EAX,
        )
        .unwrap();
}
