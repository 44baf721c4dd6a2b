use crate::backend::x64::assembler::{xmmword_ptr, RegExp, R15};
use crate::backend::x64::emit_context::EmitContext;
use crate::backend::x64::emit_vector_arrangement as arr;
use crate::backend::x64::emit_vector_basic as basic;
use crate::backend::x64::emit_vector_compare as cmp;
use crate::backend::x64::emit_vector_halving as halving;
use crate::backend::x64::emit_vector_minmax as minmax;
use crate::backend::x64::emit_vector_misc as misc;
use crate::backend::x64::emit_vector_multiply as mul;
use crate::backend::x64::emit_vector_paired as paired;
use crate::backend::x64::emit_vector_saturated as sat;
use crate::backend::x64::emit_vector_shift as shift;
use crate::backend::x64::jit_state::JitState;
use crate::backend::x64::reg_alloc::RegAlloc;
use crate::ir::block::Block;
use crate::ir::inst::Inst;
use crate::ir::opcode::Opcode;
use crate::ir::value::InstRef;

/// Descriptor for an emitted block of native code.
pub struct BlockDescriptor {
    /// Offset into the code buffer where the block begins.
    pub entrypoint_offset: usize,
    /// Size of the emitted native code in bytes.
    pub size: usize,
}

fn emit_identity(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let args = ra.get_argument_info(&inst.args, inst.num_args());
    ra.define_value_from_arg(inst_ref, &args[0]);
}

fn emit_get_vector(_ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    let args = ra.get_argument_info(&inst.args, inst.num_args());
    let index = args[0].get_immediate_u8() as usize;
    assert!(index < 32, "vector register index out of range");

    let result = ra.scratch_xmm();
    let offset = JitState::offset_of_vec(index) as i32;
    ra.asm
        .movaps_load(result, xmmword_ptr(RegExp::from(R15) + offset))
        .unwrap();
    ra.define_value(inst_ref, result);
}

fn emit_set_vector(_ctx: &EmitContext, ra: &mut RegAlloc, _inst_ref: InstRef, inst: &Inst) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let index = args[0].get_immediate_u8() as usize;
    assert!(index < 32, "vector register index out of range");

    let value = ra.use_xmm(&mut args[1]);
    let offset = JitState::offset_of_vec(index) as i32;
    ra.asm
        .movaps_store(xmmword_ptr(RegExp::from(R15) + offset), value)
        .unwrap();
    ra.release(value);
}

/// Emit native x86-64 code for an IR block.
///
/// Walks the instructions in order, dispatches each opcode to its emitter,
/// releases the allocation scope between instructions, then jumps to the
/// exit stub (or emits `ret` when no stub is configured).
pub fn emit_block(ctx: &EmitContext, ra: &mut RegAlloc, block: &Block) -> BlockDescriptor {
    let start = ra.asm.size();
    log::trace!("emitting block of {} instructions", block.inst_count());

    for (i, inst) in block.instructions.iter().enumerate() {
        if inst.is_tombstone() {
            continue;
        }
        // Dead pure instructions are skipped rather than emitted.
        if inst.use_count == 0 && !inst.has_side_effects() {
            continue;
        }
        let inst_ref = InstRef(i as u32);

        match inst.opcode {
            Opcode::Void => {}
            Opcode::Identity => emit_identity(ctx, ra, inst_ref, inst),
            Opcode::GetVector => emit_get_vector(ctx, ra, inst_ref, inst),
            Opcode::SetVector => emit_set_vector(ctx, ra, inst_ref, inst),

            // --- Element access ---
            Opcode::VectorGetElement8 => arr::emit_vector_get_element8(ctx, ra, inst_ref, inst),
            Opcode::VectorGetElement16 => arr::emit_vector_get_element16(ctx, ra, inst_ref, inst),
            Opcode::VectorGetElement32 => arr::emit_vector_get_element32(ctx, ra, inst_ref, inst),
            Opcode::VectorGetElement64 => arr::emit_vector_get_element64(ctx, ra, inst_ref, inst),
            Opcode::VectorSetElement8 => arr::emit_vector_set_element8(ctx, ra, inst_ref, inst),
            Opcode::VectorSetElement16 => arr::emit_vector_set_element16(ctx, ra, inst_ref, inst),
            Opcode::VectorSetElement32 => arr::emit_vector_set_element32(ctx, ra, inst_ref, inst),
            Opcode::VectorSetElement64 => arr::emit_vector_set_element64(ctx, ra, inst_ref, inst),

            // --- Bitwise ---
            Opcode::VectorAnd => basic::emit_vector_and(ctx, ra, inst_ref, inst),
            Opcode::VectorAndNot => basic::emit_vector_and_not(ctx, ra, inst_ref, inst),
            Opcode::VectorOr => basic::emit_vector_or(ctx, ra, inst_ref, inst),
            Opcode::VectorEor => basic::emit_vector_eor(ctx, ra, inst_ref, inst),
            Opcode::VectorNot => basic::emit_vector_not(ctx, ra, inst_ref, inst),

            // --- Arithmetic ---
            Opcode::VectorAdd8 => basic::emit_vector_add8(ctx, ra, inst_ref, inst),
            Opcode::VectorAdd16 => basic::emit_vector_add16(ctx, ra, inst_ref, inst),
            Opcode::VectorAdd32 => basic::emit_vector_add32(ctx, ra, inst_ref, inst),
            Opcode::VectorAdd64 => basic::emit_vector_add64(ctx, ra, inst_ref, inst),
            Opcode::VectorSub8 => basic::emit_vector_sub8(ctx, ra, inst_ref, inst),
            Opcode::VectorSub16 => basic::emit_vector_sub16(ctx, ra, inst_ref, inst),
            Opcode::VectorSub32 => basic::emit_vector_sub32(ctx, ra, inst_ref, inst),
            Opcode::VectorSub64 => basic::emit_vector_sub64(ctx, ra, inst_ref, inst),

            // --- Compare ---
            Opcode::VectorEqual8 => cmp::emit_vector_equal8(ctx, ra, inst_ref, inst),
            Opcode::VectorEqual16 => cmp::emit_vector_equal16(ctx, ra, inst_ref, inst),
            Opcode::VectorEqual32 => cmp::emit_vector_equal32(ctx, ra, inst_ref, inst),
            Opcode::VectorEqual64 => cmp::emit_vector_equal64(ctx, ra, inst_ref, inst),
            Opcode::VectorEqual128 => cmp::emit_vector_equal128(ctx, ra, inst_ref, inst),
            Opcode::VectorGreaterS8 => cmp::emit_vector_greater_s8(ctx, ra, inst_ref, inst),
            Opcode::VectorGreaterS16 => cmp::emit_vector_greater_s16(ctx, ra, inst_ref, inst),
            Opcode::VectorGreaterS32 => cmp::emit_vector_greater_s32(ctx, ra, inst_ref, inst),
            Opcode::VectorGreaterS64 => cmp::emit_vector_greater_s64(ctx, ra, inst_ref, inst),

            // --- Shifts by immediate ---
            Opcode::VectorLogicalShiftLeft8 => shift::emit_vector_logical_shift_left8(ctx, ra, inst_ref, inst),
            Opcode::VectorLogicalShiftLeft16 => shift::emit_vector_logical_shift_left16(ctx, ra, inst_ref, inst),
            Opcode::VectorLogicalShiftLeft32 => shift::emit_vector_logical_shift_left32(ctx, ra, inst_ref, inst),
            Opcode::VectorLogicalShiftLeft64 => shift::emit_vector_logical_shift_left64(ctx, ra, inst_ref, inst),
            Opcode::VectorLogicalShiftRight8 => shift::emit_vector_logical_shift_right8(ctx, ra, inst_ref, inst),
            Opcode::VectorLogicalShiftRight16 => shift::emit_vector_logical_shift_right16(ctx, ra, inst_ref, inst),
            Opcode::VectorLogicalShiftRight32 => shift::emit_vector_logical_shift_right32(ctx, ra, inst_ref, inst),
            Opcode::VectorLogicalShiftRight64 => shift::emit_vector_logical_shift_right64(ctx, ra, inst_ref, inst),
            Opcode::VectorArithmeticShiftRight8 => shift::emit_vector_arithmetic_shift_right8(ctx, ra, inst_ref, inst),
            Opcode::VectorArithmeticShiftRight16 => shift::emit_vector_arithmetic_shift_right16(ctx, ra, inst_ref, inst),
            Opcode::VectorArithmeticShiftRight32 => shift::emit_vector_arithmetic_shift_right32(ctx, ra, inst_ref, inst),
            Opcode::VectorArithmeticShiftRight64 => shift::emit_vector_arithmetic_shift_right64(ctx, ra, inst_ref, inst),

            // --- Per-lane dynamic shifts ---
            Opcode::VectorLogicalVShiftS8 => shift::emit_vector_logical_vshift_s8(ctx, ra, inst_ref, inst),
            Opcode::VectorLogicalVShiftS16 => shift::emit_vector_logical_vshift_s16(ctx, ra, inst_ref, inst),
            Opcode::VectorLogicalVShiftS32 => shift::emit_vector_logical_vshift_s32(ctx, ra, inst_ref, inst),
            Opcode::VectorLogicalVShiftS64 => shift::emit_vector_logical_vshift_s64(ctx, ra, inst_ref, inst),
            Opcode::VectorLogicalVShiftU8 => shift::emit_vector_logical_vshift_u8(ctx, ra, inst_ref, inst),
            Opcode::VectorLogicalVShiftU16 => shift::emit_vector_logical_vshift_u16(ctx, ra, inst_ref, inst),
            Opcode::VectorLogicalVShiftU32 => shift::emit_vector_logical_vshift_u32(ctx, ra, inst_ref, inst),
            Opcode::VectorLogicalVShiftU64 => shift::emit_vector_logical_vshift_u64(ctx, ra, inst_ref, inst),

            // --- Rounding shift left ---
            Opcode::VectorRoundingShiftLeftS8 => shift::emit_vector_rounding_shift_left_s8(ctx, ra, inst_ref, inst),
            Opcode::VectorRoundingShiftLeftS16 => shift::emit_vector_rounding_shift_left_s16(ctx, ra, inst_ref, inst),
            Opcode::VectorRoundingShiftLeftS32 => shift::emit_vector_rounding_shift_left_s32(ctx, ra, inst_ref, inst),
            Opcode::VectorRoundingShiftLeftS64 => shift::emit_vector_rounding_shift_left_s64(ctx, ra, inst_ref, inst),
            Opcode::VectorRoundingShiftLeftU8 => shift::emit_vector_rounding_shift_left_u8(ctx, ra, inst_ref, inst),
            Opcode::VectorRoundingShiftLeftU16 => shift::emit_vector_rounding_shift_left_u16(ctx, ra, inst_ref, inst),
            Opcode::VectorRoundingShiftLeftU32 => shift::emit_vector_rounding_shift_left_u32(ctx, ra, inst_ref, inst),
            Opcode::VectorRoundingShiftLeftU64 => shift::emit_vector_rounding_shift_left_u64(ctx, ra, inst_ref, inst),

            // --- Halving ---
            Opcode::VectorHalvingAddS8 => halving::emit_vector_halving_add_s8(ctx, ra, inst_ref, inst),
            Opcode::VectorHalvingAddS16 => halving::emit_vector_halving_add_s16(ctx, ra, inst_ref, inst),
            Opcode::VectorHalvingAddS32 => halving::emit_vector_halving_add_s32(ctx, ra, inst_ref, inst),
            Opcode::VectorHalvingAddU8 => halving::emit_vector_halving_add_u8(ctx, ra, inst_ref, inst),
            Opcode::VectorHalvingAddU16 => halving::emit_vector_halving_add_u16(ctx, ra, inst_ref, inst),
            Opcode::VectorHalvingAddU32 => halving::emit_vector_halving_add_u32(ctx, ra, inst_ref, inst),
            Opcode::VectorHalvingSubS8 => halving::emit_vector_halving_sub_s8(ctx, ra, inst_ref, inst),
            Opcode::VectorHalvingSubS16 => halving::emit_vector_halving_sub_s16(ctx, ra, inst_ref, inst),
            Opcode::VectorHalvingSubS32 => halving::emit_vector_halving_sub_s32(ctx, ra, inst_ref, inst),
            Opcode::VectorHalvingSubU8 => halving::emit_vector_halving_sub_u8(ctx, ra, inst_ref, inst),
            Opcode::VectorHalvingSubU16 => halving::emit_vector_halving_sub_u16(ctx, ra, inst_ref, inst),
            Opcode::VectorHalvingSubU32 => halving::emit_vector_halving_sub_u32(ctx, ra, inst_ref, inst),
            Opcode::VectorRoundingHalvingAddS8 => halving::emit_vector_rounding_halving_add_s8(ctx, ra, inst_ref, inst),
            Opcode::VectorRoundingHalvingAddS16 => halving::emit_vector_rounding_halving_add_s16(ctx, ra, inst_ref, inst),
            Opcode::VectorRoundingHalvingAddS32 => halving::emit_vector_rounding_halving_add_s32(ctx, ra, inst_ref, inst),
            Opcode::VectorRoundingHalvingAddU8 => halving::emit_vector_rounding_halving_add_u8(ctx, ra, inst_ref, inst),
            Opcode::VectorRoundingHalvingAddU16 => halving::emit_vector_rounding_halving_add_u16(ctx, ra, inst_ref, inst),
            Opcode::VectorRoundingHalvingAddU32 => halving::emit_vector_rounding_halving_add_u32(ctx, ra, inst_ref, inst),

            // --- Absolute value ---
            Opcode::VectorAbs8 => basic::emit_vector_abs8(ctx, ra, inst_ref, inst),
            Opcode::VectorAbs16 => basic::emit_vector_abs16(ctx, ra, inst_ref, inst),
            Opcode::VectorAbs32 => basic::emit_vector_abs32(ctx, ra, inst_ref, inst),
            Opcode::VectorAbs64 => basic::emit_vector_abs64(ctx, ra, inst_ref, inst),

            // --- Min/max ---
            Opcode::VectorMaxS8 => minmax::emit_vector_max_s8(ctx, ra, inst_ref, inst),
            Opcode::VectorMaxS16 => minmax::emit_vector_max_s16(ctx, ra, inst_ref, inst),
            Opcode::VectorMaxS32 => minmax::emit_vector_max_s32(ctx, ra, inst_ref, inst),
            Opcode::VectorMaxS64 => minmax::emit_vector_max_s64(ctx, ra, inst_ref, inst),
            Opcode::VectorMaxU8 => minmax::emit_vector_max_u8(ctx, ra, inst_ref, inst),
            Opcode::VectorMaxU16 => minmax::emit_vector_max_u16(ctx, ra, inst_ref, inst),
            Opcode::VectorMaxU32 => minmax::emit_vector_max_u32(ctx, ra, inst_ref, inst),
            Opcode::VectorMaxU64 => minmax::emit_vector_max_u64(ctx, ra, inst_ref, inst),
            Opcode::VectorMinS8 => minmax::emit_vector_min_s8(ctx, ra, inst_ref, inst),
            Opcode::VectorMinS16 => minmax::emit_vector_min_s16(ctx, ra, inst_ref, inst),
            Opcode::VectorMinS32 => minmax::emit_vector_min_s32(ctx, ra, inst_ref, inst),
            Opcode::VectorMinS64 => minmax::emit_vector_min_s64(ctx, ra, inst_ref, inst),
            Opcode::VectorMinU8 => minmax::emit_vector_min_u8(ctx, ra, inst_ref, inst),
            Opcode::VectorMinU16 => minmax::emit_vector_min_u16(ctx, ra, inst_ref, inst),
            Opcode::VectorMinU32 => minmax::emit_vector_min_u32(ctx, ra, inst_ref, inst),
            Opcode::VectorMinU64 => minmax::emit_vector_min_u64(ctx, ra, inst_ref, inst),

            // --- Multiply ---
            Opcode::VectorMultiply8 => mul::emit_vector_multiply8(ctx, ra, inst_ref, inst),
            Opcode::VectorMultiply16 => mul::emit_vector_multiply16(ctx, ra, inst_ref, inst),
            Opcode::VectorMultiply32 => mul::emit_vector_multiply32(ctx, ra, inst_ref, inst),
            Opcode::VectorMultiply64 => mul::emit_vector_multiply64(ctx, ra, inst_ref, inst),
            Opcode::VectorPolynomialMultiply8 => mul::emit_vector_polynomial_multiply8(ctx, ra, inst_ref, inst),
            Opcode::VectorPolynomialMultiplyLong8 => mul::emit_vector_polynomial_multiply_long8(ctx, ra, inst_ref, inst),
            Opcode::VectorPolynomialMultiplyLong64 => mul::emit_vector_polynomial_multiply_long64(ctx, ra, inst_ref, inst),

            // --- Narrow / widen ---
            Opcode::VectorNarrow16 => arr::emit_vector_narrow16(ctx, ra, inst_ref, inst),
            Opcode::VectorNarrow32 => arr::emit_vector_narrow32(ctx, ra, inst_ref, inst),
            Opcode::VectorNarrow64 => arr::emit_vector_narrow64(ctx, ra, inst_ref, inst),
            Opcode::VectorSignExtend8 => arr::emit_vector_sign_extend8(ctx, ra, inst_ref, inst),
            Opcode::VectorSignExtend16 => arr::emit_vector_sign_extend16(ctx, ra, inst_ref, inst),
            Opcode::VectorSignExtend32 => arr::emit_vector_sign_extend32(ctx, ra, inst_ref, inst),
            Opcode::VectorSignExtend64 => arr::emit_vector_sign_extend64(ctx, ra, inst_ref, inst),
            Opcode::VectorZeroExtend8 => arr::emit_vector_zero_extend8(ctx, ra, inst_ref, inst),
            Opcode::VectorZeroExtend16 => arr::emit_vector_zero_extend16(ctx, ra, inst_ref, inst),
            Opcode::VectorZeroExtend32 => arr::emit_vector_zero_extend32(ctx, ra, inst_ref, inst),
            Opcode::VectorZeroExtend64 => arr::emit_vector_zero_extend64(ctx, ra, inst_ref, inst),

            // --- Saturated ---
            Opcode::VectorSignedSaturatedAbs8 => sat::emit_vector_signed_saturated_abs8(ctx, ra, inst_ref, inst),
            Opcode::VectorSignedSaturatedAbs16 => sat::emit_vector_signed_saturated_abs16(ctx, ra, inst_ref, inst),
            Opcode::VectorSignedSaturatedAbs32 => sat::emit_vector_signed_saturated_abs32(ctx, ra, inst_ref, inst),
            Opcode::VectorSignedSaturatedAbs64 => sat::emit_vector_signed_saturated_abs64(ctx, ra, inst_ref, inst),
            Opcode::VectorSignedSaturatedNeg8 => sat::emit_vector_signed_saturated_neg8(ctx, ra, inst_ref, inst),
            Opcode::VectorSignedSaturatedNeg16 => sat::emit_vector_signed_saturated_neg16(ctx, ra, inst_ref, inst),
            Opcode::VectorSignedSaturatedNeg32 => sat::emit_vector_signed_saturated_neg32(ctx, ra, inst_ref, inst),
            Opcode::VectorSignedSaturatedNeg64 => sat::emit_vector_signed_saturated_neg64(ctx, ra, inst_ref, inst),
            Opcode::VectorSignedSaturatedDoublingMultiplyReturnHigh16 => {
                sat::emit_vector_signed_saturated_doubling_multiply_return_high16(ctx, ra, inst_ref, inst)
            }
            Opcode::VectorSignedSaturatedDoublingMultiplyReturnHigh32 => {
                sat::emit_vector_signed_saturated_doubling_multiply_return_high32(ctx, ra, inst_ref, inst)
            }
            Opcode::VectorSignedSaturatedNarrowToSigned16 => {
                sat::emit_vector_signed_saturated_narrow_to_signed16(ctx, ra, inst_ref, inst)
            }
            Opcode::VectorSignedSaturatedNarrowToSigned32 => {
                sat::emit_vector_signed_saturated_narrow_to_signed32(ctx, ra, inst_ref, inst)
            }
            Opcode::VectorSignedSaturatedNarrowToSigned64 => {
                sat::emit_vector_signed_saturated_narrow_to_signed64(ctx, ra, inst_ref, inst)
            }
            Opcode::VectorSignedSaturatedNarrowToUnsigned16 => {
                sat::emit_vector_signed_saturated_narrow_to_unsigned16(ctx, ra, inst_ref, inst)
            }
            Opcode::VectorSignedSaturatedNarrowToUnsigned32 => {
                sat::emit_vector_signed_saturated_narrow_to_unsigned32(ctx, ra, inst_ref, inst)
            }
            Opcode::VectorSignedSaturatedNarrowToUnsigned64 => {
                sat::emit_vector_signed_saturated_narrow_to_unsigned64(ctx, ra, inst_ref, inst)
            }
            Opcode::VectorUnsignedSaturatedNarrow16 => sat::emit_vector_unsigned_saturated_narrow16(ctx, ra, inst_ref, inst),
            Opcode::VectorUnsignedSaturatedNarrow32 => sat::emit_vector_unsigned_saturated_narrow32(ctx, ra, inst_ref, inst),
            Opcode::VectorUnsignedSaturatedNarrow64 => sat::emit_vector_unsigned_saturated_narrow64(ctx, ra, inst_ref, inst),

            // --- Paired ---
            Opcode::VectorPairedAdd8 => paired::emit_vector_paired_add8(ctx, ra, inst_ref, inst),
            Opcode::VectorPairedAdd16 => paired::emit_vector_paired_add16(ctx, ra, inst_ref, inst),
            Opcode::VectorPairedAdd32 => paired::emit_vector_paired_add32(ctx, ra, inst_ref, inst),
            Opcode::VectorPairedAdd64 => paired::emit_vector_paired_add64(ctx, ra, inst_ref, inst),
            Opcode::VectorPairedAddLower8 => paired::emit_vector_paired_add_lower8(ctx, ra, inst_ref, inst),
            Opcode::VectorPairedAddLower16 => paired::emit_vector_paired_add_lower16(ctx, ra, inst_ref, inst),
            Opcode::VectorPairedAddLower32 => paired::emit_vector_paired_add_lower32(ctx, ra, inst_ref, inst),
            Opcode::VectorPairedAddSignedWiden8 => paired::emit_vector_paired_add_signed_widen8(ctx, ra, inst_ref, inst),
            Opcode::VectorPairedAddSignedWiden16 => paired::emit_vector_paired_add_signed_widen16(ctx, ra, inst_ref, inst),
            Opcode::VectorPairedAddSignedWiden32 => paired::emit_vector_paired_add_signed_widen32(ctx, ra, inst_ref, inst),
            Opcode::VectorPairedAddUnsignedWiden8 => paired::emit_vector_paired_add_unsigned_widen8(ctx, ra, inst_ref, inst),
            Opcode::VectorPairedAddUnsignedWiden16 => paired::emit_vector_paired_add_unsigned_widen16(ctx, ra, inst_ref, inst),
            Opcode::VectorPairedAddUnsignedWiden32 => paired::emit_vector_paired_add_unsigned_widen32(ctx, ra, inst_ref, inst),
            Opcode::VectorPairedMaxS8 => paired::emit_vector_paired_max_s8(ctx, ra, inst_ref, inst),
            Opcode::VectorPairedMaxS16 => paired::emit_vector_paired_max_s16(ctx, ra, inst_ref, inst),
            Opcode::VectorPairedMaxS32 => paired::emit_vector_paired_max_s32(ctx, ra, inst_ref, inst),
            Opcode::VectorPairedMaxU8 => paired::emit_vector_paired_max_u8(ctx, ra, inst_ref, inst),
            Opcode::VectorPairedMaxU16 => paired::emit_vector_paired_max_u16(ctx, ra, inst_ref, inst),
            Opcode::VectorPairedMaxU32 => paired::emit_vector_paired_max_u32(ctx, ra, inst_ref, inst),
            Opcode::VectorPairedMinS8 => paired::emit_vector_paired_min_s8(ctx, ra, inst_ref, inst),
            Opcode::VectorPairedMinS16 => paired::emit_vector_paired_min_s16(ctx, ra, inst_ref, inst),
            Opcode::VectorPairedMinS32 => paired::emit_vector_paired_min_s32(ctx, ra, inst_ref, inst),
            Opcode::VectorPairedMinU8 => paired::emit_vector_paired_min_u8(ctx, ra, inst_ref, inst),
            Opcode::VectorPairedMinU16 => paired::emit_vector_paired_min_u16(ctx, ra, inst_ref, inst),
            Opcode::VectorPairedMinU32 => paired::emit_vector_paired_min_u32(ctx, ra, inst_ref, inst),

            // --- Deinterleave / interleave ---
            Opcode::VectorDeinterleaveEven8 => arr::emit_vector_deinterleave_even8(ctx, ra, inst_ref, inst),
            Opcode::VectorDeinterleaveEven16 => arr::emit_vector_deinterleave_even16(ctx, ra, inst_ref, inst),
            Opcode::VectorDeinterleaveEven32 => arr::emit_vector_deinterleave_even32(ctx, ra, inst_ref, inst),
            Opcode::VectorDeinterleaveEven64 => arr::emit_vector_deinterleave_even64(ctx, ra, inst_ref, inst),
            Opcode::VectorDeinterleaveOdd8 => arr::emit_vector_deinterleave_odd8(ctx, ra, inst_ref, inst),
            Opcode::VectorDeinterleaveOdd16 => arr::emit_vector_deinterleave_odd16(ctx, ra, inst_ref, inst),
            Opcode::VectorDeinterleaveOdd32 => arr::emit_vector_deinterleave_odd32(ctx, ra, inst_ref, inst),
            Opcode::VectorDeinterleaveOdd64 => arr::emit_vector_deinterleave_odd64(ctx, ra, inst_ref, inst),
            Opcode::VectorInterleaveLower8 => arr::emit_vector_interleave_lower8(ctx, ra, inst_ref, inst),
            Opcode::VectorInterleaveLower16 => arr::emit_vector_interleave_lower16(ctx, ra, inst_ref, inst),
            Opcode::VectorInterleaveLower32 => arr::emit_vector_interleave_lower32(ctx, ra, inst_ref, inst),
            Opcode::VectorInterleaveLower64 => arr::emit_vector_interleave_lower64(ctx, ra, inst_ref, inst),
            Opcode::VectorInterleaveUpper8 => arr::emit_vector_interleave_upper8(ctx, ra, inst_ref, inst),
            Opcode::VectorInterleaveUpper16 => arr::emit_vector_interleave_upper16(ctx, ra, inst_ref, inst),
            Opcode::VectorInterleaveUpper32 => arr::emit_vector_interleave_upper32(ctx, ra, inst_ref, inst),
            Opcode::VectorInterleaveUpper64 => arr::emit_vector_interleave_upper64(ctx, ra, inst_ref, inst),

            // --- Broadcast / shuffle / extract ---
            Opcode::VectorBroadcast8 => arr::emit_vector_broadcast8(ctx, ra, inst_ref, inst),
            Opcode::VectorBroadcast16 => arr::emit_vector_broadcast16(ctx, ra, inst_ref, inst),
            Opcode::VectorBroadcast32 => arr::emit_vector_broadcast32(ctx, ra, inst_ref, inst),
            Opcode::VectorBroadcast64 => arr::emit_vector_broadcast64(ctx, ra, inst_ref, inst),
            Opcode::VectorBroadcastLower8 => arr::emit_vector_broadcast_lower8(ctx, ra, inst_ref, inst),
            Opcode::VectorBroadcastLower16 => arr::emit_vector_broadcast_lower16(ctx, ra, inst_ref, inst),
            Opcode::VectorBroadcastLower32 => arr::emit_vector_broadcast_lower32(ctx, ra, inst_ref, inst),
            Opcode::VectorShuffleHighHalfwords => arr::emit_vector_shuffle_high_halfwords(ctx, ra, inst_ref, inst),
            Opcode::VectorShuffleLowHalfwords => arr::emit_vector_shuffle_low_halfwords(ctx, ra, inst_ref, inst),
            Opcode::VectorShuffleWords => arr::emit_vector_shuffle_words(ctx, ra, inst_ref, inst),
            Opcode::VectorExtract => arr::emit_vector_extract(ctx, ra, inst_ref, inst),
            Opcode::VectorExtractLower => arr::emit_vector_extract_lower(ctx, ra, inst_ref, inst),

            // --- Bit manipulation ---
            Opcode::VectorPopulationCount => basic::emit_vector_population_count(ctx, ra, inst_ref, inst),
            Opcode::VectorReverseBits => basic::emit_vector_reverse_bits(ctx, ra, inst_ref, inst),

            // --- Absolute difference ---
            Opcode::VectorSignedAbsoluteDifference8 => misc::emit_vector_signed_absolute_difference8(ctx, ra, inst_ref, inst),
            Opcode::VectorSignedAbsoluteDifference16 => misc::emit_vector_signed_absolute_difference16(ctx, ra, inst_ref, inst),
            Opcode::VectorSignedAbsoluteDifference32 => misc::emit_vector_signed_absolute_difference32(ctx, ra, inst_ref, inst),
            Opcode::VectorUnsignedAbsoluteDifference8 => misc::emit_vector_unsigned_absolute_difference8(ctx, ra, inst_ref, inst),
            Opcode::VectorUnsignedAbsoluteDifference16 => misc::emit_vector_unsigned_absolute_difference16(ctx, ra, inst_ref, inst),
            Opcode::VectorUnsignedAbsoluteDifference32 => misc::emit_vector_unsigned_absolute_difference32(ctx, ra, inst_ref, inst),

            // --- Table lookup ---
            Opcode::VectorTable => misc::emit_vector_table(ctx, ra, inst_ref, inst),
            Opcode::VectorTableLookup => misc::emit_vector_table_lookup(ctx, ra, inst_ref, inst, block),

            // --- Misc ---
            Opcode::ZeroVector => basic::emit_zero_vector(ctx, ra, inst_ref, inst),
            Opcode::VectorZeroUpper => basic::emit_vector_zero_upper(ctx, ra, inst_ref, inst),
        }

        ra.end_of_alloc_scope();
    }

    // Block terminal: hand control back to the exit stub.
    match ctx.exit_offset {
        Some(offset) => ra.asm.jmp_to(offset).unwrap(),
        None => ra.asm.ret().unwrap(),
    }

    BlockDescriptor {
        entrypoint_offset: start,
        size: ra.asm.size() - start,
    }
}
