use crate::backend::x64::abi::ABI_SHADOW_SPACE;
use crate::backend::x64::assembler::{xmmword_ptr, RegExp, RCX, RDI, RDX, RSI, RSP};
use crate::backend::x64::emit_context::EmitContext;
use crate::backend::x64::host_feature::HostFeature;
use crate::backend::x64::hostloc::HostLoc;
use crate::backend::x64::reg_alloc::RegAlloc;
use crate::ir::block::Block;
use crate::ir::inst::Inst;
use crate::ir::opcode::Opcode;
use crate::ir::value::{InstRef, Value};

// ---------------------------------------------------------------------------
// VectorSignedAbsoluteDifference — |a - b| via compare-select of the two
// subtraction directions
// ---------------------------------------------------------------------------

fn emit_vector_signed_absolute_difference(
    esize: usize,
    _ctx: &EmitContext,
    ra: &mut RegAlloc,
    inst_ref: InstRef,
    inst: &Inst,
) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let x = ra.use_scratch_xmm(&mut args[0]);
    let y = ra.use_xmm(&mut args[1]);
    let mask = ra.scratch_xmm();
    let tmp1 = ra.scratch_xmm();
    let tmp2 = ra.scratch_xmm();

    ra.asm.movdqa(mask, x).unwrap();
    ra.asm.movdqa(tmp1, y).unwrap();

    match esize {
        8 => {
            ra.asm.pcmpgtb(mask, y).unwrap();
            ra.asm.psubb(tmp1, x).unwrap();
            ra.asm.psubb(x, y).unwrap();
        }
        16 => {
            ra.asm.pcmpgtw(mask, y).unwrap();
            ra.asm.psubw(tmp1, x).unwrap();
            ra.asm.psubw(x, y).unwrap();
        }
        32 => {
            ra.asm.pcmpgtd(mask, y).unwrap();
            ra.asm.psubd(tmp1, x).unwrap();
            ra.asm.psubd(x, y).unwrap();
        }
        _ => unreachable!("bad absolute-difference lane width"),
    }

    ra.asm.movdqa(tmp2, mask).unwrap();
    ra.asm.pand(x, mask).unwrap();
    ra.asm.pandn(tmp2, tmp1).unwrap();
    ra.asm.por(x, tmp2).unwrap();

    ra.release(y);
    ra.release(mask);
    ra.release(tmp1);
    ra.release(tmp2);
    ra.define_value(inst_ref, x);
}

pub fn emit_vector_signed_absolute_difference8(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_signed_absolute_difference(8, ctx, ra, inst_ref, inst);
}
pub fn emit_vector_signed_absolute_difference16(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_signed_absolute_difference(16, ctx, ra, inst_ref, inst);
}
pub fn emit_vector_signed_absolute_difference32(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_signed_absolute_difference(32, ctx, ra, inst_ref, inst);
}

// ---------------------------------------------------------------------------
// VectorUnsignedAbsoluteDifference
// ---------------------------------------------------------------------------

fn emit_vector_unsigned_absolute_difference(
    esize: usize,
    ctx: &EmitContext,
    ra: &mut RegAlloc,
    inst_ref: InstRef,
    inst: &Inst,
) {
    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let temp = ra.scratch_xmm();

    match esize {
        8 => {
            // max(a,b) - min(a,b) == (a -sat b) | (b -sat a)
            let x = ra.use_xmm(&mut args[0]);
            let y = ra.use_scratch_xmm(&mut args[1]);

            ra.asm.movdqa(temp, x).unwrap();
            ra.asm.psubusb(temp, y).unwrap();
            ra.asm.psubusb(y, x).unwrap();
            ra.asm.por(temp, y).unwrap();

            ra.release(x);
            ra.release(y);
        }
        16 => {
            let x = ra.use_xmm(&mut args[0]);
            let y = ra.use_scratch_xmm(&mut args[1]);

            ra.asm.movdqa(temp, x).unwrap();
            ra.asm.psubusw(temp, y).unwrap();
            ra.asm.psubusw(y, x).unwrap();
            ra.asm.por(temp, y).unwrap();

            ra.release(x);
            ra.release(y);
        }
        32 => {
            if ctx.has(HostFeature::SSE41) {
                let x = ra.use_scratch_xmm(&mut args[0]);
                let y = ra.use_xmm(&mut args[1]);

                ra.asm.movdqa(temp, x).unwrap();
                ra.asm.pminud(x, y).unwrap();
                ra.asm.pmaxud(temp, y).unwrap();
                ra.asm.psubd(temp, x).unwrap();

                ra.release(x);
                ra.release(y);
            } else {
                // Bias into signed range, then |a - b| from the compare mask.
                let x = ra.use_scratch_xmm(&mut args[0]);
                let y = ra.use_scratch_xmm(&mut args[1]);

                let m = ra.asm.m_const(0x8000000080000000, 0x8000000080000000).unwrap();
                ra.asm.movdqa_load(temp, m).unwrap();
                ra.asm.pxor(x, temp).unwrap();
                ra.asm.pxor(y, temp).unwrap();
                ra.asm.movdqa(temp, x).unwrap();
                ra.asm.psubd(temp, y).unwrap();
                ra.asm.pcmpgtd(y, x).unwrap();
                ra.asm.psrld(y, 1).unwrap();
                ra.asm.pxor(temp, y).unwrap();
                ra.asm.psubd(temp, y).unwrap();

                ra.release(x);
                ra.release(y);
            }
        }
        _ => unreachable!("bad absolute-difference lane width"),
    }

    ra.define_value(inst_ref, temp);
}

pub fn emit_vector_unsigned_absolute_difference8(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_unsigned_absolute_difference(8, ctx, ra, inst_ref, inst);
}
pub fn emit_vector_unsigned_absolute_difference16(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_unsigned_absolute_difference(16, ctx, ra, inst_ref, inst);
}
pub fn emit_vector_unsigned_absolute_difference32(ctx: &EmitContext, ra: &mut RegAlloc, inst_ref: InstRef, inst: &Inst) {
    emit_vector_unsigned_absolute_difference(32, ctx, ra, inst_ref, inst);
}

// ---------------------------------------------------------------------------
// VectorTableLookup
//
// result[i] = table[indices[i] / 16][indices[i] % 16] when in range, else
// defaults[i]. The VectorTable instruction itself emits nothing; it only
// keeps its operands alive so they can be allocated here.
// ---------------------------------------------------------------------------

extern "C" fn fallback_table_lookup(
    table: *const [u8; 16],
    result: *mut [u8; 16],
    indices: *const [u8; 16],
    table_size: usize,
) {
    unsafe {
        let indices = &*indices;
        let result = &mut *result;
        for i in 0..16 {
            let index = (indices[i] / 16) as usize;
            let elem = (indices[i] % 16) as usize;
            if index < table_size {
                result[i] = (*table.add(index))[elem];
            }
        }
    }
}

pub fn emit_vector_table(_ctx: &EmitContext, _ra: &mut RegAlloc, _inst_ref: InstRef, inst: &Inst) {
    // Intentionally emits nothing.
    assert_eq!(inst.use_count, 1, "table must be consumed exactly once");
}

pub fn emit_vector_table_lookup(
    ctx: &EmitContext,
    ra: &mut RegAlloc,
    inst_ref: InstRef,
    inst: &Inst,
    block: &Block,
) {
    let table_inst = block.get(inst.args[1].inst_ref());
    assert_eq!(table_inst.opcode, Opcode::VectorTable);

    let mut args = ra.get_argument_info(&inst.args, inst.num_args());
    let mut table = ra.get_argument_info(&table_inst.args, table_inst.num_args());

    let table_size = table.iter().take(4).filter(|arg| !arg.is_void()).count();
    assert!((1..=4).contains(&table_size), "table must hold 1-4 vectors");

    let is_defaults_zero = match inst.args[0] {
        Value::Inst(r) => block.get(r).opcode == Opcode::ZeroVector,
        _ => false,
    };

    if ctx.has(HostFeature::SSSE3) && is_defaults_zero && table_size == 1 {
        // Saturating bias pushes out-of-range selectors to >= 0x80, which
        // pshufb turns into zeros.
        let indices = ra.use_scratch_xmm(&mut args[2]);
        let xmm_table0 = ra.use_scratch_xmm(&mut table[0]);

        let bias = ra.asm.m_const(0x7070707070707070, 0x7070707070707070).unwrap();
        ra.asm.paddusb_mem(indices, bias).unwrap();
        ra.asm.pshufb(xmm_table0, indices).unwrap();

        ra.release(indices);
        ra.define_value(inst_ref, xmm_table0);
        return;
    }

    if ctx.has(HostFeature::SSE41) && table_size == 1 {
        let indices = ra.use_xmm(&mut args[2]);
        let defaults = ra.use_xmm(&mut args[0]);
        let xmm_table0 = ra.use_scratch_xmm(&mut table[0]);
        let xmm0 = ra.scratch_xmm_at(HostLoc::Xmm(0));

        let bias = ra.asm.m_const(0x7070707070707070, 0x7070707070707070).unwrap();
        ra.asm.movaps(xmm0, indices).unwrap();
        ra.asm.paddusb_mem(xmm0, bias).unwrap();
        ra.asm.pshufb(xmm_table0, indices).unwrap();
        ra.asm.pblendvb(xmm_table0, defaults).unwrap();

        ra.release(indices);
        ra.release(defaults);
        ra.release(xmm0);
        ra.define_value(inst_ref, xmm_table0);
        return;
    }

    if ctx.has(HostFeature::SSE41) && is_defaults_zero && table_size == 2 {
        let indices = ra.use_scratch_xmm(&mut args[2]);
        let xmm_table0 = ra.use_scratch_xmm(&mut table[0]);
        let xmm_table1 = ra.use_scratch_xmm(&mut table[1]);
        let xmm0 = ra.scratch_xmm_at(HostLoc::Xmm(0));

        let bias0 = ra.asm.m_const(0x7070707070707070, 0x7070707070707070).unwrap();
        let bias1 = ra.asm.m_const(0x6060606060606060, 0x6060606060606060).unwrap();
        ra.asm.movaps(xmm0, indices).unwrap();
        ra.asm.paddusb_mem(xmm0, bias0).unwrap();
        ra.asm.paddusb_mem(indices, bias1).unwrap();
        ra.asm.pshufb(xmm_table0, xmm0).unwrap();
        ra.asm.pshufb(xmm_table1, indices).unwrap();
        ra.asm.pblendvb(xmm_table0, xmm_table1).unwrap();

        ra.release(indices);
        ra.release(xmm_table1);
        ra.release(xmm0);
        ra.define_value(inst_ref, xmm_table0);
        return;
    }

    if ctx.has(HostFeature::SSE41) {
        let indices = ra.use_xmm(&mut args[2]);
        let result = ra.use_scratch_xmm(&mut args[0]);
        let masked = ra.scratch_xmm();
        let xmm0 = ra.scratch_xmm_at(HostLoc::Xmm(0));

        let m = ra.asm.m_const(0xF0F0F0F0F0F0F0F0, 0xF0F0F0F0F0F0F0F0).unwrap();
        ra.asm.movdqa_load(masked, m).unwrap();
        ra.asm.pand(masked, indices).unwrap();

        for (i, table_arg) in table.iter_mut().take(table_size).enumerate() {
            let xmm_table = ra.use_scratch_xmm(table_arg);
            let table_index = (i as u64 * 16) * 0x0101_0101_0101_0101;

            if table_index == 0 {
                ra.asm.pxor(xmm0, xmm0).unwrap();
                ra.asm.pcmpeqb(xmm0, masked).unwrap();
            } else {
                let sel = ra.asm.m_const(table_index, table_index).unwrap();
                ra.asm.movdqa_load(xmm0, sel).unwrap();
                ra.asm.pcmpeqb(xmm0, masked).unwrap();
            }
            ra.asm.pshufb(xmm_table, indices).unwrap();
            ra.asm.pblendvb(result, xmm_table).unwrap();

            ra.release(xmm_table);
        }

        ra.release(indices);
        ra.release(masked);
        ra.release(xmm0);
        ra.define_value(inst_ref, result);
        return;
    }

    // Scalar fallback: spill the tables, defaults and indices into a stack
    // window and run the lookup on the host.
    let stack_space = (table_size + 2) * 16;
    ra.alloc_stack_space(stack_space + ABI_SHADOW_SPACE);
    let shadow = ABI_SHADOW_SPACE as i32;

    for (i, table_arg) in table.iter_mut().take(table_size).enumerate() {
        let table_value = ra.use_xmm(table_arg);
        ra.asm
            .movaps_store(
                xmmword_ptr(RegExp::from(RSP) + shadow + (i as i32) * 16),
                table_value,
            )
            .unwrap();
        ra.release(table_value);
    }

    let defaults = ra.use_xmm(&mut args[0]);
    let indices = ra.use_xmm(&mut args[2]);
    let result = ra.scratch_xmm();
    ra.end_of_alloc_scope();
    ra.host_call(None, &mut [None, None, None, None]);

    let result_off = shadow + (table_size as i32) * 16;
    let indices_off = shadow + (table_size as i32 + 1) * 16;
    ra.asm.lea(RDI, xmmword_ptr(RegExp::from(RSP) + shadow)).unwrap();
    ra.asm.lea(RSI, xmmword_ptr(RegExp::from(RSP) + result_off)).unwrap();
    ra.asm.lea(RDX, xmmword_ptr(RegExp::from(RSP) + indices_off)).unwrap();
    ra.asm.mov_imm(RCX, table_size as i64).unwrap();
    ra.asm
        .movaps_store(xmmword_ptr(RegExp::from(RSP) + result_off), defaults)
        .unwrap();
    ra.asm
        .movaps_store(xmmword_ptr(RegExp::from(RSP) + indices_off), indices)
        .unwrap();
    ra.asm.call_function(fallback_table_lookup as usize).unwrap();
    ra.asm
        .movaps_load(result, xmmword_ptr(RegExp::from(RSP) + result_off))
        .unwrap();

    ra.release_stack_space(stack_space + ABI_SHADOW_SPACE);
    ra.define_value(inst_ref, result);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_table_lookup_in_and_out_of_range() {
        let table = [[0x11u8; 16], [0x22u8; 16]];
        let mut result = [0xAAu8; 16]; // pre-filled with defaults
        let mut indices = [0u8; 16];
        indices[0] = 0x05; // table 0
        indices[1] = 0x1F; // table 1
        indices[2] = 0x2F; // out of range → default kept
        fallback_table_lookup(table.as_ptr(), &mut result, &indices, 2);
        assert_eq!(result[0], 0x11);
        assert_eq!(result[1], 0x22);
        assert_eq!(result[2], 0xAA);
    }

    #[test]
    fn test_fallback_table_lookup_identity() {
        let mut table = [[0u8; 16]];
        for (i, b) in table[0].iter_mut().enumerate() {
            *b = (i as u8) * 0x11;
        }
        let mut result = [0u8; 16];
        let indices: [u8; 16] = core::array::from_fn(|i| i as u8);
        fallback_table_lookup(table.as_ptr(), &mut result, &indices, 1);
        assert_eq!(result, table[0]);
    }
}
