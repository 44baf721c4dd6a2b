//! Cross-path equivalence tests for the vector emitters.
//!
//! Every case builds a small IR block, emits it once per host-supported
//! CPU-feature subset, executes each emission, and requires bit-identical
//! results (and identical FPSR.QC behaviour) across all paths. Expected
//! values are additionally checked against scalar references, so the
//! SSE2-only path is validated too, not just consistent.

#![cfg(target_arch = "x86_64")]

use laneforge::backend::x64::block_of_code::BlockOfCode;
use laneforge::backend::x64::emit::emit_block;
use laneforge::backend::x64::emit_context::EmitContext;
use laneforge::backend::x64::host_feature::HostFeature;
use laneforge::backend::x64::jit_state::JitState;
use laneforge::backend::x64::reg_alloc::RegAlloc;
use laneforge::ir::block::Block;
use laneforge::ir::opcode::Opcode;
use laneforge::ir::value::Value;

/// Feature subsets to exercise, restricted to what the host supports.
fn feature_ladder() -> Vec<HostFeature> {
    let host = HostFeature::detect();
    let steps = [
        HostFeature::empty(),
        HostFeature::SSE3,
        HostFeature::SSE3 | HostFeature::SSSE3,
        HostFeature::SSE3 | HostFeature::SSSE3 | HostFeature::SSE41,
        HostFeature::SSE3 | HostFeature::SSSE3 | HostFeature::SSE41 | HostFeature::SSE42,
        HostFeature::SSE3
            | HostFeature::SSSE3
            | HostFeature::SSE41
            | HostFeature::SSE42
            | HostFeature::AVX,
        HostFeature::SSE3
            | HostFeature::SSSE3
            | HostFeature::SSE41
            | HostFeature::SSE42
            | HostFeature::AVX
            | HostFeature::AVX2,
        HostFeature::SSE3
            | HostFeature::SSSE3
            | HostFeature::SSE41
            | HostFeature::SSE42
            | HostFeature::AVX
            | HostFeature::AVX2
            | HostFeature::AVX512F
            | HostFeature::AVX512VL
            | HostFeature::AVX512BW
            | HostFeature::AVX512DQ,
        HostFeature::SSE3
            | HostFeature::SSSE3
            | HostFeature::SSE41
            | HostFeature::SSE42
            | HostFeature::AVX
            | HostFeature::AVX2
            | HostFeature::AVX512F
            | HostFeature::AVX512VL
            | HostFeature::AVX512BW
            | HostFeature::AVX512DQ
            | HostFeature::AVX512BITALG,
    ];
    let mut ladder: Vec<HostFeature> = steps
        .iter()
        .copied()
        .filter(|mask| host.contains(*mask))
        .collect();
    ladder.dedup();
    assert!(!ladder.is_empty());
    ladder
}

/// Emit `build`'s block under every feature subset, run each against the
/// given vector-register file, and require identical outputs. Returns the
/// final v0 and the final fpsr_qc.
fn run_case(inputs: &[[u8; 16]], build: impl Fn(&mut Block)) -> ([u8; 16], u32) {
    let mut boc = BlockOfCode::with_size(1 << 20).unwrap();
    let labels = boc.gen_prelude().unwrap();

    let mut result: Option<([u8; 16], u32)> = None;

    for features in feature_ladder() {
        let mut block = Block::new();
        build(&mut block);

        let ctx = EmitContext::new(features, Some(labels.exit_offset));
        let entrypoint = {
            let mut ra = RegAlloc::new_default(&mut boc.asm, block.inst_info());
            emit_block(&ctx, &mut ra, &block).entrypoint_offset
        };

        let mut state = JitState::new();
        for (i, input) in inputs.iter().enumerate() {
            state.set_vec(i, *input);
        }
        unsafe { boc.run(&mut state, entrypoint) };

        let out = (state.get_vec(0), state.fpsr_qc);
        match &result {
            None => result = Some(out),
            Some(prev) => assert_eq!(
                *prev, out,
                "cross-path mismatch under features {:?}",
                features
            ),
        }
    }

    result.unwrap()
}

/// Shorthand: load `n` vector registers, apply one opcode, store to v0.
fn unop(op: Opcode) -> impl Fn(&mut Block) {
    move |block: &mut Block| {
        let a = block.append(Opcode::GetVector, &[Value::ImmU8(0)]);
        let r = block.append(op, &[a]);
        block.append(Opcode::SetVector, &[Value::ImmU8(0), r]);
    }
}

fn binop(op: Opcode) -> impl Fn(&mut Block) {
    move |block: &mut Block| {
        let a = block.append(Opcode::GetVector, &[Value::ImmU8(0)]);
        let b = block.append(Opcode::GetVector, &[Value::ImmU8(1)]);
        let r = block.append(op, &[a, b]);
        block.append(Opcode::SetVector, &[Value::ImmU8(0), r]);
    }
}

fn imm_op(op: Opcode, imm: u8) -> impl Fn(&mut Block) {
    move |block: &mut Block| {
        let a = block.append(Opcode::GetVector, &[Value::ImmU8(0)]);
        let r = block.append(op, &[a, Value::ImmU8(imm)]);
        block.append(Opcode::SetVector, &[Value::ImmU8(0), r]);
    }
}

fn v128(lo: u64, hi: u64) -> [u8; 16] {
    let mut out = [0u8; 16];
    out[..8].copy_from_slice(&lo.to_le_bytes());
    out[8..].copy_from_slice(&hi.to_le_bytes());
    out
}

fn lanes64(v: [u8; 16]) -> [u64; 2] {
    [
        u64::from_le_bytes(v[..8].try_into().unwrap()),
        u64::from_le_bytes(v[8..].try_into().unwrap()),
    ]
}

const PATTERNS: &[[u8; 16]] = &[
    [0; 16],
    [0xFF; 16],
    [0x80; 16],
    [0x7F; 16],
    [
        0x00, 0x01, 0x02, 0x7F, 0x80, 0x81, 0xFE, 0xFF, 0x10, 0x55, 0xAA, 0xC3, 0x3C, 0x99, 0x66,
        0x42,
    ],
    [
        0xEF, 0xCD, 0xAB, 0x89, 0x67, 0x45, 0x23, 0x01, 0x01, 0x80, 0xFF, 0x7F, 0x00, 0x80, 0xFE,
        0x7E,
    ],
];

// ---------------------------------------------------------------------------
// Known-answer scenarios
// ---------------------------------------------------------------------------

#[test]
fn scenario_equal64_identical_inputs() {
    let a = v128(0x0807060504030201, 0x100F0E0D0C0B0A09);
    let (out, qc) = run_case(&[a, a], binop(Opcode::VectorEqual64));
    assert_eq!(out, [0xFF; 16]);
    assert_eq!(qc, 0);
}

#[test]
fn scenario_greater_s64() {
    let a = v128((-1i64) as u64, 1);
    let b = v128(0, 0);
    let (out, qc) = run_case(&[a, b], binop(Opcode::VectorGreaterS64));
    assert_eq!(lanes64(out), [0, !0]);
    assert_eq!(qc, 0);
}

#[test]
fn scenario_halving_add_u8() {
    let a = [0xFF; 16];
    let b = [0x01; 16];
    let (out, qc) = run_case(&[a, b], binop(Opcode::VectorHalvingAddU8));
    assert_eq!(out, [0x80; 16]);
    assert_eq!(qc, 0);
}

#[test]
fn scenario_signed_saturated_neg16() {
    let mut a = [0u8; 16];
    let lanes: [i16; 8] = [i16::MIN, 1, 2, 3, 4, 5, 6, 7];
    for (i, lane) in lanes.iter().enumerate() {
        a[i * 2..i * 2 + 2].copy_from_slice(&lane.to_le_bytes());
    }
    let (out, qc) = run_case(&[a], unop(Opcode::VectorSignedSaturatedNeg16));
    let mut expected = [0u8; 16];
    let exp_lanes: [i16; 8] = [i16::MAX, -1, -2, -3, -4, -5, -6, -7];
    for (i, lane) in exp_lanes.iter().enumerate() {
        expected[i * 2..i * 2 + 2].copy_from_slice(&lane.to_le_bytes());
    }
    assert_eq!(out, expected);
    assert_eq!(qc, 1);
}

#[test]
fn scenario_signed_saturated_doubling_multiply_high16() {
    let a = v128(0x8000800080008000, 0x8000800080008000);
    let (out, qc) = run_case(
        &[a, a],
        binop(Opcode::VectorSignedSaturatedDoublingMultiplyReturnHigh16),
    );
    assert_eq!(out, v128(0x7FFF7FFF7FFF7FFF, 0x7FFF7FFF7FFF7FFF));
    assert_eq!(qc, 1);
}

#[test]
fn scenario_table_lookup_identity() {
    let table0: [u8; 16] = core::array::from_fn(|i| (i as u8) * 0x11);
    let indices: [u8; 16] = core::array::from_fn(|i| i as u8);
    let (out, qc) = run_case(&[table0, indices], |block| {
        let t0 = block.append(Opcode::GetVector, &[Value::ImmU8(0)]);
        let idx = block.append(Opcode::GetVector, &[Value::ImmU8(1)]);
        let defaults = block.append(Opcode::ZeroVector, &[]);
        let table = block.append(Opcode::VectorTable, &[t0]);
        let r = block.append(Opcode::VectorTableLookup, &[defaults, table, idx]);
        block.append(Opcode::SetVector, &[Value::ImmU8(0), r]);
    });
    assert_eq!(out, table0);
    assert_eq!(qc, 0);
}

// ---------------------------------------------------------------------------
// Algebraic laws
// ---------------------------------------------------------------------------

#[test]
fn law_bitwise_identities() {
    for &v in PATTERNS {
        let (out, _) = run_case(&[v, v], binop(Opcode::VectorAnd));
        assert_eq!(out, v);
        let (out, _) = run_case(&[v, v], binop(Opcode::VectorOr));
        assert_eq!(out, v);
        let (out, _) = run_case(&[v, v], binop(Opcode::VectorEor));
        assert_eq!(out, [0; 16]);

        // Not(Not(v)) == v
        let (out, _) = run_case(&[v], |block| {
            let a = block.append(Opcode::GetVector, &[Value::ImmU8(0)]);
            let n = block.append(Opcode::VectorNot, &[a]);
            let nn = block.append(Opcode::VectorNot, &[n]);
            block.append(Opcode::SetVector, &[Value::ImmU8(0), nn]);
        });
        assert_eq!(out, v);
    }
}

#[test]
fn law_add_sub_round_trip() {
    let ops = [
        (Opcode::VectorAdd8, Opcode::VectorSub8),
        (Opcode::VectorAdd16, Opcode::VectorSub16),
        (Opcode::VectorAdd32, Opcode::VectorSub32),
        (Opcode::VectorAdd64, Opcode::VectorSub64),
    ];
    for (add, sub) in ops {
        for &v in PATTERNS {
            let w = PATTERNS[4];
            let (out, _) = run_case(&[v, w], move |block| {
                let a = block.append(Opcode::GetVector, &[Value::ImmU8(0)]);
                let b = block.append(Opcode::GetVector, &[Value::ImmU8(1)]);
                let diff = block.append(sub, &[a, b]);
                let back = block.append(add, &[diff, b]);
                block.append(Opcode::SetVector, &[Value::ImmU8(0), back]);
            });
            assert_eq!(out, v, "add/sub round trip failed for {:?}", add);
        }
    }
}

#[test]
fn law_broadcast_of_lane0_matches_broadcast_lower() {
    for &v in PATTERNS {
        let (full, _) = run_case(&[v], unop(Opcode::VectorBroadcast8));
        let (lower, _) = run_case(&[v], unop(Opcode::VectorBroadcastLower8));
        assert_eq!(&full[..8], &lower[..8]);
        assert_eq!(&lower[8..], &[0; 8]);
    }
}

// ---------------------------------------------------------------------------
// Reference-checked lane arithmetic
// ---------------------------------------------------------------------------

fn map_lanes8(v: [u8; 16], f: impl Fn(u8) -> u8) -> [u8; 16] {
    core::array::from_fn(|i| f(v[i]))
}

fn zip_lanes8(a: [u8; 16], b: [u8; 16], f: impl Fn(u8, u8) -> u8) -> [u8; 16] {
    core::array::from_fn(|i| f(a[i], b[i]))
}

fn zip_lanes16(a: [u8; 16], b: [u8; 16], f: impl Fn(u16, u16) -> u16) -> [u8; 16] {
    let mut out = [0u8; 16];
    for i in 0..8 {
        let x = u16::from_le_bytes(a[i * 2..i * 2 + 2].try_into().unwrap());
        let y = u16::from_le_bytes(b[i * 2..i * 2 + 2].try_into().unwrap());
        out[i * 2..i * 2 + 2].copy_from_slice(&f(x, y).to_le_bytes());
    }
    out
}

fn zip_lanes32(a: [u8; 16], b: [u8; 16], f: impl Fn(u32, u32) -> u32) -> [u8; 16] {
    let mut out = [0u8; 16];
    for i in 0..4 {
        let x = u32::from_le_bytes(a[i * 4..i * 4 + 4].try_into().unwrap());
        let y = u32::from_le_bytes(b[i * 4..i * 4 + 4].try_into().unwrap());
        out[i * 4..i * 4 + 4].copy_from_slice(&f(x, y).to_le_bytes());
    }
    out
}

fn zip_lanes64(a: [u8; 16], b: [u8; 16], f: impl Fn(u64, u64) -> u64) -> [u8; 16] {
    let [a0, a1] = lanes64(a);
    let [b0, b1] = lanes64(b);
    v128(f(a0, b0), f(a1, b1))
}

#[test]
fn multiply_all_widths() {
    let a = PATTERNS[4];
    let b = PATTERNS[5];

    let (out, _) = run_case(&[a, b], binop(Opcode::VectorMultiply8));
    assert_eq!(out, zip_lanes8(a, b, |x, y| x.wrapping_mul(y)));

    let (out, _) = run_case(&[a, b], binop(Opcode::VectorMultiply16));
    assert_eq!(out, zip_lanes16(a, b, |x, y| x.wrapping_mul(y)));

    let (out, _) = run_case(&[a, b], binop(Opcode::VectorMultiply32));
    assert_eq!(out, zip_lanes32(a, b, |x, y| x.wrapping_mul(y)));

    let (out, _) = run_case(&[a, b], binop(Opcode::VectorMultiply64));
    assert_eq!(out, zip_lanes64(a, b, |x, y| x.wrapping_mul(y)));
}

#[test]
fn minmax_all_widths() {
    let a = PATTERNS[4];
    let b = PATTERNS[5];

    let (out, _) = run_case(&[a, b], binop(Opcode::VectorMaxS8));
    assert_eq!(out, zip_lanes8(a, b, |x, y| (x as i8).max(y as i8) as u8));
    let (out, _) = run_case(&[a, b], binop(Opcode::VectorMinS8));
    assert_eq!(out, zip_lanes8(a, b, |x, y| (x as i8).min(y as i8) as u8));
    let (out, _) = run_case(&[a, b], binop(Opcode::VectorMaxU8));
    assert_eq!(out, zip_lanes8(a, b, |x, y| x.max(y)));
    let (out, _) = run_case(&[a, b], binop(Opcode::VectorMinU8));
    assert_eq!(out, zip_lanes8(a, b, |x, y| x.min(y)));

    let (out, _) = run_case(&[a, b], binop(Opcode::VectorMaxS16));
    assert_eq!(out, zip_lanes16(a, b, |x, y| (x as i16).max(y as i16) as u16));
    let (out, _) = run_case(&[a, b], binop(Opcode::VectorMinU16));
    assert_eq!(out, zip_lanes16(a, b, |x, y| x.min(y)));
    let (out, _) = run_case(&[a, b], binop(Opcode::VectorMaxU16));
    assert_eq!(out, zip_lanes16(a, b, |x, y| x.max(y)));
    let (out, _) = run_case(&[a, b], binop(Opcode::VectorMinS16));
    assert_eq!(out, zip_lanes16(a, b, |x, y| (x as i16).min(y as i16) as u16));

    let (out, _) = run_case(&[a, b], binop(Opcode::VectorMaxS32));
    assert_eq!(out, zip_lanes32(a, b, |x, y| (x as i32).max(y as i32) as u32));
    let (out, _) = run_case(&[a, b], binop(Opcode::VectorMinS32));
    assert_eq!(out, zip_lanes32(a, b, |x, y| (x as i32).min(y as i32) as u32));
    let (out, _) = run_case(&[a, b], binop(Opcode::VectorMaxU32));
    assert_eq!(out, zip_lanes32(a, b, |x, y| x.max(y)));
    let (out, _) = run_case(&[a, b], binop(Opcode::VectorMinU32));
    assert_eq!(out, zip_lanes32(a, b, |x, y| x.min(y)));

    let (out, _) = run_case(&[a, b], binop(Opcode::VectorMaxS64));
    assert_eq!(out, zip_lanes64(a, b, |x, y| (x as i64).max(y as i64) as u64));
    let (out, _) = run_case(&[a, b], binop(Opcode::VectorMinS64));
    assert_eq!(out, zip_lanes64(a, b, |x, y| (x as i64).min(y as i64) as u64));
    let (out, _) = run_case(&[a, b], binop(Opcode::VectorMaxU64));
    assert_eq!(out, zip_lanes64(a, b, |x, y| x.max(y)));
    let (out, _) = run_case(&[a, b], binop(Opcode::VectorMinU64));
    assert_eq!(out, zip_lanes64(a, b, |x, y| x.min(y)));
}

#[test]
fn halving_ops_match_reference() {
    let a = PATTERNS[4];
    let b = PATTERNS[5];

    let (out, _) = run_case(&[a, b], binop(Opcode::VectorHalvingAddU8));
    assert_eq!(out, zip_lanes8(a, b, |x, y| ((x as u16 + y as u16) >> 1) as u8));

    let (out, _) = run_case(&[a, b], binop(Opcode::VectorHalvingAddS8));
    assert_eq!(
        out,
        zip_lanes8(a, b, |x, y| (((x as i8 as i16) + (y as i8 as i16)) >> 1) as u8)
    );

    let (out, _) = run_case(&[a, b], binop(Opcode::VectorHalvingAddU16));
    assert_eq!(out, zip_lanes16(a, b, |x, y| ((x as u32 + y as u32) >> 1) as u16));

    let (out, _) = run_case(&[a, b], binop(Opcode::VectorHalvingAddS16));
    assert_eq!(
        out,
        zip_lanes16(a, b, |x, y| (((x as i16 as i32) + (y as i16 as i32)) >> 1) as u16)
    );

    let (out, _) = run_case(&[a, b], binop(Opcode::VectorHalvingAddU32));
    assert_eq!(out, zip_lanes32(a, b, |x, y| ((x as u64 + y as u64) >> 1) as u32));

    let (out, _) = run_case(&[a, b], binop(Opcode::VectorHalvingAddS32));
    assert_eq!(
        out,
        zip_lanes32(a, b, |x, y| (((x as i32 as i64) + (y as i32 as i64)) >> 1) as u32)
    );

    let (out, _) = run_case(&[a, b], binop(Opcode::VectorHalvingSubU8));
    assert_eq!(
        out,
        zip_lanes8(a, b, |x, y| (((x as i16) - (y as i16)) >> 1) as u8)
    );

    let (out, _) = run_case(&[a, b], binop(Opcode::VectorHalvingSubS8));
    assert_eq!(
        out,
        zip_lanes8(a, b, |x, y| (((x as i8 as i16) - (y as i8 as i16)) >> 1) as u8)
    );

    let (out, _) = run_case(&[a, b], binop(Opcode::VectorHalvingSubU32));
    assert_eq!(
        out,
        zip_lanes32(a, b, |x, y| (((x as i64) - (y as i64)) >> 1) as u32)
    );

    let (out, _) = run_case(&[a, b], binop(Opcode::VectorHalvingSubS32));
    assert_eq!(
        out,
        zip_lanes32(a, b, |x, y| (((x as i32 as i64) - (y as i32 as i64)) >> 1) as u32)
    );

    let (out, _) = run_case(&[a, b], binop(Opcode::VectorRoundingHalvingAddU8));
    assert_eq!(
        out,
        zip_lanes8(a, b, |x, y| ((x as u16 + y as u16 + 1) >> 1) as u8)
    );

    let (out, _) = run_case(&[a, b], binop(Opcode::VectorRoundingHalvingAddS8));
    assert_eq!(
        out,
        zip_lanes8(a, b, |x, y| (((x as i8 as i16) + (y as i8 as i16) + 1) >> 1) as u8)
    );

    let (out, _) = run_case(&[a, b], binop(Opcode::VectorRoundingHalvingAddS32));
    assert_eq!(
        out,
        zip_lanes32(a, b, |x, y| (((x as i32 as i64) + (y as i32 as i64) + 1) >> 1) as u32)
    );

    let (out, _) = run_case(&[a, b], binop(Opcode::VectorRoundingHalvingAddU32));
    assert_eq!(
        out,
        zip_lanes32(a, b, |x, y| ((x as u64 + y as u64 + 1) >> 1) as u32)
    );
}

#[test]
fn abs_all_widths() {
    let a = PATTERNS[5];

    let (out, _) = run_case(&[a], unop(Opcode::VectorAbs8));
    assert_eq!(out, map_lanes8(a, |x| (x as i8).wrapping_abs() as u8));

    let (out, _) = run_case(&[a], unop(Opcode::VectorAbs16));
    assert_eq!(out, zip_lanes16(a, a, |x, _| (x as i16).wrapping_abs() as u16));

    let (out, _) = run_case(&[a], unop(Opcode::VectorAbs32));
    assert_eq!(out, zip_lanes32(a, a, |x, _| (x as i32).wrapping_abs() as u32));

    let (out, _) = run_case(&[a], unop(Opcode::VectorAbs64));
    assert_eq!(out, zip_lanes64(a, a, |x, _| (x as i64).wrapping_abs() as u64));
}

#[test]
fn saturated_abs_sets_qc_only_on_int_min() {
    // No INT_MIN lane: no QC.
    let benign = v128(0x0001000200030004, 0x7FFF000500060007);
    let (out, qc) = run_case(&[benign], unop(Opcode::VectorSignedSaturatedAbs16));
    assert_eq!(out, benign);
    assert_eq!(qc, 0);

    // One INT_MIN lane per width: QC set, lane clamps to INT_MAX.
    let (out, qc) = run_case(&[[0x80; 16]], unop(Opcode::VectorSignedSaturatedAbs8));
    assert_eq!(out, [0x7F; 16]);
    assert_eq!(qc, 1);

    let a = v128(0x0000000080000000, 0x0000000000000005);
    let (out, qc) = run_case(&[a], unop(Opcode::VectorSignedSaturatedAbs32));
    assert_eq!(out, v128(0x000000007FFFFFFF, 0x0000000000000005));
    assert_eq!(qc, 1);

    let a = v128(0x8000000000000000, 42);
    let (out, qc) = run_case(&[a], unop(Opcode::VectorSignedSaturatedAbs64));
    assert_eq!(out, v128(0x7FFFFFFFFFFFFFFF, 42));
    assert_eq!(qc, 1);
}

#[test]
fn shifts_by_immediate_match_reference() {
    let a = PATTERNS[4];

    for shift in [0u8, 1, 3, 7] {
        let (out, _) = run_case(&[a], imm_op(Opcode::VectorLogicalShiftLeft8, shift));
        assert_eq!(out, map_lanes8(a, |x| x.wrapping_shl(shift as u32)));

        let (out, _) = run_case(&[a], imm_op(Opcode::VectorLogicalShiftRight8, shift));
        assert_eq!(out, map_lanes8(a, |x| x >> shift));

        let (out, _) = run_case(&[a], imm_op(Opcode::VectorArithmeticShiftRight8, shift));
        assert_eq!(out, map_lanes8(a, |x| ((x as i8) >> shift) as u8));
    }

    for shift in [0u8, 5, 15] {
        let (out, _) = run_case(&[a], imm_op(Opcode::VectorLogicalShiftLeft16, shift));
        assert_eq!(out, zip_lanes16(a, a, |x, _| x << shift));

        let (out, _) = run_case(&[a], imm_op(Opcode::VectorArithmeticShiftRight16, shift));
        assert_eq!(out, zip_lanes16(a, a, |x, _| ((x as i16) >> shift) as u16));
    }

    for shift in [0u8, 9, 31] {
        let (out, _) = run_case(&[a], imm_op(Opcode::VectorLogicalShiftRight32, shift));
        assert_eq!(out, zip_lanes32(a, a, |x, _| x >> shift));

        let (out, _) = run_case(&[a], imm_op(Opcode::VectorArithmeticShiftRight32, shift));
        assert_eq!(out, zip_lanes32(a, a, |x, _| ((x as i32) >> shift) as u32));
    }

    for shift in [0u8, 17, 63] {
        let (out, _) = run_case(&[a], imm_op(Opcode::VectorLogicalShiftLeft64, shift));
        assert_eq!(out, zip_lanes64(a, a, |x, _| x << shift));

        let (out, _) = run_case(&[a], imm_op(Opcode::VectorArithmeticShiftRight64, shift));
        assert_eq!(out, zip_lanes64(a, a, |x, _| ((x as i64) >> shift) as u64));
    }
}

#[test]
fn dynamic_shifts_match_reference() {
    let a = PATTERNS[4];
    // Per-lane shift amounts, including boundary and negative cases.
    let shifts: [u8; 16] = [
        0, 1, 7, 8, 9, 0xFF, 0xF9, 0xF8, 0xF7, 0x80, 2, 3, 0xFE, 4, 0xFD, 5,
    ];

    let (out, _) = run_case(&[a, shifts], binop(Opcode::VectorLogicalVShiftU8));
    let expected = zip_lanes8(a, shifts, |x, s| {
        let s = s as i8 as i64;
        if s >= 8 || s <= -8 {
            0
        } else if s < 0 {
            x >> (-s)
        } else {
            x << s
        }
    });
    assert_eq!(out, expected);

    let (out, _) = run_case(&[a, shifts], binop(Opcode::VectorLogicalVShiftS8));
    let expected = zip_lanes8(a, shifts, |x, s| {
        let x = x as i8;
        let s = s as i8 as i64;
        if s >= 8 {
            0
        } else if s <= -8 {
            (x >> 7) as u8
        } else if s < 0 {
            (x >> (-s)) as u8
        } else {
            ((x as u8) << s) as u8
        }
    });
    assert_eq!(out, expected);

    let (out, _) = run_case(&[a, shifts], binop(Opcode::VectorRoundingShiftLeftU8));
    let expected = zip_lanes8(a, shifts, |x, s| {
        let s = s as i8 as i64;
        if s >= 0 {
            if s >= 8 {
                0
            } else {
                x << s
            }
        } else if s < -8 {
            0
        } else {
            let rounding = (x >> (-s - 1)) & 1;
            if s == -8 {
                rounding
            } else {
                (x >> -s).wrapping_add(rounding)
            }
        }
    });
    assert_eq!(out, expected);
}

#[test]
fn narrow_and_extend_match_reference() {
    let a = PATTERNS[4];

    let (out, _) = run_case(&[a], unop(Opcode::VectorNarrow16));
    let mut expected = [0u8; 16];
    for i in 0..8 {
        expected[i] = a[i * 2];
    }
    assert_eq!(out, expected);

    let (out, _) = run_case(&[a], unop(Opcode::VectorNarrow32));
    let mut expected = [0u8; 16];
    for i in 0..4 {
        expected[i * 2..i * 2 + 2].copy_from_slice(&a[i * 4..i * 4 + 2]);
    }
    assert_eq!(out, expected);

    let (out, _) = run_case(&[a], unop(Opcode::VectorNarrow64));
    let mut expected = [0u8; 16];
    expected[..4].copy_from_slice(&a[..4]);
    expected[4..8].copy_from_slice(&a[8..12]);
    assert_eq!(out, expected);

    let (out, _) = run_case(&[a], unop(Opcode::VectorZeroExtend8));
    let mut expected = [0u8; 16];
    for i in 0..8 {
        expected[i * 2] = a[i];
    }
    assert_eq!(out, expected);

    let (out, _) = run_case(&[a], unop(Opcode::VectorSignExtend8));
    let mut expected = [0u8; 16];
    for i in 0..8 {
        let wide = (a[i] as i8 as i16) as u16;
        expected[i * 2..i * 2 + 2].copy_from_slice(&wide.to_le_bytes());
    }
    assert_eq!(out, expected);

    let (out, _) = run_case(&[a], unop(Opcode::VectorSignExtend32));
    let [lo, _] = lanes64(a);
    let x0 = (lo as u32) as i32 as i64 as u64;
    let x1 = ((lo >> 32) as u32) as i32 as i64 as u64;
    assert_eq!(out, v128(x0, x1));

    let (out, _) = run_case(&[a], unop(Opcode::VectorSignExtend64));
    let [lo, _] = lanes64(a);
    assert_eq!(out, v128(lo, ((lo as i64) >> 63) as u64));

    let (out, _) = run_case(&[a], unop(Opcode::VectorZeroExtend64));
    let [lo, _] = lanes64(a);
    assert_eq!(out, v128(lo, 0));
}

#[test]
fn saturated_narrows_match_reference() {
    // 16 → 8 signed: values straddling both clamps.
    let lanes: [i16; 8] = [-300, -128, -1, 0, 1, 127, 128, 300];
    let mut a = [0u8; 16];
    for (i, lane) in lanes.iter().enumerate() {
        a[i * 2..i * 2 + 2].copy_from_slice(&lane.to_le_bytes());
    }
    let (out, qc) = run_case(&[a], unop(Opcode::VectorSignedSaturatedNarrowToSigned16));
    let expected_lanes: [i8; 8] = [-128, -128, -1, 0, 1, 127, 127, 127];
    assert_eq!(
        &out[..8],
        &expected_lanes.map(|x| x as u8),
        "low half holds the packed lanes"
    );
    assert_eq!(qc, 1);

    // All in range: no QC.
    let lanes: [i16; 8] = [-128, -5, -1, 0, 1, 5, 100, 127];
    let mut a = [0u8; 16];
    for (i, lane) in lanes.iter().enumerate() {
        a[i * 2..i * 2 + 2].copy_from_slice(&lane.to_le_bytes());
    }
    let (out, qc) = run_case(&[a], unop(Opcode::VectorSignedSaturatedNarrowToSigned16));
    assert_eq!(&out[..8], &lanes.map(|x| x as i8 as u8));
    assert_eq!(qc, 0);

    // Signed → unsigned.
    let lanes: [i16; 8] = [-1, 0, 255, 256, 300, 17, -300, 90];
    let mut a = [0u8; 16];
    for (i, lane) in lanes.iter().enumerate() {
        a[i * 2..i * 2 + 2].copy_from_slice(&lane.to_le_bytes());
    }
    let (out, qc) = run_case(&[a], unop(Opcode::VectorSignedSaturatedNarrowToUnsigned16));
    assert_eq!(&out[..8], &[0, 0, 255, 255, 255, 17, 0, 90]);
    assert_eq!(qc, 1);

    // 32 → 16 unsigned-source.
    let lanes: [u32; 4] = [0x1_0000, 0xFFFF, 3, 0xFFFF_FFFF];
    let mut a = [0u8; 16];
    for (i, lane) in lanes.iter().enumerate() {
        a[i * 4..i * 4 + 4].copy_from_slice(&lane.to_le_bytes());
    }
    let (out, qc) = run_case(&[a], unop(Opcode::VectorUnsignedSaturatedNarrow32));
    let expected: [u16; 4] = [0xFFFF, 0xFFFF, 3, 0xFFFF];
    for i in 0..4 {
        assert_eq!(
            u16::from_le_bytes(out[i * 2..i * 2 + 2].try_into().unwrap()),
            expected[i]
        );
    }
    assert_eq!(qc, 1);

    // 64 → 32 signed → signed.
    let a = v128((-3i64) as u64, 0x1_0000_0000);
    let (out, qc) = run_case(&[a], unop(Opcode::VectorSignedSaturatedNarrowToSigned64));
    let expected_lo = ((-3i32 as u32) as u64) | ((i32::MAX as u32 as u64) << 32);
    assert_eq!(out, v128(expected_lo, 0));
    assert_eq!(qc, 1);
}

#[test]
fn paired_adds_match_reference() {
    let a = PATTERNS[4];
    let b = PATTERNS[5];

    let (out, _) = run_case(&[a, b], binop(Opcode::VectorPairedAdd8));
    let mut expected = [0u8; 16];
    for i in 0..8 {
        expected[i] = a[2 * i].wrapping_add(a[2 * i + 1]);
        expected[8 + i] = b[2 * i].wrapping_add(b[2 * i + 1]);
    }
    assert_eq!(out, expected);

    let (out, _) = run_case(&[a, b], binop(Opcode::VectorPairedAdd16));
    let mut expected = [0u8; 16];
    for i in 0..4 {
        let x = u16::from_le_bytes(a[4 * i..4 * i + 2].try_into().unwrap())
            .wrapping_add(u16::from_le_bytes(a[4 * i + 2..4 * i + 4].try_into().unwrap()));
        let y = u16::from_le_bytes(b[4 * i..4 * i + 2].try_into().unwrap())
            .wrapping_add(u16::from_le_bytes(b[4 * i + 2..4 * i + 4].try_into().unwrap()));
        expected[2 * i..2 * i + 2].copy_from_slice(&x.to_le_bytes());
        expected[8 + 2 * i..8 + 2 * i + 2].copy_from_slice(&y.to_le_bytes());
    }
    assert_eq!(out, expected);

    let (out, _) = run_case(&[a, b], binop(Opcode::VectorPairedAdd32));
    let mut expected = [0u8; 16];
    for i in 0..2 {
        let x = u32::from_le_bytes(a[8 * i..8 * i + 4].try_into().unwrap())
            .wrapping_add(u32::from_le_bytes(a[8 * i + 4..8 * i + 8].try_into().unwrap()));
        let y = u32::from_le_bytes(b[8 * i..8 * i + 4].try_into().unwrap())
            .wrapping_add(u32::from_le_bytes(b[8 * i + 4..8 * i + 8].try_into().unwrap()));
        expected[4 * i..4 * i + 4].copy_from_slice(&x.to_le_bytes());
        expected[8 + 4 * i..8 + 4 * i + 4].copy_from_slice(&y.to_le_bytes());
    }
    assert_eq!(out, expected);

    let (out, _) = run_case(&[a, b], binop(Opcode::VectorPairedAdd64));
    let [a0, a1] = lanes64(a);
    let [b0, b1] = lanes64(b);
    assert_eq!(out, v128(a0.wrapping_add(a1), b0.wrapping_add(b1)));

    // Lower variant: upper half zero.
    let (out, _) = run_case(&[a, b], binop(Opcode::VectorPairedAddLower8));
    let mut expected = [0u8; 16];
    for i in 0..4 {
        expected[i] = a[2 * i].wrapping_add(a[2 * i + 1]);
        expected[4 + i] = b[2 * i].wrapping_add(b[2 * i + 1]);
    }
    assert_eq!(out, expected);

    // Widening variants.
    let (out, _) = run_case(&[a], unop(Opcode::VectorPairedAddSignedWiden8));
    let mut expected = [0u8; 16];
    for i in 0..8 {
        let sum = (a[2 * i] as i8 as i16) + (a[2 * i + 1] as i8 as i16);
        expected[2 * i..2 * i + 2].copy_from_slice(&(sum as u16).to_le_bytes());
    }
    assert_eq!(out, expected);

    let (out, _) = run_case(&[a], unop(Opcode::VectorPairedAddUnsignedWiden8));
    let mut expected = [0u8; 16];
    for i in 0..8 {
        let sum = (a[2 * i] as u16) + (a[2 * i + 1] as u16);
        expected[2 * i..2 * i + 2].copy_from_slice(&sum.to_le_bytes());
    }
    assert_eq!(out, expected);

    let (out, _) = run_case(&[a], unop(Opcode::VectorPairedAddSignedWiden32));
    let [lo, hi] = lanes64(a);
    let sum0 = ((lo as u32) as i32 as i64).wrapping_add(((lo >> 32) as u32) as i32 as i64);
    let sum1 = ((hi as u32) as i32 as i64).wrapping_add(((hi >> 32) as u32) as i32 as i64);
    assert_eq!(out, v128(sum0 as u64, sum1 as u64));

    let (out, _) = run_case(&[a], unop(Opcode::VectorPairedAddUnsignedWiden32));
    let sum0 = (lo as u32 as u64) + ((lo >> 32) as u32 as u64);
    let sum1 = (hi as u32 as u64) + ((hi >> 32) as u32 as u64);
    assert_eq!(out, v128(sum0, sum1));
}

#[test]
fn paired_minmax_match_reference() {
    let a = PATTERNS[4];
    let b = PATTERNS[5];

    let (out, _) = run_case(&[a, b], binop(Opcode::VectorPairedMaxU8));
    let mut expected = [0u8; 16];
    for i in 0..8 {
        expected[i] = a[2 * i].max(a[2 * i + 1]);
        expected[8 + i] = b[2 * i].max(b[2 * i + 1]);
    }
    assert_eq!(out, expected);

    let (out, _) = run_case(&[a, b], binop(Opcode::VectorPairedMinS8));
    let mut expected = [0u8; 16];
    for i in 0..8 {
        expected[i] = (a[2 * i] as i8).min(a[2 * i + 1] as i8) as u8;
        expected[8 + i] = (b[2 * i] as i8).min(b[2 * i + 1] as i8) as u8;
    }
    assert_eq!(out, expected);

    // 32-bit paired min/max exercise the shufps-interleave native path.
    for (op, signed, is_max) in [
        (Opcode::VectorPairedMaxS32, true, true),
        (Opcode::VectorPairedMaxU32, false, true),
        (Opcode::VectorPairedMinS32, true, false),
        (Opcode::VectorPairedMinU32, false, false),
    ] {
        let (out, _) = run_case(&[a, b], binop(op));
        let pick = |x: u32, y: u32| -> u32 {
            match (signed, is_max) {
                (true, true) => (x as i32).max(y as i32) as u32,
                (true, false) => (x as i32).min(y as i32) as u32,
                (false, true) => x.max(y),
                (false, false) => x.min(y),
            }
        };
        let lane32 = |v: &[u8; 16], i: usize| -> u32 {
            u32::from_le_bytes(v[4 * i..4 * i + 4].try_into().unwrap())
        };
        let mut expected = [0u8; 16];
        for i in 0..2 {
            let x = pick(lane32(&a, 2 * i), lane32(&a, 2 * i + 1));
            let y = pick(lane32(&b, 2 * i), lane32(&b, 2 * i + 1));
            expected[4 * i..4 * i + 4].copy_from_slice(&x.to_le_bytes());
            expected[8 + 4 * i..8 + 4 * i + 4].copy_from_slice(&y.to_le_bytes());
        }
        assert_eq!(out, expected, "paired 32-bit {:?}", op);
    }
}

#[test]
fn interleave_and_deinterleave_match_reference() {
    let a = PATTERNS[4];
    let b = PATTERNS[5];

    let (out, _) = run_case(&[a, b], binop(Opcode::VectorInterleaveLower8));
    let mut expected = [0u8; 16];
    for i in 0..8 {
        expected[2 * i] = a[i];
        expected[2 * i + 1] = b[i];
    }
    assert_eq!(out, expected);

    let (out, _) = run_case(&[a, b], binop(Opcode::VectorInterleaveUpper8));
    let mut expected = [0u8; 16];
    for i in 0..8 {
        expected[2 * i] = a[8 + i];
        expected[2 * i + 1] = b[8 + i];
    }
    assert_eq!(out, expected);

    let (out, _) = run_case(&[a, b], binop(Opcode::VectorDeinterleaveEven8));
    let mut expected = [0u8; 16];
    for i in 0..8 {
        expected[i] = a[2 * i];
        expected[8 + i] = b[2 * i];
    }
    assert_eq!(out, expected);

    let (out, _) = run_case(&[a, b], binop(Opcode::VectorDeinterleaveOdd8));
    let mut expected = [0u8; 16];
    for i in 0..8 {
        expected[i] = a[2 * i + 1];
        expected[8 + i] = b[2 * i + 1];
    }
    assert_eq!(out, expected);

    for (even_op, odd_op, step) in [
        (Opcode::VectorDeinterleaveEven16, Opcode::VectorDeinterleaveOdd16, 2usize),
        (Opcode::VectorDeinterleaveEven32, Opcode::VectorDeinterleaveOdd32, 4),
        (Opcode::VectorDeinterleaveEven64, Opcode::VectorDeinterleaveOdd64, 8),
    ] {
        let count = 16 / step / 2;
        let (out, _) = run_case(&[a, b], binop(even_op));
        let mut expected = [0u8; 16];
        for i in 0..count {
            expected[i * step..(i + 1) * step]
                .copy_from_slice(&a[2 * i * step..2 * i * step + step]);
            expected[8 + i * step..8 + (i + 1) * step]
                .copy_from_slice(&b[2 * i * step..2 * i * step + step]);
        }
        assert_eq!(out, expected, "even {:?}", even_op);

        let (out, _) = run_case(&[a, b], binop(odd_op));
        let mut expected = [0u8; 16];
        for i in 0..count {
            expected[i * step..(i + 1) * step]
                .copy_from_slice(&a[(2 * i + 1) * step..(2 * i + 1) * step + step]);
            expected[8 + i * step..8 + (i + 1) * step]
                .copy_from_slice(&b[(2 * i + 1) * step..(2 * i + 1) * step + step]);
        }
        assert_eq!(out, expected, "odd {:?}", odd_op);
    }
}

#[test]
fn broadcast_and_shuffle_match_reference() {
    let a = PATTERNS[4];

    let (out, _) = run_case(&[a], unop(Opcode::VectorBroadcast8));
    assert_eq!(out, [a[0]; 16]);

    let (out, _) = run_case(&[a], unop(Opcode::VectorBroadcast16));
    for i in 0..8 {
        assert_eq!(&out[2 * i..2 * i + 2], &a[..2]);
    }

    let (out, _) = run_case(&[a], unop(Opcode::VectorBroadcast32));
    for i in 0..4 {
        assert_eq!(&out[4 * i..4 * i + 4], &a[..4]);
    }

    let (out, _) = run_case(&[a], unop(Opcode::VectorBroadcast64));
    assert_eq!(&out[..8], &a[..8]);
    assert_eq!(&out[8..], &a[..8]);

    let (out, _) = run_case(&[a], unop(Opcode::VectorBroadcastLower16));
    for i in 0..4 {
        assert_eq!(&out[2 * i..2 * i + 2], &a[..2]);
    }
    assert_eq!(&out[8..], &[0; 8]);

    // pshufd reversal.
    let (out, _) = run_case(&[a], imm_op(Opcode::VectorShuffleWords, 0b00011011));
    let mut expected = [0u8; 16];
    for i in 0..4 {
        expected[4 * i..4 * i + 4].copy_from_slice(&a[4 * (3 - i)..4 * (3 - i) + 4]);
    }
    assert_eq!(out, expected);

    // pshuflw identity on the high half.
    let (out, _) = run_case(&[a], imm_op(Opcode::VectorShuffleLowHalfwords, 0b00011011));
    assert_eq!(&out[8..], &a[8..]);
}

#[test]
fn extract_matches_reference() {
    let a = PATTERNS[4];
    let b = PATTERNS[5];

    for position in [0u8, 8, 40, 64, 120] {
        let (out, _) = run_case(&[a, b], move |block| {
            let x = block.append(Opcode::GetVector, &[Value::ImmU8(0)]);
            let y = block.append(Opcode::GetVector, &[Value::ImmU8(1)]);
            let r = block.append(Opcode::VectorExtract, &[x, y, Value::ImmU8(position)]);
            block.append(Opcode::SetVector, &[Value::ImmU8(0), r]);
        });
        let mut concat = [0u8; 32];
        concat[..16].copy_from_slice(&a);
        concat[16..].copy_from_slice(&b);
        let start = position as usize / 8;
        assert_eq!(&out[..], &concat[start..start + 16], "position {}", position);
    }

    for position in [0u8, 16, 56] {
        let (out, _) = run_case(&[a, b], move |block| {
            let x = block.append(Opcode::GetVector, &[Value::ImmU8(0)]);
            let y = block.append(Opcode::GetVector, &[Value::ImmU8(1)]);
            let r = block.append(Opcode::VectorExtractLower, &[x, y, Value::ImmU8(position)]);
            block.append(Opcode::SetVector, &[Value::ImmU8(0), r]);
        });
        // Window over b_lo:a_lo, low 64 bits of the result only.
        let mut concat = [0u8; 16];
        concat[..8].copy_from_slice(&a[..8]);
        concat[8..].copy_from_slice(&b[..8]);
        let start = position as usize / 8;
        assert_eq!(&out[..8], &concat[start..start + 8], "position {}", position);
        assert_eq!(&out[8..], &[0; 8]);
    }
}

#[test]
fn popcount_and_reverse_bits_match_reference() {
    for &a in PATTERNS {
        let (out, _) = run_case(&[a], unop(Opcode::VectorPopulationCount));
        assert_eq!(out, map_lanes8(a, |x| x.count_ones() as u8));

        let (out, _) = run_case(&[a], unop(Opcode::VectorReverseBits));
        assert_eq!(out, map_lanes8(a, |x| x.reverse_bits()));
    }
}

#[test]
fn absolute_difference_matches_reference() {
    let a = PATTERNS[4];
    let b = PATTERNS[5];

    let (out, _) = run_case(&[a, b], binop(Opcode::VectorUnsignedAbsoluteDifference8));
    assert_eq!(out, zip_lanes8(a, b, |x, y| x.abs_diff(y)));

    let (out, _) = run_case(&[a, b], binop(Opcode::VectorUnsignedAbsoluteDifference16));
    assert_eq!(out, zip_lanes16(a, b, |x, y| x.abs_diff(y)));

    let (out, _) = run_case(&[a, b], binop(Opcode::VectorUnsignedAbsoluteDifference32));
    assert_eq!(out, zip_lanes32(a, b, |x, y| x.abs_diff(y)));

    let (out, _) = run_case(&[a, b], binop(Opcode::VectorSignedAbsoluteDifference8));
    assert_eq!(
        out,
        zip_lanes8(a, b, |x, y| ((x as i8 as i16) - (y as i8 as i16)).unsigned_abs() as u8)
    );

    let (out, _) = run_case(&[a, b], binop(Opcode::VectorSignedAbsoluteDifference32));
    assert_eq!(
        out,
        zip_lanes32(a, b, |x, y| ((x as i32 as i64) - (y as i32 as i64)).unsigned_abs() as u32)
    );
}

#[test]
fn element_access_round_trips() {
    let a = PATTERNS[4];

    // Read every byte lane through GetElement8 and rebuild via SetElement8.
    for index in [0u8, 1, 7, 15] {
        let (out, _) = run_case(&[a], move |block| {
            let v = block.append(Opcode::GetVector, &[Value::ImmU8(0)]);
            let e = block.append(Opcode::VectorGetElement8, &[v, Value::ImmU8(index)]);
            let z = block.append(Opcode::ZeroVector, &[]);
            let r = block.append(Opcode::VectorSetElement8, &[z, Value::ImmU8(0), e]);
            block.append(Opcode::SetVector, &[Value::ImmU8(0), r]);
        });
        assert_eq!(out[0], a[index as usize], "lane {}", index);
        assert_eq!(&out[1..], &[0; 15]);
    }

    for index in [0u8, 3, 7] {
        let (out, _) = run_case(&[a], move |block| {
            let v = block.append(Opcode::GetVector, &[Value::ImmU8(0)]);
            let e = block.append(Opcode::VectorGetElement16, &[v, Value::ImmU8(index)]);
            let z = block.append(Opcode::ZeroVector, &[]);
            let r = block.append(Opcode::VectorSetElement16, &[z, Value::ImmU8(2), e]);
            block.append(Opcode::SetVector, &[Value::ImmU8(0), r]);
        });
        let i = index as usize;
        assert_eq!(&out[4..6], &a[2 * i..2 * i + 2]);
    }

    for index in [0u8, 1, 3] {
        let (out, _) = run_case(&[a], move |block| {
            let v = block.append(Opcode::GetVector, &[Value::ImmU8(0)]);
            let e = block.append(Opcode::VectorGetElement32, &[v, Value::ImmU8(index)]);
            let z = block.append(Opcode::ZeroVector, &[]);
            let r = block.append(Opcode::VectorSetElement32, &[z, Value::ImmU8(1), e]);
            block.append(Opcode::SetVector, &[Value::ImmU8(0), r]);
        });
        let i = index as usize;
        assert_eq!(&out[4..8], &a[4 * i..4 * i + 4]);
    }

    for index in [0u8, 1] {
        let (out, _) = run_case(&[a], move |block| {
            let v = block.append(Opcode::GetVector, &[Value::ImmU8(0)]);
            let e = block.append(Opcode::VectorGetElement64, &[v, Value::ImmU8(index)]);
            let z = block.append(Opcode::ZeroVector, &[]);
            let r = block.append(Opcode::VectorSetElement64, &[z, Value::ImmU8(1), e]);
            block.append(Opcode::SetVector, &[Value::ImmU8(0), r]);
        });
        let i = index as usize;
        assert_eq!(&out[8..], &a[8 * i..8 * i + 8]);
        assert_eq!(&out[..8], &[0; 8]);
    }
}

#[test]
fn table_lookup_all_shapes() {
    let tables: [[u8; 16]; 4] = [
        core::array::from_fn(|i| i as u8),
        core::array::from_fn(|i| 0x10 + i as u8),
        core::array::from_fn(|i| 0x20 + i as u8),
        core::array::from_fn(|i| 0x30 + i as u8),
    ];
    let defaults: [u8; 16] = [0xEE; 16];
    let indices: [u8; 16] = [
        0x00, 0x0F, 0x10, 0x1F, 0x20, 0x2F, 0x30, 0x3F, 0x40, 0x7F, 0x80, 0xFF, 0x05, 0x15, 0x25,
        0x35,
    ];

    for table_size in 1usize..=4 {
        for defaults_zero in [true, false] {
            let (out, _) = run_case(
                &[tables[0], tables[1], tables[2], tables[3], defaults, indices],
                move |block| {
                    let mut table_args = Vec::new();
                    for i in 0..table_size {
                        table_args.push(block.append(Opcode::GetVector, &[Value::ImmU8(i as u8)]));
                    }
                    let def = if defaults_zero {
                        block.append(Opcode::ZeroVector, &[])
                    } else {
                        block.append(Opcode::GetVector, &[Value::ImmU8(4)])
                    };
                    let idx = block.append(Opcode::GetVector, &[Value::ImmU8(5)]);
                    let table = block.append(Opcode::VectorTable, &table_args);
                    let r = block.append(Opcode::VectorTableLookup, &[def, table, idx]);
                    block.append(Opcode::SetVector, &[Value::ImmU8(0), r]);
                },
            );

            let expected: [u8; 16] = core::array::from_fn(|i| {
                let sel = indices[i] as usize;
                if sel / 16 < table_size {
                    tables[sel / 16][sel % 16]
                } else if defaults_zero {
                    0
                } else {
                    defaults[i]
                }
            });
            assert_eq!(
                out, expected,
                "table lookup size {} defaults_zero {}",
                table_size, defaults_zero
            );
        }
    }
}

#[test]
fn polynomial_multiply_matches_reference() {
    let a = PATTERNS[4];
    let b = PATTERNS[5];

    fn pmull8(x: u8, y: u8) -> u8 {
        let mut r = 0u8;
        for i in 0..8 {
            if (x >> i) & 1 != 0 {
                r ^= y.wrapping_shl(i);
            }
        }
        r
    }

    let (out, _) = run_case(&[a, b], binop(Opcode::VectorPolynomialMultiply8));
    assert_eq!(out, zip_lanes8(a, b, pmull8));

    let (out, _) = run_case(&[a, b], binop(Opcode::VectorPolynomialMultiplyLong64));
    let [x, _] = lanes64(a);
    let [y, _] = lanes64(b);
    let mut lo = 0u64;
    let mut hi = 0u64;
    for i in 0..64 {
        if (x >> i) & 1 != 0 {
            lo ^= y.wrapping_shl(i);
            if i > 0 {
                hi ^= y >> (64 - i);
            }
        }
    }
    assert_eq!(out, v128(lo, hi));
}

#[test]
fn qc_flag_accumulates_across_block() {
    // Two saturating ops in one block: the second must not clear the flag
    // set by the first.
    let a = [0x80; 16]; // all INT_MIN bytes
    let benign = v128(0x0102030405060708, 0x0102030405060708);
    let (_, qc) = run_case(&[a, benign], |block| {
        let x = block.append(Opcode::GetVector, &[Value::ImmU8(0)]);
        let y = block.append(Opcode::GetVector, &[Value::ImmU8(1)]);
        let sat = block.append(Opcode::VectorSignedSaturatedAbs8, &[x]);
        // A non-saturating op afterwards: flag must survive.
        let benign_result = block.append(Opcode::VectorSignedSaturatedAbs8, &[y]);
        let merged = block.append(Opcode::VectorOr, &[sat, benign_result]);
        block.append(Opcode::SetVector, &[Value::ImmU8(0), merged]);
    });
    assert_eq!(qc, 1);
}

#[test]
fn constant_pool_deduplicates_within_block() {
    // Two ops that intern the same 0x80... mask must share a pool slot.
    let mut boc = BlockOfCode::with_size(1 << 20).unwrap();
    let labels = boc.gen_prelude().unwrap();

    let mut block = Block::new();
    let a = block.append(Opcode::GetVector, &[Value::ImmU8(0)]);
    let b = block.append(Opcode::GetVector, &[Value::ImmU8(1)]);
    let h1 = block.append(Opcode::VectorHalvingSubS8, &[a, b]);
    let h2 = block.append(Opcode::VectorHalvingSubS8, &[b, a]);
    let merged = block.append(Opcode::VectorEor, &[h1, h2]);
    block.append(Opcode::SetVector, &[Value::ImmU8(0), merged]);

    let ctx = EmitContext::new(HostFeature::empty(), Some(labels.exit_offset));
    let mut ra = RegAlloc::new_default(&mut boc.asm, block.inst_info());
    emit_block(&ctx, &mut ra, &block);

    // Both halving-subs use the same bias constant.
    assert_eq!(boc.asm.const_count(), 1);
}

#[test]
fn greater_s_all_widths() {
    let a = PATTERNS[4];
    let b = PATTERNS[5];

    let (out, _) = run_case(&[a, b], binop(Opcode::VectorGreaterS8));
    assert_eq!(
        out,
        zip_lanes8(a, b, |x, y| if (x as i8) > (y as i8) { 0xFF } else { 0 })
    );

    let (out, _) = run_case(&[a, b], binop(Opcode::VectorGreaterS16));
    assert_eq!(
        out,
        zip_lanes16(a, b, |x, y| if (x as i16) > (y as i16) { 0xFFFF } else { 0 })
    );

    let (out, _) = run_case(&[a, b], binop(Opcode::VectorGreaterS32));
    assert_eq!(
        out,
        zip_lanes32(a, b, |x, y| if (x as i32) > (y as i32) { !0 } else { 0 })
    );

    let (out, _) = run_case(&[a, b], binop(Opcode::VectorGreaterS64));
    assert_eq!(
        out,
        zip_lanes64(a, b, |x, y| if (x as i64) > (y as i64) { !0 } else { 0 })
    );
}

#[test]
fn equal_including_128() {
    let a = PATTERNS[4];
    let mut b = a;
    b[3] ^= 0x40;

    let (out, _) = run_case(&[a, b], binop(Opcode::VectorEqual8));
    assert_eq!(out, zip_lanes8(a, b, |x, y| if x == y { 0xFF } else { 0 }));

    let (out, _) = run_case(&[a, b], binop(Opcode::VectorEqual64));
    assert_eq!(
        out,
        zip_lanes64(a, b, |x, y| if x == y { !0 } else { 0 })
    );

    // 128-bit: any differing byte collapses the whole mask.
    let (out, _) = run_case(&[a, b], binop(Opcode::VectorEqual128));
    assert_eq!(out, [0; 16]);
    let (out, _) = run_case(&[a, a], binop(Opcode::VectorEqual128));
    assert_eq!(out, [0xFF; 16]);
}
