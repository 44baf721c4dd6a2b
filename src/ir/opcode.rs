use std::fmt;

use crate::ir::types::Type;

/// IR opcodes for the 128-bit vector subset.
///
/// Lane width is part of the opcode, not the value: `VectorAdd8` and
/// `VectorAdd32` are distinct tags over the same 128-bit bit pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Opcode {
    // --- Core ---
    Void,
    Identity,

    // --- Guest vector file access ---
    GetVector,
    SetVector,

    // --- Element access ---
    VectorGetElement8,
    VectorGetElement16,
    VectorGetElement32,
    VectorGetElement64,
    VectorSetElement8,
    VectorSetElement16,
    VectorSetElement32,
    VectorSetElement64,

    // --- Bitwise ---
    VectorAnd,
    VectorAndNot,
    VectorOr,
    VectorEor,
    VectorNot,

    // --- Arithmetic ---
    VectorAdd8,
    VectorAdd16,
    VectorAdd32,
    VectorAdd64,
    VectorSub8,
    VectorSub16,
    VectorSub32,
    VectorSub64,

    // --- Compare ---
    VectorEqual8,
    VectorEqual16,
    VectorEqual32,
    VectorEqual64,
    VectorEqual128,
    VectorGreaterS8,
    VectorGreaterS16,
    VectorGreaterS32,
    VectorGreaterS64,

    // --- Shifts by immediate ---
    VectorLogicalShiftLeft8,
    VectorLogicalShiftLeft16,
    VectorLogicalShiftLeft32,
    VectorLogicalShiftLeft64,
    VectorLogicalShiftRight8,
    VectorLogicalShiftRight16,
    VectorLogicalShiftRight32,
    VectorLogicalShiftRight64,
    VectorArithmeticShiftRight8,
    VectorArithmeticShiftRight16,
    VectorArithmeticShiftRight32,
    VectorArithmeticShiftRight64,

    // --- Per-lane dynamic shifts ---
    VectorLogicalVShiftS8,
    VectorLogicalVShiftS16,
    VectorLogicalVShiftS32,
    VectorLogicalVShiftS64,
    VectorLogicalVShiftU8,
    VectorLogicalVShiftU16,
    VectorLogicalVShiftU32,
    VectorLogicalVShiftU64,

    // --- Rounding shift left ---
    VectorRoundingShiftLeftS8,
    VectorRoundingShiftLeftS16,
    VectorRoundingShiftLeftS32,
    VectorRoundingShiftLeftS64,
    VectorRoundingShiftLeftU8,
    VectorRoundingShiftLeftU16,
    VectorRoundingShiftLeftU32,
    VectorRoundingShiftLeftU64,

    // --- Halving add/sub ---
    VectorHalvingAddS8,
    VectorHalvingAddS16,
    VectorHalvingAddS32,
    VectorHalvingAddU8,
    VectorHalvingAddU16,
    VectorHalvingAddU32,
    VectorHalvingSubS8,
    VectorHalvingSubS16,
    VectorHalvingSubS32,
    VectorHalvingSubU8,
    VectorHalvingSubU16,
    VectorHalvingSubU32,
    VectorRoundingHalvingAddS8,
    VectorRoundingHalvingAddS16,
    VectorRoundingHalvingAddS32,
    VectorRoundingHalvingAddU8,
    VectorRoundingHalvingAddU16,
    VectorRoundingHalvingAddU32,

    // --- Absolute value ---
    VectorAbs8,
    VectorAbs16,
    VectorAbs32,
    VectorAbs64,

    // --- Min/max ---
    VectorMaxS8,
    VectorMaxS16,
    VectorMaxS32,
    VectorMaxS64,
    VectorMaxU8,
    VectorMaxU16,
    VectorMaxU32,
    VectorMaxU64,
    VectorMinS8,
    VectorMinS16,
    VectorMinS32,
    VectorMinS64,
    VectorMinU8,
    VectorMinU16,
    VectorMinU32,
    VectorMinU64,

    // --- Multiply ---
    VectorMultiply8,
    VectorMultiply16,
    VectorMultiply32,
    VectorMultiply64,
    VectorPolynomialMultiply8,
    VectorPolynomialMultiplyLong8,
    VectorPolynomialMultiplyLong64,

    // --- Narrow / widen ---
    VectorNarrow16,
    VectorNarrow32,
    VectorNarrow64,
    VectorSignExtend8,
    VectorSignExtend16,
    VectorSignExtend32,
    VectorSignExtend64,
    VectorZeroExtend8,
    VectorZeroExtend16,
    VectorZeroExtend32,
    VectorZeroExtend64,

    // --- Saturated (fpsr_qc writers) ---
    VectorSignedSaturatedAbs8,
    VectorSignedSaturatedAbs16,
    VectorSignedSaturatedAbs32,
    VectorSignedSaturatedAbs64,
    VectorSignedSaturatedNeg8,
    VectorSignedSaturatedNeg16,
    VectorSignedSaturatedNeg32,
    VectorSignedSaturatedNeg64,
    VectorSignedSaturatedDoublingMultiplyReturnHigh16,
    VectorSignedSaturatedDoublingMultiplyReturnHigh32,
    VectorSignedSaturatedNarrowToSigned16,
    VectorSignedSaturatedNarrowToSigned32,
    VectorSignedSaturatedNarrowToSigned64,
    VectorSignedSaturatedNarrowToUnsigned16,
    VectorSignedSaturatedNarrowToUnsigned32,
    VectorSignedSaturatedNarrowToUnsigned64,
    VectorUnsignedSaturatedNarrow16,
    VectorUnsignedSaturatedNarrow32,
    VectorUnsignedSaturatedNarrow64,

    // --- Paired (horizontal) ---
    VectorPairedAdd8,
    VectorPairedAdd16,
    VectorPairedAdd32,
    VectorPairedAdd64,
    VectorPairedAddLower8,
    VectorPairedAddLower16,
    VectorPairedAddLower32,
    VectorPairedAddSignedWiden8,
    VectorPairedAddSignedWiden16,
    VectorPairedAddSignedWiden32,
    VectorPairedAddUnsignedWiden8,
    VectorPairedAddUnsignedWiden16,
    VectorPairedAddUnsignedWiden32,
    VectorPairedMaxS8,
    VectorPairedMaxS16,
    VectorPairedMaxS32,
    VectorPairedMaxU8,
    VectorPairedMaxU16,
    VectorPairedMaxU32,
    VectorPairedMinS8,
    VectorPairedMinS16,
    VectorPairedMinS32,
    VectorPairedMinU8,
    VectorPairedMinU16,
    VectorPairedMinU32,

    // --- Deinterleave / interleave ---
    VectorDeinterleaveEven8,
    VectorDeinterleaveEven16,
    VectorDeinterleaveEven32,
    VectorDeinterleaveEven64,
    VectorDeinterleaveOdd8,
    VectorDeinterleaveOdd16,
    VectorDeinterleaveOdd32,
    VectorDeinterleaveOdd64,
    VectorInterleaveLower8,
    VectorInterleaveLower16,
    VectorInterleaveLower32,
    VectorInterleaveLower64,
    VectorInterleaveUpper8,
    VectorInterleaveUpper16,
    VectorInterleaveUpper32,
    VectorInterleaveUpper64,

    // --- Broadcast / shuffle / extract ---
    VectorBroadcast8,
    VectorBroadcast16,
    VectorBroadcast32,
    VectorBroadcast64,
    VectorBroadcastLower8,
    VectorBroadcastLower16,
    VectorBroadcastLower32,
    VectorShuffleHighHalfwords,
    VectorShuffleLowHalfwords,
    VectorShuffleWords,
    VectorExtract,
    VectorExtractLower,

    // --- Bit manipulation ---
    VectorPopulationCount,
    VectorReverseBits,

    // --- Absolute difference ---
    VectorSignedAbsoluteDifference8,
    VectorSignedAbsoluteDifference16,
    VectorSignedAbsoluteDifference32,
    VectorUnsignedAbsoluteDifference8,
    VectorUnsignedAbsoluteDifference16,
    VectorUnsignedAbsoluteDifference32,

    // --- Table lookup ---
    VectorTable,
    VectorTableLookup,

    // --- Misc ---
    ZeroVector,
    VectorZeroUpper,
}

/// Opcode metadata: return type and argument types.
struct OpcodeInfo {
    ret: Type,
    args: &'static [Type],
}

impl Opcode {
    pub fn return_type(self) -> Type {
        self.info().ret
    }

    pub fn arg_types(self) -> &'static [Type] {
        self.info().args
    }

    pub fn num_args(self) -> usize {
        self.info().args.len()
    }

    /// Opcodes that mutate guest state even when their result is unused.
    pub fn has_side_effects(self) -> bool {
        matches!(self, Opcode::SetVector)
    }

    fn info(self) -> OpcodeInfo {
        use Opcode::*;
        const V: Type = Type::Void;
        const U8: Type = Type::U8;
        const U16: Type = Type::U16;
        const U32: Type = Type::U32;
        const U64: Type = Type::U64;
        const U128: Type = Type::U128;
        const OPQ: Type = Type::Opaque;
        match self {
            Void => OpcodeInfo { ret: V, args: &[] },
            Identity => OpcodeInfo { ret: OPQ, args: &[OPQ] },

            GetVector => OpcodeInfo { ret: U128, args: &[U8] },
            SetVector => OpcodeInfo { ret: V, args: &[U8, U128] },

            VectorGetElement8 => OpcodeInfo { ret: U8, args: &[U128, U8] },
            VectorGetElement16 => OpcodeInfo { ret: U16, args: &[U128, U8] },
            VectorGetElement32 => OpcodeInfo { ret: U32, args: &[U128, U8] },
            VectorGetElement64 => OpcodeInfo { ret: U64, args: &[U128, U8] },
            VectorSetElement8 => OpcodeInfo { ret: U128, args: &[U128, U8, U8] },
            VectorSetElement16 => OpcodeInfo { ret: U128, args: &[U128, U8, U16] },
            VectorSetElement32 => OpcodeInfo { ret: U128, args: &[U128, U8, U32] },
            VectorSetElement64 => OpcodeInfo { ret: U128, args: &[U128, U8, U64] },

            VectorAnd | VectorAndNot | VectorOr | VectorEor => {
                OpcodeInfo { ret: U128, args: &[U128, U128] }
            }
            VectorNot => OpcodeInfo { ret: U128, args: &[U128] },

            VectorAdd8 | VectorAdd16 | VectorAdd32 | VectorAdd64
            | VectorSub8 | VectorSub16 | VectorSub32 | VectorSub64
            | VectorEqual8 | VectorEqual16 | VectorEqual32 | VectorEqual64
            | VectorEqual128
            | VectorGreaterS8 | VectorGreaterS16 | VectorGreaterS32 | VectorGreaterS64
            | VectorLogicalVShiftS8 | VectorLogicalVShiftS16
            | VectorLogicalVShiftS32 | VectorLogicalVShiftS64
            | VectorLogicalVShiftU8 | VectorLogicalVShiftU16
            | VectorLogicalVShiftU32 | VectorLogicalVShiftU64
            | VectorRoundingShiftLeftS8 | VectorRoundingShiftLeftS16
            | VectorRoundingShiftLeftS32 | VectorRoundingShiftLeftS64
            | VectorRoundingShiftLeftU8 | VectorRoundingShiftLeftU16
            | VectorRoundingShiftLeftU32 | VectorRoundingShiftLeftU64
            | VectorHalvingAddS8 | VectorHalvingAddS16 | VectorHalvingAddS32
            | VectorHalvingAddU8 | VectorHalvingAddU16 | VectorHalvingAddU32
            | VectorHalvingSubS8 | VectorHalvingSubS16 | VectorHalvingSubS32
            | VectorHalvingSubU8 | VectorHalvingSubU16 | VectorHalvingSubU32
            | VectorRoundingHalvingAddS8 | VectorRoundingHalvingAddS16
            | VectorRoundingHalvingAddS32
            | VectorRoundingHalvingAddU8 | VectorRoundingHalvingAddU16
            | VectorRoundingHalvingAddU32
            | VectorMaxS8 | VectorMaxS16 | VectorMaxS32 | VectorMaxS64
            | VectorMaxU8 | VectorMaxU16 | VectorMaxU32 | VectorMaxU64
            | VectorMinS8 | VectorMinS16 | VectorMinS32 | VectorMinS64
            | VectorMinU8 | VectorMinU16 | VectorMinU32 | VectorMinU64
            | VectorMultiply8 | VectorMultiply16 | VectorMultiply32 | VectorMultiply64
            | VectorPolynomialMultiply8 | VectorPolynomialMultiplyLong8
            | VectorPolynomialMultiplyLong64
            | VectorSignedSaturatedDoublingMultiplyReturnHigh16
            | VectorSignedSaturatedDoublingMultiplyReturnHigh32
            | VectorPairedAdd8 | VectorPairedAdd16 | VectorPairedAdd32 | VectorPairedAdd64
            | VectorPairedAddLower8 | VectorPairedAddLower16 | VectorPairedAddLower32
            | VectorPairedMaxS8 | VectorPairedMaxS16 | VectorPairedMaxS32
            | VectorPairedMaxU8 | VectorPairedMaxU16 | VectorPairedMaxU32
            | VectorPairedMinS8 | VectorPairedMinS16 | VectorPairedMinS32
            | VectorPairedMinU8 | VectorPairedMinU16 | VectorPairedMinU32
            | VectorDeinterleaveEven8 | VectorDeinterleaveEven16
            | VectorDeinterleaveEven32 | VectorDeinterleaveEven64
            | VectorDeinterleaveOdd8 | VectorDeinterleaveOdd16
            | VectorDeinterleaveOdd32 | VectorDeinterleaveOdd64
            | VectorInterleaveLower8 | VectorInterleaveLower16
            | VectorInterleaveLower32 | VectorInterleaveLower64
            | VectorInterleaveUpper8 | VectorInterleaveUpper16
            | VectorInterleaveUpper32 | VectorInterleaveUpper64
            | VectorSignedAbsoluteDifference8 | VectorSignedAbsoluteDifference16
            | VectorSignedAbsoluteDifference32
            | VectorUnsignedAbsoluteDifference8 | VectorUnsignedAbsoluteDifference16
            | VectorUnsignedAbsoluteDifference32 => {
                OpcodeInfo { ret: U128, args: &[U128, U128] }
            }

            VectorLogicalShiftLeft8 | VectorLogicalShiftLeft16
            | VectorLogicalShiftLeft32 | VectorLogicalShiftLeft64
            | VectorLogicalShiftRight8 | VectorLogicalShiftRight16
            | VectorLogicalShiftRight32 | VectorLogicalShiftRight64
            | VectorArithmeticShiftRight8 | VectorArithmeticShiftRight16
            | VectorArithmeticShiftRight32 | VectorArithmeticShiftRight64
            | VectorShuffleHighHalfwords | VectorShuffleLowHalfwords
            | VectorShuffleWords => OpcodeInfo { ret: U128, args: &[U128, U8] },

            VectorAbs8 | VectorAbs16 | VectorAbs32 | VectorAbs64
            | VectorNarrow16 | VectorNarrow32 | VectorNarrow64
            | VectorSignExtend8 | VectorSignExtend16 | VectorSignExtend32
            | VectorSignExtend64
            | VectorZeroExtend8 | VectorZeroExtend16 | VectorZeroExtend32
            | VectorZeroExtend64
            | VectorSignedSaturatedAbs8 | VectorSignedSaturatedAbs16
            | VectorSignedSaturatedAbs32 | VectorSignedSaturatedAbs64
            | VectorSignedSaturatedNeg8 | VectorSignedSaturatedNeg16
            | VectorSignedSaturatedNeg32 | VectorSignedSaturatedNeg64
            | VectorSignedSaturatedNarrowToSigned16
            | VectorSignedSaturatedNarrowToSigned32
            | VectorSignedSaturatedNarrowToSigned64
            | VectorSignedSaturatedNarrowToUnsigned16
            | VectorSignedSaturatedNarrowToUnsigned32
            | VectorSignedSaturatedNarrowToUnsigned64
            | VectorUnsignedSaturatedNarrow16 | VectorUnsignedSaturatedNarrow32
            | VectorUnsignedSaturatedNarrow64
            | VectorPairedAddSignedWiden8 | VectorPairedAddSignedWiden16
            | VectorPairedAddSignedWiden32
            | VectorPairedAddUnsignedWiden8 | VectorPairedAddUnsignedWiden16
            | VectorPairedAddUnsignedWiden32
            | VectorBroadcast8 | VectorBroadcast16 | VectorBroadcast32
            | VectorBroadcast64
            | VectorBroadcastLower8 | VectorBroadcastLower16 | VectorBroadcastLower32
            | VectorPopulationCount | VectorReverseBits
            | VectorZeroUpper => OpcodeInfo { ret: U128, args: &[U128] },

            VectorExtract | VectorExtractLower => {
                OpcodeInfo { ret: U128, args: &[U128, U128, U8] }
            }

            // Holds a refcount on up to four table vectors; unused slots are Void.
            VectorTable => OpcodeInfo { ret: OPQ, args: &[U128, U128, U128, U128] },
            VectorTableLookup => OpcodeInfo { ret: U128, args: &[U128, OPQ, U128] },

            ZeroVector => OpcodeInfo { ret: U128, args: &[] },
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_info() {
        assert_eq!(Opcode::VectorAdd8.num_args(), 2);
        assert_eq!(Opcode::VectorAdd8.return_type(), Type::U128);
        assert_eq!(Opcode::VectorGetElement32.return_type(), Type::U32);
        assert_eq!(Opcode::VectorSetElement16.num_args(), 3);
        assert_eq!(Opcode::ZeroVector.num_args(), 0);
        assert_eq!(Opcode::VectorTable.num_args(), 4);
        assert_eq!(Opcode::VectorTableLookup.num_args(), 3);
    }

    #[test]
    fn test_side_effects() {
        assert!(Opcode::SetVector.has_side_effects());
        assert!(!Opcode::VectorAdd8.has_side_effects());
    }
}
