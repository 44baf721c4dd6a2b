use std::fmt;

use crate::ir::types::Type;

/// Index into a Block's instruction arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstRef(pub u32);

impl InstRef {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for InstRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// An IR value — either an immediate or a reference to an instruction's result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Void,
    Inst(InstRef),
    ImmU1(bool),
    ImmU8(u8),
    ImmU16(u16),
    ImmU32(u32),
    ImmU64(u64),
}

impl Value {
    pub fn get_type(&self) -> Type {
        match self {
            Value::Void => Type::Void,
            Value::Inst(_) => Type::Opaque,
            Value::ImmU1(_) => Type::U1,
            Value::ImmU8(_) => Type::U8,
            Value::ImmU16(_) => Type::U16,
            Value::ImmU32(_) => Type::U32,
            Value::ImmU64(_) => Type::U64,
        }
    }

    /// Returns true if this is an immediate value (not an instruction reference).
    pub fn is_immediate(&self) -> bool {
        !matches!(self, Value::Inst(_) | Value::Void)
    }

    pub fn is_inst(&self) -> bool {
        matches!(self, Value::Inst(_))
    }

    /// Get the instruction reference, panics if not an Inst value.
    pub fn inst_ref(&self) -> InstRef {
        match self {
            Value::Inst(r) => *r,
            _ => panic!("Value::inst_ref called on non-Inst value: {:?}", self),
        }
    }

    /// Get any immediate value as u64 (zero-extends smaller types).
    pub fn get_imm_as_u64(&self) -> u64 {
        match self {
            Value::ImmU1(v) => *v as u64,
            Value::ImmU8(v) => *v as u64,
            Value::ImmU16(v) => *v as u64,
            Value::ImmU32(v) => *v as u64,
            Value::ImmU64(v) => *v,
            _ => panic!("Value::get_imm_as_u64 called on {:?}", self),
        }
    }

    /// Get any immediate value as i64 (sign-extends smaller types).
    pub fn get_imm_as_s64(&self) -> i64 {
        match self {
            Value::ImmU1(v) => *v as i64,
            Value::ImmU8(v) => *v as i8 as i64,
            Value::ImmU16(v) => *v as i16 as i64,
            Value::ImmU32(v) => *v as i32 as i64,
            Value::ImmU64(v) => *v as i64,
            _ => panic!("Value::get_imm_as_s64 called on {:?}", self),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => write!(f, "<void>"),
            Value::Inst(r) => write!(f, "{}", r),
            Value::ImmU1(v) => write!(f, "#{}", *v as u8),
            Value::ImmU8(v) => write!(f, "#{:#x}", v),
            Value::ImmU16(v) => write!(f, "#{:#x}", v),
            Value::ImmU32(v) => write!(f, "#{:#x}", v),
            Value::ImmU64(v) => write!(f, "#{:#x}", v),
        }
    }
}
