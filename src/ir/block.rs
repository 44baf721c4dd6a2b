use std::fmt;

use crate::ir::inst::Inst;
use crate::ir::opcode::Opcode;
use crate::ir::value::{InstRef, Value};

/// An IR basic block: an ordered arena of instructions, indexed by
/// `InstRef(u32)`. Removal is done by tombstoning (setting opcode to Void).
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub instructions: Vec<Inst>,
}

impl Block {
    pub fn new() -> Self {
        Self {
            instructions: Vec::new(),
        }
    }

    /// Append a new instruction with the given opcode and args.
    ///
    /// Increments the use count of every `Value::Inst` argument and returns
    /// a `Value::Inst` referring to the new instruction, so appends chain
    /// naturally when building blocks.
    pub fn append(&mut self, opcode: Opcode, args: &[Value]) -> Value {
        for arg in args {
            if let Value::Inst(r) = arg {
                self.instructions[r.index()].use_count += 1;
            }
        }
        let idx = self.instructions.len();
        self.instructions.push(Inst::new(opcode, args));
        Value::Inst(InstRef(idx as u32))
    }

    pub fn get(&self, r: InstRef) -> &Inst {
        &self.instructions[r.index()]
    }

    pub fn inst_count(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// (use_count, result bit width) per instruction, in arena order.
    /// This is the shape the register allocator is constructed with.
    pub fn inst_info(&self) -> Vec<(u32, usize)> {
        self.instructions
            .iter()
            .map(|inst| (inst.use_count, inst.return_type().bit_width()))
            .collect()
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, inst) in self.instructions.iter().enumerate() {
            writeln!(f, "%{} = {}", i, inst)?;
        }
        Ok(())
    }
}
