use crate::backend::x64::abi;
use crate::backend::x64::assembler::{AsmError, CodeAssembler, RDI, RSI, RSP, R15};
use crate::backend::x64::jit_state::JitState;
use crate::backend::x64::stack_layout::StackLayout;

/// Default code cache size (16 MB).
pub const DEFAULT_CODE_SIZE: usize = 16 * 1024 * 1024;

/// Entry and exit stub offsets recorded during prelude generation.
///
/// Blocks are entered with a `jmp` (never `call`) so RSP points exactly at
/// the `StackLayout` for the whole block; blocks leave with `jmp rel32` to
/// `exit_offset`.
#[derive(Debug, Clone, Copy)]
pub struct StubLabels {
    pub entry_offset: usize,
    pub exit_offset: usize,
}

/// Function pointer type for entering emitted code.
///
/// Arguments: (jit_state, block entrypoint).
pub type RunCodeFn = unsafe extern "sysv64" fn(*mut JitState, *const u8);

/// Owns the assembler and generates the entry/exit stubs framing every
/// emitted block.
///
/// During execution:
/// - R15 points to the `JitState`
/// - RSP points to a `StackLayout` on the stack
/// - host callee-saved registers are preserved by the stubs
pub struct BlockOfCode {
    pub asm: CodeAssembler,
    stubs: Option<StubLabels>,
    /// Code offset where user-emitted blocks begin (after the stubs).
    code_begin_offset: usize,
}

impl BlockOfCode {
    pub fn new() -> Result<Self, AsmError> {
        Self::with_size(DEFAULT_CODE_SIZE)
    }

    pub fn with_size(total_size: usize) -> Result<Self, AsmError> {
        let asm = CodeAssembler::new(total_size)?;
        Ok(Self {
            asm,
            stubs: None,
            code_begin_offset: 0,
        })
    }

    /// Generate the entry/exit stubs. Must run before any block is emitted.
    pub fn gen_prelude(&mut self) -> Result<StubLabels, AsmError> {
        assert!(self.stubs.is_none(), "prelude already generated");
        let frame = StackLayout::frame_size() as i32;

        // ---- entry: fn(rdi = jit_state, rsi = block) ----
        let entry_offset = self.asm.size();
        for &loc in abi::CALLEE_SAVE_GPRS {
            self.asm.push(loc.to_reg64())?;
        }
        self.asm.sub_imm(RSP, frame)?;
        self.asm.mov(R15, RDI)?;
        self.asm.jmp_reg(RSI)?;

        // ---- exit: jumped to by every block terminal ----
        let exit_offset = self.asm.size();
        self.asm.add_imm(RSP, frame)?;
        for &loc in abi::CALLEE_SAVE_GPRS.iter().rev() {
            self.asm.pop(loc.to_reg64())?;
        }
        self.asm.ret()?;

        let labels = StubLabels {
            entry_offset,
            exit_offset,
        };
        self.stubs = Some(labels);
        self.code_begin_offset = self.asm.size();
        Ok(labels)
    }

    pub fn stubs(&self) -> StubLabels {
        self.stubs.expect("prelude not generated")
    }

    /// Reset the code cursor back to just after the stubs.
    pub fn clear_cache(&mut self) {
        assert!(self.stubs.is_some(), "cannot clear cache before the prelude");
        self.asm.set_size(self.code_begin_offset);
    }

    pub fn space_remaining(&self) -> usize {
        self.asm.capacity().saturating_sub(self.asm.size())
    }

    /// Execute an emitted block against the given guest state.
    ///
    /// # Safety
    /// `block_offset` must be the entrypoint of a block emitted into this
    /// buffer that terminates with a jump to the exit stub.
    pub unsafe fn run(&self, state: *mut JitState, block_offset: usize) {
        let entry: RunCodeFn =
            std::mem::transmute(self.asm.ptr_at(self.stubs().entry_offset));
        entry(state, self.asm.ptr_at(block_offset));
    }
}
