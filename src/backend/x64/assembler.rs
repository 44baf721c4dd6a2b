//! xbyak-style x86-64 encoder.
//!
//! One typed method per mnemonic, emitting directly into an RWX buffer so
//! RIP-relative displacements (constant pool, exit-stub jumps) are resolved
//! at emission time. Encodings follow the Intel SDM; REX, VEX and EVEX
//! prefixes are produced by the shared helpers at the bottom.

use std::ops::Add;

use crate::backend::x64::constant_pool::ConstantPool;

/// Byte capacity reserved at the front of the buffer for `m_const` literals.
const POOL_BYTES: usize = 16 * 1024;

pub type Result<T> = std::result::Result<T, AsmError>;

#[derive(Debug, thiserror::Error)]
pub enum AsmError {
    #[error("code buffer capacity exhausted")]
    CapacityExhausted,
    #[error("constant pool exhausted")]
    ConstantPoolFull,
    #[error("jump displacement out of rel32 range")]
    JumpOutOfRange,
    #[error("failed to map executable memory: {0}")]
    Mmap(std::io::Error),
}

// ---------------------------------------------------------------------------
// Registers
// ---------------------------------------------------------------------------

/// A host register. `bit` is the operand width: 8/16/32/64 for GPRs,
/// 128 for XMM registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Reg {
    idx: u8,
    bit: u16,
}

impl Reg {
    pub const fn gpr64(idx: u8) -> Reg {
        Reg { idx, bit: 64 }
    }
    pub const fn gpr32(idx: u8) -> Reg {
        Reg { idx, bit: 32 }
    }
    pub const fn gpr16(idx: u8) -> Reg {
        Reg { idx, bit: 16 }
    }
    pub const fn gpr8(idx: u8) -> Reg {
        Reg { idx, bit: 8 }
    }
    pub const fn xmm(idx: u8) -> Reg {
        Reg { idx, bit: 128 }
    }

    pub fn get_idx(self) -> u8 {
        self.idx
    }
    pub fn get_bit(self) -> u16 {
        self.bit
    }
    pub fn is_xmm(self) -> bool {
        self.bit == 128
    }
    pub fn is_gpr(self) -> bool {
        self.bit < 128
    }
}

pub const RAX: Reg = Reg::gpr64(0);
pub const RCX: Reg = Reg::gpr64(1);
pub const RDX: Reg = Reg::gpr64(2);
pub const RBX: Reg = Reg::gpr64(3);
pub const RSP: Reg = Reg::gpr64(4);
pub const RBP: Reg = Reg::gpr64(5);
pub const RSI: Reg = Reg::gpr64(6);
pub const RDI: Reg = Reg::gpr64(7);
pub const R8: Reg = Reg::gpr64(8);
pub const R9: Reg = Reg::gpr64(9);
pub const R10: Reg = Reg::gpr64(10);
pub const R11: Reg = Reg::gpr64(11);
pub const R12: Reg = Reg::gpr64(12);
pub const R13: Reg = Reg::gpr64(13);
pub const R14: Reg = Reg::gpr64(14);
pub const R15: Reg = Reg::gpr64(15);
pub const EAX: Reg = Reg::gpr32(0);

pub const XMM0: Reg = Reg::xmm(0);
pub const XMM1: Reg = Reg::xmm(1);
pub const XMM2: Reg = Reg::xmm(2);
pub const XMM3: Reg = Reg::xmm(3);
pub const XMM4: Reg = Reg::xmm(4);
pub const XMM5: Reg = Reg::xmm(5);
pub const XMM6: Reg = Reg::xmm(6);
pub const XMM7: Reg = Reg::xmm(7);
pub const XMM8: Reg = Reg::xmm(8);
pub const XMM9: Reg = Reg::xmm(9);
pub const XMM10: Reg = Reg::xmm(10);
pub const XMM11: Reg = Reg::xmm(11);
pub const XMM12: Reg = Reg::xmm(12);
pub const XMM13: Reg = Reg::xmm(13);
pub const XMM14: Reg = Reg::xmm(14);
pub const XMM15: Reg = Reg::xmm(15);

// ---------------------------------------------------------------------------
// Memory operands
// ---------------------------------------------------------------------------

/// A base-plus-displacement expression, built as `RegExp::from(RSP) + 16`.
#[derive(Debug, Clone, Copy)]
pub struct RegExp {
    base: Reg,
    disp: i32,
}

impl From<Reg> for RegExp {
    fn from(base: Reg) -> Self {
        assert!(base.is_gpr() && base.get_bit() == 64);
        RegExp { base, disp: 0 }
    }
}

impl Add<i32> for RegExp {
    type Output = RegExp;
    fn add(self, rhs: i32) -> RegExp {
        RegExp {
            base: self.base,
            disp: self.disp + rhs,
        }
    }
}

/// A memory operand: either `[base + disp]` or a RIP-relative reference to
/// an absolute offset within the code buffer (constant pool entries).
#[derive(Debug, Clone, Copy)]
pub struct Address {
    base: Option<u8>,
    disp: i32,
    rip_target: Option<usize>,
}

impl Address {
    fn from_exp(e: RegExp) -> Address {
        Address {
            base: Some(e.base.get_idx()),
            disp: e.disp,
            rip_target: None,
        }
    }

    fn rip(target: usize) -> Address {
        Address {
            base: None,
            disp: 0,
            rip_target: Some(target),
        }
    }
}

pub fn byte_ptr(e: RegExp) -> Address {
    Address::from_exp(e)
}
pub fn dword_ptr(e: RegExp) -> Address {
    Address::from_exp(e)
}
pub fn qword_ptr(e: RegExp) -> Address {
    Address::from_exp(e)
}
pub fn xmmword_ptr(e: RegExp) -> Address {
    Address::from_exp(e)
}

// ---------------------------------------------------------------------------
// Assembler
// ---------------------------------------------------------------------------

const MAP_0F: u8 = 1;
const MAP_0F38: u8 = 2;
const MAP_0F3A: u8 = 3;

/// Emits x86-64 machine code into an RWX `mmap` buffer.
///
/// The first [`POOL_BYTES`] of the buffer hold the deduplicated constant
/// pool; code emission begins immediately after it.
pub struct CodeAssembler {
    base: *mut u8,
    capacity: usize,
    size: usize,
    pool: ConstantPool,
}

// The buffer is exclusively owned; the raw pointer is never shared.
unsafe impl Send for CodeAssembler {}

impl CodeAssembler {
    pub fn new(capacity: usize) -> Result<Self> {
        assert!(capacity >= 2 * POOL_BYTES, "code buffer too small");
        let base = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                capacity,
                libc::PROT_READ | libc::PROT_WRITE | libc::PROT_EXEC,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if base == libc::MAP_FAILED {
            return Err(AsmError::Mmap(std::io::Error::last_os_error()));
        }
        Ok(Self {
            base: base as *mut u8,
            capacity,
            size: POOL_BYTES,
            pool: ConstantPool::new(0, POOL_BYTES),
        })
    }

    /// Current emission offset in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Reset the emission offset (cache clearing). The constant pool region
    /// is untouched.
    pub fn set_size(&mut self, size: usize) {
        assert!(size >= POOL_BYTES && size <= self.capacity);
        self.size = size;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Base pointer of the buffer.
    pub fn top(&self) -> *const u8 {
        self.base
    }

    /// Pointer to an absolute offset within the buffer.
    pub fn ptr_at(&self, offset: usize) -> *const u8 {
        assert!(offset < self.capacity);
        unsafe { self.base.add(offset) }
    }

    /// Emitted bytes in `[from, to)`. Test and disassembly aid.
    pub fn bytes(&self, from: usize, to: usize) -> &[u8] {
        assert!(from <= to && to <= self.capacity);
        unsafe { std::slice::from_raw_parts(self.base.add(from), to - from) }
    }

    /// Intern a 16-byte literal in the constant pool and return a
    /// RIP-relative operand for it. Equal literals produce equal operands.
    pub fn m_const(&mut self, lower: u64, upper: u64) -> Result<Address> {
        let (offset, fresh) = self
            .pool
            .intern(lower, upper)
            .ok_or(AsmError::ConstantPoolFull)?;
        if fresh {
            unsafe {
                let p = self.base.add(offset);
                p.cast::<u8>()
                    .copy_from_nonoverlapping(lower.to_le_bytes().as_ptr(), 8);
                p.add(8)
                    .copy_from_nonoverlapping(upper.to_le_bytes().as_ptr(), 8);
            }
        }
        Ok(Address::rip(offset))
    }

    /// Number of distinct pool constants (invariant checks).
    pub fn const_count(&self) -> usize {
        self.pool.len()
    }

    /// Emit `mov rax, fn_ptr; call rax`.
    pub fn call_function(&mut self, fn_ptr: usize) -> Result<()> {
        self.mov_imm(RAX, fn_ptr as i64)?;
        self.call_reg(RAX)
    }

    // -------------------------------------------------------------------
    // Raw emission
    // -------------------------------------------------------------------

    fn put(&mut self, bytes: &[u8]) -> Result<()> {
        if self.size + bytes.len() > self.capacity {
            return Err(AsmError::CapacityExhausted);
        }
        unsafe {
            self.base
                .add(self.size)
                .copy_from_nonoverlapping(bytes.as_ptr(), bytes.len());
        }
        self.size += bytes.len();
        Ok(())
    }

    fn put8(&mut self, b: u8) -> Result<()> {
        self.put(&[b])
    }

    fn put32(&mut self, v: i32) -> Result<()> {
        self.put(&v.to_le_bytes())
    }

    fn put64(&mut self, v: i64) -> Result<()> {
        self.put(&v.to_le_bytes())
    }

    // -------------------------------------------------------------------
    // Prefix / modrm helpers
    // -------------------------------------------------------------------

    fn rex(&mut self, w: bool, r: u8, x: u8, b: u8, byte_reg_idx: Option<u8>) -> Result<()> {
        let mut rex = 0x40u8;
        if w {
            rex |= 8;
        }
        if r >= 8 {
            rex |= 4;
        }
        if x >= 8 {
            rex |= 2;
        }
        if b >= 8 {
            rex |= 1;
        }
        // SPL/BPL/SIL/DIL are only addressable with a REX prefix present.
        let force = matches!(byte_reg_idx, Some(i) if (4..8).contains(&i));
        if rex != 0x40 || force {
            self.put8(rex)?;
        }
        Ok(())
    }

    fn modrm_reg(&mut self, reg: u8, rm: u8) -> Result<()> {
        self.put8(0xC0 | ((reg & 7) << 3) | (rm & 7))
    }

    /// ModRM + SIB + displacement for a memory operand. `imm_len` is the
    /// number of immediate bytes that follow the displacement (needed to
    /// compute RIP-relative displacements).
    fn modrm_mem(&mut self, reg: u8, addr: &Address, imm_len: usize) -> Result<()> {
        if let Some(target) = addr.rip_target {
            self.put8(((reg & 7) << 3) | 0b101)?;
            let next = self.size + 4 + imm_len;
            let disp = target as i64 - next as i64;
            if disp < i32::MIN as i64 || disp > i32::MAX as i64 {
                return Err(AsmError::JumpOutOfRange);
            }
            return self.put32(disp as i32);
        }

        let base = addr.base.expect("memory operand without base");
        let b = base & 7;
        let disp = addr.disp;
        let mode: u8 = if disp == 0 && b != 5 {
            0b00
        } else if (-128..128).contains(&disp) {
            0b01
        } else {
            0b10
        };
        self.put8((mode << 6) | ((reg & 7) << 3) | if b == 4 { 4 } else { b })?;
        if b == 4 {
            // RSP/R12 base requires a SIB byte with no index.
            self.put8(0x24)?;
        }
        match mode {
            0b01 => self.put8(disp as u8)?,
            0b10 => self.put32(disp)?,
            _ => {}
        }
        Ok(())
    }

    fn escape(&mut self, map: u8) -> Result<()> {
        self.put8(0x0F)?;
        match map {
            MAP_0F => Ok(()),
            MAP_0F38 => self.put8(0x38),
            MAP_0F3A => self.put8(0x3A),
            _ => unreachable!("bad opcode map"),
        }
    }

    /// Legacy-prefixed SSE op, register-register form.
    fn sse_rr(&mut self, prefix: u8, map: u8, op: u8, w: bool, reg: Reg, rm: Reg) -> Result<()> {
        if prefix != 0 {
            self.put8(prefix)?;
        }
        self.rex(w, reg.idx, 0, rm.idx, None)?;
        self.escape(map)?;
        self.put8(op)?;
        self.modrm_reg(reg.idx, rm.idx)
    }

    /// Legacy-prefixed SSE op, register-memory form.
    fn sse_rm(
        &mut self,
        prefix: u8,
        map: u8,
        op: u8,
        reg: Reg,
        addr: &Address,
        imm_len: usize,
    ) -> Result<()> {
        if prefix != 0 {
            self.put8(prefix)?;
        }
        self.rex(false, reg.idx, 0, addr.base.unwrap_or(0), None)?;
        self.escape(map)?;
        self.put8(op)?;
        self.modrm_mem(reg.idx, addr, imm_len)
    }

    /// Shift-style op with an opcode extension in the reg field.
    fn sse_ext_imm(&mut self, op: u8, ext: u8, rm: Reg, imm: u8) -> Result<()> {
        self.put8(0x66)?;
        self.rex(false, 0, 0, rm.idx, None)?;
        self.escape(MAP_0F)?;
        self.put8(op)?;
        self.modrm_reg(ext, rm.idx)?;
        self.put8(imm)
    }

    /// Three-byte VEX prefix. `vvvv` is the extra source register index,
    /// complemented into the encoded field (pass 0 when unused).
    fn vex(&mut self, map: u8, pp: u8, w: bool, reg: Reg, vvvv: u8, rm: Reg) -> Result<()> {
        self.put8(0xC4)?;
        let b1 = (if reg.idx < 8 { 0x80 } else { 0 })
            | 0x40
            | (if rm.idx < 8 { 0x20 } else { 0 })
            | map;
        self.put8(b1)?;
        let b2 = (if w { 0x80 } else { 0 }) | ((!vvvv & 0xF) << 3) | pp;
        self.put8(b2)
    }

    /// Four-byte EVEX prefix for 128-bit unmasked operations.
    fn evex(&mut self, map: u8, pp: u8, w: bool, reg: Reg, vvvv: u8, rm: Reg) -> Result<()> {
        self.put8(0x62)?;
        let p0 = (if reg.idx < 8 { 0x80 } else { 0 })
            | 0x40
            | (if rm.idx < 8 { 0x20 } else { 0 })
            | 0x10
            | map;
        self.put8(p0)?;
        let p1 = (if w { 0x80 } else { 0 }) | ((!vvvv & 0xF) << 3) | 0x04 | pp;
        self.put8(p1)?;
        self.put8(0x08)
    }

    // -------------------------------------------------------------------
    // General-purpose instructions
    // -------------------------------------------------------------------

    /// `mov dst, src` between GPRs of the same width (32 or 64 bits).
    pub fn mov(&mut self, dst: Reg, src: Reg) -> Result<()> {
        assert!(dst.is_gpr() && src.is_gpr());
        self.rex(dst.bit == 64, src.idx, 0, dst.idx, None)?;
        self.put8(0x89)?;
        self.modrm_reg(src.idx, dst.idx)
    }

    /// `mov dst, imm` (64-bit `movabs` form for 64-bit registers).
    pub fn mov_imm(&mut self, dst: Reg, imm: i64) -> Result<()> {
        assert!(dst.is_gpr());
        if dst.bit == 64 {
            self.rex(true, 0, 0, dst.idx, None)?;
            self.put8(0xB8 + (dst.idx & 7))?;
            self.put64(imm)
        } else {
            self.rex(false, 0, 0, dst.idx, None)?;
            self.put8(0xB8 + (dst.idx & 7))?;
            self.put32(imm as i32)
        }
    }

    pub fn mov_load(&mut self, dst: Reg, addr: Address) -> Result<()> {
        assert!(dst.is_gpr());
        self.rex(dst.bit == 64, dst.idx, 0, addr.base.unwrap_or(0), None)?;
        self.put8(0x8B)?;
        self.modrm_mem(dst.idx, &addr, 0)
    }

    pub fn mov_store(&mut self, addr: Address, src: Reg) -> Result<()> {
        assert!(src.is_gpr());
        self.rex(src.bit == 64, src.idx, 0, addr.base.unwrap_or(0), None)?;
        self.put8(0x89)?;
        self.modrm_mem(src.idx, &addr, 0)
    }

    pub fn mov_store_imm32(&mut self, addr: Address, imm: i32) -> Result<()> {
        self.rex(false, 0, 0, addr.base.unwrap_or(0), None)?;
        self.put8(0xC7)?;
        self.modrm_mem(0, &addr, 4)?;
        self.put32(imm)
    }

    /// `movzx r32, r8/r16`.
    pub fn movzx(&mut self, dst: Reg, src: Reg) -> Result<()> {
        assert!(dst.bit == 32 && (src.bit == 8 || src.bit == 16));
        let byte_src = if src.bit == 8 { Some(src.idx) } else { None };
        self.rex(false, dst.idx, 0, src.idx, byte_src)?;
        self.escape(MAP_0F)?;
        self.put8(if src.bit == 8 { 0xB6 } else { 0xB7 })?;
        self.modrm_reg(dst.idx, src.idx)
    }

    /// `movsx r32/r64, r8/r16` and `movsxd r64, r32`.
    pub fn movsx(&mut self, dst: Reg, src: Reg) -> Result<()> {
        assert!(dst.bit == 32 || dst.bit == 64);
        let byte_src = if src.bit == 8 { Some(src.idx) } else { None };
        match src.bit {
            8 | 16 => {
                self.rex(dst.bit == 64, dst.idx, 0, src.idx, byte_src)?;
                self.escape(MAP_0F)?;
                self.put8(if src.bit == 8 { 0xBE } else { 0xBF })?;
                self.modrm_reg(dst.idx, src.idx)
            }
            32 => {
                assert!(dst.bit == 64);
                self.rex(true, dst.idx, 0, src.idx, None)?;
                self.put8(0x63)?;
                self.modrm_reg(dst.idx, src.idx)
            }
            _ => panic!("movsx source must be 8, 16 or 32 bits"),
        }
    }

    pub fn xor_(&mut self, dst: Reg, src: Reg) -> Result<()> {
        self.rex(dst.bit == 64, src.idx, 0, dst.idx, None)?;
        self.put8(0x31)?;
        self.modrm_reg(src.idx, dst.idx)
    }

    pub fn or_(&mut self, dst: Reg, src: Reg) -> Result<()> {
        self.rex(dst.bit == 64, src.idx, 0, dst.idx, None)?;
        self.put8(0x09)?;
        self.modrm_reg(src.idx, dst.idx)
    }

    /// `or [mem], reg` — byte form when `reg` is 8-bit, else dword.
    pub fn or_store(&mut self, addr: Address, src: Reg) -> Result<()> {
        let byte_src = if src.bit == 8 { Some(src.idx) } else { None };
        self.rex(false, src.idx, 0, addr.base.unwrap_or(0), byte_src)?;
        self.put8(if src.bit == 8 { 0x08 } else { 0x09 })?;
        self.modrm_mem(src.idx, &addr, 0)
    }

    pub fn and_imm(&mut self, dst: Reg, imm: i32) -> Result<()> {
        self.alu_imm(4, dst, imm)
    }

    pub fn add_imm(&mut self, dst: Reg, imm: i32) -> Result<()> {
        self.alu_imm(0, dst, imm)
    }

    pub fn sub_imm(&mut self, dst: Reg, imm: i32) -> Result<()> {
        self.alu_imm(5, dst, imm)
    }

    pub fn cmp_imm(&mut self, dst: Reg, imm: i32) -> Result<()> {
        self.alu_imm(7, dst, imm)
    }

    fn alu_imm(&mut self, ext: u8, dst: Reg, imm: i32) -> Result<()> {
        assert!(dst.is_gpr());
        self.rex(dst.bit == 64, 0, 0, dst.idx, None)?;
        if (-128..128).contains(&imm) {
            self.put8(0x83)?;
            self.modrm_reg(ext, dst.idx)?;
            self.put8(imm as u8)
        } else {
            self.put8(0x81)?;
            self.modrm_reg(ext, dst.idx)?;
            self.put32(imm)
        }
    }

    pub fn test_imm(&mut self, dst: Reg, imm: u32) -> Result<()> {
        assert!(dst.bit == 32);
        self.rex(false, 0, 0, dst.idx, None)?;
        self.put8(0xF7)?;
        self.modrm_reg(0, dst.idx)?;
        self.put32(imm as i32)
    }

    pub fn shl(&mut self, dst: Reg, imm: u8) -> Result<()> {
        self.shift_imm(4, dst, imm)
    }

    pub fn shr(&mut self, dst: Reg, imm: u8) -> Result<()> {
        self.shift_imm(5, dst, imm)
    }

    pub fn sar(&mut self, dst: Reg, imm: u8) -> Result<()> {
        self.shift_imm(7, dst, imm)
    }

    fn shift_imm(&mut self, ext: u8, dst: Reg, imm: u8) -> Result<()> {
        assert!(dst.is_gpr());
        self.rex(dst.bit == 64, 0, 0, dst.idx, None)?;
        self.put8(0xC1)?;
        self.modrm_reg(ext, dst.idx)?;
        self.put8(imm)
    }

    /// `setnz r8`.
    pub fn setnz(&mut self, dst: Reg) -> Result<()> {
        assert!(dst.bit == 8);
        self.rex(false, 0, 0, dst.idx, Some(dst.idx))?;
        self.escape(MAP_0F)?;
        self.put8(0x95)?;
        self.modrm_reg(0, dst.idx)
    }

    pub fn imul(&mut self, dst: Reg, src: Reg) -> Result<()> {
        assert!(dst.bit == 64 && src.bit == 64);
        self.rex(true, dst.idx, 0, src.idx, None)?;
        self.escape(MAP_0F)?;
        self.put8(0xAF)?;
        self.modrm_reg(dst.idx, src.idx)
    }

    pub fn lea(&mut self, dst: Reg, addr: Address) -> Result<()> {
        assert!(dst.bit == 64);
        self.rex(true, dst.idx, 0, addr.base.unwrap_or(0), None)?;
        self.put8(0x8D)?;
        self.modrm_mem(dst.idx, &addr, 0)
    }

    pub fn push(&mut self, reg: Reg) -> Result<()> {
        assert!(reg.bit == 64);
        self.rex(false, 0, 0, reg.idx, None)?;
        self.put8(0x50 + (reg.idx & 7))
    }

    pub fn pop(&mut self, reg: Reg) -> Result<()> {
        assert!(reg.bit == 64);
        self.rex(false, 0, 0, reg.idx, None)?;
        self.put8(0x58 + (reg.idx & 7))
    }

    pub fn xchg(&mut self, a: Reg, b: Reg) -> Result<()> {
        assert!(a.bit == 64 && b.bit == 64);
        self.rex(true, a.idx, 0, b.idx, None)?;
        self.put8(0x87)?;
        self.modrm_reg(a.idx, b.idx)
    }

    pub fn call_reg(&mut self, reg: Reg) -> Result<()> {
        self.rex(false, 0, 0, reg.idx, None)?;
        self.put8(0xFF)?;
        self.modrm_reg(2, reg.idx)
    }

    pub fn jmp_reg(&mut self, reg: Reg) -> Result<()> {
        self.rex(false, 0, 0, reg.idx, None)?;
        self.put8(0xFF)?;
        self.modrm_reg(4, reg.idx)
    }

    /// `jmp rel32` to an absolute offset within the code buffer.
    pub fn jmp_to(&mut self, target_offset: usize) -> Result<()> {
        let disp = target_offset as i64 - (self.size as i64 + 5);
        if disp < i32::MIN as i64 || disp > i32::MAX as i64 {
            return Err(AsmError::JumpOutOfRange);
        }
        self.put8(0xE9)?;
        self.put32(disp as i32)
    }

    pub fn ret(&mut self) -> Result<()> {
        self.put8(0xC3)
    }

    pub fn int3(&mut self) -> Result<()> {
        self.put8(0xCC)
    }

    // -------------------------------------------------------------------
    // SSE/SSE2 moves
    // -------------------------------------------------------------------

    pub fn movaps(&mut self, dst: Reg, src: Reg) -> Result<()> {
        self.sse_rr(0, MAP_0F, 0x28, false, dst, src)
    }

    pub fn movaps_load(&mut self, dst: Reg, addr: Address) -> Result<()> {
        self.sse_rm(0, MAP_0F, 0x28, dst, &addr, 0)
    }

    pub fn movaps_store(&mut self, addr: Address, src: Reg) -> Result<()> {
        self.sse_rm(0, MAP_0F, 0x29, src, &addr, 0)
    }

    pub fn movdqa(&mut self, dst: Reg, src: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F, 0x6F, false, dst, src)
    }

    pub fn movdqa_load(&mut self, dst: Reg, addr: Address) -> Result<()> {
        self.sse_rm(0x66, MAP_0F, 0x6F, dst, &addr, 0)
    }

    pub fn movsd(&mut self, dst: Reg, src: Reg) -> Result<()> {
        self.sse_rr(0xF2, MAP_0F, 0x10, false, dst, src)
    }

    pub fn xorps(&mut self, dst: Reg, src: Reg) -> Result<()> {
        self.sse_rr(0, MAP_0F, 0x57, false, dst, src)
    }

    /// `movd` between an XMM and a 32-bit GPR, direction inferred.
    pub fn movd(&mut self, dst: Reg, src: Reg) -> Result<()> {
        if dst.is_xmm() {
            assert!(src.bit == 32);
            self.sse_rr(0x66, MAP_0F, 0x6E, false, dst, src)
        } else {
            assert!(dst.bit == 32 && src.is_xmm());
            self.sse_rr(0x66, MAP_0F, 0x7E, false, src, dst)
        }
    }

    /// `movq`: XMM↔XMM (zeroing the upper half) or XMM↔64-bit GPR,
    /// direction inferred from operand kinds.
    pub fn movq(&mut self, dst: Reg, src: Reg) -> Result<()> {
        match (dst.is_xmm(), src.is_xmm()) {
            (true, true) => self.sse_rr(0xF3, MAP_0F, 0x7E, false, dst, src),
            (true, false) => self.sse_rr(0x66, MAP_0F, 0x6E, true, dst, src),
            (false, true) => self.sse_rr(0x66, MAP_0F, 0x7E, true, src, dst),
            (false, false) => panic!("movq needs at least one XMM operand"),
        }
    }

    // -------------------------------------------------------------------
    // SSE2 integer arithmetic / logic (66 0F xx, reg = destination)
    // -------------------------------------------------------------------

    pub fn paddb(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F, 0xFC, false, a, b)
    }
    pub fn paddw(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F, 0xFD, false, a, b)
    }
    pub fn paddd(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F, 0xFE, false, a, b)
    }
    pub fn paddq(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F, 0xD4, false, a, b)
    }
    pub fn psubb(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F, 0xF8, false, a, b)
    }
    pub fn psubw(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F, 0xF9, false, a, b)
    }
    pub fn psubd(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F, 0xFA, false, a, b)
    }
    pub fn psubq(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F, 0xFB, false, a, b)
    }
    pub fn psubsb(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F, 0xE8, false, a, b)
    }
    pub fn psubsw(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F, 0xE9, false, a, b)
    }
    pub fn psubusb(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F, 0xD8, false, a, b)
    }
    pub fn psubusw(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F, 0xD9, false, a, b)
    }
    pub fn paddusb(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F, 0xDC, false, a, b)
    }
    pub fn paddusb_mem(&mut self, a: Reg, addr: Address) -> Result<()> {
        self.sse_rm(0x66, MAP_0F, 0xDC, a, &addr, 0)
    }
    pub fn pand(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F, 0xDB, false, a, b)
    }
    pub fn pand_mem(&mut self, a: Reg, addr: Address) -> Result<()> {
        self.sse_rm(0x66, MAP_0F, 0xDB, a, &addr, 0)
    }
    pub fn pandn(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F, 0xDF, false, a, b)
    }
    pub fn por(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F, 0xEB, false, a, b)
    }
    pub fn pxor(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F, 0xEF, false, a, b)
    }
    pub fn pavgb(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F, 0xE0, false, a, b)
    }
    pub fn pavgw(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F, 0xE3, false, a, b)
    }
    pub fn pcmpeqb(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F, 0x74, false, a, b)
    }
    pub fn pcmpeqb_mem(&mut self, a: Reg, addr: Address) -> Result<()> {
        self.sse_rm(0x66, MAP_0F, 0x74, a, &addr, 0)
    }
    pub fn pcmpeqw(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F, 0x75, false, a, b)
    }
    pub fn pcmpeqw_mem(&mut self, a: Reg, addr: Address) -> Result<()> {
        self.sse_rm(0x66, MAP_0F, 0x75, a, &addr, 0)
    }
    pub fn pcmpeqd(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F, 0x76, false, a, b)
    }
    pub fn pcmpeqd_mem(&mut self, a: Reg, addr: Address) -> Result<()> {
        self.sse_rm(0x66, MAP_0F, 0x76, a, &addr, 0)
    }
    pub fn pcmpgtb(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F, 0x64, false, a, b)
    }
    pub fn pcmpgtw(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F, 0x65, false, a, b)
    }
    pub fn pcmpgtd(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F, 0x66, false, a, b)
    }
    pub fn pmaxsw(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F, 0xEE, false, a, b)
    }
    pub fn pmaxub(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F, 0xDE, false, a, b)
    }
    pub fn pminsw(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F, 0xEA, false, a, b)
    }
    pub fn pminub(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F, 0xDA, false, a, b)
    }
    pub fn pmullw(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F, 0xD5, false, a, b)
    }
    pub fn pmulhw(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F, 0xE5, false, a, b)
    }
    pub fn pmuludq(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F, 0xF4, false, a, b)
    }
    pub fn pmaddwd(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F, 0xF5, false, a, b)
    }
    pub fn packsswb(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F, 0x63, false, a, b)
    }
    pub fn packssdw(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F, 0x6B, false, a, b)
    }
    pub fn packuswb(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F, 0x67, false, a, b)
    }
    pub fn punpcklbw(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F, 0x60, false, a, b)
    }
    pub fn punpcklwd(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F, 0x61, false, a, b)
    }
    pub fn punpckldq(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F, 0x62, false, a, b)
    }
    pub fn punpcklqdq(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F, 0x6C, false, a, b)
    }
    pub fn punpckhbw(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F, 0x68, false, a, b)
    }
    pub fn punpckhwd(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F, 0x69, false, a, b)
    }
    pub fn punpckhdq(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F, 0x6A, false, a, b)
    }
    pub fn punpckhqdq(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F, 0x6D, false, a, b)
    }

    /// `pmovmskb r32, xmm`.
    pub fn pmovmskb(&mut self, dst: Reg, src: Reg) -> Result<()> {
        assert!(dst.bit == 32 && src.is_xmm());
        self.sse_rr(0x66, MAP_0F, 0xD7, false, dst, src)
    }

    /// `movmskps r32, xmm`.
    pub fn movmskps(&mut self, dst: Reg, src: Reg) -> Result<()> {
        assert!(dst.bit == 32 && src.is_xmm());
        self.sse_rr(0, MAP_0F, 0x50, false, dst, src)
    }

    // -------------------------------------------------------------------
    // SSE2 shifts by immediate
    // -------------------------------------------------------------------

    pub fn psllw(&mut self, a: Reg, imm: u8) -> Result<()> {
        self.sse_ext_imm(0x71, 6, a, imm)
    }
    pub fn psrlw(&mut self, a: Reg, imm: u8) -> Result<()> {
        self.sse_ext_imm(0x71, 2, a, imm)
    }
    pub fn psraw(&mut self, a: Reg, imm: u8) -> Result<()> {
        self.sse_ext_imm(0x71, 4, a, imm)
    }
    pub fn pslld(&mut self, a: Reg, imm: u8) -> Result<()> {
        self.sse_ext_imm(0x72, 6, a, imm)
    }
    pub fn psrld(&mut self, a: Reg, imm: u8) -> Result<()> {
        self.sse_ext_imm(0x72, 2, a, imm)
    }
    pub fn psrad(&mut self, a: Reg, imm: u8) -> Result<()> {
        self.sse_ext_imm(0x72, 4, a, imm)
    }
    pub fn psllq(&mut self, a: Reg, imm: u8) -> Result<()> {
        self.sse_ext_imm(0x73, 6, a, imm)
    }
    pub fn psrlq(&mut self, a: Reg, imm: u8) -> Result<()> {
        self.sse_ext_imm(0x73, 2, a, imm)
    }
    pub fn pslldq(&mut self, a: Reg, imm: u8) -> Result<()> {
        self.sse_ext_imm(0x73, 7, a, imm)
    }
    pub fn psrldq(&mut self, a: Reg, imm: u8) -> Result<()> {
        self.sse_ext_imm(0x73, 3, a, imm)
    }

    // -------------------------------------------------------------------
    // Shuffles
    // -------------------------------------------------------------------

    pub fn pshufd(&mut self, dst: Reg, src: Reg, imm: u8) -> Result<()> {
        self.sse_rr(0x66, MAP_0F, 0x70, false, dst, src)?;
        self.put8(imm)
    }
    pub fn pshuflw(&mut self, dst: Reg, src: Reg, imm: u8) -> Result<()> {
        self.sse_rr(0xF2, MAP_0F, 0x70, false, dst, src)?;
        self.put8(imm)
    }
    pub fn pshufhw(&mut self, dst: Reg, src: Reg, imm: u8) -> Result<()> {
        self.sse_rr(0xF3, MAP_0F, 0x70, false, dst, src)?;
        self.put8(imm)
    }
    pub fn shufps(&mut self, dst: Reg, src: Reg, imm: u8) -> Result<()> {
        self.sse_rr(0, MAP_0F, 0xC6, false, dst, src)?;
        self.put8(imm)
    }

    // -------------------------------------------------------------------
    // Insert/extract
    // -------------------------------------------------------------------

    /// `pextrw r32, xmm, imm8` (SSE2 form).
    pub fn pextrw(&mut self, dst: Reg, src: Reg, imm: u8) -> Result<()> {
        assert!(dst.bit == 32 && src.is_xmm());
        self.sse_rr(0x66, MAP_0F, 0xC5, false, dst, src)?;
        self.put8(imm)
    }

    /// `pinsrw xmm, r32, imm8`.
    pub fn pinsrw(&mut self, dst: Reg, src: Reg, imm: u8) -> Result<()> {
        assert!(dst.is_xmm() && src.bit == 32);
        self.sse_rr(0x66, MAP_0F, 0xC4, false, dst, src)?;
        self.put8(imm)
    }

    /// `pextrb r32, xmm, imm8` (SSE4.1). The GPR is the modrm.rm operand.
    pub fn pextrb(&mut self, dst: Reg, src: Reg, imm: u8) -> Result<()> {
        assert!(dst.bit == 32 && src.is_xmm());
        self.sse_rr(0x66, MAP_0F3A, 0x14, false, src, dst)?;
        self.put8(imm)
    }

    /// `pextrd r32, xmm, imm8` (SSE4.1).
    pub fn pextrd(&mut self, dst: Reg, src: Reg, imm: u8) -> Result<()> {
        assert!(dst.bit == 32 && src.is_xmm());
        self.sse_rr(0x66, MAP_0F3A, 0x16, false, src, dst)?;
        self.put8(imm)
    }

    /// `pextrq r64, xmm, imm8` (SSE4.1).
    pub fn pextrq(&mut self, dst: Reg, src: Reg, imm: u8) -> Result<()> {
        assert!(dst.bit == 64 && src.is_xmm());
        self.sse_rr(0x66, MAP_0F3A, 0x16, true, src, dst)?;
        self.put8(imm)
    }

    /// `pinsrb xmm, r32, imm8` (SSE4.1).
    pub fn pinsrb(&mut self, dst: Reg, src: Reg, imm: u8) -> Result<()> {
        assert!(dst.is_xmm() && src.bit == 32);
        self.sse_rr(0x66, MAP_0F3A, 0x20, false, dst, src)?;
        self.put8(imm)
    }

    /// `pinsrd xmm, r32, imm8` (SSE4.1).
    pub fn pinsrd(&mut self, dst: Reg, src: Reg, imm: u8) -> Result<()> {
        assert!(dst.is_xmm() && src.bit == 32);
        self.sse_rr(0x66, MAP_0F3A, 0x22, false, dst, src)?;
        self.put8(imm)
    }

    /// `pinsrq xmm, r64, imm8` (SSE4.1).
    pub fn pinsrq(&mut self, dst: Reg, src: Reg, imm: u8) -> Result<()> {
        assert!(dst.is_xmm() && src.bit == 64);
        self.sse_rr(0x66, MAP_0F3A, 0x22, true, dst, src)?;
        self.put8(imm)
    }

    // -------------------------------------------------------------------
    // SSSE3
    // -------------------------------------------------------------------

    pub fn pshufb(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F38, 0x00, false, a, b)
    }
    pub fn phaddw(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F38, 0x01, false, a, b)
    }
    pub fn phaddd(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F38, 0x02, false, a, b)
    }
    pub fn pabsb(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F38, 0x1C, false, a, b)
    }
    pub fn pabsw(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F38, 0x1D, false, a, b)
    }
    pub fn pabsd(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F38, 0x1E, false, a, b)
    }

    // -------------------------------------------------------------------
    // SSE4.1 / SSE4.2
    // -------------------------------------------------------------------

    pub fn pmovsxbw(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F38, 0x20, false, a, b)
    }
    pub fn pmovsxwd(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F38, 0x23, false, a, b)
    }
    pub fn pmovsxdq(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F38, 0x25, false, a, b)
    }
    pub fn pmovzxbw(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F38, 0x30, false, a, b)
    }
    pub fn pmovzxwd(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F38, 0x33, false, a, b)
    }
    pub fn pmovzxdq(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F38, 0x35, false, a, b)
    }
    pub fn pmuldq(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F38, 0x28, false, a, b)
    }
    pub fn pcmpeqq(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F38, 0x29, false, a, b)
    }
    pub fn pcmpeqq_mem(&mut self, a: Reg, addr: Address) -> Result<()> {
        self.sse_rm(0x66, MAP_0F38, 0x29, a, &addr, 0)
    }
    pub fn packusdw(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F38, 0x2B, false, a, b)
    }
    pub fn pminsb(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F38, 0x38, false, a, b)
    }
    pub fn pminsd(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F38, 0x39, false, a, b)
    }
    pub fn pminuw(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F38, 0x3A, false, a, b)
    }
    pub fn pminud(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F38, 0x3B, false, a, b)
    }
    pub fn pmaxsb(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F38, 0x3C, false, a, b)
    }
    pub fn pmaxsd(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F38, 0x3D, false, a, b)
    }
    pub fn pmaxuw(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F38, 0x3E, false, a, b)
    }
    pub fn pmaxud(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F38, 0x3F, false, a, b)
    }
    pub fn pmulld(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F38, 0x40, false, a, b)
    }
    pub fn ptest(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F38, 0x17, false, a, b)
    }

    /// `pblendvb xmm, xmm` — the selector is implicitly XMM0.
    pub fn pblendvb(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F38, 0x10, false, a, b)
    }

    pub fn pblendw(&mut self, dst: Reg, src: Reg, imm: u8) -> Result<()> {
        self.sse_rr(0x66, MAP_0F3A, 0x0E, false, dst, src)?;
        self.put8(imm)
    }

    pub fn pcmpgtq(&mut self, a: Reg, b: Reg) -> Result<()> {
        self.sse_rr(0x66, MAP_0F38, 0x37, false, a, b)
    }

    // -------------------------------------------------------------------
    // AVX / AVX2
    // -------------------------------------------------------------------

    /// `vpcmpgtq dst, src1, src2`.
    pub fn vpcmpgtq(&mut self, dst: Reg, src1: Reg, src2: Reg) -> Result<()> {
        self.vex(MAP_0F38, 0b01, false, dst, src1.idx, src2)?;
        self.put8(0x37)?;
        self.modrm_reg(dst.idx, src2.idx)
    }

    /// `vpsubq dst, src1, src2`.
    pub fn vpsubq(&mut self, dst: Reg, src1: Reg, src2: Reg) -> Result<()> {
        self.vex(MAP_0F, 0b01, false, dst, src1.idx, src2)?;
        self.put8(0xFB)?;
        self.modrm_reg(dst.idx, src2.idx)
    }

    pub fn vpbroadcastb(&mut self, dst: Reg, src: Reg) -> Result<()> {
        self.vex(MAP_0F38, 0b01, false, dst, 0, src)?;
        self.put8(0x78)?;
        self.modrm_reg(dst.idx, src.idx)
    }
    pub fn vpbroadcastw(&mut self, dst: Reg, src: Reg) -> Result<()> {
        self.vex(MAP_0F38, 0b01, false, dst, 0, src)?;
        self.put8(0x79)?;
        self.modrm_reg(dst.idx, src.idx)
    }
    pub fn vpbroadcastd(&mut self, dst: Reg, src: Reg) -> Result<()> {
        self.vex(MAP_0F38, 0b01, false, dst, 0, src)?;
        self.put8(0x58)?;
        self.modrm_reg(dst.idx, src.idx)
    }
    pub fn vpbroadcastq(&mut self, dst: Reg, src: Reg) -> Result<()> {
        self.vex(MAP_0F38, 0b01, false, dst, 0, src)?;
        self.put8(0x59)?;
        self.modrm_reg(dst.idx, src.idx)
    }

    // -------------------------------------------------------------------
    // AVX-512 (EVEX, 128-bit forms)
    // -------------------------------------------------------------------

    /// `vpabsq xmm, xmm` (AVX512F+VL).
    pub fn vpabsq(&mut self, dst: Reg, src: Reg) -> Result<()> {
        self.evex(MAP_0F38, 0b01, true, dst, 0, src)?;
        self.put8(0x1F)?;
        self.modrm_reg(dst.idx, src.idx)
    }

    /// `vpsraq xmm, xmm, imm8` (AVX512F+VL). The destination is encoded
    /// in EVEX.vvvv, the source in modrm.rm.
    pub fn vpsraq(&mut self, dst: Reg, src: Reg, imm: u8) -> Result<()> {
        self.evex(MAP_0F, 0b01, true, Reg::xmm(4), dst.idx, src)?;
        self.put8(0x72)?;
        self.modrm_reg(4, src.idx)?;
        self.put8(imm)
    }

    pub fn vpminsq(&mut self, dst: Reg, src1: Reg, src2: Reg) -> Result<()> {
        self.evex(MAP_0F38, 0b01, true, dst, src1.idx, src2)?;
        self.put8(0x39)?;
        self.modrm_reg(dst.idx, src2.idx)
    }
    pub fn vpminuq(&mut self, dst: Reg, src1: Reg, src2: Reg) -> Result<()> {
        self.evex(MAP_0F38, 0b01, true, dst, src1.idx, src2)?;
        self.put8(0x3B)?;
        self.modrm_reg(dst.idx, src2.idx)
    }
    pub fn vpmaxsq(&mut self, dst: Reg, src1: Reg, src2: Reg) -> Result<()> {
        self.evex(MAP_0F38, 0b01, true, dst, src1.idx, src2)?;
        self.put8(0x3D)?;
        self.modrm_reg(dst.idx, src2.idx)
    }
    pub fn vpmaxuq(&mut self, dst: Reg, src1: Reg, src2: Reg) -> Result<()> {
        self.evex(MAP_0F38, 0b01, true, dst, src1.idx, src2)?;
        self.put8(0x3F)?;
        self.modrm_reg(dst.idx, src2.idx)
    }

    /// `vpmullq xmm, xmm, xmm` (AVX512DQ+VL).
    pub fn vpmullq(&mut self, dst: Reg, src1: Reg, src2: Reg) -> Result<()> {
        self.evex(MAP_0F38, 0b01, true, dst, src1.idx, src2)?;
        self.put8(0x40)?;
        self.modrm_reg(dst.idx, src2.idx)
    }

    /// `vpmovwb xmm, xmm` (AVX512BW+VL). The destination is the modrm.rm
    /// operand.
    pub fn vpmovwb(&mut self, dst: Reg, src: Reg) -> Result<()> {
        self.evex(MAP_0F38, 0b10, false, src, 0, dst)?;
        self.put8(0x30)?;
        self.modrm_reg(src.idx, dst.idx)
    }

    /// `vpopcntb xmm, xmm` (AVX512_BITALG+VL).
    pub fn vpopcntb(&mut self, dst: Reg, src: Reg) -> Result<()> {
        self.evex(MAP_0F38, 0b01, false, dst, 0, src)?;
        self.put8(0x54)?;
        self.modrm_reg(dst.idx, src.idx)
    }
}

impl Drop for CodeAssembler {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.base as *mut libc::c_void, self.capacity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enc(f: impl FnOnce(&mut CodeAssembler)) -> Vec<u8> {
        let mut asm = CodeAssembler::new(64 * 1024).unwrap();
        let start = asm.size();
        f(&mut asm);
        asm.bytes(start, asm.size()).to_vec()
    }

    #[test]
    fn test_sse2_rr_encodings() {
        assert_eq!(enc(|a| a.paddb(XMM1, XMM2).unwrap()), [0x66, 0x0F, 0xFC, 0xCA]);
        assert_eq!(enc(|a| a.pxor(XMM3, XMM3).unwrap()), [0x66, 0x0F, 0xEF, 0xDB]);
        assert_eq!(enc(|a| a.movaps(XMM1, XMM2).unwrap()), [0x0F, 0x28, 0xCA]);
        assert_eq!(
            enc(|a| a.movdqa(XMM8, XMM1).unwrap()),
            [0x66, 0x44, 0x0F, 0x6F, 0xC1]
        );
        assert_eq!(
            enc(|a| a.punpcklqdq(XMM0, XMM9).unwrap()),
            [0x66, 0x41, 0x0F, 0x6C, 0xC1]
        );
    }

    #[test]
    fn test_shift_encodings() {
        assert_eq!(enc(|a| a.psllw(XMM2, 3).unwrap()), [0x66, 0x0F, 0x71, 0xF2, 0x03]);
        assert_eq!(enc(|a| a.psraw(XMM1, 15).unwrap()), [0x66, 0x0F, 0x71, 0xE1, 0x0F]);
        assert_eq!(enc(|a| a.psrldq(XMM1, 8).unwrap()), [0x66, 0x0F, 0x73, 0xD9, 0x08]);
        assert_eq!(enc(|a| a.pslldq(XMM1, 8).unwrap()), [0x66, 0x0F, 0x73, 0xF9, 0x08]);
        assert_eq!(enc(|a| a.psrlq(XMM9, 32).unwrap()), [0x66, 0x41, 0x0F, 0x73, 0xD1, 0x20]);
    }

    #[test]
    fn test_shuffle_encodings() {
        assert_eq!(
            enc(|a| a.pshufd(XMM1, XMM2, 0xB1).unwrap()),
            [0x66, 0x0F, 0x70, 0xCA, 0xB1]
        );
        assert_eq!(
            enc(|a| a.shufps(XMM1, XMM2, 0x88).unwrap()),
            [0x0F, 0xC6, 0xCA, 0x88]
        );
        assert_eq!(
            enc(|a| a.pshuflw(XMM0, XMM0, 0).unwrap()),
            [0xF2, 0x0F, 0x70, 0xC0, 0x00]
        );
    }

    #[test]
    fn test_insert_extract_encodings() {
        assert_eq!(
            enc(|a| a.pextrb(EAX, XMM1, 5).unwrap()),
            [0x66, 0x0F, 0x3A, 0x14, 0xC8, 0x05]
        );
        assert_eq!(
            enc(|a| a.pextrw(EAX, XMM1, 2).unwrap()),
            [0x66, 0x0F, 0xC5, 0xC1, 0x02]
        );
        assert_eq!(
            enc(|a| a.pextrq(RAX, XMM1, 1).unwrap()),
            [0x66, 0x48, 0x0F, 0x3A, 0x16, 0xC8, 0x01]
        );
        assert_eq!(
            enc(|a| a.pinsrw(XMM1, EAX, 2).unwrap()),
            [0x66, 0x0F, 0xC4, 0xC8, 0x02]
        );
        assert_eq!(
            enc(|a| a.pinsrq(XMM1, RAX, 1).unwrap()),
            [0x66, 0x48, 0x0F, 0x3A, 0x22, 0xC8, 0x01]
        );
    }

    #[test]
    fn test_sse41_encodings() {
        assert_eq!(enc(|a| a.pcmpeqq(XMM1, XMM2).unwrap()), [0x66, 0x0F, 0x38, 0x29, 0xCA]);
        assert_eq!(enc(|a| a.pcmpgtq(XMM1, XMM2).unwrap()), [0x66, 0x0F, 0x38, 0x37, 0xCA]);
        assert_eq!(enc(|a| a.ptest(XMM1, XMM2).unwrap()), [0x66, 0x0F, 0x38, 0x17, 0xCA]);
        assert_eq!(enc(|a| a.pblendvb(XMM1, XMM2).unwrap()), [0x66, 0x0F, 0x38, 0x10, 0xCA]);
        assert_eq!(
            enc(|a| a.pblendw(XMM1, XMM2, 0xF0).unwrap()),
            [0x66, 0x0F, 0x3A, 0x0E, 0xCA, 0xF0]
        );
        assert_eq!(enc(|a| a.pshufb(XMM1, XMM2).unwrap()), [0x66, 0x0F, 0x38, 0x00, 0xCA]);
    }

    #[test]
    fn test_mov_cross_domain() {
        assert_eq!(enc(|a| a.movq(XMM1, XMM2).unwrap()), [0xF3, 0x0F, 0x7E, 0xCA]);
        assert_eq!(enc(|a| a.movq(XMM1, RAX).unwrap()), [0x66, 0x48, 0x0F, 0x6E, 0xC8]);
        assert_eq!(enc(|a| a.movq(RAX, XMM1).unwrap()), [0x66, 0x48, 0x0F, 0x7E, 0xC8]);
        assert_eq!(enc(|a| a.movd(XMM1, EAX).unwrap()), [0x66, 0x0F, 0x6E, 0xC8]);
        assert_eq!(enc(|a| a.movd(EAX, XMM1).unwrap()), [0x66, 0x0F, 0x7E, 0xC8]);
        assert_eq!(enc(|a| a.pmovmskb(EAX, XMM2).unwrap()), [0x66, 0x0F, 0xD7, 0xC2]);
        assert_eq!(enc(|a| a.movmskps(EAX, XMM1).unwrap()), [0x0F, 0x50, 0xC1]);
    }

    #[test]
    fn test_gpr_encodings() {
        assert_eq!(enc(|a| a.mov(R15, RDI).unwrap()), [0x49, 0x89, 0xFF]);
        assert_eq!(enc(|a| a.xor_(EAX, EAX).unwrap()), [0x31, 0xC0]);
        assert_eq!(enc(|a| a.ret().unwrap()), [0xC3]);
        assert_eq!(enc(|a| a.push(RBX).unwrap()), [0x53]);
        assert_eq!(enc(|a| a.push(R12).unwrap()), [0x41, 0x54]);
        assert_eq!(enc(|a| a.call_reg(RAX).unwrap()), [0xFF, 0xD0]);
        assert_eq!(enc(|a| a.jmp_reg(RSI).unwrap()), [0xFF, 0xE6]);
        assert_eq!(enc(|a| a.sub_imm(RSP, 48).unwrap()), [0x48, 0x83, 0xEC, 0x30]);
        assert_eq!(enc(|a| a.shr(EAX, 8).unwrap()), [0xC1, 0xE8, 0x08]);
        assert_eq!(enc(|a| a.sar(RAX, 63).unwrap()), [0x48, 0xC1, 0xF8, 0x3F]);
        assert_eq!(enc(|a| a.setnz(Reg::gpr8(0)).unwrap()), [0x0F, 0x95, 0xC0]);
        // DIL needs a bare REX prefix.
        assert_eq!(enc(|a| a.setnz(Reg::gpr8(7)).unwrap()), [0x40, 0x0F, 0x95, 0xC7]);
        assert_eq!(
            enc(|a| a.imul(RCX, RDX).unwrap()),
            [0x48, 0x0F, 0xAF, 0xCA]
        );
        assert_eq!(
            enc(|a| a.test_imm(EAX, 0xAAAA).unwrap()),
            [0xF7, 0xC0, 0xAA, 0xAA, 0x00, 0x00]
        );
    }

    #[test]
    fn test_mem_encodings() {
        // movaps [rsp+16], xmm1 → 0F 29 modrm(01,1,100) SIB(24) 10
        assert_eq!(
            enc(|a| a
                .movaps_store(xmmword_ptr(RegExp::from(RSP) + 16), XMM1)
                .unwrap()),
            [0x0F, 0x29, 0x4C, 0x24, 0x10]
        );
        // lea rdi, [rsp] → REX.W 8D modrm(00,7,100) SIB(24)
        assert_eq!(
            enc(|a| a.lea(RDI, xmmword_ptr(RegExp::from(RSP))).unwrap()),
            [0x48, 0x8D, 0x3C, 0x24]
        );
        // or [r15+0x120], eax → REX.B 09 modrm(10,0,111) disp32
        assert_eq!(
            enc(|a| a
                .or_store(dword_ptr(RegExp::from(R15) + 0x120), EAX)
                .unwrap()),
            [0x41, 0x09, 0x87, 0x20, 0x01, 0x00, 0x00]
        );
        // mov rax, [rbp] must use disp8=0
        assert_eq!(
            enc(|a| a.mov_load(RAX, qword_ptr(RegExp::from(RBP))).unwrap()),
            [0x48, 0x8B, 0x45, 0x00]
        );
    }

    #[test]
    fn test_vex_encodings() {
        assert_eq!(
            enc(|a| a.vpcmpgtq(XMM0, XMM1, XMM2).unwrap()),
            [0xC4, 0xE2, 0x71, 0x37, 0xC2]
        );
        assert_eq!(
            enc(|a| a.vpsubq(XMM1, XMM2, XMM3).unwrap()),
            [0xC4, 0xE1, 0x69, 0xFB, 0xCB]
        );
        assert_eq!(
            enc(|a| a.vpbroadcastb(XMM1, XMM2).unwrap()),
            [0xC4, 0xE2, 0x79, 0x78, 0xCA]
        );
    }

    #[test]
    fn test_evex_encodings() {
        assert_eq!(
            enc(|a| a.vpabsq(XMM1, XMM2).unwrap()),
            [0x62, 0xF2, 0xFD, 0x08, 0x1F, 0xCA]
        );
        assert_eq!(
            enc(|a| a.vpmullq(XMM1, XMM2, XMM3).unwrap()),
            [0x62, 0xF2, 0xED, 0x08, 0x40, 0xCB]
        );
        assert_eq!(
            enc(|a| a.vpminsq(XMM1, XMM2, XMM3).unwrap()),
            [0x62, 0xF2, 0xED, 0x08, 0x39, 0xCB]
        );
        assert_eq!(
            enc(|a| a.vpmovwb(XMM1, XMM2).unwrap()),
            [0x62, 0xF2, 0x7E, 0x08, 0x30, 0xD1]
        );
        assert_eq!(
            enc(|a| a.vpopcntb(XMM1, XMM2).unwrap()),
            [0x62, 0xF2, 0x7D, 0x08, 0x54, 0xCA]
        );
        assert_eq!(
            enc(|a| a.vpsraq(XMM1, XMM2, 3).unwrap()),
            [0x62, 0xF1, 0xF5, 0x08, 0x72, 0xE2, 0x03]
        );
    }

    #[test]
    fn test_m_const_dedup_and_rip() {
        let mut asm = CodeAssembler::new(64 * 1024).unwrap();
        let a1 = asm.m_const(0x1111, 0x2222).unwrap();
        let a2 = asm.m_const(0x1111, 0x2222).unwrap();
        assert_eq!(a1.rip_target, a2.rip_target);
        assert_eq!(asm.const_count(), 1);

        // The literal bytes land in the pool region.
        let off = a1.rip_target.unwrap();
        assert_eq!(asm.bytes(off, off + 8), 0x1111u64.to_le_bytes());

        // pand xmm1, [rip+disp] — check the disp resolves back to the pool.
        let start = asm.size();
        asm.pand_mem(XMM1, a1).unwrap();
        let code = asm.bytes(start, asm.size()).to_vec();
        assert_eq!(&code[..4], [0x66, 0x0F, 0xDB, 0x0D]);
        let disp = i32::from_le_bytes(code[4..8].try_into().unwrap());
        assert_eq!((asm.size() as i64 + disp as i64) as usize, off);
    }

    #[test]
    fn test_jmp_to_back_and_forth() {
        let mut asm = CodeAssembler::new(64 * 1024).unwrap();
        let target = asm.size();
        asm.ret().unwrap();
        let start = asm.size();
        asm.jmp_to(target).unwrap();
        let code = asm.bytes(start, asm.size()).to_vec();
        assert_eq!(code[0], 0xE9);
        let disp = i32::from_le_bytes(code[1..5].try_into().unwrap());
        assert_eq!(disp, -6);
    }

    #[test]
    fn test_executes_simple_function() {
        // mov rax, 42; ret — run it to prove the buffer is executable.
        let mut asm = CodeAssembler::new(64 * 1024).unwrap();
        let entry = asm.size();
        asm.mov_imm(RAX, 42).unwrap();
        asm.ret().unwrap();
        let f: extern "C" fn() -> u64 = unsafe { std::mem::transmute(asm.ptr_at(entry)) };
        assert_eq!(f(), 42);
    }
}
