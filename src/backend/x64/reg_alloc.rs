use crate::backend::x64::abi;
use crate::backend::x64::assembler::{
    qword_ptr, xmmword_ptr, Address, CodeAssembler, Reg, RegExp, RAX, RSP,
};
use crate::backend::x64::hostloc::*;
use crate::backend::x64::stack_layout::StackLayout;
use crate::ir::inst::MAX_ARGS;
use crate::ir::types::Type;
use crate::ir::value::{InstRef, Value};

// ---------------------------------------------------------------------------
// Flat indexing for the hostloc_info array
// ---------------------------------------------------------------------------

const NUM_GPRS: usize = 16;
const NUM_XMMS: usize = 16;
const NON_SPILL_COUNT: usize = NUM_GPRS + NUM_XMMS; // 32
const SPILL_SLOTS: usize = crate::backend::x64::stack_layout::SPILL_COUNT;
const TOTAL_HOSTLOC_COUNT: usize = NON_SPILL_COUNT + SPILL_SLOTS;

fn hostloc_to_index(loc: HostLoc) -> usize {
    match loc {
        HostLoc::Gpr(i) => i as usize,
        HostLoc::Xmm(i) => NUM_GPRS + i as usize,
        HostLoc::Spill(i) => NON_SPILL_COUNT + i as usize,
    }
}

fn index_to_hostloc(index: usize) -> HostLoc {
    if index < NUM_GPRS {
        HostLoc::Gpr(index as u8)
    } else if index < NON_SPILL_COUNT {
        HostLoc::Xmm((index - NUM_GPRS) as u8)
    } else {
        HostLoc::Spill((index - NON_SPILL_COUNT) as u8)
    }
}

// ---------------------------------------------------------------------------
// Per-location tracking
// ---------------------------------------------------------------------------

/// Tracks the state of a single host location (register or spill slot).
#[derive(Debug, Clone)]
struct HostLocInfo {
    /// How many times this location has been locked this scope.
    is_being_used_count: usize,
    /// Whether this location is a scratch register (write-locked).
    is_scratch: bool,
    /// Whether this location's value is on its last use.
    is_set_last_use: bool,

    /// Current argument references (from get_argument_info).
    current_references: usize,
    /// Accumulated uses counted so far.
    accumulated_uses: usize,
    /// Total expected uses (from IR use_count).
    total_uses: usize,

    /// IR values currently stored in this location.
    values: Vec<InstRef>,
    /// Maximum bit width of values stored here.
    max_bit_width: usize,
}

impl HostLocInfo {
    fn new() -> Self {
        Self {
            is_being_used_count: 0,
            is_scratch: false,
            is_set_last_use: false,
            current_references: 0,
            accumulated_uses: 0,
            total_uses: 0,
            values: Vec::new(),
            max_bit_width: 0,
        }
    }

    fn is_locked(&self) -> bool {
        self.is_being_used_count > 0
    }

    fn is_empty(&self) -> bool {
        self.values.is_empty() && !self.is_scratch
    }

    fn is_last_use(&self) -> bool {
        self.is_set_last_use || self.accumulated_uses == self.total_uses
    }

    fn set_last_use(&mut self) {
        self.is_set_last_use = true;
    }

    fn read_lock(&mut self) {
        self.is_being_used_count += 1;
    }

    fn write_lock(&mut self) {
        self.is_scratch = true;
        self.is_being_used_count += 1;
    }

    fn add_arg_reference(&mut self) {
        self.current_references += 1;
        assert!(
            self.current_references <= self.total_uses,
            "Too many arg references"
        );
    }

    fn release_one(&mut self) {
        self.is_scratch = false;

        if self.is_being_used_count > 0 {
            self.is_being_used_count -= 1;
        }

        if !self.is_locked() {
            // Only argument references consume use counts; scratch/define
            // releases do not.
            if self.current_references > 0 {
                self.current_references -= 1;
                self.accumulated_uses += 1;
            }

            if self.is_last_use() && !self.values.is_empty() {
                self.values.clear();
                self.max_bit_width = 0;
                self.is_set_last_use = false;
                self.accumulated_uses = 0;
                self.total_uses = 0;
            }
        }
    }

    /// Scope-end release: consumes every outstanding argument reference,
    /// including those of arguments the emitter never materialised (an
    /// index-zero element read, a defaults-is-zero table lookup).
    fn release_all(&mut self) {
        self.accumulated_uses += self.current_references;
        self.current_references = 0;
        self.is_being_used_count = 0;
        self.is_scratch = false;

        if self.is_last_use() && !self.values.is_empty() {
            self.values.clear();
            self.max_bit_width = 0;
            self.accumulated_uses = 0;
            self.total_uses = 0;
        }
        self.is_set_last_use = false;
    }

    fn contains_value(&self, inst: InstRef) -> bool {
        self.values.contains(&inst)
    }

    fn get_max_bit_width(&self) -> usize {
        self.max_bit_width
    }

    fn add_value(&mut self, inst: InstRef, bit_width: usize, total_uses: usize) {
        self.values.push(inst);
        self.total_uses += total_uses;
        if bit_width > self.max_bit_width {
            self.max_bit_width = bit_width;
        }
    }
}

// ---------------------------------------------------------------------------
// Argument — wraps a Value extracted from an IR instruction
// ---------------------------------------------------------------------------

/// An argument extracted from an IR instruction for register allocation.
pub struct Argument {
    /// Whether this argument has been allocated to a host location.
    pub allocated: bool,
    /// The IR value this argument represents.
    pub value: Value,
}

impl Argument {
    fn new() -> Self {
        Self {
            allocated: false,
            value: Value::Void,
        }
    }

    pub fn get_type(&self) -> Type {
        self.value.get_type()
    }

    pub fn is_immediate(&self) -> bool {
        self.value.is_immediate()
    }

    pub fn is_void(&self) -> bool {
        matches!(self.value, Value::Void)
    }

    pub fn get_immediate_u8(&self) -> u8 {
        match self.value {
            Value::ImmU8(v) => v,
            _ => panic!("Expected ImmU8, got {:?}", self.value),
        }
    }

    pub fn get_immediate_u16(&self) -> u16 {
        match self.value {
            Value::ImmU16(v) => v,
            _ => panic!("Expected ImmU16, got {:?}", self.value),
        }
    }

    pub fn get_immediate_u32(&self) -> u32 {
        match self.value {
            Value::ImmU32(v) => v,
            _ => panic!("Expected ImmU32, got {:?}", self.value),
        }
    }

    pub fn get_immediate_u64(&self) -> u64 {
        self.value.get_imm_as_u64()
    }
}

/// Array of arguments for an instruction (up to MAX_ARGS).
pub type ArgumentInfo = [Argument; MAX_ARGS];

// ---------------------------------------------------------------------------
// RegAlloc — the register allocator
// ---------------------------------------------------------------------------

/// Register allocator mapping IR values to x86-64 host registers.
///
/// Tracks which IR values live in which host locations (GPRs, XMMs, spill
/// slots), spills when pressure is high, and emits the move/exchange
/// instructions this requires through the borrowed assembler.
pub struct RegAlloc<'a> {
    /// The code assembler, shared with the emitters.
    pub asm: &'a mut CodeAssembler,
    /// Preferred GPR allocation order.
    gpr_order: Vec<HostLoc>,
    /// Preferred XMM allocation order.
    xmm_order: Vec<HostLoc>,
    /// Per-location state tracking.
    hostloc_info: Vec<HostLocInfo>,
    /// Extra stack space reserved below the StackLayout during host calls.
    reserved_stack_space: usize,
    /// (use_count, result bit width) per instruction, indexed by InstRef.
    inst_info: Vec<(u32, usize)>,
}

impl<'a> RegAlloc<'a> {
    pub fn new(
        asm: &'a mut CodeAssembler,
        gpr_order: Vec<HostLoc>,
        xmm_order: Vec<HostLoc>,
        inst_info: Vec<(u32, usize)>,
    ) -> Self {
        Self {
            asm,
            gpr_order,
            xmm_order,
            hostloc_info: (0..TOTAL_HOSTLOC_COUNT).map(|_| HostLocInfo::new()).collect(),
            reserved_stack_space: 0,
            inst_info,
        }
    }

    /// Create with the default GPR/XMM ordering.
    pub fn new_default(asm: &'a mut CodeAssembler, inst_info: Vec<(u32, usize)>) -> Self {
        Self::new(asm, ANY_GPR.to_vec(), ANY_XMM.to_vec(), inst_info)
    }

    // -------------------------------------------------------------------
    // Argument info
    // -------------------------------------------------------------------

    /// Extract argument info for an instruction. Each non-immediate
    /// argument's host location gets its reference count bumped.
    pub fn get_argument_info(&mut self, args: &[Value], num_args: usize) -> ArgumentInfo {
        let mut ret: ArgumentInfo = std::array::from_fn(|_| Argument::new());
        for i in 0..num_args {
            let arg = args[i];
            ret[i].value = arg;
            if let Value::Inst(ref_inst) = arg {
                if let Some(loc) = self.value_location(ref_inst) {
                    self.loc_info_mut(loc).add_arg_reference();
                }
            }
        }
        ret
    }

    pub fn is_value_live(&self, inst_ref: InstRef) -> bool {
        self.value_location(inst_ref).is_some()
    }

    // -------------------------------------------------------------------
    // Use — read-only access to a value
    // -------------------------------------------------------------------

    pub fn use_gpr(&mut self, arg: &mut Argument) -> Reg {
        assert!(!arg.allocated, "Argument already allocated");
        arg.allocated = true;
        let loc = self.use_impl(arg.value, &self.gpr_order.clone());
        loc.to_reg64()
    }

    pub fn use_xmm(&mut self, arg: &mut Argument) -> Reg {
        assert!(!arg.allocated, "Argument already allocated");
        arg.allocated = true;
        let loc = self.use_impl(arg.value, &self.xmm_order.clone());
        loc.to_xmm()
    }

    pub fn use_loc(&mut self, arg: &mut Argument, host_loc: HostLoc) {
        assert!(!arg.allocated, "Argument already allocated");
        arg.allocated = true;
        self.use_impl(arg.value, &[host_loc]);
    }

    // -------------------------------------------------------------------
    // UseScratch — read+write access
    // -------------------------------------------------------------------

    pub fn use_scratch_gpr(&mut self, arg: &mut Argument) -> Reg {
        assert!(!arg.allocated, "Argument already allocated");
        arg.allocated = true;
        let loc = self.use_scratch_impl(arg.value, &self.gpr_order.clone());
        loc.to_reg64()
    }

    pub fn use_scratch_xmm(&mut self, arg: &mut Argument) -> Reg {
        assert!(!arg.allocated, "Argument already allocated");
        arg.allocated = true;
        let loc = self.use_scratch_impl(arg.value, &self.xmm_order.clone());
        loc.to_xmm()
    }

    pub fn use_scratch(&mut self, arg: &mut Argument, host_loc: HostLoc) {
        assert!(!arg.allocated, "Argument already allocated");
        arg.allocated = true;
        self.use_scratch_impl(arg.value, &[host_loc]);
    }

    // -------------------------------------------------------------------
    // Scratch — allocate a fresh register
    // -------------------------------------------------------------------

    pub fn scratch_gpr(&mut self) -> Reg {
        let loc = self.scratch_impl(&self.gpr_order.clone());
        loc.to_reg64()
    }

    pub fn scratch_xmm(&mut self) -> Reg {
        let loc = self.scratch_impl(&self.xmm_order.clone());
        loc.to_xmm()
    }

    /// Reserve a specific XMM register as scratch (XMM0 for pblendvb).
    pub fn scratch_xmm_at(&mut self, desired: HostLoc) -> Reg {
        let loc = self.scratch_impl(&[desired]);
        loc.to_xmm()
    }

    // -------------------------------------------------------------------
    // DefineValue
    // -------------------------------------------------------------------

    /// Bind an IR instruction's result to the given register.
    pub fn define_value(&mut self, inst_ref: InstRef, reg: Reg) {
        let loc = reg_to_hostloc(reg);
        self.define_value_impl(inst_ref, loc);
    }

    /// Bind an IR instruction's result to an argument's value (copy elision;
    /// used by `Identity` and index-zero element reads).
    pub fn define_value_from_arg(&mut self, inst_ref: InstRef, arg: &Argument) {
        if arg.value.is_immediate() {
            let loc = self.scratch_impl(&self.gpr_order.clone());
            self.define_value_impl(inst_ref, loc);
            self.load_immediate(arg.value, loc);
        } else if let Value::Inst(use_ref) = arg.value {
            let loc = self
                .value_location(use_ref)
                .expect("source value must already be defined");
            self.define_value_impl(inst_ref, loc);
        } else {
            panic!("define_value_from_arg on void argument");
        }
    }

    /// Release a register early (mid-emission drop of a temporary).
    pub fn release(&mut self, reg: Reg) {
        let loc = reg_to_hostloc(reg);
        self.loc_info_mut(loc).release_one();
    }

    // -------------------------------------------------------------------
    // HostCall
    // -------------------------------------------------------------------

    /// Prepare for a host function call: spill values out of caller-saved
    /// registers and treat them all as clobbered.
    ///
    /// - `result_def`: if Some, the return value (in RAX) defines this inst.
    /// - `args`: up to 4 arguments placed in ABI parameter registers.
    pub fn host_call(&mut self, result_def: Option<InstRef>, args: &mut [Option<&mut Argument>]) {
        let args_hostloc = [
            abi::ABI_PARAMS[0],
            abi::ABI_PARAMS[1],
            abi::ABI_PARAMS[2],
            abi::ABI_PARAMS[3],
        ];

        self.scratch_impl(&[abi::ABI_RETURN]);
        if let Some(inst_ref) = result_def {
            self.define_value_impl(inst_ref, abi::ABI_RETURN);
        }

        for (i, arg_opt) in args.iter_mut().enumerate() {
            if i >= 4 {
                break;
            }
            if let Some(arg) = arg_opt {
                if !arg.is_void() {
                    self.use_scratch(arg, args_hostloc[i]);

                    // Zero-extend narrow arguments per the C ABI.
                    let reg = args_hostloc[i].to_reg64();
                    match arg.get_type() {
                        Type::U1 | Type::U8 => {
                            let r32 = Reg::gpr32(reg.get_idx());
                            let r8 = Reg::gpr8(reg.get_idx());
                            self.asm.movzx(r32, r8).unwrap();
                        }
                        Type::U16 => {
                            let r32 = Reg::gpr32(reg.get_idx());
                            let r16 = Reg::gpr16(reg.get_idx());
                            self.asm.movzx(r32, r16).unwrap();
                        }
                        Type::U32 => {
                            let r32 = Reg::gpr32(reg.get_idx());
                            self.asm.mov(r32, r32).unwrap();
                        }
                        _ => {}
                    }
                }
            }
        }

        for (i, arg_opt) in args.iter().enumerate() {
            if i >= 4 {
                break;
            }
            if arg_opt.is_none() {
                self.scratch_impl(&[args_hostloc[i]]);
            }
        }

        for &loc in abi::CALLER_SAVE_GPRS {
            if loc == abi::ABI_RETURN || args_hostloc.contains(&loc) {
                continue;
            }
            if !self.loc_info(loc).is_locked() {
                self.scratch_impl(&[loc]);
            }
        }
        for &loc in abi::CALLER_SAVE_XMMS {
            if !self.loc_info(loc).is_locked() {
                self.scratch_impl(&[loc]);
            }
        }
    }

    // -------------------------------------------------------------------
    // Stack space management
    // -------------------------------------------------------------------

    pub fn alloc_stack_space(&mut self, size: usize) {
        self.reserved_stack_space += size;
        self.asm.sub_imm(RSP, size as i32).unwrap();
    }

    pub fn release_stack_space(&mut self, size: usize) {
        assert!(self.reserved_stack_space >= size);
        self.reserved_stack_space -= size;
        self.asm.add_imm(RSP, size as i32).unwrap();
    }

    // -------------------------------------------------------------------
    // End of allocation scope
    // -------------------------------------------------------------------

    /// Release all locks; called after each instruction's emission.
    pub fn end_of_alloc_scope(&mut self) {
        for info in &mut self.hostloc_info {
            info.release_all();
        }
    }

    /// Assert that no values remain live (end of block).
    pub fn assert_no_more_uses(&self) {
        for (i, info) in self.hostloc_info.iter().enumerate() {
            assert!(
                info.is_empty(),
                "HostLoc {:?} still contains values at end of block",
                index_to_hostloc(i)
            );
        }
    }

    // -------------------------------------------------------------------
    // Internal: location lookup
    // -------------------------------------------------------------------

    pub fn value_location(&self, inst_ref: InstRef) -> Option<HostLoc> {
        for (i, info) in self.hostloc_info.iter().enumerate() {
            if info.contains_value(inst_ref) {
                return Some(index_to_hostloc(i));
            }
        }
        None
    }

    fn loc_info(&self, loc: HostLoc) -> &HostLocInfo {
        &self.hostloc_info[hostloc_to_index(loc)]
    }

    fn loc_info_mut(&mut self, loc: HostLoc) -> &mut HostLocInfo {
        &mut self.hostloc_info[hostloc_to_index(loc)]
    }

    // -------------------------------------------------------------------
    // Internal: core allocation logic
    // -------------------------------------------------------------------

    fn use_impl(&mut self, use_value: Value, desired_locations: &[HostLoc]) -> HostLoc {
        if use_value.is_immediate() {
            let scratch = self.scratch_impl(desired_locations);
            return self.load_immediate(use_value, scratch);
        }

        let use_ref = match use_value {
            Value::Inst(r) => r,
            _ => panic!("use_impl on void value"),
        };

        let current_location = self
            .value_location(use_ref)
            .expect("value must already be defined");
        let max_bit_width = self.loc_info(current_location).get_max_bit_width();

        if desired_locations.contains(&current_location) {
            self.loc_info_mut(current_location).read_lock();
            return current_location;
        }

        if self.loc_info(current_location).is_locked() {
            return self.use_scratch_impl(use_value, desired_locations);
        }

        let dest = self.select_a_register(desired_locations);
        if max_bit_width > dest.bit_width() {
            return self.use_scratch_impl(use_value, desired_locations);
        }

        if can_exchange(dest, current_location) {
            self.exchange(dest, current_location);
        } else {
            self.move_out_of_the_way(dest);
            self.move_value(dest, current_location);
        }
        self.loc_info_mut(dest).read_lock();
        dest
    }

    fn use_scratch_impl(&mut self, use_value: Value, desired_locations: &[HostLoc]) -> HostLoc {
        if use_value.is_immediate() {
            let scratch = self.scratch_impl(desired_locations);
            return self.load_immediate(use_value, scratch);
        }

        let use_ref = match use_value {
            Value::Inst(r) => r,
            _ => panic!("use_scratch_impl on void value"),
        };

        let current_location = self
            .value_location(use_ref)
            .expect("value must already be defined");
        let bit_width = self.get_value_bit_width(use_ref);

        if desired_locations.contains(&current_location)
            && !self.loc_info(current_location).is_locked()
        {
            if !self.loc_info(current_location).is_last_use() {
                self.move_out_of_the_way(current_location);
            } else {
                self.loc_info_mut(current_location).set_last_use();
            }
            self.loc_info_mut(current_location).write_lock();
            return current_location;
        }

        let dest = self.select_a_register(desired_locations);
        self.move_out_of_the_way(dest);
        self.copy_to_scratch(bit_width, dest, current_location);
        self.loc_info_mut(dest).write_lock();
        dest
    }

    fn scratch_impl(&mut self, desired_locations: &[HostLoc]) -> HostLoc {
        let location = self.select_a_register(desired_locations);
        self.move_out_of_the_way(location);
        self.loc_info_mut(location).write_lock();
        location
    }

    fn define_value_impl(&mut self, inst_ref: InstRef, host_loc: HostLoc) {
        assert!(
            self.value_location(inst_ref).is_none(),
            "inst {:?} has already been defined",
            inst_ref
        );
        let (use_count, bit_width) = self.inst_info[inst_ref.index()];
        self.loc_info_mut(host_loc)
            .add_value(inst_ref, bit_width, use_count as usize);
    }

    // -------------------------------------------------------------------
    // Internal: register selection
    // -------------------------------------------------------------------

    /// Prefer unlocked, empty registers; fall back to any unlocked one.
    fn select_a_register(&self, desired_locations: &[HostLoc]) -> HostLoc {
        for &loc in desired_locations {
            if !self.loc_info(loc).is_locked() && self.loc_info(loc).is_empty() {
                return loc;
            }
        }
        for &loc in desired_locations {
            if !self.loc_info(loc).is_locked() {
                return loc;
            }
        }
        panic!("All candidate registers have already been allocated");
    }

    // -------------------------------------------------------------------
    // Internal: immediate loading
    // -------------------------------------------------------------------

    fn load_immediate(&mut self, imm: Value, host_loc: HostLoc) -> HostLoc {
        assert!(imm.is_immediate(), "load_immediate on non-immediate");

        if host_loc.is_gpr() {
            let reg = host_loc.to_reg64();
            let imm_value = imm.get_imm_as_u64();
            if imm_value == 0 {
                let r32 = Reg::gpr32(reg.get_idx());
                self.asm.xor_(r32, r32).unwrap();
            } else {
                self.asm.mov_imm(reg, imm_value as i64).unwrap();
            }
            return host_loc;
        }

        if host_loc.is_xmm() {
            let reg = host_loc.to_xmm();
            let imm_value = imm.get_imm_as_u64();
            if imm_value == 0 {
                self.asm.xorps(reg, reg).unwrap();
            } else {
                self.asm.mov_imm(RAX, imm_value as i64).unwrap();
                self.asm.movq(reg, RAX).unwrap();
            }
            return host_loc;
        }

        panic!("Cannot load an immediate into a spill slot");
    }

    // -------------------------------------------------------------------
    // Internal: move / exchange / spill
    // -------------------------------------------------------------------

    fn move_value(&mut self, to: HostLoc, from: HostLoc) {
        let bit_width = self.loc_info(from).get_max_bit_width();

        assert!(self.loc_info(to).is_empty(), "Destination must be empty");
        assert!(!self.loc_info(from).is_locked(), "Source must not be locked");
        assert!(bit_width <= to.bit_width(), "Value too wide for destination");

        if self.loc_info(from).is_empty() {
            return;
        }

        self.emit_move(bit_width, to, from);

        let from_info = std::mem::replace(
            &mut self.hostloc_info[hostloc_to_index(from)],
            HostLocInfo::new(),
        );
        self.hostloc_info[hostloc_to_index(to)] = from_info;
    }

    fn copy_to_scratch(&mut self, bit_width: usize, to: HostLoc, from: HostLoc) {
        assert!(self.loc_info(to).is_empty(), "Destination must be empty");
        assert!(!self.loc_info(from).is_empty(), "Source must not be empty");
        self.emit_move(bit_width, to, from);
    }

    fn exchange(&mut self, a: HostLoc, b: HostLoc) {
        assert!(!self.loc_info(a).is_locked() && !self.loc_info(b).is_locked());

        if self.loc_info(a).is_empty() {
            self.move_value(a, b);
            return;
        }
        if self.loc_info(b).is_empty() {
            self.move_value(b, a);
            return;
        }

        self.asm.xchg(a.to_reg64(), b.to_reg64()).unwrap();

        let idx_a = hostloc_to_index(a);
        let idx_b = hostloc_to_index(b);
        self.hostloc_info.swap(idx_a, idx_b);
    }

    fn move_out_of_the_way(&mut self, reg: HostLoc) {
        assert!(!self.loc_info(reg).is_locked(), "Cannot move a locked register");
        if !self.loc_info(reg).is_empty() {
            self.spill_register(reg);
        }
    }

    fn spill_register(&mut self, loc: HostLoc) {
        assert!(loc.is_register(), "Only registers can be spilled");
        assert!(!self.loc_info(loc).is_empty(), "Nothing to spill");
        assert!(!self.loc_info(loc).is_locked(), "Cannot spill a locked register");

        let new_loc = self.find_free_spill();
        self.move_value(new_loc, loc);
    }

    fn find_free_spill(&self) -> HostLoc {
        for i in 0..SPILL_SLOTS {
            let loc = HostLoc::Spill(i as u8);
            if self.loc_info(loc).is_empty() {
                return loc;
            }
        }
        panic!("All spill locations are full");
    }

    // -------------------------------------------------------------------
    // Internal: code emission helpers
    // -------------------------------------------------------------------

    fn emit_move(&mut self, bit_width: usize, to: HostLoc, from: HostLoc) {
        match (to, from) {
            (HostLoc::Gpr(_), HostLoc::Gpr(_)) => {
                if bit_width == 64 {
                    self.asm.mov(to.to_reg64(), from.to_reg64()).unwrap();
                } else {
                    let to32 = Reg::gpr32(to.gpr_index());
                    let from32 = Reg::gpr32(from.gpr_index());
                    self.asm.mov(to32, from32).unwrap();
                }
            }
            (HostLoc::Xmm(_), HostLoc::Xmm(_)) => {
                self.asm.movaps(to.to_xmm(), from.to_xmm()).unwrap();
            }
            (HostLoc::Xmm(_), HostLoc::Gpr(_)) => {
                if bit_width == 64 {
                    self.asm.movq(to.to_xmm(), from.to_reg64()).unwrap();
                } else {
                    self.asm
                        .movd(to.to_xmm(), Reg::gpr32(from.gpr_index()))
                        .unwrap();
                }
            }
            (HostLoc::Gpr(_), HostLoc::Xmm(_)) => {
                if bit_width == 64 {
                    self.asm.movq(to.to_reg64(), from.to_xmm()).unwrap();
                } else {
                    self.asm
                        .movd(Reg::gpr32(to.gpr_index()), from.to_xmm())
                        .unwrap();
                }
            }
            (HostLoc::Xmm(_), HostLoc::Spill(_)) => {
                let addr = self.spill_address(from);
                self.asm.movaps_load(to.to_xmm(), addr).unwrap();
            }
            (HostLoc::Spill(_), HostLoc::Xmm(_)) => {
                let addr = self.spill_address(to);
                self.asm.movaps_store(addr, from.to_xmm()).unwrap();
            }
            (HostLoc::Gpr(_), HostLoc::Spill(_)) => {
                let addr = self.spill_address(from);
                if bit_width == 64 {
                    self.asm.mov_load(to.to_reg64(), addr).unwrap();
                } else {
                    self.asm
                        .mov_load(Reg::gpr32(to.gpr_index()), addr)
                        .unwrap();
                }
            }
            (HostLoc::Spill(_), HostLoc::Gpr(_)) => {
                let addr = self.spill_address(to);
                if bit_width == 64 {
                    self.asm.mov_store(addr, from.to_reg64()).unwrap();
                } else {
                    self.asm
                        .mov_store(addr, Reg::gpr32(from.gpr_index()))
                        .unwrap();
                }
            }
            _ => panic!("Invalid emit_move: {:?} → {:?}", from, to),
        }
    }

    fn spill_address(&self, loc: HostLoc) -> Address {
        let i = match loc {
            HostLoc::Spill(i) => i as usize,
            _ => panic!("spill_address on non-spill location"),
        };
        assert!(i < SPILL_SLOTS, "Spill index out of range");
        let offset = self.reserved_stack_space + StackLayout::spill_offset(i);
        if loc.bit_width() == 128 {
            xmmword_ptr(RegExp::from(RSP) + offset as i32)
        } else {
            qword_ptr(RegExp::from(RSP) + offset as i32)
        }
    }

    fn get_value_bit_width(&self, inst_ref: InstRef) -> usize {
        self.inst_info[inst_ref.index()].1
    }
}

/// Convert an assembler Reg to a HostLoc.
fn reg_to_hostloc(reg: Reg) -> HostLoc {
    if reg.is_xmm() {
        HostLoc::Xmm(reg.get_idx())
    } else {
        HostLoc::Gpr(reg.get_idx())
    }
}

/// Only GPR↔GPR exchanges are supported.
fn can_exchange(a: HostLoc, b: HostLoc) -> bool {
    a.is_gpr() && b.is_gpr()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_asm() -> CodeAssembler {
        CodeAssembler::new(64 * 1024).unwrap()
    }

    #[test]
    fn test_hostloc_indexing_round_trip() {
        for i in 0..TOTAL_HOSTLOC_COUNT {
            let loc = index_to_hostloc(i);
            assert_eq!(hostloc_to_index(loc), i);
        }
    }

    #[test]
    fn test_hostloc_info_lifecycle() {
        let mut info = HostLocInfo::new();
        assert!(info.is_empty());
        assert!(!info.is_locked());

        info.add_value(InstRef(0), 64, 2);
        assert!(!info.is_empty());

        info.read_lock();
        assert!(info.is_locked());

        info.release_one();
        assert!(!info.is_locked());
        assert!(!info.is_empty());
    }

    #[test]
    fn test_hostloc_info_last_use_cleanup() {
        let mut info = HostLocInfo::new();
        info.add_value(InstRef(0), 64, 1);
        info.add_arg_reference();
        info.read_lock();
        info.release_one();
        assert!(info.is_empty(), "Should be empty after last use");
    }

    #[test]
    fn test_scratch_xmm_locking() {
        let mut asm = test_asm();
        let mut ra = RegAlloc::new_default(&mut asm, vec![]);
        let reg = ra.scratch_xmm();
        assert!(reg.is_xmm());
        let loc = reg_to_hostloc(reg);
        assert!(ra.loc_info(loc).is_locked());
        ra.end_of_alloc_scope();
        assert!(!ra.loc_info(loc).is_locked());
    }

    #[test]
    fn test_define_and_use_value() {
        let mut asm = test_asm();
        let inst_info = vec![(1, 128), (0, 128)];
        let mut ra = RegAlloc::new_default(&mut asm, inst_info);

        let scratch = ra.scratch_xmm();
        let loc = reg_to_hostloc(scratch);
        ra.define_value(InstRef(0), scratch);
        ra.end_of_alloc_scope();

        assert!(ra.is_value_live(InstRef(0)));
        assert_eq!(ra.value_location(InstRef(0)), Some(loc));

        let args = [Value::Inst(InstRef(0))];
        let mut arg_info = ra.get_argument_info(&args, 1);
        let used = ra.use_xmm(&mut arg_info[0]);
        assert!(used.is_xmm());
        ra.end_of_alloc_scope();

        // Last use: the value is reclaimed.
        assert!(!ra.is_value_live(InstRef(0)));
    }

    #[test]
    fn test_use_scratch_reuses_register_on_last_use() {
        let mut asm = test_asm();
        let inst_info = vec![(1, 128), (0, 128)];
        let mut ra = RegAlloc::new_default(&mut asm, inst_info);

        let scratch = ra.scratch_xmm();
        ra.define_value(InstRef(0), scratch);
        ra.end_of_alloc_scope();

        let before = asm_size(&ra);
        let args = [Value::Inst(InstRef(0))];
        let mut arg_info = ra.get_argument_info(&args, 1);
        let got = ra.use_scratch_xmm(&mut arg_info[0]);
        // Last use in a desired location: no copy is emitted.
        assert_eq!(got, scratch);
        assert_eq!(asm_size(&ra), before);
        ra.end_of_alloc_scope();
    }

    fn asm_size(ra: &RegAlloc) -> usize {
        ra.asm.size()
    }

    #[test]
    fn test_spill_and_reload() {
        let mut asm = test_asm();
        let mut inst_info = Vec::new();
        for _ in 0..ANY_XMM.len() + 1 {
            inst_info.push((2u32, 128usize));
        }
        let mut ra = RegAlloc::new_default(&mut asm, inst_info);

        let num_xmms = ANY_XMM.len();
        for i in 0..num_xmms {
            let scratch = ra.scratch_xmm();
            ra.define_value(InstRef(i as u32), scratch);
            ra.end_of_alloc_scope();
        }

        // One more forces a spill.
        let extra = ra.scratch_xmm();
        ra.define_value(InstRef(num_xmms as u32), extra);
        ra.end_of_alloc_scope();

        for i in 0..=num_xmms {
            assert!(ra.is_value_live(InstRef(i as u32)));
        }
        let spilled = (0..=num_xmms)
            .filter(|&i| matches!(ra.value_location(InstRef(i as u32)), Some(HostLoc::Spill(_))))
            .count();
        assert!(spilled > 0, "At least one value should have been spilled");
    }

    #[test]
    fn test_load_immediate_zero_emits_xor() {
        let mut asm = test_asm();
        let mut ra = RegAlloc::new_default(&mut asm, vec![]);
        let before = ra.asm.size();
        let loc = ra.scratch_impl(ANY_GPR);
        ra.load_immediate(Value::ImmU64(0), loc);
        assert!(ra.asm.size() > before);
        ra.end_of_alloc_scope();
    }

    #[test]
    fn test_host_call_clobbers_caller_saved() {
        let mut asm = test_asm();
        // One value with 2 uses so it survives the call.
        let inst_info = vec![(2, 128)];
        let mut ra = RegAlloc::new_default(&mut asm, inst_info);

        let scratch = ra.scratch_xmm();
        ra.define_value(InstRef(0), scratch);
        ra.end_of_alloc_scope();

        ra.host_call(None, &mut [None, None, None, None]);
        ra.end_of_alloc_scope();

        // The value survived the call, but no longer in an XMM.
        assert!(matches!(
            ra.value_location(InstRef(0)),
            Some(HostLoc::Spill(_))
        ));
    }
}
