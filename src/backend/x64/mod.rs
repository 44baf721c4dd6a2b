pub mod abi;
pub mod assembler;
pub mod block_of_code;
pub mod constant_pool;
pub mod emit;
pub mod emit_context;
pub mod emit_vector_arrangement;
pub mod emit_vector_basic;
pub mod emit_vector_compare;
pub mod emit_vector_halving;
pub mod emit_vector_helpers;
pub mod emit_vector_minmax;
pub mod emit_vector_misc;
pub mod emit_vector_multiply;
pub mod emit_vector_paired;
pub mod emit_vector_saturated;
pub mod emit_vector_shift;
pub mod host_feature;
pub mod hostloc;
pub mod jit_state;
pub mod reg_alloc;
pub mod stack_layout;
