//! x86-64 vector instruction lowering for a dynamic binary translator.
//!
//! The crate consumes architecture-neutral 128-bit SIMD micro-operations
//! ([`ir`]) and emits native x86-64 machine code realising the same
//! bit-exact semantics on the host XMM register file ([`backend::x64`]),
//! selecting per-opcode between SSE2..AVX-512 lowerings and scalar
//! fallbacks based on the host CPU's feature set.

pub mod backend;
pub mod ir;
