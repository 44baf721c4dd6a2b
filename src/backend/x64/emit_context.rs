use crate::backend::x64::host_feature::HostFeature;
use crate::backend::x64::jit_state::JitState;

/// Per-block emission context.
///
/// Carries everything a vector emitter consults besides the register
/// allocator: the host feature set lowering decisions multiplex on, the
/// guest-state layout, and the exit-stub target for the block terminal.
pub struct EmitContext {
    /// Host CPU features; fixed for the lifetime of the emitter.
    pub features: HostFeature,
    /// Byte offset of `fpsr_qc` within the guest state record (base R15).
    pub fpsr_qc_offset: i32,
    /// Code-buffer offset of the exit stub. `None` emits a plain `ret`,
    /// which is only meaningful for non-executing inspection.
    pub exit_offset: Option<usize>,
}

impl EmitContext {
    pub fn new(features: HostFeature, exit_offset: Option<usize>) -> Self {
        Self {
            features,
            fpsr_qc_offset: JitState::offset_of_fpsr_qc() as i32,
            exit_offset,
        }
    }

    /// True when every feature in `wanted` is available.
    pub fn has(&self, wanted: HostFeature) -> bool {
        self.features.has(wanted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_feature_query() {
        let ctx = EmitContext::new(HostFeature::SSSE3 | HostFeature::SSE41, None);
        assert!(ctx.has(HostFeature::SSSE3));
        assert!(!ctx.has(HostFeature::SSE42));
        assert_eq!(ctx.fpsr_qc_offset, 512);
    }
}
