use bitflags::bitflags;

bitflags! {
    /// Host CPU features the vector emitters multiplex on.
    ///
    /// The set is fixed at emitter construction; every lowering decision is
    /// static per emission. Arbitrary subsets are constructible so tests can
    /// force a specific path.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HostFeature: u32 {
        const SSE3 = 1 << 0;
        const SSSE3 = 1 << 1;
        const SSE41 = 1 << 2;
        const SSE42 = 1 << 3;
        const AVX = 1 << 4;
        const AVX2 = 1 << 5;
        const AVX512F = 1 << 6;
        const AVX512VL = 1 << 7;
        const AVX512BW = 1 << 8;
        const AVX512DQ = 1 << 9;
        const AVX512BITALG = 1 << 10;
    }
}

impl HostFeature {
    /// Query the host via CPUID. SSE2 is assumed: it is part of the x86-64
    /// baseline.
    #[cfg(target_arch = "x86_64")]
    pub fn detect() -> HostFeature {
        let mut features = HostFeature::empty();
        if std::arch::is_x86_feature_detected!("sse3") {
            features |= HostFeature::SSE3;
        }
        if std::arch::is_x86_feature_detected!("ssse3") {
            features |= HostFeature::SSSE3;
        }
        if std::arch::is_x86_feature_detected!("sse4.1") {
            features |= HostFeature::SSE41;
        }
        if std::arch::is_x86_feature_detected!("sse4.2") {
            features |= HostFeature::SSE42;
        }
        if std::arch::is_x86_feature_detected!("avx") {
            features |= HostFeature::AVX;
        }
        if std::arch::is_x86_feature_detected!("avx2") {
            features |= HostFeature::AVX2;
        }
        if std::arch::is_x86_feature_detected!("avx512f") {
            features |= HostFeature::AVX512F;
        }
        if std::arch::is_x86_feature_detected!("avx512vl") {
            features |= HostFeature::AVX512VL;
        }
        if std::arch::is_x86_feature_detected!("avx512bw") {
            features |= HostFeature::AVX512BW;
        }
        if std::arch::is_x86_feature_detected!("avx512dq") {
            features |= HostFeature::AVX512DQ;
        }
        if std::arch::is_x86_feature_detected!("avx512bitalg") {
            features |= HostFeature::AVX512BITALG;
        }
        features
    }

    #[cfg(not(target_arch = "x86_64"))]
    pub fn detect() -> HostFeature {
        HostFeature::empty()
    }

    /// True when every feature in `wanted` is present.
    pub fn has(self, wanted: HostFeature) -> bool {
        self.contains(wanted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_subsets() {
        let f = HostFeature::SSSE3 | HostFeature::SSE41;
        assert!(f.has(HostFeature::SSSE3));
        assert!(f.has(HostFeature::SSSE3 | HostFeature::SSE41));
        assert!(!f.has(HostFeature::SSE42));
        assert!(HostFeature::empty().has(HostFeature::empty()));
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn test_detect_is_monotone() {
        // A host with SSE4.2 always has SSE4.1 and SSSE3; catching wiring
        // mistakes in the CPUID mapping.
        let f = HostFeature::detect();
        if f.has(HostFeature::SSE42) {
            assert!(f.has(HostFeature::SSE41));
        }
        if f.has(HostFeature::SSE41) {
            assert!(f.has(HostFeature::SSSE3));
        }
    }
}
