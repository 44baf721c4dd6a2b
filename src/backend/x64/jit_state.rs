/// Guest CPU state visible to emitted vector code.
///
/// R15 points at this struct while emitted code runs. Only the pieces the
/// vector layer touches are modelled: the 128-bit vector register file and
/// the sticky FPSR.QC saturation accumulator.
#[repr(C, align(16))]
pub struct JitState {
    /// Vector registers v0-v31 (stored as 64 × u64 = 32 × 128-bit).
    pub vec: [u64; 64],
    /// FPSR.QC sticky saturation flag. Emitted code only ever ORs into
    /// this; clearing it is the runtime's responsibility.
    pub fpsr_qc: u32,
    _pad: [u32; 3],
}

impl JitState {
    pub fn new() -> Self {
        Self {
            vec: [0; 64],
            fpsr_qc: 0,
            _pad: [0; 3],
        }
    }

    pub const fn offset_of_vec(index: usize) -> usize {
        core::mem::offset_of!(JitState, vec) + index * 16
    }

    pub const fn offset_of_fpsr_qc() -> usize {
        core::mem::offset_of!(JitState, fpsr_qc)
    }

    /// Read vector register `index` as a 16-byte little-endian array.
    pub fn get_vec(&self, index: usize) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[..8].copy_from_slice(&self.vec[index * 2].to_le_bytes());
        out[8..].copy_from_slice(&self.vec[index * 2 + 1].to_le_bytes());
        out
    }

    /// Write vector register `index` from a 16-byte little-endian array.
    pub fn set_vec(&mut self, index: usize, bytes: [u8; 16]) {
        self.vec[index * 2] = u64::from_le_bytes(bytes[..8].try_into().unwrap());
        self.vec[index * 2 + 1] = u64::from_le_bytes(bytes[8..].try_into().unwrap());
    }
}

impl Default for JitState {
    fn default() -> Self {
        Self::new()
    }
}
