//! Gamma matrix and the degamma/regamma curves

use super::{BpcInfo, ShadowRegs};
use crate::context::ModeLut;
use crate::regs::layout::{curve, gamma_matrix as gm};
use crate::regs::{DEGAMMA_LUT_CNT, REGAMMA_LUT_CNT};

/// Right shift turning matrix coefficients into register precision
const COEFF_SHIFT: u32 = 5;
/// Right shift turning offsets into 10-bit register precision
const OFFSET_SHIFT: u32 = 6;
/// Largest 10-bit offset magnitude
const OFFSET_BOUND: i32 = 1023;

/// The transferred 4x4 matrix
///
/// ```text
/// |A B C D|
/// |E F G H|
/// |I J K L|
/// |M N O P|
/// ```
///
/// is applied as `out = [A E I; B F J; C G K] * in + [M N O]`, so the
/// register order below walks the columns.
pub(super) fn encode_matrix(shadow: &mut ShadowRegs, lut: &ModeLut, bpc: BpcInfo, clear_forced: bool) {
    let m = &lut.gamma_matrix;
    let shift = bpc.shift(false);

    let mut v = [0u32; 17];
    v[0] = m[0] as u32;
    for i in 1..=12 {
        v[i] = (m[i] >> COEFF_SHIFT) as u32;
    }
    let bound = OFFSET_BOUND >> shift;
    for i in 13..=16 {
        v[i] = (m[i] >> (OFFSET_SHIFT + shift)).clamp(-bound, bound) as u32;
    }

    let regs = &mut shadow.gamma_matrix;
    regs[0] = gm::EN.pack(v[0]);
    regs[1] = gm::COEFF_H.pack(v[5]) | gm::COEFF_L.pack(v[1]);
    regs[2] = gm::COEFF_H.pack(v[2]) | gm::COEFF_L.pack(v[9]);
    regs[3] = gm::COEFF_H.pack(v[10]) | gm::COEFF_L.pack(v[6]);
    regs[4] = gm::COEFF_H.pack(v[7]) | gm::COEFF_L.pack(v[3]);
    regs[5] = gm::COEFF_L.pack(v[11]);
    regs[6] = gm::OFFSET_1.pack(v[14]) | gm::OFFSET_0.pack(v[13]);
    regs[7] = gm::OFFSET_2.pack(v[15]);

    shadow.gamma_matrix_on.enable_if(m[0] != 0, clear_forced);
}

/// Pack `table` (enable first) two samples per register.
///
/// With an odd segment length the last sample of each segment gets a
/// register of its own.
fn pack_curve(regs: &mut [u32], table: &[u32], cnt: usize, shift: u32) {
    regs[0] = curve::EN.pack(table[0]);
    let samples = &table[1..];
    let mut idx = 0;
    for reg in regs.iter_mut().skip(1) {
        let lo = curve::LUT_L.pack(samples[idx] >> shift);
        idx += 1;
        let mut hi = 0;
        if cnt % 2 == 0 || idx % cnt != 0 {
            hi = curve::LUT_H.pack(samples[idx] >> shift);
            idx += 1;
        }
        *reg = hi | lo;
    }
}

pub(super) fn encode_degamma(shadow: &mut ShadowRegs, lut: &ModeLut, bpc: BpcInfo, clear_forced: bool) {
    let ext = lut.degamma_lut_ext != 0;
    let table = &lut.degamma_lut[bpc.table(ext).index()];
    pack_curve(&mut shadow.degamma_lut, table, DEGAMMA_LUT_CNT, bpc.shift(ext));
    shadow.degamma_on.enable_if(table[0] != 0, clear_forced);
}

pub(super) fn encode_regamma(shadow: &mut ShadowRegs, lut: &ModeLut, bpc: BpcInfo, clear_forced: bool) {
    let ext = lut.regamma_lut_ext != 0;
    let table = &lut.regamma_lut[bpc.table(ext).index()];
    pack_curve(&mut shadow.regamma_lut, table, REGAMMA_LUT_CNT, bpc.shift(ext));
    shadow.regamma_on.enable_if(table[0] != 0, clear_forced);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::BpcType;
    use crate::regs::{DEGAMMA_LUT_MAX, DEGAMMA_REG_MAX, REGAMMA_REG_MAX};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_matrix_identity() {
        let mut lut = ModeLut::new();
        lut.gamma_matrix = [1, 1 << 15, 0, 0, 0, 0, 1 << 15, 0, 0, 0, 0, 1 << 15, 0, 0, 0, 0, 0];
        let mut shadow = ShadowRegs::new();
        encode_matrix(&mut shadow, &lut, BpcInfo::new(10), true);

        let one = 1u32 << 10;
        assert_eq!(shadow.gamma_matrix[0], 1);
        // the diagonal lands in the low halves of regs 1, 3 and 5
        assert_eq!(shadow.gamma_matrix[1], one);
        assert_eq!(shadow.gamma_matrix[2], 0);
        assert_eq!(shadow.gamma_matrix[3], one);
        assert_eq!(shadow.gamma_matrix[5], one);
        assert!(shadow.gamma_matrix_on.is_on());
    }

    #[test]
    fn test_matrix_negative_coefficient_is_masked() {
        let mut lut = ModeLut::new();
        lut.gamma_matrix[0] = 1;
        lut.gamma_matrix[5] = -64;
        let mut shadow = ShadowRegs::new();
        encode_matrix(&mut shadow, &lut, BpcInfo::new(10), true);
        assert_eq!(shadow.gamma_matrix[1] >> 16, 0x7fe);
    }

    #[test]
    fn test_matrix_offsets_clamp() {
        let mut lut = ModeLut::new();
        lut.gamma_matrix[0] = 1;
        lut.gamma_matrix[13] = 1 << 20;
        lut.gamma_matrix[14] = -(1 << 20);
        lut.gamma_matrix[15] = 64 * 100;

        let mut shadow = ShadowRegs::new();
        encode_matrix(&mut shadow, &lut, BpcInfo::new(10), true);
        assert_eq!(shadow.gamma_matrix[6] & 0x7ff, 1023);
        assert_eq!(shadow.gamma_matrix[6] >> 16, (-1023i32 as u32) & 0x7ff);
        assert_eq!(shadow.gamma_matrix[7], 100);

        encode_matrix(&mut shadow, &lut, BpcInfo::new(8), true);
        assert_eq!(shadow.gamma_matrix[6] & 0x7ff, 255);
        assert_eq!(shadow.gamma_matrix[7], 25);
    }

    #[test]
    fn test_degamma_packs_odd_segments() {
        let mut lut = ModeLut::new();
        let table = &mut lut.degamma_lut[BpcType::Bpc10.index()];
        table[0] = 1;
        for (i, v) in table.iter_mut().enumerate().skip(1) {
            *v = i as u32;
        }
        let mut shadow = ShadowRegs::new();
        encode_degamma(&mut shadow, &lut, BpcInfo::new(10), true);

        let regs = &shadow.degamma_lut;
        assert_eq!(regs.len(), DEGAMMA_REG_MAX);
        assert_eq!(regs[0], 1);
        assert_eq!(regs[1], (2 << 16) | 1);
        // sample 33 closes segment 0 alone
        assert_eq!(regs[17], 33);
        assert_eq!(regs[18], (35 << 16) | 34);
        assert_eq!(regs[DEGAMMA_REG_MAX - 1], (DEGAMMA_LUT_MAX - 1) as u32);
        assert!(shadow.degamma_on.is_on());
    }

    #[test]
    fn test_regamma_shift_for_8bit() {
        let mut lut = ModeLut::new();
        lut.regamma_lut[BpcType::Bpc10.index()][0] = 1;
        lut.regamma_lut[BpcType::Bpc10.index()][2] = 400;
        let mut shadow = ShadowRegs::new();
        encode_regamma(&mut shadow, &lut, BpcInfo::new(8), true);
        assert_eq!(shadow.regamma_lut.len(), REGAMMA_REG_MAX);
        assert_eq!(shadow.regamma_lut[1] >> 16, 100);
    }

    #[test]
    fn test_regamma_ext_table_unshifted() {
        let mut lut = ModeLut::new();
        lut.regamma_lut_ext = 1;
        lut.regamma_lut[BpcType::Bpc8.index()][0] = 1;
        lut.regamma_lut[BpcType::Bpc8.index()][1] = 200;
        let mut shadow = ShadowRegs::new();
        encode_regamma(&mut shadow, &lut, BpcInfo::new(8), true);
        assert_eq!(shadow.regamma_lut[1] & 0x1fff, 200);

        // 10-bit input ignores the dedicated table
        encode_regamma(&mut shadow, &lut, BpcInfo::new(10), true);
        assert!(!shadow.regamma_on.is_on());
    }
}
