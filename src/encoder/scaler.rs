//! Post scaler polyphase coefficients

use super::ShadowRegs;
use crate::context::ModeLut;
use crate::regs::layout::scl;
use crate::regs::{SCL_COEF_CNT, SCL_COEF_MAX, SCL_COEF_SET, SCL_HCOEF_MAX, SCL_REG_MAX, SCL_VCOEF_MAX};

/// Built-in 8-tap horizontal filter, `[phase][tap]`
pub const SCL_H_COEF_8T: [[i16; SCL_HCOEF_MAX]; SCL_COEF_SET] = [
    [0, 0, 0, 512, 0, 0, 0, 0],
    [-2, 8, -25, 509, 30, -9, 2, -1],
    [-4, 14, -46, 499, 64, -19, 5, -1],
    [-5, 20, -62, 482, 101, -30, 8, -2],
    [-6, 23, -73, 458, 142, -41, 12, -3],
    [-6, 25, -80, 429, 185, -53, 15, -3],
    [-6, 26, -83, 395, 228, -63, 19, -4],
    [-6, 25, -82, 357, 273, -71, 21, -5],
    [-5, 23, -78, 316, 316, -78, 23, -5],
    [-5, 21, -71, 273, 357, -82, 25, -6],
    [-4, 19, -63, 228, 395, -83, 26, -6],
    [-3, 15, -53, 185, 429, -80, 25, -6],
    [-3, 12, -41, 142, 458, -73, 23, -6],
    [-2, 8, -30, 101, 482, -62, 20, -5],
    [-1, 5, -19, 64, 499, -46, 14, -4],
    [-1, 2, -9, 30, 509, -25, 8, -2],
];

/// Built-in 4-tap vertical filter, `[phase][tap]`
pub const SCL_V_COEF_4T: [[i16; SCL_VCOEF_MAX]; SCL_COEF_SET] = [
    [0, 512, 0, 0],
    [-15, 508, 20, -1],
    [-25, 495, 45, -3],
    [-31, 473, 75, -5],
    [-33, 443, 110, -8],
    [-33, 408, 148, -11],
    [-31, 367, 190, -14],
    [-27, 324, 234, -19],
    [-23, 279, 279, -23],
    [-19, 234, 324, -27],
    [-14, 190, 367, -31],
    [-11, 148, 408, -33],
    [-8, 110, 443, -33],
    [-5, 75, 473, -31],
    [-3, 45, 495, -25],
    [-1, 20, 508, -15],
];

/// Coefficient table in register order: vertical taps then horizontal taps,
/// each tap listing its 16 phases. An enabled override replaces phase 0 of
/// every tap.
fn coefficients(scl_input: &[u32]) -> [u32; SCL_REG_MAX] {
    let mut table = [0u32; SCL_REG_MAX];
    let mut idx = 0;
    for _ in 0..SCL_COEF_CNT {
        for tap in 0..SCL_VCOEF_MAX {
            for phase in SCL_V_COEF_4T.iter() {
                table[idx] = phase[tap] as i32 as u32;
                idx += 1;
            }
        }
        for tap in 0..SCL_HCOEF_MAX {
            for phase in SCL_H_COEF_8T.iter() {
                table[idx] = phase[tap] as i32 as u32;
                idx += 1;
            }
        }
    }

    if scl_input[0] != 0 {
        for (slot, &value) in table.iter_mut().step_by(SCL_COEF_SET).zip(&scl_input[1..=SCL_COEF_MAX]) {
            *slot = value;
        }
    }
    table
}

pub(super) fn encode(shadow: &mut ShadowRegs, lut: &ModeLut, clear_forced: bool) {
    let table = coefficients(&lut.scl_input);
    for (reg, value) in shadow.scl.iter_mut().zip(table) {
        *reg = scl::COEF.pack(value);
    }
    shadow.scl_on.enable_if(lut.scl_input[0] != 0, clear_forced);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phases_sum_to_unity() {
        for phase in SCL_H_COEF_8T.iter() {
            assert_eq!(phase.iter().map(|&c| c as i32).sum::<i32>(), 512);
        }
        for phase in SCL_V_COEF_4T.iter() {
            assert_eq!(phase.iter().map(|&c| c as i32).sum::<i32>(), 512);
        }
    }

    #[test]
    fn test_builtin_layout() {
        let mut shadow = ShadowRegs::new();
        encode(&mut shadow, &ModeLut::new(), true);
        // vertical tap 0, phase 1
        assert_eq!(shadow.scl[1], (-15i32 as u32) & 0xfff);
        // vertical tap 1, phase 0
        assert_eq!(shadow.scl[16], 512);
        // horizontal tap 3, phase 8
        assert_eq!(shadow.scl[64 + 3 * 16 + 8], 316);
        assert!(!shadow.scl_on.is_on());
    }

    #[test]
    fn test_override_replaces_phase_zero() {
        let mut lut = ModeLut::new();
        lut.scl_input[0] = 1;
        for (i, v) in lut.scl_input[1..].iter_mut().enumerate() {
            *v = 100 + i as u32;
        }
        let mut shadow = ShadowRegs::new();
        encode(&mut shadow, &lut, true);
        for tap in 0..SCL_COEF_MAX {
            assert_eq!(shadow.scl[tap * SCL_COEF_SET], 100 + tap as u32);
        }
        assert_eq!(shadow.scl[1], (-15i32 as u32) & 0xfff);
        assert!(shadow.scl_on.is_on());
    }
}
