//! Hue/saturation/contrast

use super::{BpcInfo, ShadowRegs};
use crate::context::{ModeLut, HSC_LUT_MAX};
use crate::regs::layout::hsc;
use crate::regs::{HSC_LCG_NUM, HSC_LUT_LSC_GAIN_MAX};

/// Table slot of the first S-curve polynomial value
const POLY_S: usize = 57;
/// Table slot of the first B-curve polynomial value
const POLY_B: usize = 66;
/// Values per polynomial curve
const POLY_LEN: usize = 9;
/// Table slot of the first multi-color region
const MC_BASE: usize = 22;
/// Table values per multi-color region
const MC_STRIDE: usize = 10;

pub(super) fn encode(shadow: &mut ShadowRegs, lut: &ModeLut, bpc: BpcInfo, clear_forced: bool) {
    let t = &lut.hsc48_lut;
    let s = bpc.shift(false);
    let con = &mut shadow.hsc_con;

    con[0] = hsc::EN.pack(t[0]) | hsc::PARTIAL_UPDATE_METHOD.pack(t[1]);
    con[1] = hsc::LSC_ON.pack(t[2])
        | hsc::LSC_GROUPMODE.pack(t[3])
        | hsc::LHC_ON.pack(t[4])
        | hsc::LHC_GROUPMODE.pack(t[5])
        | hsc::LBC_ON.pack(t[6])
        | hsc::LBC_GROUPMODE.pack(t[7]);

    // global hue, saturation, brightness
    for (k, reg) in con[2..5].iter_mut().enumerate() {
        let on = 8 + 2 * k;
        *reg = hsc::GLOBAL_ON.pack(t[on]) | hsc::GLOBAL_GAIN.pack(t[on + 1] >> s);
    }

    // alpha for saturation then brightness
    for (k, reg) in con[5..7].iter_mut().enumerate() {
        let b = 14 + 4 * k;
        *reg = hsc::ALPHA_ON.pack(t[b])
            | hsc::ALPHA_SCALE.pack(t[b + 1])
            | hsc::ALPHA_SHIFT1.pack(t[b + 2] >> s)
            | hsc::ALPHA_SHIFT2.pack(t[b + 3]);
    }

    for (region, regs) in con[7..19].chunks_exact_mut(4).enumerate() {
        let b = MC_BASE + MC_STRIDE * region;
        regs[0] = hsc::MC_ON.pack(t[b])
            | hsc::MC_BC_HUE.pack(t[b + 1])
            | hsc::MC_BC_SAT.pack(t[b + 2])
            | hsc::MC_SAT_GAIN.pack(t[b + 3] >> s);
        regs[1] = hsc::MC_HUE_GAIN.pack(t[b + 4] >> s) | hsc::MC_BRI_GAIN.pack(t[b + 5] >> s);
        regs[2] = hsc::MC_S1.pack(t[b + 6] >> s) | hsc::MC_S2.pack(t[b + 7] >> s);
        regs[3] = hsc::MC_H1.pack(t[b + 8] >> s) | hsc::MC_H2.pack(t[b + 9] >> s);
    }

    con[19] = hsc::YCOMP_ON.pack(t[52])
        | hsc::YCOMP_DITH_ON.pack(t[53])
        | hsc::BLEND_ON.pack(t[54])
        | hsc::YCOMP_GAIN.pack(t[55])
        | hsc::BLEND_MANUAL_GAIN.pack(t[56]);

    // each curve: four pairs then a lone tail value
    for (curve, regs) in [POLY_S, POLY_B].into_iter().zip(shadow.hsc_poly.chunks_exact_mut(5)) {
        let values = &t[curve..curve + POLY_LEN];
        for (reg, pair) in regs.iter_mut().zip(values.chunks(2)) {
            *reg = hsc::POLY_L.pack(pair[0] >> s);
            if let Some(high) = pair.get(1) {
                *reg |= hsc::POLY_H.pack(high >> s);
            }
        }
    }

    let gains: Vec<u32> = lut.hsc48_lcg.iter().flatten().copied().collect();
    debug_assert_eq!(gains.len(), HSC_LCG_NUM * HSC_LUT_LSC_GAIN_MAX);
    for (reg, pair) in shadow.hsc_gain.iter_mut().zip(gains.chunks_exact(2)) {
        *reg = hsc::GAIN_L.pack(pair[0] >> s) | hsc::GAIN_H.pack(pair[1] >> s);
    }

    shadow.hsc_on.enable_if(t[0] != 0, clear_forced);
}

const _: () = assert!(POLY_B + POLY_LEN == HSC_LUT_MAX);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regs::HSC_REG_GAIN_MAX;

    fn encoded(lut: &ModeLut, in_bpc: u32) -> ShadowRegs {
        let mut shadow = ShadowRegs::new();
        encode(&mut shadow, lut, BpcInfo::new(in_bpc), true);
        shadow
    }

    #[test]
    fn test_control_word() {
        let mut lut = ModeLut::new();
        lut.hsc48_lut[0] = 1;
        lut.hsc48_lut[1] = 1;
        let shadow = encoded(&lut, 10);
        assert_eq!(shadow.hsc_con[0], 0b11);
        assert!(shadow.hsc_on.is_on());
    }

    #[test]
    fn test_global_gains_shift_on_8bit() {
        let mut lut = ModeLut::new();
        lut.hsc48_lut[10] = 1;
        lut.hsc48_lut[11] = 400;
        assert_eq!(encoded(&lut, 10).hsc_con[3], (400 << 16) | 1);
        assert_eq!(encoded(&lut, 8).hsc_con[3], (100 << 16) | 1);
    }

    #[test]
    fn test_multicolor_regions() {
        let mut lut = ModeLut::new();
        // region 2, hue gain and bri gain
        lut.hsc48_lut[46] = 5;
        lut.hsc48_lut[47] = 6;
        let shadow = encoded(&lut, 10);
        assert_eq!(shadow.hsc_con[16], (6 << 16) | 5);
        assert_eq!(shadow.hsc_con[12], 0);
    }

    #[test]
    fn test_poly_tail_alone() {
        let mut lut = ModeLut::new();
        for (i, v) in lut.hsc48_lut[POLY_S..].iter_mut().enumerate() {
            *v = 10 + i as u32;
        }
        let shadow = encoded(&lut, 10);
        assert_eq!(shadow.hsc_poly[0], (11 << 16) | 10);
        assert_eq!(shadow.hsc_poly[4], 18);
        assert_eq!(shadow.hsc_poly[5], (20 << 16) | 19);
        assert_eq!(shadow.hsc_poly[9], 27);
    }

    #[test]
    fn test_gains_span_all_lcg_tables() {
        let mut lut = ModeLut::new();
        lut.hsc48_lcg[0][0] = 1;
        lut.hsc48_lcg[0][1] = 2;
        lut.hsc48_lcg[1][0] = 3;
        lut.hsc48_lcg[2][71] = 4;
        let shadow = encoded(&lut, 10);
        assert_eq!(shadow.hsc_gain[0], (2 << 16) | 1);
        assert_eq!(shadow.hsc_gain[36], 3);
        assert_eq!(shadow.hsc_gain[HSC_REG_GAIN_MAX - 1], 4 << 16);
    }
}
