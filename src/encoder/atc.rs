//! Adaptive tone control ("aps" on the debug surface)

use super::{BpcInfo, ShadowRegs};
use crate::context::ModeLut;
use crate::regs::layout::atc;

/// Inclusive `{min, max}` accepted for a non-zero tunable
#[derive(Debug, Clone, Copy)]
struct ApsRange {
    min: u32,
    max: u32,
}

impl ApsRange {
    /// Zero passes through untouched, anything else is clamped
    fn apply(self, value: u32) -> u32 {
        if value == 0 {
            0
        } else {
            value.clamp(self.min, self.max)
        }
    }
}

// 8-bit input uses the 10-bit ranges as well; the 8-bit figures are kept
// for reference only.
const TDR_MAX: [ApsRange; 2] = [ApsRange { min: 824, max: 1022 }, ApsRange { min: 206, max: 254 }];
const TDR_MIN: [ApsRange; 2] = [ApsRange { min: 1, max: 581 }, ApsRange { min: 1, max: 145 }];
const DSTEP: [ApsRange; 2] = [ApsRange { min: 1, max: 63 }, ApsRange { min: 1, max: 15 }];
const RANGE_10BIT: usize = 0;

pub(super) fn encode(shadow: &mut ShadowRegs, lut: &ModeLut, bpc: BpcInfo, clear_forced: bool) {
    let t = &lut.atc_lut;
    let s = bpc.shift(false);
    let regs = &mut shadow.atc;

    regs[0] = atc::EN.pack(t[0]) | atc::PARTIAL_UPDATE_METHOD.pack(t[1]) | atc::PIXMAP_EN.pack(t[2]);
    regs[1] = atc::LT.pack(t[3]) | atc::NS.pack(t[4]) | atc::ST.pack(t[5]);
    regs[2] = atc::PL_W1.pack(t[6]) | atc::PL_W2.pack(t[7]) | atc::LA_W_ON.pack(t[8]) | atc::LA_W.pack(t[9]);
    regs[3] = atc::CTMODE.pack(t[10]);
    regs[4] = atc::PP_EN.pack(t[11]);
    regs[5] = atc::TDR_MIN.pack(TDR_MIN[RANGE_10BIT].apply(t[12]))
        | atc::TDR_MAX.pack(TDR_MAX[RANGE_10BIT].apply(t[13]));
    regs[6] = atc::AMBIENT_LIGHT.pack(t[14]);
    regs[7] = atc::BACK_LIGHT.pack(t[15]);
    regs[8] = atc::DSTEP.pack(DSTEP[RANGE_10BIT].apply(t[16]));
    regs[9] = atc::SCALE_MODE.pack(t[17]);
    regs[10] = atc::THRESHOLD_1.pack(t[18]) | atc::THRESHOLD_2.pack(t[19]) | atc::THRESHOLD_3.pack(t[20]);
    regs[11] = atc::GAIN_LIMIT.pack(t[21] >> s) | atc::LT_CALC_AB_SHIFT.pack(t[22]);

    shadow.atc_on.enable_if(t[0] != 0, clear_forced);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regs::ATC_DSTEP_REG;
    use rstest::rstest;

    #[rstest]
    #[case(0, 0)]
    #[case(1, 824)]
    #[case(900, 900)]
    #[case(5000, 1022)]
    fn test_tdr_max_range(#[case] value: u32, #[case] expected: u32) {
        assert_eq!(TDR_MAX[RANGE_10BIT].apply(value), expected);
    }

    #[rstest]
    #[case(8)]
    #[case(10)]
    fn test_ranges_ignore_bit_depth(#[case] in_bpc: u32) {
        let mut lut = ModeLut::new();
        lut.atc_lut[0] = 1;
        lut.atc_lut[12] = 700;
        lut.atc_lut[13] = 1000;
        lut.atc_lut[16] = 100;
        let mut shadow = ShadowRegs::new();
        encode(&mut shadow, &lut, BpcInfo::new(in_bpc), true);
        assert_eq!(shadow.atc[5], (1000 << 16) | 581);
        assert_eq!(shadow.atc[ATC_DSTEP_REG], 63);
        assert!(shadow.atc_on.is_on());
    }

    #[test]
    fn test_gain_limit_shift() {
        let mut lut = ModeLut::new();
        lut.atc_lut[21] = 800;
        lut.atc_lut[22] = 2;
        let mut shadow = ShadowRegs::new();
        encode(&mut shadow, &lut, BpcInfo::new(8), true);
        assert_eq!(shadow.atc[11], (2 << 16) | 200);
        assert!(!shadow.atc_on.is_on());
    }

    #[test]
    fn test_packed_words() {
        let mut lut = ModeLut::new();
        lut.atc_lut[..12].copy_from_slice(&[1, 1, 1, 0x10, 0x20, 0x30, 3, 4, 1, 5, 2, 1]);
        let mut shadow = ShadowRegs::new();
        encode(&mut shadow, &lut, BpcInfo::new(10), true);
        assert_eq!(shadow.atc[0], 0b111);
        assert_eq!(shadow.atc[1], 0x30_20_10);
        assert_eq!(shadow.atc[2], (5 << 20) | (1 << 16) | (4 << 8) | 3);
        assert_eq!(shadow.atc[3], 2);
        assert_eq!(shadow.atc[4], 1);
    }
}
