//! Display and CGC dither

use super::ShadowRegs;
use crate::context::ModeLut;
use crate::regs::layout::{cgc_dither, disp_dither};

pub(super) fn encode_disp(shadow: &mut ShadowRegs, lut: &ModeLut, clear_forced: bool) {
    let t = &lut.disp_dither;

    shadow.disp_dither = disp_dither::EN.pack(t[0])
        | disp_dither::MODE.pack(t[1])
        | disp_dither::FRAME_CON.pack(t[2])
        | disp_dither::FRAME_OFFSET.pack(t[3])
        | disp_dither::table_sel(0).pack(t[4])
        | disp_dither::table_sel(1).pack(t[5])
        | disp_dither::table_sel(2).pack(t[6]);

    shadow.disp_dither_on.enable_if(t[0] != 0, clear_forced);
}

pub(super) fn encode_cgc(shadow: &mut ShadowRegs, lut: &ModeLut, clear_forced: bool) {
    let t = &lut.cgc_dither;

    shadow.cgc_dither = cgc_dither::EN.pack(t[0])
        | cgc_dither::MODE.pack(t[1])
        | cgc_dither::FRAME_CON.pack(t[2])
        | cgc_dither::table_sel(0).pack(t[3])
        | cgc_dither::table_sel(1).pack(t[4])
        | cgc_dither::table_sel(2).pack(t[5])
        | cgc_dither::BIT.pack(t[6])
        | cgc_dither::FRAME_OFFSET.pack(t[7]);

    shadow.cgc_dither_on.enable_if(t[0] != 0, clear_forced);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disp_dither_fields() {
        let mut lut = ModeLut::new();
        lut.disp_dither = [1, 1, 0, 3, 1, 0, 1];
        let mut shadow = ShadowRegs::new();
        encode_disp(&mut shadow, &lut, true);
        assert_eq!(shadow.disp_dither, 0b1_0_1_11_0_1_1);
        assert!(shadow.disp_dither_on.is_on());
    }

    #[test]
    fn test_cgc_dither_fields() {
        let mut lut = ModeLut::new();
        lut.cgc_dither = [1, 0, 1, 0, 1, 0, 1, 2];
        let mut shadow = ShadowRegs::new();
        encode_cgc(&mut shadow, &lut, true);
        assert_eq!(shadow.cgc_dither, (1 << 8) | (1 << 6) | (2 << 3) | (1 << 2) | 1);
        assert!(shadow.cgc_dither_on.is_on());
    }

    #[test]
    fn test_zero_enable_turns_off() {
        let mut shadow = ShadowRegs::new();
        shadow.cgc_dither_on.set_onoff(crate::encoder::Ctrl::ON, true);
        encode_cgc(&mut shadow, &ModeLut::new(), true);
        assert_eq!(shadow.cgc_dither, 0);
        assert!(!shadow.cgc_dither_on.is_on());
    }
}
