//! CGC17 cube and mixing controls

use super::{Ctrl, ShadowRegs};
use crate::context::ModeLut;
use crate::regs::layout::cgc;
use crate::regs::CGC_CON_REG_MAX;

pub(super) fn encode(shadow: &mut ShadowRegs, lut: &ModeLut, clear_forced: bool) {
    // SFR layout is per channel, the DMA buffer interleaves rgb per entry
    for (i, entry) in shadow.cgc_lut.iter_mut().enumerate() {
        for (rgb, plane) in lut.cgc17_lut.iter().enumerate().take(3) {
            entry[rgb] = plane[i] as u16;
        }
    }

    let con = &lut.cgc17_con;
    for k in 0..CGC_CON_REG_MAX {
        let base = 1 + 3 * k;
        shadow.cgc_con[k] = cgc::MC_ON.pack(con[base])
            | cgc::MC_INVERSE.pack(con[base + 1])
            | cgc::MC_GAIN.pack(con[base + 2]);
    }

    let enabled = con[0] != 0;
    shadow.cgc_on.enable_if(enabled, clear_forced);
    if enabled {
        shadow.degamma_on.set_onoff(Ctrl::ON, clear_forced);
        shadow.regamma_on.set_onoff(Ctrl::ON, clear_forced);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regs::CGC_LUT_MAX;

    #[test]
    fn test_lut_is_interleaved() {
        let lut = ModeLut::new();
        let mut shadow = ShadowRegs::new();
        encode(&mut shadow, &lut, true);
        let pos = 2 * 289 + 7 * 17 + 9;
        assert_eq!(shadow.cgc_lut[pos], [512, 7 * 256, 9 * 256]);
        assert_eq!(shadow.cgc_lut.len(), CGC_LUT_MAX);
        assert!(!shadow.cgc_on.is_on());
    }

    #[test]
    fn test_control_words() {
        let mut lut = ModeLut::new();
        lut.cgc17_con = [1, 1, 0, 512, 0, 1, 100, 1, 1, 2047];
        let mut shadow = ShadowRegs::new();
        encode(&mut shadow, &lut, true);
        assert_eq!(shadow.cgc_con, [(512 << 16) | 1, (100 << 16) | 2, (2047 << 16) | 3]);
        assert!(shadow.cgc_on.is_on());
    }

    #[test]
    fn test_enable_turns_curves_on() {
        let mut lut = ModeLut::new();
        lut.cgc17_con[0] = 1;
        let mut shadow = ShadowRegs::new();
        encode(&mut shadow, &lut, true);
        assert!(shadow.degamma_on.is_on());
        assert!(shadow.regamma_on.is_on());

        // disabling leaves the curves alone
        lut.cgc17_con[0] = 0;
        encode(&mut shadow, &lut, true);
        assert!(!shadow.cgc_on.is_on());
        assert!(shadow.degamma_on.is_on());
    }
}
