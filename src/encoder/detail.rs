//! Detail enhancement

use super::ShadowRegs;
use crate::context::ModeLut;
use crate::regs::layout::de;

pub(super) fn encode(shadow: &mut ShadowRegs, lut: &ModeLut, clear_forced: bool) {
    let t = &lut.de_lut;
    let regs = &mut shadow.de;

    regs[0] = de::EN.pack(t[0])
        | de::ROI_EN.pack(t[1])
        | de::ROI_IN.pack(t[2])
        | de::SMOOTH_EN.pack(t[3])
        | de::FILTER_TYPE.pack(t[4])
        | de::BRATIO_SMOOTH.pack(t[5]);
    // ROI start, then ROI end
    regs[1] = de::ROI_X.pack(t[6]) | de::ROI_Y.pack(t[7]);
    regs[2] = de::ROI_X.pack(t[8]) | de::ROI_Y.pack(t[9]);
    regs[3] = de::FLAT_EDGE_TH.pack(t[10]) | de::EDGE_BALANCE_TH.pack(t[11]);
    regs[4] = de::PLUS_CLIP.pack(t[12]) | de::MINUS_CLIP.pack(t[13]);
    regs[5] = de::GAIN.pack(t[14])
        | de::LUMA_DEGAIN_TH.pack(t[15])
        | de::FLAT_DEGAIN_FLAG.pack(t[16])
        | de::FLAT_DEGAIN_SHIFT.pack(t[17])
        | de::MAX_LUMINANCE.pack(t[18]);

    shadow.de_on.enable_if(t[0] != 0, clear_forced);
}
