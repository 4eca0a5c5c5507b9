//! Per-register bit-field layouts
//!
//! Each block's fields are listed as `Field { shift, width }` constants in
//! register order. The encoders only ever compose registers from these.

/// One bit field inside a 32-bit register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Bit offset of the least significant bit
    pub shift: u32,
    /// Field width in bits
    pub width: u32,
}

impl Field {
    /// Field at `shift` spanning `width` bits
    pub const fn new(shift: u32, width: u32) -> Self {
        Self { shift, width }
    }

    /// Unshifted value mask
    pub const fn mask(&self) -> u32 {
        if self.width >= 32 {
            u32::MAX
        } else {
            (1u32 << self.width) - 1
        }
    }

    /// Range-mask `value` and move it into position
    pub const fn pack(&self, value: u32) -> u32 {
        (value & self.mask()) << self.shift
    }

    /// Extract the field from a register word
    pub const fn extract(&self, reg: u32) -> u32 {
        (reg >> self.shift) & self.mask()
    }
}

/// Generic enable bit in register 0 of most blocks
pub const EN: Field = Field::new(0, 1);

/// DQE_DISP_DITHER
pub mod disp_dither {
    use super::Field;

    pub const EN: Field = Field::new(0, 1);
    pub const MODE: Field = Field::new(1, 1);
    pub const FRAME_CON: Field = Field::new(2, 1);
    pub const FRAME_OFFSET: Field = Field::new(3, 2);

    /// Table select bit `n` (0..=2)
    pub const fn table_sel(n: u32) -> Field {
        Field::new(5 + n, 1)
    }
}

/// DQE_CGC_DITHER
pub mod cgc_dither {
    use super::Field;

    pub const EN: Field = Field::new(0, 1);
    pub const MODE: Field = Field::new(1, 1);
    pub const FRAME_CON: Field = Field::new(2, 1);
    pub const FRAME_OFFSET: Field = Field::new(3, 2);
    pub const BIT: Field = Field::new(8, 1);

    /// Table select bit `n` (0..=2)
    pub const fn table_sel(n: u32) -> Field {
        Field::new(5 + n, 1)
    }
}

/// DQE_GAMMA_MATRIX
pub mod gamma_matrix {
    use super::Field;

    pub const EN: Field = Field::new(0, 1);
    pub const COEFF_L: Field = Field::new(0, 11);
    pub const COEFF_H: Field = Field::new(16, 11);
    pub const OFFSET_0: Field = Field::new(0, 11);
    pub const OFFSET_1: Field = Field::new(16, 11);
    pub const OFFSET_2: Field = Field::new(0, 11);
}

/// DQE_DEGAMMA and DQE_REGAMMA share the two-sample layout
pub mod curve {
    use super::Field;

    pub const EN: Field = Field::new(0, 1);
    pub const LUT_L: Field = Field::new(0, 13);
    pub const LUT_H: Field = Field::new(16, 13);
}

/// DQE_CGC_LUT and DQE_CGC_MC
pub mod cgc {
    use super::Field;

    pub const LUT_L: Field = Field::new(0, 13);
    pub const LUT_H: Field = Field::new(16, 13);
    pub const MC_ON: Field = Field::new(0, 1);
    pub const MC_INVERSE: Field = Field::new(1, 1);
    pub const MC_GAIN: Field = Field::new(16, 11);
}

/// DQE_HSC
pub mod hsc {
    use super::Field;

    // CONTROL
    pub const EN: Field = Field::new(0, 1);
    pub const PARTIAL_UPDATE_METHOD: Field = Field::new(1, 1);
    // LOCAL_CONTROL
    pub const LSC_ON: Field = Field::new(0, 1);
    pub const LSC_GROUPMODE: Field = Field::new(1, 2);
    pub const LHC_ON: Field = Field::new(4, 1);
    pub const LHC_GROUPMODE: Field = Field::new(5, 2);
    pub const LBC_ON: Field = Field::new(8, 1);
    pub const LBC_GROUPMODE: Field = Field::new(9, 2);
    // GLOBAL_CONTROL_0..2
    pub const GLOBAL_ON: Field = Field::new(0, 1);
    pub const GLOBAL_GAIN: Field = Field::new(16, 10);
    // CONTROL_ALPHA_SAT / CONTROL_ALPHA_BRI
    pub const ALPHA_ON: Field = Field::new(0, 1);
    pub const ALPHA_SCALE: Field = Field::new(4, 4);
    pub const ALPHA_SHIFT1: Field = Field::new(16, 9);
    pub const ALPHA_SHIFT2: Field = Field::new(28, 3);
    // CONTROL_MC1_Rn
    pub const MC_ON: Field = Field::new(0, 1);
    pub const MC_BC_HUE: Field = Field::new(4, 2);
    pub const MC_BC_SAT: Field = Field::new(6, 2);
    pub const MC_SAT_GAIN: Field = Field::new(16, 11);
    // CONTROL_MC2_Rn
    pub const MC_HUE_GAIN: Field = Field::new(0, 11);
    pub const MC_BRI_GAIN: Field = Field::new(16, 11);
    // CONTROL_MC3_Rn
    pub const MC_S1: Field = Field::new(0, 10);
    pub const MC_S2: Field = Field::new(16, 10);
    // CONTROL_MC4_Rn
    pub const MC_H1: Field = Field::new(0, 11);
    pub const MC_H2: Field = Field::new(16, 11);
    // CONTROL_YCOMP
    pub const YCOMP_ON: Field = Field::new(0, 1);
    pub const YCOMP_DITH_ON: Field = Field::new(1, 1);
    pub const BLEND_ON: Field = Field::new(2, 1);
    pub const YCOMP_GAIN: Field = Field::new(8, 4);
    pub const BLEND_MANUAL_GAIN: Field = Field::new(16, 8);
    // POLY_S / POLY_B
    pub const POLY_L: Field = Field::new(0, 10);
    pub const POLY_H: Field = Field::new(16, 10);
    // LSC/LHC/LBC_GAIN
    pub const GAIN_L: Field = Field::new(0, 11);
    pub const GAIN_H: Field = Field::new(16, 11);
}

/// DQE_ATC
pub mod atc {
    use super::Field;

    pub const EN: Field = Field::new(0, 1);
    pub const PARTIAL_UPDATE_METHOD: Field = Field::new(1, 1);
    pub const PIXMAP_EN: Field = Field::new(2, 1);
    pub const LT: Field = Field::new(0, 8);
    pub const NS: Field = Field::new(8, 8);
    pub const ST: Field = Field::new(16, 8);
    pub const PL_W1: Field = Field::new(0, 4);
    pub const PL_W2: Field = Field::new(8, 4);
    pub const LA_W_ON: Field = Field::new(16, 1);
    pub const LA_W: Field = Field::new(20, 3);
    pub const CTMODE: Field = Field::new(0, 2);
    pub const PP_EN: Field = Field::new(0, 1);
    pub const TDR_MIN: Field = Field::new(0, 10);
    pub const TDR_MAX: Field = Field::new(16, 10);
    pub const AMBIENT_LIGHT: Field = Field::new(0, 8);
    pub const BACK_LIGHT: Field = Field::new(0, 8);
    pub const DSTEP: Field = Field::new(0, 6);
    pub const SCALE_MODE: Field = Field::new(0, 2);
    pub const THRESHOLD_1: Field = Field::new(0, 5);
    pub const THRESHOLD_2: Field = Field::new(8, 5);
    pub const THRESHOLD_3: Field = Field::new(16, 5);
    pub const GAIN_LIMIT: Field = Field::new(0, 10);
    pub const LT_CALC_AB_SHIFT: Field = Field::new(16, 2);
}

/// POST_SCL coefficient word
pub mod scl {
    use super::Field;

    pub const COEF: Field = Field::new(0, 12);
}

/// DQE_DE
pub mod de {
    use super::Field;

    pub const EN: Field = Field::new(0, 1);
    pub const ROI_EN: Field = Field::new(1, 1);
    pub const ROI_IN: Field = Field::new(2, 1);
    pub const SMOOTH_EN: Field = Field::new(3, 1);
    pub const FILTER_TYPE: Field = Field::new(4, 2);
    pub const BRATIO_SMOOTH: Field = Field::new(8, 4);
    pub const ROI_X: Field = Field::new(0, 13);
    pub const ROI_Y: Field = Field::new(16, 13);
    pub const FLAT_EDGE_TH: Field = Field::new(0, 10);
    pub const EDGE_BALANCE_TH: Field = Field::new(16, 10);
    pub const PLUS_CLIP: Field = Field::new(0, 10);
    pub const MINUS_CLIP: Field = Field::new(16, 10);
    pub const GAIN: Field = Field::new(0, 6);
    pub const LUMA_DEGAIN_TH: Field = Field::new(8, 6);
    pub const FLAT_DEGAIN_FLAG: Field = Field::new(16, 1);
    pub const FLAT_DEGAIN_SHIFT: Field = Field::new(20, 5);
    pub const MAX_LUMINANCE: Field = Field::new(25, 5);
}
