//! Register encoder
//!
//! Pure transforms from one [`ModeLut`] into packed register words held in
//! [`ShadowRegs`]. Nothing here touches hardware; the restore path in
//! [`crate::device`] walks the shadow and issues the writes.
//!
//! Every block encoder takes a `clear_forced` flag. The all-blocks pass run on
//! context changes keeps a forced-off latch set from the debug surface, while a
//! direct table store clears it.

mod atc;
mod cgc;
mod detail;
mod dither;
mod gamma;
mod hsc;
mod scaler;

pub use scaler::{SCL_H_COEF_8T, SCL_V_COEF_4T};

use crate::context::{BpcType, ModeLut};
use crate::regs::{
    RegBlock, ATC_REG_MAX, CGC_CON_REG_MAX, CGC_LUT_MAX, DEGAMMA_REG_MAX, DE_REG_MAX,
    GAMMA_MATRIX_REG_MAX, HSC_REG_CTRL_MAX, HSC_REG_GAIN_MAX, HSC_REG_POLY_MAX, LPD_REG_MAX,
    REGAMMA_REG_MAX, SCL_REG_MAX,
};
use serde::{Deserialize, Serialize};

/// Per-block on/off control byte.
///
/// The low nibble holds OFF, ON or AUTO; bit 4 latches a forced-off override
/// set from the debug surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ctrl(pub u32);

impl Ctrl {
    /// Block disabled
    pub const OFF: u32 = 0;
    /// Block enabled
    pub const ON: u32 = 1;
    /// Enable decided at restore time
    pub const AUTO: u32 = 2;
    /// Forced-off latch
    pub const FORCED_OFF: u32 = 0x10;

    const ONOFF_MASK: u32 = 0x0F;
    const FORCED_MASK: u32 = 0xF0;

    /// Replace the on/off nibble, optionally dropping the forced latch
    pub fn set_onoff(&mut self, mode: u32, clear_forced: bool) {
        self.0 &= !Self::ONOFF_MASK;
        if clear_forced {
            self.0 &= !Self::FORCED_MASK;
        }
        self.0 |= mode & Self::ONOFF_MASK;
    }

    /// Set or clear the forced-off latch
    pub fn set_forced_off(&mut self, forced: bool) {
        self.0 &= !Self::FORCED_MASK;
        if forced {
            self.0 |= Self::FORCED_OFF;
        }
    }

    /// Whether the block forced off
    pub const fn is_forced_off(self) -> bool {
        self.0 & Self::FORCED_MASK != 0
    }

    /// Whether the block is on and not forced off
    pub const fn is_on(self) -> bool {
        !self.is_forced_off() && (self.0 & Self::ONOFF_MASK) == Self::ON
    }

    /// Whether the block is in AUTO and not forced off
    pub const fn is_auto(self) -> bool {
        !self.is_forced_off() && (self.0 & Self::ONOFF_MASK) == Self::AUTO
    }

    /// One-glyph state used in the restore summary: `A`, `0*`, `1` or `0`
    pub const fn label(self) -> &'static str {
        if self.is_auto() {
            "A"
        } else if self.is_forced_off() {
            "0*"
        } else if self.is_on() {
            "1"
        } else {
            "0"
        }
    }

    fn enable_if(&mut self, enabled: bool, clear_forced: bool) {
        self.set_onoff(if enabled { Self::ON } else { Self::OFF }, clear_forced);
    }
}

/// Input bit depth as seen by the encoders
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BpcInfo {
    /// Configured input bits per component
    pub in_bpc: u32,
}

impl BpcInfo {
    /// Info for `in_bpc` bits of input
    pub const fn new(in_bpc: u32) -> Self {
        Self { in_bpc }
    }

    /// Whether the pipe runs 8-bit input
    pub const fn is_8bit(self) -> bool {
        self.in_bpc == 8
    }

    /// Down-scale applied to values stored at 10-bit precision.
    ///
    /// Dedicated (ext) tables are stored at the target precision already.
    pub const fn shift(self, ext: bool) -> u32 {
        if !ext && self.is_8bit() {
            2
        } else {
            0
        }
    }

    /// Curve table variant used for the given ext flag
    pub const fn table(self, ext: bool) -> BpcType {
        if ext && self.is_8bit() {
            BpcType::Bpc8
        } else {
            BpcType::Bpc10
        }
    }
}

/// Packed register words for every block of one pipe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowRegs {
    /// Hardware version read at probe
    pub version: u32,

    /// DISP_DITHER
    pub disp_dither: u32,
    /// CGC_DITHER
    pub cgc_dither: u32,
    /// GAMMA_MATRIX, enable word first
    pub gamma_matrix: [u32; GAMMA_MATRIX_REG_MAX],
    /// DEGAMMA, enable word first
    pub degamma_lut: Vec<u32>,
    /// REGAMMA, enable word first
    pub regamma_lut: Vec<u32>,
    /// CGC mixing controls
    pub cgc_con: [u32; CGC_CON_REG_MAX],
    /// CGC cube in DMA layout `[entry][rgb]`
    pub cgc_lut: Vec<[u16; 3]>,
    /// HSC control words
    pub hsc_con: Vec<u32>,
    /// HSC polynomial words
    pub hsc_poly: [u32; HSC_REG_POLY_MAX],
    /// HSC local gain words
    pub hsc_gain: Vec<u32>,
    /// ATC words
    pub atc: [u32; ATC_REG_MAX],
    /// Scaler coefficient words
    pub scl: Vec<u32>,
    /// Detail enhancement words
    pub de: [u32; DE_REG_MAX],
    /// Low-power-mode bank saved on disable
    pub lpd: [u32; LPD_REG_MAX],

    /// Bus address of the CGC DMA buffer, zero without EDMA
    pub cgc_dma_addr: u64,
    /// Ambient light reported to ATC
    pub atc_lux: u32,
    /// Write ATC DSTEP as zero
    pub atc_dim_off: u32,

    /// Display dither control
    pub disp_dither_on: Ctrl,
    /// CGC dither control
    pub cgc_dither_on: Ctrl,
    /// Gamma matrix control
    pub gamma_matrix_on: Ctrl,
    /// Degamma control
    pub degamma_on: Ctrl,
    /// CGC control
    pub cgc_on: Ctrl,
    /// Regamma control
    pub regamma_on: Ctrl,
    /// HSC control
    pub hsc_on: Ctrl,
    /// ATC control
    pub atc_on: Ctrl,
    /// Scaler control
    pub scl_on: Ctrl,
    /// Detail enhancement control
    pub de_on: Ctrl,
}

impl Default for ShadowRegs {
    fn default() -> Self {
        Self {
            version: 0,
            disp_dither: 0,
            cgc_dither: 0,
            gamma_matrix: [0; GAMMA_MATRIX_REG_MAX],
            degamma_lut: vec![0; DEGAMMA_REG_MAX],
            regamma_lut: vec![0; REGAMMA_REG_MAX],
            cgc_con: [0; CGC_CON_REG_MAX],
            cgc_lut: vec![[0; 3]; CGC_LUT_MAX],
            hsc_con: vec![0; HSC_REG_CTRL_MAX],
            hsc_poly: [0; HSC_REG_POLY_MAX],
            hsc_gain: vec![0; HSC_REG_GAIN_MAX],
            atc: [0; ATC_REG_MAX],
            scl: vec![0; SCL_REG_MAX],
            de: [0; DE_REG_MAX],
            lpd: [0; LPD_REG_MAX],
            cgc_dma_addr: 0,
            atc_lux: 0,
            atc_dim_off: 0,
            disp_dither_on: Ctrl::default(),
            cgc_dither_on: Ctrl::default(),
            gamma_matrix_on: Ctrl::default(),
            degamma_on: Ctrl::default(),
            cgc_on: Ctrl::default(),
            regamma_on: Ctrl::default(),
            hsc_on: Ctrl::default(),
            atc_on: Ctrl::default(),
            scl_on: Ctrl::default(),
            de_on: Ctrl::default(),
        }
    }
}

impl ShadowRegs {
    /// Zeroed shadow, every block off
    pub fn new() -> Self {
        Self::default()
    }

    /// Control byte of `block`, `None` for blocks without one
    pub fn ctrl(&self, block: RegBlock) -> Option<Ctrl> {
        match block {
            RegBlock::DispDither => Some(self.disp_dither_on),
            RegBlock::CgcDither => Some(self.cgc_dither_on),
            RegBlock::GammaMatrix => Some(self.gamma_matrix_on),
            RegBlock::Degamma => Some(self.degamma_on),
            RegBlock::Cgc | RegBlock::CgcCon => Some(self.cgc_on),
            RegBlock::Regamma => Some(self.regamma_on),
            RegBlock::Hsc => Some(self.hsc_on),
            RegBlock::Atc => Some(self.atc_on),
            RegBlock::Scl => Some(self.scl_on),
            RegBlock::De => Some(self.de_on),
            RegBlock::CgcDma | RegBlock::Lpd => None,
        }
    }

    /// Mutable control byte of `block`
    pub fn ctrl_mut(&mut self, block: RegBlock) -> Option<&mut Ctrl> {
        match block {
            RegBlock::DispDither => Some(&mut self.disp_dither_on),
            RegBlock::CgcDither => Some(&mut self.cgc_dither_on),
            RegBlock::GammaMatrix => Some(&mut self.gamma_matrix_on),
            RegBlock::Degamma => Some(&mut self.degamma_on),
            RegBlock::Cgc | RegBlock::CgcCon => Some(&mut self.cgc_on),
            RegBlock::Regamma => Some(&mut self.regamma_on),
            RegBlock::Hsc => Some(&mut self.hsc_on),
            RegBlock::Atc => Some(&mut self.atc_on),
            RegBlock::Scl => Some(&mut self.scl_on),
            RegBlock::De => Some(&mut self.de_on),
            RegBlock::CgcDma | RegBlock::Lpd => None,
        }
    }
}

/// Encode one block of `lut` into `shadow`.
///
/// Blocks without a context table (`CgcCon`, `CgcDma`, `Lpd`) are ignored;
/// `CgcCon` is produced together with `Cgc`.
pub fn encode_block(shadow: &mut ShadowRegs, lut: &ModeLut, bpc: BpcInfo, block: RegBlock, clear_forced: bool) {
    match block {
        RegBlock::DispDither => dither::encode_disp(shadow, lut, clear_forced),
        RegBlock::CgcDither => dither::encode_cgc(shadow, lut, clear_forced),
        RegBlock::GammaMatrix => gamma::encode_matrix(shadow, lut, bpc, clear_forced),
        RegBlock::Degamma => gamma::encode_degamma(shadow, lut, bpc, clear_forced),
        RegBlock::Regamma => gamma::encode_regamma(shadow, lut, bpc, clear_forced),
        RegBlock::Cgc => cgc::encode(shadow, lut, clear_forced),
        RegBlock::Hsc => hsc::encode(shadow, lut, bpc, clear_forced),
        RegBlock::Atc => atc::encode(shadow, lut, bpc, clear_forced),
        RegBlock::Scl => scaler::encode(shadow, lut, clear_forced),
        RegBlock::De => detail::encode(shadow, lut, clear_forced),
        RegBlock::CgcCon | RegBlock::CgcDma | RegBlock::Lpd => {}
    }
}

/// Re-encode every block of `lut`, keeping forced-off latches.
///
/// Display dither is only re-encoded when `lut` carries an explicit table so
/// that the AUTO state set at load survives.
pub fn encode_all(shadow: &mut ShadowRegs, lut: &ModeLut, bpc: BpcInfo) {
    if lut.disp_dither[0] != 0 {
        dither::encode_disp(shadow, lut, false);
    }
    dither::encode_cgc(shadow, lut, false);
    gamma::encode_matrix(shadow, lut, bpc, false);
    gamma::encode_regamma(shadow, lut, bpc, false);
    gamma::encode_degamma(shadow, lut, bpc, false);
    cgc::encode(shadow, lut, false);
    hsc::encode(shadow, lut, bpc, false);
    atc::encode(shadow, lut, bpc, false);
    scaler::encode(shadow, lut, false);
    detail::encode(shadow, lut, false);
}
