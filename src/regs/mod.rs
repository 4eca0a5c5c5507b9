//! DQE register map: block ids, table dimensions, bit-field layouts and the
//! MMIO backend seam.
//!
//! The engine never touches memory-mapped registers directly. Every read and
//! write goes through [`RegisterBackend`] (the DQE SFR window) and, for the
//! 3D CGC LUT bulk load, [`EdmaEngine`].

#[allow(missing_docs)]
pub mod layout;
mod memory;

pub use layout::Field;
pub use memory::{MemoryEdma, MemoryRegs, RegWrite};

use crate::error::DqeResult;
use serde::{Deserialize, Serialize};

/// Hardware register blocks of one DQE instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RegBlock {
    /// Output dither
    DispDither,
    /// Dither in front of the CGC
    CgcDither,
    /// 3x3 matrix + offsets
    GammaMatrix,
    /// Degamma curve
    Degamma,
    /// CGC 3D LUT SRAM
    Cgc,
    /// CGC mixing controls
    CgcCon,
    /// CGC EDMA path selector
    CgcDma,
    /// Regamma curve
    Regamma,
    /// Hue/saturation/contrast
    Hsc,
    /// Adaptive tone control
    Atc,
    /// Post scaler coefficients
    Scl,
    /// Detail enhancement
    De,
    /// Low-power-mode bank
    Lpd,
}

impl RegBlock {
    /// Every block in restore order
    pub const ALL: [RegBlock; 13] = [
        RegBlock::DispDither,
        RegBlock::CgcDither,
        RegBlock::GammaMatrix,
        RegBlock::Degamma,
        RegBlock::Cgc,
        RegBlock::CgcCon,
        RegBlock::CgcDma,
        RegBlock::Regamma,
        RegBlock::Hsc,
        RegBlock::Atc,
        RegBlock::De,
        RegBlock::Scl,
        RegBlock::Lpd,
    ];

    /// Bit used for this block in a [`BlockMask`]
    pub const fn bit(self) -> u32 {
        1 << (self as u32)
    }

    /// Short upper-case name used in logs
    pub const fn name(self) -> &'static str {
        match self {
            RegBlock::DispDither => "DISP_DITHER",
            RegBlock::CgcDither => "CGC_DITHER",
            RegBlock::GammaMatrix => "GAMMA_MATRIX",
            RegBlock::Degamma => "DEGAMMA",
            RegBlock::Cgc => "CGC",
            RegBlock::CgcCon => "CGC_CON",
            RegBlock::CgcDma => "CGC_DMA",
            RegBlock::Regamma => "REGAMMA",
            RegBlock::Hsc => "HSC",
            RegBlock::Atc => "ATC",
            RegBlock::Scl => "SCL",
            RegBlock::De => "DE",
            RegBlock::Lpd => "LPD",
        }
    }
}

impl std::fmt::Display for RegBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

bitflags::bitflags! {
    /// Set of blocks touched by a decode or merge step.
    ///
    /// Bit positions follow the declaration order of [`RegBlock`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BlockMask: u32 {
        /// Output dither
        const DISP_DITHER = RegBlock::DispDither.bit();
        /// CGC dither
        const CGC_DITHER = RegBlock::CgcDither.bit();
        /// Gamma matrix
        const GAMMA_MATRIX = RegBlock::GammaMatrix.bit();
        /// Degamma curve
        const DEGAMMA = RegBlock::Degamma.bit();
        /// CGC cube
        const CGC = RegBlock::Cgc.bit();
        /// CGC controls
        const CGC_CON = RegBlock::CgcCon.bit();
        /// CGC EDMA path
        const CGC_DMA = RegBlock::CgcDma.bit();
        /// Regamma curve
        const REGAMMA = RegBlock::Regamma.bit();
        /// Hue/saturation/contrast
        const HSC = RegBlock::Hsc.bit();
        /// Adaptive tone control
        const ATC = RegBlock::Atc.bit();
        /// Scaler
        const SCL = RegBlock::Scl.bit();
        /// Detail enhancement
        const DE = RegBlock::De.bit();
        /// Low-power-mode bank
        const LPD = RegBlock::Lpd.bit();
    }
}

impl Default for BlockMask {
    fn default() -> Self {
        BlockMask::empty()
    }
}

impl From<RegBlock> for BlockMask {
    fn from(block: RegBlock) -> Self {
        BlockMask::from_bits_retain(block.bit())
    }
}

// Sub-bank selectors passed as `opt`
/// CGC red channel bank
pub const CGC_R: usize = 0;
/// CGC green channel bank
pub const CGC_G: usize = 1;
/// CGC blue channel bank
pub const CGC_B: usize = 2;
/// HSC control bank
pub const HSC_CON: usize = 0;
/// HSC polynomial curve bank
pub const HSC_POLY: usize = 1;
/// HSC local gain bank
pub const HSC_GAIN: usize = 2;

// Context-int table lengths and register counts
/// Display dither tunables
pub const DISP_DITHER_LUT_MAX: usize = 7;
/// CGC dither tunables
pub const CGC_DITHER_LUT_MAX: usize = 8;
/// Gamma matrix: enable + 4x4 transform
pub const GAMMA_MATRIX_LUT_MAX: usize = 17;
/// Gamma matrix registers
pub const GAMMA_MATRIX_REG_MAX: usize = 8;

/// Samples per degamma segment
pub const DEGAMMA_LUT_CNT: usize = 33;
/// Degamma: enable + x segment + y segment
pub const DEGAMMA_LUT_MAX: usize = 1 + DEGAMMA_LUT_CNT * 2;
/// Degamma registers
pub const DEGAMMA_REG_MAX: usize = curve_reg_max(DEGAMMA_LUT_MAX, DEGAMMA_LUT_CNT);

/// Samples per regamma segment
pub const REGAMMA_LUT_CNT: usize = 33;
/// Regamma: enable + x/y segments for R, G and B
pub const REGAMMA_LUT_MAX: usize = 1 + REGAMMA_LUT_CNT * 6;
/// Regamma registers
pub const REGAMMA_REG_MAX: usize = curve_reg_max(REGAMMA_LUT_MAX, REGAMMA_LUT_CNT);

/// Grid points per CGC axis
pub const CGC_GRID: usize = 17;
/// Encoded words per CGC17 DPCM sample
pub const CGC_ENC_WORDS: usize = 5;
/// CGC cube entries per channel
pub const CGC_LUT_MAX: usize = CGC_GRID * CGC_GRID * CGC_GRID;
/// CGC registers per channel, two entries each
pub const CGC_REG_MAX: usize = (CGC_LUT_MAX + 1) / 2;
/// CGC control: enable + 3 x (on, inverse, gain)
pub const CGC_CON_LUT_MAX: usize = 10;
/// CGC control registers
pub const CGC_CON_REG_MAX: usize = 3;

/// HSC control tunables
pub const HSC_LUT_CTRL_MAX: usize = 57;
/// HSC polynomial tunables
pub const HSC_LUT_POLY_MAX: usize = 18;
/// Gains per LCG table
pub const HSC_LUT_LSC_GAIN_MAX: usize = 72;
/// LCG tables (LSC, LHC, LBC)
pub const HSC_LCG_NUM: usize = 3;
/// HSC control registers
pub const HSC_REG_CTRL_MAX: usize = 20;
/// HSC polynomial registers
pub const HSC_REG_POLY_MAX: usize = 10;
/// HSC gain registers, two gains each
pub const HSC_REG_GAIN_MAX: usize = HSC_LCG_NUM * HSC_LUT_LSC_GAIN_MAX / 2;

/// ATC tunables
pub const ATC_LUT_MAX: usize = 23;
/// ATC registers
pub const ATC_REG_MAX: usize = 12;
/// ATC register slot holding DSTEP
pub const ATC_DSTEP_REG: usize = 8;

/// Scaler filter phases
pub const SCL_COEF_SET: usize = 16;
/// Vertical taps
pub const SCL_VCOEF_MAX: usize = 4;
/// Horizontal taps
pub const SCL_HCOEF_MAX: usize = 8;
/// Taps per coefficient set
pub const SCL_COEF_MAX: usize = SCL_VCOEF_MAX + SCL_HCOEF_MAX;
/// Coefficient sets
pub const SCL_COEF_CNT: usize = 1;
/// Scaler registers
pub const SCL_REG_MAX: usize = SCL_COEF_CNT * SCL_COEF_MAX * SCL_COEF_SET;
/// Scaler override input: enable + one coefficient per tap
pub const SCL_INPUT_MAX: usize = SCL_COEF_MAX + 1;

/// Detail enhancement tunables
pub const DE_LUT_MAX: usize = 19;
/// Detail enhancement registers
pub const DE_REG_MAX: usize = 6;

/// Low-power-mode bank registers
pub const LPD_REG_MAX: usize = 4;

/// Registers needed for a curve of `lut_max` values (enable first) split into
/// segments of `cnt` samples, two samples per register.
pub const fn curve_reg_max(lut_max: usize, cnt: usize) -> usize {
    let segments = (lut_max - 1) / cnt;
    1 + segments * ((cnt + 1) / 2)
}

/// DQE special-function-register window of one pipe
#[cfg_attr(test, mockall::automock)]
pub trait RegisterBackend: Send {
    /// Hardware version register
    fn version(&self) -> u32;

    /// Program frame size and reset the per-frame state of the block chain
    fn init(&mut self, width: u32, height: u32);

    /// Read register `index` of `block`, bank `opt`
    fn read(&self, block: RegBlock, index: usize, opt: usize) -> u32;

    /// Write register `index` of `block`, bank `opt`
    fn write(&mut self, block: RegBlock, index: usize, value: u32, opt: usize);

    /// Turn a block on or off
    fn set_on(&mut self, block: RegBlock, on: bool);

    /// Program the ATC partial-update image size
    fn set_atc_partial_ibsi(&mut self, width: u32, height: u32);

    /// Whether the CGC block still requests DMA data
    fn cgc_dma_pending(&self) -> bool;

    /// Human readable register dump
    fn dump(&self, verbose: bool) -> String;
}

/// Dedicated DMA engine loading the CGC LUT into hardware SRAM
#[cfg_attr(test, mockall::automock)]
pub trait EdmaEngine: Send {
    /// Reserve a device-visible buffer of `bytes`, returning its bus address
    fn alloc_lut(&mut self, bytes: usize) -> DqeResult<u64>;

    /// Point the engine at the LUT buffer
    fn set_base_addr(&mut self, addr: u64);

    /// Kick a burst load of `lut` (DMA layout, `[entry][rgb]`)
    fn start(&mut self, lut: &[[u16; 3]]);

    /// Clear every pending interrupt
    fn clear_irqs(&mut self);

    /// Mask or unmask every interrupt source
    fn set_irq_mask(&mut self, masked: bool);

    /// Enable or disable interrupt delivery
    fn set_irq_enable(&mut self, enabled: bool);

    /// Read and clear the interrupt status
    fn take_irq_status(&mut self) -> u32;
}
