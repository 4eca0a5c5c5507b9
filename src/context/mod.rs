//! LUT context store
//!
//! A [`ModeLut`] holds the intermediate ("context-int") tuning values of every
//! hardware block for one mode. [`LutStore`] is the per-device arena of modes:
//! index 0 is MAIN, the only mode ever encoded and pushed to hardware, and
//! indices `1..` are presets that get copied into MAIN when their attributes
//! match the active color mode and render intent.

mod preset;

pub use preset::{
    preset_attr, PresetAttr, MODE_MAIN, MODE_PRESET, PRESET_ALL_MASK, PRESET_ATTR_NUM,
    PRESET_ATTR_UNUSED, PRESET_CM_SHIFT, PRESET_RI_SHIFT,
};

use crate::regs::{
    BlockMask, CGC_CON_LUT_MAX, CGC_DITHER_LUT_MAX, CGC_ENC_WORDS, CGC_GRID,
    CGC_LUT_MAX, DEGAMMA_LUT_CNT, DEGAMMA_LUT_MAX, DE_LUT_MAX, DISP_DITHER_LUT_MAX,
    GAMMA_MATRIX_LUT_MAX, HSC_LCG_NUM, HSC_LUT_CTRL_MAX, HSC_LUT_LSC_GAIN_MAX, HSC_LUT_POLY_MAX,
    REGAMMA_LUT_CNT, REGAMMA_LUT_MAX, SCL_INPUT_MAX, ATC_LUT_MAX,
};
use log::debug;

/// HSC main table length (control + polynomial)
pub const HSC_LUT_MAX: usize = HSC_LUT_CTRL_MAX + HSC_LUT_POLY_MAX;

/// Curve table variant selected by the input bit depth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BpcType {
    /// 10-bit input (also the down-scaled source for 8-bit)
    Bpc10 = 0,
    /// Dedicated 8-bit table
    Bpc8 = 1,
}

impl BpcType {
    /// Number of variants
    pub const COUNT: usize = 2;

    /// Array index of the variant
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Variant used for an `ext` flag as stored by the debug surface
    pub const fn from_ext(ext: bool) -> Self {
        if ext {
            BpcType::Bpc8
        } else {
            BpcType::Bpc10
        }
    }
}

/// One DQE CGC17 DPCM record: 5 packed words
pub type CgcEncoded = [u32; CGC_ENC_WORDS];

/// All DPCM records of one channel, indexed `[row][col]`
pub type CgcEncodedPlane = [[CgcEncoded; CGC_GRID]; CGC_GRID];

/// Tuning values of every block for one mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeLut {
    /// Preset match filters, unused for MAIN
    pub mode_attr: [u32; PRESET_ATTR_NUM],
    /// Display dither tunables
    pub disp_dither: [u32; DISP_DITHER_LUT_MAX],
    /// CGC dither tunables
    pub cgc_dither: [u32; CGC_DITHER_LUT_MAX],
    /// Enable + 4x4 affine transform, signed
    pub gamma_matrix: [i32; GAMMA_MATRIX_LUT_MAX],
    /// Use the dedicated 8-bit degamma table
    pub degamma_lut_ext: u32,
    /// Degamma curves per [`BpcType`]
    pub degamma_lut: [[u32; DEGAMMA_LUT_MAX]; BpcType::COUNT],
    /// Use the dedicated 8-bit regamma table
    pub regamma_lut_ext: u32,
    /// Regamma curves per [`BpcType`]
    pub regamma_lut: [[u32; REGAMMA_LUT_MAX]; BpcType::COUNT],
    /// DPCM wire form of the cube, one plane per channel
    pub cgc17_encoded: Vec<CgcEncodedPlane>,
    /// Channel targeted by the next encoded record (debug surface)
    pub cgc17_enc_rgb: usize,
    /// Row targeted by the next encoded record (debug surface)
    pub cgc17_enc_idx: usize,
    /// CGC enable + mixing controls
    pub cgc17_con: [u32; CGC_CON_LUT_MAX],
    /// Decoded cube, one table per channel
    pub cgc17_lut: Vec<[u32; CGC_LUT_MAX]>,
    /// LCG table selected on the debug surface
    pub hsc48_lcg_idx: usize,
    /// Local gain tables (LSC, LHC, LBC)
    pub hsc48_lcg: [[u32; HSC_LUT_LSC_GAIN_MAX]; HSC_LCG_NUM],
    /// HSC control + polynomial tunables
    pub hsc48_lut: [u32; HSC_LUT_MAX],
    /// ATC tunables
    pub atc_lut: [u32; ATC_LUT_MAX],
    /// Scaler enable + override coefficients
    pub scl_input: [u32; SCL_INPUT_MAX],
    /// Detail enhancement tunables
    pub de_lut: [u32; DE_LUT_MAX],
}

impl Default for ModeLut {
    fn default() -> Self {
        Self {
            mode_attr: [0; PRESET_ATTR_NUM],
            disp_dither: [0; DISP_DITHER_LUT_MAX],
            cgc_dither: [0; CGC_DITHER_LUT_MAX],
            gamma_matrix: [0; GAMMA_MATRIX_LUT_MAX],
            degamma_lut_ext: 0,
            degamma_lut: [[0; DEGAMMA_LUT_MAX]; BpcType::COUNT],
            regamma_lut_ext: 0,
            regamma_lut: [[0; REGAMMA_LUT_MAX]; BpcType::COUNT],
            cgc17_encoded: vec![[[[0; CGC_ENC_WORDS]; CGC_GRID]; CGC_GRID]; 3],
            cgc17_enc_rgb: 0,
            cgc17_enc_idx: 0,
            cgc17_con: [0; CGC_CON_LUT_MAX],
            cgc17_lut: vec![[0; CGC_LUT_MAX]; 3],
            hsc48_lcg_idx: 0,
            hsc48_lcg: [[0; HSC_LUT_LSC_GAIN_MAX]; HSC_LCG_NUM],
            hsc48_lut: [0; HSC_LUT_MAX],
            atc_lut: [0; ATC_LUT_MAX],
            scl_input: [0; SCL_INPUT_MAX],
            de_lut: [0; DE_LUT_MAX],
        }
    }
}

impl ModeLut {
    /// Zeroed mode with default curves and an identity cube
    pub fn new() -> Self {
        let mut lut = Self::default();
        lut.reset_defaults();
        lut
    }

    /// Synthesize the default degamma/regamma ramps and the identity cube.
    ///
    /// Degamma alternates a 10-bit x segment (step 32) and a 12-bit y segment
    /// (step 128); regamma uses step 128 for every segment. The last sample
    /// of each segment holds its delta to the previous one.
    pub fn reset_defaults(&mut self) {
        for bpc in 0..BpcType::COUNT {
            let degamma = &mut self.degamma_lut[bpc];
            degamma[0] = 0;
            for i in 1..DEGAMMA_LUT_MAX {
                let step = if ((i - 1) / DEGAMMA_LUT_CNT) % 2 == 0 { 32 } else { 128 };
                degamma[i] = ((i - 1) % DEGAMMA_LUT_CNT) as u32 * step;
            }
            for i in (DEGAMMA_LUT_CNT..DEGAMMA_LUT_MAX).step_by(DEGAMMA_LUT_CNT) {
                degamma[i] = degamma[i].wrapping_sub(degamma[i - 1]);
            }

            let regamma = &mut self.regamma_lut[bpc];
            regamma[0] = 0;
            for i in 1..REGAMMA_LUT_MAX {
                regamma[i] = ((i - 1) % REGAMMA_LUT_CNT) as u32 * 128;
            }
            for i in (REGAMMA_LUT_CNT..REGAMMA_LUT_MAX).step_by(REGAMMA_LUT_CNT) {
                regamma[i] = regamma[i].wrapping_sub(regamma[i - 1]);
            }
        }

        for i in 0..CGC_GRID {
            for j in 0..CGC_GRID {
                for k in 0..CGC_GRID {
                    let pos = i * CGC_GRID * CGC_GRID + j * CGC_GRID + k;
                    self.cgc17_lut[0][pos] = (i * 256) as u32;
                    self.cgc17_lut[1][pos] = (j * 256) as u32;
                    self.cgc17_lut[2][pos] = (k * 256) as u32;
                }
            }
        }
    }

    /// Degamma table selected by the ext flag
    pub fn degamma(&self) -> &[u32; DEGAMMA_LUT_MAX] {
        &self.degamma_lut[BpcType::from_ext(self.degamma_lut_ext != 0).index()]
    }

    /// Regamma table selected by the ext flag
    pub fn regamma(&self) -> &[u32; REGAMMA_LUT_MAX] {
        &self.regamma_lut[BpcType::from_ext(self.regamma_lut_ext != 0).index()]
    }

    /// Copy every configured block of `preset` into `self`.
    ///
    /// A block counts as configured when its first value is non-zero. The
    /// returned mask carries [`BlockMask::CGC`] when the cube was replaced.
    pub fn merge_from(&mut self, preset: &ModeLut) -> BlockMask {
        let mut updated = BlockMask::empty();

        if preset.disp_dither[0] != 0 {
            self.disp_dither = preset.disp_dither;
            updated.insert(BlockMask::DISP_DITHER);
        }
        if preset.cgc_dither[0] != 0 {
            self.cgc_dither = preset.cgc_dither;
            updated.insert(BlockMask::CGC_DITHER);
        }
        if preset.gamma_matrix[0] != 0 {
            self.gamma_matrix = preset.gamma_matrix;
            updated.insert(BlockMask::GAMMA_MATRIX);
        }
        if preset.degamma_lut[0][0] != 0 {
            self.degamma_lut = preset.degamma_lut;
            self.degamma_lut_ext = preset.degamma_lut_ext;
            updated.insert(BlockMask::DEGAMMA);
        }
        if preset.regamma_lut[0][0] != 0 {
            self.regamma_lut = preset.regamma_lut;
            self.regamma_lut_ext = preset.regamma_lut_ext;
            updated.insert(BlockMask::REGAMMA);
        }
        if preset.cgc17_con[0] != 0 {
            self.cgc17_con = preset.cgc17_con;
            self.cgc17_lut.clone_from(&preset.cgc17_lut);
            updated.insert(BlockMask::CGC);
        }
        if preset.hsc48_lut[0] != 0 {
            self.hsc48_lut = preset.hsc48_lut;
            self.hsc48_lcg = preset.hsc48_lcg;
            updated.insert(BlockMask::HSC);
        }
        if preset.atc_lut[0] != 0 {
            self.atc_lut = preset.atc_lut;
            updated.insert(BlockMask::ATC);
        }
        if preset.scl_input[0] != 0 {
            self.scl_input = preset.scl_input;
            updated.insert(BlockMask::SCL);
        }
        if preset.de_lut[0] != 0 {
            self.de_lut = preset.de_lut;
            updated.insert(BlockMask::DE);
        }

        updated
    }
}

/// Per-device arena of modes; index 0 is MAIN
#[derive(Debug, Clone)]
pub struct LutStore {
    modes: Vec<ModeLut>,
}

impl LutStore {
    /// MAIN plus one preset per attribute set, all reset to defaults
    pub fn new(presets: &[[u32; PRESET_ATTR_NUM]]) -> Self {
        let mut modes = Vec::with_capacity(1 + presets.len());
        modes.push(ModeLut::new());
        for attrs in presets {
            let mut lut = ModeLut::new();
            lut.mode_attr = *attrs;
            modes.push(lut);
        }
        Self { modes }
    }

    /// Number of modes including MAIN
    pub fn len(&self) -> usize {
        self.modes.len()
    }

    /// Always false, MAIN exists
    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }

    /// The mode pushed to hardware
    pub fn main(&self) -> &ModeLut {
        &self.modes[MODE_MAIN]
    }

    /// Mutable MAIN
    pub fn main_mut(&mut self) -> &mut ModeLut {
        &mut self.modes[MODE_MAIN]
    }

    /// Mode by index
    pub fn get(&self, idx: usize) -> Option<&ModeLut> {
        self.modes.get(idx)
    }

    /// Mutable mode by index
    pub fn get_mut(&mut self, idx: usize) -> Option<&mut ModeLut> {
        self.modes.get_mut(idx)
    }

    /// First preset whose attributes match, or [`MODE_MAIN`]
    pub fn select_preset(&self, color_mode: u32, render_intent: u32) -> usize {
        for (idx, lut) in self.modes.iter().enumerate().skip(MODE_PRESET) {
            let hit = lut
                .mode_attr
                .iter()
                .map(|&raw| PresetAttr(raw))
                .any(|attr| attr.matches(color_mode, render_intent));
            if hit {
                debug!("found preset[{}] for CM {}, RI {}", idx, color_mode, render_intent);
                return idx;
            }
        }
        MODE_MAIN
    }

    /// Merge the preset matching the pair into MAIN
    pub fn apply_preset(&mut self, color_mode: u32, render_intent: u32) -> BlockMask {
        let idx = self.select_preset(color_mode, render_intent);
        if idx == MODE_MAIN {
            return BlockMask::empty();
        }
        let (main, presets) = self.modes.split_at_mut(MODE_PRESET);
        main[MODE_MAIN].merge_from(&presets[idx - MODE_PRESET])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(BpcType::Bpc10)]
    #[case(BpcType::Bpc8)]
    fn test_degamma_identity_ramp(#[case] bpc: BpcType) {
        let lut = ModeLut::new();
        let degamma = &lut.degamma_lut[bpc.index()];
        assert_eq!(degamma[0], 0);

        for (segment, step) in [(0usize, 32u32), (1, 128)] {
            let first = 1 + segment * DEGAMMA_LUT_CNT;
            let last = first + DEGAMMA_LUT_CNT - 1;
            assert_eq!(degamma[first], 0);
            for i in first..last - 1 {
                assert_eq!(degamma[i + 1] - degamma[i], step, "index {}", i);
            }
            // segment tail stores its delta
            assert_eq!(degamma[last], step);
        }
    }

    #[test]
    fn test_regamma_identity_ramp() {
        let lut = ModeLut::new();
        for bpc in 0..BpcType::COUNT {
            let regamma = &lut.regamma_lut[bpc];
            assert_eq!(regamma[0], 0);
            for segment in 0..(REGAMMA_LUT_MAX - 1) / REGAMMA_LUT_CNT {
                let first = 1 + segment * REGAMMA_LUT_CNT;
                let last = first + REGAMMA_LUT_CNT - 1;
                for i in first..last - 1 {
                    assert_eq!(regamma[i + 1] - regamma[i], 128);
                }
                assert_eq!(regamma[last], 128);
            }
        }
    }

    #[test]
    fn test_identity_cube() {
        let lut = ModeLut::new();
        let pos = 3 * 289 + 5 * 17 + 16;
        assert_eq!(lut.cgc17_lut[0][pos], 3 * 256);
        assert_eq!(lut.cgc17_lut[1][pos], 5 * 256);
        assert_eq!(lut.cgc17_lut[2][pos], 16 * 256);
        assert_eq!(lut.cgc17_lut[2][CGC_LUT_MAX - 1], 16 * 256);
    }

    #[test]
    fn test_store_layout() {
        let store = LutStore::new(&[[preset_attr(1, 2); 4], [PRESET_ATTR_UNUSED; 4]]);
        assert_eq!(store.len(), 3);
        assert_eq!(store.main().mode_attr, [0; 4]);
        assert_eq!(store.get(2).map(|l| l.mode_attr[0]), Some(PRESET_ATTR_UNUSED));
        assert!(store.get(3).is_none());
    }

    #[test]
    fn test_merge_copies_only_configured_blocks() {
        let mut store = LutStore::new(&[[preset_attr(7, PRESET_ALL_MASK as u16), 0, 0, 0]]);
        {
            let preset = store.get_mut(1).unwrap();
            preset.atc_lut[0] = 1;
            preset.atc_lut[5] = 42;
            preset.cgc17_con[0] = 1;
            preset.cgc17_lut[0][0] = 77;
            preset.de_lut[1] = 9; // de_lut[0] == 0, not configured
        }

        let updated = store.apply_preset(7, 3);
        assert!(updated.contains(BlockMask::ATC));
        assert!(updated.contains(BlockMask::CGC));
        assert!(!updated.contains(BlockMask::DE));
        assert_eq!(store.main().atc_lut[5], 42);
        assert_eq!(store.main().cgc17_lut[0][0], 77);
        assert_eq!(store.main().de_lut[1], 0);
    }

    #[test]
    fn test_no_match_leaves_main() {
        let mut store = LutStore::new(&[[preset_attr(7, 1), 0, 0, 0]]);
        store.get_mut(1).unwrap().atc_lut[0] = 1;
        assert!(store.apply_preset(8, 1).is_empty());
        assert_eq!(store.main().atc_lut[0], 0);
    }
}
