//! Device description
//!
//! [`DqeConfig`] carries what a device tree node would: the preset table,
//! SRAM retention, EDMA presence and the pipe the DQE sits on. It loads from
//! JSON:
//!
//! ```json
//! {
//!   "id": 0,
//!   "output": "dsi",
//!   "preset_cnt": 1,
//!   "preset": [65535, 4294967295, 4294967295, 4294967295],
//!   "sram_retention": true,
//!   "edma": true,
//!   "partial_update": false
//! }
//! ```

use crate::context::PRESET_ATTR_NUM;
use crate::error::{DqeError, DqeResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Output the pipe drives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputType {
    /// MIPI DSI panel
    #[default]
    Dsi,
    /// DisplayPort
    Dp,
    /// Writeback
    Writeback,
}

/// Device description of one DQE instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DqeConfig {
    /// Display pipe id
    pub id: u32,
    /// Output the pipe drives
    pub output: OutputType,
    /// Pipe runs in emulation mode
    pub emulation: bool,
    /// Number of preset modes
    pub preset_cnt: u32,
    /// Flat preset attributes, `preset_cnt * 4` words
    pub preset: Vec<u32>,
    /// CGC SRAM keeps its content while the pipe idles
    pub sram_retention: bool,
    /// EDMA engine present for CGC loads
    pub edma: bool,
    /// Pipe supports partial update
    pub partial_update: bool,
    /// Tuning file suffix reported by the `xml` attribute
    pub xml_suffix: String,
}

impl Default for DqeConfig {
    fn default() -> Self {
        Self {
            id: 0,
            output: OutputType::Dsi,
            emulation: false,
            preset_cnt: 0,
            preset: Vec::new(),
            sram_retention: false,
            edma: false,
            partial_update: false,
            xml_suffix: String::new(),
        }
    }
}

impl DqeConfig {
    /// DSI pipe 0 with the given presets
    pub fn with_presets(presets: &[[u32; PRESET_ATTR_NUM]]) -> Self {
        Self {
            preset_cnt: presets.len() as u32,
            preset: presets.iter().flatten().copied().collect(),
            ..Self::default()
        }
    }

    /// Parse a JSON description
    pub fn from_json_str(json: &str) -> DqeResult<Self> {
        let config: DqeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON description from disk
    pub fn from_file<P: AsRef<Path>>(path: P) -> DqeResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Check the preset table size against `preset_cnt`
    pub fn validate(&self) -> DqeResult<()> {
        let expected = self.preset_cnt as usize * PRESET_ATTR_NUM;
        if self.preset_cnt != 0 && self.preset.len() != expected {
            return Err(DqeError::InvalidConfig(format!(
                "invalid preset size {}, preset_cnt {}",
                self.preset.len(),
                self.preset_cnt
            )));
        }
        Ok(())
    }

    /// Preset attribute sets, empty without presets
    pub fn presets(&self) -> DqeResult<Vec<[u32; PRESET_ATTR_NUM]>> {
        self.validate()?;
        if self.preset_cnt == 0 {
            return Ok(Vec::new());
        }
        Ok(self
            .preset
            .chunks_exact(PRESET_ATTR_NUM)
            .map(|c| [c[0], c[1], c[2], c[3]])
            .collect())
    }

    /// Whether this pipe gets a DQE interface at all
    pub fn wants_dqe(&self) -> bool {
        self.id == 0 && self.output == OutputType::Dsi && !self.emulation
    }
}
