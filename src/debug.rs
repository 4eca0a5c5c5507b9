//! Tuning attribute surface
//!
//! Every attribute reads and writes text the way a sysfs node would. Table
//! attributes act on the mode selected with `mode_idx`; stores on MAIN are
//! re-encoded into the shadow right away, stores on a preset only wait for
//! the preset to be merged.
//!
//! ```rust
//! use exynos_dqe::config::DqeConfig;
//! use exynos_dqe::debug::DebugAttr;
//! use exynos_dqe::device::{Backends, Dqe, NoImporter};
//! use exynos_dqe::regs::MemoryRegs;
//!
//! let backends = Backends::new(Box::new(MemoryRegs::new(0x0400_0000)), Box::new(NoImporter));
//! let dqe = Dqe::probe(&DqeConfig::default(), backends).unwrap();
//! assert_eq!(dqe.show(DebugAttr::DqeVer).unwrap(), "04000000\n");
//! dqe.store("aps_onoff".parse().unwrap(), "0").unwrap();
//! ```

use crate::context::{BpcType, ModeLut, MODE_MAIN};
use crate::device::{Dqe, DqeInner};
use crate::encoder::{encode_block, BpcInfo, ShadowRegs};
use crate::error::{DqeError, DqeResult};
use crate::protocol::dpcm;
use crate::protocol::text::{cgc_to_string, lut_to_string, parse_cgc, parse_lut, parse_uint};
use crate::regs::{RegBlock, CGC_GRID, GAMMA_MATRIX_LUT_MAX, HSC_LCG_NUM};
use crate::update::{ResetKind, ResetTarget};
use log::{debug, error, info};
use std::fmt;
use std::str::FromStr;

/// Debug attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DebugAttr {
    /// Mode the table attributes act on
    ModeIdx,
    /// Display dither table
    DispDither,
    /// CGC dither table
    CgcDither,
    /// Channel and row of the CGC17 record window
    Cgc17Idx,
    /// CGC17 record at the window
    Cgc17Enc,
    /// Decode CGC17 records into the cube
    Cgc17Dec,
    /// CGC controls
    Cgc17Con,
    /// Gamma matrix
    GammaMatrix,
    /// Regamma 8-bit table select
    GammaExt,
    /// Regamma curve
    Gamma,
    /// Degamma 8-bit table select
    DegammaExt,
    /// Degamma curve
    Degamma,
    /// HSC local gain table select
    Hsc48Idx,
    /// Selected HSC local gain table
    Hsc48Lcg,
    /// HSC control and polynomial
    Hsc,
    /// ATC table
    Aps,
    /// ATC force-off
    ApsOnoff,
    /// Ambient lux
    ApsLux,
    /// ATC dimming step override
    ApsDimOff,
    /// Scaler input
    Scl,
    /// Detail enhancement table
    De,
    /// Color mode probe
    ColorMode,
    /// Per-block forced-off overrides
    OffCtrl,
    /// Tuning file name
    Xml,
    /// Hardware version
    DqeVer,
    /// Panel dimming state
    DimStatus,
    /// Register dump to the log
    Dump,
}

impl DebugAttr {
    /// Every attribute
    pub const ALL: [DebugAttr; 27] = [
        DebugAttr::ModeIdx,
        DebugAttr::DispDither,
        DebugAttr::CgcDither,
        DebugAttr::Cgc17Idx,
        DebugAttr::Cgc17Enc,
        DebugAttr::Cgc17Dec,
        DebugAttr::Cgc17Con,
        DebugAttr::GammaMatrix,
        DebugAttr::GammaExt,
        DebugAttr::Gamma,
        DebugAttr::DegammaExt,
        DebugAttr::Degamma,
        DebugAttr::Hsc48Idx,
        DebugAttr::Hsc48Lcg,
        DebugAttr::Hsc,
        DebugAttr::Aps,
        DebugAttr::ApsOnoff,
        DebugAttr::ApsLux,
        DebugAttr::ApsDimOff,
        DebugAttr::Scl,
        DebugAttr::De,
        DebugAttr::ColorMode,
        DebugAttr::OffCtrl,
        DebugAttr::Xml,
        DebugAttr::DqeVer,
        DebugAttr::DimStatus,
        DebugAttr::Dump,
    ];

    /// Node name
    pub const fn name(self) -> &'static str {
        match self {
            DebugAttr::ModeIdx => "mode_idx",
            DebugAttr::DispDither => "disp_dither",
            DebugAttr::CgcDither => "cgc_dither",
            DebugAttr::Cgc17Idx => "cgc17_idx",
            DebugAttr::Cgc17Enc => "cgc17_enc",
            DebugAttr::Cgc17Dec => "cgc17_dec",
            DebugAttr::Cgc17Con => "cgc17_con",
            DebugAttr::GammaMatrix => "gamma_matrix",
            DebugAttr::GammaExt => "gamma_ext",
            DebugAttr::Gamma => "gamma",
            DebugAttr::DegammaExt => "degamma_ext",
            DebugAttr::Degamma => "degamma",
            DebugAttr::Hsc48Idx => "hsc48_idx",
            DebugAttr::Hsc48Lcg => "hsc48_lcg",
            DebugAttr::Hsc => "hsc",
            DebugAttr::Aps => "aps",
            DebugAttr::ApsOnoff => "aps_onoff",
            DebugAttr::ApsLux => "aps_lux",
            DebugAttr::ApsDimOff => "aps_dim_off",
            DebugAttr::Scl => "scl",
            DebugAttr::De => "de",
            DebugAttr::ColorMode => "color_mode",
            DebugAttr::OffCtrl => "off_ctrl",
            DebugAttr::Xml => "xml",
            DebugAttr::DqeVer => "dqe_ver",
            DebugAttr::DimStatus => "dim_status",
            DebugAttr::Dump => "dump",
        }
    }

    /// Whether stores are rejected
    pub const fn is_read_only(self) -> bool {
        matches!(
            self,
            DebugAttr::Xml | DebugAttr::DqeVer | DebugAttr::DimStatus | DebugAttr::Dump
        )
    }
}

impl fmt::Display for DebugAttr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DebugAttr {
    type Err = DqeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DebugAttr::ALL
            .iter()
            .copied()
            .find(|attr| attr.name() == s)
            .ok_or_else(|| DqeError::UnknownAttribute(s.to_string()))
    }
}

/// Targets of the `off_ctrl` attribute, in index order
const OFF_CTRL: [(&str, Option<RegBlock>); 9] = [
    ("ALL", None),
    ("CGC", Some(RegBlock::Cgc)),
    ("DEGAMMA", Some(RegBlock::Degamma)),
    ("REGAMMA", Some(RegBlock::Regamma)),
    ("GAMMA_MATRIX", Some(RegBlock::GammaMatrix)),
    ("HSC", Some(RegBlock::Hsc)),
    ("ATC", Some(RegBlock::Atc)),
    ("CGC DITH", Some(RegBlock::CgcDither)),
    ("DISP DITH", Some(RegBlock::DispDither)),
];

/// Blocks `off_ctrl` type 0 acts on; display dither is left alone
const OFF_CTRL_ALL: [RegBlock; 7] = [
    RegBlock::GammaMatrix,
    RegBlock::Degamma,
    RegBlock::Cgc,
    RegBlock::Regamma,
    RegBlock::Hsc,
    RegBlock::Atc,
    RegBlock::CgcDither,
];

fn scalar(input: &str) -> DqeResult<u32> {
    parse_uint(input.trim())
}

fn table_line(lut: &[u32]) -> String {
    format!("{}\n", lut_to_string(lut))
}

fn selected(inner: &DqeInner) -> DqeResult<&ModeLut> {
    inner
        .store
        .get(inner.mode_idx)
        .ok_or_else(|| DqeError::range("mode_idx", inner.mode_idx as i64, inner.store.len() as i64 - 1))
}

fn forced_off(shadow: &mut ShadowRegs, block: RegBlock, forced: bool) {
    if let Some(ctrl) = shadow.ctrl_mut(block) {
        ctrl.set_forced_off(forced);
    }
}

impl Dqe {
    /// Read an attribute
    pub fn show(&self, attr: DebugAttr) -> DqeResult<String> {
        let inner = self.lock();
        debug!("dqe{}: show {}", self.id, attr);

        let out = match attr {
            DebugAttr::ModeIdx => format!("{}\n", inner.mode_idx),
            DebugAttr::DispDither => table_line(&selected(&inner)?.disp_dither),
            DebugAttr::CgcDither => table_line(&selected(&inner)?.cgc_dither),
            DebugAttr::Cgc17Idx => {
                let lut = selected(&inner)?;
                format!("{} {}\n", lut.cgc17_enc_rgb, lut.cgc17_enc_idx)
            }
            DebugAttr::Cgc17Enc => {
                let lut = selected(&inner)?;
                let rows = &lut.cgc17_encoded[lut.cgc17_enc_rgb][lut.cgc17_enc_idx];
                format!("{}\n", cgc_to_string(rows))
            }
            DebugAttr::Cgc17Dec => {
                let lut = selected(&inner)?;
                let result = dpcm::walk_cube(&lut.cgc17_encoded, dpcm::CUBE_ALL, |ch, row, col, samples| {
                    debug!("dqe{}: cgc17[{}][{}][{}] {:?}", self.id, ch, row, col, samples);
                });
                match result {
                    Ok(()) => "dump=0\n".to_string(),
                    Err(e) => {
                        error!("dqe{}: cgc17 decode: {}", self.id, e);
                        format!("dump={}\n", -libc::EINVAL)
                    }
                }
            }
            DebugAttr::Cgc17Con => table_line(&selected(&inner)?.cgc17_con),
            DebugAttr::GammaMatrix => {
                let matrix = selected(&inner)?.gamma_matrix.map(|v| v as u32);
                table_line(&matrix)
            }
            DebugAttr::GammaExt => format!("{}\n", selected(&inner)?.regamma_lut_ext),
            DebugAttr::Gamma => table_line(selected(&inner)?.regamma()),
            DebugAttr::DegammaExt => format!("{}\n", selected(&inner)?.degamma_lut_ext),
            DebugAttr::Degamma => table_line(selected(&inner)?.degamma()),
            DebugAttr::Hsc48Idx => format!("{}\n", selected(&inner)?.hsc48_lcg_idx),
            DebugAttr::Hsc48Lcg => {
                let lut = selected(&inner)?;
                table_line(&lut.hsc48_lcg[lut.hsc48_lcg_idx])
            }
            DebugAttr::Hsc => table_line(&selected(&inner)?.hsc48_lut),
            DebugAttr::Aps => table_line(&selected(&inner)?.atc_lut),
            DebugAttr::ApsOnoff => format!("aps_onoff = {}\n", inner.shadow.atc_on.label()),
            DebugAttr::ApsLux => format!("lux {}\n", inner.shadow.atc_lux),
            DebugAttr::ApsDimOff => format!("aps_dim_off={}\n", inner.shadow.atc_dim_off),
            DebugAttr::Scl => table_line(&selected(&inner)?.scl_input),
            DebugAttr::De => table_line(&selected(&inner)?.de_lut),
            DebugAttr::ColorMode => "color_mode = 0\n".to_string(),
            DebugAttr::OffCtrl => {
                let fields: Vec<String> = OFF_CTRL
                    .iter()
                    .enumerate()
                    .map(|(i, (name, block))| match block.and_then(|b| inner.shadow.ctrl(b)) {
                        Some(ctrl) => format!("{}({}):{}", name, i, ctrl.label()),
                        None => format!("{}({})", name, i),
                    })
                    .collect();
                format!("{}\n", fields.join(","))
            }
            DebugAttr::Xml => {
                if inner.xml_suffix.is_empty() {
                    String::new()
                } else {
                    let path = format!("{}.xml", inner.xml_suffix);
                    info!("dqe{}: xml_path: {}", self.id, path);
                    format!("{}\n", path)
                }
            }
            DebugAttr::DqeVer => format!("{:08X}\n", inner.shadow.version),
            DebugAttr::DimStatus => format!("{}\n", u8::from(inner.dimming)),
            DebugAttr::Dump => {
                info!("dqe{}: {}", self.id, inner.regs.dump(true));
                "dump = 0\n".to_string()
            }
        };
        Ok(out)
    }

    /// Write an attribute; returns the number of bytes consumed
    pub fn store(&self, attr: DebugAttr, input: &str) -> DqeResult<usize> {
        if attr.is_read_only() {
            return Err(DqeError::ReadOnly(attr.name()));
        }
        let mut inner = self.lock();
        debug!("dqe{}: store {}", self.id, attr);

        let result = self.store_locked(&mut inner, attr, input);
        if let Err(e) = &result {
            error!("dqe{}: {} store failed: {}", self.id, attr, e);
        }
        result.map(|()| input.len())
    }

    fn store_locked(&self, inner: &mut DqeInner, attr: DebugAttr, input: &str) -> DqeResult<()> {
        match attr {
            DebugAttr::ModeIdx => {
                let value = scalar(input)? as usize;
                if value >= inner.store.len() {
                    return Err(DqeError::range("mode_idx", value as i64, inner.store.len() as i64 - 1));
                }
                inner.mode_idx = value;
            }
            DebugAttr::DispDither => {
                self.store_table(inner, RegBlock::DispDither, |lut| parse_lut(input, &mut lut.disp_dither))?;
            }
            DebugAttr::CgcDither => {
                self.store_table(inner, RegBlock::CgcDither, |lut| parse_lut(input, &mut lut.cgc_dither))?;
            }
            DebugAttr::Cgc17Idx => {
                let mut tokens = input.split_whitespace();
                let (Some(rgb), Some(idx)) = (tokens.next(), tokens.next()) else {
                    return Err(DqeError::token(input));
                };
                let (rgb, idx) = (parse_uint(rgb)?, parse_uint(idx)?);
                if rgb > 2 || idx as usize >= CGC_GRID {
                    return Err(DqeError::range("cgc17 index", i64::from(rgb.max(idx)), CGC_GRID as i64 - 1));
                }
                let lut = selected_mut(inner)?;
                lut.cgc17_enc_rgb = rgb as usize;
                lut.cgc17_enc_idx = idx as usize;
            }
            DebugAttr::Cgc17Enc => {
                let rows = parse_cgc(input)?;
                let lut = selected_mut(inner)?;
                lut.cgc17_encoded[lut.cgc17_enc_rgb][lut.cgc17_enc_idx] = rows;
            }
            DebugAttr::Cgc17Dec => {
                let value = scalar(input)?;
                let mask = u8::try_from(value).map_err(|_| DqeError::range("cgc17 decode mask", value, dpcm::CUBE_ALL))?;
                dpcm::decode_cube(selected_mut(inner)?, mask)?;
            }
            DebugAttr::Cgc17Con => {
                self.store_table_with(inner, RegBlock::Cgc, ResetKind::Full, |lut| {
                    parse_lut(input, &mut lut.cgc17_con)
                })?;
                if inner.mode_idx == MODE_MAIN {
                    self.counters.reset(ResetTarget::Cgc, ResetKind::Full);
                }
            }
            DebugAttr::GammaMatrix => {
                self.store_table(inner, RegBlock::GammaMatrix, |lut| {
                    let mut table = [0u32; GAMMA_MATRIX_LUT_MAX];
                    parse_lut(input, &mut table)?;
                    lut.gamma_matrix = table.map(|v| v as i32);
                    Ok(())
                })?;
            }
            DebugAttr::GammaExt => {
                let value = ext_flag(input)?;
                selected_mut(inner)?.regamma_lut_ext = value;
                info!("dqe{}: regamma extension {}", self.id, value);
            }
            DebugAttr::Gamma => {
                self.store_table(inner, RegBlock::Regamma, |lut| {
                    let bpc = BpcType::from_ext(lut.regamma_lut_ext != 0).index();
                    parse_lut(input, &mut lut.regamma_lut[bpc])
                })?;
            }
            DebugAttr::DegammaExt => {
                let value = ext_flag(input)?;
                selected_mut(inner)?.degamma_lut_ext = value;
                info!("dqe{}: degamma extension {}", self.id, value);
            }
            DebugAttr::Degamma => {
                self.store_table(inner, RegBlock::Degamma, |lut| {
                    let bpc = BpcType::from_ext(lut.degamma_lut_ext != 0).index();
                    parse_lut(input, &mut lut.degamma_lut[bpc])
                })?;
            }
            DebugAttr::Hsc48Idx => {
                let value = scalar(input)? as usize;
                if value >= HSC_LCG_NUM {
                    return Err(DqeError::range("hsc48 lcg index", value as i64, HSC_LCG_NUM as i64 - 1));
                }
                selected_mut(inner)?.hsc48_lcg_idx = value;
                info!("dqe{}: lcg idx {}", self.id, value);
            }
            DebugAttr::Hsc48Lcg => {
                let lut = selected_mut(inner)?;
                let idx = lut.hsc48_lcg_idx;
                parse_lut(input, &mut lut.hsc48_lcg[idx])?;
            }
            DebugAttr::Hsc => {
                self.store_table(inner, RegBlock::Hsc, |lut| parse_lut(input, &mut lut.hsc48_lut))?;
            }
            DebugAttr::Aps => {
                self.store_table(inner, RegBlock::Atc, |lut| parse_lut(input, &mut lut.atc_lut))?;
            }
            DebugAttr::ApsOnoff => {
                let value = scalar(input)?;
                inner.shadow.atc_on.set_forced_off(value == 0);
                self.counters.reset(ResetTarget::Global, ResetKind::Opt);
            }
            DebugAttr::ApsLux => {
                inner.shadow.atc_lux = scalar(input)?;
                info!("dqe{}: lux {}", self.id, inner.shadow.atc_lux);
            }
            DebugAttr::ApsDimOff => {
                inner.shadow.atc_dim_off = scalar(input)?;
                info!("dqe{}: aps_dim_off {}", self.id, inner.shadow.atc_dim_off);
            }
            DebugAttr::Scl => {
                self.store_table(inner, RegBlock::Scl, |lut| parse_lut(input, &mut lut.scl_input))?;
            }
            DebugAttr::De => {
                self.store_table(inner, RegBlock::De, |lut| parse_lut(input, &mut lut.de_lut))?;
            }
            DebugAttr::ColorMode => {
                let value = scalar(input)?;
                info!("dqe{}: color mode {}", self.id, value);
            }
            DebugAttr::OffCtrl => {
                let mut tokens = input.split_whitespace();
                let kind = tokens.next().ok_or_else(|| DqeError::token(input))?;
                let kind = parse_uint(kind)? as usize;
                let forced = match tokens.next() {
                    Some(token) => parse_uint(token)? != 0,
                    None => true,
                };
                match OFF_CTRL.get(kind) {
                    Some((_, None)) => {
                        for block in OFF_CTRL_ALL {
                            forced_off(&mut inner.shadow, block, forced);
                        }
                    }
                    Some((_, Some(block))) => forced_off(&mut inner.shadow, *block, forced),
                    None => debug!("dqe{}: off_ctrl type {} ignored", self.id, kind),
                }
                self.counters.reset(ResetTarget::Global, ResetKind::Full);
            }
            DebugAttr::Xml | DebugAttr::DqeVer | DebugAttr::DimStatus | DebugAttr::Dump => {
                return Err(DqeError::ReadOnly(attr.name()));
            }
        }
        Ok(())
    }

    fn store_table<F>(&self, inner: &mut DqeInner, block: RegBlock, parse: F) -> DqeResult<()>
    where
        F: FnOnce(&mut ModeLut) -> DqeResult<()>,
    {
        self.store_table_with(inner, block, ResetKind::Opt, parse)
    }

    /// Parse into the selected mode, re-encode `block` when that is MAIN and
    /// arm the global counter
    fn store_table_with<F>(&self, inner: &mut DqeInner, block: RegBlock, kind: ResetKind, parse: F) -> DqeResult<()>
    where
        F: FnOnce(&mut ModeLut) -> DqeResult<()>,
    {
        parse(selected_mut(inner)?)?;

        let DqeInner {
            store,
            shadow,
            cfg,
            mode_idx,
            ..
        } = inner;
        if *mode_idx == MODE_MAIN {
            encode_block(shadow, store.main(), BpcInfo::new(cfg.in_bpc), block, true);
        }
        self.counters.reset(ResetTarget::Global, kind);
        Ok(())
    }
}

fn selected_mut(inner: &mut DqeInner) -> DqeResult<&mut ModeLut> {
    let len = inner.store.len();
    inner
        .store
        .get_mut(inner.mode_idx)
        .ok_or_else(|| DqeError::range("mode_idx", inner.mode_idx as i64, len as i64 - 1))
}

fn ext_flag(input: &str) -> DqeResult<u32> {
    let value = scalar(input)?;
    if value > 1 {
        return Err(DqeError::range("ext flag", value, 1u32));
    }
    Ok(value)
}
