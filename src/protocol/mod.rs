//! Colormode wire protocol
//!
//! A colormode blob is a [`GlobalHeader`] followed by tagged records, each a
//! [`RecordHeader`] plus a NUL terminated text payload. Every record targets
//! one table of the MAIN mode. CGC17 records carry one DPCM row set each; the
//! cube is decoded once all 51 (3 channels x 17 rows) have arrived.
//!
//! Decoding is split in two passes so a blob is either rejected up front or
//! applied record by record:
//!
//! ```rust
//! use exynos_dqe::context::ModeLut;
//! use exynos_dqe::protocol::{decode_into, BlockId, ColormodeBuilder};
//! use exynos_dqe::regs::BlockMask;
//!
//! let blob = ColormodeBuilder::new(1)
//!     .record(BlockId::CgcDither, [0; 4], "1,0,0,0,0,0,0,1")
//!     .build();
//! let mut lut = ModeLut::new();
//! let updated = decode_into(&mut lut, &blob).unwrap();
//! assert!(updated.contains(BlockMask::CGC_DITHER));
//! ```

pub mod dpcm;
mod header;
pub mod text;

pub use header::{GlobalHeader, RecordHeader, COLORMODE_MAGIC, GLOBAL_HEADER_SIZE, RECORD_HEADER_SIZE};

use crate::context::{BpcType, ModeLut, HSC_LUT_MAX};
use crate::error::{DqeError, DqeResult};
use crate::regs::{
    BlockMask, CGC_CON_LUT_MAX, CGC_DITHER_LUT_MAX, CGC_GRID, DEGAMMA_LUT_MAX,
    GAMMA_MATRIX_LUT_MAX, HSC_LCG_NUM, HSC_LUT_LSC_GAIN_MAX, REGAMMA_LUT_MAX, SCL_INPUT_MAX,
};
use log::{debug, warn};
use std::borrow::Cow;

/// CGC17 records needed for a full cube
pub const CGC17_RECORDS: u16 = (3 * CGC_GRID) as u16;

/// Sequence number that never matches a fresh device
pub const SEQ_NONE: u8 = 0xFF;

/// Record block ids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BlockId {
    /// One DPCM row set of the CGC cube
    Cgc17Enc = 1,
    /// CGC enable and mixing controls
    Cgc17Con = 2,
    /// CGC dither
    CgcDither = 3,
    /// Degamma curve
    Degamma = 4,
    /// Regamma curve
    Gamma = 5,
    /// Gamma matrix
    GammaMatrix = 6,
    /// One HSC local gain table
    Hsc48Lcg = 7,
    /// HSC control and polynomial
    Hsc = 8,
    /// Scaler override input
    Scl = 9,
}

impl BlockId {
    /// Known id for a raw byte
    pub fn from_raw(raw: u8) -> Option<Self> {
        Some(match raw {
            1 => BlockId::Cgc17Enc,
            2 => BlockId::Cgc17Con,
            3 => BlockId::CgcDither,
            4 => BlockId::Degamma,
            5 => BlockId::Gamma,
            6 => BlockId::GammaMatrix,
            7 => BlockId::Hsc48Lcg,
            8 => BlockId::Hsc,
            9 => BlockId::Scl,
            _ => return None,
        })
    }
}

/// One record of a validated blob
#[derive(Debug, Clone)]
pub struct Record<'a> {
    /// Record header
    pub header: RecordHeader,
    /// Payload text up to the first NUL
    pub payload: Cow<'a, str>,
}

/// Validate every record header after the global header.
///
/// Nothing is applied here, so a malformed record rejects the blob before any
/// table changes.
pub fn parse_records<'a>(blob: &'a [u8], hdr: &GlobalHeader) -> DqeResult<Vec<Record<'a>>> {
    let total = hdr.total_size as usize;
    if total > blob.len() {
        return Err(DqeError::InvalidHeader(format!(
            "total size {} exceeds buffer of {}",
            total,
            blob.len()
        )));
    }

    let mut records = Vec::new();
    let mut offset = hdr.header_size as usize;
    while offset < total {
        let header = RecordHeader::parse(blob, offset)?;
        let end = offset + header.total_size as usize;
        if end > blob.len() {
            return Err(DqeError::InvalidHeader(format!(
                "record {} at {} overruns buffer",
                header.id, offset
            )));
        }

        let body = &blob[offset + header.header_size as usize..end];
        let text = body.iter().position(|&b| b == 0).map_or(body, |nul| &body[..nul]);
        records.push(Record {
            header,
            payload: String::from_utf8_lossy(text),
        });
        offset = end;
    }
    Ok(records)
}

fn parse_table<const N: usize>(id: u8, payload: &str) -> DqeResult<[u32; N]> {
    let mut table = [0u32; N];
    text::parse_lut(payload, &mut table).map_err(|e| {
        DqeError::record(id, format!("str2lut error, len {}: {}", N, e))
    })?;
    Ok(table)
}

/// Bit-depth table targeted by a curve record and the ext flag it implies
fn curve_target(attr: u8, ext: u32) -> (BpcType, u32) {
    match attr {
        8 => (BpcType::Bpc8, 1),
        10 => (BpcType::Bpc10, ext),
        _ => (BpcType::Bpc10, 0),
    }
}

/// State of one pass over the records of a blob
#[derive(Debug, Default)]
pub struct ColormodeWalk {
    id: u32,
    count: u16,
    count_cgc: u16,
    updated: BlockMask,
}

impl ColormodeWalk {
    /// Fresh pass; `id` prefixes log lines
    pub fn new(id: u32) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Blocks changed so far
    pub fn updated(&self) -> BlockMask {
        self.updated
    }

    /// Apply one record to `lut`, returning the blocks it changed.
    ///
    /// The payload is parsed in full before anything is stored.
    pub fn apply(&mut self, lut: &mut ModeLut, record: &Record<'_>) -> DqeResult<BlockMask> {
        let hdr = &record.header;
        let payload = record.payload.as_ref();
        let Some(id) = BlockId::from_raw(hdr.id) else {
            debug!("dqe{}: undefined id {} but continued", self.id, hdr.id);
            return Ok(BlockMask::empty());
        };

        let mut changed = BlockMask::empty();
        match id {
            BlockId::Cgc17Enc => {
                let (rgb, idx) = (hdr.attr[0] as usize, hdr.attr[1] as usize);
                if rgb > 2 || idx >= CGC_GRID {
                    return Err(DqeError::record(hdr.id, format!("invalid CGC attr {}/{}", rgb, idx)));
                }
                let rows = text::parse_cgc(payload).map_err(|e| DqeError::record(hdr.id, e.to_string()))?;
                lut.cgc17_enc_rgb = rgb;
                lut.cgc17_enc_idx = idx;
                lut.cgc17_encoded[rgb][idx] = rows;
                self.count_cgc += 1;

                if self.count_cgc == CGC17_RECORDS {
                    dpcm::decode_cube(lut, dpcm::CUBE_ALL)?;
                    changed.insert(BlockMask::CGC);
                }
                self.updated |= changed;
                return Ok(changed);
            }
            BlockId::Cgc17Con => {
                lut.cgc17_con = parse_table::<CGC_CON_LUT_MAX>(hdr.id, payload)?;
                changed.insert(BlockMask::CGC_CON);
            }
            BlockId::CgcDither => {
                lut.cgc_dither = parse_table::<CGC_DITHER_LUT_MAX>(hdr.id, payload)?;
                changed.insert(BlockMask::CGC_DITHER);
            }
            BlockId::Degamma => {
                let table = parse_table::<DEGAMMA_LUT_MAX>(hdr.id, payload)?;
                let (bpc, ext) = curve_target(hdr.attr[0], lut.degamma_lut_ext);
                lut.degamma_lut[bpc.index()] = table;
                lut.degamma_lut_ext = ext;
                changed.insert(BlockMask::DEGAMMA);
            }
            BlockId::Gamma => {
                let table = parse_table::<REGAMMA_LUT_MAX>(hdr.id, payload)?;
                let (bpc, ext) = curve_target(hdr.attr[0], lut.regamma_lut_ext);
                lut.regamma_lut[bpc.index()] = table;
                lut.regamma_lut_ext = ext;
                changed.insert(BlockMask::REGAMMA);
            }
            BlockId::GammaMatrix => {
                let table = parse_table::<GAMMA_MATRIX_LUT_MAX>(hdr.id, payload)?;
                lut.gamma_matrix = table.map(|v| v as i32);
                changed.insert(BlockMask::GAMMA_MATRIX);
            }
            BlockId::Hsc48Lcg => {
                let sel = hdr.attr[0] as usize;
                if sel >= HSC_LCG_NUM {
                    return Err(DqeError::record(hdr.id, format!("invalid HSC attr {}", sel)));
                }
                lut.hsc48_lcg[sel] = parse_table::<HSC_LUT_LSC_GAIN_MAX>(hdr.id, payload)?;
                changed.insert(BlockMask::HSC);
            }
            BlockId::Hsc => {
                lut.hsc48_lut = parse_table::<HSC_LUT_MAX>(hdr.id, payload)?;
                changed.insert(BlockMask::HSC);
            }
            BlockId::Scl => {
                lut.scl_input = parse_table::<SCL_INPUT_MAX>(hdr.id, payload)?;
                changed.insert(BlockMask::SCL);
            }
        }

        self.count += 1;
        self.updated |= changed;
        Ok(changed)
    }

    /// Close the pass, warning on count mismatches
    pub fn finish(self, hdr: &GlobalHeader) -> BlockMask {
        if self.count_cgc != 0 && self.count_cgc != CGC17_RECORDS {
            warn!("dqe{}: invalid cgc17_enc count {}", self.id, self.count_cgc);
        }
        let seen = self.count + self.count_cgc;
        if hdr.num_data != seen {
            warn!("dqe{}: number of data {} vs {} mismatch", self.id, seen, hdr.num_data);
        }
        if !self.updated.is_empty() {
            debug!("dqe{}: context updated ({:x})", self.id, self.updated.bits());
        }
        self.updated
    }
}

/// Decode a whole blob into `lut` without sequence tracking
pub fn decode_into(lut: &mut ModeLut, blob: &[u8]) -> DqeResult<BlockMask> {
    let hdr = GlobalHeader::parse(blob)?;
    let records = parse_records(blob, &hdr)?;
    let mut walk = ColormodeWalk::new(0);
    for record in &records {
        walk.apply(lut, record)?;
    }
    Ok(walk.finish(&hdr))
}

/// Assembles colormode blobs, for tools and tests
#[derive(Debug, Clone)]
pub struct ColormodeBuilder {
    seq: u8,
    records: Vec<u8>,
    num_data: u16,
}

impl ColormodeBuilder {
    /// Empty blob with sequence number `seq`
    pub fn new(seq: u8) -> Self {
        Self {
            seq,
            records: Vec::new(),
            num_data: 0,
        }
    }

    /// Append a record with a NUL terminated payload
    pub fn record(mut self, id: BlockId, attr: [u8; 4], payload: &str) -> Self {
        self.push_raw(id as u8, attr, payload);
        self
    }

    /// Append a record with a raw id
    pub fn push_raw(&mut self, id: u8, attr: [u8; 4], payload: &str) {
        let hdr = RecordHeader::new(id, attr, payload.len() + 1);
        self.records.extend_from_slice(&hdr.to_bytes());
        self.records.extend_from_slice(payload.as_bytes());
        self.records.push(0);
        self.num_data += 1;
    }

    /// Append the 51 CGC17 records of a set of encoded planes
    pub fn cgc17(mut self, planes: &[crate::context::CgcEncodedPlane]) -> Self {
        for (rgb, plane) in planes.iter().enumerate().take(3) {
            for (idx, rows) in plane.iter().enumerate() {
                let payload = text::cgc_to_string(rows);
                self.push_raw(BlockId::Cgc17Enc as u8, [rgb as u8, idx as u8, 0, 0], &payload);
            }
        }
        self
    }

    /// Final byte image
    pub fn build(&self) -> Vec<u8> {
        let total = GLOBAL_HEADER_SIZE + self.records.len();
        let hdr = GlobalHeader::new(self.seq, total as u16, self.num_data);
        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(&hdr.to_bytes());
        out.extend_from_slice(&self.records);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CgcEncodedPlane;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn csv(values: impl IntoIterator<Item = i64>) -> String {
        values.into_iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",")
    }

    fn sample_blob() -> Vec<u8> {
        ColormodeBuilder::new(3)
            .record(BlockId::CgcDither, [0; 4], "1,1,0,2,1,0,1,1")
            .record(BlockId::GammaMatrix, [0; 4], &csv([1, 1024, -5, 0, 0, 0, 1024, 0, 0, 0, 0, 1024, 0, 0, 0, 0, 0]))
            .record(BlockId::Degamma, [8, 0, 0, 0], &csv((0..DEGAMMA_LUT_MAX as i64).map(|v| v + 1)))
            .build()
    }

    fn cube_planes() -> Vec<CgcEncodedPlane> {
        let mut lut = ModeLut::new();
        for (i, v) in lut.cgc17_lut[1].iter_mut().enumerate() {
            *v = (i % 4096) as u32 & !1;
        }
        dpcm::encode_cube(&lut.cgc17_lut).unwrap()
    }

    #[test]
    fn test_decode_tables() {
        let mut lut = ModeLut::new();
        let updated = decode_into(&mut lut, &sample_blob()).unwrap();

        assert!(updated.contains(BlockMask::CGC_DITHER));
        assert!(updated.contains(BlockMask::GAMMA_MATRIX));
        assert!(updated.contains(BlockMask::DEGAMMA));
        assert!(!updated.contains(BlockMask::CGC));
        assert_eq!(lut.cgc_dither, [1, 1, 0, 2, 1, 0, 1, 1]);
        assert_eq!(lut.gamma_matrix[2], -5);
        assert_eq!(lut.degamma_lut_ext, 1);
        assert_eq!(lut.degamma_lut[BpcType::Bpc8.index()][0], 1);
        // the 10-bit table is untouched
        assert_eq!(lut.degamma_lut[BpcType::Bpc10.index()], ModeLut::new().degamma_lut[0]);
    }

    #[rstest]
    #[case(8, 0, BpcType::Bpc8, 1)]
    #[case(10, 1, BpcType::Bpc10, 1)]
    #[case(0, 1, BpcType::Bpc10, 0)]
    fn test_curve_attr(#[case] attr: u8, #[case] ext: u32, #[case] bpc: BpcType, #[case] new_ext: u32) {
        assert_eq!(curve_target(attr, ext), (bpc, new_ext));
    }

    #[rstest]
    #[case::magic(0, 0xDB)]
    #[case::total_below_header(2, 8)]
    #[case::total_zero(2, 0)]
    #[case::header_too_small(4, 8)]
    #[case::header_zero(4, 0)]
    #[case::record_magic(12, 0x00)]
    #[case::record_total_below_header(14, 4)]
    #[case::record_header_too_small(16, 6)]
    fn test_malformed_header_leaves_context(#[case] at: usize, #[case] value: u8) {
        let mut blob = sample_blob();
        blob[at] = value;
        if at == 2 || at == 14 {
            blob[at + 1] = 0;
        }

        let mut lut = ModeLut::new();
        let before = lut.clone();
        let err = decode_into(&mut lut, &blob).unwrap_err();
        assert!(matches!(err, DqeError::InvalidHeader(_)), "{:?}", err);
        assert_eq!(lut, before);
    }

    #[test]
    fn test_record_overrun() {
        let mut blob = sample_blob();
        let len = blob.len();
        blob.truncate(len - 4);
        assert!(decode_into(&mut ModeLut::new(), &blob).is_err());
    }

    #[test]
    fn test_bad_token_aborts() {
        let blob = ColormodeBuilder::new(1)
            .record(BlockId::CgcDither, [0; 4], "1,1,0,x,1,0,1,1")
            .build();
        let mut lut = ModeLut::new();
        let err = decode_into(&mut lut, &blob).unwrap_err();
        assert!(matches!(err, DqeError::InvalidRecord { id: 3, .. }));
        assert_eq!(lut.cgc_dither, [0; CGC_DITHER_LUT_MAX]);
    }

    #[test]
    fn test_attr_ranges() {
        let blob = ColormodeBuilder::new(1)
            .record(BlockId::Hsc48Lcg, [3, 0, 0, 0], &csv(0..72))
            .build();
        assert!(decode_into(&mut ModeLut::new(), &blob).is_err());

        let blob = ColormodeBuilder::new(1)
            .record(BlockId::Cgc17Enc, [0, 17, 0, 0], &"0".repeat(text::CGC_TEXT_LEN))
            .build();
        assert!(decode_into(&mut ModeLut::new(), &blob).is_err());
    }

    #[test]
    fn test_unknown_id_is_skipped() {
        let mut builder = ColormodeBuilder::new(1);
        builder.push_raw(42, [0; 4], "whatever");
        let blob = builder.record(BlockId::Scl, [0; 4], &csv(0..13)).build();

        let mut lut = ModeLut::new();
        let updated = decode_into(&mut lut, &blob).unwrap();
        assert_eq!(updated, BlockMask::SCL);
        assert_eq!(lut.scl_input[12], 12);
    }

    #[test]
    fn test_cgc_gate_50_records() {
        let planes = cube_planes();
        let mut builder = ColormodeBuilder::new(1).cgc17(&planes);
        // drop the last record
        let full = builder.clone().build();
        let last = RECORD_HEADER_SIZE + text::CGC_TEXT_LEN + 1;
        let mut blob = full[..full.len() - last].to_vec();
        let total = (blob.len() as u16).to_le_bytes();
        blob[2..4].copy_from_slice(&total);

        let mut lut = ModeLut::new();
        let identity = lut.cgc17_lut.clone();
        let updated = decode_into(&mut lut, &blob).unwrap();
        assert!(!updated.contains(BlockMask::CGC));
        assert!(lut.cgc17_lut == identity);
        assert_eq!(lut.cgc17_encoded[2][15], planes[2][15]);

        builder = builder.record(BlockId::CgcDither, [0; 4], "1,0,0,0,0,0,0,0");
        let updated = decode_into(&mut lut, &builder.build()).unwrap();
        assert!(updated.contains(BlockMask::CGC));
        assert_eq!(lut.cgc17_lut[1][4095], 4094);
    }
}
