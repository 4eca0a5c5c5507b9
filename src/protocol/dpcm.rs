//! CGC17 DPCM codec
//!
//! One record packs 17 samples (13 bits each) into 5 words. The top two bits
//! of word 0 select the mode:
//!
//! ```text
//! mode 0:   [31:30]=0 [29:17]=first [16:4]=explicit [3:0]=pos
//!           sample[pos+1] = explicit, byte[pos] is a signed offset (>128 wraps)
//!           sample[i] = sample[i-1] + byte[i-1] + offset for the others
//! mode 1,2: [31:30]=mode [29:17]=min [16:12]=min_pos
//!           sample[i] = min + (byte[k++] << shift), shift 1 for mode 1, 0 for 2
//! ```
//!
//! Bytes are taken MSB first from words 1..=4.

use crate::context::{CgcEncoded, CgcEncodedPlane, ModeLut};
use crate::error::{DqeError, DqeResult};
use crate::regs::{CGC_ENC_WORDS, CGC_GRID, CGC_LUT_MAX};

/// Samples carried by one record
pub const DPCM_SAMPLES: usize = CGC_GRID;

const SAMPLE_MASK: u32 = 0x1fff;
const DELTAS: usize = (CGC_ENC_WORDS - 1) * 4;

/// Channel mask covering R, G and B
pub const CUBE_ALL: u8 = 0x7;

fn delta_bytes(encoded: &CgcEncoded) -> [u32; DELTAS] {
    let mut dpcm = [0u32; DELTAS];
    for (i, byte) in dpcm.iter_mut().enumerate() {
        let word = encoded[1 + i / 4];
        *byte = (word >> (24 - 8 * (i % 4))) & 0xff;
    }
    dpcm
}

fn pack_bytes(encoded: &mut CgcEncoded, dpcm: &[u32; DELTAS]) {
    for (i, byte) in dpcm.iter().enumerate() {
        encoded[1 + i / 4] |= (byte & 0xff) << (24 - 8 * (i % 4));
    }
}

/// Decode one record into 17 samples
pub fn decode(encoded: &CgcEncoded) -> DqeResult<[u32; DPCM_SAMPLES]> {
    let e0 = encoded[0];
    let mode = ((e0 >> 30) & 0x3) as u8;
    let dpcm = delta_bytes(encoded);
    let mut out = [0i32; DPCM_SAMPLES];

    if mode == 0 {
        let max_pos = (e0 & 0xf) as usize;
        out[0] = ((e0 >> 17) & SAMPLE_MASK) as i32;
        out[max_pos + 1] = ((e0 >> 4) & SAMPLE_MASK) as i32;

        let mut offset = dpcm[max_pos] as i32;
        if offset > 128 {
            offset -= 256;
        }
        for idx in 1..DPCM_SAMPLES {
            if idx != max_pos + 1 {
                out[idx] = out[idx - 1]
                    .wrapping_add(dpcm[idx - 1] as i32)
                    .wrapping_add(offset);
            }
        }
    } else {
        let shift = if mode == 2 { 0 } else { 1 };
        let min_pos = ((e0 >> 12) & 0x1f) as usize;
        if min_pos >= DPCM_SAMPLES {
            return Err(DqeError::Dpcm {
                mode,
                reason: format!("min position {} out of range", min_pos),
            });
        }
        let min = ((e0 >> 17) & SAMPLE_MASK) as i32;
        out[min_pos] = min;

        let mut deltas = dpcm.iter();
        for (idx, sample) in out.iter_mut().enumerate() {
            if idx != min_pos {
                let delta = deltas.next().copied().unwrap_or(0);
                *sample = min + ((delta as i32) << shift);
            }
        }
    }

    Ok(out.map(|v| v as u32))
}

fn dpcm_err(mode: u8, reason: impl Into<String>) -> DqeError {
    DqeError::Dpcm {
        mode,
        reason: reason.into(),
    }
}

fn encode_mode0(samples: &[u32; DPCM_SAMPLES]) -> DqeResult<CgcEncoded> {
    let diff: Vec<i64> = (1..DPCM_SAMPLES)
        .map(|i| samples[i] as i64 - samples[i - 1] as i64)
        .collect();

    for pos in 0..DELTAS {
        // every delta except the explicit one must land in 0..=255 after the offset
        let others = diff.iter().enumerate().filter(|(i, _)| *i != pos).map(|(_, d)| *d);
        let (lo, hi) = others.fold((i64::MAX, i64::MIN), |(lo, hi), d| (lo.min(d), hi.max(d)));
        let offset = lo.min(128);
        if offset < -127 || hi - offset > 255 {
            continue;
        }

        let mut dpcm = [0u32; DELTAS];
        for (i, d) in diff.iter().enumerate() {
            dpcm[i] = if i == pos {
                (offset as i32 as u32) & 0xff
            } else {
                (d - offset) as u32
            };
        }

        let mut encoded = [0u32; CGC_ENC_WORDS];
        encoded[0] = (samples[0] << 17) | (samples[pos + 1] << 4) | pos as u32;
        pack_bytes(&mut encoded, &dpcm);
        return Ok(encoded);
    }

    Err(dpcm_err(0, "deltas do not fit a shared offset"))
}

fn encode_min(samples: &[u32; DPCM_SAMPLES], mode: u8) -> DqeResult<CgcEncoded> {
    let shift = if mode == 2 { 0 } else { 1 };
    let (min_pos, min) = samples
        .iter()
        .copied()
        .enumerate()
        .min_by_key(|&(_, v)| v)
        .unwrap_or((0, 0));

    let mut dpcm = [0u32; DELTAS];
    let others = samples.iter().enumerate().filter(|(i, _)| *i != min_pos);
    for (slot, (_, &v)) in dpcm.iter_mut().zip(others) {
        let delta = v - min;
        if delta & ((1 << shift) - 1) != 0 {
            return Err(dpcm_err(mode, format!("odd delta {}", delta)));
        }
        if delta >> shift > 0xff {
            return Err(dpcm_err(mode, format!("delta {} too large", delta)));
        }
        *slot = delta >> shift;
    }

    let mut encoded = [0u32; CGC_ENC_WORDS];
    encoded[0] = ((mode as u32) << 30) | (min << 17) | ((min_pos as u32) << 12);
    pack_bytes(&mut encoded, &dpcm);
    Ok(encoded)
}

/// Encode 17 samples in wire mode 0, 1 or 2
pub fn encode(samples: &[u32; DPCM_SAMPLES], mode: u8) -> DqeResult<CgcEncoded> {
    if let Some(v) = samples.iter().find(|&&v| v > SAMPLE_MASK) {
        return Err(dpcm_err(mode, format!("sample {} exceeds 13 bits", v)));
    }
    match mode {
        0 => encode_mode0(samples),
        1 | 2 => encode_min(samples, mode),
        _ => Err(dpcm_err(mode, "unknown mode")),
    }
}

/// First of mode 2, 1, 0 able to carry the samples
pub fn encode_best(samples: &[u32; DPCM_SAMPLES]) -> DqeResult<CgcEncoded> {
    encode(samples, 2)
        .or_else(|_| encode(samples, 1))
        .or_else(|_| encode(samples, 0))
}

/// Visit every record selected by `mask` with its decoded samples.
///
/// `visit(channel, row, col, samples)`; rows are G for R and B, R for G.
pub fn walk_cube<F>(encoded: &[CgcEncodedPlane], mask: u8, mut visit: F) -> DqeResult<()>
where
    F: FnMut(usize, usize, usize, &[u32; DPCM_SAMPLES]),
{
    if !(1..=CUBE_ALL).contains(&mask) {
        return Err(DqeError::range("cgc17 decode mask", mask, CUBE_ALL));
    }
    for (channel, plane) in encoded.iter().enumerate().take(3) {
        if mask & (1 << channel) == 0 {
            continue;
        }
        for (row, records) in plane.iter().enumerate() {
            for (col, record) in records.iter().enumerate() {
                let samples = decode(record)?;
                visit(channel, row, col, &samples);
            }
        }
    }
    Ok(())
}

/// Cube index of sample `ii` of record (`row`, `col`) in `channel`
pub fn cube_index(channel: usize, row: usize, col: usize, ii: usize) -> usize {
    let plane = CGC_GRID * CGC_GRID;
    match channel {
        // R: rows are G, cols are R
        0 => col * plane + row * CGC_GRID + ii,
        // G: rows are R, cols are G
        1 => row * plane + col * CGC_GRID + ii,
        // B: rows are G, cols are B, samples walk R
        _ => ii * plane + row * CGC_GRID + col,
    }
}

/// Decode the channels in `mask` into `lut.cgc17_lut`; untouched on error
pub fn decode_cube(lut: &mut ModeLut, mask: u8) -> DqeResult<()> {
    let mut cube = lut.cgc17_lut.clone();
    walk_cube(&lut.cgc17_encoded, mask, |channel, row, col, samples| {
        for (ii, &v) in samples.iter().enumerate() {
            cube[channel][cube_index(channel, row, col, ii)] = v;
        }
    })?;
    lut.cgc17_lut = cube;
    Ok(())
}

/// Build the DPCM planes for a decoded cube
pub fn encode_cube(cube: &[[u32; CGC_LUT_MAX]]) -> DqeResult<Vec<CgcEncodedPlane>> {
    let mut planes = vec![[[[0u32; CGC_ENC_WORDS]; CGC_GRID]; CGC_GRID]; 3];
    for (channel, plane) in planes.iter_mut().enumerate() {
        for (row, records) in plane.iter_mut().enumerate() {
            for (col, record) in records.iter_mut().enumerate() {
                let mut samples = [0u32; DPCM_SAMPLES];
                for (ii, s) in samples.iter_mut().enumerate() {
                    *s = cube[channel][cube_index(channel, row, col, ii)];
                }
                *record = encode_best(&samples)?;
            }
        }
    }
    Ok(planes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn ramp(start: u32, step: u32) -> [u32; DPCM_SAMPLES] {
        std::array::from_fn(|i| start + step * i as u32)
    }

    #[test]
    fn test_decode_mode0_by_hand() {
        // first = 100, sample[3] explicit = 500, offset byte[2] = 0xff (-1)
        let mut dpcm = [11u32; DELTAS];
        dpcm[2] = 0xff;
        let mut enc = [0u32; CGC_ENC_WORDS];
        enc[0] = (100 << 17) | (500 << 4) | 2;
        pack_bytes(&mut enc, &dpcm);

        let out = decode(&enc).unwrap();
        assert_eq!(out[0], 100);
        assert_eq!(out[1], 110);
        assert_eq!(out[2], 120);
        assert_eq!(out[3], 500);
        assert_eq!(out[4], 510);
        assert_eq!(out[16], 500 + 13 * 10);
    }

    #[test]
    fn test_decode_mode2_by_hand() {
        let mut enc = [0u32; CGC_ENC_WORDS];
        enc[0] = (2 << 30) | (40 << 17) | (5 << 12);
        enc[1] = 0x0102_0304;
        let out = decode(&enc).unwrap();
        assert_eq!(&out[..6], &[41, 42, 43, 44, 40, 40]);
    }

    #[test]
    fn test_decode_rejects_min_pos() {
        let enc = [(1 << 30) | (20 << 12), 0, 0, 0, 0];
        assert!(matches!(decode(&enc), Err(DqeError::Dpcm { mode: 1, .. })));
    }

    #[rstest]
    #[case(0, ramp(0, 256))]
    #[case(0, ramp(4096, 0))]
    #[case(1, ramp(1000, 30))]
    #[case(2, ramp(17, 15))]
    fn test_round_trip(#[case] mode: u8, #[case] samples: [u32; DPCM_SAMPLES]) {
        let enc = encode(&samples, mode).unwrap();
        assert_eq!((enc[0] >> 30) as u8, mode);
        assert_eq!(decode(&enc).unwrap(), samples);
    }

    #[test]
    fn test_round_trip_mode0_with_step() {
        // one jump goes into the explicit sample, the rest share the offset
        let samples: [u32; DPCM_SAMPLES] =
            std::array::from_fn(|i| if i < 9 { 100 * i as u32 } else { 5000 + 100 * (i as u32 - 9) });
        let enc = encode(&samples, 0).unwrap();
        assert_eq!(enc[0] & 0xf, 8);
        assert_eq!(decode(&enc).unwrap(), samples);
    }

    #[test]
    fn test_encode_limits() {
        assert!(encode(&ramp(0, 1), 1).is_err());
        assert!(encode(&ramp(0, 256), 2).is_err());
        assert!(encode(&ramp(0x1fff, 1), 2).is_err());
        assert!(encode(&ramp(0, 1), 3).is_err());
    }

    #[test]
    fn test_encode_best_prefers_mode2() {
        let enc = encode_best(&ramp(0, 10)).unwrap();
        assert_eq!(enc[0] >> 30, 2);
        let enc = encode_best(&ramp(0, 300)).unwrap();
        assert_eq!(enc[0] >> 30, 0);
    }

    #[test]
    fn test_identity_cube_round_trip() {
        let mut lut = ModeLut::new();
        let identity = lut.cgc17_lut.clone();
        lut.cgc17_encoded = encode_cube(&identity).unwrap();
        lut.cgc17_lut = vec![[0; CGC_LUT_MAX]; 3];

        decode_cube(&mut lut, CUBE_ALL).unwrap();
        assert!(lut.cgc17_lut == identity);
    }

    #[test]
    fn test_decode_cube_mask() {
        let mut lut = ModeLut::new();
        lut.cgc17_encoded = encode_cube(&lut.cgc17_lut).unwrap();
        lut.cgc17_lut = vec![[0; CGC_LUT_MAX]; 3];

        decode_cube(&mut lut, 0x2).unwrap();
        assert_eq!(lut.cgc17_lut[0][CGC_LUT_MAX - 1], 0);
        assert_eq!(lut.cgc17_lut[1][CGC_LUT_MAX - 1], 16 * 256);
        assert!(decode_cube(&mut lut, 0).is_err());
        assert!(decode_cube(&mut lut, 8).is_err());
    }
}
