//! Colormode blob headers
//!
//! Both headers are 12 bytes, fields little-endian:
//!
//! ```text
//! global: magic(u8) seq(u8) total_size(u16) header_size(u16) num_data(u16) reserved(u32)
//! record: magic(u8) id(u8)  total_size(u16) header_size(u16) attr[4](u8)   reserved(u16)
//! ```

use crate::error::{DqeError, DqeResult};

/// Sentinel in the first byte of every header
pub const COLORMODE_MAGIC: u8 = 0xDA;
/// Encoded size of [`GlobalHeader`]
pub const GLOBAL_HEADER_SIZE: usize = 12;
/// Encoded size of [`RecordHeader`]
pub const RECORD_HEADER_SIZE: usize = 12;

fn le16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

/// Check the size pair shared by both header kinds
fn check_sizes(total: u16, header: u16, min_header: usize) -> Result<(), String> {
    if total == 0 || header == 0 || total < header || (header as usize) < min_header {
        return Err(format!("invalid size: total {}, header {}", total, header));
    }
    Ok(())
}

/// Blob-level header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalHeader {
    /// Must be [`COLORMODE_MAGIC`]
    pub magic: u8,
    /// Producer sequence number; unchanged means nothing new
    pub seq: u8,
    /// Size of the whole blob including this header
    pub total_size: u16,
    /// Offset of the first record
    pub header_size: u16,
    /// Number of records the producer wrote
    pub num_data: u16,
}

impl GlobalHeader {
    /// Header for a blob of `total_size` bytes holding `num_data` records
    pub fn new(seq: u8, total_size: u16, num_data: u16) -> Self {
        Self {
            magic: COLORMODE_MAGIC,
            seq,
            total_size,
            header_size: GLOBAL_HEADER_SIZE as u16,
            num_data,
        }
    }

    /// Read and validate the header at the start of `blob`
    pub fn parse(blob: &[u8]) -> DqeResult<Self> {
        if blob.len() < GLOBAL_HEADER_SIZE {
            return Err(DqeError::InvalidHeader(format!("blob too short ({} bytes)", blob.len())));
        }
        let hdr = Self {
            magic: blob[0],
            seq: blob[1],
            total_size: le16(blob, 2),
            header_size: le16(blob, 4),
            num_data: le16(blob, 6),
        };
        if hdr.magic != COLORMODE_MAGIC {
            return Err(DqeError::InvalidHeader(format!("invalid header magic {:x}", hdr.magic)));
        }
        check_sizes(hdr.total_size, hdr.header_size, GLOBAL_HEADER_SIZE)
            .map_err(DqeError::InvalidHeader)?;
        Ok(hdr)
    }

    /// Encoded form
    pub fn to_bytes(&self) -> [u8; GLOBAL_HEADER_SIZE] {
        let mut out = [0u8; GLOBAL_HEADER_SIZE];
        out[0] = self.magic;
        out[1] = self.seq;
        out[2..4].copy_from_slice(&self.total_size.to_le_bytes());
        out[4..6].copy_from_slice(&self.header_size.to_le_bytes());
        out[6..8].copy_from_slice(&self.num_data.to_le_bytes());
        out
    }
}

/// Per-record header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Must be [`COLORMODE_MAGIC`]
    pub magic: u8,
    /// Raw block id, see [`super::BlockId`]
    pub id: u8,
    /// Record size including this header
    pub total_size: u16,
    /// Offset of the payload inside the record
    pub header_size: u16,
    /// Block specific attributes
    pub attr: [u8; 4],
}

impl RecordHeader {
    /// Header for a record carrying `payload_len` bytes
    pub fn new(id: u8, attr: [u8; 4], payload_len: usize) -> Self {
        Self {
            magic: COLORMODE_MAGIC,
            id,
            total_size: (RECORD_HEADER_SIZE + payload_len) as u16,
            header_size: RECORD_HEADER_SIZE as u16,
            attr,
        }
    }

    /// Read and validate the record header at `offset` of `blob`
    pub fn parse(blob: &[u8], offset: usize) -> DqeResult<Self> {
        let bytes = blob
            .get(offset..offset + RECORD_HEADER_SIZE)
            .ok_or_else(|| DqeError::InvalidHeader(format!("record at {} past end of blob", offset)))?;
        let hdr = Self {
            magic: bytes[0],
            id: bytes[1],
            total_size: le16(bytes, 2),
            header_size: le16(bytes, 4),
            attr: [bytes[6], bytes[7], bytes[8], bytes[9]],
        };
        if hdr.magic != COLORMODE_MAGIC {
            return Err(DqeError::InvalidHeader(format!("invalid data magic {:x}", hdr.magic)));
        }
        check_sizes(hdr.total_size, hdr.header_size, RECORD_HEADER_SIZE)
            .map_err(|e| DqeError::InvalidHeader(format!("record {}: {}", hdr.id, e)))?;
        Ok(hdr)
    }

    /// Encoded form
    pub fn to_bytes(&self) -> [u8; RECORD_HEADER_SIZE] {
        let mut out = [0u8; RECORD_HEADER_SIZE];
        out[0] = self.magic;
        out[1] = self.id;
        out[2..4].copy_from_slice(&self.total_size.to_le_bytes());
        out[4..6].copy_from_slice(&self.header_size.to_le_bytes());
        out[6..10].copy_from_slice(&self.attr);
        out
    }
}
