//! Store log framing.
//!
//! Frame layout:
//!
//! ```text
//! | magic "OBXL" (4) | payload len u32 LE (4) | CBOR payload | crc32 (4) |
//! ```
//!
//! The checksum covers magic, length, and payload.

use crate::collection::Collection;
use crate::error::{StoreError, StoreResult};
use crate::record::Record;
use serde::{Deserialize, Serialize};

/// Magic bytes opening every frame.
pub(crate) const LOG_MAGIC: [u8; 4] = *b"OBXL";

const HEADER_LEN: usize = 8;
const CRC_LEN: usize = 4;

/// One mutation recorded in the store log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) enum LogEntry {
    /// Insert or replace a record.
    Put {
        collection: Collection,
        record: Record,
    },
    /// Remove a record by key.
    Delete { collection: Collection, id: String },
    /// Remove every record in a collection.
    Clear { collection: Collection },
}

impl LogEntry {
    /// Encodes the entry as a complete frame.
    pub(crate) fn encode_frame(&self) -> StoreResult<Vec<u8>> {
        let mut payload = Vec::new();
        ciborium::ser::into_writer(self, &mut payload)
            .map_err(|e| StoreError::Codec(e.to_string()))?;

        let len = u32::try_from(payload.len()).map_err(|_| {
            StoreError::Codec(format!("log entry too large: {} bytes", payload.len()))
        })?;

        let mut frame = Vec::with_capacity(HEADER_LEN + payload.len() + CRC_LEN);
        frame.extend_from_slice(&LOG_MAGIC);
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&payload);
        let crc = compute_crc32(&frame);
        frame.extend_from_slice(&crc.to_le_bytes());
        Ok(frame)
    }
}

/// Entries recovered from a log, plus the length of its valid prefix.
#[derive(Debug)]
pub(crate) struct Replay {
    pub(crate) entries: Vec<LogEntry>,
    pub(crate) valid_len: u64,
}

/// Decodes every complete frame in `bytes`.
///
/// A short or checksum-failing final frame is a torn write: decoding stops
/// and `valid_len` marks where it began. A bad frame with data after it is
/// corruption.
pub(crate) fn decode_frames(bytes: &[u8]) -> StoreResult<Replay> {
    let mut entries = Vec::new();
    let mut offset = 0usize;

    while offset < bytes.len() {
        let rest = &bytes[offset..];
        if rest.len() < HEADER_LEN {
            break;
        }
        if rest[..4] != LOG_MAGIC {
            return Err(StoreError::corrupted(offset as u64, "bad frame magic"));
        }

        let len = u32::from_le_bytes([rest[4], rest[5], rest[6], rest[7]]) as usize;
        let frame_len = HEADER_LEN + len + CRC_LEN;
        if rest.len() < frame_len {
            break;
        }

        let body = &rest[..HEADER_LEN + len];
        let crc = &rest[HEADER_LEN + len..frame_len];
        let stored = u32::from_le_bytes([crc[0], crc[1], crc[2], crc[3]]);
        let computed = compute_crc32(body);
        if stored != computed {
            if offset + frame_len == bytes.len() {
                break;
            }
            return Err(StoreError::corrupted(
                offset as u64,
                format!("checksum mismatch: expected {stored:08x}, got {computed:08x}"),
            ));
        }

        let entry: LogEntry = ciborium::de::from_reader(&body[HEADER_LEN..]).map_err(|e| {
            StoreError::corrupted(offset as u64, format!("undecodable entry: {e}"))
        })?;
        entries.push(entry);
        offset += frame_len;
    }

    Ok(Replay {
        entries,
        valid_len: offset as u64,
    })
}

/// CRC32 (IEEE polynomial).
pub(crate) fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}
