//! Index artifact: the flat index's vectors in a checksummed binary frame.
//!
//! Layout: `[magic: "FVIX"][length: u64][crc32: u32][payload: bincode(IndexPayload)]`,
//! integers little-endian. The CRC covers the payload only.
//!
//! The payload also carries the digest of the identifier artifact written
//! alongside it, so a pair assembled from two different builds is detectable.

use crate::error::{Result, RetrievalError};
use crate::flat_index::FlatIndex;
use crate::index::Index;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::Path;

const MAGIC: &[u8; 4] = b"FVIX";
const FORMAT_VERSION: u32 = 2;
const HEADER_SIZE: usize = 16;

#[derive(Serialize)]
struct IndexPayloadRef<'a> {
    version: u32,
    identifiers_digest: u32,
    dimension: u64,
    count: u64,
    data: &'a [f32],
}

#[derive(Deserialize)]
struct IndexPayload {
    version: u32,
    identifiers_digest: u32,
    dimension: u64,
    count: u64,
    data: Vec<f32>,
}

/// A decoded index artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexArtifact {
    pub index: FlatIndex,
    /// Digest of the identifiers this index was persisted with.
    pub identifiers_digest: u32,
}

/// Encode an index into artifact bytes.
pub fn encode(index: &FlatIndex, identifiers_digest: u32) -> Result<Vec<u8>> {
    let payload = bincode::serialize(&IndexPayloadRef {
        version: FORMAT_VERSION,
        identifiers_digest,
        dimension: index.dimension() as u64,
        count: index.len() as u64,
        data: index.as_slice(),
    })
    .map_err(|e| RetrievalError::SerializationError(e.to_string()))?;

    let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len());
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    bytes.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Decode artifact bytes read from `path`. Every failure is a `CorruptArtifact`.
pub fn decode(bytes: &[u8], path: &Path) -> Result<IndexArtifact> {
    if bytes.len() < HEADER_SIZE {
        return Err(RetrievalError::corrupt(path, "file too small for header"));
    }
    if &bytes[0..4] != MAGIC {
        return Err(RetrievalError::corrupt(path, "not an index artifact (bad magic)"));
    }

    let mut len_buf = [0u8; 8];
    len_buf.copy_from_slice(&bytes[4..12]);
    let mut crc_buf = [0u8; 4];
    crc_buf.copy_from_slice(&bytes[12..16]);

    let payload = &bytes[HEADER_SIZE..];
    if u64::from_le_bytes(len_buf) != payload.len() as u64 {
        return Err(RetrievalError::corrupt(
            path,
            format!(
                "payload length {} does not match header length {}",
                payload.len(),
                u64::from_le_bytes(len_buf)
            ),
        ));
    }
    if crc32fast::hash(payload) != u32::from_le_bytes(crc_buf) {
        return Err(RetrievalError::corrupt(path, "checksum mismatch"));
    }

    let decoded: IndexPayload =
        bincode::deserialize(payload).map_err(|e| RetrievalError::corrupt(path, e))?;
    if decoded.version != FORMAT_VERSION {
        return Err(RetrievalError::corrupt(
            path,
            format!("unsupported format version {}", decoded.version),
        ));
    }

    let dimension = usize::try_from(decoded.dimension)
        .map_err(|_| RetrievalError::corrupt(path, "dimension out of range"))?;
    let index = FlatIndex::from_raw(dimension, decoded.data)
        .map_err(|e| RetrievalError::corrupt(path, e))?;
    if index.len() as u64 != decoded.count {
        return Err(RetrievalError::corrupt(
            path,
            format!("header declares {} vectors, found {}", decoded.count, index.len()),
        ));
    }
    Ok(IndexArtifact {
        index,
        identifiers_digest: decoded.identifiers_digest,
    })
}

/// Write an index artifact to `path`, replacing any existing file.
pub fn write(path: &Path, index: &FlatIndex, identifiers_digest: u32) -> Result<()> {
    let bytes = encode(index, identifiers_digest)?;
    fs::write(path, &bytes)?;
    Ok(())
}

/// Read an index artifact, memory-mapping the file when possible.
pub fn read(path: &Path) -> Result<IndexArtifact> {
    let file = File::open(path).map_err(|e| RetrievalError::corrupt(path, e))?;

    // SAFETY: the mapping is read-only and dropped before returning; the
    // artifact is only replaced by rename, never rewritten in place.
    match unsafe { memmap2::Mmap::map(&file) } {
        Ok(mmap) => decode(&mmap, path),
        Err(_) => {
            let bytes = fs::read(path).map_err(|e| RetrievalError::corrupt(path, e))?;
            decode(&bytes, path)
        }
    }
}
