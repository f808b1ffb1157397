//! PNG chunk-stream codec.
//!
//! A PNG file is an 8-byte signature followed by chunks. Each chunk is a
//! 4-byte big-endian payload length, a 4-byte ASCII type tag, the payload,
//! and a CRC-32 over tag and payload. The stream ends with an `IEND` chunk.
//!
//! This module only deals with that container layer. Chunk payloads are
//! treated as opaque bytes, so any chunk the codec does not touch is written
//! back exactly as it was read.
//!
//! # Example
//!
//! ```no_run
//! use xlabel::png::{self, XLABEL_CHUNK_TYPE};
//!
//! # fn demo(bytes: &[u8]) -> Result<(), xlabel::XlabelError> {
//! let chunks = png::parse(bytes)?;
//! let chunks = png::insert_or_replace_chunk(chunks, XLABEL_CHUNK_TYPE, b"{}".to_vec())?;
//! let rewritten = png::serialize(&chunks);
//! # Ok(())
//! # }
//! ```

mod chunk;

pub use chunk::{compute_crc, Chunk, ChunkType, MAX_CHUNK_LENGTH};

use crate::error::XlabelError;

/// The fixed 8-byte PNG file signature.
pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n'];

/// Chunk type used for embedded annotation data.
///
/// Lowercase first letter: ancillary. Lowercase second letter: private.
/// Lowercase last letter: safe to copy.
pub const XLABEL_CHUNK_TYPE: ChunkType = ChunkType(*b"xlDa");

/// Parses a PNG byte stream into its chunks.
///
/// # Errors
///
/// Returns [`XlabelError::MalformedPng`] when the signature is wrong, a
/// chunk header or payload is truncated, a CRC does not match, the first
/// chunk is not `IHDR`, the stream has no `IEND`, or bytes follow `IEND`.
pub fn parse(bytes: &[u8]) -> Result<Vec<Chunk>, XlabelError> {
    if bytes.len() < PNG_SIGNATURE.len() || bytes[..PNG_SIGNATURE.len()] != PNG_SIGNATURE {
        return Err(XlabelError::malformed("invalid PNG signature"));
    }

    let mut chunks = Vec::new();
    let mut offset = PNG_SIGNATURE.len();

    loop {
        let remaining = bytes.len() - offset;
        if remaining == 0 {
            return Err(XlabelError::malformed(
                "stream ended without an IEND chunk (truncated file?)",
            ));
        }
        if remaining < 12 {
            return Err(XlabelError::malformed(format!(
                "truncated chunk header at offset {offset} ({remaining} byte(s) left)"
            )));
        }

        let length = u32::from_be_bytes(read_array(bytes, offset)) as usize;
        let raw_type: [u8; 4] = read_array(bytes, offset + 4);
        let chunk_type = ChunkType::new(raw_type).ok_or_else(|| {
            XlabelError::malformed(format!(
                "invalid chunk type bytes {raw_type:02x?} at offset {offset}"
            ))
        })?;

        if length > MAX_CHUNK_LENGTH {
            return Err(XlabelError::malformed(format!(
                "chunk '{chunk_type}' at offset {offset} declares length {length}, above the 2^31-1 limit"
            )));
        }

        let data_start = offset + 8;
        let available = bytes.len() - data_start;
        if length + 4 > available {
            return Err(XlabelError::malformed(format!(
                "chunk '{chunk_type}' at offset {offset} declares {length} byte(s) but only {} remain",
                available.saturating_sub(4)
            )));
        }

        let data = &bytes[data_start..data_start + length];
        let declared_crc = u32::from_be_bytes(read_array(bytes, data_start + length));
        let actual_crc = compute_crc(chunk_type, data);
        if declared_crc != actual_crc {
            return Err(XlabelError::malformed(format!(
                "CRC mismatch in chunk '{chunk_type}' at offset {offset}: declared {declared_crc:#010x}, computed {actual_crc:#010x}"
            )));
        }

        if chunks.is_empty() && chunk_type != ChunkType::IHDR {
            return Err(XlabelError::malformed(format!(
                "first chunk must be IHDR, found '{chunk_type}'"
            )));
        }

        chunks.push(Chunk::from_verified_parts(
            chunk_type,
            data.to_vec(),
            declared_crc,
        ));
        offset = data_start + length + 4;

        if chunk_type == ChunkType::IEND {
            break;
        }
    }

    if offset != bytes.len() {
        return Err(XlabelError::malformed(format!(
            "{} trailing byte(s) after IEND",
            bytes.len() - offset
        )));
    }

    tracing::debug!(chunks = chunks.len(), "parsed PNG chunk stream");
    Ok(chunks)
}

/// Reassembles signature and chunks into a PNG byte stream.
pub fn serialize(chunks: &[Chunk]) -> Vec<u8> {
    let total = PNG_SIGNATURE.len() + chunks.iter().map(Chunk::encoded_len).sum::<usize>();
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&PNG_SIGNATURE);
    for chunk in chunks {
        chunk.write_to(&mut out);
    }
    out
}

/// Returns the payload of the first chunk with the given type.
///
/// If the stream holds more than one such chunk the first one wins and a
/// warning is logged; the payloads are never merged.
pub fn find_custom_chunk(chunks: &[Chunk], chunk_type: ChunkType) -> Option<&[u8]> {
    let mut matches = chunks.iter().filter(|c| c.chunk_type() == chunk_type);
    let first = matches.next()?;

    let extra = matches.count();
    if extra > 0 {
        tracing::warn!(
            chunk_type = %chunk_type,
            duplicates = extra,
            "multiple '{}' chunks found; using the first occurrence",
            chunk_type
        );
    }

    Some(first.data())
}

/// Counts chunks with the given type.
pub fn count_chunks(chunks: &[Chunk], chunk_type: ChunkType) -> usize {
    chunks
        .iter()
        .filter(|c| c.chunk_type() == chunk_type)
        .count()
}

/// Replaces the payload of the first chunk of `chunk_type`, or inserts a new
/// chunk right before `IEND` when none exists.
///
/// Only the affected chunk gets a new length and CRC; every other chunk is
/// moved through unchanged.
///
/// # Errors
///
/// Returns [`XlabelError::MalformedPng`] if the payload exceeds the PNG chunk
/// length limit, or if a new chunk must be inserted and there is no `IEND`.
pub fn insert_or_replace_chunk(
    mut chunks: Vec<Chunk>,
    chunk_type: ChunkType,
    payload: Vec<u8>,
) -> Result<Vec<Chunk>, XlabelError> {
    if payload.len() > MAX_CHUNK_LENGTH {
        return Err(XlabelError::malformed(format!(
            "payload of {} bytes does not fit in a PNG chunk",
            payload.len()
        )));
    }

    let existing = count_chunks(&chunks, chunk_type);
    if existing > 1 {
        tracing::warn!(
            chunk_type = %chunk_type,
            duplicates = existing - 1,
            "replacing the first of {} '{}' chunks; later duplicates are left as-is",
            existing,
            chunk_type
        );
    }

    let new_chunk = Chunk::new(chunk_type, payload);

    if let Some(position) = chunks.iter().position(|c| c.chunk_type() == chunk_type) {
        tracing::debug!(chunk_type = %chunk_type, position, "replacing chunk in place");
        chunks[position] = new_chunk;
        return Ok(chunks);
    }

    let iend = chunks
        .iter()
        .position(|c| c.chunk_type() == ChunkType::IEND)
        .ok_or_else(|| XlabelError::malformed("cannot insert chunk: no IEND chunk present"))?;

    tracing::debug!(chunk_type = %chunk_type, position = iend, "inserting chunk before IEND");
    chunks.insert(iend, new_chunk);
    Ok(chunks)
}

fn read_array<const N: usize>(bytes: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[offset..offset + N]);
    out
}
