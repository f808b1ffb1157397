//! A single PNG chunk and its four-letter type tag.

use std::fmt;

use crc::{Crc, CRC_32_ISO_HDLC};

/// CRC-32 as defined by the PNG specification (ISO 3309 / ITU-T V.42).
const PNG_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Largest chunk length the PNG specification allows (2^31 - 1).
pub const MAX_CHUNK_LENGTH: usize = i32::MAX as usize;

/// A four-byte chunk type tag such as `IHDR` or `xlDa`.
///
/// Bit 5 of each byte (the ASCII lowercase bit) carries a property flag:
/// ancillary, private, reserved and safe-to-copy, in that order.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkType(pub [u8; 4]);

impl ChunkType {
    pub const IHDR: Self = ChunkType(*b"IHDR");
    pub const IDAT: Self = ChunkType(*b"IDAT");
    pub const IEND: Self = ChunkType(*b"IEND");

    /// Returns the tag if every byte is an ASCII letter.
    pub fn new(bytes: [u8; 4]) -> Option<Self> {
        bytes
            .iter()
            .all(u8::is_ascii_alphabetic)
            .then_some(ChunkType(bytes))
    }

    #[inline]
    pub const fn bytes(self) -> [u8; 4] {
        self.0
    }

    /// Decoders may skip ancillary chunks they do not understand.
    #[inline]
    pub const fn is_ancillary(self) -> bool {
        (self.0[0] & 32) != 0
    }

    #[inline]
    pub const fn is_private(self) -> bool {
        (self.0[1] & 32) != 0
    }

    #[inline]
    pub const fn is_reserved_bit_valid(self) -> bool {
        (self.0[2] & 32) == 0
    }

    /// Editors that do not understand the chunk may still copy it unchanged.
    #[inline]
    pub const fn is_safe_to_copy(self) -> bool {
        (self.0[3] & 32) != 0
    }
}

impl fmt::Debug for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkType({})", self)
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.0;
        write!(f, "{}{}{}{}", a as char, b as char, c as char, d as char)
    }
}

/// One chunk of a PNG stream: type tag, payload and CRC.
///
/// Chunks produced by [`parse`](super::parse) keep the CRC they were read
/// with (already verified), so serializing them reproduces the input bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct Chunk {
    chunk_type: ChunkType,
    data: Vec<u8>,
    crc: u32,
}

impl Chunk {
    /// Builds a chunk and computes its CRC.
    pub fn new(chunk_type: ChunkType, data: Vec<u8>) -> Self {
        let crc = compute_crc(chunk_type, &data);
        Self {
            chunk_type,
            data,
            crc,
        }
    }

    pub(crate) fn from_verified_parts(chunk_type: ChunkType, data: Vec<u8>, crc: u32) -> Self {
        Self {
            chunk_type,
            data,
            crc,
        }
    }

    #[inline]
    pub fn chunk_type(&self) -> ChunkType {
        self.chunk_type
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn crc(&self) -> u32 {
        self.crc
    }

    /// Length of the payload as written in the length field.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of bytes this chunk occupies on disk (length + type + data + CRC).
    #[inline]
    pub fn encoded_len(&self) -> usize {
        12 + self.data.len()
    }

    pub(crate) fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.data.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.chunk_type.0);
        out.extend_from_slice(&self.data);
        out.extend_from_slice(&self.crc.to_be_bytes());
    }
}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk")
            .field("chunk_type", &self.chunk_type)
            .field("len", &self.data.len())
            .field("crc", &format_args!("{:#010x}", self.crc))
            .finish()
    }
}

/// CRC-32 over the type tag followed by the payload.
pub fn compute_crc(chunk_type: ChunkType, data: &[u8]) -> u32 {
    let mut digest = PNG_CRC.digest();
    digest.update(&chunk_type.0);
    digest.update(data);
    digest.finalize()
}
