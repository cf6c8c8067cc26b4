//! GLB (binary glTF) container parsing and writing.
//!
//! A GLB stream is a 12-byte header followed by length-prefixed chunks:
//!
//! ```text
//! header: magic:u32 = "glTF" | version:u32 = 2 | total_length:u32
//! chunk:  chunk_length:u32 | chunk_type:u32 | data[chunk_length]
//! ```
//!
//! The BIN chunk is never copied: the parser records where it sits in the
//! source stream and the buffer resolver folds that offset in later.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{IngestError, Result};
use crate::schema::Document;

// ============================================================================
// GLB Binary Format Constants
// ============================================================================

pub const GLB_MAGIC: u32 = 0x46546C67; // "glTF" in little-endian
pub const GLB_VERSION: u32 = 2;
pub const GLB_CHUNK_JSON: u32 = 0x4E4F534A; // "JSON"
pub const GLB_CHUNK_BIN: u32 = 0x004E4942; // "BIN\0"

const HEADER_LEN: usize = 12;
const CHUNK_HEADER_LEN: usize = 8;

/// Byte range of a chunk's data within the original stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    pub offset: usize,
    pub length: usize,
}

impl ChunkRange {
    pub fn end(&self) -> usize {
        self.offset + self.length
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkInfo {
    pub chunk_type: u32,
    pub range: ChunkRange,
}

/// Header fields and chunk boundaries of a GLB stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlbLayout {
    pub version: u32,
    pub total_length: usize,
    pub chunks: Vec<ChunkInfo>,
}

/// Result of parsing a GLB stream.
#[derive(Debug)]
pub struct GlbContainer {
    pub document: Document,
    /// Zero-copy reference into the source bytes.
    pub bin_chunk: Option<ChunkRange>,
    pub layout: GlbLayout,
}

/// Returns true if `data` starts with the GLB magic.
pub fn is_glb(data: &[u8]) -> bool {
    data.len() >= 4 && LittleEndian::read_u32(&data[0..4]) == GLB_MAGIC
}

/// Validate the header and walk the chunk list without interpreting chunks.
pub fn read_layout(data: &[u8]) -> Result<GlbLayout> {
    if data.len() < HEADER_LEN {
        return Err(IngestError::format("File too small for GLB header"));
    }

    let magic = LittleEndian::read_u32(&data[0..4]);
    let version = LittleEndian::read_u32(&data[4..8]);
    let total_length = LittleEndian::read_u32(&data[8..12]) as usize;

    if magic != GLB_MAGIC {
        return Err(IngestError::format("Invalid GLB magic"));
    }
    if version != GLB_VERSION {
        return Err(IngestError::format(format!(
            "Unsupported GLB version: {}",
            version
        )));
    }
    if total_length < HEADER_LEN || total_length > data.len() {
        return Err(IngestError::format(format!(
            "GLB declares {} bytes but {} are available",
            total_length,
            data.len()
        )));
    }

    let mut chunks = Vec::new();
    let mut offset = HEADER_LEN;
    while offset < total_length {
        if offset + CHUNK_HEADER_LEN > total_length {
            return Err(IngestError::format("Chunk header truncated"));
        }
        let chunk_length = LittleEndian::read_u32(&data[offset..offset + 4]) as usize;
        let chunk_type = LittleEndian::read_u32(&data[offset + 4..offset + 8]);
        offset += CHUNK_HEADER_LEN;

        let end = offset
            .checked_add(chunk_length)
            .filter(|&end| end <= total_length)
            .ok_or_else(|| IngestError::format("Chunk extends past file end"))?;

        chunks.push(ChunkInfo {
            chunk_type,
            range: ChunkRange {
                offset,
                length: chunk_length,
            },
        });
        offset = end;
    }

    Ok(GlbLayout {
        version,
        total_length,
        chunks,
    })
}

/// Parse a GLB stream into its document and binary chunk reference.
///
/// At most one JSON and one BIN chunk are accepted. Unknown chunk types are
/// skipped.
pub fn parse_glb(data: &[u8]) -> Result<GlbContainer> {
    let layout = read_layout(data)?;

    let mut document: Option<Document> = None;
    let mut bin_chunk: Option<ChunkRange> = None;

    for chunk in &layout.chunks {
        let body = &data[chunk.range.offset..chunk.range.end()];
        match chunk.chunk_type {
            GLB_CHUNK_JSON => {
                if document.is_some() {
                    return Err(IngestError::format("JSON chunk after document was parsed"));
                }
                let json = std::str::from_utf8(body)?;
                document = Some(Document::from_slice(json.as_bytes())?);
            }
            GLB_CHUNK_BIN => {
                if bin_chunk.is_some() {
                    return Err(IngestError::format("More than one BIN chunk"));
                }
                bin_chunk = Some(chunk.range);
            }
            other => {
                tracing::debug!("Skipping unknown GLB chunk type {:#010x}", other);
            }
        }
    }

    let document = document.ok_or_else(|| IngestError::format("No JSON chunk"))?;

    Ok(GlbContainer {
        document,
        bin_chunk,
        layout,
    })
}

/// Assemble a GLB stream.
///
/// The JSON chunk is padded with spaces and the BIN chunk with zeros to
/// 4-byte alignment. An empty or absent `bin` omits the BIN chunk.
pub fn write_glb(json: &[u8], bin: Option<&[u8]>) -> Vec<u8> {
    let json_padding = (4 - (json.len() % 4)) % 4;
    let padded_json_len = json.len() + json_padding;

    let bin = bin.filter(|b| !b.is_empty());
    let (bin_padding, padded_bin_len) = match bin {
        Some(b) => {
            let pad = (4 - (b.len() % 4)) % 4;
            (pad, b.len() + pad)
        }
        None => (0, 0),
    };

    let mut total_len = HEADER_LEN + CHUNK_HEADER_LEN + padded_json_len;
    if bin.is_some() {
        total_len += CHUNK_HEADER_LEN + padded_bin_len;
    }

    let mut output = Vec::with_capacity(total_len);
    let mut word = [0u8; 4];
    let mut push_u32 = |out: &mut Vec<u8>, v: u32| {
        LittleEndian::write_u32(&mut word, v);
        out.extend_from_slice(&word);
    };

    // Header
    push_u32(&mut output, GLB_MAGIC);
    push_u32(&mut output, GLB_VERSION);
    push_u32(&mut output, total_len as u32);

    // JSON chunk
    push_u32(&mut output, padded_json_len as u32);
    push_u32(&mut output, GLB_CHUNK_JSON);
    output.extend_from_slice(json);
    output.resize(output.len() + json_padding, b' ');

    // Binary chunk
    if let Some(b) = bin {
        push_u32(&mut output, padded_bin_len as u32);
        push_u32(&mut output, GLB_CHUNK_BIN);
        output.extend_from_slice(b);
        output.resize(output.len() + bin_padding, 0);
    }

    output
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const JSON: &[u8] = br#"{"asset":{"version":"2.0"},"buffers":[{"byteLength":4}]}"#;

    fn chunk(chunk_type: u32, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend_from_slice(&chunk_type.to_le_bytes());
        out.extend_from_slice(body);
        out
    }

    fn glb_from_chunks(chunks: &[Vec<u8>]) -> Vec<u8> {
        let body: Vec<u8> = chunks.concat();
        let mut out = Vec::new();
        out.extend_from_slice(&GLB_MAGIC.to_le_bytes());
        out.extend_from_slice(&GLB_VERSION.to_le_bytes());
        out.extend_from_slice(&((12 + body.len()) as u32).to_le_bytes());
        out.extend_from_slice(&body);
        out
    }

    #[test]
    fn test_glb_magic() {
        // "glTF" in ASCII = 0x67, 0x6C, 0x54, 0x46
        let magic = u32::from_le_bytes(*b"glTF");
        assert_eq!(magic, GLB_MAGIC);
        assert_eq!(u32::from_le_bytes(*b"JSON"), GLB_CHUNK_JSON);
        assert_eq!(u32::from_le_bytes(*b"BIN\0"), GLB_CHUNK_BIN);
    }

    #[test]
    fn test_parse_json_and_bin() {
        let data = glb_from_chunks(&[chunk(GLB_CHUNK_JSON, JSON), chunk(GLB_CHUNK_BIN, &[1, 2, 3, 4])]);
        let container = parse_glb(&data).unwrap();
        assert_eq!(container.document.buffers.len(), 1);
        let bin = container.bin_chunk.unwrap();
        assert_eq!(&data[bin.offset..bin.end()], &[1, 2, 3, 4]);
        assert_eq!(container.layout.chunks.len(), 2);
    }

    #[test]
    fn test_bad_magic() {
        let mut data = glb_from_chunks(&[chunk(GLB_CHUNK_JSON, JSON)]);
        data[0] = b'x';
        assert!(matches!(parse_glb(&data), Err(IngestError::Format(_))));
        assert!(!is_glb(&data));
    }

    #[test]
    fn test_bad_version() {
        let mut data = glb_from_chunks(&[chunk(GLB_CHUNK_JSON, JSON)]);
        data[4] = 1;
        let err = parse_glb(&data).unwrap_err();
        assert!(err.to_string().contains("version"));
    }

    #[test]
    fn test_duplicate_bin_chunk_rejected() {
        let data = glb_from_chunks(&[
            chunk(GLB_CHUNK_JSON, JSON),
            chunk(GLB_CHUNK_BIN, &[1, 2, 3, 4]),
            chunk(GLB_CHUNK_BIN, &[5, 6, 7, 8]),
        ]);
        assert!(matches!(parse_glb(&data), Err(IngestError::Format(_))));
    }

    #[test]
    fn test_second_json_chunk_rejected() {
        let data = glb_from_chunks(&[chunk(GLB_CHUNK_JSON, JSON), chunk(GLB_CHUNK_JSON, JSON)]);
        assert!(matches!(parse_glb(&data), Err(IngestError::Format(_))));
    }

    #[test]
    fn test_missing_json_chunk() {
        let data = glb_from_chunks(&[chunk(GLB_CHUNK_BIN, &[0; 4])]);
        let err = parse_glb(&data).unwrap_err();
        assert_eq!(err, IngestError::format("No JSON chunk"));
    }

    #[test]
    fn test_truncated_chunk() {
        let mut data = glb_from_chunks(&[chunk(GLB_CHUNK_JSON, JSON), chunk(GLB_CHUNK_BIN, &[0; 8])]);
        // Chop the tail and fix up the declared total so only the chunk is short.
        data.truncate(data.len() - 4);
        let total = data.len() as u32;
        data[8..12].copy_from_slice(&total.to_le_bytes());
        assert!(matches!(parse_glb(&data), Err(IngestError::Format(_))));
    }

    #[test]
    fn test_declared_length_exceeds_data() {
        let mut data = glb_from_chunks(&[chunk(GLB_CHUNK_JSON, JSON)]);
        data.truncate(data.len() - 1);
        assert!(parse_glb(&data).is_err());
    }

    #[test]
    fn test_unknown_chunk_skipped() {
        let data = glb_from_chunks(&[chunk(GLB_CHUNK_JSON, JSON), chunk(0x1234_5678, &[9; 4])]);
        let container = parse_glb(&data).unwrap();
        assert!(container.bin_chunk.is_none());
    }

    #[test]
    fn test_write_glb_alignment() {
        let glb = write_glb(b"{}", Some(&[1, 2, 3]));
        assert_eq!(glb.len() % 4, 0);
        let layout = read_layout(&glb).unwrap();
        assert_eq!(layout.total_length, glb.len());
        assert_eq!(layout.chunks[0].range.length, 4);
        assert_eq!(&glb[20..24], b"{}  ");
        assert_eq!(layout.chunks[1].range.length, 4);
        assert_eq!(glb[glb.len() - 1], 0);
    }

    #[test]
    fn test_write_glb_without_bin() {
        let glb = write_glb(JSON, None);
        let container = parse_glb(&glb).unwrap();
        assert!(container.bin_chunk.is_none());
        assert_eq!(container.layout.chunks.len(), 1);
    }
}
