//! Patch file format.
//!
//! ```text
//! header: magic "SGPT" | format version u8 | compression u8 | reserved u16
//! body:   (doc_id u32 | len u32 | value bytes)*        (optionally zstd-compressed)
//! footer: record_count u32 | max_value_len u32 | value_bytes u64 | raw_len u64 | checksum u32
//! ```
//!
//! Doc ids are local to the destination segment and strictly ascending. The
//! checksum covers the uncompressed body.

use std::{io::Read, sync::Arc};

use segpatch_common::{DocId, Result, SegmentId, error::Error};
use segpatch_io::{ReadAt, SealingWrite};

use crate::DocScope;

pub const PATCH_FILE_MAGIC: &[u8; 4] = b"SGPT";
pub const PATCH_FORMAT_VERSION: u8 = 1;
pub const HEADER_SIZE: usize = 8;
pub const FOOTER_SIZE: usize = 28;
pub const RECORD_HEADER_SIZE: usize = 8;

/// Body compression of a patch file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PatchCompression {
    #[default]
    None,
    Zstd,
}

impl PatchCompression {
    fn as_u8(self) -> u8 {
        match self {
            PatchCompression::None => 0,
            PatchCompression::Zstd => 1,
        }
    }

    fn from_u8(value: u8) -> Option<PatchCompression> {
        match value {
            0 => Some(PatchCompression::None),
            1 => Some(PatchCompression::Zstd),
            _ => None,
        }
    }
}

/// Location and identity of one patch file.
#[derive(Clone)]
pub struct PatchFileInfo {
    pub attribute: String,
    pub scope: DocScope,
    pub src_segment: SegmentId,
    pub dest_segment: SegmentId,
    /// Human-readable location, used in errors and logs.
    pub path: String,
    pub reader: Arc<dyn ReadAt>,
}

impl std::fmt::Debug for PatchFileInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatchFileInfo")
            .field("attribute", &self.attribute)
            .field("scope", &self.scope)
            .field("src_segment", &self.src_segment)
            .field("dest_segment", &self.dest_segment)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Statistics of a written patch file (mirrors its footer).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchFileSummary {
    pub record_count: u32,
    pub max_value_len: u32,
    pub value_bytes: u64,
}

/// Writes one patch file. Records must be added in strictly ascending doc id order.
pub struct PatchFileWriter<W: SealingWrite> {
    writer: W,
    compression: PatchCompression,
    body: Vec<u8>,
    summary: PatchFileSummary,
    last_doc_id: Option<DocId>,
}

impl<W: SealingWrite> PatchFileWriter<W> {
    pub fn new(writer: W, compression: PatchCompression) -> PatchFileWriter<W> {
        PatchFileWriter {
            writer,
            compression,
            body: Vec::new(),
            summary: Default::default(),
            last_doc_id: None,
        }
    }

    pub fn add(&mut self, doc_id: DocId, value: &[u8]) -> Result<()> {
        segpatch_common::verify_arg!(doc_id, doc_id >= 0);
        if let Some(last) = self.last_doc_id {
            if doc_id <= last {
                return Err(Error::invalid_arg(
                    "doc_id",
                    format!("patch doc ids must ascend: {doc_id} after {last}"),
                ));
            }
        }
        let len = u32::try_from(value.len())
            .map_err(|_| Error::invalid_arg("value", "patch value exceeds 4GiB"))?;
        self.body.extend_from_slice(&(doc_id as u32).to_le_bytes());
        self.body.extend_from_slice(&len.to_le_bytes());
        self.body.extend_from_slice(value);
        self.last_doc_id = Some(doc_id);
        self.summary.record_count += 1;
        self.summary.max_value_len = self.summary.max_value_len.max(len);
        self.summary.value_bytes += value.len() as u64;
        Ok(())
    }

    pub fn record_count(&self) -> u32 {
        self.summary.record_count
    }

    /// Writes header, body and footer and seals the underlying writer.
    pub fn finish(mut self) -> Result<PatchFileSummary> {
        let checksum = compute_checksum(&self.body);
        let mut header = [0u8; HEADER_SIZE];
        header[..4].copy_from_slice(PATCH_FILE_MAGIC);
        header[4] = PATCH_FORMAT_VERSION;
        header[5] = self.compression.as_u8();
        self.writer.write_all(&header)?;

        match self.compression {
            PatchCompression::None => self.writer.write_all(&self.body)?,
            PatchCompression::Zstd => {
                let compressed = zstd::bulk::compress(&self.body, 0)?;
                self.writer.write_all(&compressed)?;
            }
        }

        let mut footer = Vec::with_capacity(FOOTER_SIZE);
        footer.extend_from_slice(&self.summary.record_count.to_le_bytes());
        footer.extend_from_slice(&self.summary.max_value_len.to_le_bytes());
        footer.extend_from_slice(&self.summary.value_bytes.to_le_bytes());
        footer.extend_from_slice(&(self.body.len() as u64).to_le_bytes());
        footer.extend_from_slice(&checksum.to_le_bytes());
        self.writer.write_all(&footer)?;
        self.writer.seal()?;
        Ok(self.summary)
    }
}

/// Decoded patch file, positioned before its first record.
///
/// All validation (magic, checksum, record framing, doc id order and range,
/// value length) happens in [`PatchFileReader::open`], so iteration itself
/// cannot fail.
pub struct PatchFileReader {
    path: String,
    body: Vec<u8>,
    pos: usize,
    remaining: u32,
    summary: PatchFileSummary,
}

impl PatchFileReader {
    /// Opens and validates a patch file.
    ///
    /// `fixed_value_len`, when set, is the exact length every value must have.
    /// Every doc id must be below `dest_doc_count`, the number of documents of
    /// the destination segment in the patched scope.
    pub fn open(
        info: &PatchFileInfo,
        fixed_value_len: Option<usize>,
        dest_doc_count: u32,
    ) -> Result<PatchFileReader> {
        let path = info.path.as_str();
        let corrupt = |message: &str| Error::corrupt_patch_file(path, message);

        let data = info
            .reader
            .read_all()
            .map_err(|e| Error::io(format!("read patch file {path}"), e))?;
        if data.len() < HEADER_SIZE + FOOTER_SIZE {
            return Err(corrupt("file is too short"));
        }
        if &data[..4] != PATCH_FILE_MAGIC {
            return Err(corrupt("bad magic"));
        }
        if data[4] != PATCH_FORMAT_VERSION {
            return Err(corrupt("unsupported format version"));
        }
        let compression =
            PatchCompression::from_u8(data[5]).ok_or_else(|| corrupt("unknown compression"))?;

        let footer = &data[data.len() - FOOTER_SIZE..];
        let summary = PatchFileSummary {
            record_count: read_u32(footer, 0),
            max_value_len: read_u32(footer, 4),
            value_bytes: read_u64(footer, 8),
        };
        let raw_len = read_u64(footer, 16);
        let checksum = read_u32(footer, 24);

        let stored = &data[HEADER_SIZE..data.len() - FOOTER_SIZE];
        let body = match compression {
            PatchCompression::None => stored.to_vec(),
            PatchCompression::Zstd => decompress(stored, raw_len)
                .map_err(|e| corrupt(&format!("decompression failed: {e}")))?,
        };
        if body.len() as u64 != raw_len {
            return Err(corrupt("body length mismatch"));
        }
        if compute_checksum(&body) != checksum {
            return Err(Error::from(
                segpatch_common::error::ErrorKind::ChecksumMismatch {
                    element: path.to_string(),
                },
            ));
        }

        validate_records(&body, &summary, fixed_value_len, dest_doc_count)
            .map_err(|m| corrupt(&m))?;

        Ok(PatchFileReader {
            path: path.to_string(),
            body,
            pos: 0,
            remaining: summary.record_count,
            summary,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn record_count(&self) -> u32 {
        self.summary.record_count
    }

    pub fn max_value_len(&self) -> usize {
        self.summary.max_value_len as usize
    }

    /// Sum of all value lengths in the file.
    pub fn value_bytes(&self) -> u64 {
        self.summary.value_bytes
    }

    pub fn has_next(&self) -> bool {
        self.remaining != 0
    }

    /// Local doc id of the next record.
    pub fn peek_doc_id(&self) -> Option<DocId> {
        self.has_next()
            .then(|| read_u32(&self.body, self.pos) as DocId)
    }

    pub fn next_record(&mut self) -> Option<(DocId, &[u8])> {
        if !self.has_next() {
            return None;
        }
        let doc_id = read_u32(&self.body, self.pos) as DocId;
        let len = read_u32(&self.body, self.pos + 4) as usize;
        let start = self.pos + RECORD_HEADER_SIZE;
        self.pos = start + len;
        self.remaining -= 1;
        Some((doc_id, &self.body[start..start + len]))
    }
}

fn validate_records(
    body: &[u8],
    summary: &PatchFileSummary,
    fixed_value_len: Option<usize>,
    dest_doc_count: u32,
) -> std::result::Result<(), String> {
    let mut pos = 0;
    let mut count = 0u32;
    let mut max_len = 0u32;
    let mut value_bytes = 0u64;
    let mut last_doc_id: Option<u32> = None;
    while pos < body.len() {
        if body.len() - pos < RECORD_HEADER_SIZE {
            return Err(format!("truncated record header at {pos}"));
        }
        let doc_id = read_u32(body, pos);
        let len = read_u32(body, pos + 4);
        if doc_id > i32::MAX as u32 {
            return Err(format!("invalid doc id {doc_id}"));
        }
        if doc_id >= dest_doc_count {
            return Err(format!(
                "doc id {doc_id} is out of range, destination has {dest_doc_count} docs"
            ));
        }
        if last_doc_id.is_some_and(|last| doc_id <= last) {
            return Err(format!("doc id {doc_id} out of order"));
        }
        if let Some(expected) = fixed_value_len {
            if len as usize != expected {
                return Err(format!(
                    "value of doc {doc_id} has length {len}, expected {expected}"
                ));
            }
        }
        pos += RECORD_HEADER_SIZE;
        if body.len() - pos < len as usize {
            return Err(format!("truncated value of doc {doc_id}"));
        }
        pos += len as usize;
        last_doc_id = Some(doc_id);
        count += 1;
        max_len = max_len.max(len);
        value_bytes += len as u64;
    }
    if count != summary.record_count
        || max_len != summary.max_value_len
        || value_bytes != summary.value_bytes
    {
        return Err("footer statistics do not match records".to_string());
    }
    Ok(())
}

/// Streams the zstd body, reading at most one byte past the declared length so
/// that a bad footer is caught by the length check instead of sizing a buffer.
fn decompress(stored: &[u8], raw_len: u64) -> std::io::Result<Vec<u8>> {
    let mut body = Vec::new();
    zstd::stream::read::Decoder::new(stored)?
        .take(raw_len.saturating_add(1))
        .read_to_end(&mut body)?;
    Ok(body)
}

/// Computes a checksum for a given buffer using the xxHash algorithm.
pub fn compute_checksum(buf: &[u8]) -> u32 {
    let h = xxhash_rust::xxh3::xxh3_64(buf);
    (h as u32) ^ ((h >> 32) as u32)
}

fn read_u32(buf: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes(buf[pos..pos + 4].try_into().expect("u32 bytes"))
}

fn read_u64(buf: &[u8], pos: usize) -> u64 {
    u64::from_le_bytes(buf[pos..pos + 8].try_into().expect("u64 bytes"))
}
