//! Per-segment term dictionaries backed by FST.
//!
//! Each sealed segment carries one finite-state transducer mapping term bytes
//! to the offset of the term's postings list, relative to the segment's
//! postings start offset. FSTs provide O(|term|) lookups over a succinct,
//! immutable structure, so sealed segments can be searched concurrently
//! without locking.
//!
//! On disk a dictionary is a single `(size_header, blob)` entry in the
//! dictionary file. The u64 size header stores the payload length shifted
//! left by one, with the low bit flagging zstd compression; blobs under the
//! compression threshold are not worth the CPU cost and are stored raw.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use fst::{Map, MapBuilder};

use crate::compression::{self, CompressionLevel};
use crate::error::{GindexError, Result};

/// FST blobs above this size are compressed before hitting the dictionary
/// file.
pub const FST_SIZE_COMPRESSION_THRESHOLD: u64 = 100 * 1024;

const DICT_COMPRESSED_MASK: u64 = 0x1;

/// An immutable term -> postings-offset dictionary for one segment.
pub struct TermDictionary {
    map: Map<Vec<u8>>,
}

impl TermDictionary {
    /// Build an FST blob from term/offset pairs sorted by term bytes.
    pub fn build(sorted_terms: &[(&str, u64)]) -> Result<Vec<u8>> {
        let mut builder = MapBuilder::memory();
        for (term, offset) in sorted_terms {
            builder
                .insert(term.as_bytes(), *offset)
                .map_err(|e| GindexError::index(format!("failed to build dictionary: {e}")))?;
        }

        builder
            .into_inner()
            .map_err(|e| GindexError::index(format!("failed to build dictionary: {e}")))
    }

    /// Load a dictionary from a raw FST blob.
    pub fn new(blob: Vec<u8>) -> Result<Self> {
        let map = Map::new(blob)
            .map_err(|e| GindexError::index(format!("invalid dictionary blob: {e}")))?;
        Ok(TermDictionary { map })
    }

    /// Look up the postings offset for `term`, relative to the segment's
    /// postings start offset. `None` means the term is absent from this
    /// segment.
    pub fn lookup(&self, term: &str) -> Option<u64> {
        self.map.get(term.as_bytes())
    }

    /// Number of terms in this dictionary.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl std::fmt::Debug for TermDictionary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TermDictionary")
            .field("terms", &self.map.len())
            .finish()
    }
}

/// A loaded dictionary for one sealed segment, cached in the store keyed by
/// segment id. Never reloaded or mutated: segments are immutable once
/// written.
#[derive(Debug)]
pub struct GinSegmentDictionary {
    /// Postings file offset of this segment's postings lists.
    pub postings_start_offset: u64,

    /// Dictionary file offset of this segment's dictionary blob.
    pub dict_start_offset: u64,

    /// Term -> relative postings offset lookup.
    pub offsets: TermDictionary,
}

/// Write a dictionary blob with its size header, returning the total bytes
/// written. Blobs above [`FST_SIZE_COMPRESSION_THRESHOLD`] are compressed.
pub fn write_dictionary_blob<W: Write>(
    writer: &mut W,
    blob: &[u8],
    level: CompressionLevel,
) -> Result<u64> {
    write_dictionary_blob_with_threshold(writer, blob, level, FST_SIZE_COMPRESSION_THRESHOLD)
}

fn write_dictionary_blob_with_threshold<W: Write>(
    writer: &mut W,
    blob: &[u8],
    level: CompressionLevel,
    threshold: u64,
) -> Result<u64> {
    if blob.len() as u64 > threshold {
        let compressed = compression::compress(blob, level)?;
        let header = ((compressed.len() as u64) << 1) | DICT_COMPRESSED_MASK;
        writer.write_u64::<LittleEndian>(header)?;
        writer.write_all(&compressed)?;
        Ok(8 + compressed.len() as u64)
    } else {
        let header = (blob.len() as u64) << 1;
        writer.write_u64::<LittleEndian>(header)?;
        writer.write_all(blob)?;
        Ok(8 + blob.len() as u64)
    }
}

/// Read a dictionary blob written by [`write_dictionary_blob`], decompressing
/// if the stored flag indicates compression.
///
/// `remaining` bounds the payload size so a corrupt header cannot drive an
/// unbounded allocation.
pub fn read_dictionary_blob<R: Read>(reader: &mut R, remaining: u64) -> Result<Vec<u8>> {
    if remaining < 8 {
        return Err(GindexError::index("dictionary entry truncated"));
    }

    let header = reader.read_u64::<LittleEndian>()?;
    let stored_size = header >> 1;
    let compressed = header & DICT_COMPRESSED_MASK != 0;

    if stored_size > remaining - 8 {
        return Err(GindexError::index(format!(
            "dictionary blob size {stored_size} exceeds remaining file size"
        )));
    }

    let mut blob = vec![0u8; stored_size as usize];
    reader.read_exact(&mut blob)?;

    if compressed {
        compression::decompress(&blob)
    } else {
        Ok(blob)
    }
}
