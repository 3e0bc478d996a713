//! Postings list accumulation and serialization.
//!
//! A postings list is the set of row ids in which a term occurs, held as a
//! 32-bit roaring bitmap. Serialization is adaptive because term frequency
//! distributions are extremely skewed: very small lists are stored as a flat
//! id array, larger lists as roaring containers, and very large lists get the
//! bitmap's own run compression on top. A one-byte header records the chosen
//! encoding so the reader can dispatch without external hints.

use std::io::{Read, Write};
use std::sync::Arc;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use roaring::RoaringBitmap;

use crate::error::{GindexError, Result};
use crate::util::varint;

/// A postings list: the set of row ids where a term occurs.
pub type GinIndexPostingsList = RoaringBitmap;

/// Shared, immutable postings list as produced by deserialization.
pub type GinIndexPostingsListPtr = Arc<GinIndexPostingsList>;

/// Below this cardinality a flat sorted id array is cheaper than any bitmap
/// container.
const MIN_SIZE_FOR_ROARING_ENCODING: u64 = 16;

/// Above this cardinality the bitmap's run compression pays for its CPU cost.
const ROARING_ENCODING_COMPRESSION_CARDINALITY_THRESHOLD: u64 = 5000;

const ARRAY_CONTAINER_MASK: u8 = 0x1;
const ROARING_COMPRESSED_MASK: u8 = 0x2;

/// Builds the postings list for one term during index construction.
#[derive(Debug, Default)]
pub struct GinIndexPostingsBuilder {
    row_ids: RoaringBitmap,
}

impl GinIndexPostingsBuilder {
    pub fn new() -> Self {
        GinIndexPostingsBuilder {
            row_ids: RoaringBitmap::new(),
        }
    }

    /// Check whether a row id is already added.
    pub fn contains(&self, row_id: u32) -> bool {
        self.row_ids.contains(row_id)
    }

    /// Add a row id into the builder. Idempotent.
    pub fn add(&mut self, row_id: u32) {
        self.row_ids.insert(row_id);
    }

    /// Number of distinct row ids added so far.
    pub fn len(&self) -> u64 {
        self.row_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_ids.is_empty()
    }

    /// Serialize the builder content to `writer`, returning the number of
    /// bytes written.
    pub fn serialize<W: Write>(&self, writer: &mut W) -> Result<u64> {
        let cardinality = self.row_ids.len();

        if cardinality < MIN_SIZE_FOR_ROARING_ENCODING {
            writer.write_u8(ARRAY_CONTAINER_MASK)?;
            let mut written = 1u64;
            written += varint::write_u64(writer, cardinality)?;
            for row_id in self.row_ids.iter() {
                written += varint::write_u32(writer, row_id)?;
            }
            return Ok(written);
        }

        let mut header = 0u8;
        let mut bitmap = self.row_ids.clone();
        if cardinality > ROARING_ENCODING_COMPRESSION_CARDINALITY_THRESHOLD {
            bitmap.optimize();
            header |= ROARING_COMPRESSED_MASK;
        }

        let size = bitmap.serialized_size() as u64;
        writer.write_u8(header)?;
        writer.write_u64::<LittleEndian>(size)?;
        bitmap.serialize_into(&mut *writer)?;

        Ok(1 + 8 + size)
    }

    /// Deserialize a postings list from `reader`.
    ///
    /// The header byte selects the decode path; a byte matching no known
    /// encoding yields [`GindexError::EncodingMismatch`].
    pub fn deserialize<R: Read>(reader: &mut R) -> Result<GinIndexPostingsListPtr> {
        let header = reader.read_u8()?;

        if header & !(ARRAY_CONTAINER_MASK | ROARING_COMPRESSED_MASK) != 0 {
            return Err(GindexError::EncodingMismatch(header));
        }

        if header & ARRAY_CONTAINER_MASK != 0 {
            // Array and compressed flags are mutually exclusive
            if header & ROARING_COMPRESSED_MASK != 0 {
                return Err(GindexError::EncodingMismatch(header));
            }

            let cardinality = varint::read_u64(reader)?;
            let mut row_ids = RoaringBitmap::new();
            for _ in 0..cardinality {
                row_ids.insert(varint::read_u32(reader)?);
            }
            return Ok(Arc::new(row_ids));
        }

        let size = reader.read_u64::<LittleEndian>()?;
        let mut buf = vec![0u8; size as usize];
        reader.read_exact(&mut buf)?;

        let row_ids = RoaringBitmap::deserialize_from(&buf[..])
            .map_err(|e| GindexError::index(format!("failed to decode postings bitmap: {e}")))?;

        Ok(Arc::new(row_ids))
    }
}
