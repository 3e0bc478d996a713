//! Segment descriptors and on-disk format constants.
//!
//! A store is made up of immutable index segments spread across four files:
//!
//! 1. Segment id file (`.gin_sid`): one byte format version followed by the
//!    next available segment id.
//! 2. Segment metadata file (`.gin_seg`): an append-only array of fixed-size
//!    [`GinIndexSegment`] records.
//! 3. Dictionary file (`.gin_dict`): an append-only array of
//!    `(blob_size, fst_blob)` entries, blob optionally compressed.
//! 4. Postings file (`.gin_post`): an append-only array of serialized
//!    postings lists, each self-describing via its encoding header.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{GindexError, Result};

pub const GIN_SEGMENT_ID_FILE_EXTENSION: &str = ".gin_sid";
pub const GIN_SEGMENT_METADATA_FILE_EXTENSION: &str = ".gin_seg";
pub const GIN_DICTIONARY_FILE_EXTENSION: &str = ".gin_dict";
pub const GIN_POSTINGS_FILE_EXTENSION: &str = ".gin_post";

/// On-disk format version, stored as the first byte of the segment id file.
/// Readers must reject unknown versions rather than guess the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Format {
    /// Initial version, supports adaptive postings compression
    V1 = 1,
}

impl Format {
    pub const CURRENT: Format = Format::V1;

    pub fn from_byte(byte: u8) -> Result<Format> {
        match byte {
            1 => Ok(Format::V1),
            other => Err(GindexError::FormatVersionMismatch(other)),
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Descriptor of one immutable index segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GinIndexSegment {
    /// Segment id, reserved from the segment id file.
    pub segment_id: u32,

    /// Next available row id when the segment was sealed. Strictly
    /// non-decreasing across the metadata file.
    pub next_row_id: u32,

    /// Postings file offset of this segment's postings lists.
    pub postings_start_offset: u64,

    /// Dictionary file offset of this segment's dictionary blob.
    pub dict_start_offset: u64,
}

impl Default for GinIndexSegment {
    fn default() -> Self {
        GinIndexSegment {
            segment_id: 0,
            next_row_id: 1,
            postings_start_offset: 0,
            dict_start_offset: 0,
        }
    }
}

impl GinIndexSegment {
    /// Fixed size of one encoded descriptor record.
    pub const ENCODED_SIZE: u64 = 24;

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.segment_id)?;
        writer.write_u32::<LittleEndian>(self.next_row_id)?;
        writer.write_u64::<LittleEndian>(self.postings_start_offset)?;
        writer.write_u64::<LittleEndian>(self.dict_start_offset)?;
        Ok(())
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<GinIndexSegment> {
        Ok(GinIndexSegment {
            segment_id: reader.read_u32::<LittleEndian>()?,
            next_row_id: reader.read_u32::<LittleEndian>()?,
            postings_start_offset: reader.read_u64::<LittleEndian>()?,
            dict_start_offset: reader.read_u64::<LittleEndian>()?,
        })
    }
}

/// Name of the segment id file for the store `name`.
pub fn segment_id_file_name(name: &str) -> String {
    format!("{name}{GIN_SEGMENT_ID_FILE_EXTENSION}")
}

/// Name of the segment metadata file for the store `name`.
pub fn segment_metadata_file_name(name: &str) -> String {
    format!("{name}{GIN_SEGMENT_METADATA_FILE_EXTENSION}")
}

/// Name of the dictionary file for the store `name`.
pub fn dictionary_file_name(name: &str) -> String {
    format!("{name}{GIN_DICTIONARY_FILE_EXTENSION}")
}

/// Name of the postings file for the store `name`.
pub fn postings_file_name(name: &str) -> String {
    format!("{name}{GIN_POSTINGS_FILE_EXTENSION}")
}

/// Check whether `file_name` belongs to a gin index store.
pub fn is_gin_file(file_name: &str) -> bool {
    file_name.ends_with(GIN_SEGMENT_ID_FILE_EXTENSION)
        || file_name.ends_with(GIN_SEGMENT_METADATA_FILE_EXTENSION)
        || file_name.ends_with(GIN_DICTIONARY_FILE_EXTENSION)
        || file_name.ends_with(GIN_POSTINGS_FILE_EXTENSION)
}
