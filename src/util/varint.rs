//! Variable-length integer encoding utilities.
//!
//! This module provides efficient variable-length integer encoding and decoding
//! over byte streams, similar to what's used in protocol buffers and other
//! binary formats.

use std::io::{Read, Write};

use byteorder::ReadBytesExt;

use crate::error::{GindexError, Result};

/// Encode a u64 value to `writer` using variable-length encoding.
///
/// Uses 7 bits per byte with a continuation bit, allowing efficient
/// encoding of small numbers. Returns the number of bytes written.
pub fn write_u64<W: Write>(writer: &mut W, value: u64) -> Result<u64> {
    let mut val = value;
    let mut written = 0u64;

    loop {
        let mut byte = (val & 0x7F) as u8;
        val >>= 7;

        if val != 0 {
            byte |= 0x80; // Set continuation bit
        }

        writer.write_all(&[byte])?;
        written += 1;

        if val == 0 {
            break;
        }
    }

    Ok(written)
}

/// Decode a u64 value from `reader`.
pub fn read_u64<R: Read>(reader: &mut R) -> Result<u64> {
    let mut result = 0u64;
    let mut shift = 0;

    loop {
        if shift >= 64 {
            return Err(GindexError::other("VarInt overflow"));
        }

        let byte = reader.read_u8()?;
        result |= ((byte & 0x7F) as u64) << shift;

        if (byte & 0x80) == 0 {
            return Ok(result);
        }

        shift += 7;
    }
}

/// Encode a u32 value to `writer`, returning the number of bytes written.
pub fn write_u32<W: Write>(writer: &mut W, value: u32) -> Result<u64> {
    write_u64(writer, value as u64)
}

/// Decode a u32 value from `reader`.
pub fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let value = read_u64(reader)?;
    u32::try_from(value).map_err(|_| GindexError::other("VarInt overflows u32"))
}
