// Deterministic serialization for ledger data structures
//
// Little-endian fixed-width integers, compact varint length prefixes,
// length-prefixed variable byte fields. The encoding doubles as the hash
// pre-image, so it must stay byte-for-byte stable.

use crate::error::{ChainError, Result};
use std::io::{self, Read, Write};

/// Trait for serializable types
pub trait Serializable {
    fn serialize(&self) -> Vec<u8>;
    fn deserialize(data: &[u8]) -> Result<Self>
    where
        Self: Sized;
}

/// Big-endian two's-complement encoding of an i64 (8 bytes)
pub fn i64_be(n: i64) -> [u8; 8] {
    n.to_be_bytes()
}

/// Write a variable-length integer (VarInt)
pub fn write_varint<W: Write>(writer: &mut W, value: u64) -> io::Result<()> {
    match value {
        0..=0xfc => {
            writer.write_all(&[value as u8])?;
        }
        0xfd..=0xffff => {
            writer.write_all(&[0xfd])?;
            writer.write_all(&(value as u16).to_le_bytes())?;
        }
        0x10000..=0xffffffff => {
            writer.write_all(&[0xfe])?;
            writer.write_all(&(value as u32).to_le_bytes())?;
        }
        _ => {
            writer.write_all(&[0xff])?;
            writer.write_all(&value.to_le_bytes())?;
        }
    }
    Ok(())
}

/// Read a variable-length integer (VarInt)
pub fn read_varint<R: Read + ?Sized>(reader: &mut R) -> Result<u64> {
    let first = read_array::<R, 1>(reader)?[0];

    match first {
        0..=0xfc => Ok(first as u64),
        0xfd => Ok(u16::from_le_bytes(read_array(reader)?) as u64),
        0xfe => Ok(u32::from_le_bytes(read_array(reader)?) as u64),
        0xff => Ok(u64::from_le_bytes(read_array(reader)?)),
    }
}

/// Write bytes with length prefix (VarInt length + data)
pub fn write_var_bytes<W: Write>(writer: &mut W, data: &[u8]) -> io::Result<()> {
    write_varint(writer, data.len() as u64)?;
    writer.write_all(data)?;
    Ok(())
}

/// Read bytes with length prefix
pub fn read_var_bytes<R: Read + ?Sized>(reader: &mut R) -> Result<Vec<u8>> {
    let len = read_varint(reader)? as usize;
    let mut data = vec![0u8; len];
    reader
        .read_exact(&mut data)
        .map_err(|e| ChainError::BadEncoding(e.to_string()))?;
    Ok(data)
}

/// Read a fixed-size byte array, failing with `BadEncoding` on truncation
pub fn read_array<R: Read + ?Sized, const N: usize>(reader: &mut R) -> Result<[u8; N]> {
    let mut bytes = [0u8; N];
    reader
        .read_exact(&mut bytes)
        .map_err(|e| ChainError::BadEncoding(e.to_string()))?;
    Ok(bytes)
}
