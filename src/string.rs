//! Modified-UTF-8 string codec.
//!
//! Das String-Primitiv und die Record-Keys sind als zwei-Byte-längenpräfixte
//! modified-UTF-8 Sequenz codiert, bit-für-bit kompatibel zu Javas
//! `DataOutput.writeUTF`:
//!
//! - U+0000 wird als überlanges Zwei-Byte-Paar `C0 80` codiert (nie als 0x00)
//! - U+0001..U+007F als ein Byte
//! - U+0080..U+07FF als zwei Bytes, U+0800..U+FFFF als drei Bytes
//! - Supplementary-Zeichen als CESU-8: zwei Surrogate à drei Bytes (6 Bytes)
//!
//! Der Längenpräfix zählt Bytes, nicht Zeichen; codierte Längen über 65535
//! werden abgelehnt.

use std::io::{Read, Write};

use crate::error::{Error, Result};
use crate::primitive::{read_u16, write_u16};

/// Maximale codierte Länge, die in den u16-Präfix passt.
const MAX_ENCODED_LEN: usize = u16::MAX as usize;

/// Encodes a length-prefixed modified-UTF-8 string.
///
/// # Errors
///
/// [`Error::StringTooLong`] when the encoded form exceeds 65535 bytes.
pub(crate) fn encode<W: Write>(out: &mut W, value: &str) -> Result<()> {
    let bytes = to_modified_utf8(value);
    if bytes.len() > MAX_ENCODED_LEN {
        return Err(Error::StringTooLong(bytes.len()));
    }
    write_u16(out, bytes.len() as u16)?;
    out.write_all(&bytes)?;
    Ok(())
}

/// Decodes a length-prefixed modified-UTF-8 string.
pub(crate) fn decode<R: Read>(input: &mut R) -> Result<String> {
    let len = usize::from(read_u16(input)?);
    let mut bytes = vec![0u8; len];
    input.read_exact(&mut bytes)?;
    from_modified_utf8(&bytes)
}

/// Converts a Rust string into its modified-UTF-8 byte form.
pub(crate) fn to_modified_utf8(value: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(value.len());
    for ch in value.chars() {
        let cp = ch as u32;
        match cp {
            0x0001..=0x007f => bytes.push(cp as u8),
            // U+0000 überlang, damit im Payload nie ein Null-Byte steht.
            0x0000 | 0x0080..=0x07ff => {
                bytes.push(0xc0 | (cp >> 6) as u8);
                bytes.push(0x80 | (cp & 0x3f) as u8);
            }
            0x0800..=0xffff => push_three_byte(&mut bytes, cp as u16),
            _ => {
                // CESU-8: Surrogate-Paar, jede Hälfte als Drei-Byte-Gruppe.
                let offset = cp - 0x1_0000;
                push_three_byte(&mut bytes, 0xd800 | (offset >> 10) as u16);
                push_three_byte(&mut bytes, 0xdc00 | (offset & 0x3ff) as u16);
            }
        }
    }
    bytes
}

fn push_three_byte(bytes: &mut Vec<u8>, unit: u16) {
    bytes.push(0xe0 | (unit >> 12) as u8);
    bytes.push(0x80 | ((unit >> 6) & 0x3f) as u8);
    bytes.push(0x80 | (unit & 0x3f) as u8);
}

/// Converts modified-UTF-8 bytes back into a Rust string.
///
/// # Errors
///
/// [`Error::MalformedString`] bei abgeschnittenen Gruppen, ungültigen
/// Startbytes oder Surrogat-Hälften ohne Partner.
pub(crate) fn from_modified_utf8(bytes: &[u8]) -> Result<String> {
    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        let first = bytes[index];
        if first & 0x80 == 0 {
            units.push(u16::from(first));
            index += 1;
        } else if first & 0xe0 == 0xc0 {
            let second = *bytes.get(index + 1).ok_or(Error::MalformedString)?;
            if second & 0xc0 != 0x80 {
                return Err(Error::MalformedString);
            }
            units.push((u16::from(first & 0x1f) << 6) | u16::from(second & 0x3f));
            index += 2;
        } else if first & 0xf0 == 0xe0 {
            let second = *bytes.get(index + 1).ok_or(Error::MalformedString)?;
            let third = *bytes.get(index + 2).ok_or(Error::MalformedString)?;
            if second & 0xc0 != 0x80 || third & 0xc0 != 0x80 {
                return Err(Error::MalformedString);
            }
            units.push(
                (u16::from(first & 0x0f) << 12)
                    | (u16::from(second & 0x3f) << 6)
                    | u16::from(third & 0x3f),
            );
            index += 3;
        } else {
            return Err(Error::MalformedString);
        }
    }
    String::from_utf16(&units).map_err(|_| Error::MalformedString)
}
