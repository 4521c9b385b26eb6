//! Wire tags and the nine primitive codecs.
//!
//! Zwei getrennte Tag-Räume:
//!
//! - **Value-Tags** leiten jeden getaggten Wert ein (Null, Primitiv, Liste,
//!   Record, Referenz).
//! - **Primitiv-Tags** folgen auf [`VALUE_PRIMITIVE`] und wählen einen der
//!   neun festen Codecs.
//!
//! Alle Mehrbyte-Werte sind big-endian. Die Tag-Zuordnung ist Teil des
//! Draht-Vertrags und darf sich nie ändern; unbekannte Tags schlagen beim
//! Lesen sauber fehl (forward-kompatibles Ablehnen neuerer Formate).

use std::io::{Read, Write};

use crate::error::{Error, Result};
use crate::string;
use crate::value::Value;

// --- Value tags ---

/// Null, no payload.
pub const VALUE_NULL: u8 = 0x00;
/// Primitive: followed by a primitive tag byte and its payload.
pub const VALUE_PRIMITIVE: u8 = 0x01;
/// List: followed by an i32 element count, then that many tagged values.
pub const VALUE_LIST: u8 = 0x02;
/// Record: followed by an i32 entry count, then (key, tagged value) pairs.
pub const VALUE_RECORD: u8 = 0x03;
/// Reference: followed by the i64 stream offset of an earlier record.
pub const VALUE_REFERENCE: u8 = 0x04;

// --- Primitive tags ---

/// Boolean, one byte (0 or 1).
pub const PRIM_BOOL: u8 = 0x00;
/// Signed 8-bit integer.
pub const PRIM_I8: u8 = 0x01;
/// UTF-16 code unit, two bytes big-endian.
pub const PRIM_CHAR: u8 = 0x02;
/// Signed 16-bit integer, big-endian.
pub const PRIM_I16: u8 = 0x03;
/// Signed 32-bit integer, big-endian.
pub const PRIM_I32: u8 = 0x04;
/// Signed 64-bit integer, big-endian.
pub const PRIM_I64: u8 = 0x05;
/// IEEE-754 single, big-endian.
pub const PRIM_F32: u8 = 0x06;
/// IEEE-754 double, big-endian.
pub const PRIM_F64: u8 = 0x07;
/// Length-prefixed modified-UTF-8 string.
pub const PRIM_STRING: u8 = 0x08;

// ============================================================================
// Fixed-width helpers
// ============================================================================

pub(crate) fn write_u8<W: Write>(out: &mut W, value: u8) -> Result<()> {
    out.write_all(&[value])?;
    Ok(())
}

pub(crate) fn read_u8<R: Read>(input: &mut R) -> Result<u8> {
    let mut buf = [0u8; 1];
    input.read_exact(&mut buf)?;
    Ok(buf[0])
}

pub(crate) fn write_u16<W: Write>(out: &mut W, value: u16) -> Result<()> {
    out.write_all(&value.to_be_bytes())?;
    Ok(())
}

pub(crate) fn read_u16<R: Read>(input: &mut R) -> Result<u16> {
    let mut buf = [0u8; 2];
    input.read_exact(&mut buf)?;
    Ok(u16::from_be_bytes(buf))
}

pub(crate) fn write_i32<W: Write>(out: &mut W, value: i32) -> Result<()> {
    out.write_all(&value.to_be_bytes())?;
    Ok(())
}

pub(crate) fn read_i32<R: Read>(input: &mut R) -> Result<i32> {
    let mut buf = [0u8; 4];
    input.read_exact(&mut buf)?;
    Ok(i32::from_be_bytes(buf))
}

pub(crate) fn write_i64<W: Write>(out: &mut W, value: i64) -> Result<()> {
    out.write_all(&value.to_be_bytes())?;
    Ok(())
}

pub(crate) fn read_i64<R: Read>(input: &mut R) -> Result<i64> {
    let mut buf = [0u8; 8];
    input.read_exact(&mut buf)?;
    Ok(i64::from_be_bytes(buf))
}

// ============================================================================
// Primitive codec
// ============================================================================

/// Writes a null or primitive value including its value tag.
///
/// Der Aufrufer stellt sicher, dass `value` inline-fähig ist
/// (kein List/Record/Object) — alles andere ist ein Programmierfehler
/// im Dispatch und wird als [`Error::UnknownPrimitiveTag`] gemeldet.
pub(crate) fn encode_inline<W: Write>(out: &mut W, value: &Value) -> Result<()> {
    match value {
        Value::Null => write_u8(out, VALUE_NULL),
        Value::Bool(v) => {
            write_u8(out, VALUE_PRIMITIVE)?;
            write_u8(out, PRIM_BOOL)?;
            write_u8(out, u8::from(*v))
        }
        Value::I8(v) => {
            write_u8(out, VALUE_PRIMITIVE)?;
            write_u8(out, PRIM_I8)?;
            write_u8(out, *v as u8)
        }
        Value::Char(v) => {
            write_u8(out, VALUE_PRIMITIVE)?;
            write_u8(out, PRIM_CHAR)?;
            write_u16(out, *v)
        }
        Value::I16(v) => {
            write_u8(out, VALUE_PRIMITIVE)?;
            write_u8(out, PRIM_I16)?;
            write_u16(out, *v as u16)
        }
        Value::I32(v) => {
            write_u8(out, VALUE_PRIMITIVE)?;
            write_u8(out, PRIM_I32)?;
            write_i32(out, *v)
        }
        Value::I64(v) => {
            write_u8(out, VALUE_PRIMITIVE)?;
            write_u8(out, PRIM_I64)?;
            write_i64(out, *v)
        }
        Value::F32(v) => {
            write_u8(out, VALUE_PRIMITIVE)?;
            write_u8(out, PRIM_F32)?;
            out.write_all(&v.to_bits().to_be_bytes())?;
            Ok(())
        }
        Value::F64(v) => {
            write_u8(out, VALUE_PRIMITIVE)?;
            write_u8(out, PRIM_F64)?;
            out.write_all(&v.to_bits().to_be_bytes())?;
            Ok(())
        }
        Value::Str(v) => {
            write_u8(out, VALUE_PRIMITIVE)?;
            write_u8(out, PRIM_STRING)?;
            string::encode(out, v)
        }
        Value::List(_) | Value::Record(_) | Value::Object(_) => Err(Error::InvalidValue(
            "structural value in primitive position".to_string(),
        )),
    }
}

/// Reads the primitive tag byte and its payload (the [`VALUE_PRIMITIVE`]
/// value tag has already been consumed).
pub(crate) fn decode_primitive<R: Read>(input: &mut R) -> Result<Value> {
    let tag = read_u8(input)?;
    match tag {
        PRIM_BOOL => Ok(Value::Bool(read_u8(input)? != 0)),
        PRIM_I8 => Ok(Value::I8(read_u8(input)? as i8)),
        PRIM_CHAR => Ok(Value::Char(read_u16(input)?)),
        PRIM_I16 => Ok(Value::I16(read_u16(input)? as i16)),
        PRIM_I32 => Ok(Value::I32(read_i32(input)?)),
        PRIM_I64 => Ok(Value::I64(read_i64(input)?)),
        PRIM_F32 => {
            let mut buf = [0u8; 4];
            input.read_exact(&mut buf)?;
            Ok(Value::F32(f32::from_bits(u32::from_be_bytes(buf))))
        }
        PRIM_F64 => {
            let mut buf = [0u8; 8];
            input.read_exact(&mut buf)?;
            Ok(Value::F64(f64::from_bits(u64::from_be_bytes(buf))))
        }
        PRIM_STRING => Ok(Value::Str(string::decode(input)?)),
        other => Err(Error::UnknownPrimitiveTag(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(value: Value) -> Value {
        let mut buf = Vec::new();
        encode_inline(&mut buf, &value).unwrap();
        let mut input = buf.as_slice();
        let tag = read_u8(&mut input).unwrap();
        match tag {
            VALUE_NULL => Value::Null,
            VALUE_PRIMITIVE => decode_primitive(&mut input).unwrap(),
            other => panic!("unexpected value tag {other:#04x}"),
        }
    }

    /// Die Tag-Zuordnung ist Draht-Vertrag.
    #[test]
    fn tag_assignments() {
        assert_eq!(VALUE_NULL, 0x00);
        assert_eq!(VALUE_PRIMITIVE, 0x01);
        assert_eq!(VALUE_LIST, 0x02);
        assert_eq!(VALUE_RECORD, 0x03);
        assert_eq!(VALUE_REFERENCE, 0x04);

        assert_eq!(PRIM_BOOL, 0x00);
        assert_eq!(PRIM_I8, 0x01);
        assert_eq!(PRIM_CHAR, 0x02);
        assert_eq!(PRIM_I16, 0x03);
        assert_eq!(PRIM_I32, 0x04);
        assert_eq!(PRIM_I64, 0x05);
        assert_eq!(PRIM_F32, 0x06);
        assert_eq!(PRIM_F64, 0x07);
        assert_eq!(PRIM_STRING, 0x08);
    }

    /// Alle neun Primitive überleben den Round-Trip exakt.
    #[test]
    fn primitive_round_trips() {
        for value in [
            Value::Null,
            Value::Bool(true),
            Value::Bool(false),
            Value::I8(0x05),
            Value::I8(-1),
            Value::Char(0x00f6), // 'ö'
            Value::I16(13),
            Value::I16(i16::MIN),
            Value::I32(67_567),
            Value::I64(786_783_647_846_876_879),
            Value::F32(42.24),
            Value::F64(std::f64::consts::PI),
            Value::F64(f64::NAN),
            Value::Str("blafasel".to_string()),
        ] {
            assert_eq!(round_trip(value.clone()), value);
        }
    }

    /// Big-endian Byte-Layout der Mehrbyte-Primitive.
    #[test]
    fn big_endian_layout() {
        let mut buf = Vec::new();
        encode_inline(&mut buf, &Value::I32(0x0102_0304)).unwrap();
        assert_eq!(buf, vec![VALUE_PRIMITIVE, PRIM_I32, 0x01, 0x02, 0x03, 0x04]);

        let mut buf = Vec::new();
        encode_inline(&mut buf, &Value::Char(0x00f6)).unwrap();
        assert_eq!(buf, vec![VALUE_PRIMITIVE, PRIM_CHAR, 0x00, 0xf6]);

        let mut buf = Vec::new();
        encode_inline(&mut buf, &Value::I16(-2)).unwrap();
        assert_eq!(buf, vec![VALUE_PRIMITIVE, PRIM_I16, 0xff, 0xfe]);
    }

    /// Null ist ein einzelnes Tag-Byte ohne Payload.
    #[test]
    fn null_is_single_byte() {
        let mut buf = Vec::new();
        encode_inline(&mut buf, &Value::Null).unwrap();
        assert_eq!(buf, vec![VALUE_NULL]);
    }

    /// Floats reisen als Bitmuster: NaN-Payloads bleiben erhalten.
    #[test]
    fn float_bit_patterns() {
        let weird = f64::from_bits(0x7ff8_0000_dead_beef);
        match round_trip(Value::F64(weird)) {
            Value::F64(back) => assert_eq!(back.to_bits(), weird.to_bits()),
            other => panic!("expected F64, got {other:?}"),
        }
    }

    /// Unbekannte Primitiv-Tags schlagen sauber fehl.
    #[test]
    fn unknown_primitive_tag() {
        let data = [0x09u8, 0x00];
        assert_eq!(
            decode_primitive(&mut data.as_slice()).unwrap_err(),
            Error::UnknownPrimitiveTag(0x09)
        );
    }

    /// EOF mitten im Payload ist ein TruncatedStream.
    #[test]
    fn truncated_payload() {
        let data = [PRIM_I64, 0x00, 0x01];
        assert_eq!(
            decode_primitive(&mut data.as_slice()).unwrap_err(),
            Error::TruncatedStream
        );
    }
}
