//! Shared test fixtures: a small domain type with converter, plus a
//! structural scanner over decompressed streams.

use std::any::{Any, TypeId};
use std::io::Read;
use std::rc::Rc;
use std::time::SystemTime;

use flate2::read::GzDecoder;

use crate::convert::{Converter, DateConverter};
use crate::error::{Error, Result};
use crate::key::{ListKey, ScalarKey};
use crate::record::Record;

/// Beispiel-Domain-Typ für Converter- und Sharing-Tests.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Car {
    pub wheels: i32,
    pub hp: f64,
    pub build_date: SystemTime,
    pub check_dates: Vec<SystemTime>,
}

const KEY_WHEELS: ScalarKey<i32> = ScalarKey::new("wheels").non_null();
const KEY_HP: ScalarKey<f64> = ScalarKey::new("hp").non_null();
const KEY_BUILD_DATE: ScalarKey<Rc<SystemTime>> = ScalarKey::new("build_date").non_null();
const KEY_CHECK_DATES: ListKey<Rc<SystemTime>> = ListKey::new("check_dates").non_null();

pub(crate) struct CarConverter;

impl Converter for CarConverter {
    fn type_name(&self) -> &'static str {
        "xdata.test.car"
    }

    fn target_type(&self) -> TypeId {
        TypeId::of::<Car>()
    }

    fn required_converters(&self) -> Vec<Rc<dyn Converter>> {
        vec![Rc::new(DateConverter)]
    }

    fn marshal(&self, value: &dyn Any) -> Result<Record> {
        let car = value
            .downcast_ref::<Car>()
            .ok_or_else(|| Error::InvalidValue("car converter received a non-Car".into()))?;
        let mut record = Record::new();
        record.set_scalar(&KEY_WHEELS, car.wheels)?;
        record.set_scalar(&KEY_HP, car.hp)?;
        record.set_scalar(&KEY_BUILD_DATE, Rc::new(car.build_date))?;
        record.set_list(
            &KEY_CHECK_DATES,
            car.check_dates.iter().map(|date| Rc::new(*date)).collect::<Vec<_>>(),
        )?;
        Ok(record)
    }

    fn unmarshal(&self, record: &Record) -> Result<Rc<dyn Any>> {
        let wheels = record
            .get_scalar(&KEY_WHEELS)?
            .ok_or(Error::NullNotAllowed(KEY_WHEELS.name()))?;
        let hp = record
            .get_scalar(&KEY_HP)?
            .ok_or(Error::NullNotAllowed(KEY_HP.name()))?;
        let build_date = record
            .get_scalar(&KEY_BUILD_DATE)?
            .ok_or(Error::NullNotAllowed(KEY_BUILD_DATE.name()))?;
        let check_dates = record
            .get_list(&KEY_CHECK_DATES)?
            .unwrap_or_default()
            .into_iter()
            .map(|date| *date)
            .collect();
        Ok(Rc::new(Car {
            wheels,
            hp,
            build_date: *build_date,
            check_dates,
        }))
    }
}

/// Entpackt einen gzip-gewrappten Stream.
pub(crate) fn gunzip(bytes: &[u8]) -> Vec<u8> {
    let mut decoder = GzDecoder::new(bytes);
    let mut plain = Vec::new();
    decoder.read_to_end(&mut plain).expect("gzip intact");
    plain
}

/// Ergebnis eines strukturellen Laufs über den dekomprimierten Stream.
pub(crate) struct StreamStats {
    /// Offsets aller geschriebenen `0x03` Record-Tags.
    pub record_offsets: Vec<usize>,
    /// Ziel-Offsets aller `0x04` Referenzen.
    pub reference_targets: Vec<i64>,
}

/// Läuft den dekomprimierten Stream strukturell ab und sammelt Record- und
/// Referenz-Tags (naives Byte-Zählen würde Payload-Bytes mitzählen).
pub(crate) fn scan_stream(plain: &[u8]) -> StreamStats {
    let mut stats = StreamStats {
        record_offsets: Vec::new(),
        reference_targets: Vec::new(),
    };
    let mut pos = crate::container::MAGIC.len();
    skip_value(plain, &mut pos, &mut stats);
    stats
}

fn skip_value(bytes: &[u8], pos: &mut usize, stats: &mut StreamStats) {
    let tag = bytes[*pos];
    let tag_offset = *pos;
    *pos += 1;
    match tag {
        crate::primitive::VALUE_NULL => {}
        crate::primitive::VALUE_PRIMITIVE => skip_primitive(bytes, pos),
        crate::primitive::VALUE_LIST => {
            let count = read_i32(bytes, pos);
            for _ in 0..count {
                skip_value(bytes, pos, stats);
            }
        }
        crate::primitive::VALUE_RECORD => {
            stats.record_offsets.push(tag_offset);
            let count = read_i32(bytes, pos);
            for _ in 0..count {
                skip_string(bytes, pos);
                skip_value(bytes, pos, stats);
            }
        }
        crate::primitive::VALUE_REFERENCE => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&bytes[*pos..*pos + 8]);
            stats.reference_targets.push(i64::from_be_bytes(raw));
            *pos += 8;
        }
        other => panic!("unexpected value tag {other:#04x} at offset {tag_offset}"),
    }
}

fn skip_primitive(bytes: &[u8], pos: &mut usize) {
    let tag = bytes[*pos];
    *pos += 1;
    let payload = match tag {
        crate::primitive::PRIM_BOOL | crate::primitive::PRIM_I8 => 1,
        crate::primitive::PRIM_CHAR | crate::primitive::PRIM_I16 => 2,
        crate::primitive::PRIM_I32 | crate::primitive::PRIM_F32 => 4,
        crate::primitive::PRIM_I64 | crate::primitive::PRIM_F64 => 8,
        crate::primitive::PRIM_STRING => {
            skip_string(bytes, pos);
            0
        }
        other => panic!("unexpected primitive tag {other:#04x}"),
    };
    *pos += payload;
}

fn skip_string(bytes: &[u8], pos: &mut usize) {
    let len = usize::from(u16::from_be_bytes([bytes[*pos], bytes[*pos + 1]]));
    *pos += 2 + len;
}

fn read_i32(bytes: &[u8], pos: &mut usize) -> i32 {
    let value = i32::from_be_bytes([
        bytes[*pos],
        bytes[*pos + 1],
        bytes[*pos + 2],
        bytes[*pos + 3],
    ]);
    *pos += 4;
    value
}
