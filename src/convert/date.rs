//! Built-in converter for timestamps.
//!
//! Bildet [`SystemTime`] auf `{timestamp: i64}` ab — Millisekunden seit der
//! Unix-Epoche, negativ für Zeitpunkte davor. Typname `"xdata.date"`.

use std::any::{Any, TypeId};
use std::rc::Rc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::Converter;
use crate::error::{Error, Result};
use crate::key::ScalarKey;
use crate::record::Record;

const KEY_TIMESTAMP: ScalarKey<i64> = ScalarKey::new("timestamp").non_null();

/// Always-registered converter for [`SystemTime`].
pub struct DateConverter;

impl Converter for DateConverter {
    fn type_name(&self) -> &'static str {
        "xdata.date"
    }

    fn target_type(&self) -> TypeId {
        TypeId::of::<SystemTime>()
    }

    fn marshal(&self, value: &dyn Any) -> Result<Record> {
        let time = value
            .downcast_ref::<SystemTime>()
            .ok_or_else(|| Error::InvalidValue("date converter received a non-SystemTime".into()))?;
        let millis = match time.duration_since(UNIX_EPOCH) {
            Ok(elapsed) => elapsed.as_millis() as i64,
            Err(before_epoch) => -(before_epoch.duration().as_millis() as i64),
        };
        let mut record = Record::new();
        record.set_scalar(&KEY_TIMESTAMP, millis)?;
        Ok(record)
    }

    fn unmarshal(&self, record: &Record) -> Result<Rc<dyn Any>> {
        let millis = record
            .get_mandatory_scalar(&KEY_TIMESTAMP)?
            .ok_or(Error::NullNotAllowed(KEY_TIMESTAMP.name()))?;
        let time = if millis >= 0 {
            UNIX_EPOCH + Duration::from_millis(millis as u64)
        } else {
            UNIX_EPOCH - Duration::from_millis(millis.unsigned_abs())
        };
        Ok(Rc::new(time))
    }
}
