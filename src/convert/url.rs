//! Built-in converter for URLs.
//!
//! Bildet [`url::Url`] über seine externe String-Form auf
//! `{url_string: String}` ab. Der Typname ist der kanonische Name des
//! URL-Typs dieser Plattform.

use std::any::{Any, TypeId};
use std::rc::Rc;

use url::Url;

use super::Converter;
use crate::error::{Error, Result};
use crate::key::ScalarKey;
use crate::record::Record;

const KEY_URL_STRING: ScalarKey<String> = ScalarKey::new("url_string").non_null();

/// Always-registered converter for [`Url`].
pub struct UrlConverter;

impl Converter for UrlConverter {
    fn type_name(&self) -> &'static str {
        "url::Url"
    }

    fn target_type(&self) -> TypeId {
        TypeId::of::<Url>()
    }

    fn marshal(&self, value: &dyn Any) -> Result<Record> {
        let url = value
            .downcast_ref::<Url>()
            .ok_or_else(|| Error::InvalidValue("url converter received a non-Url".into()))?;
        let mut record = Record::new();
        record.set_scalar(&KEY_URL_STRING, url.as_str().to_string())?;
        Ok(record)
    }

    fn unmarshal(&self, record: &Record) -> Result<Rc<dyn Any>> {
        let raw = record
            .get_mandatory_scalar(&KEY_URL_STRING)?
            .ok_or(Error::NullNotAllowed(KEY_URL_STRING.name()))?;
        let url = Url::parse(&raw)
            .map_err(|err| Error::InvalidValue(format!("stored url '{raw}' is not valid: {err}")))?;
        Ok(Rc::new(url))
    }
}
