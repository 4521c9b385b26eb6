//! Converter protocol and per-call registry.
//!
//! Ein [`Converter`] bildet einen Domain-Typ auf einen [`Record`] ab und
//! zurück. Auf der Schreibseite wird er über das Typ-Token des Werts
//! gefunden, auf der Leseseite über seinen stabilen Typnamen, der als
//! [`META_CLASS_NAME`]-Slot im Record steht. Namenskonvention
//! `"xdata.<projekt>.<name>"`, damit Refactorings den Draht nicht brechen.
//!
//! Die Registry wird pro `store`/`load`-Aufruf zusammengesetzt:
//! Nutzer-Converter zuerst, danach die eingebauten Defaults (Datum, URL) —
//! Defaults überschreiben nie einen Nutzer-Eintrag. `required_converters`
//! wird transitiv expandiert; bereits registrierte Namen werden
//! übersprungen, wodurch auch zyklische Abhängigkeitsgraphen terminieren.

mod date;
mod url;

use std::any::{Any, TypeId};
use std::rc::Rc;

use crate::FastHashMap;
use crate::error::Result;
use crate::record::Record;
use crate::value::{ObjectHandle, Value};

pub use date::DateConverter;
pub use url::UrlConverter;

/// Reserved record key carrying the converter type-name of a marshalled
/// domain value.
pub const META_CLASS_NAME: &str = "_meta_classname";

/// Marshals a domain type to and from a [`Record`].
///
/// Converter sind zustandslose Singletons und müssen reentrant sein —
/// der Codec ruft denselben Converter innerhalb eines Aufrufs für
/// beliebig viele Werte auf.
pub trait Converter {
    /// Stable identifier written into the record as [`META_CLASS_NAME`].
    fn type_name(&self) -> &'static str;

    /// Type token of the domain type this converter handles (write-side
    /// lookup key).
    fn target_type(&self) -> TypeId;

    /// Converters this converter depends on; the registry includes them
    /// transitively.
    fn required_converters(&self) -> Vec<Rc<dyn Converter>> {
        Vec::new()
    }

    /// Builds the record form of a domain value.
    fn marshal(&self, value: &dyn Any) -> Result<Record>;

    /// Rebuilds the domain value from its record form.
    fn unmarshal(&self, record: &Record) -> Result<Rc<dyn Any>>;
}

/// Write- and read-keyed converter lookup, assembled per store/load call.
pub(crate) struct ConverterRegistry {
    by_type: FastHashMap<TypeId, Rc<dyn Converter>>,
    by_name: FastHashMap<&'static str, Rc<dyn Converter>>,
}

impl ConverterRegistry {
    /// Assembles the registry: user converters first, built-in defaults only
    /// where no entry exists yet.
    pub(crate) fn assemble(user: &[Rc<dyn Converter>]) -> Self {
        let mut registry = Self {
            by_type: FastHashMap::default(),
            by_name: FastHashMap::default(),
        };
        for converter in user {
            registry.add_transitive(Rc::clone(converter));
        }
        for default in defaults() {
            registry.add_transitive(default);
        }
        registry
    }

    /// Erster Eintrag pro Name gewinnt; Abhängigkeiten werden über eine
    /// Arbeitsliste expandiert (Zyklen enden am Namens-Check).
    fn add_transitive(&mut self, converter: Rc<dyn Converter>) {
        let mut pending = vec![converter];
        while let Some(converter) = pending.pop() {
            if self.by_name.contains_key(converter.type_name()) {
                continue;
            }
            pending.extend(converter.required_converters());
            self.by_type
                .insert(converter.target_type(), Rc::clone(&converter));
            self.by_name.insert(converter.type_name(), converter);
        }
    }

    pub(crate) fn for_name(&self, name: &str) -> Option<&Rc<dyn Converter>> {
        self.by_name.get(name)
    }

    /// Marshals a domain value into its stamped record form, or `None` when
    /// no converter is registered for its type.
    pub(crate) fn marshal_object(&self, handle: &ObjectHandle) -> Result<Option<Record>> {
        match self.by_type.get(&handle.concrete_type_id()) {
            Some(converter) => {
                let mut record = converter.marshal(handle.as_any())?;
                record.insert_raw(
                    META_CLASS_NAME.to_string(),
                    Value::Str(converter.type_name().to_string()),
                );
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }
}

fn defaults() -> [Rc<dyn Converter>; 2] {
    [Rc::new(DateConverter), Rc::new(UrlConverter)]
}
