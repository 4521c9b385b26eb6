//! The record: an insertion-ordered, keyed mapping of values.
//!
//! Records sind die strukturellen Knoten eines xdata-Baums. Die Reihenfolge
//! der Einträge bleibt über einen Round-Trip erhalten; Gleichheit ist
//! Inhalts-Gleichheit (reihenfolgeunabhängig, analog zu LinkedHashMap).
//!
//! Zugriff läuft über typisierte Keys ([`ScalarKey`], [`ListKey`]) mit den
//! Default- und Nullability-Regeln aus deren Deklaration. Roh-Zugriff
//! (`get_raw`, `keys`) existiert für Inspektion und für Records, deren
//! Converter beim Load fehlte.

use std::rc::Rc;

use crate::FastIndexMap;
use crate::error::{Error, Result};
use crate::key::{Key, ListKey, ScalarKey};
use crate::value::{FieldType, Value};

/// An ordered keyed mapping from strings to [`Value`]s.
#[derive(Debug, Default)]
pub struct Record {
    data: FastIndexMap<String, Value>,
}

impl Record {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value for `key`, the key's default when the slot is
    /// absent, or `None` for a (permitted) null.
    ///
    /// # Errors
    ///
    /// - [`Error::NullNotAllowed`] when the slot is null or absent without a
    ///   default and the key forbids null
    /// - [`Error::TypeMismatch`] when the stored value has the wrong shape
    pub fn get_scalar<T: FieldType>(&self, key: &ScalarKey<T>) -> Result<Option<T>> {
        match self.data.get(key.name()) {
            None => {
                if let Some(default) = key.default_value() {
                    // Der Default stammt aus FieldType::into_value desselben
                    // T — die Rückkonvertierung kann nicht fehlschlagen.
                    return Ok(T::from_value(default));
                }
                if key.allow_null() {
                    Ok(None)
                } else {
                    Err(Error::NullNotAllowed(key.name()))
                }
            }
            Some(Value::Null) => {
                if key.allow_null() {
                    Ok(None)
                } else {
                    Err(Error::NullNotAllowed(key.name()))
                }
            }
            Some(value) => match T::from_value(value) {
                Some(converted) => Ok(Some(converted)),
                None => Err(Error::TypeMismatch {
                    key: key.name(),
                    expected: T::describe(),
                    found: value.kind_name(),
                }),
            },
        }
    }

    /// Like [`get_scalar`](Self::get_scalar), but an absent slot is an error
    /// even when the key carries a default.
    pub fn get_mandatory_scalar<T: FieldType>(&self, key: &ScalarKey<T>) -> Result<Option<T>> {
        if !self.data.contains_key(key.name()) {
            return Err(Error::MissingKey(key.name()));
        }
        self.get_scalar(key)
    }

    /// Returns the stored list, an empty list when the slot is absent and the
    /// key is non-nullable, or `None` otherwise.
    pub fn get_list<T: FieldType>(&self, key: &ListKey<T>) -> Result<Option<Vec<T>>> {
        match self.data.get(key.name()) {
            None | Some(Value::Null) => {
                if key.allow_null() {
                    Ok(None)
                } else {
                    Ok(Some(Vec::new()))
                }
            }
            Some(Value::List(items)) => {
                let mut converted = Vec::with_capacity(items.len());
                for item in items {
                    match T::from_value(item) {
                        Some(element) => converted.push(element),
                        None => {
                            return Err(Error::TypeMismatch {
                                key: key.name(),
                                expected: T::describe(),
                                found: item.kind_name(),
                            });
                        }
                    }
                }
                Ok(Some(converted))
            }
            Some(other) => Err(Error::TypeMismatch {
                key: key.name(),
                expected: "list",
                found: other.kind_name(),
            }),
        }
    }

    /// Like [`get_list`](Self::get_list), but an absent slot is an error.
    pub fn get_mandatory_list<T: FieldType>(&self, key: &ListKey<T>) -> Result<Option<Vec<T>>> {
        if !self.data.contains_key(key.name()) {
            return Err(Error::MissingKey(key.name()));
        }
        self.get_list(key)
    }

    /// Stores a value (or an explicit null via `None`) under `key`.
    ///
    /// # Errors
    ///
    /// [`Error::NullOnNonNullable`] when `None` is written through a
    /// non-nullable key.
    pub fn set_scalar<T: FieldType>(
        &mut self,
        key: &ScalarKey<T>,
        value: impl Into<Option<T>>,
    ) -> Result<()> {
        let value = match value.into() {
            Some(value) => value.into_value(),
            None => {
                if !key.allow_null() {
                    return Err(Error::NullOnNonNullable(key.name()));
                }
                Value::Null
            }
        };
        self.data.insert(key.name().to_string(), value);
        Ok(())
    }

    /// Stores a list under `key`. The list structure is rebuilt on the way in
    /// (nested lists are deep-copied); records and leaf values are shared.
    pub fn set_list<T: FieldType>(
        &mut self,
        key: &ListKey<T>,
        values: impl Into<Option<Vec<T>>>,
    ) -> Result<()> {
        let value = match values.into() {
            Some(values) => Value::List(values.into_iter().map(FieldType::into_value).collect()),
            None => {
                if !key.allow_null() {
                    return Err(Error::NullOnNonNullable(key.name()));
                }
                Value::Null
            }
        };
        self.data.insert(key.name().to_string(), value);
        Ok(())
    }

    /// Whether a slot for `key` exists (even when its value is null).
    pub fn contains<K: Key>(&self, key: &K) -> bool {
        self.data.contains_key(key.name())
    }

    /// Removes the slot for `key`, preserving the order of the remaining slots.
    pub fn remove<K: Key>(&mut self, key: &K) {
        self.data.shift_remove(key.name());
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when the record has no slots.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Slot names in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    /// Raw value of a slot. Typed access über die Keys ist vorzuziehen;
    /// dieser Weg bleibt für Records ohne bekannten Converter.
    pub fn get_raw(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }

    /// Removes all slots. Iterativ, damit tiefe Bäume nicht den Call-Stack
    /// sprengen (derselbe Grund, aus dem der Codec frame-basiert ist).
    pub fn clear(&mut self) {
        let mut queue: Vec<Value> = self.data.drain(..).map(|(_, value)| value).collect();
        while let Some(value) = queue.pop() {
            match value {
                Value::List(items) => queue.extend(items),
                Value::Record(shared) => {
                    if let Ok(mut record) = Rc::try_unwrap(shared) {
                        queue.extend(record.data.drain(..).map(|(_, value)| value));
                    }
                }
                _ => {}
            }
        }
    }

    /// Structural clone: new record and list instances at every level,
    /// leaf values and domain objects shared.
    pub fn copy(&self) -> Record {
        let mut copy = Record::new();
        for (key, value) in &self.data {
            copy.data.insert(key.clone(), copy_value(value));
        }
        copy
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.data.iter()
    }

    pub(crate) fn insert_raw(&mut self, key: String, value: Value) {
        self.data.insert(key, value);
    }

    /// Entleert den Record in einen Eintragsvektor (Encoder-Frames).
    pub(crate) fn take_entries(&mut self) -> Vec<(String, Value)> {
        self.data.drain(..).collect()
    }
}

impl Clone for Record {
    /// Plain map clone; nested records stay shared. For new instances at
    /// every level use [`Record::copy`].
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
        }
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl Drop for Record {
    fn drop(&mut self) {
        if !self.data.is_empty() {
            self.clear();
        }
    }
}

fn copy_value(value: &Value) -> Value {
    match value {
        Value::List(items) => Value::List(items.iter().map(copy_value).collect()),
        Value::Record(shared) => Value::Record(Rc::new(shared.copy())),
        other => other.clone(),
    }
}

// ============================================================================
// Tree printer
// ============================================================================

impl std::fmt::Display for Record {
    /// Fixed-indent tree rendering, useful for tests and debugging. Not part
    /// of the wire contract.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "O Record")?;
        fmt_record(f, self, 0)
    }
}

fn fmt_record(f: &mut std::fmt::Formatter<'_>, record: &Record, depth: usize) -> std::fmt::Result {
    let pad = " ".repeat(depth);
    for (key, value) in record.entries() {
        match value {
            Value::Record(nested) => {
                writeln!(f, "{pad}|---O {key}: Record")?;
                fmt_record(f, nested, depth + 4)?;
            }
            Value::List(items) => {
                writeln!(f, "{pad}|---O {key}: List ({})", items.len())?;
                fmt_list(f, items, depth)?;
            }
            other => writeln!(f, "{pad}|- {key:<30} = {}", scalar_text(other))?,
        }
    }
    Ok(())
}

fn fmt_list(f: &mut std::fmt::Formatter<'_>, items: &[Value], depth: usize) -> std::fmt::Result {
    let width = items.len().to_string().len().max(1);
    let pad = " ".repeat(depth + 4);
    for (index, item) in items.iter().enumerate() {
        match item {
            Value::Record(nested) => {
                writeln!(f, "{pad}|-[{index:>width$}]-O Record")?;
                fmt_record(f, nested, depth + 4 + width + 5)?;
            }
            Value::List(nested) => {
                writeln!(f, "{pad}|-[{index:>width$}]-O List ({})", nested.len())?;
                fmt_list(f, nested, depth + width + 5)?;
            }
            other => writeln!(f, "{pad}|-[{index:>width$}] {}", scalar_text(other))?,
        }
    }
    Ok(())
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => "[null]".to_string(),
        Value::Bool(v) => v.to_string(),
        Value::I8(v) => v.to_string(),
        Value::I16(v) => v.to_string(),
        Value::I32(v) => v.to_string(),
        Value::I64(v) => v.to_string(),
        Value::Char(v) => char::from_u32(u32::from(*v))
            .map(|c| c.to_string())
            .unwrap_or_else(|| format!("\\u{v:04x}")),
        Value::F32(v) => v.to_string(),
        Value::F64(v) => v.to_string(),
        Value::Str(v) => v.clone(),
        Value::Object(handle) => format!("<{}>", handle.type_name()),
        Value::List(_) | Value::Record(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAME: ScalarKey<String> = ScalarKey::new("name");
    const COUNT: ScalarKey<i32> = ScalarKey::new("count");
    const STRICT: ScalarKey<i32> = ScalarKey::new("strict").non_null();
    const TAGS: ListKey<String> = ListKey::new("tags").non_null();
    const MAYBE_TAGS: ListKey<String> = ListKey::new("maybe_tags");

    // --- Scalar access ---

    /// Gesetzter Wert kommt unverändert zurück.
    #[test]
    fn set_then_get() {
        let mut record = Record::new();
        record.set_scalar(&NAME, "hello".to_string()).unwrap();
        assert_eq!(record.get_scalar(&NAME).unwrap(), Some("hello".to_string()));
    }

    /// Fehlender Slot mit Default liest den Default.
    #[test]
    fn absent_reads_default() {
        let key = ScalarKey::new("answer").with_default(42i32);
        let record = Record::new();
        assert_eq!(record.get_scalar(&key).unwrap(), Some(42));
    }

    /// Mandatory schlägt bei fehlendem Slot fehl, auch mit Default.
    #[test]
    fn mandatory_beats_default() {
        let key = ScalarKey::new("answer").with_default(42i32);
        let record = Record::new();
        assert_eq!(
            record.get_mandatory_scalar(&key).unwrap_err(),
            Error::MissingKey("answer")
        );
    }

    /// Fehlender nullable Slot ohne Default liest None.
    #[test]
    fn absent_nullable_is_none() {
        let record = Record::new();
        assert_eq!(record.get_scalar(&COUNT).unwrap(), None);
    }

    /// Fehlender non-nullable Slot ohne Default ist ein Fehler.
    #[test]
    fn absent_non_nullable_is_error() {
        let record = Record::new();
        assert_eq!(
            record.get_scalar(&STRICT).unwrap_err(),
            Error::NullNotAllowed("strict")
        );
    }

    /// Expliziter Null-Slot: erlaubt bei nullable, Fehler bei non-null.
    #[test]
    fn explicit_null() {
        let mut record = Record::new();
        record.set_scalar(&COUNT, None).unwrap();
        assert!(record.contains(&COUNT));
        assert_eq!(record.get_scalar(&COUNT).unwrap(), None);

        assert_eq!(
            Record::new().set_scalar(&STRICT, None).unwrap_err(),
            Error::NullOnNonNullable("strict")
        );
    }

    /// Falsche Werteform meldet TypeMismatch mit beiden Typnamen.
    #[test]
    fn type_mismatch() {
        let mut record = Record::new();
        record.set_scalar(&NAME, "seven".to_string()).unwrap();
        let wrong: ScalarKey<i32> = ScalarKey::new("name");
        let err = record.get_scalar(&wrong).unwrap_err();
        assert_eq!(
            err,
            Error::TypeMismatch {
                key: "name",
                expected: "i32",
                found: "string",
            }
        );
    }

    // --- List access ---

    /// Fehlende non-nullable Liste liest sich als leere Liste.
    #[test]
    fn absent_non_nullable_list_is_empty() {
        let record = Record::new();
        assert_eq!(record.get_list(&TAGS).unwrap(), Some(Vec::new()));
    }

    /// Fehlende nullable Liste liest sich als None.
    #[test]
    fn absent_nullable_list_is_none() {
        let record = Record::new();
        assert_eq!(record.get_list(&MAYBE_TAGS).unwrap(), None);
    }

    /// Mandatory-Liste schlägt bei fehlendem Slot fehl.
    #[test]
    fn mandatory_list_absent() {
        let record = Record::new();
        assert_eq!(
            record.get_mandatory_list(&TAGS).unwrap_err(),
            Error::MissingKey("tags")
        );
    }

    /// Listen mit Null-Elementen über Option<T>.
    #[test]
    fn list_with_null_elements() {
        let key: ListKey<Option<i32>> = ListKey::new("sparse");
        let mut record = Record::new();
        record.set_list(&key, vec![Some(1), None, Some(3)]).unwrap();
        assert_eq!(
            record.get_list(&key).unwrap(),
            Some(vec![Some(1), None, Some(3)])
        );
    }

    /// set_list kopiert die Listenstruktur: spätere Änderungen am Original
    /// erreichen den Record nicht.
    #[test]
    fn set_list_copies_structure() {
        let mut original = vec!["a".to_string()];
        let mut record = Record::new();
        record.set_list(&TAGS, original.clone()).unwrap();
        original.push("b".to_string());
        assert_eq!(record.get_list(&TAGS).unwrap(), Some(vec!["a".to_string()]));
    }

    // --- Structure ---

    /// Einträge behalten ihre Einfügereihenfolge.
    #[test]
    fn insertion_order_preserved() {
        let mut record = Record::new();
        record.set_scalar(&NAME, "x".to_string()).unwrap();
        record.set_scalar(&COUNT, 1).unwrap();
        let keys: Vec<&str> = record.keys().collect();
        assert_eq!(keys, vec!["name", "count"]);
    }

    /// Gleichheit ist Inhalts-Gleichheit, unabhängig von der Reihenfolge.
    #[test]
    fn content_equality() {
        let mut a = Record::new();
        a.set_scalar(&NAME, "x".to_string()).unwrap();
        a.set_scalar(&COUNT, 1).unwrap();

        let mut b = Record::new();
        b.set_scalar(&COUNT, 1).unwrap();
        b.set_scalar(&NAME, "x".to_string()).unwrap();

        assert_eq!(a, b);

        b.set_scalar(&COUNT, 2).unwrap();
        assert_ne!(a, b);
    }

    /// copy() liefert neue Record- und Listeninstanzen, geteilte Blätter.
    #[test]
    fn copy_is_structural() {
        let inner_key: ScalarKey<Rc<Record>> = ScalarKey::new("inner");
        let mut inner = Record::new();
        inner.set_scalar(&COUNT, 7).unwrap();

        let mut outer = Record::new();
        outer.set_scalar(&inner_key, Rc::new(inner)).unwrap();

        let copy = outer.copy();
        assert_eq!(copy, outer);

        // Die Kopie hat eine eigene Record-Instanz im Slot.
        let original_inner = outer.get_scalar(&inner_key).unwrap().unwrap();
        let copied_inner = copy.get_scalar(&inner_key).unwrap().unwrap();
        assert!(!Rc::ptr_eq(&original_inner, &copied_inner));
    }

    /// Tiefe Bäume werden iterativ abgebaut (kein Stack-Overflow im Drop).
    #[test]
    fn deep_drop_is_iterative() {
        let child: ScalarKey<Rc<Record>> = ScalarKey::new("child");
        let mut node = Record::new();
        for _ in 0..200_000 {
            let mut parent = Record::new();
            parent.set_scalar(&child, Rc::new(node)).unwrap();
            node = parent;
        }
        drop(node);
    }

    /// clear entfernt alle Slots, der Record bleibt benutzbar.
    #[test]
    fn clear_empties() {
        let mut record = Record::new();
        record.set_scalar(&NAME, "x".to_string()).unwrap();
        record.clear();
        assert!(record.is_empty());
        record.set_scalar(&COUNT, 3).unwrap();
        assert_eq!(record.len(), 1);
    }

    /// Der Tree-Printer rendert Records, Listen und Nulls.
    #[test]
    fn tree_printer() {
        let mut inner = Record::new();
        inner.set_scalar(&COUNT, 4).unwrap();

        let nested: ScalarKey<Rc<Record>> = ScalarKey::new("nested");
        let mut record = Record::new();
        record.set_scalar(&NAME, "demo".to_string()).unwrap();
        record.set_scalar(&COUNT, None).unwrap();
        record
            .set_list(&TAGS, vec!["a".to_string(), "b".to_string()])
            .unwrap();
        record.set_scalar(&nested, Rc::new(inner)).unwrap();

        let rendered = record.to_string();
        assert!(rendered.starts_with("O Record\n"), "{rendered}");
        assert!(rendered.contains("|- name"), "{rendered}");
        assert!(rendered.contains("[null]"), "{rendered}");
        assert!(rendered.contains("|---O tags: List (2)"), "{rendered}");
        assert!(rendered.contains("|---O nested: Record"), "{rendered}");
    }
}
