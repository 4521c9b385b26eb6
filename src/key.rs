//! Typed key descriptors for record slots.
//!
//! Keys werden einmal bei Modul-Initialisierung konstruiert und sind danach
//! unveränderlich — typischerweise als `const`:
//!
//! ```
//! use xdata::{ListKey, ScalarKey};
//!
//! const WHEELS: ScalarKey<i32> = ScalarKey::new("wheels").non_null();
//! const TAGS: ListKey<String> = ListKey::new("tags");
//! ```
//!
//! Der Typparameter ist das Element selbst (für Listen-Keys das
//! Listenelement); Defaults gibt es nur für Skalar-Keys.

use std::marker::PhantomData;

use crate::value::{FieldType, Value};

/// Common surface of scalar and list keys.
pub trait Key {
    /// The slot name inside a record.
    fn name(&self) -> &'static str;
    /// Whether a null value (or an absent slot) is acceptable.
    fn allow_null(&self) -> bool;
}

/// Describes a single-value slot of type `T`.
#[derive(Debug, Clone)]
pub struct ScalarKey<T> {
    name: &'static str,
    allow_null: bool,
    default: Option<Value>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: FieldType> ScalarKey<T> {
    /// Creates a nullable key without a default value.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            allow_null: true,
            default: None,
            _marker: PhantomData,
        }
    }

    /// Rejects null writes and null reads through this key.
    pub const fn non_null(mut self) -> Self {
        self.allow_null = false;
        self
    }

    /// Value returned by `get_scalar` when the slot is absent.
    ///
    /// Nicht `const` — der Default wird sofort in seine Value-Form
    /// konvertiert, damit der Key selbst kein `T: Clone` braucht.
    pub fn with_default(mut self, value: T) -> Self {
        self.default = Some(value.into_value());
        self
    }

    /// The slot name inside a record.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Whether a null value (or an absent slot) is acceptable.
    pub const fn allow_null(&self) -> bool {
        self.allow_null
    }

    pub(crate) fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }
}

impl<T: FieldType> Key for ScalarKey<T> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn allow_null(&self) -> bool {
        self.allow_null
    }
}

/// Describes a list slot with elements of type `T`.
///
/// `allow_null` bezieht sich auf die Liste als Ganzes; ein fehlender
/// non-nullable Listen-Slot liest sich als leere Liste. Null-Elemente
/// innerhalb der Liste modelliert man über `ListKey<Option<T>>`.
#[derive(Debug, Clone)]
pub struct ListKey<T> {
    name: &'static str,
    allow_null: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T: FieldType> ListKey<T> {
    /// Creates a nullable list key.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            allow_null: true,
            _marker: PhantomData,
        }
    }

    /// Rejects null writes; absent slots read as an empty list.
    pub const fn non_null(mut self) -> Self {
        self.allow_null = false;
        self
    }

    /// The slot name inside a record.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the whole list may be null.
    pub const fn allow_null(&self) -> bool {
        self.allow_null
    }
}

impl<T: FieldType> Key for ListKey<T> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn allow_null(&self) -> bool {
        self.allow_null
    }
}
