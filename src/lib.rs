//! xdata – self-describing, typed, compressed binary container format
//!
//! # Beispiel
//!
//! ```
//! use xdata::{Record, ScalarKey, store, load};
//!
//! const GREETING: ScalarKey<String> = ScalarKey::new("greeting");
//!
//! // Store
//! let mut node = Record::new();
//! node.set_scalar(&GREETING, "hello world".to_string()).unwrap();
//! let mut buf = Vec::new();
//! store(&node, &mut buf, &[]).unwrap();
//!
//! // Load
//! let restored = load(&buf[..], &[]).unwrap();
//! assert_eq!(restored.get_scalar(&GREETING).unwrap(), Some("hello world".to_string()));
//! ```
//!
//! Ein xdata-Stream ist ein gzip-gewrapptes Byte-Format: Magic-Header,
//! ein getaggter Wertebaum (Records, Listen, Primitive, Referenzen) und
//! optional ein SHA-256 Trailer. Domain-Typen werden über registrierte
//! [`Converter`] auf Records abgebildet; mehrfach referenzierte Objekte
//! landen genau einmal im Stream und werden per Byte-Offset rückverwiesen.

pub mod container;
pub mod convert;
pub mod error;
pub mod key;
pub mod primitive;
pub mod record;
pub mod value;

pub(crate) mod decoder;
pub(crate) mod encoder;
pub(crate) mod pool;
pub(crate) mod streams;
pub(crate) mod string;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{Error, Result};

/// HashMap mit ahash (schneller, nicht DoS-resistent — für interne Datenstrukturen).
pub(crate) type FastHashMap<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;

/// IndexMap mit ahash (deterministische Iteration + schnelles Hashing).
pub(crate) type FastIndexMap<K, V> = indexmap::IndexMap<K, V, ahash::RandomState>;

// Public API: Datenmodell
pub use key::{Key, ListKey, ScalarKey};
pub use record::Record;
pub use value::{FieldType, ObjectHandle, Value};

// Public API: Converter
pub use convert::{Converter, DateConverter, UrlConverter, META_CLASS_NAME};

// Public API: Container
pub use container::{
    ChecksumValidation, LoadConfig, ProgressListener, StoreConfig, load, load_file,
    load_with_config, load_with_progress, store, store_file, store_with_config,
    store_with_progress, validate, validate_file,
};
