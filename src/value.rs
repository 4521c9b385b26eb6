//! The tagged value model of the xdata tree.
//!
//! [`Value`] ist die Vereinigung aller Formen, die in einem Record-Baum
//! vorkommen können: Null, die neun Primitive, Listen, geschachtelte Records
//! und noch nicht gemarshallte bzw. wieder hydrierte Domain-Objekte.
//! Referenzen tauchen hier bewusst nicht auf — sie existieren nur auf dem
//! Draht und werden beim Decoding sofort aufgelöst.
//!
//! [`FieldType`] verbindet Rust-Typen mit ihrer `Value`-Form. Die Umkehrung
//! (`from_value`) gibt `None` bei einer Formverletzung zurück; die
//! Record-Accessoren machen daraus einen [`TypeMismatch`](crate::Error).

use std::any::Any;
use std::rc::Rc;

use crate::record::Record;

/// A single node in an xdata tree.
#[derive(Debug, Clone)]
pub enum Value {
    /// Explicit null slot.
    Null,
    /// Boolean, one byte on the wire.
    Bool(bool),
    /// Signed 8-bit integer.
    I8(i8),
    /// Signed 16-bit integer, big-endian on the wire.
    I16(i16),
    /// Signed 32-bit integer, big-endian on the wire.
    I32(i32),
    /// Signed 64-bit integer, big-endian on the wire.
    I64(i64),
    /// Ein UTF-16 Code-Unit (das 16-bit Char-Primitiv des Formats).
    Char(u16),
    /// IEEE-754 single precision.
    F32(f32),
    /// IEEE-754 double precision.
    F64(f64),
    /// Length-prefixed modified-UTF-8 string.
    Str(String),
    /// Ordered sequence of values; duplicates allowed.
    List(Vec<Value>),
    /// Nested record, shared by reference.
    Record(Rc<Record>),
    /// A domain value awaiting marshalling (write side) or re-hydrated by a
    /// converter (read side).
    Object(ObjectHandle),
}

impl Value {
    /// Kurzname der Werteform für Fehlermeldungen.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::I8(_) => "i8",
            Self::I16(_) => "i16",
            Self::I32(_) => "i32",
            Self::I64(_) => "i64",
            Self::Char(_) => "char",
            Self::F32(_) => "f32",
            Self::F64(_) => "f64",
            Self::Str(_) => "string",
            Self::List(_) => "list",
            Self::Record(_) => "record",
            Self::Object(_) => "object",
        }
    }

}

impl PartialEq for Value {
    /// Structural equality; floats compare by bit pattern so that values
    /// survive a round trip exactly (including NaN payloads).
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::I8(a), Self::I8(b)) => a == b,
            (Self::I16(a), Self::I16(b)) => a == b,
            (Self::I32(a), Self::I32(b)) => a == b,
            (Self::I64(a), Self::I64(b)) => a == b,
            (Self::Char(a), Self::Char(b)) => a == b,
            (Self::F32(a), Self::F32(b)) => a.to_bits() == b.to_bits(),
            (Self::F64(a), Self::F64(b)) => a.to_bits() == b.to_bits(),
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Record(a), Self::Record(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a == b,
            _ => false,
        }
    }
}

/// A dynamically typed domain value inside the tree.
///
/// Trägt neben dem `Rc<dyn Any>` einen Diagnose-Typnamen, damit
/// Fehlermeldungen (fehlender Converter) den konkreten Typ nennen können.
/// Gleichheit ist Pointer-Identität: zwei Handles sind genau dann gleich,
/// wenn sie dasselbe Objekt teilen.
#[derive(Clone)]
pub struct ObjectHandle {
    value: Rc<dyn Any>,
    type_name: &'static str,
}

impl ObjectHandle {
    pub(crate) fn new(value: Rc<dyn Any>, type_name: &'static str) -> Self {
        Self { value, type_name }
    }

    /// The diagnostic name of the wrapped type (Rust type path on the write
    /// side, converter type-name on the read side).
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Attempts to share the wrapped value as a concrete type.
    pub fn downcast<T: 'static>(&self) -> Option<Rc<T>> {
        Rc::clone(&self.value).downcast::<T>().ok()
    }

    pub(crate) fn as_any(&self) -> &dyn Any {
        self.value.as_ref()
    }

    /// TypeId des konkreten Werts (nicht des `dyn Any`-Fat-Pointers).
    pub(crate) fn concrete_type_id(&self) -> std::any::TypeId {
        self.value.as_ref().type_id()
    }

    /// Adresse des geteilten Objekts — der Identitätsschlüssel des Encoders.
    pub(crate) fn address(&self) -> usize {
        Rc::as_ptr(&self.value) as *const () as usize
    }
}

impl PartialEq for ObjectHandle {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.value, &other.value)
    }
}

impl std::fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Object<{}>", self.type_name)
    }
}

/// Conversion between Rust types and their [`Value`] form.
///
/// Implementiert für die neun Primitive, `Vec<T>` (geschachtelte Listen),
/// `Option<T>` (explizite Null-Slots, z.B. als Listenelement) und `Rc<T>`
/// (Records und Domain-Objekte).
pub trait FieldType: Sized + 'static {
    /// Converts the value into its tree form.
    fn into_value(self) -> Value;

    /// Reads the value back out of its tree form; `None` on a shape mismatch.
    fn from_value(value: &Value) -> Option<Self>;

    /// Name used in `TypeMismatch` messages.
    fn describe() -> &'static str {
        std::any::type_name::<Self>()
    }
}

macro_rules! primitive_field_type {
    ($ty:ty, $variant:ident) => {
        impl FieldType for $ty {
            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(*v),
                    _ => None,
                }
            }
        }
    };
}

primitive_field_type!(bool, Bool);
primitive_field_type!(i8, I8);
primitive_field_type!(i16, I16);
primitive_field_type!(i32, I32);
primitive_field_type!(i64, I64);
primitive_field_type!(u16, Char);
primitive_field_type!(f32, F32);
primitive_field_type!(f64, F64);

impl FieldType for String {
    fn into_value(self) -> Value {
        Value::Str(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Str(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl<T: FieldType> FieldType for Vec<T> {
    fn into_value(self) -> Value {
        Value::List(self.into_iter().map(FieldType::into_value).collect())
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::List(items) => items.iter().map(T::from_value).collect(),
            _ => None,
        }
    }
}

impl<T: FieldType> FieldType for Option<T> {
    fn into_value(self) -> Value {
        match self {
            Some(inner) => inner.into_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// Structural clone of a value without recursion.
///
/// Primitive kopieren, Records und Objekte teilen ihren `Rc` — nur
/// Listenstruktur wird neu aufgebaut, über einen expliziten Arbeitsstack.
/// Der abgeleitete `Clone` würde auf tiefen Listen-in-Listen-Ketten den
/// Call-Stack sprengen; der Codec benutzt deshalb diese Variante.
pub(crate) fn clone_value(value: &Value) -> Value {
    match value {
        Value::List(items) => Value::List(clone_list(items)),
        other => other.clone(),
    }
}

fn clone_list(items: &[Value]) -> Vec<Value> {
    struct Pending<'a> {
        source: &'a [Value],
        next: usize,
        target: Vec<Value>,
    }

    enum Step<'a> {
        Descend(&'a [Value]),
        Finish,
    }

    let mut stack = vec![Pending {
        source: items,
        next: 0,
        target: Vec::with_capacity(items.len()),
    }];

    loop {
        let step = match stack.last_mut() {
            Some(top) if top.next < top.source.len() => {
                let item = &top.source[top.next];
                top.next += 1;
                match item {
                    Value::List(nested) => Step::Descend(nested),
                    other => {
                        top.target.push(other.clone());
                        continue;
                    }
                }
            }
            Some(_) => Step::Finish,
            None => return Vec::new(),
        };
        match step {
            Step::Descend(nested) => stack.push(Pending {
                source: nested,
                next: 0,
                target: Vec::with_capacity(nested.len()),
            }),
            Step::Finish => {
                let done = match stack.pop() {
                    Some(done) => done,
                    None => return Vec::new(),
                };
                match stack.last_mut() {
                    Some(parent) => parent.target.push(Value::List(done.target)),
                    None => return done.target,
                }
            }
        }
    }
}

impl<T: 'static> FieldType for Rc<T> {
    /// `Rc<Record>` landet als struktureller Knoten im Baum, jeder andere
    /// `Rc<T>` als Domain-Objekt, das beim Store einen Converter braucht.
    fn into_value(self) -> Value {
        let any: Rc<dyn Any> = self;
        match any.downcast::<Record>() {
            Ok(record) => Value::Record(record),
            Err(other) => Value::Object(ObjectHandle::new(other, std::any::type_name::<T>())),
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Record(record) => {
                let any: Rc<dyn Any> = Rc::clone(record) as Rc<dyn Any>;
                any.downcast::<T>().ok()
            }
            Value::Object(handle) => handle.downcast::<T>(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- FieldType round trips ---

    /// Jedes Primitiv überlebt die Konvertierung in seine Value-Form.
    #[test]
    fn primitive_conversions() {
        assert_eq!(bool::from_value(&true.into_value()), Some(true));
        assert_eq!(i8::from_value(&5i8.into_value()), Some(5));
        assert_eq!(i16::from_value(&13i16.into_value()), Some(13));
        assert_eq!(i32::from_value(&67_567i32.into_value()), Some(67_567));
        assert_eq!(
            i64::from_value(&786_783_647_846_876_879i64.into_value()),
            Some(786_783_647_846_876_879)
        );
        assert_eq!(u16::from_value(&0x00f6u16.into_value()), Some(0x00f6));
        assert_eq!(f32::from_value(&42.24f32.into_value()), Some(42.24));
        assert_eq!(
            f64::from_value(&std::f64::consts::PI.into_value()),
            Some(std::f64::consts::PI)
        );
        assert_eq!(
            String::from_value(&"blafasel".to_string().into_value()),
            Some("blafasel".to_string())
        );
    }

    /// Formverletzungen geben None zurück, nicht einen Default.
    #[test]
    fn shape_mismatch_is_none() {
        assert_eq!(i32::from_value(&Value::Str("7".into())), None);
        assert_eq!(String::from_value(&Value::I32(7)), None);
        assert_eq!(bool::from_value(&Value::Null), None);
    }

    /// Vec<T> wird elementweise konvertiert; ein falsches Element kippt alles.
    #[test]
    fn vec_conversion() {
        let value = vec!["abc".to_string(), "def".to_string()].into_value();
        assert_eq!(
            Vec::<String>::from_value(&value),
            Some(vec!["abc".to_string(), "def".to_string()])
        );

        let mixed = Value::List(vec![Value::Str("abc".into()), Value::I32(1)]);
        assert_eq!(Vec::<String>::from_value(&mixed), None);
    }

    /// Option<T> bildet Null ab und erlaubt Null-Elemente in Listen.
    #[test]
    fn option_conversion() {
        assert_eq!(Option::<i32>::from_value(&Value::Null), Some(None));
        assert_eq!(Option::<i32>::from_value(&Value::I32(3)), Some(Some(3)));
        assert_eq!(None::<i32>.into_value(), Value::Null);
    }

    /// Rc<Record> wird zum strukturellen Knoten, andere Rc<T> zum Objekt.
    #[test]
    fn rc_split() {
        let record = Rc::new(Record::new());
        assert!(matches!(record.into_value(), Value::Record(_)));

        let object = Rc::new(42u64);
        let value = object.into_value();
        assert!(matches!(value, Value::Object(_)));
        assert_eq!(Rc::<u64>::from_value(&value).as_deref(), Some(&42));
    }

    // --- Equality semantics ---

    /// Floats vergleichen nach Bitmuster: NaN == NaN.
    #[test]
    fn float_equality_by_bits() {
        assert_eq!(Value::F64(f64::NAN), Value::F64(f64::NAN));
        assert_ne!(Value::F64(0.0), Value::F64(-0.0));
        assert_eq!(Value::F32(f32::NAN), Value::F32(f32::NAN));
    }

    /// Objekt-Gleichheit ist Identität, nie strukturell.
    #[test]
    fn object_equality_is_identity() {
        let shared = Rc::new(7i64);
        let a = Rc::clone(&shared).into_value();
        let b = shared.into_value();
        assert_eq!(a, b);

        let c = Rc::new(7i64).into_value();
        assert_ne!(a, c);
    }

    /// kind_name deckt jede Form ab.
    #[test]
    fn kind_names() {
        assert_eq!(Value::Null.kind_name(), "null");
        assert_eq!(Value::Str(String::new()).kind_name(), "string");
        assert_eq!(Value::List(Vec::new()).kind_name(), "list");
        assert_eq!(Value::Record(Rc::new(Record::new())).kind_name(), "record");
    }
}
