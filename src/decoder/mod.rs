//! Iterative tree deserializer.
//!
//! Spiegelbild des Encoders: ein expliziter Frame-Stack, keine Rekursion.
//! `decode_element` liest genau ein Tag und liefert entweder einen fertigen
//! Wert (Null, Primitiv, aufgelöste Referenz) oder pusht einen neuen Frame
//! für Listen und Records. Fertig materialisierte Frames liefern ihren Wert
//! beim Pop an den Elternframe ab.
//!
//! Beim Finalisieren eines Record-Frames wird `_meta_classname` konsultiert:
//! mit registriertem Converter wird der Record zum Domain-Objekt hydriert
//! (und der Record in den Thread-Pool zurückgegeben), ohne Converter bleibt
//! je nach `ignore_missing` der rohe Record oder es gibt [`Error::NoConverter`].
//! Erst danach wandert (Offset → Wert) in die Referenz-Map — eine Referenz
//! auf einen noch offenen Record ist damit zwangsläufig ein
//! [`Error::DanglingReference`] (Zyklen sind im Format nicht erlaubt).


use std::io::Read;
use std::rc::Rc;

use crate::FastHashMap;
use crate::container::ProgressListener;
use crate::convert::{ConverterRegistry, META_CLASS_NAME};
use crate::error::{Error, Result};
use crate::pool;
use crate::primitive::{
    VALUE_LIST, VALUE_NULL, VALUE_PRIMITIVE, VALUE_RECORD, VALUE_REFERENCE, decode_primitive,
    read_i32, read_i64, read_u8,
};
use crate::record::Record;
use crate::streams::CountingReader;
use crate::string;
use crate::value::{ObjectHandle, Value};

/// Obergrenze für vorab reservierte Kapazität — Längenfelder sind
/// Stream-Input und dürfen keine großen Allokationen erzwingen.
const MAX_PREALLOC: usize = 1024;

/// Decodes one tagged record tree from `input` (the magic has already been
/// consumed by the container layer).
pub(crate) fn decode_tree<R: Read>(
    input: &mut CountingReader<R>,
    registry: &ConverterRegistry,
    ignore_missing: bool,
    progress: &mut dyn ProgressListener,
) -> Result<Record> {
    let mut stack: Vec<Frame> = Vec::new();
    let mut seen: FastHashMap<u64, Value> = FastHashMap::default();

    // Das erste Element muss einen Record-Frame pushen.
    match decode_element(input, &mut stack, &seen)? {
        Decoded::Pushed => match stack.last() {
            Some(Frame::Record(frame)) => progress.total_steps(frame.size),
            _ => return Err(Error::BadRoot),
        },
        Decoded::Value(_) => return Err(Error::BadRoot),
    }

    let mut root_value: Option<Value> = None;

    while !stack.is_empty() {
        if has_remaining(&stack) {
            let needs_key =
                matches!(stack.last(), Some(Frame::Record(frame)) if frame.current_key.is_none());
            if needs_key {
                let key = string::decode(input)?;
                if let Some(Frame::Record(frame)) = stack.last_mut() {
                    frame.current_key = Some(key);
                }
            }
            let at_root = stack.len() == 1;
            if let Decoded::Value(value) = decode_element(input, &mut stack, &seen)? {
                deliver(&mut stack, value);
                if at_root {
                    progress.step();
                }
            }
        } else {
            // Frame ist vollständig gelesen: finalisieren und abliefern.
            let frame = match stack.pop() {
                Some(frame) => frame,
                None => break,
            };
            let value = finalize(frame, registry, ignore_missing, &mut seen)?;
            if stack.is_empty() {
                root_value = Some(value);
            } else {
                deliver(&mut stack, value);
                if stack.len() == 1 {
                    progress.step();
                }
            }
        }
    }

    // Die Referenz-Map hält Rc-Klone; erst freigeben, damit der Root
    // exklusiv ist und ohne Kopie ausgepackt werden kann.
    drop(seen);
    match root_value {
        Some(Value::Record(root)) => {
            Ok(Rc::try_unwrap(root).unwrap_or_else(|shared| (*shared).clone()))
        }
        _ => Err(Error::BadRoot),
    }
}

enum Frame {
    Record(RecordFrame),
    List(ListFrame),
}

struct RecordFrame {
    size: usize,
    /// Offset des Record-Tag-Bytes — der Schlüssel, unter dem Referenzen
    /// diesen Record später finden.
    offset: u64,
    record: Record,
    filled: usize,
    current_key: Option<String>,
}

struct ListFrame {
    size: usize,
    items: Vec<Value>,
}

enum Decoded {
    /// Ein fertiger Wert (Null, Primitiv oder aufgelöste Referenz).
    Value(Value),
    /// Ein neuer Frame liegt jetzt oben auf dem Stack.
    Pushed,
}

fn decode_element<R: Read>(
    input: &mut CountingReader<R>,
    stack: &mut Vec<Frame>,
    seen: &FastHashMap<u64, Value>,
) -> Result<Decoded> {
    let position = input.position();
    let tag = read_u8(input)?;
    match tag {
        VALUE_NULL => Ok(Decoded::Value(Value::Null)),
        VALUE_PRIMITIVE => Ok(Decoded::Value(decode_primitive(input)?)),
        VALUE_LIST => {
            let size = read_length(input)?;
            stack.push(Frame::List(ListFrame {
                size,
                items: Vec::with_capacity(size.min(MAX_PREALLOC)),
            }));
            Ok(Decoded::Pushed)
        }
        VALUE_RECORD => {
            let size = read_length(input)?;
            stack.push(Frame::Record(RecordFrame {
                size,
                offset: position,
                record: pool::acquire(),
                filled: 0,
                current_key: None,
            }));
            Ok(Decoded::Pushed)
        }
        VALUE_REFERENCE => {
            let offset = read_i64(input)?;
            u64::try_from(offset)
                .ok()
                .and_then(|offset| seen.get(&offset).cloned())
                .map(Decoded::Value)
                .ok_or(Error::DanglingReference(offset))
        }
        other => Err(Error::UnknownValueTag(other)),
    }
}

fn read_length<R: Read>(input: &mut R) -> Result<usize> {
    let raw = read_i32(input)?;
    usize::try_from(raw).map_err(|_| Error::InvalidLength(i64::from(raw)))
}

fn has_remaining(stack: &[Frame]) -> bool {
    match stack.last() {
        Some(Frame::Record(frame)) => frame.filled < frame.size,
        Some(Frame::List(frame)) => frame.items.len() < frame.size,
        None => false,
    }
}

/// Stores a completed child value in the top frame.
fn deliver(stack: &mut [Frame], value: Value) {
    match stack.last_mut() {
        Some(Frame::Record(frame)) => {
            if let Some(key) = frame.current_key.take() {
                frame.record.insert_raw(key, value);
            }
            frame.filled += 1;
        }
        Some(Frame::List(frame)) => frame.items.push(value),
        None => {}
    }
}

/// Turns a completed frame into its value; record frames consult the
/// converter registry and publish their offset for later references.
fn finalize(
    frame: Frame,
    registry: &ConverterRegistry,
    ignore_missing: bool,
    seen: &mut FastHashMap<u64, Value>,
) -> Result<Value> {
    match frame {
        Frame::List(frame) => Ok(Value::List(frame.items)),
        Frame::Record(frame) => {
            let RecordFrame { offset, record, .. } = frame;
            let type_name = match record.get_raw(META_CLASS_NAME) {
                Some(Value::Str(name)) => Some(name.clone()),
                _ => None,
            };
            let value = match type_name {
                Some(name) => match registry.for_name(&name) {
                    Some(converter) => {
                        let object = converter.unmarshal(&record)?;
                        pool::release(record);
                        Value::Object(ObjectHandle::new(object, converter.type_name()))
                    }
                    None if ignore_missing => Value::Record(Rc::new(record)),
                    None => return Err(Error::NoConverter(name)),
                },
                None => Value::Record(Rc::new(record)),
            };
            seen.insert(offset, value.clone());
            Ok(value)
        }
    }
}
