//! Iterative tree serializer.
//!
//! Der Writer läuft über einen expliziten Frame-Stack statt Rekursion —
//! tiefe Listen-in-Listen- oder Record-Ketten dürfen den Call-Stack nicht
//! sprengen. Jeder Frame schreibt seinen Header genau einmal beim ersten
//! Besuch; für Record-Frames wird in diesem Moment der Stream-Offset des
//! Tag-Bytes festgehalten. Dadurch ist der Offset eines inneren Records
//! immer vergeben, bevor der äußere Frame seine restlichen Einträge
//! schreibt — die Voraussetzung für korrekte Rückverweise.
//!
//! Struktur-Sharing: Records und Domain-Objekte werden über Pointer-
//! Identität dedupliziert, nie über strukturelle Gleichheit. Beim Pop eines
//! Record-Frames wandert (Identität → Offset) in die Identitäts-Map;
//! spätere Vorkommen desselben Objekts werden als Referenz geschrieben.


use std::io::Write;
use std::mem;
use std::rc::Rc;

use crate::FastHashMap;
use crate::container::ProgressListener;
use crate::convert::ConverterRegistry;
use crate::error::{Error, Result};
use crate::primitive::{
    VALUE_LIST, VALUE_RECORD, VALUE_REFERENCE, encode_inline, write_i32, write_i64, write_u8,
};
use crate::record::Record;
use crate::streams::CountingWriter;
use crate::string;
use crate::value::{Value, clone_value};

/// Serializes `root` as one tagged record onto `out` (magic is written by
/// the container layer).
pub(crate) fn encode_tree<W: Write>(
    out: &mut CountingWriter<W>,
    root: &Record,
    registry: &ConverterRegistry,
    ignore_missing: bool,
    progress: &mut dyn ProgressListener,
) -> Result<()> {
    let mut encoder = Encoder {
        out,
        registry,
        ignore_missing,
        seen: FastHashMap::default(),
    };

    let root_entries: Vec<(String, Value)> = root
        .entries()
        .map(|(key, value)| (key.clone(), clone_value(value)))
        .collect();
    progress.total_steps(root_entries.len());

    let mut stack: Vec<Frame> = vec![Frame::Record(RecordFrame::new(
        root as *const Record as usize,
        root_entries,
    ))];

    while let Some(action) = next_action(&mut stack, &mut encoder)? {
        match action {
            Action::Emit { key, value, at_root } => {
                if let Some(key) = key {
                    string::encode(encoder.out, &key)?;
                }
                if let Some(frame) = encoder.dispatch(value)? {
                    stack.push(frame);
                }
                if at_root {
                    progress.step();
                }
            }
            Action::Pop => {
                if let Some(Frame::Record(frame)) = stack.pop() {
                    // Erst jetzt ist der Record vollständig im Stream und
                    // damit referenzierbar.
                    encoder.seen.insert(frame.identity, frame.offset);
                }
            }
        }
    }

    Ok(())
}

struct Encoder<'a, W: Write> {
    out: &'a mut CountingWriter<W>,
    registry: &'a ConverterRegistry,
    ignore_missing: bool,
    /// Identität (Pointer-Adresse) → Offset des geschriebenen Record-Tags.
    seen: FastHashMap<usize, u64>,
}

enum Frame {
    Record(RecordFrame),
    List(ListFrame),
}

struct RecordFrame {
    /// Identity key: the domain value the record was marshalled from, or the
    /// record itself when the caller supplied it directly.
    identity: usize,
    entries: Vec<(String, Value)>,
    next: usize,
    header_written: bool,
    offset: u64,
}

impl RecordFrame {
    fn new(identity: usize, entries: Vec<(String, Value)>) -> Self {
        Self {
            identity,
            entries,
            next: 0,
            header_written: false,
            offset: 0,
        }
    }
}

struct ListFrame {
    items: Vec<Value>,
    next: usize,
    header_written: bool,
}

enum Action {
    Emit {
        key: Option<String>,
        value: Value,
        at_root: bool,
    },
    Pop,
}

/// Writes the top frame's header when still outstanding, then hands out its
/// next entry — or `Pop` when the frame is exhausted. `None` ends the loop.
fn next_action<W: Write>(
    stack: &mut Vec<Frame>,
    encoder: &mut Encoder<'_, W>,
) -> Result<Option<Action>> {
    let at_root = stack.len() == 1;
    let Some(top) = stack.last_mut() else {
        return Ok(None);
    };
    match top {
        Frame::Record(frame) => {
            if !frame.header_written {
                frame.offset = encoder.out.position();
                write_u8(encoder.out, VALUE_RECORD)?;
                write_i32(encoder.out, frame.entries.len() as i32)?;
                frame.header_written = true;
            }
            if frame.next < frame.entries.len() {
                let (key, value) =
                    mem::replace(&mut frame.entries[frame.next], (String::new(), Value::Null));
                frame.next += 1;
                Ok(Some(Action::Emit {
                    key: Some(key),
                    value,
                    at_root,
                }))
            } else {
                Ok(Some(Action::Pop))
            }
        }
        Frame::List(frame) => {
            if !frame.header_written {
                write_u8(encoder.out, VALUE_LIST)?;
                write_i32(encoder.out, frame.items.len() as i32)?;
                frame.header_written = true;
            }
            if frame.next < frame.items.len() {
                let value = mem::replace(&mut frame.items[frame.next], Value::Null);
                frame.next += 1;
                Ok(Some(Action::Emit {
                    key: None,
                    value,
                    at_root,
                }))
            } else {
                Ok(Some(Action::Pop))
            }
        }
    }
}

impl<W: Write> Encoder<'_, W> {
    /// Emits one element: primitives inline, lists and records as new
    /// frames, already-written records as references.
    fn dispatch(&mut self, value: Value) -> Result<Option<Frame>> {
        match value {
            Value::List(items) => Ok(Some(Frame::List(ListFrame {
                items,
                next: 0,
                header_written: false,
            }))),
            Value::Record(record) => {
                let identity = Rc::as_ptr(&record) as usize;
                if let Some(&offset) = self.seen.get(&identity) {
                    self.write_reference(offset)?;
                    return Ok(None);
                }
                let entries = record
                    .entries()
                    .map(|(key, value)| (key.clone(), clone_value(value)))
                    .collect();
                Ok(Some(Frame::Record(RecordFrame::new(identity, entries))))
            }
            Value::Object(handle) => {
                let identity = handle.address();
                if let Some(&offset) = self.seen.get(&identity) {
                    self.write_reference(offset)?;
                    return Ok(None);
                }
                match self.registry.marshal_object(&handle)? {
                    Some(mut record) => Ok(Some(Frame::Record(RecordFrame::new(
                        identity,
                        record.take_entries(),
                    )))),
                    None if self.ignore_missing => {
                        encode_inline(self.out, &Value::Null)?;
                        Ok(None)
                    }
                    None => Err(Error::NoConverter(handle.type_name().to_string())),
                }
            }
            inline => {
                encode_inline(self.out, &inline)?;
                Ok(None)
            }
        }
    }

    fn write_reference(&mut self, offset: u64) -> Result<()> {
        write_u8(self.out, VALUE_REFERENCE)?;
        write_i64(self.out, offset as i64)
    }
}
