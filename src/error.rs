//! Central error types for the xdata container format.
//!
//! Transport-layer failures bubble up as [`Error::Io`] with the underlying
//! message; a clean EOF in the middle of a value becomes
//! [`Error::TruncatedStream`]. Alle anderen Varianten sind entweder
//! Format-Verletzungen (Stream-Seite) oder Contract-Verletzungen der
//! Record-Accessoren (Caller-Seite).

use core::fmt;
use std::io;

/// All error conditions raised by the xdata codec and the record accessors.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The stream does not start with the `xdata` magic bytes.
    BadMagic,
    /// The first value in the stream is not a record.
    BadRoot,
    /// An unknown value tag was read (corruption, or data from a newer format).
    UnknownValueTag(u8),
    /// An unknown primitive tag was read (corruption, or data from a newer format).
    UnknownPrimitiveTag(u8),
    /// A reference points to a stream offset where no record has been materialized.
    DanglingReference(i64),
    /// The stream ended in the middle of a value.
    TruncatedStream,
    /// A list length, record entry count or reference offset is negative.
    InvalidLength(i64),
    /// No converter is registered for the given type name or type token.
    NoConverter(String),
    /// Checksum validation was required but the stream carries no trailer.
    ChecksumMissing,
    /// The embedded checksum does not match the stream content.
    ChecksumMismatch,
    /// A stored value does not have the shape the key demands.
    TypeMismatch {
        /// Der Key unter dem der Wert liegt.
        key: &'static str,
        /// Der vom Key erwartete Typ.
        expected: &'static str,
        /// Die tatsächlich gespeicherte Werteform.
        found: &'static str,
    },
    /// A null value was read through a non-nullable key.
    NullNotAllowed(&'static str),
    /// A null value was written through a non-nullable key
    /// (rejected at `set_scalar`/`set_list`).
    NullOnNonNullable(&'static str),
    /// A mandatory accessor found no slot for its key.
    MissingKey(&'static str),
    /// A string's modified-UTF-8 encoding exceeds the two-byte length prefix.
    StringTooLong(usize),
    /// A string payload is not valid modified UTF-8.
    MalformedString,
    /// A marshalled payload is structurally valid but semantically broken
    /// (z.B. ein gespeicherter URL-String, der nicht parsebar ist).
    InvalidValue(String),
    /// Ein IO-Fehler des darunterliegenden Streams.
    Io(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadMagic => write!(f, "not an xdata stream (bad magic)"),
            Self::BadRoot => write!(f, "first value in an xdata stream must be a record"),
            Self::UnknownValueTag(tag) => write!(f, "unknown value tag {tag:#04x} (maybe newer format?)"),
            Self::UnknownPrimitiveTag(tag) => {
                write!(f, "unknown primitive tag {tag:#04x} (maybe newer format?)")
            }
            Self::DanglingReference(offset) => {
                write!(f, "reference to offset {offset} points to no materialized record")
            }
            Self::TruncatedStream => write!(f, "stream ended in the middle of a value"),
            Self::InvalidLength(len) => write!(f, "negative length or offset {len}"),
            Self::NoConverter(name) => write!(f, "no converter registered for '{name}'"),
            Self::ChecksumMissing => write!(f, "stream contains no embedded checksum"),
            Self::ChecksumMismatch => write!(f, "embedded checksum does not match stream content"),
            Self::TypeMismatch { key, expected, found } => {
                write!(f, "key '{key}' expects {expected} but the stored value is {found}")
            }
            Self::NullNotAllowed(key) => {
                write!(f, "key '{key}' does not allow null values")
            }
            Self::NullOnNonNullable(key) => {
                write!(f, "key '{key}' disallows null values but the written value was null")
            }
            Self::MissingKey(key) => {
                write!(f, "no value for key '{key}' found, but it was mandatory")
            }
            Self::StringTooLong(len) => {
                write!(f, "encoded string is {len} bytes, limit is 65535")
            }
            Self::MalformedString => write!(f, "string payload is not valid modified UTF-8"),
            Self::InvalidValue(msg) => write!(f, "invalid marshalled value: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        // read_exact meldet ein sauberes EOF als UnexpectedEof — im Format
        // ist das immer ein abgeschnittener Stream.
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Self::TruncatedStream
        } else {
            Self::Io(err.to_string())
        }
    }
}

/// A convenience `Result` type alias using [`Error`].
pub type Result<T> = core::result::Result<T, Error>;
