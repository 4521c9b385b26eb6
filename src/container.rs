//! Container framing and the store/load/validate entry points.
//!
//! Byte-Layout eines gespeicherten Objekts nach gzip-Dekompression:
//!
//! ```text
//! magic[5]         = 'x','d','a','t','a'
//! root value       = ein getaggter Wert (muss ein Record sein)
//! checksum-present = ein Byte 0x01, wenn ein Digest folgt; sonst ganz absent
//! checksum[32]     = SHA-256 über magic[0] bis einschließlich des
//!                    Presence-Bytes, berechnet über den Post-gzip-Stream
//! ```
//!
//! Das Ganze ist gzip-gewrappt. Die Digest-Abdeckung (Magic und Payload bis
//! einschließlich Presence-Byte, nie die 32 Digest-Bytes selbst) ist
//! Kompatibilitäts-tragend und wird byte-genau getestet.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::rc::Rc;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use log::debug;

use crate::convert::{Converter, ConverterRegistry};
use crate::decoder;
use crate::encoder;
use crate::error::{Error, Result};
use crate::record::Record;
use crate::streams::{
    CountingReader, CountingWriter, DIGEST_LEN, DigestReader, DigestWriter, read_at_most,
    read_optional_u8,
};

/// Magic bytes at the start of every decompressed xdata stream.
pub const MAGIC: [u8; 5] = *b"xdata";

/// Read-side checksum policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumValidation {
    /// Trailer wird ignoriert.
    None,
    /// Vergleicht, wenn ein vollständiger Trailer existiert; Fehlen und
    /// abgeschnittene Trailer werden toleriert (Default).
    #[default]
    IfAvailable,
    /// Fehlender oder abgeschnittener Trailer ist ein Fehler.
    Required,
}

/// Options for [`store_with_config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    add_checksum: bool,
    ignore_missing: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            add_checksum: true,
            ignore_missing: false,
        }
    }
}

impl StoreConfig {
    /// Ob ein SHA-256 Trailer ans Stream-Ende geschrieben wird (Default: ja).
    pub fn with_checksum(mut self, add_checksum: bool) -> Self {
        self.add_checksum = add_checksum;
        self
    }

    /// Bei true werden Werte ohne Converter still als Null geschrieben statt
    /// mit [`Error::NoConverter`] abzubrechen.
    pub fn with_ignore_missing(mut self, ignore_missing: bool) -> Self {
        self.ignore_missing = ignore_missing;
        self
    }

    /// Whether a checksum trailer is appended.
    pub fn add_checksum(&self) -> bool {
        self.add_checksum
    }

    /// Whether values without a converter are silently stored as null.
    pub fn ignore_missing(&self) -> bool {
        self.ignore_missing
    }
}

/// Options for [`load_with_config`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoadConfig {
    checksum: ChecksumValidation,
    ignore_missing: bool,
}

impl LoadConfig {
    /// Checksum policy (default: [`ChecksumValidation::IfAvailable`]).
    pub fn with_checksum(mut self, checksum: ChecksumValidation) -> Self {
        self.checksum = checksum;
        self
    }

    /// Bei true bleiben Records mit unbekanntem `_meta_classname` als rohe
    /// Records im Baum statt mit [`Error::NoConverter`] abzubrechen.
    pub fn with_ignore_missing(mut self, ignore_missing: bool) -> Self {
        self.ignore_missing = ignore_missing;
        self
    }

    /// The configured checksum policy.
    pub fn checksum(&self) -> ChecksumValidation {
        self.checksum
    }

    /// Whether unknown type names are tolerated.
    pub fn ignore_missing(&self) -> bool {
        self.ignore_missing
    }
}

/// Receives coarse progress over the root record's direct entries.
///
/// Die Default-Implementierungen sind No-ops; die einfachen Entry-Points
/// benutzen intern einen stummen Listener.
pub trait ProgressListener {
    /// Called once with the number of root entries before work starts.
    fn total_steps(&mut self, total: usize) {
        let _ = total;
    }

    /// Called after each processed root entry.
    fn step(&mut self) {}
}

pub(crate) struct NoProgress;

impl ProgressListener for NoProgress {}

// ============================================================================
// Store
// ============================================================================

/// Stores `root` as a gzip-compressed xdata stream with a checksum trailer.
///
/// # Beispiel
///
/// ```
/// use xdata::{Record, ScalarKey, store, load};
///
/// const COUNT: ScalarKey<i32> = ScalarKey::new("count");
///
/// let mut node = Record::new();
/// node.set_scalar(&COUNT, 67_567).unwrap();
///
/// let mut buf = Vec::new();
/// store(&node, &mut buf, &[]).unwrap();
/// assert_eq!(load(&buf[..], &[]).unwrap(), node);
/// ```
pub fn store<W: Write>(root: &Record, sink: W, converters: &[Rc<dyn Converter>]) -> Result<()> {
    store_with_config(root, sink, converters, &StoreConfig::default())
}

/// Stores `root` with explicit options.
pub fn store_with_config<W: Write>(
    root: &Record,
    sink: W,
    converters: &[Rc<dyn Converter>],
    config: &StoreConfig,
) -> Result<()> {
    store_with_progress(root, sink, converters, config, &mut NoProgress)
}

/// Stores `root` and reports progress over the root record's entries.
pub fn store_with_progress<W: Write>(
    root: &Record,
    sink: W,
    converters: &[Rc<dyn Converter>],
    config: &StoreConfig,
    progress: &mut dyn ProgressListener,
) -> Result<()> {
    let registry = ConverterRegistry::assemble(converters);

    let gzip = GzEncoder::new(sink, Compression::default());
    let digest = DigestWriter::new(gzip, config.add_checksum);
    let mut out = CountingWriter::new(digest);

    out.write_all(&MAGIC)?;
    encoder::encode_tree(&mut out, root, &registry, config.ignore_missing, progress)?;
    let written = out.position();

    let mut digest_writer = out.into_inner();
    if config.add_checksum {
        // Presence-Byte läuft noch durch den Digest, die 32 Digest-Bytes
        // selbst nicht mehr.
        digest_writer.write_all(&[0x01])?;
        let sum = digest_writer
            .take_digest()
            .ok_or_else(|| Error::Io("digest state missing".to_string()))?;
        digest_writer.write_all(&sum)?;
    }

    let gzip = digest_writer.into_inner();
    let mut sink = gzip.finish()?;
    sink.flush()?;
    debug!("stored xdata stream, {written} uncompressed payload bytes");
    Ok(())
}

/// Stores `root` into a freshly created file.
pub fn store_file<P: AsRef<Path>>(
    root: &Record,
    path: P,
    converters: &[Rc<dyn Converter>],
) -> Result<()> {
    let file = File::create(path)?;
    store(root, BufWriter::new(file), converters)
}

// ============================================================================
// Load
// ============================================================================

/// Loads a record tree, validating the checksum when one is embedded.
pub fn load<R: Read>(source: R, converters: &[Rc<dyn Converter>]) -> Result<Record> {
    load_with_config(source, converters, &LoadConfig::default())
}

/// Loads a record tree with explicit options.
pub fn load_with_config<R: Read>(
    source: R,
    converters: &[Rc<dyn Converter>],
    config: &LoadConfig,
) -> Result<Record> {
    load_with_progress(source, converters, config, &mut NoProgress)
}

/// Loads a record tree and reports progress over the root record's entries.
pub fn load_with_progress<R: Read>(
    source: R,
    converters: &[Rc<dyn Converter>],
    config: &LoadConfig,
    progress: &mut dyn ProgressListener,
) -> Result<Record> {
    let registry = ConverterRegistry::assemble(converters);

    let gzip = GzDecoder::new(source);
    let digest = DigestReader::new(gzip, config.checksum != ChecksumValidation::None);
    let mut input = CountingReader::new(digest);

    check_magic(&mut input)?;
    let root = decoder::decode_tree(&mut input, &registry, config.ignore_missing, progress)?;
    debug!(
        "loaded xdata stream, {} uncompressed payload bytes",
        input.position()
    );

    if config.checksum != ChecksumValidation::None {
        let mut digest_reader = input.into_inner();
        match read_trailer(&mut digest_reader)? {
            Trailer::Match => {}
            Trailer::Absent | Trailer::Truncated => {
                if config.checksum == ChecksumValidation::Required {
                    return Err(Error::ChecksumMissing);
                }
            }
            Trailer::Mismatch => return Err(Error::ChecksumMismatch),
        }
    }

    Ok(root)
}

/// Loads a record tree from a file.
pub fn load_file<P: AsRef<Path>>(path: P, converters: &[Rc<dyn Converter>]) -> Result<Record> {
    let file = File::open(path)?;
    load(BufReader::new(file), converters)
}

// ============================================================================
// Validate
// ============================================================================

/// Drains the stream and reports whether the embedded digest matches.
///
/// Gibt `Ok(false)` zurück, wenn kein (oder ein abgeschnittener) Digest
/// eingebettet ist; strukturelle Fehler im Stream bleiben harte Fehler.
pub fn validate<R: Read>(source: R) -> Result<bool> {
    let registry = ConverterRegistry::assemble(&[]);

    let gzip = GzDecoder::new(source);
    let digest = DigestReader::new(gzip, true);
    let mut input = CountingReader::new(digest);

    check_magic(&mut input)?;
    decoder::decode_tree(&mut input, &registry, true, &mut NoProgress)?;

    let mut digest_reader = input.into_inner();
    Ok(matches!(read_trailer(&mut digest_reader)?, Trailer::Match))
}

/// Validates the embedded digest of a file.
pub fn validate_file<P: AsRef<Path>>(path: P) -> Result<bool> {
    let file = File::open(path)?;
    validate(BufReader::new(file))
}

// ============================================================================
// Shared plumbing
// ============================================================================

fn check_magic<R: Read>(input: &mut R) -> Result<()> {
    let mut magic = [0u8; MAGIC.len()];
    input.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(Error::BadMagic);
    }
    Ok(())
}

enum Trailer {
    /// Kein Presence-Byte: Stream endet direkt nach dem Payload.
    Absent,
    /// Presence-Byte vorhanden, aber weniger als 32 Digest-Bytes.
    Truncated,
    Match,
    Mismatch,
}

/// Reads the optional checksum trailer and compares it against the digest
/// accumulated so far. Das Presence-Byte fließt noch in den Digest ein,
/// danach wird finalisiert und roh weitergelesen.
fn read_trailer<R: Read>(digest_reader: &mut DigestReader<R>) -> Result<Trailer> {
    match read_optional_u8(digest_reader)? {
        None => Ok(Trailer::Absent),
        Some(_present) => {
            let computed = digest_reader
                .take_digest()
                .ok_or_else(|| Error::Io("digest state missing".to_string()))?;
            let mut stored = [0u8; DIGEST_LEN];
            if read_at_most(digest_reader, &mut stored)? != DIGEST_LEN {
                return Ok(Trailer::Truncated);
            }
            if stored == computed {
                Ok(Trailer::Match)
            } else {
                Ok(Trailer::Mismatch)
            }
        }
    }
}
