//! Byte-counting and digest stream adapters.
//!
//! Zwei orthogonale Wrapper um die rohen Read/Write-Streams:
//!
//! - Die Counting-Adapter zählen jedes Byte, das die Datenschicht passiert.
//!   Diese Zählung ist das Koordinatensystem der Referenz-Offsets — Writer
//!   und Reader müssen denselben Zählpunkt benutzen (direkt über dem
//!   Digest-Adapter, Magic-Header inklusive).
//! - Die Digest-Adapter führen ein SHA-256 über jedes durchgereichte Byte.
//!   `take_digest` finalisiert und deaktiviert den Hasher, damit die 32
//!   Trailer-Bytes selbst nie in den Digest einfließen.

use std::io::{Read, Write};

use sha2::{Digest, Sha256};

/// Länge des SHA-256 Digests im Trailer.
pub(crate) const DIGEST_LEN: usize = 32;

/// A writer that counts every byte passed through it.
pub(crate) struct CountingWriter<W: Write> {
    inner: W,
    position: u64,
}

impl<W: Write> CountingWriter<W> {
    pub(crate) fn new(inner: W) -> Self {
        Self { inner, position: 0 }
    }

    /// Anzahl bisher geschriebener Bytes — der Offset des nächsten Bytes.
    pub(crate) fn position(&self) -> u64 {
        self.position
    }

    pub(crate) fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.position += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// A reader that counts every byte passed through it.
pub(crate) struct CountingReader<R: Read> {
    inner: R,
    position: u64,
}

impl<R: Read> CountingReader<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self { inner, position: 0 }
    }

    /// Anzahl bisher gelesener Bytes — der Offset des nächsten Bytes.
    pub(crate) fn position(&self) -> u64 {
        self.position
    }

    pub(crate) fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let read = self.inner.read(buf)?;
        self.position += read as u64;
        Ok(read)
    }
}

/// A writer that updates a SHA-256 digest over every byte written.
pub(crate) struct DigestWriter<W: Write> {
    inner: W,
    hasher: Option<Sha256>,
}

impl<W: Write> DigestWriter<W> {
    /// `enabled = false` macht den Adapter zum reinen Durchreicher.
    pub(crate) fn new(inner: W, enabled: bool) -> Self {
        Self {
            inner,
            hasher: enabled.then(Sha256::new),
        }
    }

    /// Finalizes and detaches the digest; later bytes are no longer hashed.
    pub(crate) fn take_digest(&mut self) -> Option<[u8; DIGEST_LEN]> {
        self.hasher.take().map(|hasher| hasher.finalize().into())
    }

    pub(crate) fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for DigestWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let written = self.inner.write(buf)?;
        if let Some(hasher) = &mut self.hasher {
            hasher.update(&buf[..written]);
        }
        Ok(written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// A reader that updates a SHA-256 digest over every byte read.
pub(crate) struct DigestReader<R: Read> {
    inner: R,
    hasher: Option<Sha256>,
}

impl<R: Read> DigestReader<R> {
    pub(crate) fn new(inner: R, enabled: bool) -> Self {
        Self {
            inner,
            hasher: enabled.then(Sha256::new),
        }
    }

    /// Finalizes and detaches the digest; later bytes are no longer hashed.
    pub(crate) fn take_digest(&mut self) -> Option<[u8; DIGEST_LEN]> {
        self.hasher.take().map(|hasher| hasher.finalize().into())
    }
}

impl<R: Read> Read for DigestReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let read = self.inner.read(buf)?;
        if let Some(hasher) = &mut self.hasher {
            hasher.update(&buf[..read]);
        }
        Ok(read)
    }
}

/// Liest höchstens `buf.len()` Bytes und gibt die tatsächliche Anzahl zurück
/// (kurzes Ergebnis bei EOF statt Fehler).
pub(crate) fn read_at_most<R: Read>(input: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let read = input.read(&mut buf[filled..])?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    Ok(filled)
}

/// Liest ein einzelnes Byte oder `None` bei sauberem EOF.
pub(crate) fn read_optional_u8<R: Read>(input: &mut R) -> std::io::Result<Option<u8>> {
    let mut buf = [0u8; 1];
    match read_at_most(input, &mut buf)? {
        0 => Ok(None),
        _ => Ok(Some(buf[0])),
    }
}
