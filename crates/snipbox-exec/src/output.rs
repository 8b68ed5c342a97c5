//! Bounded, resettable capture of an engine's standard output and error.

use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::OutputConfig;
use crate::error::ConfigError;

/// Encodings the capture can decode. Only UTF-8 is available; anything else
/// is rejected at construction rather than silently replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputEncoding {
    Utf8,
}

impl OutputEncoding {
    /// # Errors
    ///
    /// Returns [`ConfigError::UnsupportedEncoding`] for anything but UTF-8.
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            _ => Err(ConfigError::UnsupportedEncoding(name.to_owned())),
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Utf8 => "UTF-8",
        }
    }
}

#[derive(Debug)]
struct Buffer {
    bytes: Vec<u8>,
    dropped: usize,
}

/// Shared capture buffer with a hard cap.
///
/// Bytes written past `max_bytes` are counted and dropped; [`drain`] reports
/// how many were lost. Any number of [`CaptureSink`]s may write into the same
/// buffer.
///
/// [`drain`]: OutputCapture::drain
#[derive(Debug, Clone)]
pub struct OutputCapture {
    buffer: Arc<Mutex<Buffer>>,
    encoding: OutputEncoding,
    initial_capacity: usize,
    max_bytes: usize,
}

impl OutputCapture {
    #[must_use]
    pub fn new(encoding: OutputEncoding, initial_capacity: usize, max_bytes: usize) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(Buffer {
                bytes: Vec::with_capacity(initial_capacity),
                dropped: 0,
            })),
            encoding,
            initial_capacity,
            max_bytes,
        }
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::UnsupportedEncoding`] for an unknown encoding.
    pub fn from_config(config: &OutputConfig) -> Result<Self, ConfigError> {
        let encoding = OutputEncoding::parse(&config.encoding)?;
        Ok(Self::new(encoding, config.initial_capacity, config.max_bytes))
    }

    fn lock(&self) -> MutexGuard<'_, Buffer> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A writer feeding this capture.
    #[must_use]
    pub fn sink(&self) -> CaptureSink {
        CaptureSink {
            buffer: Arc::clone(&self.buffer),
            max_bytes: self.max_bytes,
        }
    }

    #[must_use]
    pub fn encoding(&self) -> OutputEncoding {
        self.encoding
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take everything captured so far as text, leaving the buffer empty.
    pub fn drain(&self) -> String {
        let (mut bytes, mut dropped) = {
            let mut buffer = self.lock();
            let dropped = std::mem::take(&mut buffer.dropped);
            (std::mem::take(&mut buffer.bytes), dropped)
        };
        if dropped > 0 {
            // The cap may have cut a character in half.
            let cut = incomplete_tail(&bytes);
            bytes.truncate(bytes.len() - cut);
            dropped += cut;
        }
        let mut text = decode(bytes);
        if dropped > 0 {
            text.push_str(&format!("\n... [output truncated: {dropped} bytes dropped]"));
        }
        text
    }

    /// Discard captured bytes and shrink the buffer back to its initial size.
    pub fn reset(&self) {
        let mut buffer = self.lock();
        buffer.bytes.clear();
        buffer.bytes.shrink_to(self.initial_capacity);
        if buffer.bytes.capacity() < self.initial_capacity {
            buffer.bytes.reserve_exact(self.initial_capacity);
        }
        buffer.dropped = 0;
    }

    #[cfg(test)]
    fn capacity(&self) -> usize {
        self.lock().bytes.capacity()
    }
}

fn decode(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes).unwrap_or_else(|e| {
        tracing::warn!(
            valid_up_to = e.utf8_error().valid_up_to(),
            "captured output is not valid UTF-8, replacing invalid sequences"
        );
        String::from_utf8_lossy(e.as_bytes()).into_owned()
    })
}

/// Length of a trailing UTF-8 sequence that is missing continuation bytes.
fn incomplete_tail(bytes: &[u8]) -> usize {
    for back in 1..=bytes.len().min(4) {
        let byte = bytes[bytes.len() - back];
        if byte & 0xC0 == 0x80 {
            continue;
        }
        let needed = match byte {
            0x00..=0x7F => 1,
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => return 0,
        };
        return if needed > back { back } else { 0 };
    }
    0
}

/// [`Write`] end of an [`OutputCapture`]. Never fails: bytes past the cap
/// are counted as dropped.
#[derive(Debug, Clone)]
pub struct CaptureSink {
    buffer: Arc<Mutex<Buffer>>,
    max_bytes: usize,
}

impl Write for CaptureSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        let room = self.max_bytes.saturating_sub(buffer.bytes.len());
        let kept = room.min(buf.len());
        buffer.bytes.extend_from_slice(&buf[..kept]);
        buffer.dropped += buf.len() - kept;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
