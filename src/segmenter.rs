//! Line segmentation of a chunked log stream
//!
//! Log bytes arrive in arbitrary chunks that do not respect line
//! boundaries. The [`Segmenter`] buffers them and hands out complete
//! records only; a trailing fragment stays buffered until the chunk that
//! terminates it arrives.

use serde::{Deserialize, Serialize};

/// Record separator used to cut the stream into lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framing {
    /// Lines end with `\r\n`
    #[default]
    CrLf,
    /// Lines end with a bare `\r`; every `\n` is dropped before splitting.
    ///
    /// Raw Travis logs repaint lines with `\r` and interleave proper line
    /// terminators, so this framing puts each repainted command echo on a
    /// line of its own.
    Cr,
}

impl Framing {
    pub fn separator(&self) -> &'static [u8] {
        match self {
            Framing::CrLf => b"\r\n",
            Framing::Cr => b"\r",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Framing::CrLf => "crlf",
            Framing::Cr => "cr",
        }
    }
}

impl std::str::FromStr for Framing {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_lowercase().as_str() {
            "crlf" | "\\r\\n" => Ok(Framing::CrLf),
            "cr" | "\\r" => Ok(Framing::Cr),
            _ => Err(crate::Error::Config(format!("Unknown framing: {}", s))),
        }
    }
}

impl std::fmt::Display for Framing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Incremental line splitter.
///
/// Owns a single growing buffer. Each call to [`Segmenter::push`] returns
/// the lines completed by that chunk, without their separators.
#[derive(Debug, Default)]
pub struct Segmenter {
    framing: Framing,
    buffer: Vec<u8>,
    /// Length of the buffer prefix already searched for a separator
    scanned: usize,
}

impl Segmenter {
    pub fn new(framing: Framing) -> Self {
        Self {
            framing,
            buffer: Vec::new(),
            scanned: 0,
        }
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// Append a chunk and return every line it completes
    pub fn push(&mut self, chunk: impl AsRef<[u8]>) -> Vec<String> {
        let chunk = chunk.as_ref();
        match self.framing {
            Framing::CrLf => self.buffer.extend_from_slice(chunk),
            Framing::Cr => self.buffer.extend(chunk.iter().filter(|&&b| b != b'\n')),
        }
        self.extract_lines()
    }

    /// Bytes still waiting for a separator
    pub fn remainder(&self) -> &[u8] {
        &self.buffer
    }

    /// Drop the buffer and return whatever unterminated fragment it held
    pub fn finish(self) -> Option<String> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&self.buffer).into_owned())
        }
    }

    fn extract_lines(&mut self) -> Vec<String> {
        let separator = self.framing.separator();
        // a separator may straddle the previous end of the buffer
        let start = self.scanned.saturating_sub(separator.len() - 1);
        let Some(first) = find(&self.buffer[start..], separator).map(|i| start + i) else {
            self.scanned = self.buffer.len();
            return Vec::new();
        };
        let last = rfind(&self.buffer[first..], separator).map_or(first, |i| first + i);
        let complete = last + separator.len();

        // a single line that ends exactly at the end of the buffer
        if complete == self.buffer.len() && first == last {
            let line = String::from_utf8_lossy(&self.buffer[..last]).into_owned();
            self.buffer.clear();
            self.scanned = 0;
            return vec![line];
        }

        let rest = self.buffer.split_off(complete);
        let head = std::mem::replace(&mut self.buffer, rest);
        self.scanned = self.buffer.len();
        split(&head[..last], separator)
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .collect()
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

/// Split on every occurrence of `separator`, keeping empty records
fn split<'a>(mut bytes: &'a [u8], separator: &'a [u8]) -> impl Iterator<Item = &'a [u8]> + 'a {
    let mut done = false;
    std::iter::from_fn(move || {
        if done {
            return None;
        }
        match find(bytes, separator) {
            Some(i) => {
                let line = &bytes[..i];
                bytes = &bytes[i + separator.len()..];
                Some(line)
            }
            None => {
                done = true;
                Some(bytes)
            }
        }
    })
}
