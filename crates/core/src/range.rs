//! Single byte-range requests (`Range: bytes=<start>-<end>`).
//!
//! Only the first range of a header is honoured. Anything that does not parse
//! as `bytes=<start>-<end>` or `bytes=<start>-` is treated as if no range had
//! been requested at all, so the caller serves the whole file.

use thiserror::Error;

/// A parsed range header, before it is checked against a file size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RangeRequest {
    /// First requested byte.
    pub start: u64,
    /// Last requested byte (inclusive), or `None` for "to end of file".
    pub end: Option<u64>,
}

impl RangeRequest {
    /// Parse a `Range` header value.
    ///
    /// Returns `None` for text that is not a single `bytes=<start>-<end>`
    /// range. An explicit `end` of `0` and an empty `end` both mean "to end
    /// of file". Suffix ranges (`bytes=-N`) and `end < start` are not
    /// supported and yield `None`. Additional ranges after a `,` are ignored.
    pub fn parse(header: &str) -> Option<Self> {
        let rest = header.trim().strip_prefix("bytes=")?;
        let (start, rest) = take_number(rest)?;
        let rest = rest.strip_prefix('-')?;

        let (end, rest) = match take_number(rest) {
            Some((end, rest)) => (Some(end), rest),
            None => (None, rest),
        };

        if !(rest.is_empty() || rest.starts_with(',')) {
            return None;
        }

        let end = match end {
            Some(0) | None => None,
            Some(end) if end < start => return None,
            Some(end) => Some(end),
        };

        Some(Self { start, end })
    }
}

/// Split a leading run of ASCII digits off `s` and parse it.
fn take_number(s: &str) -> Option<(u64, &str)> {
    let digits = s.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let value = s[..digits].parse().ok()?;
    Some((value, &s[digits..]))
}

/// An inclusive `[start, end]` span of bytes inside a file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes covered by the range.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Always false: a byte range covers at least one byte.
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// The requested range starts at or beyond the end of the file.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("range start {start} is beyond file size {size}")]
pub struct UnsatisfiableRange {
    pub start: u64,
    pub size: u64,
}

/// The effective range to serve for a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolvedRange {
    /// The whole file (no range, or an unparsable one).
    Full { size: u64 },
    /// A partial slice of the file.
    Partial { range: ByteRange, size: u64 },
}

impl ResolvedRange {
    /// Resolve an optional `Range` header against a file of `size` bytes.
    ///
    /// An `end` past the last byte is clamped to it. A `start` at or past
    /// `size` is rejected.
    pub fn resolve(header: Option<&str>, size: u64) -> Result<Self, UnsatisfiableRange> {
        let Some(request) = header.and_then(RangeRequest::parse) else {
            return Ok(Self::Full { size });
        };

        if request.start >= size {
            return Err(UnsatisfiableRange {
                start: request.start,
                size,
            });
        }

        let last = size - 1;
        let end = request.end.map_or(last, |end| end.min(last));

        Ok(Self::Partial {
            range: ByteRange {
                start: request.start,
                end,
            },
            size,
        })
    }

    /// Offset of the first byte to send.
    pub fn start(&self) -> u64 {
        match self {
            Self::Full { .. } => 0,
            Self::Partial { range, .. } => range.start,
        }
    }

    /// Number of bytes to send (the `Content-Length`).
    pub fn content_length(&self) -> u64 {
        match self {
            Self::Full { size } => *size,
            Self::Partial { range, .. } => range.len(),
        }
    }

    /// Total size of the underlying file.
    pub fn file_size(&self) -> u64 {
        match self {
            Self::Full { size } | Self::Partial { size, .. } => *size,
        }
    }

    /// Whether this is a partial-content response.
    pub fn is_partial(&self) -> bool {
        matches!(self, Self::Partial { .. })
    }

    /// `Content-Range` header value for partial responses.
    pub fn content_range(&self) -> Option<String> {
        match self {
            Self::Full { .. } => None,
            Self::Partial { range, size } => {
                Some(format!("bytes {}-{}/{}", range.start, range.end, size))
            }
        }
    }
}
