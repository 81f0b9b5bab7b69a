//! Items exchanged between a channel and its handler.
//!
//! The reader hands out [`ChannelBuffer`]s (data or a terminal marker) and the
//! writer reports [`WriteStatus`] values. Ownership of a delivered buffer moves
//! to the handler; it comes back through
//! [`FlowControlledReader::return_buffer`](crate::reader::FlowControlledReader::return_buffer).

use crate::error::{ChannelError, ErrorCode};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a terminal marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarkerKind {
    EndOfStream,
    Abort,
}

/// A sentinel standing in for data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkerItem {
    /// The stream ended cleanly.
    EndOfStream,
    /// The stream failed; carries the error code and a human-readable description.
    Abort {
        code: ErrorCode,
        description: String,
    },
}

impl MarkerItem {
    pub fn abort(code: ErrorCode, description: impl Into<String>) -> Self {
        Self::Abort {
            code,
            description: description.into(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> MarkerKind {
        match self {
            Self::EndOfStream => MarkerKind::EndOfStream,
            Self::Abort { .. } => MarkerKind::Abort,
        }
    }

    #[must_use]
    pub const fn is_abort(&self) -> bool {
        matches!(self, Self::Abort { .. })
    }

    #[must_use]
    pub const fn error_code(&self) -> Option<ErrorCode> {
        match self {
            Self::EndOfStream => None,
            Self::Abort { code, .. } => Some(*code),
        }
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        match self {
            Self::EndOfStream => None,
            Self::Abort { description, .. } => Some(description),
        }
    }
}

impl From<ChannelError> for MarkerItem {
    fn from(err: ChannelError) -> Self {
        Self::abort(err.code(), err.to_string())
    }
}

impl fmt::Display for MarkerItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EndOfStream => f.write_str("EndOfStream"),
            Self::Abort { code, description } => write!(f, "Abort({code}): {description}"),
        }
    }
}

/// An owned block of bytes read from the stream at `offset`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataBuffer {
    offset: u64,
    data: Vec<u8>,
}

impl DataBuffer {
    #[must_use]
    pub const fn new(offset: u64, data: Vec<u8>) -> Self {
        Self { offset, data }
    }

    /// Starting offset of this block within the file.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// Number of valid bytes in the block.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Offset one past the last byte of the block.
    #[must_use]
    pub fn end_offset(&self) -> u64 {
        self.offset + self.data.len() as u64
    }
}

impl AsRef<[u8]> for DataBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

/// What a reader delivers to its handler. Each one holds a capacity permit
/// until it is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelBuffer {
    Data(DataBuffer),
    Marker(MarkerItem),
}

impl ChannelBuffer {
    #[must_use]
    pub const fn as_data(&self) -> Option<&DataBuffer> {
        match self {
            Self::Data(d) => Some(d),
            Self::Marker(_) => None,
        }
    }

    #[must_use]
    pub const fn as_marker(&self) -> Option<&MarkerItem> {
        match self {
            Self::Data(_) => None,
            Self::Marker(m) => Some(m),
        }
    }

    #[must_use]
    pub const fn is_marker(&self) -> bool {
        matches!(self, Self::Marker(_))
    }
}

/// Status reported to a writer handler after its entry was processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteStatus {
    /// The data entry was written and the channel is still open.
    InProgress,
    /// The channel has terminated or failed; every later entry sees the same item.
    Completed(MarkerItem),
}

impl WriteStatus {
    #[must_use]
    pub const fn is_in_progress(&self) -> bool {
        matches!(self, Self::InProgress)
    }

    #[must_use]
    pub const fn marker(&self) -> Option<&MarkerItem> {
        match self {
            Self::InProgress => None,
            Self::Completed(m) => Some(m),
        }
    }
}
