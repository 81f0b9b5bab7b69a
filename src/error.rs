//! Error taxonomy for channel I/O.
//!
//! Errors never cross the channel boundary as `Err` values once a session is
//! running: the session thread converts each one into exactly one terminal
//! [`MarkerItem`](crate::item::MarkerItem) delivered through the handler. The
//! typed [`ChannelError`] exists for the synchronous surfaces (URI parsing,
//! helpers) and as the source of the marker's code and description.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error code attached to an `Abort` marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// The channel string could not be parsed.
    InvalidChannelUri,
    /// The bridge could not be initialized, connected, or the file opened.
    ChannelOpenError,
    /// I/O failure, short read, or unexpected EOF while reading.
    ChannelReadError,
    /// I/O failure while writing or closing.
    ChannelWriteError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidChannelUri => "InvalidChannelURI",
            Self::ChannelOpenError => "ChannelOpenError",
            Self::ChannelReadError => "ChannelReadError",
            Self::ChannelWriteError => "ChannelWriteError",
        };
        f.write_str(name)
    }
}

/// Typed channel failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("invalid channel URI '{uri}': {reason}")]
    UriParse { uri: String, reason: String },

    #[error("{0}")]
    Open(String),

    #[error("{0}")]
    Read(String),

    #[error("{0}")]
    Write(String),
}

impl ChannelError {
    pub fn uri_parse(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UriParse {
            uri: uri.into(),
            reason: reason.into(),
        }
    }

    /// The marker error code this failure is reported under.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::UriParse { .. } => ErrorCode::InvalidChannelUri,
            Self::Open(_) => ErrorCode::ChannelOpenError,
            Self::Read(_) => ErrorCode::ChannelReadError,
            Self::Write(_) => ErrorCode::ChannelWriteError,
        }
    }
}

pub type ChannelResult<T> = Result<T, ChannelError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::MarkerItem;

    #[test]
    fn each_variant_maps_to_its_marker_code() {
        let cases = [
            (ChannelError::uri_parse("x", "bad"), ErrorCode::InvalidChannelUri),
            (ChannelError::Open("no such file".into()), ErrorCode::ChannelOpenError),
            (ChannelError::Read("checksum".into()), ErrorCode::ChannelReadError),
            (ChannelError::Write("disk full".into()), ErrorCode::ChannelWriteError),
        ];
        for (err, code) in cases {
            let description = err.to_string();
            let marker = MarkerItem::from(err);
            assert_eq!(marker.error_code(), Some(code));
            assert_eq!(marker.description(), Some(description.as_str()));
        }
    }

    #[test]
    fn codes_display_with_channel_names() {
        assert_eq!(ErrorCode::InvalidChannelUri.to_string(), "InvalidChannelURI");
        assert_eq!(ErrorCode::ChannelWriteError.to_string(), "ChannelWriteError");
    }
}
