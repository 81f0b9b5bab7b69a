//! Channel URI parsing.
//!
//! Read channels name a byte range of a file:
//!
//! ```text
//! hdfspt://namenode:9000/data/input.txt?offset=1048576&length=1048576
//! ```
//!
//! Write channels name a whole file:
//!
//! ```text
//! hdfs://namenode:9000/data/output.txt
//! ```
//!
//! `wasbpt://` / `wasb://` select the blob-store variant of the filesystem.

use crate::error::{ChannelError, ChannelResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const OFFSET_MARKER: &str = "?offset=";
const LENGTH_MARKER: &str = "&length=";

/// Which filesystem variant a channel addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scheme {
    Hdfs,
    Wasb,
}

impl Scheme {
    /// Scheme name as used for whole-file URIs and bridge instances.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Hdfs => "hdfs",
            Self::Wasb => "wasb",
        }
    }

    const fn file_prefix(self) -> &'static str {
        match self {
            Self::Hdfs => "hdfs://",
            Self::Wasb => "wasb://",
        }
    }

    const fn partition_prefix(self) -> &'static str {
        match self {
            Self::Hdfs => "hdfspt://",
            Self::Wasb => "wasbpt://",
        }
    }

    const ALL: [Self; 2] = [Self::Hdfs, Self::Wasb];
}

/// A parsed partition-read channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReadUri {
    pub scheme: Scheme,
    pub authority: String,
    pub path: String,
    pub offset: i64,
    pub length: i32,
}

/// A parsed whole-file write channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WriteUri {
    pub scheme: Scheme,
    pub authority: String,
    pub path: String,
}

/// Split `rest` (the text after the scheme prefix) into authority and path.
fn split_authority<'a>(uri: &str, rest: &'a str) -> ChannelResult<(&'a str, &'a str)> {
    let (authority, path) = rest
        .split_once('/')
        .ok_or_else(|| ChannelError::uri_parse(uri, "missing '/' after authority"))?;
    if authority.is_empty() {
        return Err(ChannelError::uri_parse(uri, "empty authority"));
    }
    Ok((authority, path))
}

/// Parse a partition-read channel string.
///
/// # Errors
/// Returns [`ChannelError::UriParse`] if the prefix is not a partition-read
/// prefix, the path is missing, either range marker is missing, or the offset
/// or length is not a valid non-negative integer.
pub fn parse_read_uri(uri: &str) -> ChannelResult<ReadUri> {
    let (scheme, rest) = Scheme::ALL
        .iter()
        .find_map(|s| uri.strip_prefix(s.partition_prefix()).map(|r| (*s, r)))
        .ok_or_else(|| ChannelError::uri_parse(uri, "expected hdfspt:// or wasbpt:// prefix"))?;

    let (authority, rest) = split_authority(uri, rest)?;

    let (path, rest) = rest
        .split_once(OFFSET_MARKER)
        .ok_or_else(|| ChannelError::uri_parse(uri, "missing offset= marker"))?;
    if path.is_empty() {
        return Err(ChannelError::uri_parse(uri, "missing path"));
    }

    let (offset, length) = rest
        .split_once(LENGTH_MARKER)
        .ok_or_else(|| ChannelError::uri_parse(uri, "missing length= marker"))?;

    let offset: i64 = offset
        .parse()
        .map_err(|e| ChannelError::uri_parse(uri, format!("bad offset '{offset}': {e}")))?;
    let length: i32 = length
        .parse()
        .map_err(|e| ChannelError::uri_parse(uri, format!("bad length '{length}': {e}")))?;
    if offset < 0 || length < 0 {
        return Err(ChannelError::uri_parse(uri, "negative offset or length"));
    }

    Ok(ReadUri {
        scheme,
        authority: authority.to_string(),
        path: path.to_string(),
        offset,
        length,
    })
}

/// Parse a whole-file write channel string.
///
/// # Errors
/// Returns [`ChannelError::UriParse`] if the prefix is not a file prefix or
/// the path is missing.
pub fn parse_write_uri(uri: &str) -> ChannelResult<WriteUri> {
    let (scheme, rest) = Scheme::ALL
        .iter()
        .find_map(|s| uri.strip_prefix(s.file_prefix()).map(|r| (*s, r)))
        .ok_or_else(|| ChannelError::uri_parse(uri, "expected hdfs:// or wasb:// prefix"))?;

    let (authority, path) = split_authority(uri, rest)?;
    if path.is_empty() {
        return Err(ChannelError::uri_parse(uri, "missing path"));
    }

    Ok(WriteUri {
        scheme,
        authority: authority.to_string(),
        path: path.to_string(),
    })
}

impl ReadUri {
    /// `scheme://authority`, the argument for opening a bridge instance.
    #[must_use]
    pub fn scheme_and_authority(&self) -> String {
        format!("{}{}", self.scheme.file_prefix(), self.authority)
    }

    /// `scheme://authority/path`, the argument for opening the file.
    #[must_use]
    pub fn file_path(&self) -> String {
        format!("{}/{}", self.scheme_and_authority(), self.path)
    }

    /// Nominal end of the partition, before record alignment.
    #[must_use]
    pub fn end_offset(&self) -> i64 {
        self.offset + i64::from(self.length)
    }
}

impl WriteUri {
    #[must_use]
    pub fn scheme_and_authority(&self) -> String {
        format!("{}{}", self.scheme.file_prefix(), self.authority)
    }

    #[must_use]
    pub fn file_path(&self) -> String {
        format!("{}/{}", self.scheme_and_authority(), self.path)
    }
}

impl fmt::Display for ReadUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}/{}{OFFSET_MARKER}{}{LENGTH_MARKER}{}",
            self.scheme.partition_prefix(),
            self.authority,
            self.path,
            self.offset,
            self.length
        )
    }
}

impl fmt::Display for WriteUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_path())
    }
}

impl FromStr for ReadUri {
    type Err = ChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_read_uri(s)
    }
}

impl FromStr for WriteUri {
    type Err = ChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_write_uri(s)
    }
}
