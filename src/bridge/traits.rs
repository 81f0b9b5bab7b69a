//! Core bridge traits and types.

use std::error::Error;
use std::fmt;

// ============================================================================
// Core Error Type
// ============================================================================

/// Failure reported by the filesystem client. `message` is the client's
/// exception text and ends up in the description of the channel's abort marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeError {
    pub message: String,
}

impl BridgeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for BridgeError {}

impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err.to_string())
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;

/// Outcome of a successful block read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockRead {
    /// `n` bytes (`n > 0`) were copied into the front of the buffer.
    Data(usize),
    /// The offset is at or past the end of the file.
    Eof,
}

// ============================================================================
// Bridge Traits
// ============================================================================

/// Entry point to a filesystem client.
pub trait Bridge: Send + Sync {
    /// Prepare the client runtime. Called by every session before any other
    /// call; must be idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the client runtime cannot be started
    fn initialize(&self) -> BridgeResult<()> {
        Ok(())
    }

    /// Connect to the filesystem named by `scheme_and_authority`
    /// (e.g. `hdfs://namenode:9000`).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or authentication fails
    fn open_instance(&self, scheme_and_authority: &str) -> BridgeResult<Box<dyn Instance>>;
}

/// A connection to one filesystem.
pub trait Instance: Send {
    /// Open an existing file for positional reads.
    ///
    /// # Errors
    ///
    /// Returns an error if the file doesn't exist or can't be opened
    fn open_reader(&self, path: &str) -> BridgeResult<Box<dyn FileReader>>;

    /// Create (or truncate) a file for sequential writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the file can't be created
    fn open_create(
        &self,
        path: &str,
        block_size: u64,
        replication: Option<u16>,
    ) -> BridgeResult<Box<dyn FileWriter>>;

    /// Set owner, group and permission bits on a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file doesn't exist or permissions are not enough
    fn set_owner_and_permission(
        &self,
        path: &str,
        user: Option<&str>,
        group: Option<&str>,
        mode: u32,
    ) -> BridgeResult<()>;
}

/// Positional reader over one file.
pub trait FileReader: Send {
    /// Read up to `buf.len()` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error on an I/O failure
    fn read_block(&mut self, offset: u64, buf: &mut [u8]) -> BridgeResult<BlockRead>;
}

/// Sequential writer to one file.
pub trait FileWriter: Send {
    /// Append `data`, optionally flushing it to the filesystem.
    ///
    /// # Errors
    ///
    /// Returns an error on an I/O failure
    fn write_block(&mut self, data: &[u8], flush: bool) -> BridgeResult<()>;

    /// Flush and close the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush or close fails
    fn close(&mut self) -> BridgeResult<()>;
}
