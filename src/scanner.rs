//! Record boundary scanning.
//!
//! Readers assigned adjacent byte ranges of one file never talk to each other,
//! yet must agree on which of them owns the record that straddles the seam.
//! They do it by running the same scan: a reader whose nominal range is
//! `[start, end)` owns every record whose first byte lies in `(start, end]`
//! (plus the record at `0` for the first split). It moves its start forward to
//! the first record start after `start`, and moves its end forward to the
//! first record start at or after `end`.
//!
//! # Line records
//!
//! [`LineRecordScanner`] treats `\n` as a terminator, and also `\r` followed
//! by anything other than `\n`. CR, LF and CRLF files therefore split the same
//! way. A `\r` that is the last byte before EOF ends the last record.

use crate::bridge::{BlockRead, FileReader};
use crate::config::ChannelConfig;
use crate::error::ErrorCode;
use crate::item::MarkerItem;
use tracing::debug;

/// Outcome of a boundary scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanResult {
    /// The next record starts at this offset.
    FoundAt(u64),
    /// No record starts before the bound.
    NotFound,
    /// The scan hit an I/O error; the marker describes it.
    ReadFailed(MarkerItem),
}

/// Locates record starts in a byte stream.
pub trait SyncScanner: Send + Sync {
    /// Find the first record start whose preceding delimiter lies at or
    /// after `start`.
    ///
    /// With `bound == None` the scan is unbounded and reaching EOF returns the
    /// EOF offset as [`ScanResult::FoundAt`]. With `bound == Some(b)` the scan
    /// never reads at or past `b` and never returns an offset `>= b`.
    fn scan_for_sync(
        &self,
        reader: &mut dyn FileReader,
        file_name: &str,
        start: u64,
        bound: Option<u64>,
    ) -> ScanResult;
}

/// Scanner for newline-delimited records.
#[derive(Debug, Clone, Copy)]
pub struct LineRecordScanner {
    chunk_size: usize,
}

impl LineRecordScanner {
    /// # Panics
    ///
    /// Panics if `chunk_size` is zero.
    #[must_use]
    pub fn new(chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "scan chunk size must be positive");
        Self { chunk_size }
    }

    #[must_use]
    pub fn from_config(config: &ChannelConfig) -> Self {
        Self::new(config.scan_chunk_size)
    }
}

impl Default for LineRecordScanner {
    fn default() -> Self {
        Self::new(4 * 1024)
    }
}

impl SyncScanner for LineRecordScanner {
    fn scan_for_sync(
        &self,
        reader: &mut dyn FileReader,
        file_name: &str,
        start: u64,
        bound: Option<u64>,
    ) -> ScanResult {
        assert!(
            bound.is_none_or(|b| b > start),
            "bounded scan must end after its start"
        );

        let mut chunk = vec![0u8; self.chunk_size];
        let mut pos = start;
        let mut saw_return = false;

        loop {
            let want = match bound {
                Some(b) if pos >= b => return ScanResult::NotFound,
                Some(b) => chunk.len().min(usize::try_from(b - pos).unwrap_or(usize::MAX)),
                None => chunk.len(),
            };

            let n = match reader.read_block(pos, &mut chunk[..want]) {
                Err(e) => {
                    return ScanResult::ReadFailed(MarkerItem::abort(
                        ErrorCode::ChannelReadError,
                        format!(
                            "Can't read HDFS file '{file_name}' at offset {pos}:{}: {e}",
                            self.chunk_size
                        ),
                    ));
                }
                Ok(BlockRead::Data(n)) if n > 0 => n,
                Ok(_) => {
                    if bound.is_some() {
                        debug!(file_name, start, pos, "hit EOF inside bounded scan");
                        return ScanResult::NotFound;
                    }
                    // End of the last record.
                    return ScanResult::FoundAt(pos);
                }
            };

            for (i, &byte) in chunk[..n].iter().enumerate() {
                let at = pos + i as u64;
                if byte == b'\n' {
                    let found = at + 1;
                    if bound.is_some_and(|b| found >= b) {
                        return ScanResult::NotFound;
                    }
                    return ScanResult::FoundAt(found);
                }
                if saw_return {
                    return ScanResult::FoundAt(at);
                }
                if byte == b'\r' {
                    saw_return = true;
                }
            }
            pos += n as u64;
        }
    }
}
