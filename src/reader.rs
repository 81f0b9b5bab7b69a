//! Flow-controlled partition reader.
//!
//! A [`FlowControlledReader`] streams one partition of a file, named by a
//! `hdfspt://` / `wasbpt://` URI, to a [`ReaderHandler`]. All bridge calls
//! happen on a dedicated session thread:
//!
//! 1. open the bridge and the file;
//! 2. align the partition's start and end to record boundaries (see
//!    [`scanner`](crate::scanner));
//! 3. read the aligned range in blocks of `read_block_size`, delivering each
//!    block as a [`ChannelBuffer::Data`];
//! 4. finish with exactly one terminal marker: `EndOfStream` on success,
//!    `Abort` on any failure.
//!
//! # Backpressure
//!
//! Every delivered buffer, data or marker, holds one of `max_buffers_out`
//! permits until the handler hands it back with
//! [`return_buffer`](FlowControlledReader::return_buffer). A handler that
//! never returns buffers stalls the reader once the permits run out; that is
//! the contract, and [`interrupt`](FlowControlledReader::interrupt) still
//! works while stalled.
//!
//! # Example
//!
//! ```
//! use ironchannel::bridge::FakeBridge;
//! use ironchannel::testing::ChannelCollector;
//! use ironchannel::{ChannelConfig, FlowControlledReader};
//! use std::sync::Arc;
//!
//! let bridge = FakeBridge::new();
//! bridge.put_file("hdfs://nn/log.txt", b"one\ntwo\nthree\n");
//!
//! let reader = FlowControlledReader::new(
//!     "hdfspt://nn/log.txt?offset=0&length=14",
//!     Arc::new(bridge),
//!     ChannelConfig::default(),
//! );
//! let collector = ChannelCollector::new(reader.buffer_return());
//! reader.start(collector.handler());
//!
//! let (bytes, terminal) = collector.collect_to_end();
//! assert_eq!(bytes, b"one\ntwo\nthree\n");
//! assert!(!terminal.is_abort());
//!
//! reader.drain();
//! reader.close();
//! ```

use crate::bridge::{BlockRead, Bridge, FileReader};
use crate::config::ChannelConfig;
use crate::error::ErrorCode;
use crate::item::{ChannelBuffer, DataBuffer, MarkerItem};
use crate::scanner::{LineRecordScanner, ScanResult, SyncScanner};
use crate::status::{ChannelStatus, LengthCounters};
use crate::uri::parse_read_uri;
use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded, select};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Receives what a reader delivers.
///
/// Called on the reader's session thread, in stream order. Must not call
/// [`FlowControlledReader::interrupt`] or `drain` on the same reader.
pub trait ReaderHandler: Send + Sync {
    fn process_buffer(&self, buffer: ChannelBuffer);
}

impl<F> ReaderHandler for F
where
    F: Fn(ChannelBuffer) + Send + Sync,
{
    fn process_buffer(&self, buffer: ChannelBuffer) {
        self(buffer);
    }
}

/// Lifecycle of a reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Created,
    Started,
    Interrupted,
    Drained,
    Closed,
}

/// Cloneable handle for returning buffers to a reader's permit pool.
#[derive(Clone)]
pub struct BufferReturn {
    permits: Sender<()>,
}

impl BufferReturn {
    /// Give a delivered buffer back, freeing its permit.
    ///
    /// # Panics
    ///
    /// Panics if more buffers are returned than were delivered.
    pub fn return_buffer(&self, buffer: ChannelBuffer) {
        drop(buffer);
        self.permits
            .try_send(())
            .expect("buffer returned more times than it was delivered");
    }
}

/// State shared by the reader and its session thread.
struct Shared {
    uri: String,
    bridge: Arc<dyn Bridge>,
    scanner: Arc<dyn SyncScanner>,
    config: ChannelConfig,
    permit_tx: Sender<()>,
    permit_rx: Receiver<()>,
    counters: LengthCounters,
}

struct Control {
    state: ReaderState,
    abort: Option<Sender<()>>,
}

pub struct FlowControlledReader {
    shared: Arc<Shared>,
    max_buffers_out: usize,
    control: Mutex<Control>,
    // Held across join so concurrent interrupts all wait for the thread.
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl FlowControlledReader {
    /// Create a line-record reader for `uri`. No thread is started yet.
    pub fn new(uri: impl Into<String>, bridge: Arc<dyn Bridge>, config: ChannelConfig) -> Self {
        let scanner = Arc::new(LineRecordScanner::new(config.scan_chunk_size.max(1)));
        Self::with_scanner(uri, bridge, scanner, config)
    }

    /// Create a reader that aligns splits with a custom record scanner.
    pub fn with_scanner(
        uri: impl Into<String>,
        bridge: Arc<dyn Bridge>,
        scanner: Arc<dyn SyncScanner>,
        config: ChannelConfig,
    ) -> Self {
        let uri = uri.into();
        info!(uri = %uri, "making HDFS reader");

        let max_buffers_out = config.max_buffers_out.max(1);
        let (permit_tx, permit_rx) = bounded(max_buffers_out);
        for _ in 0..max_buffers_out {
            permit_tx
                .try_send(())
                .expect("fresh permit pool has room for every permit");
        }

        preconnect(bridge.as_ref(), &uri);

        Self {
            shared: Arc::new(Shared {
                uri,
                bridge,
                scanner,
                config,
                permit_tx,
                permit_rx,
                counters: LengthCounters::default(),
            }),
            max_buffers_out,
            control: Mutex::new(Control {
                state: ReaderState::Created,
                abort: None,
            }),
            thread: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn uri(&self) -> &str {
        &self.shared.uri
    }

    /// # Panics
    ///
    /// Panics if the control mutex is poisoned.
    #[must_use]
    pub fn state(&self) -> ReaderState {
        self.control.lock().expect("reader control mutex poisoned").state
    }

    /// Spawn the session thread and begin delivering to `handler`.
    ///
    /// # Panics
    ///
    /// Panics if the reader was already started or the thread can't be spawned.
    pub fn start(&self, handler: Arc<dyn ReaderHandler>) {
        let mut control = self.control.lock().expect("reader control mutex poisoned");
        assert_eq!(
            control.state,
            ReaderState::Created,
            "reader {} started twice",
            self.shared.uri
        );

        self.shared.counters.reset();

        let (abort_tx, abort_rx) = bounded::<()>(0);
        let session = ReadSession {
            shared: Arc::clone(&self.shared),
            handler,
            abort: abort_rx,
        };
        let handle = thread::Builder::new()
            .name("hdfs-reader".to_string())
            .spawn(move || session.run())
            .expect("failed to spawn reader session thread");

        control.abort = Some(abort_tx);
        control.state = ReaderState::Started;
        *self.thread.lock().expect("reader thread mutex poisoned") = Some(handle);
    }

    /// Return a delivered buffer, freeing its permit.
    ///
    /// # Panics
    ///
    /// Panics if more buffers are returned than were delivered.
    pub fn return_buffer(&self, buffer: ChannelBuffer) {
        self.buffer_return().return_buffer(buffer);
    }

    /// A handle handlers can keep to return buffers without holding the reader.
    #[must_use]
    pub fn buffer_return(&self) -> BufferReturn {
        BufferReturn {
            permits: self.shared.permit_tx.clone(),
        }
    }

    /// Stop the session and wait for its thread to exit. At most one block
    /// read already in flight completes first; no handler call happens after
    /// this returns. Safe to call from any thread except the session thread,
    /// and more than once.
    ///
    /// # Panics
    ///
    /// Panics if called from the reader's own session thread.
    pub fn interrupt(&self) {
        {
            let mut control = self.control.lock().expect("reader control mutex poisoned");
            // Dropping the sender is the sticky abort signal.
            control.abort.take();
            if control.state == ReaderState::Started {
                control.state = ReaderState::Interrupted;
            }
        }

        let mut thread = self.thread.lock().expect("reader thread mutex poisoned");
        if let Some(handle) = thread.take() {
            assert_ne!(
                handle.thread().id(),
                thread::current().id(),
                "reader interrupted from its own session thread"
            );
            if handle.join().is_err() {
                warn!(uri = %self.shared.uri, "reader session thread panicked");
            }
        }
    }

    /// Interrupt, then wait until every delivered buffer has been returned.
    ///
    /// # Panics
    ///
    /// Panics if the permit pool is closed, which cannot happen while the
    /// reader is alive.
    pub fn drain(&self) {
        self.interrupt();

        for _ in 0..self.max_buffers_out {
            debug!(uri = %self.shared.uri, "waiting for buffer permit");
            self.shared
                .permit_rx
                .recv()
                .expect("reader permit pool closed");
        }

        self.control
            .lock()
            .expect("reader control mutex poisoned")
            .state = ReaderState::Drained;
    }

    /// Release remaining resources.
    ///
    /// # Panics
    ///
    /// Panics if the reader was started but not drained.
    pub fn close(&self) {
        let mut control = self.control.lock().expect("reader control mutex poisoned");
        assert!(
            matches!(
                control.state,
                ReaderState::Created | ReaderState::Drained | ReaderState::Closed
            ),
            "reader {} closed before drain",
            self.shared.uri
        );
        control.state = ReaderState::Closed;
    }

    /// Snapshot of the length counters.
    #[must_use]
    pub fn fill_in_status(&self) -> ChannelStatus {
        self.shared.counters.snapshot()
    }

    /// Length of the aligned range, or the nominal length before alignment.
    #[must_use]
    pub fn total_length(&self) -> u64 {
        self.shared.counters.snapshot().total_length
    }
}

impl Drop for FlowControlledReader {
    fn drop(&mut self) {
        self.control
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .abort
            .take();
        let thread = self.thread.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = thread.take() {
            let _ = handle.join();
        }
    }
}

/// Connect once on the constructing thread so client login happens there.
fn preconnect(bridge: &dyn Bridge, uri: &str) {
    if let Err(e) = bridge.initialize() {
        warn!(uri, error = %e, "HDFS bridge initialization failed");
        return;
    }
    let Ok(parsed) = parse_read_uri(uri) else {
        return;
    };
    match bridge.open_instance(&parsed.scheme_and_authority()) {
        Ok(instance) => drop(instance),
        Err(e) => warn!(uri, error = %e, "HDFS pre-connect failed"),
    }
}

// ============================================================================
// Session thread
// ============================================================================

struct ReadSession {
    shared: Arc<Shared>,
    handler: Arc<dyn ReaderHandler>,
    abort: Receiver<()>,
}

impl ReadSession {
    fn aborted(&self) -> bool {
        matches!(self.abort.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Wait for a permit or the abort signal. Returns `false` on abort, with
    /// no permit held.
    fn acquire_permit(&self) -> bool {
        let acquired = select! {
            recv(self.abort) -> _ => false,
            recv(self.shared.permit_rx) -> permit => {
                permit.expect("reader permit pool closed");
                true
            }
        };
        if !acquired {
            return false;
        }

        // The abort may have landed while we were taking the permit.
        if self.aborted() {
            self.shared
                .permit_tx
                .try_send(())
                .expect("permit pool over capacity");
            return false;
        }
        true
    }

    /// Deliver a marker once a permit is free; discarded on abort.
    fn send_marker(&self, marker: MarkerItem) {
        if self.acquire_permit() {
            self.handler.process_buffer(ChannelBuffer::Marker(marker));
        } else {
            debug!(uri = %self.shared.uri, %marker, "discarding marker after interrupt");
        }
    }

    fn run(self) {
        let shared = Arc::clone(&self.shared);
        let uri = shared.uri.as_str();

        if let Err(e) = shared.bridge.initialize() {
            self.send_marker(MarkerItem::abort(
                ErrorCode::ChannelOpenError,
                format!("Can't initialize HDFS bridge: {e}"),
            ));
            return;
        }

        let parsed = match parse_read_uri(uri) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.send_marker(MarkerItem::from(e));
                return;
            }
        };
        shared
            .counters
            .set_total(u64::try_from(parsed.length).unwrap_or_default());

        let instance = match shared.bridge.open_instance(&parsed.scheme_and_authority()) {
            Ok(instance) => instance,
            Err(e) => {
                self.send_marker(MarkerItem::abort(
                    ErrorCode::ChannelOpenError,
                    format!(
                        "Can't open HDFS Bridge '{}': {e}",
                        parsed.scheme_and_authority()
                    ),
                ));
                return;
            }
        };

        let mut reader = match instance.open_reader(&parsed.file_path()) {
            Ok(reader) => reader,
            Err(e) => {
                let description = format!("Can't open HDFS file '{uri}': {e}");
                info!("{description}");
                self.send_marker(MarkerItem::abort(ErrorCode::ChannelOpenError, description));
                return;
            }
        };

        // Offsets were checked non-negative by the parser.
        let nominal_start = parsed.offset.unsigned_abs();
        let nominal_end = nominal_start + u64::from(parsed.length.unsigned_abs());

        if nominal_end == nominal_start {
            info!(uri, "empty partition");
            self.send_marker(MarkerItem::EndOfStream);
            return;
        }

        let Some(start) = self.align_start(reader.as_mut(), nominal_start, nominal_end) else {
            return;
        };

        let mut end = nominal_end;
        let mut end_aligned = false;
        if start == end {
            let Some(aligned) = self.align_end(reader.as_mut(), end) else {
                return;
            };
            end = aligned;
            end_aligned = true;
        }

        assert!(end >= start, "aligned range ends before it starts");
        shared.counters.set_total(end - start);

        let mut offset = start;
        while offset < end {
            if !self.acquire_permit() {
                info!(uri, offset, "reader interrupted");
                return;
            }

            match self.read_data_buffer(reader.as_mut(), offset, end) {
                Ok(buffer) => {
                    offset = buffer.end_offset();
                    shared.counters.set_processed(offset - start);
                    self.handler.process_buffer(ChannelBuffer::Data(buffer));
                }
                Err(marker) => {
                    // Reuses the permit taken for the failed block.
                    self.handler.process_buffer(ChannelBuffer::Marker(marker));
                    return;
                }
            }

            if offset == end && !end_aligned {
                let Some(aligned) = self.align_end(reader.as_mut(), end) else {
                    return;
                };
                end = aligned;
                end_aligned = true;
                shared.counters.set_total(end - start);
            }
        }

        self.send_marker(MarkerItem::EndOfStream);
    }

    /// Move the start to the first record beginning in `(start, end]`.
    /// `None` means a marker has already been sent and the session is over.
    fn align_start(&self, reader: &mut dyn FileReader, start: u64, end: u64) -> Option<u64> {
        let uri = self.shared.uri.as_str();
        if start == 0 {
            info!(uri, "starting first block at offset 0");
            return Some(0);
        }

        // A record starting after `end` belongs to the next split.
        match self
            .shared
            .scanner
            .scan_for_sync(reader, uri, start, Some(end + 1))
        {
            ScanResult::FoundAt(offset) => {
                assert!(offset <= end, "start scan escaped its bound");
                info!(uri, from = start, to = offset, "skipped to start of next record");
                Some(offset)
            }
            ScanResult::NotFound => {
                info!(uri, start, end, "skipped block because no record sync was found");
                self.send_marker(MarkerItem::EndOfStream);
                None
            }
            ScanResult::ReadFailed(marker) => {
                self.send_marker(marker);
                None
            }
        }
    }

    /// Move the end past the record that straddles it.
    fn align_end(&self, reader: &mut dyn FileReader, end: u64) -> Option<u64> {
        let uri = self.shared.uri.as_str();
        match self.shared.scanner.scan_for_sync(reader, uri, end, None) {
            ScanResult::FoundAt(offset) => {
                assert!(offset >= end, "end scan moved backwards");
                info!(uri, from = end, to = offset, "scanned past end of block");
                Some(offset)
            }
            ScanResult::NotFound => unreachable!("unbounded scan always finds EOF"),
            ScanResult::ReadFailed(marker) => {
                self.send_marker(marker);
                None
            }
        }
    }

    fn read_data_buffer(
        &self,
        reader: &mut dyn FileReader,
        offset: u64,
        end: u64,
    ) -> Result<DataBuffer, MarkerItem> {
        let uri = self.shared.uri.as_str();
        let block = self.shared.config.read_block_size.max(1);
        let size = usize::try_from(end - offset).map_or(block, |left| left.min(block));

        let mut data = vec![0u8; size];
        debug!(uri, offset, size, "reading block");
        match reader.read_block(offset, &mut data) {
            Err(e) => Err(MarkerItem::abort(
                ErrorCode::ChannelReadError,
                format!("Can't read HDFS file '{uri}' at offset {offset}:{size}: {e}"),
            )),
            Ok(BlockRead::Eof | BlockRead::Data(0)) => Err(MarkerItem::abort(
                ErrorCode::ChannelReadError,
                format!("HDFS file '{uri}' got EOF at offset {offset}:{size}"),
            )),
            Ok(BlockRead::Data(n)) if n != size => Err(MarkerItem::abort(
                ErrorCode::ChannelReadError,
                format!("HDFS file '{uri}' got too few bytes {n} at offset {offset}:{size}"),
            )),
            Ok(BlockRead::Data(_)) => Ok(DataBuffer::new(offset, data)),
        }
    }
}
