//! Flow-controlled whole-file writer.
//!
//! A [`FlowControlledWriter`] owns one session thread and a FIFO queue of
//! write requests. Producers on any thread enqueue data with
//! [`write_buffer`](FlowControlledWriter::write_buffer) and finish with
//! [`write_termination`](FlowControlledWriter::write_termination); the
//! session thread applies entries strictly in enqueue order and notifies each
//! entry's [`WriterHandler`] exactly once.
//!
//! The first failure (open, write, or close) is cached as the channel's
//! completion item. From then on no entry touches the bridge: each is
//! completed immediately with the cached item. Exactly one completion item is
//! produced per session, and [`drain`](FlowControlledWriter::drain) hands it
//! back.
//!
//! `write_buffer` never blocks. It returns `true` when the queue is deeper than
//! `write_queue_threshold`, and the producer is expected to pause until some of
//! its handlers have fired.

use crate::bridge::{Bridge, FileWriter, Instance};
use crate::config::ChannelConfig;
use crate::error::ErrorCode;
use crate::item::{MarkerItem, WriteStatus};
use crate::status::{ChannelStatus, LengthCounters};
use crate::uri::parse_write_uri;
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{error, info, warn};

/// Receives one notification per enqueued entry, on the session thread.
pub trait WriterHandler: Send + Sync {
    fn process_write_completed(&self, status: WriteStatus);
}

impl<F> WriterHandler for F
where
    F: Fn(WriteStatus) + Send + Sync,
{
    fn process_write_completed(&self, status: WriteStatus) {
        self(status);
    }
}

/// Lifecycle of a writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    Created,
    Started,
    /// A termination entry has been enqueued.
    Terminating,
    Drained,
    Closed,
}

enum Request {
    Data { buffer: Vec<u8>, flush: bool },
    Termination(MarkerItem),
}

struct WriteEntry {
    request: Request,
    handler: Arc<dyn WriterHandler>,
}

struct QueueState {
    entries: VecDeque<WriteEntry>,
    completion: Option<MarkerItem>,
    state: WriterState,
    shutdown: bool,
}

struct Shared {
    uri: String,
    bridge: Arc<dyn Bridge>,
    config: ChannelConfig,
    owner: Option<String>,
    queue: Mutex<QueueState>,
    ready: Condvar,
    counters: LengthCounters,
}

pub struct FlowControlledWriter {
    shared: Arc<Shared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl FlowControlledWriter {
    pub fn new(uri: impl Into<String>, bridge: Arc<dyn Bridge>, config: ChannelConfig) -> Self {
        let uri = uri.into();
        let owner = config.resolved_owner();
        match &owner {
            Some(user) => info!(uri = %uri, user = %user, "HDFS writer owner resolved"),
            None => warn!(uri = %uri, "no owner configured and USER is unset"),
        }

        Self {
            shared: Arc::new(Shared {
                uri,
                bridge,
                config,
                owner,
                queue: Mutex::new(QueueState {
                    entries: VecDeque::new(),
                    completion: None,
                    state: WriterState::Created,
                    shutdown: false,
                }),
                ready: Condvar::new(),
                counters: LengthCounters::default(),
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
    /// Panics if the queue mutex is poisoned.
    #[must_use]
    pub fn state(&self) -> WriterState {
        self.shared.queue.lock().expect("writer queue mutex poisoned").state
    }

    /// Spawn the session thread, which opens the output file.
    ///
    /// # Panics
    ///
    /// Panics if the writer was already started or the thread can't be spawned.
    pub fn start(&self) {
        {
            let mut queue = self.shared.queue.lock().expect("writer queue mutex poisoned");
            assert_eq!(
                queue.state,
                WriterState::Created,
                "writer {} started twice",
                self.shared.uri
            );
            assert!(queue.entries.is_empty(), "writer queue not empty at start");
            queue.state = WriterState::Started;
        }
        self.shared.counters.reset();

        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("hdfs-writer".to_string())
            .spawn(move || WriteSession { shared }.run())
            .expect("failed to spawn writer session thread");
        *self.thread.lock().expect("writer thread mutex poisoned") = Some(handle);
    }

    /// An empty buffer with the default write capacity.
    #[must_use]
    pub fn next_write_buffer(&self) -> Vec<u8> {
        self.custom_write_buffer(self.shared.config.write_buffer_size)
    }

    #[must_use]
    pub fn custom_write_buffer(&self, size: usize) -> Vec<u8> {
        Vec::with_capacity(size)
    }

    /// Discard a buffer obtained from this writer that will not be written.
    pub fn return_unused_buffer(&self, buffer: Vec<u8>) {
        drop(buffer);
    }

    /// Queue `buffer` for writing. Returns `true` if the producer should pause.
    ///
    /// # Panics
    ///
    /// Panics if the writer is not started or a termination has already been
    /// enqueued.
    pub fn write_buffer(
        &self,
        buffer: Vec<u8>,
        flush: bool,
        handler: Arc<dyn WriterHandler>,
    ) -> bool {
        self.enqueue(WriteEntry {
            request: Request::Data { buffer, flush },
            handler,
        })
    }

    /// Queue the end of the stream. `reason` becomes the completion item if the
    /// file closes cleanly; it is normally [`MarkerItem::EndOfStream`].
    ///
    /// # Panics
    ///
    /// Panics if a termination has already been enqueued.
    pub fn write_termination(&self, reason: MarkerItem, handler: Arc<dyn WriterHandler>) {
        self.enqueue(WriteEntry {
            request: Request::Termination(reason),
            handler,
        });
    }

    fn enqueue(&self, entry: WriteEntry) -> bool {
        let mut queue = self.shared.queue.lock().expect("writer queue mutex poisoned");
        assert!(
            queue.state == WriterState::Started,
            "writer {} received an entry in state {:?}",
            self.shared.uri,
            queue.state
        );
        if matches!(entry.request, Request::Termination(_)) {
            queue.state = WriterState::Terminating;
        }
        queue.entries.push_back(entry);
        let depth = queue.entries.len();
        drop(queue);

        self.shared.ready.notify_one();
        depth > self.shared.config.write_queue_threshold
    }

    /// Number of entries waiting for the session thread.
    ///
    /// # Panics
    ///
    /// Panics if the queue mutex is poisoned.
    #[must_use]
    pub fn queue_length(&self) -> usize {
        self.shared
            .queue
            .lock()
            .expect("writer queue mutex poisoned")
            .entries
            .len()
    }

    /// Wait for the session to finish and take its completion item.
    ///
    /// Only valid once a termination has been enqueued. Calling it twice is a
    /// usage error.
    ///
    /// # Panics
    ///
    /// Panics if no termination was enqueued, if called twice, or if entries
    /// were left in the queue.
    pub fn drain(&self) -> MarkerItem {
        {
            let queue = self.shared.queue.lock().expect("writer queue mutex poisoned");
            assert!(
                queue.state == WriterState::Terminating,
                "writer {} drained in state {:?}",
                self.shared.uri,
                queue.state
            );
        }

        let handle = self
            .thread
            .lock()
            .expect("writer thread mutex poisoned")
            .take()
            .expect("writer drained without a running session");
        assert_ne!(
            handle.thread().id(),
            thread::current().id(),
            "writer drained from its own session thread"
        );
        if handle.join().is_err() {
            error!(uri = %self.shared.uri, "writer session thread panicked");
        }

        let mut queue = self.shared.queue.lock().expect("writer queue mutex poisoned");
        assert!(queue.entries.is_empty(), "writer queue not empty after drain");
        queue.state = WriterState::Drained;
        queue
            .completion
            .take()
            .expect("writer session ended without a completion item")
    }

    /// # Panics
    ///
    /// Panics if the writer was started but not drained.
    pub fn close(&self) {
        let mut queue = self.shared.queue.lock().expect("writer queue mutex poisoned");
        assert!(
            matches!(
                queue.state,
                WriterState::Created | WriterState::Drained | WriterState::Closed
            ),
            "writer {} closed before drain",
            self.shared.uri
        );
        assert!(queue.completion.is_none(), "completion item never taken");
        queue.state = WriterState::Closed;
    }

    /// The total length is unknown while writing and always reported as 0.
    #[must_use]
    pub fn fill_in_status(&self) -> ChannelStatus {
        ChannelStatus {
            total_length: 0,
            ..self.shared.counters.snapshot()
        }
    }

    /// Expected final size hint. The bridge cannot preallocate, so this is
    /// always 0.
    #[must_use]
    pub const fn initial_size_hint(&self) -> u64 {
        0
    }

    pub fn set_initial_size_hint(&self, _hint: u64) {}
}

impl Drop for FlowControlledWriter {
    fn drop(&mut self) {
        self.shared
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .shutdown = true;
        self.shared.ready.notify_all();
        let thread = self.thread.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = thread.take() {
            let _ = handle.join();
        }
    }
}

// ============================================================================
// Session thread
// ============================================================================

struct WriteSession {
    shared: Arc<Shared>,
}

impl WriteSession {
    fn run(self) {
        let uri = self.shared.uri.as_str();
        let (_instance, mut writer) = match self.open() {
            Ok((instance, writer)) => (Some(instance), Some(writer)),
            Err(marker) => {
                error!(uri, %marker, "HDFS writer failed to open");
                self.cache_completion(marker);
                (None, None)
            }
        };

        while let Some(entry) = self.next_entry() {
            let terminal = matches!(entry.request, Request::Termination(_));
            let status = self.process(entry.request, writer.as_deref_mut());
            entry.handler.process_write_completed(status);
            if terminal {
                break;
            }
        }
    }

    /// Block until an entry is queued. `None` when the writer is dropped.
    fn next_entry(&self) -> Option<WriteEntry> {
        let mut queue = self.shared.queue.lock().expect("writer queue mutex poisoned");
        loop {
            if let Some(entry) = queue.entries.pop_front() {
                return Some(entry);
            }
            if queue.shutdown {
                return None;
            }
            queue = self
                .shared
                .ready
                .wait(queue)
                .expect("writer queue mutex poisoned");
        }
    }

    fn completion(&self) -> Option<MarkerItem> {
        self.shared
            .queue
            .lock()
            .expect("writer queue mutex poisoned")
            .completion
            .clone()
    }

    /// Record the completion item unless one is already set.
    fn cache_completion(&self, marker: MarkerItem) {
        let mut queue = self.shared.queue.lock().expect("writer queue mutex poisoned");
        if queue.completion.is_none() {
            queue.completion = Some(marker);
        }
    }

    fn process(&self, request: Request, writer: Option<&mut (dyn FileWriter + 'static)>) -> WriteStatus {
        if self.completion().is_none() {
            let writer = writer.expect("file writer open while no completion is cached");
            match request {
                Request::Data { buffer, flush } => match writer.write_block(&buffer, flush) {
                    Ok(()) => self.shared.counters.add_processed(buffer.len() as u64),
                    Err(e) => {
                        let description = format!("Got HDFS error on write: {e}");
                        error!(uri = %self.shared.uri, "{description}");
                        self.cache_completion(MarkerItem::abort(
                            ErrorCode::ChannelWriteError,
                            description,
                        ));
                    }
                },
                Request::Termination(reason) => {
                    info!(uri = %self.shared.uri, "got HDFS termination item");
                    match writer.close() {
                        Ok(()) => {
                            info!(uri = %self.shared.uri, "closed HDFS writer");
                            self.cache_completion(reason);
                        }
                        Err(e) => {
                            let description = format!("Got HDFS error on close: {e}");
                            error!(uri = %self.shared.uri, "{description}");
                            self.cache_completion(MarkerItem::abort(
                                ErrorCode::ChannelWriteError,
                                description,
                            ));
                        }
                    }
                }
            }
        }

        match self.completion() {
            None => WriteStatus::InProgress,
            Some(marker) => WriteStatus::Completed(marker),
        }
    }

    fn open(&self) -> Result<(Box<dyn Instance>, Box<dyn FileWriter>), MarkerItem> {
        let shared = &self.shared;
        let uri = shared.uri.as_str();
        info!(uri, "opening HDFS writer");

        shared.bridge.initialize().map_err(|e| {
            MarkerItem::abort(
                ErrorCode::ChannelOpenError,
                format!("Can't initialize HDFS bridge: {e}"),
            )
        })?;

        let parsed = parse_write_uri(uri).map_err(MarkerItem::from)?;

        let instance = shared
            .bridge
            .open_instance(&parsed.scheme_and_authority())
            .map_err(|e| {
                MarkerItem::abort(
                    ErrorCode::ChannelOpenError,
                    format!(
                        "Can't open HDFS Bridge '{}': {e}",
                        parsed.scheme_and_authority()
                    ),
                )
            })?;

        let file_path = parsed.file_path();
        let writer = instance
            .open_create(
                &file_path,
                shared.config.create_block_size,
                shared.config.replication,
            )
            .map_err(|e| {
                MarkerItem::abort(
                    ErrorCode::ChannelOpenError,
                    format!("Can't open HDFS file '{uri}': {e}"),
                )
            })?;

        instance
            .set_owner_and_permission(
                &file_path,
                shared.owner.as_deref(),
                None,
                shared.config.file_mode,
            )
            .map_err(|e| {
                MarkerItem::abort(
                    ErrorCode::ChannelOpenError,
                    format!("Can't set HDFS file permissions '{uri}': {e}"),
                )
            })?;

        info!(uri, "opened HDFS writer");
        Ok((instance, writer))
    }
}
