//! Handlers that hand channel callbacks back to the test thread.

use crate::item::{ChannelBuffer, MarkerItem, WriteStatus};
use crate::reader::{BufferReturn, ReaderHandler};
use crate::writer::WriterHandler;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Forwards every delivered buffer over a channel.
///
/// The collector owns a [`BufferReturn`] so tests can give permits back
/// explicitly, or let [`collect_to_end`](Self::collect_to_end) do it.
pub struct ChannelCollector {
    tx: Mutex<Option<Sender<ChannelBuffer>>>,
    rx: Receiver<ChannelBuffer>,
    returns: BufferReturn,
}

impl ChannelCollector {
    #[must_use]
    pub fn new(returns: BufferReturn) -> Self {
        let (tx, rx) = unbounded();
        Self {
            tx: Mutex::new(Some(tx)),
            rx,
            returns,
        }
    }

    /// The reader handler to pass to `start`. Can be taken once.
    ///
    /// # Panics
    ///
    /// Panics if called twice.
    #[must_use]
    pub fn handler(&self) -> Arc<dyn ReaderHandler> {
        let tx = self
            .tx
            .lock()
            .expect("collector mutex poisoned")
            .take()
            .expect("collector handler already taken");
        Arc::new(move |buffer: ChannelBuffer| {
            let _ = tx.send(buffer);
        })
    }

    /// Next delivered buffer, without returning it.
    ///
    /// `None` on timeout or once the reader dropped its handler.
    #[must_use]
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ChannelBuffer> {
        match self.rx.recv_timeout(timeout) {
            Ok(buffer) => Some(buffer),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Buffers delivered so far, without waiting and without returning them.
    #[must_use]
    pub fn pending(&self) -> Vec<ChannelBuffer> {
        self.rx.try_iter().collect()
    }

    pub fn return_buffer(&self, buffer: ChannelBuffer) {
        self.returns.return_buffer(buffer);
    }

    /// Receive until the terminal marker, returning every buffer as it
    /// arrives. Yields the concatenated data and the marker.
    ///
    /// # Panics
    ///
    /// Panics if the reader drops its handler without delivering a marker.
    #[must_use]
    pub fn collect_to_end(&self) -> (Vec<u8>, MarkerItem) {
        let mut bytes = Vec::new();
        loop {
            let buffer = self
                .rx
                .recv()
                .expect("reader finished without a terminal marker");
            let marker = match &buffer {
                ChannelBuffer::Data(data) => {
                    bytes.extend_from_slice(data.as_slice());
                    None
                }
                ChannelBuffer::Marker(marker) => Some(marker.clone()),
            };
            self.returns.return_buffer(buffer);
            if let Some(marker) = marker {
                return (bytes, marker);
            }
        }
    }
}

/// Records writer statuses in the order the session thread reports them.
#[derive(Clone, Default)]
pub struct CompletionRecorder {
    statuses: Arc<Mutex<Vec<(String, WriteStatus)>>>,
}

impl CompletionRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A handler that records its statuses under `label`.
    #[must_use]
    pub fn handler(&self, label: impl Into<String>) -> Arc<dyn WriterHandler> {
        let label = label.into();
        let statuses = Arc::clone(&self.statuses);
        Arc::new(move |status: WriteStatus| {
            statuses
                .lock()
                .expect("recorder mutex poisoned")
                .push((label.clone(), status));
        })
    }

    /// Every `(label, status)` pair so far.
    ///
    /// # Panics
    ///
    /// Panics if the recorder mutex is poisoned.
    #[must_use]
    pub fn statuses(&self) -> Vec<(String, WriteStatus)> {
        self.statuses.lock().expect("recorder mutex poisoned").clone()
    }

    /// Statuses recorded for one label.
    #[must_use]
    pub fn for_label(&self, label: &str) -> Vec<WriteStatus> {
        self.statuses()
            .into_iter()
            .filter(|(l, _)| l == label)
            .map(|(_, s)| s)
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.statuses.lock().expect("recorder mutex poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
