//! Progress counters shared between a session thread and status readers.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Point-in-time snapshot of a channel's length counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelStatus {
    pub total_length: u64,
    pub processed_length: u64,
}

/// Lock-guarded pair of length counters.
#[derive(Debug, Default)]
pub(crate) struct LengthCounters {
    inner: Mutex<ChannelStatus>,
}

impl LengthCounters {
    pub(crate) fn reset(&self) {
        *self.inner.lock().expect("status mutex poisoned") = ChannelStatus::default();
    }

    pub(crate) fn set_total(&self, total: u64) {
        self.inner.lock().expect("status mutex poisoned").total_length = total;
    }

    pub(crate) fn set_processed(&self, processed: u64) {
        self.inner.lock().expect("status mutex poisoned").processed_length = processed;
    }

    pub(crate) fn add_processed(&self, delta: u64) {
        self.inner.lock().expect("status mutex poisoned").processed_length += delta;
    }

    pub(crate) fn snapshot(&self) -> ChannelStatus {
        *self.inner.lock().expect("status mutex poisoned")
    }
}
