//! # Ironchannel
//!
//! **Flow-controlled byte channels** between a record-processing runtime and a
//! distributed file store (HDFS or Azure blob storage), reached through a
//! pluggable [`Bridge`](bridge::Bridge).
//!
//! ## Key Features
//!
//! - **Partition reads** - stream one byte range of a file, aligned to record
//!   boundaries so adjacent partitions never split or duplicate a record
//! - **Backpressure** - at most `max_buffers_out` buffers in flight per reader
//! - **Interruptible** - `interrupt` stops a reader promptly, even while stalled
//! - **Whole-file writes** - a FIFO write queue with fail-fast completion and a
//!   non-blocking backpressure signal
//! - **Pluggable storage** - an in-memory [`FakeBridge`](bridge::FakeBridge)
//!   for tests and a [`LocalBridge`](bridge::LocalBridge) over a directory
//! - **Parallel splits** - read a whole file as many partitions at once
//!   (feature `parallel-io`)
//!
//! ## Quick Start
//!
//! ```
//! use ironchannel::bridge::FakeBridge;
//! use ironchannel::splits::{plan_splits, read_splits_par, write_all};
//! use ironchannel::{ChannelConfig, Scheme};
//! use std::sync::Arc;
//!
//! # fn main() -> anyhow::Result<()> {
//! let bridge = Arc::new(FakeBridge::new());
//! let config = ChannelConfig::default();
//!
//! let chunks = vec![b"alpha\nbe".to_vec(), b"ta\ngamma\n".to_vec()];
//! let written = write_all(bridge.clone(), "hdfs://nn/out.txt", chunks, &config)?;
//! assert_eq!(written, 17);
//!
//! let splits = plan_splits(Scheme::Hdfs, "nn", "out.txt", written, 4);
//! let parts = read_splits_par(bridge, &splits, &config)?;
//! assert_eq!(parts.concat(), b"alpha\nbeta\ngamma\n");
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Channel strings
//!
//! Readers take `hdfspt://` or `wasbpt://` strings naming a file and a byte
//! range (`?offset=..&length=..`); writers take `hdfs://` or `wasb://` strings
//! naming a whole file. See [`uri`].
//!
//! ### Markers
//!
//! Every reader stream and every writer session ends with exactly one
//! [`MarkerItem`]: `EndOfStream`, or `Abort` with an [`ErrorCode`] and a
//! description. Failures travel as markers, never as panics.
//!
//! ### Threads
//!
//! Each channel owns one session thread that makes all bridge calls. Handlers
//! run on that thread. Control calls (`interrupt`, `drain`, `write_buffer`) may
//! come from any other thread.

pub mod bridge;
pub mod config;
pub mod error;
pub mod item;
pub mod reader;
pub mod scanner;
pub mod splits;
pub mod status;
pub mod testing;
pub mod uri;
pub mod writer;

pub use config::ChannelConfig;
pub use error::{ChannelError, ChannelResult, ErrorCode};
pub use item::{ChannelBuffer, DataBuffer, MarkerItem, MarkerKind, WriteStatus};
pub use reader::{BufferReturn, FlowControlledReader, ReaderHandler, ReaderState};
pub use scanner::{LineRecordScanner, ScanResult, SyncScanner};
pub use status::ChannelStatus;
pub use uri::{ReadUri, Scheme, WriteUri, parse_read_uri, parse_write_uri};
pub use writer::{FlowControlledWriter, WriterHandler, WriterState};

#[cfg(feature = "parallel-io")]
pub use splits::read_splits_par;
pub use splits::{plan_splits, read_split, write_all};
