//! Testing utilities for channel code.
//!
//! - **Collectors**: [`ChannelCollector`] is a reader handler that forwards
//!   buffers to the test thread; [`CompletionRecorder`] is a writer handler
//!   that records every status in arrival order.
//! - **Fixtures**: line-delimited sample files in LF, CR and CRLF flavours.
//! - **Assertions**: checks that a set of split outputs partitions a file.
//!
//! # Quick Start
//!
//! ```
//! use ironchannel::bridge::FakeBridge;
//! use ironchannel::testing::*;
//! use ironchannel::{ChannelConfig, FlowControlledReader};
//! use std::sync::Arc;
//!
//! let bridge = FakeBridge::new();
//! let file = line_records(3, LineEnding::Lf);
//! bridge.put_file("hdfs://nn/a.txt", &file);
//!
//! let uri = format!("hdfspt://nn/a.txt?offset=0&length={}", file.len());
//! let reader = FlowControlledReader::new(uri, Arc::new(bridge), ChannelConfig::default());
//! let collector = ChannelCollector::new(reader.buffer_return());
//! reader.start(collector.handler());
//!
//! let (bytes, _) = collector.collect_to_end();
//! assert_eq!(bytes, file);
//! reader.drain();
//! ```

pub mod assertions;
pub mod collectors;
pub mod fixtures;

pub use assertions::*;
pub use collectors::*;
pub use fixtures::*;
