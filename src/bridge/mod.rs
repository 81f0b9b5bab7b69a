//! Distributed-filesystem bridge abstraction.
//!
//! Channels never talk to a filesystem client directly. They go through the
//! [`Bridge`] trait family, which mirrors the native client surface: open an
//! instance for a `scheme://authority`, open readers and writers on it, read
//! and write blocks, close, and set ownership.
//!
//! ## Implementations
//!
//! - [`FakeBridge`] - in-memory files with fault injection, for unit testing
//! - [`LocalBridge`] - maps `scheme://authority/path` onto a local directory
//!
//! ## Threading
//!
//! A channel's session thread is the only caller of its instance, reader and
//! writer objects, so those need only be [`Send`]. The [`Bridge`] itself is
//! shared (`Arc<dyn Bridge>`) between the constructing thread and session
//! threads and must be [`Sync`].
//!
//! ## Example
//!
//! ```
//! use ironchannel::bridge::*;
//!
//! # fn main() -> BridgeResult<()> {
//! let bridge = FakeBridge::new();
//! bridge.put_file("hdfs://nn/data.txt", b"alpha\nbeta\n");
//!
//! let instance = bridge.open_instance("hdfs://nn")?;
//! let mut reader = instance.open_reader("hdfs://nn/data.txt")?;
//! let mut buf = [0u8; 6];
//! assert_eq!(reader.read_block(0, &mut buf)?, BlockRead::Data(6));
//! assert_eq!(&buf, b"alpha\n");
//! # Ok(())
//! # }
//! ```

pub mod fake;
pub mod local;
pub mod traits;

pub use fake::*;
pub use local::*;
pub use traits::*;
