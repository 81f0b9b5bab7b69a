//! Channel tuning knobs.
//!
//! Every reader and writer takes a [`ChannelConfig`] at construction. The
//! defaults match what the filesystem channels have always used; override
//! individual fields with struct update syntax or load a JSON file:
//!
//! ```
//! use ironchannel::ChannelConfig;
//!
//! let config = ChannelConfig {
//!     max_buffers_out: 8,
//!     ..ChannelConfig::default()
//! };
//! assert_eq!(config.read_block_size, 2 * 1024 * 1024);
//! ```

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Configuration shared by readers and writers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Size of each data block the reader delivers.
    pub read_block_size: usize,
    /// Maximum number of delivered-but-unreturned buffers per reader.
    pub max_buffers_out: usize,
    /// Chunk size used while scanning for a record boundary.
    pub scan_chunk_size: usize,
    /// Capacity of buffers handed out by the writer.
    pub write_buffer_size: usize,
    /// Queue depth above which `write_buffer` asks the producer to pause.
    pub write_queue_threshold: usize,
    /// Block size requested when creating the output file.
    pub create_block_size: u64,
    /// Replication factor for created files; `None` uses the filesystem default.
    pub replication: Option<u16>,
    /// Permission bits applied to created files.
    pub file_mode: u32,
    /// Owner applied to created files. Falls back to `$USER` when unset.
    pub owner: Option<String>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            read_block_size: 2 * 1024 * 1024,
            max_buffers_out: 4,
            scan_chunk_size: 4 * 1024,
            write_buffer_size: 256 * 1024,
            write_queue_threshold: 4,
            create_block_size: 1024 * 1024,
            replication: None,
            file_mode: 0o644,
            owner: None,
        }
    }
}

impl ChannelConfig {
    /// Load a config from a JSON file. Missing fields take their defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened, is not valid JSON, or
    /// fails [`validate`](Self::validate).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let config: Self = serde_json::from_reader(BufReader::new(f))
            .with_context(|| format!("parse channel config {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("validate channel config {}", path.display()))?;
        Ok(config)
    }

    /// Reject settings that would stall or spin a channel.
    ///
    /// # Errors
    /// Returns an error if any size or count is zero.
    pub fn validate(&self) -> Result<()> {
        if self.read_block_size == 0 {
            bail!("read_block_size must be positive");
        }
        if self.max_buffers_out == 0 {
            bail!("max_buffers_out must be positive");
        }
        if self.scan_chunk_size == 0 {
            bail!("scan_chunk_size must be positive");
        }
        if self.write_buffer_size == 0 {
            bail!("write_buffer_size must be positive");
        }
        Ok(())
    }

    /// The owner to stamp on created files: the configured one, else `$USER`.
    #[must_use]
    pub fn resolved_owner(&self) -> Option<String> {
        self.owner
            .clone()
            .or_else(|| std::env::var("USER").ok().filter(|u| !u.is_empty()))
    }
}
