//! Whole-file helpers built on the channels.
//!
//! - [`plan_splits`] cuts a file into partition URIs of a fixed nominal size.
//! - [`read_split`] drives one [`FlowControlledReader`] to completion.
//! - [`read_splits_par`] reads many splits concurrently (feature `parallel-io`).
//! - [`write_all`] streams chunks through a [`FlowControlledWriter`].
//!
//! Because every reader aligns its range to record boundaries, concatenating
//! the outputs of [`read_splits_par`] in split order reproduces the file, and
//! each record appears in exactly one split.

use crate::bridge::Bridge;
use crate::config::ChannelConfig;
use crate::item::{ChannelBuffer, MarkerItem, WriteStatus};
use crate::reader::FlowControlledReader;
use crate::uri::{ReadUri, Scheme};
use crate::writer::{FlowControlledWriter, WriterHandler};
use anyhow::{Context, Result, bail};
use crossbeam_channel::unbounded;
use std::sync::Arc;
use tracing::debug;

/// Partition URIs covering `file_len` bytes in nominal pieces of `split_len`.
///
/// The last split is shorter when `file_len` is not a multiple of `split_len`.
/// An empty file yields no splits.
///
/// # Panics
///
/// Panics if `split_len` is not positive.
#[must_use]
pub fn plan_splits(
    scheme: Scheme,
    authority: &str,
    path: &str,
    file_len: u64,
    split_len: i32,
) -> Vec<ReadUri> {
    assert!(split_len > 0, "split length must be positive");
    let step = split_len.unsigned_abs() as u64;
    (0..file_len)
        .step_by(usize::try_from(step).unwrap_or(usize::MAX))
        .map(|offset| {
            let length = (file_len - offset).min(step);
            ReadUri {
                scheme,
                authority: authority.to_string(),
                path: path.to_string(),
                offset: offset as i64,
                // bounded by split_len
                length: length as i32,
            }
        })
        .collect()
}

/// Read one partition and return its bytes.
///
/// # Errors
///
/// Returns an error if the reader ends with an `Abort` marker or stops without
/// delivering a terminal marker.
pub fn read_split(bridge: Arc<dyn Bridge>, uri: &ReadUri, config: &ChannelConfig) -> Result<Vec<u8>> {
    let reader = FlowControlledReader::new(uri.to_string(), bridge, config.clone());
    let returns = reader.buffer_return();
    let (tx, rx) = unbounded::<ChannelBuffer>();
    reader.start(Arc::new(move |buffer: ChannelBuffer| {
        let _ = tx.send(buffer);
    }));

    let mut out = Vec::new();
    let terminal = loop {
        let buffer = rx
            .recv()
            .with_context(|| format!("reader for {uri} stopped without a terminal marker"))?;
        match buffer {
            ChannelBuffer::Data(data) => {
                out.extend_from_slice(data.as_slice());
                returns.return_buffer(ChannelBuffer::Data(data));
            }
            ChannelBuffer::Marker(marker) => {
                returns.return_buffer(ChannelBuffer::Marker(marker.clone()));
                break marker;
            }
        }
    };

    reader.drain();
    reader.close();
    if let MarkerItem::Abort { .. } = terminal {
        bail!("read {uri}: {terminal}");
    }
    debug!(uri = %uri, bytes = out.len(), "split read");
    Ok(out)
}

/// Read every split concurrently, returning each split's bytes in input order.
///
/// Runs on a dedicated pool of `num_cpus::get().max(2)` threads, clamped to
/// the number of splits.
///
/// # Errors
///
/// Returns the first failing split's error.
///
/// # Feature
/// Requires the `parallel-io` feature.
#[cfg(feature = "parallel-io")]
pub fn read_splits_par(
    bridge: Arc<dyn Bridge>,
    uris: &[ReadUri],
    config: &ChannelConfig,
) -> Result<Vec<Vec<u8>>> {
    use rayon::prelude::*;
    if uris.is_empty() {
        return Ok(Vec::new());
    }
    let threads = num_cpus::get().max(2).clamp(1, uris.len());
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .context("build split reader pool")?;
    pool.install(|| {
        uris.par_iter()
            .map(|uri| read_split(Arc::clone(&bridge), uri, config))
            .collect()
    })
}

/// Write `chunks` to `uri` in order and close the file.
///
/// Pauses whenever the writer signals backpressure, and stops submitting
/// chunks once a write has failed.
///
/// # Returns
/// The number of bytes the writer reports as written.
///
/// # Errors
///
/// Returns an error if the writer's completion item is an `Abort`.
pub fn write_all<I>(
    bridge: Arc<dyn Bridge>,
    uri: &str,
    chunks: I,
    config: &ChannelConfig,
) -> Result<u64>
where
    I: IntoIterator<Item = Vec<u8>>,
{
    let writer = FlowControlledWriter::new(uri, bridge, config.clone());
    writer.start();

    let (tx, rx) = unbounded::<WriteStatus>();
    let handler: Arc<dyn WriterHandler> = Arc::new(move |status: WriteStatus| {
        let _ = tx.send(status);
    });

    'chunks: for chunk in chunks {
        if !writer.write_buffer(chunk, false, Arc::clone(&handler)) {
            continue;
        }
        while writer.queue_length() > config.write_queue_threshold {
            let status = rx
                .recv()
                .with_context(|| format!("writer for {uri} stopped reporting"))?;
            if status.marker().is_some_and(MarkerItem::is_abort) {
                break 'chunks;
            }
        }
    }

    writer.write_termination(MarkerItem::EndOfStream, handler);
    let completion = writer.drain();
    writer.close();
    if completion.is_abort() {
        bail!("write {uri}: {completion}");
    }
    Ok(writer.fill_in_status().processed_length)
}
