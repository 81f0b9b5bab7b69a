//! Fake bridge for testing.
//!
//! [`FakeBridge`] keeps files in memory, keyed by their full
//! `scheme://authority/path`, and lets tests inject failures at every bridge
//! call the channels make. It also records every `write_block` call so tests
//! can assert on ordering.

use crate::bridge::traits::{
    BlockRead, Bridge, BridgeError, BridgeResult, FileReader, FileWriter, Instance,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Failures to inject into a [`FakeBridge`].
#[derive(Debug, Clone, Default)]
pub struct FakeFaults {
    pub fail_initialize: bool,
    pub fail_open_instance: bool,
    pub fail_open_create: bool,
    pub fail_set_permission: bool,
    /// Any `read_block` whose requested range covers this offset fails.
    pub read_error_at: Option<u64>,
    /// Data reads return one byte fewer than they could.
    pub short_read: bool,
    /// Sleep this long inside every `read_block`.
    pub read_delay: Option<Duration>,
    /// The n-th `write_block` call (1-based, across all writers) fails.
    pub fail_write_call: Option<usize>,
    pub fail_close: bool,
}

/// A recorded `write_block` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeWrite {
    pub path: String,
    pub data: Vec<u8>,
    pub flush: bool,
}

/// Ownership recorded by `set_owner_and_permission`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakePermission {
    pub user: Option<String>,
    pub group: Option<String>,
    pub mode: u32,
}

#[derive(Default)]
struct FakeState {
    files: HashMap<String, Vec<u8>>,
    permissions: HashMap<String, FakePermission>,
    faults: FakeFaults,
    writes: Vec<FakeWrite>,
    write_calls: usize,
    read_calls: usize,
    instances_opened: usize,
}

type SharedState = Arc<Mutex<FakeState>>;

// ============================================================================
// FakeBridge
// ============================================================================

#[derive(Clone, Default)]
pub struct FakeBridge {
    state: SharedState,
}

impl FakeBridge {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a file.
    ///
    /// # Panics
    ///
    /// Panics if the state mutex is poisoned.
    pub fn put_file(&self, path: &str, data: &[u8]) {
        self.state
            .lock()
            .expect("fake bridge mutex poisoned")
            .files
            .insert(path.to_string(), data.to_vec());
    }

    /// Current contents of a file, if it exists.
    ///
    /// # Panics
    ///
    /// Panics if the state mutex is poisoned.
    #[must_use]
    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .expect("fake bridge mutex poisoned")
            .files
            .get(path)
            .cloned()
    }

    /// Replace the injected faults.
    ///
    /// # Panics
    ///
    /// Panics if the state mutex is poisoned.
    pub fn set_faults(&self, faults: FakeFaults) {
        self.state.lock().expect("fake bridge mutex poisoned").faults = faults;
    }

    /// Every `write_block` call that reached a file, in call order.
    ///
    /// # Panics
    ///
    /// Panics if the state mutex is poisoned.
    #[must_use]
    pub fn writes(&self) -> Vec<FakeWrite> {
        self.state
            .lock()
            .expect("fake bridge mutex poisoned")
            .writes
            .clone()
    }

    /// Number of `write_block` calls made, including failed ones.
    ///
    /// # Panics
    ///
    /// Panics if the state mutex is poisoned.
    #[must_use]
    pub fn write_calls(&self) -> usize {
        self.state.lock().expect("fake bridge mutex poisoned").write_calls
    }

    /// Number of `read_block` calls made.
    ///
    /// # Panics
    ///
    /// Panics if the state mutex is poisoned.
    #[must_use]
    pub fn read_calls(&self) -> usize {
        self.state.lock().expect("fake bridge mutex poisoned").read_calls
    }

    /// Number of instances successfully opened.
    ///
    /// # Panics
    ///
    /// Panics if the state mutex is poisoned.
    #[must_use]
    pub fn instances_opened(&self) -> usize {
        self.state
            .lock()
            .expect("fake bridge mutex poisoned")
            .instances_opened
    }

    /// # Panics
    ///
    /// Panics if the state mutex is poisoned.
    #[must_use]
    pub fn permission(&self, path: &str) -> Option<FakePermission> {
        self.state
            .lock()
            .expect("fake bridge mutex poisoned")
            .permissions
            .get(path)
            .cloned()
    }
}

impl Bridge for FakeBridge {
    fn initialize(&self) -> BridgeResult<()> {
        if self.state.lock().expect("fake bridge mutex poisoned").faults.fail_initialize {
            return Err(BridgeError::new("fake bridge refused to initialize"));
        }
        Ok(())
    }

    fn open_instance(&self, scheme_and_authority: &str) -> BridgeResult<Box<dyn Instance>> {
        let mut state = self.state.lock().expect("fake bridge mutex poisoned");
        if state.faults.fail_open_instance {
            return Err(BridgeError::new(format!(
                "java.net.ConnectException: Connection refused: {scheme_and_authority}"
            )));
        }
        state.instances_opened += 1;
        drop(state);
        Ok(Box::new(FakeInstance {
            state: Arc::clone(&self.state),
        }))
    }
}

// ============================================================================
// Instance, Reader, Writer
// ============================================================================

struct FakeInstance {
    state: SharedState,
}

impl Instance for FakeInstance {
    fn open_reader(&self, path: &str) -> BridgeResult<Box<dyn FileReader>> {
        let state = self.state.lock().expect("fake bridge mutex poisoned");
        if !state.files.contains_key(path) {
            return Err(BridgeError::new(format!(
                "java.io.FileNotFoundException: File does not exist: {path}"
            )));
        }
        drop(state);
        Ok(Box::new(FakeFileReader {
            state: Arc::clone(&self.state),
            path: path.to_string(),
        }))
    }

    fn open_create(
        &self,
        path: &str,
        _block_size: u64,
        _replication: Option<u16>,
    ) -> BridgeResult<Box<dyn FileWriter>> {
        let mut state = self.state.lock().expect("fake bridge mutex poisoned");
        if state.faults.fail_open_create {
            return Err(BridgeError::new(format!(
                "org.apache.hadoop.security.AccessControlException: Permission denied: {path}"
            )));
        }
        state.files.insert(path.to_string(), Vec::new());
        drop(state);
        Ok(Box::new(FakeFileWriter {
            state: Arc::clone(&self.state),
            path: path.to_string(),
            closed: false,
        }))
    }

    fn set_owner_and_permission(
        &self,
        path: &str,
        user: Option<&str>,
        group: Option<&str>,
        mode: u32,
    ) -> BridgeResult<()> {
        let mut state = self.state.lock().expect("fake bridge mutex poisoned");
        if state.faults.fail_set_permission {
            return Err(BridgeError::new(format!("cannot chown {path}")));
        }
        if !state.files.contains_key(path) {
            return Err(BridgeError::new(format!("File does not exist: {path}")));
        }
        state.permissions.insert(
            path.to_string(),
            FakePermission {
                user: user.map(str::to_string),
                group: group.map(str::to_string),
                mode,
            },
        );
        Ok(())
    }
}

struct FakeFileReader {
    state: SharedState,
    path: String,
}

impl FileReader for FakeFileReader {
    fn read_block(&mut self, offset: u64, buf: &mut [u8]) -> BridgeResult<BlockRead> {
        let delay = {
            let mut state = self.state.lock().expect("fake bridge mutex poisoned");
            state.read_calls += 1;
            state.faults.read_delay
        };
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        let state = self.state.lock().expect("fake bridge mutex poisoned");
        if let Some(bad) = state.faults.read_error_at
            && bad >= offset
            && bad < offset + buf.len() as u64
        {
            return Err(BridgeError::new(format!(
                "java.io.IOException: checksum error at {bad} in {}",
                self.path
            )));
        }

        let data = state
            .files
            .get(&self.path)
            .ok_or_else(|| BridgeError::new(format!("File was deleted: {}", self.path)))?;
        let len = data.len() as u64;
        if offset >= len {
            return Ok(BlockRead::Eof);
        }

        let start = usize::try_from(offset).map_err(|e| BridgeError::new(e.to_string()))?;
        let mut n = buf.len().min(data.len() - start);
        if state.faults.short_read && n > 1 {
            n -= 1;
        }
        buf[..n].copy_from_slice(&data[start..start + n]);
        Ok(BlockRead::Data(n))
    }
}

struct FakeFileWriter {
    state: SharedState,
    path: String,
    closed: bool,
}

impl FileWriter for FakeFileWriter {
    fn write_block(&mut self, data: &[u8], flush: bool) -> BridgeResult<()> {
        let mut state = self.state.lock().expect("fake bridge mutex poisoned");
        state.write_calls += 1;
        if state.faults.fail_write_call == Some(state.write_calls) {
            return Err(BridgeError::new(format!(
                "java.io.IOException: All datanodes are bad. Aborting write to {}",
                self.path
            )));
        }
        if self.closed {
            return Err(BridgeError::new("java.io.IOException: Stream closed"));
        }
        state
            .files
            .entry(self.path.clone())
            .or_default()
            .extend_from_slice(data);
        state.writes.push(FakeWrite {
            path: self.path.clone(),
            data: data.to_vec(),
            flush,
        });
        Ok(())
    }

    fn close(&mut self) -> BridgeResult<()> {
        let state = self.state.lock().expect("fake bridge mutex poisoned");
        if state.faults.fail_close {
            return Err(BridgeError::new(format!(
                "java.io.IOException: Unable to close file {}",
                self.path
            )));
        }
        self.closed = true;
        Ok(())
    }
}
