//! Local-directory bridge.
//!
//! [`LocalBridge`] serves `scheme://authority/path` from
//! `<root>/<authority>/<path>`, which makes it possible to run readers and
//! writers end-to-end on one machine without a cluster.

use crate::bridge::traits::{
    BlockRead, Bridge, BridgeError, BridgeResult, FileReader, FileWriter, Instance,
};
use std::fs::{File, create_dir_all};
use std::io::{BufWriter, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct LocalBridge {
    root: PathBuf,
}

impl LocalBridge {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Bridge for LocalBridge {
    fn open_instance(&self, scheme_and_authority: &str) -> BridgeResult<Box<dyn Instance>> {
        let (_, authority) = scheme_and_authority.split_once("://").ok_or_else(|| {
            BridgeError::new(format!("malformed instance name '{scheme_and_authority}'"))
        })?;
        let dir = self.root.join(authority);
        if !dir.is_dir() {
            create_dir_all(&dir)?;
        }
        Ok(Box::new(LocalInstance {
            prefix: format!("{scheme_and_authority}/"),
            dir,
        }))
    }
}

struct LocalInstance {
    prefix: String,
    dir: PathBuf,
}

impl LocalInstance {
    fn resolve(&self, path: &str) -> BridgeResult<PathBuf> {
        let rel = path.strip_prefix(&self.prefix).ok_or_else(|| {
            BridgeError::new(format!("{path} is not under instance {}", self.prefix))
        })?;
        if rel.split('/').any(|seg| seg == "..") {
            return Err(BridgeError::new(format!("path escapes instance: {path}")));
        }
        Ok(self.dir.join(rel))
    }
}

impl Instance for LocalInstance {
    fn open_reader(&self, path: &str) -> BridgeResult<Box<dyn FileReader>> {
        let local = self.resolve(path)?;
        let file = File::open(&local)
            .map_err(|e| BridgeError::new(format!("{}: {e}", local.display())))?;
        Ok(Box::new(LocalFileReader { file }))
    }

    fn open_create(
        &self,
        path: &str,
        _block_size: u64,
        _replication: Option<u16>,
    ) -> BridgeResult<Box<dyn FileWriter>> {
        let local = self.resolve(path)?;
        if let Some(parent) = local.parent()
            && !parent.as_os_str().is_empty()
        {
            create_dir_all(parent)?;
        }
        let file = File::create(&local)
            .map_err(|e| BridgeError::new(format!("{}: {e}", local.display())))?;
        Ok(Box::new(LocalFileWriter {
            out: Some(BufWriter::new(file)),
        }))
    }

    fn set_owner_and_permission(
        &self,
        path: &str,
        user: Option<&str>,
        _group: Option<&str>,
        mode: u32,
    ) -> BridgeResult<()> {
        let local = self.resolve(path)?;
        // Ownership changes need privileges a channel never has locally.
        debug!(path = %local.display(), ?user, mode, "local bridge applying permissions");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&local, std::fs::Permissions::from_mode(mode))?;
        }
        #[cfg(not(unix))]
        {
            let _ = mode;
            std::fs::metadata(&local)?;
        }
        Ok(())
    }
}

struct LocalFileReader {
    file: File,
}

impl FileReader for LocalFileReader {
    fn read_block(&mut self, offset: u64, buf: &mut [u8]) -> BridgeResult<BlockRead> {
        self.file.seek(SeekFrom::Start(offset))?;
        let mut filled = 0;
        while filled < buf.len() {
            match self.file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        if filled == 0 && !buf.is_empty() {
            Ok(BlockRead::Eof)
        } else {
            Ok(BlockRead::Data(filled))
        }
    }
}

struct LocalFileWriter {
    out: Option<BufWriter<File>>,
}

impl FileWriter for LocalFileWriter {
    fn write_block(&mut self, data: &[u8], flush: bool) -> BridgeResult<()> {
        let out = self
            .out
            .as_mut()
            .ok_or_else(|| BridgeError::new("write after close"))?;
        out.write_all(data)?;
        if flush {
            out.flush()?;
        }
        Ok(())
    }

    fn close(&mut self) -> BridgeResult<()> {
        let out = self
            .out
            .take()
            .ok_or_else(|| BridgeError::new("file already closed"))?;
        let file = out
            .into_inner()
            .map_err(|e| BridgeError::new(e.error().to_string()))?;
        file.sync_all()?;
        Ok(())
    }
}
