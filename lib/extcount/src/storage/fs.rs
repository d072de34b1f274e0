use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{PartitionReader, PartitionWriter, Storage};
use crate::constants::{READ_BUFFER_BYTES, WRITE_BUFFER_BYTES};
use crate::entry::trim_eol;
use crate::error::{Error, Result};

/// Storage over a local directory. Names are resolved relative to `root`;
/// absolute names are used as-is.
#[derive(Clone, Debug)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Removes a directory of intermediates under the root, if present.
    pub fn remove_dir(&self, name: &str) -> Result<()> {
        let path = self.path(name);
        match fs::remove_dir_all(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io(path.display().to_string(), e)),
        }
    }
}

fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

impl Storage for FsStorage {
    type Reader = FsReader;
    type Writer = FsWriter;

    fn open_for_read(&self, name: &str) -> Result<FsReader> {
        let file = File::open(self.path(name)).map_err(|e| Error::open(name, e))?;
        Ok(FsReader {
            name: name.to_string(),
            inner: BufReader::with_capacity(READ_BUFFER_BYTES, file),
            buf: Vec::new(),
            len: 0,
            line_no: 0,
        })
    }

    fn create_for_write(&self, name: &str) -> Result<FsWriter> {
        let path = self.path(name);
        ensure_parent(&path).map_err(|e| Error::open(name, e))?;
        let file = File::create(&path).map_err(|e| Error::open(name, e))?;
        debug!(name, "created partition file");
        Ok(FsWriter { name: name.to_string(), inner: BufWriter::with_capacity(WRITE_BUFFER_BYTES, file) })
    }
}

pub struct FsReader {
    name: String,
    inner: BufReader<File>,
    buf: Vec<u8>,
    len: usize,
    line_no: u64,
}

impl PartitionReader for FsReader {
    fn advance(&mut self) -> Result<bool> {
        self.buf.clear();
        self.len = 0;
        let n = self.inner.read_until(b'\n', &mut self.buf).map_err(|e| Error::io(&self.name, e))?;
        if n == 0 {
            return Ok(false);
        }
        self.len = trim_eol(&self.buf).len();
        self.line_no += 1;
        Ok(true)
    }

    fn current_line(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn line_no(&self) -> u64 {
        self.line_no
    }

    fn close(self) -> Result<()> {
        // Read handles hold no buffered output; dropping the file releases it.
        drop(self.inner);
        Ok(())
    }
}

pub struct FsWriter {
    name: String,
    inner: BufWriter<File>,
}

impl PartitionWriter for FsWriter {
    fn write_line(&mut self, line: &[u8]) -> Result<()> {
        self.inner
            .write_all(line)
            .and_then(|()| self.inner.write_all(b"\n"))
            .map_err(|e| Error::io(&self.name, e))
    }

    fn close(self) -> Result<()> {
        let Self { name, inner } = self;
        let file = inner.into_inner().map_err(|e| Error::io(&name, e.into_error()))?;
        file.sync_data().map_err(|e| Error::io(&name, e))
    }
}
