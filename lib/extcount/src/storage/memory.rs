//! In-memory storage. Used by tests to observe handle lifecycles and to inject
//! failures at precise points; also handy for small inputs.

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{PartitionReader, PartitionWriter, Storage};
use crate::entry::trim_eol;
use crate::error::{Error, Result};

#[derive(Clone, Debug, Default)]
pub struct MemStorage {
    state: Arc<Mutex<State>>,
}

#[derive(Debug, Default)]
struct State {
    files: HashMap<String, Arc<Vec<u8>>>,
    opens: HashMap<String, usize>,
    closes: HashMap<String, usize>,
    fail_open: HashSet<String>,
    fail_close: HashSet<String>,
    /// name -> number of successful line writes before the next one fails
    fail_write_after: HashMap<String, usize>,
    /// name -> number of successful reads before the next one fails
    fail_read_after: HashMap<String, usize>,
}

fn injected(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::Other, format!("injected {what} failure"))
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A panicking test thread must not hide the files from the others.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn insert(&self, name: &str, contents: impl Into<Vec<u8>>) {
        self.state().files.insert(name.to_string(), Arc::new(contents.into()));
    }

    /// Stores `lines` joined with newlines, each terminated.
    pub fn insert_lines<L: AsRef<[u8]>>(&self, name: &str, lines: impl IntoIterator<Item = L>) {
        let mut buf = Vec::new();
        for line in lines {
            buf.extend_from_slice(line.as_ref());
            buf.push(b'\n');
        }
        self.insert(name, buf);
    }

    pub fn contents(&self, name: &str) -> Option<Vec<u8>> {
        self.state().files.get(name).map(|c| c.as_ref().clone())
    }

    /// The file's lines without terminators.
    pub fn lines(&self, name: &str) -> Option<Vec<Vec<u8>>> {
        let contents = self.contents(name)?;
        Some(contents.split_inclusive(|b| *b == b'\n').map(|l| trim_eol(l).to_vec()).collect())
    }

    pub fn exists(&self, name: &str) -> bool {
        self.state().files.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state().files.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn open_count(&self, name: &str) -> usize {
        self.state().opens.get(name).copied().unwrap_or(0)
    }

    pub fn close_count(&self, name: &str) -> usize {
        self.state().closes.get(name).copied().unwrap_or(0)
    }

    pub fn fail_open(&self, name: &str) {
        self.state().fail_open.insert(name.to_string());
    }

    pub fn fail_close(&self, name: &str) {
        self.state().fail_close.insert(name.to_string());
    }

    pub fn fail_write_after(&self, name: &str, successful_writes: usize) {
        self.state().fail_write_after.insert(name.to_string(), successful_writes);
    }

    pub fn fail_read_after(&self, name: &str, successful_reads: usize) {
        self.state().fail_read_after.insert(name.to_string(), successful_reads);
    }

    fn record_close(&self, name: &str) -> Result<()> {
        let mut state = self.state();
        *state.closes.entry(name.to_string()).or_default() += 1;
        if state.fail_close.contains(name) {
            return Err(Error::io(name, injected("close")));
        }
        Ok(())
    }
}

impl Storage for MemStorage {
    type Reader = MemReader;
    type Writer = MemWriter;

    fn open_for_read(&self, name: &str) -> Result<MemReader> {
        let mut state = self.state();
        if state.fail_open.contains(name) {
            return Err(Error::open(name, injected("open")));
        }
        let data = match state.files.get(name) {
            Some(data) => Arc::clone(data),
            None => return Err(Error::open(name, io::Error::new(io::ErrorKind::NotFound, "no such file"))),
        };
        *state.opens.entry(name.to_string()).or_default() += 1;
        let fail_after = state.fail_read_after.get(name).copied();
        Ok(MemReader {
            storage: self.clone(),
            name: name.to_string(),
            data,
            pos: 0,
            line: (0, 0),
            line_no: 0,
            fail_after,
        })
    }

    fn create_for_write(&self, name: &str) -> Result<MemWriter> {
        let mut state = self.state();
        if state.fail_open.contains(name) {
            return Err(Error::open(name, injected("create")));
        }
        *state.opens.entry(name.to_string()).or_default() += 1;
        let fail_after = state.fail_write_after.get(name).copied();
        Ok(MemWriter { storage: self.clone(), name: name.to_string(), buf: Vec::new(), written: 0, fail_after })
    }
}

pub struct MemReader {
    storage: MemStorage,
    name: String,
    data: Arc<Vec<u8>>,
    pos: usize,
    line: (usize, usize),
    line_no: u64,
    fail_after: Option<usize>,
}

impl PartitionReader for MemReader {
    fn advance(&mut self) -> Result<bool> {
        if self.fail_after.is_some_and(|n| self.line_no as usize >= n) {
            return Err(Error::io(&self.name, injected("read")));
        }
        let rest = &self.data[self.pos..];
        if rest.is_empty() {
            self.line = (self.pos, self.pos);
            return Ok(false);
        }
        let raw_len = memchr::memchr(b'\n', rest).map_or(rest.len(), |i| i + 1);
        let len = trim_eol(&rest[..raw_len]).len();
        self.line = (self.pos, self.pos + len);
        self.pos += raw_len;
        self.line_no += 1;
        Ok(true)
    }

    fn current_line(&self) -> &[u8] {
        &self.data[self.line.0..self.line.1]
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn line_no(&self) -> u64 {
        self.line_no
    }

    fn close(self) -> Result<()> {
        self.storage.record_close(&self.name)
    }
}

/// Buffers everything and publishes the file on a successful close.
pub struct MemWriter {
    storage: MemStorage,
    name: String,
    buf: Vec<u8>,
    written: usize,
    fail_after: Option<usize>,
}

impl PartitionWriter for MemWriter {
    fn write_line(&mut self, line: &[u8]) -> Result<()> {
        if self.fail_after.is_some_and(|n| self.written >= n) {
            return Err(Error::io(&self.name, injected("write")));
        }
        self.buf.extend_from_slice(line);
        self.buf.push(b'\n');
        self.written += 1;
        Ok(())
    }

    fn close(self) -> Result<()> {
        let Self { storage, name, buf, .. } = self;
        storage.record_close(&name)?;
        storage.insert(&name, buf);
        Ok(())
    }
}
