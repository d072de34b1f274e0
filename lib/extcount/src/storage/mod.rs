//! Line-oriented named-file storage the core reads partitions from and writes
//! them to.

mod fs;
pub mod memory;

pub use fs::FsStorage;
pub use memory::MemStorage;

use crate::entry::{parse_line, KeyCount};
use crate::error::{Error, Result};

pub trait Storage: Send + Sync {
    type Reader: PartitionReader + Send;
    type Writer: PartitionWriter + Send;

    fn open_for_read(&self, name: &str) -> Result<Self::Reader>;
    fn create_for_write(&self, name: &str) -> Result<Self::Writer>;
}

/// Cursor over the lines of one named file.
pub trait PartitionReader {
    /// Moves to the next line. `Ok(false)` at end of input; read failures
    /// are returned here rather than stashed for later.
    fn advance(&mut self) -> Result<bool>;

    /// The current line without its terminator. Empty before the first
    /// successful `advance`.
    fn current_line(&self) -> &[u8];

    fn name(&self) -> &str;

    /// 1-based number of the current line.
    fn line_no(&self) -> u64;

    fn close(self) -> Result<()>;

    /// The current line parsed as `key\tcount`.
    fn current_entry(&self) -> Result<(&[u8], u64)> {
        parse_line(self.current_line()).map_err(|e| Error::format(self.name(), self.line_no(), e.to_string()))
    }

    /// Advances and parses in one step, `None` at end of input.
    fn next_entry(&mut self) -> Result<Option<KeyCount>> {
        if !self.advance()? {
            return Ok(None);
        }
        let (key, count) = self.current_entry()?;
        Ok(Some(KeyCount::new(key, count)))
    }
}

pub trait PartitionWriter {
    /// Writes `line` followed by a newline.
    fn write_line(&mut self, line: &[u8]) -> Result<()>;

    /// Flushes buffered output and releases the handle.
    fn close(self) -> Result<()>;
}
