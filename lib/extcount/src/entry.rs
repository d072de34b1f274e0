//! Key/count entries and the `key\tcount` line format shared by every partition.

use std::fmt;

use memchr::memrchr;

/// One key's aggregate count within some scope: an accumulator, a partition
/// file, or a merge in progress.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyCount {
    pub key: Vec<u8>,
    pub count: u64,
}

impl KeyCount {
    pub fn new(key: impl Into<Vec<u8>>, count: u64) -> Self {
        Self { key: key.into(), count }
    }
}

/// Storage-relative name of a partition.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionId(String);

impl PartitionId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PartitionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PartitionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PartitionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Why a partition line failed to parse.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LineError {
    MissingTab,
    BadCount(String),
}

impl fmt::Display for LineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineError::MissingTab => f.write_str("no tab separating key and count"),
            LineError::BadCount(raw) => write!(f, "count {raw:?} is not an unsigned integer"),
        }
    }
}

/// Splits a partition line (without its newline) into key and count.
///
/// The split happens at the last tab so keys carrying a tab survive.
pub fn parse_line(line: &[u8]) -> Result<(&[u8], u64), LineError> {
    let tab = memrchr(b'\t', line).ok_or(LineError::MissingTab)?;
    let (key, rest) = (&line[..tab], &line[tab + 1..]);
    let count = std::str::from_utf8(rest)
        .ok()
        .filter(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| LineError::BadCount(String::from_utf8_lossy(rest).into_owned()))?;
    Ok((key, count))
}

/// Renders `key\tcount` into `buf`, replacing its previous contents.
pub fn render_line(buf: &mut Vec<u8>, key: &[u8], count: u64) {
    buf.clear();
    buf.extend_from_slice(key);
    buf.push(b'\t');
    buf.extend_from_slice(count.to_string().as_bytes());
}

/// Strips the line terminator (`\n` or `\r\n`) from a raw input line.
pub fn trim_eol(mut line: &[u8]) -> &[u8] {
    if let [rest @ .., b'\n'] = line {
        line = rest;
    }
    if let [rest @ .., b'\r'] = line {
        line = rest;
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_line() {
        assert_eq!(parse_line(b"apple\t42").unwrap(), (&b"apple"[..], 42));
    }

    #[test]
    fn key_may_contain_tabs() {
        assert_eq!(parse_line(b"a\tb\t3").unwrap(), (&b"a\tb"[..], 3));
    }

    #[test]
    fn empty_key_is_allowed_by_the_format() {
        assert_eq!(parse_line(b"\t1").unwrap(), (&b""[..], 1));
    }

    #[test]
    fn rejects_malformed_counts() {
        assert_eq!(parse_line(b"apple"), Err(LineError::MissingTab));
        assert!(matches!(parse_line(b"apple\tx1"), Err(LineError::BadCount(_))));
        assert!(matches!(parse_line(b"apple\t"), Err(LineError::BadCount(_))));
        assert!(matches!(parse_line(b"apple\t-1"), Err(LineError::BadCount(_))));
        assert!(matches!(parse_line(b"apple\t+1"), Err(LineError::BadCount(_))));
        assert!(matches!(parse_line(b"apple\t99999999999999999999999"), Err(LineError::BadCount(_))));
    }

    #[test]
    fn render_reuses_buffer() {
        let mut buf = b"stale".to_vec();
        render_line(&mut buf, b"k", 10);
        assert_eq!(buf, b"k\t10");
    }

    #[test]
    fn trims_lf_and_crlf() {
        assert_eq!(trim_eol(b"abc\n"), b"abc");
        assert_eq!(trim_eol(b"abc\r\n"), b"abc");
        assert_eq!(trim_eol(b"abc"), b"abc");
        assert_eq!(trim_eol(b"\n"), b"");
    }
}
