use std::fmt;
use std::io;

use crate::cancel::CancelCause;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Root classification of an [`Error`], seen through any stage/release wrapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Open,
    Io,
    Format,
    Cancelled,
    EmptyInput,
    WorkerPanicked,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("open {name}: {source}")]
    Open { name: String, source: io::Error },

    #[error("i/o on {name}: {source}")]
    Io { name: String, source: io::Error },

    #[error("malformed partition line {line} in {name}: {reason}")]
    Format { name: String, line: u64, reason: String },

    #[error("cancelled: {cause}")]
    Cancelled { cause: CancelCause },

    #[error("nothing to reduce")]
    EmptyInput,

    #[error("merge worker panicked: {0}")]
    WorkerPanicked(String),

    #[error("{stage}: {source}")]
    Stage {
        stage: String,
        #[source]
        source: Box<Error>,
    },

    /// One or more handle releases failed. `primary` is the error that was
    /// already in flight when the releases ran, if any.
    #[error("{}", DisplayRelease(.primary.as_deref(), .release))]
    Release {
        primary: Option<Box<Error>>,
        release: Vec<Error>,
    },
}

impl Error {
    pub fn open(name: impl Into<String>, source: io::Error) -> Self {
        Error::Open { name: name.into(), source }
    }

    pub fn io(name: impl Into<String>, source: io::Error) -> Self {
        Error::Io { name: name.into(), source }
    }

    pub fn format(name: impl Into<String>, line: u64, reason: impl Into<String>) -> Self {
        Error::Format { name: name.into(), line, reason: reason.into() }
    }

    /// Wraps `self` with the name of the stage that observed it.
    pub fn in_stage(self, stage: impl Into<String>) -> Self {
        Error::Stage { stage: stage.into(), source: Box::new(self) }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Open { .. } => ErrorKind::Open,
            Error::Io { .. } => ErrorKind::Io,
            Error::Format { .. } => ErrorKind::Format,
            Error::Cancelled { .. } => ErrorKind::Cancelled,
            Error::EmptyInput => ErrorKind::EmptyInput,
            Error::WorkerPanicked(_) => ErrorKind::WorkerPanicked,
            Error::Stage { source, .. } => source.kind(),
            Error::Release { primary: Some(p), .. } => p.kind(),
            Error::Release { primary: None, release } => {
                release.first().map(Error::kind).unwrap_or(ErrorKind::Io)
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }
}

struct DisplayRelease<'a>(Option<&'a Error>, &'a [Error]);

impl fmt::Display for DisplayRelease<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(primary) = self.0 {
            write!(f, "{primary}; ")?;
        }
        write!(f, "release failed: ")?;
        for (i, e) in self.1.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{e}")?;
        }
        Ok(())
    }
}

/// Joins the outcome of some work with the outcomes of releasing the handles
/// it used. A failed release never replaces the primary error; it is attached
/// to it, and it still surfaces when the work itself succeeded.
pub fn join_release<T>(result: Result<T>, releases: impl IntoIterator<Item = Result<()>>) -> Result<T> {
    let release: Vec<Error> = releases.into_iter().filter_map(|r| r.err()).collect();
    if release.is_empty() {
        return result;
    }
    Err(Error::Release { primary: result.err().map(Box::new), release })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn broken(name: &str) -> Error {
        Error::io(name, io::Error::new(io::ErrorKind::Other, "disk on fire"))
    }

    #[test]
    fn kind_sees_through_stage_wrapping() {
        let e = Error::EmptyInput.in_stage("reduce").in_stage("run");
        assert_eq!(e.kind(), ErrorKind::EmptyInput);
        assert_eq!(e.to_string(), "run: reduce: nothing to reduce");
    }

    #[test]
    fn release_failure_keeps_primary() {
        let primary: Result<()> = Err(Error::format("temp_0.tsv", 3, "missing tab"));
        let joined = join_release(primary, [Ok(()), Err(broken("temp_1.tsv"))]).unwrap_err();
        assert_eq!(joined.kind(), ErrorKind::Format);
        let text = joined.to_string();
        assert!(text.contains("missing tab"), "{text}");
        assert!(text.contains("temp_1.tsv"), "{text}");
    }

    #[test]
    fn release_failure_surfaces_after_success() {
        let joined = join_release(Ok(7), [Err(broken("out.tsv"))]).unwrap_err();
        assert_eq!(joined.kind(), ErrorKind::Io);
        assert!(joined.to_string().starts_with("release failed: "));
    }

    #[test]
    fn clean_release_passes_result_through() {
        assert_eq!(join_release(Ok(1), [Ok(()), Ok(())]).unwrap(), 1);
    }
}
