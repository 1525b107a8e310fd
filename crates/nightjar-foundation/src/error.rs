use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading or decoding an input recording.
///
/// These originate inside a preprocessor during `analyze()`. A file that
/// permanently fails to decode never gains a result; reconciliation records
/// it in the missing-files ledger instead of aborting.
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("unsupported audio format in {path}: {detail}")]
    UnsupportedFormat { path: PathBuf, detail: String },

    #[error("corrupt audio data in {path}: {detail}")]
    CorruptData { path: PathBuf, detail: String },

    #[error("read failed for {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AudioError {
    /// Classify an I/O error against the file it came from.
    pub fn from_io(path: PathBuf, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            AudioError::FileNotFound { path }
        } else {
            AudioError::Read { path, source }
        }
    }
}
