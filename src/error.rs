use std::path::PathBuf;
use thiserror::Error;

/// Failure classes the scanning pipeline must handle differently.
///
/// `NoMatch` and a provider rate limit are *outcomes*, not errors; they never
/// appear here. Everything in this enum either aborts a single clip or, for
/// `Enumeration` and `Cleanup`, the whole run.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Network or file transfer failure. Aborts the affected clip only.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The download destination already holds a file. Signalled distinctly
    /// from a transport failure so callers can keep the existing bytes.
    #[error("media file already exists at {0}")]
    MediaExists(PathBuf),

    /// The fingerprint extractor tool reported a diagnostic failure.
    /// Terminal for the clip; the recognition service is never called.
    #[error("fingerprint tool failed: {0}")]
    FingerprintTool(String),

    /// The recognition service returned a response the client could not
    /// interpret (transport succeeded, payload did not).
    #[error("recognition service error {code}: {message}")]
    Recognition { code: i64, message: String },

    /// Clip enumeration failed. Aborts the entire run.
    #[error("clip enumeration failed: {0}")]
    Enumeration(String),

    /// Persistent record store failure.
    #[error("record store failure: {0}")]
    Store(String),

    /// Removing a temporary media file failed. Not expected; fatal to the run.
    #[error("cleanup failed for {path}")]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
