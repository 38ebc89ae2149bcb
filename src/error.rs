use std::path::PathBuf;

use thiserror::Error;

/// The single error type shared by every module in this crate.
///
/// Each variant carries the context named in the error-handling design: a
/// package name, a URL, a path, a version string, or a raw status code.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid version string '{input}': {reason}")]
    Parse { input: String, reason: String },

    #[error("GET {url}{query} failed with status {status}: {body}")]
    Http { url: String, query: String, status: u16, body: String },

    #[error("http request to {url} failed: {source}")]
    HttpTransport { url: String, source: reqwest::Error },

    #[error("version '{version}' of package '{package}' was not found at the origin")]
    NotFound { package: String, version: String },

    #[error("checksum mismatch for '{package}' {path}: expected {expected}, got {actual}")]
    Integrity { package: String, path: PathBuf, expected: String, actual: String },

    #[error("signature verification failed for '{package}': {reason}")]
    Signature { package: String, reason: String },

    #[error("malformed descriptor for '{package}': {reason}")]
    Descriptor { package: String, reason: String },

    #[error("i/o error at {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    #[error("could not parse JSON at {path}: {source}")]
    Json { path: PathBuf, source: serde_json::Error },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Error::Json { path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
