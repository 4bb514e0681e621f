//! Error kinds shared by every stage of the preview pipeline.
//!
//! Mirrors `ferrex_core::error::MediaError` in shape: one enum, one
//! `Result` alias, and enough context in each variant for a caller to map
//! it to an HTTP status without re-inspecting the source path.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MediaError>;

#[derive(Debug, Error)]
pub enum MediaError {
    /// The request itself is malformed: an unparseable page range, a
    /// width/height of zero, a body too large, a source that doesn't
    /// exist.
    #[error("bad input: {0}")]
    BadInput(String),

    /// A page range or page number outside what the source document
    /// actually contains.
    #[error("invalid page range: {0}")]
    InvalidPage(String),

    /// The input's extension has no registered backend.
    #[error("unsupported input type: {0}")]
    UnsupportedType(String),

    /// The requested output format isn't one the matched backend can
    /// produce.
    #[error("invalid output format {format} for backend {backend}")]
    InvalidFormat { backend: &'static str, format: String },

    /// A downstream collaborator (soffice, ghostscript, an upstream URL)
    /// failed, timed out, or refused the connection.
    #[error("transport error: {0}")]
    Transport(String),

    /// Anything else: I/O failures, decode failures, a corrupt store
    /// entry. Never shown verbatim to a remote caller.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MediaError {
    pub fn bad_input(msg: impl Into<String>) -> Self {
        Self::BadInput(msg.into())
    }

    pub fn invalid_page(msg: impl Into<String>) -> Self {
        Self::InvalidPage(msg.into())
    }

    pub fn unsupported_type(ext: impl Into<String>) -> Self {
        Self::UnsupportedType(ext.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<std::io::Error> for MediaError {
    fn from(err: std::io::Error) -> Self {
        MediaError::Internal(err.to_string())
    }
}

impl From<image::ImageError> for MediaError {
    fn from(err: image::ImageError) -> Self {
        MediaError::Internal(err.to_string())
    }
}

impl From<reqwest::Error> for MediaError {
    fn from(err: reqwest::Error) -> Self {
        MediaError::Transport(err.to_string())
    }
}

/// A path that didn't resolve the way the caller expected; carried inside
/// [`MediaError::BadInput`] messages rather than its own variant since it
/// never crosses a pipeline boundary on its own.
#[derive(Debug)]
pub struct BadPath(pub PathBuf);

impl std::fmt::Display for BadPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}
