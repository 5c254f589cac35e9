//! Error taxonomy for the resolver and cache manager.
//!
//! Every variant is a distinct failure mode that the HTTP layer maps onto its
//! own status code, so callers can tell a bad link from a full disk.

use std::io;

use thiserror::Error;

use crate::content::{SUPPORTED_EXTENSIONS, SUPPORTED_MIME_TYPES};

pub type CacheResult<T> = std::result::Result<T, CacheError>;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("no URL was provided; please supply a Google Drive shareable link")]
    MissingUrl,

    #[error("could not extract a Google Drive file ID from {url:?}")]
    InvalidUrl { url: String },

    #[error("the file is not a supported video format (detected {detected})")]
    UnsupportedType { detected: String },

    #[error("could not download file from Google Drive (status code {status})")]
    DownloadFailed { status: u16 },

    #[error("file exceeds the {} MiB download limit", .limit_bytes / (1024 * 1024))]
    SizeExceeded { limit_bytes: u64 },

    #[error("network error: {0}")]
    Network(String),

    #[error("storage error: {context}: {source}")]
    Storage {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("video {filename} does not exist")]
    NotFound { filename: String },
}

impl CacheError {
    pub fn storage(context: impl Into<String>, source: io::Error) -> Self {
        Self::Storage {
            context: context.into(),
            source,
        }
    }

    /// Short title used as the `error` field of API responses.
    pub fn title(&self) -> &'static str {
        match self {
            Self::MissingUrl => "Missing URL parameter",
            Self::InvalidUrl { .. } => "Invalid Google Drive URL",
            Self::UnsupportedType { .. } => "Invalid file type",
            Self::DownloadFailed { .. } => "Download failed",
            Self::SizeExceeded { .. } => "File too large",
            Self::Network(_) => "Network error",
            Self::Storage { .. } => "Server error",
            Self::NotFound { .. } => "File not found",
        }
    }

    /// Remediation advice for failures the user can fix on the Drive side.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::DownloadFailed { status: 403 } => Some(
                "Access denied: make sure the file is shared with \"Anyone with the link\"",
            ),
            Self::DownloadFailed { .. } => {
                Some("Make sure the file is publicly accessible or has link sharing enabled")
            }
            _ => None,
        }
    }

    pub fn supported_types() -> Vec<&'static str> {
        SUPPORTED_MIME_TYPES.to_vec()
    }

    pub fn supported_extensions() -> Vec<&'static str> {
        SUPPORTED_EXTENSIONS.to_vec()
    }
}
