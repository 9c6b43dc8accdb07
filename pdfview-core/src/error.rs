use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to open {path:?}: {reason}")]
    Open { path: PathBuf, reason: String },

    #[error("{path:?} is encrypted and the password was missing or wrong")]
    Auth { path: PathBuf },

    /// `index` is zero-based; messages show the one-based page number.
    #[error("page {} out of range (document has {} pages)", .index + 1, .page_count)]
    PageIndex { index: usize, page_count: usize },

    /// A page handle obtained before the last save was used.
    #[error("page handle for page {} is stale; the document must be reloaded", .index + 1)]
    StalePage { index: usize },

    #[error("failed to render page {page}: {reason}")]
    Render { page: usize, reason: String },

    #[error("annotation rejected: {0}")]
    Annotation(String),

    #[error("no annotation at position {index}")]
    AnnotationNotFound { index: usize },

    #[error("failed to save {path:?}: {reason}")]
    Save { path: PathBuf, reason: String },

    #[error("embedded file {name:?}: {reason}")]
    Attachment { name: String, reason: String },

    #[error("rotation delta {0} is not a multiple of 90 degrees")]
    InvalidRotation(i32),

    #[error("no document is loaded")]
    NoDocument,

    #[error("engine failure: {0}")]
    Engine(String),
}

impl Error {
    pub fn is_auth(&self) -> bool {
        matches!(self, Error::Auth { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_errors_use_one_based_numbers() {
        let stale = Error::StalePage { index: 0 };
        let render = Error::Render {
            page: 1,
            reason: stale.to_string(),
        };
        assert_eq!(
            render.to_string(),
            "failed to render page 1: page handle for page 1 is stale; the document must be reloaded"
        );
        let out_of_range = Error::PageIndex {
            index: 4,
            page_count: 3,
        };
        assert_eq!(out_of_range.to_string(), "page 5 out of range (document has 3 pages)");
    }
}
