//! Error types for conversion runs.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a conversion run.
///
/// Data-quality problems (dangling cross-references, unrenderable verse text)
/// are not errors; they are counted in [`crate::Diagnostics`].
#[derive(Error, Debug)]
pub enum Error {
    #[error("{source_name} source {path:?} could not be opened: {message}")]
    SourceUnavailable {
        source_name: &'static str,
        path: PathBuf,
        message: String,
    },

    #[error("{source_name} source has no `{table}` table")]
    MissingTable {
        source_name: &'static str,
        table: &'static str,
    },

    #[error("Malformed source: {0}")]
    MalformedSource(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Navigation does not match content fragments: {0}")]
    NavigationIntegrity(String),

    #[error("Packaging failed: {0}")]
    Packaging(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
}

impl Error {
    /// Pipeline stage the error belongs to, for user-facing messages.
    pub fn stage(&self) -> &'static str {
        match self {
            Error::SourceUnavailable { .. } | Error::MissingTable { .. } | Error::Database(_) => {
                "loading"
            }
            Error::MalformedSource(_) => "record model",
            Error::NavigationIntegrity(_) => "navigation",
            Error::Packaging(_) | Error::Io(_) | Error::Zip(_) | Error::Xml(_) => "packaging",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
