//! Error type for database operations.

use crate::document::DocumentError;
use crate::format::FormatError;

/// Errors raised while building or modifying a database.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The document does not have the shape of a database.
    #[error("not a valid database: missing {path}")]
    MissingNode { path: &'static str },

    /// The stream format failed to read or write the container.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// A move would break the tree, e.g. a group into its own subtree.
    #[error("invalid hierarchy change: {0}")]
    Hierarchy(String),
}

impl From<DocumentError> for Error {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::Cycle => Error::Hierarchy(err.to_string()),
            DocumentError::Xml(_) => Error::Format(err.into()),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
