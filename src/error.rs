//! Error types.
//!
//! Only the template fetch boundary and definition/attachment bookkeeping can
//! fail. Prop, state and ref accessors return `Option` instead.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by a [`Fetcher`](crate::pipeline::Fetcher).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("request for {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("request for {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("no template registered at {url}")]
    NotFound { url: String },
}

/// Failure reported by a [`Document`](crate::dom::Document) implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("malformed markup at byte {offset}: {message}")]
    Malformed { offset: usize, message: String },
}

/// Why a template kind could not be made available.
///
/// Cloneable because every waiter of a failed fetch receives its own copy.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("fetching template `{kind}` failed: {source}")]
    Fetch {
        kind: String,
        #[source]
        source: FetchError,
    },

    #[error("template `{kind}` is empty")]
    Empty { kind: String },

    #[error("template `{kind}` could not be parsed: {source}")]
    Parse {
        kind: String,
        #[source]
        source: DocumentError,
    },

    #[error("could not schedule fetch for template `{kind}`: {message}")]
    Spawn { kind: String, message: String },
}

impl TemplateError {
    /// Template kind the error belongs to.
    pub fn kind(&self) -> &str {
        match self {
            Self::Fetch { kind, .. }
            | Self::Empty { kind }
            | Self::Parse { kind, .. }
            | Self::Spawn { kind, .. } => kind,
        }
    }
}

/// Top-level error for definition and attachment.
#[derive(Debug, Error)]
pub enum Error {
    #[error("a component is already defined for tag `{tag}`")]
    AlreadyDefined { tag: String },

    #[error("no component is defined for tag `{tag}`")]
    UndefinedTag { tag: String },

    #[error("node is not an element")]
    NotAnElement,
}
