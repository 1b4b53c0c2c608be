//! Error types surfaced by the ECS core.

use std::io;
use thiserror::Error;

/// Errors returned by registry, world and snapshot operations.
///
/// A failed call leaves the world exactly as it was, with one exception:
/// [`World::deserialize`](crate::World::deserialize) clears the target
/// before reading and cannot roll back a mid-stream failure.
#[derive(Debug, Error)]
pub enum EcsError {
    #[error("{what} not found")]
    NotFound { what: String },

    #[error("invalid archive: {0}")]
    InvalidFormat(String),

    #[error("archive version {found} is not supported (reader is {supported})")]
    UnsupportedVersion { found: String, supported: String },

    #[error("invalid usage: {0}")]
    InvalidUsage(String),

    #[error("component kind '{name}' is already registered")]
    Duplicated { name: String },

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error(transparent)]
    Io(io::Error),
}

/// Fieldless tag for matching on the category of an [`EcsError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InvalidFormat,
    UnsupportedVersion,
    InvalidUsage,
    Duplicated,
    InvariantViolation,
    Io,
}

impl EcsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EcsError::NotFound { .. } => ErrorKind::NotFound,
            EcsError::InvalidFormat(_) => ErrorKind::InvalidFormat,
            EcsError::UnsupportedVersion { .. } => ErrorKind::UnsupportedVersion,
            EcsError::InvalidUsage(_) => ErrorKind::InvalidUsage,
            EcsError::Duplicated { .. } => ErrorKind::Duplicated,
            EcsError::InvariantViolation(_) => ErrorKind::InvariantViolation,
            EcsError::Io(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        EcsError::NotFound { what: what.into() }
    }

    pub(crate) fn usage(msg: impl Into<String>) -> Self {
        EcsError::InvalidUsage(msg.into())
    }

    pub(crate) fn format(msg: impl Into<String>) -> Self {
        EcsError::InvalidFormat(msg.into())
    }
}

impl From<io::Error> for EcsError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            EcsError::InvalidFormat(format!("truncated stream ({err})"))
        } else {
            EcsError::Io(err)
        }
    }
}

pub type EcsResult<T> = Result<T, EcsError>;
