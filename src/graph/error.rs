use thiserror::Error;

/// Validation failures of topology mutations.
/// A failed operation never leaves a partial mutation behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    #[error("invalid identifier '{0}': only A-Za-z0-9_- are allowed")]
    InvalidIdentifier(String),

    #[error("identifier '{0}' already exists")]
    IdentifierCollision(String),

    #[error("cannot connect node '{0}' to itself")]
    SelfLoop(String),

    #[error("node not found: {0}")]
    UnknownNode(String),

    #[error("link not found: {0}")]
    UnknownLink(String),

    #[error("node '{0}' is not a host")]
    NotAHost(String),

    #[error("link endpoint '{0}' does not reference an existing node")]
    UnknownEndpoint(String),

    #[error("malformed topology document: {0}")]
    MalformedDocument(String),
}

pub type TopologyResult<T> = Result<T, TopologyError>;
