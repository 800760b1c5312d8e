//! Failures observed at the store boundary.
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Mutating operations, used to label partial-success failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Delete,
    CreateReference,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::CreateReference => "create_reference",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every store operation settles into either a value or one of these.
///
/// The error is also kept in the store's `last_error` slot, so it is
/// `Clone` and carries only owned text rather than source errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("network failure: {0}")]
    Network(String),
    #[error("request timed out after {0} ms")]
    Timeout(u64),
    #[error("server answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected response body: {0}")]
    Decode(String),
    #[error("request superseded by a newer fetch")]
    Superseded,
    #[error("page must be >= 1, got {0}")]
    InvalidPage(u32),
    #[error("{0} does not support sorting")]
    SortingUnsupported(&'static str),
    #[error("{resource} cannot be sorted by {column}")]
    UnknownSortColumn {
        resource: &'static str,
        column: String,
    },
    #[error("{0} is read-only")]
    ReadOnly(&'static str),
    #[error("invalid payload: {0}")]
    Payload(String),
    #[error("{operation} succeeded but refreshing failed, display may be stale: {source}")]
    StaleAfterMutation {
        operation: Operation,
        /// Body returned by the successful mutation, when it had one.
        response: Option<Value>,
        source: Box<StoreError>,
    },
}

impl StoreError {
    /// Flatten a transport error chain into owned text.
    pub fn network(err: &anyhow::Error) -> Self {
        StoreError::Network(format!("{err:#}"))
    }

    /// True for failures where the server may never have seen the request.
    pub fn is_network(&self) -> bool {
        matches!(self, StoreError::Network(_) | StoreError::Timeout(_))
    }

    /// True when a mutation reached the server but the follow-up read did not.
    pub fn is_stale(&self) -> bool {
        matches!(self, StoreError::StaleAfterMutation { .. })
    }

    /// Diagnostic text returned by the server on a rejected request.
    pub fn server_body(&self) -> Option<&str> {
        match self {
            StoreError::Status { body, .. } => Some(body),
            _ => None,
        }
    }
}
