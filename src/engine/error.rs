use crate::engine::model::{DownloadStatus, ItemId};
use crate::engine::state::Operation;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Errors returned synchronously by control operations. None of them mutate
/// the registry.
#[derive(thiserror::Error, Debug)]
pub enum QueueError {
    #[error("item not found: {0}")]
    NotFound(ItemId),

    #[error("cannot {op} download in status: {status}")]
    InvalidTransition { op: Operation, status: DownloadStatus },

    /// The item was registered but could not be dispatched.
    #[error("item {id} added but not started: {source}")]
    NotStarted {
        id: ItemId,
        #[source]
        source: Box<QueueError>,
    },

    #[error("download queue is shut down")]
    Closed,
}

/// Failures detected while an item is running. They end up on the item as an
/// [`ItemError`], never returned to a caller.
#[derive(thiserror::Error, Debug)]
pub enum TransferError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("http status error: {0}")]
    Status(u16),

    /// Resuming at `offset` but the server answered with the full body.
    #[error("server ignored range request at offset {offset}")]
    RangeIgnored { offset: u64 },

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl TransferError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Storage(_) => ErrorKind::Storage,
            _ => ErrorKind::Transport,
        }
    }
}

impl From<reqwest::Error> for TransferError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Transport,
    Storage,
}

/// Serializable error recorded on an item in `Error` status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemError {
    pub kind: ErrorKind,
    pub message: String,
}

impl fmt::Display for ItemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ErrorKind::Transport => "transport",
            ErrorKind::Storage => "storage",
        };
        write!(f, "{}: {}", kind, self.message)
    }
}

impl From<&TransferError> for ItemError {
    fn from(e: &TransferError) -> Self {
        Self { kind: e.kind(), message: e.to_string() }
    }
}
