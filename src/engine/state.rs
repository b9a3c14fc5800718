//! Item lifecycle.
//!
//! ```text
//! (new) --add--> Pending --dispatched--> Active --eof--> Completed
//!                  ^                       |  \--failure--> Error
//!                  |                       |
//!                  +------start------ Paused <--pause--+
//!
//! any status --cancel--> Canceled (permanent)
//! ```
//!
//! Start and Pause are guarded here. Cancel is accepted from every status.
//! Completed, Error and Canceled have no way back.

use crate::engine::error::QueueError;
use crate::engine::model::DownloadStatus;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Start,
    Pause,
    Cancel,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Start => "start",
            Self::Pause => "pause",
            Self::Cancel => "cancel",
        })
    }
}

impl DownloadStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Canceled)
    }

    pub fn allows(&self, op: Operation) -> bool {
        match op {
            Operation::Start => matches!(self, Self::Pending | Self::Paused),
            Operation::Pause => matches!(self, Self::Active),
            Operation::Cancel => true,
        }
    }
}

pub fn check(op: Operation, status: DownloadStatus) -> Result<(), QueueError> {
    if status.allows(op) {
        Ok(())
    } else {
        Err(QueueError::InvalidTransition { op, status })
    }
}
