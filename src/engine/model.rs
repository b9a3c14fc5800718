use crate::engine::error::ItemError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

pub type ItemId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    Pending,
    Active,
    Paused,
    Completed,
    Error,
    Canceled,
}

impl DownloadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Canceled => "canceled",
        }
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable record owned by the registry. Executors never hold one; they hold
/// the id and epoch of the dispatch they are running.
#[derive(Debug)]
pub(crate) struct DownloadItem {
    pub id: ItemId,
    pub url: String,
    pub file_path: PathBuf,
    pub status: DownloadStatus,
    pub progress: f64,
    pub bytes_read: u64,
    pub total_bytes: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_error: Option<ItemError>,
    /// Bumped on every Start; dispatches and executor updates carrying an
    /// older epoch are ignored.
    pub epoch: u64,
    pub cancel: Option<CancellationToken>,
    /// Held by an executor for the whole run.
    pub run_guard: Arc<Mutex<()>>,
}

impl DownloadItem {
    pub fn new(id: ItemId, url: String, file_path: PathBuf) -> Self {
        Self {
            id,
            url,
            file_path,
            status: DownloadStatus::Pending,
            progress: 0.0,
            bytes_read: 0,
            total_bytes: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            last_error: None,
            epoch: 0,
            cancel: None,
            run_guard: Arc::new(Mutex::new(())),
        }
    }

    /// Moves `bytes_read` forward (never back) and recomputes `progress`.
    pub fn set_bytes_read(&mut self, bytes: u64) {
        self.bytes_read = self.bytes_read.max(bytes);
        if let Some(total) = self.total_bytes {
            if self.bytes_read > total {
                self.total_bytes = Some(self.bytes_read);
            }
        }
        self.recompute_progress();
    }

    pub fn recompute_progress(&mut self) {
        self.progress = match self.total_bytes {
            Some(0) | None => 0.0,
            Some(total) => (self.bytes_read as f64 / total as f64 * 100.0).min(100.0),
        };
    }

    pub fn snapshot(&self) -> DownloadSnapshot {
        DownloadSnapshot {
            id: self.id.clone(),
            url: self.url.clone(),
            file_path: self.file_path.clone(),
            status: self.status,
            progress: self.progress,
            bytes_read: self.bytes_read,
            total_bytes: self.total_bytes,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            last_error: self.last_error.clone(),
        }
    }
}

/// Point-in-time copy of an item, as returned by `get_status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadSnapshot {
    pub id: ItemId,
    pub url: String,
    pub file_path: PathBuf,
    pub status: DownloadStatus,
    pub progress: f64,
    pub bytes_read: u64,
    pub total_bytes: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_error: Option<ItemError>,
}

impl DownloadSnapshot {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
