use crate::engine::error::ItemError;
use crate::engine::model::{DownloadStatus, ItemId};
use std::path::PathBuf;

/// Advisory notifications. Lagging receivers lose events; `get_status` is the
/// authoritative view.
#[derive(Debug, Clone)]
pub enum QueueEvent {
    ItemAdded { item_id: ItemId, url: String, file_path: PathBuf },
    StatusChanged { item_id: ItemId, status: DownloadStatus },
    Progress { item_id: ItemId, bytes_read: u64, total_bytes: Option<u64> },
    Failed { item_id: ItemId, error: ItemError },
}
