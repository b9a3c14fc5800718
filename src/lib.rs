pub mod engine;
pub mod plugins;

pub use engine::config::QueueConfig;
pub use engine::error::{ErrorKind, ItemError, QueueError, TransferError};
pub use engine::events::QueueEvent;
pub use engine::manager::DownloadQueue;
pub use engine::model::{DownloadSnapshot, DownloadStatus, ItemId};
pub use plugins::registry::{Collaborators, DriverContext};
