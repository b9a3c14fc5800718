use crate::engine::config::QueueConfig;
use crate::engine::error::{ItemError, QueueError, TransferError};
use crate::engine::events::QueueEvent;
use crate::engine::executor::Run;
use crate::engine::model::{DownloadItem, DownloadSnapshot, DownloadStatus, ItemId};
use crate::engine::registry::Registry;
use crate::engine::state::{self, Operation};
use crate::engine::worker::{self, Dispatch};
use crate::plugins::registry::{Collaborators, DriverContext};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// State shared between the control surface and the worker pool.
pub(crate) struct Shared {
    registry: RwLock<Registry>,
    dispatch_tx: mpsc::Sender<Dispatch>,
    pub(crate) shutdown: CancellationToken,
    pub(crate) collab: Collaborators,
    pub(crate) config: QueueConfig,
    event_tx: broadcast::Sender<QueueEvent>,
}

/// Bounded pool of resumable downloads.
///
/// Every control operation is serialized on one registry lock. `start` hands
/// the item to a bounded dispatch channel after releasing that lock, so it
/// waits for a free slot without blocking other operations.
#[derive(Clone)]
pub struct DownloadQueue {
    shared: Arc<Shared>,
    workers: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl DownloadQueue {
    /// Spawns the worker pool; must be called inside a tokio runtime.
    pub fn new(config: QueueConfig, collab: Collaborators) -> Self {
        let (dispatch_tx, dispatch_rx) = mpsc::channel(config.channel_capacity());
        let (event_tx, _) = broadcast::channel(config.broadcast_capacity());

        let shared = Arc::new(Shared {
            registry: RwLock::new(Registry::default()),
            dispatch_tx,
            shutdown: CancellationToken::new(),
            collab,
            config,
            event_tx,
        });
        let workers = worker::spawn_pool(shared.clone(), dispatch_rx);
        info!(workers = workers.len(), "download queue started");

        Self { shared, workers: Arc::new(Mutex::new(workers)) }
    }

    pub fn with_defaults(config: QueueConfig, ctx: DriverContext) -> Result<Self, TransferError> {
        Ok(Self::new(config, Collaborators::with_defaults(ctx)?))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.shared.event_tx.subscribe()
    }

    /// Registers a new item and starts it. If starting fails the item stays
    /// registered and the error names it.
    pub async fn add(
        &self,
        url: impl Into<String>,
        file_path: impl Into<PathBuf>,
    ) -> Result<DownloadSnapshot, QueueError> {
        let (url, file_path) = (url.into(), file_path.into());
        let id = {
            let mut reg = self.shared.registry.write().await;
            let id = loop {
                let id = self.shared.collab.ids.new_id();
                if !reg.contains(&id) {
                    break id;
                }
                warn!(item = %id, "id source repeated an id, drawing another");
            };
            reg.push(DownloadItem::new(id.clone(), url.clone(), file_path.clone()));
            id
        };
        info!(item = %id, %url, path = %file_path.display(), "item added");
        self.shared.emit(QueueEvent::ItemAdded { item_id: id.clone(), url, file_path });

        if let Err(e) = self.start(&id).await {
            return Err(QueueError::NotStarted { id, source: Box::new(e) });
        }
        let snapshot = self.get(&id).await;
        snapshot.ok_or(QueueError::NotFound(id))
    }

    /// Re-arms a Pending or Paused item and queues it for a worker. Waits
    /// while the dispatch channel is full.
    pub async fn start(&self, id: &str) -> Result<(), QueueError> {
        if self.shared.shutdown.is_cancelled() {
            return Err(QueueError::Closed);
        }

        let dispatch = {
            let mut reg = self.shared.registry.write().await;
            let item = reg.find_mut(id)?;
            state::check(Operation::Start, item.status)?;

            if let Some(old) = item.cancel.take() {
                old.cancel();
            }
            item.cancel = Some(self.shared.shutdown.child_token());
            item.epoch += 1;
            item.status = DownloadStatus::Pending;
            Dispatch { id: item.id.clone(), epoch: item.epoch }
        };
        self.shared.emit_status(id, DownloadStatus::Pending);
        debug!(item = %id, epoch = dispatch.epoch, "queued for dispatch");

        let epoch = dispatch.epoch;
        if self.shared.dispatch_tx.send(dispatch).await.is_err() {
            self.shared.park(id, epoch).await;
            return Err(QueueError::Closed);
        }
        Ok(())
    }

    /// Requests an Active item to stop. Returns before the transfer has
    /// actually stopped.
    pub async fn pause(&self, id: &str) -> Result<(), QueueError> {
        {
            let mut reg = self.shared.registry.write().await;
            let item = reg.find_mut(id)?;
            state::check(Operation::Pause, item.status)?;
            if let Some(token) = &item.cancel {
                token.cancel();
            }
            item.status = DownloadStatus::Paused;
        }
        info!(item = %id, "paused");
        self.shared.emit_status(id, DownloadStatus::Paused);
        Ok(())
    }

    /// Cancels from any status, including terminal ones. Repeating it is a
    /// no-op.
    pub async fn cancel(&self, id: &str) -> Result<(), QueueError> {
        let previous = {
            let mut reg = self.shared.registry.write().await;
            let item = reg.find_mut(id)?;
            if let Some(token) = &item.cancel {
                token.cancel();
            }
            std::mem::replace(&mut item.status, DownloadStatus::Canceled)
        };
        if previous != DownloadStatus::Canceled {
            info!(item = %id, from = %previous, "canceled");
            self.shared.emit_status(id, DownloadStatus::Canceled);
        }
        Ok(())
    }

    /// Copies of every item in insertion order.
    pub async fn get_status(&self) -> Vec<DownloadSnapshot> {
        self.shared.registry.read().await.snapshot()
    }

    pub async fn get(&self, id: &str) -> Option<DownloadSnapshot> {
        self.shared.registry.read().await.get(id).map(DownloadItem::snapshot)
    }

    /// Stops every transfer, parks Pending and Active items as Paused and
    /// waits for the workers to exit. Later starts fail with `Closed`.
    pub async fn shutdown(&self) {
        self.shared.shutdown.cancel();

        let parked: Vec<ItemId> = {
            let mut reg = self.shared.registry.write().await;
            reg.iter_mut()
                .filter(|item| matches!(item.status, DownloadStatus::Pending | DownloadStatus::Active))
                .map(|item| {
                    item.status = DownloadStatus::Paused;
                    item.id.clone()
                })
                .collect()
        };
        for id in &parked {
            self.shared.emit_status(id, DownloadStatus::Paused);
        }

        let handles = std::mem::take(&mut *self.workers.lock().await);
        for h in handles {
            if let Err(e) = h.await {
                warn!(error = %e, "worker ended abnormally");
            }
        }
        info!(parked = parked.len(), "download queue shut down");
    }
}

// Mutation helpers used by workers and executors. Updates carrying a stale
// epoch come from a superseded run and are dropped.
impl Shared {
    fn emit(&self, event: QueueEvent) {
        let _ = self.event_tx.send(event);
    }

    fn emit_status(&self, id: &str, status: DownloadStatus) {
        self.emit(QueueEvent::StatusChanged { item_id: id.to_string(), status });
    }

    /// Undoes a Start whose dispatch could not be sent.
    async fn park(&self, id: &str, epoch: u64) {
        let mut reg = self.registry.write().await;
        if let Some(item) = reg.get_mut(id) {
            if item.epoch == epoch && item.status == DownloadStatus::Pending {
                item.status = DownloadStatus::Paused;
            }
        }
    }

    pub(crate) async fn run_guard(&self, id: &str) -> Option<Arc<Mutex<()>>> {
        self.registry.read().await.get(id).map(|item| item.run_guard.clone())
    }

    /// Turns a dispatch into a run if it is still current: same epoch, still
    /// Pending and not cancelled. Marks the item Active.
    pub(crate) async fn claim(&self, dispatch: &Dispatch) -> Option<Run> {
        let run = {
            let mut reg = self.registry.write().await;
            let item = reg.get_mut(&dispatch.id)?;
            let token = item.cancel.clone()?;
            if item.epoch != dispatch.epoch || item.status != DownloadStatus::Pending || token.is_cancelled() {
                return None;
            }
            item.status = DownloadStatus::Active;
            item.started_at.get_or_insert_with(Utc::now);
            Run {
                id: item.id.clone(),
                epoch: item.epoch,
                url: item.url.clone(),
                file_path: item.file_path.clone(),
                token,
            }
        };
        self.emit_status(&run.id, DownloadStatus::Active);
        Some(run)
    }

    pub(crate) async fn begin_transfer(&self, run: &Run, offset: u64, total: Option<u64>) {
        let progress = {
            let mut reg = self.registry.write().await;
            let Some(item) = reg.get_mut(&run.id).filter(|item| item.epoch == run.epoch) else {
                return;
            };
            item.total_bytes = total;
            item.bytes_read = offset;
            item.recompute_progress();
            (item.bytes_read, item.total_bytes)
        };
        debug!(item = %run.id, offset, total = ?total, "transfer begun");
        self.emit_progress(&run.id, progress);
    }

    pub(crate) async fn advance(&self, run: &Run, n: u64) {
        let progress = {
            let mut reg = self.registry.write().await;
            let Some(item) = reg.get_mut(&run.id).filter(|item| item.epoch == run.epoch) else {
                return;
            };
            let next = item.bytes_read + n;
            item.set_bytes_read(next);
            (item.bytes_read, item.total_bytes)
        };
        self.emit_progress(&run.id, progress);
    }

    pub(crate) async fn complete(&self, run: &Run) {
        {
            let mut reg = self.registry.write().await;
            let Some(item) = reg.get_mut(&run.id).filter(|item| Self::owns(item, run)) else {
                return;
            };
            item.status = DownloadStatus::Completed;
            item.completed_at = Some(Utc::now());
            item.total_bytes = Some(item.total_bytes.unwrap_or(item.bytes_read));
            item.progress = 100.0;
        }
        info!(item = %run.id, "completed");
        self.emit_status(&run.id, DownloadStatus::Completed);
    }

    pub(crate) async fn fail(&self, run: &Run, err: &TransferError) {
        let recorded = ItemError::from(err);
        {
            let mut reg = self.registry.write().await;
            let Some(item) = reg.get_mut(&run.id).filter(|item| Self::owns(item, run)) else {
                debug!(item = %run.id, error = %err, "error after stop ignored");
                return;
            };
            item.status = DownloadStatus::Error;
            item.last_error = Some(recorded.clone());
        }
        warn!(item = %run.id, error = %err, "transfer failed");
        self.emit(QueueEvent::Failed { item_id: run.id.clone(), error: recorded });
        self.emit_status(&run.id, DownloadStatus::Error);
    }

    fn owns(item: &DownloadItem, run: &Run) -> bool {
        item.epoch == run.epoch && item.status == DownloadStatus::Active
    }

    fn emit_progress(&self, id: &str, (bytes_read, total_bytes): (u64, Option<u64>)) {
        self.emit(QueueEvent::Progress { item_id: id.to_string(), bytes_read, total_bytes });
    }
}
