use crate::engine::executor;
use crate::engine::manager::Shared;
use crate::engine::model::ItemId;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;

/// One hand-off through the dispatch channel.
#[derive(Debug, Clone)]
pub(crate) struct Dispatch {
    pub id: ItemId,
    pub epoch: u64,
}

pub(crate) fn spawn_pool(shared: Arc<Shared>, rx: mpsc::Receiver<Dispatch>) -> Vec<JoinHandle<()>> {
    let rx = Arc::new(Mutex::new(rx));
    (0..shared.config.workers())
        .map(|n| tokio::spawn(run_worker(n, shared.clone(), rx.clone())))
        .collect()
}

async fn run_worker(n: usize, shared: Arc<Shared>, rx: Arc<Mutex<mpsc::Receiver<Dispatch>>>) {
    loop {
        let next = {
            let mut rx = rx.lock().await;
            tokio::select! {
                biased;
                _ = shared.shutdown.cancelled() => None,
                d = rx.recv() => d,
            }
        };
        let Some(dispatch) = next else { break };

        let Some(guard) = shared.run_guard(&dispatch.id).await else { continue };
        // Waits for a paused run of the same item to finish its last chunk.
        let _running = guard.lock().await;

        match shared.claim(&dispatch).await {
            Some(run) => {
                debug!(worker = n, item = %run.id, epoch = run.epoch, "dispatched");
                executor::execute(&shared, &run).await;
            }
            None => debug!(worker = n, item = %dispatch.id, epoch = dispatch.epoch, "stale dispatch skipped"),
        }
    }
    debug!(worker = n, "worker stopped");
}
