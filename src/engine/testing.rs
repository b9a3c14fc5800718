use crate::engine::config::QueueConfig;
use crate::engine::error::TransferError;
use crate::engine::manager::DownloadQueue;
use crate::engine::model::DownloadSnapshot;
use crate::plugins::fs::storage::FileStorage;
use crate::plugins::ids::UuidIds;
use crate::plugins::registry::{Collaborators, FetchResponse, Transport};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::io::StreamReader;

#[derive(Clone)]
enum Script {
    Full(Vec<u8>),
    /// Serves the bytes, then never yields again.
    Stall(Vec<u8>),
    /// Serves the first `after` bytes, then fails.
    Break(Vec<u8>, usize),
}

/// In-memory transport serving fixed bodies in fixed-size pieces.
pub(crate) struct ScriptedTransport {
    scripts: HashMap<String, Script>,
    piece: usize,
    delay: Option<Duration>,
    requests: Arc<Mutex<Vec<(String, u64)>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self { scripts: HashMap::new(), piece: 16 * 1024, delay: None, requests: Arc::default() }
    }

    pub fn piece(mut self, piece: usize) -> Self {
        self.piece = piece.max(1);
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn serve(mut self, url: &str, body: Vec<u8>) -> Self {
        self.scripts.insert(url.to_string(), Script::Full(body));
        self
    }

    pub fn serve_stalling(mut self, url: &str, body: Vec<u8>) -> Self {
        self.scripts.insert(url.to_string(), Script::Stall(body));
        self
    }

    pub fn serve_broken(mut self, url: &str, body: Vec<u8>, after: usize) -> Self {
        self.scripts.insert(url.to_string(), Script::Break(body, after));
        self
    }

    /// Every `(url, offset)` fetched so far.
    pub fn requests(&self) -> Arc<Mutex<Vec<(String, u64)>>> {
        self.requests.clone()
    }

    fn pieces(&self, data: &[u8]) -> BoxStream<'static, io::Result<Bytes>> {
        let chunks: Vec<io::Result<Bytes>> =
            data.chunks(self.piece).map(|c| Ok(Bytes::copy_from_slice(c))).collect();
        let delay = self.delay;
        stream::iter(chunks)
            .then(move |c| async move {
                if let Some(d) = delay {
                    tokio::time::sleep(d).await;
                }
                c
            })
            .boxed()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn fetch(&self, url: &str, offset: u64) -> Result<FetchResponse, TransferError> {
        self.requests.lock().unwrap().push((url.to_string(), offset));
        let script = self.scripts.get(url).cloned().ok_or(TransferError::Status(404))?;

        let from = |body: &[u8]| body.get(offset as usize..).unwrap_or_default().to_vec();
        let (length, stream) = match script {
            Script::Full(body) => {
                let rest = from(&body);
                (rest.len(), self.pieces(&rest))
            }
            Script::Stall(body) => {
                let rest = from(&body);
                (rest.len() + 1, self.pieces(&rest).chain(stream::pending()).boxed())
            }
            Script::Break(body, after) => {
                let rest = from(&body[..after.min(body.len())]);
                let broken = stream::once(async { Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")) });
                (body.len().saturating_sub(offset as usize), self.pieces(&rest).chain(broken).boxed())
            }
        };

        Ok(FetchResponse { content_length: Some(length as u64), body: Box::new(StreamReader::new(stream)) })
    }
}

pub(crate) fn content(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

pub(crate) fn queue_with(transport: ScriptedTransport, max_concurrent: usize) -> (DownloadQueue, tempfile::TempDir) {
    let collab = Collaborators {
        transport: Arc::new(transport),
        storage: Arc::new(FileStorage::new()),
        ids: Arc::new(UuidIds),
    };
    let dir = tempfile::tempdir().unwrap();
    (DownloadQueue::new(QueueConfig::with_max_concurrent(max_concurrent), collab), dir)
}

pub(crate) async fn wait_for<F>(q: &DownloadQueue, id: &str, done: F) -> DownloadSnapshot
where
    F: Fn(&DownloadSnapshot) -> bool,
{
    let poll = async {
        loop {
            if let Some(s) = q.get(id).await.filter(|s| done(s)) {
                return s;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    };
    match tokio::time::timeout(Duration::from_secs(10), poll).await {
        Ok(s) => s,
        Err(_) => panic!("item {id} never reached the expected state: {:?}", q.get(id).await),
    }
}
