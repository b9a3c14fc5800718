use crate::engine::error::TransferError;
use crate::engine::model::ItemId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncRead;

pub type ContentStream = Box<dyn AsyncRead + Send + Unpin>;

pub struct FetchResponse {
    /// Length of `body` as announced by the remote, if it announced one.
    pub content_length: Option<u64>,
    pub body: ContentStream,
}

impl std::fmt::Debug for FetchResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchResponse")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Fetches the bytes of `url` starting at `offset`.
#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(&self, url: &str, offset: u64) -> Result<FetchResponse, TransferError>;
}

/// An open destination file. Writes always land at the end.
#[async_trait]
pub trait SizedFile: Send {
    async fn current_size(&mut self) -> io::Result<u64>;

    async fn write(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Makes everything written so far visible to a later `open_append`.
    async fn flush(&mut self) -> io::Result<()>;
}

#[async_trait]
pub trait Storage: Send + Sync {
    /// Opens `path` for appending, creating it if needed. Never truncates.
    async fn open_append(&self, path: &Path) -> io::Result<Box<dyn SizedFile>>;
}

pub trait IdSource: Send + Sync {
    fn new_id(&self) -> ItemId;
}

#[derive(Debug, Clone)]
pub struct DriverContext {
    pub user_agent: String,
    pub headers: HashMap<String, String>,
    pub connect_timeout_secs: Option<u64>,
}

impl Default for DriverContext {
    fn default() -> Self {
        Self {
            user_agent: "OrangeQueue/0.1".to_string(),
            headers: HashMap::new(),
            connect_timeout_secs: Some(30),
        }
    }
}

/// The capabilities a queue calls out to.
#[derive(Clone)]
pub struct Collaborators {
    pub transport: Arc<dyn Transport>,
    pub storage: Arc<dyn Storage>,
    pub ids: Arc<dyn IdSource>,
}

impl Collaborators {
    pub fn with_defaults(ctx: DriverContext) -> Result<Self, TransferError> {
        Ok(Self {
            transport: Arc::new(crate::plugins::http::driver::HttpTransport::new(ctx)?),
            storage: Arc::new(crate::plugins::fs::storage::FileStorage::new()),
            ids: Arc::new(crate::plugins::ids::UuidIds),
        })
    }
}
