use crate::plugins::registry::{SizedFile, Storage};
use async_trait::async_trait;
use std::io;
use std::path::Path;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

#[derive(Debug, Default)]
pub struct FileStorage;

impl FileStorage {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn open_append(&self, path: &Path) -> io::Result<Box<dyn SizedFile>> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| io::Error::new(e.kind(), format!("open {}: {}", path.display(), e)))?;

        Ok(Box::new(AppendFile { file }))
    }
}

struct AppendFile {
    file: File,
}

#[async_trait]
impl SizedFile for AppendFile {
    async fn current_size(&mut self) -> io::Result<u64> {
        Ok(self.file.metadata().await?.len())
    }

    async fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.file.write_all(data).await?;
        Ok(data.len())
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.file.flush().await
    }
}
