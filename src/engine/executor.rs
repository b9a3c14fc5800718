use crate::engine::error::TransferError;
use crate::engine::manager::Shared;
use crate::engine::model::ItemId;
use crate::plugins::registry::SizedFile;
use std::io;
use std::path::PathBuf;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A claimed dispatch: everything an executor needs without touching the
/// registry.
#[derive(Debug)]
pub(crate) struct Run {
    pub id: ItemId,
    pub epoch: u64,
    pub url: String,
    pub file_path: PathBuf,
    pub token: CancellationToken,
}

enum Outcome {
    Completed,
    Stopped,
}

pub(crate) async fn execute(shared: &Shared, run: &Run) {
    match transfer(shared, run).await {
        Ok(Outcome::Completed) => shared.complete(run).await,
        Ok(Outcome::Stopped) => debug!(item = %run.id, "transfer stopped"),
        Err(e) => shared.fail(run, &e).await,
    }
}

async fn transfer(shared: &Shared, run: &Run) -> Result<Outcome, TransferError> {
    let mut file = shared.collab.storage.open_append(&run.file_path).await?;
    let offset = file.current_size().await?;
    debug!(item = %run.id, transport = shared.collab.transport.name(), offset, "fetching");

    let fetched = tokio::select! {
        biased;
        _ = run.token.cancelled() => return Ok(Outcome::Stopped),
        r = shared.collab.transport.fetch(&run.url, offset) => r?,
    };
    shared
        .begin_transfer(run, offset, fetched.content_length.map(|len| len + offset))
        .await;

    let mut body = fetched.body;
    let mut buf = vec![0u8; shared.config.read_buffer()];
    loop {
        // The file only ever ends on a chunk boundary, so stopping here
        // leaves a valid resume point.
        let n = tokio::select! {
            biased;
            _ = run.token.cancelled() => {
                file.flush().await?;
                return Ok(Outcome::Stopped);
            }
            r = body.read(&mut buf) => r.map_err(|e| TransferError::Transport(e.to_string()))?,
        };
        if n == 0 {
            file.flush().await?;
            return Ok(Outcome::Completed);
        }

        write_all(file.as_mut(), &buf[..n]).await?;
        shared.advance(run, n as u64).await;
    }
}

async fn write_all(file: &mut dyn SizedFile, mut data: &[u8]) -> Result<(), TransferError> {
    while !data.is_empty() {
        let n = file.write(data).await?;
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::WriteZero, "storage accepted no bytes").into());
        }
        data = &data[n..];
    }
    Ok(())
}
