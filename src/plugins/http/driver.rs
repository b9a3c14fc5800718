use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_RANGE, RANGE, USER_AGENT};
use reqwest::StatusCode;
use std::io;
use std::time::Duration;
use tokio_util::io::StreamReader;
use url::Url;

use crate::engine::error::TransferError;
use crate::plugins::registry::{DriverContext, FetchResponse, Transport};

pub struct HttpTransport {
    client: reqwest::Client,
    headers: HeaderMap,
}

impl HttpTransport {
    pub fn new(ctx: DriverContext) -> Result<Self, TransferError> {
        let mut builder = reqwest::Client::builder().redirect(reqwest::redirect::Policy::limited(10));
        if let Some(secs) = ctx.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }
        let client = builder.build()?;
        let headers = Self::build_headers(&ctx)?;
        Ok(Self { client, headers })
    }

    fn build_headers(ctx: &DriverContext) -> Result<HeaderMap, TransferError> {
        let invalid = |e: &dyn std::fmt::Display| TransferError::Transport(format!("invalid header: {}", e));

        let mut h = HeaderMap::new();
        h.insert(USER_AGENT, HeaderValue::from_str(&ctx.user_agent).map_err(|e| invalid(&e))?);
        for (k, v) in &ctx.headers {
            let name = HeaderName::from_bytes(k.as_bytes()).map_err(|e| invalid(&e))?;
            let value = HeaderValue::from_str(v).map_err(|e| invalid(&e))?;
            h.insert(name, value);
        }
        Ok(h)
    }

    /// Total size from `Content-Range: bytes */<total>` (416 replies).
    fn unsatisfied_range_total(resp: &reqwest::Response) -> Option<u64> {
        resp.headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().strip_prefix("bytes */"))
            .and_then(|s| s.parse::<u64>().ok())
    }

    fn into_fetch(resp: reqwest::Response) -> FetchResponse {
        let content_length = resp.content_length();
        let stream = resp
            .bytes_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e));
        let reader: StreamReader<_, Bytes> = StreamReader::new(Box::pin(stream));
        FetchResponse { content_length, body: Box::new(reader) }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch(&self, url: &str, offset: u64) -> Result<FetchResponse, TransferError> {
        let url = Url::parse(url).map_err(|e| TransferError::Transport(format!("invalid url {}: {}", url, e)))?;

        let mut req = self.client.get(url).headers(self.headers.clone());
        if offset > 0 {
            req = req.header(RANGE, format!("bytes={}-", offset));
        }
        let resp = req.send().await?;

        match resp.status() {
            StatusCode::PARTIAL_CONTENT => Ok(Self::into_fetch(resp)),

            StatusCode::OK if offset == 0 => Ok(Self::into_fetch(resp)),

            // Appending a full body to a partial file would duplicate its head.
            StatusCode::OK => Err(TransferError::RangeIgnored { offset }),

            StatusCode::RANGE_NOT_SATISFIABLE if Self::unsatisfied_range_total(&resp) == Some(offset) => {
                Ok(FetchResponse { content_length: Some(0), body: Box::new(tokio::io::empty()) })
            }

            s if s.is_success() => Ok(Self::into_fetch(resp)),

            s => Err(TransferError::Status(s.as_u16())),
        }
    }
}
