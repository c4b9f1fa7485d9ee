use crate::speedtest::transfer::ByteSource;
use crate::speedtest::TestError;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::Client;

const DOWNLOAD_URL: &str = "https://speed.cloudflare.com/__down?bytes=50000000";

/// Streams large responses back to back, yielding one chunk of bytes per
/// call. When a response runs dry a new request is opened, so the phase
/// can outlast any single transfer.
pub struct DownloadSource {
    client: Client,
    stream: Option<BoxStream<'static, reqwest::Result<Bytes>>>,
}

impl DownloadSource {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            stream: None,
        }
    }
}

impl ByteSource for DownloadSource {
    async fn next_bytes(&mut self) -> Result<u64, TestError> {
        loop {
            if let Some(stream) = self.stream.as_mut() {
                match stream.next().await {
                    Some(chunk) => return Ok(chunk?.len() as u64),
                    None => self.stream = None,
                }
            } else {
                let response = self
                    .client
                    .get(DOWNLOAD_URL)
                    .send()
                    .await?
                    .error_for_status()?;
                self.stream = Some(response.bytes_stream().boxed());
            }
        }
    }
}
