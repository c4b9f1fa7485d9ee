use crate::speedtest::transfer::ByteSource;
use crate::speedtest::TestError;
use bytes::Bytes;
use rand::{Rng, SeedableRng};
use reqwest::Client;

const UPLOAD_URL: &str = "https://speed.cloudflare.com/__up";

/// Posts one fixed-size random payload per call. Byte-level progress
/// inside a single request is not observable, so the payload stays small
/// to keep the sampling granularity usable.
pub struct UploadSource {
    client: Client,
    payload: Bytes,
}

impl UploadSource {
    pub fn new(client: Client, chunk_bytes: usize) -> Self {
        let mut rng = rand::rngs::StdRng::from_entropy();
        let data: Vec<u8> = (0..chunk_bytes).map(|_| rng.gen()).collect();
        Self {
            client,
            payload: Bytes::from(data),
        }
    }
}

impl ByteSource for UploadSource {
    async fn next_bytes(&mut self) -> Result<u64, TestError> {
        self.client
            .post(UPLOAD_URL)
            .body(self.payload.clone())
            .send()
            .await?
            .error_for_status()?;
        Ok(self.payload.len() as u64)
    }
}
