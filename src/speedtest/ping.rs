use crate::speedtest::TestUpdate;
use reqwest::Client;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;

const PING_URL: &str = "https://speed.cloudflare.com/__down?bytes=0";

pub struct LatencyProbe {
    attempts: usize,
}

impl LatencyProbe {
    pub fn new(attempts: usize) -> Self {
        Self { attempts }
    }

    /// Runs the configured number of round trips and returns the rounded
    /// mean in milliseconds, or `None` when no attempt succeeded or the
    /// run was cancelled. Attempts go out one at a time so they do not
    /// contend with each other and skew the samples.
    pub async fn run(
        &self,
        client: &Client,
        token: &CancellationToken,
        tx: &mpsc::Sender<TestUpdate>,
    ) -> Option<u64> {
        let mut samples = Vec::with_capacity(self.attempts);

        for attempt in 0..self.attempts {
            let start = Instant::now();
            let sent = tokio::select! {
                biased;
                () = token.cancelled() => return None,
                result = client.get(PING_URL).send() => result,
            };
            match sent {
                Ok(_) => {
                    let ms = start.elapsed().as_secs_f64() * 1000.0;
                    samples.push(ms);
                    let _ = tx.send(TestUpdate::PingSample { ms }).await;
                }
                // a failed attempt loses its sample but not the probe
                Err(err) => warn!(attempt, %err, "ping attempt failed"),
            }
        }

        average_ms(&samples)
    }
}

/// Mean of the collected samples, rounded to whole milliseconds.
fn average_ms(samples: &[f64]) -> Option<u64> {
    if samples.is_empty() {
        return None;
    }
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    Some(mean.round() as u64)
}

#[cfg(test)]
mod tests {
    use super::average_ms;

    #[test]
    fn averages_and_rounds_to_whole_milliseconds() {
        // the failed fourth attempt contributed no sample
        assert_eq!(average_ms(&[20.0, 22.0, 19.0, 21.0]), Some(21));
    }

    #[test]
    fn rounds_to_nearest_rather_than_truncating() {
        assert_eq!(average_ms(&[20.0, 21.0]), Some(21));
        assert_eq!(average_ms(&[20.0, 20.4]), Some(20));
    }

    #[test]
    fn no_successful_samples_means_no_estimate() {
        assert_eq!(average_ms(&[]), None);
    }
}
