pub mod download;
pub mod ping;
pub mod transfer;
pub mod upload;

use crate::settings::Settings;
use download::DownloadSource;
use ping::LatencyProbe;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};
use transfer::{measure_throughput, TransferProgress};
use upload::UploadSource;

#[derive(Debug, Error)]
pub enum TestError {
    #[error("test cancelled")]
    Cancelled,
    #[error("transfer failed: {0}")]
    Transfer(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TestPhase {
    #[default]
    Idle,
    Ping,
    Download,
    Upload,
    Complete,
}

/// One smoothed-speed observation, the unit of the graph history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedPoint {
    pub time_secs: f64,
    pub mbps: f64,
}

#[derive(Debug, Clone, Default)]
pub struct SpeedTestResult {
    pub ping_ms: Option<u64>,
    pub download_mbps: Option<f64>,
    pub upload_mbps: Option<f64>,
}

pub enum TestUpdate {
    PingSample { ms: f64 },
    PingComplete { avg_ms: Option<u64> },
    DownloadProgress(TransferProgress),
    DownloadComplete { speed_mbps: f64 },
    UploadProgress(TransferProgress),
    UploadComplete { speed_mbps: f64 },
    Failed { message: String },
}

/// Everything the UI reads: the current phase, the live smoothed speed and
/// progress of the active transfer, the graph history for the active
/// phase, and the per-phase results collected so far. Mutated only through
/// `begin_run`, `apply` and `reset`.
#[derive(Debug, Default)]
pub struct TestState {
    pub phase: TestPhase,
    pub current_mbps: f64,
    pub progress_percent: f64,
    pub history: Vec<SpeedPoint>,
    pub ping_samples: Vec<f64>,
    pub result: SpeedTestResult,
    pub error: Option<String>,
}

impl TestState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears every field left over from the previous run and enters the
    /// ping phase.
    pub fn begin_run(&mut self) {
        *self = Self {
            phase: TestPhase::Ping,
            ..Self::default()
        };
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn apply(&mut self, update: TestUpdate) {
        match update {
            TestUpdate::PingSample { ms } => {
                self.ping_samples.push(ms);
            }
            TestUpdate::PingComplete { avg_ms } => {
                self.result.ping_ms = avg_ms;
                self.enter_transfer(TestPhase::Download);
            }
            TestUpdate::DownloadProgress(p) | TestUpdate::UploadProgress(p) => {
                self.current_mbps = p.current_mbps;
                self.progress_percent = p.progress_percent;
                self.history.push(p.point);
            }
            TestUpdate::DownloadComplete { speed_mbps } => {
                self.result.download_mbps = Some(speed_mbps);
                self.enter_transfer(TestPhase::Upload);
            }
            TestUpdate::UploadComplete { speed_mbps } => {
                self.result.upload_mbps = Some(speed_mbps);
                self.current_mbps = speed_mbps;
                self.progress_percent = 100.0;
                self.phase = TestPhase::Complete;
            }
            TestUpdate::Failed { message } => {
                // a failed run leaves no partial results behind
                self.reset();
                self.error = Some(message);
            }
        }
    }

    // The graph history covers the active phase only, so it starts over
    // with each transfer.
    fn enter_transfer(&mut self, phase: TestPhase) {
        self.phase = phase;
        self.current_mbps = 0.0;
        self.progress_percent = 0.0;
        self.history.clear();
    }
}

/// Runs the three phases in order, publishing updates as they happen. A
/// cancelled run stops quietly; a transfer failure aborts the rest of the
/// run and is reported through `TestUpdate::Failed`.
pub async fn run_speed_test(
    update_tx: mpsc::Sender<TestUpdate>,
    token: CancellationToken,
    settings: Settings,
) -> Result<(), TestError> {
    match run_phases(&update_tx, &token, &settings).await {
        Ok(()) | Err(TestError::Cancelled) => Ok(()),
        Err(err) => {
            error!(%err, "speed test failed");
            let _ = update_tx
                .send(TestUpdate::Failed {
                    message: err.to_string(),
                })
                .await;
            Err(err)
        }
    }
}

async fn run_phases(
    tx: &mpsc::Sender<TestUpdate>,
    token: &CancellationToken,
    settings: &Settings,
) -> Result<(), TestError> {
    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()?;

    let avg_ms = LatencyProbe::new(settings.ping_attempts)
        .run(&client, token, tx)
        .await;
    if token.is_cancelled() {
        return Err(TestError::Cancelled);
    }
    debug!(?avg_ms, "latency phase done");
    let _ = tx.send(TestUpdate::PingComplete { avg_ms }).await;

    let download = measure_throughput(
        DownloadSource::new(client.clone()),
        token,
        settings,
        tx,
        TestUpdate::DownloadProgress,
    )
    .await?;
    debug!(mbps = download, "download phase done");
    let _ = tx
        .send(TestUpdate::DownloadComplete {
            speed_mbps: download,
        })
        .await;

    let upload = measure_throughput(
        UploadSource::new(client, settings.upload_chunk_bytes),
        token,
        settings,
        tx,
        TestUpdate::UploadProgress,
    )
    .await?;
    debug!(mbps = upload, "upload phase done");
    let _ = tx
        .send(TestUpdate::UploadComplete { speed_mbps: upload })
        .await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn download_progress(time_secs: f64, mbps: f64) -> TestUpdate {
        TestUpdate::DownloadProgress(TransferProgress {
            current_mbps: mbps,
            progress_percent: 50.0,
            point: SpeedPoint { time_secs, mbps },
        })
    }

    #[test]
    fn phases_advance_in_order() {
        let mut state = TestState::new();
        state.begin_run();
        assert_eq!(state.phase, TestPhase::Ping);

        state.apply(TestUpdate::PingSample { ms: 21.0 });
        state.apply(TestUpdate::PingComplete { avg_ms: Some(21) });
        assert_eq!(state.phase, TestPhase::Download);
        assert_eq!(state.result.ping_ms, Some(21));

        state.apply(download_progress(0.1, 42.0));
        assert_eq!(state.history.len(), 1);
        state.apply(TestUpdate::DownloadComplete { speed_mbps: 95.5 });
        assert_eq!(state.phase, TestPhase::Upload);
        assert_eq!(state.result.download_mbps, Some(95.5));
        // the graph starts over for the upload phase
        assert!(state.history.is_empty());

        state.apply(TestUpdate::UploadComplete { speed_mbps: 20.0 });
        assert_eq!(state.phase, TestPhase::Complete);
        assert_eq!(state.result.upload_mbps, Some(20.0));
        assert_eq!(state.progress_percent, 100.0);
    }

    #[test]
    fn absent_latency_still_moves_on_to_download() {
        let mut state = TestState::new();
        state.begin_run();
        state.apply(TestUpdate::PingComplete { avg_ms: None });
        assert_eq!(state.phase, TestPhase::Download);
        assert!(state.result.ping_ms.is_none());
    }

    #[test]
    fn failed_run_returns_to_idle_with_nothing_recorded() {
        let mut state = TestState::new();
        state.begin_run();
        state.apply(TestUpdate::PingComplete { avg_ms: Some(18) });
        state.apply(download_progress(0.3, 10.0));
        state.apply(TestUpdate::Failed {
            message: "connection reset".into(),
        });

        assert_eq!(state.phase, TestPhase::Idle);
        assert!(state.result.ping_ms.is_none());
        assert!(state.history.is_empty());
        assert_eq!(state.error.as_deref(), Some("connection reset"));
    }

    #[test]
    fn reset_clears_everything_mid_phase() {
        let mut state = TestState::new();
        state.begin_run();
        state.apply(TestUpdate::PingComplete { avg_ms: None });
        state.apply(download_progress(0.1, 5.0));
        state.reset();

        assert_eq!(state.phase, TestPhase::Idle);
        assert!(state.history.is_empty());
        assert_eq!(state.current_mbps, 0.0);
        assert!(state.result.download_mbps.is_none());
    }

    #[test]
    fn a_new_run_observes_nothing_from_the_previous_one() {
        let mut state = TestState::new();
        state.begin_run();
        state.apply(TestUpdate::PingComplete { avg_ms: Some(12) });
        state.apply(download_progress(0.2, 7.0));
        state.apply(TestUpdate::DownloadComplete { speed_mbps: 88.0 });
        state.apply(TestUpdate::UploadComplete { speed_mbps: 17.0 });
        assert_eq!(state.phase, TestPhase::Complete);

        state.begin_run();
        assert_eq!(state.phase, TestPhase::Ping);
        assert!(state.history.is_empty());
        assert!(state.ping_samples.is_empty());
        assert!(state.result.ping_ms.is_none());
        assert!(state.result.download_mbps.is_none());
        assert!(state.result.upload_mbps.is_none());
    }
}
