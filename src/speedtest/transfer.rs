use crate::settings::Settings;
use crate::speedtest::{SpeedPoint, TestError, TestUpdate};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// One byte-moving step of a transfer. A download reads the next chunk of
/// a streamed response, an upload posts one fixed-size payload; either way
/// the call resolves with the number of bytes moved. Implementations open
/// fresh connections as needed so the sampler can run for a full phase.
pub trait ByteSource {
    async fn next_bytes(&mut self) -> Result<u64, TestError>;
}

/// Fixed-capacity moving average over the most recent speed samples.
pub struct SpeedWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl SpeedWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Pushes one instantaneous sample, evicting the oldest when full, and
    /// returns the mean of the window.
    pub fn push(&mut self, mbps: f64) -> f64 {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(mbps);
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Megabits per second for `bytes` moved over `interval`. Serves both the
/// per-interval instantaneous samples and the whole-phase aggregate.
pub fn mbps(bytes: u64, interval: Duration) -> f64 {
    (bytes as f64 * 8.0) / (interval.as_secs_f64() * 1_000_000.0)
}

pub fn progress_percent(elapsed: Duration, duration: Duration) -> f64 {
    if duration.is_zero() {
        return 100.0;
    }
    (elapsed.as_secs_f64() / duration.as_secs_f64() * 100.0).clamp(0.0, 100.0)
}

/// Published every reporting interval while a transfer runs.
#[derive(Debug, Clone)]
pub struct TransferProgress {
    pub current_mbps: f64,
    pub progress_percent: f64,
    pub point: SpeedPoint,
}

/// Drives `source` for the configured phase duration, reporting a smoothed
/// speed sample at least `report_interval` apart, and returns the overall
/// average Mbps.
///
/// The aggregate is total bytes over total elapsed time rather than an
/// average of the smoothed samples, so it reconciles exactly with the
/// bytes actually moved.
pub async fn measure_throughput<S: ByteSource>(
    mut source: S,
    token: &CancellationToken,
    settings: &Settings,
    tx: &mpsc::Sender<TestUpdate>,
    make_update: fn(TransferProgress) -> TestUpdate,
) -> Result<f64, TestError> {
    let duration = settings.phase_duration();
    let report_every = settings.report_interval();

    let start = Instant::now();
    let mut total_bytes: u64 = 0;
    let mut last_report = start;
    let mut last_bytes: u64 = 0;
    let mut window = SpeedWindow::new(settings.smoothing_window);

    while start.elapsed() < duration {
        // Cancellation drops the in-flight request, aborting it.
        let moved = tokio::select! {
            biased;
            () = token.cancelled() => return Err(TestError::Cancelled),
            moved = source.next_bytes() => moved?,
        };
        total_bytes += moved;

        let now = Instant::now();
        let since_report = now.duration_since(last_report);
        if since_report >= report_every {
            let instant = mbps(total_bytes - last_bytes, since_report);
            let smoothed = window.push(instant);
            let elapsed = now.duration_since(start);
            let point = SpeedPoint {
                // one decimal, the graph's x-axis resolution
                time_secs: (elapsed.as_secs_f64() * 10.0).round() / 10.0,
                mbps: smoothed,
            };
            let _ = tx
                .send(make_update(TransferProgress {
                    current_mbps: smoothed,
                    progress_percent: progress_percent(elapsed, duration),
                    point,
                }))
                .await;
            last_report = now;
            last_bytes = total_bytes;
        }
    }

    Ok(mbps(total_bytes, start.elapsed()))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SteadySource {
        chunk: u64,
        every: Duration,
    }

    impl ByteSource for SteadySource {
        async fn next_bytes(&mut self) -> Result<u64, TestError> {
            tokio::time::sleep(self.every).await;
            Ok(self.chunk)
        }
    }

    fn one_second_settings() -> Settings {
        Settings {
            phase_duration_ms: 1_000,
            ..Settings::default()
        }
    }

    fn progress_of(update: TestUpdate) -> TransferProgress {
        match update {
            TestUpdate::DownloadProgress(p) => p,
            _ => panic!("expected a download progress update"),
        }
    }

    #[test]
    fn instantaneous_speed_matches_bytes_over_interval() {
        // 10,000 bytes in 100 ms is 0.8 Mbps
        assert!((mbps(10_000, Duration::from_millis(100)) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn aggregate_for_five_upload_chunks_over_one_second() {
        assert!((mbps(5 * 204_800, Duration::from_secs(1)) - 8.192).abs() < 1e-9);
    }

    #[test]
    fn progress_is_clamped_to_the_phase() {
        let phase = Duration::from_secs(10);
        assert_eq!(progress_percent(Duration::from_secs(15), phase), 100.0);
        assert_eq!(progress_percent(Duration::ZERO, phase), 0.0);
        assert!((progress_percent(Duration::from_millis(3_400), phase) - 34.0).abs() < 1e-9);
    }

    #[test]
    fn zero_length_phase_counts_as_finished() {
        let progress = progress_percent(Duration::from_secs(1), Duration::ZERO);
        assert_eq!(progress, 100.0);
        assert!(!progress.is_nan());
    }

    #[test]
    fn window_keeps_only_the_most_recent_samples() {
        let mut window = SpeedWindow::new(5);
        for sample in [1.0, 2.0, 3.0, 4.0, 5.0, 6.0] {
            window.push(sample);
        }
        let smoothed = window.push(7.0);
        assert_eq!(window.len(), 5);
        // mean of 3..=7, the six earlier samples' head evicted
        assert!((smoothed - 5.0).abs() < 1e-9);
    }

    #[test]
    fn window_averages_a_partial_fill() {
        let mut window = SpeedWindow::new(5);
        assert!(window.is_empty());
        window.push(2.0);
        let smoothed = window.push(4.0);
        assert_eq!(window.len(), 2);
        assert!((smoothed - 3.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn steady_stream_yields_exact_aggregate_and_ordered_history() {
        let (tx, mut rx) = mpsc::channel(64);
        let token = CancellationToken::new();
        let source = SteadySource {
            chunk: 1_250,
            every: Duration::from_millis(10),
        };

        let final_mbps = measure_throughput(
            source,
            &token,
            &one_second_settings(),
            &tx,
            TestUpdate::DownloadProgress,
        )
        .await
        .unwrap();

        // 125,000 bytes over exactly one second
        assert!((final_mbps - 1.0).abs() < 1e-9);

        drop(tx);
        let mut reports = Vec::new();
        while let Some(update) = rx.recv().await {
            reports.push(progress_of(update));
        }
        assert!(!reports.is_empty());
        let times: Vec<f64> = reports.iter().map(|p| p.point.time_secs).collect();
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
        assert!(*times.last().unwrap() <= 1.0);
        assert!(reports
            .iter()
            .all(|p| (0.0..=100.0).contains(&p.progress_percent)));
        // steady 1,250 bytes per 10 ms smooths to 1.0 Mbps throughout
        assert!(reports.iter().all(|p| (p.current_mbps - 1.0).abs() < 1e-9));
    }

    #[tokio::test(start_paused = true)]
    async fn pre_cancelled_token_aborts_without_an_aggregate() {
        let (tx, mut rx) = mpsc::channel(64);
        let token = CancellationToken::new();
        token.cancel();
        let source = SteadySource {
            chunk: 1_250,
            every: Duration::from_millis(10),
        };

        let result = measure_throughput(
            source,
            &token,
            &one_second_settings(),
            &tx,
            TestUpdate::DownloadProgress,
        )
        .await;

        assert!(matches!(result, Err(TestError::Cancelled)));
        drop(tx);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_mid_phase_stops_the_transfer() {
        struct CancelAfter {
            remaining: u32,
            token: CancellationToken,
        }

        impl ByteSource for CancelAfter {
            async fn next_bytes(&mut self) -> Result<u64, TestError> {
                tokio::time::sleep(Duration::from_millis(10)).await;
                if self.remaining == 0 {
                    self.token.cancel();
                }
                self.remaining = self.remaining.saturating_sub(1);
                Ok(4_096)
            }
        }

        let (tx, _rx) = mpsc::channel(64);
        let token = CancellationToken::new();
        let source = CancelAfter {
            remaining: 12,
            token: token.clone(),
        };

        let result = measure_throughput(
            source,
            &token,
            &one_second_settings(),
            &tx,
            TestUpdate::DownloadProgress,
        )
        .await;

        assert!(matches!(result, Err(TestError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn transfer_failure_surfaces_immediately() {
        struct FailingSource;

        impl ByteSource for FailingSource {
            async fn next_bytes(&mut self) -> Result<u64, TestError> {
                tokio::time::sleep(Duration::from_millis(10)).await;
                // a malformed URL fails in the client before any I/O
                let err = reqwest::Client::new()
                    .get("ht!tp://unreachable")
                    .send()
                    .await
                    .unwrap_err();
                Err(TestError::Transfer(err))
            }
        }

        let (tx, _rx) = mpsc::channel(64);
        let token = CancellationToken::new();

        let result = measure_throughput(
            FailingSource,
            &token,
            &one_second_settings(),
            &tx,
            TestUpdate::DownloadProgress,
        )
        .await;

        assert!(matches!(result, Err(TestError::Transfer(_))));
    }
}
