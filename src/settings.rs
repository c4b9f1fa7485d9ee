use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Settings {
    pub phase_duration_ms: u64,
    pub report_interval_ms: u64,
    pub smoothing_window: usize,
    pub ping_attempts: usize,
    pub upload_chunk_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            phase_duration_ms: 10_000,
            report_interval_ms: 100,
            smoothing_window: 5,
            ping_attempts: 5,
            upload_chunk_bytes: 200 * 1024,
        }
    }
}

impl Settings {
    pub fn phase_duration(&self) -> Duration {
        Duration::from_millis(self.phase_duration_ms)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsField {
    PingAttempts,
    PhaseDuration,
    UploadChunk,
}

impl SettingsField {
    pub fn next(self) -> Self {
        match self {
            SettingsField::PingAttempts => SettingsField::PhaseDuration,
            SettingsField::PhaseDuration => SettingsField::UploadChunk,
            SettingsField::UploadChunk => SettingsField::PingAttempts,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            SettingsField::PingAttempts => SettingsField::UploadChunk,
            SettingsField::PhaseDuration => SettingsField::PingAttempts,
            SettingsField::UploadChunk => SettingsField::PhaseDuration,
        }
    }
}
