use crate::speedtest::{
    Measurement, SpeedTestEngine, SpeedTestResult, SpeedUpdate, TestPhase, Transport,
};
use futures::StreamExt;
use log::{info, warn};
use tokio::sync::mpsc;

const PING_DONE: f32 = 0.25;
const JITTER_DONE: f32 = 0.33;
const DOWNLOAD_RUNNING: f32 = 0.33 + 0.33 * 0.8;
const DOWNLOAD_DONE: f32 = 0.66;
const UPLOAD_RUNNING: f32 = 0.66 + 0.34 * 0.8;

#[derive(Debug, Clone, PartialEq)]
pub enum TestUpdate {
    Phase { phase: TestPhase, progress: f32 },
    PingComplete { ping_ms: f64 },
    JitterComplete { jitter_ms: f64 },
    DownloadProgress { speed_mbps: f64 },
    DownloadComplete { speed_mbps: f64 },
    UploadProgress { speed_mbps: f64 },
    UploadComplete { speed_mbps: f64 },
    PhaseFailed { phase: TestPhase, reason: String },
    Cancelled,
    Finished(SpeedTestResult),
}

/// Aggregated view of a run, fed by [`TestUpdate`]s.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunState {
    pub is_running: bool,
    pub phase: TestPhase,
    pub download_mbps: f64,
    pub upload_mbps: f64,
    pub ping_ms: f64,
    pub jitter_ms: f64,
    pub progress: f32,
    pub error: Option<String>,
}

impl RunState {
    pub fn apply(&mut self, update: &TestUpdate) {
        match update {
            TestUpdate::Phase { phase, progress } => {
                if *phase == TestPhase::Ping {
                    *self = RunState::default();
                }
                self.is_running = *phase != TestPhase::Complete;
                self.phase = *phase;
                self.progress = *progress;
            }
            TestUpdate::PingComplete { ping_ms } => {
                self.ping_ms = *ping_ms;
                self.progress = PING_DONE;
            }
            TestUpdate::JitterComplete { jitter_ms } => {
                self.jitter_ms = *jitter_ms;
                self.progress = JITTER_DONE;
            }
            TestUpdate::DownloadProgress { speed_mbps } => {
                self.download_mbps = *speed_mbps;
                self.progress = DOWNLOAD_RUNNING;
            }
            TestUpdate::DownloadComplete { speed_mbps } => {
                self.download_mbps = *speed_mbps;
                self.progress = DOWNLOAD_DONE;
            }
            TestUpdate::UploadProgress { speed_mbps } => {
                self.upload_mbps = *speed_mbps;
                self.progress = UPLOAD_RUNNING;
            }
            TestUpdate::UploadComplete { speed_mbps } => {
                self.upload_mbps = *speed_mbps;
            }
            TestUpdate::PhaseFailed { phase, reason } => {
                self.error = Some(format!("{:?} test failed: {}", phase, reason));
            }
            TestUpdate::Cancelled => {
                self.is_running = false;
                self.phase = TestPhase::Idle;
            }
            TestUpdate::Finished(result) => {
                self.download_mbps = result.download_mbps;
                self.upload_mbps = result.upload_mbps;
                self.ping_ms = result.ping_ms;
                self.jitter_ms = result.jitter_ms;
                self.phase = TestPhase::Complete;
                self.progress = 1.0;
                self.is_running = false;
            }
        }
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }
}

enum PhaseEnd {
    Value(f64),
    Cancelled,
}

async fn report_measurement(
    update_tx: &mpsc::Sender<TestUpdate>,
    phase: TestPhase,
    measurement: Measurement,
) -> PhaseEnd {
    match measurement {
        Measurement::Measured(value) => PhaseEnd::Value(value),
        Measurement::Cancelled => PhaseEnd::Cancelled,
        Measurement::Failed(e) => {
            warn!("{:?} phase failed: {}", phase, e);
            let _ = update_tx
                .send(TestUpdate::PhaseFailed {
                    phase,
                    reason: e.to_string(),
                })
                .await;
            PhaseEnd::Value(0.0)
        }
    }
}

async fn drain_speed<S>(
    update_tx: &mpsc::Sender<TestUpdate>,
    phase: TestPhase,
    updates: S,
    progress: fn(f64) -> TestUpdate,
) -> PhaseEnd
where
    S: futures::Stream<Item = SpeedUpdate>,
{
    futures::pin_mut!(updates);
    let mut last = 0.0;

    while let Some(update) = updates.next().await {
        match update {
            SpeedUpdate::Progress(sample) => {
                last = sample.mbps;
                let _ = update_tx.send(progress(sample.mbps)).await;
            }
            SpeedUpdate::Complete(sample) => return PhaseEnd::Value(sample.mbps),
            SpeedUpdate::Cancelled => return PhaseEnd::Cancelled,
            SpeedUpdate::Failed(e) => {
                warn!("{:?} phase failed: {}", phase, e);
                let _ = update_tx
                    .send(TestUpdate::PhaseFailed {
                        phase,
                        reason: e.to_string(),
                    })
                    .await;
                return PhaseEnd::Value(0.0);
            }
        }
    }
    PhaseEnd::Value(last)
}

macro_rules! phase_value {
    ($end:expr, $tx:expr) => {
        match $end {
            PhaseEnd::Value(value) => value,
            PhaseEnd::Cancelled => {
                info!("Speed test cancelled");
                let _ = $tx.send(TestUpdate::Cancelled).await;
                return None;
            }
        }
    };
}

/// Run ping, jitter, download and upload in order, reporting over `update_tx`.
///
/// Returns `None` when the run was cancelled. A failed phase is reported as
/// [`TestUpdate::PhaseFailed`] and counts as zero; the run carries on.
pub async fn run_speed_test<T: Transport + ?Sized + 'static>(
    engine: &SpeedTestEngine<T>,
    update_tx: mpsc::Sender<TestUpdate>,
) -> Option<SpeedTestResult> {
    engine.reset_cancellation();
    info!("Starting speed test");

    let _ = update_tx
        .send(TestUpdate::Phase {
            phase: TestPhase::Ping,
            progress: 0.0,
        })
        .await;
    let ping_ms = phase_value!(
        report_measurement(&update_tx, TestPhase::Ping, engine.measure_ping().await).await,
        update_tx
    );
    let _ = update_tx.send(TestUpdate::PingComplete { ping_ms }).await;

    let _ = update_tx
        .send(TestUpdate::Phase {
            phase: TestPhase::Jitter,
            progress: PING_DONE,
        })
        .await;
    let jitter_ms = phase_value!(
        report_measurement(&update_tx, TestPhase::Jitter, engine.measure_jitter().await).await,
        update_tx
    );
    let _ = update_tx.send(TestUpdate::JitterComplete { jitter_ms }).await;

    let _ = update_tx
        .send(TestUpdate::Phase {
            phase: TestPhase::Download,
            progress: JITTER_DONE,
        })
        .await;
    let download_mbps = phase_value!(
        drain_speed(
            &update_tx,
            TestPhase::Download,
            engine.measure_download_speed(),
            |speed_mbps| TestUpdate::DownloadProgress { speed_mbps },
        )
        .await,
        update_tx
    );
    let _ = update_tx
        .send(TestUpdate::DownloadComplete {
            speed_mbps: download_mbps,
        })
        .await;

    let _ = update_tx
        .send(TestUpdate::Phase {
            phase: TestPhase::Upload,
            progress: DOWNLOAD_DONE,
        })
        .await;
    let upload_mbps = phase_value!(
        drain_speed(
            &update_tx,
            TestPhase::Upload,
            engine.measure_upload_speed(),
            |speed_mbps| TestUpdate::UploadProgress { speed_mbps },
        )
        .await,
        update_tx
    );
    let _ = update_tx
        .send(TestUpdate::UploadComplete {
            speed_mbps: upload_mbps,
        })
        .await;

    let result = SpeedTestResult {
        download_mbps,
        upload_mbps,
        ping_ms,
        jitter_ms,
        timestamp: chrono::Utc::now(),
    };
    info!(
        "Speed test complete: ping={:.1}ms jitter={:.1}ms down={:.2}Mbps up={:.2}Mbps",
        ping_ms, jitter_ms, download_mbps, upload_mbps
    );
    let _ = update_tx.send(TestUpdate::Finished(result.clone())).await;
    Some(result)
}

/// Format speed for display (e.g., "125.5 Mbps" or "1.2 Gbps").
pub fn format_speed(mbps: f64) -> String {
    if mbps >= 1000.0 {
        format!("{:.1} Gbps", mbps / 1000.0)
    } else if mbps >= 100.0 {
        format!("{:.0} Mbps", mbps)
    } else if mbps >= 10.0 {
        format!("{:.1} Mbps", mbps)
    } else {
        format!("{:.2} Mbps", mbps)
    }
}
