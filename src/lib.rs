//! Link measurement engine: latency, jitter, download and upload throughput
//! over HTTP, with cooperative cancellation.

pub mod app;
pub mod settings;
pub mod speedtest;

pub use app::{run_speed_test, RunState, TestUpdate};
pub use settings::Settings;
pub use speedtest::{
    CancelFlag, HttpTransport, MeasureError, Measurement, Sample, SpeedTestEngine,
    SpeedTestResult, SpeedUpdate, TestPhase, Transport, TransportError,
};
