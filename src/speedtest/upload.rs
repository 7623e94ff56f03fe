use super::meter::{mbps, Sample};
use super::{CancelFlag, MeasureError, SpeedUpdate, Transport};
use async_stream::stream;
use futures::Stream;
use log::{debug, info, warn};
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tokio::time::Instant;

const PAYLOAD_SEED: u64 = 0x5eed_5eed;

/// Deterministic filler bytes; only the size matters to the measurement.
pub fn synthetic_payload(size: usize) -> Vec<u8> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(PAYLOAD_SEED);
    let mut data = vec![0u8; size];
    rng.fill(data.as_mut_slice());
    data
}

pub struct UploadTest<T: ?Sized> {
    transport: Arc<T>,
    url: String,
    upload_size: usize,
    cancel: CancelFlag,
}

impl<T: Transport + ?Sized + 'static> UploadTest<T> {
    pub fn new(transport: Arc<T>, url: impl Into<String>, upload_size: usize, cancel: CancelFlag) -> Self {
        Self {
            transport,
            url: url.into(),
            upload_size,
            cancel,
        }
    }

    /// POST the payload once and yield a single terminal item.
    pub fn run(self) -> impl Stream<Item = SpeedUpdate> + Send + 'static {
        let UploadTest {
            transport,
            url,
            upload_size,
            cancel,
        } = self;

        stream! {
            if cancel.is_cancelled() {
                debug!("Upload cancelled before start");
                yield SpeedUpdate::Cancelled;
                return;
            }

            let payload = synthetic_payload(upload_size);
            debug!("Starting upload of {} bytes to: {}", upload_size, url);

            let start = Instant::now();
            if let Err(e) = transport.post(&url, payload).await {
                warn!("Upload request failed: {}", e);
                yield SpeedUpdate::Failed(e.into());
                return;
            }
            let elapsed = start.elapsed();

            if cancel.is_cancelled() {
                debug!("Upload cancelled while in flight");
                yield SpeedUpdate::Cancelled;
                return;
            }
            if elapsed.is_zero() {
                warn!("Upload completed too fast to measure");
                yield SpeedUpdate::Failed(MeasureError::TooFast);
                return;
            }

            let sample = Sample {
                timestamp_ms: elapsed.as_millis() as u64,
                mbps: mbps(upload_size as u64, elapsed),
            };
            info!("Upload complete: {} bytes, {:.2} Mbps", upload_size, sample.mbps);
            yield SpeedUpdate::Complete(sample);
        }
    }
}
