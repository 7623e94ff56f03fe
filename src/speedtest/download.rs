use super::meter::ThroughputMeter;
use super::{CancelFlag, MeasureError, SpeedUpdate, Transport};
use async_stream::stream;
use futures::{Stream, TryStreamExt};
use log::{debug, info, warn};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::time::Instant;
use tokio_util::io::StreamReader;

pub struct DownloadTest<T: ?Sized> {
    transport: Arc<T>,
    url: String,
    chunk_size: usize,
    sample_interval: Duration,
    cancel: CancelFlag,
}

impl<T: Transport + ?Sized + 'static> DownloadTest<T> {
    pub fn new(
        transport: Arc<T>,
        url: impl Into<String>,
        chunk_size: usize,
        sample_interval: Duration,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            transport,
            url: url.into(),
            chunk_size,
            sample_interval,
            cancel,
        }
    }

    /// Stream the test payload, yielding a rate sample every interval and one terminal item.
    pub fn run(self) -> impl Stream<Item = SpeedUpdate> + Send + 'static {
        let DownloadTest {
            transport,
            url,
            chunk_size,
            sample_interval,
            cancel,
        } = self;

        stream! {
            if cancel.is_cancelled() {
                debug!("Download cancelled before start");
                yield SpeedUpdate::Cancelled;
                return;
            }

            debug!("Starting download from: {}", url);
            let body = match transport.get_stream(&url).await {
                Ok(body) => body,
                Err(e) => {
                    warn!("Download request failed: {}", e);
                    yield SpeedUpdate::Failed(e.into());
                    return;
                }
            };

            let mut reader = StreamReader::new(body.map_err(|e| io::Error::new(io::ErrorKind::Other, e)));
            let mut buffer = vec![0u8; chunk_size];
            let mut meter = ThroughputMeter::new(sample_interval);

            loop {
                if cancel.is_cancelled() {
                    debug!("Download cancelled after {} bytes", meter.total_bytes());
                    yield SpeedUpdate::Cancelled;
                    return;
                }
                match reader.read(&mut buffer).await {
                    Ok(0) => break,
                    Ok(n) => {
                        if let Some(sample) = meter.record(n, Instant::now()) {
                            debug!("Download progress: {} bytes, {:.2} Mbps", meter.total_bytes(), sample.mbps);
                            yield SpeedUpdate::Progress(sample);
                        }
                    }
                    Err(e) => {
                        warn!("Download stream error: {}", e);
                        yield SpeedUpdate::Failed(MeasureError::Stream(e));
                        return;
                    }
                }
            }

            match meter.finish(Instant::now()) {
                Ok(sample) => {
                    info!("Download complete: {} bytes, {:.2} Mbps", meter.total_bytes(), sample.mbps);
                    yield SpeedUpdate::Complete(sample);
                }
                Err(e) => {
                    warn!("Download produced no measurement: {}", e);
                    yield SpeedUpdate::Failed(e);
                }
            }
        }
    }
}
