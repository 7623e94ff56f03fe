use super::{mean, CancelFlag, MeasureError, Measurement, Transport, TransportError};
use log::{debug, info, warn};
use tokio::time::Instant;

/// Time one HEAD round trip, in milliseconds.
pub(crate) async fn probe_latency<T: Transport + ?Sized>(
    transport: &T,
    url: &str,
) -> Result<f64, TransportError> {
    let start = Instant::now();
    transport.head(url).await?;
    Ok(start.elapsed().as_nanos() as f64 / 1_000_000.0)
}

/// Mean round-trip time over `urls`, skipping endpoints that fail.
pub async fn measure_ping<T: Transport + ?Sized>(
    transport: &T,
    urls: &[String],
    cancel: &CancelFlag,
) -> Measurement {
    let mut samples = Vec::with_capacity(urls.len());

    for url in urls {
        if cancel.is_cancelled() {
            debug!("Ping cancelled before probing {}", url);
            return Measurement::Cancelled;
        }
        match probe_latency(transport, url).await {
            Ok(ms) => {
                debug!("Ping to {}: {:.2} ms", url, ms);
                samples.push(ms);
            }
            Err(e) => warn!("Ping to {} failed: {}", url, e),
        }
    }

    match mean(&samples) {
        Some(avg) => {
            info!("Ping complete: {:.2} ms from {} endpoints", avg, samples.len());
            Measurement::Measured(avg)
        }
        None => {
            warn!("Ping failed: no endpoint answered");
            Measurement::Failed(MeasureError::NoSuccessfulProbes)
        }
    }
}
