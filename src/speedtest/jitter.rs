use super::ping::probe_latency;
use super::{population_std_dev, CancelFlag, MeasureError, Measurement, Transport};
use log::{debug, info, warn};

/// Standard deviation of `probes` sequential round trips to `url`.
///
/// A single successful probe reports `0.0`; none at all is a failure.
pub async fn measure_jitter<T: Transport + ?Sized>(
    transport: &T,
    url: &str,
    probes: usize,
    cancel: &CancelFlag,
) -> Measurement {
    let mut samples = Vec::with_capacity(probes);

    for i in 0..probes {
        if cancel.is_cancelled() {
            debug!("Jitter cancelled at probe #{}", i + 1);
            return Measurement::Cancelled;
        }
        match probe_latency(transport, url).await {
            Ok(ms) => {
                debug!("Jitter probe #{}: {:.2} ms", i + 1, ms);
                samples.push(ms);
            }
            Err(e) => warn!("Jitter probe #{} failed: {}", i + 1, e),
        }
    }

    if samples.is_empty() {
        warn!("Jitter failed: all {} probes failed", probes);
        return Measurement::Failed(MeasureError::NoSuccessfulProbes);
    }

    let jitter = population_std_dev(&samples).unwrap_or(0.0);
    info!("Jitter complete: {:.2} ms from {} samples", jitter, samples.len());
    Measurement::Measured(jitter)
}
