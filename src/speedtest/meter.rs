use super::MeasureError;
use std::time::Duration;
use tokio::time::Instant;

/// Instantaneous throughput at a point during a transfer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Milliseconds since the first byte was seen.
    pub timestamp_ms: u64,
    pub mbps: f64,
}

/// Decimal megabits per second.
pub fn mbps(bytes: u64, elapsed: Duration) -> f64 {
    (bytes as f64 * 8.0) / (elapsed.as_secs_f64() * 1_000_000.0)
}

/// Running byte counter that yields a sample at most once per interval.
#[derive(Debug)]
pub struct ThroughputMeter {
    interval: Duration,
    start: Option<Instant>,
    last_emit: Option<Instant>,
    total_bytes: u64,
}

impl ThroughputMeter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            start: None,
            last_emit: None,
            total_bytes: 0,
        }
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Account for `bytes` read at `now`.
    pub fn record(&mut self, bytes: usize, now: Instant) -> Option<Sample> {
        if bytes == 0 {
            return None;
        }
        let start = *self.start.get_or_insert(now);
        let last_emit = *self.last_emit.get_or_insert(now);
        self.total_bytes += bytes as u64;

        if now.duration_since(last_emit) < self.interval {
            return None;
        }
        let elapsed = now.duration_since(start);
        if elapsed.is_zero() {
            return None;
        }
        self.last_emit = Some(now);
        Some(Sample {
            timestamp_ms: elapsed.as_millis() as u64,
            mbps: mbps(self.total_bytes, elapsed),
        })
    }

    /// Rate over the whole transfer.
    pub fn finish(&self, now: Instant) -> Result<Sample, MeasureError> {
        let start = self.start.ok_or(MeasureError::EmptyBody)?;
        let elapsed = now.duration_since(start);
        if elapsed.is_zero() {
            return Err(MeasureError::TooFast);
        }
        Ok(Sample {
            timestamp_ms: elapsed.as_millis() as u64,
            mbps: mbps(self.total_bytes, elapsed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_millis(200);

    #[test]
    fn mbps_uses_decimal_megabits() {
        assert_eq!(mbps(1_000_000, Duration::from_secs(8)), 1.0);
        let upload = mbps(5_242_880, Duration::from_secs(2));
        assert!((upload - 20.97152).abs() < 1e-9);
    }

    #[test]
    fn emits_once_per_interval() {
        let t0 = Instant::now();
        let mut meter = ThroughputMeter::new(INTERVAL);

        assert!(meter.record(8192, t0).is_none());
        assert!(meter.record(8192, t0 + Duration::from_millis(100)).is_none());

        let sample = meter.record(8192, t0 + Duration::from_millis(200)).unwrap();
        assert_eq!(sample.timestamp_ms, 200);
        assert_eq!(sample.mbps, mbps(3 * 8192, Duration::from_millis(200)));

        assert!(meter.record(8192, t0 + Duration::from_millis(300)).is_none());
        let next = meter.record(8192, t0 + Duration::from_millis(450)).unwrap();
        assert_eq!(next.timestamp_ms, 450);
        assert_eq!(meter.total_bytes(), 5 * 8192);
    }

    #[test]
    fn clock_starts_at_first_byte() {
        let t0 = Instant::now();
        let mut meter = ThroughputMeter::new(INTERVAL);
        assert!(meter.record(0, t0).is_none());

        let first = t0 + Duration::from_secs(1);
        meter.record(1000, first);
        let sample = meter.finish(first + Duration::from_secs(1)).unwrap();
        assert_eq!(sample.timestamp_ms, 1000);
        assert_eq!(sample.mbps, 0.008);
    }

    #[test]
    fn finish_without_bytes_is_empty_body() {
        let meter = ThroughputMeter::new(INTERVAL);
        assert!(matches!(
            meter.finish(Instant::now()),
            Err(MeasureError::EmptyBody)
        ));
    }

    #[test]
    fn finish_in_zero_time_is_too_fast() {
        let t0 = Instant::now();
        let mut meter = ThroughputMeter::new(INTERVAL);
        meter.record(4096, t0);
        assert!(matches!(meter.finish(t0), Err(MeasureError::TooFast)));
    }
}
