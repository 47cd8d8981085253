//! In-memory histogram of tick durations (fetch + diff + dispatch).

use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

use crate::error::{AppError, Result};

/// Shared tick duration stats. Ticks record, API reads.
/// Values stored in milliseconds.
pub struct TickStats {
    inner: Mutex<hdrhistogram::Histogram<u64>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TickPercentiles {
    pub samples: u64,
    pub p50_ms: Option<u64>,
    pub p95_ms: Option<u64>,
    pub p99_ms: Option<u64>,
    pub max_ms: Option<u64>,
}

impl TickStats {
    /// Tracks 1ms to 1h, 3 significant figures.
    pub fn new() -> Result<Self> {
        let histogram = hdrhistogram::Histogram::new_with_bounds(1, 3_600_000, 3)
            .map_err(|e| AppError::Config(format!("tick histogram: {e}")))?;
        Ok(Self {
            inner: Mutex::new(histogram),
        })
    }

    pub fn record(&self, d: Duration) {
        let ms = d.as_millis().clamp(1, 3_600_000) as u64;
        if let Ok(mut h) = self.inner.lock() {
            let _ = h.record(ms);
        }
    }

    pub fn percentiles(&self) -> TickPercentiles {
        let Ok(h) = self.inner.lock() else {
            return TickPercentiles { samples: 0, p50_ms: None, p95_ms: None, p99_ms: None, max_ms: None };
        };
        if h.len() == 0 {
            return TickPercentiles { samples: 0, p50_ms: None, p95_ms: None, p99_ms: None, max_ms: None };
        }
        TickPercentiles {
            samples: h.len(),
            p50_ms: Some(h.value_at_quantile(0.5)),
            p95_ms: Some(h.value_at_quantile(0.95)),
            p99_ms: Some(h.value_at_quantile(0.99)),
            max_ms: Some(h.max()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_then_recorded() {
        let stats = TickStats::new().unwrap();
        assert!(stats.percentiles().p50_ms.is_none());

        for ms in [10, 20, 30, 40, 1000] {
            stats.record(Duration::from_millis(ms));
        }
        stats.record(Duration::ZERO);
        let p = stats.percentiles();
        assert_eq!(p.samples, 6);
        assert!(p.p50_ms.unwrap() <= 30);
        assert!(p.max_ms.unwrap() >= 999);
    }
}
