//! Per-invocation metric collection.
//!
//! Every traced invocation accumulates a small batch of datapoints: an
//! invocation counter, a cold start counter on the first invocation of the
//! process, an error counter when the handler fails, and a duration gauge
//! measured from handler entry. The batch is finalized and handed to the
//! reporter when the invocation completes.
//!
//! # Custom metrics
//!
//! Handlers can contribute their own datapoints to the same batch through the
//! layer's metrics hook. The constructors here build the points; invocation
//! identity dimensions are filled in automatically before the batch is sent.
//!
//! ```
//! use lambda_sfx_lite::metrics::{counter, gauge};
//!
//! let processed = counter("orders.processed", 3);
//! let backlog = gauge("orders.backlog", 17.0);
//! ```

use crate::constants::metrics as names;
use crate::proto::{DataPoint, DataPointUploadMessage, Datum, MetricType};
use crate::tags::CommonTags;
use std::time::Instant;

/// Builds a counter datapoint.
pub fn counter(name: impl Into<String>, value: i64) -> DataPoint {
    DataPoint {
        metric: Some(name.into()),
        value: Some(Datum {
            int_value: Some(value),
            ..Datum::default()
        }),
        metric_type: Some(MetricType::Counter as i32),
        ..DataPoint::default()
    }
}

/// Builds a gauge datapoint.
pub fn gauge(name: impl Into<String>, value: f64) -> DataPoint {
    DataPoint {
        metric: Some(name.into()),
        value: Some(Datum {
            double_value: Some(value),
            ..Datum::default()
        }),
        metric_type: Some(MetricType::Gauge as i32),
        ..DataPoint::default()
    }
}

/// Metric batch for one invocation.
///
/// Construction records the invocation (and cold start) counters and starts
/// the duration clock; [`finish`](Self::finish) stops the clock and seals the
/// batch.
pub(crate) struct InvocationMetrics {
    started: Instant,
    common: CommonTags,
    points: Vec<DataPoint>,
}

impl InvocationMetrics {
    pub(crate) fn begin(common: CommonTags, cold_start: bool) -> Self {
        let mut metrics = Self {
            started: Instant::now(),
            common,
            points: Vec::new(),
        };
        metrics.add_tagged(counter(names::INVOCATIONS, 1));
        if cold_start {
            metrics.add_tagged(counter(names::COLD_STARTS, 1));
        }
        metrics
    }

    pub(crate) fn record_error(&mut self) {
        self.add_tagged(counter(names::ERRORS, 1));
    }

    /// Merges caller-produced datapoints into the batch.
    pub(crate) fn extend(&mut self, points: impl IntoIterator<Item = DataPoint>) {
        for point in points {
            self.add_tagged(point);
        }
    }

    /// Stops the duration clock and returns the complete batch.
    pub(crate) fn finish(self) -> DataPointUploadMessage {
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        let Self {
            common, mut points, ..
        } = self;

        let mut duration = gauge(names::DURATION, elapsed_ms);
        common.apply_to(&mut duration);
        points.push(duration);

        DataPointUploadMessage { datapoints: points }
    }

    fn add_tagged(&mut self, mut point: DataPoint) {
        self.common.apply_to(&mut point);
        self.points.push(point);
    }
}
