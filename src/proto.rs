//! Protobuf model of the SignalFx datapoint ingest format.
//!
//! These messages mirror the `com.signalfuse.metrics.protobuf` schema accepted
//! by the `/v2/datapoint` endpoint. The schema is small and frozen, so the
//! types are maintained by hand with `prost` derives rather than generated at
//! build time.
//!
//! Every field is optional on the wire; a datapoint without a timestamp is
//! assigned one by the ingest service on arrival.

/// Kind of a reported metric.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum MetricType {
    /// Instantaneous measurement, e.g. a duration.
    Gauge = 0,
    /// Count of occurrences within the reporting interval.
    Counter = 1,
    /// Enumerated state value.
    Enum = 2,
    /// Monotonic count since process start.
    CumulativeCounter = 3,
}

/// Value slot of a datapoint. Exactly one of the fields is expected to be set.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Datum {
    #[prost(string, optional, tag = "1")]
    pub str_value: Option<String>,
    #[prost(double, optional, tag = "2")]
    pub double_value: Option<f64>,
    #[prost(int64, optional, tag = "3")]
    pub int_value: Option<i64>,
}

/// A single key/value dimension attached to a datapoint.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Dimension {
    #[prost(string, optional, tag = "1")]
    pub key: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub value: Option<String>,
}

/// One metric observation.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DataPoint {
    #[prost(string, optional, tag = "1")]
    pub source: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub metric: Option<String>,
    /// Milliseconds since the epoch. Unset means "assigned at ingest".
    #[prost(int64, optional, tag = "3")]
    pub timestamp: Option<i64>,
    #[prost(message, optional, tag = "4")]
    pub value: Option<Datum>,
    #[prost(enumeration = "MetricType", optional, tag = "5")]
    pub metric_type: Option<i32>,
    #[prost(message, repeated, tag = "6")]
    pub dimensions: Vec<Dimension>,
}

/// Batch of datapoints posted to the ingest endpoint in one request.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DataPointUploadMessage {
    #[prost(message, repeated, tag = "1")]
    pub datapoints: Vec<DataPoint>,
}

impl Dimension {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            value: Some(value.into()),
        }
    }
}

impl DataPoint {
    /// Looks up a dimension value by key.
    pub fn dimension(&self, key: &str) -> Option<&str> {
        self.dimensions
            .iter()
            .find(|dim| dim.key.as_deref() == Some(key))
            .and_then(|dim| dim.value.as_deref())
    }
}
