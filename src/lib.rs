//! SignalFx telemetry capture for AWS Lambda functions.
//!
//! This crate wraps Lambda handlers so that every invocation is measured and
//! reported: a metric batch (invocations, cold starts, errors, duration) is
//! delivered to a SignalFx ingest endpoint before the response leaves the
//! process, and an OpenTelemetry span covers the handler call, optionally
//! parented under an inbound B3 trace context.
//!
//! # Features
//!
//! - **Two instrumentation surfaces**: a Tower middleware layer and a plain
//!   async wrapper function, sharing the same invocation lifecycle
//! - **Per-invocation metric batches**: counters and a duration gauge,
//!   dimensioned with the function's identity derived from the invoked ARN
//! - **Synchronous delivery**: the batch is sent before the invocation
//!   completes, so no telemetry is lost when the sandbox is frozen
//! - **B3 context propagation**: inbound `x-b3-*` headers parent the
//!   invocation span when enabled
//! - **AWS event support**: HTTP attributes and propagation headers extracted
//!   from API Gateway v1/v2 and ALB events
//! - **Custom metrics**: counter/gauge datapoint helpers and a response hook
//!   that merges handler-produced datapoints into the invocation batch
//!
//! # Quick start
//!
//! ```no_run
//! use lambda_sfx_lite::{init_telemetry, traced_handler, TelemetryConfig};
//! use lambda_runtime::{service_fn, Error, LambdaEvent};
//! use serde_json::Value;
//!
//! async fn handler(event: LambdaEvent<Value>) -> Result<Value, Error> {
//!     Ok(serde_json::json!({ "statusCode": 200 }))
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let telemetry = init_telemetry(TelemetryConfig::default());
//!
//!     lambda_runtime::run(service_fn(|event| {
//!         traced_handler("my-handler", event, telemetry.clone(), handler)
//!     }))
//!     .await
//! }
//! ```
//!
//! # Configuration
//!
//! Behavior is driven by environment variables, resolved once per process:
//!
//! - `SIGNALFX_AUTH_TOKEN`: ingest auth token, required for metric delivery
//! - `SIGNALFX_METRICS_ENABLED`: metric pipeline toggle (default: false)
//! - `SIGNALFX_TRACING_ENABLED`: trace pipeline toggle (default: true)
//! - `SIGNALFX_CTX_PROPAGATION_ENABLED`: B3 extraction toggle (default: false)
//! - `SIGNALFX_API_SCHEME` / `SIGNALFX_API_HOSTNAME` / `SIGNALFX_API_PORT`:
//!   ingest endpoint (default: `https://ingest.us0.signalfx.com:443`)
//! - `SIGNALFX_SEND_TIMEOUT`: batch send timeout in milliseconds (default: 2000)
//! - `SIGNALFX_LAMBDA_DEBUG`: debug logging plus a redacted environment dump
//!
//! Builder values passed to [`init_telemetry`] act as fallbacks when the
//! corresponding variable is unset. See the [`config`] module for the full
//! list.
//!
//! # Using the Tower layer
//!
//! ```no_run
//! use lambda_sfx_lite::{init_telemetry, SfxTelemetryLayer, TelemetryConfig};
//! use lambda_runtime::{Error, LambdaEvent, Runtime};
//! use tower::ServiceBuilder;
//! use aws_lambda_events::event::apigw::ApiGatewayV2httpRequest;
//!
//! async fn handler(
//!     event: LambdaEvent<ApiGatewayV2httpRequest>,
//! ) -> Result<serde_json::Value, Error> {
//!     Ok(serde_json::json!({ "statusCode": 200 }))
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let telemetry = init_telemetry(TelemetryConfig::default());
//!
//!     let service = ServiceBuilder::new()
//!         .layer(SfxTelemetryLayer::new(telemetry).with_name("api-handler"))
//!         .service_fn(handler);
//!
//!     Runtime::new(service).run().await
//! }
//! ```
//!
//! # Custom metrics
//!
//! ```no_run
//! use lambda_sfx_lite::{init_telemetry, metrics, SfxTelemetryLayer, TelemetryConfig};
//! use lambda_runtime::{Error, LambdaEvent, Runtime};
//! use tower::ServiceBuilder;
//!
//! async fn handler(event: LambdaEvent<serde_json::Value>) -> Result<serde_json::Value, Error> {
//!     Ok(serde_json::json!({ "statusCode": 200, "ordersProcessed": 3 }))
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let telemetry = init_telemetry(TelemetryConfig::default());
//!
//!     let layer = SfxTelemetryLayer::new(telemetry)
//!         .with_name("process-order")
//!         .with_metrics_fn(|response: &mut serde_json::Value| {
//!             let processed = response
//!                 .as_object_mut()
//!                 .and_then(|object| object.remove("ordersProcessed"))
//!                 .and_then(|v| v.as_i64())
//!                 .unwrap_or(0);
//!             vec![metrics::counter("orders.processed", processed)]
//!         });
//!
//!     let service = ServiceBuilder::new().layer(layer).service_fn(handler);
//!     Runtime::new(service).run().await
//! }
//! ```

pub mod config;
pub mod constants;
pub mod extractors;
pub mod handler;
pub mod layer;
pub mod logger;
pub mod metrics;
pub mod propagation;
pub mod proto;
pub mod reporter;
pub mod tags;
pub mod telemetry;
mod tracker;

pub use config::Config;
pub use extractors::{SpanAttributes, SpanAttributesExtractor};
pub use handler::traced_handler;
pub use layer::{InvocationFuture, SfxTelemetryLayer, SfxTelemetryService};
pub use propagation::B3Propagator;
pub use proto::{DataPoint, DataPointUploadMessage, Datum, Dimension, MetricType};
pub use reporter::{Reporter, SendError};
pub use tags::CommonTags;
pub use telemetry::{init_telemetry, Telemetry, TelemetryConfig, TelemetryConfigBuilder};

#[cfg(doctest)]
#[macro_use]
extern crate doc_comment;

#[cfg(doctest)]
use doc_comment::doctest;

#[cfg(doctest)]
doctest!("../README.md", readme);
