//! Per-invocation telemetry lifecycle.
//!
//! A [`TelemetryTracker`] is created when an invocation starts and consumed
//! when it completes. Construction opens the invocation span and the metric
//! batch; completion seals the batch, hands it to the reporter, ends the span
//! and flushes the tracer provider. When both pipelines are disabled the
//! tracker is inert and the invocation runs untouched, including the cold
//! start flag.
//!
//! Telemetry failures are logged and swallowed: the handler's outcome is
//! never altered by a reporting problem.

use crate::config::Config;
use crate::constants::span_tags;
use crate::extractors::SpanAttributes;
use crate::logger::Logger;
use crate::metrics::InvocationMetrics;
use crate::propagation;
use crate::proto::DataPoint;
use crate::reporter::{Reporter, SendError};
use crate::tags::CommonTags;
use lambda_runtime::Context;
use opentelemetry::global::{self, BoxedSpan, BoxedTracer};
use opentelemetry::trace::{Span, SpanKind, Status, Tracer, TracerProvider as _};
use opentelemetry::{Context as OtelContext, KeyValue};
use opentelemetry_sdk::trace::SdkTracerProvider;
use serde::Serialize;
use std::error::Error as StdError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

static LOGGER: Logger = Logger::const_new("tracker");

/// Flipped by the first invocation that has telemetry enabled.
static IS_COLD_START: AtomicBool = AtomicBool::new(true);

/// Telemetry state of one invocation.
pub struct TelemetryTracker {
    span: Option<BoxedSpan>,
    metrics: Option<InvocationMetrics>,
    reporter: Option<Arc<Reporter>>,
    provider: Option<Arc<SdkTracerProvider>>,
}

impl TelemetryTracker {
    /// Opens the span and metric batch for an invocation.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn begin(
        config: &Config,
        reporter: Option<Arc<Reporter>>,
        provider: Option<Arc<SdkTracerProvider>>,
        context: &Context,
        operation_name: Option<&str>,
        attrs: &SpanAttributes,
        extra_tags: &[(String, String)],
    ) -> Self {
        if !config.telemetry_enabled() {
            return Self {
                span: None,
                metrics: None,
                reporter: None,
                provider: None,
            };
        }

        let cold_start = IS_COLD_START.swap(false, Ordering::Relaxed);
        let common = CommonTags::derive(context);

        let metrics = config
            .metrics_enabled
            .then(|| InvocationMetrics::begin(common.clone(), cold_start));

        let span = config.tracing_enabled.then(|| {
            start_span(
                config,
                provider.as_deref(),
                context,
                operation_name,
                attrs,
                extra_tags,
                &common,
                cold_start,
            )
        });

        Self {
            span,
            metrics,
            reporter,
            provider,
        }
    }

    /// Records a handler failure: error counter plus span error tags.
    ///
    /// The error itself is returned to the runtime unchanged by the caller.
    pub(crate) fn record_error(&mut self, error: &dyn StdError) {
        if let Some(metrics) = self.metrics.as_mut() {
            metrics.record_error();
        }
        if let Some(span) = self.span.as_mut() {
            let message = error.to_string();
            span.record_error(error);
            span.set_attribute(KeyValue::new(span_tags::ERROR, true));
            span.set_attribute(KeyValue::new(span_tags::ERROR_KIND, error_kind(error)));
            span.set_attribute(KeyValue::new(span_tags::ERROR_MESSAGE, message.clone()));
            let chain = error_chain(error);
            if !chain.is_empty() {
                span.set_attribute(KeyValue::new(span_tags::ERROR_STACK, chain));
            }
            span.set_status(Status::error(message));
        }
    }

    /// Records the HTTP status of a successfully returned response.
    ///
    /// A non-2xx status counts as an application failure: the error counter is
    /// incremented and the response is logged, without changing control flow.
    pub(crate) fn observe_response(&mut self, status_code: i64, body: Option<&str>) {
        if let Some(span) = self.span.as_mut() {
            span.set_attribute(KeyValue::new(span_tags::HTTP_STATUS_CODE, status_code));
            if status_code >= 500 {
                span.set_status(Status::error(format!("HTTP {} response", status_code)));
            } else {
                span.set_status(Status::Ok);
            }
        }

        if !(200..300).contains(&status_code) {
            if let Some(metrics) = self.metrics.as_mut() {
                metrics.record_error();
            }
            LOGGER.error(format!(
                "error response from handler. Http status code: {}. Response body: {}",
                status_code,
                body.unwrap_or("")
            ));
        }
    }

    /// True when at least one pipeline is collecting for this invocation.
    pub(crate) fn is_active(&self) -> bool {
        self.span.is_some() || self.metrics.is_some()
    }

    /// Inspects a serialized handler response for an HTTP status code.
    ///
    /// Responses that do not serialize to an object with a `statusCode` field
    /// are left unobserved.
    pub(crate) fn observe_serialized<R: Serialize>(&mut self, response: &R) {
        if !self.is_active() {
            return;
        }
        if let Ok(value) = serde_json::to_value(response) {
            if let Some(status_code) = value.get("statusCode").and_then(|v| v.as_i64()) {
                let body = value.get("body").and_then(|v| v.as_str());
                self.observe_response(status_code, body);
            }
        }
    }

    /// Merges caller-produced datapoints into the invocation batch.
    pub(crate) fn add_custom_metrics(&mut self, points: Vec<DataPoint>) {
        if points.is_empty() {
            return;
        }
        match self.metrics.as_mut() {
            Some(metrics) => metrics.extend(points),
            None => LOGGER.debug(format!(
                "dropping {} custom datapoints: metrics pipeline is disabled",
                points.len()
            )),
        }
    }

    /// Completes the invocation: seals and sends the metric batch, then ends
    /// the span and flushes the tracer provider.
    ///
    /// The duration gauge is finalized before the batch leaves the process, so
    /// it never includes delivery latency.
    pub(crate) async fn finish(self) {
        let Self {
            span,
            metrics,
            reporter,
            provider,
        } = self;

        if let Some(metrics) = metrics {
            let batch = metrics.finish();
            match reporter.as_deref() {
                Some(reporter) => match reporter.send(&batch).await {
                    Ok(()) => {}
                    Err(error) if error.is_invalid_token() => {
                        LOGGER.error("API token for sending metrics to SignalFx is invalid");
                    }
                    Err(SendError::Rejected { status, body }) => {
                        LOGGER.error(format!(
                            "Failed to send metrics: status {}, response body: {}",
                            status, body
                        ));
                    }
                    Err(error) => {
                        LOGGER.error(format!("Failed to send metrics: {}", error));
                    }
                },
                None => LOGGER.debug("metrics collected but no reporter is configured"),
            }
        }

        if let Some(mut span) = span {
            span.end();
        }

        if let Some(provider) = provider {
            if let Err(error) = provider.force_flush() {
                LOGGER.warn(format!("error flushing spans: {}", error));
            }
        }
    }
}

/// Builds the invocation span on the supplied provider, falling back to the
/// globally registered tracer when no provider handle is held.
#[allow(clippy::too_many_arguments)]
fn start_span(
    config: &Config,
    provider: Option<&SdkTracerProvider>,
    context: &Context,
    operation_name: Option<&str>,
    attrs: &SpanAttributes,
    extra_tags: &[(String, String)],
    common: &CommonTags,
    cold_start: bool,
) -> BoxedSpan {
    let parent_context = if config.context_propagation_enabled {
        attrs
            .carrier
            .as_ref()
            .and_then(propagation::extract_parent_context)
    } else {
        None
    };
    let parent_context = parent_context.unwrap_or_else(OtelContext::new);

    let span_name = attrs
        .span_name
        .clone()
        .or_else(|| operation_name.map(str::to_string))
        .unwrap_or_else(|| context.env_config.function_name.clone());

    let mut attributes = vec![
        KeyValue::new(span_tags::COMPONENT, span_tags::COMPONENT_VALUE),
        KeyValue::new(span_tags::AWS_REQUEST_ID, context.request_id.clone()),
    ];
    for (key, value) in common.iter() {
        attributes.push(KeyValue::new(key.to_string(), value.to_string()));
    }
    if cold_start {
        attributes.push(KeyValue::new(span_tags::COLD_START, true));
    }
    for (key, value) in &attrs.attributes {
        attributes.push(KeyValue::new(key.clone(), value.clone()));
    }
    for (key, value) in extra_tags {
        attributes.push(KeyValue::new(key.clone(), value.clone()));
    }

    let tracer = match provider {
        Some(provider) => BoxedTracer::new(Box::new(provider.tracer(span_tags::TRACER_NAME))),
        None => global::tracer(span_tags::TRACER_NAME),
    };
    tracer
        .span_builder(span_name)
        .with_kind(SpanKind::Server)
        .with_attributes(attributes)
        .start_with_context(&tracer, &parent_context)
}

/// Best-effort error classification: the leading identifier of the debug
/// representation, which for typed errors is the variant or struct name.
fn error_kind(error: &dyn StdError) -> String {
    let debug = format!("{:?}", error);
    let kind: String = debug
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    if kind.is_empty() {
        "Error".to_string()
    } else {
        kind
    }
}

/// Joins the cause chain, outermost cause first, one cause per line.
fn error_chain(error: &dyn StdError) -> String {
    let mut lines = Vec::new();
    let mut source = error.source();
    while let Some(cause) = source {
        lines.push(format!("caused by: {}", cause));
        source = cause.source();
    }
    lines.join("\n")
}
