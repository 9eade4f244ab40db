//! Lambda handler wrapper that captures telemetry around each invocation.
//!
//! This module provides a wrapper function that opens a span and a metric
//! batch for every Lambda invocation. It is an alternative to the Tower
//! layer when more direct control over the handler is preferred.
//!
//! The wrapper is recommended when:
//! - You have a simple Lambda function without a middleware stack
//! - You want minimal setup and configuration
//! - You don't need Tower's middleware composition features
//!
//! For services built on Tower middleware, use
//! [`SfxTelemetryLayer`](crate::layer::SfxTelemetryLayer) instead.
//!
//! # Examples
//!
//! ```rust,no_run
//! use lambda_sfx_lite::{init_telemetry, traced_handler, TelemetryConfig};
//! use lambda_runtime::{service_fn, Error, LambdaEvent, Runtime};
//! use aws_lambda_events::event::apigw::ApiGatewayV2httpRequest;
//!
//! async fn function_handler(
//!     event: LambdaEvent<ApiGatewayV2httpRequest>,
//! ) -> Result<serde_json::Value, Error> {
//!     Ok(serde_json::json!({
//!         "statusCode": 200,
//!         "body": format!("Hello from request {}", event.context.request_id)
//!     }))
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let telemetry = init_telemetry(TelemetryConfig::default());
//!
//!     let runtime = Runtime::new(service_fn(|event| {
//!         traced_handler("my-handler", event, telemetry.clone(), function_handler)
//!     }));
//!
//!     runtime.run().await
//! }
//! ```

use crate::extractors::SpanAttributesExtractor;
use crate::telemetry::Telemetry;
use lambda_runtime::{Error, LambdaEvent};
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;

/// Wraps a Lambda handler function with telemetry capture.
///
/// For each invocation this opens a span and a metric batch, runs the
/// handler, records the outcome and delivers the telemetry before the
/// response is returned to the runtime. The handler's result is passed
/// through unchanged.
///
/// # Outcome handling
///
/// - A handler error increments the error counter, tags the span with the
///   error kind, message and cause chain, and sets the span status to error.
///   The error still propagates to the runtime.
/// - A response that serializes to an object with a `statusCode` field is
///   treated as an HTTP response: the status code is recorded on the span,
///   and a non-2xx code counts as an application failure.
/// - Responses without a `statusCode` field are passed through unobserved.
///
/// When both pipelines are disabled the wrapper adds nothing beyond the
/// passthrough call.
///
/// # Arguments
///
/// * `name` - Operation name used for the span when the event carries none
/// * `event` - Lambda event containing both payload and context
/// * `telemetry` - Handle returned by [`init_telemetry`](crate::init_telemetry)
/// * `handler_fn` - The Lambda handler function to wrap
///
/// # Examples
///
/// ```rust,no_run
/// use lambda_sfx_lite::{init_telemetry, traced_handler, TelemetryConfig};
/// use lambda_runtime::{service_fn, Error, LambdaEvent};
/// use serde_json::Value;
///
/// async fn function_handler(event: LambdaEvent<Value>) -> Result<Value, Error> {
///     Ok(serde_json::json!({ "statusCode": 200 }))
/// }
///
/// #[tokio::main]
/// async fn main() -> Result<(), Error> {
///     let telemetry = init_telemetry(TelemetryConfig::default());
///
///     let func = service_fn(|event| {
///         traced_handler("my-handler", event, telemetry.clone(), function_handler)
///     });
///
///     lambda_runtime::run(func).await
/// }
/// ```
pub async fn traced_handler<T, R, F, Fut>(
    name: &'static str,
    event: LambdaEvent<T>,
    telemetry: Telemetry,
    handler_fn: F,
) -> Result<R, Error>
where
    T: SpanAttributesExtractor + DeserializeOwned + Serialize + Send + 'static,
    R: Serialize + Send + 'static,
    F: FnOnce(LambdaEvent<T>) -> Fut,
    Fut: Future<Output = Result<R, Error>> + Send,
{
    let attrs = event.payload.extract_span_attributes();
    let mut tracker = telemetry.start_invocation(Some(name), &event.context, &attrs);

    let result = handler_fn(event).await;

    match &result {
        Ok(response) => tracker.observe_serialized(response),
        Err(error) => tracker.record_error(error.as_ref()),
    }

    tracker.finish().await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use futures_util::future::BoxFuture;
    use lambda_runtime::Context;
    use opentelemetry::trace::Status;
    use opentelemetry::{global, Value};
    use opentelemetry_sdk::error::OTelSdkError;
    use opentelemetry_sdk::trace::{SdkTracerProvider, SpanData, SpanExporter};
    use opentelemetry_sdk::Resource;
    use serial_test::serial;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Debug, Clone, Default)]
    struct TestExporter {
        spans: Arc<Mutex<Vec<SpanData>>>,
    }

    impl TestExporter {
        fn get_spans(&self) -> Vec<SpanData> {
            self.spans.lock().unwrap().clone()
        }

        fn find_attribute(span: &SpanData, key: &str) -> Option<String> {
            span.attributes
                .iter()
                .find(|kv| kv.key.as_str() == key)
                .map(|kv| kv.value.to_string())
        }
    }

    impl SpanExporter for TestExporter {
        fn export(&self, batch: Vec<SpanData>) -> BoxFuture<'static, Result<(), OTelSdkError>> {
            self.spans.lock().unwrap().extend(batch);
            Box::pin(std::future::ready(Ok(())))
        }
    }

    fn test_config(tracing: bool) -> Config {
        Config {
            tracing_enabled: tracing,
            metrics_enabled: false,
            context_propagation_enabled: false,
            debug_enabled: false,
            auth_token: String::new(),
            api_scheme: "https".to_string(),
            api_hostname: "ingest.us0.signalfx.com".to_string(),
            api_port: 443,
            send_timeout: Duration::from_millis(2000),
            connection_lease_timeout: Duration::from_millis(5000),
            dns_refresh_timeout: Duration::from_millis(5000),
        }
    }

    fn setup_telemetry(tracing: bool) -> (TestExporter, Telemetry) {
        let exporter = TestExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .with_resource(Resource::builder_empty().build())
            .build();
        global::set_tracer_provider(provider.clone());
        let telemetry = Telemetry::new(
            Arc::new(test_config(tracing)),
            None,
            Some(Arc::new(provider)),
            Arc::new(Vec::new()),
        );
        (exporter, telemetry)
    }

    #[tokio::test]
    #[serial]
    async fn test_basic_handler_wrapping() -> Result<(), Error> {
        let (exporter, telemetry) = setup_telemetry(true);

        let handler_fn = |_event: LambdaEvent<serde_json::Value>| async move {
            Ok(serde_json::json!({"statusCode": 200}))
        };
        let event = LambdaEvent::new(serde_json::json!({}), Context::default());

        let result = traced_handler("test-handler", event, telemetry, handler_fn).await?;
        assert_eq!(result["statusCode"], 200);

        let spans = exporter.get_spans();
        assert_eq!(spans.len(), 1);
        let span = &spans[0];
        assert_eq!(span.name, "test-handler");
        assert_eq!(
            TestExporter::find_attribute(span, "http.status_code"),
            Some("200".to_string())
        );
        assert!(matches!(span.status, Status::Ok));

        Ok(())
    }

    #[tokio::test]
    #[serial]
    async fn test_error_response_marks_span() -> Result<(), Error> {
        let (exporter, telemetry) = setup_telemetry(true);

        let handler_fn = |_event: LambdaEvent<serde_json::Value>| async move {
            Ok(serde_json::json!({
                "statusCode": 500,
                "body": "Internal Server Error"
            }))
        };
        let event = LambdaEvent::new(serde_json::json!({}), Context::default());

        let result = traced_handler("test-handler", event, telemetry, handler_fn).await?;
        assert_eq!(result["statusCode"], 500);

        let spans = exporter.get_spans();
        let span = &spans[0];
        assert_eq!(
            TestExporter::find_attribute(span, "http.status_code"),
            Some("500".to_string())
        );
        assert!(matches!(span.status, Status::Error { .. }));

        Ok(())
    }

    #[tokio::test]
    #[serial]
    async fn test_handler_error_is_recorded_and_returned() {
        let (exporter, telemetry) = setup_telemetry(true);

        let handler_fn = |_event: LambdaEvent<serde_json::Value>| async move {
            Err::<serde_json::Value, Error>(Error::from("downstream unavailable"))
        };
        let event = LambdaEvent::new(serde_json::json!({}), Context::default());

        let result = traced_handler("test-handler", event, telemetry, handler_fn).await;
        assert!(result.is_err());

        let spans = exporter.get_spans();
        let span = &spans[0];
        assert_eq!(
            TestExporter::find_attribute(span, "error"),
            Some("true".to_string())
        );
        assert_eq!(
            TestExporter::find_attribute(span, "sfx.error.message"),
            Some("downstream unavailable".to_string())
        );
        assert!(matches!(span.status, Status::Error { .. }));
    }

    #[tokio::test]
    #[serial]
    async fn test_plain_response_is_not_observed() -> Result<(), Error> {
        let (exporter, telemetry) = setup_telemetry(true);

        let handler_fn = |_event: LambdaEvent<serde_json::Value>| async move {
            Ok(serde_json::json!({"message": "ok"}))
        };
        let event = LambdaEvent::new(serde_json::json!({}), Context::default());

        traced_handler("test-handler", event, telemetry, handler_fn).await?;

        let spans = exporter.get_spans();
        let span = &spans[0];
        assert_eq!(TestExporter::find_attribute(span, "http.status_code"), None);
        assert!(matches!(span.status, Status::Unset));

        Ok(())
    }

    #[tokio::test]
    #[serial]
    async fn test_disabled_telemetry_passes_through() -> Result<(), Error> {
        let (exporter, telemetry) = setup_telemetry(false);

        let handler_fn = |_event: LambdaEvent<serde_json::Value>| async move {
            Ok(serde_json::json!({"statusCode": 200}))
        };
        let event = LambdaEvent::new(serde_json::json!({}), Context::default());

        let result = traced_handler("test-handler", event, telemetry, handler_fn).await?;
        assert_eq!(result["statusCode"], 200);
        assert!(exporter.get_spans().is_empty());

        Ok(())
    }
}
