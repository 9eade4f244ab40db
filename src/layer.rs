//! Tower middleware for capturing Lambda invocation telemetry.
//!
//! This layer wraps a Lambda service so that every invocation runs inside a
//! telemetry lifecycle: a span and a metric batch opened before the handler
//! is called, and sealed and delivered after it returns. It is the preferred
//! surface for services built with Tower middleware; simple functions can use
//! [`traced_handler`](crate::handler::traced_handler) instead.
//!
//! # Example
//!
//! ```no_run
//! use lambda_sfx_lite::{init_telemetry, SfxTelemetryLayer, TelemetryConfig};
//! use lambda_runtime::{Error, LambdaEvent, Runtime};
//! use aws_lambda_events::event::apigw::ApiGatewayV2httpRequest;
//! use tower::ServiceBuilder;
//!
//! async fn handler(
//!     event: LambdaEvent<ApiGatewayV2httpRequest>,
//! ) -> Result<serde_json::Value, Error> {
//!     Ok(serde_json::json!({ "statusCode": 200 }))
//! }
//!
//! # async fn example() -> Result<(), Error> {
//! let telemetry = init_telemetry(TelemetryConfig::default());
//!
//! let service = ServiceBuilder::new()
//!     .layer(SfxTelemetryLayer::new(telemetry).with_name("api-handler"))
//!     .service_fn(handler);
//!
//! Runtime::new(service).run().await
//! # }
//! ```
//!
//! # Context propagation
//!
//! When context propagation is enabled, the layer reads B3 headers from
//! supported HTTP event types and parents the invocation span under the
//! caller's trace.
//!
//! # Response tracking
//!
//! For responses that serialize to an object with a `statusCode` field, the
//! layer records `http.status_code` on the span, marks 5xx responses as
//! errors, and counts any non-2xx response as an application failure.
//!
//! # Custom metrics
//!
//! A metrics closure attached with [`SfxTelemetryLayer::with_metrics_fn`]
//! runs against the response of each successful invocation, with mutable
//! access so that datapoints embedded in the response can be taken out before
//! the response reaches the caller. The datapoints it returns are tagged with
//! the invocation's common dimensions and delivered in the same batch as the
//! built-in metrics.

use crate::extractors::{SpanAttributes, SpanAttributesExtractor};
use crate::proto::DataPoint;
use crate::telemetry::Telemetry;
use crate::tracker::TelemetryTracker;
use futures_util::future::BoxFuture;
use futures_util::ready;
use lambda_runtime::{Error, LambdaEvent};
use pin_project::pin_project;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::task::Poll;
use std::{future::Future, pin::Pin, task};
use tower::{Layer, Service};

type EventExtractor<T> = Arc<dyn Fn(&LambdaEvent<T>) -> SpanAttributes + Send + Sync>;
type MetricsExtractor<R> = Arc<dyn Fn(&mut R) -> Vec<DataPoint> + Send + Sync>;

/// Future that completes the invocation's telemetry after the inner future
/// resolves.
///
/// The future runs in two phases: it first drives the wrapped handler, then
/// records the outcome and drives telemetry delivery. The handler's result is
/// held until delivery finishes and is returned unchanged.
///
/// This type is created automatically by `SfxTelemetryService`; you shouldn't
/// need to construct it directly.
#[pin_project]
pub struct InvocationFuture<Fut, R> {
    #[pin]
    future: Option<Fut>,
    tracker: Option<TelemetryTracker>,
    metrics_fn: Option<MetricsExtractor<R>>,
    finish: Option<BoxFuture<'static, ()>>,
    result: Option<Result<R, Error>>,
}

impl<Fut, R> Future for InvocationFuture<Fut, R>
where
    Fut: Future<Output = Result<R, Error>>,
    R: Serialize + Send + 'static,
{
    type Output = Result<R, Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut task::Context<'_>) -> Poll<Self::Output> {
        let mut this = self.as_mut().project();

        if let Some(future) = this.future.as_mut().as_pin_mut() {
            let mut result = ready!(future.poll(cx));
            this.future.set(None);

            let mut tracker = this.tracker.take().expect("future polled after completion");
            match result.as_mut() {
                Ok(response) => {
                    // The hook runs even when telemetry is disabled so that
                    // response-embedded datapoints never reach the caller.
                    if let Some(metrics_fn) = this.metrics_fn.as_ref() {
                        tracker.add_custom_metrics(metrics_fn(response));
                    }
                    tracker.observe_serialized(response);
                }
                Err(error) => tracker.record_error(error.as_ref()),
            }

            *this.result = Some(result);
            *this.finish = Some(Box::pin(tracker.finish()));
        }

        if let Some(finish) = this.finish.as_mut() {
            ready!(finish.as_mut().poll(cx));
            *this.finish = None;
        }

        Poll::Ready(this.result.take().expect("future polled after completion"))
    }
}

/// Tower layer that wraps a Lambda service with telemetry capture.
///
/// Each invocation through the wrapped service gets a span and a metric batch
/// covering the handler call, with the outcome recorded and the batch
/// delivered before the response reaches the runtime.
///
/// # Example
///
/// ```no_run
/// use lambda_sfx_lite::{init_telemetry, metrics, SfxTelemetryLayer, TelemetryConfig};
/// use lambda_runtime::{Error, LambdaEvent, Runtime};
/// use tower::ServiceBuilder;
///
/// async fn handler(event: LambdaEvent<serde_json::Value>) -> Result<serde_json::Value, Error> {
///     Ok(serde_json::json!({ "statusCode": 200 }))
/// }
///
/// # async fn example() -> Result<(), Error> {
/// let telemetry = init_telemetry(TelemetryConfig::default());
///
/// let layer = SfxTelemetryLayer::new(telemetry)
///     .with_name("process-order")
///     .with_metrics_fn(|_response: &mut serde_json::Value| {
///         vec![metrics::counter("orders.processed", 1)]
///     });
///
/// let service = ServiceBuilder::new().layer(layer).service_fn(handler);
///
/// Runtime::new(service).run().await
/// # }
/// ```
pub struct SfxTelemetryLayer<T, R> {
    telemetry: Telemetry,
    name: String,
    event_extractor: Option<EventExtractor<T>>,
    metrics_fn: Option<MetricsExtractor<R>>,
}

impl<T, R> SfxTelemetryLayer<T, R> {
    /// Creates a layer from the handle returned by
    /// [`init_telemetry`](crate::init_telemetry).
    pub fn new(telemetry: Telemetry) -> Self {
        Self {
            telemetry,
            name: "lambda-invocation".to_string(),
            event_extractor: None,
            metrics_fn: None,
        }
    }

    /// Sets the operation name used for spans when the event carries none.
    ///
    /// It should describe the purpose of the Lambda function, for example
    /// "process-order" or "api-handler".
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets a closure that extracts additional span attributes from each
    /// event.
    ///
    /// The extracted attributes are merged over the ones derived from the
    /// event type. Use this for event types without a
    /// [`SpanAttributesExtractor`] implementation worth writing, or to add
    /// attributes beyond what the built-in extraction provides.
    pub fn with_extractor_fn(
        mut self,
        f: impl Fn(&LambdaEvent<T>) -> SpanAttributes + Send + Sync + 'static,
    ) -> Self {
        self.event_extractor = Some(Arc::new(f));
        self
    }

    /// Sets a closure that collects custom datapoints from the response of
    /// each successful invocation.
    ///
    /// The closure receives the response mutably, so datapoints a handler
    /// embedded in it can be taken out before the response is returned to the
    /// caller. Build the datapoints with
    /// [`metrics::counter`](crate::metrics::counter) and
    /// [`metrics::gauge`](crate::metrics::gauge). They are delivered in the
    /// invocation's batch with its common dimensions applied; dimensions
    /// already present on a datapoint are preserved.
    pub fn with_metrics_fn(
        mut self,
        f: impl Fn(&mut R) -> Vec<DataPoint> + Send + Sync + 'static,
    ) -> Self {
        self.metrics_fn = Some(Arc::new(f));
        self
    }
}

impl<T, R> Clone for SfxTelemetryLayer<T, R> {
    fn clone(&self) -> Self {
        Self {
            telemetry: self.telemetry.clone(),
            name: self.name.clone(),
            event_extractor: self.event_extractor.clone(),
            metrics_fn: self.metrics_fn.clone(),
        }
    }
}

impl<S, T, R> Layer<S> for SfxTelemetryLayer<T, R> {
    type Service = SfxTelemetryService<S, T, R>;

    fn layer(&self, inner: S) -> Self::Service {
        SfxTelemetryService {
            inner,
            telemetry: self.telemetry.clone(),
            name: self.name.clone(),
            event_extractor: self.event_extractor.clone(),
            metrics_fn: self.metrics_fn.clone(),
        }
    }
}

/// Tower service returned by [`SfxTelemetryLayer`].
///
/// Created automatically by the layer; you shouldn't need to construct it
/// directly.
pub struct SfxTelemetryService<S, T, R> {
    inner: S,
    telemetry: Telemetry,
    name: String,
    event_extractor: Option<EventExtractor<T>>,
    metrics_fn: Option<MetricsExtractor<R>>,
}

impl<S: Clone, T, R> Clone for SfxTelemetryService<S, T, R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            telemetry: self.telemetry.clone(),
            name: self.name.clone(),
            event_extractor: self.event_extractor.clone(),
            metrics_fn: self.metrics_fn.clone(),
        }
    }
}

impl<S, F, T, R> Service<LambdaEvent<T>> for SfxTelemetryService<S, T, R>
where
    S: Service<LambdaEvent<T>, Response = R, Error = Error, Future = F> + Send,
    F: Future<Output = Result<R, Error>> + Send + 'static,
    T: SpanAttributesExtractor + DeserializeOwned + Serialize + Send + 'static,
    R: Serialize + Send + 'static,
{
    type Response = R;
    type Error = Error;
    type Future = InvocationFuture<S::Future, R>;

    fn poll_ready(&mut self, cx: &mut task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, event: LambdaEvent<T>) -> Self::Future {
        let mut attrs = event.payload.extract_span_attributes();

        if let Some(extractor) = &self.event_extractor {
            let custom = extractor(&event);
            if custom.span_name.is_some() {
                attrs.span_name = custom.span_name;
            }
            attrs.attributes.extend(custom.attributes);
            if custom.carrier.is_some() {
                attrs.carrier = custom.carrier;
            }
        }

        let tracker = self
            .telemetry
            .start_invocation(Some(&self.name), &event.context, &attrs);

        InvocationFuture {
            future: Some(self.inner.call(event)),
            tracker: Some(tracker),
            metrics_fn: self.metrics_fn.clone(),
            finish: None,
            result: None,
        }
    }
}
