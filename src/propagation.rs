//! B3 trace context propagation.
//!
//! Incoming requests carry their trace identity in the multi-header B3
//! format: `x-b3-traceid`, `x-b3-spanid` and `x-b3-sampled`. Trace ids may be
//! 64 or 128 bit hex; short ids are zero-extended on the left. A carrier that
//! does not yield a fully valid span context is ignored so the invocation
//! starts a fresh trace instead of attaching to a half-parsed one.
//!
//! # Example
//! ```
//! use lambda_sfx_lite::propagation::B3Propagator;
//! use opentelemetry::propagation::TextMapPropagator;
//! use std::collections::HashMap;
//!
//! let carrier = HashMap::from([
//!     ("x-b3-traceid".to_string(), "0123456789abceff".to_string()),
//!     ("x-b3-spanid".to_string(), "53995c3f42cd8ad8".to_string()),
//!     ("x-b3-sampled".to_string(), "1".to_string()),
//! ]);
//! let context = B3Propagator::new().extract(&carrier);
//! ```

use crate::constants::b3;
use crate::logger::Logger;
use opentelemetry::{
    propagation::{text_map_propagator::FieldIter, Extractor, Injector, TextMapPropagator},
    trace::{SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState},
    Context,
};
use std::collections::HashMap;

static LOGGER: Logger = Logger::const_new("propagation");

/// Propagator for the multi-header B3 format.
#[derive(Debug, Clone)]
pub struct B3Propagator {
    fields: [String; 3],
}

impl Default for B3Propagator {
    fn default() -> Self {
        Self::new()
    }
}

impl B3Propagator {
    pub fn new() -> Self {
        Self {
            fields: [
                b3::TRACE_ID.to_string(),
                b3::SPAN_ID.to_string(),
                b3::SAMPLED.to_string(),
            ],
        }
    }

    fn extract_span_context(&self, extractor: &dyn Extractor) -> Option<SpanContext> {
        let trace_id = TraceId::from_hex(extractor.get(b3::TRACE_ID)?.trim()).ok()?;
        let span_id = SpanId::from_hex(extractor.get(b3::SPAN_ID)?.trim()).ok()?;
        let sampled = matches!(
            extractor.get(b3::SAMPLED).map(str::trim),
            Some("1") | Some("true")
        );
        let flags = if sampled {
            TraceFlags::SAMPLED
        } else {
            TraceFlags::default()
        };

        let span_context = SpanContext::new(trace_id, span_id, flags, true, TraceState::default());
        span_context.is_valid().then_some(span_context)
    }
}

impl TextMapPropagator for B3Propagator {
    fn fields(&self) -> FieldIter<'_> {
        FieldIter::new(&self.fields)
    }

    fn extract_with_context(&self, cx: &Context, extractor: &dyn Extractor) -> Context {
        match self.extract_span_context(extractor) {
            Some(span_context) => cx.with_remote_span_context(span_context),
            None => cx.clone(),
        }
    }

    fn inject_context(&self, cx: &Context, injector: &mut dyn Injector) {
        let span = cx.span();
        let span_context = span.span_context();
        if span_context.is_valid() {
            injector.set(b3::TRACE_ID, span_context.trace_id().to_string());
            injector.set(b3::SPAN_ID, span_context.span_id().to_string());
            let sampled = if span_context.is_sampled() { "1" } else { "0" };
            injector.set(b3::SAMPLED, sampled.to_string());
        }
    }
}

/// Extracts a remote parent from lowercase-keyed request headers.
///
/// Returns `None` when the carrier holds no usable trace identity.
pub(crate) fn extract_parent_context(carrier: &HashMap<String, String>) -> Option<Context> {
    let propagator = B3Propagator::new();
    let context = propagator.extract_with_context(&Context::new(), carrier);
    if has_active_span(&context) {
        Some(context)
    } else {
        LOGGER.debug("no usable trace context in carrier");
        None
    }
}

fn has_active_span(cx: &Context) -> bool {
    cx.span().span_context().is_valid()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn carrier(trace_id: &str, span_id: &str, sampled: Option<&str>) -> HashMap<String, String> {
        let mut headers = HashMap::from([
            (b3::TRACE_ID.to_string(), trace_id.to_string()),
            (b3::SPAN_ID.to_string(), span_id.to_string()),
        ]);
        if let Some(flag) = sampled {
            headers.insert(b3::SAMPLED.to_string(), flag.to_string());
        }
        headers
    }

    #[test]
    fn test_extract_short_trace_id() {
        let headers = carrier("0123456789abceff", "53995c3f42cd8ad8", Some("1"));
        let context = B3Propagator::new().extract_with_context(&Context::new(), &headers);

        let span = context.span();
        let span_context = span.span_context();
        assert!(span_context.is_valid());
        assert!(span_context.is_remote());
        assert!(span_context.is_sampled());
        assert_eq!(
            span_context.trace_id(),
            TraceId::from_hex("0123456789abceff").unwrap()
        );
        assert_eq!(
            span_context.span_id(),
            SpanId::from_hex("53995c3f42cd8ad8").unwrap()
        );
    }

    #[test]
    fn test_extract_full_width_trace_id() {
        let headers = carrier(
            "5759e988bd862e3fe1be46a994272793",
            "53995c3f42cd8ad8",
            Some("true"),
        );
        let context = B3Propagator::new().extract_with_context(&Context::new(), &headers);

        let span = context.span();
        let span_context = span.span_context();
        assert!(span_context.is_valid());
        assert!(span_context.is_sampled());
    }

    #[test]
    fn test_missing_sampled_header_means_unsampled() {
        let headers = carrier("0123456789abceff", "53995c3f42cd8ad8", None);
        let context = B3Propagator::new().extract_with_context(&Context::new(), &headers);

        let span = context.span();
        assert!(span.span_context().is_valid());
        assert!(!span.span_context().is_sampled());
    }

    #[test]
    fn test_unparsable_ids_are_rejected() {
        let cases = [
            carrier("not-hex", "53995c3f42cd8ad8", Some("1")),
            carrier("0123456789abceff", "xyz", Some("1")),
            carrier("0", "53995c3f42cd8ad8", Some("1")),
            carrier("0123456789abceff", "0000000000000000", Some("1")),
        ];

        for headers in cases {
            let context = B3Propagator::new().extract_with_context(&Context::new(), &headers);
            assert!(
                !context.span().span_context().is_valid(),
                "carrier should have been rejected: {:?}",
                headers
            );
        }
    }

    #[test]
    fn test_missing_span_id_is_rejected() {
        let headers = HashMap::from([(
            b3::TRACE_ID.to_string(),
            "0123456789abceff".to_string(),
        )]);
        let context = B3Propagator::new().extract_with_context(&Context::new(), &headers);

        assert!(!context.span().span_context().is_valid());
    }

    #[test]
    fn test_inject_context() {
        let span_context = SpanContext::new(
            TraceId::from_hex("5759e988bd862e3fe1be46a994272793").unwrap(),
            SpanId::from_hex("53995c3f42cd8ad8").unwrap(),
            TraceFlags::SAMPLED,
            true,
            TraceState::default(),
        );
        let context = Context::new().with_remote_span_context(span_context);

        let mut injector = HashMap::<String, String>::new();
        B3Propagator::new().inject_context(&context, &mut injector);

        assert_eq!(
            injector.get(b3::TRACE_ID).map(String::as_str),
            Some("5759e988bd862e3fe1be46a994272793")
        );
        assert_eq!(
            injector.get(b3::SPAN_ID).map(String::as_str),
            Some("53995c3f42cd8ad8")
        );
        assert_eq!(injector.get(b3::SAMPLED).map(String::as_str), Some("1"));
    }

    #[test]
    fn test_inject_skips_invalid_context() {
        let mut injector = HashMap::<String, String>::new();
        B3Propagator::new().inject_context(&Context::new(), &mut injector);

        assert!(injector.is_empty());
    }

    #[test]
    fn test_extract_parent_context_helper() {
        let headers = carrier("0123456789abceff", "53995c3f42cd8ad8", Some("1"));
        assert!(extract_parent_context(&headers).is_some());

        let empty = HashMap::new();
        assert!(extract_parent_context(&empty).is_none());
    }
}
