//! Span attribute extraction from Lambda event types.
//!
//! Implement [`SpanAttributesExtractor`] for an event type to describe what
//! the invocation span should carry: extra attributes, an operation name
//! override, and the headers to consult for an incoming trace context.
//! Implementations for the common HTTP-shaped events (API Gateway v1 and v2,
//! ALB) are provided; a plain `serde_json::Value` event contributes nothing.
//!
//! # Example
//!
//! ```
//! use lambda_sfx_lite::extractors::{SpanAttributes, SpanAttributesExtractor};
//! use std::collections::HashMap;
//!
//! struct OrderEvent {
//!     order_id: String,
//! }
//!
//! impl SpanAttributesExtractor for OrderEvent {
//!     fn extract_span_attributes(&self) -> SpanAttributes {
//!         let mut attributes = HashMap::new();
//!         attributes.insert("order.id".to_string(), self.order_id.clone());
//!
//!         SpanAttributes {
//!             attributes,
//!             ..SpanAttributes::default()
//!         }
//!     }
//! }
//! ```

use aws_lambda_events::event::alb::AlbTargetGroupRequest;
use aws_lambda_events::event::apigw::{ApiGatewayProxyRequest, ApiGatewayV2httpRequest};
use http::HeaderMap;
use std::collections::HashMap;

/// Data extracted from a Lambda event for span creation.
#[derive(Default)]
pub struct SpanAttributes {
    /// Overrides the span name. When unset the span is named after the
    /// configured operation name, falling back to the function name.
    pub span_name: Option<String>,
    /// Extra attributes to set on the span.
    pub attributes: HashMap<String, String>,
    /// Headers to consult for an incoming B3 trace context. Keys are
    /// expected in lowercase, as HTTP header names arrive from the runtime.
    pub carrier: Option<HashMap<String, String>>,
}

/// Trait for types that can provide span attributes.
pub trait SpanAttributesExtractor {
    /// Extract span attributes from this type.
    fn extract_span_attributes(&self) -> SpanAttributes;
}

/// Raw JSON events carry no usable HTTP shape.
impl SpanAttributesExtractor for serde_json::Value {
    fn extract_span_attributes(&self) -> SpanAttributes {
        SpanAttributes::default()
    }
}

// Implementation for API Gateway V2 events
impl SpanAttributesExtractor for ApiGatewayV2httpRequest {
    fn extract_span_attributes(&self) -> SpanAttributes {
        let mut attributes = HashMap::new();

        attributes.insert(
            "http.method".to_string(),
            self.request_context.http.method.to_string(),
        );
        if let Some(path) = &self.request_context.http.path {
            attributes.insert("http.target".to_string(), path.to_string());
        }
        if let Some(route) = &self.route_key {
            attributes.insert("http.route".to_string(), route.to_string());
        }

        SpanAttributes {
            attributes,
            carrier: Some(headers_to_carrier(&self.headers)),
            ..SpanAttributes::default()
        }
    }
}

// Implementation for API Gateway V1 events
impl SpanAttributesExtractor for ApiGatewayProxyRequest {
    fn extract_span_attributes(&self) -> SpanAttributes {
        let mut attributes = HashMap::new();

        attributes.insert("http.method".to_string(), self.http_method.to_string());
        if let Some(path) = &self.path {
            attributes.insert("http.target".to_string(), path.to_string());
        }
        if let Some(resource) = &self.resource {
            attributes.insert("http.route".to_string(), resource.to_string());
        }

        SpanAttributes {
            attributes,
            carrier: Some(headers_to_carrier(&self.headers)),
            ..SpanAttributes::default()
        }
    }
}

// Implementation for ALB Target Group events
impl SpanAttributesExtractor for AlbTargetGroupRequest {
    fn extract_span_attributes(&self) -> SpanAttributes {
        let mut attributes = HashMap::new();

        attributes.insert("http.method".to_string(), self.http_method.to_string());
        if let Some(path) = &self.path {
            attributes.insert("http.target".to_string(), path.to_string());
        }
        if let Some(target_group_arn) = &self.request_context.elb.target_group_arn {
            attributes.insert(
                "alb.target_group_arn".to_string(),
                target_group_arn.to_string(),
            );
        }

        SpanAttributes {
            attributes,
            carrier: Some(headers_to_carrier(&self.headers)),
            ..SpanAttributes::default()
        }
    }
}

/// Collects string-valued headers into a propagation carrier.
///
/// Header names are already lowercase in `http::HeaderMap`, which is what the
/// B3 extraction side expects.
fn headers_to_carrier(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.to_string(), value.to_string()))
        })
        .collect()
}
