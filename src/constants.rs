//! Constants used throughout the lambda-sfx-lite crate.
//!
//! Environment variable names, default configuration values, ingest wire
//! details, and the metric and dimension names emitted for every invocation
//! are centralized here so the rest of the crate never spells a string twice.

/// Environment variable names for configuration.
pub mod env_vars {
    /// Access token attached to every ingest request. Required when metrics are enabled.
    pub const AUTH_TOKEN: &str = "SIGNALFX_AUTH_TOKEN";
    /// Scheme of the ingest endpoint ("http" or "https").
    pub const API_SCHEME: &str = "SIGNALFX_API_SCHEME";
    /// Hostname of the ingest endpoint.
    pub const API_HOSTNAME: &str = "SIGNALFX_API_HOSTNAME";
    /// Port of the ingest endpoint.
    pub const API_PORT: &str = "SIGNALFX_API_PORT";
    /// Per-batch send timeout in milliseconds.
    pub const SEND_TIMEOUT: &str = "SIGNALFX_SEND_TIMEOUT";
    /// How long a pooled connection may be reused, in milliseconds.
    pub const CONNECTION_LEASE_TIMEOUT: &str = "CONNECTION_LEASE_TIMEOUT";
    /// How long resolved DNS entries may be reused, in milliseconds.
    pub const DNS_REFRESH_TIMEOUT: &str = "DNS_REFRESH_TIMEOUT";
    /// Enables the metrics pipeline ("false" if unset).
    pub const METRICS_ENABLED: &str = "SIGNALFX_METRICS_ENABLED";
    /// Enables the tracing pipeline ("true" if unset).
    pub const TRACING_ENABLED: &str = "SIGNALFX_TRACING_ENABLED";
    /// Enables extraction of incoming B3 trace headers ("false" if unset).
    pub const CTX_PROPAGATION_ENABLED: &str = "SIGNALFX_CTX_PROPAGATION_ENABLED";
    /// Dumps the resolved environment at startup when truthy.
    pub const DEBUG_ENABLED: &str = "SIGNALFX_LAMBDA_DEBUG";
    /// Crate-specific log level override, checked before the runtime-wide variables.
    pub const LOG_LEVEL: &str = "SIGNALFX_LAMBDA_LOG_LEVEL";

    /// Execution environment identifier provided by the Lambda runtime.
    pub const AWS_EXECUTION_ENV: &str = "AWS_EXECUTION_ENV";
    /// Function name provided by the Lambda runtime.
    pub const AWS_LAMBDA_FUNCTION_NAME: &str = "AWS_LAMBDA_FUNCTION_NAME";

    /// Variables seeded as one-time defaults for a downstream tracer.
    pub mod tracer {
        /// Flush spans synchronously before the invocation ends.
        pub const SYNC_SEND: &str = "SIGNALFX_SYNC_SEND";
        /// File logging is pointless in Lambda, disabled by default.
        pub const FILE_LOG_ENABLED: &str = "SIGNALFX_FILE_LOG_ENABLED";
        /// Stdout logging lands in CloudWatch, enabled by default.
        pub const STDOUT_LOG_ENABLED: &str = "SIGNALFX_STDOUT_LOG_ENABLED";
        /// Service name reported on spans, defaulted to the function name.
        pub const SERVICE_NAME: &str = "SIGNALFX_SERVICE_NAME";
        /// Access token consumed by the tracing side of the stack.
        pub const ACCESS_TOKEN: &str = "SIGNALFX_ACCESS_TOKEN";
        /// Full trace ingest URL, reused to derive metric ingest settings.
        pub const ENDPOINT_URL: &str = "SIGNALFX_ENDPOINT_URL";
    }
}

/// Default values used when the corresponding environment variable is unset.
pub mod defaults {
    use std::time::Duration;

    pub const API_SCHEME: &str = "https";
    pub const API_HOSTNAME: &str = "ingest.us0.signalfx.com";
    pub const API_PORT: u16 = 443;
    pub const SEND_TIMEOUT: Duration = Duration::from_millis(2000);
    pub const CONNECTION_LEASE_TIMEOUT: Duration = Duration::from_millis(5000);
    pub const DNS_REFRESH_TIMEOUT: Duration = Duration::from_millis(5000);
    pub const METRICS_ENABLED: bool = false;
    pub const TRACING_ENABLED: bool = true;
    pub const CTX_PROPAGATION_ENABLED: bool = false;
    pub const DEBUG_ENABLED: bool = false;
}

/// Ingest wire details.
pub mod ingest {
    /// Path of the datapoint ingest endpoint.
    pub const DATAPOINT_PATH: &str = "/v2/datapoint";
    /// Header carrying the access token.
    pub const TOKEN_HEADER: &str = "X-Sf-Token";
    /// Content type of an encoded datapoint batch.
    pub const CONTENT_TYPE_PROTOBUF: &str = "application/x-protobuf";
}

/// Names of the metrics reported for every invocation.
///
/// All wrapper metrics share the `function.` prefix; user-defined metrics are
/// sent under whatever name the caller chose.
pub mod metrics {
    pub const PREFIX: &str = "function.";
    pub const INVOCATIONS: &str = "function.invocations";
    pub const COLD_STARTS: &str = "function.cold_starts";
    pub const ERRORS: &str = "function.errors";
    pub const DURATION: &str = "function.duration";
}

/// Dimension names attached to every reported datapoint.
pub mod dimensions {
    pub const METRIC_SOURCE: &str = "metric_source";
    pub const METRIC_SOURCE_VALUE: &str = "lambda_wrapper";
    pub const WRAPPER_VERSION: &str = "function_wrapper_version";
    /// Value of the [`WRAPPER_VERSION`] dimension for this build.
    pub const WRAPPER_VERSION_VALUE: &str =
        concat!("signalfx_lambda_", env!("CARGO_PKG_VERSION"));
    pub const EXECUTION_ENV: &str = "aws_execution_env";
    pub const FUNCTION_NAME: &str = "aws_function_name";
    pub const FUNCTION_VERSION: &str = "aws_function_version";
    pub const REGION: &str = "aws_region";
    pub const ACCOUNT_ID: &str = "aws_account_id";
    pub const FUNCTION_QUALIFIER: &str = "aws_function_qualifier";
    pub const LAMBDA_ARN: &str = "lambda_arn";
    pub const EVENT_SOURCE_MAPPINGS: &str = "event_source_mappings";
}

/// Span tag names and values set on every invocation span.
pub mod span_tags {
    /// Instrumentation scope name used when requesting a tracer.
    pub const TRACER_NAME: &str = "lambda-sfx-lite";
    pub const COMPONENT: &str = "component";
    pub const COMPONENT_VALUE: &str = "rust-lambda-wrapper";
    pub const AWS_REQUEST_ID: &str = "aws_request_id";
    pub const COLD_START: &str = "cold_start";
    pub const ERROR: &str = "error";
    pub const ERROR_KIND: &str = "sfx.error.kind";
    pub const ERROR_MESSAGE: &str = "sfx.error.message";
    pub const ERROR_STACK: &str = "sfx.error.stack";
    pub const HTTP_STATUS_CODE: &str = "http.status_code";
}

/// B3 header names used for trace context propagation.
pub mod b3 {
    pub const TRACE_ID: &str = "x-b3-traceid";
    pub const SPAN_ID: &str = "x-b3-spanid";
    pub const SAMPLED: &str = "x-b3-sampled";
}
