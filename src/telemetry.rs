//! Telemetry initialization for AWS Lambda functions.
//!
//! This module provides the process-level entry point: [`init_telemetry`]
//! resolves configuration, prepares the metrics reporter and the tracer
//! wiring, and returns a cloneable [`Telemetry`] handle that the two
//! instrumentation surfaces ([`traced_handler`](crate::handler::traced_handler)
//! and [`SfxTelemetryLayer`](crate::layer::SfxTelemetryLayer)) share.
//!
//! Initialization never fails: configuration problems are logged and resolved
//! to safe defaults, and a reporter that cannot be built simply disables
//! metric delivery for the process.
//!
//! # Examples
//!
//! Basic usage with environment-driven configuration:
//!
//! ```no_run
//! use lambda_sfx_lite::{init_telemetry, TelemetryConfig};
//!
//! let telemetry = init_telemetry(TelemetryConfig::default());
//! ```
//!
//! Overriding toggles in code and tagging every span:
//!
//! ```no_run
//! use lambda_sfx_lite::{init_telemetry, TelemetryConfig};
//!
//! let telemetry = init_telemetry(
//!     TelemetryConfig::builder()
//!         .metrics_enabled(true)
//!         .extra_span_tags(vec![("team".to_string(), "payments".to_string())])
//!         .build(),
//! );
//! ```
//!
//! Bringing your own tracer provider for span export:
//!
//! ```no_run
//! use lambda_sfx_lite::{init_telemetry, TelemetryConfig};
//! use opentelemetry_sdk::trace::SdkTracerProvider;
//!
//! let provider = SdkTracerProvider::builder().build();
//! let telemetry = init_telemetry(
//!     TelemetryConfig::builder().tracer_provider(provider).build(),
//! );
//! ```

use crate::config::{Config, ConfigOverrides};
use crate::extractors::SpanAttributes;
use crate::logger::Logger;
use crate::propagation::B3Propagator;
use crate::reporter::Reporter;
use crate::tracker::TelemetryTracker;
use bon::Builder;
use lambda_runtime::Context;
use opentelemetry::global;
use opentelemetry_sdk::trace::SdkTracerProvider;
use std::sync::Arc;

static LOGGER: Logger = Logger::const_new("telemetry");

/// Configuration for telemetry initialization.
///
/// Use `TelemetryConfig::default()` for environment-driven configuration, or
/// the builder to override toggles in code. Environment variables win over
/// builder values so deployed functions can be reconfigured without a
/// rebuild.
///
/// # Examples
///
/// ```no_run
/// use lambda_sfx_lite::TelemetryConfig;
///
/// let config = TelemetryConfig::builder()
///     .tracing_enabled(true)
///     .context_propagation_enabled(true)
///     .build();
/// ```
#[derive(Builder, Debug)]
pub struct TelemetryConfig {
    /// Fallback for `SIGNALFX_TRACING_ENABLED` when the variable is unset.
    pub tracing_enabled: Option<bool>,

    /// Fallback for `SIGNALFX_METRICS_ENABLED` when the variable is unset.
    pub metrics_enabled: Option<bool>,

    /// Fallback for `SIGNALFX_CTX_PROPAGATION_ENABLED` when the variable is
    /// unset.
    pub context_propagation_enabled: Option<bool>,

    /// Fallback for `SIGNALFX_LAMBDA_DEBUG` when the variable is unset.
    pub debug_enabled: Option<bool>,

    /// Tracer provider used for invocation spans.
    ///
    /// When supplied, the provider is flushed after every invocation so spans
    /// leave the process before it may be frozen. When omitted, spans are
    /// created through the globally registered provider and export timing is
    /// left to its processors.
    pub tracer_provider: Option<SdkTracerProvider>,

    /// Register the supplied tracer provider as the global provider.
    ///
    /// Default: `true`
    #[builder(default = true)]
    pub set_global_provider: bool,

    /// Static tags added to every invocation span.
    #[builder(default)]
    pub extra_span_tags: Vec<(String, String)>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Process-wide telemetry handle shared by the instrumentation surfaces.
///
/// Cloning is cheap; every clone refers to the same resolved configuration,
/// reporter and tracer provider.
#[derive(Clone)]
pub struct Telemetry {
    config: Arc<Config>,
    reporter: Option<Arc<Reporter>>,
    provider: Option<Arc<SdkTracerProvider>>,
    extra_tags: Arc<Vec<(String, String)>>,
}

impl Telemetry {
    pub(crate) fn new(
        config: Arc<Config>,
        reporter: Option<Arc<Reporter>>,
        provider: Option<Arc<SdkTracerProvider>>,
        extra_tags: Arc<Vec<(String, String)>>,
    ) -> Self {
        Self {
            config,
            reporter,
            provider,
            extra_tags,
        }
    }

    /// True when at least one pipeline is enabled.
    pub fn is_enabled(&self) -> bool {
        self.config.telemetry_enabled()
    }

    pub(crate) fn start_invocation(
        &self,
        operation_name: Option<&str>,
        context: &Context,
        attrs: &SpanAttributes,
    ) -> TelemetryTracker {
        TelemetryTracker::begin(
            &self.config,
            self.reporter.clone(),
            self.provider.clone(),
            context,
            operation_name,
            attrs,
            &self.extra_tags,
        )
    }
}

/// Initializes telemetry for the process and returns the shared handle.
///
/// Resolution order for each toggle: environment variable, then the builder
/// value, then the built-in default. With tracing enabled this also seeds
/// downstream tracer environment defaults and, when context propagation is
/// on, registers the B3 propagator as the global text map propagator. With
/// metrics enabled the ingest settings are resolved and the HTTP reporter is
/// built once for the process lifetime. The resolved settings also become
/// the value returned by [`Config::global`](crate::config::Config::global).
///
/// This function does not return errors: a reporter that cannot be built is
/// logged and metric delivery stays off, and invalid configuration values
/// fall back to their defaults.
///
/// # Examples
///
/// ```no_run
/// use lambda_sfx_lite::{init_telemetry, traced_handler, TelemetryConfig};
/// use lambda_runtime::{service_fn, Error, LambdaEvent};
/// use serde_json::Value;
///
/// async fn handler(event: LambdaEvent<Value>) -> Result<Value, Error> {
///     Ok(serde_json::json!({ "statusCode": 200 }))
/// }
///
/// #[tokio::main]
/// async fn main() -> Result<(), Error> {
///     let telemetry = init_telemetry(TelemetryConfig::default());
///
///     lambda_runtime::run(service_fn(|event| {
///         traced_handler("my-handler", event, telemetry.clone(), handler)
///     }))
///     .await
/// }
/// ```
pub fn init_telemetry(config: TelemetryConfig) -> Telemetry {
    let overrides = ConfigOverrides {
        tracing_enabled: config.tracing_enabled,
        metrics_enabled: config.metrics_enabled,
        context_propagation_enabled: config.context_propagation_enabled,
        debug_enabled: config.debug_enabled,
    };
    let resolved = Arc::new(Config::resolve(&overrides));
    resolved.seed_global();

    let provider = if resolved.tracing_enabled {
        if resolved.context_propagation_enabled {
            global::set_text_map_propagator(B3Propagator::new());
        }
        config.tracer_provider.map(|provider| {
            if config.set_global_provider {
                global::set_tracer_provider(provider.clone());
            }
            Arc::new(provider)
        })
    } else {
        None
    };

    let reporter = if resolved.metrics_enabled {
        match Reporter::from_config(&resolved) {
            Ok(reporter) => Some(Arc::new(reporter)),
            Err(error) => {
                LOGGER.error(format!("failed to initialize metrics reporter: {}", error));
                None
            }
        }
    } else {
        None
    };

    LOGGER.debug(format!(
        "telemetry initialized: tracing={}, metrics={}, propagation={}",
        resolved.tracing_enabled, resolved.metrics_enabled, resolved.context_propagation_enabled
    ));

    Telemetry::new(
        resolved,
        reporter,
        provider,
        Arc::new(config.extra_span_tags),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::env_vars;
    use sealed_test::prelude::*;
    use std::env;

    fn scrub_env() {
        for (key, _) in env::vars_os() {
            let key = key.to_string_lossy().into_owned();
            if key.starts_with("SIGNALFX_")
                || key == "CONNECTION_LEASE_TIMEOUT"
                || key == "DNS_REFRESH_TIMEOUT"
                || key == "AWS_LAMBDA_FUNCTION_NAME"
                || key == "AWS_EXECUTION_ENV"
            {
                env::remove_var(&key);
            }
        }
    }

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert!(config.tracing_enabled.is_none());
        assert!(config.metrics_enabled.is_none());
        assert!(config.set_global_provider);
        assert!(config.extra_span_tags.is_empty());
        assert!(config.tracer_provider.is_none());
    }

    #[sealed_test]
    fn test_init_with_defaults() {
        scrub_env();
        let telemetry = init_telemetry(TelemetryConfig::default());

        assert!(telemetry.config.tracing_enabled);
        assert!(!telemetry.config.metrics_enabled);
        assert!(telemetry.is_enabled());
        assert!(telemetry.reporter.is_none());
        assert!(telemetry.provider.is_none());
    }

    #[sealed_test]
    fn test_init_builds_reporter_when_metrics_enabled() {
        scrub_env();
        env::set_var(env_vars::METRICS_ENABLED, "true");
        env::set_var(env_vars::AUTH_TOKEN, "test-token");

        let telemetry = init_telemetry(TelemetryConfig::default());

        assert!(telemetry.config.metrics_enabled);
        assert!(telemetry.reporter.is_some());
    }

    #[sealed_test]
    fn test_builder_overrides_apply_when_env_is_unset() {
        scrub_env();
        let telemetry = init_telemetry(
            TelemetryConfig::builder()
                .tracing_enabled(false)
                .metrics_enabled(true)
                .build(),
        );

        assert!(!telemetry.config.tracing_enabled);
        assert!(telemetry.config.metrics_enabled);
    }

    #[sealed_test]
    fn test_init_seeds_the_global_config() {
        scrub_env();
        let telemetry = init_telemetry(
            TelemetryConfig::builder()
                .tracing_enabled(false)
                .context_propagation_enabled(true)
                .build(),
        );

        // Config::global() agrees with the handle, builder fallbacks included.
        assert_eq!(Config::global(), telemetry.config.as_ref());
        assert!(!Config::global().tracing_enabled);
        assert!(Config::global().context_propagation_enabled);
    }

    #[sealed_test]
    fn test_environment_beats_builder_overrides() {
        scrub_env();
        env::set_var(env_vars::TRACING_ENABLED, "true");

        let telemetry = init_telemetry(
            TelemetryConfig::builder().tracing_enabled(false).build(),
        );

        assert!(telemetry.config.tracing_enabled);
    }

    #[sealed_test]
    fn test_provider_ignored_when_tracing_disabled() {
        scrub_env();
        env::set_var(env_vars::TRACING_ENABLED, "false");

        let provider = SdkTracerProvider::builder().build();
        let telemetry = init_telemetry(
            TelemetryConfig::builder().tracer_provider(provider).build(),
        );

        assert!(telemetry.provider.is_none());
        assert!(!telemetry.is_enabled());
    }

    #[sealed_test]
    fn test_supplied_provider_is_kept_for_flushing() {
        scrub_env();
        let provider = SdkTracerProvider::builder().build();
        let telemetry = init_telemetry(
            TelemetryConfig::builder()
                .tracer_provider(provider)
                .extra_span_tags(vec![("team".to_string(), "payments".to_string())])
                .build(),
        );

        assert!(telemetry.provider.is_some());
        assert_eq!(
            telemetry.extra_tags.as_ref(),
            &vec![("team".to_string(), "payments".to_string())]
        );
    }

    #[sealed_test]
    fn test_invalid_ingest_settings_disable_metrics_delivery() {
        scrub_env();
        env::set_var(env_vars::METRICS_ENABLED, "true");
        env::set_var(env_vars::AUTH_TOKEN, "test-token");
        env::set_var(env_vars::API_HOSTNAME, "not a host name");

        let telemetry = init_telemetry(TelemetryConfig::default());

        assert!(telemetry.config.metrics_enabled);
        assert!(telemetry.reporter.is_none());
    }
}
