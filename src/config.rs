//! Configuration resolution for lambda-sfx-lite.
//!
//! All settings come from environment variables with programmatic overrides as
//! a fallback: an environment value always wins, an invalid value falls back
//! to the override (or the built-in default) with a warning, and an absent
//! variable falls back silently.
//!
//! Resolution has two deliberate side effects, applied at most once per
//! process:
//!
//! - when tracing is enabled, sane Lambda defaults for a downstream SignalFx
//!   tracer are written back to the environment (set-if-absent only), so a
//!   tracer initialized later picks them up without user wiring.
//! - when metrics are enabled, ingest settings are derived from the tracing
//!   variables (`SIGNALFX_ACCESS_TOKEN`, `SIGNALFX_ENDPOINT_URL`) for users
//!   who only configured the tracing side.
//!
//! # Example
//! ```no_run
//! use lambda_sfx_lite::config::Config;
//!
//! let config = Config::global();
//! if config.metrics_enabled {
//!     println!("reporting to {}", config.endpoint_url());
//! }
//! ```

use crate::constants::{
    defaults,
    env_vars::{self, tracer},
    ingest,
};
use crate::logger::Logger;
use std::env;
use std::fmt::Display;
use std::sync::OnceLock;
use std::time::Duration;
use url::Url;

static LOGGER: Logger = Logger::const_new("config");

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Environment variable names whose values are hidden in the debug dump.
const SENSITIVE_MARKERS: [&str; 6] = ["access", "secret", "token", "password", "pwd", "auth"];

/// Resolved settings for one process.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Whether invocation spans are created.
    pub tracing_enabled: bool,
    /// Whether invocation metrics are collected and sent.
    pub metrics_enabled: bool,
    /// Whether incoming B3 headers are honored as the span parent.
    pub context_propagation_enabled: bool,
    /// Whether the environment dump was requested.
    pub debug_enabled: bool,
    /// Access token sent with every ingest request. Empty when unset.
    pub auth_token: String,
    pub api_scheme: String,
    pub api_hostname: String,
    pub api_port: u16,
    /// Upper bound on one batch send, connection setup included.
    pub send_timeout: Duration,
    pub connection_lease_timeout: Duration,
    pub dns_refresh_timeout: Duration,
}

/// Programmatic fallbacks used where the environment is silent.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub tracing_enabled: Option<bool>,
    pub metrics_enabled: Option<bool>,
    pub context_propagation_enabled: Option<bool>,
    pub debug_enabled: Option<bool>,
}

impl Config {
    /// Resolves settings from the environment alone.
    pub fn from_env() -> Self {
        Self::resolve(&ConfigOverrides::default())
    }

    /// Returns the process-wide settings, resolving them from the
    /// environment on first access.
    ///
    /// [`init_telemetry`](crate::init_telemetry) caches its resolved settings
    /// here, so reads after initialization observe any builder fallbacks too.
    pub fn global() -> &'static Config {
        CONFIG.get_or_init(Config::from_env)
    }

    /// Caches an already-resolved configuration as the process-wide value.
    ///
    /// The first resolution wins; once set, [`Config::global`] returns the
    /// cached value unchanged.
    pub(crate) fn seed_global(&self) {
        let _ = CONFIG.set(self.clone());
    }

    /// Resolves settings from the environment with programmatic fallbacks.
    pub fn resolve(overrides: &ConfigOverrides) -> Self {
        let tracing_enabled = bool_env(
            env_vars::TRACING_ENABLED,
            overrides.tracing_enabled,
            defaults::TRACING_ENABLED,
        );
        if tracing_enabled {
            seed_tracer_defaults();
        }

        let metrics_enabled = bool_env(
            env_vars::METRICS_ENABLED,
            overrides.metrics_enabled,
            defaults::METRICS_ENABLED,
        );
        if metrics_enabled {
            adapt_tracing_settings_to_metrics();
        }

        let debug_enabled = bool_env(
            env_vars::DEBUG_ENABLED,
            overrides.debug_enabled,
            defaults::DEBUG_ENABLED,
        );
        if debug_enabled {
            log_environment();
        }

        let context_propagation_enabled = bool_env(
            env_vars::CTX_PROPAGATION_ENABLED,
            overrides.context_propagation_enabled,
            defaults::CTX_PROPAGATION_ENABLED,
        );

        // Ingest settings only matter when something will be sent; resolving
        // them for a tracing-only setup stays quiet.
        let announce = metrics_enabled;
        Self {
            tracing_enabled,
            metrics_enabled,
            context_propagation_enabled,
            debug_enabled,
            auth_token: required_string_env(env_vars::AUTH_TOKEN, announce),
            api_scheme: string_env(env_vars::API_SCHEME, defaults::API_SCHEME, announce),
            api_hostname: string_env(env_vars::API_HOSTNAME, defaults::API_HOSTNAME, announce),
            api_port: port_env(env_vars::API_PORT, defaults::API_PORT, announce),
            send_timeout: duration_ms_env(
                env_vars::SEND_TIMEOUT,
                defaults::SEND_TIMEOUT,
                announce,
            ),
            connection_lease_timeout: duration_ms_env(
                env_vars::CONNECTION_LEASE_TIMEOUT,
                defaults::CONNECTION_LEASE_TIMEOUT,
                announce,
            ),
            dns_refresh_timeout: duration_ms_env(
                env_vars::DNS_REFRESH_TIMEOUT,
                defaults::DNS_REFRESH_TIMEOUT,
                announce,
            ),
        }
    }

    /// Full URL of the datapoint ingest endpoint.
    pub fn endpoint_url(&self) -> String {
        format!(
            "{}://{}:{}{}",
            self.api_scheme, self.api_hostname, self.api_port, ingest::DATAPOINT_PATH
        )
    }

    /// True when at least one of the pipelines is on.
    pub fn telemetry_enabled(&self) -> bool {
        self.tracing_enabled || self.metrics_enabled
    }
}

/// Sets an environment variable unless it already has a value.
pub(crate) fn env_set_if_absent(name: &str, value: &str) -> bool {
    if env::var_os(name).is_none() {
        env::set_var(name, value);
        true
    } else {
        false
    }
}

/// Writes Lambda-appropriate defaults for a downstream SignalFx tracer.
fn seed_tracer_defaults() {
    env_set_if_absent(tracer::SYNC_SEND, "true");
    env_set_if_absent(tracer::FILE_LOG_ENABLED, "false");
    env_set_if_absent(tracer::STDOUT_LOG_ENABLED, "true");
    if let Ok(function_name) = env::var(env_vars::AWS_LAMBDA_FUNCTION_NAME) {
        if !function_name.is_empty() {
            env_set_if_absent(tracer::SERVICE_NAME, &function_name);
        }
    }
}

/// Derives metric ingest settings from the tracing-side variables.
fn adapt_tracing_settings_to_metrics() {
    if let Ok(token) = env::var(tracer::ACCESS_TOKEN) {
        if !token.is_empty() {
            env_set_if_absent(env_vars::AUTH_TOKEN, &token);
        }
    }
    if let Ok(raw) = env::var(tracer::ENDPOINT_URL) {
        if raw.trim().is_empty() {
            return;
        }
        match Url::parse(&raw) {
            Ok(endpoint) => {
                env_set_if_absent(env_vars::API_SCHEME, endpoint.scheme());
                if let Some(host) = endpoint.host_str() {
                    env_set_if_absent(env_vars::API_HOSTNAME, host);
                }
                if let Some(port) = endpoint.port_or_known_default() {
                    env_set_if_absent(env_vars::API_PORT, &port.to_string());
                }
            }
            Err(error) => {
                LOGGER.warn(format!(
                    "environment variable {} has invalid value \"{}\": {}",
                    tracer::ENDPOINT_URL,
                    raw,
                    error
                ));
            }
        }
    }
}

/// Dumps the environment sorted by name, with credential-shaped values hidden.
fn log_environment() {
    let mut vars: Vec<(String, String)> = env::vars_os()
        .map(|(name, value)| {
            (
                name.to_string_lossy().into_owned(),
                value.to_string_lossy().into_owned(),
            )
        })
        .collect();
    vars.sort();

    for (name, value) in vars {
        if is_sensitive(&name) {
            LOGGER.info(format!("env.var {}=<redacted>", name));
        } else {
            LOGGER.info(format!("env.var {}={}", name, value));
        }
    }
}

fn is_sensitive(name: &str) -> bool {
    let lower = name.to_lowercase();
    SENSITIVE_MARKERS
        .iter()
        .any(|marker| lower.contains(marker))
}

fn bool_env(name: &str, configured: Option<bool>, default: bool) -> bool {
    let fallback = configured.unwrap_or(default);
    match env::var(name) {
        Ok(raw) => match parse_bool(raw.trim()) {
            Some(value) => value,
            None => {
                warn_invalid(name, &raw, &fallback);
                fallback
            }
        },
        Err(_) => fallback,
    }
}

/// Accepts integers (non-zero is true) and case-insensitive boolean literals.
fn parse_bool(raw: &str) -> Option<bool> {
    if let Ok(number) = raw.parse::<i64>() {
        return Some(number != 0);
    }
    match raw.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn string_env(name: &str, default: &str, announce: bool) -> String {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => {
            if announce {
                warn_unset(name, &default);
            }
            default.to_string()
        }
    }
}

fn required_string_env(name: &str, announce: bool) -> String {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => {
            if announce {
                LOGGER.error(format!("environment variable {} is not set", name));
            }
            String::new()
        }
    }
}

fn port_env(name: &str, default: u16, announce: bool) -> u16 {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => match raw.trim().parse::<u16>() {
            Ok(port) => port,
            Err(_) => {
                warn_invalid(name, &raw, &default);
                default
            }
        },
        _ => {
            if announce {
                warn_unset(name, &default);
            }
            default
        }
    }
}

fn duration_ms_env(name: &str, default: Duration, announce: bool) -> Duration {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => match raw.trim().parse::<u64>() {
            Ok(millis) => Duration::from_millis(millis),
            Err(_) => {
                warn_invalid(name, &raw, &default.as_millis());
                default
            }
        },
        _ => {
            if announce {
                warn_unset(name, &default.as_millis());
            }
            default
        }
    }
}

fn warn_invalid(name: &str, raw: &str, fallback: &dyn Display) {
    LOGGER.warn(format!(
        "environment variable {} has invalid value \"{}\", using the default ({})",
        name, raw, fallback
    ));
}

fn warn_unset(name: &str, default: &dyn Display) {
    LOGGER.warn(format!(
        "environment variable {} is not set, using the default ({})",
        name, default
    ));
}
