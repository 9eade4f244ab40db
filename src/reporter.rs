//! Datapoint delivery to the SignalFx ingest endpoint.
//!
//! One [`Reporter`] is built per process and shared across invocations so the
//! underlying connection pool is reused. Each invocation's batch is posted as
//! a single protobuf-encoded request; any non-success response is surfaced as
//! an error for the caller to log, never to propagate into the handler.

use crate::config::Config;
use crate::constants::ingest;
use crate::logger::Logger;
use crate::proto::DataPointUploadMessage;
use prost::Message;
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;
use url::Url;

static LOGGER: Logger = Logger::const_new("reporter");

/// Failure modes of one batch send.
#[derive(Debug, Error)]
pub enum SendError {
    /// The endpoint URL assembled from configuration is not a valid URL.
    #[error("invalid ingest endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
    /// The request never produced a response: connect failure, timeout, TLS.
    #[error("failed to send datapoints: {0}")]
    Transport(#[from] reqwest::Error),
    /// The endpoint answered with a non-success status.
    #[error("ingest endpoint rejected the batch: status {status}")]
    Rejected { status: u16, body: String },
}

impl SendError {
    /// True when the endpoint refused the configured access token.
    pub fn is_invalid_token(&self) -> bool {
        matches!(
            self,
            SendError::Rejected {
                status: 401 | 403,
                ..
            }
        )
    }
}

/// Posts datapoint batches to the configured ingest endpoint.
pub struct Reporter {
    client: reqwest::Client,
    endpoint: Url,
    auth_token: String,
}

impl Reporter {
    /// Builds a reporter from resolved configuration.
    pub fn from_config(config: &Config) -> Result<Self, SendError> {
        let endpoint = Url::parse(&config.endpoint_url())?;
        // Idle connections are dropped at the shorter of the two reuse
        // windows so DNS changes are picked up on the next request.
        let idle = config
            .connection_lease_timeout
            .min(config.dns_refresh_timeout);
        let client = reqwest::Client::builder()
            .timeout(config.send_timeout)
            .pool_idle_timeout(idle)
            .build()?;

        Ok(Self {
            client,
            endpoint,
            auth_token: config.auth_token.clone(),
        })
    }

    /// Sends one batch, bounded by the configured send timeout.
    pub async fn send(&self, batch: &DataPointUploadMessage) -> Result<(), SendError> {
        let payload = batch.encode_to_vec();
        LOGGER.debug(format!(
            "sending {} datapoints to {}",
            batch.datapoints.len(),
            self.endpoint
        ));

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, ingest::CONTENT_TYPE_PROTOBUF)
            .header(ingest::TOKEN_HEADER, &self.auth_token)
            .body(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".to_string());
            return Err(SendError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}
