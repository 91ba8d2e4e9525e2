//! Kontent.ai Management API Client
//!
//! # Creating new api client
//!
//! - [with_config](KontentClient::with_config) - create client with configuration
//! - [with_client](KontentClient::with_client) - create client with configuration and custom reqwest client
//!
//! # Configuration
//!
//! - [get_config](KontentClient::get_config) - returns configuration
//! - [http_metrics](KontentClient::http_metrics) - returns request counters
//!

use std::{fmt, sync::Arc};

use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{
    KONTENT_MANAGEMENT_URL, Result,
    config::{
        KONTENT_API_KEY_ENV, KONTENT_ENVIRONMENT_ID_ENV, KONTENT_URL_ENV,
        RATE_LIMIT_MAX_RETRIES_DEFAULT,
    },
    http_client::{HttpClient, HttpMetricsSnapshot},
    prelude::*,
};

/// Management api key. Cleared from memory on drop and never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretApiKey(String);

impl SecretApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub(crate) fn set_auth_header(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.bearer_auth(&self.0)
    }
}

impl fmt::Debug for SecretApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretApiKey(***)")
    }
}

/// Configuration for the Kontent client: endpoint url, target environment, and credentials.
///
/// ```rust,no_run
/// use kontent::prelude::*;
/// # fn create_client() -> Result<KontentClient, KontentError> {
/// let config = ClientConfig::default()
///     .environment_id("975bf280-fd91-488c-994c-2f04416e5ee3")
///     .api_key("ew0KICAiYWxnIjo...");
/// let client = KontentClient::with_config(config)?;
/// # Ok(client)
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base url for all management api requests.
    /// If not provided in config, url is determined by:
    /// * The environment variable `KONTENT_URL`, if defined, or
    /// * `https://manage.kontent.ai/v2`
    pub base_url: String,

    /// Environment (project) id. Defaults to `KONTENT_ENVIRONMENT_ID`.
    pub environment_id: String,

    /// Management api key. Defaults to `KONTENT_API_KEY`.
    pub api_key: Option<SecretApiKey>,

    /// Maximum consecutive 429 retries before failing (0 disables the cap).
    pub rate_limit_max_retries: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var(KONTENT_URL_ENV)
                .unwrap_or_else(|_| KONTENT_MANAGEMENT_URL.to_string()),
            environment_id: std::env::var(KONTENT_ENVIRONMENT_ID_ENV).unwrap_or_default(),
            api_key: std::env::var(KONTENT_API_KEY_ENV).ok().map(SecretApiKey::new),
            rate_limit_max_retries: RATE_LIMIT_MAX_RETRIES_DEFAULT,
        }
    }
}

impl ClientConfig {
    /// Sets the base url.
    #[must_use]
    pub fn base_url(self, base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..self
        }
    }

    /// Sets the environment id.
    #[must_use]
    pub fn environment_id(self, environment_id: impl Into<String>) -> Self {
        Self {
            environment_id: environment_id.into(),
            ..self
        }
    }

    /// Sets the management api key.
    #[must_use]
    pub fn api_key(self, api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(SecretApiKey::new(api_key)),
            ..self
        }
    }

    #[must_use]
    pub fn rate_limit_max_retries(self, rate_limit_max_retries: u32) -> Self {
        Self {
            rate_limit_max_retries,
            ..self
        }
    }
}

/// Async client for the Kontent.ai Management API.
pub struct KontentClient {
    pub(crate) client: Arc<HttpClient>,
    pub(crate) config: ClientConfig,
}

impl fmt::Debug for KontentClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KontentClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl KontentClient {
    /// Creates a new client with the provided configuration.
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        Self::with_client(reqwest::Client::builder(), config)
    }

    /// Creates a client from a `reqwest::ClientBuilder` and configuration.
    /// ClientBuilder can be customized with timeouts, proxies, user_agent, etc.
    pub fn with_client(builder: reqwest::ClientBuilder, config: ClientConfig) -> Result<Self> {
        if config.environment_id.trim().is_empty() {
            return Err(KontentError::Validation {
                message: format!(
                    "environment id is required (set {KONTENT_ENVIRONMENT_ID_ENV} or pass it explicitly)"
                ),
            });
        }
        debug!(url=?config.base_url, environment=%config.environment_id, "new client");
        let client = HttpClient::new(
            builder,
            config.base_url.clone(),
            config.environment_id.clone(),
            config.rate_limit_max_retries,
        )?;
        if let Some(key) = config.api_key.as_ref().filter(|key| !key.is_empty()) {
            client.set_api_key(key);
        }
        Ok(Self {
            client: Arc::new(client),
            config,
        })
    }

    /// Returns the configuration.
    pub fn get_config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the environment id this client targets.
    pub fn environment_id(&self) -> &str {
        &self.config.environment_id
    }

    /// Returns true if an api key has been set.
    pub fn has_key(&self) -> bool {
        self.client.has_key()
    }

    /// Sets or replaces the api key used for subsequent requests.
    pub fn set_api_key(&self, api_key: &SecretApiKey) {
        self.client.set_api_key(api_key);
    }

    /// Returns a snapshot of current HTTP metrics.
    ///
    /// These metrics track HTTP requests made to the API server:
    /// - `total_requests`: Number of HTTP requests sent
    /// - `successful_responses`: Number of successful (2xx) responses
    /// - `errors`: Number of error responses (excluding rate limit errors)
    /// - `retries`: Number of retry attempts
    /// - `bytes_sent` and `bytes_received`: body sizes
    /// - `rate_limit_errors`: Number of rate limit (429) responses received
    /// - `rate_limit_delay_secs`: Total seconds spent waiting for rate limit backoff
    pub fn http_metrics(&self) -> HttpMetricsSnapshot {
        self.client.metrics_snapshot()
    }
}
