//! Storefront configuration.
//!
//! Values are provided by the host application. `from_env` covers the
//! common deployment case.

use crate::error::{Result, StorefrontError};
use crate::gateway::{ORDER_ID_PARAM, PAYMENT_STATUS_PARAM, ReturnStatus, SubmissionMode};
use crate::types::OrderId;
use reqwest::Url;
use std::time::Duration;

/// Environment variable holding the backend base URL.
pub const API_URL_ENV: &str = "DOKO_API_URL";
/// Environment variable holding the storefront origin.
pub const APP_ORIGIN_ENV: &str = "DOKO_APP_ORIGIN";
/// Environment variable holding the notification TTL in milliseconds.
pub const NOTIFICATION_TTL_ENV: &str = "DOKO_NOTIFICATION_TTL_MS";

/// Storefront client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorefrontConfig {
    /// Backend base URL (e.g., `https://api.doko.example/api`).
    pub api_base_url: String,

    /// Origin the gateway returns the customer to (e.g., `https://shop.doko.example`).
    pub app_origin: String,

    /// Path of the page that handles gateway returns.
    ///
    /// Default: `/customerView`
    pub return_path: String,

    /// How gateway forms are submitted.
    ///
    /// Default: [`SubmissionMode::Redirect`]
    pub submission_mode: SubmissionMode,

    /// Auto-dismiss delay for checkout notifications. `None` keeps them
    /// until dismissed.
    ///
    /// Default: 5 seconds
    pub notification_ttl: Option<Duration>,

    /// Country pre-filled in the address form.
    ///
    /// Default: `Nepal`
    pub default_country: String,

    /// HTTP request timeout.
    ///
    /// Default: 30 seconds
    pub request_timeout: Duration,
}

impl StorefrontConfig {
    /// Create a configuration for a backend and storefront origin.
    #[must_use]
    pub fn new(api_base_url: impl Into<String>, app_origin: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            app_origin: app_origin.into(),
            ..Self::default()
        }
    }

    /// Set the return page path.
    #[must_use]
    pub fn with_return_path(mut self, path: impl Into<String>) -> Self {
        self.return_path = path.into();
        self
    }

    /// Set the gateway submission mode.
    #[must_use]
    pub const fn with_submission_mode(mut self, mode: SubmissionMode) -> Self {
        self.submission_mode = mode;
        self
    }

    /// Set (or disable) notification auto-dismissal.
    #[must_use]
    pub const fn with_notification_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.notification_ttl = ttl;
        self
    }

    /// Set the default country.
    #[must_use]
    pub fn with_default_country(mut self, country: impl Into<String>) -> Self {
        self.default_country = country.into();
        self
    }

    /// Set the HTTP request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Load configuration from the environment.
    ///
    /// `DOKO_API_URL` and `DOKO_APP_ORIGIN` are required;
    /// `DOKO_NOTIFICATION_TTL_MS` is optional (`0` disables auto-dismissal).
    ///
    /// # Errors
    ///
    /// Returns [`StorefrontError::Configuration`] if a required variable is
    /// missing or a value does not parse.
    pub fn from_env() -> Result<Self> {
        let api_base_url = std::env::var(API_URL_ENV)
            .map_err(|_| StorefrontError::Configuration(format!("{API_URL_ENV} is not set")))?;
        let app_origin = std::env::var(APP_ORIGIN_ENV)
            .map_err(|_| StorefrontError::Configuration(format!("{APP_ORIGIN_ENV} is not set")))?;

        let mut config = Self::new(api_base_url, app_origin);
        if let Ok(raw) = std::env::var(NOTIFICATION_TTL_ENV) {
            let millis: u64 = raw.trim().parse().map_err(|_| {
                StorefrontError::Configuration(format!(
                    "{NOTIFICATION_TTL_ENV} must be a number of milliseconds, got '{raw}'"
                ))
            })?;
            config.notification_ttl = (millis > 0).then(|| Duration::from_millis(millis));
        }

        config.validate()?;
        Ok(config)
    }

    /// Check that both URLs parse.
    ///
    /// # Errors
    ///
    /// Returns [`StorefrontError::Configuration`] naming the invalid URL.
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.api_base_url).map_err(|e| {
            StorefrontError::Configuration(format!("invalid api base url: {e}"))
        })?;
        Url::parse(&self.app_origin)
            .map_err(|e| StorefrontError::Configuration(format!("invalid app origin: {e}")))?;
        Ok(())
    }

    /// Build the URL the gateway sends the customer back to.
    ///
    /// Shape: `{app_origin}{return_path}?paymentStatus=<outcome>&orderId=<id>`.
    ///
    /// # Errors
    ///
    /// Returns [`StorefrontError::Configuration`] if the origin is not a valid URL.
    pub fn return_url(&self, outcome: ReturnStatus, order_id: &OrderId) -> Result<Url> {
        let origin = self.app_origin.trim_end_matches('/');
        let mut url = Url::parse(&format!("{origin}{}", self.return_path))
            .map_err(|e| StorefrontError::Configuration(format!("invalid app origin: {e}")))?;
        url.query_pairs_mut()
            .append_pair(PAYMENT_STATUS_PARAM, outcome.as_str())
            .append_pair(ORDER_ID_PARAM, order_id.as_str());
        Ok(url)
    }
}

impl Default for StorefrontConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080/api".to_string(),
            app_origin: "http://localhost:2025".to_string(),
            return_path: "/customerView".to_string(),
            submission_mode: SubmissionMode::Redirect,
            notification_ttl: Some(Duration::from_secs(5)),
            default_country: "Nepal".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn return_url_carries_outcome_and_order() {
        let config = StorefrontConfig::new("https://api.example.com", "https://shop.example.com/");
        let url = config
            .return_url(ReturnStatus::Success, &OrderId::new("o-42"))
            .map(String::from);

        assert_eq!(
            url.ok().as_deref(),
            Some("https://shop.example.com/customerView?paymentStatus=success&orderId=o-42")
        );
    }

    #[test]
    fn builder_overrides_defaults() {
        let config = StorefrontConfig::default()
            .with_return_path("/checkout/return")
            .with_notification_ttl(None)
            .with_submission_mode(SubmissionMode::NewWindow);

        assert_eq!(config.return_path, "/checkout/return");
        assert_eq!(config.notification_ttl, None);
        assert_eq!(config.submission_mode, SubmissionMode::NewWindow);
        assert_eq!(config.default_country, "Nepal");
    }

    #[test]
    fn validate_rejects_relative_origin() {
        let config = StorefrontConfig::new("https://api.example.com", "shop.example.com");
        assert!(matches!(
            config.validate(),
            Err(StorefrontError::Configuration(_))
        ));
    }
}
