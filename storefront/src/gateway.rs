//! Payment gateway bridge.
//!
//! Hosted gateways (eSewa, Khalti) are reached by an HTML form POST to the
//! gateway's URL with server-signed fields, after which the customer lands
//! back on the storefront with `paymentStatus` / `orderId` query parameters.
//!
//! Everything here is pure data: [`FormPost`] describes the submission and
//! [`GatewayReturn`] interprets the return URL. Performing the navigation is
//! the host's job, through [`crate::providers::GatewayBridge`].

use crate::error::{Result, StorefrontError};
use crate::types::{OrderId, PaymentForm};
use reqwest::Url;
use std::collections::BTreeMap;

/// Query parameter carrying the gateway outcome.
pub const PAYMENT_STATUS_PARAM: &str = "paymentStatus";
/// Query parameter carrying the order id.
pub const ORDER_ID_PARAM: &str = "orderId";
/// Query parameter carrying the gateway transaction reference.
pub const TRANSACTION_ID_PARAM: &str = "transactionId";

/// How the host should perform a [`FormPost`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubmissionMode {
    /// Navigate the current page to the gateway.
    #[default]
    Redirect,
    /// Post into an invisible frame (kiosk / embedded hosts).
    HiddenFrame,
    /// Open the gateway in a new window or tab.
    NewWindow,
}

/// A form submission to a payment gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormPost {
    /// Gateway endpoint.
    pub url: String,
    /// Signed fields, posted as hidden inputs.
    pub fields: BTreeMap<String, String>,
}

impl FormPost {
    /// Describe the submission for a signed payment form.
    ///
    /// # Errors
    ///
    /// Returns [`StorefrontError::Gateway`] if the form URL or fields are missing.
    pub fn from_payment_form(form: PaymentForm) -> Result<Self> {
        if form.form_url.trim().is_empty() {
            return Err(StorefrontError::Gateway(
                "Invalid payment response from server".to_string(),
            ));
        }
        if form.fields.is_empty() {
            return Err(StorefrontError::Gateway(
                "Invalid payment response from server".to_string(),
            ));
        }
        Ok(Self {
            url: form.form_url,
            fields: form.fields,
        })
    }

    /// Render a self-submitting HTML page for hosts that can only show HTML.
    #[must_use]
    pub fn to_auto_submit_html(&self) -> String {
        let inputs: String = self
            .fields
            .iter()
            .map(|(name, value)| {
                format!(
                    "    <input type=\"hidden\" name=\"{}\" value=\"{}\">\n",
                    escape_html(name),
                    escape_html(value)
                )
            })
            .collect();

        format!(
            "<!DOCTYPE html>\n<html>\n<body>\n\
             <form id=\"gateway-form\" method=\"POST\" action=\"{}\">\n{inputs}</form>\n\
             <script>document.getElementById('gateway-form').submit();</script>\n\
             </body>\n</html>\n",
            escape_html(&self.url)
        )
    }
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Outcome hint carried by the return URL.
///
/// A hint only: the backend's payment record is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnStatus {
    /// The gateway reported success.
    Success,
    /// The customer cancelled or the payment was declined.
    Failure,
    /// The backend callback could not process the gateway response.
    Error,
}

impl ReturnStatus {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "success" => Some(Self::Success),
            "failure" => Some(Self::Failure),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Wire value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Error => "error",
        }
    }
}

/// A parsed gateway return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayReturn {
    /// Outcome hint.
    pub status: ReturnStatus,
    /// Order the return refers to, when present.
    pub order_id: Option<OrderId>,
    /// Gateway transaction reference, when present.
    pub transaction_id: Option<String>,
    /// The same URL with the return parameters removed.
    pub cleaned_url: Url,
}

impl GatewayReturn {
    /// Parse a return URL.
    ///
    /// Returns `Ok(None)` when the URL carries no `paymentStatus` parameter
    /// (an ordinary page load).
    ///
    /// # Errors
    ///
    /// Returns [`StorefrontError::InvalidReturnUrl`] if the URL cannot be
    /// parsed or `paymentStatus` has an unknown value.
    pub fn parse(url: &str) -> Result<Option<Self>> {
        let parsed =
            Url::parse(url).map_err(|e| StorefrontError::InvalidReturnUrl(e.to_string()))?;

        let mut status = None;
        let mut order_id = None;
        let mut transaction_id = None;
        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                PAYMENT_STATUS_PARAM => status = Some(value.into_owned()),
                ORDER_ID_PARAM if !value.is_empty() => order_id = Some(OrderId::new(value)),
                TRANSACTION_ID_PARAM if !value.is_empty() => {
                    transaction_id = Some(value.into_owned());
                },
                _ => {},
            }
        }

        let Some(raw_status) = status else {
            return Ok(None);
        };
        let status = ReturnStatus::parse(&raw_status).ok_or_else(|| {
            StorefrontError::InvalidReturnUrl(format!("unknown paymentStatus '{raw_status}'"))
        })?;

        Ok(Some(Self {
            status,
            order_id,
            transaction_id,
            cleaned_url: strip_return_params(&parsed),
        }))
    }
}

/// Remove the gateway return parameters, keeping every other query pair.
#[must_use]
pub fn strip_return_params(url: &Url) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| {
            !matches!(
                key.as_ref(),
                PAYMENT_STATUS_PARAM | ORDER_ID_PARAM | TRANSACTION_ID_PARAM
            )
        })
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut cleaned = url.clone();
    if kept.is_empty() {
        cleaned.set_query(None);
    } else {
        cleaned.query_pairs_mut().clear().extend_pairs(kept);
    }
    cleaned
}
