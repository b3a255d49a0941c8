//! Storefront backend client over HTTP.

use crate::config::StorefrontConfig;
use crate::error::{Result, StorefrontError};
use crate::providers::{CartApi, OrderApi, PaymentApi, WishlistApi};
use crate::types::{
    AddToCartRequest, CartItemId, CartLineItem, CartSnapshot, CreatedOrder, MerchantId,
    OrderDraft, OrderId, PaymentForm, PaymentInitRequest, PaymentMethod, PaymentStatus,
    ProductId, WishlistItem,
};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;

/// Backend client implementing every storefront API trait.
///
/// Cheap to clone: the underlying connection pool is shared.
#[derive(Debug, Clone)]
pub struct HttpStorefrontApi {
    client: Client,
    base_url: Url,
    bearer_token: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WishlistCheck {
    in_wishlist: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentStatusBody {
    payment_status: PaymentStatus,
}

#[derive(serde::Serialize)]
struct QuantityBody {
    quantity: u32,
}

impl HttpStorefrontApi {
    /// Create a client for the configured backend.
    ///
    /// # Errors
    ///
    /// Returns [`StorefrontError::Configuration`] if the base URL is invalid
    /// or the HTTP client cannot be built.
    pub fn new(config: &StorefrontConfig) -> Result<Self> {
        let base_url = Url::parse(&config.api_base_url)
            .map_err(|e| StorefrontError::Configuration(format!("invalid api base url: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(StorefrontError::Configuration(format!(
                "api base url cannot have paths: {base_url}"
            )));
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| StorefrontError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            bearer_token: None,
        })
    }

    /// Create a client from `DOKO_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`StorefrontError::Configuration`] if the environment is incomplete.
    pub fn from_env() -> Result<Self> {
        Self::new(&StorefrontConfig::from_env()?)
    }

    /// Authenticate requests with the customer's session token.
    #[must_use]
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // cannot_be_a_base was rejected in new()
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let url = self.endpoint(segments);
        tracing::debug!(%method, %url, "storefront request");

        let builder = self.client.request(method, url);
        match &self.bearer_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn execute(builder: RequestBuilder) -> Result<Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| StorefrontError::RequestFailed(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::UNAUTHORIZED => Err(StorefrontError::Unauthorized),
            status => {
                let body = response.text().await.unwrap_or_default();
                tracing::debug!(status = status.as_u16(), %body, "storefront request rejected");
                Err(StorefrontError::Api {
                    status: status.as_u16(),
                    message: error_message(status, &body),
                })
            },
        }
    }

    async fn fetch_json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T> {
        Self::execute(builder)
            .await?
            .json::<T>()
            .await
            .map_err(|e| StorefrontError::ResponseParseFailed(e.to_string()))
    }

    async fn fetch_empty(builder: RequestBuilder) -> Result<()> {
        Self::execute(builder).await.map(drop)
    }
}

/// Pull the backend's message out of an error body, falling back to the
/// status reason.
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.message.or(parsed.error))
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        })
}

impl CartApi for HttpStorefrontApi {
    async fn fetch_cart(&self) -> Result<CartSnapshot> {
        Self::fetch_json(self.request(Method::GET, &["cart"])).await
    }

    async fn add_item(&self, request: &AddToCartRequest) -> Result<CartLineItem> {
        let line: CartLineItem =
            Self::fetch_json(self.request(Method::POST, &["cart", "items"]).json(request)).await?;
        Ok(line.normalized())
    }

    async fn update_item(&self, id: &CartItemId, quantity: u32) -> Result<CartLineItem> {
        let line: CartLineItem = Self::fetch_json(
            self.request(Method::PATCH, &["cart", "items", id.as_str()])
                .json(&QuantityBody { quantity }),
        )
        .await?;
        Ok(line.normalized())
    }

    async fn remove_item(&self, id: &CartItemId) -> Result<()> {
        Self::fetch_empty(self.request(Method::DELETE, &["cart", "items", id.as_str()])).await
    }

    async fn clear_cart(&self) -> Result<()> {
        Self::fetch_empty(self.request(Method::DELETE, &["cart"])).await
    }
}

impl WishlistApi for HttpStorefrontApi {
    async fn fetch_wishlist(&self) -> Result<Vec<WishlistItem>> {
        Self::fetch_json(self.request(Method::GET, &["wishlist"])).await
    }

    async fn add_to_wishlist(&self, product_id: &ProductId) -> Result<WishlistItem> {
        Self::fetch_json(self.request(Method::POST, &["wishlist", product_id.as_str()])).await
    }

    async fn remove_from_wishlist(&self, product_id: &ProductId) -> Result<()> {
        Self::fetch_empty(self.request(Method::DELETE, &["wishlist", product_id.as_str()])).await
    }

    async fn clear_wishlist(&self) -> Result<()> {
        Self::fetch_empty(self.request(Method::DELETE, &["wishlist"])).await
    }

    async fn is_in_wishlist(&self, product_id: &ProductId) -> Result<bool> {
        let check: WishlistCheck = Self::fetch_json(
            self.request(Method::GET, &["wishlist", "check", product_id.as_str()]),
        )
        .await?;
        Ok(check.in_wishlist)
    }
}

impl OrderApi for HttpStorefrontApi {
    async fn create_order(&self, draft: &OrderDraft) -> Result<CreatedOrder> {
        Self::fetch_json(self.request(Method::POST, &["orders"]).json(draft)).await
    }

    async fn payment_status(&self, order_id: &OrderId) -> Result<PaymentStatus> {
        let body: PaymentStatusBody = Self::fetch_json(self.request(
            Method::GET,
            &["orders", order_id.as_str(), "payment-status"],
        ))
        .await?;
        Ok(body.payment_status)
    }
}

impl PaymentApi for HttpStorefrontApi {
    async fn payment_methods(&self, merchant_id: &MerchantId) -> Result<Vec<PaymentMethod>> {
        let names: Vec<String> = Self::fetch_json(self.request(
            Method::GET,
            &["shops", merchant_id.as_str(), "payment-methods"],
        ))
        .await?;

        // Merchants may enable gateways this client cannot drive.
        let mut methods: Vec<PaymentMethod> = names
            .iter()
            .filter_map(|name| name.parse::<PaymentMethod>().ok())
            .collect();
        methods.sort_unstable();
        methods.dedup();
        Ok(methods)
    }

    async fn initiate_payment(&self, request: &PaymentInitRequest) -> Result<PaymentForm> {
        Self::fetch_json(self.request(Method::POST, &["payments", "initiate"]).json(request)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_appends_encoded_segments() {
        let api = HttpStorefrontApi::new(&StorefrontConfig::new(
            "https://api.example.com/api/",
            "https://shop.example.com",
        ));
        let url = api.map(|api| api.endpoint(&["cart", "items", "a b"]).to_string());
        assert_eq!(
            url.ok().as_deref(),
            Some("https://api.example.com/api/cart/items/a%20b")
        );
    }

    #[test]
    fn error_message_prefers_backend_message() {
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, r#"{"status":"error","message":"Out of stock"}"#),
            "Out of stock"
        );
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, "<html>oops</html>"),
            "Bad Request"
        );
    }

    #[test]
    fn rejects_unparseable_base_url() {
        let config = StorefrontConfig::new("not a url", "https://shop.example.com");
        assert!(matches!(
            HttpStorefrontApi::new(&config),
            Err(StorefrontError::Configuration(_))
        ));
    }
}
