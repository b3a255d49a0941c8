//! In-memory storefront backend.

use crate::error::{Result, StorefrontError};
use crate::providers::{CartApi, OrderApi, PaymentApi, WishlistApi};
use crate::types::{
    AddToCartRequest, CartItemId, CartLineItem, CartSnapshot, CartSummary, CreatedOrder,
    MerchantId, OrderDraft, OrderId, PaymentForm, PaymentInitRequest, PaymentMethod,
    PaymentStatus, ProductId, ShopCartGroup, WishlistItem,
};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Form URL returned for eSewa payments.
pub const ESEWA_FORM_URL: &str = "https://rc-epay.esewa.com.np/api/epay/main/v2/form";
/// Form URL returned for Khalti payments.
pub const KHALTI_FORM_URL: &str = "https://test-pay.khalti.com/";

/// Backend operation, used to target failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `GET /cart`
    FetchCart,
    /// `POST /cart/items`
    AddItem,
    /// `PATCH /cart/items/{id}`
    UpdateItem,
    /// `DELETE /cart/items/{id}`
    RemoveItem,
    /// `DELETE /cart`
    ClearCart,
    /// `GET /wishlist`
    FetchWishlist,
    /// `POST /wishlist/{id}`
    AddToWishlist,
    /// `DELETE /wishlist/{id}`
    RemoveFromWishlist,
    /// `DELETE /wishlist`
    ClearWishlist,
    /// `GET /wishlist/check/{id}`
    CheckWishlist,
    /// `POST /orders`
    CreateOrder,
    /// `GET /orders/{id}/payment-status`
    PaymentStatus,
    /// `GET /shops/{id}/payment-methods`
    PaymentMethods,
    /// `POST /payments/initiate`
    InitiatePayment,
}

/// A product the mock backend can put in carts and wishlists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogProduct {
    /// Product id.
    pub product_id: ProductId,
    /// Display name.
    pub name: String,
    /// Selling price.
    pub price: Decimal,
    /// Pre-discount price.
    pub original_price: Option<Decimal>,
    /// Owning merchant.
    pub merchant_id: MerchantId,
    /// Owning merchant name.
    pub merchant_name: String,
    /// Units in stock.
    pub stock: u32,
}

impl CatalogProduct {
    /// Create a catalog entry.
    #[must_use]
    pub fn new(
        product_id: impl Into<ProductId>,
        name: impl Into<String>,
        price: Decimal,
        merchant_id: impl Into<MerchantId>,
        stock: u32,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            name: name.into(),
            price,
            original_price: None,
            merchant_id: merchant_id.into(),
            merchant_name: String::new(),
            stock,
        }
    }

    /// Set the pre-discount price.
    #[must_use]
    pub const fn with_original_price(mut self, price: Decimal) -> Self {
        self.original_price = Some(price);
        self
    }
}

#[derive(Debug, Default)]
struct Inner {
    catalog: HashMap<ProductId, CatalogProduct>,
    cart: Vec<CartLineItem>,
    wishlist: Vec<WishlistItem>,
    payment_methods: HashMap<MerchantId, Vec<PaymentMethod>>,
    order_statuses: HashMap<OrderId, PaymentStatus>,
    failures: HashMap<Operation, StorefrontError>,
    next_id: u64,

    update_calls: Vec<(CartItemId, u32)>,
    in_flight: HashMap<CartItemId, usize>,
    max_in_flight: HashMap<CartItemId, usize>,
    created_orders: Vec<OrderDraft>,
    initiated_payments: Vec<PaymentInitRequest>,
    wishlist_calls: Vec<(Operation, ProductId)>,
}

impl Inner {
    fn take_failure(&mut self, operation: Operation) -> Result<()> {
        self.failures.remove(&operation).map_or(Ok(()), Err)
    }

    fn product(&self, product_id: &ProductId) -> Result<CatalogProduct> {
        self.catalog
            .get(product_id)
            .cloned()
            .ok_or_else(|| not_found("Product not found"))
    }

    fn line_from_catalog(&mut self, product: &CatalogProduct, request: &AddToCartRequest) -> CartLineItem {
        self.next_id += 1;
        let mut line = CartLineItem::new(
            CartItemId::new(format!("ci-{}", self.next_id)),
            product.product_id.clone(),
            product.name.clone(),
            product.price,
            request.quantity,
        )
        .with_merchant(product.merchant_id.clone(), product.merchant_name.clone())
        .with_stock(product.stock);
        if let Some(original) = product.original_price {
            line = line.with_original_price(original);
        }
        if let Some(variant) = &request.selected_variant {
            line = line.with_variant(variant.clone());
        }
        line
    }
}

fn not_found(message: &str) -> StorefrontError {
    StorefrontError::Api {
        status: 404,
        message: message.to_string(),
    }
}

fn bad_request(message: impl Into<String>) -> StorefrontError {
    StorefrontError::Api {
        status: 400,
        message: message.into(),
    }
}

/// In-memory backend implementing every storefront API trait.
///
/// Seed it with catalog products, cart lines and enabled payment methods;
/// inject one-shot failures per [`Operation`]; add latency to exercise
/// interleavings. Every clone shares the same data.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    inner: Arc<Mutex<Inner>>,
    latency: Option<Duration>,
}

impl MockBackend {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn pause(latency: Option<Duration>) {
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    // ═══════════════════════════════════════════════════════════
    // Seeding
    // ═══════════════════════════════════════════════════════════

    /// Add a product to the catalog.
    #[must_use]
    pub fn with_product(self, product: CatalogProduct) -> Self {
        self.lock()
            .catalog
            .insert(product.product_id.clone(), product);
        self
    }

    /// Put a line in the cart.
    #[must_use]
    pub fn with_cart_line(self, line: CartLineItem) -> Self {
        self.lock().cart.push(line);
        self
    }

    /// Put an entry in the wishlist.
    #[must_use]
    pub fn with_wishlist_item(self, item: WishlistItem) -> Self {
        self.lock().wishlist.push(item);
        self
    }

    /// Set the methods a merchant has enabled (all methods by default).
    #[must_use]
    pub fn with_payment_methods(self, merchant_id: impl Into<MerchantId>, methods: Vec<PaymentMethod>) -> Self {
        self.lock().payment_methods.insert(merchant_id.into(), methods);
        self
    }

    /// Make the next call of `operation` fail with `error`.
    pub fn fail_next(&self, operation: Operation, error: StorefrontError) {
        self.lock().failures.insert(operation, error);
    }

    /// Set the backend's payment status for an order.
    pub fn set_payment_status(&self, order_id: &OrderId, status: PaymentStatus) {
        self.lock().order_statuses.insert(order_id.clone(), status);
    }

    // ═══════════════════════════════════════════════════════════
    // Inspection
    // ═══════════════════════════════════════════════════════════

    /// Current cart lines, in insertion order.
    #[must_use]
    pub fn cart_lines(&self) -> Vec<CartLineItem> {
        self.lock().cart.clone()
    }

    /// Current wishlist product ids.
    #[must_use]
    pub fn wishlist_products(&self) -> Vec<ProductId> {
        self.lock()
            .wishlist
            .iter()
            .map(|item| item.product_id.clone())
            .collect()
    }

    /// Every `PATCH /cart/items/{id}` received, in arrival order.
    #[must_use]
    pub fn update_calls(&self) -> Vec<(CartItemId, u32)> {
        self.lock().update_calls.clone()
    }

    /// Highest number of simultaneous quantity updates seen for a line.
    #[must_use]
    pub fn max_concurrent_updates(&self, id: &CartItemId) -> usize {
        self.lock().max_in_flight.get(id).copied().unwrap_or(0)
    }

    /// Wishlist add/remove calls, in arrival order.
    #[must_use]
    pub fn wishlist_calls(&self) -> Vec<(Operation, ProductId)> {
        self.lock().wishlist_calls.clone()
    }

    /// Orders received by `POST /orders`.
    #[must_use]
    pub fn created_orders(&self) -> Vec<OrderDraft> {
        self.lock().created_orders.clone()
    }

    /// Requests received by `POST /payments/initiate`.
    #[must_use]
    pub fn initiated_payments(&self) -> Vec<PaymentInitRequest> {
        self.lock().initiated_payments.clone()
    }
}

impl CartApi for MockBackend {
    fn fetch_cart(&self) -> impl Future<Output = Result<CartSnapshot>> + Send {
        let this = self.clone();

        async move {
            Self::pause(this.latency).await;
            let mut inner = this.lock();
            inner.take_failure(Operation::FetchCart)?;

            let mut groups: Vec<ShopCartGroup> = Vec::new();
            for line in &inner.cart {
                match groups.iter_mut().find(|g| g.shop_id == line.merchant_id) {
                    Some(group) => group.items.push(line.clone()),
                    None => groups.push(ShopCartGroup {
                        shop_id: line.merchant_id.clone(),
                        items: vec![line.clone()],
                    }),
                }
            }

            Ok(CartSnapshot {
                items_by_shop: groups,
                summary: CartSummary::from_items(&inner.cart),
            })
        }
    }

    fn add_item(&self, request: &AddToCartRequest) -> impl Future<Output = Result<CartLineItem>> + Send {
        let this = self.clone();
        let request = request.clone();

        async move {
            Self::pause(this.latency).await;
            let mut inner = this.lock();
            inner.take_failure(Operation::AddItem)?;

            let variant = request.selected_variant.as_deref();
            if let Some(line) = inner
                .cart
                .iter_mut()
                .find(|line| line.matches(&request.product_id, variant))
            {
                let quantity = line.quantity() + request.quantity;
                if quantity > line.stock_quantity {
                    return Err(bad_request(format!(
                        "Only {} in stock",
                        line.stock_quantity
                    )));
                }
                line.set_quantity(quantity);
                return Ok(line.clone());
            }

            let product = inner.product(&request.product_id)?;
            if request.quantity > product.stock {
                return Err(bad_request(format!("Only {} in stock", product.stock)));
            }
            let line = inner.line_from_catalog(&product, &request);
            inner.cart.push(line.clone());
            Ok(line)
        }
    }

    fn update_item(&self, id: &CartItemId, quantity: u32) -> impl Future<Output = Result<CartLineItem>> + Send {
        let this = self.clone();
        let id = id.clone();

        async move {
            {
                let mut inner = this.lock();
                inner.update_calls.push((id.clone(), quantity));
                let running = {
                    let count = inner.in_flight.entry(id.clone()).or_insert(0);
                    *count += 1;
                    *count
                };
                let max = inner.max_in_flight.entry(id.clone()).or_insert(0);
                *max = (*max).max(running);
            }

            Self::pause(this.latency).await;

            let mut inner = this.lock();
            if let Some(count) = inner.in_flight.get_mut(&id) {
                *count = count.saturating_sub(1);
            }
            inner.take_failure(Operation::UpdateItem)?;

            let line = inner
                .cart
                .iter_mut()
                .find(|line| line.id == id)
                .ok_or_else(|| not_found("Cart item not found"))?;
            if quantity > line.stock_quantity {
                return Err(bad_request(format!("Only {} in stock", line.stock_quantity)));
            }
            line.set_quantity(quantity);
            Ok(line.clone())
        }
    }

    fn remove_item(&self, id: &CartItemId) -> impl Future<Output = Result<()>> + Send {
        let this = self.clone();
        let id = id.clone();

        async move {
            Self::pause(this.latency).await;
            let mut inner = this.lock();
            inner.take_failure(Operation::RemoveItem)?;

            let before = inner.cart.len();
            inner.cart.retain(|line| line.id != id);
            if inner.cart.len() == before {
                return Err(not_found("Cart item not found"));
            }
            Ok(())
        }
    }

    fn clear_cart(&self) -> impl Future<Output = Result<()>> + Send {
        let this = self.clone();

        async move {
            Self::pause(this.latency).await;
            let mut inner = this.lock();
            inner.take_failure(Operation::ClearCart)?;
            inner.cart.clear();
            Ok(())
        }
    }
}

impl WishlistApi for MockBackend {
    fn fetch_wishlist(&self) -> impl Future<Output = Result<Vec<WishlistItem>>> + Send {
        let this = self.clone();

        async move {
            Self::pause(this.latency).await;
            let mut inner = this.lock();
            inner.take_failure(Operation::FetchWishlist)?;
            Ok(inner.wishlist.clone())
        }
    }

    fn add_to_wishlist(&self, product_id: &ProductId) -> impl Future<Output = Result<WishlistItem>> + Send {
        let this = self.clone();
        let product_id = product_id.clone();

        async move {
            this.lock()
                .wishlist_calls
                .push((Operation::AddToWishlist, product_id.clone()));
            Self::pause(this.latency).await;

            let mut inner = this.lock();
            inner.take_failure(Operation::AddToWishlist)?;

            if let Some(existing) = inner.wishlist.iter().find(|i| i.product_id == product_id) {
                return Ok(existing.clone());
            }

            let product = inner.product(&product_id)?;
            let mut item = WishlistItem::new(
                product.product_id,
                product.name,
                product.price,
                product.merchant_id,
            );
            item.merchant_name = product.merchant_name;
            item.original_price = product.original_price;
            item.stock_quantity = product.stock;
            inner.wishlist.push(item.clone());
            Ok(item)
        }
    }

    fn remove_from_wishlist(&self, product_id: &ProductId) -> impl Future<Output = Result<()>> + Send {
        let this = self.clone();
        let product_id = product_id.clone();

        async move {
            this.lock()
                .wishlist_calls
                .push((Operation::RemoveFromWishlist, product_id.clone()));
            Self::pause(this.latency).await;

            let mut inner = this.lock();
            inner.take_failure(Operation::RemoveFromWishlist)?;
            inner.wishlist.retain(|item| item.product_id != product_id);
            Ok(())
        }
    }

    fn clear_wishlist(&self) -> impl Future<Output = Result<()>> + Send {
        let this = self.clone();

        async move {
            Self::pause(this.latency).await;
            let mut inner = this.lock();
            inner.take_failure(Operation::ClearWishlist)?;
            inner.wishlist.clear();
            Ok(())
        }
    }

    fn is_in_wishlist(&self, product_id: &ProductId) -> impl Future<Output = Result<bool>> + Send {
        let this = self.clone();
        let product_id = product_id.clone();

        async move {
            Self::pause(this.latency).await;
            let mut inner = this.lock();
            inner.take_failure(Operation::CheckWishlist)?;
            Ok(inner.wishlist.iter().any(|item| item.product_id == product_id))
        }
    }
}

impl OrderApi for MockBackend {
    fn create_order(&self, draft: &OrderDraft) -> impl Future<Output = Result<CreatedOrder>> + Send {
        let this = self.clone();
        let draft = draft.clone();

        async move {
            Self::pause(this.latency).await;
            let mut inner = this.lock();
            inner.take_failure(Operation::CreateOrder)?;

            if draft.items.is_empty() {
                return Err(bad_request("Order must contain at least one item"));
            }

            inner.next_id += 1;
            let created = CreatedOrder {
                id: OrderId::new(format!("order-{}", inner.next_id)),
                order_number: format!("ORD-{}", 1000 + inner.next_id),
            };
            inner
                .order_statuses
                .insert(created.id.clone(), PaymentStatus::Initiated);
            inner.created_orders.push(draft);
            Ok(created)
        }
    }

    fn payment_status(&self, order_id: &OrderId) -> impl Future<Output = Result<PaymentStatus>> + Send {
        let this = self.clone();
        let order_id = order_id.clone();

        async move {
            Self::pause(this.latency).await;
            let mut inner = this.lock();
            inner.take_failure(Operation::PaymentStatus)?;
            inner
                .order_statuses
                .get(&order_id)
                .copied()
                .ok_or_else(|| not_found("Order not found"))
        }
    }
}

impl PaymentApi for MockBackend {
    fn payment_methods(&self, merchant_id: &MerchantId) -> impl Future<Output = Result<Vec<PaymentMethod>>> + Send {
        let this = self.clone();
        let merchant_id = merchant_id.clone();

        async move {
            Self::pause(this.latency).await;
            let mut inner = this.lock();
            inner.take_failure(Operation::PaymentMethods)?;
            Ok(inner
                .payment_methods
                .get(&merchant_id)
                .cloned()
                .unwrap_or_else(|| PaymentMethod::ALL.to_vec()))
        }
    }

    fn initiate_payment(&self, request: &PaymentInitRequest) -> impl Future<Output = Result<PaymentForm>> + Send {
        let this = self.clone();
        let request = request.clone();

        async move {
            Self::pause(this.latency).await;
            let mut inner = this.lock();
            inner.take_failure(Operation::InitiatePayment)?;

            let form_url = match request.payment_method {
                PaymentMethod::Esewa => ESEWA_FORM_URL,
                PaymentMethod::Khalti => KHALTI_FORM_URL,
                PaymentMethod::Cod => {
                    return Err(bad_request("Cash on delivery does not use a payment gateway"));
                },
            };

            let fields = BTreeMap::from([
                ("amount".to_string(), request.amount_minor.to_string()),
                ("transaction_uuid".to_string(), request.order_id.to_string()),
                ("product_code".to_string(), "EPAYTEST".to_string()),
                ("success_url".to_string(), request.return_url.clone()),
                ("failure_url".to_string(), request.failure_url.clone()),
                ("signature".to_string(), "mock-signature".to_string()),
            ]);

            inner
                .order_statuses
                .insert(request.order_id.clone(), PaymentStatus::Pending);
            inner.initiated_payments.push(request);

            Ok(PaymentForm {
                form_url: form_url.to_string(),
                fields,
                gateway_request_id: None,
            })
        }
    }
}
