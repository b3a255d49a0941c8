//! Domain types shared by the cart, wishlist and checkout features.
//!
//! Money is `rust_decimal::Decimal` in the merchant's base currency unit, so
//! `total_price == unit_price * quantity` holds exactly after every mutation.

use crate::error::{Result, StorefrontError};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw identifier.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the raw identifier.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }
    };
}

string_id!(
    /// Catalog product identifier.
    ProductId
);
string_id!(
    /// Server-assigned cart line identifier.
    CartItemId
);
string_id!(
    /// Merchant (shop) identifier.
    MerchantId
);
string_id!(
    /// Server-assigned order identifier.
    OrderId
);

// ═══════════════════════════════════════════════════════════════════════
// Money helpers
// ═══════════════════════════════════════════════════════════════════════

/// Convert a major-unit amount into integer minor units.
///
/// The amount is first rounded to two decimals, half away from zero, then
/// scaled by 100. `1100` becomes `110000`; `10.005` becomes `1001`.
///
/// # Errors
///
/// Returns [`StorefrontError::Validation`] if the result does not fit in `i64`.
pub fn to_minor_units(amount: Decimal) -> Result<i64> {
    let cents = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        * Decimal::ONE_HUNDRED;
    cents
        .to_i64()
        .ok_or_else(|| StorefrontError::validation("amount", "Amount is out of range"))
}

/// Whole-number percentage of `part` in `whole`, rounded half away from zero.
#[must_use]
pub fn percentage_of(part: Decimal, whole: Decimal) -> u32 {
    if whole <= Decimal::ZERO || part <= Decimal::ZERO {
        return 0;
    }
    (part / whole * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u32()
        .unwrap_or(0)
}

// ═══════════════════════════════════════════════════════════════════════
// Cart
// ═══════════════════════════════════════════════════════════════════════

/// One product (plus optional variant) in the cart.
///
/// `quantity` and `total_price` are private: [`CartLineItem::set_quantity`]
/// is the only mutator and keeps them in sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineItem {
    /// Server-assigned line id.
    pub id: CartItemId,
    /// Product this line refers to.
    pub product_id: ProductId,
    /// Display name.
    pub product_name: String,
    /// Primary image URL.
    #[serde(default)]
    pub product_image: Option<String>,
    /// Gallery image URLs.
    #[serde(default)]
    pub product_images: Vec<String>,
    /// Price per unit actually charged.
    pub unit_price: Decimal,
    /// Price before discount, when discounted.
    #[serde(default)]
    pub original_price: Option<Decimal>,
    /// Advertised discount percentage.
    #[serde(default)]
    pub discount_percentage: Option<Decimal>,
    /// Chosen variant label.
    #[serde(default)]
    pub selected_variant: Option<String>,
    quantity: u32,
    total_price: Decimal,
    /// Owning merchant.
    #[serde(rename = "shopId")]
    pub merchant_id: MerchantId,
    /// Owning merchant display name.
    #[serde(rename = "shopName")]
    pub merchant_name: String,
    /// Units in stock.
    pub stock_quantity: u32,
    /// When the line was first added.
    pub created_at: DateTime<Utc>,
}

impl CartLineItem {
    /// Create a line with the given quantity; `total_price` is derived.
    #[must_use]
    pub fn new(
        id: CartItemId,
        product_id: ProductId,
        product_name: impl Into<String>,
        unit_price: Decimal,
        quantity: u32,
    ) -> Self {
        Self {
            id,
            product_id,
            product_name: product_name.into(),
            product_image: None,
            product_images: Vec::new(),
            unit_price,
            original_price: None,
            discount_percentage: None,
            selected_variant: None,
            quantity,
            total_price: unit_price * Decimal::from(quantity),
            merchant_id: MerchantId::new(""),
            merchant_name: String::new(),
            stock_quantity: quantity,
            created_at: DateTime::<Utc>::default(),
        }
    }

    /// Set the owning merchant.
    #[must_use]
    pub fn with_merchant(mut self, id: MerchantId, name: impl Into<String>) -> Self {
        self.merchant_id = id;
        self.merchant_name = name.into();
        self
    }

    /// Set units in stock.
    #[must_use]
    pub const fn with_stock(mut self, stock_quantity: u32) -> Self {
        self.stock_quantity = stock_quantity;
        self
    }

    /// Set the pre-discount unit price.
    #[must_use]
    pub const fn with_original_price(mut self, original_price: Decimal) -> Self {
        self.original_price = Some(original_price);
        self
    }

    /// Set the variant label.
    #[must_use]
    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.selected_variant = Some(variant.into());
        self
    }

    /// Set the primary image.
    #[must_use]
    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.product_image = Some(url.into());
        self
    }

    /// Set the creation time.
    #[must_use]
    pub const fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Units of this product in the cart.
    #[must_use]
    pub const fn quantity(&self) -> u32 {
        self.quantity
    }

    /// `unit_price * quantity`.
    #[must_use]
    pub const fn total_price(&self) -> Decimal {
        self.total_price
    }

    /// Change the quantity and recompute the total.
    pub fn set_quantity(&mut self, quantity: u32) {
        self.quantity = quantity;
        self.total_price = self.unit_price * Decimal::from(quantity);
    }

    /// Recompute the total from the unit price (used on server data).
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.set_quantity(self.quantity);
        self
    }

    /// Whether this line holds `product_id` with the same variant.
    #[must_use]
    pub fn matches(&self, product_id: &ProductId, variant: Option<&str>) -> bool {
        &self.product_id == product_id && self.selected_variant.as_deref() == variant
    }

    /// Pre-discount total for this line.
    #[must_use]
    pub fn original_total(&self) -> Decimal {
        self.original_price.unwrap_or(self.unit_price) * Decimal::from(self.quantity)
    }
}

/// Totals over all cart lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSummary {
    /// Σ quantity.
    pub total_items: u64,
    /// Σ `total_price`.
    pub total_amount: Decimal,
}

impl CartSummary {
    /// Compute the summary of a set of lines.
    #[must_use]
    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a CartLineItem>) -> Self {
        items
            .into_iter()
            .fold(Self::default(), |mut summary, line| {
                summary.total_items += u64::from(line.quantity());
                summary.total_amount += line.total_price();
                summary
            })
    }
}

/// The cart as returned by `GET /cart`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    /// Lines grouped by merchant, in server order.
    pub items_by_shop: Vec<ShopCartGroup>,
    /// Server-computed totals.
    pub summary: CartSummary,
}

impl CartSnapshot {
    /// All lines in server order.
    #[must_use]
    pub fn into_lines(self) -> Vec<CartLineItem> {
        self.items_by_shop
            .into_iter()
            .flat_map(|group| group.items)
            .map(CartLineItem::normalized)
            .collect()
    }
}

/// One merchant's lines in a [`CartSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopCartGroup {
    /// Merchant id.
    pub shop_id: MerchantId,
    /// Merchant lines.
    pub items: Vec<CartLineItem>,
}

/// Body of `POST /cart/items`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    /// Product to add.
    pub product_id: ProductId,
    /// Units to add.
    pub quantity: u32,
    /// Variant label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_variant: Option<String>,
}

// ═══════════════════════════════════════════════════════════════════════
// Wishlist
// ═══════════════════════════════════════════════════════════════════════

/// A saved product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistItem {
    /// Saved product.
    pub product_id: ProductId,
    /// Display name.
    pub product_name: String,
    /// Primary image URL.
    #[serde(default)]
    pub product_image: Option<String>,
    /// Gallery image URLs.
    #[serde(default)]
    pub product_images: Vec<String>,
    /// Current price.
    pub price: Decimal,
    /// Price before discount, when discounted.
    #[serde(default)]
    pub original_price: Option<Decimal>,
    /// Advertised discount percentage.
    #[serde(default)]
    pub discount_percentage: Option<Decimal>,
    /// Product description.
    #[serde(default)]
    pub description: Option<String>,
    /// Owning merchant.
    #[serde(rename = "shopId")]
    pub merchant_id: MerchantId,
    /// Owning merchant display name.
    #[serde(rename = "shopName")]
    pub merchant_name: String,
    /// Units in stock.
    pub stock_quantity: u32,
    /// When the product was saved.
    pub created_at: DateTime<Utc>,
}

impl WishlistItem {
    /// Create a wishlist entry with the required display fields.
    #[must_use]
    pub fn new(
        product_id: ProductId,
        product_name: impl Into<String>,
        price: Decimal,
        merchant_id: MerchantId,
    ) -> Self {
        Self {
            product_id,
            product_name: product_name.into(),
            product_image: None,
            product_images: Vec::new(),
            price,
            original_price: None,
            discount_percentage: None,
            description: None,
            merchant_id,
            merchant_name: String::new(),
            stock_quantity: 0,
            created_at: DateTime::<Utc>::default(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Orders & payments
// ═══════════════════════════════════════════════════════════════════════

/// Payment method offered by a merchant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentMethod {
    /// Cash on delivery.
    Cod,
    /// eSewa digital wallet.
    Esewa,
    /// Khalti digital wallet.
    Khalti,
}

impl PaymentMethod {
    /// Every method the client knows, in display order.
    pub const ALL: [Self; 3] = [Self::Cod, Self::Esewa, Self::Khalti];

    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cod => "COD",
            Self::Esewa => "ESEWA",
            Self::Khalti => "KHALTI",
        }
    }

    /// Display name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Cod => "Cash on Delivery",
            Self::Esewa => "eSewa",
            Self::Khalti => "Khalti",
        }
    }

    /// One-line description shown under the name.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Cod => "Pay in cash at the time of delivery.",
            Self::Esewa => "Pay securely with eSewa digital wallet.",
            Self::Khalti => "Pay securely with Khalti digital wallet.",
        }
    }

    /// Whether paying requires a hand-off to an external gateway.
    #[must_use]
    pub const fn is_online(self) -> bool {
        !matches!(self, Self::Cod)
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = StorefrontError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "COD" => Ok(Self::Cod),
            "ESEWA" => Ok(Self::Esewa),
            "KHALTI" => Ok(Self::Khalti),
            other => Err(StorefrontError::validation(
                "paymentMethod",
                format!("Unknown payment method: {other}"),
            )),
        }
    }
}

/// Payment state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    /// Order created, gateway not yet involved.
    Initiated,
    /// Gateway hand-off done, awaiting confirmation.
    Pending,
    /// Paid (or COD accepted).
    Completed,
    /// Payment failed or was cancelled.
    Failed,
}

impl PaymentStatus {
    /// Whether no further change is expected.
    #[must_use]
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Where the order is delivered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    /// Recipient name.
    pub name: String,
    /// Contact email.
    pub email: String,
    /// 10-digit mobile number.
    pub mobile: String,
    /// Country.
    pub country: String,
    /// Street address.
    pub address: String,
    /// City.
    pub city: String,
}

/// One line of an order request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineRequest {
    /// Ordered product.
    pub product_id: ProductId,
    /// Units ordered.
    pub quantity: u32,
    /// Unit price at checkout time.
    pub unit_price: Decimal,
    /// Variant label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

impl From<&CartLineItem> for OrderLineRequest {
    fn from(line: &CartLineItem) -> Self {
        Self {
            product_id: line.product_id.clone(),
            quantity: line.quantity(),
            unit_price: line.unit_price,
            variant: line.selected_variant.clone(),
        }
    }
}

/// Body of `POST /orders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDraft {
    /// Merchant receiving the order.
    #[serde(rename = "shopId")]
    pub merchant_id: MerchantId,
    /// Frozen line items.
    pub items: Vec<OrderLineRequest>,
    /// Delivery address.
    pub shipping_address: ShippingAddress,
    /// Chosen payment method.
    pub payment_method: PaymentMethod,
    /// Σ line totals.
    pub subtotal: Decimal,
    /// Always zero.
    pub delivery_fee: Decimal,
    /// `subtotal + delivery_fee`.
    pub total: Decimal,
}

/// Order identifiers assigned by `POST /orders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedOrder {
    /// Order id.
    pub id: OrderId,
    /// Human-readable order number.
    pub order_number: String,
}

/// A finalized order as shown on the confirmation screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderData {
    /// Order id.
    pub order_id: OrderId,
    /// Human-readable order number.
    pub order_number: String,
    /// Merchant that received the order.
    pub merchant_id: MerchantId,
    /// Frozen line items.
    pub items: Vec<CartLineItem>,
    /// Delivery address.
    pub shipping_address: ShippingAddress,
    /// Chosen payment method.
    pub payment_method: PaymentMethod,
    /// Current payment state.
    pub payment_status: PaymentStatus,
    /// Σ line totals.
    pub subtotal: Decimal,
    /// Always zero.
    pub delivery_fee: Decimal,
    /// `subtotal + delivery_fee`.
    pub total: Decimal,
    /// When the order was placed.
    pub order_date: DateTime<Utc>,
    /// Gateway transaction reference, once known.
    #[serde(default)]
    pub transaction_id: Option<String>,
}

/// Body of `POST /payments/initiate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInitRequest {
    /// Merchant whose gateway credentials sign the form.
    #[serde(rename = "shopId")]
    pub merchant_id: MerchantId,
    /// Order being paid.
    pub order_id: OrderId,
    /// Gateway to use.
    pub payment_method: PaymentMethod,
    /// Amount in minor units.
    pub amount_minor: i64,
    /// Where the gateway sends the customer on success.
    pub return_url: String,
    /// Where the gateway sends the customer on failure.
    pub failure_url: String,
}

/// Signed gateway form returned by `POST /payments/initiate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentForm {
    /// Gateway endpoint the form is posted to.
    pub form_url: String,
    /// Signed form fields.
    #[serde(default)]
    pub fields: std::collections::BTreeMap<String, String>,
    /// Gateway-side request reference.
    #[serde(default)]
    pub gateway_request_id: Option<String>,
}

/// The signed-in customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    /// Email, used to pre-fill the address form.
    pub email: String,
    /// Display name.
    pub name: Option<String>,
}

/// Totals shown in the checkout order summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderTotals {
    /// Σ line totals.
    pub subtotal: Decimal,
    /// Always zero.
    pub delivery_fee: Decimal,
    /// `subtotal + delivery_fee`.
    pub total: Decimal,
    /// Σ pre-discount line totals.
    pub original_total: Decimal,
    /// `original_total - subtotal`.
    pub savings: Decimal,
    /// Savings as a whole percentage of `original_total`.
    pub savings_percentage: u32,
}

impl OrderTotals {
    /// Compute totals for a set of lines.
    #[must_use]
    pub fn from_items(items: &[CartLineItem]) -> Self {
        let subtotal: Decimal = items.iter().map(CartLineItem::total_price).sum();
        let original_total: Decimal = items.iter().map(CartLineItem::original_total).sum();
        let savings = (original_total - subtotal).max(Decimal::ZERO);
        let delivery_fee = Decimal::ZERO;

        Self {
            subtotal,
            delivery_fee,
            total: subtotal + delivery_fee,
            original_total,
            savings,
            savings_percentage: percentage_of(savings, original_total),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)] // Tests are allowed to panic on failures
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn set_quantity_keeps_total_in_sync() {
        let mut line = CartLineItem::new("ci-1".into(), "p-1".into(), "Tea", dec!(12.50), 2);
        assert_eq!(line.total_price(), dec!(25.00));

        line.set_quantity(3);
        assert_eq!(line.quantity(), 3);
        assert_eq!(line.total_price(), dec!(37.50));
    }

    #[test]
    fn minor_units_round_half_away_from_zero() {
        assert_eq!(to_minor_units(dec!(1100)).ok(), Some(110_000));
        assert_eq!(to_minor_units(dec!(10.005)).ok(), Some(1001));
        assert_eq!(to_minor_units(dec!(10.004)).ok(), Some(1000));
        assert_eq!(to_minor_units(dec!(0.1)).ok(), Some(10));
    }

    #[test]
    fn totals_include_savings() {
        let items = vec![
            CartLineItem::new("ci-1".into(), "p-1".into(), "Shirt", dec!(450), 2)
                .with_original_price(dec!(500)),
            CartLineItem::new("ci-2".into(), "p-2".into(), "Cap", dec!(200), 1),
        ];

        let totals = OrderTotals::from_items(&items);
        assert_eq!(totals.subtotal, dec!(1100));
        assert_eq!(totals.total, dec!(1100));
        assert_eq!(totals.original_total, dec!(1200));
        assert_eq!(totals.savings, dec!(100));
        assert_eq!(totals.savings_percentage, 8);
    }

    #[test]
    fn payment_method_parses_wire_names() {
        assert_eq!("esewa".parse::<PaymentMethod>().ok(), Some(PaymentMethod::Esewa));
        assert!("PAYPAL".parse::<PaymentMethod>().is_err());
        assert_eq!(
            serde_json::to_string(&PaymentMethod::Cod).ok().as_deref(),
            Some("\"COD\"")
        );
    }

    #[test]
    fn server_lines_are_normalized() {
        let json = r#"{
            "id": "ci-9", "productId": "p-9", "productName": "Lamp",
            "unitPrice": 300, "quantity": 2, "totalPrice": 999,
            "shopId": "m-1", "shopName": "Lights", "stockQuantity": 5,
            "createdAt": "2025-01-01T00:00:00Z"
        }"#;
        let line: CartLineItem = serde_json::from_str::<CartLineItem>(json)
            .map(CartLineItem::normalized)
            .unwrap_or_else(|e| panic!("valid line json: {e}"));
        assert_eq!(line.total_price(), dec!(600));
    }
}
