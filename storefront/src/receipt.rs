//! Plain-text order receipts.

use crate::types::OrderData;
use rust_decimal::Decimal;
use std::fmt::Write as _;

/// A rendered receipt ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// Suggested file name, without extension.
    pub file_name: String,
    /// Document body.
    pub body: String,
}

impl Receipt {
    /// Render the receipt for a confirmed order.
    #[must_use]
    pub fn render(order: &OrderData) -> Self {
        let mut body = String::new();
        let address = &order.shipping_address;

        let _ = writeln!(body, "Doko - Order Receipt");
        let _ = writeln!(body);
        let _ = writeln!(body, "Order Number: {}", order.order_number);
        let _ = writeln!(body, "Order Date: {}", order.order_date.format("%Y-%m-%d %H:%M"));
        let _ = writeln!(body, "Payment Method: {}", order.payment_method.display_name());
        let _ = writeln!(body, "Payment Status: {:?}", order.payment_status);
        if let Some(transaction_id) = &order.transaction_id {
            let _ = writeln!(body, "Transaction ID: {transaction_id}");
        }

        let _ = writeln!(body);
        let _ = writeln!(body, "Shipping Address:");
        let _ = writeln!(body, "{}", address.name);
        let _ = writeln!(body, "{}", address.address);
        let _ = writeln!(body, "{}, {}", address.city, address.country);
        let _ = writeln!(body, "Phone: {}", address.mobile);
        let _ = writeln!(body, "Email: {}", address.email);

        let _ = writeln!(body);
        let _ = writeln!(body, "Order Items:");
        for item in &order.items {
            let _ = write!(body, "{}", item.product_name);
            if let Some(variant) = &item.selected_variant {
                let _ = write!(body, " ({variant})");
            }
            let _ = writeln!(body);
            let _ = writeln!(
                body,
                "  Qty: {} x {} = {}",
                item.quantity(),
                rupees(item.unit_price),
                rupees(item.total_price())
            );
        }

        let _ = writeln!(body);
        let _ = writeln!(body, "Subtotal: {}", rupees(order.subtotal));
        let _ = writeln!(body, "Delivery Fee: {}", rupees(order.delivery_fee));
        let _ = writeln!(body, "Total: {}", rupees(order.total));

        Self {
            file_name: format!("receipt-{}", order.order_number),
            body,
        }
    }
}

fn rupees(amount: Decimal) -> String {
    format!("Rs. {amount:.2}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        CartLineItem, MerchantId, OrderId, PaymentMethod, PaymentStatus, ShippingAddress,
    };
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    #[test]
    fn renders_lines_and_totals() {
        let order = OrderData {
            order_id: OrderId::new("o-1"),
            order_number: "ORD-1001".to_string(),
            merchant_id: MerchantId::new("m-1"),
            items: vec![
                CartLineItem::new("ci-1".into(), "p-1".into(), "Shirt", dec!(500), 2)
                    .with_variant("M"),
            ],
            shipping_address: ShippingAddress {
                name: "Asha Rai".to_string(),
                email: "asha@example.com".to_string(),
                mobile: "9800000000".to_string(),
                country: "Nepal".to_string(),
                address: "Lazimpat Road".to_string(),
                city: "Kathmandu".to_string(),
            },
            payment_method: PaymentMethod::Cod,
            payment_status: PaymentStatus::Completed,
            subtotal: dec!(1000),
            delivery_fee: dec!(0),
            total: dec!(1000),
            order_date: Utc.with_ymd_and_hms(2025, 1, 1, 10, 30, 0).single().unwrap_or_default(),
            transaction_id: None,
        };

        let receipt = Receipt::render(&order);
        assert_eq!(receipt.file_name, "receipt-ORD-1001");
        assert!(receipt.body.starts_with("Doko - Order Receipt"));
        assert!(receipt.body.contains("Shirt (M)"));
        assert!(receipt.body.contains("Qty: 2 x Rs. 500.00 = Rs. 1000.00"));
        assert!(receipt.body.contains("Payment Method: Cash on Delivery"));
        assert!(receipt.body.contains("Order Date: 2025-01-01 10:30"));
        assert!(receipt.body.contains("Total: Rs. 1000.00"));
        assert!(!receipt.body.contains("Transaction ID"));
    }
}
