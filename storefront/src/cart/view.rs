//! Cart view model: lines grouped by merchant.

use super::CartState;
use crate::types::{CartLineItem, MerchantId, percentage_of};
use rust_decimal::Decimal;

/// One merchant's section of the cart page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerchantGroup {
    /// Merchant id.
    pub merchant_id: MerchantId,
    /// Merchant display name.
    pub merchant_name: String,
    /// Lines in cart order.
    pub items: Vec<CartLineItem>,
    /// Σ quantity.
    pub item_count: u64,
    /// Σ line totals.
    pub subtotal: Decimal,
    /// Σ pre-discount line totals.
    pub original_total: Decimal,
    /// `original_total - subtotal`.
    pub savings: Decimal,
    /// Savings as a whole percentage of `original_total`.
    pub savings_percentage: u32,
}

impl MerchantGroup {
    fn new(first: &CartLineItem) -> Self {
        Self {
            merchant_id: first.merchant_id.clone(),
            merchant_name: first.merchant_name.clone(),
            items: Vec::new(),
            item_count: 0,
            subtotal: Decimal::ZERO,
            original_total: Decimal::ZERO,
            savings: Decimal::ZERO,
            savings_percentage: 0,
        }
    }

    fn push(&mut self, line: &CartLineItem) {
        self.item_count += u64::from(line.quantity());
        self.subtotal += line.total_price();
        self.original_total += line.original_total();
        self.savings = (self.original_total - self.subtotal).max(Decimal::ZERO);
        self.savings_percentage = percentage_of(self.savings, self.original_total);
        self.items.push(line.clone());
    }
}

/// Group the cart's lines by merchant, in order of first appearance.
#[must_use]
pub fn merchant_groups(state: &CartState) -> Vec<MerchantGroup> {
    let mut groups: Vec<MerchantGroup> = Vec::new();
    for line in state.lines() {
        let index = match groups
            .iter()
            .position(|group| group.merchant_id == line.merchant_id)
        {
            Some(index) => index,
            None => {
                groups.push(MerchantGroup::new(line));
                groups.len() - 1
            },
        };
        groups[index].push(line);
    }
    groups
}

/// Snapshot of one merchant's lines, handed to checkout.
///
/// The copy is frozen: later cart changes do not reach an open checkout.
#[must_use]
pub fn checkout_items(state: &CartState, merchant_id: &MerchantId) -> Vec<CartLineItem> {
    state
        .lines()
        .iter()
        .filter(|line| &line.merchant_id == merchant_id)
        .cloned()
        .collect()
}
