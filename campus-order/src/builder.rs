use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use campus_catalog::{PricingEngine, Product};
use campus_core::{ProductLookup, StallLookup};
use campus_shared::models::CartLine;

use crate::error::{OrderError, OrderResult};
use crate::models::{FulfillmentMethod, Order, OrderDetails, OrderItem};

/// Builds a priced `Order` for the cart lines of a single stall.
pub struct OrderAggregateBuilder {
    products: Arc<dyn ProductLookup>,
    stalls: Arc<dyn StallLookup>,
    pricing: PricingEngine,
}

impl OrderAggregateBuilder {
    pub fn new(
        products: Arc<dyn ProductLookup>,
        stalls: Arc<dyn StallLookup>,
        pricing: PricingEngine,
    ) -> Self {
        Self {
            products,
            stalls,
            pricing,
        }
    }

    pub async fn build(
        &self,
        user_id: Uuid,
        stall_id: Uuid,
        lines: &[CartLine],
        details: &OrderDetails,
        now: DateTime<Utc>,
    ) -> OrderResult<Order> {
        if self.stalls.get_by_id(stall_id).await?.is_none() {
            return Err(OrderError::StallNotFound(stall_id));
        }

        let mut seen = HashSet::new();
        let product_ids: Vec<Uuid> = lines
            .iter()
            .map(|l| l.product_id)
            .filter(|id| seen.insert(*id))
            .collect();

        let products: HashMap<Uuid, Product> = self
            .products
            .get_by_ids(&product_ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        assemble_order(user_id, stall_id, lines, &products, details, &self.pricing, now)
    }
}

/// Prices `lines` against the product snapshots. Every unavailable product
/// is reported, not just the first.
pub fn assemble_order(
    user_id: Uuid,
    stall_id: Uuid,
    lines: &[CartLine],
    products: &HashMap<Uuid, Product>,
    details: &OrderDetails,
    pricing: &PricingEngine,
    now: DateTime<Utc>,
) -> OrderResult<Order> {
    let mut unavailable: Vec<String> = Vec::new();
    for line in lines {
        let name = match products.get(&line.product_id) {
            Some(p) if p.is_available() && p.stall_id == stall_id => continue,
            Some(p) => p.name.clone(),
            None => format!("unknown product {}", line.product_id),
        };
        if !unavailable.contains(&name) {
            unavailable.push(name);
        }
    }
    if !unavailable.is_empty() {
        return Err(OrderError::ProductUnavailable(unavailable));
    }

    let mut order = Order::new(user_id, stall_id, details.clone(), now);
    for line in lines {
        let product = products
            .get(&line.product_id)
            .ok_or_else(|| OrderError::not_found("product", line.product_id))?;

        // Per-item price excludes delivery; the fee is charged once per order.
        let price_each = product.price_with_markup_cents;
        order.add_item(OrderItem::new(
            order.id,
            product.id,
            product.name.clone(),
            line.quantity,
            price_each,
            pricing.commission(price_each)?,
        ));
    }

    let fee = match details.fulfillment_method {
        FulfillmentMethod::Delivery => pricing.delivery_fee(),
        FulfillmentMethod::Pickup => 0,
    };
    order.set_delivery_fee(fee);

    Ok(order)
}
