use std::sync::Arc;

use uuid::Uuid;

use campus_shared::{Clock, Masked};

use crate::builder::OrderAggregateBuilder;
use crate::cart::{CartSnapshotReader, GroupedLines};
use crate::error::{OrderError, OrderResult};
use crate::models::{FulfillmentMethod, Order, OrderDetails};
use crate::repository::{CheckoutConsumption, OrderStore};

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub user_id: Uuid,
    pub cart_item_ids: Vec<Uuid>,
    pub fulfillment_method: FulfillmentMethod,
    pub delivery_address: Option<String>,
    pub notes: Option<String>,
}

/// Converts selected cart lines into committed orders, one per stall.
pub struct CheckoutOrchestrator {
    reader: CartSnapshotReader,
    builder: OrderAggregateBuilder,
    orders: Arc<dyn OrderStore>,
    clock: Arc<dyn Clock>,
}

impl CheckoutOrchestrator {
    pub fn new(
        reader: CartSnapshotReader,
        builder: OrderAggregateBuilder,
        orders: Arc<dyn OrderStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            reader,
            builder,
            orders,
            clock,
        }
    }

    /// Checkout restricted to one stall.
    pub async fn checkout_single_stall(&self, request: CheckoutRequest) -> OrderResult<Order> {
        let details = order_details(&request)?;
        let grouped = self.reader.resolve(request.user_id, &request.cart_item_ids).await?;

        if grouped.stall_count() > 1 {
            return Err(OrderError::MultiStallNotAllowed(grouped.stall_count()));
        }

        let mut committed = self.build_and_commit(request.user_id, &grouped, &details).await?;
        committed
            .pop()
            .ok_or_else(|| OrderError::Conflict("checkout committed no order".to_string()))
    }

    /// Checkout producing one order per stall in the selection.
    pub async fn checkout_multi_stall(&self, request: CheckoutRequest) -> OrderResult<Vec<Order>> {
        let details = order_details(&request)?;
        let grouped = self.reader.resolve(request.user_id, &request.cart_item_ids).await?;

        self.build_and_commit(request.user_id, &grouped, &details).await
    }

    /// Every group is built before anything is written, so a failing stall
    /// leaves no orders behind and the cart untouched.
    async fn build_and_commit(
        &self,
        user_id: Uuid,
        grouped: &GroupedLines,
        details: &OrderDetails,
    ) -> OrderResult<Vec<Order>> {
        let now = self.clock.now();

        let mut orders = Vec::with_capacity(grouped.stall_count());
        for group in grouped.groups() {
            let order = self
                .builder
                .build(user_id, group.stall_id, &group.lines, details, now)
                .await?;
            orders.push(order);
        }

        let consumed = CheckoutConsumption {
            user_id,
            cart_line_ids: grouped.line_ids(),
        };
        let committed = self.orders.commit_checkout(orders, &consumed).await?;

        tracing::info!(
            "Checkout for user {} committed {} order(s), consumed {} cart line(s)",
            user_id,
            committed.len(),
            consumed.cart_line_ids.len()
        );
        Ok(committed)
    }
}

/// Validates the request shape before any store access.
fn order_details(request: &CheckoutRequest) -> OrderResult<OrderDetails> {
    let address = request
        .delivery_address
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty());

    let delivery_address = match request.fulfillment_method {
        FulfillmentMethod::Delivery => match address {
            Some(a) => Some(Masked::new(a.to_string())),
            None => {
                return Err(OrderError::Validation(
                    "delivery address is required for delivery orders".to_string(),
                ))
            }
        },
        FulfillmentMethod::Pickup => None,
    };

    let notes = request
        .notes
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string);

    Ok(OrderDetails {
        fulfillment_method: request.fulfillment_method,
        delivery_address,
        notes,
    })
}
