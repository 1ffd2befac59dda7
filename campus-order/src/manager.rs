use std::sync::Arc;

use chrono::Duration;
use uuid::Uuid;

use campus_shared::Clock;

use crate::error::{OrderError, OrderResult};
use crate::models::{ConfirmationMode, Order, OrderConfirmation, OrderStatus, StatusTransition};
use crate::repository::OrderStore;

/// Attempts before a transition that keeps losing races is reported as a conflict.
const MAX_ATTEMPTS: usize = 3;

/// Manages order lifecycle and state transitions
pub struct OrderStatusMachine {
    orders: Arc<dyn OrderStore>,
    clock: Arc<dyn Clock>,
    confirmation_window: Duration,
}

impl OrderStatusMachine {
    pub fn new(orders: Arc<dyn OrderStore>, clock: Arc<dyn Clock>, confirmation_window: Duration) -> Self {
        Self {
            orders,
            clock,
            confirmation_window,
        }
    }

    pub async fn get_order(&self, order_id: Uuid) -> OrderResult<Order> {
        self.orders
            .get_order(order_id)
            .await?
            .ok_or_else(|| OrderError::not_found("order", order_id))
    }

    /// Moves an order to `requested`. A write that loses a race re-reads the
    /// order and re-checks the move against the new status.
    pub async fn transition(
        &self,
        order_id: Uuid,
        requested: OrderStatus,
        rejection_reason: Option<String>,
    ) -> OrderResult<Order> {
        let reason = match requested {
            OrderStatus::Rejected => {
                let reason = rejection_reason
                    .as_deref()
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .ok_or_else(|| OrderError::Validation("a rejection reason is required".to_string()))?;
                Some(reason.to_string())
            }
            _ => None,
        };

        for attempt in 1..=MAX_ATTEMPTS {
            let mut order = self.get_order(order_id).await?;

            if !order.status.can_transition_to(requested, order.fulfillment_method) {
                return Err(OrderError::invalid_transition(order.status, requested));
            }

            let now = self.clock.now();
            let confirmation = (requested == OrderStatus::AwaitingReceipt)
                .then(|| OrderConfirmation::new(order_id, now, self.confirmation_window));
            let close_confirmation = (order.status == OrderStatus::AwaitingReceipt)
                .then(|| ConfirmationMode::on_leaving_receipt(requested));

            let transition = StatusTransition {
                order_id,
                expected: order.status,
                next: requested,
                rejection_reason: reason.clone(),
                confirmation,
                close_confirmation,
                at: now,
            };

            if self.orders.apply_transition(&transition).await? {
                tracing::info!("Order {} moved {} -> {}", order_id, order.status, requested);
                order.update_status(requested, now);
                if reason.is_some() {
                    order.rejection_reason = reason;
                }
                return Ok(order);
            }

            tracing::warn!(
                "Order {} changed while moving to {} (attempt {}/{})",
                order_id,
                requested,
                attempt,
                MAX_ATTEMPTS
            );
        }

        Err(OrderError::Conflict(format!(
            "order {} kept changing while moving to {}",
            order_id, requested
        )))
    }
}
