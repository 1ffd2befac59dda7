use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{OrderError, OrderResult};
use crate::models::{ConfirmationMode, OrderConfirmation, OrderStatus};
use crate::repository::{OrderConfirmationStore, OrderStore};

/// Outcome of one sweep over overdue confirmations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Orders whose confirmation window this sweep closed
    pub auto_confirmed: Vec<Uuid>,
    /// Rows another writer closed first
    pub skipped: usize,
    /// Rows that failed and were left for the next sweep
    pub failed: usize,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.auto_confirmed.is_empty() && self.skipped == 0 && self.failed == 0
    }
}

/// Closes receipt-confirmation windows, either when the customer confirms or
/// when the deadline passes.
pub struct AutoConfirmationSweeper {
    orders: Arc<dyn OrderStore>,
    confirmations: Arc<dyn OrderConfirmationStore>,
    batch_size: usize,
}

impl AutoConfirmationSweeper {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        confirmations: Arc<dyn OrderConfirmationStore>,
        batch_size: usize,
    ) -> Self {
        Self {
            orders,
            confirmations,
            batch_size: batch_size.max(1),
        }
    }

    /// Auto-confirms every open confirmation whose deadline is at or before
    /// `now`, oldest deadline first, reading `batch_size` rows per page until
    /// none are left. One failing row does not stop the sweep.
    pub async fn sweep(&self, now: DateTime<Utc>) -> OrderResult<SweepReport> {
        let mut report = SweepReport::default();
        // Failed rows stay open and would come back on every page
        let mut failed: HashSet<Uuid> = HashSet::new();

        loop {
            let due = match self.confirmations.list_due(now, self.batch_size).await {
                Ok(due) => due,
                Err(e) if !report.is_empty() => {
                    tracing::warn!("Confirmation sweep stopped early: {}", e);
                    break;
                }
                Err(e) => return Err(e.into()),
            };
            let page_len = due.len();
            let mut progressed = false;

            for confirmation in due {
                if failed.contains(&confirmation.id) {
                    continue;
                }
                progressed = true;
                match self
                    .confirmations
                    .finalize(confirmation.id, ConfirmationMode::Auto, now)
                    .await
                {
                    Ok(true) => report.auto_confirmed.push(confirmation.order_id),
                    Ok(false) => report.skipped += 1,
                    Err(e) => {
                        tracing::warn!(
                            "Skipping auto-confirmation {} for order {}: {}",
                            confirmation.id,
                            confirmation.order_id,
                            e
                        );
                        failed.insert(confirmation.id);
                        report.failed += 1;
                    }
                }
            }

            if page_len < self.batch_size || !progressed {
                break;
            }
        }

        if !report.is_empty() {
            tracing::info!(
                "Confirmation sweep: {} auto-confirmed, {} skipped, {} failed",
                report.auto_confirmed.len(),
                report.skipped,
                report.failed
            );
        }
        Ok(report)
    }

    /// Customer confirms receipt before the deadline.
    pub async fn confirm_manually(&self, order_id: Uuid, now: DateTime<Utc>) -> OrderResult<OrderConfirmation> {
        let mut confirmation = self
            .confirmations
            .get_for_order(order_id)
            .await?
            .ok_or_else(|| OrderError::not_found("order confirmation", order_id))?;

        if confirmation.is_confirmed || confirmation.is_auto_confirmed {
            return Err(OrderError::AlreadyConfirmed(order_id));
        }

        let order = self
            .orders
            .get_order(order_id)
            .await?
            .ok_or_else(|| OrderError::not_found("order", order_id))?;
        if order.status != OrderStatus::AwaitingReceipt {
            return Err(OrderError::invalid_transition(order.status, OrderStatus::Accomplished));
        }

        if !self
            .confirmations
            .finalize(confirmation.id, ConfirmationMode::Manual, now)
            .await?
        {
            return Err(OrderError::AlreadyConfirmed(order_id));
        }

        tracing::info!("Order {} receipt confirmed by customer", order_id);
        confirmation.finalize(ConfirmationMode::Manual, now);
        Ok(confirmation)
    }
}
