use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use campus_core::StoreResult;
use campus_shared::models::CartLine;

use crate::models::{
    ConfirmationMode, DeliveryRequest, DeliveryRequestStatus, Order, OrderConfirmation,
    OrderStatus, StatusTransition,
};

/// Cart lines removed by a checkout, committed together with its orders.
#[derive(Debug, Clone)]
pub struct CheckoutConsumption {
    pub user_id: Uuid,
    pub cart_line_ids: Vec<Uuid>,
}

#[async_trait]
pub trait CartStore: Send + Sync {
    /// Lines among `ids` owned by `user_id`, in the order of `ids`.
    async fn resolve(&self, user_id: Uuid, ids: &[Uuid]) -> StoreResult<Vec<CartLine>>;

    async fn get_line(&self, id: Uuid) -> StoreResult<Option<CartLine>>;

    async fn find_line(&self, user_id: Uuid, product_id: Uuid) -> StoreResult<Option<CartLine>>;

    async fn list_for_user(&self, user_id: Uuid) -> StoreResult<Vec<CartLine>>;

    async fn upsert_line(&self, line: &CartLine) -> StoreResult<()>;

    /// Inserts `line`, or adds its quantity to the user's existing line for
    /// the same product, in one atomic step. Returns `None` without writing
    /// when the merged quantity would exceed `max_quantity`.
    async fn merge_line(&self, line: &CartLine, max_quantity: i32) -> StoreResult<Option<CartLine>>;

    /// Returns how many lines were removed.
    async fn delete_lines(&self, user_id: Uuid, ids: &[Uuid]) -> StoreResult<u64>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists every order and removes the consumed cart lines as one unit.
    /// Returns the orders as stored, with vendor order numbers assigned.
    async fn commit_checkout(
        &self,
        orders: Vec<Order>,
        consumed: &CheckoutConsumption,
    ) -> StoreResult<Vec<Order>>;

    async fn get_order(&self, id: Uuid) -> StoreResult<Option<Order>>;

    async fn list_orders_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Order>>;

    async fn list_orders_for_stall(
        &self,
        stall_id: Uuid,
        status: Option<OrderStatus>,
    ) -> StoreResult<Vec<Order>>;

    /// Applies the transition only if the order is still in
    /// `transition.expected`. Returns `false` when another writer got there
    /// first. Any confirmation is inserted unless one already exists, and an
    /// open one is closed per `transition.close_confirmation`.
    async fn apply_transition(&self, transition: &StatusTransition) -> StoreResult<bool>;
}

#[async_trait]
pub trait DeliveryRequestStore: Send + Sync {
    /// Returns `false` if the order already has a request.
    async fn create_request(&self, request: &DeliveryRequest) -> StoreResult<bool>;

    async fn get_request(&self, id: Uuid) -> StoreResult<Option<DeliveryRequest>>;

    async fn get_request_for_order(&self, order_id: Uuid) -> StoreResult<Option<DeliveryRequest>>;

    async fn list_requests(
        &self,
        status: Option<DeliveryRequestStatus>,
    ) -> StoreResult<Vec<DeliveryRequest>>;

    /// Moves a `Pending` request to `Assigned` and stamps the partner onto
    /// the order. Returns `false` if the request was no longer pending.
    async fn assign_partner(
        &self,
        request_id: Uuid,
        partner_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<bool>;

    async fn update_request_status(
        &self,
        request_id: Uuid,
        expected: DeliveryRequestStatus,
        next: DeliveryRequestStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<bool>;
}

#[async_trait]
pub trait OrderConfirmationStore: Send + Sync {
    async fn get_for_order(&self, order_id: Uuid) -> StoreResult<Option<OrderConfirmation>>;

    /// Open confirmations whose deadline is at or before `now`, oldest
    /// deadline first.
    async fn list_due(&self, now: DateTime<Utc>, limit: usize) -> StoreResult<Vec<OrderConfirmation>>;

    /// Closes the confirmation if it is still open and moves its order from
    /// `AwaitingReceipt` to `Accomplished`. Returns `false` when the
    /// confirmation was already closed, or when the order had already left
    /// `AwaitingReceipt`, in which case the confirmation is voided instead.
    async fn finalize(
        &self,
        confirmation_id: Uuid,
        mode: ConfirmationMode,
        at: DateTime<Utc>,
    ) -> StoreResult<bool>;
}
