use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use campus_catalog::{Product, Stall};
use campus_core::{ProductLookup, StallLookup, StoreError, StoreResult, UserLookup};
use campus_order::{
    CartStore, CheckoutConsumption, ConfirmationMode, DeliveryRequest, DeliveryRequestStatus,
    DeliveryRequestStore, Order, OrderConfirmation, OrderConfirmationStore, OrderStatus,
    OrderStore, StatusTransition,
};
use campus_shared::models::{CartLine, User};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    stalls: HashMap<Uuid, Stall>,
    products: HashMap<Uuid, Product>,
    cart: Vec<CartLine>,
    orders: Vec<Order>,
    counters: HashMap<Uuid, i64>,
    requests: Vec<DeliveryRequest>,
    confirmations: Vec<OrderConfirmation>,
}

/// Process-local store for development and tests. Every operation takes one
/// lock, so multi-row writes are all-or-nothing just like the Postgres store.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, user: User) {
        self.tables.write().await.users.insert(user.id, user);
    }

    pub async fn insert_stall(&self, stall: Stall) {
        self.tables.write().await.stalls.insert(stall.id, stall);
    }

    /// Inserts or replaces a product snapshot.
    pub async fn insert_product(&self, product: Product) {
        self.tables.write().await.products.insert(product.id, product);
    }
}

#[async_trait]
impl ProductLookup for MemoryStore {
    async fn get_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Product>> {
        let tables = self.tables.read().await;
        Ok(ids.iter().filter_map(|id| tables.products.get(id).cloned()).collect())
    }
}

#[async_trait]
impl StallLookup for MemoryStore {
    async fn get_by_id(&self, id: Uuid) -> StoreResult<Option<Stall>> {
        Ok(self.tables.read().await.stalls.get(&id).cloned())
    }
}

#[async_trait]
impl UserLookup for MemoryStore {
    async fn get_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn resolve(&self, user_id: Uuid, ids: &[Uuid]) -> StoreResult<Vec<CartLine>> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| {
                tables
                    .cart
                    .iter()
                    .find(|l| l.id == *id && l.user_id == user_id)
                    .cloned()
            })
            .collect())
    }

    async fn get_line(&self, id: Uuid) -> StoreResult<Option<CartLine>> {
        let tables = self.tables.read().await;
        Ok(tables.cart.iter().find(|l| l.id == id).cloned())
    }

    async fn find_line(&self, user_id: Uuid, product_id: Uuid) -> StoreResult<Option<CartLine>> {
        let tables = self.tables.read().await;
        Ok(tables
            .cart
            .iter()
            .find(|l| l.user_id == user_id && l.product_id == product_id)
            .cloned())
    }

    async fn list_for_user(&self, user_id: Uuid) -> StoreResult<Vec<CartLine>> {
        let tables = self.tables.read().await;
        Ok(tables.cart.iter().filter(|l| l.user_id == user_id).cloned().collect())
    }

    async fn upsert_line(&self, line: &CartLine) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        match tables.cart.iter_mut().find(|l| l.id == line.id) {
            Some(existing) => *existing = line.clone(),
            None => tables.cart.push(line.clone()),
        }
        Ok(())
    }

    async fn merge_line(&self, line: &CartLine, max_quantity: i32) -> StoreResult<Option<CartLine>> {
        let mut tables = self.tables.write().await;
        match tables
            .cart
            .iter_mut()
            .find(|l| l.user_id == line.user_id && l.product_id == line.product_id)
        {
            Some(existing) => {
                let merged = existing.quantity + line.quantity;
                if merged > max_quantity {
                    return Ok(None);
                }
                existing.quantity = merged;
                existing.updated_at = line.updated_at;
                Ok(Some(existing.clone()))
            }
            None => {
                tables.cart.push(line.clone());
                Ok(Some(line.clone()))
            }
        }
    }

    async fn delete_lines(&self, user_id: Uuid, ids: &[Uuid]) -> StoreResult<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.cart.len();
        tables.cart.retain(|l| !(l.user_id == user_id && ids.contains(&l.id)));
        Ok((before - tables.cart.len()) as u64)
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn commit_checkout(
        &self,
        orders: Vec<Order>,
        consumed: &CheckoutConsumption,
    ) -> StoreResult<Vec<Order>> {
        let mut tables = self.tables.write().await;

        let present = tables
            .cart
            .iter()
            .filter(|l| l.user_id == consumed.user_id && consumed.cart_line_ids.contains(&l.id))
            .count();
        if present != consumed.cart_line_ids.len() {
            return Err(StoreError::Conflict(format!(
                "expected to consume {} cart lines, found {}",
                consumed.cart_line_ids.len(),
                present
            )));
        }

        tables
            .cart
            .retain(|l| !(l.user_id == consumed.user_id && consumed.cart_line_ids.contains(&l.id)));

        let mut committed = Vec::with_capacity(orders.len());
        for mut order in orders {
            let counter = tables.counters.entry(order.stall_id).or_insert(0);
            *counter += 1;
            order.vendor_order_id = Some(*counter);
            tables.orders.push(order.clone());
            committed.push(order);
        }
        Ok(committed)
    }

    async fn get_order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        let tables = self.tables.read().await;
        Ok(tables.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn list_orders_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Order>> {
        let tables = self.tables.read().await;
        let mut orders: Vec<Order> = tables.orders.iter().filter(|o| o.user_id == user_id).cloned().collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn list_orders_for_stall(
        &self,
        stall_id: Uuid,
        status: Option<OrderStatus>,
    ) -> StoreResult<Vec<Order>> {
        let tables = self.tables.read().await;
        Ok(tables
            .orders
            .iter()
            .filter(|o| o.stall_id == stall_id && status.map_or(true, |s| o.status == s))
            .cloned()
            .collect())
    }

    async fn apply_transition(&self, transition: &StatusTransition) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;

        let Some(order) = tables.orders.iter_mut().find(|o| o.id == transition.order_id) else {
            return Ok(false);
        };
        if order.status != transition.expected {
            return Ok(false);
        }

        order.update_status(transition.next, transition.at);
        if let Some(reason) = &transition.rejection_reason {
            order.rejection_reason = Some(reason.clone());
        }

        if let Some(confirmation) = &transition.confirmation {
            if !tables.confirmations.iter().any(|c| c.order_id == confirmation.order_id) {
                tables.confirmations.push(confirmation.clone());
            }
        }
        if let Some(mode) = transition.close_confirmation {
            if let Some(open) = tables
                .confirmations
                .iter_mut()
                .find(|c| c.order_id == transition.order_id && c.is_open())
            {
                open.finalize(mode, transition.at);
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl DeliveryRequestStore for MemoryStore {
    async fn create_request(&self, request: &DeliveryRequest) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.requests.iter().any(|r| r.order_id == request.order_id) {
            return Ok(false);
        }
        tables.requests.push(request.clone());
        Ok(true)
    }

    async fn get_request(&self, id: Uuid) -> StoreResult<Option<DeliveryRequest>> {
        let tables = self.tables.read().await;
        Ok(tables.requests.iter().find(|r| r.id == id).cloned())
    }

    async fn get_request_for_order(&self, order_id: Uuid) -> StoreResult<Option<DeliveryRequest>> {
        let tables = self.tables.read().await;
        Ok(tables.requests.iter().find(|r| r.order_id == order_id).cloned())
    }

    async fn list_requests(
        &self,
        status: Option<DeliveryRequestStatus>,
    ) -> StoreResult<Vec<DeliveryRequest>> {
        let tables = self.tables.read().await;
        Ok(tables
            .requests
            .iter()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect())
    }

    async fn assign_partner(
        &self,
        request_id: Uuid,
        partner_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;

        let Some(request) = tables
            .requests
            .iter_mut()
            .find(|r| r.id == request_id && r.status == DeliveryRequestStatus::Pending)
        else {
            return Ok(false);
        };
        request.status = DeliveryRequestStatus::Assigned;
        request.assigned_delivery_partner_id = Some(partner_id);
        request.assigned_at = Some(at);
        let order_id = request.order_id;

        if let Some(order) = tables.orders.iter_mut().find(|o| o.id == order_id) {
            order.delivery_partner_id = Some(partner_id);
            order.updated_at = at;
        }
        Ok(true)
    }

    async fn update_request_status(
        &self,
        request_id: Uuid,
        expected: DeliveryRequestStatus,
        next: DeliveryRequestStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;

        let Some(request) = tables
            .requests
            .iter_mut()
            .find(|r| r.id == request_id && r.status == expected)
        else {
            return Ok(false);
        };
        request.status = next;
        if next == DeliveryRequestStatus::Completed {
            request.completed_at = Some(at);
        }
        Ok(true)
    }
}

#[async_trait]
impl OrderConfirmationStore for MemoryStore {
    async fn get_for_order(&self, order_id: Uuid) -> StoreResult<Option<OrderConfirmation>> {
        let tables = self.tables.read().await;
        Ok(tables.confirmations.iter().find(|c| c.order_id == order_id).cloned())
    }

    async fn list_due(&self, now: DateTime<Utc>, limit: usize) -> StoreResult<Vec<OrderConfirmation>> {
        let tables = self.tables.read().await;
        let mut due: Vec<OrderConfirmation> =
            tables.confirmations.iter().filter(|c| c.is_due(now)).cloned().collect();
        due.sort_by_key(|c| c.confirmation_deadline);
        due.truncate(limit);
        Ok(due)
    }

    async fn finalize(
        &self,
        confirmation_id: Uuid,
        mode: ConfirmationMode,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;

        let Some(order_id) = tables
            .confirmations
            .iter()
            .find(|c| c.id == confirmation_id && c.is_open())
            .map(|c| c.order_id)
        else {
            return Ok(false);
        };

        let received = match tables.orders.iter_mut().find(|o| o.id == order_id) {
            Some(order) if order.status == OrderStatus::AwaitingReceipt => {
                order.update_status(OrderStatus::Accomplished, at);
                true
            }
            _ => false,
        };

        let close = if received { mode } else { ConfirmationMode::Void };
        if let Some(confirmation) = tables.confirmations.iter_mut().find(|c| c.id == confirmation_id) {
            confirmation.finalize(close, at);
        }
        Ok(received)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_order::{FulfillmentMethod, OrderDetails};

    fn order_for(stall_id: Uuid) -> Order {
        let details = OrderDetails {
            fulfillment_method: FulfillmentMethod::Pickup,
            delivery_address: None,
            notes: None,
        };
        Order::new(Uuid::new_v4(), stall_id, details, Utc::now())
    }

    #[tokio::test]
    async fn test_vendor_order_ids_count_per_stall() {
        let store = MemoryStore::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let consumed = CheckoutConsumption {
            user_id: Uuid::new_v4(),
            cart_line_ids: Vec::new(),
        };

        let first = store.commit_checkout(vec![order_for(a), order_for(b)], &consumed).await.unwrap();
        let second = store.commit_checkout(vec![order_for(a)], &consumed).await.unwrap();

        assert_eq!(first[0].vendor_order_id, Some(1));
        assert_eq!(first[1].vendor_order_id, Some(1));
        assert_eq!(second[0].vendor_order_id, Some(2));
    }

    #[tokio::test]
    async fn test_commit_rejects_missing_cart_lines() {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();
        let line = CartLine::new(user_id, Uuid::new_v4(), Uuid::new_v4(), 1);
        store.upsert_line(&line).await.unwrap();

        let consumed = CheckoutConsumption {
            user_id,
            cart_line_ids: vec![line.id, Uuid::new_v4()],
        };
        let result = store.commit_checkout(vec![order_for(line.stall_id)], &consumed).await;

        assert!(matches!(result, Err(StoreError::Conflict(_))));
        assert_eq!(store.list_for_user(user_id).await.unwrap().len(), 1);
        assert!(store.list_orders_for_stall(line.stall_id, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stale_transition_is_not_applied() {
        let store = MemoryStore::new();
        let consumed = CheckoutConsumption {
            user_id: Uuid::new_v4(),
            cart_line_ids: Vec::new(),
        };
        let order = store.commit_checkout(vec![order_for(Uuid::new_v4())], &consumed).await.unwrap().remove(0);

        let transition = StatusTransition {
            order_id: order.id,
            expected: OrderStatus::Preparing,
            next: OrderStatus::AwaitingReceipt,
            rejection_reason: None,
            confirmation: None,
            close_confirmation: None,
            at: Utc::now(),
        };
        assert!(!store.apply_transition(&transition).await.unwrap());
        assert_eq!(store.get_order(order.id).await.unwrap().unwrap().status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_finalize_voids_window_of_order_that_moved_on() {
        let store = MemoryStore::new();
        let consumed = CheckoutConsumption {
            user_id: Uuid::new_v4(),
            cart_line_ids: Vec::new(),
        };
        let order = store.commit_checkout(vec![order_for(Uuid::new_v4())], &consumed).await.unwrap().remove(0);
        let now = Utc::now();
        let step = |expected, next, confirmation| StatusTransition {
            order_id: order.id,
            expected,
            next,
            rejection_reason: None,
            confirmation,
            close_confirmation: None,
            at: now,
        };

        let window = OrderConfirmation::new(order.id, now, chrono::Duration::minutes(5));
        assert!(store.apply_transition(&step(OrderStatus::Pending, OrderStatus::Preparing, None)).await.unwrap());
        assert!(store
            .apply_transition(&step(OrderStatus::Preparing, OrderStatus::AwaitingReceipt, Some(window.clone())))
            .await
            .unwrap());
        // Rejected without closing the window
        assert!(store.apply_transition(&step(OrderStatus::AwaitingReceipt, OrderStatus::Rejected, None)).await.unwrap());

        assert!(!store.finalize(window.id, ConfirmationMode::Auto, now).await.unwrap());
        let stored = store.get_for_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.voided_at, Some(now));
        assert!(!stored.is_auto_confirmed);
        assert_eq!(store.get_order(order.id).await.unwrap().unwrap().status, OrderStatus::Rejected);
        assert!(store.list_due(now + chrono::Duration::hours(1), 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_merge_line_adds_to_existing_line_within_cap() {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();
        let (product_id, stall_id) = (Uuid::new_v4(), Uuid::new_v4());

        let first = store.merge_line(&CartLine::new(user_id, product_id, stall_id, 60), 100).await.unwrap().unwrap();
        let merged = store.merge_line(&CartLine::new(user_id, product_id, stall_id, 40), 100).await.unwrap().unwrap();
        assert_eq!(merged.id, first.id);
        assert_eq!(merged.quantity, 100);

        assert_eq!(store.merge_line(&CartLine::new(user_id, product_id, stall_id, 1), 100).await.unwrap(), None);
        let lines = store.list_for_user(user_id).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, 100);
    }
}
