use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use campus_core::{StoreError, StoreResult};
use campus_order::{
    CheckoutConsumption, ConfirmationMode, Order, OrderConfirmation, OrderConfirmationStore,
    OrderItem, OrderStatus, OrderStore, StatusTransition,
};
use campus_shared::Masked;

use crate::database::{db_err, DbClient};

const ORDER_COLUMNS: &str = r#"
    id, user_id, stall_id, vendor_order_id, status, fulfillment_method, delivery_address, notes,
    total_selling_price_cents, delivery_fee_cents, total_price_cents, total_commission_fee_cents,
    delivery_partner_id, rejection_reason, created_at, updated_at
"#;

const CONFIRMATION_COLUMNS: &str = r#"
    id, order_id, created_at, confirmation_deadline, is_confirmed, confirmed_at,
    is_auto_confirmed, auto_confirmed_at, voided_at
"#;

const OPEN_CONFIRMATION: &str = "is_confirmed = FALSE AND is_auto_confirmed = FALSE AND voided_at IS NULL";

/// `SET` clause closing a confirmation, with the timestamp bound as `$2`.
fn close_clause(mode: ConfirmationMode) -> &'static str {
    match mode {
        ConfirmationMode::Manual => "is_confirmed = TRUE, confirmed_at = $2",
        ConfirmationMode::Auto => "is_auto_confirmed = TRUE, auto_confirmed_at = $2",
        ConfirmationMode::Void => "voided_at = $2",
    }
}

/// Orders with their items, plus the receipt confirmations that close them.
pub struct StoreOrderRepository {
    db: DbClient,
}

impl StoreOrderRepository {
    pub fn new(db: DbClient) -> Self {
        Self { db }
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: Uuid,
    stall_id: Uuid,
    vendor_order_id: i64,
    status: String,
    fulfillment_method: String,
    delivery_address: Option<String>,
    notes: Option<String>,
    total_selling_price_cents: i64,
    delivery_fee_cents: i64,
    total_price_cents: i64,
    total_commission_fee_cents: i64,
    delivery_partner_id: Option<Uuid>,
    rejection_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> StoreResult<Order> {
        Ok(Order {
            id: self.id,
            user_id: self.user_id,
            stall_id: self.stall_id,
            vendor_order_id: Some(self.vendor_order_id),
            status: self.status.parse()?,
            fulfillment_method: self.fulfillment_method.parse()?,
            delivery_address: self.delivery_address.map(Masked::new),
            notes: self.notes,
            items,
            total_selling_price_cents: self.total_selling_price_cents,
            delivery_fee_cents: self.delivery_fee_cents,
            total_price_cents: self.total_price_cents,
            total_commission_fee_cents: self.total_commission_fee_cents,
            delivery_partner_id: self.delivery_partner_id,
            rejection_reason: self.rejection_reason,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    product_id: Uuid,
    product_name: String,
    quantity: i32,
    price_each_cents: i64,
    commission_fee_cents: i64,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        OrderItem {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            product_name: row.product_name,
            quantity: row.quantity,
            price_each_cents: row.price_each_cents,
            commission_fee_cents: row.commission_fee_cents,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ConfirmationRow {
    id: Uuid,
    order_id: Uuid,
    created_at: DateTime<Utc>,
    confirmation_deadline: DateTime<Utc>,
    is_confirmed: bool,
    confirmed_at: Option<DateTime<Utc>>,
    is_auto_confirmed: bool,
    auto_confirmed_at: Option<DateTime<Utc>>,
    voided_at: Option<DateTime<Utc>>,
}

impl From<ConfirmationRow> for OrderConfirmation {
    fn from(row: ConfirmationRow) -> Self {
        OrderConfirmation {
            id: row.id,
            order_id: row.order_id,
            created_at: row.created_at,
            confirmation_deadline: row.confirmation_deadline,
            is_confirmed: row.is_confirmed,
            confirmed_at: row.confirmed_at,
            is_auto_confirmed: row.is_auto_confirmed,
            auto_confirmed_at: row.auto_confirmed_at,
            voided_at: row.voided_at,
        }
    }
}

impl StoreOrderRepository {
    /// Loads items for every order in one query and attaches them in
    /// insertion order.
    async fn with_items(&self, rows: Vec<OrderRow>) -> StoreResult<Vec<Order>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let item_rows: Vec<OrderItemRow> = sqlx::query_as(
            r#"
            SELECT id, order_id, product_id, product_name, quantity, price_each_cents, commission_fee_cents
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, position
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.db.pool)
        .await
        .map_err(db_err)?;

        let mut items: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for row in item_rows {
            items.entry(row.order_id).or_default().push(row.into());
        }

        rows.into_iter()
            .map(|row| {
                let order_items = items.remove(&row.id).unwrap_or_default();
                row.into_order(order_items)
            })
            .collect()
    }
}

#[async_trait]
impl OrderStore for StoreOrderRepository {
    async fn commit_checkout(
        &self,
        orders: Vec<Order>,
        consumed: &CheckoutConsumption,
    ) -> StoreResult<Vec<Order>> {
        self.db
            .timed(async {
                let mut tx = self.db.pool.begin().await.map_err(db_err)?;

                // A concurrent checkout of the same lines removes fewer rows
                // here and the whole transaction rolls back.
                let removed = sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND id = ANY($2)")
                    .bind(consumed.user_id)
                    .bind(&consumed.cart_line_ids)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?
                    .rows_affected();
                if removed != consumed.cart_line_ids.len() as u64 {
                    return Err(StoreError::Conflict(format!(
                        "expected to consume {} cart lines, found {}",
                        consumed.cart_line_ids.len(),
                        removed
                    )));
                }

                let mut committed = Vec::with_capacity(orders.len());
                for mut order in orders {
                    let (number,): (i64,) = sqlx::query_as(
                        r#"
                        INSERT INTO stall_order_counters (stall_id, last_number)
                        VALUES ($1, 1)
                        ON CONFLICT (stall_id)
                        DO UPDATE SET last_number = stall_order_counters.last_number + 1
                        RETURNING last_number
                        "#,
                    )
                    .bind(order.stall_id)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(db_err)?;
                    order.vendor_order_id = Some(number);

                    sqlx::query(
                        r#"
                        INSERT INTO orders (
                            id, user_id, stall_id, vendor_order_id, status, fulfillment_method,
                            delivery_address, notes, total_selling_price_cents, delivery_fee_cents,
                            total_price_cents, total_commission_fee_cents, delivery_partner_id,
                            rejection_reason, created_at, updated_at
                        )
                        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
                        "#,
                    )
                    .bind(order.id)
                    .bind(order.user_id)
                    .bind(order.stall_id)
                    .bind(number)
                    .bind(order.status.as_str())
                    .bind(order.fulfillment_method.as_str())
                    .bind(order.delivery_address.as_ref().map(|a| a.as_str().to_string()))
                    .bind(order.notes.clone())
                    .bind(order.total_selling_price_cents)
                    .bind(order.delivery_fee_cents)
                    .bind(order.total_price_cents)
                    .bind(order.total_commission_fee_cents)
                    .bind(order.delivery_partner_id)
                    .bind(order.rejection_reason.clone())
                    .bind(order.created_at)
                    .bind(order.updated_at)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;

                    for (position, item) in order.items.iter().enumerate() {
                        sqlx::query(
                            r#"
                            INSERT INTO order_items (
                                id, order_id, product_id, product_name, quantity,
                                price_each_cents, commission_fee_cents, position
                            )
                            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                            "#,
                        )
                        .bind(item.id)
                        .bind(item.order_id)
                        .bind(item.product_id)
                        .bind(&item.product_name)
                        .bind(item.quantity)
                        .bind(item.price_each_cents)
                        .bind(item.commission_fee_cents)
                        .bind(position as i32)
                        .execute(&mut *tx)
                        .await
                        .map_err(db_err)?;
                    }

                    committed.push(order);
                }

                tx.commit().await.map_err(db_err)?;
                Ok(committed)
            })
            .await
    }

    async fn get_order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        self.db
            .timed(async {
                let row: Option<OrderRow> =
                    sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
                        .bind(id)
                        .fetch_optional(&self.db.pool)
                        .await
                        .map_err(db_err)?;

                match row {
                    Some(row) => Ok(self.with_items(vec![row]).await?.pop()),
                    None => Ok(None),
                }
            })
            .await
    }

    async fn list_orders_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Order>> {
        self.db
            .timed(async {
                let rows: Vec<OrderRow> = sqlx::query_as(&format!(
                    "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id"
                ))
                .bind(user_id)
                .fetch_all(&self.db.pool)
                .await
                .map_err(db_err)?;

                self.with_items(rows).await
            })
            .await
    }

    async fn list_orders_for_stall(
        &self,
        stall_id: Uuid,
        status: Option<OrderStatus>,
    ) -> StoreResult<Vec<Order>> {
        self.db
            .timed(async {
                let rows: Vec<OrderRow> = sqlx::query_as(&format!(
                    r#"
                    SELECT {ORDER_COLUMNS}
                    FROM orders
                    WHERE stall_id = $1 AND ($2::text IS NULL OR status = $2)
                    ORDER BY created_at, vendor_order_id
                    "#
                ))
                .bind(stall_id)
                .bind(status.map(|s| s.as_str()))
                .fetch_all(&self.db.pool)
                .await
                .map_err(db_err)?;

                self.with_items(rows).await
            })
            .await
    }

    async fn apply_transition(&self, transition: &StatusTransition) -> StoreResult<bool> {
        self.db
            .timed(async {
                let mut tx = self.db.pool.begin().await.map_err(db_err)?;

                let updated = sqlx::query(
                    r#"
                    UPDATE orders
                    SET status = $3,
                        rejection_reason = COALESCE($4, rejection_reason),
                        updated_at = $5
                    WHERE id = $1 AND status = $2
                    "#,
                )
                .bind(transition.order_id)
                .bind(transition.expected.as_str())
                .bind(transition.next.as_str())
                .bind(transition.rejection_reason.clone())
                .bind(transition.at)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?
                .rows_affected();

                if updated == 0 {
                    return Ok(false);
                }

                if let Some(confirmation) = &transition.confirmation {
                    sqlx::query(
                        r#"
                        INSERT INTO order_confirmations (
                            id, order_id, created_at, confirmation_deadline,
                            is_confirmed, confirmed_at, is_auto_confirmed, auto_confirmed_at
                        )
                        VALUES ($1, $2, $3, $4, FALSE, NULL, FALSE, NULL)
                        ON CONFLICT (order_id) DO NOTHING
                        "#,
                    )
                    .bind(confirmation.id)
                    .bind(confirmation.order_id)
                    .bind(confirmation.created_at)
                    .bind(confirmation.confirmation_deadline)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
                }

                if let Some(mode) = transition.close_confirmation {
                    let close = close_clause(mode);
                    sqlx::query(&format!(
                        "UPDATE order_confirmations SET {close} WHERE order_id = $1 AND {OPEN_CONFIRMATION}"
                    ))
                    .bind(transition.order_id)
                    .bind(transition.at)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
                }

                tx.commit().await.map_err(db_err)?;
                Ok(true)
            })
            .await
    }
}

#[async_trait]
impl OrderConfirmationStore for StoreOrderRepository {
    async fn get_for_order(&self, order_id: Uuid) -> StoreResult<Option<OrderConfirmation>> {
        self.db
            .timed(async {
                let row: Option<ConfirmationRow> = sqlx::query_as(&format!(
                    "SELECT {CONFIRMATION_COLUMNS} FROM order_confirmations WHERE order_id = $1"
                ))
                .bind(order_id)
                .fetch_optional(&self.db.pool)
                .await
                .map_err(db_err)?;
                Ok(row.map(OrderConfirmation::from))
            })
            .await
    }

    async fn list_due(&self, now: DateTime<Utc>, limit: usize) -> StoreResult<Vec<OrderConfirmation>> {
        self.db
            .timed(async {
                let rows: Vec<ConfirmationRow> = sqlx::query_as(&format!(
                    r#"
                    SELECT {CONFIRMATION_COLUMNS}
                    FROM order_confirmations
                    WHERE {OPEN_CONFIRMATION}
                      AND confirmation_deadline <= $1
                    ORDER BY confirmation_deadline
                    LIMIT $2
                    "#
                ))
                .bind(now)
                .bind(limit as i64)
                .fetch_all(&self.db.pool)
                .await
                .map_err(db_err)?;
                Ok(rows.into_iter().map(OrderConfirmation::from).collect())
            })
            .await
    }

    async fn finalize(
        &self,
        confirmation_id: Uuid,
        mode: ConfirmationMode,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        self.db
            .timed(async {
                let mut tx = self.db.pool.begin().await.map_err(db_err)?;

                let Some((order_id,)): Option<(Uuid,)> =
                    sqlx::query_as("SELECT order_id FROM order_confirmations WHERE id = $1")
                        .bind(confirmation_id)
                        .fetch_optional(&mut *tx)
                        .await
                        .map_err(db_err)?
                else {
                    return Ok(false);
                };

                // Order row first, the same lock order as a status transition
                let status: Option<(String,)> =
                    sqlx::query_as("SELECT status FROM orders WHERE id = $1 FOR UPDATE")
                        .bind(order_id)
                        .fetch_optional(&mut *tx)
                        .await
                        .map_err(db_err)?;
                let received =
                    status.is_some_and(|(s,)| s == OrderStatus::AwaitingReceipt.as_str());

                let close = close_clause(if received { mode } else { ConfirmationMode::Void });
                let closed = sqlx::query(&format!(
                    "UPDATE order_confirmations SET {close} WHERE id = $1 AND {OPEN_CONFIRMATION}"
                ))
                .bind(confirmation_id)
                .bind(at)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?
                .rows_affected();

                if closed == 0 {
                    return Ok(false);
                }

                if received {
                    sqlx::query("UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1")
                        .bind(order_id)
                        .bind(OrderStatus::Accomplished.as_str())
                        .bind(at)
                        .execute(&mut *tx)
                        .await
                        .map_err(db_err)?;
                }

                tx.commit().await.map_err(db_err)?;
                Ok(received)
            })
            .await
    }
}
