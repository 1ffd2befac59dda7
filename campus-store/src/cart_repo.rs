use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use campus_core::StoreResult;
use campus_order::CartStore;
use campus_shared::models::CartLine;

use crate::database::{db_err, DbClient};

const CART_COLUMNS: &str = "id, user_id, product_id, stall_id, quantity, created_at, updated_at";

pub struct StoreCartRepository {
    db: DbClient,
}

impl StoreCartRepository {
    pub fn new(db: DbClient) -> Self {
        Self { db }
    }
}

#[derive(sqlx::FromRow)]
struct CartRow {
    id: Uuid,
    user_id: Uuid,
    product_id: Uuid,
    stall_id: Uuid,
    quantity: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CartRow> for CartLine {
    fn from(row: CartRow) -> Self {
        CartLine {
            id: row.id,
            user_id: row.user_id,
            product_id: row.product_id,
            stall_id: row.stall_id,
            quantity: row.quantity,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl CartStore for StoreCartRepository {
    async fn resolve(&self, user_id: Uuid, ids: &[Uuid]) -> StoreResult<Vec<CartLine>> {
        self.db
            .timed(async {
                // Keep the caller's ordering so stall groups follow the selection
                let rows: Vec<CartRow> = sqlx::query_as(&format!(
                    r#"
                    SELECT {CART_COLUMNS}
                    FROM cart_items
                    WHERE user_id = $1 AND id = ANY($2)
                    ORDER BY array_position($2, id)
                    "#
                ))
                .bind(user_id)
                .bind(ids)
                .fetch_all(&self.db.pool)
                .await
                .map_err(db_err)?;

                Ok(rows.into_iter().map(CartLine::from).collect())
            })
            .await
    }

    async fn get_line(&self, id: Uuid) -> StoreResult<Option<CartLine>> {
        self.db
            .timed(async {
                let row: Option<CartRow> =
                    sqlx::query_as(&format!("SELECT {CART_COLUMNS} FROM cart_items WHERE id = $1"))
                        .bind(id)
                        .fetch_optional(&self.db.pool)
                        .await
                        .map_err(db_err)?;
                Ok(row.map(CartLine::from))
            })
            .await
    }

    async fn find_line(&self, user_id: Uuid, product_id: Uuid) -> StoreResult<Option<CartLine>> {
        self.db
            .timed(async {
                let row: Option<CartRow> = sqlx::query_as(&format!(
                    "SELECT {CART_COLUMNS} FROM cart_items WHERE user_id = $1 AND product_id = $2"
                ))
                .bind(user_id)
                .bind(product_id)
                .fetch_optional(&self.db.pool)
                .await
                .map_err(db_err)?;
                Ok(row.map(CartLine::from))
            })
            .await
    }

    async fn list_for_user(&self, user_id: Uuid) -> StoreResult<Vec<CartLine>> {
        self.db
            .timed(async {
                let rows: Vec<CartRow> = sqlx::query_as(&format!(
                    "SELECT {CART_COLUMNS} FROM cart_items WHERE user_id = $1 ORDER BY created_at, id"
                ))
                .bind(user_id)
                .fetch_all(&self.db.pool)
                .await
                .map_err(db_err)?;
                Ok(rows.into_iter().map(CartLine::from).collect())
            })
            .await
    }

    async fn upsert_line(&self, line: &CartLine) -> StoreResult<()> {
        self.db
            .timed(async {
                sqlx::query(
                    r#"
                    INSERT INTO cart_items (id, user_id, product_id, stall_id, quantity, created_at, updated_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    ON CONFLICT (id) DO UPDATE
                    SET quantity = EXCLUDED.quantity, updated_at = EXCLUDED.updated_at
                    "#,
                )
                .bind(line.id)
                .bind(line.user_id)
                .bind(line.product_id)
                .bind(line.stall_id)
                .bind(line.quantity)
                .bind(line.created_at)
                .bind(line.updated_at)
                .execute(&self.db.pool)
                .await
                .map_err(db_err)?;
                Ok(())
            })
            .await
    }

    async fn merge_line(&self, line: &CartLine, max_quantity: i32) -> StoreResult<Option<CartLine>> {
        self.db
            .timed(async {
                let row: Option<CartRow> = sqlx::query_as(&format!(
                    r#"
                    INSERT INTO cart_items (id, user_id, product_id, stall_id, quantity, created_at, updated_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    ON CONFLICT (user_id, product_id) DO UPDATE
                    SET quantity = cart_items.quantity + EXCLUDED.quantity,
                        updated_at = EXCLUDED.updated_at
                    WHERE cart_items.quantity + EXCLUDED.quantity <= $8
                    RETURNING {CART_COLUMNS}
                    "#
                ))
                .bind(line.id)
                .bind(line.user_id)
                .bind(line.product_id)
                .bind(line.stall_id)
                .bind(line.quantity)
                .bind(line.created_at)
                .bind(line.updated_at)
                .bind(max_quantity)
                .fetch_optional(&self.db.pool)
                .await
                .map_err(db_err)?;
                Ok(row.map(CartLine::from))
            })
            .await
    }

    async fn delete_lines(&self, user_id: Uuid, ids: &[Uuid]) -> StoreResult<u64> {
        self.db
            .timed(async {
                let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND id = ANY($2)")
                    .bind(user_id)
                    .bind(ids)
                    .execute(&self.db.pool)
                    .await
                    .map_err(db_err)?;
                Ok(result.rows_affected())
            })
            .await
    }
}
