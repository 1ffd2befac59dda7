use async_trait::async_trait;
use uuid::Uuid;

use campus_catalog::{Product, Stall};
use campus_core::{ProductLookup, StallLookup, StoreResult, UserLookup};
use campus_shared::models::User;

use crate::database::{db_err, DbClient};

/// Read-only view of products, stalls and users.
pub struct StoreCatalogRepository {
    db: DbClient,
}

impl StoreCatalogRepository {
    pub fn new(db: DbClient) -> Self {
        Self { db }
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    stall_id: Uuid,
    name: String,
    base_price_cents: i64,
    price_with_markup_cents: i64,
    price_with_delivery_cents: i64,
    availability: String,
}

impl TryFrom<ProductRow> for Product {
    type Error = campus_core::StoreError;

    fn try_from(row: ProductRow) -> StoreResult<Self> {
        Ok(Product {
            id: row.id,
            stall_id: row.stall_id,
            name: row.name,
            base_price_cents: row.base_price_cents,
            price_with_markup_cents: row.price_with_markup_cents,
            price_with_delivery_cents: row.price_with_delivery_cents,
            availability: row.availability.parse()?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct StallRow {
    id: Uuid,
    owner_id: Uuid,
    name: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    display_name: String,
    role: String,
}

#[async_trait]
impl ProductLookup for StoreCatalogRepository {
    async fn get_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        self.db
            .timed(async {
                let rows: Vec<ProductRow> = sqlx::query_as(
                    r#"
                    SELECT id, stall_id, name, base_price_cents, price_with_markup_cents,
                           price_with_delivery_cents, availability
                    FROM products
                    WHERE id = ANY($1)
                    "#,
                )
                .bind(ids)
                .fetch_all(&self.db.pool)
                .await
                .map_err(db_err)?;

                rows.into_iter().map(Product::try_from).collect()
            })
            .await
    }
}

#[async_trait]
impl StallLookup for StoreCatalogRepository {
    async fn get_by_id(&self, id: Uuid) -> StoreResult<Option<Stall>> {
        self.db
            .timed(async {
                let row: Option<StallRow> =
                    sqlx::query_as("SELECT id, owner_id, name, created_at FROM stalls WHERE id = $1")
                        .bind(id)
                        .fetch_optional(&self.db.pool)
                        .await
                        .map_err(db_err)?;

                Ok(row.map(|r| Stall {
                    id: r.id,
                    owner_id: r.owner_id,
                    name: r.name,
                    created_at: r.created_at,
                }))
            })
            .await
    }
}

#[async_trait]
impl UserLookup for StoreCatalogRepository {
    async fn get_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        self.db
            .timed(async {
                let row: Option<UserRow> =
                    sqlx::query_as("SELECT id, display_name, role FROM users WHERE id = $1")
                        .bind(id)
                        .fetch_optional(&self.db.pool)
                        .await
                        .map_err(db_err)?;

                match row {
                    Some(r) => Ok(Some(User {
                        id: r.id,
                        display_name: r.display_name,
                        role: r.role.parse()?,
                    })),
                    None => Ok(None),
                }
            })
            .await
    }
}
