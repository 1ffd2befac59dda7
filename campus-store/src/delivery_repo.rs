use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use campus_core::StoreResult;
use campus_order::{DeliveryRequest, DeliveryRequestStatus, DeliveryRequestStore};

use crate::database::{db_err, is_unique_violation, DbClient};

const REQUEST_COLUMNS: &str =
    "id, order_id, assigned_delivery_partner_id, status, created_at, assigned_at, completed_at";

pub struct StoreDeliveryRepository {
    db: DbClient,
}

impl StoreDeliveryRepository {
    pub fn new(db: DbClient) -> Self {
        Self { db }
    }
}

#[derive(sqlx::FromRow)]
struct DeliveryRequestRow {
    id: Uuid,
    order_id: Uuid,
    assigned_delivery_partner_id: Option<Uuid>,
    status: String,
    created_at: DateTime<Utc>,
    assigned_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<DeliveryRequestRow> for DeliveryRequest {
    type Error = campus_core::StoreError;

    fn try_from(row: DeliveryRequestRow) -> StoreResult<Self> {
        Ok(DeliveryRequest {
            id: row.id,
            order_id: row.order_id,
            assigned_delivery_partner_id: row.assigned_delivery_partner_id,
            status: row.status.parse()?,
            created_at: row.created_at,
            assigned_at: row.assigned_at,
            completed_at: row.completed_at,
        })
    }
}

#[async_trait]
impl DeliveryRequestStore for StoreDeliveryRepository {
    async fn create_request(&self, request: &DeliveryRequest) -> StoreResult<bool> {
        self.db
            .timed(async {
                let inserted = sqlx::query(
                    r#"
                    INSERT INTO delivery_requests (
                        id, order_id, assigned_delivery_partner_id, status,
                        created_at, assigned_at, completed_at
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    ON CONFLICT (order_id) DO NOTHING
                    "#,
                )
                .bind(request.id)
                .bind(request.order_id)
                .bind(request.assigned_delivery_partner_id)
                .bind(request.status.as_str())
                .bind(request.created_at)
                .bind(request.assigned_at)
                .bind(request.completed_at)
                .execute(&self.db.pool)
                .await
                .map_err(db_err);

                match inserted {
                    Ok(result) => Ok(result.rows_affected() == 1),
                    Err(e) if is_unique_violation(&e) => Ok(false),
                    Err(e) => Err(e),
                }
            })
            .await
    }

    async fn get_request(&self, id: Uuid) -> StoreResult<Option<DeliveryRequest>> {
        self.db
            .timed(async {
                let row: Option<DeliveryRequestRow> =
                    sqlx::query_as(&format!("SELECT {REQUEST_COLUMNS} FROM delivery_requests WHERE id = $1"))
                        .bind(id)
                        .fetch_optional(&self.db.pool)
                        .await
                        .map_err(db_err)?;
                row.map(DeliveryRequest::try_from).transpose()
            })
            .await
    }

    async fn get_request_for_order(&self, order_id: Uuid) -> StoreResult<Option<DeliveryRequest>> {
        self.db
            .timed(async {
                let row: Option<DeliveryRequestRow> = sqlx::query_as(&format!(
                    "SELECT {REQUEST_COLUMNS} FROM delivery_requests WHERE order_id = $1"
                ))
                .bind(order_id)
                .fetch_optional(&self.db.pool)
                .await
                .map_err(db_err)?;
                row.map(DeliveryRequest::try_from).transpose()
            })
            .await
    }

    async fn list_requests(
        &self,
        status: Option<DeliveryRequestStatus>,
    ) -> StoreResult<Vec<DeliveryRequest>> {
        self.db
            .timed(async {
                let rows: Vec<DeliveryRequestRow> = sqlx::query_as(&format!(
                    r#"
                    SELECT {REQUEST_COLUMNS}
                    FROM delivery_requests
                    WHERE ($1::text IS NULL OR status = $1)
                    ORDER BY created_at, id
                    "#
                ))
                .bind(status.map(|s| s.as_str()))
                .fetch_all(&self.db.pool)
                .await
                .map_err(db_err)?;
                rows.into_iter().map(DeliveryRequest::try_from).collect()
            })
            .await
    }

    async fn assign_partner(
        &self,
        request_id: Uuid,
        partner_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        self.db
            .timed(async {
                let mut tx = self.db.pool.begin().await.map_err(db_err)?;

                let assigned: Option<(Uuid,)> = sqlx::query_as(
                    r#"
                    UPDATE delivery_requests
                    SET status = $3, assigned_delivery_partner_id = $2, assigned_at = $4
                    WHERE id = $1 AND status = $5
                    RETURNING order_id
                    "#,
                )
                .bind(request_id)
                .bind(partner_id)
                .bind(DeliveryRequestStatus::Assigned.as_str())
                .bind(at)
                .bind(DeliveryRequestStatus::Pending.as_str())
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err)?;

                let Some((order_id,)) = assigned else {
                    return Ok(false);
                };

                sqlx::query("UPDATE orders SET delivery_partner_id = $2, updated_at = $3 WHERE id = $1")
                    .bind(order_id)
                    .bind(partner_id)
                    .bind(at)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;

                tx.commit().await.map_err(db_err)?;
                Ok(true)
            })
            .await
    }

    async fn update_request_status(
        &self,
        request_id: Uuid,
        expected: DeliveryRequestStatus,
        next: DeliveryRequestStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let completed_at = (next == DeliveryRequestStatus::Completed).then_some(at);

        self.db
            .timed(async {
                let updated = sqlx::query(
                    r#"
                    UPDATE delivery_requests
                    SET status = $3, completed_at = COALESCE($4, completed_at)
                    WHERE id = $1 AND status = $2
                    "#,
                )
                .bind(request_id)
                .bind(expected.as_str())
                .bind(next.as_str())
                .bind(completed_at)
                .execute(&self.db.pool)
                .await
                .map_err(db_err)?
                .rows_affected();
                Ok(updated == 1)
            })
            .await
    }
}
