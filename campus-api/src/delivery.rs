use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use campus_core::Identity;
use campus_order::{DeliveryRequest, DeliveryRequestStatus};
use campus_shared::models::UserRole;

use crate::access::{owns_stall, require_role};
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RequestListQuery {
    pub status: Option<DeliveryRequestStatus>,
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    /// Defaults to the caller, for a partner claiming a request
    pub partner_id: Option<Uuid>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/delivery-requests", get(list_requests))
        .route("/v1/delivery-requests/{id}/assign", post(assign_request))
        .route("/v1/delivery-requests/{id}/complete", post(complete_request))
        .route("/v1/delivery-requests/{id}/cancel", post(cancel_request))
}

async fn list_requests(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<RequestListQuery>,
) -> Result<Json<Vec<DeliveryRequest>>, AppError> {
    require_role(&identity, &[UserRole::DeliveryPartner])?;
    Ok(Json(state.services.delivery.list_requests(query.status).await?))
}

async fn assign_request(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(request_id): Path<Uuid>,
    body: Option<Json<AssignRequest>>,
) -> Result<Json<DeliveryRequest>, AppError> {
    let requested = body.and_then(|Json(b)| b.partner_id);
    let partner_id = match (identity.role, requested) {
        (UserRole::Admin, Some(partner_id)) => partner_id,
        (UserRole::Admin, None) => {
            return Err(AppError::ValidationError("partner_id is required".to_string()))
        }
        (UserRole::DeliveryPartner, None) => identity.user_id,
        (UserRole::DeliveryPartner, Some(partner_id)) if partner_id == identity.user_id => partner_id,
        _ => return Err(AppError::forbidden()),
    };

    let request = state.services.delivery.assign(request_id, partner_id).await?;
    Ok(Json(request))
}

async fn complete_request(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(request_id): Path<Uuid>,
) -> Result<Json<DeliveryRequest>, AppError> {
    let request = state.services.delivery.get_request(request_id).await?;
    let is_assignee = request.assigned_delivery_partner_id == Some(identity.user_id);
    if !identity.is_admin() && !is_assignee {
        return Err(AppError::forbidden());
    }

    Ok(Json(state.services.delivery.complete(request_id).await?))
}

async fn cancel_request(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(request_id): Path<Uuid>,
) -> Result<Json<DeliveryRequest>, AppError> {
    if !identity.is_admin() {
        let request = state.services.delivery.get_request(request_id).await?;
        let order = state.services.status.get_order(request.order_id).await?;
        if !owns_stall(&state, &identity, order.stall_id).await? {
            return Err(AppError::forbidden());
        }
    }

    Ok(Json(state.services.delivery.cancel(request_id).await?))
}
