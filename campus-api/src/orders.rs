use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use campus_core::Identity;
use campus_order::{
    CheckoutRequest, DeliveryRequest, FulfillmentMethod, Order, OrderConfirmation, OrderError,
    OrderStatus,
};
use campus_shared::models::UserRole;

use crate::access::{can_transition_order, can_view_order, owns_stall, require_role};
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckoutBody {
    pub cart_item_ids: Vec<Uuid>,
    pub fulfillment_method: FulfillmentMethod,
    pub delivery_address: Option<String>,
    pub notes: Option<String>,
}

impl CheckoutBody {
    fn into_request(self, user_id: Uuid) -> CheckoutRequest {
        CheckoutRequest {
            user_id,
            cart_item_ids: self.cart_item_ids,
            fulfillment_method: self.fulfillment_method,
            delivery_address: self.delivery_address,
            notes: self.notes,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusChangeRequest {
    pub status: OrderStatus,
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StallOrdersQuery {
    pub status: Option<OrderStatus>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/checkout", post(checkout_single))
        .route("/v1/checkout/multi", post(checkout_multi))
        .route("/v1/orders", get(list_my_orders))
        .route("/v1/orders/{id}", get(get_order))
        .route("/v1/orders/{id}/status", post(change_status))
        .route("/v1/orders/{id}/confirm", post(confirm_receipt))
        .route("/v1/orders/{id}/delivery-request", post(request_delivery))
        .route("/v1/stalls/{id}/orders", get(list_stall_orders))
}

async fn checkout_single(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(body): Json<CheckoutBody>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    require_role(&identity, &[UserRole::Customer])?;
    let order = state
        .services
        .checkout
        .checkout_single_stall(body.into_request(identity.user_id))
        .await?;

    state.metrics.record_checkout("single", 1);
    Ok((StatusCode::CREATED, Json(order)))
}

async fn checkout_multi(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(body): Json<CheckoutBody>,
) -> Result<(StatusCode, Json<Vec<Order>>), AppError> {
    require_role(&identity, &[UserRole::Customer])?;
    let orders = state
        .services
        .checkout
        .checkout_multi_stall(body.into_request(identity.user_id))
        .await?;

    state.metrics.record_checkout("multi", orders.len());
    Ok((StatusCode::CREATED, Json(orders)))
}

async fn list_my_orders(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<Order>>, AppError> {
    let orders = state
        .services
        .orders
        .list_orders_for_user(identity.user_id)
        .await
        .map_err(OrderError::from)?;
    Ok(Json(orders))
}

async fn get_order(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    let order = state.services.status.get_order(order_id).await?;
    if !can_view_order(&state, &identity, &order).await? {
        return Err(AppError::forbidden());
    }
    Ok(Json(order))
}

async fn list_stall_orders(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(stall_id): Path<Uuid>,
    Query(query): Query<StallOrdersQuery>,
) -> Result<Json<Vec<Order>>, AppError> {
    if !identity.is_admin() && !owns_stall(&state, &identity, stall_id).await? {
        return Err(AppError::forbidden());
    }
    let orders = state
        .services
        .orders
        .list_orders_for_stall(stall_id, query.status)
        .await
        .map_err(OrderError::from)?;
    Ok(Json(orders))
}

async fn change_status(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<StatusChangeRequest>,
) -> Result<Json<Order>, AppError> {
    let order = state.services.status.get_order(order_id).await?;
    if !can_transition_order(&state, &identity, &order, req.status).await? {
        return Err(AppError::forbidden());
    }

    let updated = state
        .services
        .status
        .transition(order_id, req.status, req.rejection_reason)
        .await?;

    state.metrics.record_transition(updated.status);
    Ok(Json(updated))
}

async fn confirm_receipt(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderConfirmation>, AppError> {
    let order = state.services.status.get_order(order_id).await?;
    if order.user_id != identity.user_id {
        return Err(AppError::forbidden());
    }

    let now = state.services.clock.now();
    let confirmation = state.services.confirmations.confirm_manually(order_id, now).await?;

    state.metrics.record_transition(OrderStatus::Accomplished);
    Ok(Json(confirmation))
}

async fn request_delivery(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(order_id): Path<Uuid>,
) -> Result<(StatusCode, Json<DeliveryRequest>), AppError> {
    let order = state.services.status.get_order(order_id).await?;
    let allowed = identity.is_admin()
        || order.user_id == identity.user_id
        || owns_stall(&state, &identity, order.stall_id).await?;
    if !allowed {
        return Err(AppError::forbidden());
    }

    let request = state.services.delivery.create_delivery_request(order_id).await?;
    Ok((StatusCode::CREATED, Json(request)))
}
