use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch},
    Extension, Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use campus_core::Identity;
use campus_shared::models::{CartLine, UserRole};

use crate::access::require_role;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i32,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/cart", get(list_cart).post(add_to_cart))
        .route("/v1/cart/{id}", patch(update_line).delete(remove_line))
}

async fn list_cart(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<CartLine>>, AppError> {
    require_role(&identity, &[UserRole::Customer])?;
    Ok(Json(state.services.carts.list(identity.user_id).await?))
}

async fn add_to_cart(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<AddToCartRequest>,
) -> Result<(StatusCode, Json<CartLine>), AppError> {
    require_role(&identity, &[UserRole::Customer])?;
    let line = state
        .services
        .carts
        .add(identity.user_id, req.product_id, req.quantity)
        .await?;
    Ok((StatusCode::CREATED, Json(line)))
}

/// Quantity zero removes the line and answers 204.
async fn update_line(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(line_id): Path<Uuid>,
    Json(req): Json<UpdateQuantityRequest>,
) -> Result<Response, AppError> {
    require_role(&identity, &[UserRole::Customer])?;
    match state
        .services
        .carts
        .update(identity.user_id, line_id, req.quantity)
        .await?
    {
        Some(line) => Ok(Json(line).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

async fn remove_line(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(line_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    require_role(&identity, &[UserRole::Customer])?;
    state.services.carts.remove(identity.user_id, line_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
