use uuid::Uuid;

use campus_core::Identity;
use campus_order::{Order, OrderError, OrderStatus};
use campus_shared::models::UserRole;

use crate::error::AppError;
use crate::state::AppState;

pub fn require_role(identity: &Identity, allowed: &[UserRole]) -> Result<(), AppError> {
    if identity.is_admin() || allowed.contains(&identity.role) {
        Ok(())
    } else {
        Err(AppError::forbidden())
    }
}

/// True when the caller is the vendor that owns `stall_id`.
pub async fn owns_stall(state: &AppState, identity: &Identity, stall_id: Uuid) -> Result<bool, AppError> {
    if identity.role != UserRole::Vendor {
        return Ok(false);
    }
    let stall = state
        .services
        .stalls
        .get_by_id(stall_id)
        .await
        .map_err(OrderError::from)?
        .ok_or(OrderError::StallNotFound(stall_id))?;
    Ok(stall.owner_id == identity.user_id)
}

fn is_assigned_partner(identity: &Identity, order: &Order) -> bool {
    identity.role == UserRole::DeliveryPartner && order.delivery_partner_id == Some(identity.user_id)
}

/// Owner, stall vendor, assigned partner or admin.
pub async fn can_view_order(state: &AppState, identity: &Identity, order: &Order) -> Result<bool, AppError> {
    if identity.is_admin() || order.user_id == identity.user_id || is_assigned_partner(identity, order) {
        return Ok(true);
    }
    owns_stall(state, identity, order.stall_id).await
}

/// The stall's vendor and admins may apply any move; the assigned delivery
/// partner may only mark the order delivered.
pub async fn can_transition_order(
    state: &AppState,
    identity: &Identity,
    order: &Order,
    requested: OrderStatus,
) -> Result<bool, AppError> {
    if identity.is_admin() {
        return Ok(true);
    }
    if is_assigned_partner(identity, order) {
        return Ok(requested == OrderStatus::AwaitingReceipt);
    }
    owns_stall(state, identity, order.stall_id).await
}
