use std::sync::Arc;

use uuid::Uuid;

use campus_core::UserLookup;
use campus_shared::models::UserRole;
use campus_shared::Clock;

use crate::error::{OrderError, OrderResult};
use crate::models::{DeliveryRequest, DeliveryRequestStatus, FulfillmentMethod};
use crate::repository::{DeliveryRequestStore, OrderStore};

/// Creates delivery requests and hands them to delivery partners.
pub struct DeliveryWorkflow {
    orders: Arc<dyn OrderStore>,
    requests: Arc<dyn DeliveryRequestStore>,
    users: Arc<dyn UserLookup>,
    clock: Arc<dyn Clock>,
}

impl DeliveryWorkflow {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        requests: Arc<dyn DeliveryRequestStore>,
        users: Arc<dyn UserLookup>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            orders,
            requests,
            users,
            clock,
        }
    }

    pub async fn create_delivery_request(&self, order_id: Uuid) -> OrderResult<DeliveryRequest> {
        let order = self
            .orders
            .get_order(order_id)
            .await?
            .ok_or_else(|| OrderError::not_found("order", order_id))?;

        if order.fulfillment_method != FulfillmentMethod::Delivery {
            return Err(OrderError::Validation(format!(
                "order {} is not a delivery order",
                order_id
            )));
        }
        if order.status.is_terminal() {
            return Err(OrderError::Conflict(format!(
                "order {} is already {}",
                order_id, order.status
            )));
        }
        if self.requests.get_request_for_order(order_id).await?.is_some() {
            return Err(OrderError::DuplicateDeliveryRequest(order_id));
        }

        let request = DeliveryRequest::new(order_id, self.clock.now());
        // The unique constraint on order_id catches a concurrent creator.
        if !self.requests.create_request(&request).await? {
            return Err(OrderError::DuplicateDeliveryRequest(order_id));
        }

        tracing::info!("Delivery request {} opened for order {}", request.id, order_id);
        Ok(request)
    }

    pub async fn assign(&self, request_id: Uuid, partner_id: Uuid) -> OrderResult<DeliveryRequest> {
        let request = self.get_request(request_id).await?;
        if request.status != DeliveryRequestStatus::Pending {
            return Err(OrderError::invalid_transition(request.status, DeliveryRequestStatus::Assigned));
        }

        let partner = self
            .users
            .get_by_id(partner_id)
            .await?
            .ok_or_else(|| OrderError::not_found("user", partner_id))?;
        if partner.role != UserRole::DeliveryPartner {
            return Err(OrderError::NotDeliveryPartner(partner_id));
        }

        let now = self.clock.now();
        if !self.requests.assign_partner(request_id, partner_id, now).await? {
            let current = self.get_request(request_id).await?;
            return Err(OrderError::invalid_transition(current.status, DeliveryRequestStatus::Assigned));
        }

        tracing::info!(
            "Delivery request {} for order {} assigned to partner {}",
            request_id,
            request.order_id,
            partner_id
        );
        Ok(DeliveryRequest {
            assigned_delivery_partner_id: Some(partner_id),
            status: DeliveryRequestStatus::Assigned,
            assigned_at: Some(now),
            ..request
        })
    }

    pub async fn complete(&self, request_id: Uuid) -> OrderResult<DeliveryRequest> {
        self.move_request(request_id, DeliveryRequestStatus::Completed).await
    }

    pub async fn cancel(&self, request_id: Uuid) -> OrderResult<DeliveryRequest> {
        self.move_request(request_id, DeliveryRequestStatus::Cancelled).await
    }

    pub async fn get_request(&self, request_id: Uuid) -> OrderResult<DeliveryRequest> {
        self.requests
            .get_request(request_id)
            .await?
            .ok_or_else(|| OrderError::not_found("delivery request", request_id))
    }

    pub async fn request_for_order(&self, order_id: Uuid) -> OrderResult<Option<DeliveryRequest>> {
        Ok(self.requests.get_request_for_order(order_id).await?)
    }

    pub async fn list_requests(
        &self,
        status: Option<DeliveryRequestStatus>,
    ) -> OrderResult<Vec<DeliveryRequest>> {
        Ok(self.requests.list_requests(status).await?)
    }

    async fn move_request(
        &self,
        request_id: Uuid,
        next: DeliveryRequestStatus,
    ) -> OrderResult<DeliveryRequest> {
        let mut request = self.get_request(request_id).await?;
        if !request.status.can_transition_to(next) {
            return Err(OrderError::invalid_transition(request.status, next));
        }

        let now = self.clock.now();
        if !self
            .requests
            .update_request_status(request_id, request.status, next, now)
            .await?
        {
            let current = self.get_request(request_id).await?;
            return Err(OrderError::invalid_transition(current.status, next));
        }

        tracing::info!("Delivery request {} moved {} -> {}", request_id, request.status, next);
        request.status = next;
        if next == DeliveryRequestStatus::Completed {
            request.completed_at = Some(now);
        }
        Ok(request)
    }
}
