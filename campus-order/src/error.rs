use uuid::Uuid;

use campus_catalog::PricingError;
use campus_core::StoreError;

/// Coarse classification used by callers to pick a response (4xx vs 5xx,
/// retry or not).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Infrastructure,
}

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Cart items not found for this user: {0:?}")]
    NotOwned(Vec<Uuid>),

    #[error("No cart items selected")]
    EmptySelection,

    #[error("Cart items span {0} stalls; checkout a single stall at a time")]
    MultiStallNotAllowed(usize),

    #[error("Products unavailable: {}", .0.join(", "))]
    ProductUnavailable(Vec<String>),

    #[error("Invalid quantity {0}; expected 1 to 100")]
    InvalidQuantity(i32),

    #[error("User {0} is not a delivery partner")]
    NotDeliveryPartner(Uuid),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("Stall not found: {0}")]
    StallNotFound(Uuid),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Delivery request already exists for order {0}")]
    DuplicateDeliveryRequest(Uuid),

    #[error("Order {0} is already confirmed")]
    AlreadyConfirmed(Uuid),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl OrderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrderError::Validation(_)
            | OrderError::NotOwned(_)
            | OrderError::EmptySelection
            | OrderError::MultiStallNotAllowed(_)
            | OrderError::ProductUnavailable(_)
            | OrderError::InvalidQuantity(_)
            | OrderError::NotDeliveryPartner(_)
            | OrderError::Pricing(_) => ErrorKind::Validation,
            OrderError::NotFound { .. } | OrderError::StallNotFound(_) => ErrorKind::NotFound,
            OrderError::InvalidTransition { .. }
            | OrderError::DuplicateDeliveryRequest(_)
            | OrderError::AlreadyConfirmed(_)
            | OrderError::Conflict(_) => ErrorKind::Conflict,
            OrderError::Store(_) => ErrorKind::Infrastructure,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, OrderError::Store(e) if e.is_retryable())
    }

    pub(crate) fn not_found(entity: &'static str, id: Uuid) -> Self {
        OrderError::NotFound { entity, id }
    }

    pub(crate) fn invalid_transition(from: impl ToString, to: impl ToString) -> Self {
        OrderError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

pub type OrderResult<T> = Result<T, OrderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(OrderError::EmptySelection.kind(), ErrorKind::Validation);
        assert_eq!(OrderError::StallNotFound(Uuid::new_v4()).kind(), ErrorKind::NotFound);
        assert_eq!(
            OrderError::invalid_transition("PENDING", "ACCOMPLISHED").kind(),
            ErrorKind::Conflict
        );
        assert_eq!(OrderError::from(StoreError::Timeout).kind(), ErrorKind::Infrastructure);
    }

    #[test]
    fn test_messages_name_the_details() {
        let err = OrderError::ProductUnavailable(vec!["Halo-halo".into(), "Lumpia".into()]);
        assert_eq!(err.to_string(), "Products unavailable: Halo-halo, Lumpia");

        let err = OrderError::invalid_transition("PENDING", "ACCOMPLISHED");
        assert_eq!(err.to_string(), "Invalid state transition from PENDING to ACCOMPLISHED");
    }

    #[test]
    fn test_only_transient_store_errors_retry() {
        assert!(OrderError::from(StoreError::Timeout).is_retryable());
        assert!(!OrderError::from(StoreError::Backend("bad row".into())).is_retryable());
        assert!(!OrderError::EmptySelection.is_retryable());
    }
}
