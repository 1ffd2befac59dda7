use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use campus_shared::models::UserRole;

/// The caller behind a request, as vouched for by the identity provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub role: UserRole,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("Missing credentials")]
    Missing,

    #[error("Invalid credentials: {0}")]
    Invalid(String),

    #[error("Identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Injected client for the external identity service. There is no global
/// instance; the API state owns one.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Identity, IdentityError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_check() {
        let admin = Identity { user_id: Uuid::new_v4(), role: UserRole::Admin };
        let partner = Identity { user_id: Uuid::new_v4(), role: UserRole::DeliveryPartner };

        assert!(admin.is_admin());
        assert!(!partner.is_admin());
    }
}
