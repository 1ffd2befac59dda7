use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use campus_core::{Identity, IdentityError, IdentityProvider};
use campus_shared::models::UserRole;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    pub role: UserRole,
    pub exp: u64,
}

/// Verifies HS256 bearer tokens minted by the campus identity service.
pub struct JwtIdentityProvider {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtIdentityProvider {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
        }
    }

    /// Signs a token for `identity` that expires after `ttl`.
    pub fn issue_token(&self, identity: Identity, ttl: Duration) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = Claims {
            sub: identity.user_id,
            role: identity.role,
            exp: (Utc::now() + ttl).timestamp().max(0) as u64,
        };
        encode(&Header::default(), &claims, &self.encoding)
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentityProvider {
    async fn verify(&self, token: &str) -> Result<Identity, IdentityError> {
        let token_data = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| IdentityError::Invalid(e.to_string()))?;

        Ok(Identity {
            user_id: token_data.claims.sub,
            role: token_data.claims.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_issued_token_verifies() {
        let provider = JwtIdentityProvider::new("test-secret");
        let identity = Identity { user_id: Uuid::new_v4(), role: UserRole::Vendor };

        let token = provider.issue_token(identity, Duration::minutes(10)).unwrap();
        assert_eq!(provider.verify(&token).await.unwrap(), identity);
    }

    #[tokio::test]
    async fn test_foreign_and_expired_tokens_rejected() {
        let provider = JwtIdentityProvider::new("test-secret");
        let other = JwtIdentityProvider::new("other-secret");
        let identity = Identity { user_id: Uuid::new_v4(), role: UserRole::Customer };

        let foreign = other.issue_token(identity, Duration::minutes(10)).unwrap();
        assert!(matches!(provider.verify(&foreign).await, Err(IdentityError::Invalid(_))));

        let expired = provider.issue_token(identity, Duration::hours(-1)).unwrap();
        assert!(matches!(provider.verify(&expired).await, Err(IdentityError::Invalid(_))));
    }
}
