use async_trait::async_trait;
use uuid::Uuid;

use campus_catalog::{Product, Stall};
use campus_shared::models::User;

use crate::StoreResult;

/// Catalog reads used at order-creation time.
#[async_trait]
pub trait ProductLookup: Send + Sync {
    /// Returns the products that exist among `ids`; missing ids are omitted.
    async fn get_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Product>>;
}

#[async_trait]
pub trait StallLookup: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> StoreResult<Option<Stall>>;
}

#[async_trait]
pub trait UserLookup: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;
}
