pub mod app_config;
pub mod cart_repo;
pub mod catalog_repo;
pub mod database;
pub mod delivery_repo;
pub mod memory;
pub mod order_repo;
pub mod redis_repo;

use std::sync::Arc;

use campus_core::{ProductLookup, StallLookup, UserLookup};
use campus_order::{CartStore, DeliveryRequestStore, OrderConfirmationStore, OrderStore};

pub use app_config::{Config, StorageBackend};
pub use cart_repo::StoreCartRepository;
pub use catalog_repo::StoreCatalogRepository;
pub use database::DbClient;
pub use delivery_repo::StoreDeliveryRepository;
pub use memory::MemoryStore;
pub use order_repo::StoreOrderRepository;
pub use redis_repo::RedisClient;

/// Every store seam the workflows need, backed by one storage engine.
#[derive(Clone)]
pub struct Stores {
    pub products: Arc<dyn ProductLookup>,
    pub stalls: Arc<dyn StallLookup>,
    pub users: Arc<dyn UserLookup>,
    pub carts: Arc<dyn CartStore>,
    pub orders: Arc<dyn OrderStore>,
    pub delivery_requests: Arc<dyn DeliveryRequestStore>,
    pub confirmations: Arc<dyn OrderConfirmationStore>,
}

impl Stores {
    pub fn postgres(db: DbClient) -> Self {
        let catalog = Arc::new(StoreCatalogRepository::new(db.clone()));
        let orders = Arc::new(StoreOrderRepository::new(db.clone()));
        Self {
            products: catalog.clone(),
            stalls: catalog.clone(),
            users: catalog,
            carts: Arc::new(StoreCartRepository::new(db.clone())),
            orders: orders.clone(),
            delivery_requests: Arc::new(StoreDeliveryRepository::new(db)),
            confirmations: orders,
        }
    }

    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            products: store.clone(),
            stalls: store.clone(),
            users: store.clone(),
            carts: store.clone(),
            orders: store.clone(),
            delivery_requests: store.clone(),
            confirmations: store,
        }
    }

    /// Opens the backend named in `storage.backend`, running migrations for
    /// Postgres.
    pub async fn connect(config: &Config) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        match config.storage.backend {
            StorageBackend::Postgres => {
                let db = DbClient::new(&config.database).await?;
                db.migrate().await?;
                Ok(Self::postgres(db))
            }
            StorageBackend::Memory => {
                tracing::warn!("Using the in-memory store; data is lost on restart");
                Ok(Self::memory(Arc::new(MemoryStore::new())))
            }
        }
    }
}
