use std::sync::Arc;

use campus_catalog::{PricingEngine, PricingError};
use campus_core::{IdentityProvider, StallLookup};
use campus_order::{
    AutoConfirmationSweeper, CartService, CartSnapshotReader, CheckoutOrchestrator,
    DeliveryWorkflow, OrderAggregateBuilder, OrderStatusMachine, OrderStore,
};
use campus_shared::Clock;
use campus_store::app_config::BusinessRules;
use campus_store::{RedisClient, Stores};

use crate::metrics::Metrics;

/// The ordering workflows wired to one set of stores.
pub struct Services {
    pub carts: CartService,
    pub checkout: CheckoutOrchestrator,
    pub status: OrderStatusMachine,
    pub delivery: DeliveryWorkflow,
    pub confirmations: AutoConfirmationSweeper,
    pub orders: Arc<dyn OrderStore>,
    pub stalls: Arc<dyn StallLookup>,
    pub clock: Arc<dyn Clock>,
}

impl Services {
    pub fn new(stores: &Stores, rules: &BusinessRules, clock: Arc<dyn Clock>) -> Result<Self, PricingError> {
        let pricing = PricingEngine::new(rules.pricing_config()?);

        let builder = OrderAggregateBuilder::new(stores.products.clone(), stores.stalls.clone(), pricing);
        let checkout = CheckoutOrchestrator::new(
            CartSnapshotReader::new(stores.carts.clone()),
            builder,
            stores.orders.clone(),
            clock.clone(),
        );

        Ok(Self {
            carts: CartService::new(stores.carts.clone(), stores.products.clone()),
            checkout,
            status: OrderStatusMachine::new(stores.orders.clone(), clock.clone(), rules.confirmation_window()),
            delivery: DeliveryWorkflow::new(
                stores.orders.clone(),
                stores.delivery_requests.clone(),
                stores.users.clone(),
                clock.clone(),
            ),
            confirmations: AutoConfirmationSweeper::new(
                stores.orders.clone(),
                stores.confirmations.clone(),
                rules.sweep_batch_size,
            ),
            orders: stores.orders.clone(),
            stalls: stores.stalls.clone(),
            clock,
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub services: Arc<Services>,
    pub identity: Arc<dyn IdentityProvider>,
    pub metrics: Arc<Metrics>,
    pub redis: Option<Arc<RedisClient>>,
    pub rate_limit_per_minute: i64,
}
