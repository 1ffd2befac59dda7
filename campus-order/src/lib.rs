pub mod builder;
pub mod cart;
pub mod checkout;
pub mod confirmation;
pub mod delivery;
pub mod error;
pub mod manager;
pub mod models;
pub mod repository;

pub use builder::OrderAggregateBuilder;
pub use cart::{CartService, CartSnapshotReader, GroupedLines, StallGroup};
pub use checkout::{CheckoutOrchestrator, CheckoutRequest};
pub use confirmation::{AutoConfirmationSweeper, SweepReport};
pub use delivery::DeliveryWorkflow;
pub use error::{ErrorKind, OrderError, OrderResult};
pub use manager::OrderStatusMachine;
pub use models::{
    ConfirmationMode, DeliveryRequest, DeliveryRequestStatus, FulfillmentMethod, Order,
    OrderConfirmation, OrderDetails, OrderItem, OrderStatus, StatusTransition,
};
pub use repository::{
    CartStore, CheckoutConsumption, DeliveryRequestStore, OrderConfirmationStore, OrderStore,
};
