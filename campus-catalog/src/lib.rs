pub mod pricing;
pub mod product;

pub use pricing::{PriceQuote, PricingConfig, PricingEngine, PricingError};
pub use product::{Availability, Product, Stall};
