use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use campus_shared::models::UnknownVariant;

use crate::pricing::{PricingEngine, PricingError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Availability {
    Available,
    SoldOut,
}

impl Availability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Availability::Available => "AVAILABLE",
            Availability::SoldOut => "SOLD_OUT",
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Availability {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AVAILABLE" => Ok(Availability::Available),
            "SOLD_OUT" => Ok(Availability::SoldOut),
            other => Err(UnknownVariant::new("availability", other)),
        }
    }
}

/// Read-only product snapshot. Prices are in minor units (cents) and were
/// derived from `base_price_cents` when the vendor last edited the product.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Product {
    pub id: Uuid,
    pub stall_id: Uuid,
    pub name: String,
    pub base_price_cents: i64,
    pub price_with_markup_cents: i64,
    pub price_with_delivery_cents: i64,
    pub availability: Availability,
}

impl Product {
    /// Lists a new product, deriving the customer-facing prices from the base
    /// price with the configured engine.
    pub fn priced(
        stall_id: Uuid,
        name: impl Into<String>,
        base_price_cents: i64,
        engine: &PricingEngine,
    ) -> Result<Self, PricingError> {
        let quote = engine.quote(base_price_cents)?;
        Ok(Self {
            id: Uuid::new_v4(),
            stall_id,
            name: name.into(),
            base_price_cents: quote.base_cents,
            price_with_markup_cents: quote.markup_cents,
            price_with_delivery_cents: quote.delivery_cents,
            availability: Availability::Available,
        })
    }

    pub fn is_available(&self) -> bool {
        self.availability == Availability::Available
    }
}

/// A vendor's storefront.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Stall {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Stall {
    pub fn new(owner_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::PricingConfig;

    #[test]
    fn test_priced_product_uses_engine() {
        let engine = PricingEngine::new(PricingConfig::default());
        let product = Product::priced(Uuid::new_v4(), "Chicken Adobo", 1000, &engine).unwrap();

        assert_eq!(product.price_with_markup_cents, 1100);
        assert_eq!(product.price_with_delivery_cents, 2100);
        assert!(product.is_available());
    }

    #[test]
    fn test_availability_parsing() {
        assert_eq!("SOLD_OUT".parse::<Availability>().unwrap(), Availability::SoldOut);
        assert!("GONE".parse::<Availability>().is_err());
    }
}
