use serde::{Deserialize, Serialize};

const BPS_SCALE: i128 = 10_000;
const MINOR_PER_UNIT: i128 = 100;

/// Rates and fees for the marketplace. Rates are kept in basis points so
/// every computation stays in integer arithmetic.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PricingConfig {
    /// Markup applied on top of the vendor's base price
    pub markup_rate_bps: u32,

    /// Flat delivery fee in minor units
    pub delivery_fee_cents: i64,

    /// Platform commission taken from the markup price
    pub commission_rate_bps: u32,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            markup_rate_bps: 1_000,
            delivery_fee_cents: 1_000,
            commission_rate_bps: 500,
        }
    }
}

impl PricingConfig {
    /// Builds a config from fractional rates as they appear in configuration
    /// files (`0.10` for ten percent).
    pub fn from_rates(
        markup_rate: f64,
        delivery_fee_cents: i64,
        commission_rate: f64,
    ) -> Result<Self, PricingError> {
        let markup_rate_bps = rate_to_bps("markup_rate", markup_rate)?;
        let commission_rate_bps = rate_to_bps("commission_rate", commission_rate)?;
        if delivery_fee_cents < 0 {
            return Err(PricingError::NegativeFee(delivery_fee_cents));
        }

        Ok(Self {
            markup_rate_bps,
            delivery_fee_cents,
            commission_rate_bps,
        })
    }
}

fn rate_to_bps(name: &'static str, rate: f64) -> Result<u32, PricingError> {
    if !rate.is_finite() || !(0.0..=10.0).contains(&rate) {
        return Err(PricingError::InvalidRate { name, rate });
    }
    Ok((rate * BPS_SCALE as f64).round() as u32)
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PricingError {
    #[error("Invalid {name}: {rate}")]
    InvalidRate { name: &'static str, rate: f64 },

    #[error("Delivery fee cannot be negative: {0}")]
    NegativeFee(i64),

    #[error("Price out of range for base price {0}")]
    OutOfRange(i64),
}

/// Every customer-facing price derived from one base price.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriceQuote {
    pub base_cents: i64,
    pub markup_cents: i64,
    pub delivery_cents: i64,
}

/// Stateless price calculator. All amounts are minor units.
#[derive(Debug, Clone, Copy)]
pub struct PricingEngine {
    config: PricingConfig,
}

impl PricingEngine {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    pub fn delivery_fee(&self) -> i64 {
        self.config.delivery_fee_cents
    }

    /// `ceil(base + base * markup)` to the whole currency unit.
    pub fn markup_price(&self, base_cents: i64) -> Result<i64, PricingError> {
        let scaled = base_cents as i128 * (BPS_SCALE + self.config.markup_rate_bps as i128);
        to_cents(ceil_div(scaled, BPS_SCALE * MINOR_PER_UNIT) * MINOR_PER_UNIT, base_cents)
    }

    /// `ceil(markup_price + delivery_fee)` to the whole currency unit.
    pub fn delivery_price(&self, base_cents: i64) -> Result<i64, PricingError> {
        let total = self.markup_price(base_cents)? as i128 + self.config.delivery_fee_cents as i128;
        to_cents(ceil_div(total, MINOR_PER_UNIT) * MINOR_PER_UNIT, base_cents)
    }

    /// Commission on one unit sold at `price_each_cents`, rounded half up to
    /// the minor unit.
    pub fn commission(&self, price_each_cents: i64) -> Result<i64, PricingError> {
        let scaled = price_each_cents as i128 * self.config.commission_rate_bps as i128;
        to_cents(round_half_up_div(scaled, BPS_SCALE), price_each_cents)
    }

    pub fn quote(&self, base_cents: i64) -> Result<PriceQuote, PricingError> {
        Ok(PriceQuote {
            base_cents,
            markup_cents: self.markup_price(base_cents)?,
            delivery_cents: self.delivery_price(base_cents)?,
        })
    }
}

fn to_cents(value: i128, input_cents: i64) -> Result<i64, PricingError> {
    i64::try_from(value).map_err(|_| PricingError::OutOfRange(input_cents))
}

fn ceil_div(numerator: i128, denominator: i128) -> i128 {
    -((-numerator).div_euclid(denominator))
}

fn round_half_up_div(numerator: i128, denominator: i128) -> i128 {
    (numerator + denominator / 2).div_euclid(denominator)
}
