use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MIN_QUANTITY: i32 = 1;
pub const MAX_QUANTITY: i32 = 100;

/// One product in a user's cart. Lines are scoped to the product's stall so
/// checkout can split the cart without another catalog round-trip.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CartLine {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub stall_id: Uuid,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CartLine {
    pub fn new(user_id: Uuid, product_id: Uuid, stall_id: Uuid, quantity: i32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            product_id,
            stall_id,
            quantity,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_valid_quantity(quantity: i32) -> bool {
        (MIN_QUANTITY..=MAX_QUANTITY).contains(&quantity)
    }

    pub fn set_quantity(&mut self, quantity: i32) {
        self.quantity = quantity;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_bounds() {
        assert!(!CartLine::is_valid_quantity(0));
        assert!(CartLine::is_valid_quantity(1));
        assert!(CartLine::is_valid_quantity(100));
        assert!(!CartLine::is_valid_quantity(101));
        assert!(!CartLine::is_valid_quantity(-3));
    }
}
