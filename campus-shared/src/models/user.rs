use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::UnknownVariant;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Customer,
    Vendor,
    DeliveryPartner,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Customer => "CUSTOMER",
            UserRole::Vendor => "VENDOR",
            UserRole::DeliveryPartner => "DELIVERY_PARTNER",
            UserRole::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CUSTOMER" => Ok(UserRole::Customer),
            "VENDOR" => Ok(UserRole::Vendor),
            "DELIVERY_PARTNER" => Ok(UserRole::DeliveryPartner),
            "ADMIN" => Ok(UserRole::Admin),
            other => Err(UnknownVariant::new("user role", other)),
        }
    }
}

/// The slice of a user account the ordering core needs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub display_name: String,
    pub role: UserRole,
}

impl User {
    pub fn new(display_name: impl Into<String>, role: UserRole) -> Self {
        Self {
            id: Uuid::new_v4(),
            display_name: display_name.into(),
            role,
        }
    }
}
