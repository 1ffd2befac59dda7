use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use campus_shared::models::UnknownVariant;
use campus_shared::Masked;

/// Order status in the fulfillment lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Preparing,
    Delivering,
    AwaitingReceipt,
    Accomplished,
    Rejected,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Preparing => "PREPARING",
            OrderStatus::Delivering => "DELIVERING",
            OrderStatus::AwaitingReceipt => "AWAITING_RECEIPT",
            OrderStatus::Accomplished => "ACCOMPLISHED",
            OrderStatus::Rejected => "REJECTED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Accomplished | OrderStatus::Rejected)
    }

    /// Legal moves out of `self` for an order fulfilled by `method`.
    /// `Rejected` is reachable from every non-terminal status.
    pub fn can_transition_to(&self, next: OrderStatus, method: FulfillmentMethod) -> bool {
        use OrderStatus::*;

        match (self, next) {
            (current, Rejected) => !current.is_terminal(),
            (Pending, Preparing) => true,
            (Preparing, Delivering) => method == FulfillmentMethod::Delivery,
            (Preparing, AwaitingReceipt) => method == FulfillmentMethod::Pickup,
            (Delivering, AwaitingReceipt) => true,
            (AwaitingReceipt, Accomplished) => true,
            _ => false,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OrderStatus::Pending),
            "PREPARING" => Ok(OrderStatus::Preparing),
            "DELIVERING" => Ok(OrderStatus::Delivering),
            "AWAITING_RECEIPT" => Ok(OrderStatus::AwaitingReceipt),
            "ACCOMPLISHED" => Ok(OrderStatus::Accomplished),
            "REJECTED" => Ok(OrderStatus::Rejected),
            other => Err(UnknownVariant::new("order status", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FulfillmentMethod {
    Pickup,
    Delivery,
}

impl FulfillmentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            FulfillmentMethod::Pickup => "PICKUP",
            FulfillmentMethod::Delivery => "DELIVERY",
        }
    }
}

impl fmt::Display for FulfillmentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FulfillmentMethod {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PICKUP" => Ok(FulfillmentMethod::Pickup),
            "DELIVERY" => Ok(FulfillmentMethod::Delivery),
            other => Err(UnknownVariant::new("fulfillment method", other)),
        }
    }
}

/// How the customer wants an order handed over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDetails {
    pub fulfillment_method: FulfillmentMethod,
    pub delivery_address: Option<Masked<String>>,
    pub notes: Option<String>,
}

/// A purchase from a single stall
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub stall_id: Uuid,
    /// Per-stall display number, assigned when the order is committed
    pub vendor_order_id: Option<i64>,
    pub status: OrderStatus,
    pub fulfillment_method: FulfillmentMethod,
    pub delivery_address: Option<Masked<String>>,
    pub notes: Option<String>,
    pub items: Vec<OrderItem>,
    pub total_selling_price_cents: i64,
    pub delivery_fee_cents: i64,
    pub total_price_cents: i64,
    pub total_commission_fee_cents: i64,
    pub delivery_partner_id: Option<Uuid>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(user_id: Uuid, stall_id: Uuid, details: OrderDetails, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            stall_id,
            vendor_order_id: None,
            status: OrderStatus::Pending,
            fulfillment_method: details.fulfillment_method,
            delivery_address: details.delivery_address,
            notes: details.notes,
            items: Vec::new(),
            total_selling_price_cents: 0,
            delivery_fee_cents: 0,
            total_price_cents: 0,
            total_commission_fee_cents: 0,
            delivery_partner_id: None,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Add an item and refresh the totals
    pub fn add_item(&mut self, item: OrderItem) {
        self.items.push(item);
        self.recompute_totals();
    }

    pub fn set_delivery_fee(&mut self, fee_cents: i64) {
        self.delivery_fee_cents = fee_cents;
        self.recompute_totals();
    }

    /// Totals are always derived from the items; `total_price` is never set
    /// on its own.
    pub fn recompute_totals(&mut self) {
        self.total_selling_price_cents = self.items.iter().map(OrderItem::line_total).sum();
        self.total_commission_fee_cents = self.items.iter().map(OrderItem::line_commission).sum();
        self.total_price_cents = self.total_selling_price_cents + self.delivery_fee_cents;
    }

    pub fn update_status(&mut self, new_status: OrderStatus, at: DateTime<Utc>) {
        self.status = new_status;
        self.updated_at = at;
    }
}

/// An individual product line within an order. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub price_each_cents: i64,
    pub commission_fee_cents: i64,
}

impl OrderItem {
    pub fn new(
        order_id: Uuid,
        product_id: Uuid,
        product_name: String,
        quantity: i32,
        price_each_cents: i64,
        commission_fee_cents: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            product_id,
            product_name,
            quantity,
            price_each_cents,
            commission_fee_cents,
        }
    }

    pub fn line_total(&self) -> i64 {
        self.price_each_cents * self.quantity as i64
    }

    pub fn line_commission(&self) -> i64 {
        self.commission_fee_cents * self.quantity as i64
    }
}

/// Status change applied by the store as one conditional write.
#[derive(Debug, Clone)]
pub struct StatusTransition {
    pub order_id: Uuid,
    /// Status the caller read; the write only lands if it is still current
    pub expected: OrderStatus,
    pub next: OrderStatus,
    pub rejection_reason: Option<String>,
    /// Opened alongside the status change when entering `AwaitingReceipt`
    pub confirmation: Option<OrderConfirmation>,
    /// How the open confirmation is closed when leaving `AwaitingReceipt`
    pub close_confirmation: Option<ConfirmationMode>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryRequestStatus {
    Pending,
    Assigned,
    Completed,
    Cancelled,
}

impl DeliveryRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryRequestStatus::Pending => "PENDING",
            DeliveryRequestStatus::Assigned => "ASSIGNED",
            DeliveryRequestStatus::Completed => "COMPLETED",
            DeliveryRequestStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn can_transition_to(&self, next: DeliveryRequestStatus) -> bool {
        use DeliveryRequestStatus::*;

        matches!(
            (self, next),
            (Pending, Assigned) | (Pending, Cancelled) | (Assigned, Completed) | (Assigned, Cancelled)
        )
    }
}

impl fmt::Display for DeliveryRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryRequestStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(DeliveryRequestStatus::Pending),
            "ASSIGNED" => Ok(DeliveryRequestStatus::Assigned),
            "COMPLETED" => Ok(DeliveryRequestStatus::Completed),
            "CANCELLED" => Ok(DeliveryRequestStatus::Cancelled),
            other => Err(UnknownVariant::new("delivery request status", other)),
        }
    }
}

/// Connects an order that needs delivery with a delivery partner
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeliveryRequest {
    pub id: Uuid,
    pub order_id: Uuid,
    pub assigned_delivery_partner_id: Option<Uuid>,
    pub status: DeliveryRequestStatus,
    pub created_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl DeliveryRequest {
    pub fn new(order_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            assigned_delivery_partner_id: None,
            status: DeliveryRequestStatus::Pending,
            created_at: now,
            assigned_at: None,
            completed_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationMode {
    Manual,
    Auto,
    /// The order left `AwaitingReceipt` without being received
    Void,
}

impl ConfirmationMode {
    /// Closing mode for an order that leaves `AwaitingReceipt` for `next`
    /// through a status change rather than a confirmation.
    pub fn on_leaving_receipt(next: OrderStatus) -> Self {
        match next {
            OrderStatus::Accomplished => ConfirmationMode::Manual,
            _ => ConfirmationMode::Void,
        }
    }
}

/// Window during which the customer can confirm receipt before the system
/// does it for them
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderConfirmation {
    pub id: Uuid,
    pub order_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub confirmation_deadline: DateTime<Utc>,
    pub is_confirmed: bool,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub is_auto_confirmed: bool,
    pub auto_confirmed_at: Option<DateTime<Utc>>,
    pub voided_at: Option<DateTime<Utc>>,
}

impl OrderConfirmation {
    pub fn new(order_id: Uuid, now: DateTime<Utc>, window: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            created_at: now,
            confirmation_deadline: now + window,
            is_confirmed: false,
            confirmed_at: None,
            is_auto_confirmed: false,
            auto_confirmed_at: None,
            voided_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        !self.is_confirmed && !self.is_auto_confirmed && self.voided_at.is_none()
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.is_open() && self.confirmation_deadline <= now
    }

    pub fn finalize(&mut self, mode: ConfirmationMode, at: DateTime<Utc>) {
        match mode {
            ConfirmationMode::Manual => {
                self.is_confirmed = true;
                self.confirmed_at = Some(at);
            }
            ConfirmationMode::Auto => {
                self.is_auto_confirmed = true;
                self.auto_confirmed_at = Some(at);
            }
            ConfirmationMode::Void => self.voided_at = Some(at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Preparing,
        OrderStatus::Delivering,
        OrderStatus::AwaitingReceipt,
        OrderStatus::Accomplished,
        OrderStatus::Rejected,
    ];

    fn details(method: FulfillmentMethod) -> OrderDetails {
        OrderDetails {
            fulfillment_method: method,
            delivery_address: None,
            notes: None,
        }
    }

    #[test]
    fn test_pickup_path() {
        let method = FulfillmentMethod::Pickup;
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Preparing, method));
        assert!(OrderStatus::Preparing.can_transition_to(OrderStatus::AwaitingReceipt, method));
        assert!(!OrderStatus::Preparing.can_transition_to(OrderStatus::Delivering, method));
        assert!(OrderStatus::AwaitingReceipt.can_transition_to(OrderStatus::Accomplished, method));
    }

    #[test]
    fn test_delivery_path() {
        let method = FulfillmentMethod::Delivery;
        assert!(OrderStatus::Preparing.can_transition_to(OrderStatus::Delivering, method));
        assert!(!OrderStatus::Preparing.can_transition_to(OrderStatus::AwaitingReceipt, method));
        assert!(OrderStatus::Delivering.can_transition_to(OrderStatus::AwaitingReceipt, method));
    }

    #[test]
    fn test_terminal_statuses_have_no_exits() {
        for method in [FulfillmentMethod::Pickup, FulfillmentMethod::Delivery] {
            for terminal in [OrderStatus::Accomplished, OrderStatus::Rejected] {
                for next in ALL {
                    assert!(!terminal.can_transition_to(next, method), "{terminal} -> {next}");
                }
            }
        }
    }

    #[test]
    fn test_rejection_from_every_open_status() {
        for status in ALL.iter().filter(|s| !s.is_terminal()) {
            assert!(status.can_transition_to(OrderStatus::Rejected, FulfillmentMethod::Pickup));
        }
    }

    #[test]
    fn test_no_backward_moves() {
        assert!(!OrderStatus::Preparing.can_transition_to(OrderStatus::Pending, FulfillmentMethod::Pickup));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Accomplished, FulfillmentMethod::Pickup));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Pending, FulfillmentMethod::Pickup));
    }

    #[test]
    fn test_status_text_round_trip() {
        for status in ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
            assert_eq!(serde_json::to_string(&status).unwrap(), format!("\"{}\"", status));
        }
        assert!("SHIPPED".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_totals_follow_items() {
        let mut order = Order::new(Uuid::new_v4(), Uuid::new_v4(), details(FulfillmentMethod::Delivery), Utc::now());
        order.add_item(OrderItem::new(order.id, Uuid::new_v4(), "Siomai".into(), 2, 1_100, 55));
        order.set_delivery_fee(1_000);

        assert_eq!(order.total_selling_price_cents, 2_200);
        assert_eq!(order.total_commission_fee_cents, 110);
        assert_eq!(order.total_price_cents, 3_200);
    }

    #[test]
    fn test_delivery_request_transitions() {
        use DeliveryRequestStatus::*;
        assert!(Pending.can_transition_to(Assigned));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Assigned.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Assigned.can_transition_to(Assigned));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Assigned));
    }

    #[test]
    fn test_confirmation_deadline() {
        let now = Utc::now();
        let mut confirmation = OrderConfirmation::new(Uuid::new_v4(), now, Duration::minutes(5));

        assert!(!confirmation.is_due(now));
        assert!(confirmation.is_due(now + Duration::minutes(5)));

        confirmation.finalize(ConfirmationMode::Auto, now + Duration::minutes(6));
        assert!(!confirmation.is_open());
        assert!(!confirmation.is_due(now + Duration::minutes(10)));
    }

    #[test]
    fn test_voided_confirmation_is_never_due() {
        let now = Utc::now();
        let mut confirmation = OrderConfirmation::new(Uuid::new_v4(), now, Duration::minutes(5));

        confirmation.finalize(ConfirmationMode::on_leaving_receipt(OrderStatus::Rejected), now);
        assert_eq!(confirmation.voided_at, Some(now));
        assert!(!confirmation.is_auto_confirmed);
        assert!(!confirmation.is_due(now + Duration::minutes(10)));

        assert_eq!(
            ConfirmationMode::on_leaving_receipt(OrderStatus::Accomplished),
            ConfirmationMode::Manual
        );
    }
}
