mod common;

use std::sync::Arc;

use chrono::Duration;

use campus_api::worker::sweep_once;
use campus_order::{
    AutoConfirmationSweeper, FulfillmentMethod, Order, OrderConfirmationStore, OrderError,
    OrderStatus,
};
use campus_shared::Clock;
use common::Harness;

async fn placed_order(h: &Harness, method: FulfillmentMethod) -> Order {
    let product = h.product(&h.stall, "Bangsilog", 950).await;
    let line = h.add_to_cart(&product, 1).await;
    let address = (method == FulfillmentMethod::Delivery).then_some("Dorm 7");
    h.state
        .services
        .checkout
        .checkout_single_stall(h.checkout_request(&[&line], method, address))
        .await
        .unwrap()
}

async fn advance_to(h: &Harness, order: &Order, path: &[OrderStatus]) {
    for status in path {
        h.state
            .services
            .status
            .transition(order.id, *status, None)
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_pickup_lifecycle_with_manual_confirmation() {
    let h = Harness::new().await;
    let order = placed_order(&h, FulfillmentMethod::Pickup).await;

    advance_to(&h, &order, &[OrderStatus::Preparing, OrderStatus::AwaitingReceipt]).await;

    let confirmation = h.store.get_for_order(order.id).await.unwrap().unwrap();
    assert_eq!(confirmation.confirmation_deadline, h.clock.now() + Duration::minutes(5));
    assert!(confirmation.is_open());

    let confirmed = h
        .state
        .services
        .confirmations
        .confirm_manually(order.id, h.clock.now())
        .await
        .unwrap();
    assert!(confirmed.is_confirmed);
    assert!(!confirmed.is_auto_confirmed);

    let order = h.state.services.status.get_order(order.id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Accomplished);

    assert!(matches!(
        h.state.services.confirmations.confirm_manually(order.id, h.clock.now()).await,
        Err(OrderError::AlreadyConfirmed(_))
    ));
}

#[tokio::test]
async fn test_fulfillment_method_gates_the_path() {
    let h = Harness::new().await;
    let pickup = placed_order(&h, FulfillmentMethod::Pickup).await;
    let delivery = placed_order(&h, FulfillmentMethod::Delivery).await;
    let machine = &h.state.services.status;

    advance_to(&h, &pickup, &[OrderStatus::Preparing]).await;
    advance_to(&h, &delivery, &[OrderStatus::Preparing]).await;

    assert!(matches!(
        machine.transition(pickup.id, OrderStatus::Delivering, None).await,
        Err(OrderError::InvalidTransition { .. })
    ));
    assert!(matches!(
        machine.transition(delivery.id, OrderStatus::AwaitingReceipt, None).await,
        Err(OrderError::InvalidTransition { .. })
    ));

    let delivering = machine.transition(delivery.id, OrderStatus::Delivering, None).await.unwrap();
    assert_eq!(delivering.status, OrderStatus::Delivering);
}

#[tokio::test]
async fn test_rejection_needs_reason_and_is_terminal() {
    let h = Harness::new().await;
    let order = placed_order(&h, FulfillmentMethod::Pickup).await;
    let machine = &h.state.services.status;

    assert!(matches!(
        machine.transition(order.id, OrderStatus::Rejected, Some("  ".into())).await,
        Err(OrderError::Validation(_))
    ));

    let rejected = machine
        .transition(order.id, OrderStatus::Rejected, Some("Out of rice".into()))
        .await
        .unwrap();
    assert_eq!(rejected.rejection_reason.as_deref(), Some("Out of rice"));

    for next in [OrderStatus::Preparing, OrderStatus::Rejected, OrderStatus::Accomplished] {
        let result = machine.transition(order.id, next, Some("again".into())).await;
        assert!(matches!(result, Err(OrderError::InvalidTransition { .. })), "{next}");
    }
    let stored = machine.get_order(order.id).await.unwrap();
    assert_eq!(stored.status, OrderStatus::Rejected);
    assert_eq!(stored.rejection_reason.as_deref(), Some("Out of rice"));
}

#[tokio::test]
async fn test_racing_transitions_apply_once() {
    let h = Harness::new().await;
    let order = placed_order(&h, FulfillmentMethod::Pickup).await;
    let services = Arc::clone(&h.state.services);
    let other = Arc::clone(&h.state.services);

    let (a, b) = tokio::join!(
        services.status.transition(order.id, OrderStatus::Preparing, None),
        other.status.transition(order.id, OrderStatus::Preparing, None),
    );

    assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
    let loser = if a.is_err() { a } else { b };
    assert!(matches!(loser, Err(OrderError::InvalidTransition { .. })));
}

#[tokio::test]
async fn test_sweeper_auto_confirms_overdue_orders_once() {
    let h = Harness::new().await;
    let order = placed_order(&h, FulfillmentMethod::Pickup).await;
    advance_to(&h, &order, &[OrderStatus::Preparing, OrderStatus::AwaitingReceipt]).await;

    h.clock.advance(Duration::minutes(4));
    let early = sweep_once(&h.state).await.unwrap();
    assert!(early.is_empty());

    h.clock.advance(Duration::minutes(1));
    let report = sweep_once(&h.state).await.unwrap();
    assert_eq!(report.auto_confirmed, vec![order.id]);

    let confirmation = h.store.get_for_order(order.id).await.unwrap().unwrap();
    assert!(confirmation.is_auto_confirmed);
    assert_eq!(confirmation.auto_confirmed_at, Some(h.clock.now()));
    assert_eq!(
        h.state.services.status.get_order(order.id).await.unwrap().status,
        OrderStatus::Accomplished
    );

    let second = sweep_once(&h.state).await.unwrap();
    assert!(second.auto_confirmed.is_empty());
    assert!(second.is_empty());

    assert!(matches!(
        h.state.services.confirmations.confirm_manually(order.id, h.clock.now()).await,
        Err(OrderError::AlreadyConfirmed(_))
    ));
}

#[tokio::test]
async fn test_sweep_respects_batch_and_deadline_order() {
    let h = Harness::new().await;
    let mut orders = Vec::new();
    for _ in 0..3 {
        let order = placed_order(&h, FulfillmentMethod::Pickup).await;
        advance_to(&h, &order, &[OrderStatus::Preparing, OrderStatus::AwaitingReceipt]).await;
        orders.push(order.id);
        h.clock.advance(Duration::seconds(10));
    }

    h.clock.advance(Duration::minutes(10));
    let due = h.store.list_due(h.clock.now(), 2).await.unwrap();
    let due_orders: Vec<_> = due.iter().map(|c| c.order_id).collect();
    assert_eq!(due_orders, orders[..2].to_vec());

    let report = sweep_once(&h.state).await.unwrap();
    assert_eq!(report.auto_confirmed, orders);
}

#[tokio::test]
async fn test_sweep_pages_through_every_due_row() {
    let h = Harness::new().await;
    let mut orders = Vec::new();
    for _ in 0..3 {
        let order = placed_order(&h, FulfillmentMethod::Pickup).await;
        advance_to(&h, &order, &[OrderStatus::Preparing, OrderStatus::AwaitingReceipt]).await;
        orders.push(order.id);
        h.clock.advance(Duration::seconds(10));
    }
    h.clock.advance(Duration::minutes(10));

    let sweeper = AutoConfirmationSweeper::new(h.store.clone(), h.store.clone(), 2);
    let report = sweeper.sweep(h.clock.now()).await.unwrap();
    assert_eq!(report.auto_confirmed, orders);
    assert_eq!(report.skipped, 0);

    assert!(sweeper.sweep(h.clock.now()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rejected_after_receipt_window_is_never_auto_confirmed() {
    let h = Harness::new().await;
    let order = placed_order(&h, FulfillmentMethod::Pickup).await;
    advance_to(&h, &order, &[OrderStatus::Preparing, OrderStatus::AwaitingReceipt]).await;

    h.state
        .services
        .status
        .transition(order.id, OrderStatus::Rejected, Some("no".into()))
        .await
        .unwrap();

    h.clock.advance(Duration::minutes(10));
    let report = sweep_once(&h.state).await.unwrap();
    assert!(report.is_empty());

    let confirmation = h.store.get_for_order(order.id).await.unwrap().unwrap();
    assert!(confirmation.voided_at.is_some());
    assert!(!confirmation.is_auto_confirmed);
    assert!(!confirmation.is_confirmed);
    assert_eq!(
        h.state.services.status.get_order(order.id).await.unwrap().status,
        OrderStatus::Rejected
    );

    assert!(matches!(
        h.state.services.confirmations.confirm_manually(order.id, h.clock.now()).await,
        Err(OrderError::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn test_vendor_accomplishing_closes_the_receipt_window() {
    let h = Harness::new().await;
    let order = placed_order(&h, FulfillmentMethod::Pickup).await;
    advance_to(
        &h,
        &order,
        &[OrderStatus::Preparing, OrderStatus::AwaitingReceipt, OrderStatus::Accomplished],
    )
    .await;

    let confirmation = h.store.get_for_order(order.id).await.unwrap().unwrap();
    assert!(confirmation.is_confirmed);
    assert!(!confirmation.is_open());

    h.clock.advance(Duration::minutes(10));
    assert!(sweep_once(&h.state).await.unwrap().is_empty());
}
