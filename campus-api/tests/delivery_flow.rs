mod common;

use uuid::Uuid;

use campus_order::{DeliveryRequestStatus, FulfillmentMethod, Order, OrderError, OrderStatus};
use common::Harness;

async fn delivery_order(h: &Harness) -> Order {
    let product = h.product(&h.stall, "Pares", 1_200).await;
    let line = h.add_to_cart(&product, 1).await;
    h.state
        .services
        .checkout
        .checkout_single_stall(h.checkout_request(&[&line], FulfillmentMethod::Delivery, Some("Library steps")))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_request_is_created_once_per_delivery_order() {
    let h = Harness::new().await;
    let order = delivery_order(&h).await;
    let delivery = &h.state.services.delivery;

    let request = delivery.create_delivery_request(order.id).await.unwrap();
    assert_eq!(request.status, DeliveryRequestStatus::Pending);
    assert_eq!(request.order_id, order.id);
    assert!(request.assigned_delivery_partner_id.is_none());

    assert!(matches!(
        delivery.create_delivery_request(order.id).await,
        Err(OrderError::DuplicateDeliveryRequest(_))
    ));
    assert_eq!(delivery.request_for_order(order.id).await.unwrap(), Some(request));
}

#[tokio::test]
async fn test_request_rules_for_pickup_missing_and_closed_orders() {
    let h = Harness::new().await;
    let delivery = &h.state.services.delivery;

    let product = h.product(&h.stall, "Lugaw", 500).await;
    let line = h.add_to_cart(&product, 1).await;
    let pickup = h
        .state
        .services
        .checkout
        .checkout_single_stall(h.checkout_request(&[&line], FulfillmentMethod::Pickup, None))
        .await
        .unwrap();
    assert!(matches!(
        delivery.create_delivery_request(pickup.id).await,
        Err(OrderError::Validation(_))
    ));

    assert!(matches!(
        delivery.create_delivery_request(Uuid::new_v4()).await,
        Err(OrderError::NotFound { .. })
    ));

    let order = delivery_order(&h).await;
    h.state
        .services
        .status
        .transition(order.id, OrderStatus::Rejected, Some("Closed early".into()))
        .await
        .unwrap();
    assert!(matches!(
        delivery.create_delivery_request(order.id).await,
        Err(OrderError::Conflict(_))
    ));
}

#[tokio::test]
async fn test_assignment_stamps_partner_on_order() {
    let h = Harness::new().await;
    let order = delivery_order(&h).await;
    let delivery = &h.state.services.delivery;
    let request = delivery.create_delivery_request(order.id).await.unwrap();

    let assigned = delivery.assign(request.id, h.partner.id).await.unwrap();
    assert_eq!(assigned.status, DeliveryRequestStatus::Assigned);
    assert_eq!(assigned.assigned_delivery_partner_id, Some(h.partner.id));
    assert!(assigned.assigned_at.is_some());

    let order = h.state.services.status.get_order(order.id).await.unwrap();
    assert_eq!(order.delivery_partner_id, Some(h.partner.id));
}

#[tokio::test]
async fn test_second_assignment_conflicts_and_changes_nothing() {
    let h = Harness::new().await;
    let order = delivery_order(&h).await;
    let delivery = &h.state.services.delivery;
    let request = delivery.create_delivery_request(order.id).await.unwrap();
    let first = delivery.assign(request.id, h.partner.id).await.unwrap();

    let rival = campus_shared::models::User::new("Fe", campus_shared::models::UserRole::DeliveryPartner);
    h.store.insert_user(rival.clone()).await;

    match delivery.assign(request.id, rival.id).await {
        Err(e @ OrderError::InvalidTransition { .. }) => {
            assert_eq!(e.kind(), campus_order::ErrorKind::Conflict);
        }
        other => panic!("expected InvalidTransition, got {:?}", other),
    }
    assert_eq!(delivery.get_request(request.id).await.unwrap(), first);
}

#[tokio::test]
async fn test_assign_checks_partner_role() {
    let h = Harness::new().await;
    let order = delivery_order(&h).await;
    let delivery = &h.state.services.delivery;
    let request = delivery.create_delivery_request(order.id).await.unwrap();

    assert!(matches!(
        delivery.assign(request.id, h.customer.id).await,
        Err(OrderError::NotDeliveryPartner(_))
    ));
    assert!(matches!(
        delivery.assign(request.id, Uuid::new_v4()).await,
        Err(OrderError::NotFound { .. })
    ));
    assert!(matches!(
        delivery.assign(Uuid::new_v4(), h.partner.id).await,
        Err(OrderError::NotFound { .. })
    ));
    assert_eq!(
        delivery.get_request(request.id).await.unwrap().status,
        DeliveryRequestStatus::Pending
    );
}

#[tokio::test]
async fn test_complete_and_cancel_follow_request_lifecycle() {
    let h = Harness::new().await;
    let delivery = &h.state.services.delivery;

    let done = delivery.create_delivery_request(delivery_order(&h).await.id).await.unwrap();
    assert!(matches!(
        delivery.complete(done.id).await,
        Err(OrderError::InvalidTransition { .. })
    ));
    delivery.assign(done.id, h.partner.id).await.unwrap();
    let completed = delivery.complete(done.id).await.unwrap();
    assert_eq!(completed.status, DeliveryRequestStatus::Completed);
    assert!(completed.completed_at.is_some());
    assert!(matches!(
        delivery.cancel(done.id).await,
        Err(OrderError::InvalidTransition { .. })
    ));

    let dropped = delivery.create_delivery_request(delivery_order(&h).await.id).await.unwrap();
    let cancelled = delivery.cancel(dropped.id).await.unwrap();
    assert_eq!(cancelled.status, DeliveryRequestStatus::Cancelled);

    let pending = delivery.list_requests(Some(DeliveryRequestStatus::Pending)).await.unwrap();
    assert!(pending.is_empty());
    assert_eq!(delivery.list_requests(None).await.unwrap().len(), 2);
}
