#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, Response};
use chrono::{TimeZone, Utc};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use campus_api::{app, auth::JwtIdentityProvider, metrics::Metrics, AppState, Services};
use campus_catalog::{PricingConfig, PricingEngine, Product, Stall};
use campus_core::Identity;
use campus_order::{CheckoutRequest, FulfillmentMethod};
use campus_shared::clock::ManualClock;
use campus_shared::models::{CartLine, User, UserRole};
use campus_store::app_config::BusinessRules;
use campus_store::{MemoryStore, Stores};

pub const SECRET: &str = "integration-secret";

/// A campus with one customer, two vendors with a stall each, a delivery
/// partner and an admin, all backed by the in-memory store.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub state: AppState,
    pub tokens: JwtIdentityProvider,
    pub pricing: PricingEngine,
    pub customer: User,
    pub vendor: User,
    pub other_vendor: User,
    pub partner: User,
    pub admin: User,
    pub stall: Stall,
    pub other_stall: Stall,
}

impl Harness {
    pub async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap()));

        let customer = User::new("Ana", UserRole::Customer);
        let vendor = User::new("Ben", UserRole::Vendor);
        let other_vendor = User::new("Cris", UserRole::Vendor);
        let partner = User::new("Dado", UserRole::DeliveryPartner);
        let admin = User::new("Eli", UserRole::Admin);
        for user in [&customer, &vendor, &other_vendor, &partner, &admin] {
            store.insert_user(user.clone()).await;
        }

        let stall = Stall::new(vendor.id, "Ben's Silog");
        let other_stall = Stall::new(other_vendor.id, "Cris's Kakanin");
        store.insert_stall(stall.clone()).await;
        store.insert_stall(other_stall.clone()).await;

        let services = Services::new(
            &Stores::memory(store.clone()),
            &BusinessRules::default(),
            clock.clone(),
        )
        .unwrap();

        let state = AppState {
            services: Arc::new(services),
            identity: Arc::new(JwtIdentityProvider::new(SECRET)),
            metrics: Arc::new(Metrics::new().unwrap()),
            redis: None,
            rate_limit_per_minute: 120,
        };

        Self {
            store,
            clock,
            state,
            tokens: JwtIdentityProvider::new(SECRET),
            pricing: PricingEngine::new(PricingConfig::default()),
            customer,
            vendor,
            other_vendor,
            partner,
            admin,
            stall,
            other_stall,
        }
    }

    pub async fn product(&self, stall: &Stall, name: &str, base_cents: i64) -> Product {
        let product = Product::priced(stall.id, name, base_cents, &self.pricing).unwrap();
        self.store.insert_product(product.clone()).await;
        product
    }

    pub async fn add_to_cart(&self, product: &Product, quantity: i32) -> CartLine {
        self.state
            .services
            .carts
            .add(self.customer.id, product.id, quantity)
            .await
            .unwrap()
    }

    pub fn checkout_request(
        &self,
        lines: &[&CartLine],
        method: FulfillmentMethod,
        address: Option<&str>,
    ) -> CheckoutRequest {
        CheckoutRequest {
            user_id: self.customer.id,
            cart_item_ids: lines.iter().map(|l| l.id).collect(),
            fulfillment_method: method,
            delivery_address: address.map(str::to_string),
            notes: None,
        }
    }

    pub fn token(&self, user: &User) -> String {
        let identity = Identity { user_id: user.id, role: user.role };
        self.tokens.issue_token(identity, chrono::Duration::hours(1)).unwrap()
    }

    pub async fn send(&self, method: &str, uri: &str, user: Option<&User>, body: Option<Value>) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", self.token(user)));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        app(self.state.clone()).oneshot(request).await.unwrap()
    }
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn id_of(value: &Value) -> Uuid {
    value["id"].as_str().unwrap().parse().unwrap()
}
