use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use campus_order::{OrderStatus, SweepReport};

/// Prometheus registry for the ordering service, scraped at `/metrics`.
pub struct Metrics {
    registry: Registry,

    pub checkout_orders: IntCounterVec,
    pub order_transitions: IntCounterVec,
    pub sweeper_auto_confirmed: IntCounter,
    pub sweeper_failures: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let checkout_orders = IntCounterVec::new(
            Opts::new("checkout_orders_total", "Orders created by checkout"),
            &["mode"],
        )?;
        registry.register(Box::new(checkout_orders.clone()))?;

        let order_transitions = IntCounterVec::new(
            Opts::new("order_transitions_total", "Order status transitions applied"),
            &["to"],
        )?;
        registry.register(Box::new(order_transitions.clone()))?;

        let sweeper_auto_confirmed = IntCounter::new(
            "sweeper_auto_confirmed_total",
            "Orders accomplished by the auto-confirmation sweeper",
        )?;
        registry.register(Box::new(sweeper_auto_confirmed.clone()))?;

        let sweeper_failures = IntCounter::new(
            "sweeper_failures_total",
            "Confirmation rows or sweeps that failed",
        )?;
        registry.register(Box::new(sweeper_failures.clone()))?;

        Ok(Self {
            registry,
            checkout_orders,
            order_transitions,
            sweeper_auto_confirmed,
            sweeper_failures,
        })
    }

    pub fn record_checkout(&self, mode: &str, orders: usize) {
        self.checkout_orders.with_label_values(&[mode]).inc_by(orders as u64);
    }

    pub fn record_transition(&self, to: OrderStatus) {
        self.order_transitions.with_label_values(&[to.as_str()]).inc();
    }

    pub fn record_sweep(&self, report: &SweepReport) {
        self.sweeper_auto_confirmed.inc_by(report.auto_confirmed.len() as u64);
        self.sweeper_failures.inc_by(report.failed as u64);
        for _ in &report.auto_confirmed {
            self.record_transition(OrderStatus::Accomplished);
        }
    }

    /// Text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_render_includes_recorded_series() {
        let metrics = Metrics::new().unwrap();
        metrics.record_checkout("multi", 2);
        metrics.record_sweep(&SweepReport {
            auto_confirmed: vec![Uuid::new_v4()],
            skipped: 0,
            failed: 1,
        });

        let text = metrics.render().unwrap();
        assert!(text.contains("checkout_orders_total{mode=\"multi\"} 2"));
        assert!(text.contains("order_transitions_total{to=\"ACCOMPLISHED\"} 1"));
        assert!(text.contains("sweeper_auto_confirmed_total 1"));
        assert!(text.contains("sweeper_failures_total 1"));
    }
}
