//! Métricas Prometheus del despacho

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct DispatchMetrics {
    registry: Registry,
    booking_events: IntCounterVec,
    assignment_conflicts: IntCounter,
    location_pings: IntCounterVec,
}

impl DispatchMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("ambulance_dispatch".to_string()), None)?;

        let booking_events = IntCounterVec::new(
            Opts::new("booking_events_total", "Booking lifecycle events by kind"),
            &["event"],
        )?;
        let assignment_conflicts = IntCounter::new(
            "assignment_conflicts_total",
            "Assignments rejected because a resource or booking changed underneath",
        )?;
        let location_pings = IntCounterVec::new(
            Opts::new("location_pings_total", "Driver location pings by outcome"),
            &["outcome"],
        )?;

        registry.register(Box::new(booking_events.clone()))?;
        registry.register(Box::new(assignment_conflicts.clone()))?;
        registry.register(Box::new(location_pings.clone()))?;

        Ok(Self {
            registry,
            booking_events,
            assignment_conflicts,
            location_pings,
        })
    }

    pub fn booking_event(&self, event: &str) {
        self.booking_events.with_label_values(&[event]).inc();
    }

    pub fn assignment_conflict(&self) {
        self.assignment_conflicts.inc();
    }

    pub fn location_ping(&self, accepted: bool) {
        let outcome = if accepted { "accepted" } else { "rejected" };
        self.location_pings.with_label_values(&[outcome]).inc();
    }

    /// Exporta el registro en formato texto de Prometheus
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!("⚠️ Error codificando métricas: {}", e);
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_counters() {
        let metrics = DispatchMetrics::new().unwrap();
        metrics.booking_event("created");
        metrics.assignment_conflict();
        metrics.location_ping(false);

        let text = metrics.render();
        assert!(text.contains("ambulance_dispatch_booking_events_total{event=\"created\"} 1"));
        assert!(text.contains("ambulance_dispatch_assignment_conflicts_total 1"));
        assert!(text.contains("outcome=\"rejected\""));
    }
}
