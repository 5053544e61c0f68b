//! Shared application state
//!
//! Este módulo define el estado compartido de la aplicación que se pasa
//! a través del router de Axum. Todos los servicios comparten el mismo
//! `DispatchStore`.

use std::sync::Arc;

use crate::config::EnvironmentConfig;
use crate::repositories::DispatchStore;
use crate::services::{
    BookingLedger, DispatchCoordinator, DistanceRateCharge, EventBus, FleetRegistry,
    LocationReporter, NearestAvailable, TripViewer,
};
use crate::utils::metrics::DispatchMetrics;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<EnvironmentConfig>,
    pub fleet: FleetRegistry,
    pub bookings: BookingLedger,
    pub dispatch: DispatchCoordinator,
    pub locations: LocationReporter,
    pub trips: TripViewer,
    pub events: EventBus,
    pub metrics: DispatchMetrics,
}

impl AppState {
    pub fn new(
        config: EnvironmentConfig,
        store: Arc<dyn DispatchStore>,
        events: EventBus,
        metrics: DispatchMetrics,
    ) -> Self {
        let charges = DistanceRateCharge::new(
            config.charge_per_km,
            config.charge_emergency_surcharge,
        );
        let bookings = BookingLedger::new(
            store.clone(),
            events.clone(),
            metrics.clone(),
            Arc::new(charges),
        );

        Self {
            fleet: FleetRegistry::new(store.clone()),
            dispatch: DispatchCoordinator::new(
                store.clone(),
                bookings.clone(),
                Arc::new(NearestAvailable),
            ),
            locations: LocationReporter::new(
                store.clone(),
                bookings.clone(),
                events.clone(),
                metrics.clone(),
                config.tracking_poll_interval_secs,
            ),
            trips: TripViewer::new(store, bookings.clone()),
            bookings,
            events,
            metrics,
            config: Arc::new(config),
        }
    }

    /// Estado con store en memoria, usado por los tests y sin `DATABASE_URL`
    pub fn in_memory(config: EnvironmentConfig) -> Result<Self, prometheus::Error> {
        Ok(Self::new(
            config,
            Arc::new(crate::repositories::MemoryDispatchStore::new()),
            EventBus::default(),
            DispatchMetrics::new()?,
        ))
    }
}
