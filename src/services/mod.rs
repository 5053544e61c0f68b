//! Servicios de negocio
//!
//! Cada servicio envuelve el `DispatchStore` compartido y aplica las reglas
//! de autorización y validación antes de tocarlo.

pub mod booking_ledger;
pub mod charge_policy;
pub mod dispatch_coordinator;
pub mod event_bus;
pub mod fleet_registry;
pub mod location_reporter;
pub mod matching;
pub mod trip_viewer;

pub use booking_ledger::{BookingDraft, BookingLedger};
pub use charge_policy::{ChargePolicy, DistanceRateCharge};
pub use dispatch_coordinator::{DispatchCoordinator, DispatchSummary};
pub use event_bus::{EventBus, EventPublisher, RedisEventPublisher};
pub use fleet_registry::FleetRegistry;
pub use location_reporter::{LocationReporter, TrackingSnapshot};
pub use matching::{MatchPair, MatchingStrategy, NearestAvailable};
pub use trip_viewer::TripViewer;
