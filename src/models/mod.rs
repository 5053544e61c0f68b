//! Modelos del sistema
//!
//! Este módulo contiene todos los modelos de datos que mapean exactamente
//! al schema PostgreSQL (ver `migrations/`).

pub mod actor;
pub mod ambulance;
pub mod booking;
pub mod driver;
pub mod event;
pub mod location;

pub use actor::{Actor, ActorRole};
pub use ambulance::{Ambulance, AmbulanceStatus, VehicleType};
pub use booking::{
    Booking, BookingFilter, BookingStatus, BookingType, Cancellation, NewBooking, RequesterRole,
};
pub use driver::{Driver, DriverStatus, NewDriver};
pub use event::{DispatchEvent, DispatchEventKind};
pub use location::{GeoPoint, LocationPing};
