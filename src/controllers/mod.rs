//! Controladores
//!
//! Validan los DTOs de entrada, delegan en los servicios y envuelven las
//! respuestas de mutación en `ApiResponse`.

pub mod booking_controller;
pub mod dispatch_controller;
pub mod fleet_controller;

pub use booking_controller::BookingController;
pub use dispatch_controller::DispatchController;
pub use fleet_controller::FleetController;
