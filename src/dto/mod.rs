//! DTOs de la API
//!
//! Requests con validación declarativa (`validator`) y el envoltorio común
//! de respuestas.

pub mod api_response;
pub mod booking_dto;
pub mod fleet_dto;

pub use api_response::ApiResponse;
