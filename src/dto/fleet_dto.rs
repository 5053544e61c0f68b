use chrono::{DateTime, Utc};
use serde::Deserialize;
use validator::Validate;

use crate::models::{AmbulanceStatus, DriverStatus, LocationPing, NewDriver, VehicleType};
use crate::utils::validation::{validate_not_empty, validate_phone, validate_vehicle_number};

// Request para registrar una ambulancia
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterAmbulanceRequest {
    #[validate(custom = "validate_vehicle_number")]
    pub vehicle_number: String,
    pub vehicle_type: VehicleType,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAmbulanceStatusRequest {
    pub status: AmbulanceStatus,
}

#[derive(Debug, Deserialize)]
pub struct AmbulanceListQuery {
    pub status: Option<AmbulanceStatus>,
}

// Request para registrar un conductor
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterDriverRequest {
    #[validate(range(min = 1))]
    pub user_id: i64,
    #[validate(length(max = 255), custom = "validate_not_empty")]
    pub name: String,
    #[validate(length(max = 32), custom = "validate_phone")]
    pub phone: String,
    #[validate(length(max = 64), custom = "validate_not_empty")]
    pub license_number: String,
}

impl From<RegisterDriverRequest> for NewDriver {
    fn from(request: RegisterDriverRequest) -> Self {
        NewDriver {
            user_id: request.user_id,
            name: request.name,
            phone: request.phone,
            license_number: request.license_number,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateDriverStatusRequest {
    pub status: DriverStatus,
}

#[derive(Debug, Deserialize)]
pub struct DriverListQuery {
    pub status: Option<DriverStatus>,
}

// Ping de posición enviado por la app del conductor
#[derive(Debug, Deserialize, Validate)]
pub struct LocationUpdateRequest {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    #[validate(range(min = 0))]
    pub sequence: Option<i64>,
    pub recorded_at: Option<DateTime<Utc>>,
    pub booking_id: Option<i64>,
}

impl From<LocationUpdateRequest> for LocationPing {
    fn from(request: LocationUpdateRequest) -> Self {
        LocationPing {
            latitude: request.latitude,
            longitude: request.longitude,
            sequence: request.sequence,
            recorded_at: request.recorded_at,
            booking_id: request.booking_id,
        }
    }
}
