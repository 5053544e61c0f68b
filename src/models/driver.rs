//! Modelo de Driver
//!
//! ON_TRIP es un estado controlado por el sistema: sólo lo fija la
//! asignación y sólo lo quitan la finalización o la cancelación.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use std::fmt;

use crate::models::location::{GeoPoint, LocationPing};
use crate::utils::errors::{conflict_error, validation_error, AppResult};

/// Adelanto máximo de `recorded_at` sobre el reloj del servidor
pub const MAX_PING_CLOCK_SKEW_SECS: i64 = 30;

/// Estado del conductor - mapea al ENUM driver_status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "driver_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriverStatus {
    Available,
    OnTrip,
    OffDuty,
}

impl fmt::Display for DriverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DriverStatus::Available => "AVAILABLE",
            DriverStatus::OnTrip => "ON_TRIP",
            DriverStatus::OffDuty => "OFF_DUTY",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Driver {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub phone: String,
    pub license_number: String,
    pub status: DriverStatus,
    pub current_lat: Option<f64>,
    pub current_lng: Option<f64>,
    pub last_location_update: Option<DateTime<Utc>>,
    pub location_sequence: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Datos para registrar un conductor
#[derive(Debug, Clone)]
pub struct NewDriver {
    pub user_id: i64,
    pub name: String,
    pub phone: String,
    pub license_number: String,
}

impl Driver {
    pub fn is_available(&self) -> bool {
        self.status == DriverStatus::Available
    }

    pub fn location(&self) -> Option<GeoPoint> {
        GeoPoint::from_pair(self.current_lat, self.current_lng)
    }

    /// AVAILABLE -> ON_TRIP, parte del compare-and-set de la asignación
    pub fn begin_trip(&mut self, at: DateTime<Utc>) -> AppResult<()> {
        if !self.is_available() {
            return Err(conflict_error(format!(
                "driver {} is no longer available (status {}), please choose another",
                self.id, self.status
            )));
        }
        self.status = DriverStatus::OnTrip;
        self.updated_at = at;
        Ok(())
    }

    pub fn end_trip(&mut self, at: DateTime<Utc>) {
        self.status = DriverStatus::Available;
        self.updated_at = at;
    }

    /// Cambio manual AVAILABLE <-> OFF_DUTY mientras el conductor está libre
    pub fn set_manual_status(&mut self, status: DriverStatus, at: DateTime<Utc>) -> AppResult<()> {
        if status == DriverStatus::OnTrip {
            return Err(conflict_error(
                "ON_TRIP is set by dispatch only and cannot be requested directly",
            ));
        }
        if self.status == DriverStatus::OnTrip {
            return Err(conflict_error(format!(
                "driver {} is on an active trip and cannot be set to {}",
                self.id, status
            )));
        }
        self.status = status;
        self.updated_at = at;
        Ok(())
    }

    /// Aplica un ping de posición con semántica last-write-wins, rechazando
    /// los pings viejos y los que llegan para un viaje que ya no está activo.
    pub fn apply_ping(
        &mut self,
        ping: &LocationPing,
        active_booking_id: Option<i64>,
        received_at: DateTime<Utc>,
    ) -> AppResult<()> {
        if self.status == DriverStatus::OffDuty {
            return Err(conflict_error(format!(
                "driver {} is OFF_DUTY; location broadcasts are not accepted",
                self.id
            )));
        }

        if let Some(booking_id) = ping.booking_id {
            if active_booking_id != Some(booking_id) {
                return Err(conflict_error(format!(
                    "booking {} is not an active trip for driver {}",
                    booking_id, self.id
                )));
            }
        }

        if let Some(sequence) = ping.sequence {
            if sequence <= self.location_sequence {
                return Err(conflict_error(format!(
                    "stale location update: sequence {} <= {}",
                    sequence, self.location_sequence
                )));
            }
        }

        let recorded_at = ping.recorded_at.unwrap_or(received_at);
        if recorded_at > received_at + Duration::seconds(MAX_PING_CLOCK_SKEW_SECS) {
            return Err(validation_error(
                "recorded_at",
                format!(
                    "recorded_at {} is ahead of the server clock",
                    recorded_at.to_rfc3339()
                ),
            ));
        }
        if let Some(last) = self.last_location_update {
            if recorded_at < last {
                return Err(conflict_error(format!(
                    "stale location update: recorded at {} before {}",
                    recorded_at.to_rfc3339(),
                    last.to_rfc3339()
                )));
            }
        }

        self.current_lat = Some(ping.latitude);
        self.current_lng = Some(ping.longitude);
        self.last_location_update = Some(recorded_at);
        self.location_sequence = ping.sequence.unwrap_or(self.location_sequence + 1);
        self.updated_at = received_at;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::errors::AppError;

    fn driver(status: DriverStatus) -> Driver {
        let now = Utc::now();
        Driver {
            id: 9,
            user_id: 109,
            name: "Ravi".to_string(),
            phone: "9876543210".to_string(),
            license_number: "DL-0420110012345".to_string(),
            status,
            current_lat: None,
            current_lng: None,
            last_location_update: None,
            location_sequence: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_manual_status_cannot_touch_on_trip() {
        let mut d = driver(DriverStatus::Available);
        assert!(d.set_manual_status(DriverStatus::OnTrip, Utc::now()).is_err());
        assert!(d.set_manual_status(DriverStatus::OffDuty, Utc::now()).is_ok());

        let mut busy = driver(DriverStatus::OnTrip);
        assert!(busy.set_manual_status(DriverStatus::Available, Utc::now()).is_err());
        assert!(busy.set_manual_status(DriverStatus::OffDuty, Utc::now()).is_err());
        assert_eq!(busy.status, DriverStatus::OnTrip);
    }

    #[test]
    fn test_ping_sequence_is_monotonic() {
        let mut d = driver(DriverStatus::OnTrip);
        let now = Utc::now();

        let mut ping = LocationPing::at(19.0, 72.8);
        ping.sequence = Some(3);
        d.apply_ping(&ping, Some(1), now).unwrap();
        assert_eq!(d.location_sequence, 3);

        ping.sequence = Some(2);
        ping.latitude = 10.0;
        assert!(d.apply_ping(&ping, Some(1), now).is_err());
        assert_eq!(d.current_lat, Some(19.0));

        // sin secuencia: last-write-wins incrementando la secuencia guardada
        d.apply_ping(&LocationPing::at(19.1, 72.9), Some(1), now).unwrap();
        assert_eq!(d.location_sequence, 4);
    }

    #[test]
    fn test_ping_rejects_old_timestamp_and_foreign_booking() {
        let mut d = driver(DriverStatus::OnTrip);
        let now = Utc::now();
        d.apply_ping(&LocationPing::at(1.0, 1.0), Some(7), now).unwrap();

        let mut old = LocationPing::at(2.0, 2.0);
        old.recorded_at = Some(now - Duration::seconds(30));
        assert!(d.apply_ping(&old, Some(7), now).is_err());

        let mut late = LocationPing::at(2.0, 2.0);
        late.booking_id = Some(6);
        assert!(d.apply_ping(&late, Some(7), now).is_err());
        assert!(d.apply_ping(&late, None, now).is_err());
    }

    #[test]
    fn test_ping_from_the_future_is_rejected() {
        let mut d = driver(DriverStatus::Available);
        let now = Utc::now();

        let mut ahead = LocationPing::at(3.0, 3.0);
        ahead.sequence = Some(1);
        ahead.recorded_at = Some(now + Duration::days(365));
        assert!(matches!(
            d.apply_ping(&ahead, None, now),
            Err(AppError::Validation(_))
        ));
        assert!(d.last_location_update.is_none());
        assert_eq!(d.location_sequence, 0);

        // un reloj ligeramente adelantado se tolera
        let mut skewed = LocationPing::at(3.0, 3.0);
        skewed.recorded_at = Some(now + Duration::seconds(5));
        d.apply_ping(&skewed, None, now).unwrap();

        // y el siguiente ping sin timestamp sigue entrando
        d.apply_ping(&LocationPing::at(3.1, 3.1), None, now + Duration::seconds(6))
            .unwrap();
        assert_eq!(d.current_lat, Some(3.1));
    }

    #[test]
    fn test_off_duty_pings_rejected() {
        let mut d = driver(DriverStatus::OffDuty);
        assert!(d.apply_ping(&LocationPing::at(1.0, 1.0), None, Utc::now()).is_err());
        assert!(d.location().is_none());
    }
}
