//! Modelo de Ambulance
//!
//! Mapea exactamente a la tabla `ambulances`. El estado BOOKED sólo lo
//! fija el ledger de reservas; los humanos alternan AVAILABLE/OUT_OF_SERVICE.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use std::fmt;

use crate::utils::errors::{conflict_error, AppResult};

/// Tipo de ambulancia - mapea al ENUM ambulance_type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "ambulance_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleType {
    Icu,
    BasicLifeSupport,
    AdvancedLifeSupport,
    Mortuary,
}

/// Estado de la ambulancia - mapea al ENUM ambulance_status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "ambulance_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AmbulanceStatus {
    Available,
    Booked,
    OutOfService,
}

impl fmt::Display for AmbulanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AmbulanceStatus::Available => "AVAILABLE",
            AmbulanceStatus::Booked => "BOOKED",
            AmbulanceStatus::OutOfService => "OUT_OF_SERVICE",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Ambulance {
    pub id: i64,
    pub vehicle_number: String,
    pub vehicle_type: VehicleType,
    pub status: AmbulanceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ambulance {
    pub fn is_available(&self) -> bool {
        self.status == AmbulanceStatus::Available
    }

    /// AVAILABLE -> BOOKED, parte del compare-and-set de la asignación
    pub fn book(&mut self, at: DateTime<Utc>) -> AppResult<()> {
        if !self.is_available() {
            return Err(conflict_error(format!(
                "ambulance {} is no longer available (status {}), please choose another",
                self.id, self.status
            )));
        }
        self.status = AmbulanceStatus::Booked;
        self.updated_at = at;
        Ok(())
    }

    /// Libera la ambulancia al terminar o cancelar el viaje
    pub fn release(&mut self, at: DateTime<Utc>) {
        self.status = AmbulanceStatus::Available;
        self.updated_at = at;
    }

    /// Cambio manual de estado por un administrador
    pub fn set_manual_status(
        &mut self,
        status: AmbulanceStatus,
        has_active_booking: bool,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        if status == AmbulanceStatus::Booked {
            return Err(conflict_error(
                "BOOKED is set by dispatch only and cannot be requested directly",
            ));
        }
        if has_active_booking || self.status == AmbulanceStatus::Booked {
            return Err(conflict_error(format!(
                "ambulance {} is serving an active booking and cannot be set to {}",
                self.id, status
            )));
        }
        self.status = status;
        self.updated_at = at;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ambulance(status: AmbulanceStatus) -> Ambulance {
        let now = Utc::now();
        Ambulance {
            id: 5,
            vehicle_number: "MH-12 AB 1234".to_string(),
            vehicle_type: VehicleType::Icu,
            status,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_book_requires_available() {
        let mut free = ambulance(AmbulanceStatus::Available);
        assert!(free.book(Utc::now()).is_ok());
        assert_eq!(free.status, AmbulanceStatus::Booked);

        let err = free.book(Utc::now()).unwrap_err();
        assert!(err.to_string().contains("no longer available"));

        let mut broken = ambulance(AmbulanceStatus::OutOfService);
        assert!(broken.book(Utc::now()).is_err());
    }

    #[test]
    fn test_manual_status_rules() {
        let mut amb = ambulance(AmbulanceStatus::Available);
        assert!(amb.set_manual_status(AmbulanceStatus::Booked, false, Utc::now()).is_err());
        assert!(amb.set_manual_status(AmbulanceStatus::OutOfService, false, Utc::now()).is_ok());
        assert!(amb.set_manual_status(AmbulanceStatus::Available, false, Utc::now()).is_ok());

        let mut busy = ambulance(AmbulanceStatus::Booked);
        assert!(busy.set_manual_status(AmbulanceStatus::Available, true, Utc::now()).is_err());
        assert_eq!(busy.status, AmbulanceStatus::Booked);
    }

    #[test]
    fn test_json_names() {
        let json = serde_json::to_string(&VehicleType::AdvancedLifeSupport).unwrap();
        assert_eq!(json, "\"ADVANCED_LIFE_SUPPORT\"");
        let status: AmbulanceStatus = serde_json::from_str("\"OUT_OF_SERVICE\"").unwrap();
        assert_eq!(status, AmbulanceStatus::OutOfService);
        assert_eq!(serde_json::to_string(&VehicleType::Icu).unwrap(), "\"ICU\"");
    }
}
