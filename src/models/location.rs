//! Posiciones GPS y pings de conductores

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    pub fn from_pair(lat: Option<f64>, lng: Option<f64>) -> Option<Self> {
        match (lat, lng) {
            (Some(latitude), Some(longitude)) => Some(Self { latitude, longitude }),
            _ => None,
        }
    }

    /// Distancia haversine en kilómetros
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let delta_lat = (other.latitude - self.latitude).to_radians();
        let delta_lon = (other.longitude - self.longitude).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_KM * c
    }
}

/// Un reporte de posición enviado por la app del conductor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationPing {
    pub latitude: f64,
    pub longitude: f64,
    /// Secuencia monótona del cliente; los pings con secuencia vieja se descartan
    pub sequence: Option<i64>,
    /// Momento de captura en el dispositivo
    pub recorded_at: Option<DateTime<Utc>>,
    /// Reserva que el conductor cree estar sirviendo
    pub booking_id: Option<i64>,
}

impl LocationPing {
    pub fn at(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            sequence: None,
            recorded_at: None,
            booking_id: None,
        }
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}
