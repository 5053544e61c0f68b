//! Cálculo del importe de un viaje completado
//!
//! El importe se fija una única vez, al pasar la reserva a COMPLETED.

use rust_decimal::Decimal;

use crate::models::{Ambulance, Booking, BookingType, VehicleType};

pub trait ChargePolicy: Send + Sync {
    fn charge(&self, booking: &Booking, ambulance: Option<&Ambulance>) -> Decimal;
}

/// Tarifa base por tipo de vehículo + tarifa por km recorrido entre
/// recogida y destino + recargo de emergencia
#[derive(Debug, Clone)]
pub struct DistanceRateCharge {
    pub per_km: Decimal,
    pub emergency_surcharge: Decimal,
}

impl DistanceRateCharge {
    pub fn new(per_km: Decimal, emergency_surcharge: Decimal) -> Self {
        Self {
            per_km,
            emergency_surcharge,
        }
    }

    pub fn base_fare(vehicle_type: VehicleType) -> Decimal {
        match vehicle_type {
            VehicleType::Icu => Decimal::new(1500, 0),
            VehicleType::AdvancedLifeSupport => Decimal::new(1200, 0),
            VehicleType::BasicLifeSupport => Decimal::new(800, 0),
            VehicleType::Mortuary => Decimal::new(1000, 0),
        }
    }

    /// Distancia en línea recta; 0 si falta alguna coordenada
    fn distance_km(booking: &Booking) -> Decimal {
        match (booking.pickup(), booking.destination()) {
            (Some(from), Some(to)) => {
                Decimal::try_from(from.distance_km(&to)).unwrap_or(Decimal::ZERO)
            }
            _ => Decimal::ZERO,
        }
    }
}

impl ChargePolicy for DistanceRateCharge {
    fn charge(&self, booking: &Booking, ambulance: Option<&Ambulance>) -> Decimal {
        let vehicle_type = ambulance
            .map(|a| a.vehicle_type)
            .unwrap_or(VehicleType::BasicLifeSupport);

        let mut total = Self::base_fare(vehicle_type) + self.per_km * Self::distance_km(booking);
        if booking.booking_type == BookingType::Emergency {
            total += self.emergency_surcharge;
        }
        total.round_dp(2)
    }
}
