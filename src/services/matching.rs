//! Estrategias de emparejamiento reserva -> (ambulancia, conductor)

use std::cmp::Ordering;

use crate::models::{Ambulance, Booking, BookingType, Driver, VehicleType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchPair {
    pub ambulance_id: i64,
    pub driver_id: i64,
}

/// Recibe sólo recursos AVAILABLE; `None` si no hay pareja posible
pub trait MatchingStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn select(
        &self,
        booking: &Booking,
        ambulances: &[Ambulance],
        drivers: &[Driver],
    ) -> Option<MatchPair>;
}

/// Conductor más cercano a la recogida y ambulancia del tipo preferido para
/// la clase de reserva. MORTUARY sólo cuando no queda nada más.
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestAvailable;

impl NearestAvailable {
    fn vehicle_rank(booking_type: BookingType, vehicle_type: VehicleType) -> u8 {
        match (booking_type, vehicle_type) {
            (_, VehicleType::Mortuary) => 3,
            (BookingType::Emergency, VehicleType::Icu) => 0,
            (BookingType::Emergency, VehicleType::AdvancedLifeSupport) => 1,
            (BookingType::Emergency, VehicleType::BasicLifeSupport) => 2,
            (BookingType::Normal, VehicleType::BasicLifeSupport) => 0,
            (BookingType::Normal, VehicleType::AdvancedLifeSupport) => 1,
            (BookingType::Normal, VehicleType::Icu) => 2,
        }
    }

    fn pick_ambulance<'a>(booking: &Booking, ambulances: &'a [Ambulance]) -> Option<&'a Ambulance> {
        ambulances.iter().filter(|a| a.is_available()).min_by(|a, b| {
            Self::vehicle_rank(booking.booking_type, a.vehicle_type)
                .cmp(&Self::vehicle_rank(booking.booking_type, b.vehicle_type))
                .then(a.id.cmp(&b.id))
        })
    }

    fn pick_driver<'a>(booking: &Booking, drivers: &'a [Driver]) -> Option<&'a Driver> {
        let pickup = booking.pickup();
        let distance = |driver: &Driver| -> Option<f64> {
            Some(pickup?.distance_km(&driver.location()?))
        };

        drivers.iter().filter(|d| d.is_available()).min_by(|a, b| {
            let by_distance = match (distance(a), distance(b)) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            by_distance.then(a.id.cmp(&b.id))
        })
    }
}

impl MatchingStrategy for NearestAvailable {
    fn name(&self) -> &'static str {
        "nearest_available"
    }

    fn select(
        &self,
        booking: &Booking,
        ambulances: &[Ambulance],
        drivers: &[Driver],
    ) -> Option<MatchPair> {
        let ambulance = Self::pick_ambulance(booking, ambulances)?;
        let driver = Self::pick_driver(booking, drivers)?;
        Some(MatchPair {
            ambulance_id: ambulance.id,
            driver_id: driver.id,
        })
    }
}
