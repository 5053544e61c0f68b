//! Registro de flota: ambulancias y conductores
//!
//! Los cambios manuales de estado pasan por el store, que los rechaza
//! mientras el recurso esté retenido por una reserva activa.

use std::sync::Arc;

use tracing::info;

use crate::models::{
    Actor, ActorRole, Ambulance, AmbulanceStatus, Driver, DriverStatus, NewDriver, VehicleType,
};
use crate::repositories::DispatchStore;
use crate::utils::errors::{forbidden_error, not_found_error, validation_error, AppResult};
use crate::utils::validation::{
    normalize_vehicle_number, validate_phone, validate_positive, validate_vehicle_number,
};

#[derive(Clone)]
pub struct FleetRegistry {
    store: Arc<dyn DispatchStore>,
}

impl FleetRegistry {
    pub fn new(store: Arc<dyn DispatchStore>) -> Self {
        Self { store }
    }

    pub async fn register_ambulance(
        &self,
        actor: &Actor,
        vehicle_number: &str,
        vehicle_type: VehicleType,
    ) -> AppResult<Ambulance> {
        actor.require("register ambulance", &[ActorRole::Admin])?;

        if vehicle_number.trim().is_empty() {
            return Err(validation_error("vehicle_number", "vehicle number is required"));
        }
        if validate_vehicle_number(vehicle_number).is_err() {
            return Err(validation_error(
                "vehicle_number",
                format!("'{}' is not a valid vehicle number", vehicle_number),
            ));
        }

        let normalized = normalize_vehicle_number(vehicle_number);
        let ambulance = self.store.insert_ambulance(&normalized, vehicle_type).await?;
        info!(
            "🚑 Ambulancia {} registrada ({})",
            ambulance.vehicle_number, ambulance.id
        );
        Ok(ambulance)
    }

    pub async fn get_ambulance(&self, actor: &Actor, id: i64) -> AppResult<Ambulance> {
        actor.require("view ambulance", &[ActorRole::Admin])?;
        self.store
            .find_ambulance(id)
            .await?
            .ok_or_else(|| not_found_error("Ambulance", id))
    }

    pub async fn list_ambulances(
        &self,
        actor: &Actor,
        status: Option<AmbulanceStatus>,
    ) -> AppResult<Vec<Ambulance>> {
        actor.require("list ambulances", &[ActorRole::Admin])?;
        self.store.list_ambulances(status).await
    }

    pub async fn list_available_ambulances(&self, actor: &Actor) -> AppResult<Vec<Ambulance>> {
        self.list_ambulances(actor, Some(AmbulanceStatus::Available))
            .await
    }

    pub async fn set_ambulance_status(
        &self,
        actor: &Actor,
        id: i64,
        status: AmbulanceStatus,
    ) -> AppResult<Ambulance> {
        actor.require("change ambulance status", &[ActorRole::Admin])?;
        let ambulance = self.store.update_ambulance_status(id, status).await?;
        info!("🚑 Ambulancia {} ahora {}", id, ambulance.status);
        Ok(ambulance)
    }

    pub async fn register_driver(&self, actor: &Actor, new: NewDriver) -> AppResult<Driver> {
        actor.require("register driver", &[ActorRole::Admin])?;

        if validate_positive(new.user_id).is_err() {
            return Err(validation_error("user_id", "user_id must be positive"));
        }
        if new.name.trim().is_empty() {
            return Err(validation_error("name", "name is required"));
        }
        if validate_phone(&new.phone).is_err() {
            return Err(validation_error("phone", "phone must have 10 to 15 digits"));
        }
        if new.license_number.trim().is_empty() {
            return Err(validation_error("license_number", "license number is required"));
        }

        let new = NewDriver {
            name: new.name.trim().to_string(),
            license_number: new.license_number.trim().to_uppercase(),
            ..new
        };
        let driver = self.store.insert_driver(new).await?;
        info!("🧑‍✈️ Conductor {} registrado ({})", driver.name, driver.id);
        Ok(driver)
    }

    /// Administradores o el propio conductor
    pub async fn get_driver(&self, actor: &Actor, id: i64) -> AppResult<Driver> {
        let driver = self
            .store
            .find_driver(id)
            .await?
            .ok_or_else(|| not_found_error("Driver", id))?;
        ensure_admin_or_self(actor, &driver, "view driver")?;
        Ok(driver)
    }

    pub async fn list_drivers(
        &self,
        actor: &Actor,
        status: Option<DriverStatus>,
    ) -> AppResult<Vec<Driver>> {
        actor.require("list drivers", &[ActorRole::Admin])?;
        self.store.list_drivers(status).await
    }

    pub async fn list_available_drivers(&self, actor: &Actor) -> AppResult<Vec<Driver>> {
        self.list_drivers(actor, Some(DriverStatus::Available)).await
    }

    pub async fn set_driver_status(
        &self,
        actor: &Actor,
        id: i64,
        status: DriverStatus,
    ) -> AppResult<Driver> {
        self.get_driver(actor, id).await?;
        let driver = self.store.update_driver_status(id, status).await?;
        info!("🧑‍✈️ Conductor {} ahora {}", id, driver.status);
        Ok(driver)
    }
}

/// El conductor es la cuenta del actor
pub fn is_driver_account(actor: &Actor, driver: &Driver) -> bool {
    actor.role == ActorRole::Driver && driver.user_id == actor.id
}

fn ensure_admin_or_self(actor: &Actor, driver: &Driver, operation: &str) -> AppResult<()> {
    if actor.is_admin() || is_driver_account(actor, driver) {
        return Ok(());
    }
    Err(forbidden_error(
        operation,
        &format!("driver {} does not belong to {}", driver.id, actor),
    ))
}
