use validator::Validate;

use crate::dto::fleet_dto::{
    LocationUpdateRequest, RegisterAmbulanceRequest, RegisterDriverRequest,
};
use crate::dto::ApiResponse;
use crate::models::{Actor, Ambulance, AmbulanceStatus, Driver, DriverStatus};
use crate::services::{FleetRegistry, LocationReporter};
use crate::state::AppState;
use crate::utils::errors::AppError;

pub struct FleetController {
    fleet: FleetRegistry,
    locations: LocationReporter,
}

impl FleetController {
    pub fn new(state: &AppState) -> Self {
        Self {
            fleet: state.fleet.clone(),
            locations: state.locations.clone(),
        }
    }

    pub async fn register_ambulance(
        &self,
        actor: &Actor,
        request: RegisterAmbulanceRequest,
    ) -> Result<ApiResponse<Ambulance>, AppError> {
        request.validate()?;
        let ambulance = self
            .fleet
            .register_ambulance(actor, &request.vehicle_number, request.vehicle_type)
            .await?;
        Ok(ApiResponse::success_with_message(
            ambulance,
            "Ambulance registered",
        ))
    }

    pub async fn list_ambulances(
        &self,
        actor: &Actor,
        status: Option<AmbulanceStatus>,
    ) -> Result<Vec<Ambulance>, AppError> {
        self.fleet.list_ambulances(actor, status).await
    }

    pub async fn available_ambulances(&self, actor: &Actor) -> Result<Vec<Ambulance>, AppError> {
        self.fleet.list_available_ambulances(actor).await
    }

    pub async fn get_ambulance(&self, actor: &Actor, id: i64) -> Result<Ambulance, AppError> {
        self.fleet.get_ambulance(actor, id).await
    }

    pub async fn set_ambulance_status(
        &self,
        actor: &Actor,
        id: i64,
        status: AmbulanceStatus,
    ) -> Result<ApiResponse<Ambulance>, AppError> {
        let ambulance = self.fleet.set_ambulance_status(actor, id, status).await?;
        let message = format!("Ambulance status set to {}", ambulance.status);
        Ok(ApiResponse::success_with_message(ambulance, message))
    }

    pub async fn register_driver(
        &self,
        actor: &Actor,
        request: RegisterDriverRequest,
    ) -> Result<ApiResponse<Driver>, AppError> {
        request.validate()?;
        let driver = self.fleet.register_driver(actor, request.into()).await?;
        Ok(ApiResponse::success_with_message(driver, "Driver registered"))
    }

    pub async fn list_drivers(
        &self,
        actor: &Actor,
        status: Option<DriverStatus>,
    ) -> Result<Vec<Driver>, AppError> {
        self.fleet.list_drivers(actor, status).await
    }

    pub async fn available_drivers(&self, actor: &Actor) -> Result<Vec<Driver>, AppError> {
        self.fleet.list_available_drivers(actor).await
    }

    pub async fn get_driver(&self, actor: &Actor, id: i64) -> Result<Driver, AppError> {
        self.fleet.get_driver(actor, id).await
    }

    pub async fn set_driver_status(
        &self,
        actor: &Actor,
        id: i64,
        status: DriverStatus,
    ) -> Result<ApiResponse<Driver>, AppError> {
        let driver = self.fleet.set_driver_status(actor, id, status).await?;
        let message = format!("Driver status set to {}", driver.status);
        Ok(ApiResponse::success_with_message(driver, message))
    }

    pub async fn report_location(
        &self,
        actor: &Actor,
        driver_id: i64,
        request: LocationUpdateRequest,
    ) -> Result<ApiResponse<Driver>, AppError> {
        request.validate()?;
        let driver = self
            .locations
            .report(actor, driver_id, request.into())
            .await?;
        Ok(ApiResponse::success(driver))
    }
}
