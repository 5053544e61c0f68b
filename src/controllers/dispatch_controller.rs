use crate::dto::ApiResponse;
use crate::models::{Actor, Booking};
use crate::services::{DispatchCoordinator, DispatchSummary};
use crate::state::AppState;
use crate::utils::errors::AppError;

pub struct DispatchController {
    dispatch: DispatchCoordinator,
}

impl DispatchController {
    pub fn new(state: &AppState) -> Self {
        Self {
            dispatch: state.dispatch.clone(),
        }
    }

    pub async fn queue(&self, actor: &Actor) -> Result<Vec<Booking>, AppError> {
        self.dispatch.pending_queue(actor).await
    }

    pub async fn summary(&self, actor: &Actor) -> Result<DispatchSummary, AppError> {
        self.dispatch.summary(actor).await
    }

    pub async fn auto_assign(
        &self,
        actor: &Actor,
        booking_id: i64,
    ) -> Result<ApiResponse<Booking>, AppError> {
        let booking = self.dispatch.auto_assign(actor, booking_id).await?;
        Ok(ApiResponse::success_with_message(
            booking,
            "Booking assigned automatically",
        ))
    }

    pub async fn dispatch_next(&self, actor: &Actor) -> Result<ApiResponse<Booking>, AppError> {
        Ok(match self.dispatch.dispatch_next(actor).await? {
            Some(booking) => ApiResponse::success_with_message(booking, "Next booking dispatched"),
            None => ApiResponse::empty("No bookings waiting for dispatch"),
        })
    }
}
