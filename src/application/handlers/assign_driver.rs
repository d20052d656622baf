//! AssignDriverHandler - inbound contract with the driver-matching flow.

use std::sync::Arc;

use tracing::info;

use crate::domain::foundation::{DomainError, DriverId, ErrorCode, RideId};
use crate::domain::ride::{Ride, RideStatus};
use crate::ports::RideRepository;

/// Command handed over by driver matching: this driver takes this ride.
#[derive(Debug, Clone, Copy)]
pub struct AssignDriverCommand {
    pub ride_id: RideId,
    pub driver_id: DriverId,
}

#[derive(Debug, Clone)]
pub struct AssignDriverResult {
    pub ride: Ride,
}

/// Attaches the matched driver and moves the ride to `Accepted`.
pub struct AssignDriverHandler {
    rides: Arc<dyn RideRepository>,
}

impl AssignDriverHandler {
    pub fn new(rides: Arc<dyn RideRepository>) -> Self {
        Self { rides }
    }

    pub async fn handle(&self, cmd: AssignDriverCommand) -> Result<AssignDriverResult, DomainError> {
        let mut ride = self.rides.find(cmd.ride_id).await?.ok_or_else(|| {
            DomainError::new(ErrorCode::RideNotFound, format!("Ride {} not found", cmd.ride_id))
        })?;

        // A ride assigned straight from booking passes through the search
        // state implicitly.
        if ride.status == RideStatus::Pending {
            ride.transition_to(RideStatus::SearchingDriver)?;
        }
        ride.attach_driver(cmd.driver_id)?;
        ride.transition_to(RideStatus::Accepted)?;
        self.rides.update(&ride).await?;

        info!(ride_id = %ride.id, driver_id = %cmd.driver_id, "Driver assigned");
        Ok(AssignDriverResult { ride })
    }
}
