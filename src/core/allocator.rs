use crate::domain::model::{ParkingSpot, SpotId, VehicleClass};
use crate::domain::ports::SpotRepository;
use crate::utils::error::Result;

/// Picks the spot a vehicle should take. Read-only: the caller marks the spot
/// occupied once its ticket is stored.
pub struct SpotAllocator<S: SpotRepository> {
    spots: S,
}

impl<S: SpotRepository> SpotAllocator<S> {
    pub fn new(spots: S) -> Self {
        Self { spots }
    }

    pub fn repository(&self) -> &S {
        &self.spots
    }

    /// `None` for an invalid selection or a full lot.
    pub async fn find_available_spot(
        &self,
        vehicle_class: Option<VehicleClass>,
    ) -> Result<Option<ParkingSpot>> {
        let Some(vehicle_class) = vehicle_class else {
            tracing::warn!("Invalid vehicle type selection");
            return Ok(None);
        };

        let raw = self.spots.find_lowest_free_spot(vehicle_class).await?;
        match raw.and_then(SpotId::from_raw) {
            Some(id) => {
                tracing::debug!(spot = %id, %vehicle_class, "free spot found");
                Ok(Some(ParkingSpot::new(id, vehicle_class, false)))
            }
            None => {
                tracing::warn!(%vehicle_class, "No free spot available");
                Ok(None)
            }
        }
    }
}
