use crate::domain::model::{ParkingSpot, SpotId, Ticket, VehicleClass};
use crate::domain::ports::{SpotRepository, TicketRepository};
use crate::utils::error::{ParkingError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Default)]
pub struct InMemorySpotRepository {
    spots: Arc<Mutex<BTreeMap<SpotId, ParkingSpot>>>,
}

impl InMemorySpotRepository {
    pub fn new(spots: impl IntoIterator<Item = ParkingSpot>) -> Self {
        let spots = spots.into_iter().map(|spot| (spot.id, spot)).collect();
        Self {
            spots: Arc::new(Mutex::new(spots)),
        }
    }

    /// Numbers spots from 1, car spots first.
    pub fn with_layout(car_spots: usize, bike_spots: usize) -> Result<Self> {
        let classes = std::iter::repeat(VehicleClass::Car)
            .take(car_spots)
            .chain(std::iter::repeat(VehicleClass::Bike).take(bike_spots));

        let mut spots = Vec::with_capacity(car_spots + bike_spots);
        for (index, vehicle_class) in classes.enumerate() {
            let id = i64::try_from(index + 1)
                .ok()
                .and_then(SpotId::from_raw)
                .ok_or_else(|| ParkingError::ConfigError {
                    message: format!("lot too large: {} spots", car_spots + bike_spots),
                })?;
            spots.push(ParkingSpot::new(id, vehicle_class, false));
        }
        Ok(Self::new(spots))
    }

    pub async fn spot(&self, id: SpotId) -> Option<ParkingSpot> {
        self.spots.lock().await.get(&id).copied()
    }

    pub async fn free_spots(&self, vehicle_class: VehicleClass) -> usize {
        self.spots
            .lock()
            .await
            .values()
            .filter(|spot| spot.vehicle_class == vehicle_class && !spot.occupied)
            .count()
    }
}

#[async_trait]
impl SpotRepository for InMemorySpotRepository {
    async fn find_lowest_free_spot(&self, vehicle_class: VehicleClass) -> Result<Option<i64>> {
        let spots = self.spots.lock().await;
        Ok(spots
            .values()
            .find(|spot| spot.vehicle_class == vehicle_class && !spot.occupied)
            .map(|spot| i64::from(spot.id.get())))
    }

    async fn set_occupied(&self, spot: SpotId, occupied: bool) -> Result<bool> {
        let mut spots = self.spots.lock().await;
        match spots.get_mut(&spot) {
            Some(stored) => {
                stored.occupied = occupied;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Keeps every ticket ever issued, open and closed.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTicketRepository {
    tickets: Arc<Mutex<Vec<Ticket>>>,
}

impl InMemoryTicketRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn tickets(&self) -> Vec<Ticket> {
        self.tickets.lock().await.clone()
    }

    /// Most recent ticket for the registration, open or closed.
    pub async fn latest_ticket(&self, registration: &str) -> Option<Ticket> {
        self.tickets
            .lock()
            .await
            .iter()
            .rev()
            .find(|ticket| ticket.registration() == registration)
            .cloned()
    }
}

#[async_trait]
impl TicketRepository for InMemoryTicketRepository {
    async fn save(&self, ticket: &Ticket) -> Result<bool> {
        let mut tickets = self.tickets.lock().await;
        let duplicate = ticket.is_open()
            && tickets
                .iter()
                .any(|stored| stored.is_open() && stored.registration() == ticket.registration());
        if duplicate {
            return Ok(false);
        }
        tickets.push(ticket.clone());
        Ok(true)
    }

    async fn find_open_ticket_by_registration(&self, registration: &str) -> Result<Option<Ticket>> {
        let tickets = self.tickets.lock().await;
        Ok(tickets
            .iter()
            .rev()
            .find(|ticket| ticket.is_open() && ticket.registration() == registration)
            .cloned())
    }

    async fn find_open_ticket_by_spot(&self, spot: SpotId) -> Result<Option<Ticket>> {
        let tickets = self.tickets.lock().await;
        Ok(tickets
            .iter()
            .find(|ticket| ticket.is_open() && ticket.spot() == spot)
            .cloned())
    }

    async fn update(&self, ticket: &Ticket) -> Result<bool> {
        let mut tickets = self.tickets.lock().await;
        // Only the still-open copy of the same stay may be replaced.
        let stored = tickets.iter_mut().find(|stored| same_open_stay(stored, ticket));
        match stored {
            Some(stored) => {
                *stored = ticket.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn count_closed_tickets_by_registration(&self, registration: &str) -> Result<u32> {
        let tickets = self.tickets.lock().await;
        let count = tickets
            .iter()
            .filter(|ticket| !ticket.is_open() && ticket.registration() == registration)
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn cancel(&self, ticket: &Ticket) -> Result<bool> {
        let mut tickets = self.tickets.lock().await;
        match tickets.iter().position(|stored| same_open_stay(stored, ticket)) {
            Some(index) => {
                tickets.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

fn same_open_stay(stored: &Ticket, ticket: &Ticket) -> bool {
    stored.is_open()
        && stored.registration() == ticket.registration()
        && stored.spot() == ticket.spot()
        && stored.entry_time() == ticket.entry_time()
}
