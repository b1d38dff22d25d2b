use crate::domain::model::{SpotId, Ticket, VehicleClass};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Where the operator's answers come from.
#[cfg_attr(test, mockall::automock)]
pub trait InputSource: Send + Sync {
    /// Raw menu code; unknown codes are the caller's concern.
    fn read_vehicle_class_selection(&self) -> Result<u32>;
    fn read_registration_id(&self) -> Result<String>;
}

#[cfg_attr(test, mockall::automock)]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpotRepository: Send + Sync {
    /// Raw id of the lowest free spot for the class; `None`, 0 or a negative
    /// id all mean nothing is free.
    async fn find_lowest_free_spot(&self, vehicle_class: VehicleClass) -> Result<Option<i64>>;

    async fn set_occupied(&self, spot: SpotId, occupied: bool) -> Result<bool>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TicketRepository: Send + Sync {
    async fn save(&self, ticket: &Ticket) -> Result<bool>;

    async fn find_open_ticket_by_registration(&self, registration: &str) -> Result<Option<Ticket>>;

    async fn find_open_ticket_by_spot(&self, spot: SpotId) -> Result<Option<Ticket>>;

    /// Returns `false` when the update did not apply, e.g. the stored ticket
    /// was already closed by someone else.
    async fn update(&self, ticket: &Ticket) -> Result<bool>;

    async fn count_closed_tickets_by_registration(&self, registration: &str) -> Result<u32>;

    /// Voids a saved ticket whose spot could not be taken. Only a still-open
    /// stored copy is removed.
    async fn cancel(&self, ticket: &Ticket) -> Result<bool>;
}
