use crate::core::allocator::SpotAllocator;
use crate::core::fare::FareCalculator;
use crate::domain::model::{ParkingSpot, SpotId, Ticket, VehicleClass};
use crate::domain::ports::{Clock, InputSource, SpotRepository, TicketRepository};
use crate::utils::error::{ParkingError, Result};
use crate::utils::validation::normalize_registration;
use rust_decimal::Decimal;

/// What happened to an arriving vehicle. Every variant except `Parked` left
/// the lot untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryOutcome {
    Parked { ticket: Ticket, spot: ParkingSpot },
    InvalidRegistration,
    NoSpotAvailable { vehicle_class: Option<VehicleClass> },
    AlreadyParked { registration: String },
    TicketNotSaved { registration: String },
}

/// What happened to a leaving vehicle. Only `Departed` released a spot.
#[derive(Debug, Clone, PartialEq)]
pub enum ExitOutcome {
    Departed { ticket: Ticket, price: Decimal },
    InvalidRegistration,
    TicketNotFound { registration: String },
    TicketNotUpdated { registration: String },
}

/// Drives vehicle entry and exit. A spot is marked occupied only after its
/// ticket is saved, and released only after the closed ticket is saved.
pub struct ParkingService<I, S, T, C>
where
    I: InputSource,
    S: SpotRepository,
    T: TicketRepository,
    C: Clock,
{
    input: I,
    allocator: SpotAllocator<S>,
    tickets: T,
    clock: C,
    fares: FareCalculator,
}

impl<I, S, T, C> ParkingService<I, S, T, C>
where
    I: InputSource,
    S: SpotRepository,
    T: TicketRepository,
    C: Clock,
{
    pub fn new(input: I, spots: S, tickets: T, clock: C) -> Self {
        Self {
            input,
            allocator: SpotAllocator::new(spots),
            tickets,
            clock,
            fares: FareCalculator::default(),
        }
    }

    pub fn with_fare_calculator(mut self, fares: FareCalculator) -> Self {
        self.fares = fares;
        self
    }

    pub fn fare_calculator(&self) -> &FareCalculator {
        &self.fares
    }

    fn spots(&self) -> &S {
        self.allocator.repository()
    }

    pub async fn process_incoming_vehicle(&self) -> Result<EntryOutcome> {
        let selection = self.input.read_vehicle_class_selection()?;
        let vehicle_class = VehicleClass::from_selection(selection);
        let Some(registration) = normalize_registration(&self.input.read_registration_id()?)
        else {
            tracing::warn!("Empty vehicle registration, nothing parked");
            return Ok(EntryOutcome::InvalidRegistration);
        };

        let Some(spot) = self.allocator.find_available_spot(vehicle_class).await? else {
            return Ok(EntryOutcome::NoSpotAvailable { vehicle_class });
        };

        if self
            .tickets
            .find_open_ticket_by_registration(&registration)
            .await?
            .is_some()
        {
            tracing::warn!(%registration, "Vehicle already has an open ticket");
            return Ok(EntryOutcome::AlreadyParked { registration });
        }

        // A free-marked spot can still be held by an open ticket if an
        // earlier release or occupy step failed halfway.
        if let Some(holder) = self.tickets.find_open_ticket_by_spot(spot.id).await? {
            return Err(self.repair_held_spot(spot.id, &holder).await);
        }

        let previous_stays = self
            .tickets
            .count_closed_tickets_by_registration(&registration)
            .await?;
        let discount = previous_stays > 0;
        if discount {
            tracing::info!(
                %registration,
                previous_stays,
                "Returning customer, 5% discount applies"
            );
        }

        let ticket = Ticket::open(registration.as_str(), &spot, self.clock.now(), discount);
        if !self.tickets.save(&ticket).await? {
            tracing::error!(
                %registration,
                spot = %spot.id,
                "Unable to save ticket, spot left free"
            );
            return Ok(EntryOutcome::TicketNotSaved { registration });
        }

        let occupied = match self.spots().set_occupied(spot.id, true).await {
            Ok(true) => None,
            Ok(false) => Some(ParkingError::persistence(format!(
                "spot {} could not be marked occupied for {}",
                spot.id, registration
            ))),
            Err(e) => Some(e),
        };
        if let Some(error) = occupied {
            tracing::error!(
                %registration,
                spot = %spot.id,
                error = %error,
                "Spot could not be marked occupied, cancelling ticket"
            );
            self.cancel_ticket(&ticket).await;
            return Err(error);
        }

        tracing::info!(
            %registration,
            spot = %spot.id,
            vehicle_class = %spot.vehicle_class,
            entry_time = %ticket.entry_time(),
            "Vehicle parked"
        );
        Ok(EntryOutcome::Parked {
            ticket,
            spot: ParkingSpot::new(spot.id, spot.vehicle_class, true),
        })
    }

    pub async fn process_exiting_vehicle(&self) -> Result<ExitOutcome> {
        let Some(registration) = normalize_registration(&self.input.read_registration_id()?)
        else {
            tracing::warn!("Empty vehicle registration, nothing to close");
            return Ok(ExitOutcome::InvalidRegistration);
        };

        let Some(mut ticket) = self
            .tickets
            .find_open_ticket_by_registration(&registration)
            .await?
        else {
            tracing::warn!(%registration, "No open ticket found");
            return Ok(ExitOutcome::TicketNotFound { registration });
        };

        let exit_time = self.clock.now();
        let price = self.fares.fare_for_exit(&ticket, exit_time).inspect_err(|e| {
            tracing::error!(%registration, error = %e, "Cannot price ticket");
        })?;
        ticket.close(exit_time, price)?;

        if !self.tickets.update(&ticket).await? {
            tracing::error!(%registration, "Unable to update ticket, spot stays occupied");
            return Ok(ExitOutcome::TicketNotUpdated { registration });
        }

        // The spot keeps its occupied mark on failure, so it cannot be handed
        // out again; `release_orphaned_spot` frees it later.
        if !self.spots().set_occupied(ticket.spot(), false).await? {
            tracing::error!(
                %registration,
                spot = %ticket.spot(),
                "Ticket closed but spot could not be released"
            );
            return Err(ParkingError::persistence(format!(
                "spot {} could not be released after {} left",
                ticket.spot(),
                registration
            )));
        }

        tracing::info!(
            %registration,
            spot = %ticket.spot(),
            %price,
            exit_time = %exit_time,
            "Vehicle left"
        );
        Ok(ExitOutcome::Departed { ticket, price })
    }

    /// Frees a spot left occupied by a failed release. Returns `false` when an
    /// open ticket still holds the spot or the store did not apply the change.
    pub async fn release_orphaned_spot(&self, spot: SpotId) -> Result<bool> {
        if let Some(holder) = self.tickets.find_open_ticket_by_spot(spot).await? {
            tracing::warn!(
                %spot,
                registration = holder.registration(),
                "Spot is still held by an open ticket"
            );
            return Ok(false);
        }

        let released = self.spots().set_occupied(spot, false).await?;
        if released {
            tracing::info!(%spot, "Orphaned spot released");
        }
        Ok(released)
    }

    async fn cancel_ticket(&self, ticket: &Ticket) {
        match self.tickets.cancel(ticket).await {
            Ok(true) => tracing::info!(registration = ticket.registration(), "Ticket cancelled"),
            Ok(false) => tracing::error!(
                registration = ticket.registration(),
                "Ticket could not be cancelled, its spot will be repaired on next allocation"
            ),
            Err(e) => tracing::error!(
                registration = ticket.registration(),
                error = %e,
                "Ticket could not be cancelled, its spot will be repaired on next allocation"
            ),
        }
    }

    async fn repair_held_spot(&self, spot: SpotId, holder: &Ticket) -> ParkingError {
        tracing::error!(
            %spot,
            registration = holder.registration(),
            "Spot marked free but held by an open ticket, marking it occupied"
        );
        if let Err(e) = self.spots().set_occupied(spot, true).await {
            tracing::error!(%spot, error = %e, "Spot repair failed");
        }
        ParkingError::SpotConflict {
            spot: spot.get(),
            registration: holder.registration().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{
        MockClock, MockInputSource, MockSpotRepository, MockTicketRepository,
    };
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use mockall::predicate::eq;
    use rust_decimal_macros::dec;

    type MockService =
        ParkingService<MockInputSource, MockSpotRepository, MockTicketRepository, MockClock>;

    fn entry_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 1, 1, 15, 30, 0).unwrap()
    }

    fn spot_one() -> SpotId {
        SpotId::from_raw(1).unwrap()
    }

    fn input(selection: u32, registration: &'static str) -> MockInputSource {
        let mut input = MockInputSource::new();
        input
            .expect_read_vehicle_class_selection()
            .returning(move || Ok(selection));
        input
            .expect_read_registration_id()
            .returning(move || Ok(registration.to_string()));
        input
    }

    fn service(
        input: MockInputSource,
        spots: MockSpotRepository,
        tickets: MockTicketRepository,
        now: DateTime<Utc>,
    ) -> MockService {
        let mut clock = MockClock::new();
        clock.expect_now().returning(move || now);
        ParkingService::new(input, spots, tickets, clock)
    }

    fn open_ticket(discount: bool) -> Ticket {
        let spot = ParkingSpot::new(spot_one(), VehicleClass::Car, true);
        Ticket::open("ABCDEF", &spot, entry_time(), discount)
    }

    fn free_spot(raw: Option<i64>) -> MockSpotRepository {
        let mut spots = MockSpotRepository::new();
        spots
            .expect_find_lowest_free_spot()
            .returning(move |_| Ok(raw));
        spots
    }

    /// Ticket store with no open tickets and `previous_stays` closed ones.
    fn ticket_history(previous_stays: u32) -> MockTicketRepository {
        let mut tickets = MockTicketRepository::new();
        tickets
            .expect_find_open_ticket_by_registration()
            .returning(|_| Ok(None));
        tickets
            .expect_find_open_ticket_by_spot()
            .returning(|_| Ok(None));
        tickets
            .expect_count_closed_tickets_by_registration()
            .returning(move |_| Ok(previous_stays));
        tickets
    }

    #[tokio::test]
    async fn test_incoming_vehicle_saves_ticket_then_occupies_spot() {
        let mut spots = free_spot(Some(1));
        spots
            .expect_set_occupied()
            .with(eq(spot_one()), eq(true))
            .times(1)
            .returning(|_, _| Ok(true));

        let mut tickets = ticket_history(0);
        tickets
            .expect_save()
            .times(1)
            .withf(|ticket: &Ticket| {
                ticket.registration() == "ABCDEF"
                    && ticket.spot() == SpotId::from_raw(1).unwrap()
                    && ticket.is_open()
                    && ticket.price().is_none()
                    && !ticket.discount()
            })
            .returning(|_| Ok(true));
        tickets.expect_cancel().never();

        let service = service(input(1, "ABCDEF"), spots, tickets, entry_time());
        let outcome = service.process_incoming_vehicle().await.unwrap();

        match outcome {
            EntryOutcome::Parked { ticket, spot } => {
                assert_eq!(ticket.entry_time(), entry_time());
                assert_eq!(spot.id, spot_one());
                assert!(spot.occupied);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_returning_customer_gets_discount() {
        let mut spots = free_spot(Some(1));
        spots.expect_set_occupied().returning(|_, _| Ok(true));

        let mut tickets = ticket_history(2);
        tickets
            .expect_save()
            .times(1)
            .withf(|ticket: &Ticket| ticket.discount())
            .returning(|_| Ok(true));

        let service = service(input(1, "ABCDEF"), spots, tickets, entry_time());
        let outcome = service.process_incoming_vehicle().await.unwrap();
        assert!(matches!(outcome, EntryOutcome::Parked { ref ticket, .. } if ticket.discount()));
    }

    #[tokio::test]
    async fn test_incoming_vehicle_without_free_spot() {
        let mut spots = free_spot(Some(0));
        spots.expect_set_occupied().never();

        let mut tickets = MockTicketRepository::new();
        tickets.expect_save().never();

        let service = service(input(1, "ABCDEF"), spots, tickets, entry_time());
        let outcome = service.process_incoming_vehicle().await.unwrap();
        assert_eq!(
            outcome,
            EntryOutcome::NoSpotAvailable {
                vehicle_class: Some(VehicleClass::Car)
            }
        );
    }

    #[tokio::test]
    async fn test_incoming_vehicle_with_invalid_selection() {
        let mut spots = MockSpotRepository::new();
        spots.expect_find_lowest_free_spot().never();
        spots.expect_set_occupied().never();

        let mut tickets = MockTicketRepository::new();
        tickets.expect_save().never();

        let service = service(input(0, "ABCDEF"), spots, tickets, entry_time());
        let outcome = service.process_incoming_vehicle().await.unwrap();
        assert_eq!(
            outcome,
            EntryOutcome::NoSpotAvailable {
                vehicle_class: None
            }
        );
    }

    #[tokio::test]
    async fn test_incoming_vehicle_with_empty_registration() {
        let mut spots = MockSpotRepository::new();
        spots.expect_find_lowest_free_spot().never();
        spots.expect_set_occupied().never();

        let mut tickets = MockTicketRepository::new();
        tickets.expect_save().never();

        let service = service(input(1, "   "), spots, tickets, entry_time());
        let outcome = service.process_incoming_vehicle().await.unwrap();
        assert_eq!(outcome, EntryOutcome::InvalidRegistration);
    }

    #[tokio::test]
    async fn test_vehicle_already_parked_is_not_parked_twice() {
        let mut spots = free_spot(Some(2));
        spots.expect_set_occupied().never();

        let mut tickets = MockTicketRepository::new();
        tickets
            .expect_find_open_ticket_by_registration()
            .returning(|_| Ok(Some(open_ticket(false))));
        tickets.expect_save().never();

        let service = service(input(1, "ABCDEF"), spots, tickets, entry_time());
        let outcome = service.process_incoming_vehicle().await.unwrap();
        assert_eq!(
            outcome,
            EntryOutcome::AlreadyParked {
                registration: "ABCDEF".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_failed_save_never_occupies_spot() {
        let mut spots = free_spot(Some(1));
        spots.expect_set_occupied().never();

        let mut tickets = ticket_history(0);
        tickets.expect_save().times(1).returning(|_| Ok(false));

        let service = service(input(1, "ABCDEF"), spots, tickets, entry_time());
        let outcome = service.process_incoming_vehicle().await.unwrap();
        assert_eq!(
            outcome,
            EntryOutcome::TicketNotSaved {
                registration: "ABCDEF".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_save_error_never_occupies_spot() {
        let mut spots = free_spot(Some(1));
        spots.expect_set_occupied().never();

        let mut tickets = ticket_history(0);
        tickets
            .expect_save()
            .returning(|_| Err(ParkingError::persistence("disk full")));

        let service = service(input(1, "ABCDEF"), spots, tickets, entry_time());
        let result = service.process_incoming_vehicle().await;
        assert!(matches!(result, Err(ParkingError::Persistence { .. })));
    }

    #[tokio::test]
    async fn test_spot_not_occupied_cancels_saved_ticket() {
        let mut spots = free_spot(Some(1));
        spots
            .expect_set_occupied()
            .with(eq(spot_one()), eq(true))
            .times(1)
            .returning(|_, _| Ok(false));

        let mut tickets = ticket_history(0);
        tickets.expect_save().times(1).returning(|_| Ok(true));
        tickets
            .expect_cancel()
            .times(1)
            .withf(|ticket: &Ticket| ticket.registration() == "ABCDEF" && ticket.is_open())
            .returning(|_| Ok(true));

        let service = service(input(1, "ABCDEF"), spots, tickets, entry_time());
        let result = service.process_incoming_vehicle().await;
        assert!(matches!(result, Err(ParkingError::Persistence { .. })));
    }

    #[tokio::test]
    async fn test_spot_update_error_cancels_saved_ticket() {
        let mut spots = free_spot(Some(1));
        spots
            .expect_set_occupied()
            .times(1)
            .returning(|_, _| Err(ParkingError::persistence("spot table locked")));

        let mut tickets = ticket_history(0);
        tickets.expect_save().times(1).returning(|_| Ok(true));
        tickets.expect_cancel().times(1).returning(|_| Ok(true));

        let service = service(input(1, "ABCDEF"), spots, tickets, entry_time());
        let result = service.process_incoming_vehicle().await;
        assert!(matches!(
            result,
            Err(ParkingError::Persistence { ref message }) if message == "spot table locked"
        ));
    }

    #[tokio::test]
    async fn test_spot_held_by_open_ticket_is_not_handed_out() {
        let mut spots = free_spot(Some(1));
        // The only spot update is the repair of the occupied mark.
        spots
            .expect_set_occupied()
            .with(eq(spot_one()), eq(true))
            .times(1)
            .returning(|_, _| Ok(true));

        let mut tickets = MockTicketRepository::new();
        tickets
            .expect_find_open_ticket_by_registration()
            .returning(|_| Ok(None));
        tickets.expect_find_open_ticket_by_spot().returning(|_| {
            let spot = ParkingSpot::new(SpotId::from_raw(1).unwrap(), VehicleClass::Car, false);
            Ok(Some(Ticket::open("AAA111", &spot, entry_time(), false)))
        });
        tickets.expect_save().never();

        let service = service(input(1, "BBB222"), spots, tickets, entry_time());
        let result = service.process_incoming_vehicle().await;
        match result {
            Err(ParkingError::SpotConflict { spot, registration }) => {
                assert_eq!(spot, 1);
                assert_eq!(registration, "AAA111");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_exiting_vehicle_closes_ticket_then_releases_spot() {
        let mut spots = MockSpotRepository::new();
        spots
            .expect_set_occupied()
            .with(eq(spot_one()), eq(false))
            .times(1)
            .returning(|_, _| Ok(true));

        let mut tickets = MockTicketRepository::new();
        tickets
            .expect_find_open_ticket_by_registration()
            .returning(|_| Ok(Some(open_ticket(false))));
        tickets
            .expect_update()
            .times(1)
            .withf(|ticket: &Ticket| ticket.price() == Some(dec!(1.5)) && !ticket.is_open())
            .returning(|_| Ok(true));

        let exit_time = entry_time() + Duration::minutes(60);
        let service = service(input(1, "ABCDEF"), spots, tickets, exit_time);
        let outcome = service.process_exiting_vehicle().await.unwrap();

        match outcome {
            ExitOutcome::Departed { ticket, price } => {
                assert_eq!(price, dec!(1.5));
                assert_eq!(ticket.exit_time(), Some(exit_time));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_exit_discount_is_applied_once() {
        let mut spots = MockSpotRepository::new();
        spots.expect_set_occupied().returning(|_, _| Ok(true));

        let mut tickets = MockTicketRepository::new();
        tickets
            .expect_find_open_ticket_by_registration()
            .returning(|_| Ok(Some(open_ticket(true))));
        tickets.expect_update().returning(|_| Ok(true));

        let exit_time = entry_time() + Duration::minutes(60);
        let service = service(input(1, "ABCDEF"), spots, tickets, exit_time);
        let outcome = service.process_exiting_vehicle().await.unwrap();
        assert!(matches!(outcome, ExitOutcome::Departed { price, .. } if price == dec!(1.43)));
    }

    #[tokio::test]
    async fn test_failed_update_never_releases_spot() {
        let mut spots = MockSpotRepository::new();
        spots.expect_set_occupied().never();

        let mut tickets = MockTicketRepository::new();
        tickets
            .expect_find_open_ticket_by_registration()
            .returning(|_| Ok(Some(open_ticket(true))));
        tickets.expect_update().times(1).returning(|_| Ok(false));

        let exit_time = entry_time() + Duration::minutes(60);
        let service = service(input(1, "ABCDEF"), spots, tickets, exit_time);
        let outcome = service.process_exiting_vehicle().await.unwrap();
        assert_eq!(
            outcome,
            ExitOutcome::TicketNotUpdated {
                registration: "ABCDEF".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_spot_not_released_after_update_is_reported() {
        let mut spots = MockSpotRepository::new();
        spots
            .expect_set_occupied()
            .with(eq(spot_one()), eq(false))
            .times(1)
            .returning(|_, _| Ok(false));

        let mut tickets = MockTicketRepository::new();
        tickets
            .expect_find_open_ticket_by_registration()
            .returning(|_| Ok(Some(open_ticket(false))));
        tickets.expect_update().times(1).returning(|_| Ok(true));

        let exit_time = entry_time() + Duration::minutes(60);
        let service = service(input(1, "ABCDEF"), spots, tickets, exit_time);
        let result = service.process_exiting_vehicle().await;
        assert!(matches!(result, Err(ParkingError::Persistence { .. })));
    }

    #[tokio::test]
    async fn test_orphaned_spot_is_released_only_without_open_ticket() {
        let mut spots = MockSpotRepository::new();
        spots
            .expect_set_occupied()
            .with(eq(spot_one()), eq(false))
            .times(1)
            .returning(|_, _| Ok(true));

        let mut tickets = MockTicketRepository::new();
        tickets
            .expect_find_open_ticket_by_spot()
            .with(eq(spot_one()))
            .returning(|_| Ok(None));

        let service = service(input(1, "ABCDEF"), spots, tickets, entry_time());
        assert!(service.release_orphaned_spot(spot_one()).await.unwrap());
    }

    #[tokio::test]
    async fn test_held_spot_is_not_released_as_orphan() {
        let mut spots = MockSpotRepository::new();
        spots.expect_set_occupied().never();

        let mut tickets = MockTicketRepository::new();
        tickets
            .expect_find_open_ticket_by_spot()
            .returning(|_| Ok(Some(open_ticket(false))));

        let service = service(input(1, "ABCDEF"), spots, tickets, entry_time());
        assert!(!service.release_orphaned_spot(spot_one()).await.unwrap());
    }

    #[tokio::test]
    async fn test_exiting_vehicle_without_ticket() {
        let mut spots = MockSpotRepository::new();
        spots.expect_set_occupied().never();

        let mut tickets = MockTicketRepository::new();
        tickets
            .expect_find_open_ticket_by_registration()
            .returning(|_| Ok(None));
        tickets.expect_update().never();

        let service = service(input(1, "ABCDEF"), spots, tickets, entry_time());
        let outcome = service.process_exiting_vehicle().await.unwrap();
        assert_eq!(
            outcome,
            ExitOutcome::TicketNotFound {
                registration: "ABCDEF".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_clock_behind_entry_is_an_integrity_error() {
        let mut spots = MockSpotRepository::new();
        spots.expect_set_occupied().never();

        let mut tickets = MockTicketRepository::new();
        tickets
            .expect_find_open_ticket_by_registration()
            .returning(|_| Ok(Some(open_ticket(false))));
        tickets.expect_update().never();

        let exit_time = entry_time() - Duration::minutes(5);
        let service = service(input(1, "ABCDEF"), spots, tickets, exit_time);
        let result = service.process_exiting_vehicle().await;
        assert!(matches!(result, Err(ParkingError::InvalidInterval { .. })));
    }
}
