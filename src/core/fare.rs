use crate::domain::model::{Ticket, VehicleClass};
use crate::utils::error::{ParkingError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

pub const CAR_RATE_PER_HOUR: Decimal = dec!(1.5);
pub const BIKE_RATE_PER_HOUR: Decimal = dec!(1.0);

/// Stays up to and including this many minutes are free.
pub const GRACE_PERIOD_MINUTES: i64 = 30;
pub const SUB_HOUR_COEFFICIENT: Decimal = dec!(0.75);
pub const RETURNING_CUSTOMER_FACTOR: Decimal = dec!(0.95);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FareSchedule {
    #[serde(default = "default_car_rate")]
    pub car_rate_per_hour: Decimal,
    #[serde(default = "default_bike_rate")]
    pub bike_rate_per_hour: Decimal,
}

fn default_car_rate() -> Decimal {
    CAR_RATE_PER_HOUR
}

fn default_bike_rate() -> Decimal {
    BIKE_RATE_PER_HOUR
}

impl Default for FareSchedule {
    fn default() -> Self {
        Self {
            car_rate_per_hour: CAR_RATE_PER_HOUR,
            bike_rate_per_hour: BIKE_RATE_PER_HOUR,
        }
    }
}

impl FareSchedule {
    pub fn hourly_rate(&self, vehicle_class: VehicleClass) -> Decimal {
        match vehicle_class {
            VehicleClass::Car => self.car_rate_per_hour,
            VehicleClass::Bike => self.bike_rate_per_hour,
        }
    }
}

/// Billable hours for a stay of `minutes` whole minutes.
pub fn coefficient(minutes: i64) -> Decimal {
    if minutes <= GRACE_PERIOD_MINUTES {
        Decimal::ZERO
    } else if minutes < 60 {
        SUB_HOUR_COEFFICIENT
    } else {
        Decimal::from(minutes) / dec!(60)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FareCalculator {
    schedule: FareSchedule,
}

impl FareCalculator {
    pub fn new(schedule: FareSchedule) -> Self {
        Self { schedule }
    }

    pub fn schedule(&self) -> &FareSchedule {
        &self.schedule
    }

    /// Prices a closed ticket.
    pub fn calculate_fare(&self, ticket: &Ticket) -> Result<Decimal> {
        let exit_time = ticket.exit_time().ok_or(ParkingError::InvalidInterval {
            entry: ticket.entry_time(),
            exit: None,
        })?;
        self.fare_for_exit(ticket, exit_time)
    }

    /// Prices a ticket as if it left at `exit_time`, without touching it.
    pub fn fare_for_exit(&self, ticket: &Ticket, exit_time: DateTime<Utc>) -> Result<Decimal> {
        let entry_time = ticket.entry_time();
        if exit_time < entry_time {
            return Err(ParkingError::InvalidInterval {
                entry: entry_time,
                exit: Some(exit_time),
            });
        }

        // chrono truncates toward zero, so partial minutes are dropped.
        let minutes = (exit_time - entry_time).num_minutes();
        let mut amount = coefficient(minutes) * self.schedule.hourly_rate(ticket.vehicle_class());
        if ticket.discount() {
            amount *= RETURNING_CUSTOMER_FACTOR;
        }

        let price = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        tracing::debug!(
            registration = ticket.registration(),
            minutes,
            discount = ticket.discount(),
            %price,
            "fare computed"
        );
        Ok(price)
    }
}
