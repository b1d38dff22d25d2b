use crate::core::parking::{EntryOutcome, ExitOutcome, ParkingService};
use crate::domain::ports::{Clock, InputSource, SpotRepository, TicketRepository};
use crate::utils::error::{ErrorSeverity, ParkingError, Result};
use rust_decimal::Decimal;
use std::io::{ErrorKind, Write};

const UNSUPPORTED_OPTION: &str =
    "Unsupported option. Please enter a number corresponding to the provided menu";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    IncomingVehicle,
    ExitingVehicle,
    Shutdown,
    Unknown(u32),
}

impl MenuChoice {
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => Self::IncomingVehicle,
            2 => Self::ExitingVehicle,
            3 => Self::Shutdown,
            other => Self::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShellSummary {
    pub vehicles_parked: usize,
    pub vehicles_departed: usize,
    pub revenue: Decimal,
}

pub fn describe_entry(outcome: &EntryOutcome) -> String {
    match outcome {
        EntryOutcome::Parked { ticket, spot } => {
            let mut message = String::new();
            if ticket.discount() {
                message.push_str(
                    "Welcome back! As a returning customer you get a 5% discount.\n",
                );
            }
            message.push_str(&format!(
                "Ticket saved. Please park your vehicle in spot number: {}\nRecorded in-time for vehicle number: {} is: {}",
                spot.id,
                ticket.registration(),
                ticket.entry_time().format("%Y-%m-%d %H:%M:%S")
            ));
            message
        }
        EntryOutcome::InvalidRegistration => {
            "Invalid registration number, please try again".to_string()
        }
        EntryOutcome::NoSpotAvailable {
            vehicle_class: Some(vehicle_class),
        } => format!(
            "No {} spot is available right now, please try again later",
            vehicle_class
        ),
        EntryOutcome::NoSpotAvailable {
            vehicle_class: None,
        } => "Incorrect vehicle type selection, please try again".to_string(),
        EntryOutcome::AlreadyParked { registration } => {
            format!("Vehicle {} is already parked", registration)
        }
        EntryOutcome::TicketNotSaved { registration } => format!(
            "Unable to save the ticket for {}, the spot was not assigned",
            registration
        ),
    }
}

pub fn describe_exit(outcome: &ExitOutcome) -> String {
    match outcome {
        ExitOutcome::Departed { ticket, price } => {
            let out_time = ticket
                .exit_time()
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default();
            format!(
                "Please pay the parking fare: {:.2}\nRecorded out-time for vehicle number: {} is: {}",
                price,
                ticket.registration(),
                out_time
            )
        }
        ExitOutcome::InvalidRegistration => {
            "Invalid registration number, please try again".to_string()
        }
        ExitOutcome::TicketNotFound { registration } => {
            format!("No open ticket found for vehicle {}", registration)
        }
        ExitOutcome::TicketNotUpdated { registration } => format!(
            "Unable to update ticket information for {}. The spot stays occupied",
            registration
        ),
    }
}

fn is_end_of_input(error: &ParkingError) -> bool {
    matches!(error, ParkingError::IoError(e) if e.kind() == ErrorKind::UnexpectedEof)
}

/// Runs the operator menu until shutdown or end of input. Workflow errors are
/// shown to the operator; only system-level ones stop the loop.
pub async fn run_shell<I, S, T, C, F, W>(
    service: &ParkingService<I, S, T, C>,
    mut next_choice: F,
    out: &mut W,
) -> Result<ShellSummary>
where
    I: InputSource,
    S: SpotRepository,
    T: TicketRepository,
    C: Clock,
    F: FnMut() -> Result<u32>,
    W: Write,
{
    let mut summary = ShellSummary::default();

    loop {
        writeln!(out, "Please select an option. Simply enter the number to choose an action")?;
        writeln!(out, "1 New Vehicle Entering - Allocate Parking Space")?;
        writeln!(out, "2 Vehicle Exiting - Generate Ticket Price")?;
        writeln!(out, "3 Shutdown System")?;

        let choice = match next_choice() {
            Ok(code) => MenuChoice::from_code(code),
            Err(e) if is_end_of_input(&e) => {
                tracing::info!("Operator input closed");
                break;
            }
            Err(e) => return Err(e),
        };

        let result = match choice {
            MenuChoice::IncomingVehicle => service.process_incoming_vehicle().await.map(|outcome| {
                if matches!(outcome, EntryOutcome::Parked { .. }) {
                    summary.vehicles_parked += 1;
                }
                describe_entry(&outcome)
            }),
            MenuChoice::ExitingVehicle => service.process_exiting_vehicle().await.map(|outcome| {
                if let ExitOutcome::Departed { price, .. } = &outcome {
                    summary.vehicles_departed += 1;
                    summary.revenue += *price;
                }
                describe_exit(&outcome)
            }),
            MenuChoice::Shutdown => {
                writeln!(out, "Exiting from the system!")?;
                break;
            }
            MenuChoice::Unknown(code) => {
                tracing::debug!(code, "Unsupported menu option");
                Ok(UNSUPPORTED_OPTION.to_string())
            }
        };

        match result {
            Ok(message) => writeln!(out, "{}", message)?,
            Err(e) if is_end_of_input(&e) => {
                tracing::info!("Operator input closed");
                break;
            }
            Err(e) if e.severity() >= ErrorSeverity::Critical => return Err(e),
            Err(e) => {
                tracing::error!(
                    "Workflow failed: {} (Category: {:?}, Severity: {:?})",
                    e,
                    e.category(),
                    e.severity()
                );
                writeln!(out, "❌ {}", e.user_friendly_message())?;
                writeln!(out, "💡 {}", e.recovery_suggestion())?;
            }
        }
    }

    tracing::info!(
        parked = summary.vehicles_parked,
        departed = summary.vehicles_departed,
        revenue = %summary.revenue,
        "Shell stopped"
    );
    Ok(summary)
}
