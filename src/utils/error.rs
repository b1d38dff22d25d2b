use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParkingError {
    #[error("Invalid parking interval: entry {entry}, exit {exit:?}")]
    InvalidInterval {
        entry: DateTime<Utc>,
        exit: Option<DateTime<Utc>>,
    },

    #[error("Unknown vehicle class: {value:?}")]
    UnknownVehicleClass { value: Option<String> },

    #[error("Ticket for {registration} is already closed")]
    TicketAlreadyClosed { registration: String },

    #[error("Invalid ticket price: {price}")]
    InvalidPrice { price: Decimal },

    #[error("Spot {spot} is marked free but still held by {registration}")]
    SpotConflict { spot: u32, registration: String },

    #[error("Persistence error: {message}")]
    Persistence { message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    DataIntegrity,
    Persistence,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ParkingError {
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidInterval { .. }
            | Self::UnknownVehicleClass { .. }
            | Self::TicketAlreadyClosed { .. }
            | Self::InvalidPrice { .. }
            | Self::SpotConflict { .. } => ErrorCategory::DataIntegrity,
            Self::Persistence { .. } => ErrorCategory::Persistence,
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            Self::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Persistence => ErrorSeverity::Medium,
            ErrorCategory::DataIntegrity | ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::DataIntegrity => {
                "Check the terminal clock and the stored ticket; do not retry blindly"
            }
            ErrorCategory::Persistence => "Retry the operation once the store is reachable",
            ErrorCategory::Configuration => "Fix the lot configuration file and restart",
            ErrorCategory::System => "Check the terminal and restart the service",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::InvalidInterval { .. } => {
                "The exit time of this ticket is before its entry time".to_string()
            }
            Self::UnknownVehicleClass { .. } => "Unknown vehicle type".to_string(),
            Self::TicketAlreadyClosed { registration } => {
                format!("The ticket for {} has already been paid", registration)
            }
            Self::InvalidPrice { price } => format!("The computed fare {} is not valid", price),
            Self::SpotConflict { spot, .. } => {
                format!("Spot {} is still assigned to another vehicle", spot)
            }
            Self::Persistence { .. } => "Unable to save parking information".to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ParkingError>;
