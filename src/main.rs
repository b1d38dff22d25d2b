use anyhow::Context;
use clap::Parser;
use parking_system::app::shell::run_shell;
use parking_system::utils::error::ErrorSeverity;
use parking_system::utils::{logger, validation::Validate};
use parking_system::{
    CliConfig, ConsoleInput, FareCalculator, InMemorySpotRepository, InMemoryTicketRepository,
    ParkingService, SystemClock,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    let config = match cli.load_lot_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load lot configuration: {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    if config.json_logs() {
        logger::init_json_logger(cli.verbose, config.log_level());
    } else {
        logger::init_cli_logger(cli.verbose, config.log_level());
    }

    tracing::info!("Starting parking-system for lot '{}'", config.lot.name);
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
        tracing::debug!("Lot config: {:?}", config);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
        std::process::exit(1);
    }

    let spots = InMemorySpotRepository::with_layout(config.lot.car_spots, config.lot.bike_spots)
        .context("building the lot layout")?;
    let input = ConsoleInput::stdin();
    let menu = input.clone();
    let service = ParkingService::new(input, spots, InMemoryTicketRepository::new(), SystemClock)
        .with_fare_calculator(FareCalculator::new(config.fares));

    println!("Welcome to {}", config.lot.name);
    let mut stdout = std::io::stdout();
    match run_shell(&service, || menu.read_code(), &mut stdout).await {
        Ok(summary) => {
            tracing::info!(
                "✅ Closed with {} arrivals, {} departures, revenue {:.2}",
                summary.vehicles_parked,
                summary.vehicles_departed,
                summary.revenue
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!(
                "❌ Parking terminal stopped: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());

            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };
            std::process::exit(exit_code);
        }
    }
}
