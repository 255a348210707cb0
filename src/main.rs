use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use broker::AmqpPublisher;
use clap::{Parser, error::ErrorKind};
use config::BrokerConfig;
use log::LevelFilter;
use sensor::Device;
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};
use tokio_util::sync::CancellationToken;

mod broker;
mod config;
mod measurement;
mod sensor;
mod simulator;

const EXAMPLES: &str = "\
Examples:
  device-data-simulator 1          # Device 1, 10-minute intervals
  device-data-simulator 1 1        # Device 1, 1-minute intervals (testing)
  device-data-simulator 2 10       # Device 2, 10-minute intervals";

/// Publishes simulated smart meter readings to RabbitMQ.
#[derive(Debug, Parser)]
#[command(version, after_help = EXAMPLES)]
struct Cli {
    /// Identifier stamped on every measurement
    device_id: u32,

    /// Minutes between measurements
    #[arg(default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    interval_minutes: u64,
}

#[tokio::main]
async fn main() -> Result<ExitCode, anyhow::Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            print!("{}", e.render());
            return Ok(ExitCode::SUCCESS);
        }
        Err(e) => {
            print!("{}", e.render());
            println!("\n{EXAMPLES}");
            return Ok(ExitCode::FAILURE);
        }
    };

    TermLogger::init(
        LevelFilter::Info,
        ConfigBuilder::new()
            .set_time_format_rfc3339()
            .set_time_offset_to_local()
            .map_err(|_| anyhow::anyhow!("Failed to set time offset to local"))?
            .build(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .context("Failed to initialize logger")?;

    let config = BrokerConfig::from_env().context("Failed to load broker configuration")?;

    let publisher = match AmqpPublisher::connect(&config).await {
        Ok(publisher) => publisher,
        Err(e) => {
            log::error!("{e:#}");
            return Ok(ExitCode::FAILURE);
        }
    };
    println!("✓ Connected to RabbitMQ at {}:{}", config.host, config.port);

    let mut device = Device::new(cli.device_id);
    simulator::print_banner(&device, cli.interval_minutes);

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(shutdown.clone()));

    let interval = Duration::from_secs(cli.interval_minutes.saturating_mul(60));
    simulator::run(publisher, &mut device, interval, shutdown).await;

    Ok(ExitCode::SUCCESS)
}

async fn cancel_on_ctrl_c(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to wait for Ctrl+C signal: {e}");
    } else {
        log::info!("Ctrl+C received");
    }
    shutdown.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_interval() {
        let cli = Cli::try_parse_from(["device-data-simulator", "3"]).unwrap();
        assert_eq!(cli.device_id, 3);
        assert_eq!(cli.interval_minutes, 10);
    }

    #[test]
    fn test_cli_accepts_one_minute() {
        let cli = Cli::try_parse_from(["device-data-simulator", "1", "1"]).unwrap();
        assert_eq!(cli.interval_minutes, 1);
    }

    #[test]
    fn test_cli_requires_device_id() {
        let err = Cli::try_parse_from(["device-data-simulator"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_cli_rejects_zero_interval() {
        let err = Cli::try_parse_from(["device-data-simulator", "1", "0"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_rejects_non_numeric() {
        assert!(Cli::try_parse_from(["device-data-simulator", "one"]).is_err());
        assert!(Cli::try_parse_from(["device-data-simulator", "1", "-5"]).is_err());
    }
}
