use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::{
    broker::Publisher,
    measurement::Measurement,
    sensor::{Device, UniformSource},
};

const RULE_WIDTH: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub sent: u64,
}

/// Measures, publishes and sleeps until `shutdown` fires, then closes `publisher`.
///
/// A failed publish is logged and the next interval runs as scheduled.
/// Cancellation is checked at the top of each iteration and during the sleep;
/// an in-flight publish is never interrupted.
pub async fn run<P, R>(
    mut publisher: P,
    device: &mut Device<R>,
    interval: Duration,
    shutdown: CancellationToken,
) -> RunSummary
where
    P: Publisher,
    R: UniformSource,
{
    let mut sent: u64 = 0;

    while !shutdown.is_cancelled() {
        let measurement = device.measure();

        match publisher.publish(&measurement).await {
            Ok(()) => {
                sent += 1;
                println!("{}", progress_line(sent, &measurement));
            }
            Err(e) => log::error!("Failed to send measurement: {e:#}"),
        }

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    log::info!("Shutdown requested for device {}", device.id());
    let summary = RunSummary { sent };
    print_summary(&summary);

    if let Err(e) = publisher.close().await {
        log::warn!("{e:#}");
    } else {
        log::info!("Broker connection closed");
    }

    summary
}

pub fn print_banner<R: UniformSource>(device: &Device<R>, interval_minutes: u64) {
    let rule = "=".repeat(RULE_WIDTH);
    println!("{rule}");
    println!("Device Data Simulator Started");
    println!("{rule}");
    println!("Device ID:       {}", device.id());
    println!(
        "Base Load:       {:.2} kWh per {} min",
        device.base_load(),
        interval_minutes
    );
    println!("Interval:        {interval_minutes} minutes");
    println!("Press Ctrl+C to stop");
    println!("{rule}");
}

fn print_summary(summary: &RunSummary) {
    let rule = "=".repeat(RULE_WIDTH);
    println!();
    println!("{rule}");
    println!("Simulator stopped. Total sent: {} measurements", summary.sent);
    println!("{rule}");
}

fn progress_line(count: u64, measurement: &Measurement) -> String {
    format!(
        "✓ [{:3}] {} | Device {} | {} kWh",
        count,
        measurement.timestamp.format("%H:%M:%S"),
        measurement.device_id,
        measurement.measurement_value
    )
}
