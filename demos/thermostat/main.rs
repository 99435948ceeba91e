// demos/thermostat/main.rs

//! Runs the Sensor / Supervisor / Heater thermostat for 20 ticks.
//!
//! `RUST_LOG=courier=debug,thermostat=info cargo run --example thermostat`

#[allow(dead_code)]
mod actors;

use actors::Thermostat;
use courier::Registry;

use std::time::Duration;

use tracing_subscriber::EnvFilter;

const TICKS: usize = 20;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_target(true)
    .init();

  let seed = std::env::args()
    .nth(1)
    .map(|s| s.parse::<u64>())
    .transpose()?
    .unwrap_or_else(rand::random);
  tracing::info!(seed, ticks = TICKS, "Starting thermostat");

  let thermostat = Thermostat::start(Registry::global(), seed, TICKS)?;
  thermostat.drive(TICKS).await?;
  let report = thermostat.finish(Duration::from_secs(5)).await?;

  for obs in &report.supervisor.observations {
    println!(
      "temp {:>4.1}  heater {:<3}  {}",
      obs.temp,
      if obs.heater_on { "on" } else { "off" },
      match (obs.awaiting_status, obs.command) {
        (true, _) => "waiting for heater",
        (false, Some(true)) => "-> heater on",
        (false, Some(false)) => "-> heater off",
        (false, None) => "",
      }
    );
  }
  println!(
    "heater is {} after {} transitions",
    if report.heater.is_on() { "on" } else { "off" },
    report.heater.transitions.len()
  );
  Ok(())
}
