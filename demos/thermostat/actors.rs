// demos/thermostat/actors.rs

//! Three actors wired through named queues:
//!
//! * Sensor turns each tick into a temperature reading in [18.0, 25.0).
//! * Supervisor decides when the heater should switch.
//! * Heater owns the heater flag and reports every command it applies back to
//!   the Supervisor, which keeps at most one command in flight.

use courier::{Actor, ActorOptions, CourierError, Handler, MailboxDef, Record, Registry};

use std::time::Duration;

use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::oneshot;

pub const SENSOR_TICK: &str = "/sensor_tick";
pub const SUPERVISOR_TEMP: &str = "/supervisor_temp";
pub const SUPERVISOR_HEATER_STATE: &str = "/supervisor_heater_state";
pub const HEATER_CMD: &str = "/heater_cmd";

/// The heater is switched on below this temperature.
pub const HEAT_ON_BELOW: f32 = 19.0;
/// The heater is switched off above this temperature.
pub const HEAT_OFF_ABOVE: f32 = 22.0;

// --- Records ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick(pub i32);

impl Record for Tick {
  const SIZE: usize = 4;

  fn encode(&self, buf: &mut BytesMut) {
    self.0.encode(buf);
  }

  fn decode(buf: &[u8]) -> Result<Self, CourierError> {
    i32::decode(buf).map(Tick)
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempReading(pub f32);

impl Record for TempReading {
  const SIZE: usize = 4;

  fn encode(&self, buf: &mut BytesMut) {
    self.0.encode(buf);
  }

  fn decode(buf: &[u8]) -> Result<Self, CourierError> {
    f32::decode(buf).map(TempReading)
  }
}

fn encode_flag(on: bool, buf: &mut BytesMut) {
  buf.put_u8(on as u8);
}

fn decode_flag(buf: &[u8]) -> Result<bool, CourierError> {
  match buf {
    [0] => Ok(false),
    [1] => Ok(true),
    _ => Err(CourierError::InvalidMessage(format!("invalid heater flag {:?}", buf))),
  }
}

/// Supervisor -> Heater.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaterCommand {
  pub on: bool,
}

impl Record for HeaterCommand {
  const SIZE: usize = 1;

  fn encode(&self, buf: &mut BytesMut) {
    encode_flag(self.on, buf);
  }

  fn decode(buf: &[u8]) -> Result<Self, CourierError> {
    decode_flag(buf).map(|on| HeaterCommand { on })
  }
}

/// Heater -> Supervisor, sent after every applied command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaterStatus {
  pub on: bool,
}

impl Record for HeaterStatus {
  const SIZE: usize = 1;

  fn encode(&self, buf: &mut BytesMut) {
    encode_flag(self.on, buf);
  }

  fn decode(buf: &[u8]) -> Result<Self, CourierError> {
    decode_flag(buf).map(|on| HeaterStatus { on })
  }
}

// --- Sensor ---

pub struct Sensor {
  registry: Registry,
  rng: StdRng,
  pub readings: Vec<f32>,
}

impl Sensor {
  fn sample(&mut self) -> f32 {
    18.0 + self.rng.random_range(0..70) as f32 / 10.0
  }
}

struct OnTick;

#[async_trait]
impl Handler<Sensor, Tick> for OnTick {
  async fn handle(&self, sensor: &mut Sensor, tick: Tick) {
    let temp = sensor.sample();
    sensor.readings.push(temp);
    tracing::debug!(tick = tick.0, temp, "Sensor reading");
    if let Err(e) = sensor.registry.send_record_to(SUPERVISOR_TEMP, &TempReading(temp)).await {
      tracing::warn!(error = %e, "Failed to publish reading");
    }
  }
}

// --- Supervisor ---

/// One reading as the Supervisor saw it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
  pub temp: f32,
  /// Heater state last reported by the Heater.
  pub heater_on: bool,
  /// Whether a command was still awaiting its status report.
  pub awaiting_status: bool,
  pub command: Option<bool>,
}

pub struct Supervisor {
  registry: Registry,
  heater_on: bool,
  in_flight: Option<bool>,
  expected_readings: usize,
  done: Option<oneshot::Sender<()>>,
  pub observations: Vec<Observation>,
}

impl Supervisor {
  /// The command a reading calls for, given the last reported heater state.
  pub fn decide(temp: f32, heater_on: bool) -> Option<bool> {
    if temp < HEAT_ON_BELOW && !heater_on {
      Some(true)
    } else if temp > HEAT_OFF_ABOVE && heater_on {
      Some(false)
    } else {
      None
    }
  }

  pub fn heater_on(&self) -> bool {
    self.heater_on
  }

  fn settle(&mut self) {
    if self.in_flight.is_none() && self.observations.len() >= self.expected_readings {
      if let Some(done) = self.done.take() {
        let _ = done.send(());
      }
    }
  }
}

struct OnReading;

#[async_trait]
impl Handler<Supervisor, TempReading> for OnReading {
  async fn handle(&self, sup: &mut Supervisor, reading: TempReading) {
    let awaiting_status = sup.in_flight.is_some();
    let command = if awaiting_status {
      None
    } else {
      Supervisor::decide(reading.0, sup.heater_on)
    };
    sup.observations.push(Observation {
      temp: reading.0,
      heater_on: sup.heater_on,
      awaiting_status,
      command,
    });

    if let Some(on) = command {
      tracing::info!(temp = reading.0, on, "Switching heater");
      match sup.registry.send_record_to(HEATER_CMD, &HeaterCommand { on }).await {
        Ok(()) => sup.in_flight = Some(on),
        Err(e) => tracing::warn!(error = %e, "Failed to command heater"),
      }
    }
    sup.settle();
  }
}

struct OnHeaterStatus;

#[async_trait]
impl Handler<Supervisor, HeaterStatus> for OnHeaterStatus {
  async fn handle(&self, sup: &mut Supervisor, status: HeaterStatus) {
    if sup.in_flight != Some(status.on) {
      tracing::warn!(reported = status.on, expected = ?sup.in_flight, "Unexpected heater status");
    }
    sup.heater_on = status.on;
    sup.in_flight = None;
    sup.settle();
  }
}

// --- Heater ---

pub struct Heater {
  registry: Registry,
  on: bool,
  /// Every state change, in order.
  pub transitions: Vec<bool>,
}

impl Heater {
  pub fn is_on(&self) -> bool {
    self.on
  }
}

struct OnCommand;

#[async_trait]
impl Handler<Heater, HeaterCommand> for OnCommand {
  async fn handle(&self, heater: &mut Heater, cmd: HeaterCommand) {
    if heater.on != cmd.on {
      heater.on = cmd.on;
      heater.transitions.push(cmd.on);
      tracing::info!(on = cmd.on, "Heater switched");
    }
    let status = HeaterStatus { on: heater.on };
    if let Err(e) = heater.registry.send_record_to(SUPERVISOR_HEATER_STATE, &status).await {
      tracing::warn!(error = %e, "Failed to report heater status");
    }
  }
}

// --- Wiring ---

/// Final contexts of the three actors.
pub struct Report {
  pub sensor: Sensor,
  pub supervisor: Supervisor,
  pub heater: Heater,
}

pub struct Thermostat {
  registry: Registry,
  heater: Actor<Heater>,
  supervisor: Actor<Supervisor>,
  sensor: Actor<Sensor>,
  done: oneshot::Receiver<()>,
}

impl Thermostat {
  /// Starts Heater, Supervisor and Sensor on `registry`. The run is complete
  /// once the Supervisor has handled `ticks` readings and has no command in flight.
  pub fn start(registry: &Registry, seed: u64, ticks: usize) -> Result<Self, CourierError> {
    let options = ActorOptions::default().with_close_timeout(Duration::from_secs(1));
    let (done_tx, done) = oneshot::channel();

    let heater = Actor::init_with(
      registry,
      options.clone(),
      "heater",
      vec![MailboxDef::new::<HeaterCommand, _>(HEATER_CMD, OnCommand)],
      Heater {
        registry: registry.clone(),
        on: false,
        transitions: Vec::new(),
      },
    )?;

    let supervisor = Actor::init_with(
      registry,
      options.clone(),
      "supervisor",
      vec![
        MailboxDef::new::<TempReading, _>(SUPERVISOR_TEMP, OnReading),
        MailboxDef::new::<HeaterStatus, _>(SUPERVISOR_HEATER_STATE, OnHeaterStatus),
      ],
      Supervisor {
        registry: registry.clone(),
        heater_on: false,
        in_flight: None,
        expected_readings: ticks,
        done: Some(done_tx),
        observations: Vec::new(),
      },
    )?;

    let sensor = Actor::init_with(
      registry,
      options,
      "sensor",
      vec![MailboxDef::new::<Tick, _>(SENSOR_TICK, OnTick)],
      Sensor {
        registry: registry.clone(),
        rng: StdRng::seed_from_u64(seed),
        readings: Vec::new(),
      },
    )?;

    Ok(Self {
      registry: registry.clone(),
      heater,
      supervisor,
      sensor,
      done,
    })
  }

  /// Sends ticks `0..ticks` to the Sensor.
  pub async fn drive(&self, ticks: usize) -> Result<(), CourierError> {
    for tick in 0..ticks {
      self.registry.send_record_to(SENSOR_TICK, &Tick(tick as i32)).await?;
    }
    Ok(())
  }

  /// Waits for the run to complete, then closes all three actors.
  pub async fn finish(self, timeout: Duration) -> anyhow::Result<Report> {
    let settled = tokio::time::timeout(timeout, self.done).await;

    let sensor = self.sensor.close().await;
    let supervisor = self.supervisor.close().await;
    let heater = self.heater.close().await;

    match settled {
      Ok(Ok(())) => {}
      Ok(Err(_)) => anyhow::bail!("supervisor stopped before the run completed"),
      Err(_) => anyhow::bail!("thermostat did not settle within {:?}", timeout),
    }

    Ok(Report {
      sensor: sensor.ok_or_else(|| anyhow::anyhow!("sensor context lost"))?,
      supervisor: supervisor.ok_or_else(|| anyhow::anyhow!("supervisor context lost"))?,
      heater: heater.ok_or_else(|| anyhow::anyhow!("heater context lost"))?,
    })
  }
}
