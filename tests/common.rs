// tests/common.rs
#![allow(dead_code)] // Not every test binary uses every helper

use courier::Registry;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Once;
use std::time::Duration;

static QUEUE_NAME_COUNTER: AtomicUsize = AtomicUsize::new(0);

static TRACING_INIT: Once = Once::new();

fn setup_tracing() {
  TRACING_INIT.call_once(|| {
    // Can be overridden by RUST_LOG env variable
    let default_filter = "courier=debug,warn";
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let subscriber = FmtSubscriber::builder()
      .with_max_level(tracing::Level::TRACE)
      .with_env_filter(env_filter)
      .with_target(true)
      .with_line_number(true)
      .with_test_writer()
      .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set global tracing subscriber");
  });
}

/// Isolated registry with default limits.
pub fn test_registry() -> Registry {
  setup_tracing();
  Registry::default()
}

/// Queue name that no other test in this process uses.
pub fn unique_queue_name(tag: &str) -> String {
  setup_tracing();
  let pid = std::process::id();
  let count = QUEUE_NAME_COUNTER.fetch_add(1, Ordering::Relaxed);
  format!("/courier_test_{}_{}_{}", tag, pid, count)
}

/// Polls `cond` every few milliseconds until it holds or `limit` elapses.
pub async fn wait_until<F: FnMut() -> bool>(limit: Duration, mut cond: F) -> bool {
  let deadline = tokio::time::Instant::now() + limit;
  loop {
    if cond() {
      return true;
    }
    if tokio::time::Instant::now() >= deadline {
      return false;
    }
    tokio::time::sleep(Duration::from_millis(5)).await;
  }
}
