// tests/actor_lifecycle.rs

use courier::{handler_fn, Actor, ActorOptions, ActorState, CourierError, MailboxDef, Registry};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serial_test::serial;
use tokio::time::timeout;

mod common;

#[derive(Default)]
struct Counter {
  seen: Vec<u32>,
  handled: Arc<AtomicUsize>,
}

fn counting(name: &str) -> MailboxDef<Counter> {
  MailboxDef::new::<u32, _>(
    name,
    handler_fn(|ctx: &mut Counter, n: u32| {
      ctx.seen.push(n);
      ctx.handled.fetch_add(1, Ordering::SeqCst);
    }),
  )
}

#[tokio::test]
async fn failed_init_leaves_no_mailbox_linked() {
  let registry = common::test_registry();
  let a = common::unique_queue_name("atomic_a");
  let b = common::unique_queue_name("atomic_b");
  let c = common::unique_queue_name("atomic_c");

  let defs = vec![
    counting(&a),
    // Exceeds the default message size limit, so opening it fails.
    MailboxDef::raw(&b, 100_000, handler_fn(|_: &mut Counter, _: Bytes| {})),
    counting(&c),
  ];
  let err = Actor::init_with(&registry, ActorOptions::default(), "atomic", defs, Counter::default()).unwrap_err();

  assert!(matches!(err, CourierError::ResourceLimitReached(_)));
  assert!(!err.is_invalid_input());
  assert!(!registry.contains(&a));
  assert!(!registry.contains(&b));
  assert!(!registry.contains(&c));
  assert!(registry.is_empty());

  // The rolled-back name is free to be opened again.
  let reader = registry.open_reader(&a, 4, 10).unwrap();
  assert_eq!(reader.message_size(), 4);
}

#[tokio::test]
async fn empty_mailbox_set_is_invalid_input() {
  let registry = common::test_registry();
  let err = Actor::<Counter>::init_with(&registry, ActorOptions::default(), "idle", vec![], Counter::default())
    .unwrap_err();
  assert!(err.is_invalid_input());
}

#[test]
fn init_without_runtime_is_a_spawn_failure() {
  let registry = common::test_registry();
  let name = common::unique_queue_name("no_runtime");
  let err = Actor::init_with(
    &registry,
    ActorOptions::default(),
    "no-runtime",
    vec![counting(&name)],
    Counter::default(),
  )
  .unwrap_err();

  assert!(matches!(err, CourierError::SpawnFailed(_)));
  assert!(!registry.contains(&name));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn messages_sent_right_after_init_are_all_handled() {
  let registry = common::test_registry();
  let name = common::unique_queue_name("burst");
  let counter = Counter::default();
  let handled = counter.handled.clone();

  let actor = Actor::init_with(
    &registry,
    ActorOptions::default(),
    "burst",
    vec![counting(&name)],
    counter,
  )
  .unwrap();
  assert_eq!(actor.state(), ActorState::Running);

  for i in 0..50u32 {
    registry.send_record_to(&name, &i).await.unwrap();
  }
  assert!(
    common::wait_until(Duration::from_secs(2), || handled.load(Ordering::SeqCst) == 50).await,
    "only {} of 50 messages handled",
    handled.load(Ordering::SeqCst)
  );

  let ctx = actor.close().await.expect("context returned on close");
  assert_eq!(ctx.seen, (0..50).collect::<Vec<_>>());
}

#[tokio::test]
async fn close_returns_context_and_unlinks_mailboxes() {
  let registry = common::test_registry();
  let x = common::unique_queue_name("close_x");
  let y = common::unique_queue_name("close_y");

  let counter = Counter::default();
  let handled = counter.handled.clone();
  let actor = Actor::init_with(
    &registry,
    ActorOptions::default(),
    "closer",
    vec![counting(&x), counting(&y)],
    counter,
  )
  .unwrap();
  assert_eq!(actor.name(), "closer");
  assert_eq!(actor.mailbox_names(), vec![x.as_str(), y.as_str()]);
  let mut states = actor.state_changes();

  registry.send_record_to(&y, &9u32).await.unwrap();
  assert!(common::wait_until(Duration::from_secs(1), || handled.load(Ordering::SeqCst) == 1).await);
  assert!(registry.contains(&x) && registry.contains(&y));

  let ctx = timeout(Duration::from_secs(2), actor.close())
    .await
    .expect("close finishes before the timeout")
    .expect("context returned");
  assert_eq!(ctx.seen, vec![9]);
  assert_eq!(*states.borrow_and_update(), ActorState::Closed);
  assert!(!registry.contains(&x));
  assert!(!registry.contains(&y));
}

#[tokio::test]
async fn colliding_mailbox_fails_first_actor_without_touching_second() {
  let registry = common::test_registry();
  let shared = common::unique_queue_name("collide");

  let first = Actor::init_with(
    &registry,
    ActorOptions::default(),
    "first",
    vec![counting(&shared)],
    Counter::default(),
  )
  .unwrap();
  let mut first_state = first.state_changes();

  let second_ctx = Counter::default();
  let second_handled = second_ctx.handled.clone();
  let second = Actor::init_with(
    &registry,
    ActorOptions::default(),
    "second",
    vec![counting(&shared)],
    second_ctx,
  )
  .unwrap();

  // Reopening the name destroyed the first actor's queue instance.
  timeout(Duration::from_secs(2), first_state.wait_for(|s| *s == ActorState::Failed))
    .await
    .expect("first actor fails")
    .unwrap();
  assert_eq!(first.state(), ActorState::Failed);
  assert_eq!(second.state(), ActorState::Running);

  // Closing the failed actor must not unlink the queue the second actor now owns.
  assert!(first.close().await.is_some());
  assert!(registry.contains(&shared));

  registry.send_record_to(&shared, &1u32).await.unwrap();
  assert!(common::wait_until(Duration::from_secs(1), || second_handled.load(Ordering::SeqCst) == 1).await);
  assert_eq!(second.close().await.unwrap().seen, vec![1]);
  assert!(!registry.contains(&shared));
}

struct Stall;

#[async_trait]
impl courier::RawHandler<Counter> for Stall {
  async fn handle(&self, ctx: &mut Counter, _payload: Bytes) {
    ctx.handled.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(30)).await;
  }
}

#[tokio::test]
async fn stuck_worker_is_aborted_after_close_timeout() {
  let registry = common::test_registry();
  let name = common::unique_queue_name("stall");
  let counter = Counter::default();
  let handled = counter.handled.clone();

  let actor = Actor::init_with(
    &registry,
    ActorOptions::default().with_close_timeout(Duration::from_millis(100)),
    "staller",
    vec![MailboxDef::raw(&name, 1, Stall)],
    counter,
  )
  .unwrap();
  let states = actor.state_changes();

  registry.send_to(&name, &[1]).await.unwrap();
  assert!(common::wait_until(Duration::from_secs(1), || handled.load(Ordering::SeqCst) == 1).await);

  let closed = timeout(Duration::from_secs(2), actor.close())
    .await
    .expect("close gives up on the worker after its timeout");
  assert!(closed.is_none(), "an aborted worker cannot hand back its context");
  assert_eq!(*states.borrow(), ActorState::Closed);
  assert!(!registry.contains(&name));
}

#[tokio::test]
async fn abandoned_close_still_unlinks_mailboxes() {
  let registry = common::test_registry();
  let name = common::unique_queue_name("abandoned_close");
  let counter = Counter::default();
  let handled = counter.handled.clone();

  let actor = Actor::init_with(
    &registry,
    ActorOptions::default(),
    "abandoned",
    vec![MailboxDef::raw(&name, 1, Stall)],
    counter,
  )
  .unwrap();
  let states = actor.state_changes();

  registry.send_to(&name, &[1]).await.unwrap();
  assert!(common::wait_until(Duration::from_secs(1), || handled.load(Ordering::SeqCst) == 1).await);

  // The stalled handler outlives the default close timeout, so this gives up first.
  assert!(timeout(Duration::from_millis(50), actor.close()).await.is_err());

  assert!(!registry.contains(&name));
  assert_eq!(*states.borrow(), ActorState::Closed);
  // The name no longer counts as taken.
  assert!(registry.open_reader(&name, 1, 10).is_ok());
}

#[tokio::test]
async fn dropping_an_actor_stops_it() {
  let registry = common::test_registry();
  let name = common::unique_queue_name("dropped");
  let actor = Actor::init_with(
    &registry,
    ActorOptions::default(),
    "dropped",
    vec![counting(&name)],
    Counter::default(),
  )
  .unwrap();

  drop(actor);
  assert!(!registry.contains(&name));
  // A fresh actor can claim the name straight away.
  let again = Actor::init_with(
    &registry,
    ActorOptions::default(),
    "again",
    vec![counting(&name)],
    Counter::default(),
  )
  .unwrap();
  assert!(again.close().await.is_some());
}

#[tokio::test]
#[serial]
async fn init_uses_global_registry() {
  let name = common::unique_queue_name("global_actor");
  let counter = Counter::default();
  let handled = counter.handled.clone();
  let actor = Actor::init("global", vec![counting(&name)], counter).unwrap();
  assert!(Registry::global().contains(&name));

  courier::send_record_to(&name, &3u32).await.unwrap();
  assert!(common::wait_until(Duration::from_secs(1), || handled.load(Ordering::SeqCst) == 1).await);

  assert_eq!(actor.close().await.unwrap().seen, vec![3]);
  assert!(!Registry::global().contains(&name));
}
