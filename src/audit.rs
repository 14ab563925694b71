use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize as De, Serialize as Ser};
use serde_json::Value;

/// Default cap applied by `Store::recent`
pub const DEFAULT_LIMIT: usize = 100;

/// Outcome recorded on an audit event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Ser, De)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
  Success,
  Failure,
}

impl core::fmt::Display for EventStatus {
  fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
    match self {
      | EventStatus::Success => write!(f, "success"),
      | EventStatus::Failure => write!(f, "failure"),
    }
  }
}

/// One entry in the audit ledger. Never mutated after append.
#[derive(Clone, Debug, Ser, De)]
pub struct Event {
  pub id: String,
  pub timestamp: DateTime<Utc>,
  /// Who performed the action (`system` unless a human actor is known)
  pub actor: String,
  /// e.g. `create_identity`, `grant_access`
  pub action: String,
  /// Identity email or id the action applied to
  pub target: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub details: Option<Value>,
  pub status: EventStatus,
}

/// An event about to be appended.
///
/// Id and timestamp are assigned by the store at append time, so the ledger's
/// append order is the authoritative total order even when timestamps collide.
#[derive(Clone, Debug)]
pub struct NewEvent {
  action: String,
  target: String,
  actor: String,
  details: Option<Value>,
  status: EventStatus,
}

impl NewEvent {
  pub fn new(action: impl ToString, target: impl ToString) -> Self {
    Self { action: action.to_string(),
           target: target.to_string(),
           actor: "system".to_string(),
           details: None,
           status: EventStatus::Success }
  }

  /// Attribute the event to a human actor instead of `system`
  pub fn actor(mut self, actor: impl ToString) -> Self {
    self.actor = actor.to_string();
    self
  }

  /// Attach a free-form detail payload
  pub fn details(mut self, details: Value) -> Self {
    self.details = Some(details);
    self
  }

  /// Mark the step as failed
  pub fn failed(mut self) -> Self {
    self.status = EventStatus::Failure;
    self
  }
}

/// Append-only audit ledger
pub trait Store: 'static + Send + Sync + std::fmt::Debug {
  /// Append an event, yielding it with id and timestamp assigned
  fn record(&self, event: NewEvent) -> Event;

  /// Events newest-first, at most `limit` of them
  fn recent(&self, limit: usize) -> Vec<Event>;

  /// Every event whose target matches, oldest-first
  fn for_target(&self, target: &str) -> Vec<Event>;
}

/// In-memory implementor of the audit Store.
///
/// Note that this is not persisted across instances of the application
#[derive(Clone, Debug, Default)]
pub struct MemStore {
  events: Arc<Mutex<Vec<Event>>>,
}

impl MemStore {
  pub fn new() -> Self {
    Self::default()
  }

  fn open(&self) -> MutexGuard<'_, Vec<Event>> {
    self.events.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl Store for MemStore {
  fn record(&self, event: NewEvent) -> Event {
    let NewEvent { action, target, actor, details, status } = event;

    let event = Event { id: nanoid::nanoid!(),
                        timestamp: Utc::now(),
                        actor,
                        action,
                        target,
                        details,
                        status };

    log::info!("[audit] {} on {} by {}: {}",
               event.action,
               event.target,
               event.actor,
               event.status);

    self.open().push(event.clone());

    event
  }

  fn recent(&self, limit: usize) -> Vec<Event> {
    self.open().iter().rev().take(limit).cloned().collect()
  }

  fn for_target(&self, target: &str) -> Vec<Event> {
    self.open()
        .iter()
        .filter(|ev| ev.target == target)
        .cloned()
        .collect()
  }
}
