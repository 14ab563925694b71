use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize as De, Serialize as Ser};

mod engine;
pub use engine::*;

/// Where a request sits in its workflow.
///
/// `Pending` is the only non-terminal state; every transition out of it is
/// single-shot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Ser, De)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
  Pending,
  Approved,
  Rejected,
  Failed,
}

impl core::fmt::Display for RequestStatus {
  fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
    match self {
      | RequestStatus::Pending => write!(f, "pending"),
      | RequestStatus::Approved => write!(f, "approved"),
      | RequestStatus::Rejected => write!(f, "rejected"),
      | RequestStatus::Failed => write!(f, "failed"),
    }
  }
}

/// One access request workflow instance
#[derive(Clone, Debug, PartialEq, Ser, De)]
pub struct AccessRequest {
  pub id: String,
  pub requester_id: String,
  /// Who receives the access - the requester, in this design
  pub target_identity_id: String,
  /// `System:Group`
  pub entitlement: String,
  pub justification: String,
  pub status: RequestStatus,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub approver_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub comments: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// The fields required to open a request
#[derive(Clone, Debug)]
pub struct NewRequest {
  pub requester_id: String,
  pub target_identity_id: String,
  pub entitlement: String,
  pub justification: String,
}

/// The terminal transition applied by `Store::update`
#[derive(Clone, Debug)]
pub struct Resolution {
  pub status: RequestStatus,
  pub approver_id: Option<String>,
  pub comments: Option<String>,
}

/// Append-mostly request collection; only `status`/`approver_id`/`comments`
/// ever change after creation
pub trait Store: 'static + Send + Sync + std::fmt::Debug {
  fn create(&self, new: NewRequest) -> AccessRequest;

  fn get(&self, id: &str) -> Option<AccessRequest>;

  /// Newest first, optionally filtered by status
  fn list(&self, status: Option<RequestStatus>) -> Vec<AccessRequest>;

  fn update(&self, id: &str, resolution: Resolution) -> Option<AccessRequest>;
}

/// In-memory implementor of the request Store.
///
/// Note that this is not persisted across instances of the application
#[derive(Clone, Debug, Default)]
pub struct MemStore {
  requests: Arc<Mutex<Vec<AccessRequest>>>,
}

impl MemStore {
  pub fn new() -> Self {
    Self::default()
  }

  fn open(&self) -> MutexGuard<'_, Vec<AccessRequest>> {
    self.requests.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl Store for MemStore {
  fn create(&self, new: NewRequest) -> AccessRequest {
    let now = Utc::now();

    let request = AccessRequest { id: nanoid::nanoid!(),
                                  requester_id: new.requester_id,
                                  target_identity_id: new.target_identity_id,
                                  entitlement: new.entitlement,
                                  justification: new.justification,
                                  status: RequestStatus::Pending,
                                  approver_id: None,
                                  comments: None,
                                  created_at: now,
                                  updated_at: now };

    self.open().push(request.clone());

    request
  }

  fn get(&self, id: &str) -> Option<AccessRequest> {
    self.open().iter().find(|r| r.id == id).cloned()
  }

  fn list(&self, status: Option<RequestStatus>) -> Vec<AccessRequest> {
    self.open()
        .iter()
        .rev()
        .filter(|r| status.map(|s| r.status == s).unwrap_or(true))
        .cloned()
        .collect()
  }

  fn update(&self, id: &str, resolution: Resolution) -> Option<AccessRequest> {
    let mut requests = self.open();
    let request = requests.iter_mut().find(|r| r.id == id)?;

    request.status = resolution.status;
    request.approver_id = resolution.approver_id.or(request.approver_id.take());
    request.comments = resolution.comments.or(request.comments.take());
    request.updated_at = Utc::now();

    Some(request.clone())
  }
}
