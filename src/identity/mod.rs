use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize as De, Serialize as Ser};

use crate::connector::Handle;

mod store;
pub use store::MemStore;

/// Account standing of an identity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Ser, De)]
#[serde(rename_all = "lowercase")]
pub enum Status {
  Active,
  Inactive,
  #[serde(rename = "pre-hire")]
  PreHire,
  Terminated,
}

/// Where in the joiner/mover/leaver lifecycle an identity sits
#[derive(Clone, Copy, Debug, PartialEq, Eq, Ser, De)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
  Joiner,
  Mover,
  Leaver,
  Stable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Ser, De)]
#[serde(rename_all = "lowercase")]
pub enum RiskScore {
  Low,
  Medium,
  High,
  Critical,
}

/// One workforce identity and everything the core knows about it
#[derive(Clone, Debug, PartialEq, Ser, De)]
pub struct IdentityProfile {
  pub id: String,
  /// External HR key; unique within the store
  pub employee_id: String,
  pub first_name: String,
  pub last_name: String,
  pub email: String,
  pub department: String,
  pub job_title: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub manager_id: Option<String>,
  pub status: Status,
  pub lifecycle_state: LifecycleState,
  pub risk_score: RiskScore,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  /// `System:Group` strings
  pub entitlements: BTreeSet<String>,
  /// Native downstream handles, keyed by `azure_ad` / `github` / `slack`
  pub accounts: BTreeMap<String, Handle>,
}

/// The fields required to mint a new identity
#[derive(Clone, Debug)]
pub struct NewIdentity {
  pub employee_id: String,
  pub first_name: String,
  pub last_name: String,
  pub email: String,
  pub department: String,
  pub job_title: String,
  pub manager_id: Option<String>,
}

impl From<NewIdentity> for IdentityProfile {
  fn from(new: NewIdentity) -> Self {
    let now = Utc::now();

    Self { id: nanoid::nanoid!(),
           employee_id: new.employee_id,
           first_name: new.first_name,
           last_name: new.last_name,
           email: new.email,
           department: new.department,
           job_title: new.job_title,
           manager_id: new.manager_id,
           status: Status::Active,
           lifecycle_state: LifecycleState::Joiner,
           risk_score: RiskScore::Low,
           created_at: now,
           updated_at: now,
           entitlements: BTreeSet::new(),
           accounts: BTreeMap::new() }
  }
}

/// A partial merge applied by `Store::update`. `None` fields keep their
/// current value; `employee_id` is immutable by construction.
#[derive(Clone, Debug, Default)]
pub struct Update {
  pub first_name: Option<String>,
  pub last_name: Option<String>,
  pub email: Option<String>,
  pub department: Option<String>,
  pub job_title: Option<String>,
  pub manager_id: Option<String>,
  pub status: Option<Status>,
  pub lifecycle_state: Option<LifecycleState>,
  pub risk_score: Option<RiskScore>,
  pub entitlements: Option<BTreeSet<String>>,
  pub accounts: Option<BTreeMap<String, Handle>>,
}

impl Update {
  pub(crate) fn apply(self, current: IdentityProfile) -> IdentityProfile {
    IdentityProfile { updated_at: Utc::now(),
                      first_name: self.first_name.unwrap_or(current.first_name),
                      last_name: self.last_name.unwrap_or(current.last_name),
                      email: self.email.unwrap_or(current.email),
                      department: self.department.unwrap_or(current.department),
                      job_title: self.job_title.unwrap_or(current.job_title),
                      manager_id: self.manager_id.or(current.manager_id),
                      status: self.status.unwrap_or(current.status),
                      lifecycle_state: self.lifecycle_state.unwrap_or(current.lifecycle_state),
                      risk_score: self.risk_score.unwrap_or(current.risk_score),
                      entitlements: self.entitlements.unwrap_or(current.entitlements),
                      accounts: self.accounts.unwrap_or(current.accounts),
                      id: current.id,
                      employee_id: current.employee_id,
                      created_at: current.created_at }
  }
}

/// Errors encounterable by the identity store
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
  /// employee_id already registered
  DuplicateEmployeeId(String),
  /// No identity with this id
  NotFound(String),
}

impl core::fmt::Display for Error {
  fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
    match self {
      | Error::DuplicateEmployeeId(employee_id) => {
        write!(f, "identity with employee_id {} already exists", employee_id)
      },
      | Error::NotFound(id) => write!(f, "identity {} not found", id),
    }
  }
}

/// Identity store result
pub type Result<T> = core::result::Result<T, self::Error>;

/// Authoritative identity ledger
pub trait Store: 'static + Send + Sync + std::fmt::Debug {
  /// Mint an identity; its employee_id must not be taken
  fn create(&self, new: NewIdentity) -> Result<IdentityProfile>;

  fn get(&self, id: &str) -> Option<IdentityProfile>;

  fn get_by_employee_id(&self, employee_id: &str) -> Option<IdentityProfile>;

  /// Partial merge producing a fresh record with a refreshed `updated_at`
  fn update(&self, id: &str, updates: Update) -> Result<IdentityProfile>;

  fn list(&self) -> Vec<IdentityProfile>;
}
