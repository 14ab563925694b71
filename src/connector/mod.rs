use std::sync::Arc;

use serde::{Deserialize as De, Serialize as Ser};

use crate::{config::Settings, identity::IdentityProfile};

mod azure_ad;
pub use azure_ad::AzureAd;

mod github;
pub use github::GitHub;

mod slack;
pub use slack::Slack;

/// Downstream systems with a connector adapter.
///
/// Entitlements may name other systems (Salesforce, Workday); those carry no
/// adapter and are no-ops at provisioning time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum System {
  AzureAd,
  GitHub,
  Slack,
}

impl System {
  /// System half of an entitlement string, e.g. `AzureAD` in `AzureAD:Sales`
  pub fn name(self) -> &'static str {
    match self {
      | System::AzureAd => "AzureAD",
      | System::GitHub => "GitHub",
      | System::Slack => "Slack",
    }
  }

  /// Key used for this system in an identity's `accounts` map
  pub fn account_key(self) -> &'static str {
    match self {
      | System::AzureAd => "azure_ad",
      | System::GitHub => "github",
      | System::Slack => "slack",
    }
  }

  pub fn from_entitlement_system(raw: &str) -> Option<System> {
    match raw {
      | "AzureAD" => Some(System::AzureAd),
      | "GitHub" => Some(System::GitHub),
      | "Slack" => Some(System::Slack),
      | _ => None,
    }
  }

  pub fn from_account_key(raw: &str) -> Option<System> {
    match raw {
      | "azure_ad" => Some(System::AzureAd),
      | "github" => Some(System::GitHub),
      | "slack" => Some(System::Slack),
      | _ => None,
    }
  }

  /// Path segment on `GET /api/connectors/{sys}/users`
  pub fn from_path(segment: &str) -> Option<System> {
    match segment {
      | "azuread" => Some(System::AzureAd),
      | "github" => Some(System::GitHub),
      | "slack" => Some(System::Slack),
      | _ => None,
    }
  }
}

/// The native key(s) a connector needs for membership operations.
///
/// AzureAD memberships are keyed by objectId while the UPN is the handle
/// humans know, so both are stored. Slack memberships are keyed by email,
/// not the `U…` id the API mints.
#[derive(Clone, Debug, PartialEq, Eq, Ser, De)]
#[serde(untagged)]
pub enum Handle {
  AzureAd {
    upn: String,
    object_id: String,
  },
  Slack {
    id: String,
    email: String,
  },
  GitHub {
    username: String,
  },
}

/// Errors encounterable by a connector
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
  /// The user is not (or no longer) known to the connector
  UserNotFound(String),
  /// The handle was minted by a different connector
  WrongHandle {
    expected: &'static str,
  },
}

impl core::fmt::Display for Error {
  fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
    match self {
      | Error::UserNotFound(user) => write!(f, "user {} not found", user),
      | Error::WrongHandle { expected } => write!(f, "expected a {} handle", expected),
    }
  }
}

/// Connector result
pub type Result<T> = core::result::Result<T, self::Error>;

/// Uniform surface over the downstream systems
pub trait Connector: 'static + Send + Sync + std::fmt::Debug {
  /// The system this adapter drives
  fn system(&self) -> System;

  /// Create a user record, yielding its native handle.
  ///
  /// Not idempotent: a second call for the same profile mints a second,
  /// distinct handle. The engines call this at most once per
  /// (identity, system).
  fn create_user(&self, profile: &IdentityProfile) -> Result<Handle>;

  /// Add a user to a group, creating the group on first use. Idempotent.
  fn add_to_group(&self, handle: &Handle, group: &str) -> Result<()>;

  /// Remove a user from a group. Idempotent.
  fn remove_from_group(&self, handle: &Handle, group: &str) -> Result<()>;

  /// Disable or remove the account. Idempotent; a missing user is an error
  /// the caller may tolerate.
  fn disable_user(&self, handle: &Handle) -> Result<()>;

  /// Debug view of the connector's user table
  fn users(&self) -> serde_json::Value;
}

/// The connectors enabled for this process.
///
/// Built from the settings toggles, so a disabled system is simply absent
/// at fan-out time.
#[derive(Clone, Debug, Default)]
pub struct Registry {
  entries: Vec<Arc<dyn Connector>>,
}

impl Registry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Registry of simulated adapters allowed by `settings`
  pub fn from_settings(settings: &Settings) -> Self {
    let mut registry = Self::new();

    if settings.azure_ad_enabled {
      registry = registry.with(Arc::new(AzureAd::new()));
    }

    if settings.github_enabled {
      registry = registry.with(Arc::new(GitHub::new()));
    }

    if settings.slack_enabled {
      registry = registry.with(Arc::new(Slack::new()));
    }

    registry
  }

  /// Add or replace the adapter for a system
  pub fn with(mut self, connector: Arc<dyn Connector>) -> Self {
    self.entries.retain(|c| c.system() != connector.system());
    self.entries.push(connector);
    self
  }

  pub fn get(&self, system: System) -> Option<&Arc<dyn Connector>> {
    self.entries.iter().find(|c| c.system() == system)
  }

  pub fn by_path(&self, segment: &str) -> Option<&Arc<dyn Connector>> {
    System::from_path(segment).and_then(|system| self.get(system))
  }
}
