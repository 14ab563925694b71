//! # idgov
//! Identity governance core: consumes an HR feed (joiner / mover / leaver),
//! derives each identity's desired entitlement set from policy, diffs it
//! against the ledger, and issues create / group-add / group-remove /
//! disable operations against a fixed set of downstream connectors,
//! recording every decision in an append-only audit log. A second workflow
//! lets users request one-off entitlements, approved by someone other than
//! themselves.
//!
//! # Flow
//! - The HR feed posts `EmployeeCreated` for EMP001 in Engineering
//! - idgov mints the identity and opens AzureAD and Slack accounts (and
//!   GitHub, since Engineering's birthright names it)
//! - idgov adds each account to the groups policy says Engineering is owed
//! - EMP001 later requests `GitHub:SuperAdmin`; a colleague approves; idgov
//!   provisions it and appends the decision to the audit ledger
//! - EMP001 moves to Sales: Sales birthright is granted, everything only
//!   Engineering held is revoked
//! - EMP001 leaves: every downstream account is disabled and the
//!   entitlement set cleared

#![cfg_attr(not(test), forbid(missing_debug_implementations, unreachable_pub))]
#![cfg_attr(not(test), deny(unsafe_code, missing_copy_implementations))]

use std::sync::Arc;

/// Helper result methods
pub mod result_extra;

/// Environment-driven settings
pub mod config;

/// Birthright & separation-of-duties policy
pub mod policy;

/// Append-only audit ledger
pub mod audit;

/// Workforce identities
pub mod identity;

/// Access requests & their approval workflow
pub mod request;

/// Downstream system adapters
pub mod connector;

/// Joiner / mover / leaver engine
pub mod jml;

/// Warp filters
pub mod filters;

// I chose to use dyn trait objects rather than generics here for code
// footprint and code footprint alone.
/// App environment
#[derive(Debug)]
pub struct State {
  /// Settings loaded at startup
  pub settings: config::Settings,
  /// Authoritative identity ledger
  pub identities: Arc<dyn identity::Store>,
  /// Access request collection
  pub requests: Arc<dyn request::Store>,
  /// Append-only audit log
  pub audit: Arc<dyn audit::Store>,
  /// Enabled downstream adapters
  pub connectors: connector::Registry,
  /// HR event engine
  pub jml: jml::Engine,
  /// Access request workflow engine
  pub request_engine: request::Engine,
}

impl State {
  /// Wire a fresh dependency graph: one instance of each store, connector
  /// and engine, every reference handed down from here. Tests construct
  /// their own graph for isolation.
  pub fn new(settings: config::Settings) -> Self {
    let identities: Arc<dyn identity::Store> = Arc::new(identity::MemStore::new());
    let requests: Arc<dyn request::Store> = Arc::new(request::MemStore::new());
    let audit: Arc<dyn audit::Store> = Arc::new(audit::MemStore::new());
    let connectors = connector::Registry::from_settings(&settings);
    let policy = policy::Policy::new();

    let jml = jml::Engine::new(identities.clone(),
                               audit.clone(),
                               connectors.clone(),
                               policy.clone());

    let request_engine = request::Engine::new(requests.clone(),
                                              identities.clone(),
                                              audit.clone(),
                                              policy,
                                              jml.clone());

    Self { settings,
           identities,
           requests,
           audit,
           connectors,
           jml,
           request_engine }
  }
}
