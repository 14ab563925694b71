use std::{collections::{BTreeMap, BTreeSet, HashMap},
          sync::{Arc, Mutex, PoisonError}};

use serde_json::json;

use super::{HrEvent, Outcome};
use crate::{audit,
            audit::NewEvent,
            connector,
            connector::{Connector, Handle, Registry, System},
            identity,
            identity::{IdentityProfile, LifecycleState, NewIdentity, Status, Update},
            policy::{Entitlement, Policy},
            result_extra::ResultExtra};

/// Errors caught at the `process_event` boundary
#[derive(Clone, Debug)]
pub enum Error {
  /// A required joiner field was absent from the event
  MissingField(&'static str),
  Identity(identity::Error),
  /// A downstream call failed; nothing already applied is rolled back
  Connector {
    system: System,
    source: connector::Error,
  },
}

impl core::fmt::Display for Error {
  fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
    match self {
      | Error::MissingField(field) => write!(f, "missing required field {}", field),
      | Error::Identity(e) => write!(f, "{}", e),
      | Error::Connector { system, source } => write!(f, "{}: {}", system.name(), source),
    }
  }
}

impl From<identity::Error> for Error {
  fn from(e: identity::Error) -> Self {
    Error::Identity(e)
  }
}

/// JML engine result
pub type Result<T> = core::result::Result<T, self::Error>;

/// Hands out one mutex per employee id so every mutation of a single
/// identity is totally ordered, even with events arriving concurrently
#[derive(Clone, Debug, Default)]
struct IdentityLocks {
  inner: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl IdentityLocks {
  fn of(&self, employee_id: &str) -> Arc<Mutex<()>> {
    let mut table = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

    table.entry(employee_id.to_string()).or_default().clone()
  }
}

/// Drives the joiner / mover / leaver lifecycle: derives the desired
/// entitlement set from policy, diffs it against the ledger and fans the
/// difference out to the connectors.
#[derive(Clone, Debug)]
pub struct Engine {
  identities: Arc<dyn identity::Store>,
  audit: Arc<dyn audit::Store>,
  connectors: Registry,
  policy: Policy,
  locks: IdentityLocks,
}

impl Engine {
  pub fn new(identities: Arc<dyn identity::Store>,
             audit: Arc<dyn audit::Store>,
             connectors: Registry,
             policy: Policy)
             -> Self {
    Self { identities,
           audit,
           connectors,
           policy,
           locks: IdentityLocks::default() }
  }

  /// Single dispatch entry for the HR feed.
  ///
  /// Nothing escapes this boundary: internal failures come back as
  /// `Outcome::Error`, unrecognized event types as `Outcome::Ignored`.
  pub fn process_event(&self, event: &HrEvent) -> Outcome {
    log::info!("processing event {} for {}", event.event_type, event.employee_id);

    let lock = self.locks.of(&event.employee_id);
    let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

    match event.event_type.as_str() {
      | "EmployeeCreated" => self.joiner(event)
                                 .tap_err(|e| log::error!("joiner flow failed: {}", e))
                                 .unwrap_or_else(Outcome::error),
      | "EmployeeUpdated" => self.mover(event)
                                 .tap_err(|e| log::error!("mover flow failed: {}", e))
                                 .unwrap_or_else(Outcome::error),
      | "EmployeeTerminated" => self.leaver(event)
                                    .tap_err(|e| log::error!("leaver flow failed: {}", e))
                                    .unwrap_or_else(Outcome::error),
      | other => {
        log::warn!("unknown event type: {}", other);
        Outcome::Ignored { message: "Unknown event type".to_string() }
      },
    }
  }

  /// Grant a single entitlement outside the birthright flow (access request
  /// approval). The ledger insert is idempotent.
  pub fn provision_entitlement(&self, identity_id: &str, entitlement: &str) -> Result<()> {
    let identity = self.identities
                       .get(identity_id)
                       .ok_or_else(|| identity::Error::NotFound(identity_id.to_string()))?;

    let lock = self.locks.of(&identity.employee_id);
    let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

    // re-read under the lock in case a mover just rewrote the profile
    let identity = self.identities
                       .get(identity_id)
                       .ok_or_else(|| identity::Error::NotFound(identity_id.to_string()))?;

    log::info!("provisioning ad-hoc entitlement {} for {}", entitlement, identity.email);

    let mut single = BTreeSet::new();
    single.insert(entitlement.to_string());

    self.grant(&identity, &identity.accounts, &single)?;

    if !identity.entitlements.contains(entitlement) {
      let mut entitlements = identity.entitlements.clone();
      entitlements.insert(entitlement.to_string());

      self.identities.update(&identity.id,
                             Update { entitlements: Some(entitlements),
                                      ..Update::default() })?;
    }

    self.audit.record(NewEvent::new("grant_access", &identity.email)
                       .details(json!({"entitlement": entitlement, "source": "access_request"})));

    Ok(())
  }

  /// Joiner: mint the identity, open downstream accounts, fan out the
  /// birthright set. The ledger is written only after the full fan-out
  /// succeeds, so it never runs ahead of downstream state.
  fn joiner(&self, event: &HrEvent) -> Result<Outcome> {
    log::info!("starting joiner flow for {}", event.employee_id);

    let identity = self.identities.create(new_identity(event)?)?;

    self.audit.record(NewEvent::new("create_identity", &identity.email).details(payload_json(event)));

    let desired = self.policy.birthright(&identity.department);
    log::info!("birthright entitlements for {}: {:?}", identity.email, desired);

    let wants_github = desired.iter()
                              .filter_map(|raw| Entitlement::parse(raw))
                              .any(|ent| System::from_entitlement_system(&ent.system) == Some(System::GitHub));

    let mut accounts = BTreeMap::new();

    for system in [System::AzureAd, System::Slack] {
      self.open_account(&identity, system, &mut accounts)?;
    }

    if wants_github {
      self.open_account(&identity, System::GitHub, &mut accounts)?;
    }

    self.grant(&identity, &accounts, &desired)?;

    self.identities.update(&identity.id,
                           Update { accounts: Some(accounts),
                                    entitlements: Some(desired),
                                    ..Update::default() })?;

    log::info!("joiner flow completed for {}", identity.email);

    Ok(Outcome::created(&identity.id))
  }

  /// Mover: merge the payload into the profile; on a department change,
  /// grant the new birthright and revoke what the old department held
  /// exclusively. Accounts a newly required system is missing are created
  /// lazily from the stored profile.
  fn mover(&self, event: &HrEvent) -> Result<Outcome> {
    log::info!("starting mover flow for {}", event.employee_id);

    let identity = self.identities
                       .get_by_employee_id(&event.employee_id)
                       .ok_or_else(|| identity::Error::NotFound(event.employee_id.clone()))?;

    let old_department = identity.department.clone();
    let new_department = event.department.clone().unwrap_or_else(|| old_department.clone());

    let updated = self.identities.update(&identity.id, update_from(event))?;

    self.audit.record(NewEvent::new("update_identity", &identity.email).details(payload_json(event)));

    if old_department == new_department {
      return Ok(Outcome::processed("Mover processed"));
    }

    log::info!("department change detected: {} -> {}", old_department, new_department);

    let new_entitlements = self.policy.birthright(&new_department);
    let to_revoke = self.policy.revocation(&old_department, &new_department);

    let mut accounts = updated.accounts.clone();

    for raw in &new_entitlements {
      let system = match Entitlement::parse(raw).and_then(|ent| System::from_entitlement_system(&ent.system)) {
        | Some(system) => system,
        | None => continue,
      };

      if !accounts.contains_key(system.account_key()) {
        self.open_account(&updated, system, &mut accounts)?;
      }
    }

    self.grant(&updated, &accounts, &new_entitlements)?;
    self.revoke(&updated, &accounts, &to_revoke)?;

    let final_entitlements = updated.entitlements
                                    .difference(&to_revoke)
                                    .cloned()
                                    .chain(new_entitlements.iter().cloned())
                                    .collect::<BTreeSet<_>>();

    self.identities.update(&identity.id,
                           Update { entitlements: Some(final_entitlements),
                                    accounts: Some(accounts),
                                    lifecycle_state: Some(LifecycleState::Mover),
                                    ..Update::default() })?;

    Ok(Outcome::processed("Mover processed"))
  }

  /// Leaver: disable every downstream account, then terminate the identity
  /// and clear its entitlements. A missing downstream user is tolerated -
  /// the step gets a failure audit and the flow continues.
  fn leaver(&self, event: &HrEvent) -> Result<Outcome> {
    log::info!("starting leaver flow for {}", event.employee_id);

    let identity = self.identities
                       .get_by_employee_id(&event.employee_id)
                       .ok_or_else(|| identity::Error::NotFound(event.employee_id.clone()))?;

    for (key, handle) in &identity.accounts {
      let (system, conn) = match System::from_account_key(key).and_then(|s| self.connectors.get(s).map(|c| (s, c))) {
        | Some(pair) => pair,
        | None => continue,
      };

      let entry = NewEvent::new("disable_account", &identity.email).details(json!({"system": system.name()}));

      match conn.disable_user(handle) {
        | Ok(()) => {
          self.audit.record(entry);
        },
        | Err(e) => {
          log::warn!("disable on {} failed for {}: {}", system.name(), identity.email, e);
          self.audit.record(entry.failed());
        },
      }
    }

    self.identities.update(&identity.id,
                           Update { status: Some(Status::Terminated),
                                    lifecycle_state: Some(LifecycleState::Leaver),
                                    entitlements: Some(BTreeSet::new()),
                                    ..Update::default() })?;

    self.audit.record(NewEvent::new("terminate_identity", &identity.email));

    Ok(Outcome::processed("Leaver processed"))
  }

  /// Create the downstream account for `system`, if its adapter is enabled
  fn open_account(&self,
                  identity: &IdentityProfile,
                  system: System,
                  accounts: &mut BTreeMap<String, Handle>)
                  -> Result<()> {
    let conn = match self.connectors.get(system) {
      | Some(conn) => conn,
      | None => return Ok(()),
    };

    let entry = NewEvent::new("provision_account", &identity.email).details(json!({"system": system.name()}));

    let handle = conn.create_user(identity)
                     .map_err(|source| Error::Connector { system, source })
                     .tap_err(|_| {
                       self.audit.record(entry.clone().failed());
                     })?;

    self.audit.record(entry);
    accounts.insert(system.account_key().to_string(), handle);

    Ok(())
  }

  /// Fan a set of entitlements out to the connectors as group adds.
  ///
  /// Entitlements for systems with no adapter or no account are skipped;
  /// they still belong in the ledger (Salesforce, Workday).
  fn grant(&self,
           identity: &IdentityProfile,
           accounts: &BTreeMap<String, Handle>,
           entitlements: &BTreeSet<String>)
           -> Result<()> {
    for raw in entitlements {
      let (system, group, handle, conn) = match self.route(accounts, raw) {
        | Some(route) => route,
        | None => continue,
      };

      conn.add_to_group(handle, &group)
          .map_err(|source| Error::Connector { system, source })
          .tap_err(|_| {
            self.audit.record(NewEvent::new("grant_access", &identity.email)
                               .details(json!({"entitlement": raw}))
                               .failed());
          })?;
    }

    Ok(())
  }

  /// Remove entitlements downstream, one `revoke_access` audit per removal
  fn revoke(&self,
            identity: &IdentityProfile,
            accounts: &BTreeMap<String, Handle>,
            entitlements: &BTreeSet<String>)
            -> Result<()> {
    for raw in entitlements {
      let (system, group, handle, conn) = match self.route(accounts, raw) {
        | Some(route) => route,
        | None => continue,
      };

      conn.remove_from_group(handle, &group)
          .map_err(|source| Error::Connector { system, source })
          .tap_err(|_| {
            self.audit.record(NewEvent::new("revoke_access", &identity.email)
                               .details(json!({"entitlement": raw}))
                               .failed());
          })?;

      self.audit.record(NewEvent::new("revoke_access", &identity.email).details(json!({"entitlement": raw})));
    }

    Ok(())
  }

  /// Resolve an entitlement to its adapter and native handle. `None` when
  /// the system has no adapter or the identity holds no account there.
  fn route<'a>(&'a self,
               accounts: &'a BTreeMap<String, Handle>,
               raw: &str)
               -> Option<(System, String, &'a Handle, &'a Arc<dyn Connector>)> {
    let ent = Entitlement::parse(raw)?;
    let system = System::from_entitlement_system(&ent.system)?;
    let conn = self.connectors.get(system)?;
    let handle = accounts.get(system.account_key())?;

    Some((system, ent.group, handle, conn))
  }
}

fn new_identity(event: &HrEvent) -> Result<NewIdentity> {
  fn require(field: &Option<String>, name: &'static str) -> Result<String> {
    field.clone().ok_or(Error::MissingField(name))
  }

  Ok(NewIdentity { employee_id: event.employee_id.clone(),
                   first_name: require(&event.first_name, "first_name")?,
                   last_name: require(&event.last_name, "last_name")?,
                   email: require(&event.email, "email")?,
                   department: require(&event.department, "department")?,
                   job_title: require(&event.job_title, "job_title")?,
                   manager_id: None })
}

fn update_from(event: &HrEvent) -> Update {
  Update { first_name: event.first_name.clone(),
           last_name: event.last_name.clone(),
           email: event.email.clone(),
           department: event.department.clone(),
           job_title: event.job_title.clone(),
           ..Update::default() }
}

fn payload_json(event: &HrEvent) -> serde_json::Value {
  serde_json::to_value(event).unwrap_or_default()
}
