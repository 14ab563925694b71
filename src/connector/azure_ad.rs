use std::{collections::HashMap,
          sync::{Arc, Mutex, MutexGuard, PoisonError}};

use serde::Serialize as Ser;

use super::{Connector, Error, Handle, Result, System};
use crate::identity::IdentityProfile;

#[derive(Clone, Debug, Ser)]
#[serde(rename_all = "camelCase")]
struct User {
  object_id: String,
  user_principal_name: String,
  display_name: String,
  department: String,
  job_title: String,
  account_enabled: bool,
}

#[derive(Debug, Default)]
struct Data {
  /// objectId -> user
  users: HashMap<String, User>,
  /// group name -> member objectIds
  groups: HashMap<String, Vec<String>>,
}

/// Simulated AzureAD tenant.
///
/// Users and group memberships are keyed by objectId; the UPN is only the
/// human-readable login, which is why `create_user` hands back both.
#[derive(Clone, Debug)]
pub struct AzureAd {
  data: Arc<Mutex<Data>>,
}

impl AzureAd {
  pub fn new() -> Self {
    let groups = ["Engineering", "Sales", "Marketing", "HR", "Finance-Admin"].iter()
                                                                             .map(|g| (g.to_string(), Vec::new()))
                                                                             .collect();

    Self { data: Arc::new(Mutex::new(Data { users: HashMap::new(),
                                            groups })) }
  }

  fn open(&self) -> MutexGuard<'_, Data> {
    self.data.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn object_id(handle: &Handle) -> Result<&str> {
    match handle {
      | Handle::AzureAd { object_id, .. } => Ok(object_id),
      | _ => Err(Error::WrongHandle { expected: "AzureAD" }),
    }
  }
}

impl Default for AzureAd {
  fn default() -> Self {
    Self::new()
  }
}

impl Connector for AzureAd {
  fn system(&self) -> System {
    System::AzureAd
  }

  fn create_user(&self, profile: &IdentityProfile) -> Result<Handle> {
    let upn = format!("{}.{}@example.com",
                      profile.first_name.to_lowercase(),
                      profile.last_name.to_lowercase());
    let object_id = nanoid::nanoid!();

    let user = User { object_id: object_id.clone(),
                      user_principal_name: upn.clone(),
                      display_name: format!("{} {}", profile.first_name, profile.last_name),
                      department: profile.department.clone(),
                      job_title: profile.job_title.clone(),
                      account_enabled: true };

    self.open().users.insert(object_id.clone(), user);

    log::info!("[AzureAD] created user {} ({})", upn, object_id);

    Ok(Handle::AzureAd { upn, object_id })
  }

  fn add_to_group(&self, handle: &Handle, group: &str) -> Result<()> {
    let object_id = Self::object_id(handle)?;
    let mut data = self.open();
    let members = data.groups.entry(group.to_string()).or_insert_with(Vec::new);

    if !members.iter().any(|m| m == object_id) {
      members.push(object_id.to_string());
      log::info!("[AzureAD] added {} to group {}", object_id, group);
    }

    Ok(())
  }

  fn remove_from_group(&self, handle: &Handle, group: &str) -> Result<()> {
    let object_id = Self::object_id(handle)?;

    if let Some(members) = self.open().groups.get_mut(group) {
      members.retain(|m| m != object_id);
      log::info!("[AzureAD] removed {} from group {}", object_id, group);
    }

    Ok(())
  }

  fn disable_user(&self, handle: &Handle) -> Result<()> {
    let object_id = Self::object_id(handle)?;

    match self.open().users.get_mut(object_id) {
      | Some(user) => {
        user.account_enabled = false;
        log::info!("[AzureAD] disabled user {}", object_id);
        Ok(())
      },
      | None => Err(Error::UserNotFound(object_id.to_string())),
    }
  }

  fn users(&self) -> serde_json::Value {
    serde_json::to_value(&self.open().users).unwrap_or_default()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::identity::NewIdentity;

  fn profile() -> IdentityProfile {
    NewIdentity { employee_id: "EMP900".to_string(),
                  first_name: "Ada".to_string(),
                  last_name: "Lovelace".to_string(),
                  email: "ada.lovelace@example.com".to_string(),
                  department: "Engineering".to_string(),
                  job_title: "Engineer".to_string(),
                  manager_id: None }.into()
  }

  #[test]
  fn create_user_mints_distinct_object_ids() {
    let azure = AzureAd::new();

    let a = azure.create_user(&profile()).unwrap();
    let b = azure.create_user(&profile()).unwrap();

    match (&a, &b) {
      | (Handle::AzureAd { upn: upn_a, object_id: id_a }, Handle::AzureAd { upn: upn_b, object_id: id_b }) => {
        assert_eq!(upn_a, "ada.lovelace@example.com");
        assert_eq!(upn_a, upn_b);
        assert_ne!(id_a, id_b);
      },
      | _ => panic!("expected AzureAd handles"),
    }
  }

  #[test]
  fn add_to_group_is_idempotent_and_creates_groups() {
    let azure = AzureAd::new();
    let handle = azure.create_user(&profile()).unwrap();

    azure.add_to_group(&handle, "Brand-New-Group").unwrap();
    azure.add_to_group(&handle, "Brand-New-Group").unwrap();

    let members = azure.open().groups.get("Brand-New-Group").cloned().unwrap();
    assert_eq!(members.len(), 1);
  }

  #[test]
  fn remove_from_group_tolerates_absence() {
    let azure = AzureAd::new();
    let handle = azure.create_user(&profile()).unwrap();

    azure.remove_from_group(&handle, "Engineering").unwrap();
    azure.remove_from_group(&handle, "No-Such-Group").unwrap();
  }

  #[test]
  fn disable_flips_account_enabled() {
    let azure = AzureAd::new();
    let handle = azure.create_user(&profile()).unwrap();

    azure.disable_user(&handle).unwrap();
    azure.disable_user(&handle).unwrap(); // idempotent

    let users = azure.users();
    let user = users.as_object().unwrap().values().next().unwrap();
    assert_eq!(user["accountEnabled"], serde_json::json!(false));
  }

  #[test]
  fn disable_missing_user_is_an_error() {
    let azure = AzureAd::new();
    let ghost = Handle::AzureAd { upn: "ghost@example.com".to_string(),
                                  object_id: "nope".to_string() };

    assert_eq!(azure.disable_user(&ghost), Err(Error::UserNotFound("nope".to_string())));
  }

  #[test]
  fn rejects_foreign_handles() {
    let azure = AzureAd::new();
    let github = Handle::GitHub { username: "adalovelace".to_string() };

    assert_eq!(azure.add_to_group(&github, "Engineering"),
               Err(Error::WrongHandle { expected: "AzureAD" }));
  }
}
