use std::{collections::HashMap,
          sync::{Arc, Mutex, MutexGuard, PoisonError}};

use serde::Serialize as Ser;

use super::{Connector, Error, Handle, Result, System};
use crate::identity::IdentityProfile;

#[derive(Clone, Debug, Ser)]
struct User {
  username: String,
  email: String,
  name: String,
}

#[derive(Debug, Default)]
struct Data {
  /// username -> user
  users: HashMap<String, User>,
  /// team name -> member usernames
  teams: HashMap<String, Vec<String>>,
}

/// Simulated GitHub org. Users are keyed by username.
///
/// Removal is a hard delete: the user record goes away and every team
/// membership is stripped with it.
#[derive(Clone, Debug)]
pub struct GitHub {
  data: Arc<Mutex<Data>>,
}

impl GitHub {
  pub fn new() -> Self {
    let teams = ["Engineering", "DevOps", "Frontend", "Backend"].iter()
                                                                .map(|t| (t.to_string(), Vec::new()))
                                                                .collect();

    Self { data: Arc::new(Mutex::new(Data { users: HashMap::new(),
                                            teams })) }
  }

  fn open(&self) -> MutexGuard<'_, Data> {
    self.data.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn username(handle: &Handle) -> Result<&str> {
    match handle {
      | Handle::GitHub { username } => Ok(username),
      | _ => Err(Error::WrongHandle { expected: "GitHub" }),
    }
  }
}

impl Default for GitHub {
  fn default() -> Self {
    Self::new()
  }
}

impl Connector for GitHub {
  fn system(&self) -> System {
    System::GitHub
  }

  fn create_user(&self, profile: &IdentityProfile) -> Result<Handle> {
    let username = format!("{}{}",
                           profile.first_name.to_lowercase(),
                           profile.last_name.to_lowercase());

    let user = User { username: username.clone(),
                      email: profile.email.clone(),
                      name: format!("{} {}", profile.first_name, profile.last_name) };

    self.open().users.insert(username.clone(), user);

    log::info!("[GitHub] created user {}", username);

    Ok(Handle::GitHub { username })
  }

  fn add_to_group(&self, handle: &Handle, team: &str) -> Result<()> {
    let username = Self::username(handle)?;
    let mut data = self.open();
    let members = data.teams.entry(team.to_string()).or_insert_with(Vec::new);

    if !members.iter().any(|m| m == username) {
      members.push(username.to_string());
      log::info!("[GitHub] added {} to team {}", username, team);
    }

    Ok(())
  }

  fn remove_from_group(&self, handle: &Handle, team: &str) -> Result<()> {
    let username = Self::username(handle)?;

    if let Some(members) = self.open().teams.get_mut(team) {
      members.retain(|m| m != username);
      log::info!("[GitHub] removed {} from team {}", username, team);
    }

    Ok(())
  }

  // GitHub's "disable" is a hard removal per the org-membership contract
  fn disable_user(&self, handle: &Handle) -> Result<()> {
    let username = Self::username(handle)?;
    let mut data = self.open();

    match data.users.remove(username) {
      | Some(_) => {
        for members in data.teams.values_mut() {
          members.retain(|m| m != username);
        }

        log::info!("[GitHub] removed user {}", username);
        Ok(())
      },
      | None => Err(Error::UserNotFound(username.to_string())),
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
    NewIdentity { employee_id: "EMP901".to_string(),
                  first_name: "Grace".to_string(),
                  last_name: "Hopper".to_string(),
                  email: "grace.hopper@example.com".to_string(),
                  department: "Engineering".to_string(),
                  job_title: "Engineer".to_string(),
                  manager_id: None }.into()
  }

  #[test]
  fn create_user_derives_username() {
    let github = GitHub::new();

    assert_eq!(github.create_user(&profile()).unwrap(),
               Handle::GitHub { username: "gracehopper".to_string() });
  }

  #[test]
  fn removal_strips_team_memberships() {
    let github = GitHub::new();
    let handle = github.create_user(&profile()).unwrap();

    github.add_to_group(&handle, "Engineering").unwrap();
    github.add_to_group(&handle, "DevOps").unwrap();

    github.disable_user(&handle).unwrap();

    let data = github.open();
    assert!(data.users.is_empty());
    assert!(data.teams.values().all(|members| members.is_empty()));
  }

  #[test]
  fn removal_of_missing_user_is_an_error() {
    let github = GitHub::new();
    let handle = Handle::GitHub { username: "ghost".to_string() };

    assert_eq!(github.disable_user(&handle),
               Err(Error::UserNotFound("ghost".to_string())));
  }
}
