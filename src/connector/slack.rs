use std::{collections::HashMap,
          sync::{Arc, Mutex, MutexGuard, PoisonError}};

use serde::Serialize as Ser;

use super::{Connector, Error, Handle, Result, System};
use crate::identity::IdentityProfile;

#[derive(Clone, Debug, Ser)]
struct User {
  id: String,
  email: String,
  real_name: String,
  deleted: bool,
}

#[derive(Debug, Default)]
struct Data {
  /// email -> user
  users: HashMap<String, User>,
  /// channel name -> member emails
  channels: HashMap<String, Vec<String>>,
}

/// Simulated Slack workspace.
///
/// The API mints `U…` ids, but channel membership is keyed by email - the
/// minted `Handle` carries both.
#[derive(Clone, Debug)]
pub struct Slack {
  data: Arc<Mutex<Data>>,
}

impl Slack {
  pub fn new() -> Self {
    let channels = ["general", "random", "engineering", "sales", "marketing"].iter()
                                                                             .map(|c| (c.to_string(), Vec::new()))
                                                                             .collect();

    Self { data: Arc::new(Mutex::new(Data { users: HashMap::new(),
                                            channels })) }
  }

  fn open(&self) -> MutexGuard<'_, Data> {
    self.data.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn email(handle: &Handle) -> Result<&str> {
    match handle {
      | Handle::Slack { email, .. } => Ok(email),
      | _ => Err(Error::WrongHandle { expected: "Slack" }),
    }
  }
}

impl Default for Slack {
  fn default() -> Self {
    Self::new()
  }
}

impl Connector for Slack {
  fn system(&self) -> System {
    System::Slack
  }

  fn create_user(&self, profile: &IdentityProfile) -> Result<Handle> {
    let mut data = self.open();
    let id = format!("U{}", 1000 + data.users.len());

    let user = User { id: id.clone(),
                      email: profile.email.clone(),
                      real_name: format!("{} {}", profile.first_name, profile.last_name),
                      deleted: false };

    data.users.insert(profile.email.clone(), user);

    log::info!("[Slack] created user {} ({})", profile.email, id);

    Ok(Handle::Slack { id,
                       email: profile.email.clone() })
  }

  fn add_to_group(&self, handle: &Handle, channel: &str) -> Result<()> {
    let email = Self::email(handle)?;
    let mut data = self.open();
    let members = data.channels.entry(channel.to_string()).or_insert_with(Vec::new);

    if !members.iter().any(|m| m == email) {
      members.push(email.to_string());
      log::info!("[Slack] added {} to channel {}", email, channel);
    }

    Ok(())
  }

  fn remove_from_group(&self, handle: &Handle, channel: &str) -> Result<()> {
    let email = Self::email(handle)?;

    if let Some(members) = self.open().channels.get_mut(channel) {
      members.retain(|m| m != email);
      log::info!("[Slack] removed {} from channel {}", email, channel);
    }

    Ok(())
  }

  fn disable_user(&self, handle: &Handle) -> Result<()> {
    let email = Self::email(handle)?;

    match self.open().users.get_mut(email) {
      | Some(user) => {
        user.deleted = true;
        log::info!("[Slack] deactivated user {}", email);
        Ok(())
      },
      | None => Err(Error::UserNotFound(email.to_string())),
    }
  }

  fn users(&self) -> serde_json::Value {
    serde_json::to_value(&self.open().users).unwrap_or_default()
  }
}
