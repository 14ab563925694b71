use std::{collections::HashMap,
          sync::{Arc, Mutex, MutexGuard, PoisonError}};

use super::*;

#[derive(Debug, Default)]
struct Data {
  identities: HashMap<String, IdentityProfile>,
  /// employee_id -> id; updated in the same critical section as the insert
  /// so the uniqueness invariant holds under concurrent joiners
  by_employee_id: HashMap<String, String>,
}

/// In-memory implementor of the identity Store.
///
/// Note that this is not persisted across instances of the application
#[derive(Clone, Debug, Default)]
pub struct MemStore {
  data: Arc<Mutex<Data>>,
}

impl MemStore {
  pub fn new() -> Self {
    Self::default()
  }

  fn open(&self) -> MutexGuard<'_, Data> {
    self.data.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl Store for MemStore {
  fn create(&self, new: NewIdentity) -> Result<IdentityProfile> {
    let mut data = self.open();

    if data.by_employee_id.contains_key(&new.employee_id) {
      return Err(Error::DuplicateEmployeeId(new.employee_id));
    }

    let profile = IdentityProfile::from(new);

    data.by_employee_id.insert(profile.employee_id.clone(), profile.id.clone());
    data.identities.insert(profile.id.clone(), profile.clone());

    Ok(profile)
  }

  fn get(&self, id: &str) -> Option<IdentityProfile> {
    self.open().identities.get(id).cloned()
  }

  fn get_by_employee_id(&self, employee_id: &str) -> Option<IdentityProfile> {
    let data = self.open();

    data.by_employee_id
        .get(employee_id)
        .and_then(|id| data.identities.get(id))
        .cloned()
  }

  fn update(&self, id: &str, updates: Update) -> Result<IdentityProfile> {
    let mut data = self.open();

    let current = data.identities
                      .get(id)
                      .cloned()
                      .ok_or_else(|| Error::NotFound(id.to_string()))?;

    let updated = updates.apply(current);
    data.identities.insert(id.to_string(), updated.clone());

    Ok(updated)
  }

  fn list(&self) -> Vec<IdentityProfile> {
    self.open().identities.values().cloned().collect()
  }
}
