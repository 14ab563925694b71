use serde::{Deserialize as De, Serialize as Ser};

mod engine;
pub use engine::*;

/// An inbound HR feed event (Workday/BambooHR shaped).
///
/// `event_type` stays a free string at this boundary so unrecognized types
/// can be acknowledged as ignored instead of rejected at deserialization.
#[derive(Clone, Debug, Ser, De)]
pub struct HrEvent {
  /// `EmployeeCreated`, `EmployeeUpdated` or `EmployeeTerminated`
  pub event_type: String,
  pub employee_id: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub first_name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub last_name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub email: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub department: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub job_title: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub location: Option<String>,
}

/// What became of a processed HR event.
///
/// This is the wire shape of `POST /api/hr/event` responses - failures ride
/// in the body, never as transport errors.
#[derive(Clone, Debug, PartialEq, Ser)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
  Success {
    #[serde(skip_serializing_if = "Option::is_none")]
    identity_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
  },
  Ignored {
    message: String,
  },
  Error {
    message: String,
  },
}

impl Outcome {
  pub(crate) fn created(identity_id: impl ToString) -> Self {
    Outcome::Success { identity_id: Some(identity_id.to_string()),
                       message: None }
  }

  pub(crate) fn processed(message: impl ToString) -> Self {
    Outcome::Success { identity_id: None,
                       message: Some(message.to_string()) }
  }

  pub(crate) fn error(message: impl ToString) -> Self {
    Outcome::Error { message: message.to_string() }
  }

  pub fn is_success(&self) -> bool {
    matches!(self, Outcome::Success { .. })
  }

  /// The new identity's id, on a successful joiner
  pub fn identity_id(&self) -> Option<&str> {
    match self {
      | Outcome::Success { identity_id, .. } => identity_id.as_deref(),
      | _ => None,
    }
  }
}
