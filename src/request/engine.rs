use std::sync::Arc;

use serde_json::json;

use super::{AccessRequest, NewRequest, RequestStatus, Resolution, Store};
use crate::{audit,
            audit::NewEvent,
            identity,
            jml,
            policy::{Entitlement, Policy},
            result_extra::ResultExtra};

/// Errors encounterable by the access request workflow
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
  /// Requester identity not found
  RequesterNotFound(String),
  /// Approver identity not found
  ApproverNotFound(String),
  /// No request with this id
  RequestNotFound(String),
  /// Entitlement is not `System:Group`
  InvalidEntitlement(String),
  /// Requester and approver are the same identity
  SelfApproval,
  /// The request already left the pending state
  NotPending(RequestStatus),
}

impl core::fmt::Display for Error {
  fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
    match self {
      | Error::RequesterNotFound(id) => write!(f, "requester identity {} not found", id),
      | Error::ApproverNotFound(id) => write!(f, "approver identity {} not found", id),
      | Error::RequestNotFound(id) => write!(f, "request {} not found", id),
      | Error::InvalidEntitlement(raw) => {
        write!(f, "invalid entitlement format {:?}, expected System:Group", raw)
      },
      | Error::SelfApproval => write!(f, "self-approval is not allowed"),
      | Error::NotPending(status) => {
        write!(f, "request is {}, only pending requests can be resolved", status)
      },
    }
  }
}

/// Request workflow result
pub type Result<T> = core::result::Result<T, self::Error>;

/// The submission / approval / rejection state machine.
///
/// Approval hands provisioning to the JML engine; a downstream failure
/// transitions the request to `failed` rather than failing the call.
#[derive(Clone, Debug)]
pub struct Engine {
  requests: Arc<dyn Store>,
  identities: Arc<dyn identity::Store>,
  audit: Arc<dyn audit::Store>,
  policy: Policy,
  jml: jml::Engine,
}

impl Engine {
  pub fn new(requests: Arc<dyn Store>,
             identities: Arc<dyn identity::Store>,
             audit: Arc<dyn audit::Store>,
             policy: Policy,
             jml: jml::Engine)
             -> Self {
    Self { requests,
           identities,
           audit,
           policy,
           jml }
  }

  /// Open a request for the requester themself.
  ///
  /// SoD conflicts are surfaced as warnings for the approver to weigh -
  /// they never block submission.
  pub fn submit_request(&self, requester_id: &str, entitlement: &str, justification: &str) -> Result<AccessRequest> {
    let requester = self.identities
                        .get(requester_id)
                        .ok_or_else(|| Error::RequesterNotFound(requester_id.to_string()))?;

    Entitlement::parse(entitlement).ok_or_else(|| Error::InvalidEntitlement(entitlement.to_string()))?;

    let mut potential = requester.entitlements.clone();
    potential.insert(entitlement.to_string());

    for violation in self.policy.sod_violations(&potential) {
      log::warn!("SoD violation on request for {} by {}: {}",
                 entitlement,
                 requester.email,
                 violation);
    }

    let request = self.requests.create(NewRequest { requester_id: requester_id.to_string(),
                                                    target_identity_id: requester_id.to_string(),
                                                    entitlement: entitlement.to_string(),
                                                    justification: justification.to_string() });

    self.audit.record(NewEvent::new("submit_request", &requester.email)
                       .details(json!({"entitlement": entitlement, "request_id": request.id})));

    log::info!("access request {} submitted for {}", request.id, entitlement);

    Ok(request)
  }

  /// Approve a pending request and provision the entitlement.
  pub fn approve_request(&self, request_id: &str, approver_id: &str) -> Result<AccessRequest> {
    let request = self.requests
                      .get(request_id)
                      .ok_or_else(|| Error::RequestNotFound(request_id.to_string()))?;

    if request.status != RequestStatus::Pending {
      return Err(Error::NotPending(request.status));
    }

    let approver = self.identities
                       .get(approver_id)
                       .ok_or_else(|| Error::ApproverNotFound(approver_id.to_string()))?;

    if request.requester_id == approver_id {
      return Err(Error::SelfApproval);
    }

    log::info!("approving request {} by {}", request_id, approver.email);

    let (status, comments) =
      match self.jml
                .provision_entitlement(&request.target_identity_id, &request.entitlement)
                .tap_err(|e| log::error!("provisioning failed for request {}: {}", request_id, e))
      {
        | Ok(()) => (RequestStatus::Approved, "Approved via access request workflow".to_string()),
        | Err(e) => (RequestStatus::Failed, format!("Provisioning failed: {}", e)),
      };

    let updated = self.requests
                      .update(request_id,
                              Resolution { status,
                                           approver_id: Some(approver_id.to_string()),
                                           comments: Some(comments) })
                      .ok_or_else(|| Error::RequestNotFound(request_id.to_string()))?;

    self.audit.record(NewEvent::new("approve_request", &request.target_identity_id)
                       .actor(&approver.email)
                       .details(json!({"request_id": request_id, "status": status})));

    Ok(updated)
  }

  /// Reject a pending request.
  pub fn reject_request(&self, request_id: &str, approver_id: &str, reason: &str) -> Result<AccessRequest> {
    let request = self.requests
                      .get(request_id)
                      .ok_or_else(|| Error::RequestNotFound(request_id.to_string()))?;

    if request.status != RequestStatus::Pending {
      return Err(Error::NotPending(request.status));
    }

    let updated = self.requests
                      .update(request_id,
                              Resolution { status: RequestStatus::Rejected,
                                           approver_id: Some(approver_id.to_string()),
                                           comments: Some(reason.to_string()) })
                      .ok_or_else(|| Error::RequestNotFound(request_id.to_string()))?;

    let approver_email = self.identities
                             .get(approver_id)
                             .map(|approver| approver.email)
                             .unwrap_or_else(|| "unknown".to_string());

    self.audit.record(NewEvent::new("reject_request", &request.target_identity_id)
                       .actor(approver_email)
                       .details(json!({"request_id": request_id, "reason": reason})));

    log::info!("request {} rejected", request_id);

    Ok(updated)
  }
}
