use serde::Deserialize as De;
use warp::{reject::Rejection, reply::Reply, Filter};

use crate::{audit, jml, request, State};

/// Yields a `&'static State` to every route
pub type StateFilter = warp::filters::BoxedFilter<(&'static State,)>;

// A note on this filter and dependency injection:
//
// Filter closures must be re-runnable and independent of local state, so
// routes can't borrow a State living on the stack. Handing every route a
// &'static reference (the binary's lazy_static, or a Box::leak'd graph in
// tests) keeps the routes isolated from the implementors of the traits.
/// Make a `StateFilter` from a state reference that lives forever
pub fn state_filter(state: &'static State) -> StateFilter {
  warp::filters::any::any().map(move || state).boxed()
}

/// expands to gross filter type
macro_rules! filter {
  () => {impl Filter<Extract = impl Reply, Error = Rejection> + Clone};
}

fn detail(message: impl ToString) -> serde_json::Value {
  serde_json::json!({ "detail": message.to_string() })
}

fn bad_request(message: impl ToString) -> warp::reply::WithStatus<warp::reply::Json> {
  warp::reply::with_status(warp::reply::json(&detail(message)), http::StatusCode::BAD_REQUEST)
}

fn ok<T: serde::Serialize>(body: &T) -> warp::reply::WithStatus<warp::reply::Json> {
  warp::reply::with_status(warp::reply::json(body), http::StatusCode::OK)
}

/// The composite warp filter that defines our HTTP api
pub fn api(state: StateFilter) -> filter!() {
  root(state.clone()).or(hr_event(state.clone()))
                     .or(identities_list(state.clone()))
                     .or(identity_get(state.clone()))
                     .or(audit_logs(state.clone()))
                     .or(request_submit(state.clone()))
                     .or(requests_list(state.clone()))
                     .or(request_approve(state.clone()))
                     .or(request_reject(state.clone()))
                     .or(connector_users(state))
}

/// GET / -> service banner
fn root(state: StateFilter) -> filter!() {
  warp::path::end().and(warp::get())
                   .and(state)
                   .map(|state: &'static State| {
                     warp::reply::json(&serde_json::json!({
                                         "status": format!("{} running", state.settings.app_name),
                                         "version": state.settings.version,
                                       }))
                   })
}

/// POST api/hr/event -> outcome of the JML flow.
/// Errors ride in the body, never as transport failures.
fn hr_event(state: StateFilter) -> filter!() {
  warp::path!("api" / "hr" / "event").and(warp::post())
                                     .and(warp::body::json())
                                     .and(state)
                                     .map(|event: jml::HrEvent, state: &'static State| {
                                       warp::reply::json(&state.jml.process_event(&event))
                                     })
}

/// GET api/identities
fn identities_list(state: StateFilter) -> filter!() {
  warp::path!("api" / "identities").and(warp::get())
                                   .and(state)
                                   .map(|state: &'static State| warp::reply::json(&state.identities.list()))
}

/// GET api/identities/:id -> 404 when unknown
fn identity_get(state: StateFilter) -> filter!() {
  warp::path!("api" / "identities" / String).and(warp::get())
                                            .and(state)
                                            .map(|id: String, state: &'static State| {
                                              match state.identities.get(&id) {
                                                | Some(identity) => ok(&identity),
                                                | None => {
                                                  warp::reply::with_status(warp::reply::json(&detail("Identity not found")),
                                                                           http::StatusCode::NOT_FOUND)
                                                },
                                              }
                                            })
}

/// GET api/audit/logs -> newest first, capped
fn audit_logs(state: StateFilter) -> filter!() {
  warp::path!("api" / "audit" / "logs").and(warp::get())
                                       .and(state)
                                       .map(|state: &'static State| {
                                         warp::reply::json(&state.audit.recent(audit::DEFAULT_LIMIT))
                                       })
}

#[derive(Debug, De)]
struct SubmitBody {
  requester_id: String,
  entitlement: String,
  justification: String,
}

/// POST api/requests -> open an access request
fn request_submit(state: StateFilter) -> filter!() {
  warp::path!("api" / "requests").and(warp::post())
                                 .and(warp::body::json())
                                 .and(state)
                                 .map(|body: SubmitBody, state: &'static State| {
                                   state.request_engine
                                        .submit_request(&body.requester_id, &body.entitlement, &body.justification)
                                        .map(|request| ok(&request))
                                        .unwrap_or_else(bad_request)
                                 })
}

#[derive(Debug, De)]
struct ListQuery {
  status: Option<request::RequestStatus>,
}

/// GET api/requests?status=
fn requests_list(state: StateFilter) -> filter!() {
  warp::path!("api" / "requests").and(warp::get())
                                 .and(warp::query())
                                 .and(state)
                                 .map(|query: ListQuery, state: &'static State| {
                                   warp::reply::json(&state.requests.list(query.status))
                                 })
}

#[derive(Debug, De)]
struct ActionBody {
  approver_id: String,
  reason: Option<String>,
}

/// POST api/requests/:id/approve
fn request_approve(state: StateFilter) -> filter!() {
  warp::path!("api" / "requests" / String / "approve").and(warp::post())
                                                      .and(warp::body::json())
                                                      .and(state)
                                                      .map(|id: String, body: ActionBody, state: &'static State| {
                                                        state.request_engine
                                                             .approve_request(&id, &body.approver_id)
                                                             .map(|request| ok(&request))
                                                             .unwrap_or_else(bad_request)
                                                      })
}

/// POST api/requests/:id/reject
fn request_reject(state: StateFilter) -> filter!() {
  warp::path!("api" / "requests" / String / "reject").and(warp::post())
                                                     .and(warp::body::json())
                                                     .and(state)
                                                     .map(|id: String, body: ActionBody, state: &'static State| {
                                                       let reason = body.reason
                                                                        .unwrap_or_else(|| "No reason provided".to_string());

                                                       state.request_engine
                                                            .reject_request(&id, &body.approver_id, &reason)
                                                            .map(|request| ok(&request))
                                                            .unwrap_or_else(bad_request)
                                                     })
}

/// GET api/connectors/:sys/users -> the connector's user table
fn connector_users(state: StateFilter) -> filter!() {
  warp::path!("api" / "connectors" / String / "users").and(warp::get())
                                                      .and(state)
                                                      .map(|sys: String, state: &'static State| {
                                                        match state.connectors.by_path(&sys) {
                                                          | Some(conn) => ok(&conn.users()),
                                                          | None => {
                                                            warp::reply::with_status(warp::reply::json(&detail("Unknown connector")),
                                                                                     http::StatusCode::NOT_FOUND)
                                                          },
                                                        }
                                                      })
}
