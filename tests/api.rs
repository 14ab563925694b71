use idgov::{config::Settings, filters, State};
use serde_json::{json, Value};

fn state() -> &'static State {
  simple_logger::SimpleLogger::new().init().ok();

  Box::leak(Box::new(State::new(Settings::default())))
}

fn api(state: &'static State) -> impl warp::Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
  filters::api(filters::state_filter(state))
}

fn body_json(body: &[u8]) -> Value {
  serde_json::from_slice(body).unwrap()
}

fn hr_event(employee_id: &str, first: &str, last: &str, department: &str) -> Value {
  json!({
    "event_type": "EmployeeCreated",
    "employee_id": employee_id,
    "first_name": first,
    "last_name": last,
    "email": format!("{}@example.com", first.to_lowercase()),
    "department": department,
    "job_title": "Individual Contributor",
  })
}

#[tokio::test]
async fn root_reports_version() {
  let api = api(state());

  let res = warp::test::request().method("GET").path("/").reply(&api).await;

  assert_eq!(res.status(), 200);

  let body = body_json(res.body());
  assert!(body["status"].as_str().unwrap().contains("running"));
  assert_eq!(body["version"], json!(env!("CARGO_PKG_VERSION")));
}

#[tokio::test]
async fn hr_event_and_identity_endpoints() {
  let api = api(state());

  let res = warp::test::request().method("POST")
                                 .path("/api/hr/event")
                                 .json(&hr_event("EMP001", "John", "Doe", "Engineering"))
                                 .reply(&api)
                                 .await;

  assert_eq!(res.status(), 200);

  let outcome = body_json(res.body());
  assert_eq!(outcome["status"], json!("success"));

  let identity_id = outcome["identity_id"].as_str().unwrap().to_string();

  let res = warp::test::request().method("GET").path("/api/identities").reply(&api).await;
  assert_eq!(res.status(), 200);
  assert_eq!(body_json(res.body()).as_array().unwrap().len(), 1);

  let res = warp::test::request().method("GET")
                                 .path(&format!("/api/identities/{}", identity_id))
                                 .reply(&api)
                                 .await;
  assert_eq!(res.status(), 200);

  let identity = body_json(res.body());
  assert_eq!(identity["employee_id"], json!("EMP001"));
  assert_eq!(identity["status"], json!("active"));
  assert_eq!(identity["accounts"]["github"]["username"], json!("johndoe"));

  let res = warp::test::request().method("GET").path("/api/identities/ghost").reply(&api).await;
  assert_eq!(res.status(), 404);
  assert_eq!(body_json(res.body())["detail"], json!("Identity not found"));
}

#[tokio::test]
async fn hr_event_errors_ride_in_the_body() {
  let api = api(state());

  let res = warp::test::request().method("POST")
                                 .path("/api/hr/event")
                                 .json(&json!({"event_type": "EmployeeUpdated", "employee_id": "EMP404"}))
                                 .reply(&api)
                                 .await;

  assert_eq!(res.status(), 200);
  assert_eq!(body_json(res.body())["status"], json!("error"));

  let res = warp::test::request().method("POST")
                                 .path("/api/hr/event")
                                 .json(&json!({"event_type": "EmployeeCloned", "employee_id": "EMP001"}))
                                 .reply(&api)
                                 .await;

  assert_eq!(res.status(), 200);
  assert_eq!(body_json(res.body())["status"], json!("ignored"));
}

#[tokio::test]
async fn request_workflow_over_http() {
  let api = api(state());

  warp::test::request().method("POST")
                       .path("/api/hr/event")
                       .json(&hr_event("REQ001", "Alice", "Doe", "Engineering"))
                       .reply(&api)
                       .await;
  warp::test::request().method("POST")
                       .path("/api/hr/event")
                       .json(&hr_event("APP001", "Bob", "Roe", "Engineering"))
                       .reply(&api)
                       .await;

  let identities = body_json(warp::test::request().method("GET")
                                                  .path("/api/identities")
                                                  .reply(&api)
                                                  .await
                                                  .body());
  let id_of = |email: &str| {
    identities.as_array()
              .unwrap()
              .iter()
              .find(|i| i["email"] == json!(email))
              .unwrap()["id"].as_str()
                             .unwrap()
                             .to_string()
  };
  let alice = id_of("alice@example.com");
  let bob = id_of("bob@example.com");

  let res = warp::test::request().method("POST")
                                 .path("/api/requests")
                                 .json(&json!({"requester_id": alice, "entitlement": "GitHub:SuperAdmin", "justification": "oncall"}))
                                 .reply(&api)
                                 .await;
  assert_eq!(res.status(), 200);

  let request = body_json(res.body());
  assert_eq!(request["status"], json!("pending"));

  let request_id = request["id"].as_str().unwrap().to_string();

  let pending = body_json(warp::test::request().method("GET")
                                               .path("/api/requests?status=pending")
                                               .reply(&api)
                                               .await
                                               .body());
  assert_eq!(pending.as_array().unwrap().len(), 1);

  let res = warp::test::request().method("POST")
                                 .path(&format!("/api/requests/{}/approve", request_id))
                                 .json(&json!({"approver_id": bob}))
                                 .reply(&api)
                                 .await;
  assert_eq!(res.status(), 200);
  assert_eq!(body_json(res.body())["status"], json!("approved"));

  let pending = body_json(warp::test::request().method("GET")
                                               .path("/api/requests?status=pending")
                                               .reply(&api)
                                               .await
                                               .body());
  assert!(pending.as_array().unwrap().is_empty());

  // self-approval comes back as a 400 with a detail body
  let res = warp::test::request().method("POST")
                                 .path("/api/requests")
                                 .json(&json!({"requester_id": alice, "entitlement": "GitHub:Admin", "justification": "more"}))
                                 .reply(&api)
                                 .await;
  let second_id = body_json(res.body())["id"].as_str().unwrap().to_string();

  let res = warp::test::request().method("POST")
                                 .path(&format!("/api/requests/{}/approve", second_id))
                                 .json(&json!({"approver_id": alice}))
                                 .reply(&api)
                                 .await;
  assert_eq!(res.status(), 400);
  assert!(body_json(res.body())["detail"].as_str().unwrap().contains("self-approval"));
}

#[tokio::test]
async fn request_validation_over_http() {
  let api = api(state());

  let res = warp::test::request().method("POST")
                                 .path("/api/requests")
                                 .json(&json!({"requester_id": "ghost", "entitlement": "GitHub:Admin", "justification": "x"}))
                                 .reply(&api)
                                 .await;
  assert_eq!(res.status(), 400);
  assert!(body_json(res.body())["detail"].as_str().unwrap().contains("not found"));

  let res = warp::test::request().method("POST")
                                 .path("/api/requests/ghost/reject")
                                 .json(&json!({"approver_id": "ghost"}))
                                 .reply(&api)
                                 .await;
  assert_eq!(res.status(), 400);
}

#[tokio::test]
async fn reject_defaults_the_reason() {
  let api = api(state());

  warp::test::request().method("POST")
                       .path("/api/hr/event")
                       .json(&hr_event("REQ010", "Rae", "Lee", "Marketing"))
                       .reply(&api)
                       .await;
  warp::test::request().method("POST")
                       .path("/api/hr/event")
                       .json(&hr_event("APP010", "Ray", "Lim", "Marketing"))
                       .reply(&api)
                       .await;

  let identities = body_json(warp::test::request().method("GET")
                                                  .path("/api/identities")
                                                  .reply(&api)
                                                  .await
                                                  .body());
  let id_of = |email: &str| {
    identities.as_array()
              .unwrap()
              .iter()
              .find(|i| i["email"] == json!(email))
              .unwrap()["id"].as_str()
                             .unwrap()
                             .to_string()
  };

  let request = body_json(warp::test::request().method("POST")
                                               .path("/api/requests")
                                               .json(&json!({"requester_id": id_of("rae@example.com"),
                                                             "entitlement": "AzureAD:Designers",
                                                             "justification": "assets"}))
                                               .reply(&api)
                                               .await
                                               .body());

  let res = warp::test::request().method("POST")
                                 .path(&format!("/api/requests/{}/reject", request["id"].as_str().unwrap()))
                                 .json(&json!({"approver_id": id_of("ray@example.com")}))
                                 .reply(&api)
                                 .await;

  assert_eq!(res.status(), 200);

  let rejected = body_json(res.body());
  assert_eq!(rejected["status"], json!("rejected"));
  assert_eq!(rejected["comments"], json!("No reason provided"));
}

#[tokio::test]
async fn audit_and_connector_endpoints() {
  let api = api(state());

  warp::test::request().method("POST")
                       .path("/api/hr/event")
                       .json(&hr_event("EMP050", "Cal", "Poe", "Engineering"))
                       .reply(&api)
                       .await;

  let res = warp::test::request().method("GET").path("/api/audit/logs").reply(&api).await;
  assert_eq!(res.status(), 200);

  let logs = body_json(res.body());
  let logs = logs.as_array().unwrap();

  assert!(!logs.is_empty());
  assert!(logs.len() <= 100);

  // newest first: account provisioning comes after identity creation
  let first_action = logs.last().unwrap()["action"].as_str().unwrap();
  assert_eq!(first_action, "create_identity");

  for log in logs {
    assert_eq!(log["actor"], json!("system"));
    assert_eq!(log["status"], json!("success"));
  }

  let res = warp::test::request().method("GET").path("/api/connectors/azuread/users").reply(&api).await;
  assert_eq!(res.status(), 200);
  assert_eq!(body_json(res.body()).as_object().unwrap().len(), 1);

  let res = warp::test::request().method("GET").path("/api/connectors/github/users").reply(&api).await;
  assert_eq!(res.status(), 200);

  let res = warp::test::request().method("GET").path("/api/connectors/jira/users").reply(&api).await;
  assert_eq!(res.status(), 404);
}
