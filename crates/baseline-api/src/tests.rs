//! Router tests driven with `oneshot` against an in-memory store.

use axum::{
  Router,
  body::{Body, to_bytes},
  http::{Method, Request, StatusCode},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use baseline_core::{
  inventory::{StaticInventory, SystemProfileDocument},
  system::SystemGroup,
};
use baseline_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use crate::{
  AccessControl, AllowAll, AppState, MountConfig, Permission,
  identity::{IDENTITY_HEADER, Identity},
  router,
};

const API: &str = "/api/system-baseline/v1";
const INTERNAL: &str = "/api/system-baseline/internal/v1";

fn identity(account: &str) -> String {
  B64.encode(json!({"identity": {"account_number": account, "type": "User"}}).to_string())
}

fn system(name: &str, group: Option<(&str, &str)>, profile: Value) -> SystemProfileDocument {
  SystemProfileDocument {
    id:             Uuid::new_v4(),
    display_name:   Some(name.into()),
    fqdn:           None,
    groups:         group
      .map(|(id, name)| SystemGroup {
        id:   id.into(),
        name: name.into(),
      })
      .into_iter()
      .collect(),
    system_profile: serde_json::from_value(profile).unwrap(),
  }
}

async fn app_with(
  systems: Vec<SystemProfileDocument>,
  access: impl AccessControl + 'static,
) -> Router {
  let store = SqliteStore::open_in_memory()
    .await
    .expect("in-memory store");
  router(
    AppState::new(store, StaticInventory::new(systems), access),
    &MountConfig::default(),
  )
}

async fn app(systems: Vec<SystemProfileDocument>) -> Router { app_with(systems, AllowAll).await }

async fn send_as(
  app: &Router,
  header: Option<String>,
  method: Method,
  uri: &str,
  body: Option<Value>,
) -> (StatusCode, Value) {
  let mut req = Request::builder().method(method).uri(uri);
  if let Some(header) = header {
    req = req.header(IDENTITY_HEADER, header);
  }
  let body = match body {
    Some(value) => {
      req = req.header("content-type", "application/json");
      Body::from(value.to_string())
    }
    None => Body::empty(),
  };
  let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
  let status = resp.status();
  let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
  send_as(app, Some(identity("1212729")), method, uri, body).await
}

async fn create(app: &Router, name: &str, facts: Value) -> Value {
  let (status, body) = send(
    app,
    Method::POST,
    &format!("{API}/baselines"),
    Some(json!({"display_name": name, "baseline_facts": facts})),
  )
  .await;
  assert_eq!(status, StatusCode::OK, "{body}");
  body
}

fn id_of(body: &Value) -> String { body["id"].as_str().unwrap().to_string() }

// ─── Identity and access ─────────────────────────────────────────────────────

#[tokio::test]
async fn missing_identity_is_unauthorized() {
  let app = app(vec![]).await;
  let (status, body) =
    send_as(&app, None, Method::GET, &format!("{API}/baselines"), None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  assert!(body["message"].as_str().unwrap().contains(IDENTITY_HEADER));
}

struct ReadOnly;

impl AccessControl for ReadOnly {
  fn permits(&self, _: &Identity, permission: Permission) -> bool {
    permission == Permission::BaselinesRead
  }
}

#[tokio::test]
async fn write_without_permission_is_forbidden() {
  let app = app_with(vec![], ReadOnly).await;
  let (status, _) = send(&app, Method::GET, &format!("{API}/baselines"), None).await;
  assert_eq!(status, StatusCode::OK);

  let (status, body) = send(
    &app,
    Method::POST,
    &format!("{API}/baselines"),
    Some(json!({"display_name": "web", "baseline_facts": []})),
  )
  .await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  assert!(body["message"].as_str().unwrap().contains("drift:baselines:write"));
}

#[tokio::test]
async fn accounts_do_not_see_each_other() {
  let app = app(vec![]).await;
  let created = create(&app, "web", json!([{"name": "arch", "value": "x86_64"}])).await;

  let (status, _) = send_as(
    &app,
    Some(identity("other")),
    Method::GET,
    &format!("{API}/baselines/{}", id_of(&created)),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

// ─── Baselines ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_fetch_baseline() {
  let app = app(vec![]).await;
  let created = create(
    &app,
    "web",
    json!([
      {"name": "B-name", "value": "2"},
      {"name": "A-name", "values": [{"name": "b", "value": "1"}, {"name": "a", "value": "1"}]},
    ]),
  )
  .await;
  assert_eq!(created["fact_count"], 3);
  assert_eq!(created["mapped_system_count"], 0);
  assert_eq!(created["baseline_facts"][0]["name"], "A-name");
  assert_eq!(created["baseline_facts"][0]["values"][0]["name"], "a");

  let (status, body) = send(
    &app,
    Method::GET,
    &format!("{API}/baselines/{}", id_of(&created)),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["meta"]["count"], 1);
  assert_eq!(body["data"][0]["display_name"], "web");
}

#[tokio::test]
async fn invalid_facts_rejected() {
  let app = app(vec![]).await;
  let (status, body) = send(
    &app,
    Method::POST,
    &format!("{API}/baselines"),
    Some(json!({
      "display_name": "web",
      "baseline_facts": [{"name": "cpu_sockets ", "value": "2"}],
    })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(body["message"].as_str().unwrap().contains("leading or trailing whitespace"));

  let (status, _) = send(
    &app,
    Method::POST,
    &format!("{API}/baselines"),
    Some(json!({
      "display_name": "web",
      "baseline_facts": [],
      "inventory_uuids": [Uuid::new_v4()],
    })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn duplicate_display_name_rejected() {
  let app = app(vec![]).await;
  create(&app, "web", json!([])).await;
  let (status, body) = send(
    &app,
    Method::POST,
    &format!("{API}/baselines"),
    Some(json!({"display_name": "web", "baseline_facts": []})),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(body["message"].as_str().unwrap().contains("already exists"));
}

#[tokio::test]
async fn get_reports_malformed_duplicate_and_missing_ids() {
  let app = app(vec![]).await;
  let created = create(&app, "web", json!([])).await;
  let id = id_of(&created);

  let (status, body) = send(&app, Method::GET, &format!("{API}/baselines/{id},nope"), None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(body["message"].as_str().unwrap().contains("malformed UUIDs requested"));

  let (status, _) = send(&app, Method::GET, &format!("{API}/baselines/{id},{id}"), None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let missing = Uuid::new_v4();
  let (status, body) =
    send(&app, Method::GET, &format!("{API}/baselines/{id},{missing}"), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  let message = body["message"].as_str().unwrap();
  assert!(message.contains(&missing.to_string()));
  assert!(message.contains("not available to display"));
}

#[tokio::test]
async fn list_filters_and_pages() {
  let app = app(vec![]).await;
  for name in ["web 1", "web 2", "web 3", "db"] {
    create(&app, name, json!([])).await;
  }

  let (status, body) = send(
    &app,
    Method::GET,
    &format!("{API}/baselines?display_name=WEB&order_by=display_name&order_how=ASC&limit=2"),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["meta"]["count"], 2);
  assert_eq!(body["meta"]["total_available"], 3);
  assert_eq!(body["data"][0]["display_name"], "web 1");
  assert!(body["data"][0].get("baseline_facts").is_none());
  assert_eq!(
    body["links"]["next"],
    format!("{API}/baselines?display_name=WEB&order_by=display_name&order_how=ASC&limit=2&offset=2")
  );
  assert!(body["links"]["previous"].is_null());
}

#[tokio::test]
async fn out_of_range_limit_rejected() {
  let app = app(vec![]).await;
  create(&app, "web", json!([])).await;

  for query in ["limit=18446744073709551615&offset=1", "limit=0", "limit=1001"] {
    let (status, body) =
      send(&app, Method::GET, &format!("{API}/baselines?{query}"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{query}");
    assert!(body["message"].as_str().unwrap().contains("limit"));
  }

  let (status, body) = send(
    &app,
    Method::GET,
    &format!("{API}/baselines?limit=1000&offset=18446744073709551615"),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["meta"]["count"], 0);
  assert_eq!(body["meta"]["total_available"], 1);
}

#[tokio::test]
async fn oversized_fact_set_rejected() {
  let app = app(vec![]).await;
  let facts: Vec<Value> = (0..1 << 15)
    .map(|i| json!({"name": i.to_string(), "value": "lorem ipsum"}))
    .collect();

  let (status, body) = send(
    &app,
    Method::POST,
    &format!("{API}/baselines"),
    Some(json!({"display_name": "large baseline", "baseline_facts": facts})),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(body["message"].as_str().unwrap().contains("over the limit"));

  let (_, body) = send(&app, Method::GET, &format!("{API}/baselines"), None).await;
  assert_eq!(body["meta"]["total_available"], 0);
}

#[tokio::test]
async fn copy_patch_and_delete() {
  let app = app(vec![]).await;
  let created = create(&app, "web", json!([{"name": "arch", "value": "x86_64"}])).await;
  let id = id_of(&created);

  let (status, copy) = send(&app, Method::POST, &format!("{API}/baselines/{id}"), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(copy["display_name"], "Copy of web");
  assert_eq!(copy["baseline_facts"], created["baseline_facts"]);

  let (status, _) = send(
    &app,
    Method::POST,
    &format!("{API}/baselines/{id}?display_name="),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, patched) = send(
    &app,
    Method::PATCH,
    &format!("{API}/baselines/{id}"),
    Some(json!({"display_name": "web servers"})),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(patched["display_name"], "web servers");
  assert_eq!(patched["baseline_facts"], created["baseline_facts"]);

  let copy_id = id_of(&copy);
  let missing = Uuid::new_v4();
  let (status, _) = send(
    &app,
    Method::DELETE,
    &format!("{API}/baselines/{copy_id},{missing}"),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let (status, body) = send(
    &app,
    Method::POST,
    &format!("{API}/baselines/deletion_request"),
    Some(json!({"baseline_ids": [id, copy_id]})),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["deleted"], 2);
}

// ─── Systems and comparison ──────────────────────────────────────────────────

#[tokio::test]
async fn create_from_inventory_and_compare() {
  let web1 = system("web-1", None, json!({"arch": "x86_64", "cores_per_socket": 4}));
  let web2 = system("web-2", None, json!({"arch": "x86_64", "cores_per_socket": 8}));
  let (id1, id2) = (web1.id, web2.id);
  let app = app(vec![web1, web2]).await;

  let (status, created) = send(
    &app,
    Method::POST,
    &format!("{API}/baselines"),
    Some(json!({"display_name": "web", "inventory_uuids": [id1, id2]})),
  )
  .await;
  assert_eq!(status, StatusCode::OK, "{created}");
  assert_eq!(created["baseline_facts"], json!([{"name": "arch", "value": "x86_64"}]));
  assert_eq!(created["conflicts"], json!(["cores_per_socket"]));

  let baseline_id = id_of(&created);
  let (status, report) = send(
    &app,
    Method::GET,
    &format!("{API}/comparison_report?baseline_ids={baseline_id}&system_ids={id1}"),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK, "{report}");
  assert_eq!(report["comparison"]["sides"], json!(["web", "web-1"]));
  let facts = report["comparison"]["facts"].as_array().unwrap();
  assert_eq!(facts[0]["name"], "arch");
  assert_eq!(facts[0]["state"], "same");
  assert_eq!(facts[1]["name"], "cores_per_socket");
  assert_eq!(facts[1]["state"], "only_in");

  let (status, _) = send(&app, Method::GET, &format!("{API}/comparison_report"), None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let missing = Uuid::new_v4();
  let (status, _) = send(
    &app,
    Method::GET,
    &format!("{API}/comparison_report?system_ids={missing}"),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn profiles_with_value_category_clash_rejected() {
  let web1 = system("web-1", None, json!({"network": {"eth0": "up"}}));
  let web2 = system("web-2", None, json!({"network": "down"}));
  let (id1, id2) = (web1.id, web2.id);
  let app = app(vec![web1, web2]).await;

  let (status, body) = send(
    &app,
    Method::POST,
    &format!("{API}/baselines"),
    Some(json!({"display_name": "web", "inventory_uuids": [id1, id2]})),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(body["message"].as_str().unwrap().contains("network"));
}

#[tokio::test]
async fn mapped_systems_lifecycle() {
  let front = system("web-1", Some(("g1", "frontend")), json!({"arch": "x86_64"}));
  let lone = system("web-2", None, json!({"arch": "x86_64"}));
  let (front_id, lone_id) = (front.id, lone.id);
  let app = app(vec![front, lone]).await;
  let baseline_id = id_of(&create(&app, "web", json!([])).await);
  let systems = format!("{API}/baselines/{baseline_id}/systems");

  let (status, body) = send(
    &app,
    Method::POST,
    &systems,
    Some(json!({"system_ids": [front_id, lone_id]})),
  )
  .await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["meta"]["count"], 2);

  let (_, body) = send(&app, Method::GET, &format!("{systems}?group_names=frontend"), None).await;
  assert_eq!(body["data"][0]["system_id"], front_id.to_string());
  assert_eq!(body["meta"]["count"], 1);

  let (_, body) = send(&app, Method::GET, &format!("{systems}?group_ids="), None).await;
  assert_eq!(body["data"][0]["system_id"], lone_id.to_string());
  assert_eq!(body["meta"]["count"], 1);

  let (_, body) = send(&app, Method::GET, &format!("{API}/baselines/{baseline_id}"), None).await;
  assert_eq!(body["data"][0]["mapped_system_count"], 2);

  // Internal group refresh, then lookup by system.
  let (status, body) = send(
    &app,
    Method::PATCH,
    &format!("{INTERNAL}/systems/{lone_id}"),
    Some(json!({"groups": [{"id": "g2", "name": "edge"}]})),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, json!([baseline_id]));

  let (status, _) = send(
    &app,
    Method::PATCH,
    &format!("{INTERNAL}/systems/{}", Uuid::new_v4()),
    Some(json!({})),
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let (_, body) = send(
    &app,
    Method::GET,
    &format!("{INTERNAL}/baselines?system_id={front_id}"),
    None,
  )
  .await;
  assert_eq!(body, json!([baseline_id]));

  // Unmapping an unmapped system is rejected.
  let stranger = Uuid::new_v4();
  let (status, _) = send(&app, Method::DELETE, &format!("{systems}/{stranger}"), None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, body) = send(&app, Method::DELETE, &format!("{systems}/{front_id}"), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["deleted"], 1);

  // A listing's `system_ids` can be posted straight back for deletion.
  let (_, body) = send(&app, Method::GET, &systems, None).await;
  assert_eq!(body["system_ids"], json!([lone_id]));
  let (status, body) = send(
    &app,
    Method::POST,
    &format!("{systems}/deletion_request"),
    Some(json!({"system_ids": body["system_ids"]})),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["deleted"], 1);

  let (status, _) = send(
    &app,
    Method::POST,
    &systems,
    Some(json!({"system_ids": [lone_id]})),
  )
  .await;
  assert_eq!(status, StatusCode::OK);

  let (status, body) = send(
    &app,
    Method::POST,
    &format!("{INTERNAL}/systems/deletion_request"),
    Some(json!({"system_ids": [lone_id]})),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["deleted"], 1);

  let (_, body) = send(&app, Method::GET, &systems, None).await;
  assert_eq!(body["meta"]["count"], 0);
}
