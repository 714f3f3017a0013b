use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use smartd_connector::memory::{MemoryConnectorFactory, MemoryDataset};
use smartd_connector::GraphConnector;

use super::build_router;
use crate::startup::build_app_state;

const URI: &str = "bolt://graph.test:7687";
const OTHER_URI: &str = "neo4j://other.test:7687";
const FRONTEND: &str = "http://localhost:3000";

struct Harness {
    app: Router,
    config: smartd_core::Config,
    factory: Arc<MemoryConnectorFactory>,
    tmp: TempDir,
}

struct Reply {
    status: StatusCode,
    cookie: Option<String>,
    body: Value,
}

fn people() -> MemoryDataset {
    MemoryDataset::new()
        .with_node(1, "PERSON", json!({"name": "Alice", "age": 30}))
        .with_node(2, "PERSON", json!({"name": "Bob", "age": 25}))
        .with_node(3, "KNOWLEDGE", json!({"title": "Graph Database", "type": "Tutorial"}))
        .with_relationship(10, 1, 2, "FRIEND", json!({"since": "2020"}))
        .with_relationship(11, 1, 3, "LIKES", json!({"frequency": "Monthly"}))
        .with_relationship(12, 2, 3, "LIKES", json!({}))
}

fn harness() -> Harness {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = smartd_core::Config::for_profile("");
    config.storage.data_dir = tmp.path().to_path_buf();
    config.server.cors_origin = FRONTEND.to_string();

    let factory = Arc::new(MemoryConnectorFactory::new());
    factory.add_server(URI, "neo4j", "secret", people());
    factory.add_server(
        OTHER_URI,
        "neo4j",
        "other",
        MemoryDataset::new().with_node(7, "CITY", json!({"name": "Berlin"})),
    );

    let state = build_app_state(&config, factory.clone()).unwrap();
    Harness {
        app: build_router(state),
        config,
        factory,
        tmp,
    }
}

async fn send(app: &Router, method: &str, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Reply {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(c) = cookie {
        req = req.header(header::COOKIE, c);
    }
    let req = match body {
        Some(b) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let cookie = resp
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_string);
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    Reply { status, cookie, body }
}

fn signup_body(username: &str, server_password: &str) -> Value {
    json!({
        "username": username,
        "password": "password123",
        "fullUrl": URI,
        "serverUsername": "neo4j",
        "serverPassword": server_password,
    })
}

/// Sign up `alice` against the reachable server and return the session cookie.
async fn signed_up(h: &Harness) -> String {
    let reply = send(&h.app, "POST", "/test_neo4j_and_signup/", None, Some(signup_body("alice", "secret"))).await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
    reply.cookie.unwrap()
}

#[tokio::test]
async fn root_redirects_to_home() {
    let h = harness();
    let req = Request::builder().uri("/").body(Body::empty()).unwrap();
    let resp = h.app.clone().oneshot(req).await.unwrap();
    assert!(resp.status().is_redirection());
    assert_eq!(resp.headers()[header::LOCATION], "/home/");

    let home = send(&h.app, "GET", "/home/", None, None).await;
    assert_eq!(home.status, StatusCode::OK);
    assert_eq!(home.body["success"], true);
    assert!(home.body["user"].is_null());
}

#[tokio::test]
async fn signup_tests_connection_then_logs_in() {
    let h = harness();
    let reply = send(&h.app, "POST", "/test_neo4j_and_signup/", None, Some(signup_body("alice", "secret"))).await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.body["success"], true);
    assert_eq!(reply.body["database"], URI);
    let cookie = reply.cookie.unwrap();
    assert!(cookie.starts_with("sessionid="));

    let dbs = send(&h.app, "GET", "/get_user_databases/", Some(&cookie), None).await;
    assert_eq!(dbs.status, StatusCode::OK);
    assert_eq!(dbs.body["databases"][0]["url"], URI);
    assert_eq!(dbs.body["databases"][0]["password"], "********");

    let page = send(&h.app, "GET", "/playground/", Some(&cookie), None).await;
    assert_eq!(page.body["user"], "alice");
    assert_eq!(page.body["selected"], URI);

    let home = send(&h.app, "GET", "/home/", Some(&cookie), None).await;
    assert_eq!(home.body["user"], "alice");
}

#[tokio::test]
async fn signup_with_failing_neo4j_creates_nothing() {
    let h = harness();
    let reply = send(&h.app, "POST", "/test_neo4j_and_signup/", None, Some(signup_body("alice", "wrong"))).await;
    assert_eq!(reply.status, StatusCode::BAD_GATEWAY);
    assert_eq!(reply.body["success"], false);
    assert!(reply.body["error"].as_str().unwrap().contains("authentication failure"));
    assert!(reply.cookie.is_none());
    assert!(h.factory.issued()[0].is_closed().await);

    let login = send(
        &h.app,
        "POST",
        "/test_neo4j_and_login/",
        None,
        Some(json!({"username": "alice", "password": "password123"})),
    )
    .await;
    assert_eq!(login.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn signup_keeps_no_account_when_database_cannot_be_saved() {
    let h = harness();
    let databases = h.tmp.path().join("databases.json");
    std::fs::write(&databases, "not json").unwrap();

    let reply = send(&h.app, "POST", "/test_neo4j_and_signup/", None, Some(signup_body("alice", "secret"))).await;
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(reply.body["success"], false);
    assert!(reply.cookie.is_none());
    assert!(h.factory.issued()[0].is_closed().await);

    // The username is free again once the store is readable.
    std::fs::remove_file(&databases).unwrap();
    signed_up(&h).await;
}

#[tokio::test]
async fn signup_validates_input_before_connecting() {
    let h = harness();

    let mut body = signup_body("alice", "secret");
    body["password"] = json!("short");
    let reply = send(&h.app, "POST", "/test_neo4j_and_signup/", None, Some(body)).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let mut body = signup_body("alice", "secret");
    body["fullUrl"] = json!("http://graph.test:7474");
    let reply = send(&h.app, "POST", "/test_neo4j_and_signup/", None, Some(body)).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["success"], false);

    let reply = send(&h.app, "POST", "/test_neo4j_and_signup/", None, Some(json!({"username": "alice"}))).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["success"], false);

    assert!(h.factory.issued().is_empty());
}

#[tokio::test]
async fn duplicate_username_conflicts() {
    let h = harness();
    signed_up(&h).await;
    let reply = send(&h.app, "POST", "/test_neo4j_and_signup/", None, Some(signup_body("alice", "secret"))).await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert_eq!(reply.body["success"], false);
}

#[tokio::test]
async fn login_retests_latest_database() {
    let h = harness();
    signed_up(&h).await;

    let reply = send(
        &h.app,
        "POST",
        "/test_neo4j_and_login/",
        None,
        Some(json!({"username": "alice", "password": "password123"})),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["success"], true);
    assert_eq!(reply.body["neo4j"]["success"], true);
    assert_eq!(reply.body["neo4j"]["message"], "Connection successful");
    assert_eq!(reply.body["database"], URI);

    let cookie = reply.cookie.unwrap();
    let info = send(&h.app, "GET", "/get_database_info/", Some(&cookie), None).await;
    assert_eq!(info.status, StatusCode::OK);
    assert_eq!(info.body["labels"], json!(["KNOWLEDGE", "PERSON"]));
    assert_eq!(info.body["relationship_types"], json!(["FRIEND", "LIKES"]));
}

#[tokio::test]
async fn login_succeeds_when_database_is_down() {
    let h = harness();
    signed_up(&h).await;
    // Password rotated on the server since signup.
    h.factory.add_server(URI, "neo4j", "rotated", people());

    let reply = send(
        &h.app,
        "POST",
        "/test_neo4j_and_login/",
        None,
        Some(json!({"username": "alice", "password": "password123"})),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["success"], true);
    assert_eq!(reply.body["neo4j"]["success"], false);
    assert!(reply.body.get("database").is_none());

    let cookie = reply.cookie.unwrap();
    let info = send(&h.app, "GET", "/get_database_info/", Some(&cookie), None).await;
    assert_eq!(info.status, StatusCode::BAD_REQUEST);
    assert_eq!(info.body["error"], "No database selected.");
}

#[tokio::test]
async fn login_succeeds_when_saved_credentials_are_unreadable() {
    let h = harness();
    signed_up(&h).await;
    // A new key is generated on restart, so the saved password no longer decrypts.
    std::fs::remove_file(h.tmp.path().join(".conn_key")).unwrap();
    let app = build_router(build_app_state(&h.config, h.factory.clone()).unwrap());

    let reply = send(
        &app,
        "POST",
        "/test_neo4j_and_login/",
        None,
        Some(json!({"username": "alice", "password": "password123"})),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    assert_eq!(reply.body["success"], true);
    assert_eq!(reply.body["neo4j"]["success"], false);
    assert_eq!(reply.body["neo4j"]["url"], URI);
    assert!(reply.body.get("database").is_none());

    let cookie = reply.cookie.unwrap();
    let info = send(&app, "GET", "/get_database_info/", Some(&cookie), None).await;
    assert_eq!(info.status, StatusCode::BAD_REQUEST);

    let health = send(&app, "GET", "/health", None, None).await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.body["saved_databases"], 1);
    assert_eq!(health.body["active_sessions"], 1);
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let h = harness();
    signed_up(&h).await;
    let reply = send(
        &h.app,
        "POST",
        "/test_neo4j_and_login/",
        None,
        Some(json!({"username": "alice", "password": "nope-nope"})),
    )
    .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.body, json!({"success": false, "error": "Invalid username or password."}));
}

#[tokio::test]
async fn session_routes_require_login() {
    let h = harness();
    for (method, uri) in [
        ("GET", "/playground/"),
        ("GET", "/get_user_databases/"),
        ("GET", "/get_database_info/"),
    ] {
        let reply = send(&h.app, method, uri, None, None).await;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED, "{}", uri);
        assert_eq!(reply.body["success"], false);
    }

    let reply = send(
        &h.app,
        "POST",
        "/get_nodeEntities/",
        Some("sessionid=forged"),
        Some(json!({"label": "PERSON"})),
    )
    .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn entity_listings_pair_names_with_entities() {
    let h = harness();
    let cookie = signed_up(&h).await;

    let nodes = send(&h.app, "POST", "/get_nodeEntities/", Some(&cookie), Some(json!({"label": "PERSON"}))).await;
    assert_eq!(nodes.status, StatusCode::OK);
    assert_eq!(nodes.body["nodeEntities"][0], json!(["Alice", "Bob"]));
    assert_eq!(nodes.body["nodeEntities"][1][0]["nodeLabel"], "PERSON");
    assert_eq!(nodes.body["nodeEntities"][1][1]["properties"]["age"], 25);

    let rels = send(
        &h.app,
        "POST",
        "/get_relationshipEntities/",
        Some(&cookie),
        Some(json!({"type": "LIKES"})),
    )
    .await;
    assert_eq!(rels.status, StatusCode::OK);
    assert_eq!(
        rels.body["relationshipEntities"][0],
        json!([["Alice", "Graph Database"], ["Bob", "Graph Database"]])
    );
    assert_eq!(rels.body["relationshipEntities"][1][0]["type"], "LIKES");
    assert_eq!(rels.body["relationshipEntities"][1][0]["startNode"], 1);
    assert_eq!(rels.body["relationshipEntities"][1][0]["endNode"], 3);

    let bad = send(&h.app, "POST", "/get_nodeEntities/", Some(&cookie), Some(json!({"label": ""}))).await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn add_select_and_delete_databases() {
    let h = harness();
    let cookie = signed_up(&h).await;
    let add = |password: &str| {
        json!({"fullUrl": OTHER_URI, "serverUsername": "neo4j", "serverPassword": password})
    };

    let failed = send(&h.app, "POST", "/add_database/", Some(&cookie), Some(add("wrong"))).await;
    assert_eq!(failed.status, StatusCode::BAD_GATEWAY);

    let added = send(&h.app, "POST", "/add_database", Some(&cookie), Some(add("other"))).await;
    assert_eq!(added.status, StatusCode::CREATED);
    assert_eq!(added.body["database"]["url"], OTHER_URI);

    let again = send(&h.app, "POST", "/add_database/", Some(&cookie), Some(add("other"))).await;
    assert_eq!(again.status, StatusCode::CONFLICT);

    let selected = send(
        &h.app,
        "POST",
        "/select_database/",
        Some(&cookie),
        Some(json!({"selectedUrl": OTHER_URI})),
    )
    .await;
    assert_eq!(selected.status, StatusCode::OK);
    assert_eq!(selected.body["url"], OTHER_URI);
    // The signup connector was replaced and closed.
    assert!(h.factory.issued()[0].is_closed().await);
    let live = h.factory.issued().last().cloned().unwrap();
    assert!(!live.is_closed().await);

    let cities = send(&h.app, "POST", "/get_nodeEntities/", Some(&cookie), Some(json!({"label": "CITY"}))).await;
    assert_eq!(cities.body["nodeEntities"][0], json!(["Berlin"]));

    let deleted = send(&h.app, "POST", "/delete_database/", Some(&cookie), Some(json!({"url": OTHER_URI}))).await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(deleted.body["success"], true);
    assert!(live.is_closed().await);

    let info = send(&h.app, "GET", "/get_database_info/", Some(&cookie), None).await;
    assert_eq!(info.status, StatusCode::BAD_REQUEST);

    let last = send(&h.app, "POST", "/delete_database/", Some(&cookie), Some(json!({"url": URI}))).await;
    assert_eq!(last.status, StatusCode::BAD_REQUEST);
    assert_eq!(last.body["error"], "You must have at least one database.");

    let missing = send(&h.app, "POST", "/delete_database/", Some(&cookie), Some(json!({"url": OTHER_URI}))).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    let unknown = send(
        &h.app,
        "POST",
        "/select_database/",
        Some(&cookie),
        Some(json!({"selectedUrl": "bolt://nowhere.test:7687"})),
    )
    .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn databases_are_private_to_their_owner() {
    let h = harness();
    signed_up(&h).await;

    let mut bob = signup_body("bob", "other");
    bob["fullUrl"] = json!(OTHER_URI);
    let reply = send(&h.app, "POST", "/test_neo4j_and_signup/", None, Some(bob)).await;
    assert_eq!(reply.status, StatusCode::CREATED);
    let bob_cookie = reply.cookie.unwrap();

    let dbs = send(&h.app, "GET", "/get_user_databases/", Some(&bob_cookie), None).await;
    assert_eq!(dbs.body["databases"].as_array().unwrap().len(), 1);
    assert_eq!(dbs.body["databases"][0]["url"], OTHER_URI);

    let steal = send(
        &h.app,
        "POST",
        "/select_database/",
        Some(&bob_cookie),
        Some(json!({"selectedUrl": URI})),
    )
    .await;
    assert_eq!(steal.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn logout_ends_session_and_closes_connector() {
    let h = harness();
    let cookie = signed_up(&h).await;

    let reply = send(&h.app, "POST", "/logout/", Some(&cookie), None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.cookie.as_deref(), Some("sessionid="));
    assert!(h.factory.issued()[0].is_closed().await);

    let after = send(&h.app, "GET", "/get_user_databases/", Some(&cookie), None).await;
    assert_eq!(after.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn active_sessions_get_a_fresh_cookie() {
    let h = harness();
    let cookie = signed_up(&h).await;

    let req = Request::builder()
        .uri("/get_user_databases/")
        .header(header::COOKIE, cookie.as_str())
        .body(Body::empty())
        .unwrap();
    let resp = h.app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let set_cookie = resp.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(set_cookie.starts_with(&format!("{};", cookie)), "{}", set_cookie);
    assert!(set_cookie.contains("Max-Age="));

    let anonymous = send(&h.app, "GET", "/home/", None, None).await;
    assert!(anonymous.cookie.is_none());
    let forged = send(&h.app, "GET", "/home/", Some("sessionid=forged"), None).await;
    assert!(forged.cookie.is_none());
}

#[tokio::test]
async fn cors_allows_credentials_for_frontend() {
    let h = harness();
    let req = Request::builder()
        .uri("/home/")
        .header(header::ORIGIN, FRONTEND)
        .body(Body::empty())
        .unwrap();
    let resp = h.app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], FRONTEND);
    assert_eq!(resp.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
}

#[tokio::test]
async fn health_and_unknown_routes() {
    let h = harness();
    let health = send(&h.app, "GET", "/health", None, None).await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.body["status"], "ok");
    assert_eq!(health.body["users"], 0);
    assert!(health.body["config"]["neo4j"].get("uri").is_none());

    let missing = send(&h.app, "GET", "/admin/", None, None).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.body["success"], false);
}
