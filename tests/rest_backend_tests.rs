//! REST backend behavior against a mocked HTTP server
//!
//! Covers the error mapping the coordinator relies on: 409 → Conflict,
//! transport failure / timeout → Connectivity, and the header/route shape
//! of the PostgREST-style interface.

use chrono::Utc;
use std::time::Duration;
use taskgraph_engine::error::EngineError;
use taskgraph_engine::sync::wire::WorkspaceRow;
use taskgraph_engine::sync::{RemoteBackend, RestBackend};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn workspace_row(id: &str) -> WorkspaceRow {
    let now = Utc::now();
    WorkspaceRow {
        id: id.to_string(),
        name: "W1".to_string(),
        description: None,
        created_at: now,
        updated_at: now,
        deleted: false,
    }
}

#[tokio::test]
async fn test_fetch_deserializes_rows() {
    let server = MockServer::start().await;
    let now = Utc::now();
    Mock::given(method("GET"))
        .and(path("/workspaces"))
        .and(header("apikey", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
            "id": "ws-1",
            "name": "Remote WS",
            "description": "from the backend",
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339(),
            "deleted": false
        }])))
        .mount(&server)
        .await;

    let backend = RestBackend::new(&server.uri(), "secret", Duration::from_secs(5)).unwrap();
    let rows = backend.fetch_workspaces().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, "ws-1");
    assert_eq!(rows[0].name, "Remote WS");
}

#[tokio::test]
async fn test_insert_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/workspaces"))
        .and(header("apikey", "secret"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let backend = RestBackend::new(&server.uri(), "secret", Duration::from_secs(5)).unwrap();
    backend.insert_workspace(&workspace_row("ws-1")).await.unwrap();
}

#[tokio::test]
async fn test_insert_conflict_maps_to_conflict_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/workspaces"))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;

    let backend = RestBackend::new(&server.uri(), "secret", Duration::from_secs(5)).unwrap();
    let res = backend.insert_workspace(&workspace_row("ws-1")).await;
    assert!(matches!(res, Err(EngineError::Conflict(_))));
}

#[tokio::test]
async fn test_insert_server_error_is_not_connectivity() {
    // A 4xx on a single record must not look like an unreachable backend,
    // otherwise one bad record would abort the whole pass.
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/workspaces"))
        .respond_with(ResponseTemplate::new(422))
        .mount(&server)
        .await;

    let backend = RestBackend::new(&server.uri(), "secret", Duration::from_secs(5)).unwrap();
    let res = backend.insert_workspace(&workspace_row("ws-1")).await;
    match res {
        Err(e) => assert!(!e.is_connectivity(), "422 must not abort the pass"),
        Ok(()) => panic!("insert should have failed"),
    }
}

#[tokio::test]
async fn test_unreachable_backend_is_connectivity() {
    // Port 1: nothing listening
    let backend =
        RestBackend::new("http://127.0.0.1:1", "secret", Duration::from_secs(1)).unwrap();
    let res = backend.fetch_workspaces().await;
    assert!(matches!(res, Err(EngineError::Connectivity(_))));
}

#[tokio::test]
async fn test_timeout_is_connectivity() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/workspaces"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!([]))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let backend = RestBackend::new(&server.uri(), "secret", Duration::from_millis(200)).unwrap();
    let res = backend.fetch_workspaces().await;
    assert!(matches!(res, Err(EngineError::Connectivity(_))));
}

#[tokio::test]
async fn test_fetch_server_error_is_connectivity() {
    // A failed table fetch means the pull phase cannot proceed at all
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/workspaces"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let backend = RestBackend::new(&server.uri(), "secret", Duration::from_secs(5)).unwrap();
    let res = backend.fetch_workspaces().await;
    assert!(matches!(res, Err(EngineError::Connectivity(_))));
}

#[tokio::test]
async fn test_update_targets_row_by_id_filter() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/tasks"))
        .and(query_param("id", "eq.t-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let backend = RestBackend::new(&server.uri(), "secret", Duration::from_secs(5)).unwrap();
    let now = Utc::now();
    let row = taskgraph_engine::sync::wire::TaskRow {
        id: "t-1".to_string(),
        title: "T1".to_string(),
        description: None,
        status: taskgraph_engine::store::TaskStatus::Done,
        priority: 1,
        project_id: "p-1".to_string(),
        workstream_id: None,
        created_at: now,
        updated_at: now,
        deleted: false,
    };
    backend.update_task("t-1", &row).await.unwrap();
}
