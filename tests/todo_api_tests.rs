//! HTTP tests for the todo application
//!
//! The assembled router runs on the in-memory store, with two users:
//! `alice-token` -> alice and `bob-token` -> bob.

use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderValue, Method, StatusCode};
use axum_test::{TestRequest, TestServer};
use ctrlkit::prelude::*;
use serde_json::{Value, json};
use std::sync::Arc;

const ALICE: &str = "alice-token";
const BOB: &str = "bob-token";

fn config() -> AppConfig {
    let mut config = AppConfig::default();
    config
        .auth
        .tokens
        .insert(ALICE.to_string(), "alice".to_string());
    config.auth.tokens.insert(BOB.to_string(), "bob".to_string());
    config
}

fn create_test_server_with(config: AppConfig) -> (TestServer, Arc<dyn DocumentStore>) {
    let store: Arc<dyn DocumentStore> = Arc::new(InMemoryStore::new());
    let app = build_todo_app(&config, store.clone()).expect("Failed to build app");
    let server = TestServer::new(app).expect("Failed to create test server");
    (server, store)
}

fn create_test_server() -> (TestServer, Arc<dyn DocumentStore>) {
    create_test_server_with(config())
}

fn as_user(request: TestRequest, token: &str) -> TestRequest {
    let value = HeaderValue::from_str(&format!("Bearer {}", token)).unwrap();
    request.add_header(AUTHORIZATION, value)
}

async fn create_todo(server: &TestServer, token: &str, body: Value) -> Value {
    let response = as_user(server.post("/api/todos"), token).json(&body).await;
    response.assert_status(StatusCode::CREATED);
    response.json()
}

// =============================================================================
// Health and unknown paths
// =============================================================================

mod health_tests {
    use super::*;

    #[tokio::test]
    async fn test_health_needs_no_session() {
        let (server, _) = create_test_server();

        let response = server.get("/health").await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "ctrlkit");
    }

    #[tokio::test]
    async fn test_head_is_answered_by_get_routes() {
        let (server, _) = create_test_server();

        server.method(Method::HEAD, "/health").await.assert_status_ok();
    }

    #[tokio::test]
    async fn test_path_outside_every_base_is_404_json() {
        let (server, _) = create_test_server();

        let response = server.get("/api/unknown").await;
        response.assert_status(StatusCode::NOT_FOUND);
        let body: Value = response.json();
        assert_eq!(body["message"], "Not found");
    }

    #[tokio::test]
    async fn test_prefix_lookalike_is_not_under_base() {
        let (server, _) = create_test_server();

        // "/api/todosx" is not below "/api/todos", so no session is asked for
        let response = server.get("/api/todosx").await;
        response.assert_status(StatusCode::NOT_FOUND);
    }
}

// =============================================================================
// Authentication
// =============================================================================

mod auth_tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_token_is_401() {
        let (server, store) = create_test_server();

        let response = server.post("/api/todos").json(&json!({"title": "a"})).await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        let body: Value = response.json();
        assert_eq!(body, json!({"message": "Unauthorized"}));

        let count = store.count("todos", &Document::new(), None).await.unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_unknown_token_is_401_on_every_route() {
        let (server, _) = create_test_server();

        for path in ["/api/todos", "/api/todos/x", "/api/tags", "/api/todos/nowhere/else"] {
            let response = as_user(server.get(path), "wrong").await;
            response.assert_status(StatusCode::UNAUTHORIZED);
        }
    }
}

// =============================================================================
// Todo CRUD
// =============================================================================

mod todo_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_stamps_id_timestamps_and_creator() {
        let (server, _) = create_test_server();

        let todo = create_todo(&server, ALICE, json!({"title": "write tests"})).await;
        assert!(!todo["id"].as_str().unwrap().is_empty());
        assert_eq!(todo["title"], "write tests");
        assert_eq!(todo["completed"], false);
        assert_eq!(todo["creatorUserId"], "alice");
        assert!(todo["createdAt"].is_string());
        assert_eq!(todo["createdAt"], todo["updatedAt"]);
    }

    #[tokio::test]
    async fn test_get_update_and_toggle() {
        let (server, _) = create_test_server();
        let todo = create_todo(&server, ALICE, json!({"title": "a"})).await;
        let path = format!("/api/todos/{}", todo["id"].as_str().unwrap());

        let response = as_user(server.get(&path), ALICE).await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["title"], "a");

        let response = as_user(server.put(&path), ALICE)
            .json(&json!({"title": "b", "description": "more"}))
            .await;
        response.assert_status_ok();
        let updated: Value = response.json();
        assert_eq!(updated["title"], "b");
        assert_eq!(updated["description"], "more");
        assert_eq!(updated["updaterUserId"], "alice");
        assert_eq!(updated["createdAt"], todo["createdAt"]);

        let response = as_user(server.post(&format!("{}/toggle", path)), ALICE).await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["completed"], true);
    }

    #[tokio::test]
    async fn test_missing_todo_is_empty_404() {
        let (server, _) = create_test_server();

        let response = as_user(server.get("/api/todos/does-not-exist"), ALICE).await;
        response.assert_status(StatusCode::NOT_FOUND);
        assert!(response.as_bytes().is_empty());

        let response = as_user(server.put("/api/todos/does-not-exist"), ALICE)
            .json(&json!({"title": "x"}))
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_input_is_400_with_message() {
        let (server, _) = create_test_server();

        let response = as_user(server.post("/api/todos"), ALICE)
            .json(&json!({"title": "   "}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert!(body["message"].as_str().unwrap().contains("title must not be blank"));

        let response = as_user(server.post("/api/todos"), ALICE)
            .text("{not json")
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_soft_delete_hides_but_keeps() {
        let (server, store) = create_test_server();
        let todo = create_todo(&server, ALICE, json!({"title": "a"})).await;
        let path = format!("/api/todos/{}", todo["id"].as_str().unwrap());

        let response = as_user(server.delete(&path), ALICE).await;
        response.assert_status_ok();
        let deleted: Value = response.json();
        assert_eq!(deleted["deleted"], true);
        assert_eq!(deleted["deleterUserId"], "alice");

        as_user(server.get(&path), ALICE)
            .await
            .assert_status(StatusCode::NOT_FOUND);
        let list: Value = as_user(server.get("/api/todos"), ALICE).await.json();
        assert_eq!(list, json!([]));

        let stored = store.count("todos", &Document::new(), None).await.unwrap();
        assert_eq!(stored, 1);
    }

    #[tokio::test]
    async fn test_users_only_see_their_own_todos() {
        let (server, _) = create_test_server();
        let todo = create_todo(&server, ALICE, json!({"title": "private"})).await;
        let path = format!("/api/todos/{}", todo["id"].as_str().unwrap());

        as_user(server.get(&path), BOB)
            .await
            .assert_status(StatusCode::NOT_FOUND);
        as_user(server.delete(&path), BOB)
            .await
            .assert_status(StatusCode::NOT_FOUND);
        let list: Value = as_user(server.get("/api/todos"), BOB).await.json();
        assert_eq!(list, json!([]));

        let list: Value = as_user(server.get("/api/todos"), ALICE).await.json();
        assert_eq!(list.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_filters_by_completed() {
        let (server, _) = create_test_server();
        create_todo(&server, ALICE, json!({"title": "open"})).await;
        create_todo(&server, ALICE, json!({"title": "done", "completed": true})).await;

        let list: Value = as_user(server.get("/api/todos?completed=false"), ALICE)
            .await
            .json();
        assert_eq!(list.as_array().unwrap().len(), 1);
        assert_eq!(list[0]["title"], "open");
    }
}

// =============================================================================
// Pagination
// =============================================================================

mod pagination_tests {
    use super::*;

    async fn seed(server: &TestServer, n: usize) {
        for i in 0..n {
            create_todo(server, ALICE, json!({"title": format!("todo {}", i)})).await;
        }
    }

    #[tokio::test]
    async fn test_page_result_shape_and_newest_first() {
        let (server, _) = create_test_server();
        seed(&server, 3).await;

        let response = as_user(server.get("/api/todos?page=1&pageSize=2"), ALICE).await;
        response.assert_status_ok();
        let page: Value = response.json();
        assert_eq!(page["totalItems"], 3);
        assert_eq!(page["currentPage"], 1);
        assert_eq!(page["pageSize"], 2);
        assert_eq!(page["totalPages"], 2);
        assert_eq!(page["data"][0]["title"], "todo 2");
        assert_eq!(page["data"][1]["title"], "todo 1");

        let page: Value = as_user(server.get("/api/todos?page=2&pageSize=2"), ALICE)
            .await
            .json();
        assert_eq!(page["data"].as_array().unwrap().len(), 1);
        assert_eq!(page["data"][0]["title"], "todo 0");
    }

    #[tokio::test]
    async fn test_page_past_end_is_empty_with_true_totals() {
        let (server, _) = create_test_server();
        seed(&server, 3).await;

        let page: Value = as_user(server.get("/api/todos?page=9999&pageSize=2"), ALICE)
            .await
            .json();
        assert_eq!(page["data"], json!([]));
        assert_eq!(page["totalItems"], 3);
        assert_eq!(page["currentPage"], 9999);
        assert_eq!(page["totalPages"], 2);
    }

    #[tokio::test]
    async fn test_non_positive_values_are_clamped() {
        let (server, _) = create_test_server();
        seed(&server, 2).await;

        let page: Value = as_user(server.get("/api/todos?page=0&pageSize=-5"), ALICE)
            .await
            .json();
        assert_eq!(page["currentPage"], 1);
        assert_eq!(page["pageSize"], 1);
        assert_eq!(page["totalPages"], 2);
    }

    #[tokio::test]
    async fn test_configured_default_page_size() {
        let mut config = config();
        config.pagination.default_page_size = 2;
        let (server, _) = create_test_server_with(config);
        seed(&server, 3).await;

        let page: Value = as_user(server.get("/api/todos?page=1"), ALICE).await.json();
        assert_eq!(page["pageSize"], 2);
        assert_eq!(page["data"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_sort_and_bad_page_value() {
        let (server, _) = create_test_server();
        seed(&server, 3).await;

        let list: Value = as_user(server.get("/api/todos?sort=title:asc"), ALICE)
            .await
            .json();
        assert_eq!(list[0]["title"], "todo 0");

        as_user(server.get("/api/todos?page=abc"), ALICE)
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }
}

// =============================================================================
// Tags
// =============================================================================

mod tag_tests {
    use super::*;

    #[tokio::test]
    async fn test_todo_tags_by_name_are_created_once() {
        let (server, _) = create_test_server();

        let first = create_todo(
            &server,
            ALICE,
            json!({"title": "a", "tags": [{"name": "home"}]}),
        )
        .await;
        let second = create_todo(
            &server,
            ALICE,
            json!({"title": "b", "tags": [{"name": "home"}]}),
        )
        .await;
        assert_eq!(first["tags"], second["tags"]);

        let tags: Value = as_user(server.get("/api/tags"), ALICE).await.json();
        assert_eq!(tags.as_array().unwrap().len(), 1);
        assert_eq!(tags[0]["name"], "home");

        let tag_id = tags[0]["id"].as_str().unwrap();
        let tagged: Value = as_user(server.get(&format!("/api/todos?tag={}", tag_id)), ALICE)
            .await
            .json();
        assert_eq!(tagged.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_named_tag_too_long_is_rejected_like_tag_api() {
        let (server, _) = create_test_server();
        let long = "x".repeat(60);

        as_user(server.post("/api/tags"), ALICE)
            .json(&json!({"name": long}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        as_user(server.post("/api/todos"), ALICE)
            .json(&json!({"title": "a", "tags": [{"name": long}]}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let tags: Value = as_user(server.get("/api/tags"), ALICE).await.json();
        assert_eq!(tags, json!([]));
        let todos: Value = as_user(server.get("/api/todos"), ALICE).await.json();
        assert_eq!(todos, json!([]));
    }

    #[tokio::test]
    async fn test_other_users_tag_id_is_rejected() {
        let (server, _) = create_test_server();
        let response = as_user(server.post("/api/tags"), BOB)
            .json(&json!({"name": "bobs"}))
            .await;
        response.assert_status(StatusCode::CREATED);
        let tag: Value = response.json();

        let response = as_user(server.post("/api/todos"), ALICE)
            .json(&json!({"title": "a", "tags": [{"id": tag["id"]}]}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_bulk_endpoint() {
        let (server, _) = create_test_server();
        let existing: Value = as_user(server.post("/api/tags"), ALICE)
            .json(&json!({"name": "old"}))
            .await
            .json();
        let doomed: Value = as_user(server.post("/api/tags"), ALICE)
            .json(&json!({"name": "doomed"}))
            .await
            .json();

        let response = as_user(server.post("/api/tags/bulk"), ALICE)
            .json(&json!({
                "insert": [
                    {"name": "new", "color": "blue"},
                    {"id": existing["id"], "name": "renamed"}
                ],
                "delete": [doomed["id"]]
            }))
            .await;
        response.assert_status_ok();
        let result: Value = response.json();
        assert_eq!(result["created"].as_array().unwrap().len(), 1);
        assert_eq!(result["created"][0]["color"], "blue");
        assert_eq!(result["updated"][0]["name"], "renamed");
        assert_eq!(result["deleted"], 1);

        let page: Value = as_user(server.get("/api/tags?page=1"), ALICE).await.json();
        assert_eq!(page["totalItems"], 2);
    }

    #[tokio::test]
    async fn test_bulk_failure_rolls_everything_back() {
        let (server, store) = create_test_server();

        let response = as_user(server.post("/api/tags/bulk"), ALICE)
            .json(&json!({
                "insert": [{"name": "kept?"}, {"id": "nope", "name": "x"}]
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(store.count("tags", &Document::new(), None).await.unwrap(), 0);
    }
}

// =============================================================================
// Configuration
// =============================================================================

mod config_tests {
    use super::*;

    #[tokio::test]
    async fn test_custom_base_path() {
        let mut config = config();
        config.api.base_path = "/v2/".to_string();
        let (server, _) = create_test_server_with(config);

        let response = as_user(server.get("/v2/todos"), ALICE).await;
        response.assert_status_ok();
        server
            .get("/api/todos")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_audit_disabled_turns_off_stamping_and_scoping() {
        let mut config = config();
        config.audit.enabled = false;
        let (server, _) = create_test_server_with(config);

        let todo = create_todo(&server, ALICE, json!({"title": "shared"})).await;
        assert!(todo.get("creatorUserId").is_none());

        let list: Value = as_user(server.get("/api/todos"), BOB).await.json();
        assert_eq!(list.as_array().unwrap().len(), 1);
    }
}
