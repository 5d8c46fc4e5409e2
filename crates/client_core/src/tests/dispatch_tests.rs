use super::*;
use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use shared::{
    domain::{CreatureId, Profile},
    protocol::{ListQuery, LoginRequest, SortKey, SortOrder},
};
use std::collections::HashMap;
use tokio::{net::TcpListener, sync::Mutex};

use crate::{
    authority::{HttpAuthority, RemoteAuthority},
    catalog::{HttpCatalog, RemoteCatalog},
    error::{AuthError, CatalogError},
};

#[derive(Debug, Clone)]
struct RecordedRequest {
    route: &'static str,
    authorization: Option<String>,
    params: HashMap<String, String>,
}

#[derive(Clone, Default)]
struct ServerState {
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl ServerState {
    async fn record(
        &self,
        route: &'static str,
        headers: &HeaderMap,
        params: HashMap<String, String>,
    ) {
        let authorization = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        self.requests.lock().await.push(RecordedRequest {
            route,
            authorization,
            params,
        });
    }

    async fn last(&self) -> RecordedRequest {
        self.requests
            .lock()
            .await
            .last()
            .cloned()
            .expect("at least one request")
    }
}

async fn handle_login(Json(req): Json<LoginRequest>) -> (StatusCode, Json<Value>) {
    match (req.username.as_str(), req.password.as_str()) {
        ("ash", "pikapika") => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "token": "good-token",
                "user": {"displayName": "Ash"}
            })),
        ),
        ("gary", _) => (
            StatusCode::OK,
            Json(json!({"success": false, "error": "Account locked"})),
        ),
        ("broken", _) => (StatusCode::OK, Json(json!({"success": true}))),
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"success": false, "error": "Invalid credentials"})),
        ),
    }
}

async fn handle_verify(
    State(state): State<ServerState>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    state.record("verify", &headers, HashMap::new()).await;
    let authorized = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        == Some("Bearer good-token");
    if authorized {
        (StatusCode::OK, Json(json!({"success": true})))
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"success": false, "error": "Token expired"})),
        )
    }
}

async fn handle_logout(State(state): State<ServerState>, headers: HeaderMap) -> Json<Value> {
    state.record("logout", &headers, HashMap::new()).await;
    Json(json!({"success": true}))
}

fn page_json(names: &[(i64, &str)]) -> Value {
    let results: Vec<Value> = names
        .iter()
        .map(|(id, name)| json!({"id": id, "name": name, "number": id, "types": ["electric"]}))
        .collect();
    json!({
        "results": results,
        "pagination": {
            "total": 46,
            "limit": 21,
            "offset": 0,
            "hasNext": true,
            "hasPrev": false
        }
    })
}

async fn handle_list(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    let boom = params.get("search").map(String::as_str) == Some("boom");
    state.record("list", &headers, params).await;
    if boom {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"message": "search backend unavailable"})),
        );
    }
    (StatusCode::OK, Json(page_json(&[(25, "pikachu"), (26, "raichu")])))
}

async fn handle_lookup(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    state.record("lookup", &headers, params).await;
    Json(page_json(&[(25, "pikachu")]))
}

async fn handle_detail(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> (StatusCode, Json<Value>) {
    state.record("detail", &headers, HashMap::new()).await;
    if id != 25 {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Creature not found"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "id": 25,
            "name": "pikachu",
            "number": 25,
            "types": ["electric"],
            "description": "Stores electricity in its cheeks.",
            "height": 4,
            "weight": 60,
            "abilities": ["static"],
            "stats": [{"name": "speed", "value": 90}]
        })),
    )
}

async fn spawn_catalog_server() -> Result<(String, ServerState)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = ServerState::default();
    let app = Router::new()
        .route("/api/auth/login", post(handle_login))
        .route("/api/auth/verify", post(handle_verify))
        .route("/api/auth/logout", post(handle_logout))
        .route("/api/creatures", get(handle_list))
        .route("/api/creatures/lookup", get(handle_lookup))
        .route("/api/creatures/:id", get(handle_detail))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}/api"), state))
}

fn clients(server_url: &str, slot: &CredentialSlot) -> (HttpAuthority, HttpCatalog) {
    let dispatcher = RequestDispatcher::new(server_url, slot.clone()).expect("dispatcher");
    (
        HttpAuthority::new(dispatcher.clone()),
        HttpCatalog::new(dispatcher),
    )
}

#[test]
fn endpoint_keeps_base_path() {
    let dispatcher =
        RequestDispatcher::new("http://catalog.local/api", CredentialSlot::new()).expect("url");
    assert_eq!(
        dispatcher.endpoint("creatures/lookup").expect("join").as_str(),
        "http://catalog.local/api/creatures/lookup"
    );
    assert_eq!(
        dispatcher.endpoint("/auth/login").expect("join").as_str(),
        "http://catalog.local/api/auth/login"
    );
}

#[test]
fn rejects_unparseable_base_url() {
    assert!(matches!(
        RequestDispatcher::new("not a url", CredentialSlot::new()),
        Err(DispatchError::InvalidUrl(_))
    ));
}

#[tokio::test]
async fn login_returns_credential_and_profile() {
    let (server_url, _state) = spawn_catalog_server().await.expect("spawn server");
    let (authority, _) = clients(&server_url, &CredentialSlot::new());

    let grant = authority.login("ash", "pikapika").await.expect("login");
    assert_eq!(grant.credential, "good-token");
    assert_eq!(grant.profile, Profile::new("Ash"));
}

#[tokio::test]
async fn login_rejection_carries_server_message() {
    let (server_url, _state) = spawn_catalog_server().await.expect("spawn server");
    let (authority, _) = clients(&server_url, &CredentialSlot::new());

    assert_eq!(
        authority.login("ash", "wrong").await,
        Err(AuthError::Rejected("Invalid credentials".to_string()))
    );
    assert_eq!(
        authority.login("gary", "anything").await,
        Err(AuthError::Rejected("Account locked".to_string()))
    );
}

#[tokio::test]
async fn login_reply_without_token_is_a_transport_failure() {
    let (server_url, _state) = spawn_catalog_server().await.expect("spawn server");
    let (authority, _) = clients(&server_url, &CredentialSlot::new());

    assert!(matches!(
        authority.login("broken", "x").await,
        Err(AuthError::Transport(_))
    ));
}

#[tokio::test]
async fn verify_presents_explicit_bearer_credential() {
    let (server_url, state) = spawn_catalog_server().await.expect("spawn server");
    let (authority, _) = clients(&server_url, &CredentialSlot::new());

    authority.verify("good-token").await.expect("verify");
    assert_eq!(
        state.last().await.authorization.as_deref(),
        Some("Bearer good-token")
    );

    assert_eq!(
        authority.verify("stale-token").await,
        Err(AuthError::Rejected("Token expired".to_string()))
    );
}

#[tokio::test]
async fn logout_presents_the_credential_being_revoked() {
    let (server_url, state) = spawn_catalog_server().await.expect("spawn server");
    let (authority, _) = clients(&server_url, &CredentialSlot::new());

    authority.logout("good-token").await.expect("logout");
    let last = state.last().await;
    assert_eq!(last.route, "logout");
    assert_eq!(last.authorization.as_deref(), Some("Bearer good-token"));
}

#[tokio::test]
async fn list_sends_camel_case_params_and_slot_credential() {
    let (server_url, state) = spawn_catalog_server().await.expect("spawn server");
    let slot = CredentialSlot::new();
    slot.set(Some("good-token".to_string()));
    let (_, catalog) = clients(&server_url, &slot);

    let page = catalog
        .list(&ListQuery {
            limit: 21,
            offset: 42,
            search: Some("pika,char".to_string()),
            sort_by: SortKey::Name,
            sort_order: SortOrder::Asc,
        })
        .await
        .expect("list");
    assert_eq!(page.results.len(), 2);
    assert_eq!(page.pagination.total, 46);
    assert!(page.pagination.has_next);

    let last = state.last().await;
    assert_eq!(last.route, "list");
    assert_eq!(last.authorization.as_deref(), Some("Bearer good-token"));
    assert_eq!(last.params.get("limit").map(String::as_str), Some("21"));
    assert_eq!(last.params.get("offset").map(String::as_str), Some("42"));
    assert_eq!(last.params.get("search").map(String::as_str), Some("pika,char"));
    assert_eq!(last.params.get("sortBy").map(String::as_str), Some("name"));
    assert_eq!(last.params.get("sortOrder").map(String::as_str), Some("asc"));
}

#[tokio::test]
async fn requests_without_credential_carry_no_authorization() {
    let (server_url, state) = spawn_catalog_server().await.expect("spawn server");
    let (_, catalog) = clients(&server_url, &CredentialSlot::new());

    catalog
        .list(&ListQuery {
            limit: 21,
            offset: 0,
            search: None,
            sort_by: SortKey::Id,
            sort_order: SortOrder::Asc,
        })
        .await
        .expect("list");

    let last = state.last().await;
    assert_eq!(last.authorization, None);
    assert!(!last.params.contains_key("search"));
}

#[tokio::test]
async fn lookup_sends_comma_joined_ids() {
    let (server_url, state) = spawn_catalog_server().await.expect("spawn server");
    let (_, catalog) = clients(&server_url, &CredentialSlot::new());

    let page = catalog.lookup_by_identifiers("007,25").await.expect("lookup");
    assert_eq!(page.results[0].name, "pikachu");

    let last = state.last().await;
    assert_eq!(last.route, "lookup");
    assert_eq!(last.params.get("ids").map(String::as_str), Some("007,25"));
}

#[tokio::test]
async fn detail_decodes_flattened_summary() {
    let (server_url, _state) = spawn_catalog_server().await.expect("spawn server");
    let (_, catalog) = clients(&server_url, &CredentialSlot::new());

    let detail = catalog
        .get_by_identifier(CreatureId(25))
        .await
        .expect("detail");
    assert_eq!(detail.summary.name, "pikachu");
    assert_eq!(detail.abilities, vec!["static".to_string()]);
    assert_eq!(detail.stats[0].value, 90);

    assert_eq!(
        catalog.get_by_identifier(CreatureId(9999)).await,
        Err(CatalogError::Rejected {
            status: 404,
            message: Some("Creature not found".to_string()),
        })
    );
}

#[tokio::test]
async fn server_error_message_is_preserved() {
    let (server_url, _state) = spawn_catalog_server().await.expect("spawn server");
    let (_, catalog) = clients(&server_url, &CredentialSlot::new());

    let err = catalog
        .list(&ListQuery {
            limit: 21,
            offset: 0,
            search: Some("boom".to_string()),
            sort_by: SortKey::Name,
            sort_order: SortOrder::Asc,
        })
        .await
        .expect_err("server error");
    assert_eq!(err.user_message(), "search backend unavailable");
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let (authority, catalog) = clients(&format!("http://{addr}"), &CredentialSlot::new());

    assert!(matches!(
        authority.login("ash", "pikapika").await,
        Err(AuthError::Transport(_))
    ));
    let err = catalog
        .lookup_by_identifiers("25")
        .await
        .expect_err("unreachable");
    assert!(matches!(err, CatalogError::Transport(_)));
    assert_eq!(err.user_message(), crate::error::CATALOG_ERROR_FALLBACK);
}
