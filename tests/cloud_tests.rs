use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};

use reelscout::{
    db::{
        store::{get_json, KeyValueStore},
        MemoryStore, StoreKey,
    },
    error::AppError,
    models::Movie,
    services::{
        favorites::{FavoritesReconciler, FavoritesState, ToggleOutcome},
        providers::{CloudAccount, CloudFavorites, HttpCloudClient},
        session::SessionManager,
    },
};

const PROJECT: &str = "proj";
const SECRET: &str = "s-1";

/// Fake document-store backend with one account and one favorites collection
#[derive(Default)]
struct FakeCloud {
    documents: Mutex<Vec<Value>>,
    next_id: AtomicUsize,
}

impl FakeCloud {
    fn insert(&self, data: &Value) -> Value {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut document = data.clone();
        document["$id"] = json!(format!("doc-{}", id));
        self.documents.lock().unwrap().push(document.clone());
        document
    }

    fn movie_ids(&self) -> Vec<String> {
        self.documents
            .lock()
            .unwrap()
            .iter()
            .filter_map(|d| d["movieId"].as_str().map(str::to_string))
            .collect()
    }
}

fn check(headers: &HeaderMap) -> Result<(), StatusCode> {
    let project = headers.get("x-project").and_then(|v| v.to_str().ok());
    if project != Some(PROJECT) {
        return Err(StatusCode::BAD_REQUEST);
    }
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let expected = format!("Bearer {}", SECRET);
    if auth != Some(expected.as_str()) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(())
}

async fn create_session(Json(body): Json<Value>) -> impl IntoResponse {
    if body["email"] == "viewer@example.com" && body["password"] == "hunter22" {
        (StatusCode::CREATED, Json(json!({ "secret": SECRET })))
    } else {
        (StatusCode::UNAUTHORIZED, Json(json!({ "message": "bad credentials" })))
    }
}

async fn account(headers: HeaderMap) -> impl IntoResponse {
    match check(&headers) {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "$id": "u1", "email": "viewer@example.com", "name": "Viewer" })),
        ),
        Err(status) => (status, Json(json!({}))),
    }
}

async fn delete_session(headers: HeaderMap) -> StatusCode {
    match check(&headers) {
        Ok(()) => StatusCode::NO_CONTENT,
        Err(status) => status,
    }
}

async fn list_documents(
    State(cloud): State<Arc<FakeCloud>>,
    headers: HeaderMap,
    Query(params): Query<Vec<(String, String)>>,
) -> impl IntoResponse {
    if let Err(status) = check(&headers) {
        return (status, Json(json!({})));
    }

    let user_id = params
        .iter()
        .find(|(key, _)| key == "queries[]")
        .and_then(|(_, query)| serde_json::from_str::<Value>(query).ok())
        .and_then(|query| query["values"][0].as_str().map(str::to_string));

    let documents: Vec<Value> = cloud
        .documents
        .lock()
        .unwrap()
        .iter()
        .filter(|d| d["userId"].as_str() == user_id.as_deref())
        .cloned()
        .collect();

    (
        StatusCode::OK,
        Json(json!({ "total": documents.len(), "documents": documents })),
    )
}

async fn create_document(
    State(cloud): State<Arc<FakeCloud>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    if let Err(status) = check(&headers) {
        return (status, Json(json!({})));
    }
    (StatusCode::CREATED, Json(cloud.insert(&body["data"])))
}

async fn delete_document(
    State(cloud): State<Arc<FakeCloud>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> StatusCode {
    if let Err(status) = check(&headers) {
        return status;
    }
    let mut documents = cloud.documents.lock().unwrap();
    let before = documents.len();
    documents.retain(|d| d["$id"] != json!(id));
    if documents.len() < before {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn serve_cloud() -> (SocketAddr, Arc<FakeCloud>) {
    let cloud = Arc::new(FakeCloud::default());
    let documents = "/v1/databases/db/collections/favorites/documents";

    let app = Router::new()
        .route("/v1/account", get(account))
        .route("/v1/account/sessions/email", post(create_session))
        .route("/v1/account/sessions/current", delete(delete_session))
        .route(documents, get(list_documents).post(create_document))
        .route(&format!("{}/:id", documents), delete(delete_document))
        .with_state(cloud.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app.into_make_service()).await;
    });

    (addr, cloud)
}

fn create_client(addr: SocketAddr) -> HttpCloudClient {
    HttpCloudClient::new(
        format!("http://{}/v1", addr),
        PROJECT.to_string(),
        "db".to_string(),
        "favorites".to_string(),
    )
}

fn movie(id: &str) -> Movie {
    Movie {
        id: id.to_string(),
        title: format!("Title {}", id),
        poster_url: Some(format!("https://cdn.test/{}.jpg", id)),
        rating: Some("R".to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_wrong_password_is_unauthenticated() {
    let (addr, _cloud) = serve_cloud().await;
    let client = Arc::new(create_client(addr));
    let session = SessionManager::new(client.clone(), Arc::new(MemoryStore::new()));

    let result = session.login_with_password("viewer@example.com", "nope").await;

    assert!(matches!(result, Err(AppError::Unauthenticated)));
    assert!(!client.has_session().await);
}

#[tokio::test]
async fn test_session_survives_restart() {
    let (addr, _cloud) = serve_cloud().await;
    let local = Arc::new(MemoryStore::new());

    let first = SessionManager::new(Arc::new(create_client(addr)), local.clone());
    first
        .login_with_password("viewer@example.com", "hunter22")
        .await
        .unwrap();

    // New process: fresh client, same local store
    let client = Arc::new(create_client(addr));
    let restarted = SessionManager::new(client.clone(), local.clone());

    let user = restarted.restore().await.unwrap();
    assert_eq!(user.map(|u| u.id), Some("u1".to_string()));
    assert!(client.has_session().await);
    assert!(local.get(&StoreKey::SessionPresent).await.unwrap().is_some());

    restarted.logout().await.unwrap();
    assert!(local.get(&StoreKey::SessionSecret).await.unwrap().is_none());
    assert_eq!(restarted.restore().await.unwrap(), None);
}

#[tokio::test]
async fn test_guest_favorites_reconcile_on_sign_in() {
    let (addr, cloud) = serve_cloud().await;
    cloud.insert(&json!({
        "userId": "u1",
        "movieId": "m2",
        "title": "Title m2",
        "createdAt": "2024-05-01T12:00:00Z",
    }));

    let client = Arc::new(create_client(addr));
    let local = Arc::new(MemoryStore::new());
    let session = SessionManager::new(client.clone(), local.clone());
    let mut favorites = FavoritesReconciler::load(local.clone(), client.clone())
        .await
        .unwrap();

    for id in ["m1", "m2", "m3"] {
        assert_eq!(favorites.toggle(&movie(id)).await, ToggleOutcome::Added);
    }

    let user = session
        .login_with_password("viewer@example.com", "hunter22")
        .await
        .unwrap();
    assert_eq!(user.id, "u1");

    // m3 is not in the loaded list, so it has no metadata
    let report = favorites
        .sign_in(user, &[movie("m1"), movie("m2")])
        .await;

    assert_eq!(report.synced, vec!["m1".to_string()]);
    assert_eq!(report.already_in_cloud, vec!["m2".to_string()]);
    assert_eq!(report.dropped, vec!["m3".to_string()]);
    assert!(report.failed.is_empty());

    assert_eq!(cloud.movie_ids(), vec!["m2".to_string(), "m1".to_string()]);
    assert!(favorites.is_favorite("m1"));
    assert!(!favorites.is_favorite("m3"));

    let guest: Option<Vec<String>> = get_json(local.as_ref(), &StoreKey::GuestFavorites)
        .await
        .unwrap();
    assert_eq!(guest, Some(Vec::new()));
}

#[tokio::test]
async fn test_authenticated_toggle_and_logout() {
    let (addr, cloud) = serve_cloud().await;
    let client = Arc::new(create_client(addr));
    let local = Arc::new(MemoryStore::new());
    let session = SessionManager::new(client.clone(), local.clone());
    let mut favorites = FavoritesReconciler::load(local.clone(), client.clone())
        .await
        .unwrap();

    let user = session
        .login_with_password("viewer@example.com", "hunter22")
        .await
        .unwrap();
    assert!(favorites.sign_in(user, &[]).await.is_empty());

    assert_eq!(favorites.toggle(&movie("m5")).await, ToggleOutcome::Added);
    assert_eq!(cloud.movie_ids(), vec!["m5".to_string()]);

    let listed = client.list_favorites("u1").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].title, "Title m5");
    assert_eq!(listed[0].rating.as_deref(), Some("R"));

    assert_eq!(favorites.toggle(&movie("m5")).await, ToggleOutcome::Removed);
    assert!(cloud.movie_ids().is_empty());

    assert_eq!(session.restore().await.unwrap().map(|u| u.id), Some("u1".to_string()));

    session.logout().await.unwrap();
    favorites.sign_out().await.unwrap();

    assert!(!client.has_session().await);
    assert_eq!(client.current_user().await.unwrap(), None);
    assert!(local.get(&StoreKey::SessionPresent).await.unwrap().is_none());
    assert_eq!(favorites.state(), &FavoritesState::Guest { ids: Vec::new() });
}
