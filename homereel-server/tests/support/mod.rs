//! Shared fixtures: a stub Jellyfin server and a fully wired test app
//! rooted in a temporary media directory.

use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use axum_test::TestServer;
use homereel_config::{
    Config, JellyfinConfig, MediaConfig, ServerConfig, UploadConfig,
};
use homereel_server::{AppState, create_router};
use serde_json::{Value, json};

#[derive(Clone)]
struct StubState {
    items: Arc<Vec<Value>>,
    sessions: Arc<Vec<Value>>,
    updates: Arc<Mutex<Vec<Value>>>,
}

async fn list_users() -> Json<Value> {
    Json(json!([{"Id": "user-1", "Name": "family"}]))
}

async fn list_views() -> Json<Value> {
    Json(json!({"Items": [{"Id": "lib-1", "Name": "Home Videos"}]}))
}

async fn list_items(State(state): State<StubState>) -> Json<Value> {
    Json(json!({
        "Items": state.items.as_ref(),
        "TotalRecordCount": state.items.len(),
    }))
}

async fn get_item(
    State(state): State<StubState>,
    Path((_user_id, item_id)): Path<(String, String)>,
) -> Result<Json<Value>, StatusCode> {
    state
        .items
        .iter()
        .find(|item| item["Id"] == item_id.as_str())
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn update_item(
    State(state): State<StubState>,
    Path(item_id): Path<String>,
    Json(body): Json<Value>,
) -> StatusCode {
    let mut updates = state.updates.lock().unwrap();
    updates.push(json!({"itemId": item_id, "body": body}));
    StatusCode::NO_CONTENT
}

async fn refresh() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn primary_image() -> StatusCode {
    StatusCode::NOT_FOUND
}

async fn list_sessions(State(state): State<StubState>) -> Json<Value> {
    Json(json!(state.sessions.as_ref()))
}

async fn spawn_stub_jellyfin(
    items: Vec<Value>,
    sessions: Vec<Value>,
) -> (String, Arc<Mutex<Vec<Value>>>) {
    let updates = Arc::new(Mutex::new(Vec::new()));
    let state = StubState {
        items: Arc::new(items),
        sessions: Arc::new(sessions),
        updates: updates.clone(),
    };

    let router = Router::new()
        .route("/Users", get(list_users))
        .route("/Users/{user_id}/Views", get(list_views))
        .route("/Users/{user_id}/Items", get(list_items))
        .route("/Users/{user_id}/Items/{item_id}", get(get_item))
        .route("/Items/{item_id}", post(update_item))
        .route("/Items/{item_id}/Refresh", post(refresh))
        .route("/Items/{item_id}/Images/Primary", get(primary_image))
        .route("/Library/Refresh", post(refresh))
        .route("/Sessions", get(list_sessions))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub jellyfin");
    let addr = listener.local_addr().expect("stub local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("stub jellyfin");
    });

    (format!("http://{addr}"), updates)
}

pub struct TestApp {
    pub server: TestServer,
    pub media_root: tempfile::TempDir,
    pub updates: Arc<Mutex<Vec<Value>>>,
}

pub async fn test_app(items: Vec<Value>) -> TestApp {
    test_app_with(items, Vec::new(), None).await
}

pub async fn test_app_with(
    items: Vec<Value>,
    sessions: Vec<Value>,
    now_playing_user: Option<&str>,
) -> TestApp {
    let media_root = tempfile::tempdir().expect("media tempdir");
    let (jellyfin_url, updates) =
        spawn_stub_jellyfin(items, sessions).await;

    let config = Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origin: "http://localhost:3000".to_string(),
        },
        jellyfin: JellyfinConfig {
            url: jellyfin_url,
            api_key: "test-key".to_string(),
            library_name: "Home Videos".to_string(),
            now_playing_user: now_playing_user.map(str::to_string),
            path_prefix: "/home-videos".to_string(),
        },
        media: MediaConfig {
            root: media_root.path().to_path_buf(),
        },
        upload: UploadConfig {
            max_video_mb: 16,
            max_dvd_mb: 64,
        },
    };

    let state = AppState::new(config).expect("app state");
    let server = TestServer::new(create_router(state)).expect("test server");

    TestApp {
        server,
        media_root,
        updates,
    }
}

/// A Jellyfin item whose path lives under the stub's `/home-videos` mount.
pub fn library_item(id: &str, name: &str, has_image: bool) -> Value {
    let mut item = json!({
        "Id": id,
        "Name": name,
        "Path": format!("/home-videos/{name}"),
        "Type": "Video",
        "DateCreated": "2024-03-01T10:30:00.0000000Z",
    });
    if has_image {
        item["ImageTags"] = json!({"Primary": "tag"});
    }
    item
}
