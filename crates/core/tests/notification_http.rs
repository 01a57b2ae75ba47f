use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, put},
    Json, Router,
};
use finsight_core::domain::notification::NotificationType;
use finsight_core::notify::error::NotificationApiError;
use finsight_core::notify::http::HttpNotificationService;
use finsight_core::notify::{NotificationService, NotificationSync, SyncPhase};
use finsight_core::session::SessionContext;
use futures::StreamExt;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const TOKEN: &str = "tok-123";

#[derive(Default)]
struct Backend {
    list_success: bool,
    items: Mutex<Vec<Value>>,
    reads: Mutex<Vec<String>>,
}

fn item(id: &str, timestamp: &str, read: bool) -> Value {
    json!({
        "id": id,
        "type": "warning",
        "title": format!("Budget {id}"),
        "message": "You have spent 85% of your entertainment budget",
        "timestamp": timestamp,
        "read": read,
    })
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some(&format!("Bearer {TOKEN}")[..])
}

async fn list(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if !backend.list_success {
        return Json(json!({"success": false, "message": "maintenance"})).into_response();
    }
    let data = backend.items.lock().unwrap().clone();
    Json(json!({"success": true, "data": data})).into_response()
}

async fn mark_read(
    State(backend): State<Arc<Backend>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> StatusCode {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED;
    }
    if id == "missing" {
        return StatusCode::NOT_FOUND;
    }
    backend.reads.lock().unwrap().push(id);
    StatusCode::OK
}

async fn remove(
    State(backend): State<Arc<Backend>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> StatusCode {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED;
    }
    let mut items = backend.items.lock().unwrap();
    let before = items.len();
    items.retain(|v| v["id"] != id.as_str());
    if items.len() == before {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::NO_CONTENT
    }
}

async fn subscribe(Query(params): Query<HashMap<String, String>>) -> Response {
    if params.get("token").map(String::as_str) != Some(TOKEN) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let pushed = item("p-1", "2026-02-03T08:00:00Z", false);
    let body = format!(":connected\n\n:heartbeat\n\ndata: {pushed}\n\ndata: {{broken\n\n:heartbeat\n\n");
    ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
}

async fn spawn_backend(backend: Backend) -> (SocketAddr, Arc<Backend>) {
    let backend = Arc::new(backend);
    let app = Router::new()
        .route("/api/notifications", get(list))
        .route("/api/notifications/subscribe", get(subscribe))
        .route("/api/notifications/:id/read", put(mark_read))
        .route("/api/notifications/:id", delete(remove))
        .with_state(backend.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, backend)
}

fn client(addr: SocketAddr) -> HttpNotificationService {
    HttpNotificationService::new(&format!("http://{addr}/api/"), Duration::from_secs(5)).unwrap()
}

fn seeded() -> Backend {
    Backend {
        list_success: true,
        items: Mutex::new(vec![
            item("a", "2026-02-01T08:00:00Z", true),
            item("c", "2026-02-02T18:30:00+02:00", false),
            item("b", "2026-02-02T08:00:00Z", false),
        ]),
        ..Default::default()
    }
}

#[tokio::test]
async fn fetch_all_sends_bearer_token_and_decodes_envelope() {
    let (addr, _backend) = spawn_backend(seeded()).await;
    let service = client(addr);

    let items = service.fetch_all(TOKEN).await.unwrap();
    assert_eq!(items.len(), 3);
    assert!(items.iter().all(|n| n.kind == NotificationType::Warning));

    let err = service.fetch_all("wrong").await.unwrap_err();
    let api = err.downcast_ref::<NotificationApiError>().unwrap();
    assert_eq!(api.stage, "list");
    assert_eq!(api.status.map(|s| s.as_u16()), Some(401));
}

#[tokio::test]
async fn malformed_list_entries_are_skipped() {
    let backend = seeded();
    {
        let mut items = backend.items.lock().unwrap();
        let mut promo = item("x", "2026-02-02T09:00:00Z", false);
        promo["type"] = json!("promo");
        items.push(promo);
        items.push(json!({"id": "y", "title": "no timestamp"}));
    }
    let (addr, _backend) = spawn_backend(backend).await;

    let items = client(addr).fetch_all(TOKEN).await.unwrap();
    let mut ids: Vec<_> = items.iter().map(|n| n.id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn unsuccessful_envelope_is_an_error() {
    let (addr, _backend) = spawn_backend(Backend::default()).await;
    let err = client(addr).fetch_all(TOKEN).await.unwrap_err();
    let api = err.downcast_ref::<NotificationApiError>().unwrap();
    assert_eq!(api.status, None);
    assert_eq!(api.detail, "maintenance");
}

#[tokio::test]
async fn mark_read_and_delete_map_status_codes() {
    let (addr, backend) = spawn_backend(seeded()).await;
    let service = client(addr);

    service.mark_read(TOKEN, "b").await.unwrap();
    let err = service.mark_read(TOKEN, "missing").await.unwrap_err();
    let api = err.downcast_ref::<NotificationApiError>().unwrap();
    assert_eq!(api.stage, "mark_read");
    assert_eq!(api.status.map(|s| s.as_u16()), Some(404));

    service.delete(TOKEN, "a").await.unwrap();
    assert!(service.delete(TOKEN, "a").await.is_err());

    assert_eq!(*backend.reads.lock().unwrap(), vec!["b".to_string()]);
    assert_eq!(backend.items.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn subscribe_yields_raw_event_payloads() {
    let (addr, _backend) = spawn_backend(seeded()).await;
    let service = client(addr);

    let frames: Vec<String> = service
        .subscribe(TOKEN)
        .await
        .unwrap()
        .map(|item| item.unwrap())
        .collect()
        .await;

    assert_eq!(frames.len(), 5);
    assert_eq!(frames[0], ":connected");
    assert_eq!(frames[1], ":heartbeat");
    assert!(frames[2].contains("\"p-1\""));
    assert_eq!(frames[3], "{broken");

    assert!(service.subscribe("nope").await.is_err());
}

#[tokio::test]
async fn sync_over_http_loads_sorted_and_marks_all_read() {
    let (addr, backend) = spawn_backend(seeded()).await;
    let session = SessionContext::new(Some(TOKEN.to_string()));
    let sync = NotificationSync::new(Arc::new(client(addr)), session.clone());

    sync.refresh().await;
    let view = sync.view();
    assert_eq!(view.phase, SyncPhase::Loaded);
    // 18:30+02:00 is 16:30Z, later than b's 08:00Z.
    let ids: Vec<_> = view.notifications.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["c", "b", "a"]);
    assert_eq!(view.unread_count(), 2);

    let report = sync.mark_all_as_read().await;
    assert_eq!((report.requested, report.failed), (2, 0));
    assert_eq!(sync.unread_count(), 0);

    let mut reads = backend.reads.lock().unwrap().clone();
    reads.sort();
    assert_eq!(reads, vec!["b".to_string(), "c".to_string()]);

    assert!(sync.delete_notification("a").await);
    assert!(sync.view().get("a").is_none());

    session.logout();
    sync.end_session();
    assert!(sync.view().notifications.is_empty());
    assert_eq!(sync.view().phase, SyncPhase::Unauthenticated);
}
