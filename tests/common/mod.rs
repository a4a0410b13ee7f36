#![allow(dead_code)]

use async_trait::async_trait;
use recipe_sync::app::ports::{HttpClientPort, HttpGetResult};
use recipe_sync::config::TrelloConfig;
use recipe_sync::fetch::Trello;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

pub const API_ROOT: &str = "https://api.trello.test/1";
pub const BOARD_ID: &str = "board1";
pub const PUBLISHED_LABEL_ID: &str = "label-published";

/// Answers GETs from a table keyed by request path (no API root, no query).
/// Unknown paths get a 404. Each answer can be held back by a fixed latency
/// so overlapping requests show up in `max_in_flight`.
#[derive(Default)]
pub struct FakeHttp {
    routes: Mutex<HashMap<String, (u16, Value)>>,
    calls: Mutex<Vec<String>>,
    started: Mutex<Vec<(String, Instant)>>,
    latency: Mutex<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeHttp {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, path: &str, status: u16, body: Value) {
        self.routes.lock().unwrap().insert(path.to_string(), (status, body));
    }

    pub fn ok(&self, path: &str, body: Value) {
        self.respond(path, 200, body);
    }

    /// Full URLs requested so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    /// Forgets start times and the in-flight high-water mark.
    pub fn reset_timing(&self) {
        self.started.lock().unwrap().clear();
        self.max_in_flight.store(0, Ordering::SeqCst);
    }

    /// Request paths with the instant each request was issued, in order.
    pub fn started(&self) -> Vec<(String, Instant)> {
        self.started.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.calls()
            .iter()
            .filter(|url| request_path(url) == path)
            .count()
    }
}

fn request_path(url: &str) -> &str {
    let without_root = url.strip_prefix(API_ROOT).unwrap_or(url);
    without_root.split('?').next().unwrap_or(without_root)
}

#[async_trait]
impl HttpClientPort for FakeHttp {
    async fn get(&self, url: &str) -> Result<HttpGetResult, String> {
        self.calls.lock().unwrap().push(url.to_string());
        self.started
            .lock()
            .unwrap()
            .push((request_path(url).to_string(), Instant::now()));

        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let routes = self.routes.lock().unwrap();
        let (status, body) = routes
            .get(request_path(url))
            .cloned()
            .unwrap_or((404, json!({ "message": "not found" })));
        Ok(HttpGetResult {
            status,
            bytes: serde_json::to_vec(&body).unwrap(),
            content_type: "application/json".to_string(),
        })
    }
}

pub fn trello_config() -> TrelloConfig {
    TrelloConfig {
        api_root: API_ROOT.to_string(),
        board_id: BOARD_ID.to_string(),
        published_label_id: PUBLISHED_LABEL_ID.to_string(),
        key: None,
        token: None,
    }
}

pub fn trello(http: Arc<FakeHttp>) -> Arc<Trello> {
    Arc::new(Trello::new(trello_config(), http))
}

pub fn label(id: &str, name: &str) -> Value {
    json!({ "id": id, "idBoard": BOARD_ID, "name": name, "color": "green" })
}

pub fn card(id: &str, name: &str, cover: Option<&str>, labels: Vec<Value>) -> Value {
    json!({
        "id": id,
        "name": name,
        "shortLink": format!("sl-{id}"),
        "idList": "list1",
        "labels": labels,
        "idAttachmentCover": cover,
    })
}

pub fn attachment(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "url": format!("https://img.test/{id}.jpg"),
        "edgeColor": "#ffffff",
        "previews": [
            { "url": format!("https://img.test/{id}-100.jpg"), "height": 100, "width": 100 },
            { "url": format!("https://img.test/{id}-1.jpg"), "height": 1, "width": 1 },
            { "url": format!("https://img.test/{id}-10.jpg"), "height": 10, "width": 10 }
        ]
    })
}

/// A small board: two labels, three cards (two with published covers), and
/// details for each card.
pub fn seed_board(http: &FakeHttp) {
    http.ok(
        &format!("/board/{BOARD_ID}/labels"),
        json!([label("t1", "published"), label("t2", "dessert")]),
    );
    http.ok(
        &format!("/board/{BOARD_ID}/cards"),
        json!([
            card("c1", "Apple Pie", Some("a1"), vec![label("t1", "published")]),
            card("c2", "Brownies", Some("a2"), vec![label("t2", "dessert")]),
            card("c3", "Chili", None, vec![]),
        ]),
    );
    http.ok("/card/c1/attachments/a1", attachment("a1", "[published]pie.jpg"));
    http.ok("/card/c2/attachments/a2", attachment("a2", "[published]brownies.jpg"));
    for id in ["c1", "c2", "c3"] {
        http.ok(&format!("/card/{id}"), json!({ "id": id, "desc": format!("How to make {id}") }));
        http.ok(&format!("/card/{id}/attachments"), json!([]));
    }
}
