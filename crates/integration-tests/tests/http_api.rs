//! Integration tests for the admin HTTP API.
//!
//! Requests go through the full router with `tower::ServiceExt::oneshot`;
//! no socket is bound. Each [`Client`] carries its own session cookie, so
//! one test can play several admins at once.

#![allow(clippy::unwrap_used)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use serde_json::{Value, json};
use tokio::sync::Notify;
use tower::ServiceExt;
use url::Url;

use gem_catalog_admin::config::CategoryDeletePolicy;
use gem_catalog_admin::middleware::session_layer;
use gem_catalog_admin::models::{CATEGORIES_COLLECTION, PRODUCTS_COLLECTION, SUBCATEGORIES_COLLECTION};
use gem_catalog_admin::routes::routes;
use gem_catalog_admin::state::AppState;
use gem_catalog_admin::storage::{ObjectStorage, StorageError};
use gem_catalog_admin::store::{CollectionPath, DocumentStore, MemoryStore, Query};
use gem_catalog_integration_tests::{CdnStub, WAIT, shared};

const BOUNDARY: &str = "gem-catalog-test-boundary";

fn app_with(store: &MemoryStore, storage: Arc<dyn ObjectStorage>) -> (Router, AppState) {
    let state = AppState::new(shared(store), storage, CategoryDeletePolicy::Orphan).unwrap();
    let app = routes()
        .layer(session_layer(false))
        .with_state(state.clone());
    (app, state)
}

fn app() -> (Router, AppState, MemoryStore) {
    let store = MemoryStore::new();
    let (app, state) = app_with(&store, Arc::new(CdnStub));
    (app, state, store)
}

/// One browser: the router plus whatever session cookie it was handed.
#[derive(Clone)]
struct Client {
    app: Router,
    cookie: Arc<Mutex<Option<String>>>,
}

impl Client {
    fn new(app: &Router) -> Self {
        Self {
            app: app.clone(),
            cookie: Arc::default(),
        }
    }

    async fn send(&self, mut request: Request<Body>) -> (StatusCode, Value) {
        let cookie = self.cookie.lock().unwrap().clone();
        if let Some(cookie) = cookie {
            request
                .headers_mut()
                .insert(header::COOKIE, cookie.parse().unwrap());
        }

        let response = self.app.clone().oneshot(request).await.unwrap();
        if let Some(set_cookie) = response.headers().get(header::SET_COOKIE) {
            let pair = set_cookie.to_str().unwrap().split(';').next().unwrap();
            *self.cookie.lock().unwrap() = Some(pair.to_string());
        }

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    /// GET `uri` until `done` holds for the body.
    async fn poll(&self, uri: &str, done: impl Fn(&Value) -> bool) -> Value {
        let result = tokio::time::timeout(WAIT, async {
            loop {
                let (_, body) = self.send(get(uri)).await;
                if done(&body) {
                    return body;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        result.unwrap_or_else(|_| panic!("GET {uri} did not settle in {WAIT:?}"))
    }

    async fn create(&self, uri: &str, name: &str) -> String {
        let (status, created) = self
            .send(json_request(Method::POST, uri, &json!({ "name": name })))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{created}");
        created["id"].as_str().unwrap().to_string()
    }

    async fn select(&self, category: &str) {
        let (status, _) = self
            .send(
                Request::post(format!("/api/categories/{category}/select"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn json_request(method: Method, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Multipart body with text fields and one small JPEG per image name.
fn multipart(uri: &str, fields: &[(&str, &str)], images: &[&str]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    for file in images {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"images\"; filename=\"{file}\"\r\nContent-Type: image/jpeg\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(&[0xff, 0xd8, 0xff, 0xe0]);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::post(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn product_form(title: &str, category: &str, subcategory: &str) -> Request<Body> {
    multipart(
        "/api/products",
        &[
            ("title", title),
            ("description", "Pigeon blood red"),
            ("origin", "Burma"),
            ("price", "1500"),
            ("categoryId", category),
            ("subcategoryId", subcategory),
        ],
        &["ruby.jpg"],
    )
}

fn titles(listed: &Value) -> Vec<&str> {
    listed["products"]
        .as_array()
        .map(|products| products.iter().filter_map(|p| p["title"].as_str()).collect())
        .unwrap_or_default()
}

async fn add_category(store: &MemoryStore, name: &str) -> String {
    store
        .add(
            &CollectionPath::root(CATEGORIES_COLLECTION),
            json!({ "name": name }).as_object().cloned().unwrap(),
        )
        .await
        .unwrap()
}

async fn add_subcategory(store: &MemoryStore, category: &str, name: &str) -> String {
    let subs = CollectionPath::root(CATEGORIES_COLLECTION)
        .doc(category)
        .subcollection(SUBCATEGORIES_COLLECTION);
    store
        .add(&subs, json!({ "name": name }).as_object().cloned().unwrap())
        .await
        .unwrap()
}

async fn add_product(store: &MemoryStore, title: &str, created: i64) {
    let fields = json!({
        "title": title,
        "description": "Cut and polished",
        "origin": "Sri Lanka",
        "price": 1200,
        "images": ["https://cdn.test/a.jpg"],
        "isFeatured": false,
        "created_at": created,
    });
    store
        .add(
            &CollectionPath::root(PRODUCTS_COLLECTION),
            fields.as_object().cloned().unwrap(),
        )
        .await
        .unwrap();
}

async fn stored_subcategory_names(store: &MemoryStore, category: &str) -> Vec<String> {
    let subs = CollectionPath::root(CATEGORIES_COLLECTION)
        .doc(category)
        .subcollection(SUBCATEGORIES_COLLECTION);
    store
        .query(&Query::collection(subs))
        .await
        .unwrap()
        .docs
        .iter()
        .filter_map(|doc| doc.data.get("name").and_then(Value::as_str).map(str::to_string))
        .collect()
}

// =============================================================================
// Categories
// =============================================================================

#[tokio::test]
async fn test_category_flow() {
    let (app, _, _) = app();
    let admin = Client::new(&app);

    let rings = admin.create("/api/categories", "Rings").await;
    let listed = admin
        .poll("/api/categories", |v| v["categories"].as_array().is_some_and(|c| c.len() == 1))
        .await;
    assert_eq!(listed["categories"][0]["name"], "Rings");
    assert_eq!(listed["categories"][0]["id"], rings.as_str());

    admin.select(&rings).await;
    let (status, subs) = admin.send(get("/api/subcategories")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(subs["category_id"], rings.as_str());
    assert_eq!(subs["subcategories"], json!([]));

    admin.create("/api/subcategories", "Gold Rings").await;
    let subs = admin
        .poll("/api/subcategories", |v| {
            v["subcategories"].as_array().is_some_and(|s| s.len() == 1)
        })
        .await;
    assert_eq!(subs["subcategories"][0]["name"], "Gold Rings");

    let (_, notices) = admin.send(get("/api/notices")).await;
    assert_eq!(
        notices,
        json!([
            { "level": "success", "message": "Category created" },
            { "level": "success", "message": "Sub-category created" },
        ])
    );
}

#[tokio::test]
async fn test_sessions_keep_their_own_selection() {
    let (app, _, store) = app();
    let first = Client::new(&app);
    let second = Client::new(&app);

    let rings = first.create("/api/categories", "Rings").await;
    let pendants = second.create("/api/categories", "Pendants").await;

    first.select(&rings).await;
    second.select(&pendants).await;

    first.create("/api/subcategories", "Gold Rings").await;
    second.create("/api/subcategories", "Silver Chains").await;

    let seen_by_first = first
        .poll("/api/subcategories", |v| {
            v["subcategories"].as_array().is_some_and(|s| s.len() == 1)
        })
        .await;
    assert_eq!(seen_by_first["category_id"], rings.as_str());
    assert_eq!(seen_by_first["subcategories"][0]["name"], "Gold Rings");

    let seen_by_second = second
        .poll("/api/subcategories", |v| {
            v["subcategories"].as_array().is_some_and(|s| s.len() == 1)
        })
        .await;
    assert_eq!(seen_by_second["category_id"], pendants.as_str());
    assert_eq!(seen_by_second["subcategories"][0]["name"], "Silver Chains");

    assert_eq!(stored_subcategory_names(&store, &rings).await, ["Gold Rings"]);
    assert_eq!(stored_subcategory_names(&store, &pendants).await, ["Silver Chains"]);

    let (_, categories) = first.send(get("/api/categories")).await;
    assert_eq!(categories["selected"], rings.as_str());
}

#[tokio::test]
async fn test_blank_category_name_is_bad_request() {
    let (app, _, store) = app();
    let admin = Client::new(&app);

    let (status, body) = admin
        .send(json_request(
            Method::POST,
            "/api/categories",
            &json!({ "name": "  " }),
        ))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
    let (_, notices) = admin.send(get("/api/notices")).await;
    assert_eq!(
        notices,
        json!([{ "level": "warning", "message": "Name is required" }])
    );
    let categories = store
        .query(&Query::collection(CollectionPath::root(CATEGORIES_COLLECTION)))
        .await
        .unwrap();
    assert!(categories.is_empty());
}

#[tokio::test]
async fn test_subcategory_without_selection_conflicts() {
    let (app, _, _) = app();
    let admin = Client::new(&app);
    let (status, _) = admin.send(get("/api/categories")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = admin
        .send(json_request(
            Method::POST,
            "/api/subcategories",
            &json!({ "name": "Gold" }),
        ))
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "No category selected");
}

#[tokio::test]
async fn test_ending_a_session_releases_its_console() {
    let (app, state, _) = app();
    let admin = Client::new(&app);
    admin.send(get("/api/notices")).await;
    assert_eq!(state.consoles().len(), 1);

    let (status, _) = admin
        .send(
            Request::delete("/api/session")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(state.consoles().is_empty());
}

// =============================================================================
// Products
// =============================================================================

#[tokio::test]
async fn test_product_create_and_list() {
    let (app, _, _) = app();
    let admin = Client::new(&app);
    let rings = admin.create("/api/categories", "Rings").await;
    admin.select(&rings).await;
    let gold = admin.create("/api/subcategories", "Gold Rings").await;

    let (status, created) = admin
        .send(multipart(
            "/api/products",
            &[
                ("title", "Natural Ruby"),
                ("description", "Pigeon blood red"),
                ("origin", "Burma"),
                ("price", "125000.5"),
                ("isFeatured", "on"),
                ("categoryId", rings.as_str()),
                ("subcategoryId", gold.as_str()),
            ],
            &["ruby.jpg", "ruby side.jpg"],
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");

    let listed = admin
        .poll("/api/products", |v| titles(v).len() == 1)
        .await;
    let product = &listed["products"][0];
    assert_eq!(product["id"], created["id"]);
    assert_eq!(product["price_display"], "1,25,000.5");
    assert_eq!(product["category"], "Rings");
    assert_eq!(product["subcategory"], "Gold Rings");
    assert_eq!(product["is_featured"], true);
    assert_eq!(product["images"].as_array().unwrap().len(), 2);

    let dashboard = admin
        .poll("/api/dashboard", |v| v["product_count"] == 1)
        .await;
    assert_eq!(dashboard["product_count"], 1);

    let (status, searched) = admin.send(get("/api/products?search=Sapphire")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(searched["search"], "Sapphire");
    assert_eq!(searched["products"], json!([]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_searches_each_get_their_own_results() {
    let (app, _, store) = app();
    add_product(&store, "Ruby One", 1).await;
    add_product(&store, "Emerald Two", 2).await;
    add_product(&store, "Sapphire Three", 3).await;

    let first = Client::new(&app);
    let second = Client::new(&app);
    first.poll("/api/products", |v| titles(v).len() == 3).await;
    second.poll("/api/products", |v| titles(v).len() == 3).await;

    for _ in 0..50 {
        let ((_, ruby), (_, everything)) = tokio::join!(
            first.send(get("/api/products?search=Ruby")),
            second.send(get("/api/products?search=")),
        );
        assert_eq!(titles(&ruby), ["Ruby One"]);
        assert_eq!(
            titles(&everything),
            ["Sapphire Three", "Emerald Two", "Ruby One"]
        );

        // Two searches from one session take turns on its subscription.
        let ((_, ruby), (_, emerald)) = tokio::join!(
            first.send(get("/api/products?search=Ruby")),
            first.send(get("/api/products?search=Emerald")),
        );
        assert_eq!(titles(&ruby), ["Ruby One"]);
        assert_eq!(titles(&emerald), ["Emerald Two"]);
    }
}

/// Storage that parks the first upload until released.
#[derive(Debug)]
struct GatedStorage {
    armed: AtomicBool,
    entered: Notify,
    release: Notify,
}

impl GatedStorage {
    fn new() -> Self {
        Self {
            armed: AtomicBool::new(true),
            entered: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl ObjectStorage for GatedStorage {
    async fn upload(
        &self,
        key: &str,
        _bytes: Vec<u8>,
        _content_type: Option<&str>,
    ) -> Result<Url, StorageError> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        Ok(Url::parse("https://cdn.test/")?.join(key)?)
    }
}

#[tokio::test]
async fn test_pending_submission_only_blocks_its_own_session() {
    let store = MemoryStore::new();
    let storage = Arc::new(GatedStorage::new());
    let (app, _) = app_with(&store, storage.clone());
    let rings = add_category(&store, "Rings").await;
    let gold = add_subcategory(&store, &rings, "Gold Rings").await;

    let first = Client::new(&app);
    let second = Client::new(&app);
    first.send(get("/api/notices")).await;
    second.send(get("/api/notices")).await;

    let pending = tokio::spawn({
        let first = first.clone();
        let form = product_form("Natural Ruby", &rings, &gold);
        async move { first.send(form).await }
    });
    tokio::time::timeout(WAIT, storage.entered.notified())
        .await
        .unwrap();

    let (status, body) = first
        .send(product_form("Second Ruby", &rings, &gold))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "A submission is already in progress");

    let (status, created) = second
        .send(product_form("Blue Sapphire", &rings, &gold))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");

    storage.release.notify_one();
    let (status, created) = pending.await.unwrap();
    assert_eq!(status, StatusCode::CREATED, "{created}");

    let products = store
        .query(&Query::collection(CollectionPath::root(PRODUCTS_COLLECTION)))
        .await
        .unwrap();
    assert_eq!(products.len(), 2);
}

#[tokio::test]
async fn test_product_create_requires_category() {
    let (app, _, _) = app();
    let admin = Client::new(&app);

    let (status, body) = admin
        .send(multipart(
            "/api/products",
            &[
                ("title", "Natural Ruby"),
                ("description", "Pigeon blood red"),
                ("origin", "Burma"),
                ("price", "1500"),
            ],
            &["ruby.jpg"],
        ))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Category is required");
}

// =============================================================================
// CMS
// =============================================================================

#[tokio::test]
async fn test_cms_pages() {
    let (app, _, _) = app();
    let admin = Client::new(&app);

    let (status, page) = admin.send(get("/api/cms/privacy-policy")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["source"], "default");
    assert_eq!(page["title"], "Privacy Policy");

    let (status, _) = admin
        .send(json_request(
            Method::PUT,
            "/api/cms/privacy-policy",
            &json!({ "html": "<p>Updated</p>" }),
        ))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, page) = admin.send(get("/api/cms/privacy-policy")).await;
    assert_eq!(page["source"], "stored");
    assert_eq!(page["html"], "<p>Updated</p>");

    let (status, _) = admin.send(get("/api/cms/shipping-policy")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, notices) = admin.send(get("/api/notices")).await;
    assert_eq!(notices[0]["message"], "\"privacy policy\" saved successfully");
}
