// All functions in this module are shared test helpers. Not every test
// binary uses every helper, so dead_code warnings are suppressed here.
#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{Method, Request, StatusCode, Uri};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

use facelink_api::router::build_router;
use facelink_api::state::AppState;
use facelink_core::config::{
    Config, ControlPanelsConfig, FaceRecognizersConfig, HttpClientConfig, HttpServerConfig,
    LoggerConfig, StorageConfig,
};
use facelink_core::transport::HttpTransport;
use facelink_core::types::{ControlObject, FacialFeaturesVector, Sex, FEATURE_DIM};
use facelink_panels::PanelScheduler;
use facelink_recognizers::RecognizerScheduler;

// ---------------------------------------------------------------------------
// Stub peers (workers and consoles)
// ---------------------------------------------------------------------------

/// One request a stub peer received.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub body: serde_json::Value,
}

/// A stub worker or console: accepts every request with 200 and records it.
pub struct StubPeer {
    pub base: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl StubPeer {
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Requests recorded for a specific endpoint path.
    pub fn requests_for(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }
}

pub async fn spawn_peer() -> StubPeer {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&requests);

    let app = Router::new().fallback(move |uri: Uri, body: Bytes| {
        let recorded = Arc::clone(&recorded);
        async move {
            let value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
            recorded.lock().unwrap().push(RecordedRequest {
                path: uri.path().to_string(),
                body: value,
            });
            StatusCode::OK
        }
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    StubPeer { base, requests }
}

// ---------------------------------------------------------------------------
// App assembly
// ---------------------------------------------------------------------------

/// Build a config pointing at the given stub peers. The storage section is
/// nominal; tests get their pool from `#[sqlx::test]`.
pub fn test_config(
    img_dir: &Path,
    workers: Vec<String>,
    panels: Vec<String>,
    clean_ms: u64,
) -> Config {
    Config {
        http_server: HttpServerConfig {
            addr: "127.0.0.1".to_string(),
            port: 8080,
            read_timeout_ms: 5_000,
            write_timeout_ms: 5_000,
            key_path: String::new(),
            crt_path: String::new(),
        },
        http_client: HttpClientConfig { timeout_ms: 2_000 },
        storage: StorageConfig {
            addr: "127.0.0.1".to_string(),
            port: 5432,
            user: "facelink".to_string(),
            passwd: "facelink".to_string(),
            default_db: "facelink".to_string(),
            max_pings: 1,
            read_timeout_ms: 5_000,
            write_timeout_ms: 5_000,
            img_path: img_dir.to_str().unwrap().to_string(),
            debug: false,
            cosine_boundary: 0.3,
        },
        face_recognizers: FaceRecognizersConfig {
            face_recognizers: workers,
            aw_imgs_q_max_size: 64,
            aw_imgs_q_clean_ms: clean_ms,
        },
        control_panels: ControlPanelsConfig {
            control_panels: panels,
            aco_q_max_size: 64,
            aco_q_clean_ms: clean_ms,
            ac_q_max_size: 64,
            ac_q_clean_ms: clean_ms,
        },
        logger: LoggerConfig::default(),
    }
}

/// Build the full application router plus its state over a test pool.
pub fn build_test_app(
    pool: PgPool,
    img_dir: &Path,
    workers: Vec<String>,
    panels: Vec<String>,
    clean_ms: u64,
) -> (Router, AppState) {
    let config = test_config(img_dir, workers, panels, clean_ms);
    let transport = Arc::new(HttpTransport::new(config.http_client.timeout_ms).unwrap());
    let recognizers =
        Arc::new(RecognizerScheduler::new(&config.face_recognizers, Arc::clone(&transport)).unwrap());
    let panel_scheduler = Arc::new(PanelScheduler::new(&config.control_panels, transport).unwrap());

    let state = AppState {
        pool,
        src_addr: config.source_addr(),
        config: Arc::new(config),
        recognizers,
        panels: panel_scheduler,
    };
    (build_router(state.clone()), state)
}

// ---------------------------------------------------------------------------
// HTTP helpers
// ---------------------------------------------------------------------------

pub async fn send(
    app: Router,
    method: Method,
    path: &str,
    body: serde_json::Value,
) -> axum::response::Response {
    let request = Request::builder()
        .method(method)
        .uri(path)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn put_json(app: Router, path: &str, body: serde_json::Value) -> axum::response::Response {
    send(app, Method::PUT, path, body).await
}

pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Poll a condition for up to five seconds.
pub async fn wait_until<F, Fut>(mut cond: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if cond().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A base64 buffer with a valid PNG signature; enough for magic-byte
/// sniffing, which is all the coordinator does with image bytes.
pub fn png_b64() -> String {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    STANDARD.encode([0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0])
}

pub fn person(passport: &str, surname: &str) -> ControlObject {
    ControlObject {
        id: Uuid::new_v4().to_string(),
        ts: Utc::now(),
        passport: passport.to_string(),
        surname: surname.to_string(),
        name: "Anna".to_string(),
        patronymic: "-".to_string(),
        sex: Sex::Female,
        birthdate: "1990-04-12".to_string(),
        phone_num: "-".to_string(),
        email: "-".to_string(),
        address: "-".to_string(),
    }
}

/// Unit vector along one axis; orthogonal axes make unambiguous matches.
pub fn axis_vector(axis: usize) -> FacialFeaturesVector {
    let mut v = vec![0.0; FEATURE_DIM];
    v[axis] = 1.0;
    FacialFeaturesVector(v)
}
