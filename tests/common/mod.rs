//! Common test utilities for the Plantia client tests.
//!
//! Provides a notifier that records what the user would have seen, a
//! scripted prediction endpoint, synthetic leaf images, and small axum
//! servers standing in for the prediction service and the asset origin.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::Router;
use axum::extract::{Multipart, State};
use axum::http::{StatusCode, Uri, header};
use axum::response::IntoResponse;
use axum::routing::post;
use image::{ImageFormat, Rgba, RgbaImage};
use parking_lot::Mutex;
use plantia_client::controller::{Notice, Notifier};
use plantia_client::error::{ClientError, ClientResult};
use plantia_client::processing::JpegPayload;
use plantia_client::transport::{PredictionEndpoint, PredictionResult};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;

/// Records notices and file chooser requests.
#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
    chooser: Mutex<Vec<bool>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    pub fn chooser_requests(&self) -> Vec<bool> {
        self.chooser.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().push(notice);
    }

    fn request_file_chooser(&self, native_camera: bool) {
        self.chooser.lock().push(native_camera);
    }
}

/// What a [`ScriptedEndpoint`] received.
#[derive(Debug, Clone)]
pub struct Received {
    pub width: u32,
    pub height: u32,
    pub len: usize,
    pub starts_with_soi: bool,
}

/// Prediction endpoint answering from a queue, optionally held behind a gate.
pub struct ScriptedEndpoint {
    answers: Mutex<Vec<ClientResult<PredictionResult>>>,
    received: Mutex<Vec<Received>>,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedEndpoint {
    /// Answers in the given order; once the queue is empty every call
    /// succeeds with a healthy leaf.
    pub fn new(answers: Vec<ClientResult<PredictionResult>>) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(answers.into_iter().rev().collect()),
            received: Mutex::new(Vec::new()),
            gate: None,
        })
    }

    /// Calls wait until a permit is added to `gate`.
    pub fn gated(answers: Vec<ClientResult<PredictionResult>>, gate: Arc<Semaphore>) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(answers.into_iter().rev().collect()),
            received: Mutex::new(Vec::new()),
            gate: Some(gate),
        })
    }

    pub fn received(&self) -> Vec<Received> {
        self.received.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.received.lock().len()
    }
}

#[async_trait]
impl PredictionEndpoint for ScriptedEndpoint {
    async fn predict(&self, payload: JpegPayload) -> ClientResult<PredictionResult> {
        self.received.lock().push(Received {
            width: payload.width,
            height: payload.height,
            len: payload.bytes.len(),
            starts_with_soi: payload.bytes.starts_with(&[0xFF, 0xD8]),
        });
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|_| ClientError::transport("predict", "gate closed"))?
                .forget();
        }
        let next = self.answers.lock().pop();
        next.unwrap_or_else(|| Ok(prediction("Healthy_Leaf", "90.00%")))
    }
}

pub fn prediction(label: &str, confidence: &str) -> PredictionResult {
    PredictionResult {
        label: label.to_string(),
        confidence: confidence.to_string(),
        all_predictions: None,
    }
}

/// Green gradient standing in for a leaf photo.
pub fn leaf_frame(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 64) as u8, 120 + (y % 100) as u8, 40, 255])
    })
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    leaf_frame(width, height)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

/// Serve `app` on an ephemeral local port.
pub async fn serve(app: Router) -> (SocketAddr, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, handle)
}

/// A multipart part seen by the prediction server.
#[derive(Debug, Clone)]
pub struct SeenPart {
    pub field: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Clone)]
struct PredictState {
    status: StatusCode,
    body: String,
    seen: Arc<Mutex<Vec<SeenPart>>>,
}

async fn predict_handler(
    State(state): State<PredictState>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    while let Ok(Some(field)) = multipart.next_field().await {
        let part = SeenPart {
            field: field.name().unwrap_or_default().to_string(),
            file_name: field.file_name().map(str::to_string),
            content_type: field.content_type().map(str::to_string),
            bytes: field.bytes().await.map(|b| b.to_vec()).unwrap_or_default(),
        };
        state.seen.lock().push(part);
    }
    (
        state.status,
        [(header::CONTENT_TYPE, "application/json")],
        state.body.clone(),
    )
}

/// A `/predict` route answering with a fixed status and body.
pub async fn prediction_server(
    status: StatusCode,
    body: &str,
) -> (SocketAddr, Arc<Mutex<Vec<SeenPart>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let state = PredictState {
        status,
        body: body.to_string(),
        seen: Arc::clone(&seen),
    };
    let app = Router::new()
        .route("/predict", post(predict_handler))
        .with_state(state);
    let (addr, _handle) = serve(app).await;
    (addr, seen)
}

/// Static asset origin. Paths not in `assets` answer 404. Every request is
/// counted per path.
#[derive(Clone)]
pub struct AssetOrigin {
    assets: Arc<HashMap<String, (&'static str, Vec<u8>)>>,
    hits: Arc<Mutex<HashMap<String, usize>>>,
    total: Arc<AtomicUsize>,
}

impl AssetOrigin {
    pub fn new(assets: &[(&str, &'static str, &[u8])]) -> Self {
        Self {
            assets: Arc::new(
                assets
                    .iter()
                    .map(|(path, ct, body)| (path.to_string(), (*ct, body.to_vec())))
                    .collect(),
            ),
            hits: Arc::new(Mutex::new(HashMap::new())),
            total: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn hits(&self, path: &str) -> usize {
        self.hits.lock().get(path).copied().unwrap_or(0)
    }

    pub fn total_hits(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub async fn start(&self) -> SocketAddr {
        let app = Router::new().fallback(serve_asset).with_state(self.clone());
        serve(app).await.0
    }
}

async fn serve_asset(State(origin): State<AssetOrigin>, uri: Uri) -> impl IntoResponse {
    let path = uri.path().to_string();
    origin.total.fetch_add(1, Ordering::SeqCst);
    *origin.hits.lock().entry(path.clone()).or_insert(0) += 1;
    match origin.assets.get(&path) {
        Some((content_type, body)) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, *content_type)],
            body.clone(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "not found").into_response(),
    }
}
