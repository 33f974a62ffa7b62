#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use pond_relay::alerts::{AlertError, AlertForwarder, AlertTransport};
use pond_relay::server;
use pond_relay::state::AppState;

/// Transport that keeps every message instead of sending it.
#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<String>>,
}

impl RecordingTransport {
    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    /// Alerts are delivered from a spawned task: wait until at least `n`
    /// have arrived, then a little longer so an exact count can be asserted.
    pub async fn wait_for(&self, n: usize) -> Vec<String> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            let seen = self.messages().len();
            if seen >= n || tokio::time::Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.messages()
    }
}

#[async_trait]
impl AlertTransport for RecordingTransport {
    async fn send(&self, message: &str) -> Result<(), AlertError> {
        self.sent.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

/// Build the application router with a recording alert transport.
pub fn build_test_app() -> (Router, Arc<RecordingTransport>, AppState) {
    let recorder = Arc::new(RecordingTransport::default());
    let state = AppState::new(AlertForwarder::new(recorder.clone()));
    let app = server::router(state.clone(), Duration::from_secs(30));
    (app, recorder, state)
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    post_raw(app, uri, body.to_string()).await
}

pub async fn post_raw(app: Router, uri: &str, body: impl Into<String>) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.into()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}
