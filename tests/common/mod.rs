#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use car_doctor::security::{issue_token, TokenKeys};
use car_doctor::storage::memory::MemoryStore;
use car_doctor::{router, AppState, Settings};

pub const SECRET: &str = "test-secret";

pub struct TestApp {
    pub app: Router,
    pub store: MemoryStore,
}

pub fn settings(extra: &[(&str, &str)]) -> Settings {
    let mut vars: HashMap<String, String> = HashMap::new();
    vars.insert("STORE_BACKEND".into(), "memory".into());
    vars.insert("ACCESS_TOKEN_SECRET".into(), SECRET.into());
    for (k, v) in extra { vars.insert(k.to_string(), v.to_string()); }
    Settings::from_lookup(move |k| vars.get(k).cloned()).expect("test settings")
}

pub fn app_with(extra: &[(&str, &str)]) -> TestApp {
    let store = MemoryStore::new();
    let settings = settings(extra);
    let state = AppState::new(Arc::new(store.clone()), &settings);
    TestApp { app: router(state, &settings.cors_origins), store }
}

pub fn app() -> TestApp { app_with(&[]) }

pub fn token_for(identity: Value, issued_at: i64) -> String {
    issue_token(&TokenKeys::new(SECRET), identity, issued_at).expect("sign test token")
}

pub fn now() -> i64 { chrono::Utc::now().timestamp() }

pub struct Reply {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Value,
    pub text: String,
}

pub async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>, cookie: Option<&str>) -> Reply {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(c) = cookie { req = req.header(header::COOKIE, c); }
    let req = match body {
        Some(b) => req.header(header::CONTENT_TYPE, "application/json").body(Body::from(b.to_string())).unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(req).await.expect("router is infallible");
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = resp.into_body().collect().await.expect("collect body").to_bytes();
    let text = String::from_utf8_lossy(&bytes).to_string();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    Reply { status, headers, body, text }
}

pub async fn get(app: &Router, uri: &str) -> Reply { send(app, Method::GET, uri, None, None).await }
