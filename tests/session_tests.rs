//! Session issue/verify tests: the `token` cookie, the gate on `GET /cart/{email}`,
//! the owner check, logout and CORS for the browser front-end.

mod common;

use anyhow::Result;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use car_doctor::security::{issue_token, TokenKeys, TOKEN_TTL_SECS};
use common::{app, app_with, now, send, token_for};

fn token_from_set_cookie(set_cookie: &str) -> String {
    let first = set_cookie.split(';').next().unwrap();
    first.strip_prefix("token=").expect("token cookie").to_string()
}

async fn seed_cart(t: &common::TestApp) {
    for (email, service) in [("a@x.io", "Engine Repair"), ("b@x.io", "AC Repair")] {
        send(&t.app, Method::POST, "/cart", Some(json!({"email": email, "service": service})), None).await;
    }
}

#[tokio::test]
async fn jwt_sets_http_only_cookie_and_acknowledges() {
    let t = app();
    let r = send(&t.app, Method::POST, "/jwt", Some(json!({"email": "a@x.io"})), None).await;
    assert_eq!(r.status, StatusCode::OK);
    assert_eq!(r.body, json!({"success": true}));
    let set_cookie = r.headers.get(header::SET_COOKIE).expect("cookie").to_str().unwrap();
    assert!(set_cookie.starts_with("token="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("Max-Age=3600"));
    assert!(!set_cookie.contains("Secure"));
}

#[tokio::test]
async fn secure_cookie_when_configured() {
    let t = app_with(&[("COOKIE_SECURE", "true"), ("COOKIE_SAMESITE", "None")]);
    let r = send(&t.app, Method::POST, "/jwt", Some(json!({"email": "a@x.io"})), None).await;
    let set_cookie = r.headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(set_cookie.contains("; Secure"));
    assert!(set_cookie.contains("SameSite=None"));
}

#[tokio::test]
async fn jwt_rejects_non_object_identity() {
    let t = app();
    let r = send(&t.app, Method::POST, "/jwt", Some(json!("a@x.io")), None).await;
    assert_eq!(r.status, StatusCode::BAD_REQUEST);
    assert_eq!(r.body["code"], "invalid_identity");
    assert!(r.headers.get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn issued_cookie_opens_the_cart() {
    let t = app();
    seed_cart(&t).await;
    let r = send(&t.app, Method::POST, "/jwt", Some(json!({"email": "a@x.io"})), None).await;
    let token = token_from_set_cookie(r.headers.get(header::SET_COOKIE).unwrap().to_str().unwrap());

    let r = send(&t.app, Method::GET, "/cart/a@x.io", None, Some(&format!("theme=dark; token={token}"))).await;
    assert_eq!(r.status, StatusCode::OK);
    assert_eq!(r.body.as_array().unwrap().len(), 1);
    assert_eq!(r.body[0]["service"], "Engine Repair");
}

#[tokio::test]
async fn missing_cookie_is_unauthorized_and_leaks_nothing() {
    let t = app();
    seed_cart(&t).await;
    let r = send(&t.app, Method::GET, "/cart/a@x.io", None, None).await;
    assert_eq!(r.status, StatusCode::UNAUTHORIZED);
    assert_eq!(r.body["message"], "Unauthorized user");
    assert_eq!(r.body["code"], "missing_token");
    assert!(!r.text.contains("Engine Repair"));
}

#[tokio::test]
async fn expired_token_is_unauthorized() {
    let t = app();
    seed_cart(&t).await;
    let stale = token_for(json!({"email": "a@x.io"}), now() - TOKEN_TTL_SECS - 1);
    let r = send(&t.app, Method::GET, "/cart/a@x.io", None, Some(&format!("token={stale}"))).await;
    assert_eq!(r.status, StatusCode::UNAUTHORIZED);
    assert_eq!(r.body["message"], "Unauthorized user");
    assert_eq!(r.body["code"], "expired_token");
}

#[tokio::test]
async fn foreign_signature_is_unauthorized() -> Result<()> {
    let t = app();
    let forged = issue_token(&TokenKeys::new("someone-elses-secret"), json!({"email": "a@x.io"}), now())?;
    let r = send(&t.app, Method::GET, "/cart/a@x.io", None, Some(&format!("token={forged}"))).await;
    assert_eq!(r.status, StatusCode::UNAUTHORIZED);
    assert_eq!(r.body["code"], "invalid_token");

    let r = send(&t.app, Method::GET, "/cart/a@x.io", None, Some("token=garbage")).await;
    assert_eq!(r.status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn token_for_another_owner_is_forbidden_by_default() {
    let t = app();
    seed_cart(&t).await;
    let cookie = format!("token={}", token_for(json!({"email": "a@x.io"}), now()));
    let r = send(&t.app, Method::GET, "/cart/b@x.io", None, Some(&cookie)).await;
    assert_eq!(r.status, StatusCode::FORBIDDEN);
    assert_eq!(r.body["message"], "Forbidden access");
    assert!(!r.text.contains("AC Repair"));

    // an identity without an email claim cannot prove ownership either
    let cookie = format!("token={}", token_for(json!({"user": "a"}), now()));
    let r = send(&t.app, Method::GET, "/cart/a@x.io", None, Some(&cookie)).await;
    assert_eq!(r.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn owner_check_can_be_disabled() {
    let t = app_with(&[("CART_OWNER_CHECK", "false")]);
    seed_cart(&t).await;
    let cookie = format!("token={}", token_for(json!({"email": "a@x.io"}), now()));
    let r = send(&t.app, Method::GET, "/cart/b@x.io", None, Some(&cookie)).await;
    assert_eq!(r.status, StatusCode::OK);
    assert_eq!(r.body[0]["email"], "b@x.io");
}

#[tokio::test]
async fn only_the_cart_listing_is_gated() {
    let t = app();
    let r = send(&t.app, Method::POST, "/cart", Some(json!({"email": "a@x.io"})), None).await;
    assert_eq!(r.status, StatusCode::OK);
    let id = r.body["insertedId"].as_str().unwrap().to_string();
    let r = send(&t.app, Method::PATCH, &format!("/cart/{id}"), Some(json!({"status": "confirm"})), None).await;
    assert_eq!(r.status, StatusCode::OK);
    let r = send(&t.app, Method::DELETE, &format!("/cart/{id}"), None, None).await;
    assert_eq!(r.status, StatusCode::OK);
    assert_eq!(send(&t.app, Method::GET, "/services", None, None).await.status, StatusCode::OK);
}

#[tokio::test]
async fn logout_expires_the_cookie() {
    let t = app();
    let r = send(&t.app, Method::POST, "/logout", None, None).await;
    assert_eq!(r.status, StatusCode::OK);
    assert_eq!(r.body, json!({"success": true}));
    let set_cookie = r.headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(set_cookie.starts_with("token=;"));
    assert!(set_cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn cors_allows_credentialed_dev_origin_only() -> Result<()> {
    let t = app();
    let preflight = |origin: &'static str| {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/cart")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
    };
    let resp = t.app.clone().oneshot(preflight("http://localhost:5173")?).await?;
    let h = resp.headers();
    assert_eq!(h.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "http://localhost:5173");
    assert_eq!(h.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(), "true");

    let resp = t.app.clone().oneshot(preflight("https://evil.example")?).await?;
    assert!(resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    Ok(())
}

#[tokio::test]
async fn jwt_with_malformed_body_gets_json_error() -> Result<()> {
    let t = app();
    let req = Request::builder()
        .method(Method::POST)
        .uri("/jwt")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("not json"))?;
    let resp = t.app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(resp.headers().get(header::SET_COOKIE).is_none());
    let bytes = http_body_util::BodyExt::collect(resp.into_body()).await?.to_bytes();
    let body: serde_json::Value = serde_json::from_slice(&bytes)?;
    assert_eq!(body["code"], "invalid_body");
    Ok(())
}
