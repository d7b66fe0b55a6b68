mod common;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use serde_json::json;

use common::{body_bytes, spawn, spawn_with};

#[tokio::test]
async fn register_returns_tokens_and_sets_cookie() {
    let app = spawn();
    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({"name": "Ann", "email": "Ann@Example.com", "password": "password123"})
                .to_string(),
        ))
        .unwrap();
    let response = app.send(req).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
    assert!(cookie.starts_with("garage_token="), "{cookie}");
    assert!(cookie.contains("HttpOnly"));

    let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["name"], "Ann");
    assert_eq!(body["expires_in"], 3600);
    let token = body["access_token"].as_str().unwrap();

    let (status, me) = app.get("/api/auth/me", token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "ann@example.com");
    assert!(me["email_verified_at"].is_null());
}

#[tokio::test]
async fn register_validates_every_field() {
    let app = spawn();
    let (status, body) = app
        .json(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({"email": "not-an-email", "password": "short"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "The given data was invalid.");
    for field in ["name", "email", "password"] {
        assert!(body["errors"][field].is_array(), "missing {field}: {body}");
    }
}

#[tokio::test]
async fn duplicate_email_is_a_field_error() {
    let app = spawn();
    app.register("Ann", "ann@example.com").await;
    let (status, body) = app
        .json(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({"name": "Other", "email": "ANN@example.com", "password": "password123"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"]["email"][0], "The email has already been taken.");
}

#[tokio::test]
async fn closed_registration_is_forbidden() {
    let app = spawn_with(|config| config.registration_open = false);
    let (status, _) = app
        .json(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({"name": "Ann", "email": "ann@example.com", "password": "password123"})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn login_checks_credentials() {
    let app = spawn();
    app.register("Ann", "ann@example.com").await;

    let (status, _) = app
        .json(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "ann@example.com", "password": "wrong-password"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .json(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "nobody@example.com", "password": "password123"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .json(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": " ANN@example.com", "password": "password123"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Ann");
}

#[tokio::test]
async fn refresh_tokens_rotate() {
    let app = spawn();
    let (_, bundle) = app
        .json(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({"name": "Ann", "email": "ann@example.com", "password": "password123"})),
        )
        .await;
    let refresh = bundle["refresh_token"].as_str().unwrap();

    let (status, rotated) = app
        .json(
            Method::POST,
            "/api/auth/refresh",
            None,
            Some(json!({"refresh_token": refresh})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(rotated["refresh_token"], bundle["refresh_token"]);

    let (status, _) = app
        .json(
            Method::POST,
            "/api/auth/refresh",
            None,
            Some(json!({"refresh_token": refresh})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_refresh_tokens_are_rejected_and_pruned() {
    let app = spawn();
    let token = app.register("Ann", "ann@example.com").await;
    let (_, me) = app.get("/api/auth/me", &token).await;
    let user_id = me["id"].as_str().unwrap();

    let stale = "stale-refresh-token";
    app.state
        .db
        .conn()
        .execute(
            "INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at)
             VALUES ('stale', ?1, ?2, '2000-01-01 00:00:00')",
            rusqlite::params![user_id, garage_api::crypto::hash_token(stale)],
        )
        .unwrap();

    let (status, _) = app
        .json(
            Method::POST,
            "/api/auth/refresh",
            None,
            Some(json!({"refresh_token": stale})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .json(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "ann@example.com", "password": "password123"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (stale_rows, live_rows): (i64, i64) = app
        .state
        .db
        .conn()
        .query_row(
            "SELECT COUNT(*) FILTER (WHERE id = 'stale'), COUNT(*) FROM refresh_tokens",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(stale_rows, 0);
    assert_eq!(live_rows, 2, "register and login bundles remain");
}

#[tokio::test]
async fn logout_consumes_refresh_token_and_clears_cookie() {
    let app = spawn();
    let (_, bundle) = app
        .json(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({"name": "Ann", "email": "ann@example.com", "password": "password123"})),
        )
        .await;
    let refresh = bundle["refresh_token"].as_str().unwrap();

    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/logout")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"refresh_token": refresh}).to_string()))
        .unwrap();
    let response = app.send(req).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()[header::SET_COOKIE]
            .to_str()
            .unwrap()
            .contains("Max-Age=0")
    );

    let (status, _) = app
        .json(
            Method::POST,
            "/api/auth/refresh",
            None,
            Some(json!({"refresh_token": refresh})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/logout")
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.send(req).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn protected_routes_need_a_valid_token() {
    let app = spawn();
    let (status, body) = app.json(Method::GET, "/api/cars", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthenticated.");

    let (status, _) = app.get("/api/cars", "not.a.jwt").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.get("/api/cars", "gpat_doesnotexist").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn cookie_authenticates_api_requests() {
    let app = spawn();
    let token = app.register("Ann", "ann@example.com").await;
    let req = Request::builder()
        .uri("/api/auth/me")
        .header(header::COOKIE, format!("garage_token={token}"))
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.send(req).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn health_is_public() {
    let app = spawn();
    let (status, body) = app.json(Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
