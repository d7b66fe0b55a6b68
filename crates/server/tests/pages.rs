mod common;

use axum::{
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use serde_json::{Value, json};

use common::{TestApp, body_bytes, spawn};

async fn visit(app: &TestApp, uri: &str, token: Option<&str>, inertia: bool) -> Response<Body> {
    let mut req = Request::builder().uri(uri);
    if let Some(token) = token {
        req = req.header(header::COOKIE, format!("garage_token={token}"));
    }
    if inertia {
        req = req
            .header("X-Inertia", "true")
            .header("X-Inertia-Version", "test-assets");
    }
    app.send(req.body(Body::empty()).unwrap()).await
}

async fn page(response: Response<Body>) -> Value {
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-inertia"], "true");
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

#[tokio::test]
async fn protected_pages_redirect_guests_to_login() {
    let app = spawn();
    for uri in ["/dashboard", "/cars", "/cars/create", "/settings/tokens"] {
        let response = visit(&app, uri, None, false).await;
        assert_eq!(response.status(), StatusCode::FOUND, "{uri}");
        assert_eq!(response.headers()[header::LOCATION], "/login");
    }
}

#[tokio::test]
async fn inertia_visits_get_page_objects() {
    let app = spawn();
    let token = app.register("Ann", "ann@example.com").await;
    app.create_car(&token, json!({"make": "Honda", "model": "S2000", "year": 2004}))
        .await;

    let body = page(visit(&app, "/dashboard", Some(&token), true).await).await;
    assert_eq!(body["component"], "Dashboard");
    assert_eq!(body["url"], "/dashboard");
    assert_eq!(body["version"], "test-assets");
    assert_eq!(body["props"]["stats"]["cars_count"], 1);
    assert_eq!(body["props"]["auth"]["user"]["email"], "ann@example.com");

    let body = page(visit(&app, "/cars?sort=-year", Some(&token), true).await).await;
    assert_eq!(body["component"], "Cars/Index");
    assert_eq!(body["props"]["cars"]["total"], 1);
    assert_eq!(body["url"], "/cars?sort=-year");
}

#[tokio::test]
async fn browser_visits_get_the_html_shell() {
    let app = spawn();
    let response = visit(&app, "/", None, false).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(html.contains("data-page=\"{&quot;component&quot;:&quot;Welcome&quot;"));
}

#[tokio::test]
async fn stale_assets_force_a_full_reload() {
    let app = spawn();
    let req = Request::builder()
        .uri("/events")
        .header("X-Inertia", "true")
        .header("X-Inertia-Version", "old-build")
        .body(Body::empty())
        .unwrap();
    let response = app.send(req).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(response.headers()["x-inertia-location"], "/events");
}

#[tokio::test]
async fn car_pages_respect_ownership() {
    let app = spawn();
    let ann = app.register("Ann", "ann@example.com").await;
    let bob = app.register("Bob", "bob@example.com").await;
    let car = app
        .create_car(&ann, json!({"make": "Honda", "model": "S2000", "year": 2004}))
        .await;
    let id = car["id"].as_str().unwrap();

    let body = page(visit(&app, &format!("/cars/{id}/edit"), Some(&ann), true).await).await;
    assert_eq!(body["component"], "Cars/Edit");
    assert_eq!(body["props"]["car"]["model"], "S2000");
    assert!(body["props"]["max_year"].is_i64());

    let response = visit(&app, &format!("/cars/{id}"), Some(&bob), true).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let response = visit(&app, "/cars/missing", Some(&bob), true).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn guest_pages() {
    let app = spawn();
    let token = app.register("Ann", "ann@example.com").await;

    let response = visit(&app, "/login", Some(&token), false).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()[header::LOCATION], "/dashboard");

    let body = page(visit(&app, "/register", None, true).await).await;
    assert_eq!(body["component"], "Auth/Register");
    assert!(body["props"]["auth"]["user"].is_null());

    let body = page(visit(&app, "/events", None, true).await).await;
    assert_eq!(body["component"], "Events/Index");
    assert_eq!(body["props"]["events"]["total"], 0);
}
