mod common;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use serde_json::json;

use common::{PNG, TestApp, body_bytes, spawn};

async fn setup(app: &TestApp) -> (String, String) {
    let token = app.register("Ann", "ann@example.com").await;
    let car = app
        .create_car(&token, json!({"make": "Mazda", "model": "MX-5", "year": 1990}))
        .await;
    (token, car["id"].as_str().unwrap().to_string())
}

fn stored_files(app: &TestApp) -> usize {
    std::fs::read_dir(app.state.images.dir())
        .map(|entries| entries.count())
        .unwrap_or(0)
}

#[tokio::test]
async fn upload_serve_and_delete() {
    let app = spawn();
    let (token, car) = setup(&app).await;

    let (status, body) = app.upload_image(&token, &car, "image", PNG).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["image_url"], format!("/api/cars/{car}/image"));
    assert_eq!(stored_files(&app), 1);

    let req = Request::builder()
        .uri(format!("/api/cars/{car}/image"))
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let response = app.send(req).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    assert_eq!(response.headers()[header::CACHE_CONTROL], "private");
    assert_eq!(body_bytes(response).await, PNG);

    // Replacing keeps a single file on disk
    let (status, _) = app.upload_image(&token, &car, "image", PNG).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stored_files(&app), 1);

    let (status, _) = app
        .json(Method::DELETE, &format!("/api/cars/{car}/image"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(stored_files(&app), 0);

    let (status, _) = app.get(&format!("/api/cars/{car}/image"), &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, car_body) = app.get(&format!("/api/cars/{car}"), &token).await;
    assert!(car_body["image_url"].is_null());
}

#[tokio::test]
async fn rejects_non_images_oversize_and_missing_field() {
    let app = spawn();
    let (token, car) = setup(&app).await;

    let (status, body) = app.upload_image(&token, &car, "image", b"%PDF-1.7 not an image").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["image"].is_array());

    let mut big = PNG.to_vec();
    big.resize(2048, 0);
    let (status, body) = app.upload_image(&token, &car, "image", &big).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["image"][0].as_str().unwrap().contains("greater than"));

    let (status, _) = app.upload_image(&token, &car, "photo", PNG).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    assert_eq!(stored_files(&app), 0);
}

#[tokio::test]
async fn images_are_private_to_the_owner() {
    let app = spawn();
    let (token, car) = setup(&app).await;
    let intruder = app.register("Bob", "bob@example.com").await;
    app.upload_image(&token, &car, "image", PNG).await;

    let (status, _) = app.get(&format!("/api/cars/{car}/image"), &intruder).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.upload_image(&intruder, &car, "image", PNG).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .json(Method::DELETE, &format!("/api/cars/{car}/image"), Some(&intruder), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(stored_files(&app), 1);
}

#[tokio::test]
async fn deleting_the_car_removes_the_file() {
    let app = spawn();
    let (token, car) = setup(&app).await;
    app.upload_image(&token, &car, "image", PNG).await;
    assert_eq!(stored_files(&app), 1);

    let (status, _) = app
        .json(Method::DELETE, &format!("/api/cars/{car}"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(stored_files(&app), 0);
}
