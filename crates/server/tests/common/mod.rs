#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Method, Request, Response, StatusCode, header},
};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use garage_server::{AppConfig, AppState, build_app, storage};

pub const PNG: &[u8] = &[
    0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D', b'R',
];

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    _dir: TempDir,
}

pub fn test_config(dir: &TempDir) -> AppConfig {
    AppConfig {
        data_dir: dir.path().join("data"),
        web_dir: dir.path().join("no-web-build"),
        port: 0,
        base_url: "http://localhost:3000".into(),
        jwt_secret: "test-secret".into(),
        registration_open: true,
        max_image_bytes: 1024,
        password_iterations: 1,
        asset_version: "test-assets".into(),
    }
}

pub fn spawn() -> TestApp {
    spawn_with(|_| {})
}

pub fn spawn_with(customize: impl FnOnce(&mut AppConfig)) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&dir);
    customize(&mut config);
    let db = storage::init_db(&config.data_dir).unwrap();
    let state = AppState::new(db, config);
    TestApp {
        app: build_app(state.clone()),
        state,
        _dir: dir,
    }
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), 10 * 1024 * 1024)
        .await
        .unwrap()
        .to_vec()
}

impl TestApp {
    pub async fn send(&self, req: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(req).await.unwrap()
    }

    /// JSON request; returns status and parsed body (`Null` when empty).
    pub async fn json(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => req.body(Body::empty()),
        }
        .unwrap();
        let response = self.send(req).await;
        let status = response.status();
        let bytes = body_bytes(response).await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.json(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.json(Method::POST, uri, Some(token), Some(body)).await
    }

    /// Register a user and return its access token.
    pub async fn register(&self, name: &str, email: &str) -> String {
        let (status, body) = self
            .json(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({"name": name, "email": email, "password": "password123"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["access_token"].as_str().unwrap().to_string()
    }

    pub async fn create_car(&self, token: &str, body: Value) -> Value {
        let (status, car) = self.post("/api/cars", token, body).await;
        assert_eq!(status, StatusCode::CREATED, "{car}");
        car
    }

    pub async fn create_modification(&self, token: &str, car_id: &str, body: Value) -> Value {
        let (status, m) = self
            .post(&format!("/api/cars/{car_id}/modifications"), token, body)
            .await;
        assert_eq!(status, StatusCode::CREATED, "{m}");
        m
    }

    /// Multipart upload of `bytes` as the `image` field.
    pub async fn upload_image(
        &self,
        token: &str,
        car_id: &str,
        field: &str,
        bytes: &[u8],
    ) -> (StatusCode, Value) {
        let boundary = "garage-test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"car.bin\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        let req = Request::builder()
            .method(Method::POST)
            .uri(format!("/api/cars/{car_id}/image"))
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap();
        let response = self.send(req).await;
        let status = response.status();
        let bytes = body_bytes(response).await;
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }
}
