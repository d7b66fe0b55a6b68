//! Server-driven page responses for the Inertia front end.
//!
//! A visit with `X-Inertia: true` gets the page object as JSON; a plain
//! browser visit gets an HTML shell embedding the same object in
//! `data-page`. A stale client (`X-Inertia-Version` mismatch on GET) gets
//! 409 with `X-Inertia-Location` so it reloads.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header, request::Parts},
    response::{Html, IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::AppConfig;

pub const X_INERTIA: &str = "x-inertia";
pub const X_INERTIA_VERSION: &str = "x-inertia-version";
pub const X_INERTIA_LOCATION: &str = "x-inertia-location";

/// The page object sent to the client.
#[derive(Debug, Serialize)]
pub struct Page {
    pub component: String,
    pub props: Value,
    pub url: String,
    pub version: String,
}

/// Per-request Inertia context.
#[derive(Debug, Clone)]
pub struct Inertia {
    is_inertia: bool,
    url: String,
    version: String,
    shared: Map<String, Value>,
}

impl<S> FromRequestParts<S> for Inertia
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);
        let inertia = Self::from_parts(&parts.headers, &parts.uri, config.asset_version);
        let client_version = parts
            .headers
            .get(X_INERTIA_VERSION)
            .and_then(|v| v.to_str().ok());
        if inertia.is_inertia
            && parts.method == Method::GET
            && client_version.is_some_and(|v| v != inertia.version)
        {
            return Err(inertia.location(&inertia.url));
        }
        Ok(inertia)
    }
}

impl Inertia {
    fn from_parts(headers: &HeaderMap, uri: &Uri, version: String) -> Self {
        let is_inertia = headers
            .get(X_INERTIA)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));
        let url = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| uri.path().to_string());
        Self {
            is_inertia,
            url,
            version,
            shared: Map::new(),
        }
    }

    /// Add a prop sent with every page rendered from this context.
    pub fn share(mut self, key: &str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.shared.insert(key.to_string(), value);
        self
    }

    /// Build the page object; page props win over shared ones.
    pub fn page(&self, component: &str, props: impl Serialize) -> Page {
        let mut merged = self.shared.clone();
        match serde_json::to_value(props) {
            Ok(Value::Object(props)) => merged.extend(props),
            Ok(Value::Null) => {}
            Ok(other) => {
                merged.insert("value".into(), other);
            }
            Err(e) => tracing::error!("serialize props for {component}: {e}"),
        }
        Page {
            component: component.to_string(),
            props: Value::Object(merged),
            url: self.url.clone(),
            version: self.version.clone(),
        }
    }

    pub fn render(&self, component: &str, props: impl Serialize) -> Response {
        let page = self.page(component, props);
        let json = match serde_json::to_string(&page) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("serialize page {component}: {e}");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

        if self.is_inertia {
            let mut response = (
                [
                    (header::CONTENT_TYPE, "application/json"),
                    (header::VARY, "X-Inertia"),
                ],
                json,
            )
                .into_response();
            response
                .headers_mut()
                .insert(X_INERTIA, HeaderValue::from_static("true"));
            response
        } else {
            let mut response = Html(shell(&json)).into_response();
            response
                .headers_mut()
                .insert(header::VARY, HeaderValue::from_static("X-Inertia"));
            response
        }
    }

    /// Force a full page visit to `url`.
    pub fn location(&self, url: &str) -> Response {
        if self.is_inertia {
            match HeaderValue::from_str(url) {
                Ok(value) => {
                    let mut response = StatusCode::CONFLICT.into_response();
                    response.headers_mut().insert(X_INERTIA_LOCATION, value);
                    response
                }
                Err(_) => StatusCode::BAD_REQUEST.into_response(),
            }
        } else {
            redirect(url)
        }
    }
}

/// `302 Found` to `to`.
pub fn redirect(to: &str) -> Response {
    match HeaderValue::from_str(to) {
        Ok(location) => (StatusCode::FOUND, [(header::LOCATION, location)]).into_response(),
        Err(_) => StatusCode::BAD_REQUEST.into_response(),
    }
}

fn shell(page_json: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Garage</title>
<script type="module" src="/build/app.js"></script>
</head>
<body>
<div id="app" data-page="{}"></div>
</body>
</html>
"#,
        escape_html(page_json)
    )
}

/// Escape text for use inside a double-quoted HTML attribute.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
