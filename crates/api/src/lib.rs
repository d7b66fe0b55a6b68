//! Shared API types, crypto, and SQL builders for the garage server.
//!
//! This crate is the single source of truth for all API request/response
//! types. Route handlers in `garage-server` stay thin: they deserialize one of
//! these requests, call into [`service`] for validation, run a query built by
//! [`db`], and serialize one of these responses.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

#[cfg(feature = "backend")]
pub mod crypto;
#[cfg(feature = "backend")]
pub mod db;
#[cfg(feature = "backend")]
pub mod service;

// ─── Utilities ───────────────────────────────────────────────────────────────

/// Distinguish an absent field (`None`) from an explicit `null` (`Some(None)`).
///
/// Use with `#[serde(default, deserialize_with = "double_option")]`.
fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

/// Human label for a car: the nickname if set, otherwise `"<year> <make> <model>"`.
pub fn car_display_name(nickname: Option<&str>, year: i64, make: &str, model: &str) -> String {
    match nickname.map(str::trim).filter(|n| !n.is_empty()) {
        Some(nickname) => nickname.to_string(),
        None => format!("{year} {make} {model}"),
    }
}

// ─── Auth ────────────────────────────────────────────────────────────────────

/// Email + password registration. Missing fields deserialize as empty so
/// validation can report them per field.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Email + password login.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Exchange a refresh token for a new token bundle.
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Logout; the refresh token is optional so cookie-only clients can log out too.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LogoutRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Returned by register, login and refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthTokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub user_id: String,
    pub name: String,
}

/// The authenticated user (`GET /api/auth/me`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub email_verified_at: Option<String>,
    pub created_at: String,
}

// ─── Personal access tokens ──────────────────────────────────────────────────

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateTokenRequest {
    pub name: String,
}

/// Token metadata. The plaintext is never stored and never listed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSummary {
    pub id: String,
    pub name: String,
    pub token_prefix: String,
    pub last_used_at: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListTokensResponse {
    pub tokens: Vec<TokenSummary>,
}

/// Returned once, on creation.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateTokenResponse {
    pub token: TokenSummary,
    pub plain_text_token: String,
}

// ─── Cars ────────────────────────────────────────────────────────────────────

/// Body of `POST /api/cars` and `PUT|PATCH /api/cars/{car}`.
///
/// Every field distinguishes "absent" from "null" so one type serves both
/// create (required fields must be present) and partial update. `year` is kept
/// as submitted so form posts like `"year": "1990"` reach field validation.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CarRequest {
    #[serde(default, deserialize_with = "double_option")]
    pub make: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub model: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub year: Option<Option<serde_json::Value>>,
    #[serde(default, deserialize_with = "double_option")]
    pub nickname: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub vin: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarResponse {
    pub id: String,
    pub user_id: String,
    pub make: String,
    pub model: String,
    pub year: i64,
    pub nickname: Option<String>,
    pub vin: Option<String>,
    pub notes: Option<String>,
    pub display_name: String,
    pub image_url: Option<String>,
    pub modifications_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifications: Option<Vec<ModificationResponse>>,
    pub created_at: String,
    pub updated_at: String,
}

// ─── Modifications ───────────────────────────────────────────────────────────

/// Body of modification create / update; same absent-vs-null rules as [`CarRequest`].
/// `cost` and `is_active` are raw JSON, coerced by validation.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ModificationRequest {
    #[serde(default, deserialize_with = "double_option")]
    pub name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub category: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub brand: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub vendor: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub installation_date: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub cost: Option<Option<serde_json::Value>>,
    #[serde(default, deserialize_with = "double_option")]
    pub is_active: Option<Option<serde_json::Value>>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModificationResponse {
    pub id: String,
    pub car_id: String,
    pub name: String,
    pub category: String,
    pub brand: Option<String>,
    pub vendor: Option<String>,
    pub installation_date: Option<String>,
    pub cost: Option<f64>,
    pub is_active: bool,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

// ─── Pagination ──────────────────────────────────────────────────────────────

/// One page of a filtered, sorted listing.
#[derive(Debug, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
    pub last_page: u32,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, total: i64, page: u32, per_page: u32) -> Self {
        let total_u = u32::try_from(total.max(0)).unwrap_or(u32::MAX);
        let last_page = total_u.div_ceil(per_page.max(1)).max(1);
        Self {
            data,
            total,
            page,
            per_page,
            last_page,
        }
    }
}

// ─── Dashboard ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentModification {
    pub id: String,
    pub name: String,
    pub category: String,
    pub car_id: String,
    pub car_name: String,
    pub installation_date: Option<String>,
    pub cost: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardResponse {
    pub cars_count: i64,
    pub modifications_count: i64,
    pub active_modifications_count: i64,
    pub total_spent: f64,
    pub recent_modifications: Vec<RecentModification>,
}

// ─── Track days ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackResponse {
    pub id: String,
    pub name: String,
    pub location: String,
    pub website: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizerResponse {
    pub id: String,
    pub name: String,
    pub website: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventResponse {
    pub id: String,
    pub title: String,
    pub start_date: String,
    pub end_date: Option<String>,
    pub website: Option<String>,
    pub track: TrackResponse,
    pub organizer: OrganizerResponse,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListTracksResponse {
    pub tracks: Vec<TrackResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListOrganizersResponse {
    pub organizers: Vec<OrganizerResponse>,
}

/// Input document of `garage-server import-events`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct EventImport {
    #[serde(default)]
    pub tracks: Vec<TrackResponse>,
    #[serde(default)]
    pub organizers: Vec<OrganizerResponse>,
    #[serde(default)]
    pub events: Vec<EventImportRow>,
}

/// An event in an import document; references track and organizer by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventImportRow {
    pub id: String,
    pub track_id: String,
    pub organizer_id: String,
    pub title: String,
    pub start_date: String,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

// ─── Health ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Generic `{ "ok": true }` acknowledgement.
#[derive(Debug, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

// ─── Service Error ───────────────────────────────────────────────────────────

/// Per-field validation messages, ordered by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> &BTreeMap<String, Vec<String>> {
        &self.0
    }

    /// `Ok(())` when nothing was recorded, `Validation` otherwise.
    pub fn into_result(self) -> Result<(), ServiceError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::Validation(self))
        }
    }
}

/// Framework-agnostic service error, mapped to an HTTP status by the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    Validation(ValidationErrors),
    Internal(String),
}

/// Message used for every validation failure.
pub const VALIDATION_MESSAGE: &str = "The given data was invalid.";

/// Message used for every policy denial.
pub const FORBIDDEN_MESSAGE: &str = "This action is unauthorized.";

impl ServiceError {
    /// HTTP status code as a `u16`.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::Validation(_) => 422,
            Self::Internal(_) => 500,
        }
    }

    /// The error message.
    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest(m)
            | Self::Unauthorized(m)
            | Self::Forbidden(m)
            | Self::NotFound(m)
            | Self::Conflict(m)
            | Self::Internal(m) => m,
            Self::Validation(_) => VALIDATION_MESSAGE,
        }
    }

    /// A validation error on a single field.
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add(field, message);
        Self::Validation(errors)
    }

    /// Build a closure that turns a DB/IO error into `Internal`.
    pub fn from_db<E: std::fmt::Display>(context: &str) -> impl FnOnce(E) -> Self + '_ {
        move |e| Self::Internal(format!("{context}: {e}"))
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ServiceError {}

// ─── Error JSON shape ────────────────────────────────────────────────────────

/// JSON body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<BTreeMap<String, Vec<String>>>,
}

impl From<&ServiceError> for ApiError {
    fn from(e: &ServiceError) -> Self {
        Self {
            error: e.message().to_string(),
            errors: match e {
                ServiceError::Validation(v) => Some(v.fields().clone()),
                _ => None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn car_request_distinguishes_absent_from_null() {
        let req: CarRequest = serde_json::from_str(r#"{"make":"Mazda","nickname":null}"#).unwrap();
        assert_eq!(req.make, Some(Some("Mazda".to_string())));
        assert_eq!(req.nickname, Some(None));
        assert_eq!(req.model, None);
    }

    #[test]
    fn paginated_last_page_rounds_up() {
        let page: Paginated<u8> = Paginated::new(vec![], 31, 1, 15);
        assert_eq!(page.last_page, 3);
        let empty: Paginated<u8> = Paginated::new(vec![], 0, 1, 15);
        assert_eq!(empty.last_page, 1);
    }

    #[test]
    fn validation_error_serializes_field_errors() {
        let err = ServiceError::invalid("make", "The make field is required.");
        assert_eq!(err.status_code(), 422);
        let body = serde_json::to_value(ApiError::from(&err)).unwrap();
        assert_eq!(body["error"], VALIDATION_MESSAGE);
        assert_eq!(body["errors"]["make"][0], "The make field is required.");
    }

    #[test]
    fn display_name_prefers_nickname() {
        assert_eq!(car_display_name(Some("Roadster"), 1990, "Mazda", "MX-5"), "Roadster");
        assert_eq!(car_display_name(Some("  "), 1990, "Mazda", "MX-5"), "1990 Mazda MX-5");
        assert_eq!(car_display_name(None, 1990, "Mazda", "MX-5"), "1990 Mazda MX-5");
    }
}
