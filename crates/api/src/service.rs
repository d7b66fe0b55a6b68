//! Shared business logic: framework-agnostic pure functions.
//!
//! Route handlers stay thin adapters around these: request validation and
//! normalization, token issuance, and auth token resolution.

use chrono::NaiveDate;
use serde_json::Value;

use crate::{
    AuthTokenResponse, CarRequest, EventImportRow, ModificationRequest, ServiceError,
    ValidationErrors,
};

// ─── Field helpers ──────────────────────────────────────────────────────────

/// Whether a request creates a record or partially updates one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Create,
    Update,
}

fn label(field: &str) -> String {
    field.replace('_', " ")
}

fn required_message(field: &str) -> String {
    format!("The {} field is required.", label(field))
}

fn max_message(field: &str, max: usize) -> String {
    format!(
        "The {} field must not be greater than {max} characters.",
        label(field)
    )
}

/// Trim; empty strings count as null.
fn normalize(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn required_string(
    errors: &mut ValidationErrors,
    field: &str,
    value: &Option<Option<String>>,
    mode: Mode,
    max: usize,
) -> Option<String> {
    let Some(value) = value else {
        if mode == Mode::Create {
            errors.add(field, required_message(field));
        }
        return None;
    };
    match value.as_deref().and_then(normalize) {
        None => {
            errors.add(field, required_message(field));
            None
        }
        Some(s) if s.chars().count() > max => {
            errors.add(field, max_message(field, max));
            None
        }
        Some(s) => Some(s),
    }
}

fn nullable_string(
    errors: &mut ValidationErrors,
    field: &str,
    value: &Option<Option<String>>,
    max: usize,
) -> Option<Option<String>> {
    let value = value.as_ref()?;
    match value.as_deref().and_then(normalize) {
        None => Some(None),
        Some(s) if s.chars().count() > max => {
            errors.add(field, max_message(field, max));
            None
        }
        Some(s) => Some(Some(s)),
    }
}

/// Blank strings count as null, like the string fields.
fn scalar(value: &Option<Option<Value>>) -> Option<Option<&Value>> {
    value.as_ref().map(|v| {
        v.as_ref()
            .filter(|v| !matches!(v, Value::String(s) if s.trim().is_empty()))
    })
}

/// A JSON integer, a whole float, or a numeric string from a form post.
fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < 1e15)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// `true`, `false`, `1`, `0`, `"1"`, `"0"`, `"true"` and `"false"`.
fn as_boolean(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        Value::String(s) => match s.trim() {
            "1" | "true" => Some(true),
            "0" | "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

// ─── Accounts ───────────────────────────────────────────────────────────────

/// Validate and normalize an email address. Returns the lowercased, trimmed email.
pub fn validate_email(email: &str) -> Result<String, ServiceError> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        return Err(ServiceError::invalid("email", required_message("email")));
    }
    let valid_shape = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
    if !valid_shape || email.len() > 254 {
        return Err(ServiceError::invalid(
            "email",
            "The email field must be a valid email address.",
        ));
    }
    Ok(email)
}

/// Validate a password (8-128 characters).
pub fn validate_password(password: &str) -> Result<(), ServiceError> {
    let len = password.chars().count();
    if len < 8 {
        return Err(ServiceError::invalid(
            "password",
            "The password field must be at least 8 characters.",
        ));
    }
    if len > 128 {
        return Err(ServiceError::invalid("password", max_message("password", 128)));
    }
    Ok(())
}

/// Validate and normalize a display name. Returns the trimmed name.
pub fn validate_name(name: &str) -> Result<String, ServiceError> {
    let trimmed = name.trim().to_string();
    if trimmed.is_empty() {
        return Err(ServiceError::invalid("name", required_message("name")));
    }
    if trimmed.chars().count() > 255 {
        return Err(ServiceError::invalid("name", max_message("name", 255)));
    }
    Ok(trimmed)
}

/// Validate a registration request, collecting every field error.
pub fn validate_registration(
    name: &str,
    email: &str,
    password: &str,
) -> Result<(String, String), ServiceError> {
    let mut errors = ValidationErrors::new();
    let results = [
        validate_name(name).map(Some),
        validate_email(email).map(Some),
        validate_password(password).map(|()| None),
    ];
    let mut values = Vec::new();
    for result in results {
        match result {
            Ok(Some(v)) => values.push(v),
            Ok(None) => {}
            Err(ServiceError::Validation(e)) => {
                for (field, messages) in e.fields() {
                    for m in messages {
                        errors.add(field, m.clone());
                    }
                }
            }
            Err(other) => return Err(other),
        }
    }
    errors.into_result()?;
    let mut values = values.into_iter();
    match (values.next(), values.next()) {
        (Some(name), Some(email)) => Ok((name, email)),
        _ => Err(ServiceError::Internal("registration validation".into())),
    }
}

// ─── Personal access tokens ─────────────────────────────────────────────────

/// Prefix that marks a bearer token as a personal access token.
pub const PERSONAL_TOKEN_PREFIX: &str = "gpat_";

/// Generate a new personal access token with the `gpat_` prefix.
pub fn generate_personal_token() -> String {
    format!("{PERSONAL_TOKEN_PREFIX}{}", uuid::Uuid::new_v4().simple())
}

/// Prefix used for operator-facing token previews.
pub fn token_prefix(token: &str) -> String {
    token.chars().take(12).collect()
}

/// Validate a token name (1-100 characters).
pub fn validate_token_name(name: &str) -> Result<String, ServiceError> {
    let trimmed = name.trim().to_string();
    if trimmed.is_empty() {
        return Err(ServiceError::invalid("name", required_message("name")));
    }
    if trimmed.chars().count() > 100 {
        return Err(ServiceError::invalid("name", max_message("name", 100)));
    }
    Ok(trimmed)
}

// ─── Auth Token Resolution ──────────────────────────────────────────────────

/// Result of resolving a bearer token string.
#[derive(Debug, PartialEq, Eq)]
pub enum AuthToken {
    /// JWT was valid; contains the user id.
    Jwt(String),
    /// Personal access token (`gpat_` prefix); caller must look it up.
    Personal(String),
}

/// Resolve a bearer token into either a verified JWT user id or a personal token.
pub fn resolve_auth_token(
    token: &str,
    jwt_secret: &str,
    now: u64,
) -> Result<AuthToken, ServiceError> {
    if token.starts_with(PERSONAL_TOKEN_PREFIX) {
        return Ok(AuthToken::Personal(token.to_string()));
    }

    if jwt_secret.is_empty() {
        return Err(ServiceError::Unauthorized(
            "token authentication not configured".into(),
        ));
    }

    let user_id = crate::crypto::verify_jwt(token, jwt_secret, now)?;
    Ok(AuthToken::Jwt(user_id))
}

// ─── Token Bundle ───────────────────────────────────────────────────────────

/// Pre-computed token bundle; the caller only performs the refresh-token INSERT.
pub struct TokenBundle {
    /// SHA-256 hash of the refresh token (stored in DB).
    pub token_hash: String,
    /// UUID primary key for the refresh_tokens row.
    pub token_id: String,
    /// `datetime` string for the refresh token expiry.
    pub expires_at: String,
    /// Ready-to-return API response.
    pub response: AuthTokenResponse,
}

/// Build a [`TokenBundle`] containing a JWT, a refresh token, and the response.
pub fn prepare_token_bundle(
    jwt_secret: &str,
    user_id: &str,
    name: &str,
    now_unix: u64,
) -> Result<TokenBundle, ServiceError> {
    use crate::crypto;

    let access_token = crypto::sign_jwt(user_id, jwt_secret, now_unix);
    let refresh_token = crypto::generate_token()?;
    let token_hash = crypto::hash_token(&refresh_token);
    let token_id = uuid::Uuid::new_v4().to_string();
    let expires_at = sqlite_datetime(now_unix + crypto::REFRESH_EXPIRY_SECS)?;

    Ok(TokenBundle {
        token_hash,
        token_id,
        expires_at,
        response: AuthTokenResponse {
            access_token,
            refresh_token,
            expires_in: crypto::JWT_EXPIRY_SECS,
            user_id: user_id.to_string(),
            name: name.to_string(),
        },
    })
}

/// Format a unix timestamp the way SQLite's `datetime()` does.
pub fn sqlite_datetime(unix: u64) -> Result<String, ServiceError> {
    let secs = i64::try_from(unix).map_err(|_| ServiceError::Internal("timestamp overflow".into()))?;
    let dt = chrono::DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| ServiceError::Internal("invalid timestamp".into()))?;
    Ok(dt.format("%Y-%m-%d %H:%M:%S").to_string())
}

// ─── Cars ───────────────────────────────────────────────────────────────────

/// First year a production car could have been built.
pub const MIN_CAR_YEAR: i64 = 1886;

/// Validated, normalized car fields. `None` means "leave unchanged".
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CarChanges {
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i64>,
    pub nickname: Option<Option<String>>,
    pub vin: Option<Option<String>>,
    pub notes: Option<Option<String>>,
}

impl CarChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn valid_vin(vin: &str) -> bool {
    vin.len() == 17
        && vin
            .chars()
            .all(|c| c.is_ascii_digit() || (c.is_ascii_uppercase() && !matches!(c, 'I' | 'O' | 'Q')))
}

/// Validate a car create/update request.
///
/// On [`Mode::Create`] the returned `make`, `model` and `year` are always set.
pub fn validate_car(
    req: &CarRequest,
    mode: Mode,
    current_year: i64,
) -> Result<CarChanges, ServiceError> {
    let mut errors = ValidationErrors::new();
    let make = required_string(&mut errors, "make", &req.make, mode, 255);
    let model = required_string(&mut errors, "model", &req.model, mode, 255);

    let max_year = current_year + 1;
    let year = match scalar(&req.year) {
        None => {
            if mode == Mode::Create {
                errors.add("year", required_message("year"));
            }
            None
        }
        Some(None) => {
            errors.add("year", required_message("year"));
            None
        }
        Some(Some(raw)) => match as_integer(raw) {
            None => {
                errors.add("year", "The year field must be an integer.");
                None
            }
            Some(y) if !(MIN_CAR_YEAR..=max_year).contains(&y) => {
                errors.add(
                    "year",
                    format!("The year field must be between {MIN_CAR_YEAR} and {max_year}."),
                );
                None
            }
            Some(y) => Some(y),
        },
    };

    let nickname = nullable_string(&mut errors, "nickname", &req.nickname, 255);
    let notes = nullable_string(&mut errors, "notes", &req.notes, 5000);
    let vin = match nullable_string(&mut errors, "vin", &req.vin, 17) {
        Some(Some(vin)) => {
            let vin = vin.to_uppercase();
            if valid_vin(&vin) {
                Some(Some(vin))
            } else {
                errors.add("vin", "The vin field must be a valid 17 character VIN.");
                None
            }
        }
        other => other,
    };

    errors.into_result()?;
    Ok(CarChanges {
        make,
        model,
        year,
        nickname,
        vin,
        notes,
    })
}

// ─── Modifications ──────────────────────────────────────────────────────────

/// Upper bound for a single modification's cost.
pub const MAX_COST: f64 = 9_999_999.99;

/// Validated, normalized modification fields. `None` means "leave unchanged".
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ModificationChanges {
    pub name: Option<String>,
    pub category: Option<String>,
    pub brand: Option<Option<String>>,
    pub vendor: Option<Option<String>>,
    pub installation_date: Option<Option<String>>,
    pub cost: Option<Option<f64>>,
    pub is_active: Option<bool>,
    pub notes: Option<Option<String>>,
}

/// Validate a modification create/update request.
///
/// On [`Mode::Create`] `name` and `category` are always set and `is_active`
/// defaults to `true`.
pub fn validate_modification(
    req: &ModificationRequest,
    mode: Mode,
) -> Result<ModificationChanges, ServiceError> {
    let mut errors = ValidationErrors::new();
    let name = required_string(&mut errors, "name", &req.name, mode, 255);
    let category = required_string(&mut errors, "category", &req.category, mode, 100);
    let brand = nullable_string(&mut errors, "brand", &req.brand, 255);
    let vendor = nullable_string(&mut errors, "vendor", &req.vendor, 255);
    let notes = nullable_string(&mut errors, "notes", &req.notes, 5000);

    let installation_date = match nullable_string(
        &mut errors,
        "installation_date",
        &req.installation_date,
        10,
    ) {
        Some(Some(date)) => match parse_date(&date) {
            Some(parsed) => Some(Some(parsed.format("%Y-%m-%d").to_string())),
            None => {
                errors.add(
                    "installation_date",
                    "The installation date field must be a valid date (YYYY-MM-DD).",
                );
                None
            }
        },
        other => other,
    };

    let cost = match scalar(&req.cost) {
        None => None,
        Some(None) => Some(None),
        Some(Some(raw)) => match as_number(raw) {
            None => {
                errors.add("cost", "The cost field must be a number.");
                None
            }
            Some(c) if !c.is_finite() || !(0.0..=MAX_COST).contains(&c) => {
                errors.add(
                    "cost",
                    format!("The cost field must be between 0 and {MAX_COST}."),
                );
                None
            }
            Some(c) => Some(Some((c * 100.0).round() / 100.0)),
        },
    };

    let is_active = match scalar(&req.is_active) {
        None if mode == Mode::Create => Some(true),
        None => None,
        Some(raw) => match raw.and_then(as_boolean) {
            Some(b) => Some(b),
            None => {
                errors.add("is_active", "The is active field must be true or false.");
                None
            }
        },
    };

    errors.into_result()?;
    Ok(ModificationChanges {
        name,
        category,
        brand,
        vendor,
        installation_date,
        cost,
        is_active,
        notes,
    })
}

// ─── Track days ─────────────────────────────────────────────────────────────

/// Validate an imported event row: dates parse and the range is ordered.
pub fn validate_event_row(row: &EventImportRow) -> Result<(), ServiceError> {
    let mut errors = ValidationErrors::new();
    if row.title.trim().is_empty() {
        errors.add("title", required_message("title"));
    }
    let start = parse_date(&row.start_date);
    if start.is_none() {
        errors.add("start_date", "The start date field must be a valid date (YYYY-MM-DD).");
    }
    if let Some(end) = row.end_date.as_deref() {
        match (start, parse_date(end)) {
            (_, None) => {
                errors.add("end_date", "The end date field must be a valid date (YYYY-MM-DD).")
            }
            (Some(start), Some(end)) if end < start => errors.add(
                "end_date",
                "The end date field must be a date after or equal to start date.",
            ),
            _ => {}
        }
    }
    errors.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn car(json: &str) -> CarRequest {
        serde_json::from_str(json).unwrap()
    }

    fn modification(json: &str) -> ModificationRequest {
        serde_json::from_str(json).unwrap()
    }

    fn fields(err: ServiceError) -> Vec<String> {
        match err {
            ServiceError::Validation(v) => v.fields().keys().cloned().collect(),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_email() {
        assert_eq!(validate_email("  Alice@Example.COM ").unwrap(), "alice@example.com");
        assert!(validate_email("").is_err());
        assert!(validate_email("nope").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email(&format!("{}@x.io", "a".repeat(260))).is_err());
    }

    #[test]
    fn test_validate_password_bounds() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("12345678").is_ok());
        assert!(validate_password(&"p".repeat(128)).is_ok());
        assert!(validate_password(&"p".repeat(129)).is_err());
    }

    #[test]
    fn registration_collects_every_field_error() {
        let err = validate_registration(" ", "bad", "short").unwrap_err();
        assert_eq!(fields(err), vec!["email", "name", "password"]);
        let (name, email) = validate_registration(" Ann ", "ANN@x.io", "password1").unwrap();
        assert_eq!((name.as_str(), email.as_str()), ("Ann", "ann@x.io"));
    }

    #[test]
    fn create_car_requires_make_model_year() {
        let err = validate_car(&car("{}"), Mode::Create, 2026).unwrap_err();
        assert_eq!(fields(err), vec!["make", "model", "year"]);
    }

    #[test]
    fn update_car_allows_partial_and_clears_nullable() {
        let changes =
            validate_car(&car(r#"{"nickname":null,"notes":"  "}"#), Mode::Update, 2026).unwrap();
        assert_eq!(changes.make, None);
        assert_eq!(changes.nickname, Some(None));
        assert_eq!(changes.notes, Some(None));
        assert!(validate_car(&car("{}"), Mode::Update, 2026).unwrap().is_empty());
    }

    #[test]
    fn update_car_rejects_null_required_field() {
        let err = validate_car(&car(r#"{"make":null}"#), Mode::Update, 2026).unwrap_err();
        assert_eq!(fields(err), vec!["make"]);
    }

    #[test]
    fn car_year_bounds_follow_current_year() {
        let ok = car(r#"{"make":"Ford","model":"T","year":2027}"#);
        assert_eq!(validate_car(&ok, Mode::Create, 2026).unwrap().year, Some(2027));
        let future = car(r#"{"make":"Ford","model":"T","year":2028}"#);
        assert!(validate_car(&future, Mode::Create, 2026).is_err());
        let ancient = car(r#"{"make":"Benz","model":"Patent","year":1885}"#);
        assert!(validate_car(&ancient, Mode::Create, 2026).is_err());
    }

    #[test]
    fn vin_is_uppercased_and_checked() {
        let req = car(r#"{"vin":"jm1na3513l0123456"}"#);
        let changes = validate_car(&req, Mode::Update, 2026).unwrap();
        assert_eq!(changes.vin, Some(Some("JM1NA3513L0123456".to_string())));

        for bad in ["JM1NA3513L012345", "JM1NA3513L012345O", "JM1NA3513L01234 6"] {
            let req = CarRequest {
                vin: Some(Some(bad.to_string())),
                ..Default::default()
            };
            assert!(validate_car(&req, Mode::Update, 2026).is_err(), "{bad}");
        }
    }

    #[test]
    fn make_length_limit() {
        let req = CarRequest {
            make: Some(Some("m".repeat(256))),
            ..Default::default()
        };
        match validate_car(&req, Mode::Update, 2026).unwrap_err() {
            ServiceError::Validation(v) => assert_eq!(
                v.fields()["make"],
                vec!["The make field must not be greater than 255 characters.".to_string()]
            ),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn create_modification_defaults_active() {
        let changes =
            validate_modification(&modification(r#"{"name":"Coilovers","category":"suspension"}"#), Mode::Create)
                .unwrap();
        assert_eq!(changes.is_active, Some(true));
        assert_eq!(changes.cost, None);
    }

    #[test]
    fn modification_cost_and_date_rules() {
        let changes = validate_modification(
            &modification(r#"{"cost":129.999,"installation_date":"2024-02-29"}"#),
            Mode::Update,
        )
        .unwrap();
        assert_eq!(changes.cost, Some(Some(130.0)));
        assert_eq!(changes.installation_date, Some(Some("2024-02-29".to_string())));

        let err = validate_modification(
            &modification(r#"{"cost":-1,"installation_date":"2023-02-29","is_active":null}"#),
            Mode::Update,
        )
        .unwrap_err();
        assert_eq!(fields(err), vec!["cost", "installation_date", "is_active"]);
    }

    #[test]
    fn numeric_fields_accept_form_strings() {
        let changes = validate_car(
            &car(r#"{"make":"Mazda","model":"MX-5","year":"1990"}"#),
            Mode::Create,
            2026,
        )
        .unwrap();
        assert_eq!(changes.year, Some(1990));

        let changes = validate_modification(
            &modification(r#"{"cost":" 1200.50 ","is_active":"0"}"#),
            Mode::Update,
        )
        .unwrap();
        assert_eq!(changes.cost, Some(Some(1200.5)));
        assert_eq!(changes.is_active, Some(false));

        let changes = validate_modification(&modification(r#"{"cost":""}"#), Mode::Update).unwrap();
        assert_eq!(changes.cost, Some(None));
    }

    #[test]
    fn mistyped_scalars_are_field_errors() {
        match validate_car(&car(r#"{"year":"nineteen"}"#), Mode::Update, 2026).unwrap_err() {
            ServiceError::Validation(v) => assert_eq!(
                v.fields()["year"],
                vec!["The year field must be an integer.".to_string()]
            ),
            other => panic!("unexpected {other:?}"),
        }
        assert!(validate_car(&car(r#"{"year":1990.5}"#), Mode::Update, 2026).is_err());

        let err = validate_modification(
            &modification(r#"{"cost":"cheap","is_active":"maybe"}"#),
            Mode::Update,
        )
        .unwrap_err();
        assert_eq!(fields(err), vec!["cost", "is_active"]);
    }

    #[test]
    fn event_rows_need_ordered_dates() {
        let mut row = EventImportRow {
            id: "e1".into(),
            track_id: "t1".into(),
            organizer_id: "o1".into(),
            title: "Spring Sprint".into(),
            start_date: "2026-05-02".into(),
            end_date: Some("2026-05-03".into()),
            website: None,
        };
        assert!(validate_event_row(&row).is_ok());
        row.end_date = Some("2026-05-01".into());
        assert!(validate_event_row(&row).is_err());
        row.end_date = None;
        row.start_date = "May 2".into();
        assert!(validate_event_row(&row).is_err());
    }

    #[test]
    fn auth_token_resolution() {
        assert_eq!(
            resolve_auth_token("gpat_abc", "", 0).unwrap(),
            AuthToken::Personal("gpat_abc".into())
        );
        assert!(matches!(
            resolve_auth_token("eyJ.x.y", "", 0),
            Err(ServiceError::Unauthorized(_))
        ));
        let jwt = crate::crypto::sign_jwt("u1", "s", 10);
        assert_eq!(resolve_auth_token(&jwt, "s", 10).unwrap(), AuthToken::Jwt("u1".into()));
    }

    #[test]
    fn personal_tokens_have_prefix_and_preview() {
        let token = generate_personal_token();
        assert!(token.starts_with(PERSONAL_TOKEN_PREFIX));
        assert_eq!(token.len(), PERSONAL_TOKEN_PREFIX.len() + 32);
        assert_eq!(token_prefix(&token), &token[..12]);
    }

    #[test]
    fn sqlite_datetime_format() {
        assert_eq!(sqlite_datetime(0).unwrap(), "1970-01-01 00:00:00");
    }
}
