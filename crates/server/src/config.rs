use std::path::PathBuf;

use garage_api::crypto;

/// Default upload ceiling for car images (5 MiB).
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Server configuration loaded from environment variables.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub web_dir: PathBuf,
    pub port: u16,
    pub base_url: String,
    pub jwt_secret: String,
    pub registration_open: bool,
    pub max_image_bytes: usize,
    pub password_iterations: u32,
    pub asset_version: String,
}

impl AppConfig {
    /// Read the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match get("PORT").map(|p| p.parse::<u16>()) {
            Some(Ok(port)) => port,
            Some(Err(_)) => {
                tracing::warn!("PORT is not a valid port number, using 3000");
                3000
            }
            None => 3000,
        };
        let base_url = get("BASE_URL").unwrap_or_else(|| format!("http://localhost:{port}"));

        let jwt_secret = match get("JWT_SECRET") {
            Some(secret) => secret,
            None => {
                tracing::warn!(
                    "JWT_SECRET not set, using a random secret; sessions will not survive a restart"
                );
                crypto::generate_token().unwrap_or_default()
            }
        };

        let registration_open = match get("GARAGE_REGISTRATION").as_deref() {
            None | Some("open") => true,
            Some("closed") => false,
            Some(other) => {
                tracing::warn!("unknown GARAGE_REGISTRATION value `{other}`, keeping registration open");
                true
            }
        };

        Self {
            data_dir: get("GARAGE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data")),
            web_dir: get("GARAGE_WEB_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("web/dist")),
            port,
            base_url,
            jwt_secret,
            registration_open,
            max_image_bytes: parse_or(&get, "GARAGE_MAX_IMAGE_BYTES", DEFAULT_MAX_IMAGE_BYTES),
            password_iterations: parse_or(
                &get,
                "GARAGE_PASSWORD_ITERATIONS",
                crypto::DEFAULT_PBKDF2_ITERATIONS,
            )
            .max(1),
            asset_version: get("GARAGE_ASSET_VERSION")
                .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
        }
    }

    /// Whether cookies should carry the `Secure` attribute.
    pub fn secure_cookies(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

fn parse_or<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    match get(key) {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("{key}=`{raw}` is not valid, using the default");
            default
        }),
    }
}
