use std::path::Path;

use tracing::{info, warn};

use crate::error::AppError;

pub fn load_environment() -> Result<(), Box<dyn std::error::Error>> {
    let is_production =
        dotenvy::var("ROCKET_PROFILE").unwrap_or("development".to_string()) == "production";

    let env_files = if is_production {
        vec!["config/common.env", "config/prod.env", ".secrets.env"]
    } else {
        vec!["config/common.env", "config/dev.env", ".secrets.env"]
    };

    for env_file in env_files {
        load_env_file(env_file)?;
    }

    Ok(())
}

fn load_env_file(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !Path::new(path).exists() {
        warn!("Warning: Environment file {} not found, skipping", path);
        return Ok(());
    }

    dotenvy::from_filename_override(path)?;
    info!("Loaded environment from: {}", path);
    Ok(())
}

/// Typed view of the environment the external integrations need.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub public_app_url: String,
    pub stripe: StripeConfig,
    pub spotify: SpotifyConfig,
}

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    /// Absent means webhook delivery is refused; there is no unsigned fallback.
    pub webhook_secret: Option<String>,
    pub price_id: String,
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

const STRIPE_API_BASE: &str = "https://api.stripe.com";

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Ok(Self {
            public_app_url: required("PUBLIC_APP_URL")?,
            stripe: StripeConfig {
                secret_key: required("STRIPE_SECRET_KEY")?,
                webhook_secret: optional("STRIPE_WEBHOOK_SECRET"),
                price_id: required("STRIPE_PRICE_ID")?,
                api_base: optional("STRIPE_API_BASE")
                    .unwrap_or_else(|| STRIPE_API_BASE.to_string()),
            },
            spotify: SpotifyConfig {
                client_id: required("SPOTIFY_CLIENT_ID")?,
                client_secret: required("SPOTIFY_CLIENT_SECRET")?,
                redirect_uri: required("SPOTIFY_REDIRECT_URI")?,
            },
        })
    }
}

fn required(name: &str) -> Result<String, AppError> {
    std::env::var(name)
        .map_err(|_| AppError::Internal(format!("{} environment variable not set", name)))
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
