use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{Duration, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use rocket::State;
use rocket::http::{Cookie, CookieJar, SameSite, Status};
use rocket::response::Redirect;
use serde::Deserialize;
use sqlx::SqlitePool;
use url::Url;

use crate::auth::User;
use crate::db::upsert_spotify_tokens;
use crate::env::{AppConfig, SpotifyConfig};
use crate::error::AppError;

const AUTHORIZE_ENDPOINT: &str = "https://accounts.spotify.com/authorize";
const TOKEN_ENDPOINT: &str = "https://accounts.spotify.com/api/token";
const SCOPES: &str = "user-read-email user-read-private";

const STATE_COOKIE: &str = "spotify_oauth_state";
const STATE_LEN: usize = 32;

pub fn generate_state() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(STATE_LEN)
        .map(char::from)
        .collect()
}

/// Build the accounts.spotify.com authorization URL for this login.
pub fn authorization_url(config: &SpotifyConfig, state: &str) -> Result<Url, AppError> {
    let mut url = Url::parse(AUTHORIZE_ENDPOINT)
        .map_err(|e| AppError::Internal(format!("Bad authorize endpoint: {}", e)))?;

    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &config.client_id)
        .append_pair("redirect_uri", &config.redirect_uri)
        .append_pair("scope", SCOPES)
        .append_pair("state", state);

    Ok(url)
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: String,
}

/// Exchange an authorization code for tokens. Spotify requires HTTP Basic
/// client authentication on the token endpoint.
pub async fn exchange_code(config: &SpotifyConfig, code: &str) -> Result<TokenResponse, AppError> {
    let credentials = format!("{}:{}", config.client_id, config.client_secret);
    let encoded = STANDARD.encode(credentials.as_bytes());

    let form = [
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", config.redirect_uri.as_str()),
    ];

    let response = reqwest::Client::new()
        .post(TOKEN_ENDPOINT)
        .header(reqwest::header::AUTHORIZATION, format!("Basic {}", encoded))
        .header(reqwest::header::ACCEPT, "application/json")
        .form(&form)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::ExternalService(format!(
            "Spotify token exchange returned {}: {}",
            status, body
        )));
    }

    Ok(response.json::<TokenResponse>().await?)
}

#[get("/spotify/auth")]
pub fn api_spotify_auth(
    user: User,
    cookies: &CookieJar<'_>,
    config: &State<AppConfig>,
) -> Result<Redirect, Status> {
    let state = generate_state();

    cookies.add_private(
        Cookie::build((STATE_COOKIE, state.clone()))
            .same_site(SameSite::Lax)
            .http_only(true)
            .max_age(rocket::time::Duration::minutes(15)),
    );

    let url = authorization_url(&config.spotify, &state)
        .map_err(|e| e.to_status_with_log("Building Spotify authorization URL"))?;

    tracing::info!(user_id = user.id, "Redirecting to Spotify authorization");
    Ok(Redirect::to(url.to_string()))
}

#[get("/spotify/callback?<code>&<state>&<error>")]
pub async fn api_spotify_callback(
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    user: User,
    cookies: &CookieJar<'_>,
    db: &State<SqlitePool>,
    config: &State<AppConfig>,
) -> Result<Redirect, Status> {
    let expected_state = cookies
        .get_private(STATE_COOKIE)
        .map(|c| c.value().to_string());
    cookies.remove_private(Cookie::build(STATE_COOKIE));

    if let Some(error) = error {
        tracing::warn!(user_id = user.id, error = %error, "Spotify authorization declined");
        return Ok(Redirect::to(format!(
            "{}/settings?spotify=denied",
            config.public_app_url
        )));
    }

    match (&state, &expected_state) {
        (Some(received), Some(expected)) if received == expected => {}
        _ => {
            tracing::warn!(user_id = user.id, "Spotify OAuth state mismatch");
            return Err(Status::BadRequest);
        }
    }

    let Some(code) = code else {
        return Err(Status::BadRequest);
    };

    let tokens = exchange_code(&config.spotify, &code)
        .await
        .map_err(|e| e.to_status_with_log("Spotify code exchange"))?;

    let expires_at = (Utc::now() + Duration::seconds(tokens.expires_in)).naive_utc();
    upsert_spotify_tokens(
        db,
        user.id,
        &tokens.access_token,
        tokens.refresh_token.as_deref(),
        &tokens.scope,
        expires_at,
    )
    .await
    .map_err(|e| e.to_status_with_log("Storing Spotify tokens"))?;

    tracing::info!(user_id = user.id, "Spotify account linked");
    Ok(Redirect::to(format!(
        "{}/settings?spotify=connected",
        config.public_app_url
    )))
}
