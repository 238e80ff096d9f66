use crate::auth::ArtistRole;
use crate::db::{
    add_artist_manager, apply_status_signal, create_artist_with_owner, create_track, create_user,
};
use crate::env::{AppConfig, SpotifyConfig, StripeConfig};
use crate::error::AppError;
use crate::init_rocket;
use crate::subscription::{StatusSignal, SubscriptionStatus};
use chrono::Utc;
use rocket::http::ContentType;
use rocket::local::asynchronous::Client;
use serde_json::json;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Once;

static INIT: Once = Once::new();
pub static STANDARD_PASSWORD: &str = "password123";

#[derive(Default)]
pub struct TestDbBuilder {
    users: Vec<TestUser>,
    artists: Vec<TestArtist>,
    managers: Vec<TestManager>,
    tracks: Vec<TestTrack>,
}

pub struct TestUser {
    pub email: String,
    pub display_name: Option<String>,
    pub status: Option<SubscriptionStatus>,
}

pub struct TestArtist {
    pub name: String,
    pub owner_email: Option<String>,
}

pub struct TestManager {
    pub artist_name: String,
    pub email: String,
    pub role: ArtistRole,
}

pub struct TestTrack {
    pub title: String,
    pub artist_name: Option<String>,
}

impl TestDbBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A user with no confirmed subscription.
    pub fn user(mut self, email: &str, display_name: Option<&str>) -> Self {
        self.users.push(TestUser {
            email: email.to_string(),
            display_name: display_name.map(String::from),
            status: None,
        });
        self
    }

    /// A user whose subscription status has been confirmed via webhook.
    pub fn subscriber(
        mut self,
        email: &str,
        display_name: Option<&str>,
        status: SubscriptionStatus,
    ) -> Self {
        self.users.push(TestUser {
            email: email.to_string(),
            display_name: display_name.map(String::from),
            status: Some(status),
        });
        self
    }

    pub fn artist(mut self, name: &str, owner_email: Option<&str>) -> Self {
        self.artists.push(TestArtist {
            name: name.to_string(),
            owner_email: owner_email.map(String::from),
        });
        self
    }

    pub fn manager(mut self, artist_name: &str, email: &str, role: ArtistRole) -> Self {
        self.managers.push(TestManager {
            artist_name: artist_name.to_string(),
            email: email.to_string(),
            role,
        });
        self
    }

    pub fn track(mut self, title: &str, artist_name: Option<&str>) -> Self {
        self.tracks.push(TestTrack {
            title: title.to_string(),
            artist_name: artist_name.map(String::from),
        });
        self
    }

    pub async fn build(self) -> Result<TestDb, AppError> {
        INIT.call_once(|| {
            let _ = env_logger::builder().is_test(true).try_init();
        });

        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| AppError::Internal(format!("sqlite options: {}", e)))?
            .foreign_keys(true);

        // A single connection keeps every query on the same in-memory db.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        let mut user_id_map: HashMap<String, i64> = HashMap::new();
        let mut artist_id_map: HashMap<String, i64> = HashMap::new();
        let mut track_id_map: HashMap<String, i64> = HashMap::new();

        for user in &self.users {
            let user_id = create_user(
                &pool,
                &user.email,
                STANDARD_PASSWORD,
                user.display_name.as_deref().unwrap_or(""),
            )
            .await?;

            if let Some(status) = user.status {
                apply_status_signal(&pool, user_id, &StatusSignal::webhook(status, Utc::now()))
                    .await?;
            }

            user_id_map.insert(user.email.clone(), user_id);
        }

        for artist in &self.artists {
            let owner_id = match &artist.owner_email {
                Some(email) => user_id_map.get(email).copied(),
                None => self.users.first().map(|u| user_id_map[&u.email]),
            };

            if let Some(owner_id) = owner_id {
                let artist_id =
                    create_artist_with_owner(&pool, owner_id, &artist.name, "").await?;
                artist_id_map.insert(artist.name.clone(), artist_id);
            }
        }

        for manager in &self.managers {
            let artist_id = artist_id_map
                .get(&manager.artist_name)
                .copied()
                .ok_or_else(|| AppError::Internal("Unknown artist in builder".to_string()))?;
            let user_id = user_id_map
                .get(&manager.email)
                .copied()
                .ok_or_else(|| AppError::Internal("Unknown user in builder".to_string()))?;

            add_artist_manager(&pool, artist_id, user_id, manager.role).await?;
        }

        for track in &self.tracks {
            let artist_id = match &track.artist_name {
                Some(name) => artist_id_map.get(name).copied(),
                None => artist_id_map.values().next().copied(),
            };

            if let Some(artist_id) = artist_id {
                let track_id = create_track(&pool, artist_id, &track.title, None, None).await?;
                track_id_map.insert(track.title.clone(), track_id);
            }
        }

        Ok(TestDb {
            pool,
            user_id_map,
            artist_id_map,
            track_id_map,
        })
    }
}

pub struct TestDb {
    pub pool: Pool<Sqlite>,
    pub user_id_map: HashMap<String, i64>,
    pub artist_id_map: HashMap<String, i64>,
    pub track_id_map: HashMap<String, i64>,
}

impl TestDb {
    pub fn user_id(&self, email: &str) -> Option<i64> {
        self.user_id_map.get(email).copied()
    }

    pub fn artist_id(&self, name: &str) -> Option<i64> {
        self.artist_id_map.get(name).copied()
    }

    pub fn track_id(&self, title: &str) -> Option<i64> {
        self.track_id_map.get(title).copied()
    }
}

pub static TEST_WEBHOOK_SECRET: &str = "whsec_test123secret456";

pub fn test_config() -> AppConfig {
    AppConfig {
        public_app_url: "https://app.example.com".to_string(),
        stripe: StripeConfig {
            secret_key: "sk_test_xxx".to_string(),
            webhook_secret: Some(TEST_WEBHOOK_SECRET.to_string()),
            price_id: "price_test_pro".to_string(),
            // Nothing listens here; tests never hit the network on purpose.
            api_base: "http://127.0.0.1:9".to_string(),
        },
        spotify: SpotifyConfig {
            client_id: "spotify_client".to_string(),
            client_secret: "spotify_secret".to_string(),
            redirect_uri: "https://app.example.com/api/spotify/callback".to_string(),
        },
    }
}

pub async fn setup_test_client(test_db: TestDb) -> (Client, TestDb) {
    setup_test_client_with_config(test_db, test_config()).await
}

pub async fn setup_test_client_with_config(
    test_db: TestDb,
    config: AppConfig,
) -> (Client, TestDb) {
    let rocket = init_rocket(test_db.pool.clone(), config).await;
    let client = Client::tracked(rocket)
        .await
        .expect("Failed to build test client");

    (client, test_db)
}

/// Log a builder-created user in; the tracked client carries the session
/// cookies from here on.
pub async fn login_test_user(client: &Client, email: &str) {
    let response = client
        .post("/api/login")
        .header(ContentType::JSON)
        .body(
            json!({
                "email": email,
                "password": STANDARD_PASSWORD
            })
            .to_string(),
        )
        .dispatch()
        .await;

    assert_eq!(response.status(), rocket::http::Status::Ok);

    let body = response.into_string().await.unwrap();
    let login: crate::api::LoginResponse = serde_json::from_str(&body).unwrap();
    assert!(login.success, "Login failed for {}", email);
}
