#[macro_use]
extern crate rocket;

mod api;
mod auth;
mod billing;
mod db;
mod env;
mod error;
mod models;
mod spotify;
mod subscription;
mod telemetry;
#[cfg(test)]
mod test;
mod validation;

use std::str::FromStr;
use std::sync::Mutex;

use api::{
    api_add_manager, api_change_password, api_create_artist, api_create_track, api_delete_artist,
    api_delete_track, api_get_artist, api_get_track, api_list_artists, api_list_calculations,
    api_list_earnings, api_list_notifications, api_list_tracks, api_login, api_logout,
    api_mark_notification_read, api_me, api_record_earning, api_register_user, api_remove_manager,
    api_save_calculation, api_update_artist, api_update_checklist, api_update_files,
    api_update_profile, api_update_track, health,
};
use auth::{forbidden_api, payment_required_api, unauthorized_api};
use billing::{
    StripeClient, api_checkout_complete, api_create_checkout, api_create_guest_checkout,
    api_create_portal, api_stripe_webhook, api_verify_subscription,
};
use db::clean_expired_sessions;
use env::AppConfig;
use once_cell::sync::Lazy;
use rocket::fairing::AdHoc;
use rocket::{Build, Rocket, tokio};
use spotify::{api_spotify_auth, api_spotify_callback};
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;
use telemetry::{OtelGuard, TelemetryFairing, init_tracing, shutdown_telemetry};
use tracing::info;

pub static TELEMETRY_GUARD: Lazy<Mutex<Option<OtelGuard>>> = Lazy::new(|| Mutex::new(None));

#[launch]
async fn rocket() -> _ {
    if let Err(e) = env::load_environment() {
        eprintln!("Failed to load environment files: {}", e);
    }

    init_tracing();

    let config = AppConfig::from_env().expect("Incomplete application configuration");

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:royalty-tracker.db".to_string());

    let options = SqliteConnectOptions::from_str(&database_url)
        .expect("Invalid DATABASE_URL")
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePool::connect_with(options)
        .await
        .expect("Failed to connect to SQLite database");

    let pool_clone = pool.clone();

    tokio::spawn(async move {
        tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;

        loop {
            match clean_expired_sessions(&pool_clone).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Cleaned up {} expired sessions", count);
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to clean expired sessions: {}", e);
                }
            }

            tokio::time::sleep(tokio::time::Duration::from_secs(3600)).await;
        }
    });

    info!("Running database migrations...");
    match sqlx::migrate!("./migrations").run(&pool).await {
        Ok(_) => info!("Migrations completed successfully"),
        Err(e) => {
            tracing::error!("Failed to run migrations: {}", e);
            panic!("Database migration failed: {}", e);
        }
    }

    init_rocket(pool, config).await
}

pub async fn init_rocket(pool: SqlitePool, config: AppConfig) -> Rocket<Build> {
    info!("Starting royalty tracker");

    let stripe = StripeClient::new(&config.stripe);

    rocket::build()
        .manage(pool)
        .manage(stripe)
        .manage(config)
        .mount(
            "/api",
            routes![
                api_login,
                api_logout,
                api_register_user,
                api_me,
                api_update_profile,
                api_change_password,
                api_create_artist,
                api_list_artists,
                api_get_artist,
                api_update_artist,
                api_delete_artist,
                api_add_manager,
                api_remove_manager,
                api_create_track,
                api_list_tracks,
                api_get_track,
                api_update_track,
                api_update_checklist,
                api_update_files,
                api_delete_track,
                api_save_calculation,
                api_list_calculations,
                api_record_earning,
                api_list_earnings,
                api_list_notifications,
                api_mark_notification_read,
                api_create_checkout,
                api_create_guest_checkout,
                api_create_portal,
                api_verify_subscription,
                api_checkout_complete,
                api_stripe_webhook,
                api_spotify_auth,
                api_spotify_callback,
            ],
        )
        .register(
            "/api",
            catchers![unauthorized_api, payment_required_api, forbidden_api],
        )
        .mount("/api", routes![health])
        .attach(TelemetryFairing)
        .attach(AdHoc::on_shutdown("Telemetry shutdown", |_| {
            Box::pin(async {
                shutdown_telemetry();
            })
        }))
}
