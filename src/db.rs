use crate::{
    auth::{ArtistRole, DbUser, DbUserSession, User, UserSession},
    error::AppError,
    models::{
        Artist, DbArtist, DbEarning, DbNotification, DbProfile, DbStreamCalculation, DbTrack,
        Earning, Notification, Profile, StreamCalculation, SyncChecklist, Track, TrackFiles,
    },
    subscription::{AccessState, SignalSource, StatusSignal, grace_period},
};
use chrono::{NaiveDateTime, Utc};
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument, warn};

const USER_COLUMNS: &str = "id, email, display_name, subscription_status, stripe_customer_id";
const PROFILE_COLUMNS: &str = "user_id, email, display_name, subscription_status, access_state, \
                               status_source, status_updated_at, grace_until, was_premium";

#[instrument(skip(pool))]
pub async fn get_user(pool: &Pool<Sqlite>, id: i64) -> Result<User, AppError> {
    info!("Fetching user by ID");
    let row = sqlx::query_as::<_, DbUser>(&format!(
        "SELECT {} FROM users WHERE id = ?",
        USER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(user) => Ok(User::from(user)),
        _ => Err(AppError::NotFound(format!(
            "User with id {} not found in database",
            id
        ))),
    }
}

#[instrument(skip(pool))]
pub async fn find_user_by_email(
    pool: &Pool<Sqlite>,
    email: &str,
) -> Result<Option<User>, AppError> {
    info!("Fetching user by email");
    let row = sqlx::query_as::<_, DbUser>(&format!(
        "SELECT {} FROM users WHERE email = ?",
        USER_COLUMNS
    ))
    .bind(email)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(User::from))
}

#[instrument(skip(pool))]
pub async fn find_user_by_customer_id(
    pool: &Pool<Sqlite>,
    customer_id: &str,
) -> Result<Option<User>, AppError> {
    info!("Fetching user by Stripe customer id");
    let row = sqlx::query_as::<_, DbUser>(&format!(
        "SELECT {} FROM users WHERE stripe_customer_id = ?",
        USER_COLUMNS
    ))
    .bind(customer_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(User::from))
}

#[instrument(skip_all, fields(email))]
pub async fn create_user(
    pool: &Pool<Sqlite>,
    email: &str,
    password: &str,
    display_name: &str,
) -> Result<i64, AppError> {
    info!("Creating new user");

    let existing = sqlx::query("SELECT id FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await?;

    if existing.is_some() {
        return Err(AppError::Validation(format!(
            "An account for '{}' already exists",
            email
        )));
    }

    let hashed_password = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;

    let res = sqlx::query(
        "INSERT INTO users (email, password, display_name) VALUES (?, ?, ?)",
    )
    .bind(email)
    .bind(hashed_password)
    .bind(display_name)
    .execute(pool)
    .await?;

    let user_id = res.last_insert_rowid();

    sqlx::query("INSERT INTO profiles (user_id, email, display_name) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(email)
        .bind(display_name)
        .execute(pool)
        .await?;

    Ok(user_id)
}

#[instrument(skip_all, fields(email))]
pub async fn authenticate_user(
    pool: &Pool<Sqlite>,
    email: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    info!("Authenticating user");
    let row = sqlx::query_as::<_, DbCredentials>(
        "SELECT id, password FROM users WHERE email = ?",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(creds) => {
            let valid = bcrypt::verify(password, &creds.password).unwrap_or(false);
            if valid {
                Ok(Some(get_user(pool, creds.id).await?))
            } else {
                Ok(None)
            }
        }
        _ => Ok(None),
    }
}

#[derive(sqlx::FromRow)]
struct DbCredentials {
    id: i64,
    password: String,
}

#[instrument(skip(pool))]
pub async fn update_user_display_name(
    pool: &Pool<Sqlite>,
    user_id: i64,
    display_name: &str,
) -> Result<(), AppError> {
    info!("Updating user display name");
    sqlx::query("UPDATE users SET display_name = ? WHERE id = ?")
        .bind(display_name)
        .bind(user_id)
        .execute(pool)
        .await?;

    sqlx::query("UPDATE profiles SET display_name = ?, updated_at = ? WHERE user_id = ?")
        .bind(display_name)
        .bind(Utc::now().naive_utc())
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip_all, fields(user_id))]
pub async fn update_user_password(
    pool: &Pool<Sqlite>,
    user_id: i64,
    new_password: &str,
) -> Result<(), AppError> {
    info!("Updating user password");
    let hashed_password = bcrypt::hash(new_password, bcrypt::DEFAULT_COST)?;

    sqlx::query("UPDATE users SET password = ? WHERE id = ?")
        .bind(hashed_password)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn set_stripe_customer_id(
    pool: &Pool<Sqlite>,
    user_id: i64,
    customer_id: &str,
) -> Result<(), AppError> {
    info!("Storing Stripe customer id");
    sqlx::query("UPDATE users SET stripe_customer_id = ? WHERE id = ?")
        .bind(customer_id)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Sessions

#[instrument(skip(pool, token))]
pub async fn create_user_session(
    pool: &Pool<Sqlite>,
    user_id: i64,
    token: &str,
    expires_at: NaiveDateTime,
) -> Result<i64, AppError> {
    info!("Creating user session");

    let res = sqlx::query("INSERT INTO user_sessions (user_id, token, expires_at) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .execute(pool)
        .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool, token))]
pub async fn get_session_by_token(
    pool: &Pool<Sqlite>,
    token: &str,
) -> Result<UserSession, AppError> {
    info!("Getting session by token");

    let session = sqlx::query_as::<_, DbUserSession>(
        "SELECT id, user_id, token, created_at, expires_at FROM user_sessions WHERE token = ?",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    match session {
        Some(session) => Ok(UserSession::from(session)),
        _ => Err(AppError::Authentication(
            "Invalid session token".to_string(),
        )),
    }
}

#[instrument(skip(pool, token))]
pub async fn invalidate_session(pool: &Pool<Sqlite>, token: &str) -> Result<(), AppError> {
    info!("Invalidating session");

    sqlx::query("DELETE FROM user_sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn clean_expired_sessions(pool: &Pool<Sqlite>) -> Result<u64, AppError> {
    info!("Cleaning expired sessions");

    let now = Utc::now().naive_utc();

    let result = sqlx::query("DELETE FROM user_sessions WHERE expires_at < ?")
        .bind(now)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

// ---------------------------------------------------------------------------
// Profiles and the billing-state arbiter

#[instrument(skip(pool))]
pub async fn get_profile(pool: &Pool<Sqlite>, user_id: i64) -> Result<Profile, AppError> {
    info!("Fetching profile");
    let row = sqlx::query_as::<_, DbProfile>(&format!(
        "SELECT {} FROM profiles WHERE user_id = ?",
        PROFILE_COLUMNS
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(profile) => Ok(Profile::from(profile)),
        _ => Err(AppError::NotFound(format!(
            "Profile for user {} not found in database",
            user_id
        ))),
    }
}

/// Every writer of subscription state funnels through here: the signal is
/// run through the access state machine, then persisted to the profile row
/// and (when it carries a status) the user row. Last write wins by design.
#[instrument(skip(pool))]
pub async fn apply_status_signal(
    pool: &Pool<Sqlite>,
    user_id: i64,
    signal: &StatusSignal,
) -> Result<Profile, AppError> {
    info!(source = %signal.source.as_str(), "Applying subscription status signal");

    let profile = get_profile(pool, user_id).await?;
    let next_state = profile.access_state.apply(signal);

    let was_premium = match next_state {
        AccessState::ConfirmedPro => true,
        AccessState::ConfirmedFree => false,
        _ => profile.was_premium,
    };

    let grace_until = match signal.source {
        SignalSource::CheckoutRedirect => Some((signal.at + grace_period()).naive_utc()),
        _ => profile.grace_until.map(|g| g.naive_utc()),
    };

    if let Some(status) = signal.status {
        sqlx::query("UPDATE users SET subscription_status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(user_id)
            .execute(pool)
            .await?;

        sqlx::query(
            "UPDATE profiles
             SET subscription_status = ?, access_state = ?, status_source = ?,
                 status_updated_at = ?, grace_until = ?, was_premium = ?, updated_at = ?
             WHERE user_id = ?",
        )
        .bind(status.as_str())
        .bind(next_state.as_str())
        .bind(signal.source.as_str())
        .bind(signal.at.naive_utc())
        .bind(grace_until)
        .bind(was_premium)
        .bind(Utc::now().naive_utc())
        .bind(user_id)
        .execute(pool)
        .await?;
    } else {
        sqlx::query(
            "UPDATE profiles
             SET access_state = ?, status_source = ?, status_updated_at = ?,
                 grace_until = ?, was_premium = ?, updated_at = ?
             WHERE user_id = ?",
        )
        .bind(next_state.as_str())
        .bind(signal.source.as_str())
        .bind(signal.at.naive_utc())
        .bind(grace_until)
        .bind(was_premium)
        .bind(Utc::now().naive_utc())
        .bind(user_id)
        .execute(pool)
        .await?;
    }

    get_profile(pool, user_id).await
}

// ---------------------------------------------------------------------------
// Artists and roles

/// Creates the artist row, then the owner link, as two sequential writes.
/// The link insert failing leaves an artist nobody can see, so it is
/// compensated with a best-effort delete rather than wrapped in a
/// transaction.
#[instrument(skip(pool))]
pub async fn create_artist_with_owner(
    pool: &Pool<Sqlite>,
    user_id: i64,
    name: &str,
    bio: &str,
) -> Result<i64, AppError> {
    info!("Creating artist");
    let res = sqlx::query("INSERT INTO artists (name, bio) VALUES (?, ?)")
        .bind(name)
        .bind(bio)
        .execute(pool)
        .await?;

    let artist_id = res.last_insert_rowid();

    let link = sqlx::query(
        "INSERT INTO artist_managers (artist_id, user_id, role) VALUES (?, ?, 'owner')",
    )
    .bind(artist_id)
    .bind(user_id)
    .execute(pool)
    .await;

    if let Err(err) = link {
        warn!(artist_id, error = %err, "Owner link failed, removing orphaned artist");
        if let Err(cleanup) = sqlx::query("DELETE FROM artists WHERE id = ?")
            .bind(artist_id)
            .execute(pool)
            .await
        {
            warn!(artist_id, error = %cleanup, "Compensating artist delete failed");
        }
        return Err(err.into());
    }

    Ok(artist_id)
}

#[derive(sqlx::FromRow, Clone)]
struct DbArtistWithRole {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub bio: Option<String>,
    pub spotify_artist_id: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub role: Option<String>,
}

#[instrument(skip(pool))]
pub async fn list_artists_for_user(
    pool: &Pool<Sqlite>,
    user_id: i64,
) -> Result<Vec<(Artist, ArtistRole)>, AppError> {
    info!("Listing artists for user");
    let rows = sqlx::query_as::<_, DbArtistWithRole>(
        "SELECT a.id, a.name, a.bio, a.spotify_artist_id, a.created_at, m.role
         FROM artists a
         JOIN artist_managers m ON m.artist_id = a.id
         WHERE m.user_id = ?
         ORDER BY a.name",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let role = row
                .role
                .as_deref()
                .and_then(|r| ArtistRole::from_str(r).ok())
                .unwrap_or(ArtistRole::Viewer);
            (
                Artist::from(DbArtist {
                    id: row.id,
                    name: row.name,
                    bio: row.bio,
                    spotify_artist_id: row.spotify_artist_id,
                    created_at: row.created_at,
                }),
                role,
            )
        })
        .collect())
}

#[instrument(skip(pool))]
pub async fn get_artist(pool: &Pool<Sqlite>, id: i64) -> Result<Artist, AppError> {
    info!("Fetching artist");
    let row = sqlx::query_as::<_, DbArtist>(
        "SELECT id, name, bio, spotify_artist_id, created_at FROM artists WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(artist) => Ok(Artist::from(artist)),
        _ => Err(AppError::NotFound(format!(
            "Artist with id {} not found in database",
            id
        ))),
    }
}

#[instrument(skip(pool))]
pub async fn get_artist_role(
    pool: &Pool<Sqlite>,
    artist_id: i64,
    user_id: i64,
) -> Result<Option<ArtistRole>, AppError> {
    let row =
        sqlx::query_as::<_, DbRoleRow>("SELECT role FROM artist_managers WHERE artist_id = ? AND user_id = ?")
            .bind(artist_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

    Ok(row.and_then(|r| ArtistRole::from_str(&r.role).ok()))
}

#[derive(sqlx::FromRow)]
struct DbRoleRow {
    role: String,
}

#[instrument(skip(pool))]
pub async fn update_artist(
    pool: &Pool<Sqlite>,
    id: i64,
    name: &str,
    bio: &str,
    spotify_artist_id: Option<&str>,
) -> Result<(), AppError> {
    info!("Updating artist");
    sqlx::query("UPDATE artists SET name = ?, bio = ?, spotify_artist_id = ? WHERE id = ?")
        .bind(name)
        .bind(bio)
        .bind(spotify_artist_id)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn delete_artist(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    info!("Deleting artist");
    sqlx::query("DELETE FROM artists WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn add_artist_manager(
    pool: &Pool<Sqlite>,
    artist_id: i64,
    user_id: i64,
    role: ArtistRole,
) -> Result<(), AppError> {
    info!(role = %role, "Adding artist manager");
    sqlx::query(
        "INSERT INTO artist_managers (artist_id, user_id, role) VALUES (?, ?, ?)
         ON CONFLICT (artist_id, user_id) DO UPDATE SET role = excluded.role",
    )
    .bind(artist_id)
    .bind(user_id)
    .bind(role.as_str())
    .execute(pool)
    .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn remove_artist_manager(
    pool: &Pool<Sqlite>,
    artist_id: i64,
    user_id: i64,
) -> Result<(), AppError> {
    info!("Removing artist manager");
    sqlx::query("DELETE FROM artist_managers WHERE artist_id = ? AND user_id = ?")
        .bind(artist_id)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Tracks

const TRACK_COLUMNS: &str =
    "id, artist_id, title, isrc, release_date, sync_checklist, files, created_at, updated_at";

#[instrument(skip(pool))]
pub async fn create_track(
    pool: &Pool<Sqlite>,
    artist_id: i64,
    title: &str,
    isrc: Option<&str>,
    release_date: Option<&str>,
) -> Result<i64, AppError> {
    info!("Creating track");
    let res = sqlx::query(
        "INSERT INTO tracks (artist_id, title, isrc, release_date, sync_checklist, files)
         VALUES (?, ?, ?, ?, '{}', '{}')",
    )
    .bind(artist_id)
    .bind(title)
    .bind(isrc)
    .bind(release_date)
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool))]
pub async fn get_track(pool: &Pool<Sqlite>, id: i64) -> Result<Track, AppError> {
    info!("Fetching track");
    let row = sqlx::query_as::<_, DbTrack>(&format!(
        "SELECT {} FROM tracks WHERE id = ?",
        TRACK_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(track) => Ok(Track::from(track)),
        _ => Err(AppError::NotFound(format!(
            "Track with id {} not found in database",
            id
        ))),
    }
}

#[instrument(skip(pool))]
pub async fn list_tracks(pool: &Pool<Sqlite>, artist_id: i64) -> Result<Vec<Track>, AppError> {
    info!("Listing tracks");
    let rows = sqlx::query_as::<_, DbTrack>(&format!(
        "SELECT {} FROM tracks WHERE artist_id = ? ORDER BY updated_at DESC",
        TRACK_COLUMNS
    ))
    .bind(artist_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Track::from).collect())
}

#[instrument(skip(pool))]
pub async fn update_track(
    pool: &Pool<Sqlite>,
    id: i64,
    title: &str,
    isrc: Option<&str>,
    release_date: Option<&str>,
) -> Result<(), AppError> {
    info!("Updating track");
    sqlx::query(
        "UPDATE tracks SET title = ?, isrc = ?, release_date = ?, updated_at = ? WHERE id = ?",
    )
    .bind(title)
    .bind(isrc)
    .bind(release_date)
    .bind(Utc::now().naive_utc())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

#[instrument(skip(pool, checklist))]
pub async fn update_track_checklist(
    pool: &Pool<Sqlite>,
    id: i64,
    checklist: &SyncChecklist,
) -> Result<(), AppError> {
    info!("Updating track checklist");
    sqlx::query("UPDATE tracks SET sync_checklist = ?, updated_at = ? WHERE id = ?")
        .bind(serde_json::to_string(checklist)?)
        .bind(Utc::now().naive_utc())
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool, files))]
pub async fn update_track_files(
    pool: &Pool<Sqlite>,
    id: i64,
    files: &TrackFiles,
) -> Result<(), AppError> {
    info!("Updating track files");
    sqlx::query("UPDATE tracks SET files = ?, updated_at = ? WHERE id = ?")
        .bind(serde_json::to_string(files)?)
        .bind(Utc::now().naive_utc())
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn delete_track(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    info!("Deleting track");
    sqlx::query("DELETE FROM tracks WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Stream calculations

#[instrument(skip(pool))]
pub async fn save_calculation(
    pool: &Pool<Sqlite>,
    user_id: i64,
    artist_id: Option<i64>,
    platform: &str,
    stream_count: i64,
    per_stream_rate: f64,
    estimated_payout: f64,
) -> Result<i64, AppError> {
    info!("Saving stream calculation");
    let res = sqlx::query(
        "INSERT INTO stream_calculations
         (user_id, artist_id, platform, stream_count, per_stream_rate, estimated_payout)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(artist_id)
    .bind(platform)
    .bind(stream_count)
    .bind(per_stream_rate)
    .bind(estimated_payout)
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool))]
pub async fn list_calculations(
    pool: &Pool<Sqlite>,
    user_id: i64,
) -> Result<Vec<StreamCalculation>, AppError> {
    info!("Listing stream calculations");
    let rows = sqlx::query_as::<_, DbStreamCalculation>(
        "SELECT id, user_id, artist_id, platform, stream_count, per_stream_rate,
                estimated_payout, created_at
         FROM stream_calculations
         WHERE user_id = ?
         ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(StreamCalculation::from).collect())
}

// ---------------------------------------------------------------------------
// Earnings

#[instrument(skip(pool))]
pub async fn record_earning(
    pool: &Pool<Sqlite>,
    artist_id: i64,
    source: &str,
    period: &str,
    amount_cents: i64,
    recorded_by: i64,
) -> Result<i64, AppError> {
    info!("Recording earning");
    let res = sqlx::query(
        "INSERT INTO earnings (artist_id, source, period, amount_cents, recorded_by)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(artist_id)
    .bind(source)
    .bind(period)
    .bind(amount_cents)
    .bind(recorded_by)
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool))]
pub async fn list_earnings(pool: &Pool<Sqlite>, artist_id: i64) -> Result<Vec<Earning>, AppError> {
    info!("Listing earnings");
    let rows = sqlx::query_as::<_, DbEarning>(
        "SELECT id, artist_id, source, period, amount_cents, recorded_by, created_at
         FROM earnings
         WHERE artist_id = ?
         ORDER BY period DESC, created_at DESC",
    )
    .bind(artist_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Earning::from).collect())
}

// ---------------------------------------------------------------------------
// Notifications

#[instrument(skip(pool, body))]
pub async fn create_notification(
    pool: &Pool<Sqlite>,
    user_id: i64,
    kind: &str,
    body: &str,
) -> Result<i64, AppError> {
    info!("Creating notification");
    let res = sqlx::query("INSERT INTO notifications (user_id, kind, body) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(kind)
        .bind(body)
        .execute(pool)
        .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool))]
pub async fn list_notifications(
    pool: &Pool<Sqlite>,
    user_id: i64,
) -> Result<Vec<Notification>, AppError> {
    info!("Listing notifications");
    let rows = sqlx::query_as::<_, DbNotification>(
        "SELECT id, user_id, kind, body, read, created_at
         FROM notifications
         WHERE user_id = ?
         ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Notification::from).collect())
}

#[instrument(skip(pool))]
pub async fn mark_notification_read(
    pool: &Pool<Sqlite>,
    user_id: i64,
    notification_id: i64,
) -> Result<(), AppError> {
    info!("Marking notification read");
    let result = sqlx::query("UPDATE notifications SET read = 1 WHERE id = ? AND user_id = ?")
        .bind(notification_id)
        .bind(user_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Notification with id {} not found for user",
            notification_id
        )));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Spotify tokens

#[instrument(skip(pool, access_token, refresh_token))]
pub async fn upsert_spotify_tokens(
    pool: &Pool<Sqlite>,
    user_id: i64,
    access_token: &str,
    refresh_token: Option<&str>,
    scope: &str,
    expires_at: NaiveDateTime,
) -> Result<(), AppError> {
    info!("Storing Spotify tokens");
    sqlx::query(
        "INSERT INTO spotify_tokens (user_id, access_token, refresh_token, scope, expires_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT (user_id) DO UPDATE SET
             access_token = excluded.access_token,
             refresh_token = COALESCE(excluded.refresh_token, spotify_tokens.refresh_token),
             scope = excluded.scope,
             expires_at = excluded.expires_at,
             updated_at = excluded.updated_at",
    )
    .bind(user_id)
    .bind(access_token)
    .bind(refresh_token)
    .bind(scope)
    .bind(expires_at)
    .bind(Utc::now().naive_utc())
    .execute(pool)
    .await?;

    Ok(())
}
