use chrono::{DateTime, Utc};
use rocket::State;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::{Deserialize, Serialize, json::Json};
use serde_json::{Value, json};
use sqlx::{Pool, Sqlite};
use url::Url;
use validator::Validate;

use crate::auth::{ArtistRole, Permission, Subscriber, User, UserSession};
use crate::auth::session::SESSION_HOURS;
use crate::db::{
    add_artist_manager, authenticate_user, create_artist_with_owner, create_track, create_user,
    create_user_session, delete_artist, delete_track, find_user_by_email, get_artist,
    get_artist_role, get_profile, get_track, invalidate_session, list_artists_for_user,
    list_calculations, list_earnings, list_notifications, list_tracks, mark_notification_read,
    record_earning, remove_artist_manager, save_calculation, update_artist, update_track,
    update_track_checklist, update_track_files, update_user_display_name, update_user_password,
};
use crate::models::{
    Artist, ChecklistUpdate, Earning, FileSlot, Notification, StreamCalculation, Track,
};
use crate::subscription::AccessReason;
use crate::validation::{
    AppErrorExt, JsonValidateExt, PermissionCheckExt, ValidationResponse, validate_period,
};

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "A valid email address is required"))]
    email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    password: String,
}

#[derive(Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub user: Option<UserData>,
    pub error: Option<String>,
    pub redirect_url: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct UserData {
    pub id: i64,
    pub email: String,
    pub display_name: String,
    pub subscription_status: String,
}

impl From<User> for UserData {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            subscription_status: user.status_str().to_string(),
        }
    }
}

#[post("/login", data = "<login>")]
pub async fn api_login(
    login: Json<LoginRequest>,
    cookies: &rocket::http::CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<LoginResponse>, Custom<Json<ValidationResponse>>> {
    use rocket::http::{Cookie, SameSite};

    let validated = login.validate_custom()?;

    match authenticate_user(db, &validated.email, &validated.password)
        .await
        .validate_custom()?
    {
        Some(user) => {
            let token = UserSession::generate_token();
            let expires_at = Utc::now() + chrono::Duration::hours(SESSION_HOURS);

            create_user_session(db, user.id, &token, expires_at.naive_utc())
                .await
                .validate_custom()?;

            let cookie = Cookie::build(("session_token", token))
                .same_site(SameSite::Lax)
                .http_only(true)
                .max_age(rocket::time::Duration::hours(SESSION_HOURS));
            cookies.add_private(cookie);

            cookies.add_private(
                Cookie::build(("user_id", user.id.to_string()))
                    .same_site(SameSite::Lax)
                    .http_only(true)
                    .max_age(rocket::time::Duration::hours(SESSION_HOURS)),
            );

            cookies.add_private(
                Cookie::build(("logged_in", validated.email))
                    .same_site(SameSite::Lax)
                    .max_age(rocket::time::Duration::hours(SESSION_HOURS)),
            );

            Ok(Json(LoginResponse {
                success: true,
                user: Some(UserData::from(user)),
                error: None,
                redirect_url: Some("/dashboard".to_string()),
            }))
        }
        None => Ok(Json(LoginResponse {
            success: false,
            user: None,
            error: Some("Invalid email or password".to_string()),
            redirect_url: None,
        })),
    }
}

#[post("/logout")]
pub async fn api_logout(
    cookies: &rocket::http::CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
) -> Json<Value> {
    let token = cookies
        .get_private("session_token")
        .map(|cookie| cookie.value().to_string());

    if let Some(token) = token {
        let _ = invalidate_session(db, &token).await;
    }

    cookies.remove_private(rocket::http::Cookie::build("session_token"));
    cookies.remove_private(rocket::http::Cookie::build("user_id"));
    cookies.remove_private(rocket::http::Cookie::build("logged_in"));

    Json(json!({ "success": true }))
}

#[derive(Deserialize, Validate, Clone)]
pub struct RegistrationRequest {
    #[validate(email(message = "A valid email address is required"))]
    email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    password: String,
    #[validate(length(max = 80, message = "Display name is too long"))]
    display_name: String,
}

#[post("/register", data = "<registration>")]
pub async fn api_register_user(
    registration: Json<RegistrationRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, Custom<Json<ValidationResponse>>> {
    let validated = registration.validate_custom()?;

    let existing_user = find_user_by_email(db, &validated.email)
        .await
        .validate_custom()?;

    if existing_user.is_some() {
        return Err(Custom(
            Status::Conflict,
            Json(ValidationResponse::with_error(
                "email",
                "An account with this email already exists",
            )),
        ));
    }

    create_user(
        db,
        &validated.email,
        &validated.password,
        &validated.display_name,
    )
    .await
    .validate_custom()?;

    Ok(Status::Created)
}

#[derive(Serialize, Deserialize)]
pub struct MeResponse {
    pub user: UserData,
    pub access_state: String,
    pub access: Option<AccessReason>,
    pub grace_until: Option<DateTime<Utc>>,
}

#[get("/me")]
pub async fn api_me(user: User, db: &State<Pool<Sqlite>>) -> Result<Json<MeResponse>, Status> {
    let profile = get_profile(db, user.id).await?;
    let access = profile.snapshot().evaluate(Utc::now());

    Ok(Json(MeResponse {
        user: UserData::from(user),
        access_state: profile.access_state.to_string(),
        access,
        grace_until: profile.grace_until,
    }))
}

#[derive(Deserialize, Validate, Clone)]
pub struct ProfileUpdateRequest {
    #[validate(length(min = 1, max = 80, message = "Display name must be 1-80 characters"))]
    display_name: String,
}

#[put("/profile", data = "<profile>")]
pub async fn api_update_profile(
    profile: Json<ProfileUpdateRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, Custom<Json<ValidationResponse>>> {
    let validated = profile.validate_custom()?;

    update_user_display_name(db, user.id, &validated.display_name)
        .await
        .validate_custom()?;

    Ok(Status::Ok)
}

#[derive(Deserialize, Validate)]
pub struct PasswordChangeRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    current_password: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    new_password: String,
}

#[post("/change-password", data = "<password>")]
pub async fn api_change_password(
    password: Json<PasswordChangeRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, Custom<Json<ValidationResponse>>> {
    let validated = password.validate_custom()?;

    let is_valid = authenticate_user(db, &user.email, &validated.current_password)
        .await
        .validate_custom()?;

    match is_valid {
        Some(_) => {
            update_user_password(db, user.id, &validated.new_password)
                .await
                .validate_custom()?;

            Ok(Status::Ok)
        }
        _ => Err(Custom(
            Status::Unauthorized,
            Json(ValidationResponse::with_error(
                "current_password",
                "Current password is incorrect",
            )),
        )),
    }
}

// ---------------------------------------------------------------------------
// Artists

#[derive(Serialize, Deserialize)]
pub struct ArtistResponse {
    pub id: i64,
    pub name: String,
    pub bio: String,
    pub spotify_artist_id: Option<String>,
    pub role: String,
}

fn artist_response(artist: Artist, role: ArtistRole) -> ArtistResponse {
    ArtistResponse {
        id: artist.id,
        name: artist.name,
        bio: artist.bio,
        spotify_artist_id: artist.spotify_artist_id,
        role: role.to_string(),
    }
}

/// Membership check for artist-scoped routes. An outsider gets 404, not
/// 403, so artist ids cannot be probed.
async fn require_artist_permission(
    db: &Pool<Sqlite>,
    artist_id: i64,
    user_id: i64,
    permission: Permission,
) -> Result<ArtistRole, Status> {
    match get_artist_role(db, artist_id, user_id).await? {
        Some(role) => {
            role.require_permission(permission)?;
            Ok(role)
        }
        None => Err(Status::NotFound),
    }
}

#[derive(Deserialize, Validate)]
pub struct CreateArtistRequest {
    #[validate(length(min = 1, max = 120, message = "Artist name must be 1-120 characters"))]
    name: String,
    #[validate(length(max = 2000, message = "Bio is too long"))]
    #[serde(default)]
    bio: String,
}

#[post("/artists", data = "<request>")]
pub async fn api_create_artist(
    request: Json<CreateArtistRequest>,
    subscriber: Subscriber,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<ArtistResponse>, Custom<Json<ValidationResponse>>> {
    let validated = request.validate_custom()?;

    let artist_id = create_artist_with_owner(db, subscriber.user.id, &validated.name, &validated.bio)
        .await
        .validate_custom()?;

    let artist = get_artist(db, artist_id).await.validate_custom()?;

    Ok(Json(artist_response(artist, ArtistRole::Owner)))
}

#[get("/artists")]
pub async fn api_list_artists(
    subscriber: Subscriber,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<ArtistResponse>>, Status> {
    let artists = list_artists_for_user(db, subscriber.user.id).await?;

    Ok(Json(
        artists
            .into_iter()
            .map(|(artist, role)| artist_response(artist, role))
            .collect(),
    ))
}

#[get("/artists/<id>")]
pub async fn api_get_artist(
    id: i64,
    subscriber: Subscriber,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<ArtistResponse>, Status> {
    let role = require_artist_permission(db, id, subscriber.user.id, Permission::ViewArtist).await?;
    let artist = get_artist(db, id).await?;

    Ok(Json(artist_response(artist, role)))
}

#[derive(Deserialize, Validate)]
pub struct ArtistUpdateRequest {
    #[validate(length(min = 1, max = 120, message = "Artist name must be 1-120 characters"))]
    name: Option<String>,
    #[validate(length(max = 2000, message = "Bio is too long"))]
    bio: Option<String>,
    spotify_artist_id: Option<String>,
}

#[put("/artists/<id>", data = "<request>")]
pub async fn api_update_artist(
    id: i64,
    request: Json<ArtistUpdateRequest>,
    subscriber: Subscriber,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, Custom<Json<ValidationResponse>>> {
    let validated = request.validate_custom()?;

    require_artist_permission(db, id, subscriber.user.id, Permission::EditArtist)
        .await
        .map(|_| ())
        .validate_custom()?;

    let current = get_artist(db, id).await.validate_custom()?;

    let name = validated.name.unwrap_or(current.name);
    let bio = validated.bio.unwrap_or(current.bio);
    let spotify_artist_id = validated.spotify_artist_id.or(current.spotify_artist_id);

    update_artist(db, id, &name, &bio, spotify_artist_id.as_deref())
        .await
        .validate_custom()?;

    Ok(Status::Ok)
}

#[delete("/artists/<id>")]
pub async fn api_delete_artist(
    id: i64,
    subscriber: Subscriber,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, Status> {
    require_artist_permission(db, id, subscriber.user.id, Permission::DeleteArtist).await?;

    delete_artist(db, id).await?;

    Ok(Status::Ok)
}

#[derive(Deserialize, Validate)]
pub struct AddManagerRequest {
    #[validate(email(message = "A valid email address is required"))]
    email: String,
    role: String,
}

#[post("/artists/<id>/managers", data = "<request>")]
pub async fn api_add_manager(
    id: i64,
    request: Json<AddManagerRequest>,
    subscriber: Subscriber,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, Custom<Json<ValidationResponse>>> {
    let validated = request.validate_custom()?;

    require_artist_permission(db, id, subscriber.user.id, Permission::ManageManagers)
        .await
        .map(|_| ())
        .validate_custom()?;

    let role = ArtistRole::from_str(&validated.role).map_err(|_| {
        Custom(
            Status::UnprocessableEntity,
            Json(ValidationResponse::with_error(
                "role",
                "Role must be one of: owner, manager, viewer",
            )),
        )
    })?;

    let target = find_user_by_email(db, &validated.email)
        .await
        .validate_custom()?
        .ok_or_else(|| {
            Custom(
                Status::NotFound,
                Json(ValidationResponse::with_error(
                    "email",
                    "No account exists for this email",
                )),
            )
        })?;

    if target.id == subscriber.user.id {
        return Err(Custom(
            Status::UnprocessableEntity,
            Json(ValidationResponse::with_error(
                "email",
                "You cannot change your own role",
            )),
        ));
    }

    add_artist_manager(db, id, target.id, role)
        .await
        .validate_custom()?;

    Ok(Status::Created)
}

#[delete("/artists/<id>/managers/<user_id>")]
pub async fn api_remove_manager(
    id: i64,
    user_id: i64,
    subscriber: Subscriber,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, Status> {
    require_artist_permission(db, id, subscriber.user.id, Permission::ManageManagers).await?;

    // An owner removing themselves would strand the artist.
    if user_id == subscriber.user.id {
        return Err(Status::UnprocessableEntity);
    }

    remove_artist_manager(db, id, user_id).await?;

    Ok(Status::Ok)
}

// ---------------------------------------------------------------------------
// Tracks

#[derive(Serialize, Deserialize)]
pub struct TrackResponse {
    pub id: i64,
    pub artist_id: i64,
    pub title: String,
    pub isrc: Option<String>,
    pub release_date: Option<String>,
    pub sync_checklist: crate::models::SyncChecklist,
    pub checklist_complete: bool,
    pub files: crate::models::TrackFiles,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Track> for TrackResponse {
    fn from(track: Track) -> Self {
        Self {
            id: track.id,
            artist_id: track.artist_id,
            title: track.title,
            isrc: track.isrc,
            release_date: track.release_date,
            checklist_complete: track.sync_checklist.is_complete(),
            sync_checklist: track.sync_checklist,
            files: track.files,
            created_at: track.created_at.to_rfc3339(),
            updated_at: track.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Deserialize, Validate)]
pub struct CreateTrackRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    title: String,
    #[validate(length(min = 12, max = 15, message = "ISRC codes are 12-15 characters"))]
    isrc: Option<String>,
    release_date: Option<String>,
}

#[post("/artists/<artist_id>/tracks", data = "<request>")]
pub async fn api_create_track(
    artist_id: i64,
    request: Json<CreateTrackRequest>,
    subscriber: Subscriber,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<TrackResponse>, Custom<Json<ValidationResponse>>> {
    let validated = request.validate_custom()?;

    require_artist_permission(db, artist_id, subscriber.user.id, Permission::EditTracks)
        .await
        .map(|_| ())
        .validate_custom()?;

    let track_id = create_track(
        db,
        artist_id,
        &validated.title,
        validated.isrc.as_deref(),
        validated.release_date.as_deref(),
    )
    .await
    .validate_custom()?;

    let track = get_track(db, track_id).await.validate_custom()?;

    Ok(Json(TrackResponse::from(track)))
}

#[get("/artists/<artist_id>/tracks")]
pub async fn api_list_tracks(
    artist_id: i64,
    subscriber: Subscriber,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<TrackResponse>>, Status> {
    require_artist_permission(db, artist_id, subscriber.user.id, Permission::ViewTracks).await?;

    let tracks = list_tracks(db, artist_id).await?;

    Ok(Json(tracks.into_iter().map(TrackResponse::from).collect()))
}

#[get("/tracks/<id>")]
pub async fn api_get_track(
    id: i64,
    subscriber: Subscriber,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<TrackResponse>, Status> {
    let track = get_track(db, id).await?;

    require_artist_permission(db, track.artist_id, subscriber.user.id, Permission::ViewTracks)
        .await?;

    Ok(Json(TrackResponse::from(track)))
}

#[derive(Deserialize, Validate)]
pub struct TrackUpdateRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    title: Option<String>,
    #[validate(length(min = 12, max = 15, message = "ISRC codes are 12-15 characters"))]
    isrc: Option<String>,
    release_date: Option<String>,
}

#[put("/tracks/<id>", data = "<request>")]
pub async fn api_update_track(
    id: i64,
    request: Json<TrackUpdateRequest>,
    subscriber: Subscriber,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, Custom<Json<ValidationResponse>>> {
    let validated = request.validate_custom()?;

    let track = get_track(db, id).await.validate_custom()?;

    require_artist_permission(db, track.artist_id, subscriber.user.id, Permission::EditTracks)
        .await
        .map(|_| ())
        .validate_custom()?;

    let title = validated.title.unwrap_or(track.title);
    let isrc = validated.isrc.or(track.isrc);
    let release_date = validated.release_date.or(track.release_date);

    update_track(db, id, &title, isrc.as_deref(), release_date.as_deref())
        .await
        .validate_custom()?;

    Ok(Status::Ok)
}

#[put("/tracks/<id>/checklist", data = "<update>")]
pub async fn api_update_checklist(
    id: i64,
    update: Json<ChecklistUpdate>,
    subscriber: Subscriber,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<TrackResponse>, Status> {
    let track = get_track(db, id).await?;

    require_artist_permission(
        db,
        track.artist_id,
        subscriber.user.id,
        Permission::EditChecklists,
    )
    .await?;

    let merged = update.apply(track.sync_checklist);
    update_track_checklist(db, id, &merged).await?;

    let track = get_track(db, id).await?;
    Ok(Json(TrackResponse::from(track)))
}

#[derive(Deserialize)]
pub struct FileSlotUpdate {
    slot: FileSlot,
    url: Option<String>,
}

#[put("/tracks/<id>/files", data = "<update>")]
pub async fn api_update_files(
    id: i64,
    update: Json<FileSlotUpdate>,
    subscriber: Subscriber,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<TrackResponse>, Custom<Json<ValidationResponse>>> {
    let track = get_track(db, id).await.validate_custom()?;

    require_artist_permission(db, track.artist_id, subscriber.user.id, Permission::EditTracks)
        .await
        .map(|_| ())
        .validate_custom()?;

    if let Some(url) = &update.url {
        if Url::parse(url).is_err() {
            return Err(Custom(
                Status::UnprocessableEntity,
                Json(ValidationResponse::with_error(
                    "url",
                    "File URL must be a valid absolute URL",
                )),
            ));
        }
    }

    let mut files = track.files.clone();
    files.set(update.slot, update.url.clone());
    update_track_files(db, id, &files).await.validate_custom()?;

    let track = get_track(db, id).await.validate_custom()?;
    Ok(Json(TrackResponse::from(track)))
}

#[delete("/tracks/<id>")]
pub async fn api_delete_track(
    id: i64,
    subscriber: Subscriber,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, Status> {
    let track = get_track(db, id).await?;

    require_artist_permission(db, track.artist_id, subscriber.user.id, Permission::EditTracks)
        .await?;

    delete_track(db, id).await?;

    Ok(Status::Ok)
}

// ---------------------------------------------------------------------------
// Stream calculations

#[derive(Serialize, Deserialize)]
pub struct CalculationResponse {
    pub id: i64,
    pub artist_id: Option<i64>,
    pub platform: String,
    pub stream_count: i64,
    pub per_stream_rate: f64,
    pub estimated_payout: f64,
    pub created_at: String,
}

impl From<StreamCalculation> for CalculationResponse {
    fn from(calc: StreamCalculation) -> Self {
        Self {
            id: calc.id,
            artist_id: calc.artist_id,
            platform: calc.platform,
            stream_count: calc.stream_count,
            per_stream_rate: calc.per_stream_rate,
            estimated_payout: calc.estimated_payout,
            created_at: calc.created_at.to_rfc3339(),
        }
    }
}

#[derive(Deserialize, Validate)]
pub struct SaveCalculationRequest {
    artist_id: Option<i64>,
    #[validate(length(min = 1, max = 40, message = "Platform must be 1-40 characters"))]
    platform: String,
    #[validate(range(min = 0, message = "Stream count cannot be negative"))]
    stream_count: i64,
    #[validate(range(min = 0.0, max = 1.0, message = "Per-stream rates are between 0 and 1"))]
    per_stream_rate: f64,
}

#[post("/calculations", data = "<request>")]
pub async fn api_save_calculation(
    request: Json<SaveCalculationRequest>,
    subscriber: Subscriber,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<CalculationResponse>, Custom<Json<ValidationResponse>>> {
    let validated = request.validate_custom()?;

    if let Some(artist_id) = validated.artist_id {
        require_artist_permission(db, artist_id, subscriber.user.id, Permission::ViewArtist)
            .await
            .map(|_| ())
            .validate_custom()?;
    }

    let estimated_payout = validated.stream_count as f64 * validated.per_stream_rate;

    let id = save_calculation(
        db,
        subscriber.user.id,
        validated.artist_id,
        &validated.platform,
        validated.stream_count,
        validated.per_stream_rate,
        estimated_payout,
    )
    .await
    .validate_custom()?;

    Ok(Json(CalculationResponse {
        id,
        artist_id: validated.artist_id,
        platform: validated.platform,
        stream_count: validated.stream_count,
        per_stream_rate: validated.per_stream_rate,
        estimated_payout,
        created_at: Utc::now().to_rfc3339(),
    }))
}

#[get("/calculations")]
pub async fn api_list_calculations(
    subscriber: Subscriber,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<CalculationResponse>>, Status> {
    let calculations = list_calculations(db, subscriber.user.id).await?;

    Ok(Json(
        calculations
            .into_iter()
            .map(CalculationResponse::from)
            .collect(),
    ))
}

// ---------------------------------------------------------------------------
// Earnings

#[derive(Serialize, Deserialize)]
pub struct EarningResponse {
    pub id: i64,
    pub artist_id: i64,
    pub source: String,
    pub period: String,
    pub amount_cents: i64,
    pub created_at: String,
}

impl From<Earning> for EarningResponse {
    fn from(earning: Earning) -> Self {
        Self {
            id: earning.id,
            artist_id: earning.artist_id,
            source: earning.source,
            period: earning.period,
            amount_cents: earning.amount_cents,
            created_at: earning.created_at.to_rfc3339(),
        }
    }
}

#[derive(Deserialize, Validate)]
pub struct RecordEarningRequest {
    #[validate(length(min = 1, max = 80, message = "Source must be 1-80 characters"))]
    source: String,
    #[validate(custom(function = validate_period))]
    period: String,
    #[validate(range(min = 0, message = "Amounts cannot be negative"))]
    amount_cents: i64,
}

#[post("/artists/<artist_id>/earnings", data = "<request>")]
pub async fn api_record_earning(
    artist_id: i64,
    request: Json<RecordEarningRequest>,
    subscriber: Subscriber,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<EarningResponse>, Custom<Json<ValidationResponse>>> {
    let validated = request.validate_custom()?;

    require_artist_permission(db, artist_id, subscriber.user.id, Permission::RecordEarnings)
        .await
        .map(|_| ())
        .validate_custom()?;

    let id = record_earning(
        db,
        artist_id,
        &validated.source,
        &validated.period,
        validated.amount_cents,
        subscriber.user.id,
    )
    .await
    .validate_custom()?;

    Ok(Json(EarningResponse {
        id,
        artist_id,
        source: validated.source,
        period: validated.period,
        amount_cents: validated.amount_cents,
        created_at: Utc::now().to_rfc3339(),
    }))
}

#[get("/artists/<artist_id>/earnings")]
pub async fn api_list_earnings(
    artist_id: i64,
    subscriber: Subscriber,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<EarningResponse>>, Status> {
    require_artist_permission(db, artist_id, subscriber.user.id, Permission::ViewEarnings).await?;

    let earnings = list_earnings(db, artist_id).await?;

    Ok(Json(earnings.into_iter().map(EarningResponse::from).collect()))
}

// ---------------------------------------------------------------------------
// Notifications

#[derive(Serialize, Deserialize)]
pub struct NotificationResponse {
    pub id: i64,
    pub kind: String,
    pub body: String,
    pub read: bool,
    pub created_at: String,
}

impl From<Notification> for NotificationResponse {
    fn from(notification: Notification) -> Self {
        Self {
            id: notification.id,
            kind: notification.kind,
            body: notification.body,
            read: notification.read,
            created_at: notification.created_at.to_rfc3339(),
        }
    }
}

#[get("/notifications")]
pub async fn api_list_notifications(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<NotificationResponse>>, Status> {
    let notifications = list_notifications(db, user.id).await?;

    Ok(Json(
        notifications
            .into_iter()
            .map(NotificationResponse::from)
            .collect(),
    ))
}

#[post("/notifications/<id>/read")]
pub async fn api_mark_notification_read(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, Status> {
    mark_notification_read(db, user.id, id).await?;

    Ok(Status::Ok)
}

#[get("/health")]
pub fn health() -> &'static str {
    "OK"
}
