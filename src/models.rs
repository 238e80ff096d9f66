use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::subscription::{AccessSnapshot, AccessState, SubscriptionStatus};

fn to_utc(dt: Option<NaiveDateTime>) -> DateTime<Utc> {
    dt.map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
        .unwrap_or_else(Utc::now)
}

fn to_utc_opt(dt: Option<NaiveDateTime>) -> Option<DateTime<Utc>> {
    dt.map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
}

/// Denormalized billing mirror of a user; the primary read path for the
/// access decision.
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub user_id: i64,
    pub email: String,
    pub display_name: String,
    pub subscription_status: Option<SubscriptionStatus>,
    pub access_state: AccessState,
    pub status_source: Option<String>,
    pub status_updated_at: Option<DateTime<Utc>>,
    pub grace_until: Option<DateTime<Utc>>,
    pub was_premium: bool,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbProfile {
    pub user_id: Option<i64>,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub subscription_status: Option<String>,
    pub access_state: Option<String>,
    pub status_source: Option<String>,
    pub status_updated_at: Option<NaiveDateTime>,
    pub grace_until: Option<NaiveDateTime>,
    pub was_premium: Option<bool>,
}

impl From<DbProfile> for Profile {
    fn from(db: DbProfile) -> Self {
        Self {
            user_id: db.user_id.unwrap_or_default(),
            email: db.email.unwrap_or_default(),
            display_name: db.display_name.unwrap_or_default(),
            subscription_status: db
                .subscription_status
                .as_deref()
                .and_then(SubscriptionStatus::parse),
            access_state: db
                .access_state
                .as_deref()
                .and_then(AccessState::parse)
                .unwrap_or(AccessState::Unknown),
            status_source: db.status_source,
            status_updated_at: to_utc_opt(db.status_updated_at),
            grace_until: to_utc_opt(db.grace_until),
            was_premium: db.was_premium.unwrap_or_default(),
        }
    }
}

impl Profile {
    pub fn snapshot(&self) -> AccessSnapshot {
        AccessSnapshot {
            status: self.subscription_status,
            grace_until: self.grace_until,
            was_premium: self.was_premium,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Artist {
    pub id: i64,
    pub name: String,
    pub bio: String,
    pub spotify_artist_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbArtist {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub bio: Option<String>,
    pub spotify_artist_id: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

impl From<DbArtist> for Artist {
    fn from(db: DbArtist) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            name: db.name.unwrap_or_default(),
            bio: db.bio.unwrap_or_default(),
            spotify_artist_id: db.spotify_artist_id,
            created_at: to_utc(db.created_at),
        }
    }
}

/// The six royalty-registration checkboxes tracked per song.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncChecklist {
    pub pro_registered: bool,
    pub mlc_registered: bool,
    pub soundexchange_registered: bool,
    pub isrc_assigned: bool,
    pub copyright_filed: bool,
    pub metadata_complete: bool,
}

impl SyncChecklist {
    pub fn from_json(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_default()
    }

    pub fn is_complete(&self) -> bool {
        self.pro_registered
            && self.mlc_registered
            && self.soundexchange_registered
            && self.isrc_assigned
            && self.copyright_filed
            && self.metadata_complete
    }
}

/// Partial checklist update; absent fields keep their stored value.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ChecklistUpdate {
    pub pro_registered: Option<bool>,
    pub mlc_registered: Option<bool>,
    pub soundexchange_registered: Option<bool>,
    pub isrc_assigned: Option<bool>,
    pub copyright_filed: Option<bool>,
    pub metadata_complete: Option<bool>,
}

impl ChecklistUpdate {
    pub fn apply(&self, mut checklist: SyncChecklist) -> SyncChecklist {
        if let Some(v) = self.pro_registered {
            checklist.pro_registered = v;
        }
        if let Some(v) = self.mlc_registered {
            checklist.mlc_registered = v;
        }
        if let Some(v) = self.soundexchange_registered {
            checklist.soundexchange_registered = v;
        }
        if let Some(v) = self.isrc_assigned {
            checklist.isrc_assigned = v;
        }
        if let Some(v) = self.copyright_filed {
            checklist.copyright_filed = v;
        }
        if let Some(v) = self.metadata_complete {
            checklist.metadata_complete = v;
        }
        checklist
    }
}

/// The six file slots a track can carry. Slots hold URLs into external
/// object storage; the bucket itself is not this service's concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileSlot {
    MasterAudio,
    CoverArt,
    LyricSheet,
    SplitSheet,
    License,
    MetadataSheet,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackFiles {
    pub master_audio: Option<String>,
    pub cover_art: Option<String>,
    pub lyric_sheet: Option<String>,
    pub split_sheet: Option<String>,
    pub license: Option<String>,
    pub metadata_sheet: Option<String>,
}

impl TrackFiles {
    pub fn from_json(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_default()
    }

    pub fn set(&mut self, slot: FileSlot, url: Option<String>) {
        match slot {
            FileSlot::MasterAudio => self.master_audio = url,
            FileSlot::CoverArt => self.cover_art = url,
            FileSlot::LyricSheet => self.lyric_sheet = url,
            FileSlot::SplitSheet => self.split_sheet = url,
            FileSlot::License => self.license = url,
            FileSlot::MetadataSheet => self.metadata_sheet = url,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Track {
    pub id: i64,
    pub artist_id: i64,
    pub title: String,
    pub isrc: Option<String>,
    pub release_date: Option<String>,
    pub sync_checklist: SyncChecklist,
    pub files: TrackFiles,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbTrack {
    pub id: Option<i64>,
    pub artist_id: Option<i64>,
    pub title: Option<String>,
    pub isrc: Option<String>,
    pub release_date: Option<String>,
    pub sync_checklist: Option<String>,
    pub files: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl From<DbTrack> for Track {
    fn from(db: DbTrack) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            artist_id: db.artist_id.unwrap_or_default(),
            title: db.title.unwrap_or_default(),
            isrc: db.isrc,
            release_date: db.release_date,
            sync_checklist: SyncChecklist::from_json(db.sync_checklist.as_deref().unwrap_or("{}")),
            files: TrackFiles::from_json(db.files.as_deref().unwrap_or("{}")),
            created_at: to_utc(db.created_at),
            updated_at: to_utc(db.updated_at),
        }
    }
}

/// A saved royalty-estimate snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct StreamCalculation {
    pub id: i64,
    pub user_id: i64,
    pub artist_id: Option<i64>,
    pub platform: String,
    pub stream_count: i64,
    pub per_stream_rate: f64,
    pub estimated_payout: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbStreamCalculation {
    pub id: Option<i64>,
    pub user_id: Option<i64>,
    pub artist_id: Option<i64>,
    pub platform: Option<String>,
    pub stream_count: Option<i64>,
    pub per_stream_rate: Option<f64>,
    pub estimated_payout: Option<f64>,
    pub created_at: Option<NaiveDateTime>,
}

impl From<DbStreamCalculation> for StreamCalculation {
    fn from(db: DbStreamCalculation) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            user_id: db.user_id.unwrap_or_default(),
            artist_id: db.artist_id,
            platform: db.platform.unwrap_or_default(),
            stream_count: db.stream_count.unwrap_or_default(),
            per_stream_rate: db.per_stream_rate.unwrap_or_default(),
            estimated_payout: db.estimated_payout.unwrap_or_default(),
            created_at: to_utc(db.created_at),
        }
    }
}

/// A recorded royalty receipt, amount in cents.
#[derive(Debug, Clone, Serialize)]
pub struct Earning {
    pub id: i64,
    pub artist_id: i64,
    pub source: String,
    pub period: String,
    pub amount_cents: i64,
    pub recorded_by: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbEarning {
    pub id: Option<i64>,
    pub artist_id: Option<i64>,
    pub source: Option<String>,
    pub period: Option<String>,
    pub amount_cents: Option<i64>,
    pub recorded_by: Option<i64>,
    pub created_at: Option<NaiveDateTime>,
}

impl From<DbEarning> for Earning {
    fn from(db: DbEarning) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            artist_id: db.artist_id.unwrap_or_default(),
            source: db.source.unwrap_or_default(),
            period: db.period.unwrap_or_default(),
            amount_cents: db.amount_cents.unwrap_or_default(),
            recorded_by: db.recorded_by.unwrap_or_default(),
            created_at: to_utc(db.created_at),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub kind: String,
    pub body: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbNotification {
    pub id: Option<i64>,
    pub user_id: Option<i64>,
    pub kind: Option<String>,
    pub body: Option<String>,
    pub read: Option<bool>,
    pub created_at: Option<NaiveDateTime>,
}

impl From<DbNotification> for Notification {
    fn from(db: DbNotification) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            user_id: db.user_id.unwrap_or_default(),
            kind: db.kind.unwrap_or_default(),
            body: db.body.unwrap_or_default(),
            read: db.read.unwrap_or_default(),
            created_at: to_utc(db.created_at),
        }
    }
}
