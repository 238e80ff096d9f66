use anyhow::Error;
use once_cell::sync::Lazy;
use rocket::http::Status;
use rocket::serde::Serialize;
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ViewArtist,
    ViewTracks,
    ViewEarnings,

    EditTracks,
    EditChecklists,
    RecordEarnings,

    EditArtist,
    ManageManagers,
    DeleteArtist,
}

/// A user's role over one artist, from the artist_managers link table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtistRole {
    Viewer,
    Manager,
    Owner,
}

static VIEWER_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.insert(Permission::ViewArtist);
    permissions.insert(Permission::ViewTracks);
    permissions.insert(Permission::ViewEarnings);

    permissions
});

static MANAGER_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.extend(VIEWER_PERMISSIONS.iter().copied());

    permissions.insert(Permission::EditTracks);
    permissions.insert(Permission::EditChecklists);
    permissions.insert(Permission::RecordEarnings);

    permissions
});

static OWNER_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.extend(MANAGER_PERMISSIONS.iter().copied());

    permissions.insert(Permission::EditArtist);
    permissions.insert(Permission::ManageManagers);
    permissions.insert(Permission::DeleteArtist);

    permissions
});

impl ArtistRole {
    pub fn permissions(&self) -> &'static HashSet<Permission> {
        match self {
            ArtistRole::Viewer => &VIEWER_PERMISSIONS,
            ArtistRole::Manager => &MANAGER_PERMISSIONS,
            ArtistRole::Owner => &OWNER_PERMISSIONS,
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    pub fn require_permission(&self, permission: Permission) -> Result<(), Status> {
        if self.has_permission(permission) {
            Ok(())
        } else {
            tracing::warn!(
                role = %self.as_str(),
                permission = ?permission,
                "Permission denied"
            );
            Err(Status::Forbidden)
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ArtistRole::Viewer => "viewer",
            ArtistRole::Manager => "manager",
            ArtistRole::Owner => "owner",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "viewer" => Ok(ArtistRole::Viewer),
            "manager" => Ok(ArtistRole::Manager),
            "owner" => Ok(ArtistRole::Owner),
            _ => Err(Error::msg(format!("Unknown artist role: {}", s))),
        }
    }
}

impl fmt::Display for ArtistRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
