use rocket::Request;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use sqlx::SqlitePool;

use crate::db::get_profile;
use crate::subscription::AccessReason;

use super::User;

/// Request guard for subscription-gated routes: an authenticated user whose
/// profile currently passes the access decision.
#[derive(Debug, Clone)]
pub struct Subscriber {
    pub user: User,
    pub reason: AccessReason,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Subscriber {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let user = match request.guard::<User>().await {
            Outcome::Success(user) => user,
            Outcome::Error(err) => return Outcome::Error(err),
            Outcome::Forward(status) => return Outcome::Forward(status),
        };

        let db = match request.rocket().state::<SqlitePool>() {
            Some(pool) => pool,
            _ => {
                tracing::error!("Database pool not found in managed state");
                return Outcome::Error((Status::InternalServerError, ()));
            }
        };

        match get_profile(db, user.id).await {
            Ok(profile) => match profile.snapshot().evaluate(chrono::Utc::now()) {
                Some(reason) => {
                    tracing::info!(user_id = user.id, reason = ?reason, "Gated access granted");
                    Outcome::Success(Subscriber { user, reason })
                }
                None => {
                    tracing::info!(user_id = user.id, "Gated access denied");
                    Outcome::Error((Status::PaymentRequired, ()))
                }
            },
            Err(err) => {
                tracing::error!(user_id = user.id, error = ?err, "Failed to load profile for access decision");
                Outcome::Error((Status::InternalServerError, ()))
            }
        }
    }
}
