use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tracing::warn;

use super::jwt::AuthUser;
use crate::{error::AppError, state::AppState, users::model::User, users::repo};

/// Authenticated caller loaded from the store, portfolios included.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user_id) = AuthUser::from_request_parts(parts, state).await?;
        match repo::find_by_id(&state.db, user_id).await? {
            Some(user) => Ok(CurrentUser(user)),
            None => {
                warn!(%user_id, "token subject no longer exists");
                Err(AppError::Unauthorized("User not found".into()))
            }
        }
    }
}
