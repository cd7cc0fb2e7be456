use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::{debug, instrument};
use ulid::Ulid;

use super::{
    repo,
    serialization::{filter_properties, Audience, UserView, UserWrite},
    services,
};
use crate::{auth::extractors::CurrentUser, error::AppError, state::AppState};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/me", get(get_me))
}

/// `?properties=email,firstname` limits the serialized fields.
#[derive(Debug, Default, Deserialize)]
pub struct PropertyFilter {
    pub properties: Option<String>,
}

impl PropertyFilter {
    fn fields(&self) -> Vec<String> {
        self.properties
            .as_deref()
            .map(|p| {
                p.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn parse_id(raw: &str) -> Result<Ulid, AppError> {
    Ulid::from_string(raw).map_err(|_| AppError::BadRequest(format!("invalid user id {raw:?}")))
}

#[instrument(skip(state, caller))]
pub async fn list_users(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Query(filter): Query<PropertyFilter>,
) -> Result<Json<Vec<serde_json::Value>>, AppError> {
    let principal = caller.principal();
    let fields = filter.fields();
    let users = repo::list(&state.db).await?;
    debug!(count = users.len(), "users listed");
    let items = users
        .iter()
        .map(|u| {
            let view = UserView::new(u, Audience::resolve(&principal, u));
            serde_json::to_value(view).map(|v| filter_properties(v, &fields))
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(anyhow::Error::from)?;
    Ok(Json(items))
}

#[instrument(skip(state, write))]
pub async fn create_user(
    State(state): State<AppState>,
    Json(write): Json<UserWrite>,
) -> Result<(StatusCode, Json<UserView>), AppError> {
    let user = services::create_user(&state.db, write).await?;
    Ok((StatusCode::CREATED, Json(UserView::new(&user, Audience::Owner))))
}

#[instrument(skip(state, caller))]
pub async fn get_user(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<UserView>, AppError> {
    let id = parse_id(&id)?;
    let user = repo::find_by_id(&state.db, id)
        .await?
        .ok_or(AppError::NotFound("User"))?;
    let audience = Audience::resolve(&caller.principal(), &user);
    Ok(Json(UserView::new(&user, audience)))
}

#[instrument(skip(state, caller, write))]
pub async fn update_user(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<String>,
    Json(write): Json<UserWrite>,
) -> Result<Json<UserView>, AppError> {
    let id = parse_id(&id)?;
    let principal = caller.principal();
    let user = services::update_user(&state.db, &principal, id, write).await?;
    Ok(Json(UserView::new(&user, Audience::resolve(&principal, &user))))
}

#[instrument(skip(state, caller))]
pub async fn delete_user(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_id(&id)?;
    services::delete_user(&state.db, &caller.principal(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(caller))]
pub async fn get_me(CurrentUser(caller): CurrentUser) -> Json<UserView> {
    let audience = Audience::resolve(&caller.principal(), &caller);
    Json(UserView::new(&caller, audience))
}
