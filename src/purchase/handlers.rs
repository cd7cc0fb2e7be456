use axum::{extract::State, response::Html, routing::get, Router};
use tracing::instrument;

use super::{services::purchasable_coins, view};
use crate::{auth::extractors::CurrentUser, error::AppError, state::AppState};

pub fn purchase_routes() -> Router<AppState> {
    Router::new().route("/purchase/new", get(new_purchase))
}

#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn new_purchase(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Html<String>, AppError> {
    let coins = purchasable_coins(state.coins.as_ref(), &user.principal(), &user).await?;
    Ok(view::render_new(&coins))
}
