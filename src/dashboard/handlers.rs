use axum::{extract::State, routing::post, Router};
use time::OffsetDateTime;
use tracing::{error, instrument};

use super::services::{self, Statistics};
use crate::{
    error::{operation_failed, ApiError, Envelope, EnvelopeSchema, Success},
    state::AppState,
    users::dto::PublicUser,
};

pub fn dashboard_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard/users", post(list_users))
        .route("/dashboard/statistics", post(statistics))
}

#[utoipa::path(
    post,
    path = "/dashboard/users",
    tag = "dashboard",
    security(("bearer" = [])),
    responses((status = 200, description = "Every registered user", body = EnvelopeSchema))
)]
#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
) -> Result<Envelope<Vec<PublicUser>>, ApiError> {
    let users = state.users.list().await.map_err(|e| {
        error!(error = %e, "listing users failed");
        ApiError::UserNotFound
    })?;
    let users = users.into_iter().map(PublicUser::from).collect();
    Ok(Envelope::success(Success::Operation, Some(users)))
}

#[utoipa::path(
    post,
    path = "/dashboard/statistics",
    tag = "dashboard",
    security(("bearer" = [])),
    responses((status = 200, description = "`data` holds the counters", body = EnvelopeSchema))
)]
#[instrument(skip(state))]
pub async fn statistics(State(state): State<AppState>) -> Result<Envelope<Statistics>, ApiError> {
    let stats = services::statistics(&state, OffsetDateTime::now_utc())
        .await
        .map_err(operation_failed)?;
    Ok(Envelope::success(Success::Operation, Some(stats)))
}
