//! Post-authorization hook: every admitted request is appended to the
//! activity log and bumps the user's session bookkeeping.

use anyhow::Context;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use time::OffsetDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{auth::middleware::CurrentUser, state::AppState, store::ActivityEvent};

const SIGNIN_MARKERS: [&str; 2] = ["signin", "google-auth"];

pub fn is_signin_path(path: &str) -> bool {
    SIGNIN_MARKERS.iter().any(|m| path.contains(m))
}

/// Appends the event and updates `last_session`/`login_count`.
/// Both writes are attempted even if the first fails. An account deleted
/// since admission is skipped.
pub async fn record(state: &AppState, user_id: Uuid, path: &str) -> anyhow::Result<()> {
    if state
        .users
        .find_by_id(user_id)
        .await
        .context("look up recorded user")?
        .is_none()
    {
        debug!(%user_id, %path, "account gone; activity not recorded");
        return Ok(());
    }
    let now = OffsetDateTime::now_utc();
    let appended = state
        .activities
        .append(ActivityEvent {
            user_id,
            activity_path: path.to_string(),
            activity_at: now,
        })
        .await;
    let touched = state
        .users
        .touch_session(user_id, now, is_signin_path(path))
        .await;

    appended.context("append activity")?;
    touched.context("update session bookkeeping")?;
    debug!(%user_id, %path, "activity recorded");
    Ok(())
}

/// Anonymous requests pass through untouched. The write runs detached, so
/// the response never waits on it and its failures never reach the client.
pub async fn record_activity(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if let Some(CurrentUser(user)) = req.extensions().get::<CurrentUser>() {
        let user_id = user.id;
        let path = req.uri().path().to_owned();
        let state = state.clone();
        tokio::spawn(async move {
            if let Err(e) = record(&state, user_id, &path).await {
                warn!(error = %e, %user_id, %path, "activity recording failed");
            }
        });
    }
    next.run(req).await
}
