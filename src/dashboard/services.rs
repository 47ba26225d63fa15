use serde::Serialize;
use time::{Duration, OffsetDateTime, Time};
use tracing::debug;
use utoipa::ToSchema;

use crate::{state::AppState, store::StoreError};

const WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total_users: i64,
    /// Distinct users with activity since local midnight.
    pub active_sessions_today: i64,
    /// Distinct (user, local day) pairs over the last seven days, divided by seven.
    pub avg_active_sessions: f64,
}

/// `now` is read in the configured offset; "today" starts at its midnight.
pub async fn statistics(state: &AppState, now: OffsetDateTime) -> Result<Statistics, StoreError> {
    let offset = state.config.utc_offset;
    let now = now.to_offset(offset);
    let midnight = now.replace_time(Time::MIDNIGHT);
    let window_start = now - Duration::days(WINDOW_DAYS);

    let total_users = state.users.count().await?;
    let active_sessions_today = state.activities.count_active_users_since(midnight).await?;
    let user_days = state
        .activities
        .count_active_user_days_since(window_start, offset)
        .await?;

    debug!(total_users, active_sessions_today, user_days, "statistics computed");
    Ok(Statistics {
        total_users,
        active_sessions_today,
        avg_active_sessions: user_days as f64 / WINDOW_DAYS as f64,
    })
}
