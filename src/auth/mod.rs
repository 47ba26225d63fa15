use crate::state::AppState;
use axum::Router;

pub mod claims;
pub mod dto;
pub mod google;
pub mod handlers;
pub mod jwt;
pub mod mailer;
pub mod middleware;
pub mod password;
pub mod policy;
pub mod services;
pub mod session;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::auth_routes())
}
