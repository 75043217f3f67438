use crate::state::AppState;
use axum::Router;

pub mod accounts;
mod dto;
pub(crate) mod extractors;
#[cfg(test)]
pub mod faulty;
pub mod handlers;
pub mod memory;
pub mod password;
pub mod pg;
pub mod repo;
pub mod repo_types;
pub mod sessions;
pub mod token;
pub mod validation;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::auth_routes())
        .merge(handlers::me_routes())
}
