pub mod middleware;
pub mod routes;

use axum::Router;
use std::sync::Arc;

use crate::config::Config;
use crate::github::client::GithubApi;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub api: Option<Arc<dyn GithubApi>>,
}

pub fn create_app(state: AppState) -> Router {
    routes::build_router(state)
}
