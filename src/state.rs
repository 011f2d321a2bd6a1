use std::sync::Arc;

use axum::extract::FromRef;

use crate::{backend::MockTestBackend, config::Config, session::registry::SessionRegistry};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub backend: Arc<dyn MockTestBackend>,
    pub sessions: SessionRegistry,
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<dyn MockTestBackend> {
    fn from_ref(state: &AppState) -> Self {
        state.backend.clone()
    }
}

impl FromRef<AppState> for SessionRegistry {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}
