pub mod api;
pub mod client_addr;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod logging;
pub mod runbook;
pub mod templating;

use axum::{Router, routing};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::executor::{CommandExecutor, Executor};
use crate::runbook::{FileRunbookStore, RunbookStore};

pub struct AppState {
    pub settings: Settings,
    pub runbooks: Box<dyn RunbookStore>,
    pub executor: Box<dyn Executor>,
    pub start_time: Instant,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// State backed by runbook files in `settings.config_dir` and real processes.
    pub fn new(settings: Settings) -> Self {
        let runbooks = FileRunbookStore::new(settings.config_dir.clone());
        Self::with_components(settings, runbooks, CommandExecutor)
    }

    pub fn with_components<R, E>(settings: Settings, runbooks: R, executor: E) -> Self
    where
        R: RunbookStore + 'static,
        E: Executor + 'static,
    {
        Self {
            settings,
            runbooks: Box::new(runbooks),
            executor: Box::new(executor),
            start_time: Instant::now(),
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<AppState>;

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", routing::get(api::root))
        .route("/{id}", routing::post(api::handle_hook))
        .with_state(state)
}
