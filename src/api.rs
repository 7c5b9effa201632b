//! HTTP API for StudyBuddy

mod handlers;
mod types;

pub use handlers::create_router;

use crate::db::Database;
use crate::runtime::ProductionRunner;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub runner: ProductionRunner,
    pub db: Database,
}

impl AppState {
    pub fn new(runner: ProductionRunner) -> Self {
        let db = runner.storage().inner().clone();
        Self { runner, db }
    }
}
