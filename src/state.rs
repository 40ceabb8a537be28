use crate::config::Config;
use crate::db::Database;
use std::sync::Arc;

/// Application state handed to every route collaborator.
///
/// Built once at startup. Nothing in it is mutated afterwards except the
/// set-once database pool slot.
#[derive(Clone)]
pub struct AppState {
    /// Process configuration loaded at startup
    pub config: Arc<Config>,

    /// Database handle; connected in the background after the listener starts
    pub database: Database,
}

impl AppState {
    pub fn new(config: Arc<Config>, database: Database) -> Self {
        Self { config, database }
    }
}
