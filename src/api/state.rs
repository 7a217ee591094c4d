//! Application state for the API server

use crate::config::Config;
use crate::runner::JobRunner;
use crate::store::JobStore;
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned per request (cheap Arc clones). The API layer is read-only with
/// respect to job state: only submission touches the store, and only to
/// create the entry before handing off to the runner.
#[derive(Clone)]
pub struct AppState {
    /// Single source of truth for job state
    pub store: Arc<JobStore>,
    /// Spawns the per-job tasks
    pub runner: Arc<JobRunner>,
    /// Server configuration (download/log directories, API settings)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(store: Arc<JobStore>, runner: Arc<JobRunner>, config: Arc<Config>) -> Self {
        Self {
            store,
            runner,
            config,
        }
    }
}
