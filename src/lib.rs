// Library exports for binary tools and tests
pub mod config;
pub mod db;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;

use std::sync::Arc;

use config::Config;
use services::faculty::FacultyDirectory;
use store::Store;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<Config>,
    pub faculty: Arc<FacultyDirectory>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: Arc<Config>) -> Self {
        let faculty = Arc::new(FacultyDirectory::new(std::time::Duration::from_secs(
            config.faculty_cache_ttl_seconds,
        )));
        Self {
            store,
            config,
            faculty,
        }
    }
}
