use repository::Repository;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<Repository>,
    pub access_key: Option<String>,
}

impl AppState {
    pub fn new(repository: Repository, access_key: Option<String>) -> Self {
        Self {
            repository: Arc::new(repository),
            access_key,
        }
    }
}
