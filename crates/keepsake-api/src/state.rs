use std::sync::Arc;

use keepsake_store::SharedBackend;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub backend: SharedBackend,
}

impl AppStateInner {
    pub fn new(backend: SharedBackend) -> AppState {
        Arc::new(Self { backend })
    }
}
