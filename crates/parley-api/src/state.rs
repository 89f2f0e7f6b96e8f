use std::sync::Arc;

use parley_db::MessageStore;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub store: Arc<dyn MessageStore>,
}

impl AppStateInner {
    pub fn new(store: Arc<dyn MessageStore>) -> AppState {
        Arc::new(Self { store })
    }
}
