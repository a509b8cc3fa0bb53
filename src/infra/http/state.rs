use std::sync::Arc;

use crate::application::export::ExportService;
use crate::application::fetch::FetchService;

/// Services shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub fetch: Arc<FetchService>,
    pub export: Arc<ExportService>,
}

impl AppState {
    pub fn new(fetch: Arc<FetchService>, export: Arc<ExportService>) -> Self {
        Self { fetch, export }
    }
}
