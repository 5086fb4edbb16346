//! Application state for HTTP handlers.

use library_server::Library;
use library_storage::DataStore;

/// State shared by every handler, held behind an `Arc` by the router.
pub struct AppState<S> {
    pub library: Library<S>,
}

impl<S: DataStore> AppState<S> {
    pub fn new(library: Library<S>) -> Self {
        Self { library }
    }
}
