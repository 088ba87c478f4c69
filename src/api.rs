//! HTTP surface: visitor WebSockets and page delivery

mod handlers;
mod pages;
mod types;

pub use handlers::create_router;

use crate::router::Router;
use std::path::PathBuf;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Router>,
    pub pages_dir: Arc<PathBuf>,
}

impl AppState {
    pub fn new(relay: Arc<Router>, pages_dir: PathBuf) -> Self {
        Self {
            relay,
            pages_dir: Arc::new(pages_dir),
        }
    }
}
