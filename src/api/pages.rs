//! Read-only marketing pages
//!
//! Each route maps to `<pages_dir>/<name>.html`, served as-is.

use super::AppState;
use axum::{
    extract::State,
    http::{StatusCode, Uri},
    response::{Html, IntoResponse, Response},
};

/// Route path to page file stem
pub const PAGES: &[(&str, &str)] = &[
    ("/", "index"),
    ("/products", "products"),
    ("/performance", "performance"),
    ("/about", "about"),
    ("/login", "login"),
    ("/privacy", "privacy"),
    ("/terms", "terms"),
];

fn page_for(path: &str) -> Option<&'static str> {
    PAGES
        .iter()
        .find(|(route, _)| *route == path)
        .map(|(_, name)| *name)
}

pub async fn serve_page(State(state): State<AppState>, uri: Uri) -> Response {
    let Some(name) = page_for(uri.path()) else {
        return not_found();
    };

    let path = state.pages_dir.join(format!("{name}.html"));
    match tokio::fs::read_to_string(&path).await {
        Ok(content) => Html(content).into_response(),
        Err(e) => {
            tracing::debug!(page = name, error = %e, "Page not available");
            not_found()
        }
    }
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Html("<h1>404 - Page not found</h1>".to_string()),
    )
        .into_response()
}
