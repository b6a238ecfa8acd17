//! Embedded chat UI.
//!
//! The page and its assets under `frontend/` are compiled into the binary
//! with `include_str!`, so the server ships as a single file.

use axum::{
    Router,
    extract::Path,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};

/// One embedded file and the content type it is served with.
struct Asset {
    name: &'static str,
    content_type: &'static str,
    body: &'static str,
}

impl Asset {
    fn respond(&self) -> Response {
        (
            [
                (header::CONTENT_TYPE, self.content_type),
                // Assets change with every release of the binary.
                (header::CACHE_CONTROL, "no-cache"),
            ],
            self.body,
        )
            .into_response()
    }
}

const INDEX: Asset = Asset {
    name: "index.html",
    content_type: "text/html; charset=utf-8",
    body: include_str!("../../../frontend/index.html"),
};

/// Files reachable under `/static/`.
const STATIC_ASSETS: &[Asset] = &[
    Asset {
        name: "style.css",
        content_type: "text/css; charset=utf-8",
        body: include_str!("../../../frontend/style.css"),
    },
    Asset {
        name: "app.js",
        content_type: "application/javascript; charset=utf-8",
        body: include_str!("../../../frontend/app.js"),
    },
];

/// Routes for the page and its static assets.
pub fn frontend_router() -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/static/{file}", get(static_handler))
}

async fn index_handler() -> Response {
    INDEX.respond()
}

async fn static_handler(Path(file): Path<String>) -> Response {
    match STATIC_ASSETS.iter().find(|asset| asset.name == file) {
        Some(asset) => asset.respond(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
