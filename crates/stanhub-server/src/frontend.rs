use std::collections::HashMap;
use std::path::{Component, Path as FsPath};

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};

use crate::manifest::{AssetManifest, APP_ENTRY, MANIFEST_PATH};
use crate::state::AppState;

const CONTENT_TYPES: [(&str, &str); 7] = [
    ("js", "application/javascript"),
    ("css", "text/css"),
    ("json", "application/json"),
    ("ico", "image/x-icon"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("svg", "image/svg+xml"),
];

/// Content type by file extension; anything unknown is served as plain text.
pub fn content_type_for(path: &FsPath) -> &'static str {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    CONTENT_TYPES
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, mime)| *mime)
        .unwrap_or("text/plain")
}

pub async fn index_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let head = if params.contains_key("dev") {
        let origin = state.dev_server.trim_end_matches('/');
        format!(
            r#"<script type="module" src="{origin}/@vite/client"></script>
    <script type="module" src="{origin}/{APP_ENTRY}"></script>"#
        )
    } else {
        let manifest = AssetManifest::load(&state.build_dir.join(MANIFEST_PATH));
        format!("{}{}", manifest.style_tags(), manifest.script_tag())
    };

    (
        [(header::CACHE_CONTROL, "no-cache, no-store, must-revalidate")],
        Html(render_index(&head)),
    )
        .into_response()
}

fn render_index(head: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en" class="bg-gray-100">
<head>
    <meta charset="UTF-8">
    <title>PhpStanHub</title>
    {head}
</head>
<body>
    <div id="app"></div>
</body>
</html>
"#
    )
}

pub async fn build_asset_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Response {
    let relative = FsPath::new(&path);
    if !relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        return not_found().await;
    }

    let file = state.build_dir.join(relative);
    if !file.is_file() {
        return not_found().await;
    }

    match tokio::fs::read(&file).await {
        Ok(content) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, content_type_for(&file))],
            content,
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(path = %file.display(), error = %e, "failed to read asset");
            not_found().await
        }
    }
}

pub async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        [(header::CONTENT_TYPE, "text/plain")],
        "Not found",
    )
        .into_response()
}
