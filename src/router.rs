use crate::{
    app::App,
    handler::{
        StaticFiles, handle_create, handle_delete, handle_get, handle_health, handle_index,
        handle_list, handle_redirect, handle_redirect_or_file,
    },
};
use axum::{Extension, Router, routing::get};
use std::{path::PathBuf, sync::Arc};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

fn setup_cors(relaxed: bool) -> CorsLayer {
    if relaxed {
        tracing::info!("cors setup: very_permissive");
        CorsLayer::very_permissive().allow_credentials(true)
    } else {
        tracing::info!("cors setup: default");
        CorsLayer::new()
    }
}

pub fn router(app: Arc<App>, cors_relaxed: bool, static_dir: Option<PathBuf>) -> Router {
    let api = Router::new()
        .route("/", get(handle_list).post(handle_create))
        .route("/{code}", get(handle_get).delete(handle_delete));

    let router = Router::new()
        .nest("/api/links", api)
        .route("/healthz", get(handle_health));

    // a built frontend takes over `/`, root level files and any path the
    // routes above don't claim
    let router = match static_dir {
        Some(dir) => {
            tracing::info!(dir = %dir.display(), "serving static frontend");

            let files = StaticFiles::new(dir);

            router
                .route(
                    "/{code}",
                    get(handle_redirect_or_file).layer(Extension(files.clone())),
                )
                .fallback_service(files.into_service())
        }
        None => router
            .route("/{code}", get(handle_redirect))
            .route("/", get(handle_index)),
    };

    router
        .layer(TraceLayer::new_for_http())
        .layer(setup_cors(cors_relaxed))
        .with_state(app)
}
