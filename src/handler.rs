use crate::{app::App, codegen::validate_format, registry::RegistryError};
use axum::{
    Extension, Json,
    extract::{Path, Request, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::Value;
use std::{path::PathBuf, sync::Arc};
use tinylink_rs::{CreateLinkRequest, ErrorResponse, LinkResponse};
use tower::ServiceExt;
use tower_http::services::{ServeDir, ServeFile};
use tracing::{debug, error, info};

// Make our own error that wraps `anyhow::Error`.
pub struct AppError(anyhow::Error);

// Tell axum how to convert `AppError` into a response.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self.0.downcast_ref::<RegistryError>() {
            Some(RegistryError::InvalidInput(msg)) => (StatusCode::BAD_REQUEST, msg.clone()),
            Some(RegistryError::CodeConflict(_)) => {
                (StatusCode::CONFLICT, "code already exists".to_string())
            }
            Some(RegistryError::NotFound(_)) => (StatusCode::NOT_FOUND, "not found".to_string()),
            Some(RegistryError::StorageUnavailable(_)) | None => {
                error!("request failed: {:#}", self.0);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse::new(message))).into_response()
    }
}

// This enables using `?` on functions that return `Result<_, anyhow::Error>` to turn them into
// `Result<_, AppError>`. That way you don't need to do that manually.
impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    ok: bool,
    version: &'static str,
    git_sha: Option<&'static str>,
    uptime: u64,
}

pub async fn handle_health(State(app): State<Arc<App>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION"),
        git_sha: option_env!("VERGEN_GIT_SHA"),
        uptime: app.uptime().as_secs(),
    })
}

pub async fn handle_index(State(app): State<Arc<App>>) -> String {
    format!(
        "TinyLink backend running. API: /api/links. Base URL: {}",
        app.base_url()
    )
}

fn found(url: String) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, url)]).into_response()
}

pub async fn handle_redirect(
    Path(code): Path<String>,
    State(app): State<Arc<App>>,
) -> Result<Response, AppError> {
    let url = app.redirect(&code).await?;

    Ok(found(url))
}

/// Built frontend served next to the API, with `index.html` as the fallback
/// for unknown paths.
#[derive(Clone)]
pub struct StaticFiles {
    dir: PathBuf,
    service: ServeDir<ServeFile>,
}

impl StaticFiles {
    pub fn new(dir: PathBuf) -> Self {
        let index = ServeFile::new(dir.join("index.html"));

        Self {
            service: ServeDir::new(&dir).fallback(index),
            dir,
        }
    }

    pub fn into_service(self) -> ServeDir<ServeFile> {
        self.service
    }

    /// A root level segment belongs to the frontend unless it is a well formed
    /// code that does not name a file there.
    async fn claims(&self, segment: &str) -> bool {
        if !validate_format(segment) {
            return true;
        }

        tokio::fs::metadata(self.dir.join(segment))
            .await
            .is_ok_and(|meta| meta.is_file())
    }
}

pub async fn handle_redirect_or_file(
    Path(code): Path<String>,
    State(app): State<Arc<App>>,
    Extension(files): Extension<StaticFiles>,
    request: Request,
) -> Result<Response, AppError> {
    if files.claims(&code).await {
        debug!(path = %code, "serving static file");

        let Ok(response) = files.service.oneshot(request).await;
        return Ok(response.into_response());
    }

    handle_redirect(Path(code), State(app)).await
}

pub async fn handle_list(State(app): State<Arc<App>>) -> Result<impl IntoResponse, AppError> {
    let links: Vec<LinkResponse> = app
        .registry()
        .list()
        .await?
        .into_iter()
        .map(LinkResponse::from)
        .collect();

    Ok(Json(links))
}

/// Reads a create body leniently: a non string `url` counts as missing, and a
/// scalar `code` is taken by its text so format validation can reject it.
/// Falsy codes (`null`, `false`, `0`, `""`) ask for a generated one.
fn create_request(body: &Value) -> CreateLinkRequest {
    let url = match body.get("url") {
        Some(Value::String(url)) => url.clone(),
        _ => String::new(),
    };

    let code = match body.get("code") {
        None | Some(Value::Null | Value::Bool(false)) => None,
        Some(Value::Number(n)) if n.as_f64() == Some(0.0) => None,
        Some(Value::String(code)) => Some(code.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(other) => Some(other.to_string()),
    };

    CreateLinkRequest { url, code }
}

pub async fn handle_create(
    State(app): State<Arc<App>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(body) = payload.map_err(|rejection| {
        debug!("create body rejected: {}", rejection.body_text());
        RegistryError::InvalidInput("invalid json body".to_string())
    })?;

    let create = create_request(&body);

    info!("handle_create: '{}'", create.url);

    let link = app.create_link(create).await?;

    Ok((StatusCode::CREATED, Json(LinkResponse::from(link))))
}

pub async fn handle_get(
    Path(code): Path<String>,
    State(app): State<Arc<App>>,
) -> Result<impl IntoResponse, AppError> {
    let link = app.registry().get(&code).await?;

    Ok(Json(LinkResponse::from(link)))
}

pub async fn handle_delete(
    Path(code): Path<String>,
    State(app): State<Arc<App>>,
) -> Result<impl IntoResponse, AppError> {
    info!("handle_delete: {}", code);

    app.registry().delete(&code).await?;

    Ok(StatusCode::NO_CONTENT)
}
