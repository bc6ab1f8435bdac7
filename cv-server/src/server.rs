use std::{
    sync::atomic::Ordering,
    time::{Instant, SystemTime, UNIX_EPOCH},
};

use axum::{
    Json, Router,
    body::Body,
    extract::{FromRequestParts, Path, Query, Request, State},
    http::{
        StatusCode,
        header::{AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE},
        request::Parts,
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use script::{
    Condition, ConditionKind, EvaluationContext, Rule, WeatherReading, is_allowed,
    is_valid_domain_pattern,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::{
    logging::{category_access, category_script, category_weather, method_label, status_label},
    state::AppState,
    store::{AccountRecord, ConditionRecord, ProjectRecord},
    weather::coordinates_in_range,
};

mod handlers;
mod scripts;
mod weather;

use handlers::{
    create_account_handler, create_condition_handler, create_project_handler,
    delete_condition_handler, delete_project_handler, get_project_handler, healthz_handler,
    list_conditions_handler, list_projects_handler, metrics_handler, preview_handler,
    replace_condition_handler, update_project_handler,
};
use scripts::{script_handler, script_info_handler, update_allowed_urls_handler};
use weather::weather_handler;

const MAX_NAME_CHARS: usize = 200;

type ApiError = (StatusCode, Json<ErrorResponse>);

#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    invalid_urls: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct CreateAccountRequest {
    name: String,
}

#[derive(Serialize)]
struct AccountResponse {
    account_id: String,
    name: String,
    token: String,
}

#[derive(Deserialize)]
struct CreateProjectRequest {
    name: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize)]
struct UpdateProjectRequest {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Serialize)]
struct ProjectResponse {
    project_id: String,
    name: String,
    description: Option<String>,
    allowed_urls: Vec<String>,
    created_unix_ms: u64,
    updated_unix_ms: u64,
}

#[derive(Serialize)]
struct ProjectListResponse {
    projects: Vec<ProjectResponse>,
}

/// Kind arrives as a plain string so unknown kinds get a 400 with our body.
#[derive(Deserialize)]
struct ConditionRequest {
    #[serde(alias = "type")]
    kind: String,
    value: String,
    variation: String,
}

#[derive(Serialize)]
struct ConditionResponse {
    condition_id: String,
    project_id: String,
    kind: ConditionKind,
    value: String,
    variation: String,
    created_unix_ms: u64,
    updated_unix_ms: u64,
}

#[derive(Serialize)]
struct ConditionListResponse {
    conditions: Vec<ConditionResponse>,
}

#[derive(Deserialize)]
struct PreviewRequest {
    hour: u32,
    #[serde(default)]
    hostname: Option<String>,
    #[serde(default)]
    weather: Option<WeatherReading>,
}

#[derive(Serialize)]
struct PreviewResponse {
    allowed: bool,
    variation: Option<String>,
    condition_id: Option<String>,
}

#[derive(Serialize)]
struct ScriptInfoResponse {
    script_url: String,
    embed_code: String,
    allowed_urls: Vec<String>,
    instructions: String,
}

#[derive(Deserialize)]
struct AllowedUrlsRequest {
    #[serde(alias = "allowedUrls")]
    allowed_urls: Vec<String>,
}

#[derive(Deserialize)]
struct WeatherQuery {
    lat: Option<String>,
    lon: Option<String>,
}

/// Account resolved from `Authorization: Bearer <token>`.
struct CurrentAccount(AccountRecord);

impl FromRequestParts<AppState> for CurrentAccount {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim_start().split_once(' '))
            .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
            .map(|(_, token)| token.trim())
            .filter(|token| !token.is_empty())
            .ok_or_else(|| unauthorized("missing bearer token"))?;
        let guard = state.inner.read().await;
        guard
            .account_for_token(token)
            .cloned()
            .map(CurrentAccount)
            .ok_or_else(|| unauthorized("invalid bearer token"))
    }
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/accounts", post(create_account_handler))
        .route(
            "/api/projects",
            get(list_projects_handler).post(create_project_handler),
        )
        .route(
            "/api/projects/{project_id}",
            get(get_project_handler)
                .patch(update_project_handler)
                .delete(delete_project_handler),
        )
        .route(
            "/api/projects/{project_id}/conditions",
            get(list_conditions_handler).post(create_condition_handler),
        )
        .route(
            "/api/projects/{project_id}/preview",
            post(preview_handler),
        )
        .route(
            "/api/conditions/{condition_id}",
            put(replace_condition_handler).delete(delete_condition_handler),
        )
        .route("/api/scripts/{project_id}", get(script_handler))
        .route("/api/scripts/{project_id}/info", get(script_info_handler))
        .route(
            "/api/scripts/{project_id}/allowed-urls",
            put(update_allowed_urls_handler),
        )
        .route("/api/weather", get(weather_handler))
        .layer(middleware::from_fn(access_log_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn access_log_middleware(request: Request, next: Next) -> Response<Body> {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let started = Instant::now();
    let response = next.run(request).await;
    let elapsed_ms = started.elapsed().as_millis();
    let status = response.status();

    info!(
        "{} {} {} {} {}ms",
        category_access(),
        method_label(method.as_str()),
        status_label(status.as_u16()),
        uri,
        elapsed_ms
    );

    response
}

fn map_project(project: &ProjectRecord) -> ProjectResponse {
    ProjectResponse {
        project_id: project.project_id.clone(),
        name: project.name.clone(),
        description: project.description.clone(),
        allowed_urls: project.allowed_domains.clone(),
        created_unix_ms: project.created_unix_ms,
        updated_unix_ms: project.updated_unix_ms,
    }
}

fn map_condition(record: &ConditionRecord) -> ConditionResponse {
    ConditionResponse {
        condition_id: record.condition_id.clone(),
        project_id: record.project_id.clone(),
        kind: record.condition.kind,
        value: record.condition.value.clone(),
        variation: record.condition.variation.clone(),
        created_unix_ms: record.created_unix_ms,
        updated_unix_ms: record.updated_unix_ms,
    }
}

fn error_body(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
            invalid_urls: None,
        }),
    )
}

fn bad_request(message: impl Into<String>) -> ApiError {
    error_body(StatusCode::BAD_REQUEST, message)
}

fn unauthorized(message: &str) -> ApiError {
    error_body(StatusCode::UNAUTHORIZED, message)
}

fn not_found(message: &str) -> ApiError {
    error_body(StatusCode::NOT_FOUND, message)
}

fn bad_gateway(message: String) -> ApiError {
    error_body(StatusCode::BAD_GATEWAY, message)
}

fn internal_error(err: impl std::fmt::Display) -> ApiError {
    error!("request failed: {err}");
    error_body(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

fn now_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or(0)
}
