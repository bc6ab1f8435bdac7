use super::*;

pub(super) async fn script_handler(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> Response {
    let bundle = state.inner.read().await.bundle(&project_id);
    let Some(bundle) = bundle else {
        return not_found("project not found").into_response();
    };
    match state.generator.generate_bundle(&bundle) {
        Ok(source) => {
            state
                .metrics
                .scripts_served_total
                .fetch_add(1, Ordering::Relaxed);
            info!(
                "{} served project_id={project_id} conditions={} allowed_urls={}",
                category_script(),
                bundle.conditions.len(),
                bundle.allowed_domains.len()
            );
            (
                StatusCode::OK,
                [
                    (CONTENT_TYPE, "application/javascript"),
                    (CACHE_CONTROL, "no-cache"),
                ],
                source,
            )
                .into_response()
        }
        Err(err) => {
            state
                .metrics
                .script_errors_total
                .fetch_add(1, Ordering::Relaxed);
            error!(
                "{} generation failed project_id={project_id} err={err}",
                category_script()
            );
            error_body(StatusCode::INTERNAL_SERVER_ERROR, "error generating script")
                .into_response()
        }
    }
}

pub(super) async fn script_info_handler(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    Path(project_id): Path<String>,
) -> Result<Json<ScriptInfoResponse>, ApiError> {
    let allowed_urls = {
        let guard = state.inner.read().await;
        guard
            .owned_project(&account.account_id, &project_id)
            .map(|project| project.allowed_domains.clone())
            .ok_or_else(|| not_found("project not found"))?
    };
    let script_url = state.config().script_url(&project_id);
    let embed_code = format!(r#"<script src="{script_url}"></script>"#);
    let instructions = format!(
        concat!(
            "To use this script:\n",
            "1. Add the script tag to your HTML:\n",
            "   {}\n",
            "2. The script will automatically:\n",
            "   - Verify the current domain is allowed\n",
            "   - Check time-based conditions\n",
            "   - Request location permission for weather/temperature conditions\n",
            "   - Update the URL with the appropriate variation parameter\n",
            "3. Conditions are checked every {}\n"
        ),
        embed_code,
        refresh_label(state.config().script.refresh_interval_ms)
    );
    Ok(Json(ScriptInfoResponse {
        script_url,
        embed_code,
        allowed_urls,
        instructions,
    }))
}

pub(super) async fn update_allowed_urls_handler(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    Path(project_id): Path<String>,
    Json(request): Json<AllowedUrlsRequest>,
) -> Result<Json<ProjectResponse>, ApiError> {
    let allowed_urls = request
        .allowed_urls
        .iter()
        .map(|pattern| pattern.trim().to_string())
        .collect::<Vec<_>>();
    let invalid_urls = allowed_urls
        .iter()
        .filter(|pattern| !is_valid_domain_pattern(pattern))
        .cloned()
        .collect::<Vec<_>>();
    if !invalid_urls.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Invalid URL format".to_string(),
                invalid_urls: Some(invalid_urls),
            }),
        ));
    }
    if allowed_urls.len() > script::MAX_ALLOWED_DOMAINS {
        return Err(bad_request(format!(
            "a project allows at most {} urls",
            script::MAX_ALLOWED_DOMAINS
        )));
    }

    let response = {
        let mut guard = state.inner.write().await;
        let project = guard
            .owned_project_mut(&account.account_id, &project_id)
            .ok_or_else(|| not_found("project not found"))?;
        project.allowed_domains = allowed_urls;
        project.updated_unix_ms = now_unix_ms();
        map_project(project)
    };
    state.persist_snapshot().await.map_err(internal_error)?;
    Ok(Json(response))
}

fn refresh_label(interval_ms: u64) -> String {
    match interval_ms {
        60_000 => "minute".to_string(),
        ms if ms % 60_000 == 0 => format!("{} minutes", ms / 60_000),
        ms => format!("{} seconds", ms / 1_000),
    }
}
