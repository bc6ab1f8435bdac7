use super::*;

pub(super) async fn healthz_handler() -> Json<StatusResponse> {
    Json(StatusResponse { status: "ok" })
}

pub(super) async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let (accounts, projects, conditions) = {
        let guard = state.inner.read().await;
        (
            guard.accounts.len(),
            guard.projects.len(),
            guard.conditions.len(),
        )
    };
    let metrics = format!(
        concat!(
            "cv_server_uptime_seconds {}\n",
            "cv_server_accounts {}\n",
            "cv_server_projects {}\n",
            "cv_server_conditions {}\n",
            "cv_server_scripts_served_total {}\n",
            "cv_server_script_errors_total {}\n",
            "cv_server_previews_total {}\n",
            "cv_server_weather_requests_total {}\n",
            "cv_server_weather_upstream_errors_total {}\n"
        ),
        state.metrics.started_at.elapsed().as_secs(),
        accounts,
        projects,
        conditions,
        state.metrics.scripts_served_total.load(Ordering::Relaxed),
        state.metrics.script_errors_total.load(Ordering::Relaxed),
        state.metrics.previews_total.load(Ordering::Relaxed),
        state.metrics.weather_requests_total.load(Ordering::Relaxed),
        state
            .metrics
            .weather_upstream_errors_total
            .load(Ordering::Relaxed),
    );
    (
        StatusCode::OK,
        [(CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics,
    )
}

pub(super) async fn create_account_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<AccountResponse>), ApiError> {
    let name = validated_name(&request.name, "account")?;
    let account = AccountRecord {
        account_id: state.next_id(),
        name,
        token: state.next_id(),
        created_unix_ms: now_unix_ms(),
    };
    let response = AccountResponse {
        account_id: account.account_id.clone(),
        name: account.name.clone(),
        token: account.token.clone(),
    };
    state.inner.write().await.insert_account(account);
    state.persist_snapshot().await.map_err(internal_error)?;
    info!("created account account_id={}", response.account_id);
    Ok((StatusCode::CREATED, Json(response)))
}

pub(super) async fn list_projects_handler(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
) -> Json<ProjectListResponse> {
    let guard = state.inner.read().await;
    let projects = guard
        .projects_of(&account.account_id)
        .into_iter()
        .map(map_project)
        .collect();
    Json(ProjectListResponse { projects })
}

pub(super) async fn create_project_handler(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    Json(request): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<ProjectResponse>), ApiError> {
    let name = validated_name(&request.name, "project")?;
    let now = now_unix_ms();
    let project = ProjectRecord {
        project_id: state.next_id(),
        account_id: account.account_id,
        name,
        description: normalize_description(request.description),
        allowed_domains: Vec::new(),
        sequence: state.next_sequence(),
        created_unix_ms: now,
        updated_unix_ms: now,
    };
    let response = map_project(&project);
    state
        .inner
        .write()
        .await
        .projects
        .insert(project.project_id.clone(), project);
    state.persist_snapshot().await.map_err(internal_error)?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub(super) async fn get_project_handler(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    Path(project_id): Path<String>,
) -> Result<Json<ProjectResponse>, ApiError> {
    let guard = state.inner.read().await;
    let project = guard
        .owned_project(&account.account_id, &project_id)
        .ok_or_else(|| not_found("project not found"))?;
    Ok(Json(map_project(project)))
}

pub(super) async fn update_project_handler(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    Path(project_id): Path<String>,
    Json(request): Json<UpdateProjectRequest>,
) -> Result<Json<ProjectResponse>, ApiError> {
    let name = request
        .name
        .as_deref()
        .map(|name| validated_name(name, "project"))
        .transpose()?;
    let response = {
        let mut guard = state.inner.write().await;
        let project = guard
            .owned_project_mut(&account.account_id, &project_id)
            .ok_or_else(|| not_found("project not found"))?;
        if let Some(name) = name {
            project.name = name;
        }
        if request.description.is_some() {
            project.description = normalize_description(request.description);
        }
        project.updated_unix_ms = now_unix_ms();
        map_project(project)
    };
    state.persist_snapshot().await.map_err(internal_error)?;
    Ok(Json(response))
}

pub(super) async fn delete_project_handler(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    Path(project_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    {
        let mut guard = state.inner.write().await;
        if guard
            .owned_project(&account.account_id, &project_id)
            .is_none()
        {
            return Err(not_found("project not found"));
        }
        guard.remove_project(&project_id);
    }
    state.persist_snapshot().await.map_err(internal_error)?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn list_conditions_handler(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    Path(project_id): Path<String>,
) -> Result<Json<ConditionListResponse>, ApiError> {
    let guard = state.inner.read().await;
    if guard
        .owned_project(&account.account_id, &project_id)
        .is_none()
    {
        return Err(not_found("project not found"));
    }
    let conditions = guard
        .conditions_of(&project_id)
        .into_iter()
        .map(map_condition)
        .collect();
    Ok(Json(ConditionListResponse { conditions }))
}

pub(super) async fn create_condition_handler(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    Path(project_id): Path<String>,
    Json(request): Json<ConditionRequest>,
) -> Result<(StatusCode, Json<ConditionResponse>), ApiError> {
    let condition = parse_condition(request)?;
    let response = {
        let mut guard = state.inner.write().await;
        if guard
            .owned_project(&account.account_id, &project_id)
            .is_none()
        {
            return Err(not_found("project not found"));
        }
        if guard.conditions_of(&project_id).len() >= script::MAX_CONDITIONS {
            return Err(bad_request(format!(
                "a project holds at most {} conditions",
                script::MAX_CONDITIONS
            )));
        }
        let now = now_unix_ms();
        let record = ConditionRecord {
            condition_id: state.next_id(),
            project_id,
            sequence: state.next_sequence(),
            condition,
            created_unix_ms: now,
            updated_unix_ms: now,
        };
        let response = map_condition(&record);
        guard
            .conditions
            .insert(record.condition_id.clone(), record);
        response
    };
    state.persist_snapshot().await.map_err(internal_error)?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub(super) async fn replace_condition_handler(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    Path(condition_id): Path<String>,
    Json(request): Json<ConditionRequest>,
) -> Result<Json<ConditionResponse>, ApiError> {
    let condition = parse_condition(request)?;
    let response = {
        let mut guard = state.inner.write().await;
        if guard
            .owned_condition(&account.account_id, &condition_id)
            .is_none()
        {
            return Err(not_found("condition not found"));
        }
        let record = guard
            .conditions
            .get_mut(&condition_id)
            .ok_or_else(|| not_found("condition not found"))?;
        record.condition = condition;
        record.updated_unix_ms = now_unix_ms();
        map_condition(record)
    };
    state.persist_snapshot().await.map_err(internal_error)?;
    Ok(Json(response))
}

pub(super) async fn delete_condition_handler(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    Path(condition_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    {
        let mut guard = state.inner.write().await;
        if guard
            .owned_condition(&account.account_id, &condition_id)
            .is_none()
        {
            return Err(not_found("condition not found"));
        }
        guard.conditions.remove(&condition_id);
    }
    state.persist_snapshot().await.map_err(internal_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Evaluates the stored conditions server-side for a given visit.
pub(super) async fn preview_handler(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    Path(project_id): Path<String>,
    Json(request): Json<PreviewRequest>,
) -> Result<Json<PreviewResponse>, ApiError> {
    if request.hour > 23 {
        return Err(bad_request("hour must be between 0 and 23"));
    }
    state.metrics.previews_total.fetch_add(1, Ordering::Relaxed);

    let guard = state.inner.read().await;
    let project = guard
        .owned_project(&account.account_id, &project_id)
        .ok_or_else(|| not_found("project not found"))?;
    let allowed = request
        .hostname
        .as_deref()
        .is_none_or(|hostname| is_allowed(hostname, &project.allowed_domains));
    if !allowed {
        return Ok(Json(PreviewResponse {
            allowed,
            variation: None,
            condition_id: None,
        }));
    }

    let mut context = EvaluationContext::at_hour(request.hour);
    if let Some(reading) = request.weather.as_ref() {
        context = context.with_weather(reading);
    }
    let hit = guard
        .conditions_of(&project_id)
        .into_iter()
        .find_map(|record| {
            let rule = Rule::from_condition(&record.condition).ok()?;
            rule.evaluate(&context)
                .map(|variation| (record.condition_id.clone(), variation.to_string()))
        });
    let (condition_id, variation) = hit.unzip();
    Ok(Json(PreviewResponse {
        allowed,
        variation,
        condition_id,
    }))
}

fn validated_name(raw: &str, what: &str) -> Result<String, ApiError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(bad_request(format!("{what} name cannot be empty")));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(bad_request(format!(
            "{what} name cannot exceed {MAX_NAME_CHARS} characters"
        )));
    }
    Ok(name.to_string())
}

fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_condition(request: ConditionRequest) -> Result<Condition, ApiError> {
    let kind = ConditionKind::ALL
        .into_iter()
        .find(|kind| kind.as_str() == request.kind.trim())
        .ok_or_else(|| bad_request(format!("unknown condition kind `{}`", request.kind)))?;
    let condition = Condition::new(kind, request.value.trim(), request.variation);
    Rule::from_condition(&condition).map_err(|err| bad_request(err.to_string()))?;
    Ok(condition)
}
