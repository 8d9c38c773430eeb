use applyflow_core::{ApplicationDraft, ApplicationFilter, JobApplication, StatusChange};
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;

use crate::auth::middleware::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

fn application_id(path: Result<Path<u64>, PathRejection>) -> Result<u64, AppError> {
    path.map(|Path(id)| id)
        .map_err(|e| AppError::BadRequest(format!("Invalid application id: {}", e.body_text())))
}

fn draft(body: Result<Json<ApplicationDraft>, JsonRejection>) -> Result<ApplicationDraft, AppError> {
    body.map(|Json(draft)| draft)
        .map_err(|e| AppError::BadRequest(e.body_text()))
}

pub async fn create(
    user: AuthUser,
    State(state): State<AppState>,
    body: Result<Json<ApplicationDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<JobApplication>), AppError> {
    let app = state.tracker.create(&user.subject, draft(body)?)?;
    Ok((StatusCode::CREATED, Json(app)))
}

pub async fn list(
    user: AuthUser,
    State(state): State<AppState>,
    query: Result<Query<ApplicationFilter>, QueryRejection>,
) -> Result<Json<Vec<JobApplication>>, AppError> {
    let Query(filter) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    Ok(Json(state.tracker.list(&user.subject, &filter)))
}

pub async fn get_one(
    user: AuthUser,
    State(state): State<AppState>,
    path: Result<Path<u64>, PathRejection>,
) -> Result<Json<JobApplication>, AppError> {
    let id = application_id(path)?;
    Ok(Json(state.tracker.get(&user.subject, id)?))
}

pub async fn update(
    user: AuthUser,
    State(state): State<AppState>,
    path: Result<Path<u64>, PathRejection>,
    body: Result<Json<ApplicationDraft>, JsonRejection>,
) -> Result<Json<JobApplication>, AppError> {
    let id = application_id(path)?;
    Ok(Json(state.tracker.update(&user.subject, id, draft(body)?)?))
}

pub async fn delete(
    user: AuthUser,
    State(state): State<AppState>,
    path: Result<Path<u64>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let id = application_id(path)?;
    state.tracker.delete(&user.subject, id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn history(
    user: AuthUser,
    State(state): State<AppState>,
    path: Result<Path<u64>, PathRejection>,
) -> Result<Json<Vec<StatusChange>>, AppError> {
    let id = application_id(path)?;
    Ok(Json(state.tracker.history(&user.subject, id)?))
}
