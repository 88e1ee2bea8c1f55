//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented; owner-only endpoints resolve the bearer
//! token to an explicit auth context before touching any document.

use std::sync::Arc;
use axum::{
  extract::{Path, State},
  http::{HeaderMap, StatusCode},
  response::IntoResponse,
  Json,
};
use tracing::{info, instrument};

use crate::auth::{require_user, resolve_bearer};
use crate::domain::{Form, ResponseRecord, User};
use crate::error::ApiError;
use crate::logic;
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state, headers))]
pub async fn http_list_forms(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
) -> Result<Json<Vec<Form>>, ApiError> {
  let user = authed(&state, &headers)?;
  let forms = state.forms_for_user(&user.id).await;
  info!(target: "form", owner = %user.id, count = forms.len(), "HTTP forms listed");
  Ok(Json(forms))
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_get_form(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<FormOut>, ApiError> {
  let form = state
    .get_form(&id)
    .await
    .ok_or_else(|| ApiError::NotFound(format!("form {id}")))?;
  Ok(Json(to_out(&form)))
}

#[instrument(level = "info", skip(state, headers, body), fields(title = %body.title, question_count = body.questions.len()))]
pub async fn http_create_form(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Json(body): Json<CreateFormIn>,
) -> Result<impl IntoResponse, ApiError> {
  let user = authed(&state, &headers)?;
  let form = logic::create_form(&state, &user, body).await?;
  Ok((StatusCode::CREATED, Json(form)))
}

#[instrument(level = "info", skip(state, headers, body), fields(%id))]
pub async fn http_update_form(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  headers: HeaderMap,
  Json(body): Json<UpdateFormIn>,
) -> Result<Json<Form>, ApiError> {
  let user = authed(&state, &headers)?;
  let form = logic::apply_form_update(&state, &user, &id, body).await?;
  Ok(Json(form))
}

#[instrument(level = "info", skip(state, headers), fields(%id))]
pub async fn http_delete_form(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  headers: HeaderMap,
) -> Result<Json<MessageOut>, ApiError> {
  let user = authed(&state, &headers)?;
  logic::delete_form(&state, &user, &id).await?;
  Ok(Json(MessageOut { message: "Form deleted successfully".into() }))
}

#[instrument(level = "info", skip(state, body), fields(%id, answer_count = body.answers.len()))]
pub async fn http_preview_visibility(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<VisibilityIn>,
) -> Result<Json<VisibilityOut>, ApiError> {
  let (visibility, visible_order) = logic::preview_visibility(&state, &id, &body.answers).await?;
  Ok(Json(VisibilityOut { visibility, visible_order }))
}

#[instrument(level = "info", skip(state, body), fields(form_id = %body.form_id, is_partial = body.is_partial))]
pub async fn http_submit_response(
  State(state): State<Arc<AppState>>,
  Json(body): Json<SubmitResponseIn>,
) -> Result<impl IntoResponse, ApiError> {
  let record = logic::submit_response(&state, body).await?;
  Ok((StatusCode::CREATED, Json(record)))
}

#[instrument(level = "info", skip(state, headers), fields(%form_id))]
pub async fn http_list_responses(
  State(state): State<Arc<AppState>>,
  Path(form_id): Path<String>,
  headers: HeaderMap,
) -> Result<Json<Vec<ResponseRecord>>, ApiError> {
  let user = authed(&state, &headers)?;
  let responses = logic::list_responses(&state, &user, &form_id).await?;
  info!(target: "response", %form_id, count = responses.len(), "HTTP responses listed");
  Ok(Json(responses))
}

#[instrument(level = "info", skip(state, body), fields(form_id = %body.form_id))]
pub async fn http_save_progress(
  State(state): State<Arc<AppState>>,
  Json(body): Json<SaveProgressIn>,
) -> Result<impl IntoResponse, ApiError> {
  let progress = logic::park_progress(&state, body).await?;
  Ok((
    StatusCode::CREATED,
    Json(SaveProgressOut { resume_token: progress.resume_token, expires_at: progress.expires_at }),
  ))
}

#[instrument(level = "info", skip(state, token))]
pub async fn http_resume_progress(
  State(state): State<Arc<AppState>>,
  Path(token): Path<String>,
) -> Result<Json<crate::domain::SavedProgress>, ApiError> {
  let progress = logic::resume_progress(&state, &token).await?;
  Ok(Json(progress))
}

/// Resolve and require an authenticated user for owner-only endpoints.
fn authed(state: &AppState, headers: &HeaderMap) -> Result<User, ApiError> {
  require_user(resolve_bearer(state.validator.as_ref(), headers))
}
