//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Form authoring (create, partial update with orphan-rule pruning, delete)
//!   - Visibility preview for the builder
//!   - Response submission (snapshot answers, visibility-aware required check)
//!   - Saved progress (park under a resume token, resume until expiry)
//!
//! Everything here takes `&AppState` and domain/protocol values; axum types
//! never reach this module.

use chrono::{Duration, Utc};
use tracing::{debug, info, instrument};

use crate::domain::{AnswerMap, AnswerRecord, AnswerValue, Form, ResponseRecord, SavedProgress, User};
use crate::error::ApiError;
use crate::protocol::{CreateFormIn, SaveProgressIn, SubmitResponseIn, UpdateFormIn};
use crate::state::AppState;
use crate::util::{data_url_decoded_len, new_id, random_token};
use crate::visibility::{evaluate_visibility, missing_required, visible_order, VisibilityMap};

/// How long parked progress stays resumable.
const PROGRESS_TTL_DAYS: i64 = 7;
/// Length of generated resume tokens (alphanumeric).
const RESUME_TOKEN_LEN: usize = 32;

/// Create a form owned by `owner`. The payload is validated as authored;
/// a form that arrives with dangling or self-targeting rules is rejected.
#[instrument(level = "info", skip(state, input), fields(owner = %owner.id, title = %input.title, question_count = input.questions.len()))]
pub async fn create_form(state: &AppState, owner: &User, input: CreateFormIn) -> Result<Form, ApiError> {
  let now = Utc::now();
  let form = Form {
    id: new_id(),
    user_id: owner.id.clone(),
    title: input.title,
    description: input.description,
    questions: input.questions,
    response_count: 0,
    button_text: input.button_text.unwrap_or_else(|| "Submit".into()),
    text_align: input.text_align.unwrap_or_default(),
    submit_button_color: input.submit_button_color,
    title_color: input.title_color,
    question_color: input.question_color,
    description_color: input.description_color,
    background_color: input.background_color,
    redirect_url: input.redirect_url,
    email_notifications: input.email_notifications,
    created_at: now,
    updated_at: now,
  };
  form.validate()?;
  state.insert_form(form.clone()).await;
  info!(target: "form", id = %form.id, owner = %form.user_id, "Form created");
  Ok(form)
}

/// Apply a partial update to an owned form. Everything but id and owner can
/// change. Rules orphaned by question edits are pruned before validation, so
/// deleting a question never strands the update behind its own leftovers.
#[instrument(level = "info", skip(state, input), fields(%form_id, owner = %owner.id))]
pub async fn apply_form_update(
  state: &AppState,
  owner: &User,
  form_id: &str,
  input: UpdateFormIn,
) -> Result<Form, ApiError> {
  let mut form = state
    .get_form(form_id)
    .await
    .ok_or_else(|| ApiError::NotFound(format!("form {form_id}")))?;
  if form.user_id != owner.id {
    return Err(ApiError::Forbidden("you do not own this form".into()));
  }

  if let Some(title) = input.title {
    form.title = title;
  }
  if let Some(description) = input.description {
    form.description = Some(description);
  }
  if let Some(questions) = input.questions {
    form.questions = questions;
  }
  if let Some(button_text) = input.button_text {
    form.button_text = button_text;
  }
  if let Some(text_align) = input.text_align {
    form.text_align = text_align;
  }
  if let Some(c) = input.submit_button_color {
    form.submit_button_color = Some(c);
  }
  if let Some(c) = input.title_color {
    form.title_color = Some(c);
  }
  if let Some(c) = input.question_color {
    form.question_color = Some(c);
  }
  if let Some(c) = input.description_color {
    form.description_color = Some(c);
  }
  if let Some(c) = input.background_color {
    form.background_color = Some(c);
  }
  if let Some(url) = input.redirect_url {
    form.redirect_url = Some(url);
  }
  if let Some(n) = input.email_notifications {
    form.email_notifications = Some(n);
  }

  let pruned = form.prune_orphan_rules();
  if pruned > 0 {
    info!(target: "form", id = %form.id, pruned, "Pruned logic rules orphaned by question changes");
  }
  form.validate()?;
  form.updated_at = Utc::now();

  state.insert_form(form.clone()).await;
  info!(target: "form", id = %form.id, "Form updated");
  Ok(form)
}

/// Delete an owned form.
#[instrument(level = "info", skip(state), fields(%form_id, owner = %owner.id))]
pub async fn delete_form(state: &AppState, owner: &User, form_id: &str) -> Result<(), ApiError> {
  let form = state
    .get_form(form_id)
    .await
    .ok_or_else(|| ApiError::NotFound(format!("form {form_id}")))?;
  if form.user_id != owner.id {
    return Err(ApiError::Forbidden("you do not own this form".into()));
  }
  state.remove_form(form_id).await;
  info!(target: "form", id = %form_id, "Form deleted");
  Ok(())
}

/// Evaluate a form's visibility against supplied answers. Used for the
/// builder's preview and shared by the WS session path.
#[instrument(level = "info", skip(state, answers), fields(%form_id, answer_count = answers.len()))]
pub async fn preview_visibility(
  state: &AppState,
  form_id: &str,
  answers: &AnswerMap,
) -> Result<(VisibilityMap, Vec<String>), ApiError> {
  let form = state
    .get_form(form_id)
    .await
    .ok_or_else(|| ApiError::NotFound(format!("form {form_id}")))?;
  let visibility = evaluate_visibility(&form.questions, answers);
  let order = visible_order(&form.questions, &visibility);
  Ok((visibility, order))
}

/// List responses submitted to an owned form, newest first.
#[instrument(level = "info", skip(state), fields(%form_id, owner = %owner.id))]
pub async fn list_responses(
  state: &AppState,
  owner: &User,
  form_id: &str,
) -> Result<Vec<ResponseRecord>, ApiError> {
  let form = state
    .get_form(form_id)
    .await
    .ok_or_else(|| ApiError::NotFound(format!("form {form_id}")))?;
  if form.user_id != owner.id {
    return Err(ApiError::Forbidden("you do not own this form".into()));
  }
  Ok(state.responses_for_form(form_id).await)
}

/// Submit a response. Answers are snapshotted against the form as it exists
/// right now: each record carries the prompt text and question type, so later
/// form edits don't rewrite what respondents were asked. Complete submissions
/// must answer every required question that is *visible* under the submitted
/// answers; hidden questions never block, and their answers are kept.
#[instrument(level = "info", skip(state, input), fields(form_id = %input.form_id, answer_count = input.answers.len(), is_partial = input.is_partial))]
pub async fn submit_response(state: &AppState, input: SubmitResponseIn) -> Result<ResponseRecord, ApiError> {
  let form = state
    .get_form(&input.form_id)
    .await
    .ok_or_else(|| ApiError::NotFound(format!("form {}", input.form_id)))?;

  check_file_answers(&form, &input.answers)?;

  let visibility = evaluate_visibility(&form.questions, &input.answers);
  if !input.is_partial {
    let missing = missing_required(&form.questions, &visibility, &input.answers);
    if !missing.is_empty() {
      return Err(ApiError::MissingRequired(missing));
    }
  }

  // Snapshot: keep only answers that match a current question, with the
  // prompt and type copied in. Ids with no matching question are dropped.
  let mut answers = std::collections::HashMap::new();
  let mut dropped = 0usize;
  for (question_id, answer) in input.answers {
    match form.find_question(&question_id) {
      Some(q) => {
        answers.insert(
          question_id,
          AnswerRecord { question: q.question.clone(), answer, kind: q.kind },
        );
      }
      None => dropped += 1,
    }
  }
  if dropped > 0 {
    debug!(target: "response", form_id = %form.id, dropped, "Dropped answers with no matching question");
  }

  let record = ResponseRecord {
    id: new_id(),
    form_id: form.id.clone(),
    answers,
    submitted_at: Utc::now(),
    is_partial: input.is_partial,
    last_question_answered: input.last_question_answered,
  };
  state.record_response(record.clone()).await;
  info!(target: "response", id = %record.id, form_id = %record.form_id, is_partial = record.is_partial, "Response recorded");
  Ok(record)
}

/// Park a partially filled answer set under a fresh resume token.
#[instrument(level = "info", skip(state, input), fields(form_id = %input.form_id, answer_count = input.answers.len()))]
pub async fn park_progress(state: &AppState, input: SaveProgressIn) -> Result<SavedProgress, ApiError> {
  if state.get_form(&input.form_id).await.is_none() {
    return Err(ApiError::NotFound(format!("form {}", input.form_id)));
  }
  let now = Utc::now();
  let progress = SavedProgress {
    id: new_id(),
    form_id: input.form_id,
    answers: input.answers,
    last_question_answered: input.last_question_answered,
    resume_token: random_token(RESUME_TOKEN_LEN),
    email: input.email,
    created_at: now,
    expires_at: now + Duration::days(PROGRESS_TTL_DAYS),
  };
  state.insert_progress(progress.clone()).await;
  info!(target: "response", id = %progress.id, form_id = %progress.form_id, expires_at = %progress.expires_at, "Progress parked");
  Ok(progress)
}

/// Resume parked progress by token. Expired entries answer 410 and are
/// dropped from the store.
#[instrument(level = "info", skip(state, token))]
pub async fn resume_progress(state: &AppState, token: &str) -> Result<SavedProgress, ApiError> {
  let progress = state
    .get_progress(token)
    .await
    .ok_or_else(|| ApiError::NotFound("unknown resume token".into()))?;
  if progress.expires_at <= Utc::now() {
    state.remove_progress(token).await;
    return Err(ApiError::Gone("resume token has expired".into()));
  }
  Ok(progress)
}

/// Enforce per-question upload constraints on file answers. File answers for
/// questions without an upload config (or for unknown ids) pass through; the
/// snapshot step decides what to keep.
fn check_file_answers(form: &Form, answers: &AnswerMap) -> Result<(), ApiError> {
  for (question_id, answer) in answers {
    let files = match answer {
      AnswerValue::Files(files) => files,
      _ => continue,
    };
    let config = match form.find_question(question_id).and_then(|q| q.file_upload_config.as_ref()) {
      Some(config) => config,
      None => continue,
    };

    if let Some(max_files) = config.max_files {
      if files.len() > max_files as usize {
        return Err(ApiError::Validation(format!(
          "question {question_id}: at most {max_files} files allowed"
        )));
      }
    }
    for file in files {
      if let Some(max_size) = config.max_file_size {
        // Prefer the decoded-size estimate of the embedded payload over the
        // client-reported size; the latter is whatever the client claims.
        let size = file
          .data_url
          .as_deref()
          .and_then(data_url_decoded_len)
          .map(|n| n as u64)
          .unwrap_or(file.size);
        if size > max_size {
          return Err(ApiError::Validation(format!(
            "question {question_id}: file '{}' exceeds {max_size} bytes",
            file.name
          )));
        }
      }
      if let Some(accepted) = &config.accepted_file_types {
        if !accepted.is_empty() && !accepted.iter().any(|t| mime_matches(t, &file.mime)) {
          return Err(ApiError::Validation(format!(
            "question {question_id}: file type '{}' is not accepted",
            file.mime
          )));
        }
      }
    }
  }
  Ok(())
}

/// `image/*` style patterns match by prefix; anything else matches exactly.
fn mime_matches(pattern: &str, mime: &str) -> bool {
  match pattern.strip_suffix("/*") {
    Some(prefix) => mime
      .split_once('/')
      .map(|(main, _)| main.eq_ignore_ascii_case(prefix))
      .unwrap_or(false),
    None => pattern.eq_ignore_ascii_case(mime),
  }
}
