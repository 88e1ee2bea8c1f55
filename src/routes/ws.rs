//! WebSocket upgrade + message loop: the live fill-out session.
//!
//! Each connection carries one respondent's session (a form snapshot plus
//! their in-flight answers). Every answer mutation re-evaluates visibility
//! and replies with the fresh map, so the client never decides on its own
//! which question comes next. Answers for questions a rule currently hides
//! are kept in the session; toggling visibility back never loses input.
//! We reply with a single JSON message per request.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{info, error, instrument, debug};

use crate::domain::{AnswerMap, AnswerValue, Form};
use crate::error::ApiError;
use crate::logic::*;
use crate::protocol::{to_out, ClientWsMessage, ServerWsMessage, SubmitResponseIn};
use crate::state::AppState;
use crate::util::trunc_for_log;
use crate::visibility::{evaluate_visibility, visible_order};

/// One respondent's in-flight fill-out: the form as it looked when the
/// session started, and the answers collected so far.
struct FillSession {
  form: Form,
  answers: AnswerMap,
}

impl FillSession {
  fn visibility_reply(&self) -> ServerWsMessage {
    let visibility = evaluate_visibility(&self.form.questions, &self.answers);
    let order = visible_order(&self.form.questions, &visibility);
    ServerWsMessage::Visibility { visibility, visible_order: order }
  }
}

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "formlet_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "formlet_backend", "WebSocket connected");
  let mut session: Option<FillSession> = None;
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        // Parse, dispatch, serialize response.
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            // Answer payloads can embed data URLs; never log them whole.
            debug!(target = "formlet_backend", "WS received: {}", trunc_for_log(&txt, 256));
            handle_client_ws(&mut session, incoming, &state).await
          }
          Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
        };

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "formlet_backend", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "formlet_backend", "WebSocket disconnected");
}

#[instrument(level = "info", skip(session, state))]
async fn handle_client_ws(
  session: &mut Option<FillSession>,
  msg: ClientWsMessage,
  state: &AppState,
) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::StartSession { form_id } => match state.get_form(&form_id).await {
      Some(form) => {
        let answers = AnswerMap::new();
        let visibility = evaluate_visibility(&form.questions, &answers);
        let order = visible_order(&form.questions, &visibility);
        tracing::info!(target: "form", %form_id, "WS fill-out session started");
        let out = to_out(&form);
        *session = Some(FillSession { form, answers });
        ServerWsMessage::Session { form: out, visibility, visible_order: order }
      }
      None => ServerWsMessage::Error { message: format!("Unknown formId: {}", form_id) },
    },

    ClientWsMessage::UpdateAnswer { question_id, value } => match session.as_mut() {
      Some(sess) => {
        if sess.form.find_question(&question_id).is_none() {
          return ServerWsMessage::Error { message: format!("Unknown questionId: {}", question_id) };
        }
        // An explicit null clears; anything else replaces.
        if matches!(value, AnswerValue::Empty) {
          sess.answers.remove(&question_id);
        } else {
          sess.answers.insert(question_id, value);
        }
        sess.visibility_reply()
      }
      None => no_session(),
    },

    ClientWsMessage::ClearAnswer { question_id } => match session.as_mut() {
      Some(sess) => {
        sess.answers.remove(&question_id);
        sess.visibility_reply()
      }
      None => no_session(),
    },

    ClientWsMessage::Submit { is_partial } => match session.as_ref() {
      Some(sess) => {
        let input = SubmitResponseIn {
          form_id: sess.form.id.clone(),
          answers: sess.answers.clone(),
          is_partial,
          last_question_answered: None,
        };
        match submit_response(state, input).await {
          Ok(record) => {
            tracing::info!(target: "response", id = %record.id, form_id = %record.form_id, "WS submission recorded");
            ServerWsMessage::Submitted { response_id: record.id }
          }
          Err(e) => ServerWsMessage::Error { message: submit_error_message(e) },
        }
      }
      None => no_session(),
    },
  }
}

fn no_session() -> ServerWsMessage {
  ServerWsMessage::Error { message: "No active session; send start_session first.".into() }
}

/// Flatten an `ApiError` into a WS error message; the missing-required case
/// names the offending questions so the client can highlight them.
fn submit_error_message(err: ApiError) -> String {
  match err {
    ApiError::MissingRequired(ids) => {
      format!("required questions are unanswered: {}", ids.join(", "))
    }
    other => other.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{LogicRule, Question, QuestionType, RuleAction, RuleCondition, RuleValue};
  use chrono::Utc;

  fn fixture_form() -> Form {
    let now = Utc::now();
    let mut gate = Question {
      id: "gate".into(),
      kind: QuestionType::MultipleChoice,
      question: "Continue?".into(),
      options: Some(vec!["Yes".into(), "No".into()]),
      statement: None,
      file_upload_config: None,
      contact_fields: None,
      required: true,
      logic: vec![],
      visible: true,
    };
    gate.logic.push(LogicRule {
      id: "r1".into(),
      question_id: "gate".into(),
      condition: RuleCondition::Equals,
      value: RuleValue::Text("No".into()),
      action: RuleAction::Hide,
      target_question_id: "details".into(),
    });
    let details = Question {
      id: "details".into(),
      kind: QuestionType::Text,
      question: "Tell us more".into(),
      options: None,
      statement: None,
      file_upload_config: None,
      contact_fields: None,
      required: false,
      logic: vec![],
      visible: true,
    };
    Form {
      id: "ws-fixture".into(),
      user_id: "u1".into(),
      title: "WS fixture".into(),
      description: None,
      questions: vec![gate, details],
      response_count: 0,
      button_text: "Submit".into(),
      text_align: crate::domain::TextAlign::Center,
      submit_button_color: None,
      title_color: None,
      question_color: None,
      description_color: None,
      background_color: None,
      redirect_url: None,
      email_notifications: None,
      created_at: now,
      updated_at: now,
    }
  }

  fn text(s: &str) -> AnswerValue {
    AnswerValue::Text(s.into())
  }

  #[tokio::test]
  async fn session_flow_reevaluates_visibility_per_mutation() {
    let state = AppState::from_config(None);
    state.insert_form(fixture_form()).await;
    let mut session = None;

    // Start: everything visible, owner fields stripped from the form DTO.
    let reply = handle_client_ws(
      &mut session,
      ClientWsMessage::StartSession { form_id: "ws-fixture".into() },
      &state,
    )
    .await;
    match reply {
      ServerWsMessage::Session { form, visibility, visible_order } => {
        assert_eq!(form.id, "ws-fixture");
        assert!(visibility["gate"] && visibility["details"]);
        assert_eq!(visible_order, vec!["gate".to_string(), "details".to_string()]);
      }
      other => panic!("expected Session, got {other:?}"),
    }

    // "No" hides the details question.
    let reply = handle_client_ws(
      &mut session,
      ClientWsMessage::UpdateAnswer { question_id: "gate".into(), value: text("No") },
      &state,
    )
    .await;
    match reply {
      ServerWsMessage::Visibility { visibility, visible_order } => {
        assert!(!visibility["details"]);
        assert_eq!(visible_order, vec!["gate".to_string()]);
      }
      other => panic!("expected Visibility, got {other:?}"),
    }

    // Clearing the gate answer restores the default.
    let reply = handle_client_ws(
      &mut session,
      ClientWsMessage::ClearAnswer { question_id: "gate".into() },
      &state,
    )
    .await;
    match reply {
      ServerWsMessage::Visibility { visibility, .. } => assert!(visibility["details"]),
      other => panic!("expected Visibility, got {other:?}"),
    }
  }

  #[tokio::test]
  async fn answers_behind_hidden_questions_survive_submission() {
    let state = AppState::from_config(None);
    state.insert_form(fixture_form()).await;
    let mut session = None;

    handle_client_ws(&mut session, ClientWsMessage::StartSession { form_id: "ws-fixture".into() }, &state).await;
    handle_client_ws(
      &mut session,
      ClientWsMessage::UpdateAnswer { question_id: "details".into(), value: text("typed early") },
      &state,
    )
    .await;
    // Hiding "details" afterwards must not drop its stored answer.
    handle_client_ws(
      &mut session,
      ClientWsMessage::UpdateAnswer { question_id: "gate".into(), value: text("No") },
      &state,
    )
    .await;

    let reply = handle_client_ws(&mut session, ClientWsMessage::Submit { is_partial: false }, &state).await;
    let response_id = match reply {
      ServerWsMessage::Submitted { response_id } => response_id,
      other => panic!("expected Submitted, got {other:?}"),
    };

    let stored = state.responses_for_form("ws-fixture").await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, response_id);
    assert_eq!(stored[0].answers["details"].answer, text("typed early"));
  }

  #[tokio::test]
  async fn submit_without_required_visible_answer_reports_the_question() {
    let state = AppState::from_config(None);
    state.insert_form(fixture_form()).await;
    let mut session = None;

    handle_client_ws(&mut session, ClientWsMessage::StartSession { form_id: "ws-fixture".into() }, &state).await;
    let reply = handle_client_ws(&mut session, ClientWsMessage::Submit { is_partial: false }, &state).await;
    match reply {
      ServerWsMessage::Error { message } => assert!(message.contains("gate"), "got: {message}"),
      other => panic!("expected Error, got {other:?}"),
    }
  }

  #[tokio::test]
  async fn messages_before_start_session_are_rejected() {
    let state = AppState::from_config(None);
    let mut session = None;

    let reply = handle_client_ws(
      &mut session,
      ClientWsMessage::UpdateAnswer { question_id: "gate".into(), value: text("No") },
      &state,
    )
    .await;
    assert!(matches!(reply, ServerWsMessage::Error { .. }));

    let reply = handle_client_ws(
      &mut session,
      ClientWsMessage::StartSession { form_id: "missing".into() },
      &state,
    )
    .await;
    assert!(matches!(reply, ServerWsMessage::Error { .. }));

    let reply = handle_client_ws(&mut session, ClientWsMessage::Ping, &state).await;
    assert!(matches!(reply, ServerWsMessage::Pong));
  }
}
