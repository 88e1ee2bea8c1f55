//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{AnswerMap, AnswerValue, EmailNotifications, Form, Question, TextAlign};
use crate::visibility::VisibilityMap;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    StartSession {
        #[serde(rename = "formId")]
        form_id: String,
    },
    UpdateAnswer {
        #[serde(rename = "questionId")]
        question_id: String,
        value: AnswerValue,
    },
    ClearAnswer {
        #[serde(rename = "questionId")]
        question_id: String,
    },
    Submit {
        #[serde(rename = "isPartial", default)]
        is_partial: bool,
    },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Session {
        form: FormOut,
        visibility: VisibilityMap,
        #[serde(rename = "visibleOrder")]
        visible_order: Vec<String>,
    },
    Visibility {
        visibility: VisibilityMap,
        #[serde(rename = "visibleOrder")]
        visible_order: Vec<String>,
    },
    Submitted {
        #[serde(rename = "responseId")]
        response_id: String,
    },
    Error {
        message: String,
    },
}

/// Respondent-facing form DTO, used by the public form fetch and the WS
/// session. Owner-only fields (user id, notification settings) are stripped;
/// everything the renderer needs is kept, including logic rules.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormOut {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub questions: Vec<Question>,
    pub response_count: u64,

    pub button_text: String,
    pub text_align: TextAlign,
    pub submit_button_color: Option<String>,
    pub title_color: Option<String>,
    pub question_color: Option<String>,
    pub description_color: Option<String>,
    pub background_color: Option<String>,
    pub redirect_url: Option<String>,
}

/// Convert the full `Form` document (internal) to the public DTO.
pub fn to_out(f: &Form) -> FormOut {
    FormOut {
        id: f.id.clone(),
        title: f.title.clone(),
        description: f.description.clone(),
        questions: f.questions.clone(),
        response_count: f.response_count,

        button_text: f.button_text.clone(),
        text_align: f.text_align,
        submit_button_color: f.submit_button_color.clone(),
        title_color: f.title_color.clone(),
        question_color: f.question_color.clone(),
        description_color: f.description_color.clone(),
        background_color: f.background_color.clone(),
        redirect_url: f.redirect_url.clone(),
    }
}

//
// HTTP request/response DTOs
//

/// Body of `POST /api/v1/forms`. Owner, id, counters, and timestamps are
/// assigned server-side.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFormIn {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub button_text: Option<String>,
    #[serde(default)]
    pub text_align: Option<TextAlign>,
    #[serde(default)]
    pub submit_button_color: Option<String>,
    #[serde(default)]
    pub title_color: Option<String>,
    #[serde(default)]
    pub question_color: Option<String>,
    #[serde(default)]
    pub description_color: Option<String>,
    #[serde(default)]
    pub background_color: Option<String>,
    #[serde(default)]
    pub redirect_url: Option<String>,
    #[serde(default)]
    pub email_notifications: Option<EmailNotifications>,
}

/// Body of `PUT /api/v1/forms/:id`. Partial update: absent fields keep their
/// stored values; id and owner can never be changed through this.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFormIn {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub questions: Option<Vec<Question>>,
    #[serde(default)]
    pub button_text: Option<String>,
    #[serde(default)]
    pub text_align: Option<TextAlign>,
    #[serde(default)]
    pub submit_button_color: Option<String>,
    #[serde(default)]
    pub title_color: Option<String>,
    #[serde(default)]
    pub question_color: Option<String>,
    #[serde(default)]
    pub description_color: Option<String>,
    #[serde(default)]
    pub background_color: Option<String>,
    #[serde(default)]
    pub redirect_url: Option<String>,
    #[serde(default)]
    pub email_notifications: Option<EmailNotifications>,
}

/// Body of `POST /api/v1/forms/:id/visibility` (builder preview).
#[derive(Debug, Deserialize)]
pub struct VisibilityIn {
    #[serde(default)]
    pub answers: AnswerMap,
}

#[derive(Debug, Serialize)]
pub struct VisibilityOut {
    pub visibility: VisibilityMap,
    #[serde(rename = "visibleOrder")]
    pub visible_order: Vec<String>,
}

/// Body of `POST /api/v1/responses`.
#[derive(Debug, Deserialize)]
pub struct SubmitResponseIn {
    #[serde(rename = "formId")]
    pub form_id: String,
    #[serde(default)]
    pub answers: AnswerMap,
    #[serde(rename = "isPartial", default)]
    pub is_partial: bool,
    #[serde(rename = "lastQuestionAnswered", default)]
    pub last_question_answered: Option<u32>,
}

/// Body of `POST /api/v1/progress`.
#[derive(Debug, Deserialize)]
pub struct SaveProgressIn {
    #[serde(rename = "formId")]
    pub form_id: String,
    #[serde(default)]
    pub answers: AnswerMap,
    #[serde(rename = "lastQuestionAnswered", default)]
    pub last_question_answered: Option<u32>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Reply to a progress save: the opaque handle the respondent resumes with.
#[derive(Debug, Serialize)]
pub struct SaveProgressOut {
    #[serde(rename = "resumeToken")]
    pub resume_token: String,
    #[serde(rename = "expiresAt")]
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Serialize)]
pub struct MessageOut {
    pub message: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_ws_messages_parse_from_tagged_json() {
        let msg: ClientWsMessage =
            serde_json::from_str(r#"{"type":"start_session","formId":"f1"}"#).unwrap();
        match msg {
            ClientWsMessage::StartSession { form_id } => assert_eq!(form_id, "f1"),
            other => panic!("expected StartSession, got {:?}", other),
        }

        let msg: ClientWsMessage =
            serde_json::from_str(r#"{"type":"update_answer","questionId":"q1","value":["a","b"]}"#)
                .unwrap();
        match msg {
            ClientWsMessage::UpdateAnswer { question_id, value } => {
                assert_eq!(question_id, "q1");
                assert_eq!(value, AnswerValue::Selections(vec!["a".into(), "b".into()]));
            }
            other => panic!("expected UpdateAnswer, got {:?}", other),
        }

        // isPartial defaults to false when omitted.
        let msg: ClientWsMessage = serde_json::from_str(r#"{"type":"submit"}"#).unwrap();
        match msg {
            ClientWsMessage::Submit { is_partial } => assert!(!is_partial),
            other => panic!("expected Submit, got {:?}", other),
        }
    }

    #[test]
    fn server_ws_messages_serialize_with_snake_case_tags() {
        let out =
            serde_json::to_value(ServerWsMessage::Submitted { response_id: "r1".into() }).unwrap();
        assert_eq!(out["type"], "submitted");
        assert_eq!(out["responseId"], "r1");

        let out = serde_json::to_value(ServerWsMessage::Visibility {
            visibility: VisibilityMap::from([("q1".to_string(), false)]),
            visible_order: vec![],
        })
        .unwrap();
        assert_eq!(out["type"], "visibility");
        assert_eq!(out["visibility"]["q1"], false);
        assert_eq!(out["visibleOrder"], serde_json::json!([]));
    }

    #[test]
    fn update_form_body_may_be_sparse() {
        let body: UpdateFormIn = serde_json::from_str(r#"{"title":"Renamed"}"#).unwrap();
        assert_eq!(body.title.as_deref(), Some("Renamed"));
        assert!(body.questions.is_none());
        assert!(body.email_notifications.is_none());
    }
}
