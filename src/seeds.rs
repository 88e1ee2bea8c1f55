//! Seed data: built-in demo forms.

use chrono::Utc;

use crate::domain::{
  Form, LogicRule, Question, QuestionType, RuleAction, RuleCondition, RuleValue, TextAlign,
};

/// Minimal set of built-in forms that guarantee the API is useful even
/// without external config. Owned by the development user so they show up
/// on the dashboard when the minted dev credential is in play.
pub fn seed_forms() -> Vec<Form> {
  vec![feedback_form(), branching_form()]
}

/// "Customer feedback": asks why only when the rating is low.
fn feedback_form() -> Form {
  let now = Utc::now();
  Form {
    id: "demo-feedback".into(),
    user_id: "dev-user".into(),
    title: "Customer feedback".into(),
    description: Some("Two quick questions about your experience.".into()),
    questions: vec![
      Question {
        id: "rating".into(),
        kind: QuestionType::Number,
        question: "How would you rate us, 1 to 5?".into(),
        options: None,
        statement: None,
        file_upload_config: None,
        contact_fields: None,
        required: true,
        logic: vec![LogicRule {
          id: "rating-skips-reason".into(),
          question_id: "rating".into(),
          condition: RuleCondition::GreaterThan,
          value: RuleValue::Number(3.0),
          action: RuleAction::Hide,
          target_question_id: "reason".into(),
        }],
        visible: true,
      },
      Question {
        id: "reason".into(),
        kind: QuestionType::LongText,
        question: "Sorry to hear that. What went wrong?".into(),
        options: None,
        statement: None,
        file_upload_config: None,
        contact_fields: None,
        required: true,
        logic: vec![],
        visible: true,
      },
      Question {
        id: "email".into(),
        kind: QuestionType::Email,
        question: "Leave an email if we may follow up (optional).".into(),
        options: None,
        statement: None,
        file_upload_config: None,
        contact_fields: None,
        required: false,
        logic: vec![],
        visible: true,
      },
    ],
    response_count: 0,
    button_text: "Send feedback".into(),
    text_align: TextAlign::Center,
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

/// "Event signup": a Yes/No gate that hides the detail questions for "No".
fn branching_form() -> Form {
  let now = Utc::now();
  let gate_rule = |id: &str, target: &str| LogicRule {
    id: id.into(),
    question_id: "attending".into(),
    condition: RuleCondition::Equals,
    value: RuleValue::Text("No".into()),
    action: RuleAction::Hide,
    target_question_id: target.into(),
  };
  Form {
    id: "demo-branching".into(),
    user_id: "dev-user".into(),
    title: "Team offsite signup".into(),
    description: None,
    questions: vec![
      Question {
        id: "welcome".into(),
        kind: QuestionType::Statement,
        question: "Welcome!".into(),
        options: None,
        statement: Some("This takes less than a minute.".into()),
        file_upload_config: None,
        contact_fields: None,
        required: false,
        logic: vec![],
        visible: true,
      },
      Question {
        id: "attending".into(),
        kind: QuestionType::MultipleChoice,
        question: "Will you attend the offsite?".into(),
        options: Some(vec!["Yes".into(), "No".into()]),
        statement: None,
        file_upload_config: None,
        contact_fields: None,
        required: true,
        logic: vec![gate_rule("no-hides-meal", "meal"), gate_rule("no-hides-contact", "contact")],
        visible: true,
      },
      Question {
        id: "meal".into(),
        kind: QuestionType::Checkbox,
        question: "Any dietary preferences?".into(),
        options: Some(vec!["Vegetarian".into(), "Vegan".into(), "Gluten-free".into()]),
        statement: None,
        file_upload_config: None,
        contact_fields: None,
        required: false,
        logic: vec![],
        visible: true,
      },
      Question {
        id: "contact".into(),
        kind: QuestionType::ContactInfo,
        question: "How can we reach you?".into(),
        options: None,
        statement: None,
        file_upload_config: None,
        contact_fields: Some(Default::default()),
        required: true,
        logic: vec![],
        visible: true,
      },
    ],
    response_count: 0,
    button_text: "Sign up".into(),
    text_align: TextAlign::Center,
    submit_button_color: Some("#2563eb".into()),
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
