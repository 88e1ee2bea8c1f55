//! Domain models used by the backend: forms, questions, logic rules, answers,
//! responses, saved progress, and users. All wire names are camelCase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Answers keyed by question id, as collected from a respondent.
pub type AnswerMap = HashMap<String, AnswerValue>;

/// What kind of input does a question collect?
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum QuestionType {
  Text,
  LongText,
  Number,
  MultipleChoice,
  Checkbox,
  Date,
  Email,
  Signature,
  Statement,
  Url,
  SingleSelect,
  FileUpload,
  ContactInfo,
}

impl QuestionType {
  /// Statements are display-only; everything else collects an answer.
  pub fn collects_answer(self) -> bool {
    !matches!(self, QuestionType::Statement)
  }

  /// Choice questions must carry a non-empty option list.
  pub fn needs_options(self) -> bool {
    matches!(self, QuestionType::MultipleChoice | QuestionType::Checkbox | QuestionType::SingleSelect)
  }
}

/// Comparison applied between a source answer and a rule value.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RuleCondition {
  Equals,
  NotEquals,
  Contains,
  NotContains,
  GreaterThan,
  LessThan,
}

/// What a rule does to its target question when the condition holds.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RuleAction {
  Show,
  Hide,
}

/// Rule comparison value as authored in the builder: a number or a string.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RuleValue {
  Number(f64),
  Text(String),
}

/// One visibility rule: when `question_id`'s answer matches `condition`/`value`,
/// apply `action` to `target_question_id`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LogicRule {
  #[serde(default = "crate::util::new_id")]
  pub id: String,
  pub question_id: String,
  pub condition: RuleCondition,
  pub value: RuleValue,
  pub action: RuleAction,
  pub target_question_id: String,
}

/// Upload constraints for fileUpload questions.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUploadConfig {
  #[serde(default)] pub max_files: Option<u32>,
  #[serde(default)] pub max_file_size: Option<u64>,   // bytes
  #[serde(default)] pub accepted_file_types: Option<Vec<String>>,
}

/// Which sub-fields a contactInfo question shows.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactFields {
  #[serde(default = "default_true")] pub first_name: bool,
  #[serde(default = "default_true")] pub last_name: bool,
  #[serde(default = "default_true")] pub email: bool,
  #[serde(default = "default_true")] pub phone: bool,
  #[serde(default)] pub company: bool,
}

impl Default for ContactFields {
  fn default() -> Self {
    ContactFields { first_name: true, last_name: true, email: true, phone: true, company: false }
  }
}

/// One question inside a form.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
  #[serde(default = "crate::util::new_id")]
  pub id: String,
  #[serde(rename = "type")]
  pub kind: QuestionType,
  /// Prompt shown to the respondent.
  pub question: String,

  #[serde(default)] pub options: Option<Vec<String>>,      // choice questions
  #[serde(default)] pub statement: Option<String>,         // statement questions
  #[serde(default)] pub file_upload_config: Option<FileUploadConfig>,
  #[serde(default)] pub contact_fields: Option<ContactFields>,
  #[serde(default)] pub required: bool,
  /// Stored rule order; later rules win over earlier ones.
  #[serde(default)] pub logic: Vec<LogicRule>,
  /// Builder-side flag; runtime visibility is always recomputed from rules.
  #[serde(default = "default_true")] pub visible: bool,
}

/// Horizontal alignment of the rendered form text.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TextAlign {
  Left,
  Center,
  Right,
}
impl Default for TextAlign {
  fn default() -> Self { TextAlign::Center }
}

/// Owner-configured notification settings. Delivery is out of scope here;
/// we only store the configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailNotifications {
  #[serde(default)] pub enabled: bool,
  #[serde(default)] pub email: String,
  #[serde(default)] pub subject: Option<String>,
  #[serde(default)] pub reply_to: Option<String>,
}

/// Core form document persisted in-memory.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Form {
  #[serde(default = "crate::util::new_id")]
  pub id: String,
  #[serde(default)] pub user_id: String,
  pub title: String,
  #[serde(default)] pub description: Option<String>,
  #[serde(default)] pub questions: Vec<Question>,
  #[serde(default)] pub response_count: u64,

  // Presentation settings; rendering is the client's job, we just keep them.
  #[serde(default = "default_button_text")] pub button_text: String,
  #[serde(default)] pub text_align: TextAlign,
  #[serde(default)] pub submit_button_color: Option<String>,
  #[serde(default)] pub title_color: Option<String>,
  #[serde(default)] pub question_color: Option<String>,
  #[serde(default)] pub description_color: Option<String>,
  #[serde(default)] pub background_color: Option<String>,
  #[serde(default)] pub redirect_url: Option<String>,
  #[serde(default)] pub email_notifications: Option<EmailNotifications>,

  #[serde(default = "Utc::now")] pub created_at: DateTime<Utc>,
  #[serde(default = "Utc::now")] pub updated_at: DateTime<Utc>,
}

/// Why a form was rejected at authoring time.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
  #[error("form title must not be empty")]
  EmptyTitle,
  #[error("question {0} has an empty prompt")]
  EmptyPrompt(String),
  #[error("duplicate question id: {0}")]
  DuplicateQuestionId(String),
  #[error("question {0} is a choice question with no options")]
  MissingOptions(String),
  #[error("rule {rule}: source question {source_id} is not in this form")]
  UnknownSource { rule: String, source_id: String },
  #[error("rule {rule}: target question {target} is not in this form")]
  UnknownTarget { rule: String, target: String },
  #[error("rule {rule}: a rule may not show or hide its own source question")]
  SelfTargetingRule { rule: String },
  #[error("rule {rule}: greaterThan/lessThan need a numeric comparison value")]
  NonNumericOrdering { rule: String },
}

impl Form {
  pub fn find_question(&self, id: &str) -> Option<&Question> {
    self.questions.iter().find(|q| q.id == id)
  }

  /// Authoring-time checks: non-empty title and prompts, unique question ids,
  /// options on choice questions, and well-formed rules (source/target
  /// present, target != source, numeric values on ordering conditions).
  pub fn validate(&self) -> Result<(), ValidationError> {
    if self.title.trim().is_empty() {
      return Err(ValidationError::EmptyTitle);
    }
    let mut ids = HashSet::new();
    for q in &self.questions {
      if q.question.trim().is_empty() {
        return Err(ValidationError::EmptyPrompt(q.id.clone()));
      }
      if !ids.insert(q.id.as_str()) {
        return Err(ValidationError::DuplicateQuestionId(q.id.clone()));
      }
      if q.kind.needs_options() && q.options.as_ref().map_or(true, |o| o.is_empty()) {
        return Err(ValidationError::MissingOptions(q.id.clone()));
      }
    }
    for q in &self.questions {
      for r in &q.logic {
        if r.question_id == r.target_question_id {
          return Err(ValidationError::SelfTargetingRule { rule: r.id.clone() });
        }
        if !ids.contains(r.question_id.as_str()) {
          return Err(ValidationError::UnknownSource { rule: r.id.clone(), source_id: r.question_id.clone() });
        }
        if !ids.contains(r.target_question_id.as_str()) {
          return Err(ValidationError::UnknownTarget { rule: r.id.clone(), target: r.target_question_id.clone() });
        }
        if matches!(r.condition, RuleCondition::GreaterThan | RuleCondition::LessThan) {
          let numeric = match &r.value {
            RuleValue::Number(_) => true,
            RuleValue::Text(s) => crate::util::parse_number(s).is_some(),
          };
          if !numeric {
            return Err(ValidationError::NonNumericOrdering { rule: r.id.clone() });
          }
        }
      }
    }
    Ok(())
  }

  /// Drop rules whose source or target question no longer exists (questions
  /// get deleted in the builder; their rules must not linger). Returns how
  /// many rules were removed.
  pub fn prune_orphan_rules(&mut self) -> usize {
    let ids: HashSet<String> = self.questions.iter().map(|q| q.id.clone()).collect();
    let mut pruned = 0;
    for q in &mut self.questions {
      let before = q.logic.len();
      q.logic.retain(|r| ids.contains(&r.question_id) && ids.contains(&r.target_question_id));
      pruned += before - q.logic.len();
    }
    pruned
  }
}

/// A respondent's answer to one question. Untagged: the JSON shape picks the
/// variant (number, string, string array, file array, contact object, null).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AnswerValue {
  Number(f64),
  Text(String),
  Selections(Vec<String>),
  Files(Vec<FileAnswer>),
  Contact(ContactAnswer),
  /// Explicit JSON null; treated the same as an absent answer.
  Empty,
}

/// Uploaded file metadata (payload travels as a data URL).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileAnswer {
  pub name: String,
  #[serde(default)] pub size: u64,
  #[serde(rename = "type", default)] pub mime: String,
  #[serde(default)] pub data_url: Option<String>,
}

/// contactInfo answer; sub-fields mirror `ContactFields`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContactAnswer {
  #[serde(default)] pub first_name: Option<String>,
  #[serde(default)] pub last_name: Option<String>,
  #[serde(default)] pub email: Option<String>,
  #[serde(default)] pub phone: Option<String>,
  #[serde(default)] pub company: Option<String>,
}

impl ContactAnswer {
  /// True if at least one sub-field carries non-blank text.
  pub fn has_content(&self) -> bool {
    [&self.first_name, &self.last_name, &self.email, &self.phone, &self.company]
      .iter()
      .any(|f| f.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false))
  }
}

/// Answer snapshot stored inside a response: prompt text and question type are
/// copied at submission time so later form edits don't rewrite history.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
  pub question: String,
  pub answer: AnswerValue,
  #[serde(rename = "type")]
  pub kind: QuestionType,
}

/// One submitted response (complete or partial).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseRecord {
  pub id: String,
  pub form_id: String,
  pub answers: HashMap<String, AnswerRecord>,
  pub submitted_at: DateTime<Utc>,
  #[serde(default)] pub is_partial: bool,
  #[serde(default)] pub last_question_answered: Option<u32>,
}

/// Parked fill-out state, resumable by token until it expires.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedProgress {
  pub id: String,
  pub form_id: String,
  #[serde(default)] pub answers: AnswerMap,
  #[serde(default)] pub last_question_answered: Option<u32>,
  pub resume_token: String,
  #[serde(default)] pub email: Option<String>,
  pub created_at: DateTime<Utc>,
  pub expires_at: DateTime<Utc>,
}

/// An authenticated account (form owner).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
  pub id: String,
  pub name: String,
  pub email: String,
  #[serde(default)] pub is_pro: bool,
}

fn default_true() -> bool { true }
fn default_button_text() -> String { "Submit".into() }
