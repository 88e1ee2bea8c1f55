//! Conditional visibility evaluation for form questions.
//!
//! Flow:
//! 1) Every question starts visible.
//! 2) Rules are walked in form order; within one question, in stored order.
//! 3) A rule whose condition holds overwrites its target's visibility
//!    (show => true, hide => false). Later rules win over earlier ones.
//! 4) A rule whose condition does not hold contributes nothing.
//!
//! Evaluation is pure: it never mutates questions or answers, and the same
//! inputs always produce the same map. Malformed rules (unanswered source,
//! non-numeric operand, answer shape with no scalar form) simply don't fire.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::domain::{AnswerMap, AnswerValue, Question, RuleAction, RuleCondition, RuleValue};
use crate::util::parse_number;

/// questionId -> should the question be shown.
pub type VisibilityMap = HashMap<String, bool>;

/// Recompute visibility for all questions from the current answers.
pub fn evaluate_visibility(questions: &[Question], answers: &AnswerMap) -> VisibilityMap {
  let mut visibility: VisibilityMap = questions.iter().map(|q| (q.id.clone(), true)).collect();

  for question in questions {
    for rule in &question.logic {
      // Self-targeting rules are rejected at authoring time; ignore any that
      // slipped into stored data rather than letting a question toggle itself.
      if rule.target_question_id == rule.question_id {
        continue;
      }
      if !condition_holds(answers.get(&rule.question_id), rule.condition, &rule.value) {
        continue;
      }
      // A dangling target (question since deleted) has no entry; skip it.
      if let Some(shown) = visibility.get_mut(&rule.target_question_id) {
        *shown = matches!(rule.action, RuleAction::Show);
      }
    }
  }

  visibility
}

/// Does `condition(answer, value)` hold? Never panics: anything malformed or
/// not comparable evaluates to false. An unanswered source (absent or null)
/// makes every condition false, including the negated ones, so rules never
/// fire off questions the respondent hasn't reached.
pub fn condition_holds(answer: Option<&AnswerValue>, condition: RuleCondition, value: &RuleValue) -> bool {
  let answer = match answer {
    None | Some(AnswerValue::Empty) => return false,
    Some(a) => a,
  };

  match condition {
    RuleCondition::Equals => scalar_equals(answer, value).unwrap_or(false),
    RuleCondition::NotEquals => scalar_equals(answer, value).map(|eq| !eq).unwrap_or(false),
    RuleCondition::Contains => contains(answer, value).unwrap_or(false),
    RuleCondition::NotContains => contains(answer, value).map(|c| !c).unwrap_or(false),
    RuleCondition::GreaterThan => numeric_cmp(answer, value) == Some(Ordering::Greater),
    RuleCondition::LessThan => numeric_cmp(answer, value) == Some(Ordering::Less),
  }
}

/// Questions the respondent should currently see, in form order.
pub fn visible_order(questions: &[Question], visibility: &VisibilityMap) -> Vec<String> {
  questions
    .iter()
    .filter(|q| visibility.get(&q.id).copied().unwrap_or(true))
    .map(|q| q.id.clone())
    .collect()
}

/// Required questions that are currently visible but not answered.
/// Hidden questions are never reported: a rule that hides a question also
/// waives its required flag for this submission.
pub fn missing_required(questions: &[Question], visibility: &VisibilityMap, answers: &AnswerMap) -> Vec<String> {
  questions
    .iter()
    .filter(|q| q.required && q.kind.collects_answer())
    .filter(|q| visibility.get(&q.id).copied().unwrap_or(true))
    .filter(|q| !is_answered(answers.get(&q.id)))
    .map(|q| q.id.clone())
    .collect()
}

/// "Answered" for the required check is stricter than for rule matching:
/// blank text, empty selections and content-free contacts don't count.
pub fn is_answered(answer: Option<&AnswerValue>) -> bool {
  match answer {
    None | Some(AnswerValue::Empty) => false,
    Some(AnswerValue::Number(_)) => true,
    Some(AnswerValue::Text(s)) => !s.trim().is_empty(),
    Some(AnswerValue::Selections(items)) => !items.is_empty(),
    Some(AnswerValue::Files(files)) => !files.is_empty(),
    Some(AnswerValue::Contact(c)) => c.has_content(),
  }
}

/// Equality between a scalar answer and the rule value. Compares numerically
/// when both sides parse as numbers, as strings otherwise. None when the
/// answer has no scalar form (files, contacts, selection lists).
fn scalar_equals(answer: &AnswerValue, value: &RuleValue) -> Option<bool> {
  let text = scalar_text(answer)?;
  Some(text_equals_value(&text, value))
}

fn text_equals_value(answer: &str, value: &RuleValue) -> bool {
  match (parse_number(answer), value_number(value)) {
    (Some(a), Some(v)) => a == v,
    _ => answer == value_text(value).as_str(),
  }
}

/// Substring test for text answers, membership test for selection lists.
/// Membership uses the same scalar coercion as equals, so a checkbox answer
/// ["2"] contains the rule value 2.
fn contains(answer: &AnswerValue, value: &RuleValue) -> Option<bool> {
  match answer {
    AnswerValue::Text(s) => Some(s.contains(value_text(value).as_str())),
    AnswerValue::Selections(items) => Some(items.iter().any(|item| text_equals_value(item, value))),
    _ => None,
  }
}

/// Strictly numeric ordering; None unless both sides are finite numbers.
fn numeric_cmp(answer: &AnswerValue, value: &RuleValue) -> Option<Ordering> {
  let a = answer_number(answer)?;
  let v = value_number(value)?;
  a.partial_cmp(&v)
}

fn scalar_text(answer: &AnswerValue) -> Option<String> {
  match answer {
    AnswerValue::Text(s) => Some(s.clone()),
    AnswerValue::Number(n) => Some(n.to_string()),
    _ => None,
  }
}

fn answer_number(answer: &AnswerValue) -> Option<f64> {
  match answer {
    AnswerValue::Number(n) => Some(*n),
    AnswerValue::Text(s) => parse_number(s),
    _ => None,
  }
}

fn value_number(value: &RuleValue) -> Option<f64> {
  match value {
    RuleValue::Number(n) => Some(*n),
    RuleValue::Text(s) => parse_number(s),
  }
}

fn value_text(value: &RuleValue) -> String {
  match value {
    RuleValue::Text(s) => s.clone(),
    RuleValue::Number(n) => n.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{LogicRule, QuestionType};

  fn q(id: &str, kind: QuestionType, logic: Vec<LogicRule>) -> Question {
    Question {
      id: id.into(),
      kind,
      question: format!("Question {id}"),
      options: None,
      statement: None,
      file_upload_config: None,
      contact_fields: None,
      required: false,
      logic,
      visible: true,
    }
  }

  fn rule(source: &str, condition: RuleCondition, value: RuleValue, action: RuleAction, target: &str) -> LogicRule {
    LogicRule {
      id: crate::util::new_id(),
      question_id: source.into(),
      condition,
      value,
      action,
      target_question_id: target.into(),
    }
  }

  fn answers(pairs: &[(&str, AnswerValue)]) -> AnswerMap {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
  }

  fn text(s: &str) -> AnswerValue {
    AnswerValue::Text(s.into())
  }

  #[test]
  fn questions_without_rules_stay_visible() {
    let qs = vec![q("q1", QuestionType::Text, vec![]), q("q2", QuestionType::Number, vec![])];
    let vis = evaluate_visibility(&qs, &AnswerMap::new());
    assert_eq!(vis.len(), 2);
    assert!(vis["q1"] && vis["q2"]);
  }

  #[test]
  fn hide_rule_fires_only_when_condition_holds() {
    let r = rule("q1", RuleCondition::Equals, RuleValue::Text("No".into()), RuleAction::Hide, "q2");
    let qs = vec![q("q1", QuestionType::MultipleChoice, vec![r]), q("q2", QuestionType::Text, vec![])];

    let vis = evaluate_visibility(&qs, &answers(&[("q1", text("No"))]));
    assert!(!vis["q2"]);

    let vis = evaluate_visibility(&qs, &answers(&[("q1", text("Yes"))]));
    assert!(vis["q2"], "non-matching condition must contribute nothing");

    let vis = evaluate_visibility(&qs, &AnswerMap::new());
    assert!(vis["q2"], "unanswered source must leave the default visibility");
  }

  #[test]
  fn show_rule_overwrites_an_earlier_hide() {
    // Rules live on two different questions; form order decides who wins.
    let hide = rule("q1", RuleCondition::Equals, RuleValue::Text("x".into()), RuleAction::Hide, "q3");
    let show = rule("q2", RuleCondition::Equals, RuleValue::Text("y".into()), RuleAction::Show, "q3");
    let ans = answers(&[("q1", text("x")), ("q2", text("y"))]);

    let qs = vec![
      q("q1", QuestionType::Text, vec![hide.clone()]),
      q("q2", QuestionType::Text, vec![show.clone()]),
      q("q3", QuestionType::Text, vec![]),
    ];
    assert!(evaluate_visibility(&qs, &ans)["q3"], "show comes second and wins");

    let qs = vec![
      q("q2", QuestionType::Text, vec![show]),
      q("q1", QuestionType::Text, vec![hide]),
      q("q3", QuestionType::Text, vec![]),
    ];
    assert!(!evaluate_visibility(&qs, &ans)["q3"], "hide comes second and wins");
  }

  #[test]
  fn later_rule_wins_within_one_question() {
    let hide = rule("q1", RuleCondition::Equals, RuleValue::Text("x".into()), RuleAction::Hide, "q2");
    let show = rule("q1", RuleCondition::Equals, RuleValue::Text("x".into()), RuleAction::Show, "q2");
    let ans = answers(&[("q1", text("x"))]);

    let qs = vec![q("q1", QuestionType::Text, vec![hide.clone(), show.clone()]), q("q2", QuestionType::Text, vec![])];
    assert!(evaluate_visibility(&qs, &ans)["q2"]);

    let qs = vec![q("q1", QuestionType::Text, vec![show, hide]), q("q2", QuestionType::Text, vec![])];
    assert!(!evaluate_visibility(&qs, &ans)["q2"]);
  }

  #[test]
  fn equals_compares_numerically_when_both_sides_parse() {
    assert!(condition_holds(Some(&text("10")), RuleCondition::Equals, &RuleValue::Number(10.0)));
    assert!(condition_holds(Some(&text("007")), RuleCondition::Equals, &RuleValue::Text("7".into())));
    assert!(condition_holds(Some(&AnswerValue::Number(3.0)), RuleCondition::Equals, &RuleValue::Text("3".into())));
    // Only one side numeric: falls back to string comparison.
    assert!(!condition_holds(Some(&text("10")), RuleCondition::Equals, &RuleValue::Text("ten".into())));
    assert!(condition_holds(Some(&text("abc")), RuleCondition::Equals, &RuleValue::Text("abc".into())));
  }

  #[test]
  fn not_equals_needs_an_answer() {
    let v = RuleValue::Text("No".into());
    assert!(condition_holds(Some(&text("Yes")), RuleCondition::NotEquals, &v));
    assert!(!condition_holds(Some(&text("No")), RuleCondition::NotEquals, &v));
    // Unanswered and null sources make every condition false, even negated ones.
    assert!(!condition_holds(None, RuleCondition::NotEquals, &v));
    assert!(!condition_holds(Some(&AnswerValue::Empty), RuleCondition::NotEquals, &v));
  }

  #[test]
  fn contains_is_substring_on_text_and_membership_on_selections() {
    let selections = AnswerValue::Selections(vec!["a".into(), "b".into()]);
    assert!(condition_holds(Some(&selections), RuleCondition::Contains, &RuleValue::Text("b".into())));
    assert!(!condition_holds(Some(&selections), RuleCondition::Contains, &RuleValue::Text("c".into())));
    assert!(!condition_holds(Some(&selections), RuleCondition::NotContains, &RuleValue::Text("b".into())));
    assert!(condition_holds(Some(&selections), RuleCondition::NotContains, &RuleValue::Text("c".into())));

    assert!(condition_holds(Some(&text("hello world")), RuleCondition::Contains, &RuleValue::Text("lo wo".into())));
    assert!(!condition_holds(Some(&text("hello")), RuleCondition::Contains, &RuleValue::Text("z".into())));

    // Membership coerces like equals: ["2"] contains the number 2.
    let nums = AnswerValue::Selections(vec!["2".into()]);
    assert!(condition_holds(Some(&nums), RuleCondition::Contains, &RuleValue::Number(2.0)));
  }

  #[test]
  fn ordering_conditions_are_numeric_only_and_never_panic() {
    assert!(condition_holds(Some(&text("6")), RuleCondition::GreaterThan, &RuleValue::Number(5.0)));
    assert!(condition_holds(Some(&AnswerValue::Number(4.0)), RuleCondition::LessThan, &RuleValue::Text("5".into())));
    // "abc" > 5 is false, not an error.
    assert!(!condition_holds(Some(&text("abc")), RuleCondition::GreaterThan, &RuleValue::Number(5.0)));
    assert!(!condition_holds(Some(&text("abc")), RuleCondition::LessThan, &RuleValue::Number(5.0)));
    assert!(!condition_holds(Some(&text("5")), RuleCondition::GreaterThan, &RuleValue::Text("high".into())));
  }

  #[test]
  fn non_scalar_answers_never_match_scalar_conditions() {
    let contact = AnswerValue::Contact(crate::domain::ContactAnswer {
      first_name: Some("Ada".into()),
      ..Default::default()
    });
    assert!(!condition_holds(Some(&contact), RuleCondition::Equals, &RuleValue::Text("Ada".into())));
    assert!(!condition_holds(Some(&contact), RuleCondition::NotEquals, &RuleValue::Text("Ada".into())));
    assert!(!condition_holds(Some(&contact), RuleCondition::Contains, &RuleValue::Text("Ada".into())));

    let files = AnswerValue::Files(vec![]);
    assert!(!condition_holds(Some(&files), RuleCondition::GreaterThan, &RuleValue::Number(0.0)));
  }

  #[test]
  fn empty_text_counts_as_answered_for_rule_matching() {
    // The rule engine is strict: "" is a value. The required check (below)
    // is the one that treats blank text as missing.
    assert!(condition_holds(Some(&text("")), RuleCondition::Equals, &RuleValue::Text("".into())));
    assert!(!is_answered(Some(&text("   "))));
  }

  #[test]
  fn self_targeting_rule_is_ignored() {
    let r = rule("q1", RuleCondition::Equals, RuleValue::Text("x".into()), RuleAction::Hide, "q1");
    let qs = vec![q("q1", QuestionType::Text, vec![r])];
    let vis = evaluate_visibility(&qs, &answers(&[("q1", text("x"))]));
    assert!(vis["q1"]);
  }

  #[test]
  fn rule_with_deleted_target_contributes_nothing() {
    let r = rule("q1", RuleCondition::Equals, RuleValue::Text("x".into()), RuleAction::Hide, "gone");
    let qs = vec![q("q1", QuestionType::Text, vec![r]), q("q2", QuestionType::Text, vec![])];
    let vis = evaluate_visibility(&qs, &answers(&[("q1", text("x"))]));
    assert_eq!(vis.len(), 2);
    assert!(vis["q1"] && vis["q2"]);
  }

  #[test]
  fn branching_survey_walkthrough() {
    // Q1 "Do you want to continue?" (Yes/No); Q2 is hidden when Q1 == "No".
    let r = rule("q1", RuleCondition::Equals, RuleValue::Text("No".into()), RuleAction::Hide, "q2");
    let mut q1 = q("q1", QuestionType::MultipleChoice, vec![r]);
    q1.options = Some(vec!["Yes".into(), "No".into()]);
    let qs = vec![q1, q("q2", QuestionType::Text, vec![])];

    let vis = evaluate_visibility(&qs, &answers(&[("q1", text("Yes"))]));
    assert!(vis["q1"] && vis["q2"]);

    let vis = evaluate_visibility(&qs, &answers(&[("q1", text("No"))]));
    assert!(vis["q1"]);
    assert!(!vis["q2"]);
    assert_eq!(visible_order(&qs, &vis), vec!["q1".to_string()]);

    let vis = evaluate_visibility(&qs, &AnswerMap::new());
    assert!(vis["q2"], "before Q1 is answered, Q2 stays visible");
    assert_eq!(visible_order(&qs, &vis), vec!["q1".to_string(), "q2".to_string()]);
  }

  #[test]
  fn evaluation_is_pure_and_idempotent() {
    let r = rule("q1", RuleCondition::Equals, RuleValue::Text("No".into()), RuleAction::Hide, "q2");
    let qs = vec![q("q1", QuestionType::Text, vec![r]), q("q2", QuestionType::Text, vec![])];
    let ans = answers(&[("q1", text("No"))]);

    let first = evaluate_visibility(&qs, &ans);
    let second = evaluate_visibility(&qs, &ans);
    assert_eq!(first, second);
    assert_eq!(ans.len(), 1, "answers must not be mutated");
    assert_eq!(qs[0].logic.len(), 1, "questions must not be mutated");
  }

  #[test]
  fn missing_required_skips_hidden_and_statement_questions() {
    let r = rule("q1", RuleCondition::Equals, RuleValue::Text("No".into()), RuleAction::Hide, "q2");
    let mut q1 = q("q1", QuestionType::MultipleChoice, vec![r]);
    q1.required = true;
    q1.options = Some(vec!["Yes".into(), "No".into()]);
    let mut q2 = q("q2", QuestionType::Text, vec![]);
    q2.required = true;
    let mut q3 = q("q3", QuestionType::Statement, vec![]);
    q3.required = true; // statements never collect answers
    let qs = vec![q1, q2, q3];

    // Q1 answered "No": Q2 is hidden, so nothing is missing.
    let ans = answers(&[("q1", text("No"))]);
    let vis = evaluate_visibility(&qs, &ans);
    assert!(missing_required(&qs, &vis, &ans).is_empty());

    // Q1 answered "Yes": Q2 visible and blank -> missing.
    let ans = answers(&[("q1", text("Yes")), ("q2", text("  "))]);
    let vis = evaluate_visibility(&qs, &ans);
    assert_eq!(missing_required(&qs, &vis, &ans), vec!["q2".to_string()]);
  }
}
