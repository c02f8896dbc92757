//! Assessment Context Builder
//!
//! Turns a completed assessment attempt (ordered question/response pairs)
//! into the bounded `AssessmentContext` value object that drives prompt
//! construction, and renders it back out as the human-readable block the
//! prompt template embeds.
//!
//! Answers arrive as free text or as small JSON fragments. They are decoded
//! through `AnswerValue`, which enumerates the accepted shapes and treats
//! anything else as absent instead of coercing it to a string.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::plan::types::{AssessmentAttempt, AssessmentResponse, StudyLevel};

// Question categories the builder knows how to map. Anything else is ignored.
const CATEGORY_TIMELINE: &str = "Timeline";
const CATEGORY_SKILLS: &str = "Skills";
const CATEGORY_INTERESTS: &str = "Interests";
const CATEGORY_CAREER_GOAL: &str = "Career Goal";
const CATEGORY_AVAILABILITY: &str = "Availability";
const CATEGORY_LEARNING_STYLE: &str = "Learning Style";

/// Bounded summary of one assessment attempt. Serialized into a text column
/// alongside the generated plan; the transport form is canonical JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentContext {
    pub major: String,
    pub study_level: StudyLevel,
    pub years_until_graduation: i32,
    pub current_skills: Vec<String>,
    pub interested_areas: Vec<String>,
    pub career_goal: String,
    pub weekly_hours_available: i32,
    pub learning_style: String,
    /// Open extension point (preferred completion weeks, linked career-plan
    /// title, ...). BTreeMap keeps serialization order stable.
    pub additional_context: BTreeMap<String, String>,
}

impl AssessmentContext {
    pub fn new(major: &str, study_level: StudyLevel) -> Self {
        Self {
            major: major.to_string(),
            study_level,
            years_until_graduation: 0,
            current_skills: Vec::new(),
            interested_areas: Vec::new(),
            career_goal: String::new(),
            weekly_hours_available: 0,
            learning_style: String::new(),
            additional_context: BTreeMap::new(),
        }
    }
}

// ============================================================
// ANSWER DECODING
// ============================================================

/// The answer shapes the questionnaire can produce. Unknown JSON shapes
/// decode to `None` (fail closed) rather than being stringified.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerValue {
    Text(String),
    List(Vec<String>),
    OptionWithTime { option: String, time: Option<String> },
}

impl AnswerValue {
    pub fn decode(raw: &str) -> Option<AnswerValue> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        // Only treat the answer as structured if it parses as JSON; plain
        // free text (the common case) falls through to Text.
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
            return match value {
                serde_json::Value::String(s) => {
                    let s = s.trim().to_string();
                    if s.is_empty() { None } else { Some(AnswerValue::Text(s)) }
                }
                serde_json::Value::Array(items) => {
                    let list: Vec<String> = items
                        .into_iter()
                        .filter_map(|item| match item {
                            serde_json::Value::String(s) => {
                                let s = s.trim().to_string();
                                if s.is_empty() { None } else { Some(s) }
                            }
                            _ => None,
                        })
                        .collect();
                    if list.is_empty() { None } else { Some(AnswerValue::List(list)) }
                }
                serde_json::Value::Object(map) => {
                    let option = map.get("option").and_then(|v| v.as_str())?;
                    let time = map
                        .get("time")
                        .and_then(|v| v.as_str())
                        .map(|s| s.to_string());
                    Some(AnswerValue::OptionWithTime {
                        option: option.trim().to_string(),
                        time,
                    })
                }
                // Bare numbers, booleans, null: not an answer shape we accept.
                _ => None,
            };
        }

        Some(AnswerValue::Text(trimmed.to_string()))
    }

    /// Scalar text carried by this answer, if any.
    fn as_text(&self) -> Option<&str> {
        match self {
            AnswerValue::Text(s) => Some(s),
            AnswerValue::OptionWithTime { option, .. } => Some(option),
            AnswerValue::List(_) => None,
        }
    }
}

// ============================================================
// PARSING HELPERS
// ============================================================

/// Normalize a list-valued answer. Accepts a JSON array or text delimited
/// by comma, semicolon, or newline; every variant yields the same ordered
/// list of trimmed, non-empty items.
pub fn parse_list(raw: &str) -> Vec<String> {
    match AnswerValue::decode(raw) {
        Some(AnswerValue::List(items)) => items,
        Some(AnswerValue::Text(text)) => text
            .split(|c| c == ',' || c == ';' || c == '\n')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Some(AnswerValue::OptionWithTime { option, .. }) => vec![option],
        None => Vec::new(),
    }
}

/// First integer embedded in the text ("2 years" → 2). Zero if none.
pub fn parse_leading_int(raw: &str) -> i32 {
    let mut digits = String::new();
    for c in raw.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
        } else if !digits.is_empty() {
            break;
        }
    }
    digits.parse().unwrap_or(0)
}

// ============================================================
// BUILDING
// ============================================================

/// Build the context from an attempt and its responses. Pure function of
/// its input: skipped responses contribute nothing, list order within a
/// field follows response order, unknown categories are ignored.
pub fn build_context(
    attempt: &AssessmentAttempt,
    responses: &[AssessmentResponse],
) -> AssessmentContext {
    let mut context = AssessmentContext::new(&attempt.major, attempt.study_level);

    for response in responses {
        if response.is_skipped {
            continue;
        }
        let Some(value) = AnswerValue::decode(&response.answer) else {
            continue;
        };

        match response.category.as_str() {
            CATEGORY_TIMELINE => {
                if let Some(text) = value.as_text() {
                    context.years_until_graduation = parse_leading_int(text);
                }
            }
            CATEGORY_SKILLS => {
                context.current_skills.extend(parse_list(&response.answer));
            }
            CATEGORY_INTERESTS => {
                context.interested_areas.extend(parse_list(&response.answer));
            }
            CATEGORY_CAREER_GOAL => {
                if let Some(text) = value.as_text() {
                    context.career_goal = text.to_string();
                }
            }
            CATEGORY_AVAILABILITY => {
                if let Some(text) = value.as_text() {
                    context.weekly_hours_available = parse_leading_int(text);
                }
            }
            CATEGORY_LEARNING_STYLE => {
                if let Some(text) = value.as_text() {
                    context.learning_style = text.to_string();
                }
            }
            _ => {}
        }
    }

    context
}

// ============================================================
// SERIALIZATION
// ============================================================

pub fn serialize_context(context: &AssessmentContext) -> String {
    // AssessmentContext has no non-serializable fields; this cannot fail.
    serde_json::to_string(context).unwrap_or_default()
}

pub fn deserialize_context(text: &str) -> CoreResult<AssessmentContext> {
    serde_json::from_str(text).map_err(|e| CoreError::ContextCorrupted(e.to_string()))
}

// ============================================================
// PROMPT FRAGMENT
// ============================================================

/// Labeled, human-readable block for prompt embedding. Empty, zero, or
/// absent fields are omitted entirely. Never fails.
pub fn build_prompt_context(context: &AssessmentContext) -> String {
    let mut lines = Vec::new();

    if !context.major.is_empty() {
        lines.push(format!("Major: {}", context.major));
    }
    lines.push(format!("Study Level: {}", context.study_level.as_str()));
    if context.years_until_graduation > 0 {
        lines.push(format!(
            "Years Until Graduation: {}",
            context.years_until_graduation
        ));
    }
    if !context.current_skills.is_empty() {
        lines.push(format!("Current Skills: {}", context.current_skills.join(", ")));
    }
    if !context.interested_areas.is_empty() {
        lines.push(format!(
            "Interested Areas: {}",
            context.interested_areas.join(", ")
        ));
    }
    if !context.career_goal.is_empty() {
        lines.push(format!("Career Goal: {}", context.career_goal));
    }
    if context.weekly_hours_available > 0 {
        lines.push(format!(
            "Weekly Hours Available: {}",
            context.weekly_hours_available
        ));
    }
    if !context.learning_style.is_empty() {
        lines.push(format!("Learning Style: {}", context.learning_style));
    }
    for (key, value) in &context.additional_context {
        if !value.is_empty() {
            lines.push(format!("{}: {}", key, value));
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt() -> AssessmentAttempt {
        AssessmentAttempt {
            id: "attempt-1".to_string(),
            owner_id: "user-1".to_string(),
            major: "Computer Science".to_string(),
            study_level: StudyLevel::Junior,
            status: "Completed".to_string(),
            completed_at: None,
        }
    }

    fn response(category: &str, answer: &str, skipped: bool, order: i32) -> AssessmentResponse {
        AssessmentResponse {
            question: format!("Q{}", order),
            category: category.to_string(),
            answer: answer.to_string(),
            is_skipped: skipped,
            order_index: order,
        }
    }

    #[test]
    fn all_list_delimiters_normalize_identically() {
        let expected = vec!["Python", "Java", "C#"];
        for raw in [
            "Python,Java,C#",
            "Python\nJava\nC#",
            "[\"Python\",\"Java\",\"C#\"]",
            "Python;Java;C#",
        ] {
            assert_eq!(parse_list(raw), expected, "input {:?}", raw);
        }
    }

    #[test]
    fn list_items_are_trimmed_and_non_empty() {
        assert_eq!(parse_list(" a , , b ,"), vec!["a", "b"]);
        assert!(parse_list("").is_empty());
    }

    #[test]
    fn answer_decoder_fails_closed_on_unknown_shapes() {
        assert_eq!(AnswerValue::decode("42"), None);
        assert_eq!(AnswerValue::decode("true"), None);
        assert_eq!(AnswerValue::decode("null"), None);
        assert_eq!(AnswerValue::decode(r#"{"weird":"shape"}"#), None);
        assert_eq!(
            AnswerValue::decode(r#"{"option":"2 years","time":"evening"}"#),
            Some(AnswerValue::OptionWithTime {
                option: "2 years".to_string(),
                time: Some("evening".to_string()),
            })
        );
    }

    #[test]
    fn skipped_responses_contribute_nothing() {
        let responses = vec![
            response(CATEGORY_SKILLS, "Python,Java", false, 0),
            response(CATEGORY_CAREER_GOAL, "Backend Engineer", true, 1),
            response(CATEGORY_TIMELINE, "2 years", true, 2),
        ];
        let context = build_context(&attempt(), &responses);
        assert_eq!(context.current_skills, vec!["Python", "Java"]);
        assert!(context.career_goal.is_empty());
        assert_eq!(context.years_until_graduation, 0);
    }

    #[test]
    fn build_context_is_deterministic() {
        let responses = vec![
            response(CATEGORY_TIMELINE, "2 years", false, 0),
            response(CATEGORY_SKILLS, "Rust;SQL", false, 1),
            response(CATEGORY_AVAILABILITY, "10 hours per week", false, 2),
            response("Favorite Color", "blue", false, 3),
        ];
        let a = build_context(&attempt(), &responses);
        let b = build_context(&attempt(), &responses);
        assert_eq!(a, b);
        assert_eq!(a.years_until_graduation, 2);
        assert_eq!(a.weekly_hours_available, 10);
        // Unknown categories are ignored, not stashed.
        assert!(a.additional_context.is_empty());
    }

    #[test]
    fn structured_timeline_answer_uses_the_option_field() {
        let responses = vec![response(
            CATEGORY_TIMELINE,
            r#"{"option":"3 years","time":"unsure"}"#,
            false,
            0,
        )];
        let context = build_context(&attempt(), &responses);
        assert_eq!(context.years_until_graduation, 3);
    }

    #[test]
    fn context_round_trips_losslessly() {
        let mut context = AssessmentContext::new("CS", StudyLevel::Senior);
        context.current_skills = vec!["Rust".to_string()];
        context.additional_context.insert(
            "Preferred Completion Weeks".to_string(),
            "16".to_string(),
        );
        let restored = deserialize_context(&serialize_context(&context)).unwrap();
        assert_eq!(restored, context);

        // Empty lists and maps survive too.
        let empty = AssessmentContext::new("", StudyLevel::Freshman);
        let restored = deserialize_context(&serialize_context(&empty)).unwrap();
        assert_eq!(restored, empty);
    }

    #[test]
    fn malformed_context_text_is_reported_corrupted() {
        let err = deserialize_context("{not json").unwrap_err();
        assert!(matches!(err, CoreError::ContextCorrupted(_)));
    }

    #[test]
    fn prompt_fragment_omits_empty_fields() {
        let mut context = AssessmentContext::new("CS", StudyLevel::Junior);
        context.career_goal = String::new();
        let block = build_prompt_context(&context);
        assert!(block.contains("Major: CS"));
        assert!(block.contains("Study Level: Junior"));
        assert!(!block.contains("Career Goal"));
        assert!(!block.contains("Weekly Hours"));

        context.career_goal = "ML Engineer".to_string();
        context.weekly_hours_available = 8;
        let block = build_prompt_context(&context);
        assert!(block.contains("Career Goal: ML Engineer"));
        assert!(block.contains("Weekly Hours Available: 8"));
    }
}
