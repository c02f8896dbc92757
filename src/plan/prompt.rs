//! Prompt Template
//!
//! Builds the instruction text sent to the generative model and checks the
//! model's raw reply against the required shape. Prompt construction is
//! deterministic: the same context and instructions always produce the
//! same bytes, which keeps the pipeline testable and cacheable.

use crate::plan::context::{build_prompt_context, AssessmentContext};

/// Assumed academic weeks per year when projecting available study hours.
pub const ACADEMIC_WEEKS_PER_YEAR: i32 = 48;

/// Fixed instruction text declaring the reply contract.
pub const SYSTEM_PROMPT: &str = "\
You are an academic study-plan generator for university students.
Respond with a single JSON object and nothing else: no markdown, no prose
outside the JSON. The object must have exactly this shape:
{
  \"title\": string,
  \"summary\": string,
  \"estimatedHours\": number,
  \"difficulty\": \"Beginner\" | \"Intermediate\" | \"Advanced\",
  \"steps\": [
    {
      \"name\": string,
      \"description\": string,
      \"estimatedHours\": number,
      \"checkpoints\": [
        {
          \"description\": string,
          \"estimatedMinutes\": number,
          \"type\": string,
          \"isMandatory\": boolean
        }
      ]
    }
  ],
  \"requiredSkills\": [
    {
      \"name\": string,
      \"targetProficiency\": \"Beginner\" | \"Intermediate\" | \"Advanced\" | \"Expert\",
      \"importance\": number,
      \"isPrerequisite\": boolean
    }
  ],
  \"resources\": [
    {
      \"title\": string,
      \"url\": string,
      \"type\": string,
      \"isFree\": boolean,
      \"priority\": number,
      \"stepIndex\": number | null
    }
  ]
}
Every step must contain at least one checkpoint. Order steps from
foundations to advanced work.";

pub fn system_prompt() -> &'static str {
    SYSTEM_PROMPT
}

/// Assemble the user prompt: student context, hour constraints, a
/// graduation-horizon-dependent goals section, and (only when given) the
/// caller's extra instructions verbatim.
pub fn build_prompt(context: &AssessmentContext, additional_instructions: Option<&str>) -> String {
    let mut sections = Vec::new();

    let mut profile = String::from("STUDENT CONTEXT:\n");
    profile.push_str(&build_prompt_context(context));
    if context.career_goal.is_empty() {
        profile.push_str("\nCareer Goal: Not specified");
    }
    if context.current_skills.is_empty() {
        profile.push_str("\nCurrent Skills: None specified");
    }
    sections.push(profile);

    let mut constraints = String::from("CONSTRAINTS:");
    if context.years_until_graduation > 0 && context.weekly_hours_available > 0 {
        let total_hours = context.years_until_graduation
            * ACADEMIC_WEEKS_PER_YEAR
            * context.weekly_hours_available;
        constraints.push_str(&format!(
            "\nTotal available study hours before graduation: {} ({} years x {} academic weeks x {} hours/week)",
            total_hours,
            context.years_until_graduation,
            ACADEMIC_WEEKS_PER_YEAR,
            context.weekly_hours_available
        ));
        constraints.push_str("\nThe plan's total estimated hours must fit inside this budget.");
    } else {
        constraints.push_str("\nAssume a moderate weekly study budget alongside coursework.");
    }
    sections.push(constraints);

    let goals = match context.years_until_graduation {
        0 | 1 => {
            "LEARNING GOALS:\nGraduation is imminent. Prioritize job market entry: \
             interview readiness, a presentable portfolio, and the skills employers \
             screen for first."
        }
        2 => {
            "LEARNING GOALS:\nTwo years remain. Prioritize internship readiness: \
             build the foundations and projects that make strong internship \
             applications, leaving room to deepen skills afterwards."
        }
        _ => {
            "LEARNING GOALS:\nThere is ample time before graduation. Build deep, \
             durable foundations first, then layer specialized skills toward the \
             career goal."
        }
    };
    sections.push(goals.to_string());

    if let Some(instructions) = additional_instructions {
        if !instructions.trim().is_empty() {
            sections.push(format!("ADDITIONAL INSTRUCTIONS:\n{}", instructions));
        }
    }

    sections.join("\n\n")
}

// ============================================================
// RESPONSE VALIDATION
// ============================================================

/// Strip one leading/trailing markdown code fence, if present. The
/// validator and the response decoders both call this, so callers can pass
/// the raw model text through untouched.
pub fn strip_markdown_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag on the fence line ("```json").
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Check the model's raw reply against the required shape. Reports the
/// first violated rule, in fixed priority order: JSON parse, then title,
/// then steps, then per-step checkpoints. Never panics and never errors;
/// callers decide whether a violation blocks persistence.
pub fn validate_response(raw: &str) -> Result<(), String> {
    let value: serde_json::Value = match serde_json::from_str(strip_markdown_fence(raw)) {
        Ok(v) => v,
        Err(e) => return Err(format!("Invalid JSON: {}", e)),
    };

    let title_ok = value
        .get("title")
        .and_then(|t| t.as_str())
        .map(|t| !t.trim().is_empty())
        .unwrap_or(false);
    if !title_ok {
        return Err("Response is missing a non-empty title".to_string());
    }

    let steps = match value.get("steps").and_then(|s| s.as_array()) {
        Some(steps) if !steps.is_empty() => steps,
        _ => return Err("Response must contain a non-empty steps list".to_string()),
    };

    for (index, step) in steps.iter().enumerate() {
        let has_checkpoints = step
            .get("checkpoints")
            .and_then(|c| c.as_array())
            .map(|c| !c.is_empty())
            .unwrap_or(false);
        if !has_checkpoints {
            return Err(format!(
                "Step {} must contain a non-empty checkpoints list",
                index + 1
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::types::StudyLevel;

    fn context() -> AssessmentContext {
        let mut context = AssessmentContext::new("CS", StudyLevel::Junior);
        context.years_until_graduation = 2;
        context.weekly_hours_available = 10;
        context.current_skills = vec!["Python".to_string()];
        context.career_goal = "Backend Engineer".to_string();
        context
    }

    #[test]
    fn prompt_is_deterministic() {
        let c = context();
        assert_eq!(build_prompt(&c, None), build_prompt(&c, None));
    }

    #[test]
    fn prompt_contains_computed_available_hours() {
        // 2 years x 48 weeks x 10 hours = 960.
        assert!(build_prompt(&context(), None).contains("960"));
    }

    #[test]
    fn additional_instructions_add_exactly_one_section() {
        let c = context();
        let base = build_prompt(&c, None);
        let extended = build_prompt(&c, Some("Focus on databases"));
        assert_eq!(
            extended.strip_prefix(&base),
            Some("\n\nADDITIONAL INSTRUCTIONS:\nFocus on databases")
        );
        // Blank instructions change nothing.
        assert_eq!(build_prompt(&c, Some("   ")), base);
    }

    #[test]
    fn graduation_horizon_changes_goal_phrasing() {
        let mut c = context();
        c.years_until_graduation = 1;
        assert!(build_prompt(&c, None).contains("job market entry"));
        c.years_until_graduation = 2;
        assert!(build_prompt(&c, None).contains("internship"));
        c.years_until_graduation = 4;
        let generic = build_prompt(&c, None);
        assert!(!generic.contains("job market entry"));
        assert!(!generic.contains("internship readiness"));
    }

    #[test]
    fn missing_fields_render_placeholders() {
        let c = AssessmentContext::new("CS", StudyLevel::Freshman);
        let prompt = build_prompt(&c, None);
        assert!(prompt.contains("Career Goal: Not specified"));
        assert!(prompt.contains("Current Skills: None specified"));
    }

    #[test]
    fn fence_stripping_handles_plain_and_tagged_fences() {
        assert_eq!(strip_markdown_fence("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_markdown_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_markdown_fence("```\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn validation_reports_first_violation_in_priority_order() {
        assert!(validate_response("not json").unwrap_err().contains("Invalid JSON"));

        // Missing title wins over empty steps.
        let err = validate_response(r#"{"steps":[]}"#).unwrap_err();
        assert!(err.contains("title"), "got: {}", err);

        let err = validate_response(r#"{"title":"Plan","steps":[]}"#).unwrap_err();
        assert!(err.contains("steps"), "got: {}", err);

        let err = validate_response(
            r#"{"title":"Plan","steps":[{"name":"S1","checkpoints":[]}]}"#,
        )
        .unwrap_err();
        assert!(err.contains("checkpoints"), "got: {}", err);
    }

    #[test]
    fn valid_fenced_response_passes() {
        let raw = "```json\n{\"title\":\"Plan\",\"steps\":[{\"name\":\"S1\",\
                   \"checkpoints\":[{\"description\":\"read\"}]}]}\n```";
        assert!(validate_response(raw).is_ok());
    }
}
