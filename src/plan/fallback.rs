//! Deterministic Career-Plan Fallback
//!
//! Permanent degraded-mode path used when the AI endpoint is unreachable
//! or replies with an unusable shape. Synthesizes a career plan from the
//! assessment context alone: same structural shape as a good AI reply
//! (exactly 4 steps, 12 to 16 skills in total), no network, no randomness.

use crate::plan::context::AssessmentContext;
use crate::plan::types::{AiCareerPlanResponse, AiCareerStep};

/// Experience band inferred from the breadth of the student's current
/// skill portfolio. Heavier experience maps to a shorter timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExperienceBand {
    /// "0-2 years" equivalent: little to no prior skill base.
    Entry,
    /// "3-5 years" equivalent: solid base, needs direction.
    Developing,
    /// "5+ years" equivalent: broad base, needs specialization.
    Established,
}

impl ExperienceBand {
    pub fn for_context(context: &AssessmentContext) -> Self {
        match context.current_skills.len() {
            0..=5 => ExperienceBand::Entry,
            6..=10 => ExperienceBand::Developing,
            _ => ExperienceBand::Established,
        }
    }

    pub fn timeline_months(&self) -> i32 {
        match self {
            ExperienceBand::Entry => 12,
            ExperienceBand::Developing => 9,
            ExperienceBand::Established => 6,
        }
    }

    fn framing(&self) -> &'static str {
        match self {
            ExperienceBand::Entry => "12-Month",
            ExperienceBand::Developing => "9-Month",
            ExperienceBand::Established => "6-Month",
        }
    }
}

// Base skill sets per phase: 14 skills total, leaving room for up to two
// interest-derived additions while staying inside the 12..=16 bound.
const FOUNDATION_SKILLS: [&str; 4] = [
    "Programming Fundamentals",
    "Version Control with Git",
    "Data Structures",
    "Command Line Proficiency",
];
const CORE_SKILLS: [&str; 4] = [
    "Databases and SQL",
    "Web Fundamentals",
    "API Design",
    "Testing and Debugging",
];
const APPLIED_SKILLS: [&str; 3] = [
    "Project Architecture",
    "Code Review Practice",
    "Deployment Basics",
];
const CAREER_SKILLS: [&str; 3] = [
    "Technical Communication",
    "Portfolio Building",
    "Interview Preparation",
];

/// Synthesize a career plan from the context. Same inputs always produce
/// the same plan.
pub fn generate_career_plan(context: &AssessmentContext) -> AiCareerPlanResponse {
    let band = ExperienceBand::for_context(context);
    let goal = if context.career_goal.is_empty() {
        format!("a career in {}", pick_field(context))
    } else {
        context.career_goal.clone()
    };

    let mut applied: Vec<String> = APPLIED_SKILLS.iter().map(|s| s.to_string()).collect();
    // Fold in up to two interest areas as applied skills; the cap keeps the
    // total inside the 12..=16 bound.
    for area in context.interested_areas.iter().take(2) {
        applied.push(format!("Applied {}", area));
    }

    let steps = vec![
        AiCareerStep {
            name: "Build Foundations".to_string(),
            description: format!(
                "Establish the fundamentals every path toward {} depends on.",
                goal
            ),
            skills: FOUNDATION_SKILLS.iter().map(|s| s.to_string()).collect(),
        },
        AiCareerStep {
            name: "Develop Core Skills".to_string(),
            description: "Deepen the core technical skills employers screen for.".to_string(),
            skills: CORE_SKILLS.iter().map(|s| s.to_string()).collect(),
        },
        AiCareerStep {
            name: "Apply Through Projects".to_string(),
            description: "Turn skills into demonstrable, reviewable project work.".to_string(),
            skills: applied,
        },
        AiCareerStep {
            name: "Prepare for the Job Market".to_string(),
            description: format!("Package the work and get ready to pursue {}.", goal),
            skills: CAREER_SKILLS.iter().map(|s| s.to_string()).collect(),
        },
    ];

    AiCareerPlanResponse {
        title: format!("{} Roadmap Toward {}", band.framing(), capitalize(&goal)),
        summary: format!(
            "A {}-month staged plan generated from your assessment profile.",
            band.timeline_months()
        ),
        timeline_months: band.timeline_months(),
        steps,
    }
}

fn pick_field(context: &AssessmentContext) -> String {
    if let Some(area) = context.interested_areas.first() {
        area.clone()
    } else if !context.major.is_empty() {
        context.major.clone()
    } else {
        "software development".to_string()
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::types::StudyLevel;

    fn entry_context() -> AssessmentContext {
        let mut context = AssessmentContext::new("CS", StudyLevel::Sophomore);
        context.current_skills = vec!["Python".to_string()];
        context.career_goal = "Backend Engineer".to_string();
        context
    }

    #[test]
    fn entry_band_gets_twelve_month_framing() {
        let plan = generate_career_plan(&entry_context());
        assert_eq!(plan.timeline_months, 12);
        assert!(plan.title.contains("12-Month"));
    }

    #[test]
    fn plan_always_has_four_steps_and_bounded_skill_count() {
        let mut context = entry_context();
        for interests in [vec![], vec!["Cloud".to_string(), "ML".to_string(), "Sec".to_string()]] {
            context.interested_areas = interests;
            let plan = generate_career_plan(&context);
            assert_eq!(plan.steps.len(), 4);
            let total: usize = plan.steps.iter().map(|s| s.skills.len()).sum();
            assert!((12..=16).contains(&total), "total skills {}", total);
        }
    }

    #[test]
    fn heavier_experience_shortens_the_timeline() {
        let mut context = entry_context();
        context.current_skills = (0..8).map(|i| format!("Skill{}", i)).collect();
        assert_eq!(generate_career_plan(&context).timeline_months, 9);
        context.current_skills = (0..12).map(|i| format!("Skill{}", i)).collect();
        assert_eq!(generate_career_plan(&context).timeline_months, 6);
    }

    #[test]
    fn generation_is_deterministic() {
        let context = entry_context();
        let a = serde_json::to_string(&generate_career_plan(&context)).unwrap();
        let b = serde_json::to_string(&generate_career_plan(&context)).unwrap();
        assert_eq!(a, b);
    }
}
