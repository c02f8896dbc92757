//! Plan Entity Types
//!
//! The StudyPlan aggregate and its owned sub-entities, plus the lenient
//! DTOs the generative model's JSON reply is decoded into. Entity enums
//! round-trip through their text column representation via as_str/from_str.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================
// ENUMS (stored as TEXT)
// ============================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StudyLevel {
    Freshman,
    Sophomore,
    Junior,
    Senior,
    Graduate,
}

impl StudyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            StudyLevel::Freshman => "Freshman",
            StudyLevel::Sophomore => "Sophomore",
            StudyLevel::Junior => "Junior",
            StudyLevel::Senior => "Senior",
            StudyLevel::Graduate => "Graduate",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Freshman" => Some(StudyLevel::Freshman),
            "Sophomore" => Some(StudyLevel::Sophomore),
            "Junior" => Some(StudyLevel::Junior),
            "Senior" => Some(StudyLevel::Senior),
            "Graduate" => Some(StudyLevel::Graduate),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "Beginner",
            Difficulty::Intermediate => "Intermediate",
            Difficulty::Advanced => "Advanced",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Beginner" => Some(Difficulty::Beginner),
            "Intermediate" => Some(Difficulty::Intermediate),
            "Advanced" => Some(Difficulty::Advanced),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PlanStatus {
    Draft,
    Active,
    Completed,
    Archived,
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Draft => "Draft",
            PlanStatus::Active => "Active",
            PlanStatus::Completed => "Completed",
            PlanStatus::Archived => "Archived",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Draft" => Some(PlanStatus::Draft),
            "Active" => Some(PlanStatus::Active),
            "Completed" => Some(PlanStatus::Completed),
            "Archived" => Some(PlanStatus::Archived),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StepStatus {
    Locked,
    NotStarted,
    InProgress,
    Completed,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Locked => "Locked",
            StepStatus::NotStarted => "NotStarted",
            StepStatus::InProgress => "InProgress",
            StepStatus::Completed => "Completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Locked" => Some(StepStatus::Locked),
            "NotStarted" => Some(StepStatus::NotStarted),
            "InProgress" => Some(StepStatus::InProgress),
            "Completed" => Some(StepStatus::Completed),
            _ => None,
        }
    }
}

/// Proficiency ladder shared by skill targets and the user's portfolio.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum Proficiency {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl Proficiency {
    /// Numeric level used for gap arithmetic (Beginner = 1 .. Expert = 4).
    pub fn level(&self) -> i32 {
        match self {
            Proficiency::Beginner => 1,
            Proficiency::Intermediate => 2,
            Proficiency::Advanced => 3,
            Proficiency::Expert => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Proficiency::Beginner => "Beginner",
            Proficiency::Intermediate => "Intermediate",
            Proficiency::Advanced => "Advanced",
            Proficiency::Expert => "Expert",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Beginner" => Some(Proficiency::Beginner),
            "Intermediate" => Some(Proficiency::Intermediate),
            "Advanced" => Some(Proficiency::Advanced),
            "Expert" => Some(Proficiency::Expert),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SkillGapStatus {
    Missing,
    InProgress,
    Achieved,
}

impl SkillGapStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkillGapStatus::Missing => "Missing",
            SkillGapStatus::InProgress => "InProgress",
            SkillGapStatus::Achieved => "Achieved",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Missing" => Some(SkillGapStatus::Missing),
            "InProgress" => Some(SkillGapStatus::InProgress),
            "Achieved" => Some(SkillGapStatus::Achieved),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ResourceType {
    Course,
    Article,
    Video,
    Book,
    Documentation,
    Tutorial,
    Practice,
    Project,
    Tool,
    Community,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Course => "Course",
            ResourceType::Article => "Article",
            ResourceType::Video => "Video",
            ResourceType::Book => "Book",
            ResourceType::Documentation => "Documentation",
            ResourceType::Tutorial => "Tutorial",
            ResourceType::Practice => "Practice",
            ResourceType::Project => "Project",
            ResourceType::Tool => "Tool",
            ResourceType::Community => "Community",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Course" => Some(ResourceType::Course),
            "Article" => Some(ResourceType::Article),
            "Video" => Some(ResourceType::Video),
            "Book" => Some(ResourceType::Book),
            "Documentation" => Some(ResourceType::Documentation),
            "Tutorial" => Some(ResourceType::Tutorial),
            "Practice" => Some(ResourceType::Practice),
            "Project" => Some(ResourceType::Project),
            "Tool" => Some(ResourceType::Tool),
            "Community" => Some(ResourceType::Community),
            _ => None,
        }
    }
}

// ============================================================
// STUDY PLAN AGGREGATE
// ============================================================

/// Aggregate root. Owns its steps, resources, and required skills; the
/// whole graph is written in one transaction at assembly time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyPlan {
    pub id: String,
    pub owner_id: String,
    pub source_assessment_id: Option<String>,
    pub source_career_plan_id: Option<String>,
    pub title: String,
    pub summary: String,
    pub estimated_hours: i32,
    pub difficulty: Difficulty,
    pub status: PlanStatus,
    /// 0..=100, arithmetic mean of step percentages.
    pub progress_percentage: i32,
    /// At most one active plan per owner at any time.
    pub is_active: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub steps: Vec<Step>,
    pub resources: Vec<Resource>,
    pub required_skills: Vec<RequiredSkill>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub plan_id: String,
    pub name: String,
    pub description: String,
    /// Unique per plan, defines the sequence. Step 0 starts NotStarted,
    /// every later step starts Locked.
    pub order_index: i32,
    pub estimated_hours: i32,
    pub status: StepStatus,
    pub progress_percentage: i32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub checkpoints: Vec<Checkpoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: String,
    pub step_id: String,
    pub description: String,
    pub order_index: i32,
    pub estimated_minutes: i32,
    /// Free-form category ("reading", "exercise", ...).
    pub checkpoint_type: String,
    pub is_mandatory: bool,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub plan_id: String,
    /// Optional association to one step; not owning.
    pub step_id: Option<String>,
    pub title: String,
    pub url: String,
    pub resource_type: ResourceType,
    pub estimated_hours: Option<i32>,
    pub difficulty: Option<Difficulty>,
    pub is_free: bool,
    pub cost: Option<f64>,
    pub provider: Option<String>,
    /// 1 (highest) ..= 5.
    pub priority: i32,
}

/// Plan ↔ master-skill join row with gap metadata, computed once at
/// assembly time and recomputable on demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequiredSkill {
    pub plan_id: String,
    pub skill_id: String,
    pub skill_name: String,
    pub target_proficiency: Proficiency,
    pub importance: i32,
    pub is_prerequisite: bool,
    pub status: SkillGapStatus,
    /// target level − current user level; ≤ 0 means Achieved.
    pub proficiency_gap: i32,
}

/// Master skill record, unique by case-insensitive name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skill {
    pub id: String,
    pub name: String,
    pub category: String,
}

impl Skill {
    pub fn new(name: &str, category: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            category: category.to_string(),
        }
    }
}

// ============================================================
// ASSESSMENT INPUT
// ============================================================

/// A completed questionnaire run, as handed over by the assessment
/// subsystem. Only read once status is "Completed".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentAttempt {
    pub id: String,
    pub owner_id: String,
    pub major: String,
    pub study_level: StudyLevel,
    pub status: String,
    pub completed_at: Option<DateTime<Utc>>,
}

/// One (question, answer) pair from an attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentResponse {
    pub question: String,
    /// Question category ("Timeline", "Skills", "Career Goal", ...).
    pub category: String,
    pub answer: String,
    pub is_skipped: bool,
    pub order_index: i32,
}

// ============================================================
// AI RESPONSE DTOS
// ============================================================

// Decoded leniently: every field defaults so an incomplete reply still
// deserializes and can be persisted with warnings instead of being lost.

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AiStudyPlanResponse {
    pub title: String,
    pub summary: String,
    pub estimated_hours: i32,
    pub difficulty: String,
    pub steps: Vec<AiStep>,
    pub required_skills: Vec<AiRequiredSkill>,
    pub resources: Vec<AiResource>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AiStep {
    pub name: String,
    pub description: String,
    pub estimated_hours: i32,
    pub checkpoints: Vec<AiCheckpoint>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AiCheckpoint {
    pub description: String,
    pub estimated_minutes: i32,
    #[serde(rename = "type")]
    pub checkpoint_type: String,
    pub is_mandatory: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AiRequiredSkill {
    pub name: String,
    pub target_proficiency: String,
    pub importance: i32,
    pub is_prerequisite: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AiResource {
    pub title: String,
    pub url: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub estimated_hours: Option<i32>,
    pub difficulty: Option<String>,
    pub is_free: bool,
    pub cost: Option<f64>,
    pub provider: Option<String>,
    pub priority: i32,
    /// Index into `steps`, if the resource belongs to one step.
    pub step_index: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AiCareerPlanResponse {
    pub title: String,
    pub summary: String,
    pub timeline_months: i32,
    pub steps: Vec<AiCareerStep>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AiCareerStep {
    pub name: String,
    pub description: String,
    pub skills: Vec<String>,
}

/// Persisted career plan: the document itself stays a JSON blob, the
/// queryable columns live beside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CareerPlan {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub timeline_months: i32,
    /// "ai" or "fallback".
    pub source: String,
    pub document: AiCareerPlanResponse,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_round_trip_through_text() {
        for s in [
            PlanStatus::Draft,
            PlanStatus::Active,
            PlanStatus::Completed,
            PlanStatus::Archived,
        ] {
            assert_eq!(PlanStatus::from_str(s.as_str()), Some(s));
        }
        for s in [
            StepStatus::Locked,
            StepStatus::NotStarted,
            StepStatus::InProgress,
            StepStatus::Completed,
        ] {
            assert_eq!(StepStatus::from_str(s.as_str()), Some(s));
        }
        assert_eq!(Proficiency::from_str("Expert"), Some(Proficiency::Expert));
        assert_eq!(ResourceType::from_str("Tutorial"), Some(ResourceType::Tutorial));
        assert_eq!(StepStatus::from_str("bogus"), None);
    }

    #[test]
    fn proficiency_levels_are_ordered() {
        assert!(Proficiency::Beginner.level() < Proficiency::Expert.level());
        assert_eq!(Proficiency::Intermediate.level(), 2);
    }

    #[test]
    fn incomplete_ai_reply_still_deserializes() {
        let parsed: AiStudyPlanResponse =
            serde_json::from_str(r#"{"title":"Rust Basics"}"#).unwrap();
        assert_eq!(parsed.title, "Rust Basics");
        assert!(parsed.steps.is_empty());
        assert!(parsed.required_skills.is_empty());
    }
}
