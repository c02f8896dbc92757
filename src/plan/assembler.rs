//! Plan Assembler
//!
//! Maps a decoded AI study-plan reply into the relational entity graph and
//! persists it as one write-unit, then computes the initial skill gaps
//! against the owner's portfolio. Authorization and readiness are checked
//! before anything is written; the whole graph is built in memory first so
//! a cancelled request never leaves partial rows behind.

use chrono::Utc;
use log::warn;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::plan::context::{serialize_context, AssessmentContext};
use crate::plan::store::Store;
use crate::plan::types::{
    AiStudyPlanResponse, Checkpoint, Difficulty, PlanStatus, Proficiency, RequiredSkill,
    Resource, ResourceType, SkillGapStatus, Step, StepStatus, StudyPlan,
};

const DEFAULT_SKILL_CATEGORY: &str = "Technical";
const DEFAULT_TARGET_PROFICIENCY: Proficiency = Proficiency::Intermediate;

fn clamp_rank(value: i32) -> i32 {
    value.clamp(1, 5)
}

/// Compact result handed back to the API layer after assembly.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSummary {
    pub plan_id: String,
    pub title: String,
    pub status: PlanStatus,
    pub total_steps: usize,
    pub total_resources: usize,
    pub estimated_hours: i32,
    pub required_skill_names: Vec<String>,
    pub generated_at: chrono::DateTime<Utc>,
    /// Shape-validation misses; non-empty means the plan was persisted
    /// incomplete and needs manual completion.
    pub warnings: Vec<String>,
}

/// Build the entity graph from the AI reply and persist it, then run the
/// initial gap analysis. Fails before any write if the attempt is missing,
/// belongs to someone else, or is not yet completed.
pub fn assemble_and_persist(
    store: &Store,
    owner_id: &str,
    assessment_id: &str,
    context: &AssessmentContext,
    response: &AiStudyPlanResponse,
    warnings: Vec<String>,
) -> CoreResult<PlanSummary> {
    let attempt = store
        .get_attempt(assessment_id)?
        .ok_or_else(|| CoreError::NotFound(format!("assessment {}", assessment_id)))?;
    if attempt.owner_id != owner_id {
        return Err(CoreError::Unauthorized(format!(
            "assessment {} does not belong to caller",
            assessment_id
        )));
    }
    if attempt.status != "Completed" {
        return Err(CoreError::NotCompletable(format!(
            "assessment {} has status {}",
            assessment_id, attempt.status
        )));
    }

    let plan = build_plan_graph(store, owner_id, assessment_id, response)?;

    if !warnings.is_empty() {
        warn!(
            "persisting incomplete plan {} for owner {} ({} warnings)",
            plan.id,
            owner_id,
            warnings.len()
        );
    }

    store.insert_plan_graph(&plan, Some(&serialize_context(context)))?;
    perform_skill_gap_analysis(store, owner_id, &plan.id)?;

    Ok(PlanSummary {
        plan_id: plan.id.clone(),
        title: plan.title.clone(),
        status: plan.status,
        total_steps: plan.steps.len(),
        total_resources: plan.resources.len(),
        estimated_hours: plan.estimated_hours,
        required_skill_names: plan
            .required_skills
            .iter()
            .map(|s| s.skill_name.clone())
            .collect(),
        generated_at: plan.created_at,
        warnings,
    })
}

fn build_plan_graph(
    store: &Store,
    owner_id: &str,
    assessment_id: &str,
    response: &AiStudyPlanResponse,
) -> CoreResult<StudyPlan> {
    let plan_id = Uuid::new_v4().to_string();
    let now = Utc::now();

    let mut steps = Vec::with_capacity(response.steps.len());
    for (index, ai_step) in response.steps.iter().enumerate() {
        let step_id = Uuid::new_v4().to_string();
        let checkpoints = ai_step
            .checkpoints
            .iter()
            .enumerate()
            .map(|(ci, ai_checkpoint)| Checkpoint {
                id: Uuid::new_v4().to_string(),
                step_id: step_id.clone(),
                description: ai_checkpoint.description.clone(),
                order_index: ci as i32,
                estimated_minutes: ai_checkpoint.estimated_minutes.max(0),
                checkpoint_type: ai_checkpoint.checkpoint_type.clone(),
                is_mandatory: ai_checkpoint.is_mandatory,
                is_completed: false,
                completed_at: None,
            })
            .collect();
        steps.push(Step {
            id: step_id,
            plan_id: plan_id.clone(),
            name: ai_step.name.clone(),
            description: ai_step.description.clone(),
            order_index: index as i32,
            estimated_hours: ai_step.estimated_hours.max(0),
            // Only the first step is immediately workable.
            status: if index == 0 { StepStatus::NotStarted } else { StepStatus::Locked },
            progress_percentage: 0,
            started_at: None,
            completed_at: None,
            checkpoints,
        });
    }

    let resources = response
        .resources
        .iter()
        .map(|ai_resource| Resource {
            id: Uuid::new_v4().to_string(),
            plan_id: plan_id.clone(),
            step_id: ai_resource
                .step_index
                .and_then(|i| steps.get(i))
                .map(|step| step.id.clone()),
            title: ai_resource.title.clone(),
            url: ai_resource.url.clone(),
            resource_type: ResourceType::from_str(&ai_resource.resource_type)
                .unwrap_or(ResourceType::Article),
            estimated_hours: ai_resource.estimated_hours,
            difficulty: ai_resource.difficulty.as_deref().and_then(Difficulty::from_str),
            is_free: ai_resource.is_free,
            cost: ai_resource.cost,
            provider: ai_resource.provider.clone(),
            priority: clamp_rank(ai_resource.priority),
        })
        .collect();

    let mut required_skills = Vec::with_capacity(response.required_skills.len());
    for ai_skill in &response.required_skills {
        let name = ai_skill.name.trim();
        if name.is_empty() {
            continue;
        }
        let skill = store.get_or_create_skill(name, DEFAULT_SKILL_CATEGORY)?;
        // Skip duplicates within one reply; the join table is keyed on
        // (plan, skill).
        if required_skills.iter().any(|s: &RequiredSkill| s.skill_id == skill.id) {
            continue;
        }
        let target = Proficiency::from_str(&ai_skill.target_proficiency)
            .unwrap_or(DEFAULT_TARGET_PROFICIENCY);
        required_skills.push(RequiredSkill {
            plan_id: plan_id.clone(),
            skill_id: skill.id,
            skill_name: skill.name,
            target_proficiency: target,
            importance: clamp_rank(ai_skill.importance),
            is_prerequisite: ai_skill.is_prerequisite,
            // Gap analysis right after assembly fills these in.
            status: SkillGapStatus::Missing,
            proficiency_gap: target.level(),
        });
    }

    let estimated_hours = if response.estimated_hours > 0 {
        response.estimated_hours
    } else {
        steps.iter().map(|s| s.estimated_hours).sum()
    };

    Ok(StudyPlan {
        id: plan_id,
        owner_id: owner_id.to_string(),
        source_assessment_id: Some(assessment_id.to_string()),
        source_career_plan_id: None,
        title: response.title.clone(),
        summary: response.summary.clone(),
        estimated_hours,
        difficulty: Difficulty::from_str(&response.difficulty)
            .unwrap_or(Difficulty::Intermediate),
        status: PlanStatus::Draft,
        progress_percentage: 0,
        is_active: false,
        started_at: None,
        completed_at: None,
        created_at: now,
        steps,
        resources,
        required_skills,
    })
}

// ============================================================
// SKILL GAP ANALYSIS
// ============================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillGap {
    pub skill_name: String,
    pub target_proficiency: Proficiency,
    pub current_proficiency: Option<Proficiency>,
    pub gap: i32,
    pub status: SkillGapStatus,
    pub importance: i32,
    pub is_prerequisite: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GapAnalysis {
    pub total_required: usize,
    pub missing: usize,
    pub in_progress: usize,
    pub achieved: usize,
    pub gaps: Vec<SkillGap>,
    pub recommendations: Vec<String>,
}

/// Recompute every required skill's status and gap against the owner's
/// current portfolio. Idempotent: unchanged inputs yield unchanged rows.
pub fn perform_skill_gap_analysis(
    store: &Store,
    owner_id: &str,
    plan_id: &str,
) -> CoreResult<GapAnalysis> {
    let plan = store
        .get_plan(plan_id)?
        .ok_or_else(|| CoreError::NotFound(format!("plan {}", plan_id)))?;
    if plan.owner_id != owner_id {
        return Err(CoreError::Unauthorized(format!(
            "plan {} does not belong to caller",
            plan_id
        )));
    }

    let mut gaps = Vec::with_capacity(plan.required_skills.len());
    for required in &plan.required_skills {
        let current = store.user_proficiency(owner_id, &required.skill_id)?;
        let (status, gap) = match current {
            None => (SkillGapStatus::Missing, required.target_proficiency.level()),
            Some(level) => {
                let gap = required.target_proficiency.level() - level.level();
                if gap <= 0 {
                    (SkillGapStatus::Achieved, gap)
                } else {
                    (SkillGapStatus::InProgress, gap)
                }
            }
        };
        store.update_required_skill_gap(plan_id, &required.skill_id, status, gap)?;
        gaps.push(SkillGap {
            skill_name: required.skill_name.clone(),
            target_proficiency: required.target_proficiency,
            current_proficiency: current,
            gap,
            status,
            importance: required.importance,
            is_prerequisite: required.is_prerequisite,
        });
    }

    let missing = gaps.iter().filter(|g| g.status == SkillGapStatus::Missing).count();
    let in_progress = gaps.iter().filter(|g| g.status == SkillGapStatus::InProgress).count();
    let achieved = gaps.iter().filter(|g| g.status == SkillGapStatus::Achieved).count();

    // Most important unmet skills first; prerequisites ahead of the rest.
    let mut unmet: Vec<&SkillGap> =
        gaps.iter().filter(|g| g.status != SkillGapStatus::Achieved).collect();
    unmet.sort_by_key(|g| (!g.is_prerequisite, g.importance, g.skill_name.clone()));
    let recommendations = unmet
        .iter()
        .take(5)
        .map(|g| match g.current_proficiency {
            None => format!(
                "Start learning {} (target: {})",
                g.skill_name,
                g.target_proficiency.as_str()
            ),
            Some(current) => format!(
                "Advance {} from {} to {}",
                g.skill_name,
                current.as_str(),
                g.target_proficiency.as_str()
            ),
        })
        .collect();

    Ok(GapAnalysis {
        total_required: gaps.len(),
        missing,
        in_progress,
        achieved,
        gaps,
        recommendations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::types::{
        AiCheckpoint, AiRequiredSkill, AiResource, AiStep, AssessmentAttempt,
        AssessmentResponse, StudyLevel,
    };

    fn seeded_store(status: &str) -> Store {
        let store = Store::in_memory().unwrap();
        let attempt = AssessmentAttempt {
            id: "attempt-1".to_string(),
            owner_id: "user-1".to_string(),
            major: "CS".to_string(),
            study_level: StudyLevel::Junior,
            status: status.to_string(),
            completed_at: None,
        };
        let responses = vec![AssessmentResponse {
            question: "Skills?".to_string(),
            category: "Skills".to_string(),
            answer: "Python".to_string(),
            is_skipped: false,
            order_index: 0,
        }];
        store.insert_attempt(&attempt, &responses).unwrap();
        store
    }

    fn context() -> AssessmentContext {
        AssessmentContext::new("CS", StudyLevel::Junior)
    }

    fn response() -> AiStudyPlanResponse {
        AiStudyPlanResponse {
            title: "Backend Plan".to_string(),
            summary: "A plan".to_string(),
            estimated_hours: 0,
            difficulty: "Intermediate".to_string(),
            steps: vec![
                AiStep {
                    name: "Foundations".to_string(),
                    description: String::new(),
                    estimated_hours: 20,
                    checkpoints: vec![AiCheckpoint {
                        description: "Read the intro".to_string(),
                        estimated_minutes: 60,
                        checkpoint_type: "reading".to_string(),
                        is_mandatory: true,
                    }],
                },
                AiStep {
                    name: "Databases".to_string(),
                    description: String::new(),
                    estimated_hours: 30,
                    checkpoints: vec![AiCheckpoint {
                        description: "Model a schema".to_string(),
                        estimated_minutes: 120,
                        checkpoint_type: "exercise".to_string(),
                        is_mandatory: false,
                    }],
                },
            ],
            required_skills: vec![
                AiRequiredSkill {
                    name: "SQL".to_string(),
                    target_proficiency: "Advanced".to_string(),
                    importance: 1,
                    is_prerequisite: true,
                },
                AiRequiredSkill {
                    name: "Python".to_string(),
                    target_proficiency: "Intermediate".to_string(),
                    importance: 2,
                    is_prerequisite: false,
                },
            ],
            resources: vec![AiResource {
                title: "SQL Course".to_string(),
                url: "https://example.com/sql".to_string(),
                resource_type: "Course".to_string(),
                is_free: true,
                priority: 9,
                step_index: Some(1),
                ..Default::default()
            }],
        }
    }

    #[test]
    fn first_step_starts_not_started_and_rest_locked() {
        let store = seeded_store("Completed");
        let summary = assemble_and_persist(
            &store,
            "user-1",
            "attempt-1",
            &context(),
            &response(),
            Vec::new(),
        )
        .unwrap();
        let plan = store.get_plan(&summary.plan_id).unwrap().unwrap();
        assert_eq!(plan.steps[0].status, StepStatus::NotStarted);
        assert_eq!(plan.steps[1].status, StepStatus::Locked);
        assert_eq!(plan.steps[0].order_index, 0);
        // Resource priority is clamped and linked to its step.
        assert_eq!(plan.resources[0].priority, 5);
        assert_eq!(plan.resources[0].step_id, Some(plan.steps[1].id.clone()));
        // estimatedHours fell back to the step sum.
        assert_eq!(plan.estimated_hours, 50);
    }

    #[test]
    fn rejects_foreign_and_unfinished_attempts() {
        let store = seeded_store("Completed");
        let err = assemble_and_persist(
            &store,
            "someone-else",
            "attempt-1",
            &context(),
            &response(),
            Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized(_)));

        let store = seeded_store("InProgress");
        let err = assemble_and_persist(
            &store,
            "user-1",
            "attempt-1",
            &context(),
            &response(),
            Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::NotCompletable(_)));
    }

    #[test]
    fn persists_incomplete_response_with_warnings() {
        let store = seeded_store("Completed");
        let sparse = AiStudyPlanResponse {
            title: "Sparse Plan".to_string(),
            ..Default::default()
        };
        let summary = assemble_and_persist(
            &store,
            "user-1",
            "attempt-1",
            &context(),
            &sparse,
            vec!["Response must contain a non-empty steps list".to_string()],
        )
        .unwrap();
        assert_eq!(summary.total_steps, 0);
        assert_eq!(summary.warnings.len(), 1);
        // The plan is still retrievable for manual completion.
        assert!(store.get_plan(&summary.plan_id).unwrap().is_some());
    }

    #[test]
    fn gap_analysis_tracks_portfolio_and_is_idempotent() {
        let store = seeded_store("Completed");
        let summary = assemble_and_persist(
            &store,
            "user-1",
            "attempt-1",
            &context(),
            &response(),
            Vec::new(),
        )
        .unwrap();

        // No portfolio yet: everything is missing with gap = target level.
        let analysis = perform_skill_gap_analysis(&store, "user-1", &summary.plan_id).unwrap();
        assert_eq!(analysis.total_required, 2);
        assert_eq!(analysis.missing, 2);

        // Give the user Expert Python and Beginner SQL.
        let python = store.get_or_create_skill("Python", "Technical").unwrap();
        let sql = store.get_or_create_skill("SQL", "Technical").unwrap();
        store.set_user_proficiency("user-1", &python.id, Proficiency::Expert).unwrap();
        store.set_user_proficiency("user-1", &sql.id, Proficiency::Beginner).unwrap();

        let first = perform_skill_gap_analysis(&store, "user-1", &summary.plan_id).unwrap();
        assert_eq!(first.achieved, 1);
        assert_eq!(first.in_progress, 1);
        let sql_gap = first.gaps.iter().find(|g| g.skill_name == "SQL").unwrap();
        assert_eq!(sql_gap.gap, 2); // Advanced(3) - Beginner(1)
        assert_eq!(sql_gap.status, SkillGapStatus::InProgress);

        // Re-running with no portfolio change yields identical results.
        let second = perform_skill_gap_analysis(&store, "user-1", &summary.plan_id).unwrap();
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn duplicate_skill_names_collapse_to_one_row() {
        let store = seeded_store("Completed");
        let mut reply = response();
        reply.required_skills.push(AiRequiredSkill {
            name: "sql".to_string(),
            target_proficiency: "Beginner".to_string(),
            importance: 3,
            is_prerequisite: false,
        });
        let summary = assemble_and_persist(
            &store,
            "user-1",
            "attempt-1",
            &context(),
            &reply,
            Vec::new(),
        )
        .unwrap();
        assert_eq!(summary.required_skill_names.len(), 2);
    }
}
