//! Progress Recalculation
//!
//! Checkpoint toggles, caller-driven step percentages, and the derived
//! plan-level progress. Step percentage is authoritative and supplied by
//! the caller; checkpoint completion does not propagate into it
//! automatically. `mandatory_completion_ratio` is available for callers
//! that want a suggested percentage.

use chrono::Utc;

use crate::error::{CoreError, CoreResult};
use crate::plan::store::Store;
use crate::plan::types::{Checkpoint, PlanStatus, Step, StepStatus};

/// Toggle one checkpoint's completion flag and timestamp. No cascading
/// effect on the owning step.
pub fn update_checkpoint(
    store: &Store,
    owner_id: &str,
    checkpoint_id: &str,
    is_completed: bool,
) -> CoreResult<Checkpoint> {
    let checkpoint = store
        .get_checkpoint(checkpoint_id)?
        .ok_or_else(|| CoreError::NotFound(format!("checkpoint {}", checkpoint_id)))?;
    authorize_step(store, owner_id, &checkpoint.step_id)?;

    let completed_at = if is_completed { Some(Utc::now()) } else { None };
    store.set_checkpoint_completion(checkpoint_id, is_completed, completed_at)?;

    Ok(Checkpoint { is_completed, completed_at, ..checkpoint })
}

/// Set a step's percentage and derive its status: 0 is NotStarted, 100 is
/// Completed, anything between is InProgress. startedAt is stamped on the
/// first move off zero, completedAt on reaching 100.
pub fn update_step_progress(
    store: &Store,
    owner_id: &str,
    step_id: &str,
    percentage: i32,
) -> CoreResult<Step> {
    if !(0..=100).contains(&percentage) {
        return Err(CoreError::InvalidInput(format!(
            "percentage {} outside 0..=100",
            percentage
        )));
    }

    let mut step = store
        .get_step(step_id)?
        .ok_or_else(|| CoreError::NotFound(format!("step {}", step_id)))?;
    authorize_plan(store, owner_id, &step.plan_id)?;

    step.progress_percentage = percentage;
    match percentage {
        0 => {
            step.status = StepStatus::NotStarted;
            step.completed_at = None;
        }
        100 => {
            step.status = StepStatus::Completed;
            if step.started_at.is_none() {
                step.started_at = Some(Utc::now());
            }
            if step.completed_at.is_none() {
                step.completed_at = Some(Utc::now());
            }
        }
        _ => {
            step.status = StepStatus::InProgress;
            if step.started_at.is_none() {
                step.started_at = Some(Utc::now());
            }
            step.completed_at = None;
        }
    }

    store.save_step_progress(&step)?;
    Ok(step)
}

/// Recompute plan progress as the arithmetic mean of its step percentages
/// (0 with no steps). Reaching 100 completes the plan and stamps
/// completedAt; anything below keeps completedAt clear.
pub fn recalculate_overall_progress(
    store: &Store,
    owner_id: &str,
    plan_id: &str,
) -> CoreResult<(i32, PlanStatus)> {
    let plan = store
        .get_plan(plan_id)?
        .ok_or_else(|| CoreError::NotFound(format!("plan {}", plan_id)))?;
    if plan.owner_id != owner_id {
        return Err(CoreError::Unauthorized(format!(
            "plan {} does not belong to caller",
            plan_id
        )));
    }

    let percentages = store.step_percentages(plan_id)?;
    let progress = if percentages.is_empty() {
        0
    } else {
        let sum: i64 = percentages.iter().map(|p| *p as i64).sum();
        (sum / percentages.len() as i64) as i32
    };

    let (status, completed_at) = if progress >= 100 {
        (PlanStatus::Completed, plan.completed_at.or_else(|| Some(Utc::now())))
    } else if plan.status == PlanStatus::Completed {
        // Progress dropped back below 100; the plan is active work again.
        (PlanStatus::Active, None)
    } else {
        (plan.status, None)
    };

    store.save_plan_progress(plan_id, progress, status, completed_at)?;
    Ok((progress, status))
}

/// Completed-mandatory over total-mandatory checkpoints, as a percentage.
/// None when the step has no mandatory checkpoints. Pure helper for the
/// presentation layer; never applied automatically.
pub fn mandatory_completion_ratio(step: &Step) -> Option<i32> {
    let mandatory: Vec<&Checkpoint> =
        step.checkpoints.iter().filter(|c| c.is_mandatory).collect();
    if mandatory.is_empty() {
        return None;
    }
    let done = mandatory.iter().filter(|c| c.is_completed).count();
    Some((done * 100 / mandatory.len()) as i32)
}

pub fn activate_study_plan(store: &Store, owner_id: &str, plan_id: &str) -> CoreResult<()> {
    store.activate_plan(owner_id, plan_id)
}

pub fn archive_study_plan(store: &Store, owner_id: &str, plan_id: &str) -> CoreResult<()> {
    authorize_plan(store, owner_id, plan_id)?;
    store.archive_plan(owner_id, plan_id)
}

fn authorize_plan(store: &Store, owner_id: &str, plan_id: &str) -> CoreResult<()> {
    match store.plan_owner(plan_id)? {
        None => Err(CoreError::NotFound(format!("plan {}", plan_id))),
        Some(actual) if actual != owner_id => Err(CoreError::Unauthorized(format!(
            "plan {} does not belong to caller",
            plan_id
        ))),
        Some(_) => Ok(()),
    }
}

fn authorize_step(store: &Store, owner_id: &str, step_id: &str) -> CoreResult<()> {
    let step = store
        .get_step(step_id)?
        .ok_or_else(|| CoreError::NotFound(format!("step {}", step_id)))?;
    authorize_plan(store, owner_id, &step.plan_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::types::{
        Checkpoint, Difficulty, PlanStatus, StudyPlan,
    };
    use uuid::Uuid;

    fn plan_with_steps(owner: &str, percentages: &[i32]) -> (Store, StudyPlan) {
        let store = Store::in_memory().unwrap();
        let plan_id = Uuid::new_v4().to_string();
        let steps = percentages
            .iter()
            .enumerate()
            .map(|(i, pct)| {
                let step_id = Uuid::new_v4().to_string();
                Step {
                    id: step_id.clone(),
                    plan_id: plan_id.clone(),
                    name: format!("Step {}", i),
                    description: String::new(),
                    order_index: i as i32,
                    estimated_hours: 10,
                    status: if i == 0 { StepStatus::NotStarted } else { StepStatus::Locked },
                    progress_percentage: *pct,
                    started_at: None,
                    completed_at: None,
                    checkpoints: vec![Checkpoint {
                        id: Uuid::new_v4().to_string(),
                        step_id,
                        description: "checkpoint".to_string(),
                        order_index: 0,
                        estimated_minutes: 30,
                        checkpoint_type: "exercise".to_string(),
                        is_mandatory: true,
                        is_completed: false,
                        completed_at: None,
                    }],
                }
            })
            .collect();
        let plan = StudyPlan {
            id: plan_id,
            owner_id: owner.to_string(),
            source_assessment_id: None,
            source_career_plan_id: None,
            title: "Plan".to_string(),
            summary: String::new(),
            estimated_hours: 30,
            difficulty: Difficulty::Beginner,
            status: PlanStatus::Draft,
            progress_percentage: 0,
            is_active: false,
            started_at: None,
            completed_at: None,
            created_at: Utc::now(),
            steps,
            resources: Vec::new(),
            required_skills: Vec::new(),
        };
        store.insert_plan_graph(&plan, None).unwrap();
        (store, plan)
    }

    #[test]
    fn checkpoint_toggle_has_no_cascade() {
        let (store, plan) = plan_with_steps("user-1", &[0]);
        let checkpoint_id = plan.steps[0].checkpoints[0].id.clone();

        let updated = update_checkpoint(&store, "user-1", &checkpoint_id, true).unwrap();
        assert!(updated.is_completed);
        assert!(updated.completed_at.is_some());

        // Owning step untouched.
        let step = store.get_step(&plan.steps[0].id).unwrap().unwrap();
        assert_eq!(step.progress_percentage, 0);
        assert_eq!(step.status, StepStatus::NotStarted);

        let reverted = update_checkpoint(&store, "user-1", &checkpoint_id, false).unwrap();
        assert!(!reverted.is_completed);
        assert!(reverted.completed_at.is_none());
    }

    #[test]
    fn step_percentage_derives_status_and_timestamps() {
        let (store, plan) = plan_with_steps("user-1", &[0]);
        let step_id = plan.steps[0].id.clone();

        let step = update_step_progress(&store, "user-1", &step_id, 40).unwrap();
        assert_eq!(step.status, StepStatus::InProgress);
        assert!(step.started_at.is_some());
        assert!(step.completed_at.is_none());

        let step = update_step_progress(&store, "user-1", &step_id, 100).unwrap();
        assert_eq!(step.status, StepStatus::Completed);
        assert!(step.completed_at.is_some());

        let step = update_step_progress(&store, "user-1", &step_id, 0).unwrap();
        assert_eq!(step.status, StepStatus::NotStarted);
        assert!(step.completed_at.is_none());

        let err = update_step_progress(&store, "user-1", &step_id, 101).unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
    }

    #[test]
    fn overall_progress_is_mean_and_only_100_completes() {
        let (store, plan) = plan_with_steps("user-1", &[0, 50, 100]);
        let (progress, status) =
            recalculate_overall_progress(&store, "user-1", &plan.id).unwrap();
        assert_eq!(progress, 50);
        assert_ne!(status, PlanStatus::Completed);
        let stored = store.get_plan(&plan.id).unwrap().unwrap();
        assert!(stored.completed_at.is_none());

        for step in &plan.steps {
            update_step_progress(&store, "user-1", &step.id, 100).unwrap();
        }
        let (progress, status) =
            recalculate_overall_progress(&store, "user-1", &plan.id).unwrap();
        assert_eq!(progress, 100);
        assert_eq!(status, PlanStatus::Completed);
        assert!(store.get_plan(&plan.id).unwrap().unwrap().completed_at.is_some());
    }

    #[test]
    fn empty_plan_recalculates_to_zero() {
        let (store, plan) = plan_with_steps("user-1", &[]);
        let (progress, _) = recalculate_overall_progress(&store, "user-1", &plan.id).unwrap();
        assert_eq!(progress, 0);
    }

    #[test]
    fn activation_leaves_exactly_one_active_plan() {
        let (store, plan_a) = plan_with_steps("user-1", &[0]);
        let plan_b = {
            let (_, mut other) = plan_with_steps("ignored", &[0]);
            other.owner_id = "user-1".to_string();
            other.id = Uuid::new_v4().to_string();
            for step in &mut other.steps {
                step.plan_id = other.id.clone();
            }
            store.insert_plan_graph(&other, None).unwrap();
            other
        };

        activate_study_plan(&store, "user-1", &plan_a.id).unwrap();
        activate_study_plan(&store, "user-1", &plan_b.id).unwrap();

        let plans = store.plans_for_owner("user-1").unwrap();
        let active: Vec<_> = plans.iter().filter(|p| p.is_active).collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, plan_b.id);
        let a = plans.iter().find(|p| p.id == plan_a.id).unwrap();
        assert_ne!(a.status, PlanStatus::Active);
        // Activation stamped startedAt on the target.
        assert!(active[0].started_at.is_some());
    }

    #[test]
    fn activation_rejects_foreign_plans() {
        let (store, plan) = plan_with_steps("user-1", &[0]);
        let err = activate_study_plan(&store, "intruder", &plan.id).unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized(_)));
    }

    #[test]
    fn archive_clears_active_flag() {
        let (store, plan) = plan_with_steps("user-1", &[0]);
        activate_study_plan(&store, "user-1", &plan.id).unwrap();
        archive_study_plan(&store, "user-1", &plan.id).unwrap();
        let stored = store.get_plan(&plan.id).unwrap().unwrap();
        assert_eq!(stored.status, PlanStatus::Archived);
        assert!(!stored.is_active);
    }

    #[test]
    fn mandatory_ratio_ignores_optional_checkpoints() {
        let (_, plan) = plan_with_steps("user-1", &[0]);
        let mut step = plan.steps[0].clone();
        step.checkpoints[0].is_completed = true;
        step.checkpoints.push(Checkpoint {
            is_mandatory: false,
            is_completed: false,
            ..step.checkpoints[0].clone()
        });
        assert_eq!(mandatory_completion_ratio(&step), Some(100));
        step.checkpoints[0].is_completed = false;
        assert_eq!(mandatory_completion_ratio(&step), Some(0));
        step.checkpoints.retain(|c| !c.is_mandatory);
        assert_eq!(mandatory_completion_ratio(&step), None);
    }
}
