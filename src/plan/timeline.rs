//! Activity Timeline
//!
//! Per-owner event log appended to by the pipeline (plan generated,
//! fallback engaged, progress changes, activation). Read-only over the
//! API; mainly there so generation decisions stay explainable after the
//! fact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimelineEventType {
    StudyPlanGenerated,
    CareerPlanGenerated,
    FallbackEngaged,
    CheckpointUpdated,
    StepProgressUpdated,
    PlanActivated,
    PlanArchived,
    PlanCompleted,
}

impl TimelineEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimelineEventType::StudyPlanGenerated => "study_plan_generated",
            TimelineEventType::CareerPlanGenerated => "career_plan_generated",
            TimelineEventType::FallbackEngaged => "fallback_engaged",
            TimelineEventType::CheckpointUpdated => "checkpoint_updated",
            TimelineEventType::StepProgressUpdated => "step_progress_updated",
            TimelineEventType::PlanActivated => "plan_activated",
            TimelineEventType::PlanArchived => "plan_archived",
            TimelineEventType::PlanCompleted => "plan_completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "study_plan_generated" => Some(TimelineEventType::StudyPlanGenerated),
            "career_plan_generated" => Some(TimelineEventType::CareerPlanGenerated),
            "fallback_engaged" => Some(TimelineEventType::FallbackEngaged),
            "checkpoint_updated" => Some(TimelineEventType::CheckpointUpdated),
            "step_progress_updated" => Some(TimelineEventType::StepProgressUpdated),
            "plan_activated" => Some(TimelineEventType::PlanActivated),
            "plan_archived" => Some(TimelineEventType::PlanArchived),
            "plan_completed" => Some(TimelineEventType::PlanCompleted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub id: String,
    pub owner_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: TimelineEventType,
    pub description: String,
    pub metadata: Option<serde_json::Value>,
}

impl TimelineEvent {
    pub fn new(owner_id: &str, event_type: TimelineEventType, description: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            timestamp: Utc::now(),
            event_type,
            description: description.to_string(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
