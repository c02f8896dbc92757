//! Plan Store (SQLite-backed)
//!
//! Owns the relational schema for the plan-generation core: assessment
//! attempts, the StudyPlan aggregate and its owned rows, the master skill
//! table, the user skill portfolio, career-plan documents, and the
//! activity timeline.
//!
//! The plan graph is one write-unit: plan, steps, checkpoints, resources,
//! and required skills are inserted inside a single transaction. Plan
//! activation runs inside a transaction too, so the single-active-plan
//! invariant holds under concurrent requests.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::error::{CoreError, CoreResult};
use crate::plan::timeline::{TimelineEvent, TimelineEventType};
use crate::plan::types::{
    AssessmentAttempt, AssessmentResponse, CareerPlan, Checkpoint, Difficulty, PlanStatus,
    Proficiency, RequiredSkill, Resource, ResourceType, Skill, SkillGapStatus, Step, StepStatus,
    StudyPlan, StudyLevel,
};

pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS assessment_attempts (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    major TEXT NOT NULL,
    study_level TEXT NOT NULL,
    status TEXT NOT NULL,
    completed_at TEXT
);

CREATE TABLE IF NOT EXISTS assessment_responses (
    id TEXT PRIMARY KEY,
    attempt_id TEXT NOT NULL REFERENCES assessment_attempts(id) ON DELETE CASCADE,
    question TEXT NOT NULL,
    category TEXT NOT NULL,
    answer TEXT NOT NULL,
    is_skipped INTEGER NOT NULL DEFAULT 0,
    order_index INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS study_plans (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    source_assessment_id TEXT,
    source_career_plan_id TEXT,
    title TEXT NOT NULL,
    summary TEXT NOT NULL,
    estimated_hours INTEGER NOT NULL,
    difficulty TEXT NOT NULL,
    status TEXT NOT NULL,
    progress_percentage INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 0,
    started_at TEXT,
    completed_at TEXT,
    created_at TEXT NOT NULL,
    assessment_context TEXT
);

CREATE INDEX IF NOT EXISTS idx_study_plans_owner ON study_plans(owner_id);

CREATE TABLE IF NOT EXISTS plan_steps (
    id TEXT PRIMARY KEY,
    plan_id TEXT NOT NULL REFERENCES study_plans(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    description TEXT NOT NULL,
    order_index INTEGER NOT NULL,
    estimated_hours INTEGER NOT NULL,
    status TEXT NOT NULL,
    progress_percentage INTEGER NOT NULL DEFAULT 0,
    started_at TEXT,
    completed_at TEXT,
    UNIQUE(plan_id, order_index)
);

CREATE TABLE IF NOT EXISTS step_checkpoints (
    id TEXT PRIMARY KEY,
    step_id TEXT NOT NULL REFERENCES plan_steps(id) ON DELETE CASCADE,
    description TEXT NOT NULL,
    order_index INTEGER NOT NULL,
    estimated_minutes INTEGER NOT NULL,
    checkpoint_type TEXT NOT NULL,
    is_mandatory INTEGER NOT NULL DEFAULT 0,
    is_completed INTEGER NOT NULL DEFAULT 0,
    completed_at TEXT
);

CREATE TABLE IF NOT EXISTS plan_resources (
    id TEXT PRIMARY KEY,
    plan_id TEXT NOT NULL REFERENCES study_plans(id) ON DELETE CASCADE,
    step_id TEXT REFERENCES plan_steps(id),
    title TEXT NOT NULL,
    url TEXT NOT NULL,
    resource_type TEXT NOT NULL,
    estimated_hours INTEGER,
    difficulty TEXT,
    is_free INTEGER NOT NULL DEFAULT 1,
    cost REAL,
    provider TEXT,
    priority INTEGER NOT NULL DEFAULT 3
);

CREATE TABLE IF NOT EXISTS skills (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE COLLATE NOCASE,
    category TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS plan_required_skills (
    plan_id TEXT NOT NULL REFERENCES study_plans(id) ON DELETE CASCADE,
    skill_id TEXT NOT NULL REFERENCES skills(id),
    target_proficiency TEXT NOT NULL,
    importance INTEGER NOT NULL,
    is_prerequisite INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    proficiency_gap INTEGER NOT NULL,
    PRIMARY KEY (plan_id, skill_id)
);

CREATE TABLE IF NOT EXISTS user_skills (
    owner_id TEXT NOT NULL,
    skill_id TEXT NOT NULL REFERENCES skills(id),
    proficiency TEXT NOT NULL,
    PRIMARY KEY (owner_id, skill_id)
);

CREATE TABLE IF NOT EXISTS career_plans (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    title TEXT NOT NULL,
    timeline_months INTEGER NOT NULL,
    source TEXT NOT NULL,
    document TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_career_plans_owner ON career_plans(owner_id);

CREATE TABLE IF NOT EXISTS timeline_events (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    event_type TEXT NOT NULL,
    description TEXT NOT NULL,
    metadata TEXT
);

CREATE INDEX IF NOT EXISTS idx_timeline_owner ON timeline_events(owner_id);
";

fn to_ts(value: &Option<DateTime<Utc>>) -> Option<String> {
    value.map(|dt| dt.to_rfc3339())
}

fn from_ts(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

impl Store {
    pub fn new(db_path: Option<PathBuf>) -> CoreResult<Self> {
        let path = db_path.unwrap_or_else(|| PathBuf::from("mentora.db"));
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// In-memory store for tests.
    pub fn in_memory() -> CoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> CoreResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    // ============================================================
    // ASSESSMENTS
    // ============================================================

    pub fn insert_attempt(
        &self,
        attempt: &AssessmentAttempt,
        responses: &[AssessmentResponse],
    ) -> CoreResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO assessment_attempts (id, owner_id, major, study_level, status, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                attempt.id,
                attempt.owner_id,
                attempt.major,
                attempt.study_level.as_str(),
                attempt.status,
                to_ts(&attempt.completed_at),
            ],
        )?;
        for response in responses {
            tx.execute(
                "INSERT INTO assessment_responses
                 (id, attempt_id, question, category, answer, is_skipped, order_index)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    uuid::Uuid::new_v4().to_string(),
                    attempt.id,
                    response.question,
                    response.category,
                    response.answer,
                    response.is_skipped as i32,
                    response.order_index,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn get_attempt(&self, attempt_id: &str) -> CoreResult<Option<AssessmentAttempt>> {
        let conn = self.conn.lock().unwrap();
        let attempt = conn
            .query_row(
                "SELECT id, owner_id, major, study_level, status, completed_at
                 FROM assessment_attempts WHERE id = ?1",
                [attempt_id],
                |row| {
                    let level: String = row.get(3)?;
                    let completed: Option<String> = row.get(5)?;
                    Ok(AssessmentAttempt {
                        id: row.get(0)?,
                        owner_id: row.get(1)?,
                        major: row.get(2)?,
                        study_level: StudyLevel::from_str(&level)
                            .unwrap_or(StudyLevel::Freshman),
                        status: row.get(4)?,
                        completed_at: from_ts(completed),
                    })
                },
            )
            .optional()?;
        Ok(attempt)
    }

    pub fn get_attempt_responses(&self, attempt_id: &str) -> CoreResult<Vec<AssessmentResponse>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT question, category, answer, is_skipped, order_index
             FROM assessment_responses WHERE attempt_id = ?1 ORDER BY order_index ASC",
        )?;
        let rows = stmt.query_map([attempt_id], |row| {
            let skipped: i32 = row.get(3)?;
            Ok(AssessmentResponse {
                question: row.get(0)?,
                category: row.get(1)?,
                answer: row.get(2)?,
                is_skipped: skipped != 0,
                order_index: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // ============================================================
    // PLAN GRAPH
    // ============================================================

    /// Insert the full plan graph in one transaction.
    pub fn insert_plan_graph(
        &self,
        plan: &StudyPlan,
        assessment_context: Option<&str>,
    ) -> CoreResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO study_plans
             (id, owner_id, source_assessment_id, source_career_plan_id, title, summary,
              estimated_hours, difficulty, status, progress_percentage, is_active,
              started_at, completed_at, created_at, assessment_context)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                plan.id,
                plan.owner_id,
                plan.source_assessment_id,
                plan.source_career_plan_id,
                plan.title,
                plan.summary,
                plan.estimated_hours,
                plan.difficulty.as_str(),
                plan.status.as_str(),
                plan.progress_percentage,
                plan.is_active as i32,
                to_ts(&plan.started_at),
                to_ts(&plan.completed_at),
                plan.created_at.to_rfc3339(),
                assessment_context,
            ],
        )?;

        for step in &plan.steps {
            tx.execute(
                "INSERT INTO plan_steps
                 (id, plan_id, name, description, order_index, estimated_hours, status,
                  progress_percentage, started_at, completed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    step.id,
                    plan.id,
                    step.name,
                    step.description,
                    step.order_index,
                    step.estimated_hours,
                    step.status.as_str(),
                    step.progress_percentage,
                    to_ts(&step.started_at),
                    to_ts(&step.completed_at),
                ],
            )?;
            for checkpoint in &step.checkpoints {
                tx.execute(
                    "INSERT INTO step_checkpoints
                     (id, step_id, description, order_index, estimated_minutes,
                      checkpoint_type, is_mandatory, is_completed, completed_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        checkpoint.id,
                        step.id,
                        checkpoint.description,
                        checkpoint.order_index,
                        checkpoint.estimated_minutes,
                        checkpoint.checkpoint_type,
                        checkpoint.is_mandatory as i32,
                        checkpoint.is_completed as i32,
                        to_ts(&checkpoint.completed_at),
                    ],
                )?;
            }
        }

        for resource in &plan.resources {
            tx.execute(
                "INSERT INTO plan_resources
                 (id, plan_id, step_id, title, url, resource_type, estimated_hours,
                  difficulty, is_free, cost, provider, priority)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    resource.id,
                    plan.id,
                    resource.step_id,
                    resource.title,
                    resource.url,
                    resource.resource_type.as_str(),
                    resource.estimated_hours,
                    resource.difficulty.map(|d| d.as_str()),
                    resource.is_free as i32,
                    resource.cost,
                    resource.provider,
                    resource.priority,
                ],
            )?;
        }

        for skill in &plan.required_skills {
            tx.execute(
                "INSERT INTO plan_required_skills
                 (plan_id, skill_id, target_proficiency, importance, is_prerequisite,
                  status, proficiency_gap)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    plan.id,
                    skill.skill_id,
                    skill.target_proficiency.as_str(),
                    skill.importance,
                    skill.is_prerequisite as i32,
                    skill.status.as_str(),
                    skill.proficiency_gap,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    pub fn get_plan(&self, plan_id: &str) -> CoreResult<Option<StudyPlan>> {
        let conn = self.conn.lock().unwrap();
        let header = conn
            .query_row(
                "SELECT id, owner_id, source_assessment_id, source_career_plan_id, title,
                        summary, estimated_hours, difficulty, status, progress_percentage,
                        is_active, started_at, completed_at, created_at
                 FROM study_plans WHERE id = ?1",
                [plan_id],
                |row| {
                    let difficulty: String = row.get(7)?;
                    let status: String = row.get(8)?;
                    let is_active: i32 = row.get(10)?;
                    let started: Option<String> = row.get(11)?;
                    let completed: Option<String> = row.get(12)?;
                    let created: String = row.get(13)?;
                    Ok(StudyPlan {
                        id: row.get(0)?,
                        owner_id: row.get(1)?,
                        source_assessment_id: row.get(2)?,
                        source_career_plan_id: row.get(3)?,
                        title: row.get(4)?,
                        summary: row.get(5)?,
                        estimated_hours: row.get(6)?,
                        difficulty: Difficulty::from_str(&difficulty)
                            .unwrap_or(Difficulty::Beginner),
                        status: PlanStatus::from_str(&status).unwrap_or(PlanStatus::Draft),
                        progress_percentage: row.get(9)?,
                        is_active: is_active != 0,
                        started_at: from_ts(started),
                        completed_at: from_ts(completed),
                        created_at: from_ts(Some(created)).unwrap_or_else(Utc::now),
                        steps: Vec::new(),
                        resources: Vec::new(),
                        required_skills: Vec::new(),
                    })
                },
            )
            .optional()?;

        let Some(mut plan) = header else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT id, plan_id, name, description, order_index, estimated_hours, status,
                    progress_percentage, started_at, completed_at
             FROM plan_steps WHERE plan_id = ?1 ORDER BY order_index ASC",
        )?;
        let steps = stmt.query_map([plan_id], |row| {
            let status: String = row.get(6)?;
            let started: Option<String> = row.get(8)?;
            let completed: Option<String> = row.get(9)?;
            Ok(Step {
                id: row.get(0)?,
                plan_id: row.get(1)?,
                name: row.get(2)?,
                description: row.get(3)?,
                order_index: row.get(4)?,
                estimated_hours: row.get(5)?,
                status: StepStatus::from_str(&status).unwrap_or(StepStatus::Locked),
                progress_percentage: row.get(7)?,
                started_at: from_ts(started),
                completed_at: from_ts(completed),
                checkpoints: Vec::new(),
            })
        })?;
        plan.steps = steps.collect::<Result<Vec<_>, _>>()?;

        let mut stmt = conn.prepare(
            "SELECT id, step_id, description, order_index, estimated_minutes,
                    checkpoint_type, is_mandatory, is_completed, completed_at
             FROM step_checkpoints WHERE step_id = ?1 ORDER BY order_index ASC",
        )?;
        for step in &mut plan.steps {
            let checkpoints = stmt.query_map([&step.id], |row| {
                let mandatory: i32 = row.get(6)?;
                let completed_flag: i32 = row.get(7)?;
                let completed: Option<String> = row.get(8)?;
                Ok(Checkpoint {
                    id: row.get(0)?,
                    step_id: row.get(1)?,
                    description: row.get(2)?,
                    order_index: row.get(3)?,
                    estimated_minutes: row.get(4)?,
                    checkpoint_type: row.get(5)?,
                    is_mandatory: mandatory != 0,
                    is_completed: completed_flag != 0,
                    completed_at: from_ts(completed),
                })
            })?;
            step.checkpoints = checkpoints.collect::<Result<Vec<_>, _>>()?;
        }

        let mut stmt = conn.prepare(
            "SELECT id, plan_id, step_id, title, url, resource_type, estimated_hours,
                    difficulty, is_free, cost, provider, priority
             FROM plan_resources WHERE plan_id = ?1 ORDER BY priority ASC",
        )?;
        let resources = stmt.query_map([plan_id], |row| {
            let resource_type: String = row.get(5)?;
            let difficulty: Option<String> = row.get(7)?;
            let is_free: i32 = row.get(8)?;
            Ok(Resource {
                id: row.get(0)?,
                plan_id: row.get(1)?,
                step_id: row.get(2)?,
                title: row.get(3)?,
                url: row.get(4)?,
                resource_type: ResourceType::from_str(&resource_type)
                    .unwrap_or(ResourceType::Article),
                estimated_hours: row.get(6)?,
                difficulty: difficulty.as_deref().and_then(Difficulty::from_str),
                is_free: is_free != 0,
                cost: row.get(9)?,
                provider: row.get(10)?,
                priority: row.get(11)?,
            })
        })?;
        plan.resources = resources.collect::<Result<Vec<_>, _>>()?;

        let mut stmt = conn.prepare(
            "SELECT rs.plan_id, rs.skill_id, s.name, rs.target_proficiency, rs.importance,
                    rs.is_prerequisite, rs.status, rs.proficiency_gap
             FROM plan_required_skills rs JOIN skills s ON s.id = rs.skill_id
             WHERE rs.plan_id = ?1 ORDER BY rs.importance ASC, s.name ASC",
        )?;
        let skills = stmt.query_map([plan_id], |row| {
            let target: String = row.get(3)?;
            let prerequisite: i32 = row.get(5)?;
            let status: String = row.get(6)?;
            Ok(RequiredSkill {
                plan_id: row.get(0)?,
                skill_id: row.get(1)?,
                skill_name: row.get(2)?,
                target_proficiency: Proficiency::from_str(&target)
                    .unwrap_or(Proficiency::Beginner),
                importance: row.get(4)?,
                is_prerequisite: prerequisite != 0,
                status: SkillGapStatus::from_str(&status).unwrap_or(SkillGapStatus::Missing),
                proficiency_gap: row.get(7)?,
            })
        })?;
        plan.required_skills = skills.collect::<Result<Vec<_>, _>>()?;

        Ok(Some(plan))
    }

    /// All plans for one owner, newest first, each with its full graph.
    pub fn plans_for_owner(&self, owner_id: &str) -> CoreResult<Vec<StudyPlan>> {
        let ids: Vec<String> = {
            let conn = self.conn.lock().unwrap();
            let mut stmt = conn.prepare(
                "SELECT id FROM study_plans WHERE owner_id = ?1 ORDER BY created_at DESC",
            )?;
            let rows = stmt.query_map([owner_id], |row| row.get(0))?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        let mut plans = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(plan) = self.get_plan(&id)? {
                plans.push(plan);
            }
        }
        Ok(plans)
    }

    pub fn plan_owner(&self, plan_id: &str) -> CoreResult<Option<String>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                "SELECT owner_id FROM study_plans WHERE id = ?1",
                [plan_id],
                |row| row.get(0),
            )
            .optional()?)
    }

    // ============================================================
    // SKILLS
    // ============================================================

    /// Get-or-create by case-insensitive name. The UNIQUE NOCASE constraint
    /// makes the insert a no-op when the name already exists, so concurrent
    /// callers converge on one row.
    pub fn get_or_create_skill(&self, name: &str, category: &str) -> CoreResult<Skill> {
        let conn = self.conn.lock().unwrap();
        let candidate = Skill::new(name, category);
        conn.execute(
            "INSERT OR IGNORE INTO skills (id, name, category) VALUES (?1, ?2, ?3)",
            params![candidate.id, candidate.name, candidate.category],
        )?;
        let skill = conn.query_row(
            "SELECT id, name, category FROM skills WHERE name = ?1 COLLATE NOCASE",
            [name],
            |row| {
                Ok(Skill {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    category: row.get(2)?,
                })
            },
        )?;
        Ok(skill)
    }

    pub fn user_proficiency(
        &self,
        owner_id: &str,
        skill_id: &str,
    ) -> CoreResult<Option<Proficiency>> {
        let conn = self.conn.lock().unwrap();
        let value: Option<String> = conn
            .query_row(
                "SELECT proficiency FROM user_skills WHERE owner_id = ?1 AND skill_id = ?2",
                params![owner_id, skill_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.as_deref().and_then(Proficiency::from_str))
    }

    pub fn set_user_proficiency(
        &self,
        owner_id: &str,
        skill_id: &str,
        proficiency: Proficiency,
    ) -> CoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO user_skills (owner_id, skill_id, proficiency) VALUES (?1, ?2, ?3)
             ON CONFLICT(owner_id, skill_id) DO UPDATE SET proficiency = excluded.proficiency",
            params![owner_id, skill_id, proficiency.as_str()],
        )?;
        Ok(())
    }

    pub fn update_required_skill_gap(
        &self,
        plan_id: &str,
        skill_id: &str,
        status: SkillGapStatus,
        gap: i32,
    ) -> CoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE plan_required_skills SET status = ?1, proficiency_gap = ?2
             WHERE plan_id = ?3 AND skill_id = ?4",
            params![status.as_str(), gap, plan_id, skill_id],
        )?;
        Ok(())
    }

    // ============================================================
    // PROGRESS WRITES
    // ============================================================

    pub fn get_checkpoint(&self, checkpoint_id: &str) -> CoreResult<Option<Checkpoint>> {
        let conn = self.conn.lock().unwrap();
        let checkpoint = conn
            .query_row(
                "SELECT id, step_id, description, order_index, estimated_minutes,
                        checkpoint_type, is_mandatory, is_completed, completed_at
                 FROM step_checkpoints WHERE id = ?1",
                [checkpoint_id],
                |row| {
                    let mandatory: i32 = row.get(6)?;
                    let completed_flag: i32 = row.get(7)?;
                    let completed: Option<String> = row.get(8)?;
                    Ok(Checkpoint {
                        id: row.get(0)?,
                        step_id: row.get(1)?,
                        description: row.get(2)?,
                        order_index: row.get(3)?,
                        estimated_minutes: row.get(4)?,
                        checkpoint_type: row.get(5)?,
                        is_mandatory: mandatory != 0,
                        is_completed: completed_flag != 0,
                        completed_at: from_ts(completed),
                    })
                },
            )
            .optional()?;
        Ok(checkpoint)
    }

    pub fn set_checkpoint_completion(
        &self,
        checkpoint_id: &str,
        is_completed: bool,
        completed_at: Option<DateTime<Utc>>,
    ) -> CoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE step_checkpoints SET is_completed = ?1, completed_at = ?2 WHERE id = ?3",
            params![is_completed as i32, to_ts(&completed_at), checkpoint_id],
        )?;
        if changed == 0 {
            return Err(CoreError::NotFound(format!("checkpoint {}", checkpoint_id)));
        }
        Ok(())
    }

    pub fn get_step(&self, step_id: &str) -> CoreResult<Option<Step>> {
        let conn = self.conn.lock().unwrap();
        let step = conn
            .query_row(
                "SELECT id, plan_id, name, description, order_index, estimated_hours, status,
                        progress_percentage, started_at, completed_at
                 FROM plan_steps WHERE id = ?1",
                [step_id],
                |row| {
                    let status: String = row.get(6)?;
                    let started: Option<String> = row.get(8)?;
                    let completed: Option<String> = row.get(9)?;
                    Ok(Step {
                        id: row.get(0)?,
                        plan_id: row.get(1)?,
                        name: row.get(2)?,
                        description: row.get(3)?,
                        order_index: row.get(4)?,
                        estimated_hours: row.get(5)?,
                        status: StepStatus::from_str(&status).unwrap_or(StepStatus::Locked),
                        progress_percentage: row.get(7)?,
                        started_at: from_ts(started),
                        completed_at: from_ts(completed),
                        checkpoints: Vec::new(),
                    })
                },
            )
            .optional()?;
        Ok(step)
    }

    pub fn save_step_progress(&self, step: &Step) -> CoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE plan_steps SET status = ?1, progress_percentage = ?2,
                    started_at = ?3, completed_at = ?4
             WHERE id = ?5",
            params![
                step.status.as_str(),
                step.progress_percentage,
                to_ts(&step.started_at),
                to_ts(&step.completed_at),
                step.id,
            ],
        )?;
        Ok(())
    }

    pub fn step_percentages(&self, plan_id: &str) -> CoreResult<Vec<i32>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT progress_percentage FROM plan_steps WHERE plan_id = ?1
             ORDER BY order_index ASC",
        )?;
        let rows = stmt.query_map([plan_id], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn save_plan_progress(
        &self,
        plan_id: &str,
        progress: i32,
        status: PlanStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> CoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE study_plans SET progress_percentage = ?1, status = ?2, completed_at = ?3
             WHERE id = ?4",
            params![progress, status.as_str(), to_ts(&completed_at), plan_id],
        )?;
        Ok(())
    }

    /// Deactivate every other plan for the owner, then activate the target,
    /// inside one transaction. Other plans lose Active status; the target
    /// becomes Active with startedAt stamped once.
    pub fn activate_plan(&self, owner_id: &str, plan_id: &str) -> CoreResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let owner: Option<String> = tx
            .query_row(
                "SELECT owner_id FROM study_plans WHERE id = ?1",
                [plan_id],
                |row| row.get(0),
            )
            .optional()?;
        match owner {
            None => return Err(CoreError::NotFound(format!("plan {}", plan_id))),
            Some(actual) if actual != owner_id => {
                return Err(CoreError::Unauthorized(format!(
                    "plan {} does not belong to caller",
                    plan_id
                )));
            }
            Some(_) => {}
        }

        tx.execute(
            "UPDATE study_plans SET is_active = 0,
                    status = CASE WHEN status = 'Active' THEN 'Draft' ELSE status END
             WHERE owner_id = ?1 AND id <> ?2",
            params![owner_id, plan_id],
        )?;
        tx.execute(
            "UPDATE study_plans SET is_active = 1, status = 'Active',
                    started_at = COALESCE(started_at, ?1)
             WHERE id = ?2",
            params![Utc::now().to_rfc3339(), plan_id],
        )?;

        tx.commit()?;
        Ok(())
    }

    pub fn archive_plan(&self, owner_id: &str, plan_id: &str) -> CoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE study_plans SET status = 'Archived', is_active = 0
             WHERE id = ?1 AND owner_id = ?2",
            params![plan_id, owner_id],
        )?;
        if changed == 0 {
            return Err(CoreError::NotFound(format!("plan {}", plan_id)));
        }
        Ok(())
    }

    // ============================================================
    // CAREER PLANS
    // ============================================================

    pub fn insert_career_plan(&self, plan: &CareerPlan) -> CoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO career_plans
             (id, owner_id, title, timeline_months, source, document, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                plan.id,
                plan.owner_id,
                plan.title,
                plan.timeline_months,
                plan.source,
                serde_json::to_string(&plan.document).unwrap_or_default(),
                plan.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn career_plans_for_owner(&self, owner_id: &str) -> CoreResult<Vec<CareerPlan>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, owner_id, title, timeline_months, source, document, created_at
             FROM career_plans WHERE owner_id = ?1 ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map([owner_id], |row| {
            let document: String = row.get(5)?;
            let created: String = row.get(6)?;
            Ok(CareerPlan {
                id: row.get(0)?,
                owner_id: row.get(1)?,
                title: row.get(2)?,
                timeline_months: row.get(3)?,
                source: row.get(4)?,
                document: serde_json::from_str(&document).unwrap_or_default(),
                created_at: from_ts(Some(created)).unwrap_or_else(Utc::now),
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // ============================================================
    // TIMELINE
    // ============================================================

    pub fn record_event(&self, event: &TimelineEvent) -> CoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO timeline_events
             (id, owner_id, timestamp, event_type, description, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                event.id,
                event.owner_id,
                event.timestamp.to_rfc3339(),
                event.event_type.as_str(),
                event.description,
                event.metadata.as_ref().map(|m| m.to_string()),
            ],
        )?;
        Ok(())
    }

    pub fn events_for_owner(&self, owner_id: &str) -> CoreResult<Vec<TimelineEvent>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, owner_id, timestamp, event_type, description, metadata
             FROM timeline_events WHERE owner_id = ?1 ORDER BY timestamp ASC",
        )?;
        let rows = stmt.query_map([owner_id], |row| {
            let timestamp: String = row.get(2)?;
            let event_type: String = row.get(3)?;
            let metadata: Option<String> = row.get(5)?;
            Ok(TimelineEvent {
                id: row.get(0)?,
                owner_id: row.get(1)?,
                timestamp: from_ts(Some(timestamp)).unwrap_or_else(Utc::now),
                event_type: TimelineEventType::from_str(&event_type)
                    .unwrap_or(TimelineEventType::StudyPlanGenerated),
                description: row.get(4)?,
                metadata: metadata.and_then(|s| serde_json::from_str(&s).ok()),
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
