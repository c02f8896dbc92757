//! Web API Module
//!
//! Thin JSON boundary over the plan-generation core. Handlers translate
//! payloads into core calls and map the error taxonomy onto HTTP statuses;
//! all domain behavior lives in the `plan` modules.

use std::path::PathBuf;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::error::CoreError;
use crate::plan::assembler;
use crate::plan::context;
use crate::plan::fallback;
use crate::plan::llm::{self, LlmClient};
use crate::plan::progress;
use crate::plan::store::Store;
use crate::plan::timeline::{TimelineEvent, TimelineEventType};
use crate::plan::types::{CareerPlan, PlanStatus};

// ============================================================
// APPLICATION STATE
// ============================================================

pub struct AppState {
    pub store: Store,
    /// None when no AI endpoint is configured; the study-plan flow then
    /// reports unavailable and the career-plan flow uses the fallback.
    pub llm: Option<LlmClient>,
}

impl AppState {
    pub fn new(db_path: Option<PathBuf>, llm: Option<LlmClient>) -> Result<Self, CoreError> {
        Ok(Self { store: Store::new(db_path)?, llm })
    }
}

// ============================================================
// API REQUEST/RESPONSE TYPES
// ============================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateStudyPlanRequest {
    pub owner_id: String,
    pub assessment_attempt_id: String,
    pub preferred_completion_date: Option<String>,
    pub weekly_hours_available: Option<i32>,
    pub focus_areas: Option<Vec<String>>,
    pub additional_instructions: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateCareerPlanRequest {
    pub owner_id: String,
    pub assessment_attempt_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProgressRequest {
    pub owner_id: String,
    pub plan_id: String,
    pub step_id: Option<String>,
    pub checkpoint_id: Option<String>,
    pub is_completed: Option<bool>,
    pub progress_percentage: Option<i32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanActionRequest {
    pub owner_id: String,
    pub plan_id: String,
}

/// Standard response envelope
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }
}

impl ApiResponse<()> {
    pub fn error(message: &str) -> Self {
        Self { success: false, data: None, error: Some(message.to_string()) }
    }
}

fn respond_error(err: &CoreError) -> HttpResponse {
    let body = ApiResponse::error(&err.to_string());
    match err {
        CoreError::Unauthorized(_) => HttpResponse::Unauthorized().json(body),
        CoreError::NotCompletable(_)
        | CoreError::InvalidInput(_)
        | CoreError::ContextCorrupted(_) => HttpResponse::BadRequest().json(body),
        CoreError::NotFound(_) => HttpResponse::NotFound().json(body),
        CoreError::Conflict(_) => HttpResponse::Conflict().json(body),
        CoreError::AiUnavailable(_) | CoreError::AiResponseEmpty => {
            HttpResponse::ServiceUnavailable().json(body)
        }
        CoreError::AiResponseMalformed(_) => HttpResponse::BadGateway().json(body),
        CoreError::Database(_) => HttpResponse::InternalServerError().json(body),
    }
}

// ============================================================
// API HANDLERS
// ============================================================

async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": "Mentora Core API",
        "version": "0.1.0"
    }))
}

/// Load an attempt, check ownership, and build its assessment context.
fn context_for_request(
    store: &Store,
    owner_id: &str,
    attempt_id: &str,
) -> Result<context::AssessmentContext, CoreError> {
    let attempt = store
        .get_attempt(attempt_id)?
        .ok_or_else(|| CoreError::NotFound(format!("assessment {}", attempt_id)))?;
    if attempt.owner_id != owner_id {
        return Err(CoreError::Unauthorized(format!(
            "assessment {} does not belong to caller",
            attempt_id
        )));
    }
    let responses = store.get_attempt_responses(attempt_id)?;
    Ok(context::build_context(&attempt, &responses))
}

/// Generate a study plan from a completed assessment. AI-backed; failures
/// surface to the caller rather than degrading silently.
async fn generate_study_plan(
    data: web::Data<Arc<AppState>>,
    req: web::Json<GenerateStudyPlanRequest>,
) -> impl Responder {
    let mut context =
        match context_for_request(&data.store, &req.owner_id, &req.assessment_attempt_id) {
            Ok(c) => c,
            Err(e) => return respond_error(&e),
        };

    // Request-level overrides layer on top of the stored assessment.
    if let Some(hours) = req.weekly_hours_available {
        context.weekly_hours_available = hours.max(0);
    }
    if let Some(areas) = &req.focus_areas {
        for area in areas {
            let area = area.trim();
            if !area.is_empty() {
                context.interested_areas.push(area.to_string());
            }
        }
    }
    if let Some(date) = &req.preferred_completion_date {
        context
            .additional_context
            .insert("Preferred Completion Date".to_string(), date.clone());
    }

    let Some(client) = &data.llm else {
        return respond_error(&CoreError::AiUnavailable(
            "no AI endpoint configured".to_string(),
        ));
    };

    let generation =
        match llm::generate_study_plan(client, &context, req.additional_instructions.as_deref())
            .await
        {
            Ok(g) => g,
            Err(e) => return respond_error(&e),
        };

    let summary = match assembler::assemble_and_persist(
        &data.store,
        &req.owner_id,
        &req.assessment_attempt_id,
        &context,
        &generation.response,
        generation.warnings,
    ) {
        Ok(s) => s,
        Err(e) => return respond_error(&e),
    };

    let _ = data.store.record_event(
        &TimelineEvent::new(
            &req.owner_id,
            TimelineEventType::StudyPlanGenerated,
            &format!(
                "Generated study plan \"{}\" ({} steps)",
                summary.title, summary.total_steps
            ),
        )
        .with_metadata(json!({
            "planId": summary.plan_id,
            "warnings": summary.warnings.len(),
        })),
    );
    info!("study plan {} generated for {}", summary.plan_id, req.owner_id);

    HttpResponse::Ok().json(ApiResponse::success(summary))
}

/// Generate a career plan. AI failures degrade to the deterministic
/// fallback, so this endpoint succeeds whenever the assessment is readable.
async fn generate_career_plan(
    data: web::Data<Arc<AppState>>,
    req: web::Json<GenerateCareerPlanRequest>,
) -> impl Responder {
    let context =
        match context_for_request(&data.store, &req.owner_id, &req.assessment_attempt_id) {
            Ok(c) => c,
            Err(e) => return respond_error(&e),
        };

    let (document, source) = match &data.llm {
        Some(client) => llm::generate_career_plan(client, &context).await,
        None => (fallback::generate_career_plan(&context), "fallback"),
    };

    let plan = CareerPlan {
        id: Uuid::new_v4().to_string(),
        owner_id: req.owner_id.clone(),
        title: document.title.clone(),
        timeline_months: document.timeline_months,
        source: source.to_string(),
        document,
        created_at: Utc::now(),
    };
    if let Err(e) = data.store.insert_career_plan(&plan) {
        return respond_error(&e);
    }

    if source == "fallback" {
        let _ = data.store.record_event(&TimelineEvent::new(
            &req.owner_id,
            TimelineEventType::FallbackEngaged,
            "AI unavailable; career plan generated deterministically",
        ));
    }
    let _ = data.store.record_event(
        &TimelineEvent::new(
            &req.owner_id,
            TimelineEventType::CareerPlanGenerated,
            &format!("Generated career plan \"{}\"", plan.title),
        )
        .with_metadata(json!({"careerPlanId": plan.id, "source": source})),
    );

    HttpResponse::Ok().json(ApiResponse::success(plan))
}

/// Update checkpoint and/or step progress, then recalculate the plan total.
async fn update_progress(
    data: web::Data<Arc<AppState>>,
    req: web::Json<UpdateProgressRequest>,
) -> impl Responder {
    let mut touched = false;

    if let (Some(checkpoint_id), Some(is_completed)) = (&req.checkpoint_id, req.is_completed) {
        if let Err(e) =
            progress::update_checkpoint(&data.store, &req.owner_id, checkpoint_id, is_completed)
        {
            return respond_error(&e);
        }
        let _ = data.store.record_event(&TimelineEvent::new(
            &req.owner_id,
            TimelineEventType::CheckpointUpdated,
            &format!("Checkpoint {} marked {}", checkpoint_id, is_completed),
        ));
        touched = true;
    }

    if let (Some(step_id), Some(percentage)) = (&req.step_id, req.progress_percentage) {
        if let Err(e) =
            progress::update_step_progress(&data.store, &req.owner_id, step_id, percentage)
        {
            return respond_error(&e);
        }
        let _ = data.store.record_event(&TimelineEvent::new(
            &req.owner_id,
            TimelineEventType::StepProgressUpdated,
            &format!("Step {} progress set to {}%", step_id, percentage),
        ));
        touched = true;
    }

    if !touched {
        return respond_error(&CoreError::InvalidInput(
            "nothing to update: provide checkpointId+isCompleted or stepId+progressPercentage"
                .to_string(),
        ));
    }

    match progress::recalculate_overall_progress(&data.store, &req.owner_id, &req.plan_id) {
        Ok((progress_percentage, status)) => {
            if status == PlanStatus::Completed {
                let _ = data.store.record_event(&TimelineEvent::new(
                    &req.owner_id,
                    TimelineEventType::PlanCompleted,
                    &format!("Plan {} completed", req.plan_id),
                ));
            }
            HttpResponse::Ok().json(ApiResponse::success(json!({
                "planId": req.plan_id,
                "progressPercentage": progress_percentage,
                "status": status,
            })))
        }
        Err(e) => respond_error(&e),
    }
}

/// Recompute the plan's skill gaps against the owner's current portfolio.
async fn analyze_skill_gaps(
    data: web::Data<Arc<AppState>>,
    path: web::Path<(String, String)>,
) -> impl Responder {
    let (owner_id, plan_id) = path.into_inner();
    match assembler::perform_skill_gap_analysis(&data.store, &owner_id, &plan_id) {
        Ok(analysis) => HttpResponse::Ok().json(ApiResponse::success(analysis)),
        Err(e) => respond_error(&e),
    }
}

async fn activate_plan(
    data: web::Data<Arc<AppState>>,
    req: web::Json<PlanActionRequest>,
) -> impl Responder {
    match progress::activate_study_plan(&data.store, &req.owner_id, &req.plan_id) {
        Ok(()) => {
            let _ = data.store.record_event(&TimelineEvent::new(
                &req.owner_id,
                TimelineEventType::PlanActivated,
                &format!("Plan {} activated", req.plan_id),
            ));
            HttpResponse::Ok().json(ApiResponse::success(json!({"planId": req.plan_id})))
        }
        Err(e) => respond_error(&e),
    }
}

async fn archive_plan(
    data: web::Data<Arc<AppState>>,
    req: web::Json<PlanActionRequest>,
) -> impl Responder {
    match progress::archive_study_plan(&data.store, &req.owner_id, &req.plan_id) {
        Ok(()) => {
            let _ = data.store.record_event(&TimelineEvent::new(
                &req.owner_id,
                TimelineEventType::PlanArchived,
                &format!("Plan {} archived", req.plan_id),
            ));
            HttpResponse::Ok().json(ApiResponse::success(json!({"planId": req.plan_id})))
        }
        Err(e) => respond_error(&e),
    }
}

async fn get_plan(
    data: web::Data<Arc<AppState>>,
    path: web::Path<(String, String)>,
) -> impl Responder {
    let (owner_id, plan_id) = path.into_inner();
    match data.store.get_plan(&plan_id) {
        Ok(Some(plan)) if plan.owner_id == owner_id => {
            HttpResponse::Ok().json(ApiResponse::success(plan))
        }
        Ok(Some(_)) => respond_error(&CoreError::Unauthorized(format!(
            "plan {} does not belong to caller",
            plan_id
        ))),
        Ok(None) => respond_error(&CoreError::NotFound(format!("plan {}", plan_id))),
        Err(e) => respond_error(&e),
    }
}

async fn list_plans(data: web::Data<Arc<AppState>>, path: web::Path<String>) -> impl Responder {
    match data.store.plans_for_owner(&path.into_inner()) {
        Ok(plans) => HttpResponse::Ok().json(ApiResponse::success(plans)),
        Err(e) => respond_error(&e),
    }
}

async fn list_career_plans(
    data: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> impl Responder {
    match data.store.career_plans_for_owner(&path.into_inner()) {
        Ok(plans) => HttpResponse::Ok().json(ApiResponse::success(plans)),
        Err(e) => respond_error(&e),
    }
}

async fn get_timeline(data: web::Data<Arc<AppState>>, path: web::Path<String>) -> impl Responder {
    match data.store.events_for_owner(&path.into_inner()) {
        Ok(events) => HttpResponse::Ok().json(ApiResponse::success(events)),
        Err(e) => respond_error(&e),
    }
}

// ============================================================
// SERVER CONFIGURATION
// ============================================================

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/api/study-plans/generate", web::post().to(generate_study_plan))
        .route("/api/study-plans/progress", web::post().to(update_progress))
        .route("/api/study-plans/activate", web::post().to(activate_plan))
        .route("/api/study-plans/archive", web::post().to(archive_plan))
        .route("/api/study-plans/{owner_id}", web::get().to(list_plans))
        .route("/api/study-plans/{owner_id}/{plan_id}", web::get().to(get_plan))
        .route(
            "/api/study-plans/{owner_id}/{plan_id}/gaps",
            web::get().to(analyze_skill_gaps),
        )
        .route("/api/career-plans/generate", web::post().to(generate_career_plan))
        .route("/api/career-plans/{owner_id}", web::get().to(list_career_plans))
        .route("/api/timeline/{owner_id}", web::get().to(get_timeline));
}

/// Configure and run the API server.
pub async fn run_server(
    host: &str,
    port: u16,
    db_path: Option<PathBuf>,
    llm: Option<LlmClient>,
) -> std::io::Result<()> {
    let state = Arc::new(
        AppState::new(db_path, llm)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?,
    );

    info!("Mentora Core API starting at http://{}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header();

        App::new()
            .wrap(cors)
            .app_data(web::Data::new(state.clone()))
            .configure(configure_routes)
    })
    .bind((host, port))?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::types::{AssessmentAttempt, AssessmentResponse, StudyLevel};
    use actix_web::{http::StatusCode, test};

    fn seeded_state(llm: Option<LlmClient>) -> Arc<AppState> {
        let store = Store::in_memory().unwrap();
        let attempt = AssessmentAttempt {
            id: "attempt-1".to_string(),
            owner_id: "user-1".to_string(),
            major: "Computer Science".to_string(),
            study_level: StudyLevel::Junior,
            status: "Completed".to_string(),
            completed_at: None,
        };
        let responses = vec![
            AssessmentResponse {
                question: "How many years until graduation?".to_string(),
                category: "Timeline".to_string(),
                answer: "2 years".to_string(),
                is_skipped: false,
                order_index: 0,
            },
            AssessmentResponse {
                question: "Which skills do you have?".to_string(),
                category: "Skills".to_string(),
                answer: "Python,SQL".to_string(),
                is_skipped: false,
                order_index: 1,
            },
        ];
        store.insert_attempt(&attempt, &responses).unwrap();
        Arc::new(AppState { store, llm })
    }

    #[actix_rt::test]
    async fn health_endpoint_reports_healthy() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(seeded_state(None)))
                .configure(configure_routes),
        )
        .await;
        let resp =
            test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
        assert!(resp.status().is_success());
    }

    #[actix_rt::test]
    async fn study_plan_generation_without_ai_is_unavailable() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(seeded_state(None)))
                .configure(configure_routes),
        )
        .await;
        let req = test::TestRequest::post()
            .uri("/api/study-plans/generate")
            .set_json(json!({
                "ownerId": "user-1",
                "assessmentAttemptId": "attempt-1"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[actix_rt::test]
    async fn foreign_assessment_is_unauthorized() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(seeded_state(None)))
                .configure(configure_routes),
        )
        .await;
        let req = test::TestRequest::post()
            .uri("/api/career-plans/generate")
            .set_json(json!({
                "ownerId": "intruder",
                "assessmentAttemptId": "attempt-1"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_rt::test]
    async fn career_plan_without_ai_persists_fallback() {
        let state = seeded_state(None);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .configure(configure_routes),
        )
        .await;
        let req = test::TestRequest::post()
            .uri("/api/career-plans/generate")
            .set_json(json!({
                "ownerId": "user-1",
                "assessmentAttemptId": "attempt-1"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let plans = state.store.career_plans_for_owner("user-1").unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].source, "fallback");
        assert_eq!(plans[0].document.steps.len(), 4);

        let events = state.store.events_for_owner("user-1").unwrap();
        assert!(events
            .iter()
            .any(|e| e.event_type == TimelineEventType::FallbackEngaged));
    }
}
