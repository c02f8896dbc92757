//! Mentora Core - Main Entry Point
//!
//! Starts the web API server for the plan-generation core.

use std::path::PathBuf;

use mentora_core::api::run_server;
use mentora_core::plan::llm::{LlmClient, LlmConfig};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .unwrap_or(8080);
    let db_path = std::env::var("MENTORA_DB").ok().map(PathBuf::from);

    // Without AI configuration the study-plan flow reports unavailable and
    // the career-plan flow runs on the fallback generator.
    let llm = match LlmConfig::from_env() {
        Ok(config) => match LlmClient::new(config) {
            Ok(client) => Some(client),
            Err(e) => {
                log::warn!("AI client unavailable: {}", e);
                None
            }
        },
        Err(e) => {
            log::warn!("AI endpoint not configured: {}", e);
            None
        }
    };

    run_server(&host, port, db_path, llm).await
}
