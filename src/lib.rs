//! Mentora Plan-Generation Core
//!
//! Backend core for the Mentora student productivity application:
//! - assessment context building and prompt templating
//! - AI-backed study-plan and career-plan generation with a deterministic
//!   fallback path
//! - relational plan-graph assembly with skill-gap analysis
//! - progress recalculation and plan activation

pub mod api;
pub mod error;
pub mod plan;

pub use error::{CoreError, CoreResult};
