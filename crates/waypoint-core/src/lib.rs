//! Plan generation, enrichment and export for waypoint.

pub mod enrich;
pub mod export;
pub mod goal;
pub mod llm;
pub mod planner;
pub mod service;

pub use goal::{Goal, GoalError};
pub use service::{CreatePlanError, PlanPipeline, create_plan};
