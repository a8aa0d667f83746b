//! PagePilot host library.
//!
//! Wires the session kernel to its external collaborators: the planner,
//! the action executor, the permission and session stores and the audit
//! ring. The [`center::SessionCenter`] is the operation surface a
//! transport (CLI, extension bridge, test harness) talks to.

pub mod center;
pub mod config;
pub mod errors;
pub mod executor;
pub mod planner;
pub mod prompt;

pub use center::{ExecutionOutcome, SessionCenter, SessionCenterBuilder, TaskOutcome};
pub use config::PilotConfig;
pub use errors::{CenterError, ExternalStage};
pub use executor::{ActionExecutor, SimulatedExecutor, StepResult};
pub use planner::{HeuristicPlanner, PlanRequest, Planner, ScriptedPlanner};
pub use prompt::{AutoConfirm, ConfirmationPrompt};
