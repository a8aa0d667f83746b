use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pagepilot_core_types::{ActionKind, TabId};

use crate::execution::ExecutionState;
use crate::limits::SessionLimits;

/// Role of a conversation turn exchanged with the agent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConversationRole {
    /// Human operator issuing requests and answers.
    User,
    /// Agent responding with plans or clarifying questions.
    Assistant,
    /// Host-generated notes (e.g. execution failures).
    System,
}

/// What a conversation turn carries, beyond its free text.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Task,
    Plan,
    Clarification,
    Answer,
    StatusNote,
}

/// A single turn in the per-tab dialogue. History is append-only; turns are
/// never reordered or pruned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: ConversationRole,
    pub content: String,
    pub message_type: MessageType,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(role: ConversationRole, message_type: MessageType, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            message_type,
            timestamp: Utc::now(),
        }
    }
}

/// Planner self-assessment for the current plan. Each field lives in
/// `[0, 1]`; anything else is rejected at the validation boundary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ConfidenceReport {
    pub overall: f64,
    pub intent_clarity: f64,
    pub target_match: f64,
    pub value_confidence: f64,
}

impl ConfidenceReport {
    /// A report with the same value in every field; handy for callers that
    /// only track a single score.
    pub fn uniform(value: f64) -> Self {
        Self {
            overall: value,
            intent_clarity: value,
            target_match: value,
            value_confidence: value,
        }
    }

    pub(crate) fn fields(&self) -> [(&'static str, f64); 4] {
        [
            ("overall", self.overall),
            ("intent_clarity", self.intent_clarity),
            ("target_match", self.target_match),
            ("value_confidence", self.value_confidence),
        ]
    }
}

/// One atomic action inside a plan. `step` is 1-based and follows plan
/// order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanStep {
    pub step: usize,
    pub action: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_description: Option<String>,
}

impl PlanStep {
    pub fn new(step: usize, action: ActionKind) -> Self {
        Self {
            step,
            action,
            target_id: None,
            value: None,
            target_description: None,
        }
    }

    pub fn with_target(mut self, target_id: impl Into<String>) -> Self {
        self.target_id = Some(target_id.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.target_description = Some(description.into());
        self
    }
}

/// A versioned, ordered list of proposed atomic actions.
///
/// Plans are immutable once execution starts and are retained (current +
/// history) for the life of the session for audit purposes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    pub version: u32,
    /// Nullable only when the planner did not understand the task.
    pub summary: Option<String>,
    pub steps: Vec<PlanStep>,
    #[serde(default)]
    pub assumptions: Vec<String>,
    #[serde(default)]
    pub risks: Vec<String>,
}

/// Raw planner output, as received from the reasoning backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerResponse {
    pub understood: bool,
    pub confidence: ConfidenceReport,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub steps: Vec<PlanStep>,
    #[serde(default)]
    pub assumptions: Vec<String>,
    #[serde(default)]
    pub clarifying_questions: Vec<String>,
    #[serde(default)]
    pub risks: Vec<String>,
}

/// Where the task is taking place; captured once at submission.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageContext {
    pub url: Option<String>,
    pub title: Option<String>,
    /// Registrable domain used for permission lookups.
    pub domain: Option<String>,
}

impl PageContext {
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }
}

/// Refinement bookkeeping. `refine_iteration` only resets on a full return
/// to idle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueState {
    pub refine_iteration: u32,
    pub max_refine_iterations: u32,
}

/// Lifecycle status of a per-tab session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Planning,
    Refining,
    AwaitingClarification,
    AwaitingApproval,
    Executing,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Failed)
    }

    pub fn name(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Planning => "planning",
            SessionStatus::Refining => "refining",
            SessionStatus::AwaitingClarification => "awaiting_clarification",
            SessionStatus::AwaitingApproval => "awaiting_approval",
            SessionStatus::Executing => "executing",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The full per-tab session state; also the checkpoint payload written to
/// the session store after every mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub tab_id: TabId,
    pub status: SessionStatus,
    pub current_task: Option<String>,
    #[serde(default)]
    pub page_context: Option<PageContext>,
    pub conversation_history: Vec<ConversationTurn>,
    pub current_plan: Option<Plan>,
    pub plan_history: Vec<Plan>,
    pub confidence: Option<ConfidenceReport>,
    pub dialogue: DialogueState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionState>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(tab_id: TabId, limits: &SessionLimits) -> Self {
        let now = Utc::now();
        Self {
            tab_id,
            status: SessionStatus::Idle,
            current_task: None,
            page_context: None,
            conversation_history: Vec::new(),
            current_plan: None,
            plan_history: Vec::new(),
            confidence: None,
            dialogue: DialogueState {
                refine_iteration: 0,
                max_refine_iterations: limits.max_refine_iterations,
            },
            execution: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn push_turn(&mut self, turn: ConversationTurn) {
        self.conversation_history.push(turn);
    }

    pub fn plan_version(&self) -> Option<u32> {
        self.current_plan.as_ref().map(|plan| plan.version)
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
