use tracing::debug;

use pagepilot_core_types::TabId;

use crate::confidence::{zone, ConfidenceZone};
use crate::errors::SessionError;
use crate::execution::ExecutionState;
use crate::limits::SessionLimits;
use crate::model::{
    ConversationRole, ConversationTurn, MessageType, PageContext, PlannerResponse, Session,
    SessionStatus,
};
use crate::plan_store;

/// Where an accepted plan sent the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanDisposition {
    /// The planner asked questions; the user must answer before replanning.
    AwaitingClarification,
    /// Confidence cleared the proceed band; the plan awaits user approval.
    AwaitingApproval,
    /// Confidence fell short; the host should enter a refine cycle.
    NeedsRefinement,
}

/// Outcome of a refine-cycle request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefineDisposition {
    /// A refine cycle began; replan and apply the new response.
    Refining,
    /// The refine budget is spent; approval was forced. Deterministic
    /// outcome, not a failure.
    IterationLimitReached,
}

/// Result of completing a single execution step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Advanced,
    PlanComplete,
}

/// The per-tab dialogue/session state machine.
///
/// Owns one [`Session`] and exposes every legal transition; illegal
/// requests fail with [`SessionError::Transition`] and mutate nothing.
/// Persistence is the host's concern: the machine hands out its session
/// for checkpointing and rebuilds from a stored one via
/// [`SessionMachine::from_session`].
#[derive(Debug, Clone)]
pub struct SessionMachine {
    session: Session,
    limits: SessionLimits,
}

impl SessionMachine {
    pub fn new(tab_id: TabId, limits: SessionLimits) -> Self {
        let session = Session::new(tab_id, &limits);
        Self { session, limits }
    }

    /// Rebuild the machine around a rehydrated session snapshot.
    pub fn from_session(session: Session, limits: SessionLimits) -> Self {
        Self { session, limits }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn into_session(self) -> Session {
        self.session
    }

    pub fn status(&self) -> SessionStatus {
        self.session.status
    }

    pub fn limits(&self) -> &SessionLimits {
        &self.limits
    }

    /// `idle -> planning`: accept a natural-language task for this tab.
    pub fn submit_task(
        &mut self,
        task: impl Into<String>,
        page: Option<PageContext>,
    ) -> Result<(), SessionError> {
        self.expect("submit_task", &[SessionStatus::Idle])?;
        let task = task.into();
        self.session.current_task = Some(task.clone());
        if page.is_some() {
            self.session.page_context = page;
        }
        self.session.push_turn(ConversationTurn::new(
            ConversationRole::User,
            MessageType::Task,
            task.as_str(),
        ));
        self.set_status(SessionStatus::Planning);
        Ok(())
    }

    /// Accept a planner response while `planning` or `refining` and route
    /// it: clarifying questions beat confidence, the proceed band goes
    /// straight to approval, anything else asks for a refine cycle.
    pub fn apply_plan(
        &mut self,
        response: &PlannerResponse,
    ) -> Result<PlanDisposition, SessionError> {
        self.expect(
            "apply_plan",
            &[SessionStatus::Planning, SessionStatus::Refining],
        )?;
        plan_store::accept_plan(&mut self.session, response, &self.limits)?;

        if !response.understood || !response.clarifying_questions.is_empty() {
            self.session.push_turn(ConversationTurn::new(
                ConversationRole::Assistant,
                MessageType::Clarification,
                response.clarifying_questions.join("\n"),
            ));
            self.set_status(SessionStatus::AwaitingClarification);
            return Ok(PlanDisposition::AwaitingClarification);
        }

        if let Some(summary) = response.summary.as_deref() {
            self.session.push_turn(ConversationTurn::new(
                ConversationRole::Assistant,
                MessageType::Plan,
                summary,
            ));
        }

        // accept_plan already validated the report; zone cannot fail here.
        match zone(&response.confidence, &self.limits)? {
            ConfidenceZone::Proceed => {
                self.set_status(SessionStatus::AwaitingApproval);
                Ok(PlanDisposition::AwaitingApproval)
            }
            ConfidenceZone::Ask | ConfidenceZone::AssumeAnnounce => {
                self.session.touch();
                Ok(PlanDisposition::NeedsRefinement)
            }
        }
    }

    /// Begin one refine cycle, or force approval once the budget is spent.
    ///
    /// Every entry into `refining` increments `refine_iteration` by
    /// exactly one, the first included; the counter never resets except on
    /// a full return to idle.
    pub fn enter_refining(&mut self) -> Result<RefineDisposition, SessionError> {
        self.expect(
            "enter_refining",
            &[SessionStatus::Planning, SessionStatus::Refining],
        )?;
        if self.session.current_plan.is_none() {
            return Err(SessionError::validation(
                "cannot refine before a plan was received",
            ));
        }

        let dialogue = &self.session.dialogue;
        if dialogue.refine_iteration >= dialogue.max_refine_iterations {
            debug!(
                tab = %self.session.tab_id,
                iteration = dialogue.refine_iteration,
                "refine budget spent; forcing approval"
            );
            self.set_status(SessionStatus::AwaitingApproval);
            return Ok(RefineDisposition::IterationLimitReached);
        }

        self.session.dialogue.refine_iteration += 1;
        self.set_status(SessionStatus::Refining);
        Ok(RefineDisposition::Refining)
    }

    /// `awaiting_clarification -> planning`: record the user's answer.
    pub fn answer_clarification(&mut self, answer: impl Into<String>) -> Result<(), SessionError> {
        self.expect("answer_clarification", &[SessionStatus::AwaitingClarification])?;
        self.session.push_turn(ConversationTurn::new(
            ConversationRole::User,
            MessageType::Answer,
            answer.into(),
        ));
        self.set_status(SessionStatus::Planning);
        Ok(())
    }

    /// `awaiting_approval -> executing`: snapshot the execution tracker.
    /// The approved plan is immutable from here on.
    pub fn approve_plan(&mut self) -> Result<(), SessionError> {
        self.expect("approve_plan", &[SessionStatus::AwaitingApproval])?;
        let total_steps = self
            .session
            .current_plan
            .as_ref()
            .map(|plan| plan.steps.len())
            .ok_or_else(|| SessionError::validation("no plan available to approve"))?;
        self.session.execution = Some(ExecutionState::start(total_steps));
        self.set_status(SessionStatus::Executing);
        Ok(())
    }

    /// `awaiting_approval -> idle`: the user declined the plan. Plan and
    /// history stay for audit; the task and refine counter reset.
    pub fn reject_plan(&mut self) -> Result<(), SessionError> {
        self.expect("reject_plan", &[SessionStatus::AwaitingApproval])?;
        self.return_to_idle();
        Ok(())
    }

    /// Record completion of the step at `index`; finishing the last step
    /// moves the session to `completed`.
    pub fn complete_step(
        &mut self,
        index: usize,
        result: impl Into<String>,
    ) -> Result<StepOutcome, SessionError> {
        self.expect("complete_step", &[SessionStatus::Executing])?;
        let execution = self
            .session
            .execution
            .as_mut()
            .ok_or_else(|| SessionError::validation("executing session lost its tracker"))?;
        execution.complete_step(index, result)?;
        if execution.is_complete() {
            self.set_status(SessionStatus::Completed);
            return Ok(StepOutcome::PlanComplete);
        }
        self.session.touch();
        Ok(StepOutcome::Advanced)
    }

    /// `executing -> completed` for plans whose tracker is already
    /// complete (the zero-step path).
    pub fn finish_execution(&mut self) -> Result<(), SessionError> {
        self.expect("finish_execution", &[SessionStatus::Executing])?;
        let complete = self
            .session
            .execution
            .as_ref()
            .map(ExecutionState::is_complete)
            .unwrap_or(false);
        if !complete {
            return Err(SessionError::validation(
                "cannot finish execution with steps outstanding",
            ));
        }
        self.set_status(SessionStatus::Completed);
        Ok(())
    }

    /// `executing -> failed`: an unrecoverable step failure.
    pub fn fail_execution(&mut self, error: impl Into<String>) -> Result<(), SessionError> {
        self.expect("fail_execution", &[SessionStatus::Executing])?;
        self.session.push_turn(ConversationTurn::new(
            ConversationRole::System,
            MessageType::StatusNote,
            error.into(),
        ));
        self.set_status(SessionStatus::Failed);
        Ok(())
    }

    /// `any -> idle`: user-driven cancellation. Discards the execution
    /// tracker and the refine counter; plan and history survive.
    pub fn stop(&mut self) {
        debug!(tab = %self.session.tab_id, from = %self.session.status, "session stopped");
        self.return_to_idle();
    }

    fn return_to_idle(&mut self) {
        self.session.current_task = None;
        self.session.execution = None;
        self.session.dialogue.refine_iteration = 0;
        self.set_status(SessionStatus::Idle);
    }

    fn expect(&self, op: &'static str, allowed: &[SessionStatus]) -> Result<(), SessionError> {
        if allowed.contains(&self.session.status) {
            Ok(())
        } else {
            Err(SessionError::transition(op, self.session.status))
        }
    }

    fn set_status(&mut self, status: SessionStatus) {
        if self.session.status != status {
            debug!(
                tab = %self.session.tab_id,
                from = %self.session.status,
                to = %status,
                "session transition"
            );
        }
        self.session.status = status;
        self.session.touch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pagepilot_core_types::ActionKind;

    use crate::model::{ConfidenceReport, PlanStep};

    fn machine() -> SessionMachine {
        SessionMachine::new(TabId::from("tab-1"), SessionLimits::default())
    }

    fn click_plan(overall: f64) -> PlannerResponse {
        PlannerResponse {
            understood: true,
            confidence: ConfidenceReport::uniform(overall),
            summary: Some("Click the Login button".into()),
            steps: vec![PlanStep::new(1, ActionKind::Click)
                .with_target("el-login")
                .with_description("Login button")],
            assumptions: vec![],
            clarifying_questions: vec![],
            risks: vec![],
        }
    }

    fn clarification() -> PlannerResponse {
        PlannerResponse {
            understood: false,
            confidence: ConfidenceReport::uniform(0.3),
            summary: None,
            steps: vec![],
            assumptions: vec![],
            clarifying_questions: vec!["Which account should be used?".into()],
            risks: vec![],
        }
    }

    #[test]
    fn confident_plan_goes_straight_to_approval() {
        let mut m = machine();
        m.submit_task("Click the Login button", None).unwrap();
        assert_eq!(m.status(), SessionStatus::Planning);

        let disposition = m.apply_plan(&click_plan(0.95)).unwrap();
        assert_eq!(disposition, PlanDisposition::AwaitingApproval);
        assert_eq!(m.status(), SessionStatus::AwaitingApproval);
        assert_eq!(m.session().dialogue.refine_iteration, 0);
    }

    #[test]
    fn single_refine_cycle_keeps_iteration_at_one() {
        let mut m = machine();
        m.submit_task("update the profile bio", None).unwrap();

        assert_eq!(
            m.apply_plan(&click_plan(0.6)).unwrap(),
            PlanDisposition::NeedsRefinement
        );
        assert_eq!(m.enter_refining().unwrap(), RefineDisposition::Refining);
        assert_eq!(m.status(), SessionStatus::Refining);
        assert_eq!(m.session().dialogue.refine_iteration, 1);

        assert_eq!(
            m.apply_plan(&click_plan(0.92)).unwrap(),
            PlanDisposition::AwaitingApproval
        );
        assert_eq!(m.session().dialogue.refine_iteration, 1);
        assert_eq!(m.session().plan_version(), Some(2));
    }

    #[test]
    fn refine_budget_forces_approval_on_the_third_cycle() {
        let mut m = machine();
        m.submit_task("do something vague", None).unwrap();
        m.apply_plan(&click_plan(0.6)).unwrap();

        for expected_iteration in 1..=3u32 {
            assert_eq!(m.enter_refining().unwrap(), RefineDisposition::Refining);
            assert_eq!(m.session().dialogue.refine_iteration, expected_iteration);
            assert_eq!(
                m.apply_plan(&click_plan(0.7)).unwrap(),
                PlanDisposition::NeedsRefinement
            );
        }

        // Fourth request: the budget (3) is spent, approval is forced and
        // the counter does not move.
        assert_eq!(
            m.enter_refining().unwrap(),
            RefineDisposition::IterationLimitReached
        );
        assert_eq!(m.status(), SessionStatus::AwaitingApproval);
        assert_eq!(m.session().dialogue.refine_iteration, 3);
        // One initial plan plus one per refine cycle.
        assert_eq!(m.session().plan_version(), Some(4));
        assert_eq!(m.session().plan_history.len(), 3);
    }

    #[test]
    fn clarification_round_trip() {
        let mut m = machine();
        m.submit_task("log me in", None).unwrap();
        assert_eq!(
            m.apply_plan(&clarification()).unwrap(),
            PlanDisposition::AwaitingClarification
        );
        assert_eq!(m.status(), SessionStatus::AwaitingClarification);

        m.answer_clarification("use the work account").unwrap();
        assert_eq!(m.status(), SessionStatus::Planning);
        assert_eq!(
            m.apply_plan(&click_plan(0.95)).unwrap(),
            PlanDisposition::AwaitingApproval
        );
    }

    #[test]
    fn execution_happy_path() {
        let mut m = machine();
        m.submit_task("Click the Login button", None).unwrap();
        m.apply_plan(&click_plan(0.95)).unwrap();
        m.approve_plan().unwrap();
        assert_eq!(m.status(), SessionStatus::Executing);

        assert_eq!(m.complete_step(0, "clicked").unwrap(), StepOutcome::PlanComplete);
        assert_eq!(m.status(), SessionStatus::Completed);
        let execution = m.session().execution.as_ref().unwrap();
        assert_eq!(execution.total_steps, 1);
        assert!(execution.is_complete());
    }

    #[test]
    fn out_of_order_step_is_rejected() {
        let mut m = machine();
        m.submit_task("fill the form", None).unwrap();
        let mut response = click_plan(0.95);
        response.steps = vec![
            PlanStep::new(1, ActionKind::Click).with_target("el-1"),
            PlanStep::new(2, ActionKind::Type).with_target("el-2").with_value("hello"),
        ];
        m.apply_plan(&response).unwrap();
        m.approve_plan().unwrap();

        let err = m.complete_step(1, "skipped ahead").unwrap_err();
        assert!(matches!(err, SessionError::Ordering { expected: 0, given: 1 }));
        assert!(m.session().execution.as_ref().unwrap().completed_steps.is_empty());
        assert_eq!(m.status(), SessionStatus::Executing);
    }

    #[test]
    fn stop_returns_to_idle_and_keeps_plans() {
        let mut m = machine();
        m.submit_task("Click the Login button", None).unwrap();
        m.apply_plan(&click_plan(0.6)).unwrap();
        m.enter_refining().unwrap();
        m.apply_plan(&click_plan(0.95)).unwrap();
        m.approve_plan().unwrap();

        m.stop();
        let session = m.session();
        assert_eq!(session.status, SessionStatus::Idle);
        assert_eq!(session.dialogue.refine_iteration, 0);
        assert!(session.execution.is_none());
        assert!(session.current_task.is_none());
        assert_eq!(session.plan_version(), Some(2));
        assert_eq!(session.plan_history.len(), 1);

        // A fresh task may start immediately after a stop.
        m.submit_task("try again", None).unwrap();
        assert_eq!(m.status(), SessionStatus::Planning);
    }

    #[test]
    fn illegal_transitions_are_rejected() {
        let mut m = machine();
        assert!(matches!(
            m.approve_plan().unwrap_err(),
            SessionError::Transition { op: "approve_plan", .. }
        ));
        assert!(m.apply_plan(&click_plan(0.9)).is_err());
        assert!(m.complete_step(0, "nope").is_err());

        m.submit_task("task", None).unwrap();
        assert!(m.submit_task("second task", None).is_err());
        assert!(m.answer_clarification("answer").is_err());
    }

    #[test]
    fn rejected_validation_leaves_status_unchanged() {
        let mut m = machine();
        m.submit_task("task", None).unwrap();
        let mut bad = click_plan(0.95);
        bad.confidence.overall = 1.2;
        assert!(m.apply_plan(&bad).is_err());
        assert_eq!(m.status(), SessionStatus::Planning);
        assert!(m.session().current_plan.is_none());
    }

    #[test]
    fn reject_plan_resets_like_stop() {
        let mut m = machine();
        m.submit_task("task", None).unwrap();
        m.apply_plan(&click_plan(0.95)).unwrap();
        m.reject_plan().unwrap();
        assert_eq!(m.status(), SessionStatus::Idle);
        assert_eq!(m.session().plan_version(), Some(1));
        assert!(m.session().current_task.is_none());
    }

    #[test]
    fn zero_step_plan_completes_without_any_steps() {
        use crate::model::{Plan, Session};

        let limits = SessionLimits::default();
        let mut session = Session::new(TabId::from("tab-z"), &limits);
        session.status = SessionStatus::AwaitingApproval;
        session.current_task = Some("nothing to do".into());
        session.current_plan = Some(Plan {
            version: 1,
            summary: Some("no work required".into()),
            steps: vec![],
            assumptions: vec![],
            risks: vec![],
        });

        let mut m = SessionMachine::from_session(session, limits);
        m.approve_plan().unwrap();
        let execution = m.session().execution.as_ref().unwrap();
        assert_eq!(execution.total_steps, 0);
        assert!(execution.is_complete());

        m.finish_execution().unwrap();
        assert_eq!(m.status(), SessionStatus::Completed);
    }
}
