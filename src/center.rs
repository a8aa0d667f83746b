use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::select;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use pagepilot_audit_center::{AuditCenter, AuditEvent, DispatchStatus, NoopAuditCenter};
use pagepilot_core_types::TabId;
use pagepilot_session_store::SessionStore;
use risk_gate::{
    ActionDescriptor, ConfirmReason, ConfirmationGate, DomainPermission, InMemoryPermissionStore,
    PermissionStore,
};
use session_core::{
    PageContext, PlanDisposition, PlanStep, RefineDisposition, Session, SessionLimits,
    SessionMachine, SessionStatus, StepOutcome,
};

use crate::errors::{CenterError, ExternalStage};
use crate::executor::ActionExecutor;
use crate::planner::{PlanRequest, Planner};
use crate::prompt::{AutoConfirm, ConfirmationPrompt};

/// How a driven planning pass ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TaskOutcome {
    /// A plan awaits user approval. `forced` marks the refine budget
    /// running out rather than confidence clearing the bar.
    AwaitingApproval { forced: bool },
    /// The planner needs answers before it can produce a usable plan.
    AwaitingClarification { questions: Vec<String> },
    /// The user stopped the session while planning was in flight.
    Cancelled,
}

/// How an execution walk ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Completed,
    /// A step failed unrecoverably; the session is `failed`.
    Failed { step_index: usize, error: String },
    /// The user declined a required confirmation; the session returned to
    /// `idle`.
    Aborted {
        step_index: usize,
        reason: ConfirmReason,
    },
    /// The user stopped the session mid-execution.
    Cancelled,
}

struct TabHandle {
    machine: AsyncMutex<SessionMachine>,
    cancel: Mutex<CancellationToken>,
}

impl TabHandle {
    fn new(machine: SessionMachine) -> Self {
        Self {
            machine: AsyncMutex::new(machine),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// Fresh token for a new driven operation.
    fn arm(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.cancel.lock() = token.clone();
        token
    }

    fn cancel_in_flight(&self) {
        self.cancel.lock().cancel();
    }
}

/// Orchestration host for per-tab sessions.
///
/// One handle per tab serializes mutations (single writer per session);
/// different tabs proceed fully independently. Every mutating operation
/// checkpoints the session to the store before acknowledging, and a tab
/// without an in-memory handle is rehydrated from the store before any
/// operation is accepted for it.
pub struct SessionCenter {
    store: Arc<dyn SessionStore>,
    planner: Arc<dyn Planner>,
    executor: Arc<dyn ActionExecutor>,
    permissions: Arc<dyn PermissionStore>,
    prompt: Arc<dyn ConfirmationPrompt>,
    audit: Arc<dyn AuditCenter>,
    gate: ConfirmationGate,
    limits: SessionLimits,
    handles: DashMap<TabId, Arc<TabHandle>>,
}

/// Builder wiring the center's collaborators; store, planner and executor
/// are required, everything else has a sensible stand-in.
pub struct SessionCenterBuilder {
    store: Arc<dyn SessionStore>,
    planner: Arc<dyn Planner>,
    executor: Arc<dyn ActionExecutor>,
    permissions: Arc<dyn PermissionStore>,
    prompt: Arc<dyn ConfirmationPrompt>,
    audit: Arc<dyn AuditCenter>,
    gate: ConfirmationGate,
    limits: SessionLimits,
}

impl SessionCenterBuilder {
    pub fn new(
        store: Arc<dyn SessionStore>,
        planner: Arc<dyn Planner>,
        executor: Arc<dyn ActionExecutor>,
    ) -> Self {
        Self {
            store,
            planner,
            executor,
            permissions: Arc::new(InMemoryPermissionStore::new()),
            prompt: Arc::new(AutoConfirm::approve_all()),
            audit: NoopAuditCenter::new(),
            gate: ConfirmationGate::default(),
            limits: SessionLimits::default(),
        }
    }

    pub fn with_permissions(mut self, permissions: Arc<dyn PermissionStore>) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_prompt(mut self, prompt: Arc<dyn ConfirmationPrompt>) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditCenter>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_gate(mut self, gate: ConfirmationGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_limits(mut self, limits: SessionLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn build(self) -> SessionCenter {
        SessionCenter {
            store: self.store,
            planner: self.planner,
            executor: self.executor,
            permissions: self.permissions,
            prompt: self.prompt,
            audit: self.audit,
            gate: self.gate,
            limits: self.limits,
            handles: DashMap::new(),
        }
    }
}

impl SessionCenter {
    pub fn builder(
        store: Arc<dyn SessionStore>,
        planner: Arc<dyn Planner>,
        executor: Arc<dyn ActionExecutor>,
    ) -> SessionCenterBuilder {
        SessionCenterBuilder::new(store, planner, executor)
    }

    /// Accept a task for `tab` and drive planning until the session waits
    /// on the user (approval or clarification) or the run is cancelled.
    pub async fn submit_task(
        &self,
        tab: &TabId,
        task: &str,
        page: Option<PageContext>,
    ) -> Result<TaskOutcome, CenterError> {
        let handle = self.handle(tab).await?;
        let token = handle.arm();
        let mut machine = handle.machine.lock().await;

        let before = machine.status();
        machine.submit_task(task, page)?;
        self.note_transition(tab, before, machine.status()).await;
        self.checkpoint(tab, &machine).await?;

        self.drive_planning(tab, &mut machine, &token).await
    }

    /// Record the user's clarification answer and drive planning again.
    pub async fn answer_clarification(
        &self,
        tab: &TabId,
        answer: &str,
    ) -> Result<TaskOutcome, CenterError> {
        let handle = self.handle(tab).await?;
        let token = handle.arm();
        let mut machine = handle.machine.lock().await;

        let before = machine.status();
        machine.answer_clarification(answer)?;
        self.note_transition(tab, before, machine.status()).await;
        self.checkpoint(tab, &machine).await?;

        self.drive_planning(tab, &mut machine, &token).await
    }

    /// Transport-level plan submission for hosts that call the planner
    /// themselves.
    pub async fn set_plan_with_confidence(
        &self,
        tab: &TabId,
        response: &session_core::PlannerResponse,
    ) -> Result<PlanDisposition, CenterError> {
        let handle = self.handle(tab).await?;
        let mut machine = handle.machine.lock().await;

        let before = machine.status();
        let disposition = machine.apply_plan(response)?;
        self.note_plan(tab, &machine).await;
        self.note_transition(tab, before, machine.status()).await;
        self.checkpoint(tab, &machine).await?;
        Ok(disposition)
    }

    /// Transport-level refine-cycle request.
    pub async fn enter_refining(&self, tab: &TabId) -> Result<RefineDisposition, CenterError> {
        let handle = self.handle(tab).await?;
        let mut machine = handle.machine.lock().await;

        let before = machine.status();
        let disposition = machine.enter_refining()?;
        self.note_transition(tab, before, machine.status()).await;
        self.checkpoint(tab, &machine).await?;
        Ok(disposition)
    }

    pub async fn approve_plan(&self, tab: &TabId) -> Result<(), CenterError> {
        let handle = self.handle(tab).await?;
        let mut machine = handle.machine.lock().await;

        let before = machine.status();
        machine.approve_plan()?;
        self.note_transition(tab, before, machine.status()).await;
        self.checkpoint(tab, &machine).await
    }

    pub async fn reject_plan(&self, tab: &TabId) -> Result<(), CenterError> {
        let handle = self.handle(tab).await?;
        let mut machine = handle.machine.lock().await;

        let before = machine.status();
        machine.reject_plan()?;
        self.note_transition(tab, before, machine.status()).await;
        self.checkpoint(tab, &machine).await
    }

    /// Walk the approved plan step by step: permission lookup, risk-gated
    /// confirmation, dispatch, completion — checkpointing after each step.
    pub async fn start_execution(&self, tab: &TabId) -> Result<ExecutionOutcome, CenterError> {
        let handle = self.handle(tab).await?;
        let token = handle.arm();
        let mut machine = handle.machine.lock().await;

        if machine.status() != SessionStatus::Executing {
            return Err(CenterError::Session(session_core::SessionError::transition(
                "start_execution",
                machine.status(),
            )));
        }

        let domain = machine
            .session()
            .page_context
            .as_ref()
            .and_then(|page| page.domain.clone());

        loop {
            let execution = machine.session().execution.clone().ok_or_else(|| {
                session_core::SessionError::validation("executing session lost its tracker")
            })?;

            if execution.is_complete() {
                // Zero-step plans land here straight away.
                let before = machine.status();
                machine.finish_execution()?;
                self.note_transition(tab, before, machine.status()).await;
                self.checkpoint(tab, &machine).await?;
                return Ok(ExecutionOutcome::Completed);
            }

            let index = execution.current_step_index;
            let step = machine
                .session()
                .current_plan
                .as_ref()
                .and_then(|plan| plan.steps.get(index))
                .cloned()
                .ok_or_else(|| {
                    session_core::SessionError::validation(format!(
                        "approved plan has no step at index {index}"
                    ))
                })?;

            let decision = self.gate_step(&machine, &step, domain.as_deref()).await?;
            if decision.required && !self.prompt.confirm(&step, &decision).await {
                self.audit
                    .append(AuditEvent::dispatch(
                        tab.clone(),
                        index,
                        step.action.name(),
                        DispatchStatus::ConfirmationDeclined,
                        Some(decision.reason.as_str().to_string()),
                    ))
                    .await;
                let before = machine.status();
                machine.stop();
                self.note_transition(tab, before, machine.status()).await;
                self.checkpoint(tab, &machine).await?;
                info!(%tab, step = index, reason = %decision.reason, "execution aborted by user");
                return Ok(ExecutionOutcome::Aborted {
                    step_index: index,
                    reason: decision.reason,
                });
            }

            let dispatched = select! {
                _ = token.cancelled() => {
                    let before = machine.status();
                    machine.stop();
                    self.note_transition(tab, before, machine.status()).await;
                    self.checkpoint(tab, &machine).await?;
                    return Ok(ExecutionOutcome::Cancelled);
                }
                result = self.executor.execute(&step) => result,
            };

            // Transport failures leave the session executing so the caller
            // may retry the external call; step-level failures are final.
            let result = dispatched.map_err(|err| {
                CenterError::external(
                    ExternalStage::Executor,
                    err,
                    Some(machine.status()),
                    machine.session().plan_version(),
                )
            })?;

            if !result.success {
                self.audit
                    .append(AuditEvent::dispatch(
                        tab.clone(),
                        index,
                        step.action.name(),
                        DispatchStatus::Failure,
                        Some(result.result.clone()),
                    ))
                    .await;
                let before = machine.status();
                machine.fail_execution(result.result.clone())?;
                self.note_transition(tab, before, machine.status()).await;
                self.checkpoint(tab, &machine).await?;
                return Ok(ExecutionOutcome::Failed {
                    step_index: index,
                    error: result.result,
                });
            }

            self.audit
                .append(AuditEvent::dispatch(
                    tab.clone(),
                    index,
                    step.action.name(),
                    DispatchStatus::Success,
                    None,
                ))
                .await;
            let before = machine.status();
            let outcome = machine.complete_step(index, result.result)?;
            self.note_transition(tab, before, machine.status()).await;
            self.checkpoint(tab, &machine).await?;

            if outcome == StepOutcome::PlanComplete {
                return Ok(ExecutionOutcome::Completed);
            }
        }
    }

    /// Transport-level step completion for hosts that dispatch actions
    /// themselves. Must be issued exactly once per step, in order.
    pub async fn complete_step(
        &self,
        tab: &TabId,
        index: usize,
        result: &str,
    ) -> Result<StepOutcome, CenterError> {
        let handle = self.handle(tab).await?;
        let mut machine = handle.machine.lock().await;

        let before = machine.status();
        let outcome = machine.complete_step(index, result)?;
        self.note_transition(tab, before, machine.status()).await;
        self.checkpoint(tab, &machine).await?;
        Ok(outcome)
    }

    /// Cancel whatever is in flight for `tab` and return the session to
    /// idle. Plan and history survive; the execution tracker and refine
    /// counter do not.
    pub async fn stop(&self, tab: &TabId) -> Result<Session, CenterError> {
        let handle = self.handle(tab).await?;
        handle.cancel_in_flight();
        let mut machine = handle.machine.lock().await;

        let before = machine.status();
        machine.stop();
        self.note_transition(tab, before, machine.status()).await;
        self.checkpoint(tab, &machine).await?;
        Ok(machine.session().clone())
    }

    /// Read-only snapshot of the tab's session (rehydrating if needed).
    pub async fn get_state(&self, tab: &TabId) -> Result<Session, CenterError> {
        let handle = self.handle(tab).await?;
        let machine = handle.machine.lock().await;
        Ok(machine.session().clone())
    }

    /// Passthrough to the domain permission store.
    pub async fn grant_permission(
        &self,
        domain: &str,
        record: DomainPermission,
    ) -> Result<(), CenterError> {
        self.permissions
            .set_permission(domain, record)
            .await
            .map_err(|err| CenterError::external(ExternalStage::Permissions, err, None, None))
    }

    async fn drive_planning(
        &self,
        tab: &TabId,
        machine: &mut SessionMachine,
        token: &CancellationToken,
    ) -> Result<TaskOutcome, CenterError> {
        loop {
            let request = PlanRequest {
                task: machine
                    .session()
                    .current_task
                    .clone()
                    .unwrap_or_default(),
                page: machine.session().page_context.clone(),
                history: machine.session().conversation_history.clone(),
            };

            let response = select! {
                _ = token.cancelled() => {
                    let before = machine.status();
                    machine.stop();
                    self.note_transition(tab, before, machine.status()).await;
                    self.checkpoint(tab, machine).await?;
                    return Ok(TaskOutcome::Cancelled);
                }
                result = self.planner.plan(request) => result.map_err(|err| {
                    CenterError::external(
                        ExternalStage::Planner,
                        err,
                        Some(machine.status()),
                        machine.session().plan_version(),
                    )
                })?,
            };

            let before = machine.status();
            let disposition = machine.apply_plan(&response)?;
            self.note_plan(tab, machine).await;
            self.note_transition(tab, before, machine.status()).await;
            self.checkpoint(tab, machine).await?;

            match disposition {
                PlanDisposition::AwaitingClarification => {
                    return Ok(TaskOutcome::AwaitingClarification {
                        questions: response.clarifying_questions,
                    });
                }
                PlanDisposition::AwaitingApproval => {
                    return Ok(TaskOutcome::AwaitingApproval { forced: false });
                }
                PlanDisposition::NeedsRefinement => {
                    let before = machine.status();
                    let refine = machine.enter_refining()?;
                    self.note_transition(tab, before, machine.status()).await;
                    self.checkpoint(tab, machine).await?;
                    match refine {
                        RefineDisposition::IterationLimitReached => {
                            info!(%tab, "refine budget spent; plan goes to approval as-is");
                            return Ok(TaskOutcome::AwaitingApproval { forced: true });
                        }
                        RefineDisposition::Refining => continue,
                    }
                }
            }
        }
    }

    async fn gate_step(
        &self,
        machine: &SessionMachine,
        step: &PlanStep,
        domain: Option<&str>,
    ) -> Result<risk_gate::ConfirmationDecision, CenterError> {
        let mut descriptor = ActionDescriptor::new(step.action);
        descriptor.target_text = step
            .target_description
            .clone()
            .or_else(|| step.target_id.clone());
        descriptor.value = step.value.clone();
        descriptor.domain = domain.map(str::to_string);

        let permission = match domain {
            Some(domain) => self.permissions.get_permission(domain).await.map_err(|err| {
                CenterError::external(
                    ExternalStage::Permissions,
                    err,
                    Some(machine.status()),
                    machine.session().plan_version(),
                )
            })?,
            None => None,
        };
        Ok(self.gate.decide(&descriptor, permission.as_ref()))
    }

    /// Rehydrate-or-create the handle for `tab`. The store is consulted
    /// before any operation is accepted for a tab this process has not
    /// seen yet.
    async fn handle(&self, tab: &TabId) -> Result<Arc<TabHandle>, CenterError> {
        if let Some(handle) = self.handles.get(tab) {
            return Ok(handle.clone());
        }

        let stored = self
            .store
            .load(tab)
            .await
            .map_err(|err| CenterError::external(ExternalStage::Store, err, None, None))?;
        let machine = match stored {
            Some(session) => {
                info!(%tab, status = %session.status, "rehydrated session from store");
                SessionMachine::from_session(session, self.limits.clone())
            }
            None => SessionMachine::new(tab.clone(), self.limits.clone()),
        };

        let handle = self
            .handles
            .entry(tab.clone())
            .or_insert_with(|| Arc::new(TabHandle::new(machine)))
            .clone();
        Ok(handle)
    }

    /// Write-then-acknowledge: a mutation only counts once its checkpoint
    /// landed. On failure the in-memory handle is dropped so the next
    /// operation rehydrates from the last acknowledged snapshot.
    async fn checkpoint(&self, tab: &TabId, machine: &SessionMachine) -> Result<(), CenterError> {
        if let Err(err) = self.store.save(machine.session()).await {
            warn!(%tab, %err, "checkpoint failed; evicting in-memory session");
            self.handles.remove(tab);
            return Err(CenterError::external(
                ExternalStage::Store,
                err,
                Some(machine.status()),
                machine.session().plan_version(),
            ));
        }
        Ok(())
    }

    async fn note_transition(&self, tab: &TabId, before: SessionStatus, after: SessionStatus) {
        if before != after {
            self.audit
                .append(AuditEvent::transition(tab.clone(), before.name(), after.name()))
                .await;
        }
    }

    async fn note_plan(&self, tab: &TabId, machine: &SessionMachine) {
        if let Some(plan) = machine.session().current_plan.as_ref() {
            self.audit
                .append(AuditEvent::plan_accepted(
                    tab.clone(),
                    plan.version,
                    plan.steps.len(),
                ))
                .await;
        }
    }
}
