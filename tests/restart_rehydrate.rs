use std::sync::Arc;

use pagepilot_cli::{
    ExecutionOutcome, ScriptedPlanner, SessionCenter, SimulatedExecutor, TaskOutcome,
};
use pagepilot_core_types::{ActionKind, TabId};
use pagepilot_session_store::FsSessionStore;
use session_core::{ConfidenceReport, PlanStep, PlannerResponse, SessionStatus};

fn login_plan() -> PlannerResponse {
    PlannerResponse {
        understood: true,
        confidence: ConfidenceReport::uniform(0.95),
        summary: Some("Click the Login button".into()),
        steps: vec![
            PlanStep::new(1, ActionKind::Click)
                .with_target("el-login")
                .with_description("Login button"),
            PlanStep::new(2, ActionKind::Wait).with_value("navigation settled"),
        ],
        assumptions: vec![],
        clarifying_questions: vec![],
        risks: vec![],
    }
}

fn center_over(dir: &std::path::Path, responses: Vec<PlannerResponse>) -> SessionCenter {
    let store = Arc::new(FsSessionStore::new(dir).expect("open store"));
    SessionCenter::builder(
        store,
        Arc::new(ScriptedPlanner::new(responses)),
        Arc::new(SimulatedExecutor::new()),
    )
    .build()
}

#[tokio::test]
async fn session_survives_host_restarts_at_every_stage() {
    let dir = tempfile::tempdir().expect("tempdir");
    let tab = TabId::from("42");

    // First host: accept the task, reach awaiting_approval, then vanish.
    {
        let center = center_over(dir.path(), vec![login_plan()]);
        let outcome = center
            .submit_task(&tab, "Click the Login button", None)
            .await
            .unwrap();
        assert_eq!(outcome, TaskOutcome::AwaitingApproval { forced: false });
    }

    // Second host: rehydrates the checkpoint, approves and completes the
    // first step, then vanishes mid-plan.
    {
        let center = center_over(dir.path(), vec![]);
        let state = center.get_state(&tab).await.unwrap();
        assert_eq!(state.status, SessionStatus::AwaitingApproval);
        assert_eq!(state.plan_version(), Some(1));
        assert_eq!(state.conversation_history.len(), 2);

        center.approve_plan(&tab).await.unwrap();
        center.complete_step(&tab, 0, "clicked").await.unwrap();
    }

    // Third host: resumes execution exactly where the ledger left off.
    {
        let center = center_over(dir.path(), vec![]);
        let state = center.get_state(&tab).await.unwrap();
        assert_eq!(state.status, SessionStatus::Executing);
        let execution = state.execution.as_ref().unwrap();
        assert_eq!(execution.current_step_index, 1);
        assert_eq!(execution.total_steps, 2);

        assert_eq!(
            center.start_execution(&tab).await.unwrap(),
            ExecutionOutcome::Completed
        );
    }

    // Fourth host: the terminal state is durable.
    {
        let center = center_over(dir.path(), vec![]);
        let state = center.get_state(&tab).await.unwrap();
        assert_eq!(state.status, SessionStatus::Completed);
        assert_eq!(state.execution.as_ref().unwrap().completed_steps.len(), 2);
        // Plan and history were never corrupted across restarts.
        assert_eq!(state.plan_version(), Some(1));
        assert!(state.plan_history.is_empty());
    }
}

#[tokio::test]
async fn stop_on_a_rehydrated_session_resets_cleanly() {
    let dir = tempfile::tempdir().expect("tempdir");
    let tab = TabId::from("7");

    {
        let center = center_over(dir.path(), vec![login_plan()]);
        center
            .submit_task(&tab, "Click the Login button", None)
            .await
            .unwrap();
        center.approve_plan(&tab).await.unwrap();
    }

    let center = center_over(dir.path(), vec![]);
    let session = center.stop(&tab).await.unwrap();
    assert_eq!(session.status, SessionStatus::Idle);
    assert!(session.execution.is_none());
    assert_eq!(session.plan_version(), Some(1));

    // The reset state is itself checkpointed.
    let again = center_over(dir.path(), vec![]);
    assert_eq!(
        again.get_state(&tab).await.unwrap().status,
        SessionStatus::Idle
    );
}
