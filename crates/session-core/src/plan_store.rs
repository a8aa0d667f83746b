use crate::confidence::validate_report;
use crate::errors::SessionError;
use crate::limits::SessionLimits;
use crate::model::{Plan, PlannerResponse, Session};

/// Validate a planner response against the plan acceptance rules.
///
/// Runs every check before any mutation so a rejected response leaves the
/// session untouched.
pub fn validate_response(
    response: &PlannerResponse,
    limits: &SessionLimits,
) -> Result<(), SessionError> {
    validate_report(&response.confidence)?;

    if response.steps.len() > limits.max_plan_steps {
        return Err(SessionError::validation(format!(
            "plan has {} steps, limit is {}",
            response.steps.len(),
            limits.max_plan_steps
        )));
    }

    if response.understood {
        if response.steps.is_empty() {
            return Err(SessionError::validation(
                "understood plan must carry at least one step",
            ));
        }
        if response
            .summary
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .is_none()
        {
            return Err(SessionError::validation(
                "understood plan must carry a summary",
            ));
        }
    } else if response.clarifying_questions.is_empty() {
        return Err(SessionError::validation(
            "planner reported not-understood without a clarifying question",
        ));
    }

    for step in &response.steps {
        if step.action.requires_target()
            && step
                .target_id
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .is_none()
        {
            return Err(SessionError::validation(format!(
                "step {} ({}) requires a non-empty target_id",
                step.step, step.action
            )));
        }
    }

    Ok(())
}

/// Accept a validated planner response: assign the next plan version, move
/// the previous plan (if any) to the end of the history and replace the
/// session confidence. The operation is atomic; validation failures reject
/// before any mutation.
pub fn accept_plan(
    session: &mut Session,
    response: &PlannerResponse,
    limits: &SessionLimits,
) -> Result<(), SessionError> {
    validate_response(response, limits)?;

    let version = session.plan_version().unwrap_or(0) + 1;
    let plan = Plan {
        version,
        summary: response.summary.clone(),
        steps: response.steps.clone(),
        assumptions: response.assumptions.clone(),
        risks: response.risks.clone(),
    };

    if let Some(previous) = session.current_plan.replace(plan) {
        session.plan_history.push(previous);
    }
    session.confidence = Some(response.confidence);
    tracing::debug!(
        tab = %session.tab_id,
        version,
        steps = response.steps.len(),
        "plan accepted"
    );
    Ok(())
}
