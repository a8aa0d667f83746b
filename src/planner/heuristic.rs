use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use pagepilot_core_types::{ActionKind, PilotError};
use session_core::{ConfidenceReport, PlanStep, PlannerResponse};

use super::{PlanRequest, Planner};

static URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://[^\s'\x22]+").expect("url pattern"));
static QUOTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"['\x22]([^'\x22]{1,80})['\x22]"#).expect("quote pattern"));

/// Rule-based planner for demo runs and offline tests.
///
/// Sniffs URLs, action verbs and quoted element text out of the task and
/// turns them into plan steps. Confidence reflects how much of the task
/// the rules actually recognized; anything unrecognized comes back as a
/// clarifying question instead of a guess. No reasoning backend involved.
#[derive(Debug, Clone, Default)]
pub struct HeuristicPlanner;

impl HeuristicPlanner {
    pub fn new() -> Self {
        Self
    }

    fn quoted_target(task: &str) -> Option<String> {
        QUOTED
            .captures(task)
            .map(|caps| caps[1].trim().to_string())
            .filter(|t| !t.is_empty())
    }

    /// Synthetic locator for element-capture-less runs; the external
    /// annotator replaces these with real element ids in production.
    fn text_locator(text: &str) -> String {
        format!("text:{}", text.to_lowercase())
    }
}

#[async_trait]
impl Planner for HeuristicPlanner {
    async fn plan(&self, request: PlanRequest) -> Result<PlannerResponse, PilotError> {
        let task = request.task.as_str();
        let lower = task.to_ascii_lowercase();
        let mut steps: Vec<PlanStep> = Vec::new();
        let mut assumptions = Vec::new();
        let mut score: f64 = 0.5;

        if let Some(url) = URL.find(task) {
            steps.push(
                PlanStep::new(steps.len() + 1, ActionKind::Navigate)
                    .with_value(url.as_str().trim_end_matches(['.', ',']))
                    .with_description("open the requested page"),
            );
            score += 0.25;
        }

        let target = Self::quoted_target(task);
        if lower.contains("click") || lower.contains("press") || lower.contains("tap") {
            let text = target.clone().unwrap_or_else(|| "the named element".into());
            let mut step = PlanStep::new(steps.len() + 1, ActionKind::Click)
                .with_target(Self::text_locator(&text))
                .with_description(text);
            if target.is_none() {
                assumptions.push("clicking the element the task most likely refers to".into());
                step.target_description = Some("best-matching clickable element".into());
            } else {
                score += 0.2;
            }
            steps.push(step);
        } else if lower.contains("type") || lower.contains("enter") || lower.contains("fill") {
            let text = target.clone().unwrap_or_default();
            steps.push(
                PlanStep::new(steps.len() + 1, ActionKind::Type)
                    .with_target(Self::text_locator("input"))
                    .with_value(text)
                    .with_description("the input field named by the task"),
            );
            if target.is_some() {
                score += 0.2;
            } else {
                assumptions.push("typing into the first matching input".into());
            }
        } else if lower.contains("scroll") {
            steps.push(
                PlanStep::new(steps.len() + 1, ActionKind::Scroll)
                    .with_description("scroll the page"),
            );
            score += 0.2;
        } else if lower.contains("wait") {
            steps
                .push(PlanStep::new(steps.len() + 1, ActionKind::Wait).with_value("page settled"));
            score += 0.2;
        }

        if steps.is_empty() {
            return Ok(PlannerResponse {
                understood: false,
                confidence: ConfidenceReport::uniform(0.2),
                summary: None,
                steps: vec![],
                assumptions: vec![],
                clarifying_questions: vec![format!(
                    "I could not map \"{task}\" to page actions. \
                     Which element should I interact with, and how?"
                )],
                risks: vec![],
            });
        }

        let confidence = ConfidenceReport {
            overall: score.min(0.95),
            intent_clarity: score.min(0.95),
            target_match: if target.is_some() { 0.9 } else { 0.6 },
            value_confidence: 0.9,
        };

        Ok(PlannerResponse {
            understood: true,
            confidence,
            summary: Some(format!("{} step(s) derived from: {task}", steps.len())),
            steps,
            assumptions,
            clarifying_questions: vec![],
            risks: vec![],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(task: &str) -> PlanRequest {
        PlanRequest {
            task: task.to_string(),
            page: None,
            history: vec![],
        }
    }

    #[tokio::test]
    async fn url_and_quoted_click_plan_proceeds() {
        let planner = HeuristicPlanner::new();
        let response = planner
            .plan(request("open https://example.com and click 'Login'"))
            .await
            .unwrap();

        assert!(response.understood);
        assert!(response.confidence.overall >= 0.9);
        assert_eq!(response.steps.len(), 2);
        assert_eq!(response.steps[0].action, ActionKind::Navigate);
        assert_eq!(response.steps[1].action, ActionKind::Click);
        assert_eq!(response.steps[1].target_id.as_deref(), Some("text:login"));
    }

    #[tokio::test]
    async fn unquoted_click_is_lower_confidence() {
        let planner = HeuristicPlanner::new();
        let response = planner.plan(request("click the login button")).await.unwrap();
        assert!(response.understood);
        assert!(response.confidence.overall < 0.9);
        assert!(!response.assumptions.is_empty());
    }

    #[tokio::test]
    async fn unrecognized_task_asks_instead_of_guessing() {
        let planner = HeuristicPlanner::new();
        let response = planner.plan(request("make it nicer")).await.unwrap();
        assert!(!response.understood);
        assert!(!response.clarifying_questions.is_empty());
        assert!(response.steps.is_empty());
    }
}
