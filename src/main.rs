use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use url::Url;

use pagepilot_audit_center::InMemoryAuditCenter;
use pagepilot_cli::{
    config::load_config, AutoConfirm, ExecutionOutcome, HeuristicPlanner, SessionCenter,
    SimulatedExecutor, TaskOutcome,
};
use pagepilot_core_types::{ActionKind, TabId};
use pagepilot_session_store::{FsSessionStore, InMemorySessionStore, SessionStore};
use risk_gate::DomainPermission;
use session_core::{PageContext, Session};

#[derive(Parser)]
#[command(
    name = "pagepilot",
    version,
    about = "Supervised plan/confirm/execute loop for web-page agents"
)]
struct Cli {
    /// Optional YAML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format for reports.
    #[arg(long, global = true, value_enum, default_value = "text")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Submit a task for a tab and drive it as far as supervision allows.
    Run {
        /// Tab identifier (sessions are isolated per tab).
        #[arg(long, default_value = "1")]
        tab: String,

        /// Natural-language task, e.g. "open https://example.com and click 'Login'".
        #[arg(long)]
        task: String,

        /// Page URL the task runs against; its host becomes the permission domain.
        #[arg(long)]
        url: Option<String>,

        /// Checkpoint directory (overrides config; default keeps sessions in memory).
        #[arg(long)]
        store_dir: Option<PathBuf>,

        /// Approve the plan and any required confirmations without asking.
        #[arg(long)]
        auto_approve: bool,

        /// Grant the task's domain autonomous mode for every action kind, for this run.
        #[arg(long)]
        trust_domain: bool,
    },

    /// Print the stored session checkpoint for a tab.
    Inspect {
        #[arg(long, default_value = "1")]
        tab: String,

        /// Checkpoint directory to read from.
        #[arg(long)]
        store_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Command::Run {
            tab,
            task,
            url,
            store_dir,
            auto_approve,
            trust_domain,
        } => {
            let store = open_store(store_dir.or(config.store_dir.clone()))?;
            run_task(
                store,
                &config,
                tab,
                task,
                url,
                auto_approve,
                trust_domain,
                cli.output,
            )
            .await
        }
        Command::Inspect { tab, store_dir } => {
            let dir = store_dir
                .or(config.store_dir)
                .context("inspect needs --store-dir (or store_dir in config)")?;
            inspect_tab(dir, tab, cli.output).await
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn open_store(dir: Option<PathBuf>) -> Result<Arc<dyn SessionStore>> {
    Ok(match dir {
        Some(dir) => Arc::new(
            FsSessionStore::new(&dir)
                .with_context(|| format!("opening session store at {}", dir.display()))?,
        ),
        None => Arc::new(InMemorySessionStore::new()),
    })
}

#[allow(clippy::too_many_arguments)]
async fn run_task(
    store: Arc<dyn SessionStore>,
    config: &pagepilot_cli::PilotConfig,
    tab: String,
    task: String,
    url: Option<String>,
    auto_approve: bool,
    trust_domain: bool,
    output: OutputFormat,
) -> Result<()> {
    let audit = Arc::new(InMemoryAuditCenter::new(config.audit_capacity));
    let center = SessionCenter::builder(
        store,
        Arc::new(HeuristicPlanner::new()),
        Arc::new(SimulatedExecutor::new()),
    )
    .with_limits(config.limits.clone())
    .with_audit(audit.clone())
    .with_prompt(Arc::new(if auto_approve {
        AutoConfirm::approve_all()
    } else {
        AutoConfirm::deny_all()
    }))
    .build();

    let page = url.as_deref().map(page_context).transpose()?;
    let domain = page.as_ref().and_then(|p| p.domain.clone());
    if trust_domain {
        if let Some(domain) = domain.as_deref() {
            center
                .grant_permission(
                    domain,
                    DomainPermission::autonomous(ActionKind::all().to_vec()),
                )
                .await?;
        } else {
            anyhow::bail!("--trust-domain needs --url to derive a domain");
        }
    }

    let tab = TabId::from(tab);
    let outcome = center.submit_task(&tab, &task, page).await?;

    let mut execution: Option<ExecutionOutcome> = None;
    let mut hint = None;
    match &outcome {
        TaskOutcome::AwaitingClarification { questions } => {
            hint = Some(format!(
                "planner needs answers before acting:\n  - {}",
                questions.join("\n  - ")
            ));
        }
        TaskOutcome::AwaitingApproval { forced } => {
            if auto_approve {
                center.approve_plan(&tab).await?;
                execution = Some(center.start_execution(&tab).await?);
            } else {
                hint = Some(format!(
                    "plan is awaiting approval{}; re-run with --auto-approve to execute",
                    if *forced { " (refine budget spent)" } else { "" }
                ));
            }
        }
        TaskOutcome::Cancelled => {}
    }

    let session = center.get_state(&tab).await?;
    render_report(&session, &outcome, execution.as_ref(), hint.as_deref(), output);
    Ok(())
}

fn page_context(raw: &str) -> Result<PageContext> {
    let parsed = Url::parse(raw).with_context(|| format!("invalid url '{raw}'"))?;
    let mut page = PageContext::default().with_url(parsed.as_str());
    if let Some(host) = parsed.host_str() {
        page = page.with_domain(host);
    }
    Ok(page)
}

fn render_report(
    session: &Session,
    outcome: &TaskOutcome,
    execution: Option<&ExecutionOutcome>,
    hint: Option<&str>,
    output: OutputFormat,
) {
    let completed_steps = session
        .execution
        .as_ref()
        .map(|e| e.completed_steps.len())
        .unwrap_or(0);

    match output {
        OutputFormat::Json => {
            let payload = json!({
                "tab": session.tab_id,
                "status": session.status,
                "task_outcome": outcome,
                "execution_outcome": execution,
                "plan": session.current_plan,
                "plan_history_len": session.plan_history.len(),
                "refine_iteration": session.dialogue.refine_iteration,
                "completed_steps": completed_steps,
            });
            println!("{}", serde_json::to_string_pretty(&payload).expect("report is serializable"));
        }
        OutputFormat::Text => {
            println!("tab {}: {}", session.tab_id, session.status);
            if let Some(plan) = session.current_plan.as_ref() {
                println!(
                    "plan v{}: {}",
                    plan.version,
                    plan.summary.as_deref().unwrap_or("(no summary)")
                );
                for step in &plan.steps {
                    println!(
                        "  {}. {} {}",
                        step.step,
                        step.action,
                        step.target_description
                            .as_deref()
                            .or(step.target_id.as_deref())
                            .or(step.value.as_deref())
                            .unwrap_or("")
                    );
                }
            }
            if completed_steps > 0 {
                println!("completed steps: {completed_steps}");
            }
            if let Some(execution) = execution {
                println!("execution: {execution:?}");
            }
            if let Some(hint) = hint {
                println!("{hint}");
            }
        }
    }
}

async fn inspect_tab(dir: PathBuf, tab: String, output: OutputFormat) -> Result<()> {
    let store = FsSessionStore::new(&dir)
        .with_context(|| format!("opening session store at {}", dir.display()))?;
    let tab = TabId::from(tab);
    match store.load(&tab).await? {
        Some(session) => match output {
            OutputFormat::Json => println!(
                "{}",
                serde_json::to_string_pretty(&session).expect("session is serializable")
            ),
            OutputFormat::Text => {
                println!(
                    "tab {}: {} (plan {}, {} turns, refine iteration {})",
                    session.tab_id,
                    session.status,
                    session
                        .plan_version()
                        .map(|v| format!("v{v}"))
                        .unwrap_or_else(|| "none".into()),
                    session.conversation_history.len(),
                    session.dialogue.refine_iteration,
                );
            }
        },
        None => println!("no checkpoint for tab {tab}"),
    }
    Ok(())
}
