//! Workdeck - operator tooling for coding-agent work sessions.
//!
//! A thin binary over the library: inspect and dry-run workflows, render a
//! dashboard from a snapshot of raw collections, and inspect or recover a
//! state document.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use workdeck::enrich::{EnrichmentInputs, EnrichmentResult, Section, UnlinkedItem};
use workdeck::state::{StateManager, StateOptions, WriteAheadLog};
use workdeck::workflow::{
    unresolved, validate_workflow, DryRunBridge, WorkflowContext, WorkflowRegistry,
    WorkflowScheduler,
};
use workdeck::{Config, IssueIdentifier};

/// Operator dashboard and workflow orchestration for agent sessions
#[derive(Parser)]
#[command(name = "workdeck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults are used when omitted)
    #[arg(short, long, global = true, env = "WORKDECK_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover, validate and run workflows
    Workflows {
        /// Workflow directories, highest priority first (overrides config)
        #[arg(long = "dir", global = true)]
        dirs: Vec<PathBuf>,

        #[command(subcommand)]
        action: WorkflowAction,
    },

    /// Render the dashboard for a JSON snapshot of raw collections
    Dashboard {
        /// File with `issues`, `sessions`, `prs`, `specs` and `worktrees`
        snapshot: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Inspect or recover a state document
    State {
        #[command(subcommand)]
        action: StateAction,
    },
}

#[derive(Subcommand)]
enum WorkflowAction {
    /// List discovered workflows
    List,

    /// Validate one workflow
    Validate {
        /// Workflow ID
        id: String,
    },

    /// Show the execution waves of one workflow
    Plan {
        /// Workflow ID
        id: String,
    },

    /// Run one workflow
    Run {
        /// Workflow ID
        id: String,

        /// Log spawn requests instead of spawning sessions
        #[arg(long)]
        dry_run: bool,

        /// Issue identifier bound to `{{issueId}}`
        #[arg(long)]
        issue: Option<String>,

        /// Variable assignments (key=value)
        #[arg(long)]
        var: Vec<String>,

        /// Working directory for spawned sessions
        #[arg(long)]
        cwd: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum StateAction {
    /// Print the state document and any pending WAL entries
    Show {
        /// State document (defaults to the configured path)
        path: Option<PathBuf>,
    },

    /// Replay pending WAL entries into the state document
    Recover {
        /// State document (defaults to the configured path)
        path: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry().with(fmt::layer().with_target(false)).with(filter).init();

    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Workflows { dirs, action } => {
            let dirs = if dirs.is_empty() { config.workflows.resolved_dirs() } else { dirs };
            let registry = WorkflowRegistry::from_dirs(dirs);
            match action {
                WorkflowAction::List => cmd_workflows_list(&registry),
                WorkflowAction::Validate { id } => cmd_workflows_validate(&registry, &id)?,
                WorkflowAction::Plan { id } => cmd_workflows_plan(&registry, &id)?,
                WorkflowAction::Run { id, dry_run, issue, var, cwd } => {
                    cmd_workflows_run(&registry, &id, dry_run, issue.as_deref(), &var, cwd)?;
                }
            }
        }
        Commands::Dashboard { snapshot, format } => {
            cmd_dashboard(&snapshot, &format, config.dashboard.show_unlinked)?;
        }
        Commands::State { action } => match action {
            StateAction::Show { path } => cmd_state_show(&state_path(&config, path))?,
            StateAction::Recover { path } => {
                cmd_state_recover(&config, &state_path(&config, path))?;
            }
        },
    }

    Ok(())
}

fn state_path(config: &Config, path: Option<PathBuf>) -> PathBuf {
    path.unwrap_or_else(|| config.state.path.clone())
}

/// List discovered workflows with their source.
fn cmd_workflows_list(registry: &WorkflowRegistry) {
    let found = registry.discover();
    if found.is_empty() {
        println!("No workflows found.");
        println!("Searched: {}", registry.source_names().join(", "));
        return;
    }

    println!("Workflows ({}):\n", found.len());
    for workflow in found {
        let def = &workflow.definition;
        println!("  {:<24} {} ({} steps)", def.id, def.name, def.steps.len());
        if let Some(ref desc) = def.description {
            println!("  {:<24} {}", "", desc);
        }
        println!("  {:<24} from {}", "", workflow.source);
    }
}

fn cmd_workflows_validate(registry: &WorkflowRegistry, id: &str) -> Result<()> {
    let found = registry.find(id).ok_or_else(|| anyhow::anyhow!("Workflow '{id}' not found"))?;
    match validate_workflow(&found.definition) {
        Ok(workflow) => {
            println!(
                "Workflow '{}' is valid: {} steps in {} waves",
                workflow.id(),
                workflow.steps().len(),
                workflow.wave_indices().len()
            );
            Ok(())
        }
        Err(e) => {
            println!("Workflow '{id}' is invalid:");
            for issue in &e.issues {
                println!("  - {issue}");
            }
            anyhow::bail!("{} validation issue(s)", e.issues.len())
        }
    }
}

fn cmd_workflows_plan(registry: &WorkflowRegistry, id: &str) -> Result<()> {
    let found = registry.find(id).ok_or_else(|| anyhow::anyhow!("Workflow '{id}' not found"))?;
    let workflow = validate_workflow(&found.definition)?;

    println!("Workflow: {} ({})", workflow.name(), workflow.id());
    for (n, wave) in workflow.waves().enumerate() {
        let names: Vec<String> = wave.iter().map(|step| step.id.to_string()).collect();
        println!("  Wave {}: {}", n + 1, names.join(", "));
    }
    Ok(())
}

fn parse_vars(vars: &[String]) -> Result<HashMap<String, String>> {
    vars.iter()
        .map(|var| {
            var.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.to_string()))
                .ok_or_else(|| anyhow::anyhow!("Invalid variable '{var}', expected key=value"))
        })
        .collect()
}

fn cmd_workflows_run(
    registry: &WorkflowRegistry,
    id: &str,
    dry_run: bool,
    issue: Option<&str>,
    vars: &[String],
    cwd: Option<PathBuf>,
) -> Result<()> {
    if !dry_run {
        anyhow::bail!("No session pool is attached to this binary; pass --dry-run");
    }

    let cwd = match cwd {
        Some(cwd) => cwd,
        None => std::env::current_dir()?,
    };
    let mut context = WorkflowContext::new(cwd);
    if let Some(issue) = issue {
        context = context.with_issue(IssueIdentifier::parse(issue)?);
    }
    for (key, value) in parse_vars(vars)? {
        context = context.with_var(key, value);
    }

    let found = registry.find(id).ok_or_else(|| anyhow::anyhow!("Workflow '{id}' not found"))?;
    let workflow = validate_workflow(&found.definition)?;
    for step in workflow.steps() {
        let missing = unresolved(&step.prompt, &context);
        if !missing.is_empty() {
            tracing::warn!(
                step = %step.id,
                missing = ?missing,
                "Prompt has unresolved placeholders"
            );
        }
    }

    let bridge = Arc::new(DryRunBridge::new());
    let rt = tokio::runtime::Runtime::new()?;
    let (status, handle) = rt.block_on(async {
        let scheduler = WorkflowScheduler::new(bridge.clone());
        let handle = scheduler.start(workflow, context);
        let status = handle.wait().await;
        (status, handle)
    });

    println!("DRY RUN - Sessions that would be spawned:");
    for (n, request) in bridge.requests().iter().enumerate() {
        println!("  {}. {} [{}]", n + 1, request.name, request.cwd.display());
        if let Some(ref model) = request.model {
            println!("     model: {model}");
        }
        println!("     prompt: {}", request.initial_prompt);
    }
    println!("\nWorkflow {status}");
    if let Some(failure) = handle.failure() {
        println!("Failed at step {}: {}", failure.step, failure.message);
    }
    Ok(())
}

fn print_section(result: &EnrichmentResult, section: Section) {
    let items: Vec<_> = result.section(section).collect();
    println!("{} ({})", section.name().to_uppercase(), items.len());
    for item in items {
        let mut links = Vec::new();
        if !item.sessions.is_empty() {
            links.push(format!("{} session(s)", item.sessions.len()));
        }
        if let Some(ref pr) = item.pr {
            links.push(format!("PR {}", pr.number));
        }
        if let Some(ref spec) = item.spec {
            links.push(format!("spec {}", spec.status));
        }
        let links =
            if links.is_empty() { String::new() } else { format!("  [{}]", links.join(", ")) };
        println!(
            "  {:<8} {:<10} {}{}",
            item.badge,
            item.issue.identifier.as_str(),
            item.issue.title,
            links
        );
    }
    println!();
}

fn cmd_dashboard(snapshot: &Path, format: &str, show_unlinked: bool) -> Result<()> {
    let content = std::fs::read_to_string(snapshot)
        .with_context(|| format!("Failed to read {}", snapshot.display()))?;
    let inputs: EnrichmentInputs =
        serde_json::from_str(&content).context("Snapshot is not a valid collection file")?;
    let result = inputs.enrich();

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    for section in Section::ALL {
        print_section(&result, section);
    }

    if show_unlinked && !result.unlinked.is_empty() {
        println!("UNLINKED ({})", result.unlinked.len());
        for item in &result.unlinked {
            match item {
                UnlinkedItem::Session { session, badge } => {
                    println!("  {:<8} session {} ({})", badge, session.id, session.name);
                }
                UnlinkedItem::PullRequest { pr, badge } => {
                    println!("  {:<8} PR {} {}", badge, pr.number, pr.title);
                }
            }
        }
    }
    Ok(())
}

fn cmd_state_show(path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let document: serde_json::Value = serde_json::from_str(&content)?;
    println!("{}", serde_json::to_string_pretty(&document)?);

    let rt = tokio::runtime::Runtime::new()?;
    let pending = rt.block_on(WriteAheadLog::for_state(path).read_entries())?;
    if !pending.is_empty() {
        println!("\n{} pending WAL entr(ies); run `workdeck state recover`", pending.len());
    }
    Ok(())
}

fn cmd_state_recover(config: &Config, path: &Path) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let pending = WriteAheadLog::for_state(path).read_entries().await?;
        let manager = StateManager::open(
            path,
            serde_json::Value::Object(serde_json::Map::new()),
            StateOptions::from_config(&config.state),
        )
        .await?;
        println!("Replayed {} WAL entr(ies) into {}", pending.len(), path.display());
        println!("{}", serde_json::to_string_pretty(&manager.get())?);
        manager.close().await;
        Ok::<(), anyhow::Error>(())
    })
}
