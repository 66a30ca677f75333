//! Agora - command-line front end.
//!
//! Each command loads the session file, runs one operation against it and
//! writes it back.

use agora::cli::init::{self, InitConfig, InitResult};
use agora::cli::output::Output;
use agora::cli::{Cli, Commands};
use agora::llm::{LLMClient, Provider};
use agora::render::DocumentFormat;
use agora::research::{load_session, save_session, AgentSpec, ResearchSession, RoundOutcome};
use agora::tools::{NoSearch, SearchTool, WebSearch};
use agora::types::{AgentId, OperationReport};
use agora::utils::toml_config::{AgoraConfig, AgoraConfigManager, LoggingConfig};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    if let Err(e) = run(cli, &output).await {
        output.error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

fn init_tracing(logging: &LoggingConfig, verbose: bool) -> Result<()> {
    let default_filter = if verbose {
        "agora=debug".to_string()
    } else {
        format!("agora={}", logging.level)
    };
    let filter = if verbose {
        tracing_subscriber::EnvFilter::new(default_filter)
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter))
    };

    let registry = tracing_subscriber::registry().with(filter);
    let result = if logging.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
    result.map_err(|e| anyhow::anyhow!("failed to initialize tracing subscriber: {e}"))
}

fn build_llm(config: &AgoraConfig) -> Result<Arc<dyn LLMClient>> {
    let provider = match config.inference.provider.as_str() {
        "ollama" => Provider::Ollama {
            base_url: config.inference.base_url.clone(),
        },
        other => anyhow::bail!("unsupported inference provider '{}'", other),
    };
    let client = provider
        .create_client()
        .with_context(|| format!("cannot create {} client", provider.name()))?;
    Ok(Arc::from(client))
}

fn build_search(config: &AgoraConfig) -> Arc<dyn SearchTool> {
    match config.retrieval.provider.as_str() {
        "none" => Arc::new(NoSearch),
        _ => Arc::new(WebSearch::new(config.retrieval.max_results)),
    }
}

async fn run(cli: Cli, output: &Output) -> Result<()> {
    if let Commands::Init {
        path,
        force,
        model,
        offline,
    } = cli.command
    {
        init_tracing(&LoggingConfig::default(), cli.verbose)?;
        let result = init::run(
            InitConfig {
                path,
                force,
                model,
                web_search: !offline,
            },
            output,
        );
        return match result {
            InitResult::Success | InitResult::AlreadyExists => Ok(()),
            InitResult::Error(e) => Err(anyhow::anyhow!(e)),
        };
    }

    let manager = AgoraConfigManager::new(&cli.config)
        .with_context(|| format!("cannot load {}", cli.config.display()))?;
    let config = manager.config();
    init_tracing(&config.logging, cli.verbose)?;

    let llm = build_llm(&config)?;
    let search = build_search(&config);
    let settings = config.session_settings();
    let session = if cli.session.exists() {
        load_session(&cli.session, llm, search, settings)
            .await
            .with_context(|| format!("cannot load session {}", cli.session.display()))?
    } else {
        tracing::info!(path = %cli.session.display(), "Starting a new session");
        ResearchSession::new(llm, search, settings)
    };

    if execute(cli.command, &session, &config, output).await? {
        save_session(&session, &cli.session)
            .await
            .with_context(|| format!("cannot save session {}", cli.session.display()))?;
    }
    Ok(())
}

/// Run one command. Returns whether the session changed.
async fn execute(
    command: Commands,
    session: &ResearchSession,
    config: &AgoraConfig,
    output: &Output,
) -> Result<bool> {
    match command {
        Commands::Init { .. } => Ok(false),

        Commands::AddAgent {
            name,
            specialty,
            model,
            id,
        } => {
            let mut spec = AgentSpec::new(name, specialty);
            spec.model = model;
            spec.id = id.map(AgentId::new);
            let id = session.add_agent(spec)?;
            output.success(&format!("Added agent {}", id));
            Ok(true)
        }

        Commands::Team => {
            let ids = session.add_team(config.default_team())?;
            output.success(&format!("Added {} agents to the roster", ids.len()));
            for id in ids {
                output.list_item(id.as_str());
            }
            Ok(true)
        }

        Commands::Topic { topic, reset } => {
            if reset {
                if let Some(cycle) = session.reset_topic(&topic)? {
                    output.info(&format!(
                        "Archived cycle \"{}\" with {} entries",
                        cycle.topic,
                        cycle.artifact.len()
                    ));
                }
            } else {
                session.set_topic(&topic)?;
            }
            output.success(&format!("Research topic: {}", topic.trim()));
            Ok(true)
        }

        Commands::Brainstorm => {
            let report = session.brainstorm().await?;
            print_round(output, &report);
            Ok(true)
        }

        Commands::Research => {
            let report = session.research().await?;
            print_round(output, &report);
            Ok(true)
        }

        Commands::Discuss { sub_topic } => {
            let report = session.discuss(&sub_topic).await?;
            print_round(output, &report);
            Ok(true)
        }

        Commands::Snapshot => {
            let report = session.collect_snapshot().await?;
            let verdict = &report.value;
            output.header(&format!("Satisfaction after round {}", verdict.snapshot.after_round));
            for (id, rating) in &verdict.snapshot.ratings {
                output.rating(id.as_str(), *rating);
            }
            output.agent_warnings(&report.warnings);
            let mean = verdict
                .mean
                .map(|m| format!("{:.2}", m))
                .unwrap_or_else(|| "n/a".to_string());
            output.kv("mean", &mean);
            output.kv("threshold", &format!("{:.1}", verdict.threshold));
            if verdict.converged {
                output.success("The team is satisfied. Render the paper with `agora render`.");
            } else {
                output.info("Not converged yet. Run more rounds or `agora improve --all`.");
            }
            Ok(true)
        }

        Commands::Improve { agent, all } => {
            if all || agent.is_none() {
                let report = session.improve_all().await?;
                for outcome in report.value.iter().filter_map(|a| a.result.as_ref().ok()) {
                    output.success(&format!(
                        "{} improved (revision {})",
                        outcome.agent_id, outcome.improvements
                    ));
                }
                output.agent_warnings(&report.warnings);
            } else if let Some(agent) = agent {
                let report = session.improve_agent(&AgentId::new(agent)).await?;
                let outcome = report.value;
                output.success(&format!(
                    "{} improved (revision {})",
                    outcome.agent_id, outcome.improvements
                ));
                if let Some(delta) = outcome.delta {
                    output.kv("length change", &format!("{:+}", delta.length_change));
                    output.kv("lexical overlap", &format!("{:.2}", delta.lexical_overlap));
                }
            }
            Ok(true)
        }

        Commands::Rollback { agent } => {
            let id = AgentId::new(agent);
            session.rollback_agent(&id).await?;
            output.success(&format!("{} restored to its previous configuration", id));
            Ok(true)
        }

        Commands::Status => {
            print_status(session, output);
            Ok(false)
        }

        Commands::Render {
            format,
            output: path,
        } => {
            let format: DocumentFormat = format.into();
            let document = session.render(format.renderer().as_ref())?;
            match path {
                Some(path) => {
                    tokio::fs::write(&path, document)
                        .await
                        .with_context(|| format!("cannot write {}", path.display()))?;
                    output.created("document", &path.display().to_string());
                }
                None => println!("{}", document),
            }
            Ok(false)
        }

        Commands::Export { state } => {
            let json = if state {
                session.export_state().to_json()?
            } else {
                serde_json::to_string_pretty(&session.export_artifact())?
            };
            println!("{}", json);
            Ok(false)
        }
    }
}

fn print_round(output: &Output, report: &OperationReport<RoundOutcome>) {
    let outcome = &report.value;
    output.header(&format!("Round {}: {}", outcome.round, outcome.variant));
    output.kv("entries", &outcome.entries_appended().to_string());
    output.kv("contributed", &outcome.contributed.len().to_string());
    output.agent_warnings(&report.warnings);
    if outcome.cancelled {
        output.warning(&format!("Cancelled before {} agents", outcome.not_reached.len()));
    }
}

fn print_status(session: &ResearchSession, output: &Output) {
    output.header("Session");
    output.kv("id", &session.id().to_string());
    output.kv("topic", session.topic().as_deref().unwrap_or("(not set)"));
    output.kv("rounds", &session.round_counter().to_string());
    let artifact = session.artifact();
    output.kv(
        "artifact",
        &format!(
            "{} ideas, {} evidence, {} discussion",
            artifact.ideas().count(),
            artifact.evidence().count(),
            artifact.discussion().count()
        ),
    );
    output.kv("archived cycles", &session.cycles().len().to_string());
    if let Some(snapshot) = session.latest_snapshot() {
        let mean = snapshot
            .mean()
            .map(|m| format!("{:.2}", m))
            .unwrap_or_else(|| "n/a".to_string());
        output.kv(
            "last snapshot",
            &format!(
                "after round {}, mean {}, converged: {}",
                snapshot.after_round,
                mean,
                session.is_converged(&snapshot)
            ),
        );
    }

    output.header("Roster");
    let summaries = session.agent_summaries();
    if summaries.is_empty() {
        output.hint("No agents yet. Add the default team with `agora team`.");
        return;
    }
    output.table_header(&["Agent", "Model", "Utterances", "Notes", "Ratings", "Revisions"]);
    for summary in summaries {
        output.table_row(&[
            summary.id.as_str(),
            &summary.model,
            &summary.utterances.to_string(),
            &summary.research_notes.to_string(),
            &summary.ratings.to_string(),
            &summary.improvements.to_string(),
        ]);
    }
}
