use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use hawkeye_relay::{
    config::{Config, HawkeyeConfig},
    hawkeye::{
        api::format_timestamp, find_project, HttpInferenceApi, InferenceApi, InferenceClient,
        PromptOutcome, SessionQuery,
    },
    receiver::AlertRelay,
    server::Server,
};

#[derive(Parser)]
#[command(name = "hawkeye-relay")]
#[command(about = "Relay Alertmanager firing alerts to Hawkeye for investigation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the webhook server (default)
    Serve,
    /// List projects visible to the configured user
    Projects,
    /// List sessions in a project
    Sessions {
        /// Project name, defaults to HAWKEYE_PROJECT
        #[arg(short, long)]
        project: Option<String>,
    },
    /// Show the prompt cycles of a session
    Inspect {
        session: String,
        /// Project name, defaults to HAWKEYE_PROJECT
        #[arg(short, long)]
        project: Option<String>,
    },
    /// Open a fresh session and send one prompt
    Ask {
        prompt: String,
        /// Project name, defaults to HAWKEYE_PROJECT
        #[arg(short, long)]
        project: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::load().context("failed to load configuration")?;
    info!("Loaded configuration: {:?}", config);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Projects => list_projects(&config.hawkeye).await,
        Commands::Sessions { project } => {
            list_sessions(&with_project(config.hawkeye, project)).await
        }
        Commands::Inspect { session, project } => {
            inspect_session(&with_project(config.hawkeye, project), &session).await
        }
        Commands::Ask { prompt, project } => ask(&with_project(config.hawkeye, project), &prompt).await,
    }
}

fn with_project(mut config: HawkeyeConfig, project: Option<String>) -> HawkeyeConfig {
    if let Some(project) = project {
        config.project = project;
    }
    config
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let server = Server::new(AlertRelay::from_config(config.hawkeye));

    info!("Starting server on {}", config.server.addr);
    server.start(&config.server.addr).await?;
    Ok(())
}

/// Logs in and resolves the configured project, for the one-shot commands.
async fn login(config: &HawkeyeConfig) -> anyhow::Result<(HttpInferenceApi, String, String)> {
    let api = HttpInferenceApi::new(&config.url, config.delivery)?;
    let token = api
        .login(&config.user, &config.password)
        .await
        .context("authentication failed")?;
    let projects = api.list_projects(&token).await?;
    let project_uuid = find_project(&projects, &config.project)?;
    Ok((api, token, project_uuid))
}

async fn list_projects(config: &HawkeyeConfig) -> anyhow::Result<()> {
    let api = HttpInferenceApi::new(&config.url, config.delivery)?;
    let token = api
        .login(&config.user, &config.password)
        .await
        .context("authentication failed")?;
    let projects = api.list_projects(&token).await?;

    println!("Projects:");
    println!("=========");
    if projects.is_empty() {
        println!("No projects found.");
        return Ok(());
    }

    let show = |value: Option<String>| value.unwrap_or_else(|| "N/A".to_string());
    for (index, project) in projects.iter().enumerate() {
        println!(
            "{}. {} ({})",
            index + 1,
            project.name.as_deref().unwrap_or("N/A"),
            project.uuid.as_deref().unwrap_or("N/A")
        );
        println!("   Description: {}", show(project.description.clone()));
        println!(
            "   Created: {}",
            show(project.field("create_time").map(|t| format_timestamp(&t)))
        );
        println!(
            "   Updated: {}",
            show(project.field("update_time").map(|t| format_timestamp(&t)))
        );
        println!("   State: {}", show(project.field("project_state")));
        println!("   Sync State: {}", show(project.field("sync_state")));
        println!("   Training State: {}", show(project.field("training_state")));
        println!("---");
    }
    Ok(())
}

async fn list_sessions(config: &HawkeyeConfig) -> anyhow::Result<()> {
    let (api, token, project_uuid) = login(config).await?;
    let sessions = api
        .list_sessions(&token, &SessionQuery::list(&project_uuid, &config.organization))
        .await?;

    println!("Sessions in {}:", config.project);
    println!("=========");
    if sessions.is_empty() {
        println!("No sessions found for this project.");
        return Ok(());
    }

    for (index, session) in sessions.iter().enumerate() {
        println!(
            "{}. {} ({})",
            index + 1,
            session.name.as_deref().unwrap_or("N/A"),
            session.session_uuid.as_deref().unwrap_or("N/A")
        );
        println!("   Created: {}", session.create_time.as_deref().unwrap_or("N/A"));
        println!("   Last Updated: {}", session.last_update.as_deref().unwrap_or("N/A"));
        println!("   Prompt Cycles: {}", session.prompt_cycle_count());
        println!("---");
    }
    Ok(())
}

async fn inspect_session(config: &HawkeyeConfig, session_uuid: &str) -> anyhow::Result<()> {
    let (api, token, project_uuid) = login(config).await?;
    let inspection = api
        .inspect_session(
            &token,
            &SessionQuery::inspect(session_uuid, &project_uuid, &config.organization),
        )
        .await?;

    println!("Session Details:");
    println!("===============");
    if inspection.cycles().is_empty() {
        println!("No prompt cycles found in this session.");
        return Ok(());
    }

    for (index, cycle) in inspection.cycles().iter().enumerate() {
        println!("\nPrompt Cycle #{}:", index + 1);
        println!("----------------");
        println!("Question: {}", cycle.question().unwrap_or("N/A"));
        println!("\nAnswer: {}", cycle.analysis().unwrap_or("N/A"));

        if let Some(steps) = cycle.chain_of_thoughts.as_deref().filter(|s| !s.is_empty()) {
            println!("\nAnalysis Chain of Thought Steps:");
            for (i, step) in steps.iter().enumerate() {
                println!("  {}. {}", i + 1, step.description.as_deref().unwrap_or("N/A"));
                if let Some(investigation) = &step.investigation {
                    println!("     Investigation: {}", investigation);
                }
            }
        }

        if let Some(sources) = cycle.sources.as_deref().filter(|s| !s.is_empty()) {
            println!("\nSources Used:");
            for (i, source) in sources.iter().enumerate() {
                let title = source
                    .title
                    .as_deref()
                    .or(source.id.as_deref())
                    .unwrap_or("Unnamed Source");
                println!("  {}. {}", i + 1, title);
            }
        }

        if let Some(suggestions) = cycle.follow_up_suggestions.as_deref().filter(|s| !s.is_empty()) {
            println!("\nFollow-up Suggestions:");
            for (i, suggestion) in suggestions.iter().enumerate() {
                println!("  {}. {}", i + 1, suggestion);
            }
        }

        println!("\nStatus: {}", cycle.status.as_deref().unwrap_or("Unknown"));
        println!("---");
    }
    Ok(())
}

async fn ask(config: &HawkeyeConfig, prompt: &str) -> anyhow::Result<()> {
    let api = HttpInferenceApi::new(&config.url, config.delivery)?;
    let client = InferenceClient::connect(api, config).await;

    let session = client
        .session()
        .map(|session| session.session_uuid.clone())
        .ok_or_else(|| anyhow::anyhow!("bootstrap failed: {:?}", client.outcomes()))?;

    match client.send_prompt(prompt).await {
        PromptOutcome::Delivered { request_id, receipt } => {
            println!("Prompt sent to session {} (request {})", session, request_id);
            if let Some(message_id) = receipt.message_id {
                println!("Message ID: {}", message_id);
            }
            println!("Inspect it with: hawkeye-relay inspect {}", session);
            Ok(())
        }
        other => Err(anyhow::anyhow!("prompt was not delivered: {:?}", other)),
    }
}
