//! buildreq - client build request lookup and Slack bot runner.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use buildreq_slack::{BuildReqBot, SlackConfig};
use buildreq_tracker::{AsanaClient, Command, Dispatcher, Outcome, TrackerConfig, is_task_id};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod render;

/// Client build request lookup
#[derive(Parser)]
#[command(name = "buildreq")]
#[command(about = "Look up client build requests and run the Slack bot")]
#[command(version)]
struct Args {
    /// Tracker configuration file (TOML); environment variables otherwise
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Tracker project id, overriding the configured one
    #[arg(short, long, global = true)]
    project: Option<String>,

    /// Log level
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the Slack bot until Ctrl+C or SIGTERM
    Serve,

    /// Find requests whose client name contains QUERY
    Search {
        /// Text to look for; prompts when omitted
        query: Option<String>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Every open and recently completed request, by section
    Dashboard {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// A single request by tracker id
    Show {
        #[arg(value_parser = parse_task_id)]
        gid: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

fn parse_task_id(value: &str) -> std::result::Result<String, String> {
    if is_task_id(value) {
        Ok(value.to_string())
    } else {
        Err(format!("'{}' is not a task id (digits only)", value))
    }
}

fn setup_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so command output can be piped
    if json {
        subscriber
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        subscriber
            .with(tracing_subscriber::fmt::layer().pretty().with_writer(io::stderr))
            .init();
    }
}

fn load_tracker_config(args: &Args) -> Result<TrackerConfig> {
    let mut config = match &args.config {
        Some(path) => TrackerConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => TrackerConfig::from_env().context("Failed to load config from environment")?,
    };

    if let Some(project) = &args.project {
        config.project_id = project.clone();
    }
    config.validate()?;

    debug!("Tracker config: {:?}", config);
    Ok(config)
}

fn read_query(label: &str) -> Result<String> {
    let mut stdout = io::stdout();
    write!(stdout, "{}", label)?;
    stdout.flush()?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read search query")?;
    Ok(line.trim().to_string())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn search(dispatcher: &Dispatcher, query: Option<String>, json: bool) -> Result<()> {
    let query = match query {
        Some(query) => query,
        None => read_query("Search > ")?,
    };

    let grouped = dispatcher
        .query_pipeline()
        .run_grouped(dispatcher.project_id(), &query)
        .await
        .context("Search failed")?;

    if json {
        print_json(&grouped)
    } else {
        if grouped.is_empty() {
            println!("{}", render::NO_MATCH);
        } else {
            print!("{}", render::grouped(&grouped));
        }
        Ok(())
    }
}

async fn dashboard(dispatcher: &Dispatcher, json: bool) -> Result<()> {
    let grouped = match dispatcher.dispatch(Command::Dashboard).await? {
        Outcome::Dashboard(grouped) => grouped,
        other => bail!("Unexpected outcome for dashboard: {:?}", other),
    };

    if json {
        print_json(&grouped)
    } else {
        if grouped.is_empty() {
            println!("{}", render::NO_REQUESTS);
        } else {
            print!("{}", render::grouped(&grouped));
        }
        Ok(())
    }
}

async fn show(dispatcher: &Dispatcher, gid: String, json: bool) -> Result<()> {
    let task = match dispatcher
        .dispatch(Command::Show { gid: gid.clone() })
        .await
        .with_context(|| format!("Failed to fetch request {}", gid))?
    {
        Outcome::Task(task) => task,
        other => bail!("Unexpected outcome for show: {:?}", other),
    };

    if json {
        print_json(&task)
    } else {
        print!("{}", render::sectioned(&task));
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}

async fn serve(dispatcher: Dispatcher) -> Result<()> {
    let slack = SlackConfig::from_env().context("Failed to load Slack config from environment")?;
    let bot = Arc::new(BuildReqBot::new(slack, dispatcher)?);

    let signal_bot = bot.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_bot.shutdown();
    });

    info!("Press Ctrl+C to stop");
    bot.start().await?;

    info!("Bot stopped");
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let config = load_tracker_config(&args)?;
    let source = Arc::new(AsanaClient::new(&config)?);
    let dispatcher = Dispatcher::from_config(source, &config);

    match args.command {
        Commands::Serve => serve(dispatcher).await,
        Commands::Search { query, json } => search(&dispatcher, query, json).await,
        Commands::Dashboard { json } => dashboard(&dispatcher, json).await,
        Commands::Show { gid, json } => show(&dispatcher, gid, json).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env is fine; the environment may already be set
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    setup_logging(&args.log_level, args.json_logs);

    if let Err(e) = run(args).await {
        error!("{:#}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
