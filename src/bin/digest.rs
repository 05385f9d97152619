use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use metrics_digest::{
    actors::scheduler::{SchedulerHandle, StopReason, wait_for_stop},
    api::{ApiConfig, ApiState, spawn_api_server},
    config::Config,
    mail::SmtpNotifier,
    pipeline::{ReportPipeline, Trigger},
    prompt::PromptBuilder,
    report::{ReportOutput, ReportRenderer},
    storage::{MetricsStore, postgres::PostgresStore},
    summarize::AzureOpenAiClient,
};
use tokio::sync::oneshot;
use tracing::{error, info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
#[command(version, about = "Weekly server metrics digest")]
struct Args {
    /// Log level for this crate
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Serve the HTTP API and run the weekly schedule (default)
    Serve {
        /// Only serve HTTP, never run the report on a schedule
        #[arg(long)]
        no_scheduler: bool,
    },

    /// Run the full report once and exit
    RunOnce,
}

fn init(level: LevelFilter) {
    let filter = filter::Targets::new().with_targets(vec![
        ("metrics_digest", level),
        ("tower_http", level),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // a missing .env file is fine
    dotenv::dotenv().ok();

    let args = Args::parse();
    init(args.log_level);
    trace!("started with args: {args:?}");

    let config = Config::from_env().context("invalid configuration")?;

    let postgres = PostgresStore::new(&config.database);
    if config.database.run_migrations {
        postgres.migrate().await.context("failed to run migrations")?;
    }
    let store: Arc<dyn MetricsStore> = Arc::new(postgres);

    let summarizer = AzureOpenAiClient::new(&config.llm)?;
    let notifier = SmtpNotifier::new(&config.mail)?;

    let pipeline = Arc::new(
        ReportPipeline::new(
            store.clone(),
            Arc::new(summarizer),
            Arc::new(notifier),
            ReportRenderer::new(ReportOutput::Directory(config.report.output_dir.clone())),
        )
        .with_prompts(PromptBuilder::new(
            config.report.row_cap,
            config.report.truncation,
        ))
        .with_window_days(config.report.window_days),
    );

    let result = match args.command.unwrap_or(Command::Serve {
        no_scheduler: false,
    }) {
        Command::RunOnce => run_once(&pipeline).await,
        Command::Serve { no_scheduler } => serve(&config, pipeline, no_scheduler).await,
    };

    if let Err(e) = store.close().await {
        warn!("failed to close metrics store: {e}");
    }

    result
}

async fn run_once(pipeline: &ReportPipeline) -> anyhow::Result<()> {
    let outcome = pipeline.run_report(Trigger::Manual).await?;

    info!(
        "report finished: {} hosts, delivered: {}, html: {:?}, pdf: {:?}",
        outcome.results.len(),
        outcome.delivery.delivered,
        outcome.delivery.html_path,
        outcome.delivery.pdf_path
    );

    if !outcome.delivery.delivered {
        anyhow::bail!(
            "report was not delivered: {}",
            outcome.delivery.error.unwrap_or_default()
        );
    }

    Ok(())
}

async fn serve(
    config: &Config,
    pipeline: Arc<ReportPipeline>,
    no_scheduler: bool,
) -> anyhow::Result<()> {
    let mut state = ApiState::new(pipeline.clone());

    let mut scheduler = if no_scheduler {
        info!("scheduler disabled");
        None
    } else {
        let (handle, task) = SchedulerHandle::spawn(&config.report.cron, pipeline)?;
        info!("weekly report scheduled with '{}'", config.report.cron);
        state = state.with_scheduler(handle.clone());
        Some((handle, task))
    };

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let (addr, server) = spawn_api_server(ApiConfig::from(&config.server), state, async move {
        let _ = stop_rx.await;
    })
    .await?;
    info!("Server is running on http://{addr}");

    let reason = wait_for_stop(shutdown_signal(), scheduler.as_mut().map(|(_, task)| task)).await;

    let _ = stop_tx.send(());
    if let Err(e) = server.await {
        error!("API server task failed: {e}");
    }

    if let (StopReason::Signal, Some((handle, task))) = (&reason, scheduler) {
        if let Err(e) = handle.shutdown().await {
            warn!("scheduler already stopped: {e:#}");
        }
        // a scheduler that already stopped has been awaited
        if !task.is_finished() {
            if let Err(e) = task.await {
                warn!("scheduler task ended abnormally: {e}");
            }
        }
    }

    info!("shut down");
    match reason {
        StopReason::Signal => Ok(()),
        StopReason::SchedulerPanicked(message) => {
            anyhow::bail!("report scheduler panicked: {message}")
        }
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
