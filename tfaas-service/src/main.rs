//! tfaas service
//!
//! Serves terraform apply/destroy as asynchronous HTTP jobs:
//! - `POST /apply`, `POST /destroy` submit a job (one at a time)
//! - `GET /job/:id` polls it
//! - `GET /health`, `GET /metrics` for operators
//!
//! `tfaas-service run` executes a single job in the foreground instead.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tfaas_core::Settings;
use tfaas_http::axum;
use tfaas_http::prelude::*;
use tfaas_jobs::{create_router, JobEngine, JobMetrics, JobStatus, JobsState, StatusBody};
use tfaas_terraform::TerraformExecutor;

const DEFAULT_LOG_FILTER: &str =
    "tfaas_service=info,tfaas_jobs=info,tfaas_http=info,tfaas_terraform=info,tower_http=debug";

#[derive(Parser, Debug)]
#[command(name = "tfaas-service")]
#[command(about = "Run terraform apply/destroy as asynchronous HTTP jobs")]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Settings file (TOML)
    #[arg(short, long, global = true, env = "TFAAS_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the HTTP API (default)
    Serve(ServeArgs),

    /// Run one job in the foreground and print its final status
    Run {
        /// Terraform version to install, e.g. 1.4.0
        #[arg(long)]
        version: String,

        /// apply or destroy
        #[arg(long, default_value = "apply")]
        action: String,

        /// Configuration path inside the repository
        #[arg(long)]
        path: String,
    },
}

#[derive(clap::Args, Debug, Default)]
struct ServeArgs {
    /// Bind address (host:port or port); overrides settings
    #[arg(short, long)]
    bind: Option<String>,

    /// Disable CORS
    #[arg(long)]
    no_cors: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from /etc/tfaas/environment or .env (if present)
    tfaas_core::config::load_environment();

    let args = Args::parse();
    init_tracing(args.log_format)?;

    let settings = Settings::load(args.config.as_deref()).context("loading settings")?;
    let executor = Arc::new(TerraformExecutor::from_settings(&settings.terraform));
    let metrics = Arc::new(JobMetrics::new()?);

    match args.command.unwrap_or(Commands::Serve(ServeArgs::default())) {
        Commands::Serve(serve_args) => serve(settings, serve_args, executor, metrics).await,
        Commands::Run {
            version,
            action,
            path,
        } => {
            let engine = JobEngine::spawn(executor, metrics);
            run_once(&engine, &version, &action, &path).await
        }
    }
}

fn init_tracing(format: LogFormat) -> Result<()> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.is_empty() => EnvFilter::try_new(directives)?,
        _ => EnvFilter::try_new(DEFAULT_LOG_FILTER)?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

async fn serve(
    settings: Settings,
    args: ServeArgs,
    executor: Arc<TerraformExecutor>,
    metrics: Arc<JobMetrics>,
) -> Result<()> {
    info!("Starting tfaas service...");

    let (engine, worker) = JobEngine::new(executor, metrics);
    let worker_handle = tokio::spawn(worker.run());
    info!("Started completion worker");

    let router = build_router(engine);

    let bind = args.bind.unwrap_or(settings.server.bind);
    let server = HttpServer::builder()
        .bind(bind.as_str())
        .router(router)
        .cors(!args.no_cors)
        .cors_origins(settings.server.cors_origins)
        .timeout(Duration::from_secs(settings.server.request_timeout_secs))
        .build()?;

    info!("HTTP Server listening on {}", server.config().bind_addr);

    tokio::select! {
        res = server.serve() => {
            res?;
            info!("HTTP server stopped");
        }
        res = worker_handle => {
            error!("Completion worker exited: {:?}", res);
            bail!("completion worker exited");
        }
    }

    Ok(())
}

fn build_router(engine: JobEngine) -> Router {
    RouterBuilder::new()
        .merge("jobs", create_router(JobsState::new(engine.clone())))
        .route("/health", get(health_check).with_state(engine))
        .build()
}

/// Submit one job, wait for it, print its status body
async fn run_once(engine: &JobEngine, version: &str, action: &str, path: &str) -> Result<()> {
    let id = engine.submit(version, action, path).await?;
    info!(job_id = %id, "Job submitted");

    let job = engine
        .wait(&id)
        .await
        .with_context(|| format!("job {} disappeared", id))?;
    println!("{}", serde_json::to_string_pretty(&StatusBody::from(&job))?);

    if job.status == JobStatus::Error {
        bail!("job {} failed: {}", id, job.failure);
    }
    Ok(())
}

async fn health_check(State(engine): State<JobEngine>) -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "healthy",
        "service": "tfaas-service",
        "version": env!("CARGO_PKG_VERSION"),
        "busy": engine.is_busy().await,
    }))
}
