/// Version injected at compile time via GCPCRAWL_VERSION env var (set by CI/CD),
/// or the crate version for local builds.
pub const VERSION: &str = match option_env!("GCPCRAWL_VERSION") {
    Some(v) => v,
    None => env!("CARGO_PKG_VERSION"),
};

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use gcpcrawl::gcp::{auth, client::GcpClient, projects};
use gcpcrawl::sink::{JsonLinesSink, ObjectSink};
use gcpcrawl::{CrawlConfig, CrawlOptions, CrawlOrchestrator, CrawlReport, GcpCredentials};
use gcpcrawl::{PageWalker, RetryPolicy};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Inventory every resource in a GCP project
#[derive(Parser, Debug)]
#[command(name = "gcpcrawl", version = VERSION, about, long_about = None)]
struct Args {
    /// Log level for debugging (RUST_LOG overrides)
    #[arg(long, value_enum, default_value = "warn", global = true)]
    log_level: LogLevel,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Bearer token to use instead of Application Default Credentials
    #[arg(long, global = true)]
    access_token: Option<String>,

    /// Base URL replacing https:// for every API host (proxies, emulators)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl a project and print the report as JSON
    Crawl(CrawlArgs),
    /// List the ACTIVE projects the credentials can see
    Projects,
}

#[derive(ClapArgs, Debug)]
struct CrawlArgs {
    /// GCP project to crawl (defaults to the gcloud project)
    #[arg(short, long)]
    project: Option<String>,

    /// Crawl config (YAML, or JSON by extension)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Stop the crawl after this many seconds, keeping finished kinds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Retries per page for rate limiting and server errors
    #[arg(long, default_value_t = 3)]
    max_retries: u32,

    /// Stream bucket object metadata to this file as JSON lines
    #[arg(long)]
    dump_objects: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

fn setup_logging(
    level: LogLevel,
    log_file: Option<&Path>,
) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("gcpcrawl={}", level.as_directive())));

    let (writer, guard) = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_appender::non_blocking(file)
        },
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(log_file.is_none())
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("gcpcrawl {} started with log level: {:?}", VERSION, level);

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level, args.log_file.as_deref())?;

    let credentials = match &args.access_token {
        Some(token) => GcpCredentials::from_access_token(token.clone()),
        None => GcpCredentials::new().await?,
    };

    match &args.command {
        Command::Crawl(crawl) => run_crawl_command(&args, crawl, credentials).await,
        Command::Projects => run_projects_command(&args, credentials).await,
    }
}

fn build_client(args: &Args, project: &str, credentials: GcpCredentials) -> Result<GcpClient> {
    let client = GcpClient::with_credentials(project, credentials)?;
    match &args.endpoint {
        Some(endpoint) => client.with_endpoint(endpoint),
        None => Ok(client),
    }
}

fn resolve_project(explicit: Option<&str>) -> Result<String> {
    let project = explicit
        .map(str::to_string)
        .or_else(auth::get_default_project)
        .context("No GCP project configured. Set GOOGLE_CLOUD_PROJECT or use --project")?;

    if !auth::validate_project_id(&project) {
        anyhow::bail!("Invalid project id: {}", project);
    }
    Ok(project)
}

async fn run_crawl_command(args: &Args, crawl: &CrawlArgs, credentials: GcpCredentials) -> Result<()> {
    let config = CrawlConfig::load(crawl.config.as_deref())?;
    let project = resolve_project(crawl.project.as_deref())?;
    tracing::info!("Using project: {}", project);

    let mut options = CrawlOptions::default().with_retry(RetryPolicy {
        max_retries: crawl.max_retries,
        ..RetryPolicy::default()
    });
    if let Some(secs) = crawl.timeout_secs {
        options = options.with_timeout(Duration::from_secs(secs));
    }
    let sink: Option<Arc<dyn ObjectSink>> = match &crawl.dump_objects {
        Some(path) => Some(Arc::new(JsonLinesSink::create(path)?)),
        None => None,
    };
    if let Some(sink) = &sink {
        options = options.with_object_sink(sink.clone());
    }

    let client = build_client(args, &project, credentials)?;
    let report = CrawlOrchestrator::new(options)
        .run_until(config.as_ref(), &client, interrupted())
        .await;

    if let Some(sink) = &sink {
        sink.flush()?;
    }
    write_report(&report, crawl.output.as_deref())?;
    print_summary(&report);
    Ok(())
}

async fn run_projects_command(args: &Args, credentials: GcpCredentials) -> Result<()> {
    // Listing projects is not scoped to one, but the client wants an id
    let project = auth::get_default_project().unwrap_or_default();
    let client = build_client(args, &project, credentials)?;

    let outcome = projects::list_projects(&client, &PageWalker::default()).await;
    let mut stdout = std::io::stdout().lock();
    for project in outcome.items() {
        writeln!(stdout, "{}\t{}", project.project_id, project.name)?;
    }
    if let Some(fault) = outcome.reason() {
        anyhow::bail!("Project listing incomplete: {}", fault);
    }
    Ok(())
}

/// Completes on Ctrl-C; never completes if the handler cannot be installed
async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::warn!("Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

fn write_report(report: &CrawlReport, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let mut writer = std::io::BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, report)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        },
        None => {
            let mut stdout = std::io::stdout().lock();
            serde_json::to_writer_pretty(&mut stdout, report)?;
            writeln!(stdout)?;
        },
    }
    Ok(())
}

fn print_summary(report: &CrawlReport) {
    for (kind, outcome) in report.iter() {
        match outcome.reason() {
            None => eprintln!("{:<22} {:>6}", kind, outcome.len()),
            Some(fault) => eprintln!("{:<22} {:>6}  partial: {}", kind, outcome.len(), fault),
        }
    }
    eprintln!(
        "{} kinds, {} partial (crawl {})",
        report.len(),
        report.partial_count(),
        report.crawl_id()
    );
}
