//! `joysense-report`: run the dashboard pipelines against a live backend

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use joysense_client::config::load_dashboard_config;
use joysense_client::{ClientConfig, ClientError, ClientResult, HttpSource};
use joysense_core::analysis::AnalysisError;
use joysense_core::catalog::Catalog;
use joysense_core::config::DashboardConfig;
use joysense_core::coordination::{CachedSource, SystemClock};
use joysense_core::model::{LocationId, MetricId, NodeId};
use joysense_core::time::{DateRange, parse_timestamp};
use joysense_core::views::{
    ChartRequest, ChartView, ReportError, ReportRequest, ViewStatus, build_threshold_report,
};
use log::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "joysense-report", version, about)]
struct Cli {
    /// JSON file overriding the dashboard heuristics
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Chart a node; without a range, shows its most recent continuous data
    Chart {
        #[arg(long)]
        node: i64,
        #[arg(long)]
        metric: Option<i64>,
        #[arg(long, value_parser = parse_cli_timestamp, requires = "to")]
        from: Option<NaiveDateTime>,
        #[arg(long, value_parser = parse_cli_timestamp, requires = "from")]
        to: Option<NaiveDateTime>,
    },
    /// Recommend thresholds for a location and metric over a range
    Thresholds {
        #[arg(long)]
        location: i64,
        #[arg(long)]
        metric: i64,
        #[arg(long, value_parser = parse_cli_timestamp)]
        from: NaiveDateTime,
        #[arg(long, value_parser = parse_cli_timestamp)]
        to: NaiveDateTime,
    },
    /// List nodes with their location path
    Nodes,
}

fn parse_cli_timestamp(raw: &str) -> Result<NaiveDateTime, String> {
    parse_timestamp(raw).ok_or_else(|| format!("expected YYYY-MM-DD HH:MM:SS, got {raw:?}"))
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn load_catalog(source: &HttpSource) -> Catalog {
    match Catalog::load(source).await {
        Ok(catalog) => catalog,
        Err(e) => {
            warn!("Catalog unavailable, showing raw ids: {}", e);
            Catalog::default()
        }
    }
}

async fn chart(
    source: HttpSource,
    client: &ClientConfig,
    config: DashboardConfig,
    request: ChartRequest,
) -> ClientResult<()> {
    let catalog = load_catalog(&source).await;
    let ttl = client.cache_ttl.unwrap_or(config.fetch.cache_ttl());
    let horizon_days = config.fetch.range_ladder.last().map_or(0, |step| step.days);
    let cached = CachedSource::new(source, SystemClock, ttl);
    let view = ChartView::new(cached, SystemClock, config);

    if let Some(request) = view.schedule(request) {
        view.load(request).await;
    }

    let state = view.state();
    match &state.status {
        ViewStatus::Ready => {}
        ViewStatus::NoData => {
            println!("No readings in the selected range");
            return Ok(());
        }
        ViewStatus::NoRecentData => {
            println!("No readings in the last {horizon_days} days");
            return Ok(());
        }
        ViewStatus::Failed(message) => {
            return Err(ClientError::Request(message.clone()));
        }
        ViewStatus::Idle => {
            println!("Backend unavailable, nothing to show");
            return Ok(());
        }
    }

    if let Some(granularity) = state.granularity {
        info!("{} buckets of {}", state.points.len(), granularity.label());
    }

    let header: Vec<String> = state
        .columns
        .iter()
        .map(|id| catalog.sensor_type_name(*id))
        .collect();
    println!("{:<12} {}", "time", header.join("\t"));
    for point in &state.points {
        let cells: Vec<String> = state
            .columns
            .iter()
            .map(|id| point.value(*id).map_or("-".to_string(), |v| format!("{v:.2}")))
            .collect();
        println!("{:<12} {}", point.time_label, cells.join("\t"));
    }
    Ok(())
}

async fn thresholds(
    source: HttpSource,
    config: DashboardConfig,
    request: ReportRequest,
) -> ClientResult<()> {
    let catalog = load_catalog(&source).await;
    let report = match build_threshold_report(&source, &request, &config).await {
        Ok(report) => report,
        Err(ReportError::Analysis(AnalysisError::InsufficientData)) => {
            println!("Not enough data in the selected range to recommend thresholds");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    println!(
        "{:<20} {:>8} {:>8} {:>8} {:>8} {:>8}",
        "type", "min", "max", "avg", "std", "n"
    );
    for (type_id, rec) in &report.recommendations {
        println!(
            "{:<20} {:>8.2} {:>8.2} {:>8.2} {:>8.2} {:>8}",
            catalog.sensor_type_name(*type_id),
            rec.min,
            rec.max,
            rec.avg,
            rec.std_dev,
            rec.samples
        );
    }
    Ok(())
}

async fn nodes(source: HttpSource) -> ClientResult<()> {
    let catalog = Catalog::load(&source).await?;
    for node in catalog.nodes() {
        let path = catalog
            .breadcrumb(node.id)
            .map(|crumb| crumb.path().join(" / "))
            .unwrap_or_else(|| node.name.clone());
        let marker = if node.active { "" } else { " (inactive)" };
        println!("{:>6}  {}{}", node.id, path, marker);
    }
    Ok(())
}

async fn run(cli: Cli) -> ClientResult<()> {
    let client = ClientConfig::from_env()?;
    let config = load_dashboard_config(cli.config.as_deref())?;
    info!("Using {} (schema {})", client.base_url, client.schema);
    let source = HttpSource::new(&client)?;

    match cli.command {
        Command::Chart {
            node,
            metric,
            from,
            to,
        } => {
            let mut request = ChartRequest::live(NodeId(node));
            if let Some(metric) = metric {
                request = request.with_metric(MetricId(metric));
            }
            if let (Some(from), Some(to)) = (from, to) {
                request = request.with_range(DateRange::new(from, to));
            }
            chart(source, &client, config, request).await
        }
        Command::Thresholds {
            location,
            metric,
            from,
            to,
        } => {
            let request = ReportRequest {
                location: LocationId(location),
                metric: MetricId(metric),
                range: DateRange::new(from, to),
            };
            thresholds(source, config, request).await
        }
        Command::Nodes => nodes(source).await,
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
