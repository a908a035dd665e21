use std::path::PathBuf;
use std::sync::Arc;

use asset_insight::config::Settings;
use asset_insight::error::AppError;
use asset_insight::perception::{CapabilityHost, PerceptionGateway, RemoteLoader};
use asset_insight::service::{infallible, AnalysisService, AssetRequest};
use asset_insight::AnalysisCoordinator;
use clap::Parser;
use tower::ServiceExt;
use tracing::{info, Level};

/// Extracts features from media assets and classifies their content type.
#[derive(Debug, Parser)]
#[command(name = "asset-insight", version)]
struct Cli {
    /// Settings file (TOML, YAML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Pretty-print the JSON reports
    #[arg(long)]
    pretty: bool,

    /// Assets to analyze
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

fn init_logging(level: &str) -> Result<(), AppError> {
    let level: Level = level
        .parse()
        .map_err(|_| AppError::Config(format!("unknown log level '{}'", level)))?;
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;
    init_logging(&settings.log_level)?;

    let host = Arc::new(CapabilityHost::new(Box::new(RemoteLoader::new(
        settings.inference.clone(),
    ))));
    let gateway = Arc::new(PerceptionGateway::new(host, settings.perception.clone()));
    let coordinator = Arc::new(AnalysisCoordinator::new(gateway, &settings.analysis));
    let service = AnalysisService::builder(coordinator)
        .max_concurrent_analyses(settings.max_concurrent_analyses)
        .build();

    let mut requests = Vec::with_capacity(cli.files.len());
    for path in &cli.files {
        let bytes = tokio::fs::read(path).await?;
        let filename = path.file_name().map(|name| name.to_string_lossy().into_owned());
        requests.push(AssetRequest::new(bytes, filename));
    }

    info!("Analyzing {} assets", requests.len());
    let reports = futures::future::join_all(
        requests
            .into_iter()
            .map(|request| service.clone().oneshot(request)),
    )
    .await;

    for report in reports {
        let report = infallible(report);
        let json = if cli.pretty {
            serde_json::to_string_pretty(&report)?
        } else {
            serde_json::to_string(&report)?
        };
        println!("{}", json);
    }
    Ok(())
}
