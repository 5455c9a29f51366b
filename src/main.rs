use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use emit_l2a_rfl::catalog::GranuleDescriptor;
use emit_l2a_rfl::config::{self, RetrievalConfig};
use emit_l2a_rfl::download_plan::DownloadPlan;
use emit_l2a_rfl::search::search_granules;
use emit_l2a_rfl::time::{DateWindow, Moment};
use emit_l2a_rfl::timeseries::existing_outputs;
use emit_l2a_rfl::Geometry;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Search and download EMIT L2A surface reflectance granules.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// TOML configuration; built-in defaults are used when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List granules matching a time window and extent
    Search {
        #[command(flatten)]
        query: QueryArgs,
        /// Print descriptors as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write a download plan for the matching granules
    Plan {
        #[command(flatten)]
        query: QueryArgs,
        #[arg(long, default_value = "download_plan.json")]
        output: PathBuf,
    },
    /// Download granules from a plan, or from a fresh search
    Download {
        #[arg(long, conflicts_with_all = ["start", "end"])]
        plan: Option<PathBuf>,
        #[command(flatten)]
        query: Option<QueryArgs>,
    },
    /// Show which days of a window already have a time-series output
    Status {
        #[arg(long)]
        start: Moment,
        #[arg(long)]
        end: Moment,
        /// Overrides `output_directory` from the configuration
        #[arg(long)]
        output_directory: Option<PathBuf>,
    },
    /// Print a configuration template
    Config,
}

#[derive(Args, Debug)]
struct QueryArgs {
    /// YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS
    #[arg(long)]
    start: Moment,
    #[arg(long)]
    end: Moment,
    /// lon,lat or xmin,ymin,xmax,ymax, optionally suffixed with @EPSG:<code>
    #[arg(long, allow_hyphen_values = true)]
    geometry: Option<Geometry>,
    /// Only used together with --scene
    #[arg(long)]
    orbit: Option<u32>,
    /// Only used together with --orbit
    #[arg(long)]
    scene: Option<u32>,
}

async fn locate(config: &RetrievalConfig, query: &QueryArgs) -> Result<Vec<GranuleDescriptor>> {
    let catalog = config.catalog()?;
    let granules = search_granules(
        &catalog,
        query.start,
        query.end,
        query.geometry.as_ref(),
        query.orbit,
        query.scene,
    )
    .await?;
    info!("Found {} granules", granules.len());
    Ok(granules)
}

/// `<native-id>\t<begin>\t<orbit>_<scene>`, with `-` for unknown fields.
fn search_line(granule: &GranuleDescriptor) -> String {
    let begin = granule
        .begin
        .map(|begin| begin.format("%Y-%m-%dT%H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());
    let orbit_scene = granule
        .orbit_scene()
        .map(|(orbit, scene)| format!("{orbit}_{scene:03}"))
        .unwrap_or_else(|| "-".to_string());
    format!("{}\t{}\t{}", granule.native_id, begin, orbit_scene)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => RetrievalConfig::read(path)?,
        None => RetrievalConfig::default(),
    };

    match cli.command {
        Command::Search { query, json } => {
            let granules = locate(&config, &query).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&granules)?);
            } else {
                for granule in &granules {
                    println!("{}", search_line(granule));
                }
            }
        }
        Command::Plan { query, output } => {
            let granules = locate(&config, &query).await?;
            let plan = DownloadPlan::new(granules, &config.download_directory());
            plan.write(&output)?;
            let cached = plan.tasks().iter().filter(|task| task.is_cached()).count();
            info!(
                "Wrote plan with {} tasks ({} already cached) to {}",
                plan.tasks().len(),
                cached,
                output.display()
            );
        }
        Command::Download { plan, query } => {
            let plan = match (plan, query) {
                (Some(path), _) => DownloadPlan::read(path)?,
                (None, Some(query)) => {
                    DownloadPlan::new(locate(&config, &query).await?, &config.download_directory())
                }
                (None, None) => return Err(anyhow!("Either --plan or --start/--end is required")),
            };
            let paths = plan.execute(&config.transport()).await?;
            for path in paths {
                println!("{}", path.display());
            }
        }
        Command::Status {
            start,
            end,
            output_directory,
        } => {
            let output_directory = output_directory
                .or_else(|| config.output_directory())
                .ok_or(anyhow!("No output directory in the config or on the command line"))?;
            let window = DateWindow::new(start, end)?;
            let outputs = existing_outputs(&output_directory, &window);
            for (date, path) in &outputs {
                match path {
                    Some(path) => println!("{}\t{}", date, path.display()),
                    None => println!("{}\tmissing", date),
                }
            }
            let produced = outputs.iter().filter(|(_, path)| path.is_some()).count();
            info!("{} of {} days produced", produced, window.len());
        }
        Command::Config => {
            println!("{}", toml::to_string_pretty(&config::template())?);
        }
    }

    Ok(())
}
