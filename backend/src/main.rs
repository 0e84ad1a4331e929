//! Cropdash CLI - crop price dashboard data from spreadsheets
//!
//! # Main Commands
//!
//! ```bash
//! cropdash serve                          # Start HTTP server (port 3000)
//! cropdash summary --city Pune            # Per-crop change statistics
//! cropdash overview                       # Gainer, loser, highest, average
//! cropdash series prices.xlsx --city ALL  # Monthly chart series
//! cropdash select Pune                    # Persist the city selection
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! cropdash load prices.xlsx               # Tables, columns, shapes, cities, notes
//! cropdash export prices.xlsx -o out.csv  # Normalized Crop,Date,Price[,City] CSV
//! ```
//!
//! Without explicit sources the configured workbook, then CSV, then the
//! built-in sample prices are tried in order.

use clap::{Args, Parser, Subcommand};
use cropdash::api::logs::LOG_BROADCASTER;
use cropdash::{
    export_csv, filter_by_dimension, load_source, DashboardConfig, DashboardView, Dataset, DatasetOutcome,
    FileSelectionStore, LoadedSource, Pipeline, SelectionStore, ShapeHint, SourceCache, SourceLocator,
    SourceStrategy, SummaryOrder,
};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "cropdash")]
#[command(about = "Normalize crop price spreadsheets and summarize the market", long_about = None)]
struct Cli {
    /// Do not echo pipeline logs to stderr
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Source selection shared by the dashboard commands.
#[derive(Args)]
struct ViewArgs {
    /// Sources to try in order (default: configured workbook, then CSV)
    sources: Vec<String>,

    /// City name or ALL (default: stored selection)
    #[arg(short, long)]
    city: Option<String>,

    /// Table layout: auto, wide or long
    #[arg(long, default_value = "auto")]
    shape: ShapeHint,
}

#[derive(Subcommand)]
enum Commands {
    /// Load one source and describe its tables
    Load {
        /// File path or URL
        source: String,

        /// Table layout: auto, wide or long
        #[arg(long, default_value = "auto")]
        shape: ShapeHint,
    },

    /// Monthly chart series as JSON
    Series {
        #[command(flatten)]
        view: ViewArgs,
    },

    /// Per-crop summaries as JSON
    Summary {
        #[command(flatten)]
        view: ViewArgs,

        /// Sort by percent change, gainers first
        #[arg(long)]
        by_change: bool,
    },

    /// Quick market analysis as JSON
    Overview {
        #[command(flatten)]
        view: ViewArgs,
    },

    /// Write normalized records as CSV
    Export {
        /// File path or URL
        source: String,

        /// Only this city, or ALL for the cross-city average (default: every city)
        #[arg(short, long)]
        city: Option<String>,

        /// Table layout: auto, wide or long
        #[arg(long, default_value = "auto")]
        shape: ShapeHint,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show or store the selected city
    Select {
        /// City name or ALL
        city: Option<String>,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on (default: CROPDASH_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() {
    let config = DashboardConfig::from_env();
    let cli = Cli::parse();
    LOG_BROADCASTER.set_echo(!cli.quiet);

    let result = match cli.command {
        Commands::Load { source, shape } => cmd_load(&source, shape, &config).await,

        Commands::Series { view } => cmd_series(&view, &config).await,

        Commands::Summary { view, by_change } => cmd_summary(&view, by_change, &config).await,

        Commands::Overview { view } => cmd_overview(&view, &config).await,

        Commands::Export {
            source,
            city,
            shape,
            output,
        } => cmd_export(&source, city.as_deref(), shape, output.as_deref(), &config).await,

        Commands::Select { city } => cmd_select(city.as_deref(), &config),

        Commands::Serve { port } => cmd_serve(port, config).await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn cmd_load(source: &str, shape: ShapeHint, config: &DashboardConfig) -> Result<(), Box<dyn std::error::Error>> {
    let locator = SourceLocator::parse(source);
    let loaded = load_source(&locator, shape, config.fetch_timeout).await?;

    println!("{}", serde_json::to_string_pretty(&describe_source(&loaded))?);
    Ok(())
}

async fn cmd_series(args: &ViewArgs, config: &DashboardConfig) -> Result<(), Box<dyn std::error::Error>> {
    let json = match build_view(args, SummaryOrder::ByName, config).await? {
        Some(view) => serde_json::to_value(&view.chart)?,
        None => json!({ "months": [], "labels": [], "series": [] }),
    };
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

async fn cmd_summary(
    args: &ViewArgs,
    by_change: bool,
    config: &DashboardConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let order = if by_change {
        SummaryOrder::ByPercentChangeDesc
    } else {
        SummaryOrder::ByName
    };

    let json = match build_view(args, order, config).await? {
        Some(view) => serde_json::to_value(&view.summaries)?,
        None => json!([]),
    };
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

async fn cmd_overview(args: &ViewArgs, config: &DashboardConfig) -> Result<(), Box<dyn std::error::Error>> {
    let json = match build_view(args, SummaryOrder::ByName, config).await? {
        Some(view) => json!({
            "source": view.source,
            "city": view.city,
            "overview": view.overview,
        }),
        None => json!({ "overview": null }),
    };
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

async fn cmd_export(
    source: &str,
    city: Option<&str>,
    shape: ShapeHint,
    output: Option<&Path>,
    config: &DashboardConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let strategy = SourceStrategy::Source {
        locator: SourceLocator::parse(source),
        hint: shape,
    };
    let pipeline = Pipeline::new(vec![strategy], config.fetch_timeout);

    let dataset = match pipeline.run(&mut SourceCache::new()).await? {
        DatasetOutcome::Loaded(dataset) => dataset,
        DatasetOutcome::Empty { source } => return Err(format!("No data available in {}", source).into()),
    };

    let records = match city {
        Some(selected) => filter_by_dimension(&dataset.records, &dataset.resolve_filter(selected)),
        None => dataset.records,
    };

    let written = match output {
        Some(path) => {
            let n = export_csv(&records, fs::File::create(path)?)?;
            eprintln!("💾 Output written to: {}", path.display());
            n
        }
        None => export_csv(&records, std::io::stdout().lock())?,
    };
    eprintln!("✅ Exported {} record(s)", written);
    Ok(())
}

fn cmd_select(city: Option<&str>, config: &DashboardConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut store = FileSelectionStore::new(config.selection_file());

    if let Some(city) = city {
        store.set_selected_dimension(city)?;
        eprintln!("✅ Selection saved to {}", store.path().display());
    }

    let json = json!({
        "selected": store.get_selected_dimension()?,
        "fallback": store.fallback_dimension()?,
    });
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

async fn cmd_serve(port: Option<u16>, mut config: DashboardConfig) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(port) = port {
        config.port = port;
    }
    cropdash::server::start_server(config).await?;
    Ok(())
}

/// Run the pipeline and build the view for the requested or stored city.
///
/// `None` means every source was empty.
async fn build_view(
    args: &ViewArgs,
    order: SummaryOrder,
    config: &DashboardConfig,
) -> Result<Option<DashboardView>, Box<dyn std::error::Error>> {
    let pipeline = Pipeline::from_sources(&args.sources, args.shape, config);
    let dataset: Dataset = match pipeline.run(&mut SourceCache::new()).await? {
        DatasetOutcome::Loaded(dataset) => dataset,
        DatasetOutcome::Empty { source } => {
            eprintln!("⚠️  No data available (last source tried: {})", source);
            return Ok(None);
        }
    };

    let selected = match &args.city {
        Some(city) => city.clone(),
        None => FileSelectionStore::new(config.selection_file()).get_selected_dimension()?,
    };
    let filter = dataset.resolve_filter(&selected);

    Ok(Some(dataset.view(&filter, order)))
}

/// Compact description of a loaded source, without row data.
fn describe_source(loaded: &LoadedSource) -> Value {
    let tables: Vec<Value> = loaded
        .tables
        .iter()
        .map(|(name, table)| {
            json!({
                "name": name,
                "headers": table.table.headers,
                "rows": table.row_count(),
                "columns": table.columns,
                "shape": table.shape,
            })
        })
        .collect();

    json!({
        "source": loaded.source,
        "format": loaded.format,
        "usableRows": loaded.usable_rows(),
        "tables": tables,
        "dimensions": loaded.dimensions,
        "notes": loaded.notes,
    })
}
