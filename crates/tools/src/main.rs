use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use layers::summary::selection_note;
use layers::watershed::RecordFilter;
use streaming::{FilesystemSource, Registry};
use tools::{
    Settings, export_collection, parse_selection, render_bounds, render_legends, render_summary,
    render_watersheds, split_list,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Água Segura layer summaries and legends")]
struct Args {
    /// Directory holding the dataset files (default: $AGUA_DATA_DIR or ./data)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// JSON layer catalog replacing the built-in one (default: $AGUA_CATALOG)
    #[arg(long)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the selection note, the summary table and every active legend
    Summary {
        /// Comma-separated watershed codes; an empty value selects none
        #[arg(long)]
        select: Option<String>,

        /// Comma-separated layer keys to switch on
        #[arg(long)]
        layers: Option<String>,
    },

    /// Print one layer's legend
    Legend {
        layer: String,

        #[arg(long)]
        select: Option<String>,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// List watersheds matching the filters
    Watersheds {
        #[arg(long)]
        origin: Option<String>,

        #[arg(long)]
        region: Option<String>,

        #[arg(long)]
        municipality: Option<String>,

        /// Accent- and case-insensitive text search
        #[arg(long)]
        query: Option<String>,
    },

    /// Write a layer's visible features as styled GeoJSON
    Export {
        layer: String,

        #[arg(long)]
        select: Option<String>,

        /// Global opacity in percent, clamped to 20..=100
        #[arg(long, default_value_t = 100.0)]
        opacity: f32,

        /// Output file (default: stdout)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let settings = Settings::resolve(args.data_dir, args.catalog);
    info!(data_dir = %settings.data_dir.display(), "starting");

    let catalog = settings.load_catalog()?;
    let source = Arc::new(FilesystemSource::new(&settings.data_dir));
    let registry = Registry::from_catalog(catalog, source)?;
    let watersheds = registry.initialize().await?;

    match args.command {
        Command::Summary { select, layers } => {
            for key in layers.as_deref().map(split_list).unwrap_or_default() {
                registry.activate(&key).await?;
            }
            registry.set_selection(parse_selection(select.as_deref()));
            let note = selection_note(&registry.selection(), Some(watersheds.as_ref()));
            println!("{note}\n");
            print!("{}", render_summary(&registry.summary()));
            println!();
            print!("{}", render_legends(&registry.legends()));
            if let Some(bounds) = registry.visible_bounds() {
                println!("\nEnquadramento: {}", render_bounds(&bounds, 0.05));
            }
        }
        Command::Legend {
            layer,
            select,
            json,
        } => {
            registry.set_selection(parse_selection(select.as_deref()));
            registry.activate(&layer).await?;
            let legend = registry.legend(&layer)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&legend)?);
            } else {
                print!("{}", legend.to_text());
            }
        }
        Command::Watersheds {
            origin,
            region,
            municipality,
            query,
        } => {
            let filter = RecordFilter {
                origin,
                region,
                municipality,
                query,
            };
            let records = watersheds.filter(&filter);
            info!(matched = records.len(), total = watersheds.len(), "watersheds");
            print!("{}", render_watersheds(&records));
        }
        Command::Export {
            layer,
            select,
            opacity,
            out,
        } => {
            registry.set_selection(parse_selection(select.as_deref()));
            let features = registry.activate(&layer).await?;
            let definition = registry.definition(&layer)?;
            let value = export_collection(definition, &features, opacity / 100.0);
            let text = serde_json::to_string(&value)?;
            match out {
                Some(path) => {
                    tokio::fs::write(&path, text).await?;
                    info!(features = features.len(), path = %path.display(), "exported");
                }
                None => println!("{text}"),
            }
        }
    }

    Ok(())
}
