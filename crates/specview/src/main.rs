mod commands;
mod config;

use clap::{Parser, Subcommand};
use config::ConfigLoader;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "specview", version, about = "SpecView selector queries over rendered pages")]
struct Args {
    /// Config file (defaults: ./specview.yaml, then ~/.specview/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the segments of a selector as JSON
    Parse { selector: String },
    /// Render a page fixture and print its HTML
    Render {
        #[arg(long)]
        page: PathBuf,
    },
    /// Run a fetcher against a page fixture
    Fetch {
        #[arg(long)]
        page: PathBuf,
        /// Fetcher as inline JSON
        #[arg(long, conflicts_with = "fetcher_file", required_unless_present = "fetcher_file")]
        fetcher: Option<String>,
        #[arg(long)]
        fetcher_file: Option<PathBuf>,
    },
    /// List the terminal functions fetchers can call
    Functions,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr, results to stdout.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = ConfigLoader::load(args.config.as_deref()).await?;

    match args.command {
        Command::Parse { selector } => {
            let segments = commands::parse_selector(&selector)?;
            println!("{}", commands::to_output(&segments, config.output.pretty)?);
        }
        Command::Render { page } => {
            let page = commands::load_page(&page).await?;
            println!("{}", page.markup());
        }
        Command::Fetch {
            page,
            fetcher,
            fetcher_file,
        } => {
            let page = commands::load_page(&page).await?;
            let fetcher =
                commands::read_fetcher(fetcher.as_deref(), fetcher_file.as_deref()).await?;
            let value = commands::fetch(&page, &config, &fetcher)?;
            println!("{}", commands::to_output(&value, config.output.pretty)?);
        }
        Command::Functions => {
            for name in commands::functions() {
                println!("{}", name);
            }
        }
    }
    Ok(())
}
