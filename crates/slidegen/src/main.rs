use crate::prelude::*;
use clap::Parser;
use std::path::PathBuf;

mod completion;
mod config;
mod convert;
mod error;
mod generate;
mod images;
mod manifest;
mod pair;
mod pipeline;
mod prelude;
mod refine;
mod sources;
mod store;

#[derive(Debug, clap::Parser)]
#[command(
    author,
    version,
    about,
    long_about = "Generate slide decks from tabular data and placeholder templates"
)]
pub struct App {
    #[command(subcommand)]
    pub command: SubCommands,

    #[clap(flatten)]
    global: Global,
}

#[derive(Debug, Clone, clap::Args)]
pub struct Global {
    /// Directory holding template and generated decks
    #[clap(long, env = "SLIDEGEN_DECK_DIR", global = true, default_value = ".")]
    deck_dir: PathBuf,

    /// Whether to display additional information.
    #[clap(long, env = "SLIDEGEN_VERBOSE", global = true, default_value = "false")]
    verbose: bool,
}

#[derive(Debug, clap::Parser)]
pub enum SubCommands {
    /// Fill a template deck with one slide group per record
    Generate(crate::generate::GenerateOptions),

    /// Show the fields a template expects
    Manifest(crate::manifest::ManifestOptions),

    /// Rewrite [X], <X> and ${X} placeholders as {{X}}
    Convert(crate::convert::ConvertOptions),

    /// Pair records two per slide and print them as JSON
    Pair(crate::pair::PairOptions),
}

#[tokio::main]
async fn main() -> Result<()> {
    let app = App::parse();

    let mut logger = env_logger::Builder::from_default_env();
    if app.global.verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();
    color_eyre::install()?;

    match app.command {
        SubCommands::Generate(options) => crate::generate::run(options, app.global).await,
        SubCommands::Manifest(options) => crate::manifest::run(options, app.global).await,
        SubCommands::Convert(options) => crate::convert::run(options, app.global).await,
        SubCommands::Pair(options) => crate::pair::run(options, app.global).await,
    }
    .map_err(|err: color_eyre::eyre::Report| eyre!(err))
}
