pub mod driver;

use crate::completion::{Backend, GeminiHttp, OllamaClient, Rotating, RotationState};
use crate::config::{gemini_keys_from_env, load_settings, rotation_state_path};
use crate::images::{DirImageStore, HttpFetcher, ImageStore, NoImageStore};
use crate::pipeline::{transform, TransformRequest};
use crate::prelude::{eprintln, println, *};
use crate::store::JsonDeckStore;
use colored::Colorize;
use driver::{DriverOptions, Services};
use slidegen_core::ingest::DataFormat;
use slidegen_core::outcome::{ErrorKind, RunOutcome, RunStatus};
use slidegen_core::settings::Settings;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BackendKind {
    Gemini,
    Ollama,
}

#[derive(Debug, clap::Args, Clone)]
pub struct GenerateOptions {
    /// Template deck id or share URL
    #[arg(short, long, env = "SLIDEGEN_TEMPLATE")]
    pub template: Option<String>,

    /// Destination deck id or share URL
    #[arg(short, long, env = "SLIDEGEN_DESTINATION")]
    pub destination: Option<String>,

    /// Data source: airtable, raw_text, text, csv or json
    #[arg(short, long, default_value = "airtable")]
    pub source: String,

    /// Table URL (https://airtable.com/app.../tbl...)
    #[arg(long, env = "AIRTABLE_URL")]
    pub airtable_url: Option<String>,

    /// Filter formula applied to the table query
    #[arg(long)]
    pub filter: Option<String>,

    /// Table API key
    #[arg(long, env = "AIRTABLE_API_KEY", hide_env_values = true)]
    pub airtable_api_key: Option<String>,

    /// Inline raw data
    #[arg(long, conflicts_with = "raw_file")]
    pub raw_text: Option<String>,

    /// File holding raw data
    #[arg(long)]
    pub raw_file: Option<PathBuf>,

    /// Raw data format (json, csv or tsv); detected when omitted
    #[arg(long)]
    pub format: Option<DataFormat>,

    /// Slide layout: single or double
    #[arg(short, long)]
    pub layout: Option<String>,

    /// Let the model map free-form data onto the template
    #[arg(long)]
    pub ai_map: bool,

    /// Skip text refinement
    #[arg(long)]
    pub no_refine: bool,

    /// Completion backend
    #[arg(long, value_enum, default_value = "gemini")]
    pub backend: BackendKind,

    /// Gemini model (overrides the settings file)
    #[arg(long, env = "GEMINI_MODEL")]
    pub gemini_model: Option<String>,

    /// Ollama server URL (overrides the settings file)
    #[arg(long, env = "OLLAMA_URL")]
    pub ollama_url: Option<String>,

    /// Ollama model (overrides the settings file)
    #[arg(long, env = "SLIDEGEN_MODEL")]
    pub model: Option<String>,

    /// Directory used to resolve image file ids
    #[arg(long, env = "SLIDEGEN_IMAGE_DIR")]
    pub image_dir: Option<PathBuf>,

    /// Settings file (defaults to the user config directory)
    #[arg(long, env = "SLIDEGEN_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl GenerateOptions {
    fn request(&self) -> TransformRequest {
        TransformRequest {
            source_type: self.source.clone(),
            airtable_url: self.airtable_url.clone(),
            airtable_api_key: self.airtable_api_key.clone(),
            filter: self.filter.clone(),
            raw_text: self.raw_text.clone(),
            raw_file: self.raw_file.clone(),
            format: self.format,
            template: self.template.clone(),
            destination: self.destination.clone(),
            layout: self.layout.clone(),
            ai_mapping: self.ai_map,
        }
    }
}

pub async fn run(options: GenerateOptions, global: crate::Global) -> Result<()> {
    let settings = load_settings(options.settings.as_deref())?;
    let refine = settings.refinement.enabled && !options.no_refine;

    if global.verbose {
        eprintln!("Deck directory: {}", global.deck_dir.display());
        eprintln!("Backend: {:?} (refine: {})", options.backend, refine);
    }

    let outcome = match build_backend(&options, &settings, refine).await {
        Ok(completion) => {
            let driver = DriverOptions {
                refine: refine && !matches!(completion, Backend::Disabled),
                placeholder_base: settings.images.placeholder_base.clone(),
                ..DriverOptions::default()
            };
            let store = JsonDeckStore::new(&global.deck_dir);
            match &options.image_dir {
                Some(dir) => {
                    execute(&options, store, completion, DirImageStore::new(dir), &driver).await
                }
                None => execute(&options, store, completion, NoImageStore, &driver).await,
            }
        }
        Err(e) => RunOutcome::error(e.kind(), e.details()),
    };

    if options.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }

    if outcome.is_error() {
        return Err(eyre!(
            "Generation failed with error {}",
            outcome.error_code.unwrap_or_else(|| ErrorKind::Unknown.code())
        ));
    }
    Ok(())
}

async fn execute<S: ImageStore>(
    options: &GenerateOptions,
    store: JsonDeckStore,
    completion: Backend,
    images: S,
    driver: &DriverOptions,
) -> RunOutcome {
    let mut services = Services {
        store,
        completion,
        fetcher: HttpFetcher::new(),
        images,
    };
    transform(&options.request(), &mut services, driver).await
}

/// Pick the completion backend.
///
/// Missing Gemini keys only fail the run when model mapping is requested;
/// otherwise refinement is switched off for the run.
async fn build_backend(
    options: &GenerateOptions,
    settings: &Settings,
    refine: bool,
) -> std::result::Result<Backend, Error> {
    if !refine && !options.ai_map {
        return Ok(Backend::Disabled);
    }

    match options.backend {
        BackendKind::Ollama => {
            let url = options
                .ollama_url
                .clone()
                .unwrap_or_else(|| settings.ollama.url.clone());
            let model = options
                .model
                .clone()
                .unwrap_or_else(|| settings.ollama.model.clone());
            OllamaClient::new(&url, model)
                .map(Backend::Ollama)
                .map_err(|e| Error::configuration(ErrorKind::MissingAiKeys, e.to_string()))
        }
        BackendKind::Gemini => {
            let keys = match gemini_keys_from_env() {
                Ok(keys) => keys,
                Err(e) if options.ai_map => return Err(e),
                Err(e) => {
                    log::warn!("{}; refinement disabled", e.details());
                    return Ok(Backend::Disabled);
                }
            };
            let model = options
                .gemini_model
                .clone()
                .unwrap_or_else(|| settings.gemini.model.clone());
            let state = match rotation_state_path() {
                Ok(path) => Some(RotationState::new(path)),
                Err(e) => {
                    log::warn!("Key rotation will not persist: {}", e);
                    None
                }
            };
            let http = GeminiHttp::new(settings.gemini.base_url.clone(), model);
            Ok(Backend::Gemini(
                Rotating::new(http, keys, state).restore().await,
            ))
        }
    }
}

fn print_outcome(outcome: &RunOutcome) {
    let status = match outcome.result {
        RunStatus::Success => outcome.result.to_string().green().bold(),
        RunStatus::NoData => outcome.result.to_string().yellow().bold(),
        RunStatus::Error => outcome.result.to_string().red().bold(),
    };
    println!("{}", status);

    let mut table = new_table();
    table.add_row(prettytable::row!["Message", outcome.message]);
    if !outcome.presentation_id.is_empty() {
        table.add_row(prettytable::row!["Presentation", outcome.presentation_id]);
    }
    if outcome.result == RunStatus::Success {
        table.add_row(prettytable::row!["Processed", outcome.processed]);
        table.add_row(prettytable::row!["Slides", outcome.slides_generated]);
    }
    if let Some(code) = outcome.error_code {
        table.add_row(prettytable::row!["Code", code]);
    }
    if let Some(category) = &outcome.error_category {
        table.add_row(prettytable::row!["Category", category]);
    }
    if let Some(details) = &outcome.details {
        table.add_row(prettytable::row!["Details", details]);
    }
    if let Some(suggestions) = &outcome.suggestions {
        table.add_row(prettytable::row!["Suggestions", suggestions]);
    }
    table.printstd();
}
