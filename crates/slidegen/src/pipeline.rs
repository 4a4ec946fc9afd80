use crate::completion::CompletionService;
use crate::config::AirtableConfig;
use crate::generate::driver::{generate_slides, DriverOptions, Services};
use crate::images::{BinaryFetch, ImageStore};
use crate::prelude::*;
use crate::sources::{AirtableSource, DataSource, RawTextSource};
use crate::store::DocumentStore;
use slidegen_core::ingest::{normalize_records, parse_table_url, DataFormat, Record};
use slidegen_core::item::Item;
use slidegen_core::mapping::{
    analysis_prompt, mapping_prompt, parse_mapping_response, ANALYSIS_SYSTEM_INSTRUCTION,
    MAPPING_SYSTEM_INSTRUCTION,
};
use slidegen_core::outcome::{ErrorKind, RunOutcome};
use slidegen_core::pairing::{pair, Layout};
use slidegen_core::template::{build_manifest, detect_layout, extract_deck_id, preset_manifest};
use std::path::PathBuf;

/// Everything one run needs to know, as given by the caller.
#[derive(Debug, Clone, Default)]
pub struct TransformRequest {
    /// `airtable`, or one of `raw_text`, `text`, `csv`, `json`.
    pub source_type: String,
    pub airtable_url: Option<String>,
    pub airtable_api_key: Option<String>,
    pub filter: Option<String>,
    pub raw_text: Option<String>,
    pub raw_file: Option<PathBuf>,
    pub format: Option<DataFormat>,
    pub template: Option<String>,
    pub destination: Option<String>,
    pub layout: Option<String>,
    pub ai_mapping: bool,
}

/// Validated run parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    pub template: String,
    pub destination: String,
    pub layout: Layout,
    pub ai_mapping: bool,
    pub filtered: bool,
}

pub enum Source {
    Airtable(AirtableSource),
    Raw(RawTextSource),
}

impl DataSource for Source {
    async fn fetch(&self) -> std::result::Result<Vec<Record>, Error> {
        match self {
            Source::Airtable(source) => source.fetch().await,
            Source::Raw(source) => source.fetch().await,
        }
    }

    fn raw_text(&self) -> Option<&str> {
        match self {
            Source::Airtable(source) => source.raw_text(),
            Source::Raw(source) => source.raw_text(),
        }
    }

    fn format(&self) -> Option<DataFormat> {
        match self {
            Source::Airtable(source) => source.format(),
            Source::Raw(source) => source.format(),
        }
    }
}

/// Run the whole transformation. Never fails: errors become an error outcome.
pub async fn transform<D, C, F, S>(
    request: &TransformRequest,
    services: &mut Services<D, C, F, S>,
    options: &DriverOptions,
) -> RunOutcome
where
    D: DocumentStore,
    C: CompletionService,
    F: BinaryFetch,
    S: ImageStore,
{
    match try_transform(request, services, options).await {
        Ok(outcome) => outcome,
        Err(e) => {
            log::warn!("{}", e);
            RunOutcome::error(e.kind(), e.details())
        }
    }
}

async fn try_transform<D, C, F, S>(
    request: &TransformRequest,
    services: &mut Services<D, C, F, S>,
    options: &DriverOptions,
) -> std::result::Result<RunOutcome, Error>
where
    D: DocumentStore,
    C: CompletionService,
    F: BinaryFetch,
    S: ImageStore,
{
    let plan = plan_run(request)?;
    log::info!(
        "Template '{}' -> '{}' ({} layout)",
        plan.template,
        plan.destination,
        plan.layout
    );
    let source = select_source(request).await?;
    run_with_source(&source, &plan, services, options).await
}

/// Validate deck references and decide the layout.
///
/// A layout named by the template wins over the requested one; without
/// either the layout is `single`.
pub fn plan_run(request: &TransformRequest) -> std::result::Result<RunPlan, Error> {
    let template = request.template.as_deref().filter(|t| !t.trim().is_empty());
    let destination = request
        .destination
        .as_deref()
        .filter(|d| !d.trim().is_empty());

    let (template, destination) = match (template, destination) {
        (Some(template), Some(destination)) => (template, destination),
        (None, None) => {
            return Err(Error::validation(
                ErrorKind::MissingDeckUrls,
                "template and destination are both missing",
            ))
        }
        (None, Some(_)) => {
            return Err(Error::template(
                ErrorKind::MissingTemplateId,
                "no template given",
            ))
        }
        (Some(_), None) => {
            return Err(Error::template(
                ErrorKind::MissingDestinationId,
                "no destination given",
            ))
        }
    };

    let requested = request
        .layout
        .as_deref()
        .filter(|l| !l.trim().is_empty())
        .map(str::parse::<Layout>)
        .transpose()
        .map_err(|e| Error::validation(ErrorKind::InvalidLayout, e.to_string()))?;
    let layout = detect_layout(template)
        .or(requested)
        .unwrap_or_default();

    Ok(RunPlan {
        template: extract_deck_id(template),
        destination: extract_deck_id(destination),
        layout,
        ai_mapping: request.ai_mapping,
        filtered: request
            .filter
            .as_deref()
            .is_some_and(|f| !f.trim().is_empty()),
    })
}

/// Build the data source named by `request.source_type`.
pub async fn select_source(request: &TransformRequest) -> std::result::Result<Source, Error> {
    match request.source_type.trim().to_lowercase().as_str() {
        "airtable" => {
            let url = request
                .airtable_url
                .as_deref()
                .filter(|u| !u.trim().is_empty())
                .ok_or_else(|| Error::upstream(ErrorKind::MissingSourceUrl, "no table URL given"))?;
            let location = parse_table_url(url)
                .ok_or_else(|| Error::upstream(ErrorKind::InvalidSourceUrl, url.to_string()))?;
            let config = AirtableConfig::from_env_or(request.airtable_api_key.clone())?;
            Ok(Source::Airtable(AirtableSource::new(
                config,
                location,
                request.filter.clone(),
            )))
        }
        kind @ ("raw_text" | "text" | "csv" | "json") => {
            let format = request.format.or(match kind {
                "csv" => Some(DataFormat::Csv),
                "json" => Some(DataFormat::Json),
                _ => None,
            });
            let source = match (&request.raw_text, &request.raw_file) {
                (Some(text), _) => RawTextSource::new(text.clone(), format),
                (None, Some(path)) => RawTextSource::from_file(path, format)
                    .await
                    .map_err(|e| Error::validation(ErrorKind::UnsupportedSource, e.to_string()))?,
                (None, None) => {
                    return Err(Error::validation(
                        ErrorKind::UnsupportedSource,
                        "no raw text or file given",
                    ))
                }
            };
            Ok(Source::Raw(source))
        }
        other => Err(Error::validation(
            ErrorKind::UnsupportedSource,
            format!("unknown source type '{}'", other),
        )),
    }
}

/// Fetch, normalize or map, pair and materialize.
pub async fn run_with_source<Src, D, C, F, S>(
    source: &Src,
    plan: &RunPlan,
    services: &mut Services<D, C, F, S>,
    options: &DriverOptions,
) -> std::result::Result<RunOutcome, Error>
where
    Src: DataSource,
    D: DocumentStore,
    C: CompletionService,
    F: BinaryFetch,
    S: ImageStore,
{
    let mut options = options.clone();
    let items = if plan.ai_mapping {
        map_with_model(source, plan, services).await?
    } else {
        let data = normalize_records(source.fetch().await?);
        if !data.image_fields.is_empty() {
            log::debug!("Image columns: {:?}", data.image_fields);
        }
        options.image_columns.extend(data.image_fields);
        data.items
    };

    if items.is_empty() {
        if plan.filtered {
            return Err(Error::upstream(
                ErrorKind::NoMatchingRecords,
                "the filter matched no records",
            ));
        }
        return Ok(RunOutcome::no_data("No data found to process"));
    }

    let count = items.len();
    let items = pair(items, plan.layout);
    log::info!("{} items -> {} slide groups", count, items.len());

    let report =
        generate_slides(services, &plan.template, &plan.destination, &items, &options).await?;
    Ok(RunOutcome::success(
        report.processed,
        report.slides_generated,
        report.message(),
        report.presentation_id,
    ))
}

/// Let the completion service map free-form input onto the template.
async fn map_with_model<Src, D, C, F, S>(
    source: &Src,
    plan: &RunPlan,
    services: &mut Services<D, C, F, S>,
) -> std::result::Result<Vec<Item>, Error>
where
    Src: DataSource,
    D: DocumentStore,
    C: CompletionService,
{
    let raw = match source.raw_text() {
        Some(text) => text.to_string(),
        None => serde_json::to_string_pretty(&source.fetch().await?)
            .map_err(|e| Error::upstream(ErrorKind::Unknown, e.to_string()))?,
    };

    let analysis = services
        .completion
        .complete(
            &analysis_prompt(&raw, source.format()),
            ANALYSIS_SYSTEM_INSTRUCTION,
        )
        .await
        .map_err(|e| Error::ai(ErrorKind::AiAllAttemptsFailed, e.to_string()))?;

    let template = services
        .store
        .open(&plan.template)
        .await
        .map_err(|e| Error::template(ErrorKind::TemplateUnreadable, e.to_string()))?;
    let mut manifest = build_manifest(&template);
    if manifest.fields.is_empty() {
        manifest = preset_manifest(&template.name, Some(plan.layout));
    }

    let response = services
        .completion
        .complete(
            &mapping_prompt(&raw, &manifest, &analysis, plan.layout),
            MAPPING_SYSTEM_INSTRUCTION,
        )
        .await
        .map_err(|e| Error::ai(ErrorKind::AiAllAttemptsFailed, e.to_string()))?;

    let mapped = parse_mapping_response(&response)
        .map_err(|e| Error::ai(ErrorKind::AiMappingUnparseable, e.to_string()))?;
    if let Some(metadata) = &mapped.metadata {
        log::debug!("Mapping metadata: {:?}", metadata);
    }
    Ok(mapped.items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::tests::ScriptedCompletion;
    use crate::completion::CompletionError;
    use crate::images::tests::FakeFetcher;
    use crate::images::NoImageStore;
    use crate::store::JsonDeckStore;
    use slidegen_core::deck::{Deck, Element, Geometry, Slide, TextStyle};
    use slidegen_core::outcome::RunStatus;

    type TestServices = Services<JsonDeckStore, ScriptedCompletion, FakeFetcher, NoImageStore>;

    async fn setup(dir: &std::path::Path, completion: ScriptedCompletion) -> TestServices {
        let services = Services {
            store: JsonDeckStore::new(dir),
            completion,
            fetcher: FakeFetcher::default(),
            images: NoImageStore,
        };
        let template = Deck {
            id: "tpl".to_string(),
            name: "Pitch".to_string(),
            slides: vec![Slide {
                object_id: "s1".to_string(),
                elements: vec![Element::shape(
                    "{{name}}",
                    Geometry::default(),
                    TextStyle::default(),
                )],
            }],
        };
        services.store.save(&template).await.unwrap();
        services
    }

    fn request(source_type: &str) -> TransformRequest {
        TransformRequest {
            source_type: source_type.to_string(),
            template: Some("tpl".to_string()),
            destination: Some("out".to_string()),
            ..TransformRequest::default()
        }
    }

    fn no_refine() -> DriverOptions {
        DriverOptions {
            refine: false,
            ..DriverOptions::default()
        }
    }

    #[test]
    fn test_plan_run_validation() {
        let mut req = request("json");
        req.template = None;
        req.destination = None;
        assert_eq!(plan_run(&req).unwrap_err().kind(), ErrorKind::MissingDeckUrls);

        req.destination = Some("out".to_string());
        assert_eq!(plan_run(&req).unwrap_err().kind(), ErrorKind::MissingTemplateId);

        let mut req = request("json");
        req.destination = Some("  ".to_string());
        assert_eq!(
            plan_run(&req).unwrap_err().kind(),
            ErrorKind::MissingDestinationId
        );

        let mut req = request("json");
        req.layout = Some("triple".to_string());
        assert_eq!(plan_run(&req).unwrap_err().kind(), ErrorKind::InvalidLayout);
    }

    #[test]
    fn test_plan_run_layout_and_ids() {
        let mut req = request("json");
        req.template = Some("https://docs.example/presentation/d/abc_123/edit".to_string());
        req.layout = Some("double".to_string());
        let plan = plan_run(&req).unwrap();
        assert_eq!(plan.template, "abc_123");
        assert_eq!(plan.layout, Layout::Double);

        req.template = Some("decks/Pitch single/tpl".to_string());
        assert_eq!(plan_run(&req).unwrap().layout, Layout::Single);

        req.layout = None;
        req.template = Some("tpl".to_string());
        assert_eq!(plan_run(&req).unwrap().layout, Layout::Single);
    }

    #[tokio::test]
    async fn test_select_source_errors() {
        let err = select_source(&request("airtable")).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::MissingSourceUrl);

        let mut req = request("airtable");
        req.airtable_url = Some("https://airtable.com/nothing".to_string());
        let err = select_source(&req).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidSourceUrl);

        let err = select_source(&request("spreadsheet")).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::UnsupportedSource);

        let err = select_source(&request("text")).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::UnsupportedSource);
    }

    #[tokio::test]
    async fn test_transform_raw_text_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let mut services = setup(dir.path(), ScriptedCompletion::default()).await;

        let mut req = request("csv");
        req.raw_text = Some("name\nAcme\nGlobex\n".to_string());
        let outcome = transform(&req, &mut services, &no_refine()).await;

        assert_eq!(outcome.result, RunStatus::Success);
        assert_eq!(outcome.processed, 2);
        assert_eq!(outcome.slides_generated, 2);
        assert_eq!(outcome.message, "Generated 2 slides for 2 items");

        let deck = services.store.open(&outcome.presentation_id).await.unwrap();
        assert_eq!(deck.slides[1].texts(), vec!["Globex"]);
    }

    #[tokio::test]
    async fn test_transform_double_layout_pairs() {
        let dir = tempfile::tempdir().unwrap();
        let mut services = setup(dir.path(), ScriptedCompletion::default()).await;

        let mut req = request("json");
        req.layout = Some("double".to_string());
        req.raw_text = Some(r#"[{"name": "A"}, {"name": "B"}, {"name": "C"}]"#.to_string());
        let outcome = transform(&req, &mut services, &no_refine()).await;

        assert_eq!(outcome.processed, 2);
        assert_eq!(outcome.slides_generated, 2);
    }

    #[tokio::test]
    async fn test_transform_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let mut services = setup(dir.path(), ScriptedCompletion::default()).await;

        let mut req = request("json");
        req.raw_text = Some("[]".to_string());
        let outcome = transform(&req, &mut services, &no_refine()).await;
        assert_eq!(outcome.result, RunStatus::NoData);
        assert!(!outcome.is_error());
    }

    #[tokio::test]
    async fn test_attachment_column_takes_image_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut services = setup(dir.path(), ScriptedCompletion::default()).await;
        let template = Deck {
            id: "tpl".to_string(),
            name: "Pitch".to_string(),
            slides: vec![Slide {
                object_id: "s1".to_string(),
                elements: vec![Element::shape(
                    "{{name}} {{Hero}}",
                    Geometry::default(),
                    TextStyle::default(),
                )],
            }],
        };
        services.store.save(&template).await.unwrap();

        let mut req = request("json");
        req.raw_text =
            Some(r#"[{"name": "Acme", "Hero": [{"url": "https://cdn.test/hero.png"}]}]"#.to_string());
        let outcome = transform(&req, &mut services, &no_refine()).await;

        assert_eq!(outcome.result, RunStatus::Success);
        assert_eq!(
            *services.fetcher.requested.borrow(),
            vec!["https://cdn.test/hero.png"]
        );
        let deck = services.store.open(&outcome.presentation_id).await.unwrap();
        assert!(deck.slides[0].texts()[0].starts_with("Acme [Image Error:"));
    }

    #[tokio::test]
    async fn test_transform_errors_become_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let mut services = setup(dir.path(), ScriptedCompletion::default()).await;

        let mut req = request("json");
        req.template = Some("missing".to_string());
        req.raw_text = Some(r#"[{"name": "A"}]"#.to_string());
        let outcome = transform(&req, &mut services, &no_refine()).await;
        assert!(outcome.is_error());
        assert_eq!(outcome.error_code, Some(503));
    }

    #[tokio::test]
    async fn test_model_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let completion = ScriptedCompletion::new(vec![
            Ok("Two companies, one per line.".to_string()),
            Ok("Here you go:\n{\"items\": [{\"name\": \"Acme\"}, {\"name\": \"Globex\"}]}".to_string()),
        ]);
        let mut services = setup(dir.path(), completion).await;

        let mut req = request("text");
        req.raw_text = Some("Acme and Globex are startups".to_string());
        req.ai_mapping = true;
        let outcome = transform(&req, &mut services, &no_refine()).await;

        assert_eq!(outcome.result, RunStatus::Success);
        assert_eq!(outcome.processed, 2);
        let prompts = &services.completion.prompts;
        assert_eq!(prompts[0].1, ANALYSIS_SYSTEM_INSTRUCTION);
        assert!(prompts[1].0.contains("Two companies, one per line."));
        assert!(prompts[1].0.contains("### {{name}}"));
    }

    #[tokio::test]
    async fn test_model_mapping_failures() {
        let dir = tempfile::tempdir().unwrap();
        let completion = ScriptedCompletion::new(vec![
            Ok("analysis".to_string()),
            Ok("I could not do it".to_string()),
        ]);
        let mut services = setup(dir.path(), completion).await;
        let mut req = request("text");
        req.raw_text = Some("whatever".to_string());
        req.ai_mapping = true;
        let outcome = transform(&req, &mut services, &no_refine()).await;
        assert_eq!(outcome.error_code, Some(402));

        let completion =
            ScriptedCompletion::new(vec![Err(CompletionError::Exhausted { attempts: 3 })]);
        let mut services = setup(dir.path(), completion).await;
        let outcome = transform(&req, &mut services, &no_refine()).await;
        assert_eq!(outcome.error_code, Some(401));
    }
}
