use crate::completion::CompletionService;
use crate::images::{resolve_image, BinaryFetch, ImageStore};
use crate::prelude::*;
use crate::refine::refine_content;
use crate::store::DocumentStore;
use slidegen_core::classify::refinement_options;
use slidegen_core::deck::{Element, ElementBody, Geometry, Slide, TextStyle};
use slidegen_core::image::{
    image_dimensions, image_error_marker, place_image, ImageResolution, ImageSize,
    DEFAULT_PLACEHOLDER_BASE,
};
use slidegen_core::item::Item;
use slidegen_core::outcome::ErrorKind;
use slidegen_core::refine::{RefinementContext, RefinementOptions};
use slidegen_core::substitute::{plan_element, render, replace_marker};
use std::collections::{BTreeSet, HashMap};

pub const DEFAULT_DESTINATION_NAME: &str = "Generated Presentation";

/// External collaborators the driver talks to.
pub struct Services<D, C, F, S> {
    pub store: D,
    pub completion: C,
    pub fetcher: F,
    pub images: S,
}

#[derive(Debug, Clone)]
pub struct DriverOptions {
    pub refine: bool,
    pub placeholder_base: String,
    /// Columns known to hold image content, whatever their name.
    pub image_columns: BTreeSet<String>,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            refine: true,
            placeholder_base: DEFAULT_PLACEHOLDER_BASE.to_string(),
            image_columns: BTreeSet::new(),
        }
    }
}

/// Refined text keyed by field, original value and refinement options.
///
/// Lives for one generation run so a value repeated across elements or
/// slides costs one completion call.
#[derive(Debug, Default)]
pub struct RefinementCache {
    entries: HashMap<(String, String, RefinementOptions), String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationReport {
    pub presentation_id: String,
    pub processed: usize,
    pub failed: usize,
    pub slides_generated: usize,
}

impl GenerationReport {
    pub fn message(&self) -> String {
        let mut message = format!(
            "Generated {} slides for {} items",
            self.slides_generated, self.processed
        );
        if self.failed > 0 {
            message.push_str(&format!(" ({} items failed)", self.failed));
        }
        message
    }
}

/// Copy every template slide once per item into the destination deck,
/// filling placeholders from the item.
///
/// The destination is cleared first, or created when it cannot be opened.
/// A failing item is logged and skipped.
pub async fn generate_slides<D, C, F, S>(
    services: &mut Services<D, C, F, S>,
    template_id: &str,
    destination_id: &str,
    items: &[Item],
    options: &DriverOptions,
) -> std::result::Result<GenerationReport, Error>
where
    D: DocumentStore,
    C: CompletionService,
    F: BinaryFetch,
    S: ImageStore,
{
    let template = services
        .store
        .open(template_id)
        .await
        .map_err(|e| Error::template(ErrorKind::TemplateUnreadable, e.to_string()))?;
    template
        .ensure_not_empty()
        .map_err(|e| Error::template(ErrorKind::EmptyTemplate, e.to_string()))?;

    if destination_id == template.id {
        return Err(Error::template(
            ErrorKind::DestinationUnreadable,
            format!("Destination '{}' is the template deck", destination_id),
        ));
    }

    let destination = match services.store.open(destination_id).await {
        Ok(deck) => deck.id,
        Err(e) => {
            log::info!("Destination '{}' not available ({}), creating it", destination_id, e);
            services
                .store
                .create(DEFAULT_DESTINATION_NAME)
                .await
                .map_err(|e| Error::template(ErrorKind::DestinationUnreadable, e.to_string()))?
        }
    };

    services
        .store
        .reset(&destination, &format!("Generated from {}", template.name))
        .await
        .map_err(|e| Error::template(ErrorKind::DestinationUnreadable, e.to_string()))?;

    let mut report = GenerationReport {
        presentation_id: destination.clone(),
        processed: 0,
        failed: 0,
        slides_generated: 0,
    };

    let mut cache = RefinementCache::default();
    for (index, item) in items.iter().enumerate() {
        let mut appended = 0;
        let mut result = Ok(());
        for (slide_index, template_slide) in template.slides.iter().enumerate() {
            let mut slide = template_slide.clone();
            slide.object_id = format!("{}_item{}", template_slide.object_id, index + 1);
            populate_slide(
                services,
                &mut slide,
                item,
                slide_index + 1,
                options,
                &mut cache,
            )
            .await;

            if let Err(e) = services.store.append_slide(&destination, slide).await {
                result = Err(e);
                break;
            }
            appended += 1;
        }

        report.slides_generated += appended;
        match result {
            Ok(()) => {
                report.processed += 1;
                log::debug!("Item {} done ({} slides)", index + 1, appended);
            }
            Err(e) => {
                report.failed += 1;
                log::warn!("Item {} failed: {}", index + 1, e);
            }
        }
    }

    log::info!("{}", report.message());
    Ok(report)
}

/// Fill every text-bearing element of `slide` from `item`.
pub async fn populate_slide<D, C, F, S>(
    services: &mut Services<D, C, F, S>,
    slide: &mut Slide,
    item: &Item,
    slide_number: usize,
    options: &DriverOptions,
    cache: &mut RefinementCache,
) where
    C: CompletionService,
    F: BinaryFetch,
    S: ImageStore,
{
    let mut inserted = Vec::new();

    for element in slide.elements.iter_mut() {
        let anchor = element.geometry;
        match &mut element.body {
            ElementBody::Shape { text, style } | ElementBody::TextBox { text, style } => {
                if let Some(filled) = fill_text(
                    services,
                    text,
                    style,
                    anchor,
                    item,
                    slide_number,
                    options,
                    cache,
                    &mut inserted,
                )
                .await
                {
                    *text = filled;
                }
            }
            ElementBody::Table { cells, .. } => {
                for cell in cells.iter_mut().flatten() {
                    if let Some(filled) = fill_text(
                        services,
                        &cell.text,
                        &cell.style,
                        anchor,
                        item,
                        slide_number,
                        options,
                        cache,
                        &mut inserted,
                    )
                    .await
                    {
                        cell.text = filled;
                    }
                }
            }
            ElementBody::Image { .. } => {}
        }
    }

    slide.elements.extend(inserted);
}

/// Run both substitution stages over one text run.
///
/// Returns the new text, or `None` when nothing changed. Resolved images are
/// pushed to `inserted`.
#[allow(clippy::too_many_arguments)]
async fn fill_text<D, C, F, S>(
    services: &mut Services<D, C, F, S>,
    text: &str,
    style: &TextStyle,
    anchor: Geometry,
    item: &Item,
    slide_number: usize,
    options: &DriverOptions,
    cache: &mut RefinementCache,
    inserted: &mut Vec<Element>,
) -> Option<String>
where
    C: CompletionService,
    F: BinaryFetch,
    S: ImageStore,
{
    if text.trim().is_empty() {
        return None;
    }

    let mut plan = plan_element(text, item, &options.image_columns);
    if plan.is_empty() {
        return None;
    }

    if options.refine {
        let context = RefinementContext::from_style(style, slide_number);
        for (field, value) in plan.refinable() {
            let key = (
                field.to_string(),
                value.clone(),
                refinement_options(field, &context),
            );
            if let Some(refined) = cache.entries.get(&key) {
                *value = refined.clone();
                continue;
            }
            let outcome = refine_content(&mut services.completion, field, value, &key.2).await;
            *value = outcome.into_text();
            cache.entries.insert(key, value.clone());
        }
    }

    let rendered = render(&plan);
    let mut text_out = rendered.text.clone();

    for pending in &rendered.pending_images {
        let resolution = resolve_image(
            &services.fetcher,
            &services.images,
            &pending.value,
            ImageSize::from_geometry(&anchor),
            &options.placeholder_base,
        )
        .await;

        let replacement = match resolution {
            ImageResolution::Resolved { kind, payload } => {
                let geometry = place_image(&anchor, image_dimensions(&payload.data));
                log::debug!("Inserted {} image for '{}'", kind, pending.field);
                inserted.push(Element {
                    geometry,
                    body: ElementBody::Image {
                        mime_type: payload.mime_type,
                        data: payload.data,
                        source: Some(pending.field.clone()),
                    },
                });
                String::new()
            }
            ImageResolution::Failed { message, .. } => {
                log::warn!("Image '{}' failed: {}", pending.field, message);
                image_error_marker(&message)
            }
        };

        if let Some(next) = replace_marker(&text_out, &pending.field, &replacement) {
            text_out = next;
        }
    }

    rendered.changed(text).then_some(text_out)
}
