use crate::prelude::{eprintln, println, *};
use crate::store::{DocumentStore, JsonDeckStore};
use colored::Colorize;
use slidegen_core::pairing::Layout;
use slidegen_core::template::{
    build_manifest, detect_layout, extract_deck_id, preset_manifest, TemplateManifest,
};

#[derive(Debug, clap::Args, Clone)]
pub struct ManifestOptions {
    /// Template deck id or share URL
    pub template: String,

    /// Layout preset used when the template exposes no placeholders
    #[arg(short, long)]
    pub layout: Option<Layout>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(options: ManifestOptions, global: crate::Global) -> Result<()> {
    let store = JsonDeckStore::new(&global.deck_dir);
    let id = extract_deck_id(&options.template);

    if global.verbose {
        eprintln!("Reading template {}", store.path_for(&id)?.display());
    }

    let deck = store.open(&id).await?;
    let manifest = template_manifest(&deck, &options.template, options.layout);

    if options.json {
        println!("{}", serde_json::to_string_pretty(&manifest)?);
    } else {
        print_manifest(&manifest);
    }
    Ok(())
}

/// Manifest discovered from the deck, falling back to the preset for the
/// template's name or layout when the deck has no placeholders.
pub fn template_manifest(
    deck: &slidegen_core::deck::Deck,
    template_ref: &str,
    layout: Option<Layout>,
) -> TemplateManifest {
    let manifest = build_manifest(deck);
    if !manifest.fields.is_empty() {
        return manifest;
    }
    log::info!("No placeholders in '{}', using preset fields", deck.name);
    preset_manifest(template_ref, layout.or_else(|| detect_layout(template_ref)))
}

fn print_manifest(manifest: &TemplateManifest) {
    println!("{}", manifest.name.bold());
    println!("{}", manifest.description);
    if manifest.slide_count > 0 {
        println!("Slides: {}", manifest.slide_count);
    }
    println!();

    let mut table = new_table();
    table.add_row(prettytable::row!["Field", "Required", "Description", "Seen on"]);
    for field in &manifest.fields {
        let required = if field.required {
            "yes".green().to_string()
        } else {
            "no".dimmed().to_string()
        };
        let seen_on = field
            .examples
            .iter()
            .map(|example| example.slide_number.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        table.add_row(prettytable::row![
            f!("{{{{{}}}}}", field.name),
            required,
            field.description,
            seen_on
        ]);
    }
    table.printstd();
}

#[cfg(test)]
mod tests {
    use super::*;
    use slidegen_core::deck::{Deck, Element, Geometry, Slide, TextStyle};

    fn deck(text: &str) -> Deck {
        Deck {
            id: "tpl".to_string(),
            name: "Template".to_string(),
            slides: vec![Slide {
                object_id: "s1".to_string(),
                elements: vec![Element::shape(text, Geometry::default(), TextStyle::default())],
            }],
        }
    }

    #[test]
    fn test_discovered_fields_win() {
        let manifest = template_manifest(&deck("Hi {{name}}"), "tpl", Some(Layout::Double));
        assert_eq!(manifest.field_names(), vec!["name"]);
    }

    #[test]
    fn test_preset_when_no_placeholders() {
        let manifest = template_manifest(&deck("Static text"), "tpl", Some(Layout::Double));
        assert_eq!(manifest.fields[0].name, "item1Name");

        let manifest = template_manifest(&deck("Static text"), "decks/double deck/edit", None);
        assert_eq!(manifest.fields[0].name, "item1Name");
    }
}
