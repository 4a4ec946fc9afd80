use crate::prelude::{println, *};
use crate::store::{DocumentStore, JsonDeckStore};
use colored::Colorize;
use slidegen_core::template::{convert_deck, extract_deck_id};

#[derive(Debug, clap::Args, Clone)]
pub struct ConvertOptions {
    /// Deck id or share URL holding `[X]`, `<X>` or `${X}` placeholders
    pub deck: String,

    /// Write the converted deck under this id instead of in place
    #[arg(short, long)]
    pub output: Option<String>,

    /// Report what would change without writing
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn run(options: ConvertOptions, global: crate::Global) -> Result<()> {
    let store = JsonDeckStore::new(&global.deck_dir);
    let converted = convert(&store, &options).await?;

    let message = f!("Converted {} placeholders", converted);
    if converted == 0 {
        println!("{}", message.dimmed());
    } else if options.dry_run {
        println!("{} (dry run)", message.yellow());
    } else {
        println!("{}", message.green().bold());
    }
    Ok(())
}

/// Rewrite legacy placeholders and store the result. Returns the count.
pub async fn convert<D: DocumentStore>(store: &D, options: &ConvertOptions) -> Result<usize> {
    let mut deck = store.open(&extract_deck_id(&options.deck)).await?;
    let converted = convert_deck(&mut deck);
    log::debug!("{} placeholders converted in '{}'", converted, deck.name);

    if options.dry_run || converted == 0 {
        return Ok(converted);
    }
    if let Some(output) = &options.output {
        deck.id = output.clone();
    }
    store.save(&deck).await?;
    Ok(converted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use slidegen_core::deck::{Deck, Element, Geometry, Slide, TextStyle};

    async fn store_with_legacy(dir: &std::path::Path) -> JsonDeckStore {
        let store = JsonDeckStore::new(dir);
        let deck = Deck {
            id: "legacy".to_string(),
            name: "Legacy".to_string(),
            slides: vec![Slide {
                object_id: "s1".to_string(),
                elements: vec![Element::shape(
                    "[Name] the <Role> from ${City}",
                    Geometry::default(),
                    TextStyle::default(),
                )],
            }],
        };
        store.save(&deck).await.unwrap();
        store
    }

    fn options(output: Option<&str>, dry_run: bool) -> ConvertOptions {
        ConvertOptions {
            deck: "legacy".to_string(),
            output: output.map(str::to_string),
            dry_run,
        }
    }

    #[tokio::test]
    async fn test_convert_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with_legacy(dir.path()).await;

        assert_eq!(convert(&store, &options(None, false)).await.unwrap(), 3);
        let deck = store.open("legacy").await.unwrap();
        assert_eq!(deck.slides[0].texts(), vec!["{{Name}} the {{Role}} from {{City}}"]);
    }

    #[tokio::test]
    async fn test_convert_to_output_and_dry_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with_legacy(dir.path()).await;

        assert_eq!(convert(&store, &options(None, true)).await.unwrap(), 3);
        let deck = store.open("legacy").await.unwrap();
        assert_eq!(deck.slides[0].texts(), vec!["[Name] the <Role> from ${City}"]);

        convert(&store, &options(Some("converted"), false)).await.unwrap();
        assert!(store.path_for("converted").unwrap().exists());
        let original = store.open("legacy").await.unwrap();
        assert_eq!(original.slides[0].texts(), vec!["[Name] the <Role> from ${City}"]);
    }
}
