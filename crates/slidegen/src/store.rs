use crate::prelude::*;
use slidegen_core::deck::{Deck, Slide};
use std::path::PathBuf;

/// Where templates are read from and generated decks written to.
#[allow(async_fn_in_trait)]
pub trait DocumentStore {
    async fn open(&self, id: &str) -> Result<Deck>;

    /// Create an empty deck and return its id.
    async fn create(&self, name: &str) -> Result<String>;

    /// Drop every slide and rename the deck.
    async fn reset(&self, id: &str, name: &str) -> Result<()>;

    async fn append_slide(&self, id: &str, slide: Slide) -> Result<()>;

    async fn save(&self, deck: &Deck) -> Result<()>;
}

/// Decks stored as `<id>.json` files in one directory.
#[derive(Debug, Clone)]
pub struct JsonDeckStore {
    dir: PathBuf,
}

impl JsonDeckStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// File backing `id`. Ids are plain file stems and never name a path.
    pub fn path_for(&self, id: &str) -> Result<PathBuf> {
        if id.is_empty() || id.contains(['/', '\\']) || id.contains("..") {
            return Err(eyre!("Invalid deck id '{}'", id));
        }
        Ok(self.dir.join(format!("{}.json", id)))
    }

    fn new_id(&self) -> String {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let mut id = format!("deck-{:x}", nanos);
        let mut suffix = 1;
        while self.dir.join(format!("{}.json", id)).exists() {
            id = format!("deck-{:x}-{}", nanos, suffix);
            suffix += 1;
        }
        id
    }
}

impl DocumentStore for JsonDeckStore {
    async fn open(&self, id: &str) -> Result<Deck> {
        let path = self.path_for(id)?;
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| eyre!("Failed to open deck '{}' ({}): {}", id, path.display(), e))?;
        let mut deck = Deck::from_json(&content).map_err(|e| eyre!("{} ({})", e, path.display()))?;
        deck.id = id.to_string();
        Ok(deck)
    }

    async fn create(&self, name: &str) -> Result<String> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| eyre!("Failed to create deck directory: {}", e))?;
        let id = self.new_id();
        self.save(&Deck::new(&id, name)).await?;
        Ok(id)
    }

    async fn reset(&self, id: &str, name: &str) -> Result<()> {
        let mut deck = self.open(id).await?;
        deck.name = name.to_string();
        deck.slides.clear();
        self.save(&deck).await
    }

    async fn append_slide(&self, id: &str, slide: Slide) -> Result<()> {
        let mut deck = self.open(id).await?;
        deck.slides.push(slide);
        self.save(&deck).await
    }

    async fn save(&self, deck: &Deck) -> Result<()> {
        let path = self.path_for(&deck.id)?;
        let content = deck.to_json().map_err(|e| eyre!("{}", e))?;
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| eyre!("Failed to write deck to {}: {}", path.display(), e))
    }
}
