use crate::prelude::{eprintln, println, *};
use slidegen_core::ingest::{normalize_records, parse_raw_text, parse_with_format, DataFormat};
use slidegen_core::item::Item;
use slidegen_core::pairing::{pair, Layout};
use std::path::PathBuf;
use tokio::io::AsyncReadExt;

#[derive(Debug, clap::Args, Clone)]
pub struct PairOptions {
    /// File holding JSON, CSV or TSV records (reads stdin when omitted)
    pub input: Option<PathBuf>,

    /// Layout to pair for
    #[arg(short, long, default_value = "double")]
    pub layout: Layout,

    /// Input format; detected when omitted
    #[arg(long)]
    pub format: Option<DataFormat>,
}

pub async fn run(options: PairOptions, global: crate::Global) -> Result<()> {
    let raw = match &options.input {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .map_err(|e| eyre!("Failed to read {}: {}", path.display(), e))?,
        None => {
            let mut buffer = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buffer)
                .await
                .map_err(|e| eyre!("Failed to read stdin: {}", e))?;
            buffer
        }
    };

    let items = pair_text(&raw, options.format, options.layout)?;
    if global.verbose {
        eprintln!("{} paired records ({} layout)", items.len(), options.layout);
    }

    println!("{}", serde_json::to_string_pretty(&items)?);
    Ok(())
}

/// Parse and normalize `raw`, then pair the items for `layout`.
pub fn pair_text(raw: &str, format: Option<DataFormat>, layout: Layout) -> Result<Vec<Item>> {
    let records = match format {
        Some(format) => parse_with_format(raw, format)?,
        None => parse_raw_text(raw)?,
    };
    Ok(pair(normalize_records(records).items, layout))
}
