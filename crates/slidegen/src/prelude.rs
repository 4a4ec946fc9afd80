pub use crate::error::Error;

pub use anstream::{eprintln, println};
pub use color_eyre::eyre::{eyre, Result};
pub use std::format as f;

/// Borderless table for terminal reports.
pub fn new_table() -> prettytable::Table {
    let mut table = prettytable::Table::new();
    table.set_format(
        prettytable::format::FormatBuilder::new()
            .column_separator(' ')
            .padding(1, 1)
            .build(),
    );
    table
}
