use std::fmt::Display;

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, Table};

/// Terminal table with the shared preset and a bold header row.
pub fn table<I, S>(headers: I) -> Table
where
    I: IntoIterator<Item = S>,
    S: Display,
{
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(
        headers
            .into_iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
            .collect::<Vec<_>>(),
    );
    table
}
