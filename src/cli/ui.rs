use chrono::Utc;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::core::RateRecord;

/// Defines different styles for text elements.
pub enum StyleType {
    Title,
    Success,
    Error,
    Subtle,
}

/// Applies a consistent style to a string.
pub fn style_text(text: &str, style_type: StyleType) -> String {
    let styled = match style_type {
        StyleType::Title => style(text).bold().underlined(),
        StyleType::Success => style(text).green().bold(),
        StyleType::Error => style(text).red(),
        StyleType::Subtle => style(text).dim(),
    };
    styled.to_string()
}

/// Creates a new `comfy_table::Table` with standard styling.
pub fn new_styled_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Creates a styled header cell for a table.
pub fn header_cell(text: &str) -> Cell {
    Cell::new(text)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

/// Human readable age of a provider timestamp, e.g. "3h ago".
pub fn format_age(record: &RateRecord) -> String {
    let Some(observed) = record.observed_at_utc() else {
        return "N/A".to_string();
    };
    let minutes = (Utc::now() - observed).num_minutes();
    match minutes {
        m if m < 0 => "in the future".to_string(),
        m if m < 60 => format!("{m}m ago"),
        m if m < 60 * 48 => format!("{}h ago", m / 60),
        m => format!("{}d ago", m / (60 * 24)),
    }
}

/// Renders fetched records, one row per record.
pub fn rate_table(records: &[RateRecord]) -> Table {
    let mut table = new_styled_table();
    table.set_header(vec![
        header_cell("Pair"),
        header_cell("Rate"),
        header_cell("Observed (UTC)"),
        header_cell("Age"),
    ]);
    for record in records {
        table.add_row(vec![
            Cell::new(record.currency_pair()).add_attribute(Attribute::Bold),
            Cell::new(record.exchange_rate()).set_alignment(CellAlignment::Right),
            Cell::new(record.observed_at()),
            Cell::new(format_age(record)).fg(Color::DarkGrey),
        ]);
    }
    table
}

/// Creates a spinner shown while network or database I/O is in flight.
pub fn new_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
