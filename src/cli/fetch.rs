use super::ui::{self, StyleType};
use crate::core::QuoteFetcher;
use anyhow::Result;

/// Fetches one quote and prints it without touching the database.
pub async fn run(fetcher: &dyn QuoteFetcher, pair: &str) -> Result<()> {
    let pb = ui::new_spinner(&format!("Fetching {pair}"));
    let result = fetcher.fetch(pair).await;
    pb.finish_and_clear();

    let record = result?;
    println!("\n{}", ui::style_text("Exchange Rate", StyleType::Title));
    println!("{}", ui::rate_table(&[record]));
    Ok(())
}
