use super::ui::{self, StyleType};
use crate::core::QuoteFetcher;
use crate::ingest::IngestionService;
use crate::store::RateStore;
use anyhow::Result;

/// Runs one ingestion cycle and reports the outcome.
pub async fn run<F, S>(service: &IngestionService<F, S>, pair: &str) -> Result<()>
where
    F: QuoteFetcher,
    S: RateStore,
{
    let pb = ui::new_spinner(&format!("Ingesting {pair}"));
    let result = service.ingest_once(pair).await;
    pb.finish_and_clear();

    match result {
        Ok(record) => {
            println!("\n{}", ui::style_text("Stored", StyleType::Success));
            println!("{}", ui::rate_table(&[record]));
            Ok(())
        }
        Err(err) => {
            eprintln!(
                "{} {}",
                ui::style_text(&format!("{} stage failed:", err.stage()), StyleType::Error),
                ui::style_text(&err.to_string(), StyleType::Subtle)
            );
            Err(err.into())
        }
    }
}
