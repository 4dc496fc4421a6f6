use anyhow::{Context, Result};
use concepts_repository::config::AppConfig;
use concepts_repository::logic::compute_agreement_completion;
use concepts_repository::store::{AgreementStore, PostgresStore};

/// Rewrites stored agreements whose `is_completed` flag disagrees with their
/// code alternatives. `last_updated` is left as it is.
#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    let database_url = config.database_url()?;
    let store = PostgresStore::new(&database_url, config.max_connections()).await?;

    println!("Connected to database. Checking agreement completion flags...");

    let agreements = store
        .list_agreements()
        .await
        .context("Failed to load agreements")?;
    let total = agreements.len();
    println!("Found {} agreements", total);

    let mut fixed = 0;
    for (i, mut agreement) in agreements.into_iter().enumerate() {
        if (i + 1) % 10 == 0 || i + 1 == total {
            println!("Processing agreement {}/{}: {}", i + 1, total, agreement.name);
        }

        let completed = compute_agreement_completion(&agreement);
        if completed == agreement.is_completed {
            continue;
        }

        agreement.is_completed = completed;
        let name = agreement.name.clone();
        store
            .upsert_agreement(agreement)
            .await
            .with_context(|| format!("Failed to update agreement {name}"))?;
        fixed += 1;
    }

    println!("Backfill completed: {} of {} agreements updated", fixed, total);
    Ok(())
}
