pub mod api;
pub mod config;
pub mod logic;
pub mod model;
pub mod stats;
pub mod store;

// Export API types
pub use api::handlers;
pub use api::routes;

pub use logic::{compute_agreement_completion, ValidationError};

// Export all model types
pub use model::*;

// Export store types
pub use store::{MemoryStore, PostgresStore, Store};

use std::sync::Arc;

use crate::api::handlers::ServiceState;
use crate::config::{AppConfig, StoreBackend};
use crate::stats::KappaSource;

/// Builds the full application around a store and a kappa source.
pub fn app<S: Store + 'static>(store: S, kappa: Arc<dyn KappaSource>) -> axum::Router {
    crate::api::routes::create_router::<S>().with_state(ServiceState::new(store, kappa))
}

/// Loads configuration, opens the configured store and serves until shutdown.
pub async fn run_server() -> anyhow::Result<()> {
    // Load configuration
    let config = AppConfig::load()?;
    println!(
        "Configuration loaded: server={}:{}, store={:?}",
        config.server.host, config.server.port, config.store.backend
    );

    let kappa = stats::kappa_source(&config.statistics)?;

    match config.store.backend {
        StoreBackend::Postgres => {
            println!("Connecting to PostgreSQL...");
            let database_url = config.database_url()?;
            let store = PostgresStore::new(&database_url, config.max_connections()).await?;

            println!("Running database migrations...");
            store.migrate().await?;

            serve(app(store, kappa), &config).await
        }
        StoreBackend::Memory => {
            log::warn!("Using the in-memory store, nothing is persisted");
            serve(app(MemoryStore::new(), kappa), &config).await
        }
    }
}

async fn serve(app: axum::Router, config: &AppConfig) -> anyhow::Result<()> {
    let bind_address = config.server_address();
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    println!("Concepts repository running on http://{}", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::model::{Agreement, Annotation, Dataset, MergeStatus};

    #[test]
    fn test_go_zero_values_decode() {
        // Older clients send Go zero values: null slices and year-1 timestamps
        let json = r#"{"name": "d1", "uploaded_at": "0001-01-01T00:00:00Z", "size": 0,
                       "documents": null, "ground_truth": null}"#;
        let dataset: Dataset = serde_json::from_str(json).unwrap();
        assert!(dataset.documents.is_empty());
        assert!(dataset.ground_truth.is_empty());

        let json = r#"{"name": "d1", "uploaded_at": "0001-01-01T00:00:00Z", "size": 0}"#;
        let dataset: Dataset = serde_json::from_str(json).unwrap();
        assert!(crate::model::is_zero_time(&dataset.uploaded_at));
        assert!(dataset.documents.is_empty());

        // Null elements and fields decode to zero values without shifting positions
        let json = r#"{"name": "a1", "dataset": "d1", "uploaded_at": "2021-05-01T10:00:00Z",
                       "tokens": [null, {"index": 1, "name": "app", "lemma": null}],
                       "codes": [null, {"index": 1, "name": "app", "tore": "Software",
                                        "tokens": [1], "relationship_memberships": [0]}],
                       "tore_relationships": [null], "docs": [null]}"#;
        let annotation: Annotation = serde_json::from_str(json).unwrap();
        assert_eq!(annotation.codes.len(), 2);
        assert_eq!(annotation.codes[1].name, "app");
        assert_eq!(annotation.tokens[1].lemma, "");
        assert_eq!(annotation.tore_relationships.len(), 1);
        assert_eq!(annotation.docs[0].end_index, 0);
        assert!(crate::logic::validate_annotation(&annotation).is_ok());

        let json = r#"{"name": "ag", "code_alternatives": [
                           {"annotation_name": "a1", "index": 0, "merge_status": null,
                            "code": null}]}"#;
        let agreement: Agreement = serde_json::from_str(json).unwrap();
        assert_eq!(agreement.code_alternatives[0].merge_status, MergeStatus::Pending);
        assert_eq!(agreement.code_alternatives[0].code.name, "");
    }

    #[test]
    fn test_agreement_payload_from_annotation_tool() {
        let json = r#"{
            "name": "agreement-1",
            "dataset": "reviews",
            "created_at": "2021-07-01T09:00:00.000Z",
            "annotation_names": ["anna", "ben"],
            "docs": [{"name": "review-1", "begin_index": 0, "end_index": 2}],
            "tokens": [
                {"index": 0, "name": "great", "lemma": "great", "pos": "JJ",
                 "num_name_codes": 0, "num_tore_codes": 0},
                {"index": 1, "name": "app", "lemma": "app", "pos": "NN",
                 "num_name_codes": 1, "num_tore_codes": 1}
            ],
            "tore_relationships": [],
            "code_alternatives": [
                {"annotation_name": "anna", "index": 0, "merge_status": "Accepted",
                 "code": {"index": 0, "name": "app", "tore": "Software",
                          "tokens": [1], "relationship_memberships": []}}
            ],
            "agreement_statistics": [],
            "is_completed": false
        }"#;
        let agreement: Agreement = serde_json::from_str(json).unwrap();
        assert_eq!(agreement.code_alternatives[0].merge_status, MergeStatus::Accepted);
        assert_eq!(agreement.annotation_names.len(), 2);

        let roundtrip = serde_json::to_value(&agreement).unwrap();
        assert_eq!(roundtrip["code_alternatives"][0]["code"]["tokens"][0], 1);
    }

    #[test]
    fn test_not_found_sentinel_shape() {
        let body = serde_json::to_value(Annotation::not_found()).unwrap();
        assert_eq!(body["name"], "");
        assert_eq!(body["tokens"], serde_json::json!([]));
    }
}
