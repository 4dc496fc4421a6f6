use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{
    Agreement, AgreementSummary, Annotation, AnnotationCodes, AnnotationSummary, Dataset,
    DetectionResult, InsertOutcome, Name, Recommendation, RelationshipNames, RenameOutcome,
    ResultKey, ScheduledJob, TruthElement,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate key in {collection}: {key}")]
    DuplicateKey {
        collection: &'static str,
        key: String,
    },

    #[error("storage backend failure: {0:#}")]
    Backend(#[from] anyhow::Error),

    #[error("stored document does not decode: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait::async_trait]
pub trait DatasetStore: Send + Sync {
    async fn get_dataset(&self, name: &str) -> StoreResult<Option<Dataset>>;
    /// Distinct names of all stored datasets.
    async fn list_dataset_names(&self) -> StoreResult<Vec<Name>>;
    async fn upsert_dataset(&self, dataset: Dataset) -> StoreResult<InsertOutcome>;
    /// Replaces only the ground truth. Returns false when no dataset has this name.
    async fn update_ground_truth(
        &self,
        name: &str,
        ground_truth: Vec<TruthElement>,
    ) -> StoreResult<bool>;
    async fn delete_dataset(&self, name: &str) -> StoreResult<u64>;
}

#[async_trait::async_trait]
pub trait AnnotationStore: Send + Sync {
    async fn get_annotation(&self, name: &str) -> StoreResult<Option<Annotation>>;
    async fn list_annotation_summaries(&self) -> StoreResult<Vec<AnnotationSummary>>;
    async fn list_annotations_for_dataset(&self, dataset: &str) -> StoreResult<Vec<Annotation>>;
    async fn list_annotation_codes(&self) -> StoreResult<Vec<AnnotationCodes>>;
    async fn upsert_annotation(&self, annotation: Annotation) -> StoreResult<InsertOutcome>;
    async fn delete_annotation(&self, name: &str) -> StoreResult<u64>;
}

#[async_trait::async_trait]
pub trait AgreementStore: Send + Sync {
    async fn get_agreement(&self, name: &str) -> StoreResult<Option<Agreement>>;
    async fn list_agreement_summaries(&self) -> StoreResult<Vec<AgreementSummary>>;
    async fn list_agreements(&self) -> StoreResult<Vec<Agreement>>;
    async fn upsert_agreement(&self, agreement: Agreement) -> StoreResult<InsertOutcome>;
    async fn delete_agreement(&self, name: &str) -> StoreResult<u64>;
}

#[async_trait::async_trait]
pub trait ResultStore: Send + Sync {
    async fn get_result(&self, key: &ResultKey) -> StoreResult<Option<DetectionResult>>;
    async fn list_results(&self) -> StoreResult<Vec<DetectionResult>>;
    async fn upsert_result(&self, result: DetectionResult) -> StoreResult<InsertOutcome>;
    /// Sets the display name only if the stored status allows it, in one
    /// atomic step.
    async fn rename_result(&self, key: &ResultKey, name: &str) -> StoreResult<RenameOutcome>;
    /// Removes every result started at this instant, whatever its method.
    async fn delete_results_started_at(&self, started_at: DateTime<Utc>) -> StoreResult<u64>;
}

/// Crawler job descriptors of one kind, keyed by date.
#[async_trait::async_trait]
pub trait JobStore<J: ScheduledJob>: Send + Sync {
    async fn list_jobs(&self) -> StoreResult<Vec<J>>;
    async fn upsert_job(&self, job: J) -> StoreResult<InsertOutcome>;
    async fn delete_job(&self, date: DateTime<Utc>) -> StoreResult<u64>;
    /// Returns false when no job is registered at this date.
    async fn reset_job_occurrence(&self, date: DateTime<Utc>) -> StoreResult<bool>;
}

#[async_trait::async_trait]
pub trait RecommendationStore: Send + Sync {
    async fn get_recommendation(&self, codename: &str) -> StoreResult<Option<Recommendation>>;
    /// Drops the whole table and stores the given rows. Readers see either
    /// the old or the new table. Returns the number of rows stored.
    async fn replace_recommendations(
        &self,
        recommendations: Vec<Recommendation>,
    ) -> StoreResult<usize>;
}

#[async_trait::async_trait]
pub trait VocabularyStore: Send + Sync {
    async fn tore_types(&self) -> StoreResult<Vec<String>>;
    async fn replace_tore_types(&self, tores: Vec<String>) -> StoreResult<()>;
    async fn relationship_names(&self) -> StoreResult<RelationshipNames>;
    async fn replace_relationship_names(&self, names: RelationshipNames) -> StoreResult<()>;
}

pub trait Store:
    DatasetStore
    + AnnotationStore
    + AgreementStore
    + ResultStore
    + JobStore<crate::model::CrawlerJob>
    + JobStore<crate::model::AppReviewCrawlerJob>
    + RecommendationStore
    + VocabularyStore
    + Send
    + Sync
{
}
