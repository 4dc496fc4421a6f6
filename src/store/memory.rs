use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};

use crate::model::{
    Agreement, AgreementSummary, Annotation, AnnotationCodes, AnnotationSummary,
    AppReviewCrawlerJob, CrawlerJob, Dataset, DetectionResult, InsertOutcome, Name,
    Recommendation, RelationshipNames, RenameOutcome, ResultKey, ScheduledJob, TruthElement,
};
use crate::store::traits::{
    AgreementStore, AnnotationStore, DatasetStore, JobStore, RecommendationStore, ResultStore,
    Store, StoreResult, VocabularyStore,
};

/// In-process store used by tests and for running without a database.
///
/// Every collection sits behind its own lock, keyed the same way as the
/// unique indexes of the Postgres tables. Each operation takes a single
/// lock, so compound writes are atomic with respect to readers.
#[derive(Debug, Default)]
pub struct MemoryStore {
    datasets: RwLock<BTreeMap<Name, Dataset>>,
    annotations: RwLock<BTreeMap<Name, Annotation>>,
    agreements: RwLock<BTreeMap<Name, Agreement>>,
    results: RwLock<BTreeMap<ResultKey, DetectionResult>>,
    crawler_jobs: RwLock<BTreeMap<DateTime<Utc>, CrawlerJob>>,
    app_review_crawler_jobs: RwLock<BTreeMap<DateTime<Utc>, AppReviewCrawlerJob>>,
    recommendations: RwLock<BTreeMap<String, Recommendation>>,
    tore_types: RwLock<Vec<String>>,
    relationship_names: RwLock<RelationshipNames>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn upsert<K: Ord, V>(collection: &RwLock<BTreeMap<K, V>>, key: K, value: V) -> InsertOutcome {
    match collection.write().insert(key, value) {
        Some(_) => InsertOutcome::Replaced,
        None => InsertOutcome::Inserted,
    }
}

fn remove<K: Ord, V>(collection: &RwLock<BTreeMap<K, V>>, key: &K) -> u64 {
    u64::from(collection.write().remove(key).is_some())
}

#[async_trait::async_trait]
impl DatasetStore for MemoryStore {
    async fn get_dataset(&self, name: &str) -> StoreResult<Option<Dataset>> {
        Ok(self.datasets.read().get(name).cloned())
    }

    async fn list_dataset_names(&self) -> StoreResult<Vec<Name>> {
        Ok(self.datasets.read().keys().cloned().collect())
    }

    async fn upsert_dataset(&self, dataset: Dataset) -> StoreResult<InsertOutcome> {
        Ok(upsert(&self.datasets, dataset.name.clone(), dataset))
    }

    async fn update_ground_truth(
        &self,
        name: &str,
        ground_truth: Vec<TruthElement>,
    ) -> StoreResult<bool> {
        let mut datasets = self.datasets.write();
        let Some(dataset) = datasets.get_mut(name) else {
            return Ok(false);
        };
        dataset.ground_truth = ground_truth;
        Ok(true)
    }

    async fn delete_dataset(&self, name: &str) -> StoreResult<u64> {
        Ok(remove(&self.datasets, &name.to_string()))
    }
}

#[async_trait::async_trait]
impl AnnotationStore for MemoryStore {
    async fn get_annotation(&self, name: &str) -> StoreResult<Option<Annotation>> {
        Ok(self.annotations.read().get(name).cloned())
    }

    async fn list_annotation_summaries(&self) -> StoreResult<Vec<AnnotationSummary>> {
        Ok(self
            .annotations
            .read()
            .values()
            .map(AnnotationSummary::from)
            .collect())
    }

    async fn list_annotations_for_dataset(&self, dataset: &str) -> StoreResult<Vec<Annotation>> {
        Ok(self
            .annotations
            .read()
            .values()
            .filter(|a| a.dataset == dataset)
            .cloned()
            .collect())
    }

    async fn list_annotation_codes(&self) -> StoreResult<Vec<AnnotationCodes>> {
        Ok(self
            .annotations
            .read()
            .values()
            .map(AnnotationCodes::from)
            .collect())
    }

    async fn upsert_annotation(&self, annotation: Annotation) -> StoreResult<InsertOutcome> {
        Ok(upsert(&self.annotations, annotation.name.clone(), annotation))
    }

    async fn delete_annotation(&self, name: &str) -> StoreResult<u64> {
        Ok(remove(&self.annotations, &name.to_string()))
    }
}

#[async_trait::async_trait]
impl AgreementStore for MemoryStore {
    async fn get_agreement(&self, name: &str) -> StoreResult<Option<Agreement>> {
        Ok(self.agreements.read().get(name).cloned())
    }

    async fn list_agreement_summaries(&self) -> StoreResult<Vec<AgreementSummary>> {
        Ok(self
            .agreements
            .read()
            .values()
            .map(AgreementSummary::from)
            .collect())
    }

    async fn list_agreements(&self) -> StoreResult<Vec<Agreement>> {
        Ok(self.agreements.read().values().cloned().collect())
    }

    async fn upsert_agreement(&self, agreement: Agreement) -> StoreResult<InsertOutcome> {
        Ok(upsert(&self.agreements, agreement.name.clone(), agreement))
    }

    async fn delete_agreement(&self, name: &str) -> StoreResult<u64> {
        Ok(remove(&self.agreements, &name.to_string()))
    }
}

#[async_trait::async_trait]
impl ResultStore for MemoryStore {
    async fn get_result(&self, key: &ResultKey) -> StoreResult<Option<DetectionResult>> {
        Ok(self.results.read().get(key).cloned())
    }

    async fn list_results(&self) -> StoreResult<Vec<DetectionResult>> {
        Ok(self.results.read().values().cloned().collect())
    }

    async fn upsert_result(&self, result: DetectionResult) -> StoreResult<InsertOutcome> {
        let result = result.normalized();
        Ok(upsert(&self.results, result.key(), result))
    }

    async fn rename_result(&self, key: &ResultKey, name: &str) -> StoreResult<RenameOutcome> {
        let mut results = self.results.write();
        let Some(result) = results.get_mut(key) else {
            return Ok(RenameOutcome::NotFound);
        };
        if !result.is_renamable() {
            return Ok(RenameOutcome::Conflict {
                status: result.status.clone(),
            });
        }
        result.name = Some(name.to_string());
        Ok(RenameOutcome::Renamed)
    }

    async fn delete_results_started_at(&self, started_at: DateTime<Utc>) -> StoreResult<u64> {
        let mut results = self.results.write();
        let before = results.len();
        results.retain(|key, _| key.started_at != started_at);
        Ok((before - results.len()) as u64)
    }
}

fn list_jobs<J: ScheduledJob>(jobs: &RwLock<BTreeMap<DateTime<Utc>, J>>) -> Vec<J> {
    jobs.read().values().cloned().collect()
}

fn upsert_job<J: ScheduledJob>(
    jobs: &RwLock<BTreeMap<DateTime<Utc>, J>>,
    mut job: J,
) -> InsertOutcome {
    job.normalize_date();
    upsert(jobs, job.date(), job)
}

fn reset_job<J: ScheduledJob>(
    jobs: &RwLock<BTreeMap<DateTime<Utc>, J>>,
    date: &DateTime<Utc>,
) -> bool {
    match jobs.write().get_mut(date) {
        Some(job) => {
            job.reset_occurrence();
            true
        }
        None => false,
    }
}

#[async_trait::async_trait]
impl JobStore<CrawlerJob> for MemoryStore {
    async fn list_jobs(&self) -> StoreResult<Vec<CrawlerJob>> {
        Ok(list_jobs(&self.crawler_jobs))
    }

    async fn upsert_job(&self, job: CrawlerJob) -> StoreResult<InsertOutcome> {
        Ok(upsert_job(&self.crawler_jobs, job))
    }

    async fn delete_job(&self, date: DateTime<Utc>) -> StoreResult<u64> {
        Ok(remove(&self.crawler_jobs, &date))
    }

    async fn reset_job_occurrence(&self, date: DateTime<Utc>) -> StoreResult<bool> {
        Ok(reset_job(&self.crawler_jobs, &date))
    }
}

#[async_trait::async_trait]
impl JobStore<AppReviewCrawlerJob> for MemoryStore {
    async fn list_jobs(&self) -> StoreResult<Vec<AppReviewCrawlerJob>> {
        Ok(list_jobs(&self.app_review_crawler_jobs))
    }

    async fn upsert_job(&self, job: AppReviewCrawlerJob) -> StoreResult<InsertOutcome> {
        Ok(upsert_job(&self.app_review_crawler_jobs, job))
    }

    async fn delete_job(&self, date: DateTime<Utc>) -> StoreResult<u64> {
        Ok(remove(&self.app_review_crawler_jobs, &date))
    }

    async fn reset_job_occurrence(&self, date: DateTime<Utc>) -> StoreResult<bool> {
        Ok(reset_job(&self.app_review_crawler_jobs, &date))
    }
}

#[async_trait::async_trait]
impl RecommendationStore for MemoryStore {
    async fn get_recommendation(&self, codename: &str) -> StoreResult<Option<Recommendation>> {
        Ok(self.recommendations.read().get(codename).cloned())
    }

    async fn replace_recommendations(
        &self,
        recommendations: Vec<Recommendation>,
    ) -> StoreResult<usize> {
        let mut table = self.recommendations.write();
        table.clear();
        // First row per codename wins, like an insert under a unique index.
        let mut seen = BTreeSet::new();
        for recommendation in recommendations {
            if seen.insert(recommendation.codename.clone()) {
                table.insert(recommendation.codename.clone(), recommendation);
            }
        }
        Ok(table.len())
    }
}

#[async_trait::async_trait]
impl VocabularyStore for MemoryStore {
    async fn tore_types(&self) -> StoreResult<Vec<String>> {
        Ok(self.tore_types.read().clone())
    }

    async fn replace_tore_types(&self, tores: Vec<String>) -> StoreResult<()> {
        *self.tore_types.write() = tores;
        Ok(())
    }

    async fn relationship_names(&self) -> StoreResult<RelationshipNames> {
        Ok(self.relationship_names.read().clone())
    }

    async fn replace_relationship_names(&self, names: RelationshipNames) -> StoreResult<()> {
        *self.relationship_names.write() = names;
        Ok(())
    }
}

impl Store for MemoryStore {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{STATUS_FINISHED, TruthElement};
    use chrono::TimeZone;

    fn started() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 4, 1, 8, 30, 0).unwrap()
    }

    fn result(method: &str, status: &str) -> DetectionResult {
        DetectionResult {
            method: method.to_string(),
            status: status.to_string(),
            started_at: started(),
            dataset_name: "d1".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn upsert_reports_insert_then_replace() {
        let store = MemoryStore::new();
        let dataset = Dataset {
            name: "d1".to_string(),
            size: 1,
            ..Default::default()
        };
        assert_eq!(
            store.upsert_dataset(dataset.clone()).await.unwrap(),
            InsertOutcome::Inserted
        );
        assert_eq!(
            store.upsert_dataset(dataset).await.unwrap(),
            InsertOutcome::Replaced
        );
        assert_eq!(store.list_dataset_names().await.unwrap(), vec!["d1"]);
    }

    #[tokio::test]
    async fn ground_truth_patch_needs_existing_dataset() {
        let store = MemoryStore::new();
        let truth = vec![TruthElement {
            id: "1".to_string(),
            value: "positive".to_string(),
        }];
        assert!(!store.update_ground_truth("d1", truth.clone()).await.unwrap());

        store
            .upsert_dataset(Dataset {
                name: "d1".to_string(),
                size: 4,
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(store.update_ground_truth("d1", truth.clone()).await.unwrap());

        let stored = store.get_dataset("d1").await.unwrap().unwrap();
        assert_eq!(stored.ground_truth, truth);
        assert_eq!(stored.size, 4);
    }

    #[tokio::test]
    async fn rename_checks_the_stored_status() {
        let store = MemoryStore::new();
        let key = ResultKey::new("lda", started());
        assert_eq!(
            store.rename_result(&key, "x").await.unwrap(),
            RenameOutcome::NotFound
        );

        store.upsert_result(result("lda", "running")).await.unwrap();
        assert_eq!(
            store.rename_result(&key, "x").await.unwrap(),
            RenameOutcome::Conflict {
                status: "running".to_string()
            }
        );

        store
            .upsert_result(result("lda", STATUS_FINISHED))
            .await
            .unwrap();
        assert_eq!(
            store.rename_result(&key, "x").await.unwrap(),
            RenameOutcome::Renamed
        );
        let stored = store.get_result(&key).await.unwrap().unwrap();
        assert_eq!(stored.name.as_deref(), Some("x"));
    }

    #[tokio::test]
    async fn delete_by_start_time_spans_methods() {
        let store = MemoryStore::new();
        store.upsert_result(result("lda", "finished")).await.unwrap();
        store.upsert_result(result("bert", "failed")).await.unwrap();

        assert_eq!(store.delete_results_started_at(started()).await.unwrap(), 2);
        assert_eq!(store.delete_results_started_at(started()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn recommendation_replace_drops_old_rows() {
        let store = MemoryStore::new();
        let row = |codename: &str, tore: &str| Recommendation {
            codename: codename.to_string(),
            tore_codes: vec![tore.to_string()],
        };
        store
            .replace_recommendations(vec![row("app", "Software")])
            .await
            .unwrap();
        let stored = store
            .replace_recommendations(vec![row("user", "Stakeholder"), row("user", "Task")])
            .await
            .unwrap();

        assert_eq!(stored, 1);
        assert!(store.get_recommendation("app").await.unwrap().is_none());
        assert_eq!(
            store.get_recommendation("user").await.unwrap().unwrap().tore_codes,
            vec!["Stakeholder"]
        );
    }

    #[tokio::test]
    async fn job_reset_by_date() {
        let store = MemoryStore::new();
        let job = CrawlerJob {
            date: started(),
            occurrence: 5,
            ..Default::default()
        };
        JobStore::<CrawlerJob>::upsert_job(&store, job).await.unwrap();

        assert!(JobStore::<CrawlerJob>::reset_job_occurrence(&store, started())
            .await
            .unwrap());
        let jobs = JobStore::<CrawlerJob>::list_jobs(&store).await.unwrap();
        assert_eq!(jobs[0].occurrence, 0);

        let elsewhere = started() + chrono::Duration::days(1);
        assert!(!JobStore::<AppReviewCrawlerJob>::reset_job_occurrence(&store, started())
            .await
            .unwrap());
        assert!(!JobStore::<CrawlerJob>::reset_job_occurrence(&store, elsewhere)
            .await
            .unwrap());
    }
}
