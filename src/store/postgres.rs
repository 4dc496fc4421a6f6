use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use sqlx::{postgres::PgPoolOptions, postgres::PgRow, PgPool, Row};

use crate::model::{
    Agreement, AgreementSummary, Annotation, AnnotationCodes, AnnotationSummary,
    AppReviewCrawlerJob, CrawlerJob, Dataset, DetectionResult, InsertOutcome, Name,
    Recommendation, RelationshipNames, RenameOutcome, ResultKey, ScheduledJob, TruthElement,
    RENAMABLE_STATUSES,
};
use crate::store::traits::{
    AgreementStore, AnnotationStore, DatasetStore, JobStore, RecommendationStore, ResultStore,
    Store, StoreError, StoreResult, VocabularyStore,
};

/// Every collection is a table holding the full entity as a JSONB `doc`,
/// with its natural key copied into real columns under a unique index.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS datasets (
        name TEXT PRIMARY KEY,
        uploaded_at TIMESTAMPTZ NOT NULL,
        doc JSONB NOT NULL
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS datasets_name_uploaded_at ON datasets (name, uploaded_at)",
    r#"
    CREATE TABLE IF NOT EXISTS annotations (
        name TEXT PRIMARY KEY,
        dataset TEXT NOT NULL,
        doc JSONB NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS annotations_dataset ON annotations (dataset)",
    r#"
    CREATE TABLE IF NOT EXISTS agreements (
        name TEXT PRIMARY KEY,
        dataset TEXT NOT NULL,
        doc JSONB NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS detection_results (
        method TEXT NOT NULL,
        started_at TIMESTAMPTZ NOT NULL,
        doc JSONB NOT NULL,
        PRIMARY KEY (method, started_at)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS detection_results_started_at ON detection_results (started_at)",
    r#"
    CREATE TABLE IF NOT EXISTS crawler_jobs (
        date TIMESTAMPTZ PRIMARY KEY,
        doc JSONB NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS app_review_crawler_jobs (
        date TIMESTAMPTZ PRIMARY KEY,
        doc JSONB NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS recommendations (
        codename TEXT PRIMARY KEY,
        doc JSONB NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tore_types (
        position INTEGER PRIMARY KEY,
        name TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS relationship_names (
        position INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        owner TEXT NOT NULL
    )
    "#,
];

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store with the given database URL
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self { pool })
    }

    /// Create the collection tables and their unique indexes if missing
    pub async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .with_context(|| {
                    format!("Failed to apply schema statement: {}", statement.trim())
                })?;
        }
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(row: &PgRow) -> StoreResult<T> {
    let doc: serde_json::Value = row.try_get("doc").context("Failed to read doc column")?;
    Ok(serde_json::from_value(doc)?)
}

fn decode_all<T: DeserializeOwned>(rows: &[PgRow]) -> StoreResult<Vec<T>> {
    rows.iter().map(decode).collect()
}

fn outcome(row: &PgRow) -> StoreResult<InsertOutcome> {
    let inserted: bool = row
        .try_get("inserted")
        .context("Failed to read upsert outcome")?;
    Ok(if inserted {
        InsertOutcome::Inserted
    } else {
        InsertOutcome::Replaced
    })
}

/// Separates unique-index violations from other backend failures.
fn classify(collection: &'static str, key: impl Into<String>, err: sqlx::Error) -> StoreError {
    let duplicate = err
        .as_database_error()
        .map_or(false, |db| db.is_unique_violation());
    if duplicate {
        StoreError::DuplicateKey {
            collection,
            key: key.into(),
        }
    } else {
        StoreError::Backend(anyhow::Error::new(err).context(format!("{collection} write failed")))
    }
}

/// Upserts already replace on the primary key, so a duplicate can only come
/// from a concurrent writer on a secondary index. The row is then in place.
fn tolerate_duplicate(result: StoreResult<InsertOutcome>) -> StoreResult<InsertOutcome> {
    match result {
        Err(StoreError::DuplicateKey { collection, key }) => {
            log::warn!("Concurrent write on {collection} {key}, keeping stored row");
            Ok(InsertOutcome::Replaced)
        }
        other => other,
    }
}

#[async_trait::async_trait]
impl DatasetStore for PostgresStore {
    async fn get_dataset(&self, name: &str) -> StoreResult<Option<Dataset>> {
        let row = sqlx::query("SELECT doc FROM datasets WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch dataset")?;

        row.as_ref().map(decode).transpose()
    }

    async fn list_dataset_names(&self) -> StoreResult<Vec<Name>> {
        let rows = sqlx::query("SELECT DISTINCT name FROM datasets ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list dataset names")?;

        Ok(rows.iter().map(|row| row.get::<String, _>("name")).collect())
    }

    async fn upsert_dataset(&self, dataset: Dataset) -> StoreResult<InsertOutcome> {
        let doc = serde_json::to_value(&dataset)?;
        let row = sqlx::query(
            r#"
            INSERT INTO datasets (name, uploaded_at, doc)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO UPDATE SET
                uploaded_at = EXCLUDED.uploaded_at,
                doc = EXCLUDED.doc
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(&dataset.name)
        .bind(dataset.uploaded_at)
        .bind(doc)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify("datasets", dataset.name.as_str(), e));

        tolerate_duplicate(row.and_then(|row| outcome(&row)))
    }

    async fn update_ground_truth(
        &self,
        name: &str,
        ground_truth: Vec<TruthElement>,
    ) -> StoreResult<bool> {
        let ground_truth = serde_json::to_value(&ground_truth)?;
        let result = sqlx::query(
            "UPDATE datasets SET doc = jsonb_set(doc, '{ground_truth}', $2) WHERE name = $1",
        )
        .bind(name)
        .bind(ground_truth)
        .execute(&self.pool)
        .await
        .context("Failed to update ground truth")?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_dataset(&self, name: &str) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM datasets WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await
            .context("Failed to delete dataset")?;

        Ok(result.rows_affected())
    }
}

#[async_trait::async_trait]
impl AnnotationStore for PostgresStore {
    async fn get_annotation(&self, name: &str) -> StoreResult<Option<Annotation>> {
        let row = sqlx::query("SELECT doc FROM annotations WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch annotation")?;

        row.as_ref().map(decode).transpose()
    }

    async fn list_annotation_summaries(&self) -> StoreResult<Vec<AnnotationSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT doc - 'docs' - 'tokens' - 'codes' - 'tore_relationships' AS doc
            FROM annotations
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list annotations")?;

        decode_all(&rows)
    }

    async fn list_annotations_for_dataset(&self, dataset: &str) -> StoreResult<Vec<Annotation>> {
        let rows = sqlx::query("SELECT doc FROM annotations WHERE dataset = $1 ORDER BY name")
            .bind(dataset)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list annotations for dataset")?;

        decode_all(&rows)
    }

    async fn list_annotation_codes(&self) -> StoreResult<Vec<AnnotationCodes>> {
        let rows = sqlx::query(
            r#"
            SELECT jsonb_build_object(
                'name', doc->'name',
                'codes', COALESCE(doc->'codes', '[]'::jsonb)
            ) AS doc
            FROM annotations
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list annotation codes")?;

        decode_all(&rows)
    }

    async fn upsert_annotation(&self, annotation: Annotation) -> StoreResult<InsertOutcome> {
        let doc = serde_json::to_value(&annotation)?;
        let row = sqlx::query(
            r#"
            INSERT INTO annotations (name, dataset, doc)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO UPDATE SET
                dataset = EXCLUDED.dataset,
                doc = EXCLUDED.doc
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(&annotation.name)
        .bind(&annotation.dataset)
        .bind(doc)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify("annotations", annotation.name.as_str(), e));

        tolerate_duplicate(row.and_then(|row| outcome(&row)))
    }

    async fn delete_annotation(&self, name: &str) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM annotations WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await
            .context("Failed to delete annotation")?;

        Ok(result.rows_affected())
    }
}

#[async_trait::async_trait]
impl AgreementStore for PostgresStore {
    async fn get_agreement(&self, name: &str) -> StoreResult<Option<Agreement>> {
        let row = sqlx::query("SELECT doc FROM agreements WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch agreement")?;

        row.as_ref().map(decode).transpose()
    }

    async fn list_agreement_summaries(&self) -> StoreResult<Vec<AgreementSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT doc - 'docs' - 'tokens' - 'tore_relationships'
                       - 'code_alternatives' - 'agreement_statistics' AS doc
            FROM agreements
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list agreements")?;

        decode_all(&rows)
    }

    async fn list_agreements(&self) -> StoreResult<Vec<Agreement>> {
        let rows = sqlx::query("SELECT doc FROM agreements ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .context("Failed to load agreements")?;

        decode_all(&rows)
    }

    async fn upsert_agreement(&self, agreement: Agreement) -> StoreResult<InsertOutcome> {
        let doc = serde_json::to_value(&agreement)?;
        let row = sqlx::query(
            r#"
            INSERT INTO agreements (name, dataset, doc)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO UPDATE SET
                dataset = EXCLUDED.dataset,
                doc = EXCLUDED.doc
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(&agreement.name)
        .bind(&agreement.dataset)
        .bind(doc)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify("agreements", agreement.name.as_str(), e));

        tolerate_duplicate(row.and_then(|row| outcome(&row)))
    }

    async fn delete_agreement(&self, name: &str) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM agreements WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await
            .context("Failed to delete agreement")?;

        Ok(result.rows_affected())
    }
}

#[async_trait::async_trait]
impl ResultStore for PostgresStore {
    async fn get_result(&self, key: &ResultKey) -> StoreResult<Option<DetectionResult>> {
        let row = sqlx::query(
            "SELECT doc FROM detection_results WHERE method = $1 AND started_at = $2",
        )
        .bind(&key.method)
        .bind(key.started_at)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch result")?;

        row.as_ref().map(decode).transpose()
    }

    async fn list_results(&self) -> StoreResult<Vec<DetectionResult>> {
        let rows = sqlx::query("SELECT doc FROM detection_results ORDER BY started_at, method")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list results")?;

        decode_all(&rows)
    }

    async fn upsert_result(&self, result: DetectionResult) -> StoreResult<InsertOutcome> {
        let result = result.normalized();
        let doc = serde_json::to_value(&result)?;
        let row = sqlx::query(
            r#"
            INSERT INTO detection_results (method, started_at, doc)
            VALUES ($1, $2, $3)
            ON CONFLICT (method, started_at) DO UPDATE SET doc = EXCLUDED.doc
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(&result.method)
        .bind(result.started_at)
        .bind(doc)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            let key = format!("{}@{}", result.method, result.started_at.to_rfc3339());
            classify("detection_results", key, e)
        });

        tolerate_duplicate(row.and_then(|row| outcome(&row)))
    }

    async fn rename_result(&self, key: &ResultKey, name: &str) -> StoreResult<RenameOutcome> {
        let renamable: Vec<String> = RENAMABLE_STATUSES.iter().map(|s| s.to_string()).collect();
        let renamed = sqlx::query(
            r#"
            UPDATE detection_results
            SET doc = jsonb_set(doc, '{name}', to_jsonb($3::text))
            WHERE method = $1 AND started_at = $2 AND doc->>'status' = ANY($4)
            "#,
        )
        .bind(&key.method)
        .bind(key.started_at)
        .bind(name)
        .bind(&renamable)
        .execute(&self.pool)
        .await
        .context("Failed to rename result")?;

        if renamed.rows_affected() > 0 {
            return Ok(RenameOutcome::Renamed);
        }

        let row = sqlx::query(
            r#"
            SELECT COALESCE(doc->>'status', '') AS status
            FROM detection_results
            WHERE method = $1 AND started_at = $2
            "#,
        )
        .bind(&key.method)
        .bind(key.started_at)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to read result status")?;

        Ok(match row {
            Some(row) => RenameOutcome::Conflict {
                status: row.get("status"),
            },
            None => RenameOutcome::NotFound,
        })
    }

    async fn delete_results_started_at(&self, started_at: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM detection_results WHERE started_at = $1")
            .bind(started_at)
            .execute(&self.pool)
            .await
            .context("Failed to delete results")?;

        Ok(result.rows_affected())
    }
}

/// Table holding one kind of crawler job.
pub trait JobTable {
    const TABLE: &'static str;
}

impl JobTable for CrawlerJob {
    const TABLE: &'static str = "crawler_jobs";
}

impl JobTable for AppReviewCrawlerJob {
    const TABLE: &'static str = "app_review_crawler_jobs";
}

#[async_trait::async_trait]
impl<J: ScheduledJob + JobTable> JobStore<J> for PostgresStore {
    async fn list_jobs(&self) -> StoreResult<Vec<J>> {
        let rows = sqlx::query(&format!("SELECT doc FROM {} ORDER BY date", J::TABLE))
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to list {}", J::TABLE))?;

        decode_all(&rows)
    }

    async fn upsert_job(&self, mut job: J) -> StoreResult<InsertOutcome> {
        job.normalize_date();
        let date = job.date();
        let doc = serde_json::to_value(&job)?;
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO {} (date, doc)
            VALUES ($1, $2)
            ON CONFLICT (date) DO UPDATE SET doc = EXCLUDED.doc
            RETURNING (xmax = 0) AS inserted
            "#,
            J::TABLE
        ))
        .bind(date)
        .bind(doc)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify(J::TABLE, date.to_rfc3339(), e));

        tolerate_duplicate(row.and_then(|row| outcome(&row)))
    }

    async fn delete_job(&self, date: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE date = $1", J::TABLE))
            .bind(date)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to delete from {}", J::TABLE))?;

        Ok(result.rows_affected())
    }

    async fn reset_job_occurrence(&self, date: DateTime<Utc>) -> StoreResult<bool> {
        let result = sqlx::query(&format!(
            "UPDATE {} SET doc = jsonb_set(doc, '{{occurrence}}', '0'::jsonb) WHERE date = $1",
            J::TABLE
        ))
        .bind(date)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to reset occurrence in {}", J::TABLE))?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait::async_trait]
impl RecommendationStore for PostgresStore {
    async fn get_recommendation(&self, codename: &str) -> StoreResult<Option<Recommendation>> {
        let row = sqlx::query("SELECT doc FROM recommendations WHERE codename = $1")
            .bind(codename)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch recommendation")?;

        row.as_ref().map(decode).transpose()
    }

    async fn replace_recommendations(
        &self,
        recommendations: Vec<Recommendation>,
    ) -> StoreResult<usize> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        sqlx::query("DELETE FROM recommendations")
            .execute(&mut *tx)
            .await
            .context("Failed to clear recommendations")?;

        let mut stored = 0;
        for recommendation in &recommendations {
            let doc = serde_json::to_value(recommendation)?;
            let result = sqlx::query(
                r#"
                INSERT INTO recommendations (codename, doc) VALUES ($1, $2)
                ON CONFLICT (codename) DO NOTHING
                "#,
            )
            .bind(&recommendation.codename)
            .bind(doc)
            .execute(&mut *tx)
            .await
            .context("Failed to insert recommendation")?;
            stored += result.rows_affected() as usize;
        }

        tx.commit().await.context("Failed to commit recommendations")?;
        Ok(stored)
    }
}

#[async_trait::async_trait]
impl VocabularyStore for PostgresStore {
    async fn tore_types(&self) -> StoreResult<Vec<String>> {
        let rows = sqlx::query("SELECT name FROM tore_types ORDER BY position")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list tore types")?;

        Ok(rows.iter().map(|row| row.get::<String, _>("name")).collect())
    }

    async fn replace_tore_types(&self, tores: Vec<String>) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        sqlx::query("DELETE FROM tore_types")
            .execute(&mut *tx)
            .await
            .context("Failed to clear tore types")?;

        for (position, name) in tores.iter().enumerate() {
            sqlx::query("INSERT INTO tore_types (position, name) VALUES ($1, $2)")
                .bind(position as i32)
                .bind(name)
                .execute(&mut *tx)
                .await
                .context("Failed to insert tore type")?;
        }

        tx.commit().await.context("Failed to commit tore types")?;
        Ok(())
    }

    async fn relationship_names(&self) -> StoreResult<RelationshipNames> {
        let rows = sqlx::query("SELECT name, owner FROM relationship_names ORDER BY position")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list relationship names")?;

        let (relationship_names, owners) = rows
            .iter()
            .map(|row| (row.get::<String, _>("name"), row.get::<String, _>("owner")))
            .unzip();
        Ok(RelationshipNames {
            relationship_names,
            owners,
        })
    }

    async fn replace_relationship_names(&self, names: RelationshipNames) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        sqlx::query("DELETE FROM relationship_names")
            .execute(&mut *tx)
            .await
            .context("Failed to clear relationship names")?;

        for (position, (name, owner)) in names
            .relationship_names
            .iter()
            .zip(&names.owners)
            .enumerate()
        {
            sqlx::query(
                "INSERT INTO relationship_names (position, name, owner) VALUES ($1, $2, $3)",
            )
            .bind(position as i32)
            .bind(name)
            .bind(owner)
            .execute(&mut *tx)
            .await
            .context("Failed to insert relationship name")?;
        }

        tx.commit()
            .await
            .context("Failed to commit relationship names")?;
        Ok(())
    }
}

impl Store for PostgresStore {}
