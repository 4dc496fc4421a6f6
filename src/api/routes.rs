use axum::{
    http::{header::HeaderName, Method},
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::api::handlers::AppState;
use crate::api::{annotation_handlers, crawler_handlers, handlers};
use crate::model::{AppReviewCrawlerJob, CrawlerJob};
use crate::store::traits::Store;

const STORE: &str = "/hitec/repository/concepts/store";
const QUERY: &str = "/hitec/repository/concepts";

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([HeaderName::from_static("x-requested-with")])
}

pub fn create_router<S: Store + 'static>() -> Router<AppState<S>> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Writes
        .route(
            &format!("{STORE}/dataset/"),
            post(handlers::post_dataset::<S>),
        )
        .route(
            &format!("{STORE}/groundtruth/"),
            post(handlers::post_ground_truth::<S>),
        )
        .route(
            &format!("{STORE}/detection/result/"),
            post(handlers::post_result::<S>),
        )
        .route(
            &format!("{STORE}/detection/result/name"),
            post(handlers::post_result_name::<S>),
        )
        .route(
            &format!("{STORE}/annotation/"),
            post(annotation_handlers::post_annotation::<S>),
        )
        .route(
            &format!("{STORE}/agreement/"),
            post(annotation_handlers::post_agreement::<S>),
        )
        .route(
            &format!("{STORE}/annotation/relationships/"),
            post(annotation_handlers::post_relationship_names::<S>),
        )
        .route(
            &format!("{STORE}/annotation/tores/"),
            post(annotation_handlers::post_tore_types::<S>),
        )
        .route(
            &format!("{STORE}/recommendations/"),
            post(handlers::post_recommendations::<S>),
        )
        // Crawler jobs
        .route(
            &format!("{STORE}/reddit_crawler/jobs"),
            post(crawler_handlers::post_job::<S, CrawlerJob>),
        )
        .route(
            &format!("{STORE}/reddit_crawler/jobs/:job"),
            delete(crawler_handlers::delete_job::<S, CrawlerJob>)
                .put(crawler_handlers::reset_job_occurrence::<S, CrawlerJob>),
        )
        .route(
            &format!("{STORE}/app_review_crawler/jobs"),
            post(crawler_handlers::post_job::<S, AppReviewCrawlerJob>),
        )
        .route(
            &format!("{STORE}/app_review_crawler/jobs/:job"),
            delete(crawler_handlers::delete_job::<S, AppReviewCrawlerJob>)
                .put(crawler_handlers::reset_job_occurrence::<S, AppReviewCrawlerJob>),
        )
        .route(
            &format!("{QUERY}/crawler_jobs/all"),
            get(crawler_handlers::get_jobs::<S, CrawlerJob>),
        )
        .route(
            &format!("{QUERY}/app_review_crawler_jobs/all"),
            get(crawler_handlers::get_jobs::<S, AppReviewCrawlerJob>),
        )
        // Datasets
        .route(
            &format!("{QUERY}/dataset/all"),
            get(handlers::get_all_datasets::<S>),
        )
        .route(
            &format!("{QUERY}/dataset/name/:dataset"),
            get(handlers::get_dataset::<S>).delete(handlers::delete_dataset::<S>),
        )
        // Detection results
        .route(
            &format!("{QUERY}/detection/result/all"),
            get(handlers::get_all_results::<S>),
        )
        .route(
            &format!("{QUERY}/detection/result/:result"),
            delete(handlers::delete_result::<S>),
        )
        // Annotations and agreements
        .route(
            &format!("{QUERY}/annotation/all"),
            get(annotation_handlers::get_all_annotations::<S>),
        )
        .route(
            &format!("{QUERY}/annotation/name/:annotation"),
            get(annotation_handlers::get_annotation::<S>)
                .delete(annotation_handlers::delete_annotation::<S>),
        )
        .route(
            &format!("{QUERY}/annotation/dataset/:dataset"),
            get(annotation_handlers::get_annotations_for_dataset::<S>),
        )
        .route(
            &format!("{QUERY}/annotationcodes/all"),
            get(annotation_handlers::get_all_annotation_codes::<S>),
        )
        .route(
            &format!("{QUERY}/agreement/all"),
            get(annotation_handlers::get_all_agreements::<S>),
        )
        .route(
            &format!("{QUERY}/agreement/name/:agreement"),
            get(annotation_handlers::get_agreement::<S>)
                .delete(annotation_handlers::delete_agreement::<S>),
        )
        // Vocabulary and recommendations
        .route(
            &format!("{QUERY}/annotation/relationships"),
            get(annotation_handlers::get_relationship_names::<S>),
        )
        .route(
            &format!("{QUERY}/annotation/tores"),
            get(annotation_handlers::get_tore_types::<S>),
        )
        .route(
            &format!("{QUERY}/annotation/recommendationTores/:codename"),
            get(handlers::get_recommendation_tores::<S>),
        )
        .layer(cors())
}
