use axum::{
    extract::{Path, State},
    response::Json,
};

use crate::api::error::ApiResult;
use crate::api::extract::JsonBody;
use crate::api::handlers::{deleted, stored, AppState};
use crate::logic::{
    apply_kappa_scores, prepare_agreement, prepare_annotation, validate_agreement,
    validate_annotation, validate_relationship_names,
};
use crate::model::{
    Agreement, AgreementSummary, Annotation, AnnotationCodes, AnnotationSummary, Name,
    RelationshipNames, ResponseMessage, ToreTypes,
};
use crate::store::traits::Store;

pub async fn post_annotation<S: Store>(
    State(state): State<AppState<S>>,
    JsonBody(mut annotation): JsonBody<Annotation>,
) -> ApiResult<Json<ResponseMessage>> {
    log::info!("post annotation {}", annotation.name);
    validate_annotation(&annotation)?;
    prepare_annotation(&mut annotation, chrono::Utc::now());

    let name = annotation.name.clone();
    let outcome = state.store.upsert_annotation(annotation).await?;
    Ok(stored("Annotation", &name, outcome))
}

/// Stores an agreement after deriving its completion state and refreshing
/// its kappa statistics. A failing statistics call aborts the write.
pub async fn post_agreement<S: Store>(
    State(state): State<AppState<S>>,
    JsonBody(mut agreement): JsonBody<Agreement>,
) -> ApiResult<Json<ResponseMessage>> {
    log::info!("post agreement {}", agreement.name);
    validate_agreement(&agreement)?;
    prepare_agreement(&mut agreement, chrono::Utc::now());

    if let Some(scores) = state.kappa.calculate_kappa(&agreement).await? {
        apply_kappa_scores(&mut agreement, &scores);
    }

    let name = agreement.name.clone();
    let outcome = state.store.upsert_agreement(agreement).await?;
    Ok(stored("Agreement", &name, outcome))
}

pub async fn get_annotation<S: Store>(
    State(state): State<AppState<S>>,
    Path(name): Path<Name>,
) -> ApiResult<Json<Annotation>> {
    log::info!("get annotation {name}");
    let annotation = state.store.get_annotation(&name).await?;
    Ok(Json(annotation.unwrap_or_else(Annotation::not_found)))
}

pub async fn get_agreement<S: Store>(
    State(state): State<AppState<S>>,
    Path(name): Path<Name>,
) -> ApiResult<Json<Agreement>> {
    log::info!("get agreement {name}");
    let agreement = state.store.get_agreement(&name).await?;
    Ok(Json(agreement.unwrap_or_else(Agreement::not_found)))
}

pub async fn get_annotations_for_dataset<S: Store>(
    State(state): State<AppState<S>>,
    Path(dataset): Path<Name>,
) -> ApiResult<Json<Vec<Annotation>>> {
    log::info!("get annotations for dataset {dataset}");
    Ok(Json(state.store.list_annotations_for_dataset(&dataset).await?))
}

pub async fn get_all_annotations<S: Store>(
    State(state): State<AppState<S>>,
) -> ApiResult<Json<Vec<AnnotationSummary>>> {
    Ok(Json(state.store.list_annotation_summaries().await?))
}

pub async fn get_all_agreements<S: Store>(
    State(state): State<AppState<S>>,
) -> ApiResult<Json<Vec<AgreementSummary>>> {
    Ok(Json(state.store.list_agreement_summaries().await?))
}

pub async fn get_all_annotation_codes<S: Store>(
    State(state): State<AppState<S>>,
) -> ApiResult<Json<Vec<AnnotationCodes>>> {
    Ok(Json(state.store.list_annotation_codes().await?))
}

pub async fn delete_annotation<S: Store>(
    State(state): State<AppState<S>>,
    Path(name): Path<Name>,
) -> ApiResult<Json<ResponseMessage>> {
    let removed = state.store.delete_annotation(&name).await?;
    Ok(deleted("Annotation", &name, removed))
}

pub async fn delete_agreement<S: Store>(
    State(state): State<AppState<S>>,
    Path(name): Path<Name>,
) -> ApiResult<Json<ResponseMessage>> {
    let removed = state.store.delete_agreement(&name).await?;
    Ok(deleted("Agreement", &name, removed))
}

// Vocabulary

pub async fn post_tore_types<S: Store>(
    State(state): State<AppState<S>>,
    JsonBody(types): JsonBody<ToreTypes>,
) -> ApiResult<Json<ResponseMessage>> {
    log::info!("replace tore types with {} entries", types.tores.len());
    state.store.replace_tore_types(types.tores).await?;
    Ok(Json(ResponseMessage::ok("Tore types stored")))
}

pub async fn get_tore_types<S: Store>(
    State(state): State<AppState<S>>,
) -> ApiResult<Json<ToreTypes>> {
    let tores = state.store.tore_types().await?;
    Ok(Json(ToreTypes { tores }))
}

pub async fn post_relationship_names<S: Store>(
    State(state): State<AppState<S>>,
    JsonBody(names): JsonBody<RelationshipNames>,
) -> ApiResult<Json<ResponseMessage>> {
    log::info!(
        "replace relationship names with {} entries",
        names.relationship_names.len()
    );
    validate_relationship_names(&names)?;
    state.store.replace_relationship_names(names).await?;
    Ok(Json(ResponseMessage::ok("Relationship names stored")))
}

pub async fn get_relationship_names<S: Store>(
    State(state): State<AppState<S>>,
) -> ApiResult<Json<RelationshipNames>> {
    Ok(Json(state.store.relationship_names().await?))
}
