use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::schemas::submission::{SubmissionResponse, SubmitRequest};
use crate::schemas::test_definition::TestDefinition;
use crate::services::grading::{self, GradingError};
use crate::services::test_store::{self, TestStoreError};

pub(super) async fn list_tests(State(state): State<AppState>) -> Json<Value> {
    let ids = state.tests().list_ids().await;
    Json(json!({ "tests": ids }))
}

pub(super) async fn get_test(
    State(state): State<AppState>,
    Path(test_id): Path<String>,
) -> Result<Json<TestDefinition>, ApiError> {
    let definition = state.tests().definition(&test_id).await.map_err(map_definition_error)?;
    Ok(Json(definition))
}

pub(super) async fn submit_test(
    State(state): State<AppState>,
    Path(test_id): Path<String>,
    Json(payload): Json<SubmitRequest>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    if test_store::sanitize_test_id(&test_id).is_none() {
        return Err(ApiError::BadRequest("Invalid test id".to_string()));
    }

    // A missing or null answers field is an empty submission, not an error.
    let answers = match payload.answers {
        None | Some(Value::Null) => serde_json::Map::new(),
        Some(Value::Object(map)) => map,
        Some(_) => {
            return Err(ApiError::BadRequest("Answers must be an object keyed by q_id".to_string()))
        }
    };

    let response =
        grading::grade_submission(&state, &test_id, &answers).await.map_err(|err| match err {
            GradingError::NoScoringData => {
                ApiError::NotFound("No scoring data available for this test.".to_string())
            }
        })?;

    Ok(Json(response))
}

pub(super) async fn view_asset(
    State(state): State<AppState>,
    Path((test_id, asset_path)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let resolved =
        state.tests().resolve_asset(&test_id, &asset_path).await.map_err(map_asset_error)?;

    let bytes = tokio::fs::read(&resolved)
        .await
        .map_err(|err| ApiError::internal(err, "Failed to read the asset"))?;

    let mime = test_store::guess_mime(&resolved);
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, mime),
            (header::CACHE_CONTROL, "public, max-age=31536000, immutable"),
        ],
        bytes,
    )
        .into_response())
}

fn map_definition_error(err: TestStoreError) -> ApiError {
    match err {
        TestStoreError::InvalidId | TestStoreError::NotFound => {
            ApiError::NotFound("Test not found".to_string())
        }
        other => ApiError::internal(other, "Failed to load the test definition"),
    }
}

fn map_asset_error(err: TestStoreError) -> ApiError {
    match err {
        // Rejected ids and traversal attempts are indistinguishable from a
        // missing file on the wire.
        TestStoreError::InvalidId
        | TestStoreError::InvalidRelativePath
        | TestStoreError::PathOutsideRoot => {
            metrics::counter!("asset_access_denied_total").increment(1);
            ApiError::NotFound("File not found".to_string())
        }
        TestStoreError::NotFound => ApiError::NotFound("File not found".to_string()),
        other => ApiError::internal(other, "Failed to resolve the asset"),
    }
}
