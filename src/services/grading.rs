use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::core::state::AppState;
use crate::schemas::submission::{QuestionResult, SubmissionResponse};
use crate::services::results_export;
use crate::services::scoring::{self, ScoreDetail, ScoringRecord};
use crate::services::supabase::{SubmissionAnswerRow, SupabaseError};

const WARN_METADATA: &str = "Unable to persist submission metadata to Supabase.";
const WARN_ANSWERS: &str = "Unable to persist question-level scoring to Supabase.";
const WARN_STORE_UNEXPECTED: &str = "Unexpected Supabase error while saving submission.";
const WARN_UNREACHABLE: &str =
    "Supabase is configured but unreachable; results were scored locally only.";
const WARN_NOT_CONFIGURED: &str =
    "Supabase credentials are not configured; results were scored locally only.";
const WARN_EXPORT: &str = "Unable to write the local results export.";

#[derive(Debug, Error)]
pub(crate) enum GradingError {
    #[error("no scoring data available for this test")]
    NoScoringData,
}

/// Grade a submission end to end: gather scoring records (remote first, local
/// pack as fallback), score every record, then attempt remote persistence and
/// the local CSV export. Persistence failures degrade to response warnings;
/// the only hard failure is having no scoring records at all.
pub(crate) async fn grade_submission(
    state: &AppState,
    test_id: &str,
    answers: &serde_json::Map<String, Value>,
) -> Result<SubmissionResponse, GradingError> {
    let mut warnings = Vec::new();

    let mut remote_operational = false;
    let mut records: Vec<ScoringRecord> = Vec::new();

    if let Some(remote) = state.supabase() {
        match remote.fetch_scoring_records(test_id).await {
            Ok(rows) => {
                remote_operational = true;
                records = rows;
            }
            Err(err) => {
                tracing::warn!(error = %err, test_id, "Failed to fetch scoring records from Supabase");
            }
        }
    }

    if records.is_empty() {
        match state.tests().local_scoring_records(test_id).await {
            Ok(rows) => records = rows,
            Err(err) => {
                tracing::debug!(error = %err, test_id, "No local scoring records for this test");
            }
        }
    }

    if records.is_empty() {
        return Err(GradingError::NoScoringData);
    }

    let details: Vec<ScoreDetail> = records
        .iter()
        .map(|record| scoring::score_question(record, answers.get(&record.q_id)))
        .collect();

    let total_score: u32 = details.iter().map(|detail| detail.score).sum();
    let max_score: u32 = details.iter().map(|detail| detail.max_score).sum();
    let answered = answered_count(answers);

    let mut submission_id: Option<String> = None;
    if remote_operational {
        if let Some(remote) = state.supabase() {
            match remote.create_submission(test_id).await {
                Ok(id) => {
                    let rows: Vec<SubmissionAnswerRow> = details
                        .iter()
                        .map(|detail| SubmissionAnswerRow {
                            submission_id: id.clone(),
                            q_id: detail.q_id.clone(),
                            answer_json: answers.get(&detail.q_id).cloned().unwrap_or(Value::Null),
                            score: detail.score,
                            max_score: detail.max_score,
                        })
                        .collect();

                    if !rows.is_empty() {
                        if let Err(err) = remote.insert_submission_answers(&rows).await {
                            tracing::warn!(error = %err, test_id, "Failed to persist submission answers");
                            warnings.push(persistence_warning(&err, WARN_ANSWERS));
                        }
                    }
                    submission_id = Some(id);
                }
                Err(err) => {
                    tracing::warn!(error = %err, test_id, "Failed to persist submission metadata");
                    warnings.push(persistence_warning(&err, WARN_METADATA));
                }
            }
        }
    } else if state.supabase().is_some() {
        warnings.push(WARN_UNREACHABLE.to_string());
    } else {
        warnings.push(WARN_NOT_CONFIGURED.to_string());
    }

    // The flat export is attempted no matter how remote persistence went.
    let export_id =
        submission_id.clone().unwrap_or_else(|| format!("local-{}", Uuid::new_v4()));
    if let Err(err) =
        results_export::append_results(state.settings().export(), &export_id, test_id, &details, answers)
            .await
    {
        tracing::warn!(error = %err, test_id, "Failed to append results export");
        warnings.push(WARN_EXPORT.to_string());
    }

    let per_question = details
        .iter()
        .map(|detail| {
            (
                detail.q_id.clone(),
                QuestionResult {
                    score: detail.score,
                    max_score: detail.max_score,
                    is_correct: detail.is_correct,
                    correct_answer: detail.correct_answer.clone(),
                },
            )
        })
        .collect();

    Ok(SubmissionResponse {
        test_id: test_id.to_string(),
        submission_id,
        total_score,
        max_score,
        answered,
        question_count: details.len(),
        warnings,
        per_question,
    })
}

// API-reported failures keep their sink-specific warning; transport and
// decode failures collapse into the unexpected-store message.
fn persistence_warning(error: &SupabaseError, reported: &str) -> String {
    match error {
        SupabaseError::Api { .. } => reported.to_string(),
        SupabaseError::Unexpected(_) => WARN_STORE_UNEXPECTED.to_string(),
    }
}

// An answer counts as given unless it is null or an empty string; zero and
// false are real answers.
fn answered_count(answers: &serde_json::Map<String, Value>) -> usize {
    answers
        .values()
        .filter(|value| !value.is_null())
        .filter(|value| value.as_str().map_or(true, |text| !text.is_empty()))
        .count()
}
