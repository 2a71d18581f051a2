use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::core::config::Settings;
use crate::services::scoring::ScoringRecord;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Store failures fall in two classes: `Api` is an error the PostgREST
/// endpoint itself reported, `Unexpected` covers transport failures and
/// response bodies that cannot be decoded.
#[derive(Debug, Error)]
pub(crate) enum SupabaseError {
    #[error("Supabase API error (status {status}): {message}")]
    Api { status: StatusCode, message: String },
    #[error("unexpected Supabase failure: {0}")]
    Unexpected(String),
}

impl From<reqwest::Error> for SupabaseError {
    fn from(err: reqwest::Error) -> Self {
        Self::Unexpected(err.to_string())
    }
}

/// PostgREST client for the remote question bank and submission tables. Built
/// once at startup; absent entirely when credentials are not configured.
#[derive(Debug, Clone)]
pub(crate) struct SupabaseStore {
    client: Client,
    base_url: String,
    service_role_key: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmissionAnswerRow {
    pub(crate) submission_id: String,
    pub(crate) q_id: String,
    pub(crate) answer_json: Value,
    pub(crate) score: u32,
    pub(crate) max_score: u32,
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionSeedRow {
    pub(crate) test_id: String,
    pub(crate) q_id: String,
    pub(crate) section_id: String,
    pub(crate) q_type: String,
    pub(crate) prompt_md: Option<String>,
    pub(crate) extra: Value,
    pub(crate) correct_json: Value,
}

#[derive(Debug, Deserialize)]
struct CreatedSubmission {
    submission_id: String,
}

impl SupabaseStore {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Option<Self>, SupabaseError> {
        let supabase = settings.supabase();
        if supabase.url.is_empty() || supabase.service_role_key.is_empty() {
            return Ok(None);
        }

        let store = Self::new(
            &supabase.url,
            &supabase.service_role_key,
            Duration::from_secs(supabase.timeout_seconds),
        )?;
        Ok(Some(store))
    }

    pub(crate) fn new(
        base_url: &str,
        service_role_key: &str,
        timeout: Duration,
    ) -> Result<Self, SupabaseError> {
        let client =
            Client::builder().connect_timeout(CONNECT_TIMEOUT).timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_role_key: service_role_key.to_string(),
        })
    }

    pub(crate) async fn fetch_scoring_records(
        &self,
        test_id: &str,
    ) -> Result<Vec<ScoringRecord>, SupabaseError> {
        let endpoint = format!("{}/rest/v1/questions", self.base_url);
        let filter = format!("eq.{test_id}");

        let response = self
            .client
            .get(&endpoint)
            .query(&[("select", "q_id,q_type,correct_json"), ("test_id", filter.as_str())])
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
            .send()
            .await?;

        let status = response.status();
        let raw_body = response.text().await?;

        if !status.is_success() {
            return Err(SupabaseError::Api { status, message: extract_error_message(&raw_body) });
        }

        serde_json::from_str(&raw_body).map_err(|err| {
            SupabaseError::Unexpected(format!("scoring record response has invalid format: {err}"))
        })
    }

    pub(crate) async fn create_submission(
        &self,
        test_id: &str,
    ) -> Result<String, SupabaseError> {
        let endpoint = format!("{}/rest/v1/submissions", self.base_url);

        let response = self
            .client
            .post(&endpoint)
            .query(&[("select", "submission_id")])
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
            .header("Prefer", "return=representation")
            .json(&serde_json::json!({ "test_id": test_id }))
            .send()
            .await?;

        let status = response.status();
        let raw_body = response.text().await?;

        if !status.is_success() {
            return Err(SupabaseError::Api { status, message: extract_error_message(&raw_body) });
        }

        let rows: Vec<CreatedSubmission> = serde_json::from_str(&raw_body).map_err(|err| {
            SupabaseError::Unexpected(format!(
                "submission insert response has invalid format: {err}"
            ))
        })?;
        rows.into_iter().next().map(|row| row.submission_id).ok_or_else(|| {
            SupabaseError::Unexpected(
                "submission insert response missing submission_id".to_string(),
            )
        })
    }

    pub(crate) async fn insert_submission_answers(
        &self,
        rows: &[SubmissionAnswerRow],
    ) -> Result<(), SupabaseError> {
        let endpoint = format!("{}/rest/v1/submission_answers", self.base_url);

        let response = self
            .client
            .post(&endpoint)
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
            .header("Prefer", "return=minimal")
            .json(&rows)
            .send()
            .await?;

        check_status(response).await
    }

    pub(crate) async fn upsert_test(
        &self,
        test_id: &str,
        title: &str,
        meta: Value,
    ) -> Result<(), SupabaseError> {
        let endpoint = format!("{}/rest/v1/tests", self.base_url);

        let response = self
            .client
            .post(&endpoint)
            .query(&[("on_conflict", "test_id")])
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&serde_json::json!({ "test_id": test_id, "title": title, "meta": meta }))
            .send()
            .await?;

        check_status(response).await
    }

    pub(crate) async fn upsert_questions(
        &self,
        rows: &[QuestionSeedRow],
    ) -> Result<(), SupabaseError> {
        let endpoint = format!("{}/rest/v1/questions", self.base_url);

        let response = self
            .client
            .post(&endpoint)
            .query(&[("on_conflict", "test_id,q_id")])
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&rows)
            .send()
            .await?;

        check_status(response).await
    }
}

async fn check_status(response: reqwest::Response) -> Result<(), SupabaseError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let raw_body = response.text().await.unwrap_or_default();
    Err(SupabaseError::Api { status, message: extract_error_message(&raw_body) })
}

fn extract_error_message(raw_body: &str) -> String {
    let Ok(parsed) = serde_json::from_str::<Value>(raw_body) else {
        if raw_body.trim().is_empty() {
            return "unknown_error".to_string();
        }
        return raw_body.to_string();
    };

    parsed
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| parsed.get("error").and_then(Value::as_str))
        .or_else(|| parsed.get("hint").and_then(Value::as_str))
        .unwrap_or("unknown_error")
        .to_string()
}
