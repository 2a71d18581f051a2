use std::path::Path;

use anyhow::Context;
use serde_json::Value;
use tokio::io::AsyncWriteExt;

use crate::core::config::ExportSettings;
use crate::core::time;
use crate::services::scoring::ScoreDetail;

const EXPORT_HEADER: &str =
    "submitted_at,submission_id,test_id,q_id,answer,is_correct,score,max_score,correct_answer";

/// Append one row per graded question to the flat CSV export, creating the
/// file (and its parent directory) with a header row on first use.
pub(crate) async fn append_results(
    settings: &ExportSettings,
    submission_id: &str,
    test_id: &str,
    details: &[ScoreDetail],
    answers: &serde_json::Map<String, Value>,
) -> anyhow::Result<()> {
    let path = Path::new(&settings.path);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create export directory {}", parent.display()))?;
        }
    }

    let needs_header = match tokio::fs::metadata(path).await {
        Ok(meta) => meta.len() == 0,
        Err(_) => true,
    };

    let submitted_at = time::now_rfc3339();
    let mut buffer = String::new();
    if needs_header {
        buffer.push_str(EXPORT_HEADER);
        buffer.push('\n');
    }

    for detail in details {
        let answer = answers.get(&detail.q_id).cloned().unwrap_or(Value::Null);
        let row = [
            csv_escape(&submitted_at),
            csv_escape(submission_id),
            csv_escape(test_id),
            csv_escape(&detail.q_id),
            csv_escape(&value_text(&answer)),
            csv_escape(if detail.is_correct { "true" } else { "false" }),
            csv_escape(&detail.score.to_string()),
            csv_escape(&detail.max_score.to_string()),
            csv_escape(&value_text(&detail.correct_answer)),
        ];
        buffer.push_str(&row.join(","));
        buffer.push('\n');
    }

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .with_context(|| format!("failed to open results export {}", path.display()))?;
    file.write_all(buffer.as_bytes()).await.context("failed to append results export")?;
    file.flush().await.context("failed to flush results export")?;

    Ok(())
}

pub(crate) fn csv_escape(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
