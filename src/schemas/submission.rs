use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub answers: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionResponse {
    pub test_id: String,
    pub submission_id: Option<String>,
    pub total_score: u32,
    pub max_score: u32,
    pub answered: usize,
    pub question_count: usize,
    pub warnings: Vec<String>,
    pub per_question: BTreeMap<String, QuestionResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub score: u32,
    pub max_score: u32,
    pub is_correct: bool,
    pub correct_answer: Value,
}

/// Answer as captured in a running session: a typed option index for choice
/// questions, free text otherwise, or an explicit cleared value.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerValue {
    Index(i64),
    Text(String),
    Null,
}

impl AnswerValue {
    pub fn to_value(&self) -> Value {
        match self {
            AnswerValue::Index(index) => Value::from(*index),
            AnswerValue::Text(text) => Value::String(text.clone()),
            AnswerValue::Null => Value::Null,
        }
    }
}
