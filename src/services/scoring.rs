use serde::Deserialize;
use serde_json::Value;

use crate::schemas::test_definition::QuestionType;

const MAX_SCORE: u32 = 1;

/// One gradable question as stored in the answer key: the question id, its
/// format, and the raw JSON describing the correct answer.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ScoringRecord {
    pub(crate) q_id: String,
    pub(crate) q_type: QuestionType,
    #[serde(default)]
    pub(crate) correct_json: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ScoreDetail {
    pub(crate) q_id: String,
    pub(crate) score: u32,
    pub(crate) max_score: u32,
    pub(crate) is_correct: bool,
    pub(crate) correct_answer: Value,
    pub(crate) received_answer: Value,
}

/// Typed view of a `correct_json` payload. Parsing never fails: malformed or
/// missing fields degrade to a shape that can only grade as incorrect.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CorrectSpec {
    Choice { index: Option<i64> },
    Letter { expected: Option<String> },
    Label { expected: Option<String> },
    Text(TextSpec),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TextSpec {
    accepted: Vec<String>,
    case_insensitive: bool,
    trim: bool,
    punctuation_insensitive: bool,
}

impl CorrectSpec {
    pub(crate) fn from_record(q_type: QuestionType, correct_json: &Value) -> Self {
        match q_type {
            QuestionType::McqSingle => Self::Choice {
                index: correct_json.get("correct_option_index").and_then(integer_value),
            },
            QuestionType::MapLabeling => Self::Letter {
                expected: correct_json
                    .get("correct_letter")
                    .and_then(Value::as_str)
                    .map(|value| value.trim().to_uppercase()),
            },
            QuestionType::ParagraphMatch => Self::Label {
                expected: correct_json
                    .get("correct_paragraph")
                    .and_then(Value::as_str)
                    .map(str::to_uppercase),
            },
            QuestionType::MatchList => Self::Label {
                expected: correct_json
                    .get("correct_label")
                    .and_then(Value::as_str)
                    .map(str::to_uppercase),
            },
            QuestionType::TrueFalseNotGiven => Self::Label {
                expected: correct_json.get("label").and_then(Value::as_str).map(str::to_uppercase),
            },
            _ => Self::Text(TextSpec::from_value(correct_json)),
        }
    }
}

impl TextSpec {
    fn from_value(correct_json: &Value) -> Self {
        let accepted = correct_json
            .get("accepted")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();

        Self {
            accepted,
            case_insensitive: correct_json.get("case_insensitive").map(truthy).unwrap_or(false),
            trim: !matches!(correct_json.get("trim"), Some(Value::Bool(false))),
            punctuation_insensitive: correct_json
                .get("punctuation_insensitive")
                .map(truthy)
                .unwrap_or(false),
        }
    }
}

/// Grade a single question. `answer` is the raw submitted JSON for this
/// question id, or `None` when the submission did not mention it.
pub(crate) fn score_question(record: &ScoringRecord, answer: Option<&Value>) -> ScoreDetail {
    match CorrectSpec::from_record(record.q_type, &record.correct_json) {
        CorrectSpec::Choice { index } => score_choice(record, index, answer),
        CorrectSpec::Letter { expected } => score_letter(record, expected, answer),
        CorrectSpec::Label { expected } => score_label(record, expected, answer),
        CorrectSpec::Text(text_spec) => score_text(record, &text_spec, answer),
    }
}

fn score_choice(record: &ScoringRecord, expected: Option<i64>, answer: Option<&Value>) -> ScoreDetail {
    let received = answer.and_then(|value| match value {
        Value::Number(_) => integer_value(value),
        Value::String(text) => parse_leading_int(text),
        _ => None,
    });

    let is_correct = matches!((expected, received), (Some(want), Some(got)) if want == got);
    let correct_answer = expected.map(Value::from).unwrap_or(Value::Null);
    detail(record, is_correct, correct_answer, raw_answer(answer))
}

fn score_letter(record: &ScoringRecord, expected: Option<String>, answer: Option<&Value>) -> ScoreDetail {
    let received = match answer {
        Some(Value::String(text)) => text.trim().to_uppercase(),
        _ => String::new(),
    };

    let is_correct = expected.as_deref().is_some_and(|want| !want.is_empty() && received == want);
    let correct_answer = expected.map(Value::String).unwrap_or(Value::Null);
    detail(record, is_correct, correct_answer, raw_answer(answer))
}

fn score_label(record: &ScoringRecord, expected: Option<String>, answer: Option<&Value>) -> ScoreDetail {
    let received = match answer {
        Some(Value::String(text)) => Some(text.to_uppercase()),
        _ => None,
    };

    let is_correct = match (expected.as_deref(), received.as_deref()) {
        (Some(want), Some(got)) if !want.is_empty() => want == got,
        _ => false,
    };
    let correct_answer = expected.map(Value::String).unwrap_or(Value::Null);
    detail(record, is_correct, correct_answer, raw_answer(answer))
}

fn score_text(record: &ScoringRecord, text_spec: &TextSpec, answer: Option<&Value>) -> ScoreDetail {
    let correct_answer =
        Value::Array(text_spec.accepted.iter().cloned().map(Value::String).collect());

    let received = match answer {
        Some(Value::String(text)) if !text.is_empty() => text,
        _ => return detail(record, false, correct_answer, raw_answer(answer)),
    };

    let normalized = normalize_text(received, text_spec);
    let is_correct =
        text_spec.accepted.iter().any(|option| normalize_text(option, text_spec) == normalized);
    detail(record, is_correct, correct_answer, raw_answer(answer))
}

fn detail(record: &ScoringRecord, is_correct: bool, correct_answer: Value, received_answer: Value) -> ScoreDetail {
    ScoreDetail {
        q_id: record.q_id.clone(),
        score: if is_correct { MAX_SCORE } else { 0 },
        max_score: MAX_SCORE,
        is_correct,
        correct_answer,
        received_answer,
    }
}

fn raw_answer(answer: Option<&Value>) -> Value {
    answer.cloned().unwrap_or(Value::Null)
}

fn normalize_text(value: &str, text_spec: &TextSpec) -> String {
    let mut normalized =
        if text_spec.trim { value.trim().to_string() } else { value.to_string() };
    if text_spec.case_insensitive {
        normalized = normalized.to_lowercase();
    }
    if text_spec.punctuation_insensitive {
        normalized.retain(|c| c.is_alphanumeric() || c.is_whitespace());
    }
    collapse_whitespace(&normalized)
}

// Runs of whitespace become a single space; a leading or trailing run is kept
// as one space rather than removed, which matters when trimming is disabled.
fn collapse_whitespace(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut in_run = false;
    for c in value.chars() {
        if c.is_whitespace() {
            if !in_run {
                out.push(' ');
                in_run = true;
            }
        } else {
            out.push(c);
            in_run = false;
        }
    }
    out
}

// Accepts integral floats so an authored `2.0` grades like `2`.
fn integer_value(value: &Value) -> Option<i64> {
    if let Some(int) = value.as_i64() {
        return Some(int);
    }
    value.as_f64().filter(|float| float.is_finite() && float.fract() == 0.0).map(|float| float as i64)
}

// Radix-10 prefix parse: optional sign, then digits, trailing garbage ignored.
fn parse_leading_int(text: &str) -> Option<i64> {
    let trimmed = text.trim_start();
    let (negative, digits_part) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };

    let digits: String = digits_part.chars().take_while(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }

    digits.parse::<i64>().ok().map(|value| if negative { -value } else { value })
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().map(|float| float != 0.0).unwrap_or(true),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
