use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestDefinition {
    pub test_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<TestTiming>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui_constraints: Option<UiConstraints>,
    #[serde(default)]
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TestTiming {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listening_total_minutes: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reading_total_minutes: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiConstraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_controls: Option<AudioControls>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_flag_question: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub palette: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioControls {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_seek: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_remaining: Option<bool>,
}

/// Section payloads are tagged with a `type` discriminant on the wire so a
/// client can dispatch on listening vs reading without probing fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Section {
    Listening(ListeningSection),
    Reading(ReadingSection),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListeningSection {
    pub section_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions_md: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_src: Option<String>,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingSection {
    pub section_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions_md: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passage_md: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<SectionLayout>,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionLayout {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reading_order: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub q_id: String,
    pub q_type: QuestionType,
    pub prompt_md: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options_letters: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options_paragraphs: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options_labels: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

/// Closed set of supported question formats. Anything an authored manifest
/// declares outside this set lands on `Unknown` and is graded as free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    ShortText,
    SentenceCompletion,
    TableCompletion,
    TrueFalseNotGiven,
    McqSingle,
    MapLabeling,
    DiagramLabel,
    ParagraphMatch,
    MatchList,
    #[serde(other)]
    Unknown,
}

impl QuestionType {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "short_text" => Self::ShortText,
            "sentence_completion" => Self::SentenceCompletion,
            "table_completion" => Self::TableCompletion,
            "true_false_not_given" => Self::TrueFalseNotGiven,
            "mcq_single" => Self::McqSingle,
            "map_labeling" => Self::MapLabeling,
            "diagram_label" => Self::DiagramLabel,
            "paragraph_match" => Self::ParagraphMatch,
            "match_list" => Self::MatchList,
            _ => Self::Unknown,
        }
    }
}

impl Section {
    pub fn is_listening(&self) -> bool {
        matches!(self, Section::Listening(_))
    }

    pub fn is_reading(&self) -> bool {
        matches!(self, Section::Reading(_))
    }

    pub fn section_id(&self) -> &str {
        match self {
            Section::Listening(section) => &section.section_id,
            Section::Reading(section) => &section.section_id,
        }
    }

    pub fn questions(&self) -> &[Question] {
        match self {
            Section::Listening(section) => &section.questions,
            Section::Reading(section) => &section.questions,
        }
    }
}
