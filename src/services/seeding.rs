use anyhow::{Context, Result};
use serde_json::{json, Value};

use crate::schemas::test_definition::QuestionType;
use crate::services::supabase::{QuestionSeedRow, SupabaseStore};
use crate::services::test_store::{RawQuestion, RawSection, RawTestManifest, TestStore, TestStoreError};

#[derive(Debug)]
pub(crate) struct SeedSummary {
    pub(crate) test_id: String,
    pub(crate) question_count: usize,
    pub(crate) answered_count: usize,
    pub(crate) template_written: bool,
}

/// Push one local test pack into Supabase: the test row first, then every
/// question with its section context flattened into `extra`. A missing
/// `answers.json` does not abort the seed; questions go up with a null
/// `correct_json` and blank answer templates are written next to the manifest
/// for the author to fill in.
pub(crate) async fn seed_test(
    tests: &TestStore,
    supabase: &SupabaseStore,
    test_id: &str,
) -> Result<SeedSummary> {
    let manifest = tests
        .raw_manifest(test_id)
        .await
        .with_context(|| format!("failed to load the manifest for '{test_id}'"))?;

    let answers = match tests.answer_key(test_id).await {
        Ok(map) => Some(map),
        Err(TestStoreError::NotFound) => None,
        Err(err) => return Err(err).context("failed to load answers.json"),
    };

    let template_written = answers.is_none();
    if template_written {
        let template = answer_template(&manifest);
        tests
            .write_answer_templates(test_id, &template)
            .await
            .context("failed to write answer templates")?;
        tracing::warn!(
            test_id = %manifest.test_id,
            "answers.json is missing; wrote answers_template.json and answers_template.csv"
        );
    }

    let meta = json!({
        "timing": manifest.timing,
        "ui_constraints": manifest.ui_constraints,
    });
    supabase
        .upsert_test(&manifest.test_id, &manifest.title, meta)
        .await
        .context("failed to upsert the test row")?;

    let mut rows = Vec::new();
    let mut answered_count = 0usize;
    for section in &manifest.sections {
        for question in &section.questions {
            let keyed = answers.as_ref().and_then(|map| map.get(&question.q_id));
            if keyed.is_some() {
                answered_count += 1;
            }
            rows.push(QuestionSeedRow {
                test_id: manifest.test_id.clone(),
                q_id: question.q_id.clone(),
                section_id: section.section_id.clone(),
                q_type: question.q_type.clone(),
                prompt_md: question.prompt_md.clone(),
                extra: question_extra(section, question),
                correct_json: keyed.cloned().unwrap_or(Value::Null),
            });
        }
    }

    supabase.upsert_questions(&rows).await.context("failed to upsert question rows")?;

    Ok(SeedSummary {
        test_id: manifest.test_id.clone(),
        question_count: rows.len(),
        answered_count,
        template_written,
    })
}

/// Rendering context a client needs alongside the bare question row. Absent
/// manifest fields are omitted rather than stored as nulls.
fn question_extra(section: &RawSection, question: &RawQuestion) -> Value {
    let mut extra = serde_json::Map::new();
    extra.insert("section_type".to_string(), json!(section.kind));
    if let Some(value) = &section.instructions_md {
        extra.insert("instructions_md".to_string(), json!(value));
    }
    if let Some(value) = &section.audio_src {
        extra.insert("audio_src".to_string(), json!(value));
    }
    if let Some(value) = &section.passage_src_md {
        extra.insert("passage_src_md".to_string(), json!(value));
    }
    if let Some(value) = &section.layout {
        extra.insert("layout".to_string(), json!(value));
    }
    if let Some(value) = &section.assets {
        extra.insert("assets".to_string(), json!(value));
    }
    if let Some(value) = &question.expected {
        extra.insert("expected".to_string(), json!(value));
    }
    if let Some(value) = &question.options {
        extra.insert("options".to_string(), json!(value));
    }
    if let Some(value) = &question.options_letters {
        extra.insert("options_letters".to_string(), json!(value));
    }
    if let Some(value) = &question.options_paragraphs {
        extra.insert("options_paragraphs".to_string(), json!(value));
    }
    if let Some(value) = &question.options_labels {
        extra.insert("options_labels".to_string(), json!(value));
    }
    if let Some(value) = &question.extra {
        extra.insert("extra".to_string(), value.clone());
    }
    Value::Object(extra)
}

fn answer_template(manifest: &RawTestManifest) -> serde_json::Map<String, Value> {
    let mut template = serde_json::Map::new();
    for section in &manifest.sections {
        for question in &section.questions {
            template.insert(question.q_id.clone(), blank_correct_shape(&question.q_type));
        }
    }
    template
}

/// Placeholder `correct_json` shapes in the scorer's format for each question
/// type, with `<...>` markers showing the author what to fill in.
fn blank_correct_shape(q_type: &str) -> Value {
    match QuestionType::parse(q_type) {
        QuestionType::ShortText
        | QuestionType::SentenceCompletion
        | QuestionType::TableCompletion => json!({
            "accepted": ["<fill>"],
            "case_insensitive": true,
            "trim": true,
            "punctuation_insensitive": true
        }),
        QuestionType::TrueFalseNotGiven => json!({"label": "<TRUE|FALSE|NOT GIVEN>"}),
        QuestionType::McqSingle => json!({"correct_option_index": 0}),
        QuestionType::MapLabeling => json!({"correct_letter": "<A-I>"}),
        QuestionType::DiagramLabel => json!({"accepted": ["<one_word>"]}),
        QuestionType::ParagraphMatch => json!({"correct_paragraph": "<A-H>"}),
        QuestionType::MatchList => json!({"correct_label": "<A-D>"}),
        QuestionType::Unknown => json!({}),
    }
}
