use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::config::Settings;
use crate::schemas::test_definition::{
    ListeningSection, Question, QuestionType, ReadingSection, Section, SectionLayout,
    TestDefinition, TestTiming, UiConstraints,
};
use crate::services::scoring::ScoringRecord;

#[derive(Debug, Error)]
pub(crate) enum TestStoreError {
    #[error("invalid test id")]
    InvalidId,
    #[error("invalid relative path")]
    InvalidRelativePath,
    #[error("path escapes the assets root")]
    PathOutsideRoot,
    #[error("not found")]
    NotFound,
    #[error("malformed test pack file: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// On-disk manifest shape, prior to asset URL rewriting and passage loading.
#[derive(Debug, Deserialize)]
pub(crate) struct RawTestManifest {
    pub(crate) test_id: String,
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) timing: Option<TestTiming>,
    #[serde(default)]
    pub(crate) ui_constraints: Option<UiConstraints>,
    #[serde(default)]
    pub(crate) sections: Vec<RawSection>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawSection {
    pub(crate) section_id: String,
    #[serde(rename = "type")]
    pub(crate) kind: String,
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) instructions_md: Option<String>,
    #[serde(default)]
    pub(crate) audio_src: Option<String>,
    #[serde(default)]
    pub(crate) passage_src_md: Option<String>,
    #[serde(default)]
    pub(crate) layout: Option<SectionLayout>,
    #[serde(default)]
    pub(crate) questions: Vec<RawQuestion>,
    #[serde(default)]
    pub(crate) assets: Option<BTreeMap<String, Value>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawQuestion {
    pub(crate) q_id: String,
    pub(crate) q_type: String,
    #[serde(default)]
    pub(crate) prompt_md: Option<String>,
    #[serde(default)]
    pub(crate) expected: Option<String>,
    #[serde(default)]
    pub(crate) options: Option<Vec<String>>,
    #[serde(default)]
    pub(crate) options_letters: Option<Vec<String>>,
    #[serde(default)]
    pub(crate) options_paragraphs: Option<Vec<String>>,
    #[serde(default)]
    pub(crate) options_labels: Option<Vec<String>>,
    #[serde(default)]
    pub(crate) extra: Option<Value>,
}

/// Filesystem-backed collection of test packs under a single root directory.
/// Each pack is `<root>/<test_id>/` holding `test.json`, an optional
/// `answers.json`, and `assets/` plus passage files referenced by the manifest.
#[derive(Debug, Clone)]
pub(crate) struct TestStore {
    root: PathBuf,
    default_test_id: String,
    api_prefix: String,
}

impl TestStore {
    pub(crate) fn from_settings(settings: &Settings) -> Self {
        Self::new(
            PathBuf::from(&settings.tests().root),
            settings.tests().default_test_id.clone(),
            settings.api().api_prefix.clone(),
        )
    }

    pub(crate) fn new(root: PathBuf, default_test_id: String, api_prefix: String) -> Self {
        Self { root, default_test_id, api_prefix: api_prefix.trim_end_matches('/').to_string() }
    }

    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) async fn list_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();

        if let Ok(mut entries) = tokio::fs::read_dir(&self.root).await {
            while let Ok(Some(entry)) = entries.next_entry().await {
                let is_dir = match entry.file_type().await {
                    Ok(file_type) => file_type.is_dir(),
                    Err(_) => false,
                };
                if !is_dir {
                    continue;
                }
                if let Some(name) = entry.file_name().to_str() {
                    if sanitize_test_id(name).is_some() {
                        ids.push(name.to_string());
                    }
                }
            }
        }

        if ids.is_empty() {
            return vec![self.default_test_id.clone()];
        }

        ids.sort();
        ids
    }

    pub(crate) async fn raw_manifest(&self, test_id: &str) -> Result<RawTestManifest, TestStoreError> {
        let safe_id = sanitize_test_id(test_id).ok_or(TestStoreError::InvalidId)?;
        let manifest_path = self.root.join(safe_id).join("test.json");
        let raw = tokio::fs::read_to_string(&manifest_path)
            .await
            .map_err(|_| TestStoreError::NotFound)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Load and normalize a test pack: sections keep manifest order, audio and
    /// asset references are rewritten to API URLs, and reading passages are
    /// inlined from their markdown files.
    pub(crate) async fn definition(&self, test_id: &str) -> Result<TestDefinition, TestStoreError> {
        let manifest = self.raw_manifest(test_id).await?;
        let RawTestManifest { test_id, title, timing, ui_constraints, sections: raw_sections } =
            manifest;

        let mut sections = Vec::with_capacity(raw_sections.len());
        for raw_section in raw_sections {
            sections.push(self.load_section(&test_id, raw_section).await);
        }

        Ok(TestDefinition { test_id, title, timing, ui_constraints, sections })
    }

    pub(crate) async fn answer_key(
        &self,
        test_id: &str,
    ) -> Result<serde_json::Map<String, Value>, TestStoreError> {
        let safe_id = sanitize_test_id(test_id).ok_or(TestStoreError::InvalidId)?;
        let answers_path = self.root.join(safe_id).join("answers.json");
        let raw = tokio::fs::read_to_string(&answers_path)
            .await
            .map_err(|_| TestStoreError::NotFound)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Scoring records assembled from the local pack: manifest question order,
    /// restricted to question ids the answer key actually covers.
    pub(crate) async fn local_scoring_records(
        &self,
        test_id: &str,
    ) -> Result<Vec<ScoringRecord>, TestStoreError> {
        let manifest = self.raw_manifest(test_id).await?;
        let answers = self.answer_key(test_id).await?;

        let mut records = Vec::new();
        for section in &manifest.sections {
            for question in &section.questions {
                let Some(correct_json) = answers.get(&question.q_id) else {
                    continue;
                };
                records.push(ScoringRecord {
                    q_id: question.q_id.clone(),
                    q_type: QuestionType::parse(&question.q_type),
                    correct_json: correct_json.clone(),
                });
            }
        }

        Ok(records)
    }

    pub(crate) async fn resolve_asset(
        &self,
        test_id: &str,
        raw_relative_path: &str,
    ) -> Result<PathBuf, TestStoreError> {
        let safe_id = sanitize_test_id(test_id).ok_or(TestStoreError::InvalidId)?;
        let relative = sanitize_relative_path(raw_relative_path)?;

        let assets_root = canonicalize_existing(self.root.join(safe_id).join("assets")).await?;
        let resolved = canonicalize_existing(assets_root.join(relative)).await?;

        if !resolved.starts_with(&assets_root) {
            return Err(TestStoreError::PathOutsideRoot);
        }

        Ok(resolved)
    }

    pub(crate) async fn write_answer_templates(
        &self,
        test_id: &str,
        template: &serde_json::Map<String, Value>,
    ) -> Result<(), TestStoreError> {
        let safe_id = sanitize_test_id(test_id).ok_or(TestStoreError::InvalidId)?;
        let pack_dir = self.root.join(safe_id);

        let pretty = serde_json::to_string_pretty(template)?;
        tokio::fs::write(pack_dir.join("answers_template.json"), pretty).await?;

        let mut csv = String::from("q_id,correct_json\n");
        for (q_id, shape) in template {
            csv.push_str(&crate::services::results_export::csv_escape(q_id));
            csv.push(',');
            csv.push_str(&crate::services::results_export::csv_escape(&shape.to_string()));
            csv.push('\n');
        }
        tokio::fs::write(pack_dir.join("answers_template.csv"), csv).await?;

        Ok(())
    }

    async fn load_section(&self, test_id: &str, raw_section: RawSection) -> Section {
        let questions = raw_section.questions.into_iter().map(map_question).collect();
        let assets = self.map_assets(test_id, raw_section.assets);

        if raw_section.kind == "listening" {
            Section::Listening(ListeningSection {
                section_id: raw_section.section_id,
                title: raw_section.title,
                instructions_md: raw_section.instructions_md,
                audio_src: raw_section
                    .audio_src
                    .as_deref()
                    .and_then(|src| self.asset_url(test_id, src)),
                questions,
                assets,
            })
        } else {
            let passage_md = match raw_section.passage_src_md.as_deref() {
                Some(relative) => self.read_passage(test_id, relative).await,
                None => None,
            };
            Section::Reading(ReadingSection {
                section_id: raw_section.section_id,
                title: raw_section.title,
                instructions_md: raw_section.instructions_md,
                passage_md,
                layout: raw_section.layout,
                questions,
                assets,
            })
        }
    }

    // The id is re-checked here: it arrives from the manifest body, not the
    // request, and must never widen the readable tree.
    async fn read_passage(&self, test_id: &str, relative: &str) -> Option<String> {
        let safe_id = sanitize_test_id(test_id)?;
        let relative = sanitize_relative_path(relative).ok()?;
        tokio::fs::read_to_string(self.root.join(safe_id).join(relative)).await.ok()
    }

    fn map_assets(
        &self,
        test_id: &str,
        assets: Option<BTreeMap<String, Value>>,
    ) -> Option<BTreeMap<String, String>> {
        let assets = assets?;
        let mapped: BTreeMap<String, String> = assets
            .into_iter()
            .filter_map(|(key, value)| {
                let url = self.asset_url(test_id, value.as_str()?)?;
                Some((key, url))
            })
            .collect();

        if mapped.is_empty() {
            None
        } else {
            Some(mapped)
        }
    }

    fn asset_url(&self, test_id: &str, raw: &str) -> Option<String> {
        if raw.is_empty() {
            return None;
        }
        let cleaned = strip_assets_prefix(raw);
        Some(format!("{}/tests/{}/assets/{}", self.api_prefix, test_id, cleaned))
    }
}

fn map_question(raw_question: RawQuestion) -> Question {
    Question {
        q_id: raw_question.q_id,
        q_type: QuestionType::parse(&raw_question.q_type),
        prompt_md: raw_question.prompt_md.unwrap_or_default(),
        expected: raw_question.expected,
        options: raw_question.options,
        options_letters: raw_question.options_letters,
        options_paragraphs: raw_question.options_paragraphs,
        options_labels: raw_question.options_labels,
        extra: raw_question.extra,
    }
}

pub(crate) fn sanitize_test_id(raw: &str) -> Option<&str> {
    if raw.is_empty() {
        return None;
    }
    if !raw.bytes().all(|byte| byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-') {
        return None;
    }
    Some(raw)
}

pub(crate) fn sanitize_relative_path(raw: &str) -> Result<PathBuf, TestStoreError> {
    let normalized = raw.trim().replace('\\', "/");
    let normalized = normalized.trim_start_matches('/');
    if normalized.is_empty() {
        return Err(TestStoreError::InvalidRelativePath);
    }

    let path = Path::new(normalized);
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(TestStoreError::InvalidRelativePath);
            }
        }
    }

    Ok(path.to_path_buf())
}

pub(crate) fn guess_mime(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("m4a") => "audio/mp4",
        Some("ogg") => "audio/ogg",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

// Mirrors the manifest convention that asset references may be written as
// "assets/foo.mp3", "/assets/foo.mp3", or already relative to the assets dir.
fn strip_assets_prefix(raw: &str) -> &str {
    let without_slash = raw.strip_prefix('/').unwrap_or(raw);
    match without_slash.strip_prefix("assets") {
        Some(rest) => rest.strip_prefix('/').unwrap_or(rest),
        None => without_slash,
    }
}

async fn canonicalize_existing(path: PathBuf) -> Result<PathBuf, TestStoreError> {
    match tokio::fs::canonicalize(&path).await {
        Ok(canonical) => Ok(canonical),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(TestStoreError::NotFound),
        Err(err) => Err(TestStoreError::Io(err)),
    }
}
