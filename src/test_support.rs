use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
    Router,
};
use serde_json::json;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::api;
use crate::core::{config::Settings, state::AppState};
use crate::services::supabase::SupabaseStore;
use crate::services::test_store::TestStore;

pub(crate) struct TestContext {
    pub(crate) app: Router,
    pub(crate) export_path: PathBuf,
    pub(crate) tests_dir: tempfile::TempDir,
    _export_dir: tempfile::TempDir,
    _guard: OwnedMutexGuard<()>,
}

/// Settings are loaded from process-wide environment variables, so tests
/// that touch them serialize on this lock.
pub(crate) async fn env_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<Mutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(Mutex::new(()))).clone();
    lock.lock_owned().await
}

pub(crate) fn set_test_env(tests_root: &Path, export_path: &Path) {
    std::env::set_var("TRYOUT_ENV", "test");
    std::env::set_var("TRYOUT_STRICT_CONFIG", "0");
    std::env::set_var("TESTS_ROOT", tests_root);
    std::env::set_var("RESULTS_EXPORT_PATH", export_path);
    std::env::set_var("DEFAULT_TEST_ID", "ielts_tryout_1");
    std::env::set_var("PROMETHEUS_ENABLED", "0");
    std::env::remove_var("BACKEND_CORS_ORIGINS");
    std::env::remove_var("PROJECT_NAME");
    std::env::remove_var("VERSION");
    std::env::remove_var("API_PREFIX");
    std::env::remove_var("SUPABASE_URL");
    std::env::remove_var("SUPABASE_SERVICE_ROLE_KEY");
    std::env::remove_var("SUPABASE_TIMEOUT_SECONDS");
    std::env::remove_var("TRYOUT_LOG_JSON");
    std::env::remove_var("TRYOUT_LOG_LEVEL");
}

/// Router backed by a fresh tests root holding the standard fixture pack.
pub(crate) async fn setup_context(supabase: Option<SupabaseStore>) -> TestContext {
    let guard = env_lock().await;
    let tests_dir = tempfile::tempdir().expect("tests dir");
    let export_dir = tempfile::tempdir().expect("export dir");
    let export_path = export_dir.path().join("submissions.csv");
    write_test_pack(tests_dir.path(), "ielts_tryout_1");
    set_test_env(tests_dir.path(), &export_path);

    let settings = Settings::load().expect("settings");
    let tests = TestStore::from_settings(&settings);
    let state = AppState::new(settings, tests, supabase);
    let app = api::router::router(state);

    TestContext { app, export_path, tests_dir, _export_dir: export_dir, _guard: guard }
}

/// Router backed by a tests root that exists but holds no packs.
pub(crate) async fn setup_empty_context() -> TestContext {
    let guard = env_lock().await;
    let tests_dir = tempfile::tempdir().expect("tests dir");
    let export_dir = tempfile::tempdir().expect("export dir");
    let export_path = export_dir.path().join("submissions.csv");
    set_test_env(tests_dir.path(), &export_path);

    let settings = Settings::load().expect("settings");
    let tests = TestStore::from_settings(&settings);
    let state = AppState::new(settings, tests, None);
    let app = api::router::router(state);

    TestContext { app, export_path, tests_dir, _export_dir: export_dir, _guard: guard }
}

/// One listening and one reading section, four questions, answer key, audio
/// and map assets, and a passage file. The shape every store and endpoint
/// test works against.
pub(crate) fn write_test_pack(root: &Path, test_id: &str) {
    let pack = root.join(test_id);
    std::fs::create_dir_all(pack.join("assets").join("audio")).expect("assets dir");
    std::fs::create_dir_all(pack.join("passages")).expect("passages dir");

    let manifest = json!({
        "test_id": test_id,
        "title": "IELTS Practice Tryout 1",
        "timing": {"listening_total_minutes": 30.0, "reading_total_minutes": 60.0},
        "ui_constraints": {
            "audio_controls": {"allow_seek": false, "show_remaining": true},
            "allow_flag_question": true
        },
        "sections": [
            {
                "section_id": "s1",
                "type": "listening",
                "title": "Listening Part 1",
                "instructions_md": "Listen and answer the questions.",
                "audio_src": "assets/audio/part1.mp3",
                "assets": {"venue_map": "assets/venue_map.png"},
                "questions": [
                    {"q_id": "q1", "q_type": "short_text", "prompt_md": "Capital of France?"},
                    {
                        "q_id": "q2",
                        "q_type": "mcq_single",
                        "prompt_md": "Pick the venue.",
                        "options": ["Library", "Town hall", "Museum"]
                    }
                ]
            },
            {
                "section_id": "s2",
                "type": "reading",
                "title": "Reading Passage 1",
                "passage_src_md": "passages/passage1.md",
                "layout": {"columns": 2},
                "questions": [
                    {
                        "q_id": "q3",
                        "q_type": "true_false_not_given",
                        "prompt_md": "The venue opened in 1901."
                    },
                    {
                        "q_id": "q4",
                        "q_type": "paragraph_match",
                        "prompt_md": "Which paragraph mentions the entry fee?",
                        "options_paragraphs": ["A", "B", "C"]
                    }
                ]
            }
        ]
    });
    std::fs::write(
        pack.join("test.json"),
        serde_json::to_string_pretty(&manifest).expect("manifest"),
    )
    .expect("write manifest");

    let answers = json!({
        "q1": {"accepted": ["Paris"], "case_insensitive": true, "trim": true},
        "q2": {"correct_option_index": 2},
        "q3": {"label": "NOT GIVEN"},
        "q4": {"correct_paragraph": "B"}
    });
    std::fs::write(
        pack.join("answers.json"),
        serde_json::to_string_pretty(&answers).expect("answers"),
    )
    .expect("write answers");

    std::fs::write(pack.join("assets/audio/part1.mp3"), b"ID3 fake audio payload")
        .expect("write audio");
    std::fs::write(pack.join("assets/venue_map.png"), b"\x89PNG fake image").expect("write map");
    std::fs::write(
        pack.join("passages/passage1.md"),
        "# Passage 1\n\nSome reading text about the venue.\n",
    )
    .expect("write passage");
}

pub(crate) fn json_request(
    method: Method,
    uri: &str,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);

    if let Some(body) = body {
        let bytes = serde_json::to_vec(&body).expect("serialize body");
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(bytes))
            .expect("request body")
    } else {
        builder.body(Body::empty()).expect("request body")
    }
}

pub(crate) async fn read_json(response: axum::response::Response<Body>) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("response body");
    serde_json::from_slice(&body).unwrap_or_else(|err| {
        let body_text = String::from_utf8_lossy(&body);
        panic!("json parse: {err}; body: {body_text}");
    })
}
