pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod schemas;
pub(crate) mod services;

#[cfg(test)]
mod test_support;

pub use crate::schemas::submission::{
    AnswerValue, QuestionResult, SubmissionResponse, SubmitRequest,
};
pub use crate::schemas::test_definition::{
    AudioControls, ListeningSection, Question, QuestionType, ReadingSection, Section,
    SectionLayout, TestDefinition, TestTiming, UiConstraints,
};
pub use crate::services::playback::{
    PauseAction, PlaybackGuard, SeekOutcome, SEEK_TOLERANCE_SECONDS,
};
pub use crate::services::session::{
    ExamSession, Phase, SessionError, SessionEvent, DEFAULT_LISTENING_MINUTES,
    DEFAULT_READING_MINUTES,
};

use crate::core::{config::Settings, state::AppState, telemetry};
use crate::services::supabase::SupabaseStore;
use crate::services::test_store::TestStore;

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let tests = TestStore::from_settings(&settings);
    let supabase = SupabaseStore::from_settings(&settings)?;
    match &supabase {
        Some(_) => tracing::info!("Supabase persistence configured"),
        None => tracing::warn!(
            "Supabase credentials not configured; submissions will be scored locally only"
        ),
    }

    let state = AppState::new(settings, tests, supabase);
    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        "IELTS Tryout API listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(core::shutdown::shutdown_signal())
        .await?;

    Ok(())
}

/// Entry point of the `seed` binary: push one local test pack into Supabase.
/// The pack id comes from the first CLI argument, falling back to the
/// configured default.
pub async fn run_seed() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;

    let tests = TestStore::from_settings(&settings);
    let Some(supabase) = SupabaseStore::from_settings(&settings)? else {
        anyhow::bail!("SUPABASE_URL and SUPABASE_SERVICE_ROLE_KEY must be set to seed");
    };

    let test_id =
        std::env::args().nth(1).unwrap_or_else(|| settings.tests().default_test_id.clone());

    let summary = services::seeding::seed_test(&tests, &supabase, &test_id).await?;

    tracing::info!(
        test_id = %summary.test_id,
        questions = summary.question_count,
        answered = summary.answered_count,
        template_written = summary.template_written,
        "Seed complete"
    );

    Ok(())
}
