use tracing_subscriber::{fmt, EnvFilter};

use crate::core::config::Settings;

/// Install the global tracing subscriber. `RUST_LOG` wins over the configured
/// level so verbosity can be raised per target without touching settings.
pub(crate) fn init_tracing(settings: &Settings) -> anyhow::Result<()> {
    let telemetry = settings.telemetry();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&telemetry.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_span_events(fmt::format::FmtSpan::CLOSE);

    if telemetry.json {
        builder
            .json()
            .flatten_event(true)
            .try_init()
            .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    } else {
        builder.try_init().map_err(|err| anyhow::anyhow!(err.to_string()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{env_lock, set_test_env};

    // The global dispatcher can only be set once per process, so the repeat
    // calls below must come back as errors rather than panics.
    #[tokio::test]
    async fn init_tracing_installs_once_and_reports_reinstalls() {
        let _guard = env_lock().await;
        let tests_dir = tempfile::tempdir().expect("tests dir");
        let export_dir = tempfile::tempdir().expect("export dir");
        set_test_env(tests_dir.path(), &export_dir.path().join("submissions.csv"));

        let settings = Settings::load().expect("settings");
        init_tracing(&settings).expect("first install");
        assert!(init_tracing(&settings).is_err());

        std::env::set_var("TRYOUT_LOG_JSON", "1");
        let json_settings = Settings::load().expect("settings");
        assert!(init_tracing(&json_settings).is_err());
        std::env::remove_var("TRYOUT_LOG_JSON");
    }
}
