use std::sync::OnceLock;

use anyhow::Context;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the process-wide Prometheus recorder when enabled. Calling this
/// again after a successful install is a no-op, so reloading settings cannot
/// trip over the already-registered global recorder.
pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled || HANDLE.get().is_some() {
        return Ok(());
    }

    let recorder = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install the Prometheus recorder")?;
    let _ = HANDLE.set(recorder);
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    HANDLE.get().map(PrometheusHandle::render)
}
