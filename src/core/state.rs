use std::sync::Arc;

use crate::core::config::Settings;
use crate::services::supabase::SupabaseStore;
use crate::services::test_store::TestStore;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    tests: TestStore,
    supabase: Option<SupabaseStore>,
}

impl AppState {
    pub(crate) fn new(settings: Settings, tests: TestStore, supabase: Option<SupabaseStore>) -> Self {
        Self { inner: Arc::new(InnerState { settings, tests, supabase }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn tests(&self) -> &TestStore {
        &self.inner.tests
    }

    pub(crate) fn supabase(&self) -> Option<&SupabaseStore> {
        self.inner.supabase.as_ref()
    }
}
