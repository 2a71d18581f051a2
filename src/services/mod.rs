pub(crate) mod grading;
pub(crate) mod playback;
pub(crate) mod results_export;
pub(crate) mod scoring;
pub(crate) mod seeding;
pub(crate) mod session;
pub(crate) mod supabase;
pub(crate) mod test_store;
