use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

use crate::schemas::submission::AnswerValue;
use crate::schemas::test_definition::{Section, TestDefinition};

pub const DEFAULT_LISTENING_MINUTES: f64 = 30.0;
pub const DEFAULT_READING_MINUTES: f64 = 60.0;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("test has no listening or reading sections")]
    NoSections,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Listening,
    Reading,
    Submitted,
}

/// What a driver should do after feeding the session a tick or an advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Nothing to do; keep ticking.
    Running,
    /// The active phase finished and the session moved to the given phase.
    PhaseAdvanced(Phase),
    /// All timed phases are done; the driver should submit the answers.
    SubmitReady,
}

/// Deterministic exam clock. The driver owns real time and calls [`tick`]
/// once per elapsed second; phase transitions and the submit hand-off are
/// pure state changes, so an expiry can never fire twice.
///
/// [`tick`]: ExamSession::tick
#[derive(Debug)]
pub struct ExamSession {
    phase: Phase,
    listening_remaining: u64,
    reading_remaining: u64,
    listening_complete: bool,
    reading_complete: bool,
    submitting: bool,
    answers: BTreeMap<String, AnswerValue>,
}

impl ExamSession {
    pub fn new(test: &TestDefinition) -> Result<Self, SessionError> {
        let has_listening = test.sections.iter().any(Section::is_listening);
        let has_reading = test.sections.iter().any(Section::is_reading);
        if !has_listening && !has_reading {
            return Err(SessionError::NoSections);
        }

        let timing = test.timing.as_ref();
        let listening_minutes = resolve_minutes(
            timing.and_then(|t| t.listening_total_minutes),
            DEFAULT_LISTENING_MINUTES,
        );
        let reading_minutes =
            resolve_minutes(timing.and_then(|t| t.reading_total_minutes), DEFAULT_READING_MINUTES);

        Ok(Self {
            phase: if has_listening { Phase::Listening } else { Phase::Reading },
            listening_remaining: (listening_minutes * 60.0).floor() as u64,
            reading_remaining: (reading_minutes * 60.0).floor() as u64,
            listening_complete: !has_listening,
            reading_complete: !has_reading,
            submitting: false,
            answers: BTreeMap::new(),
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn listening_remaining(&self) -> u64 {
        self.listening_remaining
    }

    pub fn reading_remaining(&self) -> u64 {
        self.reading_remaining
    }

    pub fn listening_complete(&self) -> bool {
        self.listening_complete
    }

    pub fn reading_complete(&self) -> bool {
        self.reading_complete
    }

    /// Record (or overwrite) an answer. Answers accumulate across phases and
    /// survive phase transitions; recording an explicit `Null` keeps the key.
    pub fn record_answer(&mut self, q_id: &str, value: AnswerValue) {
        self.answers.insert(q_id.to_string(), value);
    }

    pub fn answers(&self) -> &BTreeMap<String, AnswerValue> {
        &self.answers
    }

    /// Snapshot of the answer map in submit-payload form.
    pub fn answers_payload(&self) -> serde_json::Map<String, Value> {
        self.answers.iter().map(|(q_id, value)| (q_id.clone(), value.to_value())).collect()
    }

    /// Advance the clock of the active phase by one second. Only the active
    /// phase's timer moves; a phase that already completed cannot expire again.
    pub fn tick(&mut self) -> SessionEvent {
        match self.phase {
            Phase::Listening if !self.listening_complete => {
                self.listening_remaining = self.listening_remaining.saturating_sub(1);
                if self.listening_remaining == 0 {
                    self.complete_listening()
                } else {
                    SessionEvent::Running
                }
            }
            Phase::Reading if !self.reading_complete => {
                self.reading_remaining = self.reading_remaining.saturating_sub(1);
                if self.reading_remaining == 0 {
                    self.complete_reading()
                } else {
                    SessionEvent::Running
                }
            }
            _ => SessionEvent::Running,
        }
    }

    /// Manual "finish this phase" action, the button counterpart of expiry.
    /// Unlike [`tick`](ExamSession::tick) it may re-issue [`SessionEvent::SubmitReady`]
    /// so a failed submission can be retried.
    pub fn advance(&mut self) -> SessionEvent {
        match self.phase {
            Phase::Submitted => SessionEvent::Running,
            Phase::Listening if !self.listening_complete => self.complete_listening(),
            // A listening-only test stays in the listening phase while it
            // waits for submission to succeed.
            Phase::Listening => SessionEvent::SubmitReady,
            Phase::Reading => self.complete_reading(),
        }
    }

    /// Single-flight guard. Returns `true` exactly once until the matching
    /// [`finish_submission`](ExamSession::finish_submission) call.
    pub fn begin_submission(&mut self) -> bool {
        if self.submitting || self.phase == Phase::Submitted {
            return false;
        }
        self.submitting = true;
        true
    }

    pub fn finish_submission(&mut self, success: bool) {
        self.submitting = false;
        if success {
            self.listening_complete = true;
            self.reading_complete = true;
            self.phase = Phase::Submitted;
        }
    }

    fn complete_listening(&mut self) -> SessionEvent {
        self.listening_complete = true;
        if self.reading_complete {
            SessionEvent::SubmitReady
        } else {
            self.phase = Phase::Reading;
            SessionEvent::PhaseAdvanced(Phase::Reading)
        }
    }

    fn complete_reading(&mut self) -> SessionEvent {
        self.reading_complete = true;
        SessionEvent::SubmitReady
    }
}

fn resolve_minutes(value: Option<f64>, fallback: f64) -> f64 {
    match value {
        Some(minutes) if minutes.is_finite() && minutes > 0.0 => minutes,
        _ => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::test_definition::{
        ListeningSection, Question, QuestionType, ReadingSection, TestTiming,
    };

    fn question(q_id: &str) -> Question {
        Question {
            q_id: q_id.to_string(),
            q_type: QuestionType::ShortText,
            prompt_md: "prompt".to_string(),
            expected: None,
            options: None,
            options_letters: None,
            options_paragraphs: None,
            options_labels: None,
            extra: None,
        }
    }

    fn listening_section() -> Section {
        Section::Listening(ListeningSection {
            section_id: "s1".to_string(),
            title: "Listening".to_string(),
            instructions_md: None,
            audio_src: None,
            questions: vec![question("q1")],
            assets: None,
        })
    }

    fn reading_section() -> Section {
        Section::Reading(ReadingSection {
            section_id: "s2".to_string(),
            title: "Reading".to_string(),
            instructions_md: None,
            passage_md: None,
            layout: None,
            questions: vec![question("q2")],
            assets: None,
        })
    }

    fn test_with(sections: Vec<Section>, timing: Option<TestTiming>) -> TestDefinition {
        TestDefinition {
            test_id: "demo".to_string(),
            title: "Demo".to_string(),
            timing,
            ui_constraints: None,
            sections,
        }
    }

    // Three seconds of listening, two of reading.
    fn short_timing() -> Option<TestTiming> {
        Some(TestTiming {
            listening_total_minutes: Some(3.0 / 60.0),
            reading_total_minutes: Some(2.0 / 60.0),
        })
    }

    #[test]
    fn defaults_apply_when_timing_is_absent_or_invalid() {
        let session =
            ExamSession::new(&test_with(vec![listening_section(), reading_section()], None))
                .expect("session");
        assert_eq!(session.listening_remaining(), 30 * 60);
        assert_eq!(session.reading_remaining(), 60 * 60);

        let bad_timing = Some(TestTiming {
            listening_total_minutes: Some(0.0),
            reading_total_minutes: Some(-5.0),
        });
        let session =
            ExamSession::new(&test_with(vec![listening_section(), reading_section()], bad_timing))
                .expect("session");
        assert_eq!(session.listening_remaining(), 30 * 60);
        assert_eq!(session.reading_remaining(), 60 * 60);
    }

    #[test]
    fn manifest_timing_overrides_defaults() {
        let timing =
            Some(TestTiming { listening_total_minutes: Some(10.0), reading_total_minutes: Some(20.0) });
        let session =
            ExamSession::new(&test_with(vec![listening_section(), reading_section()], timing))
                .expect("session");
        assert_eq!(session.listening_remaining(), 600);
        assert_eq!(session.reading_remaining(), 1200);
    }

    #[test]
    fn empty_test_is_rejected() {
        assert_eq!(
            ExamSession::new(&test_with(Vec::new(), None)).unwrap_err(),
            SessionError::NoSections
        );
    }

    #[test]
    fn reading_only_test_starts_in_reading() {
        let session = ExamSession::new(&test_with(vec![reading_section()], None)).expect("session");
        assert_eq!(session.phase(), Phase::Reading);
        assert!(session.listening_complete());
    }

    #[test]
    fn listening_expiry_advances_exactly_once() {
        let mut session =
            ExamSession::new(&test_with(vec![listening_section(), reading_section()], short_timing()))
                .expect("session");
        assert_eq!(session.phase(), Phase::Listening);

        assert_eq!(session.tick(), SessionEvent::Running);
        assert_eq!(session.tick(), SessionEvent::Running);
        assert_eq!(session.tick(), SessionEvent::PhaseAdvanced(Phase::Reading));
        assert_eq!(session.phase(), Phase::Reading);
        assert!(session.listening_complete());

        // Further ticks run the reading clock only.
        assert_eq!(session.tick(), SessionEvent::Running);
        assert_eq!(session.reading_remaining(), 1);
        assert_eq!(session.listening_remaining(), 0);
    }

    #[test]
    fn inactive_phase_timer_does_not_move() {
        let mut session =
            ExamSession::new(&test_with(vec![listening_section(), reading_section()], short_timing()))
                .expect("session");
        let reading_before = session.reading_remaining();
        session.tick();
        assert_eq!(session.reading_remaining(), reading_before);
    }

    #[test]
    fn reading_expiry_requests_submission_once() {
        let mut session =
            ExamSession::new(&test_with(vec![reading_section()], short_timing())).expect("session");

        assert_eq!(session.tick(), SessionEvent::Running);
        assert_eq!(session.tick(), SessionEvent::SubmitReady);
        // Timer expiry never re-requests submission.
        assert_eq!(session.tick(), SessionEvent::Running);
        assert_eq!(session.tick(), SessionEvent::Running);
    }

    #[test]
    fn listening_only_test_submits_after_listening() {
        let mut session =
            ExamSession::new(&test_with(vec![listening_section()], short_timing())).expect("session");
        session.tick();
        session.tick();
        assert_eq!(session.tick(), SessionEvent::SubmitReady);
        assert_eq!(session.phase(), Phase::Listening);
        assert!(session.listening_complete());
        assert!(session.reading_complete());
    }

    #[test]
    fn manual_advance_mirrors_expiry() {
        let mut session =
            ExamSession::new(&test_with(vec![listening_section(), reading_section()], None))
                .expect("session");
        assert_eq!(session.advance(), SessionEvent::PhaseAdvanced(Phase::Reading));
        assert_eq!(session.advance(), SessionEvent::SubmitReady);
    }

    #[test]
    fn submission_guard_is_single_flight_and_allows_retry() {
        let mut session =
            ExamSession::new(&test_with(vec![reading_section()], short_timing())).expect("session");
        session.tick();
        assert_eq!(session.tick(), SessionEvent::SubmitReady);

        assert!(session.begin_submission());
        assert!(!session.begin_submission());
        session.finish_submission(false);

        // Retry is manual: advancing again re-requests submission.
        assert_eq!(session.advance(), SessionEvent::SubmitReady);
        assert!(session.begin_submission());
        session.finish_submission(true);

        assert_eq!(session.phase(), Phase::Submitted);
        assert!(!session.begin_submission());
        assert_eq!(session.tick(), SessionEvent::Running);
        assert_eq!(session.advance(), SessionEvent::Running);
    }

    #[test]
    fn answers_accumulate_across_phases_and_overwrite() {
        let mut session =
            ExamSession::new(&test_with(vec![listening_section(), reading_section()], None))
                .expect("session");

        session.record_answer("q1", AnswerValue::Text("paris".to_string()));
        session.advance();
        session.record_answer("q2", AnswerValue::Index(2));
        session.record_answer("q1", AnswerValue::Text("london".to_string()));
        session.record_answer("q3", AnswerValue::Null);

        let payload = session.answers_payload();
        assert_eq!(payload.len(), 3);
        assert_eq!(payload.get("q1"), Some(&serde_json::json!("london")));
        assert_eq!(payload.get("q2"), Some(&serde_json::json!(2)));
        assert_eq!(payload.get("q3"), Some(&serde_json::Value::Null));
    }
}
