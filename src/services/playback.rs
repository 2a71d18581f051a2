/// How far (in seconds) a reported position may drift from the last allowed
/// one before it counts as a seek attempt. Browsers report fractional
/// positions, so exact comparison would flag ordinary playback.
pub const SEEK_TOLERANCE_SECONDS: f64 = 0.4;

/// Verdict for a position change reported by the audio element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeekOutcome {
    Allowed,
    /// The jump was rejected; the player must return to the given position.
    SnappedBack(f64),
}

/// Verdict for a pause event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseAction {
    Resume,
    Stay,
}

/// Enforces the one-shot listening playback policy: audio starts once,
/// cannot be paused, and cannot be scrubbed unless the test allows it.
#[derive(Debug)]
pub struct PlaybackGuard {
    allow_seek: bool,
    last_allowed: f64,
    started: bool,
    ended: bool,
}

impl PlaybackGuard {
    pub fn new(allow_seek: bool) -> Self {
        Self { allow_seek, last_allowed: 0.0, started: false, ended: false }
    }

    pub fn can_start(&self) -> bool {
        !self.started
    }

    pub fn mark_started(&mut self) {
        self.started = true;
    }

    pub fn mark_ended(&mut self) {
        self.ended = true;
    }

    pub fn has_ended(&self) -> bool {
        self.ended
    }

    /// Feed a `timeupdate`-style position report. Natural progress always
    /// moves the high-water mark; a locked player gets snapped back when the
    /// jump exceeds [`SEEK_TOLERANCE_SECONDS`] in either direction.
    pub fn on_position(&mut self, reported: f64) -> SeekOutcome {
        if !self.allow_seek && (reported - self.last_allowed).abs() > SEEK_TOLERANCE_SECONDS {
            return SeekOutcome::SnappedBack(self.last_allowed);
        }
        self.last_allowed = reported;
        SeekOutcome::Allowed
    }

    /// Feed a pause event. A locked player that already started and has not
    /// finished must resume immediately.
    pub fn on_pause(&self) -> PauseAction {
        if !self.allow_seek && self.started && !self.ended {
            PauseAction::Resume
        } else {
            PauseAction::Stay
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_is_one_shot() {
        let mut guard = PlaybackGuard::new(false);
        assert!(guard.can_start());
        guard.mark_started();
        assert!(!guard.can_start());
    }

    #[test]
    fn natural_progress_is_allowed_and_advances_the_mark() {
        let mut guard = PlaybackGuard::new(false);
        guard.mark_started();
        assert_eq!(guard.on_position(0.25), SeekOutcome::Allowed);
        assert_eq!(guard.on_position(0.5), SeekOutcome::Allowed);
        assert_eq!(guard.on_position(0.75), SeekOutcome::Allowed);
    }

    #[test]
    fn locked_player_snaps_back_on_forward_jump() {
        let mut guard = PlaybackGuard::new(false);
        guard.mark_started();
        assert_eq!(guard.on_position(12.0), SeekOutcome::SnappedBack(0.0));
    }

    #[test]
    fn locked_player_snaps_back_on_backward_jump() {
        let mut guard = PlaybackGuard::new(false);
        guard.mark_started();
        for tenths in 1..=100 {
            assert_eq!(guard.on_position(f64::from(tenths) * 0.1), SeekOutcome::Allowed);
        }
        assert_eq!(guard.on_position(2.0), SeekOutcome::SnappedBack(10.0));
        // The mark is unchanged, so resuming from it is still allowed.
        assert_eq!(guard.on_position(10.1), SeekOutcome::Allowed);
    }

    #[test]
    fn unlocked_player_may_scrub_freely() {
        let mut guard = PlaybackGuard::new(true);
        guard.mark_started();
        assert_eq!(guard.on_position(90.0), SeekOutcome::Allowed);
        assert_eq!(guard.on_position(5.0), SeekOutcome::Allowed);
        assert_eq!(guard.on_pause(), PauseAction::Stay);
    }

    #[test]
    fn locked_player_resumes_after_pause() {
        let mut guard = PlaybackGuard::new(false);
        assert_eq!(guard.on_pause(), PauseAction::Stay);
        guard.mark_started();
        assert_eq!(guard.on_pause(), PauseAction::Resume);
        guard.mark_ended();
        assert_eq!(guard.on_pause(), PauseAction::Stay);
        assert!(guard.has_ended());
    }
}
