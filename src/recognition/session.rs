//! Transcription session state machine
//!
//! Pure and event-sourced: recognizer events go in, named reactions
//! come out, and the driving client performs the side effects
//! (restarting the recognizer, notifying subscribers). This keeps the
//! machine testable with synthetic event sequences, without a real
//! recognizer.

/// One slot of a recognizer update batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSlot {
    pub text: String,
    /// Final slots are settled; interim slots may still change
    pub is_final: bool,
}

impl ResultSlot {
    pub fn interim(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
        }
    }

    pub fn finalized(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
        }
    }
}

/// Events delivered by a speech recognizer segment
#[derive(Debug, Clone)]
pub enum RecognizerEvent {
    /// A window of new results since the previous update. The
    /// recognizer owns the batch boundaries; only new results appear.
    Results(Vec<ResultSlot>),
    /// The recognizer finished the current utterance segment
    SegmentEnded,
    /// No speech was detected (recoverable, logged only)
    NoSpeech,
    /// Microphone permission was denied (fatal to the session)
    PermissionDenied(String),
    /// Any other recognizer error (recoverable, reported)
    Error(String),
}

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Stopped,
    Listening,
}

/// What the driving client must do after feeding an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionReaction {
    /// Nothing beyond logging
    None,
    /// Transcript changed: publish the committed delta and current interim
    Updated {
        committed_delta: String,
        interim: String,
    },
    /// Start the recognizer again for the next segment; state stays Listening
    Restart,
    /// The session completed its transition to Stopped
    BecameStopped,
    /// Fatal permission failure: surface a notice, never restart
    Fatal { message: String },
}

/// Merged transcript and user-intent state for one transcription session
#[derive(Debug, Default, Clone)]
pub struct TranscriptSession {
    state: SessionState,
    /// Committed transcript; never retroactively altered
    committed: String,
    /// In-flight text, wholly replaced by each update's interim slots
    interim: String,
    /// User intent: keep listening across recognizer segment boundaries.
    /// This flag is the source of truth for restarts; the recognizer's
    /// own started/stopped signal is not trusted alone.
    desired_continuous: bool,
    permission_denied: bool,
}

impl TranscriptSession {
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn committed_text(&self) -> &str {
        &self.committed
    }

    pub fn interim_text(&self) -> &str {
        &self.interim
    }

    #[allow(dead_code)]
    pub fn desired_continuous(&self) -> bool {
        self.desired_continuous
    }

    /// Begin a session: clears the transcript and marks intent to listen
    pub fn start(&mut self) {
        self.committed.clear();
        self.interim.clear();
        self.permission_denied = false;
        self.desired_continuous = true;
        self.state = SessionState::Listening;
    }

    /// Request a stop.
    ///
    /// Asynchronous: the transition to Stopped is deferred until the
    /// recognizer's end-of-segment event is observed.
    pub fn request_stop(&mut self) {
        self.desired_continuous = false;
    }

    /// Feed one recognizer event through the machine
    pub fn handle_event(&mut self, event: RecognizerEvent) -> SessionReaction {
        match event {
            RecognizerEvent::Results(slots) => {
                if self.state != SessionState::Listening {
                    return SessionReaction::None;
                }
                self.merge_batch(&slots)
            }
            RecognizerEvent::SegmentEnded => {
                if self.state != SessionState::Listening {
                    return SessionReaction::None;
                }
                if self.desired_continuous && !self.permission_denied {
                    SessionReaction::Restart
                } else {
                    self.state = SessionState::Stopped;
                    SessionReaction::BecameStopped
                }
            }
            RecognizerEvent::NoSpeech => SessionReaction::None,
            RecognizerEvent::PermissionDenied(message) => {
                self.permission_denied = true;
                self.desired_continuous = false;
                self.state = SessionState::Stopped;
                SessionReaction::Fatal { message }
            }
            RecognizerEvent::Error(_) => SessionReaction::None,
        }
    }

    /// Merge one update batch.
    ///
    /// Finals append to the committed transcript in batch order, one
    /// line separator per finalized slot. Interims concatenate in batch
    /// order into the interim string, which fully supersedes the
    /// previous one — interim text never accumulates across updates.
    fn merge_batch(&mut self, slots: &[ResultSlot]) -> SessionReaction {
        let mut committed_delta = String::new();
        let mut interim = String::new();

        for slot in slots {
            if slot.is_final {
                committed_delta.push_str(&slot.text);
                committed_delta.push('\n');
            } else {
                interim.push_str(&slot.text);
            }
        }

        if committed_delta.is_empty() && interim == self.interim {
            return SessionReaction::None;
        }

        self.committed.push_str(&committed_delta);
        self.interim = interim.clone();

        SessionReaction::Updated {
            committed_delta,
            interim,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listening_session() -> TranscriptSession {
        let mut session = TranscriptSession::default();
        session.start();
        session
    }

    #[test]
    fn test_start_clears_previous_transcript() {
        let mut session = listening_session();
        session.handle_event(RecognizerEvent::Results(vec![ResultSlot::finalized("old")]));
        session.handle_event(RecognizerEvent::Results(vec![ResultSlot::interim("half")]));

        session.start();

        assert_eq!(session.committed_text(), "");
        assert_eq!(session.interim_text(), "");
        assert_eq!(session.state(), SessionState::Listening);
    }

    #[test]
    fn test_interim_then_final_commits_once() {
        let mut session = listening_session();

        session.handle_event(RecognizerEvent::Results(vec![ResultSlot::interim("hello")]));
        let reaction = session.handle_event(RecognizerEvent::Results(vec![
            ResultSlot::finalized("hello world"),
        ]));

        assert_eq!(session.committed_text(), "hello world\n");
        assert_eq!(session.interim_text(), "");
        assert_eq!(
            reaction,
            SessionReaction::Updated {
                committed_delta: "hello world\n".to_string(),
                interim: String::new(),
            }
        );
    }

    #[test]
    fn test_consecutive_interims_replace_not_accumulate() {
        let mut session = listening_session();

        session.handle_event(RecognizerEvent::Results(vec![ResultSlot::interim("foo")]));
        session.handle_event(RecognizerEvent::Results(vec![ResultSlot::interim("foo bar")]));

        assert_eq!(session.interim_text(), "foo bar");
        assert_eq!(session.committed_text(), "");
    }

    #[test]
    fn test_mixed_batch_preserves_slot_order() {
        let mut session = listening_session();

        let reaction = session.handle_event(RecognizerEvent::Results(vec![
            ResultSlot::finalized("first"),
            ResultSlot::finalized("second"),
            ResultSlot::interim("thi"),
        ]));

        assert_eq!(session.committed_text(), "first\nsecond\n");
        assert_eq!(session.interim_text(), "thi");
        assert_eq!(
            reaction,
            SessionReaction::Updated {
                committed_delta: "first\nsecond\n".to_string(),
                interim: "thi".to_string(),
            }
        );
    }

    #[test]
    fn test_committed_text_is_never_rewritten_by_interims() {
        let mut session = listening_session();

        session.handle_event(RecognizerEvent::Results(vec![ResultSlot::finalized("done")]));
        session.handle_event(RecognizerEvent::Results(vec![ResultSlot::interim(
            "something else",
        )]));

        assert_eq!(session.committed_text(), "done\n");
    }

    #[test]
    fn test_segment_end_while_continuous_restarts_once() {
        let mut session = listening_session();

        let reaction = session.handle_event(RecognizerEvent::SegmentEnded);

        assert_eq!(reaction, SessionReaction::Restart);
        assert_eq!(session.state(), SessionState::Listening);
        // The transcript survives the restart
        session.handle_event(RecognizerEvent::Results(vec![ResultSlot::finalized("kept")]));
        assert_eq!(session.committed_text(), "kept\n");
    }

    #[test]
    fn test_stop_defers_transition_until_segment_end() {
        let mut session = listening_session();

        session.request_stop();
        assert!(!session.desired_continuous());
        assert_eq!(session.state(), SessionState::Listening);

        let reaction = session.handle_event(RecognizerEvent::SegmentEnded);
        assert_eq!(reaction, SessionReaction::BecameStopped);
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[test]
    fn test_segment_end_when_already_stopped_is_noop() {
        let mut session = listening_session();
        session.request_stop();
        session.handle_event(RecognizerEvent::SegmentEnded);

        let reaction = session.handle_event(RecognizerEvent::SegmentEnded);
        assert_eq!(reaction, SessionReaction::None);
    }

    #[test]
    fn test_no_speech_does_not_alter_state() {
        let mut session = listening_session();
        session.handle_event(RecognizerEvent::Results(vec![ResultSlot::finalized("hi")]));

        let reaction = session.handle_event(RecognizerEvent::NoSpeech);

        assert_eq!(reaction, SessionReaction::None);
        assert_eq!(session.state(), SessionState::Listening);
        assert_eq!(session.committed_text(), "hi\n");
    }

    #[test]
    fn test_permission_denied_suppresses_restart() {
        let mut session = listening_session();
        assert!(session.desired_continuous());

        let reaction =
            session.handle_event(RecognizerEvent::PermissionDenied("mic denied".to_string()));
        assert_eq!(
            reaction,
            SessionReaction::Fatal {
                message: "mic denied".to_string()
            }
        );
        assert_eq!(session.state(), SessionState::Stopped);

        // A trailing end-of-segment event must not trigger a restart
        let reaction = session.handle_event(RecognizerEvent::SegmentEnded);
        assert_eq!(reaction, SessionReaction::None);
    }

    #[test]
    fn test_results_after_stop_are_ignored() {
        let mut session = listening_session();
        session.request_stop();
        session.handle_event(RecognizerEvent::SegmentEnded);

        let reaction =
            session.handle_event(RecognizerEvent::Results(vec![ResultSlot::finalized("late")]));

        assert_eq!(reaction, SessionReaction::None);
        assert_eq!(session.committed_text(), "");
    }
}
