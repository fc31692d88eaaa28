//! Continuous speech transcription
//!
//! Wraps a `SpeechRecognizer` in a continuous session: recognizer
//! segments are restarted automatically for as long as the user still
//! intends to listen, and update batches are merged into one coherent
//! transcript distinguishing committed from interim text.

mod backend;
mod error;
mod messages;
mod realtime;
mod session;

pub use backend::SpeechRecognizer;
pub use error::RecognitionError;
pub use realtime::{RealtimeConfig, RealtimeRecognizer};
pub use session::{
    RecognizerEvent, ResultSlot, SessionReaction, SessionState, TranscriptSession,
};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Transcript event for subscribers
#[derive(Clone, Debug)]
pub enum TranscriptEvent {
    /// Transcript changed after a recognizer update batch
    Update {
        committed_delta: String,
        interim: String,
    },
    /// A recognizer segment ended and a new one was started
    SegmentRestarted,
    /// The session completed its transition to Stopped
    Stopped,
    /// Recoverable recognizer error
    Error { message: String },
    /// Fatal: microphone permission denied; the session will not restart
    PermissionDenied { message: String },
}

/// Client for running continuous transcription sessions
pub struct RecognitionClient {
    recognizer: Arc<dyn SpeechRecognizer>,
    session: Arc<Mutex<TranscriptSession>>,
    event_tx: broadcast::Sender<TranscriptEvent>,
    should_stop: Arc<AtomicBool>,
}

impl RecognitionClient {
    pub fn new(recognizer: Arc<dyn SpeechRecognizer>) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            recognizer,
            session: Arc::new(Mutex::new(TranscriptSession::default())),
            event_tx,
            should_stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Subscribe to transcript events
    pub fn subscribe(&self) -> broadcast::Receiver<TranscriptEvent> {
        self.event_tx.subscribe()
    }

    /// Snapshot of the current session data
    pub fn session(&self) -> TranscriptSession {
        match self.session.lock() {
            Ok(session) => session.clone(),
            Err(poisoned) => {
                warn!("Session mutex was poisoned, recovering data");
                poisoned.into_inner().clone()
            }
        }
    }

    pub fn is_listening(&self) -> bool {
        self.session().state() == SessionState::Listening
    }

    /// Full transcript as currently rendered, interim text included
    #[allow(dead_code)]
    pub fn full_transcript(&self) -> String {
        let session = self.session();
        crate::display::render_transcript(session.committed_text(), session.interim_text())
    }

    /// Run one continuous transcription session until stopped or a fatal
    /// failure.
    ///
    /// Clears the previous transcript, then loops one recognizer segment
    /// per iteration: an end-of-segment while the session still wants to
    /// listen triggers exactly one restart; otherwise the session
    /// completes its transition to Stopped.
    pub async fn run(&self) -> Result<(), RecognitionError> {
        self.should_stop.store(false, Ordering::SeqCst);
        self.with_session(|s| s.start());
        info!("Transcription session started");

        loop {
            let mut events = match self
                .recognizer
                .start_segment(self.should_stop.clone())
                .await
            {
                Ok(events) => events,
                Err(e) => {
                    self.handle_start_failure(&e);
                    return Err(e);
                }
            };

            let mut restart = false;
            while let Some(event) = events.recv().await {
                self.log_event(&event);
                let reaction = self.with_session(|s| s.handle_event(event));
                match reaction {
                    SessionReaction::None => {}
                    SessionReaction::Updated {
                        committed_delta,
                        interim,
                    } => {
                        let _ = self.event_tx.send(TranscriptEvent::Update {
                            committed_delta,
                            interim,
                        });
                    }
                    SessionReaction::Restart => {
                        restart = true;
                        break;
                    }
                    SessionReaction::BecameStopped => {
                        info!("Transcription session stopped");
                        let _ = self.event_tx.send(TranscriptEvent::Stopped);
                        return Ok(());
                    }
                    SessionReaction::Fatal { message } => {
                        let _ = self
                            .event_tx
                            .send(TranscriptEvent::PermissionDenied {
                                message: message.clone(),
                            });
                        return Err(RecognitionError::PermissionDenied(message));
                    }
                }
            }

            if restart {
                info!("Recognizer segment ended, restarting");
                let _ = self.event_tx.send(TranscriptEvent::SegmentRestarted);
                continue;
            }

            // Channel closed without an explicit end-of-segment event:
            // treat it as one.
            match self.with_session(|s| s.handle_event(RecognizerEvent::SegmentEnded)) {
                SessionReaction::Restart => {
                    info!("Recognizer channel closed, restarting");
                    let _ = self.event_tx.send(TranscriptEvent::SegmentRestarted);
                }
                SessionReaction::BecameStopped => {
                    info!("Transcription session stopped");
                    let _ = self.event_tx.send(TranscriptEvent::Stopped);
                    return Ok(());
                }
                _ => return Ok(()),
            }
        }
    }

    /// Request the session to stop.
    ///
    /// Asynchronous: the Stopped transition happens once the recognizer
    /// reports the end of the current segment.
    pub fn stop(&self) {
        self.with_session(|s| s.request_stop());
        self.should_stop.store(true, Ordering::SeqCst);
    }

    fn handle_start_failure(&self, error: &RecognitionError) {
        match error {
            RecognitionError::PermissionDenied(message) => {
                let reaction = self.with_session(|s| {
                    s.handle_event(RecognizerEvent::PermissionDenied(message.clone()))
                });
                if let SessionReaction::Fatal { message } = reaction {
                    let _ = self
                        .event_tx
                        .send(TranscriptEvent::PermissionDenied { message });
                }
            }
            other => {
                let _ = self.event_tx.send(TranscriptEvent::Error {
                    message: other.to_string(),
                });
                // Close out the state machine; nothing is listening now
                self.with_session(|s| {
                    s.request_stop();
                    s.handle_event(RecognizerEvent::SegmentEnded)
                });
            }
        }
    }

    fn log_event(&self, event: &RecognizerEvent) {
        match event {
            RecognizerEvent::NoSpeech => info!("No speech detected"),
            RecognizerEvent::Error(message) => {
                warn!("Recognizer error: {}", message);
                let _ = self.event_tx.send(TranscriptEvent::Error {
                    message: message.clone(),
                });
            }
            _ => {}
        }
    }

    fn with_session<T>(&self, f: impl FnOnce(&mut TranscriptSession) -> T) -> T {
        match self.session.lock() {
            Ok(mut session) => f(&mut session),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// Scripted recognizer: each segment plays back a fixed event list,
    /// then waits for the stop flag before ending the segment.
    struct ScriptedRecognizer {
        scripts: Mutex<VecDeque<Vec<RecognizerEvent>>>,
        segments_started: AtomicUsize,
    }

    impl ScriptedRecognizer {
        fn new(scripts: Vec<Vec<RecognizerEvent>>) -> Self {
            Self {
                scripts: Mutex::new(scripts.into_iter().collect()),
                segments_started: AtomicUsize::new(0),
            }
        }

        fn segments_started(&self) -> usize {
            self.segments_started.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SpeechRecognizer for ScriptedRecognizer {
        async fn start_segment(
            &self,
            stop: Arc<AtomicBool>,
        ) -> Result<mpsc::Receiver<RecognizerEvent>, RecognitionError> {
            self.segments_started.fetch_add(1, Ordering::SeqCst);
            let script = self
                .scripts
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_default();

            let (tx, rx) = mpsc::channel(16);
            tokio::spawn(async move {
                let mut ends_itself = false;
                for event in script {
                    if matches!(event, RecognizerEvent::SegmentEnded) {
                        ends_itself = true;
                    }
                    if tx.send(event).await.is_err() {
                        return;
                    }
                    if ends_itself {
                        return;
                    }
                }
                // Keep the segment open until a stop is requested
                loop {
                    if stop.load(Ordering::SeqCst) {
                        let _ = tx.send(RecognizerEvent::SegmentEnded).await;
                        return;
                    }
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            });

            Ok(rx)
        }
    }

    async fn next_event(rx: &mut broadcast::Receiver<TranscriptEvent>) -> TranscriptEvent {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for transcript event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn test_segment_end_restarts_exactly_once_and_preserves_transcript() {
        let recognizer = Arc::new(ScriptedRecognizer::new(vec![
            vec![
                RecognizerEvent::Results(vec![ResultSlot::finalized("one")]),
                RecognizerEvent::SegmentEnded,
            ],
            vec![RecognizerEvent::Results(vec![ResultSlot::interim("tw")])],
        ]));
        let client = Arc::new(RecognitionClient::new(recognizer.clone()));
        let mut events = client.subscribe();

        let runner = {
            let client = client.clone();
            tokio::spawn(async move { client.run().await })
        };

        assert!(matches!(
            next_event(&mut events).await,
            TranscriptEvent::Update { committed_delta, .. } if committed_delta == "one\n"
        ));
        assert!(matches!(
            next_event(&mut events).await,
            TranscriptEvent::SegmentRestarted
        ));
        assert!(matches!(
            next_event(&mut events).await,
            TranscriptEvent::Update { interim, .. } if interim == "tw"
        ));

        assert!(client.is_listening());
        assert_eq!(recognizer.segments_started(), 2);

        client.stop();
        assert!(matches!(
            next_event(&mut events).await,
            TranscriptEvent::Stopped
        ));
        runner.await.unwrap().unwrap();

        let session = client.session();
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(session.committed_text(), "one\n");
        // No further restart happened after the stop
        assert_eq!(recognizer.segments_started(), 2);
    }

    #[tokio::test]
    async fn test_permission_denied_event_is_fatal() {
        let recognizer = Arc::new(ScriptedRecognizer::new(vec![vec![
            RecognizerEvent::PermissionDenied("mic denied".to_string()),
        ]]));
        let client = Arc::new(RecognitionClient::new(recognizer.clone()));
        let mut events = client.subscribe();

        let runner = {
            let client = client.clone();
            tokio::spawn(async move { client.run().await })
        };

        assert!(matches!(
            next_event(&mut events).await,
            TranscriptEvent::PermissionDenied { message } if message == "mic denied"
        ));
        assert!(matches!(
            runner.await.unwrap(),
            Err(RecognitionError::PermissionDenied(_))
        ));
        // Fatal failures never auto-restart
        assert_eq!(recognizer.segments_started(), 1);
        assert_eq!(client.session().state(), SessionState::Stopped);
    }

    /// Recognizer whose segments cannot start at all
    struct DeniedRecognizer;

    #[async_trait]
    impl SpeechRecognizer for DeniedRecognizer {
        async fn start_segment(
            &self,
            _stop: Arc<AtomicBool>,
        ) -> Result<mpsc::Receiver<RecognizerEvent>, RecognitionError> {
            Err(RecognitionError::PermissionDenied(
                "no input device".to_string(),
            ))
        }
    }

    #[tokio::test]
    async fn test_start_failure_surfaces_permission_denied() {
        let client = Arc::new(RecognitionClient::new(Arc::new(DeniedRecognizer)));
        let mut events = client.subscribe();

        let result = client.run().await;

        assert!(matches!(
            result,
            Err(RecognitionError::PermissionDenied(_))
        ));
        assert!(matches!(
            next_event(&mut events).await,
            TranscriptEvent::PermissionDenied { .. }
        ));
        assert_eq!(client.session().state(), SessionState::Stopped);
    }

    #[tokio::test]
    async fn test_recoverable_error_keeps_listening() {
        let recognizer = Arc::new(ScriptedRecognizer::new(vec![vec![
            RecognizerEvent::NoSpeech,
            RecognizerEvent::Error("transient".to_string()),
            RecognizerEvent::Results(vec![ResultSlot::finalized("still here")]),
        ]]));
        let client = Arc::new(RecognitionClient::new(recognizer));
        let mut events = client.subscribe();

        let runner = {
            let client = client.clone();
            tokio::spawn(async move { client.run().await })
        };

        assert!(matches!(
            next_event(&mut events).await,
            TranscriptEvent::Error { message } if message == "transient"
        ));
        assert!(matches!(
            next_event(&mut events).await,
            TranscriptEvent::Update { committed_delta, .. } if committed_delta == "still here\n"
        ));

        client.stop();
        assert!(matches!(
            next_event(&mut events).await,
            TranscriptEvent::Stopped
        ));
        runner.await.unwrap().unwrap();
    }
}
