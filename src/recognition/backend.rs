//! Speech recognizer abstraction
//!
//! One `start_segment` call corresponds to one recognizer utterance
//! segment: events flow on the returned channel until `SegmentEnded`
//! (or a fatal error), after which the channel closes. Whether another
//! segment follows is the continuous-session layer's decision, not the
//! recognizer's.

use async_trait::async_trait;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::error::RecognitionError;
use super::session::RecognizerEvent;

#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Begin one recognition segment.
    ///
    /// `stop` is the cancellation primitive: once set, the recognizer
    /// finishes the in-flight utterance, emits `SegmentEnded`, and
    /// closes the channel. Permission failures surface as
    /// `RecognitionError::PermissionDenied` here or as a
    /// `PermissionDenied` event mid-segment.
    async fn start_segment(
        &self,
        stop: Arc<AtomicBool>,
    ) -> Result<mpsc::Receiver<RecognizerEvent>, RecognitionError>;
}
