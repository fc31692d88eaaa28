//! Live transcript rendering
//!
//! Renders the committed transcript with the current interim text
//! appended after it. Interim text lands on the trailing line when that
//! line is blank, otherwise on a line of its own, so rapid interim
//! updates never pile up blank lines. The committed part is never
//! rewritten by interim text.

/// Render committed + interim text for display
pub fn render_transcript(committed: &str, interim: &str) -> String {
    if interim.is_empty() {
        return committed.to_string();
    }
    if committed.is_empty() {
        return interim.to_string();
    }

    let last_line = committed.rsplit('\n').next().unwrap_or("");
    if last_line.trim().is_empty() {
        format!("{}{}", committed, interim)
    } else {
        format!("{}\n{}", committed, interim)
    }
}

/// Accumulated view of one transcription session, fed by update events
#[derive(Debug, Default, Clone)]
pub struct TranscriptView {
    committed: String,
    interim: String,
}

impl TranscriptView {
    /// Apply one `{committed_delta, interim}` update
    pub fn apply(&mut self, committed_delta: &str, interim: &str) {
        self.committed.push_str(committed_delta);
        self.interim = interim.to_string();
    }

    pub fn clear(&mut self) {
        self.committed.clear();
        self.interim.clear();
    }

    #[allow(dead_code)]
    pub fn committed(&self) -> &str {
        &self.committed
    }

    #[allow(dead_code)]
    pub fn interim(&self) -> &str {
        &self.interim
    }

    pub fn rendered(&self) -> String {
        render_transcript(&self.committed, &self.interim)
    }
}
