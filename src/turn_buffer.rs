//! Sentence segmentation for assistant transcripts.
//!
//! Fragments are accumulated until a sentence terminator (`.`, `!`, `?` or a newline)
//! shows up. Text up to and including the terminator run is emitted as one sentence; the
//! rest stays buffered for the next sentence.

const TERMINATORS: [char; 4] = ['.', '!', '?', '\n'];

#[derive(Debug, Default)]
pub struct TurnBuffer {
    current: String,
}

impl TurnBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fragment and return every sentence it completes, in order.
    pub fn push(&mut self, fragment: &str) -> Vec<String> {
        self.current.push_str(fragment);

        let mut sentences = Vec::new();
        while let Some(end) = sentence_end(&self.current) {
            let rest = self.current.split_off(end);
            if let Some(sentence) = self.take() {
                sentences.push(sentence);
            }
            self.current = rest;
        }
        sentences
    }

    /// Emit whatever is left, e.g. at the end of a response.
    pub fn flush(&mut self) -> Option<String> {
        self.take()
    }

    fn take(&mut self) -> Option<String> {
        let sentence = self.current.trim().to_string();
        self.current.clear();
        // whitespace-only accumulations are dropped
        (!sentence.is_empty()).then_some(sentence)
    }
}

/// Byte offset just past the first run of terminators, if any.
fn sentence_end(text: &str) -> Option<usize> {
    let start = text.find(TERMINATORS)?;
    let run = text[start..]
        .char_indices()
        .find(|(_, c)| !TERMINATORS.contains(c))
        .map(|(offset, _)| start + offset)
        .unwrap_or(text.len());
    Some(run)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(buffer: &mut TurnBuffer, fragments: &[&str]) -> Vec<String> {
        fragments.iter().flat_map(|fragment| buffer.push(fragment)).collect()
    }

    #[test]
    fn test_splits_sentences_across_fragments() {
        let mut buffer = TurnBuffer::new();
        let emitted = feed(&mut buffer, &["Hello wor", "ld. How", " are you?"]);

        assert_eq!(emitted, vec!["Hello world.".to_string(), "How are you?".to_string()]);
        assert_eq!(buffer.flush(), None);
    }

    #[test]
    fn test_terminator_runs_stay_together() {
        let mut buffer = TurnBuffer::new();
        let emitted = feed(&mut buffer, &["Really?! Yes... ", "ok"]);

        assert_eq!(emitted, vec!["Really?!".to_string(), "Yes...".to_string()]);
        assert_eq!(buffer.flush(), Some("ok".to_string()));
    }

    #[test]
    fn test_whitespace_only_sentences_are_discarded() {
        let mut buffer = TurnBuffer::new();
        assert!(buffer.push("   ").is_empty());
        assert!(buffer.push("\n").is_empty());
        assert_eq!(buffer.flush(), None);
    }

    #[test]
    fn test_newline_ends_a_sentence() {
        let mut buffer = TurnBuffer::new();
        assert_eq!(buffer.push("First line\nsecond"), vec!["First line".to_string()]);
        assert_eq!(buffer.flush(), Some("second".to_string()));
    }
}
