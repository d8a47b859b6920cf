/// Running text of what the assistant has said this session.
#[derive(Debug, Default, Clone)]
pub struct TranscriptBuffer {
    text: String,
}

fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

impl TranscriptBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one streamed fragment and returns the full transcript.
    ///
    /// Fragments are joined with a single space unless the boundary already
    /// has whitespace or the fragment opens with punctuation. A fragment that
    /// opens with the terminator the text already ends on has it dropped.
    pub fn append(&mut self, fragment: &str) -> &str {
        let mut fragment = fragment;
        if let (Some(last), Some(first)) = (self.text.chars().last(), fragment.chars().next()) {
            if is_terminator(last) && first == last {
                fragment = fragment.trim_start_matches(last);
            }
        }
        if fragment.is_empty() {
            return &self.text;
        }

        let needs_space = match (self.text.chars().last(), fragment.chars().next()) {
            (Some(last), Some(first)) => {
                !last.is_whitespace() && !first.is_whitespace() && !first.is_ascii_punctuation()
            }
            _ => false,
        };
        if needs_space {
            self.text.push(' ');
        }
        self.text.push_str(fragment);
        &self.text
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }
}
