//! Text Normalization
//!
//! Canonicalizes decoder transcripts before command lookup.

use std::fmt;

/// Synthetic tokens the decoder may wrap around an utterance.
pub const SESSION_MARKERS: &[&str] = &["<s>", "</s>", "<sil>"];

/// Transcript after normalization: lowercase, no session markers,
/// single spaces, no leading or trailing whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct NormalizedText(String);

impl NormalizedText {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for NormalizedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalize a transcript.
pub fn normalize(text: &str) -> NormalizedText {
    let mut out = String::with_capacity(text.len());
    normalize_into(text, &mut out);
    NormalizedText(out)
}

/// Normalize `text` into `out`, reusing its allocation.
///
/// Markers are removed wherever they appear, including inside a word, until
/// none are left.
pub fn normalize_into(text: &str, out: &mut String) {
    out.clear();
    for c in text.chars() {
        if c.is_whitespace() {
            out.push(' ');
        } else {
            out.extend(c.to_lowercase());
        }
    }

    while strip_markers(out) {}

    let mut prev_space = true;
    out.retain(|c| {
        let keep = !(c == ' ' && prev_space);
        prev_space = c == ' ';
        keep
    });
    if out.ends_with(' ') {
        out.pop();
    }
}

/// Remove one pass of markers. Returns whether anything was removed.
fn strip_markers(text: &mut String) -> bool {
    let mut removed = false;
    for marker in SESSION_MARKERS {
        while let Some(pos) = text.find(marker) {
            text.replace_range(pos..pos + marker.len(), "");
            removed = true;
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_basic() {
        assert_eq!(normalize("HELLO WORLD").as_str(), "hello world");
    }

    #[test]
    fn test_normalize_strips_markers() {
        assert_eq!(normalize("<s> kitchen </s>").as_str(), "kitchen");
        assert_eq!(normalize("<S> Living Room </S>").as_str(), "living room");
        assert_eq!(normalize("<sil> bedroom <sil>").as_str(), "bedroom");
    }

    #[test]
    fn test_normalize_strips_attached_markers() {
        assert_eq!(normalize("<s>kitchen</s>").as_str(), "kitchen");
        assert_eq!(normalize("<S>exit</S>").as_str(), "exit");
        assert_eq!(normalize("<s> kitchen</s>").as_str(), "kitchen");
        assert_eq!(normalize("living<sil> room").as_str(), "living room");
    }

    #[test]
    fn test_normalize_strips_markers_exposed_by_removal() {
        assert_eq!(normalize("<<s>s>bedroom").as_str(), "bedroom");
        assert_eq!(normalize("<</s>/s> exit").as_str(), "exit");
    }

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(normalize("  living \t  room\n").as_str(), "living room");
        assert!(normalize("   ").is_empty());
        assert!(normalize("<s> </s>").is_empty());
    }

    #[test]
    fn test_normalize_keeps_unknown_token() {
        assert_eq!(normalize("[unk] kitchen").as_str(), "[unk] kitchen");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let samples = [
            "<s> KITCHEN </s>",
            "  Living   Room ",
            "<s><s> exit",
            "<<s>s>kitchen</s>",
            "<s\t> <sil >",
            "ÉCOLE  <sil>",
            "",
            "İstanbul",
        ];
        for sample in samples {
            let once = normalize(sample);
            let twice = normalize(once.as_str());
            assert_eq!(once, twice, "not idempotent for {:?}", sample);
        }
    }

    #[test]
    fn test_normalize_into_reuses_buffer() {
        let mut buf = String::from("stale contents");
        normalize_into("<s> bedroom </s>", &mut buf);
        assert_eq!(buf, "bedroom");
    }
}
