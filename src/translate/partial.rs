//! Best-effort field extraction from incomplete JSON.
//!
//! While a translation streams, the accumulated content is a JSON document
//! with its tail missing. Waiting for syntactic completeness would defeat
//! the point of streaming, so [`extract_string_field`] scans for a named
//! string field and returns whatever prefix of its value has arrived.
//!
//! This is a scraper, not a parser — it is kept behind this narrow module
//! boundary so a real incremental JSON parser can replace it without
//! touching the client or orchestrator.
//!
//! Known limitation: a `\uXXXX` escape split across stream chunks is
//! decoded literally (as the characters `u`, `X`, …) rather than resolved;
//! the strict parse at stream end produces the correct final text.

use std::time::{Duration, Instant};

use crate::translate::Translation;

// ---------------------------------------------------------------------------
// extract_string_field
// ---------------------------------------------------------------------------

/// Extract the value of string field `key` from possibly-incomplete JSON
/// text.
///
/// Returns `None` when the key (or its opening quote) has not arrived yet.
/// When the closing quote is missing, returns the partial value seen so
/// far. Decodes `\n`, `\t` and `\r`; any other escaped character is taken
/// literally (which also covers `\"` and `\\`).
pub fn extract_string_field(json_like: &str, key: &str) -> Option<String> {
    let needle = format!("\"{key}\"");
    let key_idx = json_like.find(&needle)?;
    let after_key = &json_like[key_idx + needle.len()..];
    let colon = after_key.find(':')?;
    let after_colon = &after_key[colon + 1..];
    let quote = after_colon.find('"')?;

    let mut value = String::new();
    let mut escaping = false;
    for ch in after_colon[quote + 1..].chars() {
        if escaping {
            match ch {
                'n' => value.push('\n'),
                't' => value.push('\t'),
                'r' => value.push('\r'),
                other => value.push(other),
            }
            escaping = false;
            continue;
        }
        match ch {
            '\\' => escaping = true,
            '"' => return Some(value),
            other => value.push(other),
        }
    }

    // No closing quote yet — emit the prefix that has arrived.
    Some(value)
}

// ---------------------------------------------------------------------------
// PartialEmitter
// ---------------------------------------------------------------------------

/// Throttled change-detector over the streamed content buffer.
///
/// Re-scrapes `translation` / `originalPhrase` on every poll, but only
/// yields a [`Translation`] when something actually changed *and* the
/// minimum interval since the last emission has elapsed — streams can
/// deliver dozens of deltas per second and the render sink should not be
/// flooded.
pub struct PartialEmitter {
    min_interval: Duration,
    last_emit: Option<Instant>,
    translation: String,
    original_phrase: String,
    last_sent: (String, String),
}

impl PartialEmitter {
    /// Create an emitter that yields at most once per `min_interval`.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_emit: None,
            translation: String::new(),
            original_phrase: String::new(),
            last_sent: (String::new(), String::new()),
        }
    }

    /// Re-scrape `content` and return a partial result if one is due.
    pub fn poll(&mut self, content: &str) -> Option<Translation> {
        if let Some(t) = extract_string_field(content, "translation") {
            self.translation = t;
        }
        if let Some(o) = extract_string_field(content, "originalPhrase") {
            self.original_phrase = o;
        }

        if self.translation.is_empty() && self.original_phrase.is_empty() {
            return None;
        }

        let changed = self.translation != self.last_sent.0 || self.original_phrase != self.last_sent.1;
        if !changed {
            return None;
        }

        let now = Instant::now();
        if let Some(prev) = self.last_emit {
            if now.duration_since(prev) < self.min_interval {
                return None;
            }
        }

        self.last_emit = Some(now);
        self.last_sent = (self.translation.clone(), self.original_phrase.clone());
        Some(self.snapshot(false))
    }

    /// `true` once any translation text has been extracted — the fallback
    /// when the stream's final strict parse fails.
    pub fn has_content(&self) -> bool {
        !self.translation.is_empty()
    }

    /// Current extracted state as a [`Translation`].
    pub fn snapshot(&self, is_final: bool) -> Translation {
        Translation {
            translation: self.translation.clone(),
            original_phrase: (!self.original_phrase.is_empty())
                .then(|| self.original_phrase.clone()),
            examples: Vec::new(),
            notes: None,
            is_final,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ---- extract_string_field ----------------------------------------------

    #[test]
    fn extracts_complete_field() {
        let json = r#"{"translation":"hola","examples":[]}"#;
        assert_eq!(
            extract_string_field(json, "translation").as_deref(),
            Some("hola")
        );
    }

    #[test]
    fn extracts_unterminated_prefix() {
        let json = r#"{"translation":"hola mun"#;
        assert_eq!(
            extract_string_field(json, "translation").as_deref(),
            Some("hola mun")
        );
    }

    #[test]
    fn missing_key_is_none() {
        assert!(extract_string_field(r#"{"other":"x"}"#, "translation").is_none());
    }

    #[test]
    fn key_without_value_yet_is_none_until_quote() {
        assert!(extract_string_field(r#"{"translation""#, "translation").is_none());
        assert!(extract_string_field(r#"{"translation":"#, "translation").is_none());
        // Opening quote arrived, value is empty so far.
        assert_eq!(
            extract_string_field(r#"{"translation":""#, "translation").as_deref(),
            Some("")
        );
    }

    #[test]
    fn decodes_common_escapes() {
        let json = r#"{"notes":"line1\nline2\tend"}"#;
        assert_eq!(
            extract_string_field(json, "notes").as_deref(),
            Some("line1\nline2\tend")
        );
    }

    #[test]
    fn escaped_quote_does_not_terminate() {
        let json = r#"{"translation":"say \"hi\" now"}"#;
        assert_eq!(
            extract_string_field(json, "translation").as_deref(),
            Some(r#"say "hi" now"#)
        );
    }

    #[test]
    fn trailing_backslash_waits_for_next_chunk() {
        // Chunk ends mid-escape: the backslash is consumed, nothing bogus
        // is appended.
        let json = r#"{"translation":"abc\"#;
        assert_eq!(
            extract_string_field(json, "translation").as_deref(),
            Some("abc")
        );
    }

    #[test]
    fn handles_whitespace_around_colon() {
        let json = r#"{ "translation" :  "hola" }"#;
        assert_eq!(
            extract_string_field(json, "translation").as_deref(),
            Some("hola")
        );
    }

    // ---- PartialEmitter ----------------------------------------------------

    fn unthrottled() -> PartialEmitter {
        PartialEmitter::new(Duration::ZERO)
    }

    #[test]
    fn emits_when_content_appears() {
        let mut e = unthrottled();
        let partial = e.poll(r#"{"translation":"ho"#).expect("partial");
        assert_eq!(partial.translation, "ho");
        assert!(!partial.is_final);
    }

    #[test]
    fn no_emission_without_extractable_content() {
        let mut e = unthrottled();
        assert!(e.poll(r#"{"exam"#).is_none());
        assert!(!e.has_content());
    }

    #[test]
    fn unchanged_content_is_not_re_emitted() {
        let mut e = unthrottled();
        assert!(e.poll(r#"{"translation":"hola""#).is_some());
        assert!(e.poll(r#"{"translation":"hola""#).is_none());
    }

    #[test]
    fn growing_content_emits_again() {
        let mut e = unthrottled();
        assert_eq!(e.poll(r#"{"translation":"ho"#).expect("p1").translation, "ho");
        assert_eq!(
            e.poll(r#"{"translation":"hola"#).expect("p2").translation,
            "hola"
        );
    }

    #[test]
    fn interval_throttles_second_emission() {
        // An hour-long interval: the first change emits, later changes are
        // suppressed, but the extracted state keeps advancing.
        let mut e = PartialEmitter::new(Duration::from_secs(3_600));
        assert!(e.poll(r#"{"translation":"h"#).is_some());
        assert!(e.poll(r#"{"translation":"hola"#).is_none());
        assert_eq!(e.snapshot(true).translation, "hola");
    }

    #[test]
    fn snapshot_omits_empty_original_phrase() {
        let mut e = unthrottled();
        e.poll(r#"{"translation":"hola"}"#);
        let snap = e.snapshot(true);
        assert_eq!(snap.translation, "hola");
        assert!(snap.original_phrase.is_none());
        assert!(snap.is_final);
    }

    #[test]
    fn snapshot_carries_original_phrase() {
        let mut e = unthrottled();
        e.poll(r#"{"originalPhrase":"hello","translation":"hola"}"#);
        let snap = e.snapshot(false);
        assert_eq!(snap.original_phrase.as_deref(), Some("hello"));
    }
}
