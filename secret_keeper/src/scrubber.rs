// /////////////////////////////////////////////////////////////////////////////
// secret-keeper
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Output Scrubber (C4)
//!
//! Stream-level replacement of secret byte sequences, and common encodings
//! thereof, with opaque markers. This is the actual leak-prevention
//! guarantee; the policy filter (C3) is defense in depth in front of it, not
//! a substitute — an implementation must never weaken this to accommodate
//! policy gaps.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use regex::Regex;
use secret_keeper_domain::OutputScrubber;

const MIN_SECRET_LEN: usize = 3;

struct Replacement {
    pattern: Regex,
    marker: String,
}

/// Scrubber built from a snapshot of the currently loaded secret map.
///
/// Rebuilt whenever the secret map changes (e.g. after a rotation) so that
/// the `(secret_map, scrubber)` pair is always replaced as one atomic unit
/// — see Design Note 9.
pub struct SecretScrubber {
    replacements: Vec<Replacement>,
}

impl SecretScrubber {
    /// Build a scrubber from `(name, value)` pairs. Values shorter than
    /// [`MIN_SECRET_LEN`] are skipped to avoid false-positive matches on
    /// short, common substrings.
    pub fn from_secrets<'a>(secrets: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut replacements = Vec::new();

        for (name, value) in secrets {
            if value.len() < MIN_SECRET_LEN {
                continue;
            }

            replacements.push(Replacement {
                pattern: case_insensitive_literal(value),
                marker: format!("[REDACTED:{name}]"),
            });

            let url_encoded = percent_encode(value);
            if url_encoded != value {
                replacements.push(Replacement {
                    pattern: case_insensitive_literal(&url_encoded),
                    marker: format!("[REDACTED:{name}]"),
                });
            }

            let b64 = STANDARD.encode(value.as_bytes());
            replacements.push(Replacement {
                pattern: Regex::new(&regex::escape(&b64)).expect("escaped literal is always valid"),
                marker: format!("[REDACTED:{name}:base64]"),
            });
        }

        Self { replacements }
    }

    pub fn empty() -> Self {
        Self { replacements: Vec::new() }
    }
}

impl OutputScrubber for SecretScrubber {
    fn scrub(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }

        let mut current = text.to_string();
        for replacement in &self.replacements {
            current = replacement.pattern.replace_all(&current, replacement.marker.as_str()).into_owned();
        }
        current
    }
}

fn case_insensitive_literal(value: &str) -> Regex {
    Regex::new(&format!("(?i){}", regex::escape(value))).expect("escaped literal is always valid")
}

/// Minimal percent-encoding sufficient to recognize a secret value as it
/// would appear URL-encoded in a query string or header.
fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(byte as char),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn scrubs_two_secrets_from_prose() {
        let scrubber = SecretScrubber::from_secrets([("API", "abcdef"), ("DB", "postgres://u:p@h/d")]);
        let output = scrubber.scrub("got key abcdef to access postgres://u:p@h/d today");
        assert_eq!(output, "got key [REDACTED:API] to access [REDACTED:DB] today");
    }

    #[test]
    fn scrubs_base64_encoded_secret() {
        let scrubber = SecretScrubber::from_secrets([("TOKEN", "hunter2")]);
        let output = scrubber.scrub("X-Auth: aHVudGVyMg==");
        assert_eq!(output, "X-Auth: [REDACTED:TOKEN:base64]");
    }

    #[test]
    fn case_insensitive_raw_match() {
        let scrubber = SecretScrubber::from_secrets([("API", "AbCdEf")]);
        let output = scrubber.scrub("value was abcdef exactly");
        assert_eq!(output, "value was [REDACTED:API] exactly");
    }

    #[test]
    fn skips_values_shorter_than_minimum() {
        let scrubber = SecretScrubber::from_secrets([("X", "ab")]);
        let output = scrubber.scrub("ab appears here");
        assert_eq!(output, "ab appears here");
    }

    #[test]
    fn empty_input_passes_through() {
        let scrubber = SecretScrubber::from_secrets([("API", "abcdef")]);
        assert_eq!(scrubber.scrub(""), "");
    }

    #[test]
    fn empty_scrubber_is_a_no_op() {
        let scrubber = SecretScrubber::empty();
        assert_eq!(scrubber.scrub("nothing to redact here"), "nothing to redact here");
    }

    #[test]
    fn regex_metacharacters_in_secret_are_escaped() {
        let scrubber = SecretScrubber::from_secrets([("RE", "a.b*c(d)")]);
        let output = scrubber.scrub("value is a.b*c(d) here");
        assert_eq!(output, "value is [REDACTED:RE] here");
        // A string that would match the *pattern* if unescaped, but isn't
        // the literal value, must survive untouched.
        assert_eq!(scrubber.scrub("axbycd"), "axbycd");
    }

    #[test]
    fn url_encoded_form_is_redacted() {
        let scrubber = SecretScrubber::from_secrets([("URL", "a b/c")]);
        let output = scrubber.scrub("encoded: a%20b%2Fc");
        assert_eq!(output, "encoded: [REDACTED:URL]");
    }

    proptest::proptest! {
        #[test]
        fn scrubbed_output_never_contains_the_raw_value(value in "[A-Za-z0-9]{4,20}") {
            let scrubber = SecretScrubber::from_secrets([("SECRET", value.as_str())]);
            let text = format!("prefix {value} suffix");
            let output = scrubber.scrub(&text);
            prop_assert!(!output.to_lowercase().contains(&value.to_lowercase()));
        }
    }
}
