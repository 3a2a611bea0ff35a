//! Tesla Wall Connector 3 local HTTP API
//!
//! The charger exposes three read-only JSON endpoints under `/api/1`:
//! `version` (identity), `vitals` (live readings) and `lifetime`
//! (cumulative counters). No authentication is involved.

pub mod client;
pub mod types;

pub use client::{TelemetrySource, TwcClient};
pub use types::{LifetimeRaw, VersionInfo, VitalsRaw};

/// Replace bare `nan` literals with `null` so the body becomes valid JSON.
///
/// The lifetime endpoint emits Python-style `nan` (sometimes `-nan` or
/// `NaN`) for values it has not computed yet. Only tokens outside string
/// literals and not part of a longer word are replaced.
pub fn sanitize_nan_tokens(body: &str) -> String {
    let bytes = body.as_bytes();
    let mut out = String::with_capacity(body.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        if in_string {
            if escaped {
                escaped = false;
            } else if c == b'\\' {
                escaped = true;
            } else if c == b'"' {
                in_string = false;
            }
        } else if c == b'"' {
            in_string = true;
        } else if is_nan_token_at(bytes, i) {
            if out.ends_with('-') {
                out.pop();
            }
            out.push_str("null");
            i += 3;
            continue;
        }
        // Multi-byte UTF-8 sequences only occur inside strings in valid
        // JSON, but copy whole chars so we never split one.
        let ch_len = utf8_len(c);
        out.push_str(&body[i..(i + ch_len).min(bytes.len())]);
        i += ch_len;
    }
    out
}

fn is_nan_token_at(bytes: &[u8], i: usize) -> bool {
    if i + 3 > bytes.len() || !bytes[i..i + 3].eq_ignore_ascii_case(b"nan") {
        return false;
    }
    let before_ok = i == 0 || !is_word_byte(bytes[i - 1]);
    let after_ok = i + 3 == bytes.len() || !is_word_byte(bytes[i + 3]);
    before_ok && after_ok
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn utf8_len(first: u8) -> usize {
    match first {
        0xF0..=0xFF => 4,
        0xE0..=0xEF => 3,
        0xC0..=0xDF => 2,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_bare_nan_values() {
        let body = r#"{"avg_startup_temp": nan, "energy_wh": 5000}"#;
        assert_eq!(
            sanitize_nan_tokens(body),
            r#"{"avg_startup_temp": null, "energy_wh": 5000}"#
        );
    }

    #[test]
    fn replaces_negative_and_mixed_case_nan() {
        let body = r#"{"a":-nan,"b":NaN}"#;
        assert_eq!(sanitize_nan_tokens(body), r#"{"a":null,"b":null}"#);
    }

    #[test]
    fn leaves_strings_and_words_alone() {
        let body = r#"{"nan_count": 1, "label": "banana nan", "x": nano}"#;
        assert_eq!(sanitize_nan_tokens(body), body);
    }

    #[test]
    fn keeps_escaped_quotes_inside_strings() {
        let body = r#"{"s": "say \"nan\"", "v": nan}"#;
        assert_eq!(
            sanitize_nan_tokens(body),
            r#"{"s": "say \"nan\"", "v": null}"#
        );
    }

    #[test]
    fn preserves_non_ascii_text() {
        let body = "{\"name\": \"Garage \u{00e9}\", \"t\": nan}";
        assert_eq!(
            sanitize_nan_tokens(body),
            "{\"name\": \"Garage \u{00e9}\", \"t\": null}"
        );
    }
}
