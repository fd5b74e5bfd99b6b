//! Log sanitization for clinical values and identifiers.
//!
//! Formatted log lines pass through [`SanitizingMakeWriter`] before reaching
//! stdout or the log file. It redacts:
//! - `field=value` / `field: value` pairs for the clinical input fields
//! - e-mail addresses
//! - MRN and SSN-like identifiers
//!
//! Lines longer than `HFRISK_SANITIZE_MAX_BYTES` (default 16 KiB) are
//! truncated before scanning.

use std::sync::OnceLock;

use regex::Regex;
use tracing_subscriber::fmt::MakeWriter;

use crate::domain::FIELD_NAMES;

const DEFAULT_SANITIZE_MAX_BYTES: usize = 16 * 1024;

struct Rule {
    regex: Regex,
    replacement: &'static str,
}

static RULES: OnceLock<Vec<Rule>> = OnceLock::new();

fn rules() -> &'static [Rule] {
    RULES.get_or_init(|| {
        let fields = FIELD_NAMES.join("|");
        let clinical = format!(r#"\b(?P<field>{fields})(?P<sep>"?\s*[:=]\s*)-?[0-9][0-9.eE+-]*"#);

        [
            (clinical.as_str(), "${field}${sep}[REDACTED]"),
            (
                r"(?i)\b[a-z0-9][a-z0-9._%+-]{0,62}@(?:[a-z0-9-]{1,63}\.)+[a-z]{2,}\b",
                "[REDACTED-EMAIL]",
            ),
            (r"\bMRN[:\s]?\d{6,10}\b", "[REDACTED-MRN]"),
            (r"\b\d{3}-\d{2}-\d{4}\b", "[REDACTED-SSN]"),
        ]
        .into_iter()
        .map(|(pattern, replacement)| Rule {
            regex: Regex::new(pattern).expect("Valid regex"),
            replacement,
        })
        .collect()
    })
}

fn max_sanitize_bytes() -> usize {
    std::env::var("HFRISK_SANITIZE_MAX_BYTES")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|&v| v > 0)
        .unwrap_or(DEFAULT_SANITIZE_MAX_BYTES)
}

fn truncate_to_char_boundary(input: &str, max_bytes: usize) -> (&str, bool) {
    if input.len() <= max_bytes {
        return (input, false);
    }
    let mut end = max_bytes;
    while end > 0 && !input.is_char_boundary(end) {
        end -= 1;
    }
    (&input[..end], true)
}

/// Redact clinical values and identifiers from `input`.
#[must_use]
pub fn sanitize(input: &str) -> String {
    sanitize_with_limit(input, max_sanitize_bytes())
}

fn sanitize_with_limit(input: &str, max_bytes: usize) -> String {
    let (prefix, truncated) = truncate_to_char_boundary(input, max_bytes);

    let mut out = prefix.to_string();
    for rule in rules() {
        if rule.regex.is_match(&out) {
            out = rule.regex.replace_all(&out, rule.replacement).into_owned();
        }
    }

    if truncated {
        out.push_str(" [TRUNCATED]");
        if input.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}

/// A `tracing_subscriber` writer that sanitizes each formatted line before
/// it reaches the inner sink.
#[derive(Debug, Clone)]
pub struct SanitizingMakeWriter<M> {
    inner: M,
}

impl<M> SanitizingMakeWriter<M> {
    #[must_use]
    pub fn new(inner: M) -> Self {
        Self { inner }
    }
}

pub struct SanitizingWriter<W: std::io::Write> {
    inner: W,
    buffer: Vec<u8>,
    max_bytes: usize,
}

impl<W: std::io::Write> SanitizingWriter<W> {
    fn new(inner: W, max_bytes: usize) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
            max_bytes,
        }
    }

    fn write_lines(&mut self) -> std::io::Result<()> {
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line);
            let sanitized = sanitize_with_limit(&text, self.max_bytes);
            self.inner.write_all(sanitized.as_bytes())?;
        }
        Ok(())
    }
}

impl<W: std::io::Write> std::io::Write for SanitizingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        self.write_lines()?;

        // An unterminated line must not grow the buffer without bound.
        let hard_cap = self.max_bytes.saturating_mul(2);
        if self.buffer.len() > hard_cap {
            let pending = String::from_utf8_lossy(&self.buffer).into_owned();
            let sanitized = sanitize_with_limit(&pending, self.max_bytes);
            self.inner.write_all(sanitized.as_bytes())?;
            self.inner.write_all(b"\n")?;
            self.buffer.clear();
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.write_lines()?;
        if !self.buffer.is_empty() {
            let pending = String::from_utf8_lossy(&self.buffer).into_owned();
            let sanitized = sanitize_with_limit(&pending, self.max_bytes);
            self.inner.write_all(sanitized.as_bytes())?;
            self.buffer.clear();
        }
        self.inner.flush()
    }
}

impl<W: std::io::Write> Drop for SanitizingWriter<W> {
    fn drop(&mut self) {
        let _ = std::io::Write::flush(self);
    }
}

impl<'a, M> MakeWriter<'a> for SanitizingMakeWriter<M>
where
    M: MakeWriter<'a>,
{
    type Writer = SanitizingWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        SanitizingWriter::new(self.inner.make_writer(), max_sanitize_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_redacts_clinical_pairs() {
        let out = sanitize("request age=60 serum_creatinine: 1.1 ejection_fraction=35 ok");
        assert_eq!(
            out,
            "request age=[REDACTED] serum_creatinine: [REDACTED] ejection_fraction=[REDACTED] ok"
        );
    }

    #[test]
    fn test_redacts_json_style_pairs() {
        let out = sanitize(r#"{"platelets": 250000, "sex": 1}"#);
        assert_eq!(out, r#"{"platelets": [REDACTED], "sex": [REDACTED]}"#);
    }

    #[test]
    fn test_keeps_validation_messages_readable() {
        let out = sanitize("Failed at validated: sex: must be exactly 0 or 1, got 2");
        assert!(out.contains("sex: must be exactly 0 or 1"));
    }

    #[test]
    fn test_redacts_identifiers() {
        let out = sanitize("patient jane@hospital.org MRN:12345678 SSN 123-45-6789");
        assert!(out.contains("[REDACTED-EMAIL]"));
        assert!(out.contains("[REDACTED-MRN]"));
        assert!(out.contains("[REDACTED-SSN]"));
        assert!(!out.contains("12345678"));
    }

    #[test]
    fn test_truncates_long_input() {
        let out = sanitize_with_limit("aaaaaaaaaaaaaaaaaaaa", 8);
        assert_eq!(out, "aaaaaaaa [TRUNCATED]");
    }

    #[test]
    fn test_writer_sanitizes_per_line() {
        let mut sink = Vec::new();
        {
            let mut writer = SanitizingWriter::new(&mut sink, DEFAULT_SANITIZE_MAX_BYTES);
            writer.write_all(b"scored age=").expect("write");
            writer.write_all(b"72\nplain line\n").expect("write");
            writer.flush().expect("flush");
        }
        assert_eq!(
            String::from_utf8(sink).expect("utf8"),
            "scored age=[REDACTED]\nplain line\n"
        );
    }

    #[test]
    fn test_writer_caps_unterminated_line() {
        let mut sink = Vec::new();
        {
            let mut writer = SanitizingWriter::new(&mut sink, 16);
            writer.write_all(&[b'a'; 20]).expect("write");
            assert_eq!(writer.buffer.len(), 20);
            writer.write_all(&[b'a'; 20]).expect("write");
            assert!(writer.buffer.is_empty());
        }
        assert_eq!(
            String::from_utf8(sink).expect("utf8"),
            format!("{} [TRUNCATED]\n", "a".repeat(16))
        );
    }
}
