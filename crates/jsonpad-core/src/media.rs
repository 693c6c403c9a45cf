//! Content-type and character-encoding negotiation.
//!
//! Three candidate media types are considered in strict precedence: the one
//! named by the result, the one already present on the response, and the
//! configured default. The winner is emitted verbatim; only its `charset`
//! parameter is interpreted.

use std::fmt;

use encoding_rs::{Encoding, UTF_8};

/// Labels that name ISO-8859-1 proper.
///
/// The WHATWG registry folds these into windows-1252, which would put
/// C1 controls and `€` on the wire as something other than Latin-1.
const LATIN1_LABELS: &[&str] = &[
    "iso-8859-1",
    "iso8859-1",
    "iso88591",
    "iso_8859-1",
    "iso_8859-1:1987",
    "iso-ir-100",
    "latin1",
    "l1",
    "cp819",
    "ibm819",
    "csisolatin1",
];

/// The character set a response body is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    /// One byte per code point up to U+00FF.
    Latin1,
    Encoding(&'static Encoding),
}

impl Charset {
    /// Look up a `charset` parameter value.
    pub fn for_label(label: &str) -> Option<Self> {
        let label = label.trim();
        if LATIN1_LABELS.iter().any(|l| l.eq_ignore_ascii_case(label)) {
            return Some(Charset::Latin1);
        }
        Encoding::for_label(label.as_bytes()).map(Charset::Encoding)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Charset::Latin1 => "ISO-8859-1",
            Charset::Encoding(encoding) => encoding.name(),
        }
    }
}

impl From<&'static Encoding> for Charset {
    fn from(encoding: &'static Encoding) -> Self {
        Charset::Encoding(encoding)
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The media type written to the `Content-Type` header and the charset the
/// body is written in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedContentType {
    pub content_type: String,
    pub charset: Charset,
}

/// Pick the response content type and body charset.
///
/// Empty or whitespace-only candidates count as absent. The charset comes
/// from the winning media type's `charset` parameter, then from the
/// default's, then UTF-8. Malformed media types and unknown charset labels
/// never fail; they just contribute no charset.
pub fn resolve_content_type(
    explicit: Option<&str>,
    ambient: Option<&str>,
    default: &str,
) -> ResolvedContentType {
    let default_charset = charset_of(default).unwrap_or(Charset::Encoding(UTF_8));

    let winner = explicit
        .filter(|ct| !ct.trim().is_empty())
        .or_else(|| ambient.filter(|ct| !ct.trim().is_empty()));

    match winner {
        Some(content_type) => ResolvedContentType {
            content_type: content_type.to_string(),
            charset: charset_of(content_type).unwrap_or(default_charset),
        },
        None => ResolvedContentType {
            content_type: default.to_string(),
            charset: default_charset,
        },
    }
}

/// Look up the charset named by a media type's `charset` parameter.
pub fn charset_of(media_type: &str) -> Option<Charset> {
    let mime = media_type.parse::<mime::Mime>().ok()?;
    let label = mime.get_param(mime::CHARSET)?;
    Charset::for_label(label.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::DEFAULT_CONTENT_TYPE;
    use encoding_rs::{SHIFT_JIS, UTF_16LE, WINDOWS_1252};

    #[test]
    fn explicit_wins() {
        let resolved = resolve_content_type(
            Some("text/plain; charset=iso-8859-1"),
            Some("application/json; charset=utf-16le"),
            DEFAULT_CONTENT_TYPE,
        );
        assert_eq!(resolved.content_type, "text/plain; charset=iso-8859-1");
        assert_eq!(resolved.charset, Charset::Latin1);
    }

    #[test]
    fn ambient_used_without_explicit() {
        let resolved = resolve_content_type(
            None,
            Some("application/javascript; charset=utf-16le"),
            DEFAULT_CONTENT_TYPE,
        );
        assert_eq!(
            resolved.content_type,
            "application/javascript; charset=utf-16le"
        );
        assert_eq!(resolved.charset, Charset::Encoding(UTF_16LE));
    }

    #[test]
    fn default_used_when_nothing_set() {
        let resolved = resolve_content_type(None, None, DEFAULT_CONTENT_TYPE);
        assert_eq!(
            resolved.content_type,
            "application/x-javascript; charset=utf-8"
        );
        assert_eq!(resolved.charset, Charset::Encoding(UTF_8));
    }

    #[test]
    fn empty_candidates_are_skipped() {
        let resolved = resolve_content_type(Some(""), Some("  "), DEFAULT_CONTENT_TYPE);
        assert_eq!(resolved.content_type, DEFAULT_CONTENT_TYPE);
    }

    #[test]
    fn missing_charset_falls_back_to_default_charset() {
        let resolved = resolve_content_type(
            Some("text/javascript"),
            None,
            "application/x-javascript; charset=shift_jis",
        );
        assert_eq!(resolved.content_type, "text/javascript");
        assert_eq!(resolved.charset, Charset::Encoding(SHIFT_JIS));
    }

    #[test]
    fn malformed_media_type_passes_through() {
        let resolved =
            resolve_content_type(Some("not a media type;;"), None, DEFAULT_CONTENT_TYPE);
        assert_eq!(resolved.content_type, "not a media type;;");
        assert_eq!(resolved.charset, Charset::Encoding(UTF_8));
    }

    #[test]
    fn unknown_charset_is_utf8() {
        let resolved = resolve_content_type(
            Some("text/plain; charset=klingon"),
            None,
            DEFAULT_CONTENT_TYPE,
        );
        assert_eq!(resolved.charset, Charset::Encoding(UTF_8));
    }

    #[test]
    fn latin1_labels_are_not_windows_1252() {
        for label in ["ISO-8859-1", "latin1", "l1", "iso_8859-1:1987"] {
            assert_eq!(Charset::for_label(label), Some(Charset::Latin1), "{label}");
        }
        assert_eq!(
            Charset::for_label("windows-1252"),
            Some(Charset::Encoding(WINDOWS_1252))
        );
        assert_eq!(
            Charset::for_label("us-ascii"),
            Some(Charset::Encoding(WINDOWS_1252))
        );
        assert_eq!(Charset::Latin1.to_string(), "ISO-8859-1");
    }

    #[test]
    fn resolution_is_deterministic() {
        let inputs = (
            Some("text/plain; charset=utf-8"),
            Some("text/html"),
            DEFAULT_CONTENT_TYPE,
        );
        let first = resolve_content_type(inputs.0, inputs.1, inputs.2);
        let second = resolve_content_type(inputs.0, inputs.1, inputs.2);
        assert_eq!(first, second);
    }
}
