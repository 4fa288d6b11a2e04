//! Bearer token payload decoding.
//!
//! Only the middle (payload) segment of a `header.payload.signature` token is
//! read. The signature is never checked; the payload is trusted as far as
//! extracting the subject claim goes.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use thiserror::Error;

/// Why a token was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Token did not have exactly three dot-separated segments.
    #[error("expected 3 segments, found {0}")]
    Segments(usize),

    /// Payload segment is not valid base64.
    #[error("payload is not valid base64: {0}")]
    Base64(String),

    /// Payload bytes are not UTF-8.
    #[error("payload is not valid UTF-8")]
    Utf8,

    /// Payload is not a JSON object.
    #[error("payload is not a JSON object: {0}")]
    Json(String),

    /// Payload has no string `sub` claim.
    #[error("missing 'sub' field")]
    MissingSubject,

    /// Payload `sub` claim is empty.
    #[error("subject is empty")]
    EmptySubject,
}

#[derive(Deserialize)]
struct Claims {
    sub: Option<String>,
}

/// Decode the payload segment of `token` into JSON text.
pub fn decode_payload(token: &str) -> Result<String, TokenError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(TokenError::Segments(segments.len()));
    }

    // Tokens are usually base64url without padding; normalize to the
    // standard alphabet and pad to a multiple of four.
    let mut payload: String = segments[1]
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            c => c,
        })
        .collect();
    while payload.len() % 4 != 0 {
        payload.push('=');
    }

    let bytes = STANDARD
        .decode(payload.as_bytes())
        .map_err(|e| TokenError::Base64(e.to_string()))?;
    String::from_utf8(bytes).map_err(|_| TokenError::Utf8)
}

/// Extract the subject identifier (`sub` claim) from a bearer token.
///
/// An empty subject is reported as an error rather than returned.
pub fn decode_subject(token: &str) -> Result<String, TokenError> {
    let json = decode_payload(token)?;
    let claims: Claims = serde_json::from_str(&json).map_err(|e| TokenError::Json(e.to_string()))?;

    match claims.sub {
        None => Err(TokenError::MissingSubject),
        Some(sub) if sub.is_empty() => Err(TokenError::EmptySubject),
        Some(sub) => Ok(sub),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    /// Build an unsigned three-segment token around a JSON payload.
    pub(crate) fn make_token(payload: &str) -> String {
        format!(
            "{}.{}.{}",
            URL_SAFE_NO_PAD.encode(r#"{"typ":"JWT","alg":"EdDSA"}"#),
            URL_SAFE_NO_PAD.encode(payload),
            URL_SAFE_NO_PAD.encode(b"signature")
        )
    }

    #[test]
    fn test_decode_subject() {
        let token = make_token(r#"{"iss":"r:abc","sub":"76561198000000001","aud":["client"]}"#);
        assert_eq!(decode_subject(&token).unwrap(), "76561198000000001");
    }

    #[test]
    fn test_decode_subject_needs_padding() {
        // Payload lengths that are not a multiple of 3 produce unpadded segments.
        for sub in ["1", "12", "123", "1234"] {
            let token = make_token(&format!(r#"{{"sub":"{}"}}"#, sub));
            assert_eq!(decode_subject(&token).unwrap(), sub);
        }
    }

    #[test]
    fn test_decode_subject_url_safe_alphabet() {
        // '?>' and '~~' encode to characters outside the standard alphabet.
        let token = make_token(r#"{"sub":"765","note":"?>?>~~~"}"#);
        assert!(token.contains('_') || token.contains('-'));
        assert_eq!(decode_subject(&token).unwrap(), "765");
    }

    #[test]
    fn test_wrong_segment_count() {
        assert_eq!(decode_subject("abc.def"), Err(TokenError::Segments(2)));
        assert_eq!(decode_subject(""), Err(TokenError::Segments(1)));
        assert_eq!(decode_subject("a.b.c.d"), Err(TokenError::Segments(4)));
    }

    #[test]
    fn test_bad_payloads() {
        assert!(matches!(decode_subject("a.!!!!.c"), Err(TokenError::Base64(_))));

        let not_utf8 = format!("a.{}.c", URL_SAFE_NO_PAD.encode([0xff, 0xfe, 0xfd]));
        assert_eq!(decode_subject(&not_utf8), Err(TokenError::Utf8));

        let not_json = make_token("not json");
        assert!(matches!(decode_subject(&not_json), Err(TokenError::Json(_))));
    }

    #[test]
    fn test_missing_or_empty_subject() {
        assert_eq!(
            decode_subject(&make_token(r#"{"aud":"x"}"#)),
            Err(TokenError::MissingSubject)
        );
        assert_eq!(
            decode_subject(&make_token(r#"{"sub":""}"#)),
            Err(TokenError::EmptySubject)
        );
        // A non-string subject does not deserialize into the claim.
        assert!(matches!(
            decode_subject(&make_token(r#"{"sub":42}"#)),
            Err(TokenError::Json(_))
        ));
    }
}
