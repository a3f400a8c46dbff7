/*
 * body.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Securefetch, a hardened HTTPS client.
 *
 * Securefetch is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Securefetch is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Securefetch.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Body decoding. The expected kind comes from the caller, else from the path extension.

use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;

use crate::error::FetchError;

pub use crate::config::BodyKind;

/// Decoded response body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Body {
    Structured(Value),
    Text(String),
    RawBytes(Bytes),
}

impl Body {
    pub fn kind(&self) -> BodyKind {
        match self {
            Body::Structured(_) => BodyKind::Structured,
            Body::Text(_) => BodyKind::Text,
            Body::RawBytes(_) => BodyKind::RawBytes,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Body::Structured(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Body::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Body::RawBytes(b) => Some(b),
            _ => None,
        }
    }
}

/// Kind implied by the path's final extension (case-insensitive). Only the last
/// segment is examined, so `/v1.2/data` has no extension.
pub fn infer_kind(path: &str) -> BodyKind {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let segment = path.rsplit('/').next().unwrap_or_default();
    match segment.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            if ext.eq_ignore_ascii_case("json") {
                BodyKind::Structured
            } else if ext.eq_ignore_ascii_case("txt") {
                BodyKind::Text
            } else {
                BodyKind::RawBytes
            }
        }
        _ => BodyKind::RawBytes,
    }
}

/// Decode `bytes` as `kind`. Invalid UTF-8 is replaced, never rejected; only a JSON
/// parse failure is an error.
pub fn decode(bytes: &Bytes, kind: BodyKind) -> Result<Body, FetchError> {
    match kind {
        BodyKind::RawBytes => Ok(Body::RawBytes(bytes.clone())),
        BodyKind::Text => Ok(Body::Text(String::from_utf8_lossy(bytes).into_owned())),
        BodyKind::Structured => {
            let text = String::from_utf8_lossy(bytes);
            serde_json::from_str(&text)
                .map(Body::Structured)
                .map_err(FetchError::BodyDecode)
        }
    }
}

/// Decode using the explicit kind if given, else the kind inferred from `path`.
pub fn decode_body(bytes: &Bytes, expected: Option<BodyKind>, path: &str) -> Result<Body, FetchError> {
    decode(bytes, expected.unwrap_or_else(|| infer_kind(path)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn inference_by_extension() {
        assert_eq!(infer_kind("/data.json"), BodyKind::Structured);
        assert_eq!(infer_kind("/a/b/DATA.JSON"), BodyKind::Structured);
        assert_eq!(infer_kind("/notes.txt"), BodyKind::Text);
        assert_eq!(infer_kind("/notes.TxT"), BodyKind::Text);
        assert_eq!(infer_kind("/image.png"), BodyKind::RawBytes);
        assert_eq!(infer_kind("/"), BodyKind::RawBytes);
        assert_eq!(infer_kind("/v1.json/items"), BodyKind::RawBytes);
        assert_eq!(infer_kind("/.json"), BodyKind::RawBytes);
        assert_eq!(infer_kind("/x.json?pretty=1"), BodyKind::Structured);
    }

    #[test]
    fn structured_decoding() {
        let body = decode(&Bytes::from_static(br#"{"a":[1,2]}"#), BodyKind::Structured).unwrap();
        assert_eq!(body, Body::Structured(json!({"a": [1, 2]})));
        assert_eq!(body.kind(), BodyKind::Structured);
    }

    #[test]
    fn malformed_json_is_a_decode_error() {
        let err = decode(&Bytes::from_static(b"{not json"), BodyKind::Structured).unwrap_err();
        assert!(matches!(err, FetchError::BodyDecode(_)));
        let empty = decode(&Bytes::new(), BodyKind::Structured).unwrap_err();
        assert!(matches!(empty, FetchError::BodyDecode(_)));
    }

    #[test]
    fn text_replaces_invalid_utf8() {
        let body = decode(&Bytes::from_static(b"ok \xff!"), BodyKind::Text).unwrap();
        assert_eq!(body.as_text(), Some("ok \u{fffd}!"));
    }

    #[test]
    fn raw_bytes_are_untouched() {
        let raw = Bytes::from_static(&[0, 159, 146, 150]);
        assert_eq!(decode(&raw, BodyKind::RawBytes).unwrap().as_bytes(), Some(&raw));
    }

    #[test]
    fn decoding_is_deterministic() {
        let bytes = Bytes::from_static(b"[true, null, \"x\"]");
        for kind in [BodyKind::Structured, BodyKind::Text, BodyKind::RawBytes] {
            assert_eq!(decode(&bytes, kind).unwrap(), decode(&bytes, kind).unwrap());
        }
    }

    #[test]
    fn explicit_kind_overrides_extension() {
        let bytes = Bytes::from_static(b"{}");
        let body = decode_body(&bytes, Some(BodyKind::Text), "/x.json").unwrap();
        assert_eq!(body.as_text(), Some("{}"));
        let inferred = decode_body(&bytes, None, "/x.json").unwrap();
        assert_eq!(inferred.as_json(), Some(&json!({})));
    }
}
