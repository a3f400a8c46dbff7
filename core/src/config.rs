/*
 * config.rs
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

//! Request options: secure defaults, caller overrides, and the field-level merge between them.
//!
//! Callers hand in a sparse `UserOptions` (built in code or loaded from JSON with
//! `UserOptions::from_json`); `resolve` lays it over `RequestOptions::default()`.
//! Every field that is `Some` wins, every field that is `None` keeps the default, and
//! the TLS block merges field by field rather than as a whole.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::Deserialize;

use crate::error::FetchError;
use crate::protocol::http::request::Method;

/// Identifying header sent with every request unless the caller overrides it.
pub const USER_AGENT: &str = concat!("securefetch/", env!("CARGO_PKG_VERSION"));

/// AEAD suites offered by default, in preference order.
pub const DEFAULT_CIPHER_SUITES: &[&str] = &["TLS_AES_256_GCM_SHA384", "TLS_CHACHA20_POLY1305_SHA256"];

/// Key-exchange groups offered by default: hybrid post-quantum first, classical fallback second.
pub const DEFAULT_KEY_EXCHANGE_GROUPS: &[&str] = &["X25519MLKEM768", "X25519"];

/// Protocol version bound. Ordered: `Tls12 < Tls13`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
pub enum TlsVersion {
    #[serde(rename = "TLSv1.2", alias = "TLS1_2", alias = "1.2")]
    Tls12,
    #[serde(rename = "TLSv1.3", alias = "TLS1_3", alias = "1.3")]
    Tls13,
}

impl TlsVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            TlsVersion::Tls12 => "TLSv1.2",
            TlsVersion::Tls13 => "TLSv1.3",
        }
    }
}

/// Negotiable security parameters for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPolicy {
    pub enforce_tls: bool,
    pub min_version: TlsVersion,
    pub max_version: TlsVersion,
    pub cipher_suites: Vec<String>,
    pub key_exchange_groups: Vec<String>,
}

impl Default for TlsPolicy {
    fn default() -> Self {
        Self {
            enforce_tls: true,
            min_version: TlsVersion::Tls13,
            max_version: TlsVersion::Tls13,
            cipher_suites: DEFAULT_CIPHER_SUITES.iter().map(|s| s.to_string()).collect(),
            key_exchange_groups: DEFAULT_KEY_EXCHANGE_GROUPS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl TlsPolicy {
    /// Apply overrides field by field; omitted fields are kept.
    pub fn merged(&self, overrides: &TlsOverrides) -> Self {
        Self {
            enforce_tls: overrides.enforce_tls.unwrap_or(self.enforce_tls),
            min_version: overrides.min_version.unwrap_or(self.min_version),
            max_version: overrides.max_version.unwrap_or(self.max_version),
            cipher_suites: overrides
                .cipher_suites
                .clone()
                .unwrap_or_else(|| self.cipher_suites.clone()),
            key_exchange_groups: overrides
                .key_exchange_groups
                .clone()
                .unwrap_or_else(|| self.key_exchange_groups.clone()),
        }
    }
}

/// Expected shape of the response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BodyKind {
    #[serde(alias = "json")]
    Structured,
    Text,
    #[serde(alias = "buffer", alias = "bytes")]
    RawBytes,
}

/// Request payload: text (sent as UTF-8) or raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Text(String),
    Bytes(Vec<u8>),
}

impl Payload {
    pub fn to_bytes(&self) -> Bytes {
        match self {
            Payload::Text(s) => Bytes::copy_from_slice(s.as_bytes()),
            Payload::Bytes(b) => Bytes::copy_from_slice(b),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Payload::Text(s) => s.len(),
            Payload::Bytes(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload::Text(s.to_string())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload::Text(s)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(b: Vec<u8>) -> Self {
        Payload::Bytes(b)
    }
}

impl From<&[u8]> for Payload {
    fn from(b: &[u8]) -> Self {
        Payload::Bytes(b.to_vec())
    }
}

/// Fully populated options for one request (output of `resolve`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOptions {
    pub tls: TlsPolicy,
    /// Keys are kept exactly as supplied.
    pub headers: BTreeMap<String, String>,
    pub method: Method,
    pub payload: Option<Payload>,
    pub expected_body_kind: Option<BodyKind>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("User-Agent".to_string(), USER_AGENT.to_string());
        Self {
            tls: TlsPolicy::default(),
            headers,
            method: Method::Get,
            payload: None,
            expected_body_kind: None,
        }
    }
}

/// Sparse TLS overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TlsOverrides {
    #[serde(rename = "enforceTLS", alias = "enforceTls")]
    pub enforce_tls: Option<bool>,
    pub min_version: Option<TlsVersion>,
    pub max_version: Option<TlsVersion>,
    pub cipher_suites: Option<Vec<String>>,
    pub key_exchange_groups: Option<Vec<String>>,
}

/// Sparse caller options. Every `None` keeps the default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UserOptions {
    pub tls: Option<TlsOverrides>,
    pub headers: Option<BTreeMap<String, String>>,
    pub method: Option<Method>,
    pub payload: Option<Payload>,
    pub expected_body_kind: Option<BodyKind>,
}

impl UserOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load options from a JSON document such as
    /// `{"method":"POST","payload":"hi","tls":{"minVersion":"TLSv1.2"}}`.
    pub fn from_json(json: &str) -> Result<Self, FetchError> {
        serde_json::from_str(json).map_err(|e| FetchError::InvalidConfig(format!("options: {}", e)))
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Add one header override (keeps earlier ones).
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn payload(mut self, payload: impl Into<Payload>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn expect(mut self, kind: BodyKind) -> Self {
        self.expected_body_kind = Some(kind);
        self
    }

    pub fn tls(mut self, overrides: TlsOverrides) -> Self {
        self.tls = Some(overrides);
        self
    }
}

/// Merge caller options over the secure defaults. Pure.
///
/// Headers are not merged shallowly: a caller header map does not replace the default
/// map as a whole. Each caller key that equals a default key (ignoring ASCII case)
/// replaces that one default, and defaults the caller did not name stay, so supplying
/// only `Accept` still sends the default `User-Agent`.
pub fn resolve(user: &UserOptions) -> RequestOptions {
    let defaults = RequestOptions::default();

    let tls = match &user.tls {
        Some(overrides) => defaults.tls.merged(overrides),
        None => defaults.tls,
    };

    let mut headers = defaults.headers;
    if let Some(overrides) = &user.headers {
        headers.retain(|name, _| !overrides.keys().any(|k| k.eq_ignore_ascii_case(name)));
        headers.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    RequestOptions {
        tls,
        headers,
        method: user.method.unwrap_or(defaults.method),
        payload: user.payload.clone().or(defaults.payload),
        expected_body_kind: user.expected_body_kind.or(defaults.expected_body_kind),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_options_resolve_to_defaults() {
        let options = resolve(&UserOptions::default());
        assert_eq!(options, RequestOptions::default());
        assert!(options.tls.enforce_tls);
        assert_eq!(options.tls.min_version, TlsVersion::Tls13);
        assert_eq!(options.tls.max_version, TlsVersion::Tls13);
        assert_eq!(options.tls.cipher_suites, DEFAULT_CIPHER_SUITES);
        assert_eq!(options.tls.key_exchange_groups, DEFAULT_KEY_EXCHANGE_GROUPS);
        assert_eq!(options.method, Method::Get);
        assert_eq!(options.headers.get("User-Agent").map(String::as_str), Some(USER_AGENT));
    }

    #[test]
    fn partial_tls_keeps_other_fields() {
        let user = UserOptions::new().tls(TlsOverrides {
            cipher_suites: Some(vec!["TLS_AES_128_GCM_SHA256".into()]),
            min_version: Some(TlsVersion::Tls12),
            ..Default::default()
        });
        let tls = resolve(&user).tls;
        assert_eq!(tls.cipher_suites, vec!["TLS_AES_128_GCM_SHA256".to_string()]);
        assert_eq!(tls.min_version, TlsVersion::Tls12);
        assert_eq!(tls.max_version, TlsVersion::Tls13);
        assert!(tls.enforce_tls);
        assert_eq!(tls.key_exchange_groups, DEFAULT_KEY_EXCHANGE_GROUPS);
    }

    #[test]
    fn header_overrides_merge_per_key() {
        let user = UserOptions::new()
            .header("Accept", "application/json")
            .header("user-agent", "custom/1.0");
        let headers = resolve(&user).headers;
        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("Accept").map(String::as_str), Some("application/json"));
        assert_eq!(headers.get("user-agent").map(String::as_str), Some("custom/1.0"));
        assert!(!headers.contains_key("User-Agent"));
    }

    #[test]
    fn header_map_keeps_unnamed_defaults() {
        let headers = resolve(&UserOptions::new().header("Accept", "text/plain")).headers;
        assert_eq!(headers.get("User-Agent").map(String::as_str), Some(USER_AGENT));
        assert_eq!(headers.get("Accept").map(String::as_str), Some("text/plain"));
    }

    #[test]
    fn scalar_fields_override() {
        let user = UserOptions::new()
            .method(Method::Post)
            .payload("hello")
            .expect(BodyKind::Text);
        let options = resolve(&user);
        assert_eq!(options.method, Method::Post);
        assert_eq!(options.payload, Some(Payload::Text("hello".into())));
        assert_eq!(options.expected_body_kind, Some(BodyKind::Text));
    }

    #[test]
    fn resolve_is_pure() {
        let user = UserOptions::new().method(Method::Put).header("X-A", "1");
        assert_eq!(resolve(&user), resolve(&user));
    }

    #[test]
    fn options_from_json() {
        let user = UserOptions::from_json(
            r#"{
                "tls": {"enforceTLS": false, "minVersion": "TLSv1.2", "keyExchangeGroups": ["X25519"]},
                "headers": {"Accept": "text/plain"},
                "method": "PATCH",
                "payload": "abc",
                "expectedBodyKind": "json"
            }"#,
        )
        .unwrap();
        let options = resolve(&user);
        assert!(!options.tls.enforce_tls);
        assert_eq!(options.tls.min_version, TlsVersion::Tls12);
        assert_eq!(options.tls.cipher_suites, DEFAULT_CIPHER_SUITES);
        assert_eq!(options.tls.key_exchange_groups, vec!["X25519".to_string()]);
        assert_eq!(options.method, Method::Patch);
        assert_eq!(options.payload, Some(Payload::Text("abc".into())));
        assert_eq!(options.expected_body_kind, Some(BodyKind::Structured));
    }

    #[test]
    fn byte_payload_from_json() {
        let user = UserOptions::from_json(r#"{"payload":[104,105],"expectedBodyKind":"rawBytes"}"#).unwrap();
        assert_eq!(user.payload, Some(Payload::Bytes(b"hi".to_vec())));
        assert_eq!(user.expected_body_kind, Some(BodyKind::RawBytes));
    }

    #[test]
    fn bad_json_is_invalid_config() {
        for doc in [
            r#"{"tls":{"minVersion":"TLSv1.0"}}"#,
            r#"{"method":"TRACE"}"#,
            r#"{"bogus":1}"#,
            "not json",
        ] {
            assert!(
                matches!(UserOptions::from_json(doc), Err(FetchError::InvalidConfig(_))),
                "{}",
                doc
            );
        }
    }

    #[test]
    fn version_ordering() {
        assert!(TlsVersion::Tls12 < TlsVersion::Tls13);
        assert_eq!(TlsVersion::Tls13.as_str(), "TLSv1.3");
    }
}
