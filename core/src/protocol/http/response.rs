/*
 * response.rs
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

//! Response types: the raw exchange result and the decoded envelope returned to callers.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::Serialize;

use crate::protocol::http::body::Body;

/// Header value: a single string, or every value in arrival order when the name repeated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum HeaderValue {
    Single(String),
    Multiple(Vec<String>),
}

impl HeaderValue {
    /// First (or only) value.
    pub fn first(&self) -> &str {
        match self {
            HeaderValue::Single(v) => v,
            HeaderValue::Multiple(vs) => vs.first().map(String::as_str).unwrap_or(""),
        }
    }

    pub fn values(&self) -> Vec<&str> {
        match self {
            HeaderValue::Single(v) => vec![v.as_str()],
            HeaderValue::Multiple(vs) => vs.iter().map(String::as_str).collect(),
        }
    }

    fn push(&mut self, value: String) {
        match self {
            HeaderValue::Single(first) => {
                *self = HeaderValue::Multiple(vec![std::mem::take(first), value]);
            }
            HeaderValue::Multiple(vs) => vs.push(value),
        }
    }
}

/// What a dispatcher hands back: status, headers in wire order, and the aggregated body.
#[derive(Debug, Clone)]
pub struct CollectedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

/// Final result of a request. Built once, after the whole body has been received and decoded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    /// 0 only when the transport reported no status.
    pub status_code: u16,
    /// Names lowercased.
    pub headers: BTreeMap<String, HeaderValue>,
    pub body: Body,
}

impl ResponseEnvelope {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&HeaderValue> {
        self.headers.get(&name.to_ascii_lowercase())
    }
}

/// Fold wire headers into a map keyed by lowercase name. `set-cookie` is always a list.
pub fn collect_headers(headers: Vec<(String, String)>) -> BTreeMap<String, HeaderValue> {
    let mut map: BTreeMap<String, HeaderValue> = BTreeMap::new();
    for (name, value) in headers {
        let name = name.to_ascii_lowercase();
        match map.get_mut(&name) {
            Some(existing) => existing.push(value),
            None => {
                let entry = if name == "set-cookie" {
                    HeaderValue::Multiple(vec![value])
                } else {
                    HeaderValue::Single(value)
                };
                map.insert(name, entry);
            }
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(list: &[(&str, &str)]) -> Vec<(String, String)> {
        list.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn repeated_names_become_lists() {
        let map = collect_headers(pairs(&[
            ("Content-Type", "text/plain"),
            ("Vary", "accept"),
            ("vary", "origin"),
        ]));
        assert_eq!(map["content-type"], HeaderValue::Single("text/plain".into()));
        assert_eq!(map["vary"], HeaderValue::Multiple(vec!["accept".into(), "origin".into()]));
        assert_eq!(map["vary"].first(), "accept");
    }

    #[test]
    fn set_cookie_is_always_a_list() {
        let map = collect_headers(pairs(&[("Set-Cookie", "a=1")]));
        assert_eq!(map["set-cookie"].values(), vec!["a=1"]);
        assert!(matches!(map["set-cookie"], HeaderValue::Multiple(_)));
    }

    #[test]
    fn envelope_lookup_ignores_case() {
        let envelope = ResponseEnvelope {
            status_code: 200,
            headers: collect_headers(pairs(&[("ETag", "\"x\"")])),
            body: Body::Text(String::new()),
        };
        assert_eq!(envelope.header("etag").map(HeaderValue::first), Some("\"x\""));
        assert_eq!(envelope.header("ETAG").map(HeaderValue::first), Some("\"x\""));
    }
}
