/*
 * uri.rs
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

//! Request target: absolute URL (scheme://host[:port]/path?query) parsed once per request.
//! The fragment is dropped; userinfo is refused. Path and query bytes outside the URL-safe
//! set are percent-encoded; existing escapes are left alone.

use std::fmt;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::error::FetchError;

/// Path characters that must be escaped before they go on the wire.
const PATH: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Query characters that must be escaped (sub-delims such as & and = pass through).
const QUERY: &AsciiSet = &CONTROLS.add(b' ').add(b'"').add(b'<').add(b'>');

/// Parsed absolute URL. Immutable for the lifetime of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTarget {
    scheme: String,
    /// Host without IPv6 brackets, lowercased.
    host: String,
    port: Option<u16>,
    path: String,
    query: Option<String>,
}

fn invalid(input: &str, why: &str) -> FetchError {
    FetchError::InvalidTarget(format!("{}: {}", input, why))
}

impl RequestTarget {
    /// Parse an absolute URL. Anything that is not `scheme://authority[path][?query][#fragment]` is rejected.
    pub fn parse(input: &str) -> Result<Self, FetchError> {
        let trimmed = input.trim();
        let (scheme, rest) = trimmed
            .split_once("://")
            .ok_or_else(|| invalid(input, "not an absolute URL"))?;
        let mut chars = scheme.chars();
        let scheme_ok = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
            && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if !scheme_ok {
            return Err(invalid(input, "malformed scheme"));
        }

        let rest = rest.split('#').next().unwrap_or_default();
        let authority_end = rest.find(['/', '?']).unwrap_or(rest.len());
        let (authority, tail) = rest.split_at(authority_end);
        if authority.contains('@') {
            return Err(invalid(input, "credentials in URL are not supported"));
        }
        let (host, port) = parse_authority(input, authority)?;

        let (path, query) = match tail.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (tail, None),
        };
        let path = if path.is_empty() {
            "/".to_string()
        } else {
            utf8_percent_encode(path, PATH).to_string()
        };
        let query = query.map(|q| utf8_percent_encode(q, QUERY).to_string());

        Ok(Self {
            scheme: scheme.to_ascii_lowercase(),
            host,
            port,
            path,
            query,
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn is_https(&self) -> bool {
        self.scheme == "https"
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port given explicitly in the URL, if any.
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Port to connect to: the explicit port, else 443 for https and 80 for anything else.
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or(if self.is_https() {
            443
        } else {
            80
        })
    }

    /// Path without the query; always starts with '/'.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Request-target form used on the request line and in `:path`.
    pub fn path_and_query(&self) -> String {
        match &self.query {
            Some(q) => format!("{}?{}", self.path, q),
            None => self.path.clone(),
        }
    }

    /// Value for `Host` / `:authority`: host (bracketed if IPv6) plus the port when it is not the scheme default.
    pub fn authority(&self) -> String {
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        match self.port {
            Some(p) if p != self.default_port() => format!("{}:{}", host, p),
            _ => host,
        }
    }

    fn default_port(&self) -> u16 {
        if self.is_https() {
            443
        } else {
            80
        }
    }
}

impl fmt::Display for RequestTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", self.scheme, self.authority(), self.path_and_query())
    }
}

fn parse_authority(input: &str, authority: &str) -> Result<(String, Option<u16>), FetchError> {
    let (host, port) = if let Some(bracketed) = authority.strip_prefix('[') {
        let (host, after) = bracketed
            .split_once(']')
            .ok_or_else(|| invalid(input, "unterminated IPv6 literal"))?;
        let port = match after {
            "" => None,
            p => Some(
                p.strip_prefix(':')
                    .ok_or_else(|| invalid(input, "junk after IPv6 literal"))?,
            ),
        };
        (host, port)
    } else {
        match authority.split_once(':') {
            Some((h, p)) => (h, Some(p)),
            None => (authority, None),
        }
    };

    if host.is_empty() {
        return Err(invalid(input, "missing host"));
    }
    if host.chars().any(|c| c.is_ascii_control() || c.is_whitespace() || matches!(c, '[' | ']' | '\\')) {
        return Err(invalid(input, "illegal character in host"));
    }

    let port = match port {
        None | Some("") => None,
        Some(p) => match p.parse::<u16>() {
            Ok(0) | Err(_) => return Err(invalid(input, "port out of range")),
            Ok(n) => Some(n),
        },
    };
    Ok((host.to_ascii_lowercase(), port))
}
