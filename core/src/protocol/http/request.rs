/*
 * request.rs
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

//! HTTP request: method plus the validated parameters both dispatchers consume.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::Deserialize;

use crate::config::{RequestOptions, TlsPolicy};
use crate::net::{Endpoint, TlsParams};
use crate::uri::RequestTarget;

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }

    /// Whether a request payload may accompany this method. DELETE and HEAD never carry one.
    pub fn allows_payload(&self) -> bool {
        !matches!(self, Method::Delete | Method::Head)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "PATCH" => Ok(Method::Patch),
            "HEAD" => Ok(Method::Head),
            "OPTIONS" => Ok(Method::Options),
            other => Err(format!("unknown method {}", other)),
        }
    }
}

/// Everything a dispatcher needs once options are resolved and validated:
/// the TLS policy, the headers to send, and method + payload.
#[derive(Debug, Clone)]
pub struct ConnectionParameters {
    pub tls: TlsPolicy,
    pub headers: BTreeMap<String, String>,
    pub method: Method,
    pub payload: Option<Bytes>,
}

impl ConnectionParameters {
    pub fn new(options: &RequestOptions) -> Self {
        Self {
            tls: options.tls.clone(),
            headers: options.headers.clone(),
            method: options.method,
            payload: options.payload.as_ref().map(|p| p.to_bytes()),
        }
    }

    /// Where to connect and how to negotiate. Plain TCP only for `http` targets with enforcement off.
    pub fn endpoint(&self, target: &RequestTarget, alpn: &[&[u8]]) -> Endpoint {
        let tls = if target.is_https() || self.tls.enforce_tls {
            Some(TlsParams::from_policy(&self.tls, alpn))
        } else {
            None
        };
        Endpoint {
            host: target.host().to_string(),
            port: target.effective_port(),
            tls,
        }
    }

    /// Case-insensitive lookup of a caller-supplied header.
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.keys().any(|k| k.eq_ignore_ascii_case(name))
    }
}
