/*
 * error.rs
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

//! Request errors. Every variant aborts the whole request; no partial response is ever returned.

use std::io;

use crate::protocol::http::request::Method;

/// Errors from parsing, validating, dispatching, or decoding a request.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The target is not a well-formed absolute URL.
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    /// The target scheme is not permitted (non-https while TLS is enforced, or not http/https at all).
    #[error("scheme '{scheme}' not allowed")]
    SchemeNotAllowed { scheme: String },

    /// Malformed header, TLS version bounds, empty suite/group list, or unreadable option document.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A requested cipher suite is not offered by the TLS capability.
    #[error("unsupported cipher suite: {0}")]
    UnsupportedCipher(String),

    /// A payload was supplied with a method that does not carry a body.
    #[error("payload not allowed for {0} requests")]
    PayloadNotAllowedForMethod(Method),

    /// Handshake, connection, framing, or stream failure.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    /// The body was expected to be JSON but did not parse.
    #[error("body decode error: {0}")]
    BodyDecode(#[source] serde_json::Error),
}

impl FetchError {
    /// True for errors raised before any connection was attempted.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            FetchError::InvalidTarget(_)
                | FetchError::SchemeNotAllowed { .. }
                | FetchError::InvalidConfig(_)
                | FetchError::UnsupportedCipher(_)
                | FetchError::PayloadNotAllowedForMethod(_)
        )
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, FetchError::Transport(_))
    }
}
