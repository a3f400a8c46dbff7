/*
 * mod.rs
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

//! HTTP client: one request per connection over HTTP/1.1 or HTTP/2, fully buffered responses.
//!
//! Design:
//! - Push-parsed responses: the wire parsers drive a `ResponseHandler` (`status`, `header`,
//!   `start_body`, `body_chunk`, `end_body`, `complete`, `failed`). `ResponseCollector` is the
//!   handler every request uses; it feeds body chunks into a `ByteAggregator`.
//! - Buffers: `bytes` crate (BytesMut for parse buffers, Bytes for payload slices).
//! - HTTP/1.1: state-machine response parser. HTTP/2: our own frame parser + HPACK (no external h2 crate).
//! - Both protocols sit behind `Dispatch`; the caller picks one per request with `HttpVersion`.

mod handler;

pub mod aggregate;
pub mod body;
pub mod client;
pub mod h1;
pub mod h2;
pub mod hpack;
pub mod request;
pub mod response;

pub use aggregate::{ByteAggregator, ResponseCollector};
pub use body::{Body, BodyKind};
pub use client::{Dispatch, HttpClient};
pub use h1::Http1Dispatcher;
pub use h2::Http2Dispatcher;
pub use handler::ResponseHandler;
pub use request::{ConnectionParameters, Method};
pub use response::{CollectedResponse, HeaderValue, ResponseEnvelope};

/// Protocol used for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVersion {
    Http1_1,
    Http2,
}

impl HttpVersion {
    /// ALPN ids advertised for this protocol. HTTP/2 offers `h2` only so a server cannot downgrade.
    pub fn alpn(&self) -> &'static [&'static [u8]] {
        match self {
            HttpVersion::Http1_1 => &[b"http/1.1"],
            HttpVersion::Http2 => &[b"h2"],
        }
    }
}
