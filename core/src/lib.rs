/*
 * lib.rs
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

//! Securefetch core: one-shot HTTPS requests over HTTP/1.1 or HTTP/2 with a strict TLS policy.
//!
//! Pipeline for every request:
//! target parse (`uri`) → option merge (`config`) → capability query + validation (`validate`)
//! → protocol dispatch (`protocol::http::h1` / `protocol::http::h2`) → byte aggregation
//! → typed body decoding (`protocol::http::body`).
//!
//! ```rust,ignore
//! use securefetch_core::{request_over_http2, Body, UserOptions};
//!
//! let response = request_over_http2("https://example.com/data.json", UserOptions::default()).await?;
//! if let Body::Structured(value) = &response.body {
//!     println!("{}", value["name"]);
//! }
//! ```

pub mod config;
pub mod error;
pub mod net;
pub mod protocol;
pub mod uri;
pub mod validate;

pub use config::{resolve, BodyKind, Payload, RequestOptions, TlsOverrides, TlsPolicy, TlsVersion, UserOptions};
pub use error::FetchError;
pub use net::{Capabilities, Connected, Connector, Endpoint, RustlsConnector, TlsParams};
pub use protocol::http::body::{decode, decode_body, infer_kind, Body};
pub use protocol::http::client::{request_over_http1, request_over_http2, HttpClient};
pub use protocol::http::request::Method;
pub use protocol::http::response::{HeaderValue, ResponseEnvelope};
pub use protocol::http::HttpVersion;
pub use uri::RequestTarget;
