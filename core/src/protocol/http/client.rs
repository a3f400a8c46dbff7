/*
 * client.rs
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

//! HTTP client: the request pipeline shared by both protocol strategies.
//!
//! parse target → resolve options → query capabilities → validate → pick body kind
//! → dispatch (HTTP/1.1 or HTTP/2) → decode body → envelope.

use std::future::Future;

use tracing::{debug, info};

use crate::config::{resolve, UserOptions};
use crate::error::FetchError;
use crate::net::{Connector, RustlsConnector};
use crate::protocol::http::body::{decode, infer_kind};
use crate::protocol::http::h1::Http1Dispatcher;
use crate::protocol::http::h2::Http2Dispatcher;
use crate::protocol::http::request::ConnectionParameters;
use crate::protocol::http::response::{collect_headers, CollectedResponse, ResponseEnvelope};
use crate::protocol::http::HttpVersion;
use crate::uri::RequestTarget;
use crate::validate::validate;

/// A protocol strategy: open one connection, send one request, collect the whole response.
pub trait Dispatch: Send + Sync {
    fn version(&self) -> HttpVersion;

    fn exchange<C: Connector>(
        &self,
        connector: &C,
        target: &RequestTarget,
        params: &ConnectionParameters,
    ) -> impl Future<Output = Result<CollectedResponse, FetchError>> + Send;
}

/// Entry point. Holds the TLS capability; every request opens and closes its own connection.
#[derive(Debug, Clone, Default)]
pub struct HttpClient<C = RustlsConnector> {
    connector: C,
}

impl HttpClient<RustlsConnector> {
    /// Client over rustls with the platform trust store.
    pub fn new() -> Self {
        Self::with_connector(RustlsConnector::new())
    }
}

impl<C: Connector> HttpClient<C> {
    pub fn with_connector(connector: C) -> Self {
        Self { connector }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Perform one request with the protocol chosen by `version`.
    pub async fn request(
        &self,
        version: HttpVersion,
        target: &str,
        options: UserOptions,
    ) -> Result<ResponseEnvelope, FetchError> {
        match version {
            HttpVersion::Http1_1 => self.execute(&Http1Dispatcher, target, &options).await,
            HttpVersion::Http2 => self.execute(&Http2Dispatcher, target, &options).await,
        }
    }

    pub async fn request_over_http1(&self, target: &str, options: UserOptions) -> Result<ResponseEnvelope, FetchError> {
        self.request(HttpVersion::Http1_1, target, options).await
    }

    pub async fn request_over_http2(&self, target: &str, options: UserOptions) -> Result<ResponseEnvelope, FetchError> {
        self.request(HttpVersion::Http2, target, options).await
    }

    /// Run the pipeline with an explicit strategy. Nothing touches the network before
    /// validation has passed.
    pub async fn execute<D: Dispatch>(
        &self,
        dispatcher: &D,
        target: &str,
        options: &UserOptions,
    ) -> Result<ResponseEnvelope, FetchError> {
        let target = RequestTarget::parse(target)?;
        let options = resolve(options);
        let capabilities = self.connector.capabilities().await;
        validate(&target, &options, &capabilities)?;

        let kind = options
            .expected_body_kind
            .unwrap_or_else(|| infer_kind(target.path()));
        let params = ConnectionParameters::new(&options);
        debug!(target = %target, version = ?dispatcher.version(), ?kind, "dispatching request");

        let response = dispatcher.exchange(&self.connector, &target, &params).await?;
        info!(
            target = %target,
            status = response.status,
            bytes = response.body.len(),
            "response received"
        );
        let body = decode(&response.body, kind)?;
        Ok(ResponseEnvelope {
            status_code: response.status,
            headers: collect_headers(response.headers),
            body,
        })
    }
}

/// One request over HTTP/1.1 with the default rustls connector.
pub async fn request_over_http1(target: &str, options: UserOptions) -> Result<ResponseEnvelope, FetchError> {
    HttpClient::new().request_over_http1(target, options).await
}

/// One request over HTTP/2 with the default rustls connector. ALPN offers `h2` only.
pub async fn request_over_http2(target: &str, options: UserOptions) -> Result<ResponseEnvelope, FetchError> {
    HttpClient::new().request_over_http2(target, options).await
}
