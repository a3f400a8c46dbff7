/*
 * dispatcher.rs
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

//! HTTP/2 dispatch: one connection, one request stream, then GOAWAY and shutdown.

use bytes::{Bytes, BytesMut};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

use super::frame::ERROR_NO_ERROR;
use super::parser::H2Parser;
use super::session::{Session, STREAM_ID};
use crate::error::FetchError;
use crate::net::{Connected, Connector};
use crate::protocol::http::client::Dispatch;
use crate::protocol::http::hpack::encode_headers;
use crate::protocol::http::request::ConnectionParameters;
use crate::protocol::http::response::CollectedResponse;
use crate::protocol::http::HttpVersion;
use crate::uri::RequestTarget;

/// Connection-specific fields that must not appear in an HTTP/2 request.
const CONNECTION_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "upgrade",
    "host",
];

/// HTTP/2 strategy. Over TLS the server must select `h2` by ALPN; over plain TCP the
/// connection starts with prior knowledge (h2c).
#[derive(Debug, Clone, Copy, Default)]
pub struct Http2Dispatcher;

impl Dispatch for Http2Dispatcher {
    fn version(&self) -> HttpVersion {
        HttpVersion::Http2
    }

    async fn exchange<C: Connector>(
        &self,
        connector: &C,
        target: &RequestTarget,
        params: &ConnectionParameters,
    ) -> Result<CollectedResponse, FetchError> {
        let endpoint = params.endpoint(target, self.version().alpn());
        let Connected { stream, alpn } = connector.connect(&endpoint).await?;
        if endpoint.tls.is_some() && alpn.as_deref() != Some(&b"h2"[..]) {
            let selected = alpn.as_deref().map(String::from_utf8_lossy);
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("server did not negotiate h2 (selected {:?})", selected),
            )
            .into());
        }
        debug!(host = %endpoint.host, port = endpoint.port, tls = endpoint.tls.is_some(), "HTTP/2 connected");
        let mut connection = H2Connection::new(stream);
        let result = connection.send_request(target, params).await;
        connection.close().await;
        Ok(result?)
    }
}

/// Request header list: pseudo-headers first, then caller headers lowercased with
/// connection-specific fields removed.
pub fn request_headers(target: &RequestTarget, params: &ConnectionParameters) -> Vec<(String, String)> {
    let mut fields = vec![
        (":method".to_string(), params.method.as_str().to_string()),
        (":scheme".to_string(), target.scheme().to_string()),
        (":authority".to_string(), target.authority()),
        (":path".to_string(), target.path_and_query()),
    ];
    for (name, value) in &params.headers {
        let name = name.to_ascii_lowercase();
        if CONNECTION_HEADERS.contains(&name.as_str()) || (name == "te" && !value.eq_ignore_ascii_case("trailers")) {
            trace!(name = %name, "connection-specific header dropped");
            continue;
        }
        fields.push((name, value.clone()));
    }
    if let Some(payload) = &params.payload {
        if !params.has_header("content-length") {
            fields.push(("content-length".to_string(), payload.len().to_string()));
        }
    }
    fields
}

/// One HTTP/2 connection carrying a single request.
struct H2Connection<S> {
    stream: S,
    parser: H2Parser,
    session: Session,
    read_buf: BytesMut,
}

impl<S: AsyncRead + AsyncWrite + Unpin> H2Connection<S> {
    fn new(stream: S) -> Self {
        Self {
            stream,
            parser: H2Parser::new(),
            session: Session::new(),
            read_buf: BytesMut::with_capacity(16_384),
        }
    }

    async fn flush(&mut self) -> io::Result<()> {
        if !self.session.writer.is_empty() {
            let out = self.session.writer.take_buffer();
            self.stream.write_all(&out).await?;
            self.stream.flush().await?;
        }
        Ok(())
    }

    /// Read once, process every complete frame, and send any replies they produced.
    async fn read_frames(&mut self) -> io::Result<()> {
        let n = self.stream.read_buf(&mut self.read_buf).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before response was complete",
            ));
        }
        self.parser.receive(&mut self.read_buf, &mut self.session);
        if let Some(e) = self.session.take_error() {
            return Err(e);
        }
        self.flush().await
    }

    async fn send_request(&mut self, target: &RequestTarget, params: &ConnectionParameters) -> io::Result<CollectedResponse> {
        self.session.start()?;
        let mut block = BytesMut::new();
        encode_headers(&request_headers(target, params), &mut block);
        let body = params.payload.clone().filter(|b| !b.is_empty());
        let max_frame = self.session.peer_max_frame_size();
        self.session
            .writer
            .write_headers(STREAM_ID, &block, body.is_none(), max_frame)?;
        self.flush().await?;
        trace!(method = %params.method, path = %target.path_and_query(), "request headers sent");

        if let Some(body) = body {
            self.send_body(body).await?;
        }
        while !self.session.is_done() {
            self.read_frames().await?;
        }
        std::mem::take(&mut self.session.collector).finish()
    }

    /// Send the payload as DATA frames within the peer's flow-control windows.
    async fn send_body(&mut self, mut body: Bytes) -> io::Result<()> {
        while !body.is_empty() {
            if self.session.is_done() {
                debug!(unsent = body.len(), "response completed before request body was sent");
                self.session.writer.write_rst_stream(STREAM_ID, ERROR_NO_ERROR)?;
                return self.flush().await;
            }
            let allowance = self.session.send_allowance();
            if allowance == 0 {
                trace!("send window exhausted; waiting for WINDOW_UPDATE");
                self.read_frames().await?;
                continue;
            }
            let chunk = body.split_to(allowance.min(body.len()));
            self.session
                .writer
                .write_data(STREAM_ID, &chunk, body.is_empty())?;
            self.session.consume_send_window(chunk.len());
            self.flush().await?;
        }
        Ok(())
    }

    /// Send GOAWAY and shut the stream down. Consumes the connection, so it happens once.
    async fn close(mut self) {
        let code = self.session.goaway_code();
        let result = match self.session.writer.write_goaway(0, code, b"") {
            Ok(()) => self.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            trace!(error = %e, "GOAWAY not sent");
        }
        if let Err(e) = self.stream.shutdown().await {
            trace!(error = %e, "shutdown after response");
        }
    }
}
