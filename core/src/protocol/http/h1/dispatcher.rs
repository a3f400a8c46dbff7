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

//! HTTP/1.1 dispatch: one request per connection, `Connection: close`, response pushed
//! through the parser into a `ResponseCollector`.

use bytes::{BufMut, BytesMut};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace, warn};

use crate::error::FetchError;
use crate::net::{Connected, Connector};
use crate::protocol::http::aggregate::ResponseCollector;
use crate::protocol::http::client::Dispatch;
use crate::protocol::http::h1::parser::{BodyMode, H1ResponseHandler, ParseState, ResponseParser};
use crate::protocol::http::request::{ConnectionParameters, Method};
use crate::protocol::http::response::CollectedResponse;
use crate::protocol::http::{HttpVersion, ResponseHandler};
use crate::uri::RequestTarget;

/// Headers the dispatcher owns; caller-supplied values for these are not sent.
const RESERVED: &[&str] = &["host", "connection"];

/// HTTP/1.1 strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct Http1Dispatcher;

impl Dispatch for Http1Dispatcher {
    fn version(&self) -> HttpVersion {
        HttpVersion::Http1_1
    }

    async fn exchange<C: Connector>(
        &self,
        connector: &C,
        target: &RequestTarget,
        params: &ConnectionParameters,
    ) -> Result<CollectedResponse, FetchError> {
        let endpoint = params.endpoint(target, self.version().alpn());
        let Connected { mut stream, alpn } = connector.connect(&endpoint).await?;
        if let Some(p) = alpn.as_deref() {
            if p != b"http/1.1" {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("server selected unexpected protocol {}", String::from_utf8_lossy(p)),
                )
                .into());
            }
        }
        debug!(host = %endpoint.host, port = endpoint.port, tls = endpoint.tls.is_some(), "HTTP/1.1 connected");
        let result = send_request(&mut stream, target, params).await;
        if let Err(e) = stream.shutdown().await {
            trace!(error = %e, "shutdown after response");
        }
        Ok(result?)
    }
}

/// Serialize the request line and headers (terminated by the blank line).
pub fn encode_request_head(target: &RequestTarget, params: &ConnectionParameters) -> BytesMut {
    let mut head = BytesMut::with_capacity(256);
    let mut line = |s: &str| {
        head.put_slice(s.as_bytes());
        head.put_slice(b"\r\n");
    };
    line(&format!("{} {} HTTP/1.1", params.method, target.path_and_query()));
    line(&format!("Host: {}", target.authority()));
    for (name, value) in &params.headers {
        if RESERVED.iter().any(|r| name.eq_ignore_ascii_case(r)) {
            trace!(name = %name, "caller header replaced");
            continue;
        }
        line(&format!("{}: {}", name, value));
    }
    let framed = params.has_header("content-length") || params.has_header("transfer-encoding");
    match &params.payload {
        Some(payload) if !framed => line(&format!("Content-Length: {}", payload.len())),
        None if matches!(params.method, Method::Post | Method::Put | Method::Patch) => line("Content-Length: 0"),
        _ => {}
    }
    line("Connection: close");
    head.put_slice(b"\r\n");
    head
}

fn chunked_transfer(params: &ConnectionParameters) -> bool {
    params
        .headers
        .iter()
        .any(|(k, v)| k.eq_ignore_ascii_case("transfer-encoding") && v.to_ascii_lowercase().contains("chunked"))
}

async fn write_request<S: AsyncWrite + Unpin>(
    stream: &mut S,
    target: &RequestTarget,
    params: &ConnectionParameters,
) -> io::Result<()> {
    let head = encode_request_head(target, params);
    stream.write_all(&head).await?;
    if let Some(body) = &params.payload {
        if chunked_transfer(params) {
            if !body.is_empty() {
                stream.write_all(format!("{:x}\r\n", body.len()).as_bytes()).await?;
                stream.write_all(body).await?;
                stream.write_all(b"\r\n").await?;
            }
            stream.write_all(b"0\r\n\r\n").await?;
        } else {
            stream.write_all(body).await?;
        }
    }
    stream.flush().await
}

/// Response head as seen by the parser; forwarded to the collector only for the final response.
#[derive(Default)]
struct Head {
    status: Option<u16>,
    headers: Vec<(String, String)>,
}

/// Bridges parser callbacks to the head and the collector.
struct H1Driver<'a> {
    head: &'a mut Head,
    collector: &'a mut ResponseCollector,
}

impl H1ResponseHandler for H1Driver<'_> {
    fn status(&mut self, code: u16, _reason: Option<&str>) {
        self.head.status = Some(code);
    }

    fn header(&mut self, name: &str, value: &str) {
        self.head.headers.push((name.to_string(), value.to_string()));
    }

    fn start_body(&mut self) {
        self.collector.start_body();
    }

    fn body_chunk(&mut self, data: &[u8]) {
        self.collector.body_chunk(data);
    }

    fn end_body(&mut self) {
        self.collector.end_body();
    }

    fn trailer(&mut self, name: &str, value: &str) {
        self.collector.trailer(name, value);
    }

    fn complete(&mut self) {
        self.collector.complete();
    }
}

/// Write one request on an open stream and read the response to completion.
pub async fn send_request<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut S,
    target: &RequestTarget,
    params: &ConnectionParameters,
) -> io::Result<CollectedResponse> {
    write_request(stream, target, params).await?;

    let mut read_buf = BytesMut::with_capacity(8192);
    let mut parser = ResponseParser::new();
    let mut head = Head::default();
    let mut collector = ResponseCollector::new();

    loop {
        let mut driver = H1Driver {
            head: &mut head,
            collector: &mut collector,
        };
        parser.receive(&mut read_buf, &mut driver)?;

        if parser.state() == ParseState::HeadersComplete {
            let status = driver.head.status.unwrap_or(0);
            if (100..200).contains(&status) {
                if status == 101 {
                    return Err(io::Error::new(io::ErrorKind::InvalidData, "unexpected 101 Switching Protocols"));
                }
                trace!(status, "interim response skipped");
                *driver.head = Head::default();
                parser.reset();
                continue;
            }
            if status == 0 {
                warn!("response carried no status");
            }
            driver.collector.status(status);
            for (name, value) in &driver.head.headers {
                driver.collector.header(name, value);
            }
            let mode = BodyMode::for_response(params.method == Method::Head, status, &driver.head.headers)?;
            trace!(status, ?mode, "response head");
            parser.set_body_mode(mode, &mut driver);
            continue;
        }
        if parser.state() == ParseState::Idle {
            break;
        }

        let n = stream.read_buf(&mut read_buf).await?;
        if n == 0 {
            let mut driver = H1Driver {
                head: &mut head,
                collector: &mut collector,
            };
            parser.finish_at_eof(&mut driver)?;
            break;
        }
    }
    collector.finish()
}
