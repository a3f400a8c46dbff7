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

//! In-memory test server: a `Connector` that hands out duplex streams served by canned
//! HTTP/1.1 or HTTP/2 responders, and counts every connection it opens.

#![allow(dead_code)]

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;

use securefetch_core::net::{Capabilities, Connected, Connector, Endpoint};
use securefetch_core::protocol::http::h2::{
    H2FrameHandler, H2Parser, H2Writer, Priority, CONNECTION_PREFACE, DEFAULT_MAX_FRAME_SIZE,
    SETTINGS_MAX_CONCURRENT_STREAMS,
};
use securefetch_core::protocol::http::hpack::{encode_headers, Decoder};

/// Canned server behaviour for every connection.
#[derive(Clone)]
pub enum Server {
    /// Raw response bytes written in `step`-byte pieces, then the connection is closed.
    Http1 { response: Vec<u8>, step: usize },
    Http2(H2Reply),
}

#[derive(Clone, Default)]
pub struct H2Reply {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    /// One DATA frame per entry.
    pub body: Vec<Vec<u8>>,
    /// Reset the stream with this code after the body instead of ending it.
    pub reset: Option<u32>,
}

impl Server {
    /// HTTP/1.1 response with a Content-Length body.
    pub fn http1(status: u16, headers: &[(&str, &str)], body: &[u8]) -> Self {
        let mut response = format!("HTTP/1.1 {} Whatever\r\n", status).into_bytes();
        for (name, value) in headers {
            response.extend_from_slice(format!("{}: {}\r\n", name, value).as_bytes());
        }
        response.extend_from_slice(format!("Content-Length: {}\r\n\r\n", body.len()).as_bytes());
        response.extend_from_slice(body);
        Server::Http1 { response, step: 5 }
    }

    pub fn http1_raw(response: &[u8], step: usize) -> Self {
        Server::Http1 {
            response: response.to_vec(),
            step,
        }
    }

    /// HTTP/2 response with the body split into `frame`-byte DATA frames.
    pub fn http2(status: u16, headers: &[(&str, &str)], body: &[u8], frame: usize) -> Self {
        Server::Http2(H2Reply {
            status,
            headers: headers.iter().map(|(n, v)| (n.to_string(), v.to_string())).collect(),
            body: body.chunks(frame.max(1)).map(<[u8]>::to_vec).collect(),
            reset: None,
        })
    }
}

/// What the server saw on one connection.
#[derive(Debug, Clone, Default)]
pub struct Recorded {
    /// HTTP/1.1 request head as text.
    pub raw_head: String,
    /// HTTP/2 request header fields.
    pub fields: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub goaway: bool,
    /// The client shut its write side down after the exchange.
    pub closed: bool,
}

impl Recorded {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }
}

pub struct StubConnector {
    server: Server,
    alpn: Option<Option<Vec<u8>>>,
    connections: AtomicUsize,
    endpoints: Mutex<Vec<Endpoint>>,
    recorded: Arc<Mutex<Vec<Recorded>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl StubConnector {
    pub fn new(server: Server) -> Self {
        Self {
            server,
            alpn: None,
            connections: AtomicUsize::new(0),
            endpoints: Mutex::new(Vec::new()),
            recorded: Arc::new(Mutex::new(Vec::new())),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Report this ALPN selection instead of echoing the first protocol offered.
    pub fn with_alpn(mut self, alpn: Option<&[u8]>) -> Self {
        self.alpn = Some(alpn.map(<[u8]>::to_vec));
        self
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.endpoints.lock().unwrap().clone()
    }

    /// Wait for every server task, then return what they recorded.
    pub async fn recorded(&self) -> Vec<Recorded> {
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap());
        for task in tasks {
            task.await.unwrap();
        }
        self.recorded.lock().unwrap().clone()
    }
}

impl Connector for StubConnector {
    type Stream = DuplexStream;

    async fn capabilities(&self) -> Capabilities {
        Capabilities {
            cipher_suites: vec![
                "TLS_AES_128_GCM_SHA256".into(),
                "TLS_AES_256_GCM_SHA384".into(),
                "TLS_CHACHA20_POLY1305_SHA256".into(),
            ],
            key_exchange_groups: vec!["X25519MLKEM768".into(), "X25519".into(), "secp256r1".into()],
        }
    }

    async fn connect(&self, endpoint: &Endpoint) -> io::Result<Connected<DuplexStream>> {
        self.connections.fetch_add(1, Ordering::SeqCst);
        self.endpoints.lock().unwrap().push(endpoint.clone());
        let (client, server) = tokio::io::duplex(64 * 1024);
        let recorded = self.recorded.clone();
        let task = match self.server.clone() {
            Server::Http1 { response, step } => tokio::spawn(async move {
                if let Ok(r) = serve_h1(server, &response, step).await {
                    recorded.lock().unwrap().push(r);
                }
            }),
            Server::Http2(reply) => tokio::spawn(async move {
                if let Ok(Some(r)) = serve_h2(server, &reply).await {
                    recorded.lock().unwrap().push(r);
                }
            }),
        };
        self.tasks.lock().unwrap().push(task);
        let alpn = match &self.alpn {
            Some(forced) => forced.clone(),
            None => endpoint.tls.as_ref().and_then(|t| t.alpn.first().cloned()),
        };
        Ok(Connected { stream: client, alpn })
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

async fn serve_h1(mut stream: DuplexStream, response: &[u8], step: usize) -> io::Result<Recorded> {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 4096];
    let head_end = loop {
        if let Some(p) = find(&buf, b"\r\n\r\n") {
            break p + 4;
        }
        let n = stream.read(&mut tmp).await?;
        if n == 0 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        buf.extend_from_slice(&tmp[..n]);
    };
    let raw_head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let length = raw_head
        .lines()
        .filter_map(|l| l.split_once(':'))
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while buf.len() < head_end + length {
        let n = stream.read(&mut tmp).await?;
        if n == 0 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        buf.extend_from_slice(&tmp[..n]);
    }
    for piece in response.chunks(step.max(1)) {
        stream.write_all(piece).await?;
    }
    stream.shutdown().await?;
    Ok(Recorded {
        raw_head,
        body: buf[head_end..head_end + length].to_vec(),
        ..Default::default()
    })
}

/// Server end of one HTTP/2 connection.
struct ServerSide {
    decoder: Decoder,
    pending: Option<BytesMut>,
    fields: Vec<(String, String)>,
    body: Vec<u8>,
    request_done: bool,
    goaway: bool,
}

impl ServerSide {
    fn block_done(&mut self, block: &[u8], end_stream: bool) {
        self.decoder.decode(&mut &block[..], &mut self.fields).unwrap();
        self.request_done |= end_stream;
    }
}

impl H2FrameHandler for ServerSide {
    fn data_frame_received(&mut self, _stream_id: u32, end_stream: bool, data: Bytes, _len: usize) {
        self.body.extend_from_slice(&data);
        self.request_done |= end_stream;
    }

    fn headers_frame_received(&mut self, _stream_id: u32, end_stream: bool, end_headers: bool, _priority: Option<Priority>, block: Bytes) {
        if end_headers {
            self.block_done(&block, end_stream);
        } else {
            self.pending = Some(BytesMut::from(&block[..]));
            self.request_done |= end_stream;
        }
    }

    fn rst_stream_frame_received(&mut self, _stream_id: u32, _error_code: u32) {}

    fn settings_frame_received(&mut self, _ack: bool, _settings: Vec<(u16, u32)>) {}

    fn push_promise_frame_received(&mut self, _stream_id: u32, _promised: u32, _end_headers: bool, _block: Bytes) {}

    fn ping_frame_received(&mut self, _ack: bool, _opaque_data: u64) {}

    fn goaway_frame_received(&mut self, _last_stream_id: u32, _error_code: u32, _debug_data: Bytes) {
        self.goaway = true;
    }

    fn window_update_frame_received(&mut self, _stream_id: u32, _increment: u32) {}

    fn continuation_frame_received(&mut self, _stream_id: u32, end_headers: bool, fragment: Bytes) {
        let mut block = self.pending.take().unwrap();
        block.extend_from_slice(&fragment);
        if end_headers {
            self.block_done(&block, false);
        } else {
            self.pending = Some(block);
        }
    }

    fn frame_error(&mut self, error_code: u32, stream_id: u32, message: String) {
        panic!("client sent a bad frame: {} {} {}", error_code, stream_id, message);
    }
}

async fn serve_h2(mut stream: DuplexStream, reply: &H2Reply) -> io::Result<Option<Recorded>> {
    let mut writer = H2Writer::new();
    writer.write_settings(&[(SETTINGS_MAX_CONCURRENT_STREAMS, 100)])?;
    stream.write_all(&writer.take_buffer()).await?;

    let mut buf = BytesMut::new();
    while buf.len() < CONNECTION_PREFACE.len() {
        if stream.read_buf(&mut buf).await? == 0 {
            return Ok(None);
        }
    }
    assert_eq!(&buf.split_to(CONNECTION_PREFACE.len())[..], CONNECTION_PREFACE);

    let mut parser = H2Parser::new();
    let mut side = ServerSide {
        decoder: Decoder::new(4096),
        pending: None,
        fields: Vec::new(),
        body: Vec::new(),
        request_done: false,
        goaway: false,
    };
    parser.receive(&mut buf, &mut side);
    while !side.request_done {
        if stream.read_buf(&mut buf).await? == 0 {
            return Ok(None);
        }
        parser.receive(&mut buf, &mut side);
    }

    writer.write_settings_ack()?;
    let mut fields = vec![(":status".to_string(), reply.status.to_string())];
    fields.extend(reply.headers.iter().cloned());
    let mut block = BytesMut::new();
    encode_headers(&fields, &mut block);
    let ends_with_headers = reply.body.is_empty() && reply.reset.is_none();
    writer.write_headers(1, &block, ends_with_headers, DEFAULT_MAX_FRAME_SIZE)?;
    for (i, chunk) in reply.body.iter().enumerate() {
        let last = i + 1 == reply.body.len() && reply.reset.is_none();
        writer.write_data(1, chunk, last)?;
    }
    if let Some(code) = reply.reset {
        writer.write_rst_stream(1, code)?;
    }
    stream.write_all(&writer.take_buffer()).await?;

    // Drain until the client closes: it should say GOAWAY first.
    let mut closed = false;
    loop {
        let n = stream.read_buf(&mut buf).await?;
        parser.receive(&mut buf, &mut side);
        if n == 0 {
            closed = true;
            break;
        }
    }
    Ok(Some(Recorded {
        fields: side.fields,
        body: side.body,
        goaway: side.goaway,
        closed,
        ..Default::default()
    }))
}
