/*
 * aggregate.rs
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

//! Response aggregation: ordered body chunks in, one contiguous buffer out.
//!
//! `ByteAggregator` has three transitions: `append` while data arrives, then exactly one of
//! `complete` (yields the buffer) or `fail` (discards it). Both terminal transitions consume
//! the aggregator. `ResponseCollector` is the `ResponseHandler` that owns one.

use std::io;

use bytes::{Bytes, BytesMut};
use tracing::{trace, warn};

use crate::protocol::http::handler::ResponseHandler;
use crate::protocol::http::response::CollectedResponse;

/// Append-only sequence of received chunks.
#[derive(Debug, Default)]
pub struct ByteAggregator {
    chunks: Vec<Bytes>,
    len: usize,
}

impl ByteAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk (copied). Empty chunks are ignored.
    pub fn append(&mut self, chunk: &[u8]) {
        if !chunk.is_empty() {
            self.append_bytes(Bytes::copy_from_slice(chunk));
        }
    }

    /// Append an owned chunk without copying.
    pub fn append_bytes(&mut self, chunk: Bytes) {
        if chunk.is_empty() {
            return;
        }
        self.len += chunk.len();
        self.chunks.push(chunk);
    }

    /// Total bytes appended so far.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Terminal: concatenate all chunks in arrival order.
    pub fn complete(self) -> Bytes {
        concat(&self.chunks)
    }

    /// Terminal: drop whatever was received and hand back the cause.
    pub fn fail(self, cause: io::Error) -> io::Error {
        trace!(discarded = self.len, "aggregation aborted");
        cause
    }
}

/// Ordered concatenation `c1 ‖ c2 ‖ … ‖ cn`.
pub fn concat(chunks: &[Bytes]) -> Bytes {
    match chunks {
        [] => Bytes::new(),
        [only] => only.clone(),
        _ => {
            let total = chunks.iter().map(Bytes::len).sum();
            let mut out = BytesMut::with_capacity(total);
            for chunk in chunks {
                out.extend_from_slice(chunk);
            }
            out.freeze()
        }
    }
}

#[derive(Debug)]
enum CollectState {
    Receiving,
    Complete,
    Failed(io::Error),
}

/// Response handler that records status and headers and aggregates the body.
#[derive(Debug)]
pub struct ResponseCollector {
    status: Option<u16>,
    headers: Vec<(String, String)>,
    body: ByteAggregator,
    state: CollectState,
}

impl ResponseCollector {
    pub fn new() -> Self {
        Self {
            status: None,
            headers: Vec::new(),
            body: ByteAggregator::new(),
            state: CollectState::Receiving,
        }
    }

    /// True once `complete` or `failed` has been seen.
    pub fn is_finished(&self) -> bool {
        !matches!(self.state, CollectState::Receiving)
    }

    pub fn status_received(&self) -> bool {
        self.status.is_some()
    }

    /// Consume the collector. Only a completed response yields a value.
    pub fn finish(self) -> io::Result<CollectedResponse> {
        match self.state {
            CollectState::Complete => {
                let status = self.status.unwrap_or_else(|| {
                    warn!("transport reported no status; using 0");
                    0
                });
                Ok(CollectedResponse {
                    status,
                    headers: self.headers,
                    body: self.body.complete(),
                })
            }
            CollectState::Failed(e) => Err(self.body.fail(e)),
            CollectState::Receiving => Err(self.body.fail(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "response ended before completion",
            ))),
        }
    }
}

impl Default for ResponseCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseHandler for ResponseCollector {
    fn status(&mut self, code: u16) {
        self.status = Some(code);
    }

    fn header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    fn start_body(&mut self) {}

    fn body_chunk(&mut self, data: &[u8]) {
        if self.is_finished() {
            trace!(len = data.len(), "chunk after terminal event ignored");
            return;
        }
        self.body.append(data);
    }

    fn end_body(&mut self) {}

    fn trailer(&mut self, name: &str, _value: &str) {
        trace!(name, "trailer dropped");
    }

    fn complete(&mut self) {
        if !self.is_finished() {
            self.state = CollectState::Complete;
        }
    }

    fn failed(&mut self, error: &io::Error) {
        if !self.is_finished() {
            self.state = CollectState::Failed(io::Error::new(error.kind(), error.to_string()));
        }
    }
}
