/*
 * session.rs
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

//! Client-side HTTP/2 connection state for a single request stream: settings, flow-control
//! windows, header block assembly, and forwarding of the response to a `ResponseCollector`.
//! Frames to send in reply (SETTINGS ACK, PING ACK, WINDOW_UPDATE) are queued on `writer`.

use bytes::{Bytes, BytesMut};
use std::io;
use tracing::{debug, trace, warn};

use super::frame::*;
use super::handler::{H2FrameHandler, Priority};
use super::writer::H2Writer;
use crate::protocol::http::aggregate::ResponseCollector;
use crate::protocol::http::hpack::Decoder;
use crate::protocol::http::ResponseHandler;

/// The only stream a session opens.
pub const STREAM_ID: u32 = 1;

/// Receive window advertised for the stream (via SETTINGS) and the connection (via WINDOW_UPDATE).
pub const LOCAL_WINDOW: u32 = 1 << 20;

const MAX_HEADER_BLOCK: usize = 256 * 1024;

/// Header block split across HEADERS and CONTINUATION frames.
struct PendingBlock {
    stream_id: u32,
    block: BytesMut,
    end_stream: bool,
}

pub struct Session {
    pub(super) writer: H2Writer,
    decoder: Decoder,
    pub(super) collector: ResponseCollector,
    pending: Option<PendingBlock>,
    /// Final (non-1xx) response head seen.
    final_headers: bool,
    /// END_STREAM received from the peer.
    stream_closed: bool,
    peer_max_frame_size: usize,
    peer_initial_window: i64,
    conn_send_window: i64,
    stream_send_window: i64,
    conn_recv_window: i64,
    stream_recv_window: i64,
    error: Option<io::Error>,
    /// Error code for our GOAWAY.
    goaway_code: u32,
}

impl Session {
    pub fn new() -> Self {
        Self {
            writer: H2Writer::new(),
            decoder: Decoder::new(DEFAULT_HEADER_TABLE_SIZE),
            collector: ResponseCollector::new(),
            pending: None,
            final_headers: false,
            stream_closed: false,
            peer_max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            peer_initial_window: DEFAULT_INITIAL_WINDOW_SIZE as i64,
            conn_send_window: DEFAULT_INITIAL_WINDOW_SIZE as i64,
            stream_send_window: DEFAULT_INITIAL_WINDOW_SIZE as i64,
            conn_recv_window: LOCAL_WINDOW as i64,
            stream_recv_window: LOCAL_WINDOW as i64,
            error: None,
            goaway_code: ERROR_NO_ERROR,
        }
    }

    /// Queue the preface, our SETTINGS, and the connection window increase.
    pub fn start(&mut self) -> io::Result<()> {
        self.writer.write_preface();
        self.writer.write_settings(&[
            (SETTINGS_ENABLE_PUSH, 0),
            (SETTINGS_INITIAL_WINDOW_SIZE, LOCAL_WINDOW),
        ])?;
        self.writer
            .write_window_update(0, LOCAL_WINDOW - DEFAULT_INITIAL_WINDOW_SIZE)
    }

    pub fn peer_max_frame_size(&self) -> usize {
        self.peer_max_frame_size
    }

    /// Response fully received.
    pub fn is_done(&self) -> bool {
        self.stream_closed
    }

    pub fn goaway_code(&self) -> u32 {
        self.goaway_code
    }

    /// First fatal error, if any.
    pub fn take_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }

    /// DATA octets that may be sent right now.
    pub fn send_allowance(&self) -> usize {
        self.conn_send_window
            .min(self.stream_send_window)
            .min(self.peer_max_frame_size as i64)
            .max(0) as usize
    }

    pub fn consume_send_window(&mut self, n: usize) {
        self.conn_send_window -= n as i64;
        self.stream_send_window -= n as i64;
    }

    fn abort(&mut self, local_code: u32, error: io::Error) {
        if self.error.is_none() {
            warn!(error = %error, "HTTP/2 request failed");
            self.collector.failed(&error);
            self.goaway_code = local_code;
            self.error = Some(error);
        }
    }

    fn fail(&mut self, code: u32, message: impl AsRef<str>) {
        let error = io::Error::new(
            io::ErrorKind::InvalidData,
            format!("HTTP/2 {}: {}", error_name(code), message.as_ref()),
        );
        self.abort(code, error);
    }

    fn queued(&mut self, result: io::Result<()>) {
        if let Err(e) = result {
            self.fail(ERROR_INTERNAL_ERROR, e.to_string());
        }
    }

    fn expecting_continuation(&mut self) -> bool {
        if self.pending.is_some() {
            self.fail(ERROR_PROTOCOL_ERROR, "expected CONTINUATION");
            return true;
        }
        false
    }

    fn finish_stream(&mut self, body_started: bool) {
        if body_started {
            self.collector.end_body();
        }
        self.collector.complete();
        self.stream_closed = true;
    }

    fn header_block_complete(&mut self, stream_id: u32, block: Bytes, end_stream: bool) {
        // Every block is decoded to keep the HPACK table in step, even if it is dropped.
        let mut fields: Vec<(String, String)> = Vec::new();
        if let Err(e) = self.decoder.decode(&mut &block[..], &mut fields) {
            self.fail(ERROR_COMPRESSION_ERROR, e.to_string());
            return;
        }
        if stream_id != STREAM_ID {
            trace!(stream_id, "header block for another stream dropped");
            return;
        }
        if self.stream_closed {
            self.fail(ERROR_STREAM_CLOSED, "HEADERS after end of stream");
            return;
        }
        if self.final_headers {
            if !end_stream {
                self.fail(ERROR_PROTOCOL_ERROR, "trailers without END_STREAM");
                return;
            }
            for (name, value) in &fields {
                self.collector.trailer(name, value);
            }
            self.finish_stream(true);
            return;
        }

        let status = fields
            .iter()
            .find(|(n, _)| n == ":status")
            .and_then(|(_, v)| v.parse::<u16>().ok());
        let Some(status) = status else {
            self.fail(ERROR_PROTOCOL_ERROR, "response without valid :status");
            return;
        };
        if (100..200).contains(&status) {
            if end_stream {
                self.fail(ERROR_PROTOCOL_ERROR, "interim response ended the stream");
            } else {
                trace!(status, "interim response skipped");
            }
            return;
        }
        self.final_headers = true;
        self.collector.status(status);
        for (name, value) in fields.iter().filter(|(n, _)| !n.starts_with(':')) {
            self.collector.header(name, value);
        }
        trace!(status, end_stream, "response head");
        if end_stream {
            self.finish_stream(false);
        } else {
            self.collector.start_body();
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl H2FrameHandler for Session {
    fn data_frame_received(&mut self, stream_id: u32, end_stream: bool, data: Bytes, flow_controlled_len: usize) {
        if self.expecting_continuation() {
            return;
        }
        let len = flow_controlled_len as i64;
        self.conn_recv_window -= len;
        if self.conn_recv_window < 0 {
            self.fail(ERROR_FLOW_CONTROL_ERROR, "connection receive window exceeded");
            return;
        }
        if stream_id != STREAM_ID || self.stream_closed {
            self.fail(ERROR_STREAM_CLOSED, format!("DATA on closed stream {}", stream_id));
            return;
        }
        if !self.final_headers {
            self.fail(ERROR_PROTOCOL_ERROR, "DATA before response HEADERS");
            return;
        }
        self.stream_recv_window -= len;
        if self.stream_recv_window < 0 {
            self.fail(ERROR_FLOW_CONTROL_ERROR, "stream receive window exceeded");
            return;
        }
        self.collector.body_chunk(&data);
        if flow_controlled_len > 0 {
            let credit = flow_controlled_len as u32;
            let result = self.writer.write_window_update(0, credit);
            self.queued(result);
            self.conn_recv_window += len;
            if !end_stream {
                let result = self.writer.write_window_update(STREAM_ID, credit);
                self.queued(result);
                self.stream_recv_window += len;
            }
        }
        if end_stream {
            self.finish_stream(true);
        }
    }

    fn headers_frame_received(
        &mut self,
        stream_id: u32,
        end_stream: bool,
        end_headers: bool,
        _priority: Option<Priority>,
        header_block_fragment: Bytes,
    ) {
        if self.expecting_continuation() {
            return;
        }
        if end_headers {
            self.header_block_complete(stream_id, header_block_fragment, end_stream);
        } else {
            self.pending = Some(PendingBlock {
                stream_id,
                block: BytesMut::from(&header_block_fragment[..]),
                end_stream,
            });
        }
    }

    fn rst_stream_frame_received(&mut self, stream_id: u32, error_code: u32) {
        if self.expecting_continuation() {
            return;
        }
        if stream_id == STREAM_ID && !self.stream_closed {
            let error = io::Error::new(
                io::ErrorKind::ConnectionReset,
                format!("stream reset by peer: {}", error_name(error_code)),
            );
            self.abort(ERROR_NO_ERROR, error);
        }
    }

    fn settings_frame_received(&mut self, ack: bool, settings: Vec<(u16, u32)>) {
        if self.expecting_continuation() {
            return;
        }
        if ack {
            trace!("SETTINGS acknowledged");
            return;
        }
        for (id, value) in settings {
            match id {
                SETTINGS_INITIAL_WINDOW_SIZE => {
                    if value as i64 > MAX_WINDOW_SIZE {
                        self.fail(ERROR_FLOW_CONTROL_ERROR, "initial window size too large");
                        return;
                    }
                    self.stream_send_window += value as i64 - self.peer_initial_window;
                    self.peer_initial_window = value as i64;
                    if self.stream_send_window > MAX_WINDOW_SIZE {
                        self.fail(ERROR_FLOW_CONTROL_ERROR, "stream window overflow");
                        return;
                    }
                }
                SETTINGS_MAX_FRAME_SIZE => {
                    let size = value as usize;
                    if !(DEFAULT_MAX_FRAME_SIZE..=MAX_MAX_FRAME_SIZE).contains(&size) {
                        self.fail(ERROR_PROTOCOL_ERROR, "max frame size out of range");
                        return;
                    }
                    self.peer_max_frame_size = size;
                }
                SETTINGS_ENABLE_PUSH if value > 1 => {
                    self.fail(ERROR_PROTOCOL_ERROR, "invalid ENABLE_PUSH");
                    return;
                }
                _ => trace!(id, value, "peer setting"),
            }
        }
        let result = self.writer.write_settings_ack();
        self.queued(result);
    }

    fn push_promise_frame_received(&mut self, stream_id: u32, promised_stream_id: u32, _end_headers: bool, _block: Bytes) {
        trace!(stream_id, promised_stream_id, "push promise");
        self.fail(ERROR_PROTOCOL_ERROR, "PUSH_PROMISE while push is disabled");
    }

    fn ping_frame_received(&mut self, ack: bool, opaque_data: u64) {
        if self.expecting_continuation() {
            return;
        }
        if !ack {
            let result = self.writer.write_ping(opaque_data, true);
            self.queued(result);
        }
    }

    fn goaway_frame_received(&mut self, last_stream_id: u32, error_code: u32, debug_data: Bytes) {
        if self.expecting_continuation() {
            return;
        }
        debug!(last_stream_id, code = error_name(error_code), "GOAWAY received");
        if !self.stream_closed && (last_stream_id < STREAM_ID || error_code != ERROR_NO_ERROR) {
            let error = io::Error::new(
                io::ErrorKind::ConnectionAborted,
                format!(
                    "connection closed by peer: {} {}",
                    error_name(error_code),
                    String::from_utf8_lossy(&debug_data)
                ),
            );
            self.abort(ERROR_NO_ERROR, error);
        }
    }

    fn window_update_frame_received(&mut self, stream_id: u32, increment: u32) {
        if self.expecting_continuation() {
            return;
        }
        let window = match stream_id {
            0 => &mut self.conn_send_window,
            STREAM_ID => &mut self.stream_send_window,
            _ => return,
        };
        *window += increment as i64;
        if *window > MAX_WINDOW_SIZE {
            self.fail(ERROR_FLOW_CONTROL_ERROR, "send window overflow");
        }
    }

    fn continuation_frame_received(&mut self, stream_id: u32, end_headers: bool, header_block_fragment: Bytes) {
        match self.pending.take() {
            Some(mut pending) if pending.stream_id == stream_id => {
                pending.block.extend_from_slice(&header_block_fragment);
                if pending.block.len() > MAX_HEADER_BLOCK {
                    self.fail(ERROR_ENHANCE_YOUR_CALM, "header block too large");
                } else if end_headers {
                    self.header_block_complete(pending.stream_id, pending.block.freeze(), pending.end_stream);
                } else {
                    self.pending = Some(pending);
                }
            }
            _ => self.fail(ERROR_PROTOCOL_ERROR, "unexpected CONTINUATION"),
        }
    }

    fn frame_error(&mut self, error_code: u32, _stream_id: u32, message: String) {
        self.fail(error_code, message);
    }
}
