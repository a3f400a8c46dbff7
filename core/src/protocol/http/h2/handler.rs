/*
 * handler.rs
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

//! HTTP/2 frame handler trait (callbacks for parsed frames).

use bytes::Bytes;

/// Stream priority carried by HEADERS or PRIORITY. Parsed, never acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Priority {
    pub dependency: u32,
    pub exclusive: bool,
    pub weight: u16,
}

/// Callback for parsed HTTP/2 frames. Payloads are Bytes slices of the read buffer.
pub trait H2FrameHandler {
    /// `flow_controlled_len` is the full frame payload length, padding included.
    fn data_frame_received(&mut self, stream_id: u32, end_stream: bool, data: Bytes, flow_controlled_len: usize);

    fn headers_frame_received(
        &mut self,
        stream_id: u32,
        end_stream: bool,
        end_headers: bool,
        priority: Option<Priority>,
        header_block_fragment: Bytes,
    );

    fn priority_frame_received(&mut self, _stream_id: u32, _priority: Priority) {}

    fn rst_stream_frame_received(&mut self, stream_id: u32, error_code: u32);

    fn settings_frame_received(&mut self, ack: bool, settings: Vec<(u16, u32)>);

    fn push_promise_frame_received(
        &mut self,
        stream_id: u32,
        promised_stream_id: u32,
        end_headers: bool,
        header_block_fragment: Bytes,
    );

    fn ping_frame_received(&mut self, ack: bool, opaque_data: u64);

    fn goaway_frame_received(&mut self, last_stream_id: u32, error_code: u32, debug_data: Bytes);

    fn window_update_frame_received(&mut self, stream_id: u32, increment: u32);

    fn continuation_frame_received(&mut self, stream_id: u32, end_headers: bool, header_block_fragment: Bytes);

    /// Malformed frame. `stream_id` 0 means a connection error.
    fn frame_error(&mut self, error_code: u32, stream_id: u32, message: String);
}
