/*
 * writer.rs
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

//! HTTP/2 frame writer: serializes frames into a buffer the caller flushes to the stream.

use bytes::{BufMut, Bytes, BytesMut};
use std::io;

use super::frame::*;

fn zero_stream(kind: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, format!("{} requires a non-zero stream id", kind))
}

/// Accumulates outbound frames.
pub struct H2Writer {
    buf: BytesMut,
}

impl H2Writer {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(DEFAULT_MAX_FRAME_SIZE + FRAME_HEADER_LENGTH),
        }
    }

    fn write_frame_header(&mut self, length: usize, frame_type: u8, flags: u8, stream_id: u32) {
        self.buf.put_uint(length as u64, 3);
        self.buf.put_u8(frame_type);
        self.buf.put_u8(flags);
        self.buf.put_u32(stream_id & 0x7fff_ffff);
    }

    /// Client connection preface octets (not a frame).
    pub fn write_preface(&mut self) {
        self.buf.put_slice(CONNECTION_PREFACE);
    }

    /// Append a DATA frame. `data` must fit the peer's max frame size.
    pub fn write_data(&mut self, stream_id: u32, data: &[u8], end_stream: bool) -> io::Result<usize> {
        if stream_id == 0 {
            return Err(zero_stream("DATA"));
        }
        let flags = if end_stream { FLAG_END_STREAM } else { 0 };
        self.write_frame_header(data.len(), TYPE_DATA, flags, stream_id);
        self.buf.put_slice(data);
        Ok(data.len())
    }

    /// Append a header block as HEADERS plus as many CONTINUATION frames as `max_frame_size` requires.
    pub fn write_headers(
        &mut self,
        stream_id: u32,
        header_block: &[u8],
        end_stream: bool,
        max_frame_size: usize,
    ) -> io::Result<()> {
        if stream_id == 0 {
            return Err(zero_stream("HEADERS"));
        }
        let max = max_frame_size.max(1);
        let mut fragments = header_block.chunks(max).peekable();
        let first = fragments.next().unwrap_or_default();
        let mut flags = if end_stream { FLAG_END_STREAM } else { 0 };
        if fragments.peek().is_none() {
            flags |= FLAG_END_HEADERS;
        }
        self.write_frame_header(first.len(), TYPE_HEADERS, flags, stream_id);
        self.buf.put_slice(first);
        while let Some(fragment) = fragments.next() {
            let flags = if fragments.peek().is_none() { FLAG_END_HEADERS } else { 0 };
            self.write_frame_header(fragment.len(), TYPE_CONTINUATION, flags, stream_id);
            self.buf.put_slice(fragment);
        }
        Ok(())
    }

    pub fn write_rst_stream(&mut self, stream_id: u32, error_code: u32) -> io::Result<()> {
        if stream_id == 0 {
            return Err(zero_stream("RST_STREAM"));
        }
        self.write_frame_header(4, TYPE_RST_STREAM, 0, stream_id);
        self.buf.put_u32(error_code);
        Ok(())
    }

    pub fn write_settings(&mut self, settings: &[(u16, u32)]) -> io::Result<()> {
        self.write_frame_header(settings.len() * 6, TYPE_SETTINGS, 0, 0);
        for &(id, value) in settings {
            self.buf.put_u16(id);
            self.buf.put_u32(value);
        }
        Ok(())
    }

    pub fn write_settings_ack(&mut self) -> io::Result<()> {
        self.write_frame_header(0, TYPE_SETTINGS, FLAG_ACK, 0);
        Ok(())
    }

    pub fn write_ping(&mut self, opaque_data: u64, ack: bool) -> io::Result<()> {
        let flags = if ack { FLAG_ACK } else { 0 };
        self.write_frame_header(8, TYPE_PING, flags, 0);
        self.buf.put_u64(opaque_data);
        Ok(())
    }

    pub fn write_goaway(&mut self, last_stream_id: u32, error_code: u32, debug_data: &[u8]) -> io::Result<()> {
        self.write_frame_header(8 + debug_data.len(), TYPE_GOAWAY, 0, 0);
        self.buf.put_u32(last_stream_id & 0x7fff_ffff);
        self.buf.put_u32(error_code);
        self.buf.put_slice(debug_data);
        Ok(())
    }

    /// Stream 0 credits the connection window.
    pub fn write_window_update(&mut self, stream_id: u32, increment: u32) -> io::Result<()> {
        if increment == 0 || increment as i64 > MAX_WINDOW_SIZE {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "window increment out of range"));
        }
        self.write_frame_header(4, TYPE_WINDOW_UPDATE, 0, stream_id);
        self.buf.put_u32(increment);
        Ok(())
    }

    /// Take everything written so far; the writer stays usable.
    pub fn take_buffer(&mut self) -> Bytes {
        self.buf.split().freeze()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

impl Default for H2Writer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_header_layout() {
        let mut w = H2Writer::new();
        w.write_data(1, b"abc", true).unwrap();
        assert_eq!(&w.take_buffer()[..], &[0, 0, 3, TYPE_DATA, FLAG_END_STREAM, 0, 0, 0, 1, b'a', b'b', b'c']);
        assert!(w.is_empty());
    }

    #[test]
    fn large_header_blocks_use_continuation() {
        let mut w = H2Writer::new();
        let block = vec![0x82u8; 40];
        w.write_headers(1, &block, false, 16).unwrap();
        let out = w.take_buffer();
        // HEADERS(16) + CONTINUATION(16) + CONTINUATION(8, END_HEADERS)
        assert_eq!(out.len(), 3 * FRAME_HEADER_LENGTH + 40);
        assert_eq!((out[3], out[4]), (TYPE_HEADERS, 0));
        let second = FRAME_HEADER_LENGTH + 16;
        assert_eq!((out[second + 3], out[second + 4]), (TYPE_CONTINUATION, 0));
        let third = second + FRAME_HEADER_LENGTH + 16;
        assert_eq!(out[third + 2], 8);
        assert_eq!((out[third + 3], out[third + 4]), (TYPE_CONTINUATION, FLAG_END_HEADERS));
    }

    #[test]
    fn small_block_is_one_frame() {
        let mut w = H2Writer::new();
        w.write_headers(1, &[0x82], true, DEFAULT_MAX_FRAME_SIZE).unwrap();
        let out = w.take_buffer();
        assert_eq!(out[4], FLAG_END_STREAM | FLAG_END_HEADERS);
    }

    #[test]
    fn rejects_stream_zero_and_bad_increments() {
        let mut w = H2Writer::new();
        assert!(w.write_data(0, b"", true).is_err());
        assert!(w.write_headers(0, &[], true, 16).is_err());
        assert!(w.write_window_update(0, 0).is_err());
        assert!(w.write_window_update(1, 0x8000_0000).is_err());
    }
}
