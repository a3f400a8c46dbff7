/*
 * parser.rs
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

//! HTTP/2 frame push parser: consumes complete frames from a buffer and dispatches them to an
//! `H2FrameHandler`. After the first malformed frame the parser reports it via `frame_error`
//! and consumes nothing further.

use bytes::{Buf, Bytes, BytesMut};

use super::frame::*;
use super::handler::{H2FrameHandler, Priority};

type FrameResult = Result<(), (u32, &'static str)>;

/// Push parser for HTTP/2 frames.
pub struct H2Parser {
    max_frame_size: usize,
    broken: bool,
}

impl H2Parser {
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            broken: false,
        }
    }

    /// True once a malformed frame has been seen.
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    /// Consume as many complete frames as possible. Partial frames stay in `buf`.
    pub fn receive<H: H2FrameHandler>(&mut self, buf: &mut BytesMut, handler: &mut H) {
        while !self.broken && buf.len() >= FRAME_HEADER_LENGTH {
            let length = (buf[0] as usize) << 16 | (buf[1] as usize) << 8 | buf[2] as usize;
            if length > self.max_frame_size {
                self.broken = true;
                handler.frame_error(
                    ERROR_FRAME_SIZE_ERROR,
                    0,
                    format!("frame size {} exceeds {}", length, self.max_frame_size),
                );
                return;
            }
            if buf.len() < FRAME_HEADER_LENGTH + length {
                return;
            }
            let frame_type = buf[3];
            let flags = buf[4];
            let stream_id = u32::from_be_bytes([buf[5] & 0x7f, buf[6], buf[7], buf[8]]);
            buf.advance(FRAME_HEADER_LENGTH);
            let payload = buf.split_to(length).freeze();

            if let Err((code, message)) = dispatch_frame(frame_type, flags, stream_id, payload, handler) {
                self.broken = true;
                let scope = if code == ERROR_PROTOCOL_ERROR || code == ERROR_FRAME_SIZE_ERROR {
                    0
                } else {
                    stream_id
                };
                handler.frame_error(code, scope, message.to_string());
            }
        }
    }
}

impl Default for H2Parser {
    fn default() -> Self {
        Self::new()
    }
}

fn protocol(msg: &'static str) -> FrameResult {
    Err((ERROR_PROTOCOL_ERROR, msg))
}

fn frame_size(msg: &'static str) -> FrameResult {
    Err((ERROR_FRAME_SIZE_ERROR, msg))
}

/// Remove the pad length octet and trailing padding when PADDED is set.
fn strip_padding(flags: u8, mut payload: Bytes) -> Result<Bytes, (u32, &'static str)> {
    if flags & FLAG_PADDED == 0 {
        return Ok(payload);
    }
    if payload.is_empty() {
        return Err((ERROR_FRAME_SIZE_ERROR, "PADDED frame without pad length"));
    }
    let pad = payload.get_u8() as usize;
    if pad > payload.len() {
        return Err((ERROR_PROTOCOL_ERROR, "padding exceeds payload"));
    }
    payload.truncate(payload.len() - pad);
    Ok(payload)
}

fn read_priority(p: &mut Bytes) -> Priority {
    let raw = p.get_u32();
    Priority {
        dependency: raw & 0x7fff_ffff,
        exclusive: raw & 0x8000_0000 != 0,
        weight: p.get_u8() as u16 + 1,
    }
}

fn dispatch_frame<H: H2FrameHandler>(
    frame_type: u8,
    flags: u8,
    stream_id: u32,
    payload: Bytes,
    handler: &mut H,
) -> FrameResult {
    match frame_type {
        TYPE_DATA => {
            if stream_id == 0 {
                return protocol("DATA on stream 0");
            }
            let flow_controlled_len = payload.len();
            let data = strip_padding(flags, payload)?;
            handler.data_frame_received(stream_id, flags & FLAG_END_STREAM != 0, data, flow_controlled_len);
        }
        TYPE_HEADERS => {
            if stream_id == 0 {
                return protocol("HEADERS on stream 0");
            }
            let mut block = strip_padding(flags, payload)?;
            let priority = if flags & FLAG_PRIORITY != 0 {
                if block.len() < 5 {
                    return frame_size("HEADERS priority truncated");
                }
                Some(read_priority(&mut block))
            } else {
                None
            };
            handler.headers_frame_received(
                stream_id,
                flags & FLAG_END_STREAM != 0,
                flags & FLAG_END_HEADERS != 0,
                priority,
                block,
            );
        }
        TYPE_PRIORITY => {
            if stream_id == 0 {
                return protocol("PRIORITY on stream 0");
            }
            if payload.len() != 5 {
                return frame_size("PRIORITY must be 5 octets");
            }
            let mut p = payload;
            let priority = read_priority(&mut p);
            handler.priority_frame_received(stream_id, priority);
        }
        TYPE_RST_STREAM => {
            if stream_id == 0 {
                return protocol("RST_STREAM on stream 0");
            }
            if payload.len() != 4 {
                return frame_size("RST_STREAM must be 4 octets");
            }
            let mut p = payload;
            handler.rst_stream_frame_received(stream_id, p.get_u32());
        }
        TYPE_SETTINGS => {
            if stream_id != 0 {
                return protocol("SETTINGS on a stream");
            }
            let ack = flags & FLAG_ACK != 0;
            if ack && !payload.is_empty() {
                return frame_size("SETTINGS ACK with payload");
            }
            if payload.len() % 6 != 0 {
                return frame_size("SETTINGS length not a multiple of 6");
            }
            let mut p = payload;
            let mut settings = Vec::with_capacity(p.len() / 6);
            while p.has_remaining() {
                settings.push((p.get_u16(), p.get_u32()));
            }
            handler.settings_frame_received(ack, settings);
        }
        TYPE_PUSH_PROMISE => {
            if stream_id == 0 {
                return protocol("PUSH_PROMISE on stream 0");
            }
            let mut block = strip_padding(flags, payload)?;
            if block.len() < 4 {
                return frame_size("PUSH_PROMISE truncated");
            }
            let promised = block.get_u32() & 0x7fff_ffff;
            handler.push_promise_frame_received(stream_id, promised, flags & FLAG_END_HEADERS != 0, block);
        }
        TYPE_PING => {
            if stream_id != 0 {
                return protocol("PING on a stream");
            }
            if payload.len() != 8 {
                return frame_size("PING must be 8 octets");
            }
            let mut p = payload;
            handler.ping_frame_received(flags & FLAG_ACK != 0, p.get_u64());
        }
        TYPE_GOAWAY => {
            if stream_id != 0 {
                return protocol("GOAWAY on a stream");
            }
            if payload.len() < 8 {
                return frame_size("GOAWAY shorter than 8 octets");
            }
            let mut p = payload;
            let last_stream_id = p.get_u32() & 0x7fff_ffff;
            let error_code = p.get_u32();
            handler.goaway_frame_received(last_stream_id, error_code, p);
        }
        TYPE_WINDOW_UPDATE => {
            if payload.len() != 4 {
                return frame_size("WINDOW_UPDATE must be 4 octets");
            }
            let mut p = payload;
            let increment = p.get_u32() & 0x7fff_ffff;
            if increment == 0 {
                return protocol("WINDOW_UPDATE with zero increment");
            }
            handler.window_update_frame_received(stream_id, increment);
        }
        TYPE_CONTINUATION => {
            if stream_id == 0 {
                return protocol("CONTINUATION on stream 0");
            }
            handler.continuation_frame_received(stream_id, flags & FLAG_END_HEADERS != 0, payload);
        }
        // unknown frame types are ignored
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::http::h2::H2Writer;

    #[derive(Default)]
    struct Frames {
        events: Vec<String>,
    }

    impl H2FrameHandler for Frames {
        fn data_frame_received(&mut self, stream_id: u32, end_stream: bool, data: Bytes, len: usize) {
            self.events.push(format!("data {} {} {:?} {}", stream_id, end_stream, data, len));
        }
        fn headers_frame_received(&mut self, stream_id: u32, end_stream: bool, end_headers: bool, priority: Option<Priority>, block: Bytes) {
            self.events.push(format!("headers {} {} {} {:?} {}", stream_id, end_stream, end_headers, priority.map(|p| p.weight), block.len()));
        }
        fn rst_stream_frame_received(&mut self, stream_id: u32, error_code: u32) {
            self.events.push(format!("rst {} {}", stream_id, error_name(error_code)));
        }
        fn settings_frame_received(&mut self, ack: bool, settings: Vec<(u16, u32)>) {
            self.events.push(format!("settings {} {:?}", ack, settings));
        }
        fn push_promise_frame_received(&mut self, stream_id: u32, promised: u32, _end: bool, _block: Bytes) {
            self.events.push(format!("push {} {}", stream_id, promised));
        }
        fn ping_frame_received(&mut self, ack: bool, opaque: u64) {
            self.events.push(format!("ping {} {}", ack, opaque));
        }
        fn goaway_frame_received(&mut self, last: u32, code: u32, debug: Bytes) {
            self.events.push(format!("goaway {} {} {:?}", last, error_name(code), debug));
        }
        fn window_update_frame_received(&mut self, stream_id: u32, increment: u32) {
            self.events.push(format!("window {} {}", stream_id, increment));
        }
        fn continuation_frame_received(&mut self, stream_id: u32, end_headers: bool, block: Bytes) {
            self.events.push(format!("continuation {} {} {}", stream_id, end_headers, block.len()));
        }
        fn frame_error(&mut self, code: u32, stream_id: u32, message: String) {
            self.events.push(format!("error {} {} {}", error_name(code), stream_id, message));
        }
    }

    fn parse(bytes: &[u8]) -> (Vec<String>, usize) {
        let mut buf = BytesMut::from(bytes);
        let mut frames = Frames::default();
        H2Parser::new().receive(&mut buf, &mut frames);
        (frames.events, buf.len())
    }

    #[test]
    fn writer_output_parses_back() {
        let mut w = H2Writer::new();
        w.write_settings(&[(SETTINGS_ENABLE_PUSH, 0), (SETTINGS_INITIAL_WINDOW_SIZE, 1 << 20)]).unwrap();
        w.write_window_update(0, 1000).unwrap();
        w.write_data(1, b"hi", true).unwrap();
        w.write_ping(7, true).unwrap();
        w.write_goaway(1, ERROR_NO_ERROR, b"bye").unwrap();
        let (events, left) = parse(&w.take_buffer());
        assert_eq!(left, 0);
        assert_eq!(
            events,
            vec![
                "settings false [(2, 0), (4, 1048576)]",
                "window 0 1000",
                "data 1 true b\"hi\" 2",
                "ping true 7",
                "goaway 1 NO_ERROR b\"bye\"",
            ]
        );
    }

    #[test]
    fn partial_frame_is_kept() {
        let mut w = H2Writer::new();
        w.write_data(3, b"abcdef", false).unwrap();
        let bytes = w.take_buffer();
        let (events, left) = parse(&bytes[..bytes.len() - 1]);
        assert!(events.is_empty());
        assert_eq!(left, bytes.len() - 1);
    }

    #[test]
    fn padding_and_priority() {
        // HEADERS, PADDED|PRIORITY|END_HEADERS, stream 1: pad 2, priority (dep 0, weight 16), block "ab", padding
        let frame = [0, 0, 10, 0x1, 0x2c, 0, 0, 0, 1, 2, 0, 0, 0, 0, 15, b'a', b'b', 0, 0];
        let (events, _) = parse(&frame);
        assert_eq!(events, vec!["headers 1 false true Some(16) 2"]);
        // DATA, PADDED, stream 1: pad 1, "x", padding; flow control counts all 3 octets
        let data = [0, 0, 3, 0x0, 0x8, 0, 0, 0, 1, 1, b'x', 0];
        assert_eq!(parse(&data).0, vec!["data 1 false b\"x\" 3"]);
    }

    #[test]
    fn malformed_frames_stop_the_parser() {
        let zero_stream_data = [0, 0, 1, 0x0, 0, 0, 0, 0, 0, b'x', 0, 0, 0, 0x6, 0, 0, 0, 0, 0];
        let (events, _) = parse(&zero_stream_data);
        assert_eq!(events.len(), 1);
        assert!(events[0].starts_with("error PROTOCOL_ERROR 0"));

        let empty_padded = [0, 0, 0, 0x0, 0x8, 0, 0, 0, 1];
        assert!(parse(&empty_padded).0[0].starts_with("error FRAME_SIZE_ERROR"));

        let oversized = [0, 0x40, 0x01, 0x0, 0, 0, 0, 0, 1];
        assert!(parse(&oversized).0[0].starts_with("error FRAME_SIZE_ERROR"));

        let zero_window = [0, 0, 4, 0x8, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        assert!(parse(&zero_window).0[0].starts_with("error PROTOCOL_ERROR"));
    }

    #[test]
    fn unknown_types_are_skipped() {
        let frame = [0, 0, 2, 0xfa, 0, 0, 0, 0, 0, 1, 2, 0, 0, 8, 0x6, 0x1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 9];
        assert_eq!(parse(&frame).0, vec!["ping true 9"]);
    }
}
