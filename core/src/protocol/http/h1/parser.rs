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

//! HTTP/1.1 response push parser: status line, headers, body (none, Content-Length, chunked,
//! or read-until-close).

use bytes::{Buf, BytesMut};
use std::io;

/// Longest status, header, or chunk-size line accepted before the peer is considered broken.
const MAX_LINE: usize = 64 * 1024;

/// Callback for HTTP/1.1 response events. The dispatcher implements this and forwards to ResponseHandler.
pub trait H1ResponseHandler {
    fn status(&mut self, code: u16, reason: Option<&str>);
    fn header(&mut self, name: &str, value: &str);
    fn start_body(&mut self);
    fn body_chunk(&mut self, data: &[u8]);
    fn end_body(&mut self);
    fn trailer(&mut self, name: &str, value: &str);
    fn complete(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    Idle,
    StatusLine,
    Headers,
    /// Headers done; the dispatcher must call set_body_mode().
    HeadersComplete,
    Body,
    ChunkSize,
    ChunkData,
    /// CRLF after chunk data.
    ChunkDataEnd,
    ChunkTrailer,
}

/// How the response body is framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    None,
    Length(u64),
    Chunked,
    UntilClose,
}

impl BodyMode {
    /// Framing for a final response. HEAD, 1xx, 204 and 304 never have a body; chunked wins over
    /// Content-Length; otherwise the body runs until the server closes.
    pub fn for_response(head_request: bool, status: u16, headers: &[(String, String)]) -> io::Result<Self> {
        if head_request || (100..200).contains(&status) || status == 204 || status == 304 {
            return Ok(BodyMode::None);
        }
        let chunked = headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case("transfer-encoding"))
            .flat_map(|(_, v)| v.split(','))
            .last()
            .is_some_and(|coding| coding.trim().eq_ignore_ascii_case("chunked"));
        if chunked {
            return Ok(BodyMode::Chunked);
        }
        let mut length: Option<u64> = None;
        for (_, v) in headers.iter().filter(|(k, _)| k.eq_ignore_ascii_case("content-length")) {
            let n = v
                .trim()
                .parse::<u64>()
                .map_err(|_| invalid("invalid Content-Length"))?;
            if length.is_some_and(|prev| prev != n) {
                return Err(invalid("conflicting Content-Length values"));
            }
            length = Some(n);
        }
        Ok(length.map_or(BodyMode::UntilClose, BodyMode::Length))
    }
}

fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}

/// Push parser for an HTTP/1.1 response. Feed bytes via `receive`; the handler is invoked as
/// complete tokens are parsed. Partial data stays in the buffer.
pub struct ResponseParser {
    state: ParseState,
    mode: BodyMode,
    /// Bytes left in the current Content-Length body or chunk.
    remaining: u64,
}

impl ResponseParser {
    pub fn new() -> Self {
        Self {
            state: ParseState::StatusLine,
            mode: BodyMode::None,
            remaining: 0,
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    /// Back to StatusLine, e.g. after an interim 1xx response.
    pub fn reset(&mut self) {
        self.state = ParseState::StatusLine;
        self.mode = BodyMode::None;
        self.remaining = 0;
    }

    fn find_crlf(buf: &[u8]) -> Option<usize> {
        buf.windows(2).position(|w| w == b"\r\n")
    }

    /// Split one CRLF-terminated line off the buffer (without the CRLF), or None if incomplete.
    fn take_line(buf: &mut BytesMut) -> io::Result<Option<String>> {
        match Self::find_crlf(buf) {
            Some(n) => {
                let line = buf.split_to(n + 2);
                std::str::from_utf8(&line[..n])
                    .map(|s| Some(s.to_string()))
                    .map_err(|_| invalid("line is not UTF-8"))
            }
            None if buf.len() > MAX_LINE => Err(invalid("line too long")),
            None => Ok(None),
        }
    }

    fn split_field(line: &str) -> Option<(&str, &str)> {
        line.split_once(':').map(|(n, v)| (n.trim(), v.trim()))
    }

    /// Consume and parse as much as possible from buf.
    pub fn receive<H: H1ResponseHandler>(&mut self, buf: &mut BytesMut, handler: &mut H) -> io::Result<()> {
        loop {
            match self.state {
                ParseState::StatusLine => {
                    let Some(line) = Self::take_line(buf)? else {
                        return Ok(());
                    };
                    // HTTP/1.1 200 OK, or HTTP/1.1 200
                    let mut parts = line.splitn(3, ' ');
                    let version = parts.next().unwrap_or_default();
                    if !version.starts_with("HTTP/1.") {
                        return Err(invalid("malformed status line"));
                    }
                    let code = parts
                        .next()
                        .filter(|c| c.len() == 3)
                        .and_then(|c| c.parse::<u16>().ok())
                        .ok_or_else(|| invalid("malformed status code"))?;
                    handler.status(code, parts.next());
                    self.state = ParseState::Headers;
                }
                ParseState::Headers => {
                    let Some(line) = Self::take_line(buf)? else {
                        return Ok(());
                    };
                    if line.is_empty() {
                        self.state = ParseState::HeadersComplete;
                        return Ok(());
                    }
                    if let Some((name, value)) = Self::split_field(&line) {
                        handler.header(name, value);
                    }
                }
                ParseState::HeadersComplete | ParseState::Idle => return Ok(()),
                ParseState::Body => {
                    if buf.is_empty() {
                        return Ok(());
                    }
                    match self.mode {
                        BodyMode::Length(_) => {
                            let n = (self.remaining.min(buf.len() as u64)) as usize;
                            let chunk = buf.split_to(n);
                            handler.body_chunk(&chunk);
                            self.remaining -= n as u64;
                            if self.remaining == 0 {
                                self.finish(handler);
                            }
                        }
                        _ => {
                            let chunk = buf.split();
                            handler.body_chunk(&chunk);
                        }
                    }
                }
                ParseState::ChunkSize => {
                    let Some(line) = Self::take_line(buf)? else {
                        return Ok(());
                    };
                    let hex = line.split(';').next().unwrap_or_default().trim();
                    self.remaining = u64::from_str_radix(hex, 16).map_err(|_| invalid("invalid chunk size"))?;
                    self.state = if self.remaining == 0 {
                        ParseState::ChunkTrailer
                    } else {
                        ParseState::ChunkData
                    };
                }
                ParseState::ChunkData => {
                    if buf.is_empty() {
                        return Ok(());
                    }
                    let n = (self.remaining.min(buf.len() as u64)) as usize;
                    let chunk = buf.split_to(n);
                    handler.body_chunk(&chunk);
                    self.remaining -= n as u64;
                    if self.remaining == 0 {
                        self.state = ParseState::ChunkDataEnd;
                    }
                }
                ParseState::ChunkDataEnd => {
                    if buf.len() < 2 {
                        return Ok(());
                    }
                    if &buf[..2] != b"\r\n" {
                        return Err(invalid("missing CRLF after chunk data"));
                    }
                    buf.advance(2);
                    self.state = ParseState::ChunkSize;
                }
                ParseState::ChunkTrailer => {
                    let Some(line) = Self::take_line(buf)? else {
                        return Ok(());
                    };
                    if line.is_empty() {
                        self.finish(handler);
                    } else if let Some((name, value)) = Self::split_field(&line) {
                        handler.trailer(name, value);
                    }
                }
            }
        }
    }

    fn finish<H: H1ResponseHandler>(&mut self, handler: &mut H) {
        handler.end_body();
        handler.complete();
        self.state = ParseState::Idle;
    }

    /// Called once the head is complete (state HeadersComplete). Bodiless modes complete immediately.
    pub fn set_body_mode<H: H1ResponseHandler>(&mut self, mode: BodyMode, handler: &mut H) {
        if self.state != ParseState::HeadersComplete {
            return;
        }
        self.mode = mode;
        match mode {
            BodyMode::None | BodyMode::Length(0) => {
                handler.complete();
                self.state = ParseState::Idle;
            }
            BodyMode::Length(n) => {
                handler.start_body();
                self.remaining = n;
                self.state = ParseState::Body;
            }
            BodyMode::Chunked => {
                handler.start_body();
                self.state = ParseState::ChunkSize;
            }
            BodyMode::UntilClose => {
                handler.start_body();
                self.state = ParseState::Body;
            }
        }
    }

    /// The peer closed the connection. Only a read-until-close body may end this way.
    pub fn finish_at_eof<H: H1ResponseHandler>(&mut self, handler: &mut H) -> io::Result<()> {
        match (self.state, self.mode) {
            (ParseState::Idle, _) => Ok(()),
            (ParseState::Body, BodyMode::UntilClose) => {
                self.finish(handler);
                Ok(())
            }
            _ => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before response was complete",
            )),
        }
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, Debug)]
    struct Recorder {
        status: Option<(u16, Option<String>)>,
        headers: Vec<(String, String)>,
        trailers: Vec<(String, String)>,
        body: Vec<u8>,
        started: bool,
        completed: bool,
    }

    impl H1ResponseHandler for Recorder {
        fn status(&mut self, code: u16, reason: Option<&str>) {
            self.status = Some((code, reason.map(str::to_string)));
        }
        fn header(&mut self, name: &str, value: &str) {
            self.headers.push((name.into(), value.into()));
        }
        fn start_body(&mut self) {
            self.started = true;
        }
        fn body_chunk(&mut self, data: &[u8]) {
            self.body.extend_from_slice(data);
        }
        fn end_body(&mut self) {}
        fn trailer(&mut self, name: &str, value: &str) {
            self.trailers.push((name.into(), value.into()));
        }
        fn complete(&mut self) {
            self.completed = true;
        }
    }

    /// Feed `input` split into `step`-byte pieces, applying body framing when the head completes.
    fn run(input: &[u8], step: usize) -> io::Result<Recorder> {
        let mut parser = ResponseParser::new();
        let mut rec = Recorder::default();
        let mut buf = BytesMut::new();
        for piece in input.chunks(step) {
            buf.extend_from_slice(piece);
            loop {
                parser.receive(&mut buf, &mut rec)?;
                if parser.state() != ParseState::HeadersComplete {
                    break;
                }
                let code = rec.status.as_ref().map_or(0, |s| s.0);
                let mode = BodyMode::for_response(false, code, &rec.headers)?;
                parser.set_body_mode(mode, &mut rec);
            }
        }
        parser.finish_at_eof(&mut rec)?;
        Ok(rec)
    }

    #[test]
    fn content_length_body() {
        let input = b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\nX-A: b\r\n\r\nhello";
        for step in [1, 3, input.len()] {
            let rec = run(input, step).unwrap();
            assert_eq!(rec.status, Some((200, Some("OK".into()))));
            assert_eq!(rec.headers[1], ("X-A".into(), "b".into()));
            assert_eq!(rec.body, b"hello");
            assert!(rec.completed);
        }
    }

    #[test]
    fn chunked_body_with_trailers() {
        let input = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n\
            4\r\nWiki\r\n5;ext=1\r\npedia\r\nE\r\n in\r\n\r\nchunks.\r\n0\r\nX-Checksum: 1\r\n\r\n";
        for step in [1, 2, 7, input.len()] {
            let rec = run(input, step).unwrap();
            assert_eq!(rec.body, b"Wikipedia in\r\n\r\nchunks.");
            assert_eq!(rec.trailers, vec![("X-Checksum".into(), "1".into())]);
            assert!(rec.completed);
        }
    }

    #[test]
    fn read_until_close() {
        let rec = run(b"HTTP/1.0 200 OK\r\n\r\nall of it", 4).unwrap();
        assert_eq!(rec.body, b"all of it");
        assert!(rec.completed);
    }

    #[test]
    fn no_body_statuses() {
        let rec = run(b"HTTP/1.1 204 No Content\r\nContent-Length: 10\r\n\r\n", 5).unwrap();
        assert!(rec.completed);
        assert!(!rec.started);
        assert!(rec.body.is_empty());
    }

    #[test]
    fn truncated_body_is_an_error() {
        let err = run(b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nshort", 64).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        let err = run(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nab", 64).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn malformed_input() {
        assert!(run(b"SMTP 220 hello\r\n\r\n", 64).is_err());
        assert!(run(b"HTTP/1.1 2000 OK\r\n\r\n", 64).is_err());
        assert!(run(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\nzz\r\n", 64).is_err());
        assert!(run(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n1\r\naXX", 64).is_err());
    }

    #[test]
    fn framing_selection() {
        let h = |pairs: &[(&str, &str)]| -> Vec<(String, String)> {
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
        };
        assert_eq!(BodyMode::for_response(true, 200, &h(&[("Content-Length", "9")])).unwrap(), BodyMode::None);
        assert_eq!(BodyMode::for_response(false, 304, &[]).unwrap(), BodyMode::None);
        assert_eq!(
            BodyMode::for_response(false, 200, &h(&[("transfer-encoding", "gzip, Chunked"), ("Content-Length", "3")])).unwrap(),
            BodyMode::Chunked
        );
        assert_eq!(BodyMode::for_response(false, 200, &h(&[("Content-Length", " 3 ")])).unwrap(), BodyMode::Length(3));
        assert_eq!(BodyMode::for_response(false, 200, &[]).unwrap(), BodyMode::UntilClose);
        assert!(BodyMode::for_response(false, 200, &h(&[("Content-Length", "3"), ("Content-Length", "4")])).is_err());
        assert!(BodyMode::for_response(false, 200, &h(&[("Content-Length", "-1")])).is_err());
    }
}
