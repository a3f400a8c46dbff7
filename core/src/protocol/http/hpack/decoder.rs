/*
 * decoder.rs
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

//! HPACK decoder (RFC 7541): static and dynamic tables, all field representations, Huffman
//! string literals, and table size updates.

use bytes::Buf;
use std::collections::VecDeque;
use std::io;

use super::huffman;
use super::static_table::{self, STATIC_LEN};

/// Per-entry overhead counted against the table size (4.1).
const ENTRY_OVERHEAD: usize = 32;

/// Upper bound on the decoded size of one header block.
const MAX_HEADER_LIST: usize = 256 * 1024;

fn malformed(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, format!("HPACK: {}", msg))
}

/// Callback for each decoded field.
pub trait HeaderHandler {
    fn header(&mut self, name: &str, value: &str);
}

impl HeaderHandler for Vec<(String, String)> {
    fn header(&mut self, name: &str, value: &str) {
        self.push((name.to_string(), value.to_string()));
    }
}

/// FIFO of (name, value); newest entry at the front.
#[derive(Debug, Default)]
struct DynamicTable {
    entries: VecDeque<(String, String)>,
    size: usize,
    max_size: usize,
}

impl DynamicTable {
    fn get(&self, i: usize) -> Option<&(String, String)> {
        self.entries.get(i)
    }

    fn insert(&mut self, name: String, value: String) {
        let entry = name.len() + value.len() + ENTRY_OVERHEAD;
        if entry > self.max_size {
            // An oversized entry empties the table and is not added.
            self.entries.clear();
            self.size = 0;
            return;
        }
        self.evict_to(self.max_size - entry);
        self.size += entry;
        self.entries.push_front((name, value));
    }

    fn resize(&mut self, max_size: usize) {
        self.max_size = max_size;
        self.evict_to(max_size);
    }

    fn evict_to(&mut self, limit: usize) {
        while self.size > limit {
            match self.entries.pop_back() {
                Some((n, v)) => self.size -= n.len() + v.len() + ENTRY_OVERHEAD,
                None => break,
            }
        }
    }
}

/// HPACK decoder state for one connection.
pub struct Decoder {
    /// Largest table size the peer may select (our SETTINGS_HEADER_TABLE_SIZE).
    limit: usize,
    table: DynamicTable,
}

impl Decoder {
    pub fn new(header_table_size: usize) -> Self {
        Self {
            limit: header_table_size,
            table: DynamicTable {
                max_size: header_table_size,
                ..Default::default()
            },
        }
    }

    /// Current dynamic table occupancy in octets.
    pub fn table_size(&self) -> usize {
        self.table.size
    }

    /// Decode one complete header block.
    pub fn decode<B: Buf, H: HeaderHandler>(&mut self, buf: &mut B, handler: &mut H) -> io::Result<()> {
        let mut fields_seen = false;
        let mut list_size = 0usize;
        while buf.has_remaining() {
            let b = buf.get_u8();
            let (name, value) = if b & 0x80 != 0 {
                // 6.1 indexed field
                let index = decode_integer(buf, b, 7)?;
                self.lookup(index)?
            } else if b & 0x40 != 0 {
                // 6.2.1 literal with incremental indexing
                let (name, value) = self.literal(buf, b, 6)?;
                self.table.insert(name.clone(), value.clone());
                (name, value)
            } else if b & 0x20 != 0 {
                // 6.3 table size update; only allowed before the first field
                if fields_seen {
                    return Err(malformed("table size update after header field"));
                }
                let size = decode_integer(buf, b, 5)?;
                if size > self.limit {
                    return Err(malformed("table size update exceeds limit"));
                }
                self.table.resize(size);
                continue;
            } else {
                // 6.2.2 without indexing / 6.2.3 never indexed
                self.literal(buf, b, 4)?
            };
            fields_seen = true;
            list_size += name.len() + value.len() + ENTRY_OVERHEAD;
            if list_size > MAX_HEADER_LIST {
                return Err(malformed("header list too large"));
            }
            handler.header(&name, &value);
        }
        Ok(())
    }

    fn lookup(&self, index: usize) -> io::Result<(String, String)> {
        if index == 0 {
            return Err(malformed("index 0"));
        }
        if let Some((n, v)) = static_table::get(index) {
            return Ok((n.to_string(), v.to_string()));
        }
        self.table
            .get(index - STATIC_LEN - 1)
            .cloned()
            .ok_or_else(|| malformed("index out of range"))
    }

    fn literal<B: Buf>(&self, buf: &mut B, opcode: u8, nbits: u8) -> io::Result<(String, String)> {
        let index = decode_integer(buf, opcode, nbits)?;
        let name = if index == 0 {
            decode_string(buf)?
        } else {
            self.lookup(index)?.0
        };
        let value = decode_string(buf)?;
        Ok((name, value))
    }
}

/// Prefixed integer (5.1).
fn decode_integer<B: Buf>(buf: &mut B, opcode: u8, nbits: u8) -> io::Result<usize> {
    let mask = (1usize << nbits) - 1;
    let mut value = opcode as usize & mask;
    if value < mask {
        return Ok(value);
    }
    let mut shift = 0u32;
    loop {
        if !buf.has_remaining() {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "HPACK: truncated integer"));
        }
        let b = buf.get_u8();
        let part = ((b & 0x7f) as usize)
            .checked_shl(shift)
            .filter(|_| shift < 28)
            .ok_or_else(|| malformed("integer too large"))?;
        value += part;
        if b & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
    }
}

/// String literal (5.2), Huffman-decoded when the H bit is set.
fn decode_string<B: Buf>(buf: &mut B) -> io::Result<String> {
    if !buf.has_remaining() {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "HPACK: missing string"));
    }
    let b = buf.get_u8();
    let len = decode_integer(buf, b, 7)?;
    if buf.remaining() < len {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "HPACK: truncated string"));
    }
    let raw = buf.copy_to_bytes(len);
    let bytes = if b & 0x80 != 0 {
        huffman::decode(&raw)?
    } else {
        raw.to_vec()
    };
    String::from_utf8(bytes).map_err(|_| malformed("string is not UTF-8"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::http::hpack::encode_headers;

    fn decode_all(decoder: &mut Decoder, data: &[u8]) -> io::Result<Vec<(String, String)>> {
        let mut out = Vec::new();
        decoder.decode(&mut &data[..], &mut out)?;
        Ok(out)
    }

    fn pairs(v: &[(&str, &str)]) -> Vec<(String, String)> {
        v.iter().map(|(n, v)| (n.to_string(), v.to_string())).collect()
    }

    #[test]
    fn indexed_static_fields() {
        let mut d = Decoder::new(4096);
        assert_eq!(
            decode_all(&mut d, &[0x82, 0x87, 0x84]).unwrap(),
            pairs(&[(":method", "GET"), (":scheme", "https"), (":path", "/")])
        );
    }

    #[test]
    fn rfc_c3_requests_share_the_dynamic_table() {
        // RFC 7541 C.3.1 and C.3.2 (no Huffman)
        let mut d = Decoder::new(4096);
        let first = [
            0x82, 0x86, 0x84, 0x41, 0x0f, b'w', b'w', b'w', b'.', b'e', b'x', b'a', b'm', b'p', b'l', b'e', b'.',
            b'c', b'o', b'm',
        ];
        assert_eq!(
            decode_all(&mut d, &first).unwrap(),
            pairs(&[(":method", "GET"), (":scheme", "http"), (":path", "/"), (":authority", "www.example.com")])
        );
        assert_eq!(d.table_size(), 57);
        let second = [0x82, 0x86, 0x84, 0xbe, 0x58, 0x08, b'n', b'o', b'-', b'c', b'a', b'c', b'h', b'e'];
        assert_eq!(
            decode_all(&mut d, &second).unwrap(),
            pairs(&[
                (":method", "GET"),
                (":scheme", "http"),
                (":path", "/"),
                (":authority", "www.example.com"),
                ("cache-control", "no-cache"),
            ])
        );
        assert_eq!(d.table_size(), 110);
    }

    #[test]
    fn huffman_literal() {
        let data = [0x00, 0x01, b'x', 0x82, 0x1c, 0x64];
        assert_eq!(decode_all(&mut Decoder::new(4096), &data).unwrap(), pairs(&[("x", "abc")]));
    }

    #[test]
    fn size_update_evicts() {
        let mut d = Decoder::new(4096);
        decode_all(&mut d, &[0x40, 0x01, b'a', 0x01, b'b']).unwrap();
        assert_eq!(d.table_size(), 34);
        // size update to 0 at the start of the next block
        assert_eq!(decode_all(&mut d, &[0x20, 0x82]).unwrap(), pairs(&[(":method", "GET")]));
        assert_eq!(d.table_size(), 0);
        assert!(decode_all(&mut d, &[0xbe]).is_err());
    }

    #[test]
    fn protocol_errors() {
        let mut d = Decoder::new(4096);
        assert!(decode_all(&mut d, &[0x80]).is_err());
        assert!(decode_all(&mut d, &[0xff, 0x80]).is_err());
        assert!(decode_all(&mut d, &[0x82, 0x20]).is_err());
        assert!(decode_all(&mut d, &[0x3f, 0xe1, 0x3f]).is_err());
        assert!(decode_all(&mut d, &[0x00, 0x05, b'a']).is_err());
    }

    #[test]
    fn decodes_what_the_encoder_writes() {
        let input = pairs(&[
            (":method", "POST"),
            (":scheme", "https"),
            (":authority", "api.example.test"),
            (":path", "/v1/items.json?limit=10"),
            ("accept", "application/json"),
            ("authorization", "Bearer secret"),
            ("x-request-id", "\u{1f980}"),
        ]);
        let mut buf = bytes::BytesMut::new();
        encode_headers(&input, &mut buf);
        assert_eq!(decode_all(&mut Decoder::new(4096), &buf).unwrap(), input);
    }
}
