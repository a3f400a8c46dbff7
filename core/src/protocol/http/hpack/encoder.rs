/*
 * encoder.rs
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

//! HPACK encoder (RFC 7541). Stateless: fields are sent as static-table references or as
//! literals without indexing, so the peer's dynamic table is never touched. Strings are
//! Huffman-coded when that is shorter.

use bytes::BufMut;

use super::huffman;
use super::static_table::{self, StaticMatch};

/// Fields whose values must never enter any compression table.
const SENSITIVE: &[&str] = &["authorization", "proxy-authorization", "cookie", "set-cookie"];

/// Encode a header list. Names must already be lowercase.
pub fn encode_headers<N, V>(headers: &[(N, V)], out: &mut impl BufMut)
where
    N: AsRef<str>,
    V: AsRef<str>,
{
    for (name, value) in headers {
        encode_header(name.as_ref(), value.as_ref(), out);
    }
}

/// Encode one field.
pub fn encode_header(name: &str, value: &str, out: &mut impl BufMut) {
    let sensitive = SENSITIVE.contains(&name);
    // 6.2.2 literal without indexing (0000) or 6.2.3 never indexed (0001), 4-bit name index
    let literal = if sensitive { 0x10 } else { 0x00 };
    match static_table::find(name, value) {
        Some(StaticMatch::Field(index)) if !sensitive => encode_integer(index as u64, 7, 0x80, out),
        Some(StaticMatch::Field(index)) | Some(StaticMatch::Name(index)) => {
            encode_integer(index as u64, 4, literal, out);
            encode_string(value.as_bytes(), out);
        }
        None => {
            out.put_u8(literal);
            encode_string(name.as_bytes(), out);
            encode_string(value.as_bytes(), out);
        }
    }
}

/// String literal (5.2): H flag plus 7-bit prefixed length.
pub fn encode_string(s: &[u8], out: &mut impl BufMut) {
    let coded_len = huffman::encoded_length(s);
    if coded_len < s.len() {
        encode_integer(coded_len as u64, 7, 0x80, out);
        out.put_slice(&huffman::encode(s));
    } else {
        encode_integer(s.len() as u64, 7, 0, out);
        out.put_slice(s);
    }
}

/// Prefixed integer (5.1). `prefix` holds the opcode bits above the `nbits`-bit prefix.
pub fn encode_integer(mut value: u64, nbits: u8, prefix: u8, out: &mut impl BufMut) {
    let max_prefix = (1u64 << nbits) - 1;
    if value < max_prefix {
        out.put_u8(prefix | value as u8);
        return;
    }
    out.put_u8(prefix | max_prefix as u8);
    value -= max_prefix;
    while value >= 128 {
        out.put_u8(0x80 | (value % 128) as u8);
        value /= 128;
    }
    out.put_u8(value as u8);
}
