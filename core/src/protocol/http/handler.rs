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

//! HTTP response handler trait (push callbacks).
//!
//! Events: status → header (×n) → start_body → body_chunk (×n) → end_body → trailer (×n) → complete / failed.

use std::io;

/// Handler for HTTP response events. Dispatchers drive this as data arrives.
///
/// Flow for a response with body:
/// 1. `status(code)` once the final (non-1xx) status is known
/// 2. `header(name, value)` for each response header
/// 3. `start_body()` when a body follows
/// 4. `body_chunk(data)` for each chunk of body data, in wire order
/// 5. `end_body()`
/// 6. `trailer(name, value)` for each trailer, if any
/// 7. `complete()` when the response is fully received
///
/// On connection or protocol failure only `failed(error)` is called.
pub trait ResponseHandler {
    fn status(&mut self, code: u16);

    /// Name may repeat for multi-value headers.
    fn header(&mut self, name: &str, value: &str);

    /// Not called for HEAD responses, 204, or 304.
    fn start_body(&mut self);

    /// Data is only valid for the duration of the call.
    fn body_chunk(&mut self, data: &[u8]);

    fn end_body(&mut self);

    fn trailer(&mut self, _name: &str, _value: &str) {}

    fn complete(&mut self);

    fn failed(&mut self, error: &io::Error);
}
