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

//! HTTP/2: frame parser and writer, connection session, and the single-stream dispatcher
//! (no external h2 crate).

mod dispatcher;
mod frame;
mod handler;
mod parser;
mod session;
mod writer;

pub use dispatcher::{request_headers, Http2Dispatcher};
pub use frame::*;
pub use handler::{H2FrameHandler, Priority};
pub use parser::H2Parser;
pub use session::{Session, LOCAL_WINDOW, STREAM_ID};
pub use writer::H2Writer;
