/*
 * handler.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of urlloader, a callback-based URL loading library.
 *
 * urlloader is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * urlloader is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with urlloader.  If not, see <http://www.gnu.org/licenses/>.
 */

//! HTTP response handler trait (push-model callbacks from a fetcher).
//!
//! Events: response → body_chunk (×n) → complete / failed.

use std::io;

use crate::protocol::http::response::ResponseInfo;

/// Handler for response events. The fetcher drives this as data arrives.
///
/// Flow for a successful fetch:
/// 1. `response(info)`: final response head (interim 1xx responses are not reported)
/// 2. `body_chunk(data)`: for each chunk of decoded body data
/// 3. `complete()`: response fully received
///
/// On connection/protocol failure `failed(error)` is called instead of `complete`, possibly
/// after some chunks. A fetcher reports exactly one of `complete` or `failed`.
pub trait ResponseHandler {
    fn response(&mut self, info: ResponseInfo);

    /// Data is only valid for the duration of the call.
    fn body_chunk(&mut self, data: &[u8]);

    fn complete(&mut self);

    fn failed(&mut self, error: io::Error);
}
