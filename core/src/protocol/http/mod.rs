/*
 * mod.rs
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

//! HTTP client: HTTP/1.1 over TCP or TLS with push-parsed responses.
//!
//! - Callback-based response API: `ResponseHandler` with `response`, `body_chunk`, `complete`, `failed`.
//! - Buffers: `bytes` crate (BytesMut for the parse buffer).
//! - One request per connection (`Connection: close`); read-until-close bodies end at EOF.
//! - TLS via tokio-rustls with ALPN `http/1.1`.

mod handler;
mod request;
mod response;

pub mod h1;

pub use handler::ResponseHandler;
pub use request::{Method, Request};
pub(crate) use request::check_header;
pub use response::{ExpectedLength, ResponseInfo};

pub mod client;
pub mod connection;

pub use client::HttpFetcher;
pub use connection::{HttpConnection, HttpStream};
