/*
 * fetch.rs
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

//! Fetcher: the asynchronous URL-fetch facility a `UrlLoader` delegates network I/O to.
//!
//! A fetcher performs one request and drives a `ResponseHandler` as the response arrives.
//! `HttpFetcher` is the built-in HTTP/1.1 implementation; hosts can supply their own.

use std::future::Future;
use std::pin::Pin;

use crate::protocol::http::{Request, ResponseHandler};

/// Future driving one fetch to its end. Dropping it abandons the fetch.
pub type FetchFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

pub trait Fetcher: Send + Sync {
    /// Build the future that performs `request`. Nothing happens until it is polled.
    ///
    /// The handler must see at most one `response` before any `body_chunk`, then exactly one
    /// of `complete` or `failed`.
    fn fetch(&self, request: Request, handler: Box<dyn ResponseHandler + Send>) -> FetchFuture;
}
