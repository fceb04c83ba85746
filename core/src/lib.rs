/*
 * lib.rs
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

//! Callback-based URL loading over HTTP/1.1.
//!
//! A [`UrlLoader`] wraps one [`Request`]. `start` spawns the fetch on a tokio runtime; the
//! caller's [`Handlers`] hear about the response head, progress, and exactly one of
//! completion or error. Received bytes stay available through the loader's accessors.

pub mod config;
pub mod error;
pub mod fetch;
pub mod loader;
pub mod net;
pub mod protocol;

pub use config::LoaderConfig;
pub use error::{LoaderError, Result};
pub use fetch::{FetchFuture, Fetcher};
pub use loader::{EventKind, Handlers, LoaderEvent, UrlLoader};
pub use protocol::http::{ExpectedLength, HttpFetcher, Method, Request, ResponseHandler, ResponseInfo};
